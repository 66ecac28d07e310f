//! Dynamic values and their wire codecs.
//!
//! Provider data has no static Rust shape: each resource type's schema
//! describes an object type at runtime, and values are checked against that
//! type as they are encoded and decoded. Two wire forms exist, a compact
//! MessagePack encoding ([`msgpack`]) and JSON ([`json`]).

pub mod json;
pub mod msgpack;
mod ty;

pub use ty::Type;

use serde_json::Number;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::path::AttributePath;

/// A dynamically-typed value.
///
/// Values carry no type of their own; a [`Type`] is supplied whenever one is
/// encoded or decoded. [`Value::Null`] and [`Value::Unknown`] conform to
/// every type.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// The absence of a value.
    #[default]
    Null,
    /// A value that will only be known later, typically after apply.
    Unknown,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(Number),
    /// A string.
    String(String),
    /// An ordered sequence.
    List(Vec<Value>),
    /// An unordered collection of unique elements, kept in the order given.
    Set(Vec<Value>),
    /// A string-keyed collection.
    Map(BTreeMap<String, Value>),
    /// A fixed set of named attributes.
    Object(BTreeMap<String, Value>),
    /// A fixed-length heterogeneous sequence.
    Tuple(Vec<Value>),
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Create a number value from an integer.
    pub fn number(n: impl Into<Number>) -> Self {
        Self::Number(n.into())
    }

    /// Create a number value from a float, or `None` for NaN and infinities.
    pub fn float(f: f64) -> Option<Self> {
        Number::from_f64(f).map(Self::Number)
    }

    /// Create a list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Create a set value.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Set(items.into_iter().collect())
    }

    /// Create a map value from `(key, value)` pairs.
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Create an object value from `(name, value)` pairs.
    pub fn object<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Object(
            attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        )
    }

    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value itself is known. Nested values may still be unknown.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Whether this value and everything nested within it is known.
    pub fn is_wholly_known(&self) -> bool {
        match self {
            Self::Unknown => false,
            Self::List(items) | Self::Set(items) | Self::Tuple(items) => {
                items.iter().all(Value::is_wholly_known)
            }
            Self::Map(entries) | Self::Object(entries) => {
                entries.values().all(Value::is_wholly_known)
            }
            _ => true,
        }
    }

    /// Look up an attribute of an object value.
    pub fn get_attr(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Object(attrs) => attrs.get(name),
            _ => None,
        }
    }

    /// Best-effort structural type of this value.
    ///
    /// Used when a value is placed where the schema only says
    /// [`Type::Dynamic`]. Lists and maps whose elements all infer the same
    /// type keep their collection type. When element types differ, a list
    /// becomes a tuple and a map becomes an object. Empty collections and
    /// null or unknown values yield [`Type::Dynamic`].
    pub fn inferred_type(&self) -> Type {
        self.with_inferred_type().1
    }

    /// This value paired with its inferred type, with mixed lists and maps
    /// rewritten into the tuple and object values that type describes.
    pub(crate) fn with_inferred_type(&self) -> (Value, Type) {
        fn uniform(types: &[Type]) -> Option<Type> {
            match types.split_first() {
                None => Some(Type::Dynamic),
                Some((first, rest)) => rest.iter().all(|t| t == first).then(|| first.clone()),
            }
        }

        match self {
            Self::Null | Self::Unknown => (self.clone(), Type::Dynamic),
            Self::Bool(_) => (self.clone(), Type::Bool),
            Self::Number(_) => (self.clone(), Type::Number),
            Self::String(_) => (self.clone(), Type::String),
            Self::List(items) => {
                let (values, types): (Vec<_>, Vec<_>) =
                    items.iter().map(Value::with_inferred_type).unzip();
                match uniform(&types) {
                    Some(elem) => (Self::List(values), Type::list(elem)),
                    None => (Self::Tuple(values), Type::Tuple(types)),
                }
            }
            Self::Set(items) => {
                let (values, types): (Vec<_>, Vec<_>) =
                    items.iter().map(Value::with_inferred_type).unzip();
                let elem = types.into_iter().next().unwrap_or(Type::Dynamic);
                (Self::Set(values), Type::set(elem))
            }
            Self::Map(entries) => {
                let (values, types): (BTreeMap<_, _>, BTreeMap<_, _>) = entries
                    .iter()
                    .map(|(k, v)| {
                        let (v, t) = v.with_inferred_type();
                        ((k.clone(), v), (k.clone(), t))
                    })
                    .unzip();
                let element_types: Vec<Type> = types.values().cloned().collect();
                match uniform(&element_types) {
                    Some(elem) => (Self::Map(values), Type::map(elem)),
                    None => (Self::Object(values), Type::Object(types)),
                }
            }
            Self::Object(attrs) => {
                let (values, types): (BTreeMap<_, _>, BTreeMap<_, _>) = attrs
                    .iter()
                    .map(|(k, v)| {
                        let (v, t) = v.with_inferred_type();
                        ((k.clone(), v), (k.clone(), t))
                    })
                    .unzip();
                (Self::Object(values), Type::Object(types))
            }
            Self::Tuple(items) => {
                let (values, types): (Vec<_>, Vec<_>) =
                    items.iter().map(Value::with_inferred_type).unzip();
                (Self::Tuple(values), Type::Tuple(types))
            }
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Unknown => "unknown",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Tuple(_) => "tuple",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

/// Errors from encoding or decoding a dynamic value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// The value does not have the shape its type requires.
    #[error("{}", describe_at(.path, .message))]
    Conformance {
        /// Where in the value the mismatch was found.
        path: AttributePath,
        /// What was wrong there.
        message: String,
    },

    /// The MessagePack bytes could not be read or written.
    #[error("malformed msgpack: {0}")]
    Msgpack(String),

    /// The JSON bytes could not be read or written.
    #[error("malformed JSON: {0}")]
    Json(String),

    /// A type specification could not be parsed.
    #[error("invalid type specification: {0}")]
    InvalidType(String),
}

impl CodecError {
    pub(crate) fn conformance(path: &AttributePath, message: impl Into<String>) -> Self {
        Self::Conformance {
            path: path.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn mismatch(path: &AttributePath, expected: &Type, got: &str) -> Self {
        Self::conformance(path, format!("{} required, but have {}", expected, got))
    }
}

fn describe_at(path: &AttributePath, message: &str) -> String {
    if path.is_empty() {
        message.to_string()
    } else {
        format!("{}: {}", path, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let v = Value::object([
            ("name", Value::string("web")),
            ("count", Value::number(3)),
            ("tags", Value::map([("env", Value::from("prod"))])),
        ]);
        assert_eq!(v.get_attr("name"), Some(&Value::string("web")));
        assert_eq!(v.get_attr("count"), Some(&Value::Number(3.into())));
        assert!(v.get_attr("missing").is_none());
        assert!(Value::float(f64::NAN).is_none());
    }

    #[test]
    fn test_known_ness() {
        assert!(!Value::Unknown.is_known());
        let nested = Value::list([Value::from(true), Value::Unknown]);
        assert!(nested.is_known());
        assert!(!nested.is_wholly_known());
        assert!(Value::Null.is_wholly_known());
    }

    #[test]
    fn test_inferred_type() {
        let v = Value::object([
            ("a", Value::list([Value::from("x")])),
            ("b", Value::Null),
            ("c", Value::set(Vec::new())),
        ]);
        assert_eq!(
            v.inferred_type(),
            Type::object([
                ("a", Type::list(Type::String)),
                ("b", Type::Dynamic),
                ("c", Type::set(Type::Dynamic)),
            ])
        );
    }

    #[test]
    fn test_inferred_type_of_mixed_collections() {
        let list = Value::list([Value::from("a"), Value::number(1)]);
        assert_eq!(list.inferred_type(), Type::tuple(vec![Type::String, Type::Number]));
        assert_eq!(
            list.with_inferred_type().0,
            Value::Tuple(vec![Value::from("a"), Value::number(1)])
        );

        let map = Value::map([("a", Value::from(true)), ("b", Value::from("x"))]);
        assert_eq!(
            map.inferred_type(),
            Type::object([("a", Type::Bool), ("b", Type::String)])
        );
        assert_eq!(
            Value::map([("a", Value::from(true)), ("b", Value::from(false))]).inferred_type(),
            Type::map(Type::Bool)
        );
    }

    #[test]
    fn test_conformance_error_display() {
        let err = CodecError::mismatch(
            &AttributePath::new().attribute("count"),
            &Type::Number,
            "string",
        );
        assert_eq!(err.to_string(), "count: number required, but have string");

        let err = CodecError::conformance(&AttributePath::new(), "object required");
        assert_eq!(err.to_string(), "object required");
    }
}
