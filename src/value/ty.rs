//! Structural types for dynamic values.
//!
//! Types travel over the wire in the JSON type encoding used by provider
//! schemas: primitive types are strings (`"string"`), collection and
//! structural types are arrays whose first element names the kind
//! (`["list", "string"]`, `["object", {"name": "string"}]`).

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;

use super::CodecError;

/// The type of a dynamic value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum Type {
    /// A boolean.
    Bool,
    /// An arbitrary number.
    Number,
    /// A unicode string.
    String,
    /// A placeholder for a type that is only known at runtime.
    Dynamic,
    /// An ordered sequence of elements of one type.
    List(Box<Type>),
    /// An unordered collection of unique elements of one type.
    Set(Box<Type>),
    /// A mapping from string keys to elements of one type.
    Map(Box<Type>),
    /// A fixed set of named attributes, each with its own type.
    Object(BTreeMap<String, Type>),
    /// A fixed-length sequence whose elements each have their own type.
    Tuple(Vec<Type>),
}

impl Type {
    /// Create a list type.
    pub fn list(element: Type) -> Self {
        Self::List(Box::new(element))
    }

    /// Create a set type.
    pub fn set(element: Type) -> Self {
        Self::Set(Box::new(element))
    }

    /// Create a map type.
    pub fn map(element: Type) -> Self {
        Self::Map(Box::new(element))
    }

    /// Create an object type from `(name, type)` pairs.
    pub fn object<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, Type)>,
        K: Into<String>,
    {
        Self::Object(
            attributes
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        )
    }

    /// Create a tuple type.
    pub fn tuple(elements: Vec<Type>) -> Self {
        Self::Tuple(elements)
    }

    /// Parse the JSON type encoding.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CodecError> {
        let raw: Json = serde_json::from_slice(bytes)
            .map_err(|e| CodecError::InvalidType(e.to_string()))?;
        Self::try_from(raw)
    }

    /// Render the JSON type encoding.
    pub fn to_json(&self) -> Json {
        match self {
            Self::Bool => Json::from("bool"),
            Self::Number => Json::from("number"),
            Self::String => Json::from("string"),
            Self::Dynamic => Json::from("dynamic"),
            Self::List(elem) => Json::Array(vec![Json::from("list"), elem.to_json()]),
            Self::Set(elem) => Json::Array(vec![Json::from("set"), elem.to_json()]),
            Self::Map(elem) => Json::Array(vec![Json::from("map"), elem.to_json()]),
            Self::Object(attrs) => Json::Array(vec![
                Json::from("object"),
                Json::Object(
                    attrs
                        .iter()
                        .map(|(name, ty)| (name.clone(), ty.to_json()))
                        .collect(),
                ),
            ]),
            Self::Tuple(elems) => Json::Array(vec![
                Json::from("tuple"),
                Json::Array(elems.iter().map(Type::to_json).collect()),
            ]),
        }
    }

    /// Whether this type contains [`Type::Dynamic`] anywhere within it.
    pub fn has_dynamic_types(&self) -> bool {
        match self {
            Self::Dynamic => true,
            Self::Bool | Self::Number | Self::String => false,
            Self::List(elem) | Self::Set(elem) | Self::Map(elem) => elem.has_dynamic_types(),
            Self::Object(attrs) => attrs.values().any(Type::has_dynamic_types),
            Self::Tuple(elems) => elems.iter().any(Type::has_dynamic_types),
        }
    }
}

impl TryFrom<Json> for Type {
    type Error = CodecError;

    fn try_from(raw: Json) -> Result<Self, Self::Error> {
        match raw {
            Json::String(name) => match name.as_str() {
                "bool" => Ok(Self::Bool),
                "number" => Ok(Self::Number),
                "string" => Ok(Self::String),
                "dynamic" => Ok(Self::Dynamic),
                other => Err(CodecError::InvalidType(format!(
                    "unsupported primitive type {:?}",
                    other
                ))),
            },
            Json::Array(mut parts) => {
                // Objects may carry a third element listing optional attributes.
                let arity_ok = match parts.first().and_then(Json::as_str) {
                    Some("object") => parts.len() == 2 || parts.len() == 3,
                    _ => parts.len() == 2,
                };
                if !arity_ok {
                    return Err(CodecError::InvalidType(
                        "type constructor has the wrong number of arguments".to_string(),
                    ));
                }
                parts.truncate(2);
                let arg = parts.pop().unwrap_or(Json::Null);
                let kind = parts.pop().unwrap_or(Json::Null);

                match kind.as_str() {
                    Some("list") => Ok(Self::list(Self::try_from(arg)?)),
                    Some("set") => Ok(Self::set(Self::try_from(arg)?)),
                    Some("map") => Ok(Self::map(Self::try_from(arg)?)),
                    Some("object") => match arg {
                        Json::Object(attrs) => attrs
                            .into_iter()
                            .map(|(name, ty)| Self::try_from(ty).map(|ty| (name, ty)))
                            .collect::<Result<BTreeMap<_, _>, _>>()
                            .map(Self::Object),
                        _ => Err(CodecError::InvalidType(
                            "object attribute types must be a JSON object".to_string(),
                        )),
                    },
                    Some("tuple") => match arg {
                        Json::Array(elems) => elems
                            .into_iter()
                            .map(Self::try_from)
                            .collect::<Result<Vec<_>, _>>()
                            .map(Self::Tuple),
                        _ => Err(CodecError::InvalidType(
                            "tuple element types must be a JSON array".to_string(),
                        )),
                    },
                    Some(other) => Err(CodecError::InvalidType(format!(
                        "unsupported type constructor {:?}",
                        other
                    ))),
                    None => Err(CodecError::InvalidType(
                        "type constructor name must be a string".to_string(),
                    )),
                }
            }
            other => Err(CodecError::InvalidType(format!(
                "type must be a string or array, not {}",
                other
            ))),
        }
    }
}

impl From<Type> for Json {
    fn from(ty: Type) -> Self {
        ty.to_json()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::Dynamic => write!(f, "dynamic"),
            Self::List(elem) => write!(f, "list of {}", elem),
            Self::Set(elem) => write!(f, "set of {}", elem),
            Self::Map(elem) => write!(f, "map of {}", elem),
            Self::Object(_) => write!(f, "object"),
            Self::Tuple(_) => write!(f, "tuple"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(Type::from_json(br#""string""#).unwrap(), Type::String);
        assert_eq!(Type::from_json(br#""number""#).unwrap(), Type::Number);
        assert_eq!(Type::from_json(br#""bool""#).unwrap(), Type::Bool);
        assert_eq!(Type::from_json(br#""dynamic""#).unwrap(), Type::Dynamic);
    }

    #[test]
    fn test_parse_nested() {
        let ty = Type::from_json(br#"["map", ["list", ["object", {"a": "string", "b": ["set", "number"]}]]]"#)
            .unwrap();
        assert_eq!(
            ty,
            Type::map(Type::list(Type::object([
                ("a", Type::String),
                ("b", Type::set(Type::Number)),
            ])))
        );
    }

    #[test]
    fn test_parse_object_with_optional_attributes() {
        let ty = Type::from_json(br#"["object", {"a": "string"}, ["a"]]"#).unwrap();
        assert_eq!(ty, Type::object([("a", Type::String)]));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Type::from_json(b"not json").is_err());
        assert!(Type::from_json(br#""strang""#).is_err());
        assert!(Type::from_json(br#"["list"]"#).is_err());
        assert!(Type::from_json(br#"["frobnicate", "string"]"#).is_err());
        assert!(Type::from_json(br#"["object", ["a"]]"#).is_err());
        assert!(Type::from_json(b"42").is_err());
    }

    #[test]
    fn test_json_encoding_is_reversible() {
        let ty = Type::object([
            ("tags", Type::map(Type::String)),
            ("pair", Type::tuple(vec![Type::Bool, Type::Dynamic])),
        ]);
        let encoded = serde_json::to_vec(&ty).unwrap();
        let decoded: Type = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded, ty);
    }

    #[test]
    fn test_has_dynamic_types() {
        assert!(!Type::list(Type::String).has_dynamic_types());
        assert!(Type::object([("x", Type::list(Type::Dynamic))]).has_dynamic_types());
    }
}
