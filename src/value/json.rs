//! JSON encoding of dynamic values.
//!
//! JSON has no representation for unknown values, so encoding one is an
//! error. Values of [`Type::Dynamic`] are written as
//! `{"value": ..., "type": ...}`.

use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;

use super::{CodecError, Type, Value};
use crate::path::{AttributePath, PathStep};

/// Encode `value` as JSON, checking it against `ty`.
pub fn marshal(value: &Value, ty: &Type) -> Result<Vec<u8>, CodecError> {
    let encoded = to_json(value, ty, &AttributePath::new())?;
    serde_json::to_vec(&encoded).map_err(|e| CodecError::Json(e.to_string()))
}

/// Decode JSON bytes into a value of type `ty`.
pub fn unmarshal(bytes: &[u8], ty: &Type) -> Result<Value, CodecError> {
    let raw: Json = serde_json::from_slice(bytes).map_err(|e| CodecError::Json(e.to_string()))?;
    from_json(raw, ty, &AttributePath::new())
}

fn to_json(value: &Value, ty: &Type, path: &AttributePath) -> Result<Json, CodecError> {
    match (value, ty) {
        (Value::Null, _) => Ok(Json::Null),
        (Value::Unknown, _) => Err(CodecError::conformance(
            path,
            "value is not known",
        )),

        (_, Type::Dynamic) => {
            let (value, actual) = value.with_inferred_type();
            let mut wrapper = Map::new();
            wrapper.insert("value".to_string(), to_json(&value, &actual, path)?);
            wrapper.insert("type".to_string(), actual.to_json());
            Ok(Json::Object(wrapper))
        }

        (Value::Bool(b), Type::Bool) => Ok(Json::Bool(*b)),
        (Value::Number(n), Type::Number) => Ok(Json::Number(n.clone())),
        (Value::String(s), Type::String) => Ok(Json::String(s.clone())),

        (Value::List(items), Type::List(elem)) | (Value::Set(items), Type::Set(elem)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| to_json(item, elem, &path.child(PathStep::Index(i as i64))))
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array),

        (Value::Map(entries), Type::Map(elem)) => entries
            .iter()
            .map(|(k, v)| {
                to_json(v, elem, &path.child(PathStep::Key(k.clone()))).map(|v| (k.clone(), v))
            })
            .collect::<Result<Map<_, _>, _>>()
            .map(Json::Object),

        (Value::Object(vals), Type::Object(attrs)) => {
            if let Some(extra) = vals.keys().find(|k| !attrs.contains_key(*k)) {
                return Err(CodecError::conformance(
                    path,
                    format!("unsupported attribute {:?}", extra),
                ));
            }
            let mut out = Map::new();
            for (name, aty) in attrs {
                let attr_path = path.child(PathStep::Attribute(name.clone()));
                let v = vals.get(name).ok_or_else(|| {
                    CodecError::conformance(&attr_path, "attribute is required")
                })?;
                out.insert(name.clone(), to_json(v, aty, &attr_path)?);
            }
            Ok(Json::Object(out))
        }

        (Value::Tuple(items), Type::Tuple(elems)) if items.len() == elems.len() => items
            .iter()
            .zip(elems)
            .enumerate()
            .map(|(i, (item, ety))| to_json(item, ety, &path.child(PathStep::Index(i as i64))))
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array),

        (other, _) => Err(CodecError::mismatch(path, ty, other.kind_name())),
    }
}

fn from_json(raw: Json, ty: &Type, path: &AttributePath) -> Result<Value, CodecError> {
    match (raw, ty) {
        (Json::Null, _) => Ok(Value::Null),

        (Json::Object(mut wrapper), Type::Dynamic) => {
            let type_json = wrapper.remove("type").ok_or_else(|| {
                CodecError::conformance(path, "dynamic value is missing its type")
            })?;
            let actual = Type::try_from(type_json)?;
            let inner = wrapper.remove("value").unwrap_or(Json::Null);
            from_json(inner, &actual, path)
        }

        (Json::Bool(b), Type::Bool) => Ok(Value::Bool(b)),
        (Json::Number(n), Type::Number) => Ok(Value::Number(n)),
        (Json::String(s), Type::Number) => s
            .parse()
            .map(Value::Number)
            .map_err(|_| CodecError::conformance(path, format!("invalid number {:?}", s))),
        (Json::String(s), Type::String) => Ok(Value::String(s)),

        (Json::Array(items), Type::List(elem)) => decode_elements(items, elem, path).map(Value::List),
        (Json::Array(items), Type::Set(elem)) => decode_elements(items, elem, path).map(Value::Set),

        (Json::Object(entries), Type::Map(elem)) => entries
            .into_iter()
            .map(|(k, v)| {
                let decoded = from_json(v, elem, &path.child(PathStep::Key(k.clone())))?;
                Ok((k, decoded))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(Value::Map),

        (Json::Object(entries), Type::Object(attrs)) => {
            let mut out = BTreeMap::new();
            for (name, v) in entries {
                let aty = attrs.get(&name).ok_or_else(|| {
                    CodecError::conformance(path, format!("unsupported attribute {:?}", name))
                })?;
                let decoded = from_json(v, aty, &path.child(PathStep::Attribute(name.clone())))?;
                out.insert(name, decoded);
            }
            for name in attrs.keys() {
                out.entry(name.clone()).or_insert(Value::Null);
            }
            Ok(Value::Object(out))
        }

        (Json::Array(items), Type::Tuple(elems)) if items.len() == elems.len() => items
            .into_iter()
            .zip(elems)
            .enumerate()
            .map(|(i, (item, ety))| from_json(item, ety, &path.child(PathStep::Index(i as i64))))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Tuple),

        (raw, _) => Err(CodecError::mismatch(path, ty, json_kind(&raw))),
    }
}

fn decode_elements(
    items: Vec<Json>,
    elem: &Type,
    path: &AttributePath,
) -> Result<Vec<Value>, CodecError> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| from_json(item, elem, &path.child(PathStep::Index(i as i64))))
        .collect()
}

fn json_kind(raw: &Json) -> &'static str {
    match raw {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_object() {
        let ty = Type::object([
            ("id", Type::String),
            ("size", Type::Number),
            ("labels", Type::set(Type::String)),
        ]);
        let value = unmarshal(br#"{"id": "vol-1", "size": 20}"#, &ty).unwrap();
        assert_eq!(
            value,
            Value::object([
                ("id", Value::string("vol-1")),
                ("size", Value::number(20)),
                ("labels", Value::Null),
            ])
        );
    }

    #[test]
    fn test_decode_rejects_unknown_attribute() {
        let ty = Type::object([("id", Type::String)]);
        let err = unmarshal(br#"{"id": "x", "bogus": true}"#, &ty).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_unknown_cannot_be_encoded() {
        let ty = Type::object([("id", Type::String)]);
        let value = Value::object([("id", Value::Unknown)]);
        let err = marshal(&value, &ty).unwrap_err();
        assert_eq!(err.to_string(), "id: value is not known");
    }

    #[test]
    fn test_dynamic_wrapper() {
        let ty = Type::object([("data", Type::Dynamic)]);
        let value = Value::object([("data", Value::from("hello"))]);
        let bytes = marshal(&value, &ty).unwrap();

        let raw: Json = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(raw["data"]["type"], "string");
        assert_eq!(raw["data"]["value"], "hello");
        assert_eq!(unmarshal(&bytes, &ty).unwrap(), value);
    }

    #[test]
    fn test_tuple_length_mismatch() {
        let ty = Type::tuple(vec![Type::String, Type::Bool]);
        assert!(unmarshal(br#"["a"]"#, &ty).is_err());
        assert!(unmarshal(br#"["a", true]"#, &ty).is_ok());
    }

    #[test]
    fn test_block_value_round_trip() {
        use crate::schema::{Attribute, Block, NestedBlock};

        let rule = Block::new()
            .with_attribute("port", Attribute::optional_number())
            .with_attribute("open", Attribute::optional_bool());
        let block = Block::new()
            .with_attribute("id", Attribute::computed_string())
            .with_block("rule", NestedBlock::list(rule.clone()))
            .with_block("tag", NestedBlock::set(Block::new().with_attribute("k", Attribute::required_string())))
            .with_block("zone", NestedBlock::map(rule))
            .with_block(
                "timeouts",
                NestedBlock::single(Block::new().with_attribute("create", Attribute::optional_string())),
            );
        let ty = block.implied_type();

        let value = Value::object([
            ("id", Value::string("vm-7")),
            (
                "rule",
                Value::list([
                    Value::object([("port", Value::number(22)), ("open", Value::from(true))]),
                    Value::object([("port", Value::number(443)), ("open", Value::Null)]),
                ]),
            ),
            ("tag", Value::set([Value::object([("k", Value::string("env"))])])),
            (
                "zone",
                Value::map([(
                    "a",
                    Value::object([("port", Value::number(80)), ("open", Value::from(false))]),
                )]),
            ),
            ("timeouts", Value::object([("create", Value::string("10m"))])),
        ]);

        let bytes = marshal(&value, &ty).unwrap();
        assert_eq!(unmarshal(&bytes, &ty).unwrap(), value);
    }
}
