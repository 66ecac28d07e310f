//! MessagePack encoding of dynamic values.
//!
//! This is the primary wire form. Unknown values are written as the
//! extension `(0, [0])`; any extension read back is treated as unknown.
//! Values whose type is [`Type::Dynamic`] are written as a two-element array
//! holding the JSON type encoding and then the value itself.

use rmpv::Value as Msgpack;
use serde_json::Number;
use std::collections::BTreeMap;

use super::{CodecError, Type, Value};
use crate::path::{AttributePath, PathStep};

const UNKNOWN_EXT_TYPE: i8 = 0;

/// Encode `value` as MessagePack, checking it against `ty`.
pub fn marshal(value: &Value, ty: &Type) -> Result<Vec<u8>, CodecError> {
    let encoded = to_msgpack(value, ty, &AttributePath::new())?;
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &encoded)
        .map_err(|e| CodecError::Msgpack(e.to_string()))?;
    Ok(buf)
}

/// Decode MessagePack bytes into a value of type `ty`.
///
/// Trailing bytes after the first value are an error.
pub fn unmarshal(bytes: &[u8], ty: &Type) -> Result<Value, CodecError> {
    let mut reader = bytes;
    let raw = rmpv::decode::read_value(&mut reader)
        .map_err(|e| CodecError::Msgpack(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::Msgpack(format!(
            "{} unexpected trailing bytes",
            reader.len()
        )));
    }
    from_msgpack(raw, ty, &AttributePath::new())
}

fn to_msgpack(value: &Value, ty: &Type, path: &AttributePath) -> Result<Msgpack, CodecError> {
    match (value, ty) {
        (Value::Null, _) => Ok(Msgpack::Nil),
        (Value::Unknown, _) => Ok(Msgpack::Ext(UNKNOWN_EXT_TYPE, vec![0])),

        (_, Type::Dynamic) => {
            let (value, actual) = value.with_inferred_type();
            let type_json = serde_json::to_vec(&actual.to_json())
                .map_err(|e| CodecError::conformance(path, e.to_string()))?;
            Ok(Msgpack::Array(vec![
                Msgpack::Binary(type_json),
                to_msgpack(&value, &actual, path)?,
            ]))
        }

        (Value::Bool(b), Type::Bool) => Ok(Msgpack::Boolean(*b)),
        (Value::Number(n), Type::Number) => encode_number(n, path),
        (Value::String(s), Type::String) => Ok(Msgpack::String(s.clone().into())),

        (Value::List(items), Type::List(elem)) | (Value::Set(items), Type::Set(elem)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| to_msgpack(item, elem, &path.child(PathStep::Index(i as i64))))
            .collect::<Result<Vec<_>, _>>()
            .map(Msgpack::Array),

        (Value::Map(entries), Type::Map(elem)) => entries
            .iter()
            .map(|(k, v)| {
                let encoded = to_msgpack(v, elem, &path.child(PathStep::Key(k.clone())))?;
                Ok((Msgpack::String(k.clone().into()), encoded))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Msgpack::Map),

        (Value::Object(vals), Type::Object(attrs)) => {
            if let Some(extra) = vals.keys().find(|k| !attrs.contains_key(*k)) {
                return Err(CodecError::conformance(
                    path,
                    format!("unsupported attribute {:?}", extra),
                ));
            }
            let mut out = Vec::with_capacity(attrs.len());
            for (name, aty) in attrs {
                let attr_path = path.child(PathStep::Attribute(name.clone()));
                let v = vals.get(name).ok_or_else(|| {
                    CodecError::conformance(&attr_path, "attribute is required")
                })?;
                out.push((Msgpack::String(name.clone().into()), to_msgpack(v, aty, &attr_path)?));
            }
            Ok(Msgpack::Map(out))
        }

        (Value::Tuple(items), Type::Tuple(elems)) => {
            if items.len() != elems.len() {
                return Err(CodecError::conformance(
                    path,
                    format!("tuple must have {} elements, not {}", elems.len(), items.len()),
                ));
            }
            items
                .iter()
                .zip(elems)
                .enumerate()
                .map(|(i, (item, ety))| {
                    to_msgpack(item, ety, &path.child(PathStep::Index(i as i64)))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Msgpack::Array)
        }

        (other, _) => Err(CodecError::mismatch(path, ty, other.kind_name())),
    }
}

fn encode_number(n: &Number, path: &AttributePath) -> Result<Msgpack, CodecError> {
    if let Some(i) = n.as_i64() {
        Ok(Msgpack::from(i))
    } else if let Some(u) = n.as_u64() {
        Ok(Msgpack::from(u))
    } else {
        n.as_f64()
            .map(Msgpack::F64)
            .ok_or_else(|| CodecError::conformance(path, "number is not representable"))
    }
}

fn from_msgpack(raw: Msgpack, ty: &Type, path: &AttributePath) -> Result<Value, CodecError> {
    match (raw, ty) {
        (Msgpack::Ext(_, _), _) => Ok(Value::Unknown),
        (Msgpack::Nil, _) => Ok(Value::Null),

        (Msgpack::Array(mut parts), Type::Dynamic) if parts.len() == 2 => {
            let inner = parts.pop().unwrap_or(Msgpack::Nil);
            let type_bytes = match parts.pop() {
                Some(Msgpack::Binary(b)) => b,
                Some(Msgpack::String(s)) => s.into_bytes(),
                _ => {
                    return Err(CodecError::conformance(
                        path,
                        "dynamic value type must be bytes",
                    ))
                }
            };
            let actual = Type::from_json(&type_bytes)?;
            from_msgpack(inner, &actual, path)
        }
        (_, Type::Dynamic) => Err(CodecError::conformance(
            path,
            "dynamic value must be a two-element array",
        )),

        (Msgpack::Boolean(b), Type::Bool) => Ok(Value::Bool(b)),

        (Msgpack::Integer(i), Type::Number) => i
            .as_i64()
            .map(Number::from)
            .or_else(|| i.as_u64().map(Number::from))
            .map(Value::Number)
            .ok_or_else(|| CodecError::conformance(path, "integer out of range")),
        (Msgpack::F32(f), Type::Number) => float_value(f as f64, path),
        (Msgpack::F64(f), Type::Number) => float_value(f, path),
        (Msgpack::String(s), Type::Number) => {
            let text = s
                .into_str()
                .ok_or_else(|| CodecError::conformance(path, "number string is not UTF-8"))?;
            text.parse::<Number>()
                .map(Value::Number)
                .map_err(|_| CodecError::conformance(path, format!("invalid number {:?}", text)))
        }

        (Msgpack::String(s), Type::String) => s
            .into_str()
            .map(Value::String)
            .ok_or_else(|| CodecError::conformance(path, "string is not UTF-8")),

        (Msgpack::Array(items), Type::List(elem)) => {
            decode_elements(items, elem, path).map(Value::List)
        }
        (Msgpack::Array(items), Type::Set(elem)) => {
            decode_elements(items, elem, path).map(Value::Set)
        }

        (Msgpack::Map(entries), Type::Map(elem)) => {
            let mut out = BTreeMap::new();
            for (k, v) in entries {
                let key = map_key(k, path)?;
                let decoded = from_msgpack(v, elem, &path.child(PathStep::Key(key.clone())))?;
                out.insert(key, decoded);
            }
            Ok(Value::Map(out))
        }

        (Msgpack::Map(entries), Type::Object(attrs)) => {
            let mut out = BTreeMap::new();
            for (k, v) in entries {
                let name = map_key(k, path)?;
                let aty = attrs.get(&name).ok_or_else(|| {
                    CodecError::conformance(path, format!("unsupported attribute {:?}", name))
                })?;
                let decoded = from_msgpack(v, aty, &path.child(PathStep::Attribute(name.clone())))?;
                out.insert(name, decoded);
            }
            for name in attrs.keys() {
                out.entry(name.clone()).or_insert(Value::Null);
            }
            Ok(Value::Object(out))
        }

        (Msgpack::Array(items), Type::Tuple(elems)) => {
            if items.len() != elems.len() {
                return Err(CodecError::conformance(
                    path,
                    format!("tuple must have {} elements, not {}", elems.len(), items.len()),
                ));
            }
            items
                .into_iter()
                .zip(elems)
                .enumerate()
                .map(|(i, (item, ety))| {
                    from_msgpack(item, ety, &path.child(PathStep::Index(i as i64)))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Tuple)
        }

        (raw, _) => Err(CodecError::mismatch(path, ty, msgpack_kind(&raw))),
    }
}

fn decode_elements(
    items: Vec<Msgpack>,
    elem: &Type,
    path: &AttributePath,
) -> Result<Vec<Value>, CodecError> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| from_msgpack(item, elem, &path.child(PathStep::Index(i as i64))))
        .collect()
}

fn float_value(f: f64, path: &AttributePath) -> Result<Value, CodecError> {
    Value::float(f).ok_or_else(|| CodecError::conformance(path, "number must be finite"))
}

fn map_key(key: Msgpack, path: &AttributePath) -> Result<String, CodecError> {
    match key {
        Msgpack::String(s) => s
            .into_str()
            .ok_or_else(|| CodecError::conformance(path, "map key is not UTF-8")),
        other => Err(CodecError::conformance(
            path,
            format!("map key must be a string, not {}", msgpack_kind(&other)),
        )),
    }
}

fn msgpack_kind(raw: &Msgpack) -> &'static str {
    match raw {
        Msgpack::Nil => "nil",
        Msgpack::Boolean(_) => "bool",
        Msgpack::Integer(_) | Msgpack::F32(_) | Msgpack::F64(_) => "number",
        Msgpack::String(_) => "string",
        Msgpack::Binary(_) => "binary",
        Msgpack::Array(_) => "array",
        Msgpack::Map(_) => "map",
        Msgpack::Ext(_, _) => "extension",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance_type() -> Type {
        Type::object([
            ("id", Type::String),
            ("count", Type::Number),
            ("enabled", Type::Bool),
            ("tags", Type::map(Type::String)),
            ("ports", Type::list(Type::Number)),
        ])
    }

    #[test]
    fn test_object_round_trip() {
        let value = Value::object([
            ("id", Value::string("i-123")),
            ("count", Value::number(2)),
            ("enabled", Value::from(true)),
            ("tags", Value::map([("env", Value::from("prod"))])),
            ("ports", Value::list([Value::number(80), Value::float(8.5).unwrap()])),
        ]);
        let bytes = marshal(&value, &instance_type()).unwrap();
        assert_eq!(unmarshal(&bytes, &instance_type()).unwrap(), value);
    }

    #[test]
    fn test_unknown_and_null_survive() {
        let value = Value::object([
            ("id", Value::Unknown),
            ("count", Value::Null),
            ("enabled", Value::Null),
            ("tags", Value::Null),
            ("ports", Value::list([Value::Unknown])),
        ]);
        let bytes = marshal(&value, &instance_type()).unwrap();
        assert_eq!(unmarshal(&bytes, &instance_type()).unwrap(), value);
    }

    #[test]
    fn test_unknown_wire_form() {
        let bytes = marshal(&Value::Unknown, &Type::String).unwrap();
        assert_eq!(bytes, vec![0xd4, 0x00, 0x00]);
    }

    #[test]
    fn test_dynamic_round_trip() {
        let ty = Type::object([("anything", Type::Dynamic)]);
        let value = Value::object([("anything", Value::list([Value::from("a")]))]);
        let bytes = marshal(&value, &ty).unwrap();
        assert_eq!(unmarshal(&bytes, &ty).unwrap(), value);
    }

    #[test]
    fn test_missing_attribute_rejected_on_encode() {
        let ty = Type::object([("id", Type::String), ("name", Type::String)]);
        let value = Value::object([("id", Value::string("x"))]);
        let err = marshal(&value, &ty).unwrap_err();
        assert_eq!(err.to_string(), "name: attribute is required");
    }

    #[test]
    fn test_type_mismatch_reports_path() {
        let value = Value::object([
            ("id", Value::string("x")),
            ("count", Value::string("three")),
            ("enabled", Value::Null),
            ("tags", Value::Null),
            ("ports", Value::Null),
        ]);
        let err = marshal(&value, &instance_type()).unwrap_err();
        assert_eq!(err.to_string(), "count: number required, but have string");
    }

    #[test]
    fn test_decode_fills_missing_attributes_with_null() {
        let mut buf = Vec::new();
        let raw = Msgpack::Map(vec![(Msgpack::from("id"), Msgpack::from("x"))]);
        rmpv::encode::write_value(&mut buf, &raw).unwrap();

        let ty = Type::object([("id", Type::String), ("name", Type::String)]);
        let value = unmarshal(&buf, &ty).unwrap();
        assert_eq!(value.get_attr("name"), Some(&Value::Null));
    }

    #[test]
    fn test_decode_number_from_string() {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &Msgpack::from("42")).unwrap();
        assert_eq!(unmarshal(&buf, &Type::Number).unwrap(), Value::number(42));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(unmarshal(&[], &Type::String).is_err());
        assert!(unmarshal(&[0xc0, 0xc0], &Type::String).is_err());
    }
}
