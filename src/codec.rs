//! Encoding dynamic values against a block schema.
//!
//! Requests are always sent in the MessagePack form. Responses may use
//! either form; whichever is populated is decoded, MessagePack first.
//! Failures in either direction become diagnostics, never errors.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::schema::Block;
use crate::value::{self, Value};

/// A dynamic value as it travels on the wire.
///
/// At most one of the two fields is expected to be populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedValue {
    /// JSON encoding.
    pub json: Vec<u8>,
    /// MessagePack encoding.
    pub msgpack: Vec<u8>,
}

impl EncodedValue {
    /// Wrap MessagePack bytes.
    pub fn msgpack(bytes: Vec<u8>) -> Self {
        Self {
            json: Vec::new(),
            msgpack: bytes,
        }
    }

    /// Wrap JSON bytes.
    pub fn json(bytes: Vec<u8>) -> Self {
        Self {
            json: bytes,
            msgpack: Vec::new(),
        }
    }

    /// Whether neither encoding is populated.
    pub fn is_empty(&self) -> bool {
        self.json.is_empty() && self.msgpack.is_empty()
    }
}

/// Encode `value` against the implied type of `block`.
///
/// On failure no bytes are returned, only a single "Invalid object" error.
pub fn encode_dynamic_value(value: &Value, block: &Block) -> Result<EncodedValue, Diagnostics> {
    let ty = block.implied_type();
    value::msgpack::marshal(value, &ty)
        .map(EncodedValue::msgpack)
        .map_err(|err| {
            Diagnostics::from_error("Invalid object", "Value does not have the required type", err)
        })
}

/// Encode an optional provider meta value.
///
/// Nothing is sent unless both a non-null value and a provider meta schema
/// exist.
pub fn encode_provider_meta(
    value: Option<&Value>,
    block: Option<&Block>,
) -> Result<Option<EncodedValue>, Diagnostics> {
    match (value, block) {
        (Some(value), Some(block)) if !value.is_null() => {
            encode_dynamic_value(value, block).map(Some)
        },
        _ => Ok(None),
    }
}

/// Decode a response value against the implied type of `block`.
///
/// A value that cannot be decoded yields [`Value::Unknown`] as a placeholder
/// alongside exactly one error diagnostic.
pub fn decode_dynamic_value(encoded: &EncodedValue, block: &Block) -> (Value, Diagnostics) {
    let ty = block.implied_type();
    let (result, format) = if !encoded.msgpack.is_empty() {
        (value::msgpack::unmarshal(&encoded.msgpack, &ty), "msgpack")
    } else if !encoded.json.is_empty() {
        (value::json::unmarshal(&encoded.json, &ty), "JSON")
    } else {
        let diag = Diagnostic::error("Provider using unsupported response format")
            .with_detail("Provider's response is not in either JSON or msgpack format");
        return (Value::Unknown, diag.into());
    };

    match result {
        Ok(value) => (value, Diagnostics::new()),
        Err(err) => (
            Value::Unknown,
            Diagnostics::from_error(
                "Provider returned invalid object",
                format!(
                    "Provider's {} response does not conform to the expected type",
                    format
                ),
                err,
            ),
        ),
    }
}

/// Decode an optional response value.
///
/// An absent value decodes to [`Value::Null`] without diagnostics.
pub(crate) fn decode_optional(encoded: Option<EncodedValue>, block: &Block) -> (Value, Diagnostics) {
    match encoded {
        Some(encoded) => decode_dynamic_value(&encoded, block),
        None => (Value::Null, Diagnostics::new()),
    }
}
