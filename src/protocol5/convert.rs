//! Conversions between protocol 5 wire messages and the client model.

use tracing::{debug, warn};

use super::client::ProviderRpc;
use crate::codec::EncodedValue;
use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::error::ClientError;
use crate::path::{AttributePath, PathStep};
use crate::schema::{
    Attribute, AttributeFlags, Block, DataResourceTypeSchema, ManagedResourceTypeSchema,
    NestedBlock, NestingMode, Schema,
};
use crate::tfplugin5 as wire;
use crate::tfplugin5::attribute_path::step::Selector;
use crate::tfplugin5::schema::nested_block::NestingMode as WireNestingMode;
use crate::value::Type;

impl From<wire::DynamicValue> for EncodedValue {
    fn from(raw: wire::DynamicValue) -> Self {
        Self {
            json: raw.json,
            msgpack: raw.msgpack,
        }
    }
}

impl From<EncodedValue> for wire::DynamicValue {
    fn from(value: EncodedValue) -> Self {
        Self {
            msgpack: value.msgpack,
            json: value.json,
        }
    }
}

/// Decode diagnostics returned by the provider, keeping their order.
pub(crate) fn decode_diagnostics(raws: Vec<wire::Diagnostic>) -> Diagnostics {
    raws.into_iter().map(decode_diagnostic).collect()
}

fn decode_diagnostic(raw: wire::Diagnostic) -> Diagnostic {
    // Anything not explicitly a warning is treated as an error.
    let severity = match wire::diagnostic::Severity::try_from(raw.severity) {
        Ok(wire::diagnostic::Severity::Warning) => Severity::Warning,
        _ => Severity::Error,
    };
    Diagnostic {
        severity,
        summary: raw.summary,
        detail: Some(raw.detail).filter(|d| !d.is_empty()),
        attribute: raw
            .attribute
            .map(decode_attribute_path)
            .filter(|path| !path.is_empty()),
    }
}

/// Decode a wire attribute path. Never fails: steps without a recognized
/// selector become [`PathStep::Unknown`].
pub(crate) fn decode_attribute_path(raw: wire::AttributePath) -> AttributePath {
    raw.steps
        .into_iter()
        .map(|step| match step.selector {
            Some(Selector::AttributeName(name)) => PathStep::Attribute(name),
            Some(Selector::ElementKeyString(key)) => PathStep::Key(key),
            Some(Selector::ElementKeyInt(index)) => PathStep::Index(index),
            None => PathStep::Unknown,
        })
        .collect()
}

fn decode_nesting(raw: i32) -> NestingMode {
    match WireNestingMode::try_from(raw) {
        Ok(WireNestingMode::Single) => NestingMode::Single,
        Ok(WireNestingMode::Group) => NestingMode::Group,
        Ok(WireNestingMode::List) => NestingMode::List,
        Ok(WireNestingMode::Set) => NestingMode::Set,
        Ok(WireNestingMode::Map) => NestingMode::Map,
        Ok(WireNestingMode::Invalid) | Err(_) => NestingMode::Invalid,
    }
}

fn decode_attribute(raw: wire::schema::Attribute) -> (String, Attribute) {
    let ty = Type::from_json(&raw.r#type).unwrap_or_else(|err| {
        warn!(attribute = %raw.name, error = %err, "Provider sent an invalid attribute type, using dynamic");
        Type::Dynamic
    });
    let attr = Attribute {
        ty,
        flags: AttributeFlags {
            required: raw.required,
            optional: raw.optional,
            computed: raw.computed,
            sensitive: raw.sensitive,
        },
        description: Some(raw.description).filter(|d| !d.is_empty()),
        deprecated: raw.deprecated,
    };
    (raw.name, attr)
}

/// Translate a wire schema block into the client model.
pub(crate) fn decode_block(raw: wire::schema::Block) -> Block {
    let mut block = Block {
        description: Some(raw.description).filter(|d| !d.is_empty()),
        deprecated: raw.deprecated,
        ..Block::default()
    };

    for raw_attr in raw.attributes {
        let (name, attr) = decode_attribute(raw_attr);
        block.attributes.insert(name, attr);
    }

    for raw_nested in raw.block_types {
        if block.attributes.contains_key(&raw_nested.type_name) {
            warn!(name = %raw_nested.type_name, "Nested block name collides with an attribute, ignoring block");
            continue;
        }
        let nested = NestedBlock {
            block: raw_nested.block.map(decode_block).unwrap_or_default(),
            nesting: decode_nesting(raw_nested.nesting),
            min_items: u64::try_from(raw_nested.min_items).unwrap_or(0),
            max_items: u64::try_from(raw_nested.max_items).unwrap_or(0),
        };
        block.blocks.insert(raw_nested.type_name, nested);
    }

    block
}

fn decode_schema_block(raw: Option<wire::Schema>) -> Option<Block> {
    raw.and_then(|s| s.block).map(decode_block)
}

/// Fetch and translate the provider's schema.
///
/// Any error diagnostic from the provider fails the whole load.
pub(crate) async fn load_schema<C: ProviderRpc>(rpc: &C) -> Result<Schema, ClientError> {
    let resp = rpc
        .get_schema(wire::get_provider_schema::Request {})
        .await?;

    let diags = decode_diagnostics(resp.diagnostics);
    if diags.has_errors() {
        return Err(ClientError::SchemaUnavailable(diags));
    }
    for diag in diags.iter() {
        warn!(summary = %diag.summary, "Provider reported a warning with its schema");
    }

    let mut schema = Schema {
        provider_config: decode_schema_block(resp.provider).unwrap_or_default(),
        provider_meta: decode_schema_block(resp.provider_meta),
        ..Schema::default()
    };
    for (name, raw) in resp.resource_schemas {
        let content = raw.block.map(decode_block).unwrap_or_default();
        schema = schema.with_managed_resource_type(name, ManagedResourceTypeSchema::new(raw.version, content));
    }
    for (name, raw) in resp.data_source_schemas {
        let content = raw.block.map(decode_block).unwrap_or_default();
        schema = schema.with_data_resource_type(name, DataResourceTypeSchema::new(content));
    }

    debug!(
        managed_resource_types = schema.managed_resource_types.len(),
        data_resource_types = schema.data_resource_types.len(),
        "Loaded provider schema"
    );
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tfplugin5::attribute_path::Step;

    fn step(selector: Option<Selector>) -> Step {
        Step { selector }
    }

    #[test]
    fn test_decode_attribute_path() {
        let raw = wire::AttributePath {
            steps: vec![
                step(Some(Selector::AttributeName("tags".to_string()))),
                step(Some(Selector::ElementKeyString("env".to_string()))),
                step(None),
                step(Some(Selector::ElementKeyInt(3))),
            ],
        };
        let path = decode_attribute_path(raw);
        assert_eq!(
            path.steps(),
            &[
                PathStep::Attribute("tags".to_string()),
                PathStep::Key("env".to_string()),
                PathStep::Unknown,
                PathStep::Index(3),
            ]
        );
        assert!(decode_attribute_path(wire::AttributePath::default()).is_empty());
    }

    #[test]
    fn test_decode_diagnostics() {
        let diags = decode_diagnostics(vec![
            wire::Diagnostic {
                severity: wire::diagnostic::Severity::Warning as i32,
                summary: "deprecated".to_string(),
                detail: String::new(),
                attribute: None,
            },
            wire::Diagnostic {
                severity: wire::diagnostic::Severity::Error as i32,
                summary: "bad value".to_string(),
                detail: "must be positive".to_string(),
                attribute: Some(wire::AttributePath {
                    steps: vec![step(Some(Selector::AttributeName("count".to_string())))],
                }),
            },
        ]);

        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert!(diags[0].detail.is_none());
        assert!(diags[1].is_error());
        assert_eq!(diags[1].detail.as_deref(), Some("must be positive"));
        assert_eq!(
            diags[1].attribute,
            Some(AttributePath::new().attribute("count"))
        );
    }

    #[test]
    fn test_decode_block_tolerates_bad_types() {
        let raw = wire::schema::Block {
            attributes: vec![
                wire::schema::Attribute {
                    name: "id".to_string(),
                    r#type: br#""string""#.to_vec(),
                    computed: true,
                    ..Default::default()
                },
                wire::schema::Attribute {
                    name: "weird".to_string(),
                    r#type: b"not a type".to_vec(),
                    optional: true,
                    ..Default::default()
                },
            ],
            block_types: vec![wire::schema::NestedBlock {
                type_name: "rule".to_string(),
                block: None,
                nesting: 99,
                min_items: -1,
                max_items: 4,
            }],
            ..Default::default()
        };

        let block = decode_block(raw);
        assert_eq!(block.attributes["id"].ty, Type::String);
        assert!(block.attributes["id"].flags.computed);
        assert_eq!(block.attributes["weird"].ty, Type::Dynamic);
        assert_eq!(block.blocks["rule"].nesting, NestingMode::Invalid);
        assert_eq!(block.blocks["rule"].min_items, 0);
        assert_eq!(block.blocks["rule"].max_items, 4);
    }
}
