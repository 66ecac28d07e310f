//! Testing utilities for code built on the provider client.
//!
//! [`MockProviderV5`] and [`MockProviderV6`] stand in for a plugin process:
//! they answer each RPC with a handler installed by the test, or with an
//! empty successful response, and record the order in which RPCs were made.
//! Plug either into the matching protocol adapter.
//!
//! # Example
//!
//! ```ignore
//! use tfprovider_client::protocol6;
//! use tfprovider_client::testing::{self, MockProviderV6};
//! use tfprovider_client::{Config, Provider, Value};
//!
//! #[tokio::test]
//! async fn test_configure() {
//!     let mock = MockProviderV6::with_schema(testing::example_schema());
//!     let calls = mock.calls();
//!     let provider = protocol6::Provider::new(mock).await.unwrap();
//!
//!     let diags = provider.configure(&Config::new(Value::Null)).await;
//!     testing::assert_no_errors(&diags);
//!     assert_eq!(calls.names(), vec!["GetProviderSchema", "ConfigureProvider"]);
//! }
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tonic::Status;

use crate::diagnostics::Diagnostic;
use crate::schema::{Attribute, Block, DataResourceTypeSchema, ManagedResourceTypeSchema, NestedBlock, Schema};
use crate::value::{Type, Value};
use crate::{protocol5, protocol6, tfplugin5, tfplugin6};

type Handler<Req, Resp> = Box<dyn Fn(Req) -> Result<Resp, Status> + Send + Sync>;

/// The RPCs a mock provider has received, in order.
///
/// Cloning shares the underlying log, so a test can keep a handle after the
/// mock has been moved into an adapter.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    fn record(&self, name: &'static str) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(name);
        }
    }

    /// RPC names in the order they were received.
    pub fn names(&self) -> Vec<&'static str> {
        self.0.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// How many times the named RPC was received.
    pub fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| **n == name).count()
    }

    /// Whether the named RPC was received at all.
    pub fn contains(&self, name: &str) -> bool {
        self.count(name) > 0
    }
}

macro_rules! wire_helpers {
    ($module:ident, $wire:ident) => {
        mod $module {
            use crate::codec;
            use crate::schema::{Attribute, Block, NestedBlock, NestingMode, Schema};
            use crate::value::Value;
            use crate::$wire as wire;
            use crate::$wire::schema::nested_block::NestingMode as WireNestingMode;

            fn attribute(name: &str, attr: &Attribute) -> wire::schema::Attribute {
                wire::schema::Attribute {
                    name: name.to_string(),
                    r#type: attr.ty.to_json().to_string().into_bytes(),
                    description: attr.description.clone().unwrap_or_default(),
                    required: attr.flags.required,
                    optional: attr.flags.optional,
                    computed: attr.flags.computed,
                    sensitive: attr.flags.sensitive,
                    deprecated: attr.deprecated,
                }
            }

            fn nested(name: &str, nested: &NestedBlock) -> wire::schema::NestedBlock {
                let nesting = match nested.nesting {
                    NestingMode::Invalid => WireNestingMode::Invalid,
                    NestingMode::Single => WireNestingMode::Single,
                    NestingMode::Group => WireNestingMode::Group,
                    NestingMode::List => WireNestingMode::List,
                    NestingMode::Set => WireNestingMode::Set,
                    NestingMode::Map => WireNestingMode::Map,
                };
                wire::schema::NestedBlock {
                    type_name: name.to_string(),
                    block: Some(block(&nested.block)),
                    nesting: nesting as i32,
                    min_items: i64::try_from(nested.min_items).unwrap_or(i64::MAX),
                    max_items: i64::try_from(nested.max_items).unwrap_or(i64::MAX),
                }
            }

            pub(super) fn block(block: &Block) -> wire::schema::Block {
                let mut attributes: Vec<_> = block
                    .attributes
                    .iter()
                    .map(|(name, attr)| attribute(name, attr))
                    .collect();
                attributes.sort_by(|a, b| a.name.cmp(&b.name));

                let mut block_types: Vec<_> = block
                    .blocks
                    .iter()
                    .map(|(name, nb)| nested(name, nb))
                    .collect();
                block_types.sort_by(|a, b| a.type_name.cmp(&b.type_name));

                wire::schema::Block {
                    version: 0,
                    attributes,
                    block_types,
                    description: block.description.clone().unwrap_or_default(),
                    deprecated: block.deprecated,
                }
            }

            fn schema(version: i64, content: &Block) -> wire::Schema {
                wire::Schema {
                    version,
                    block: Some(block(content)),
                }
            }

            pub(super) fn schema_response(s: &Schema) -> wire::get_provider_schema::Response {
                wire::get_provider_schema::Response {
                    provider: Some(schema(0, &s.provider_config)),
                    resource_schemas: s
                        .managed_resource_types
                        .iter()
                        .map(|(name, rt)| (name.clone(), schema(rt.version, &rt.content)))
                        .collect(),
                    data_source_schemas: s
                        .data_resource_types
                        .iter()
                        .map(|(name, dt)| (name.clone(), schema(0, &dt.content)))
                        .collect(),
                    diagnostics: Vec::new(),
                    provider_meta: s.provider_meta.as_ref().map(|meta| schema(0, meta)),
                }
            }

            pub(super) fn dynamic_value(value: &Value, block: &Block) -> wire::DynamicValue {
                codec::encode_dynamic_value(value, block)
                    .map(Into::into)
                    .unwrap_or_else(|diags| panic!("fixture does not conform to its schema: {}", diags))
            }

            pub(super) fn diagnostic(severity: wire::diagnostic::Severity, summary: &str) -> wire::Diagnostic {
                wire::Diagnostic {
                    severity: severity as i32,
                    summary: summary.to_string(),
                    detail: String::new(),
                    attribute: None,
                }
            }
        }
    };
}

wire_helpers!(v5, tfplugin5);
wire_helpers!(v6, tfplugin6);

macro_rules! mock_provider {
    (
        $(#[$meta:meta])*
        $name:ident: $wire:ident, $rpc:path, $helpers:ident,
        schema: $schema_method:ident / $schema_on:ident / $schema_label:literal,
        { $($method:ident / $on:ident / $label:literal : $msg:ident),* $(,)? }
    ) => {
        $(#[$meta])*
        pub struct $name {
            schema: $wire::get_provider_schema::Response,
            calls: CallLog,
            $schema_method: Option<Handler<$wire::get_provider_schema::Request, $wire::get_provider_schema::Response>>,
            $($method: Option<Handler<$wire::$msg::Request, $wire::$msg::Response>>,)*
        }

        impl $name {
            /// Create a mock that serves `schema` and answers every other RPC
            /// with an empty successful response.
            pub fn with_schema(schema: Schema) -> Self {
                Self {
                    schema: $helpers::schema_response(&schema),
                    calls: CallLog::default(),
                    $schema_method: None,
                    $($method: None,)*
                }
            }

            /// A handle on the RPCs this mock receives.
            pub fn calls(&self) -> CallLog {
                self.calls.clone()
            }

            /// Replace the schema response.
            pub fn $schema_on(
                mut self,
                handler: impl Fn($wire::get_provider_schema::Request) -> Result<$wire::get_provider_schema::Response, Status>
                    + Send
                    + Sync
                    + 'static,
            ) -> Self {
                self.$schema_method = Some(Box::new(handler));
                self
            }

            $(
                #[doc = concat!("Handle `", $label, "`.")]
                pub fn $on(
                    mut self,
                    handler: impl Fn($wire::$msg::Request) -> Result<$wire::$msg::Response, Status>
                        + Send
                        + Sync
                        + 'static,
                ) -> Self {
                    self.$method = Some(Box::new(handler));
                    self
                }
            )*
        }

        #[async_trait]
        impl $rpc for $name {
            async fn $schema_method(
                &self,
                request: $wire::get_provider_schema::Request,
            ) -> Result<$wire::get_provider_schema::Response, Status> {
                self.calls.record($schema_label);
                match &self.$schema_method {
                    Some(handler) => handler(request),
                    None => Ok(self.schema.clone()),
                }
            }

            $(
                async fn $method(
                    &self,
                    request: $wire::$msg::Request,
                ) -> Result<$wire::$msg::Response, Status> {
                    self.calls.record($label);
                    match &self.$method {
                        Some(handler) => handler(request),
                        None => Ok(Default::default()),
                    }
                }
            )*
        }
    };
}

mock_provider! {
    /// An in-process protocol 5 provider.
    MockProviderV5: tfplugin5, protocol5::ProviderRpc, v5,
    schema: get_schema / on_get_schema / "GetSchema",
    {
        prepare_provider_config / on_prepare_provider_config / "PrepareProviderConfig": prepare_provider_config,
        validate_resource_type_config / on_validate_resource_type_config / "ValidateResourceTypeConfig": validate_resource_type_config,
        validate_data_source_config / on_validate_data_source_config / "ValidateDataSourceConfig": validate_data_source_config,
        upgrade_resource_state / on_upgrade_resource_state / "UpgradeResourceState": upgrade_resource_state,
        configure / on_configure / "Configure": configure,
        read_resource / on_read_resource / "ReadResource": read_resource,
        plan_resource_change / on_plan_resource_change / "PlanResourceChange": plan_resource_change,
        apply_resource_change / on_apply_resource_change / "ApplyResourceChange": apply_resource_change,
        import_resource_state / on_import_resource_state / "ImportResourceState": import_resource_state,
        read_data_source / on_read_data_source / "ReadDataSource": read_data_source,
        stop / on_stop / "Stop": stop,
    }
}

mock_provider! {
    /// An in-process protocol 6 provider.
    MockProviderV6: tfplugin6, protocol6::ProviderRpc, v6,
    schema: get_provider_schema / on_get_provider_schema / "GetProviderSchema",
    {
        validate_resource_config / on_validate_resource_config / "ValidateResourceConfig": validate_resource_config,
        validate_data_resource_config / on_validate_data_resource_config / "ValidateDataResourceConfig": validate_data_resource_config,
        upgrade_resource_state / on_upgrade_resource_state / "UpgradeResourceState": upgrade_resource_state,
        configure_provider / on_configure_provider / "ConfigureProvider": configure_provider,
        read_resource / on_read_resource / "ReadResource": read_resource,
        plan_resource_change / on_plan_resource_change / "PlanResourceChange": plan_resource_change,
        apply_resource_change / on_apply_resource_change / "ApplyResourceChange": apply_resource_change,
        import_resource_state / on_import_resource_state / "ImportResourceState": import_resource_state,
        read_data_source / on_read_data_source / "ReadDataSource": read_data_source,
        stop_provider / on_stop_provider / "StopProvider": stop_provider,
    }
}

// =========================================================================
// Fixtures
// =========================================================================

/// A small provider schema: a provider config with `region`, a provider
/// meta block, the managed resource types `example_instance` (schema
/// version 1) and `example_volume`, and the data resource type
/// `example_image`.
pub fn example_schema() -> Schema {
    let volume = Block::new()
        .with_attribute("device", Attribute::required_string())
        .with_attribute("size", Attribute::optional_number());

    let instance = Block::new()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("ami", Attribute::required_string())
        .with_attribute("instance_type", Attribute::optional_string())
        .with_block("ebs_volume", NestedBlock::list(volume));

    let disk = Block::new()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("size_gb", Attribute::required_number());

    let image = Block::new()
        .with_attribute("name", Attribute::required_string())
        .with_attribute("id", Attribute::computed_string());

    Schema::new()
        .with_provider_config(Block::new().with_attribute("region", Attribute::optional_string()))
        .with_provider_meta(Block::new().with_attribute("module_path", Attribute::optional_string()))
        .with_managed_resource_type("example_instance", ManagedResourceTypeSchema::new(1, instance))
        .with_managed_resource_type("example_volume", ManagedResourceTypeSchema::new(0, disk))
        .with_data_resource_type("example_image", DataResourceTypeSchema::new(image))
}

/// A wholly known `example_instance` object.
pub fn example_instance() -> Value {
    Value::object([
        ("id", Value::string("i-123")),
        ("ami", Value::string("ami-42")),
        ("instance_type", Value::string("t3.micro")),
        (
            "ebs_volume",
            Value::list([Value::object([
                ("device", Value::string("/dev/sdb")),
                ("size", Value::number(20)),
            ])]),
        ),
    ])
}

/// A wholly known `example_volume` object.
pub fn example_volume() -> Value {
    Value::object([("id", Value::string("vol-9")), ("size_gb", Value::number(100))])
}

/// An `example_image` configuration with its computed `id` left null.
pub fn example_image_config() -> Value {
    Value::object([("name", Value::string("ubuntu")), ("id", Value::Null)])
}

/// Encode a fixture as a protocol 5 dynamic value.
///
/// # Panics
///
/// Panics if `value` does not conform to `block`.
pub fn dynamic_value_v5(value: &Value, block: &Block) -> tfplugin5::DynamicValue {
    v5::dynamic_value(value, block)
}

/// Encode a fixture as a protocol 6 dynamic value.
///
/// # Panics
///
/// Panics if `value` does not conform to `block`.
pub fn dynamic_value_v6(value: &Value, block: &Block) -> tfplugin6::DynamicValue {
    v6::dynamic_value(value, block)
}

/// A protocol 5 error diagnostic with the given summary.
pub fn wire_error_v5(summary: &str) -> tfplugin5::Diagnostic {
    v5::diagnostic(tfplugin5::diagnostic::Severity::Error, summary)
}

/// A protocol 5 warning diagnostic with the given summary.
pub fn wire_warning_v5(summary: &str) -> tfplugin5::Diagnostic {
    v5::diagnostic(tfplugin5::diagnostic::Severity::Warning, summary)
}

/// A protocol 6 error diagnostic with the given summary.
pub fn wire_error_v6(summary: &str) -> tfplugin6::Diagnostic {
    v6::diagnostic(tfplugin6::diagnostic::Severity::Error, summary)
}

/// A protocol 6 warning diagnostic with the given summary.
pub fn wire_warning_v6(summary: &str) -> tfplugin6::Diagnostic {
    v6::diagnostic(tfplugin6::diagnostic::Severity::Warning, summary)
}

/// The implied type of `example_instance`.
pub fn example_instance_type() -> Type {
    example_schema().managed_resource_types["example_instance"]
        .content
        .implied_type()
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| d.to_string()).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "Expected at least one error, but got none"
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| d.is_error() && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ManagedResourceType as _, Provider};
    use crate::types::{Config, ManagedResourceApplyRequest, ManagedResourcePlanRequest};

    #[test]
    fn test_call_log_is_shared() {
        let log = CallLog::default();
        let handle = log.clone();
        log.record("Configure");
        log.record("ReadResource");
        log.record("ReadResource");

        assert_eq!(handle.names(), vec!["Configure", "ReadResource", "ReadResource"]);
        assert_eq!(handle.count("ReadResource"), 2);
        assert!(!handle.contains("Stop"));
    }

    #[test]
    fn test_schema_response_round_trips() {
        let response = v6::schema_response(&example_schema());
        assert_eq!(response.resource_schemas["example_instance"].version, 1);
        let block = response.resource_schemas["example_instance"].block.clone().unwrap();
        let names: Vec<_> = block.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["ami", "id", "instance_type"]);
        assert_eq!(block.block_types[0].type_name, "ebs_volume");
    }

    #[test]
    fn test_example_instance_conforms() {
        let block = &example_schema().managed_resource_types["example_instance"].content;
        assert!(crate::codec::encode_dynamic_value(&example_instance(), block).is_ok());
        assert!(!example_instance_type().has_dynamic_types());
    }

    #[test]
    fn test_assert_helpers() {
        let diags = vec![
            Diagnostic::warning("Deprecated attribute"),
            Diagnostic::error("Invalid region").with_detail("us-nowhere-1 does not exist"),
        ];
        assert_has_errors(&diags);
        assert_error_contains(&diags, "region");
        assert_no_errors(&diags[..1]);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_panics() {
        assert_no_errors(&[Diagnostic::error("boom")]);
    }

    /// Drive the same create lifecycle through both protocol adapters
    /// behind the protocol-independent trait.
    async fn create_lifecycle(provider: Box<dyn Provider>) {
        let (config, diags) = provider
            .prepare_config(Value::object([("region", Value::string("us-east-1"))]))
            .await;
        assert_no_errors(&diags);
        assert_no_errors(&provider.configure(&config).await);

        let rt = provider.managed_resource_type("example_instance").unwrap();
        assert_no_errors(&rt.validate_config(&example_instance()).await);

        let (plan, diags) = rt
            .plan(ManagedResourcePlanRequest::new(
                Value::Null,
                example_instance(),
                example_instance(),
            ))
            .await;
        assert_no_errors(&diags);

        let (applied, diags) = rt
            .apply(
                ManagedResourceApplyRequest::new(Value::Null, plan.planned_state, example_instance())
                    .with_planned_private(plan.planned_private),
            )
            .await;
        assert_no_errors(&diags);
        assert_eq!(applied.new_state, example_instance());
        assert_eq!(applied.private, b"planned".to_vec());

        assert_no_errors(&provider.stop().await);
        provider.close();
    }

    #[tokio::test]
    async fn test_lifecycle_v5() {
        let mock = MockProviderV5::with_schema(example_schema())
            .on_plan_resource_change(|req| {
                Ok(tfplugin5::plan_resource_change::Response {
                    planned_state: req.proposed_new_state,
                    planned_private: b"planned".to_vec(),
                    ..Default::default()
                })
            })
            .on_apply_resource_change(|req| {
                Ok(tfplugin5::apply_resource_change::Response {
                    new_state: req.planned_state,
                    private: req.planned_private,
                    ..Default::default()
                })
            });
        let calls = mock.calls();
        let provider = protocol5::Provider::new(mock).await.unwrap();

        create_lifecycle(Box::new(provider)).await;
        assert_eq!(
            calls.names(),
            vec![
                "GetSchema",
                "PrepareProviderConfig",
                "Configure",
                "ValidateResourceTypeConfig",
                "PlanResourceChange",
                "ApplyResourceChange",
                "Stop",
            ]
        );
    }

    #[tokio::test]
    async fn test_lifecycle_v6() {
        let mock = MockProviderV6::with_schema(example_schema())
            .on_plan_resource_change(|req| {
                Ok(tfplugin6::plan_resource_change::Response {
                    planned_state: req.proposed_new_state,
                    planned_private: b"planned".to_vec(),
                    ..Default::default()
                })
            })
            .on_apply_resource_change(|req| {
                Ok(tfplugin6::apply_resource_change::Response {
                    new_state: req.planned_state,
                    private: req.planned_private,
                    ..Default::default()
                })
            });
        let calls = mock.calls();
        let provider = protocol6::Provider::new(mock).await.unwrap();

        create_lifecycle(Box::new(provider)).await;
        assert_eq!(
            calls.names(),
            vec![
                "GetProviderSchema",
                "ConfigureProvider",
                "ValidateResourceConfig",
                "PlanResourceChange",
                "ApplyResourceChange",
                "StopProvider",
            ]
        );
    }

    #[tokio::test]
    async fn test_resource_type_lookup_makes_no_rpc() {
        let mock = MockProviderV6::with_schema(example_schema());
        let calls = mock.calls();
        let provider = protocol6::Provider::new(mock).await.unwrap();

        assert!(provider.managed_resource_type("example_instance").is_err());
        provider.configure(&Config::new(Value::Null)).await;
        assert!(provider.managed_resource_type("example_nothing").is_err());
        assert_eq!(calls.names(), vec!["GetProviderSchema", "ConfigureProvider"]);
    }
}
