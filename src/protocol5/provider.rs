//! The protocol 5 provider adapter.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::client::{GrpcClient, ProviderRpc};
use super::convert;
use super::data_resource_type::DataResourceType;
use super::managed_resource_type::ManagedResourceType;
use crate::codec;
use crate::connection::ProtocolVersion;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ClientError;
use crate::provider::{self, ConfigState};
use crate::schema::Schema;
use crate::tfplugin5 as wire;
use crate::types::Config;
use crate::value::Value;

/// A provider speaking plugin protocol version 5.
///
/// Besides the common [`provider::Provider`] operations, protocol 5 has a
/// remote config-preparation step and provider-level validation of resource
/// configurations.
pub struct Provider<C = GrpcClient> {
    rpc: Arc<C>,
    schema: Arc<Schema>,
    state: ConfigState,
}

impl<C: ProviderRpc> Provider<C> {
    /// Load the provider's schema and create the adapter.
    pub async fn new(rpc: C) -> Result<Self, ClientError> {
        let schema = convert::load_schema(&rpc).await?;
        Ok(Self {
            rpc: Arc::new(rpc),
            schema: Arc::new(schema),
            state: ConfigState::new(),
        })
    }

    fn managed(&self, type_name: &str) -> Result<ManagedResourceType<C>, ClientError> {
        self.state.require_configured()?;
        let schema = self
            .schema
            .managed_resource_type(type_name)
            .cloned()
            .ok_or_else(|| ClientError::ManagedResourceTypeNotFound(type_name.to_string()))?;
        Ok(ManagedResourceType::new(
            Arc::clone(&self.rpc),
            type_name,
            schema,
            Arc::clone(&self.schema),
        ))
    }

    fn data(&self, type_name: &str) -> Result<DataResourceType<C>, ClientError> {
        self.state.require_configured()?;
        let schema = self
            .schema
            .data_resource_type(type_name)
            .cloned()
            .ok_or_else(|| ClientError::DataResourceTypeNotFound(type_name.to_string()))?;
        Ok(DataResourceType::new(
            Arc::clone(&self.rpc),
            type_name,
            schema,
            Arc::clone(&self.schema),
        ))
    }

    /// Validate a managed resource configuration through the provider.
    ///
    /// Requires a configured provider and a known type name.
    pub async fn validate_managed_resource_config(
        &self,
        type_name: &str,
        config: &Value,
    ) -> Result<Diagnostics, ClientError> {
        let resource_type = self.managed(type_name)?;
        Ok(provider::ManagedResourceType::validate_config(&resource_type, config).await)
    }

    /// Validate a data resource configuration through the provider.
    ///
    /// Requires a configured provider and a known type name.
    pub async fn validate_data_resource_config(
        &self,
        type_name: &str,
        config: &Value,
    ) -> Result<Diagnostics, ClientError> {
        let resource_type = self.data(type_name)?;
        Ok(provider::DataResourceType::validate_config(&resource_type, config).await)
    }

    async fn send_configure(&self, config: &Config) -> Diagnostics {
        let encoded = match codec::encode_dynamic_value(&config.value, &self.schema.provider_config) {
            Ok(encoded) => encoded,
            Err(diags) => return diags,
        };

        let request = wire::configure::Request {
            terraform_version: String::new(),
            config: Some(encoded.into()),
        };
        match self.rpc.configure(request).await {
            Ok(resp) => convert::decode_diagnostics(resp.diagnostics),
            Err(status) => Diagnostics::rpc_error(&status),
        }
    }
}

#[async_trait]
impl<C: ProviderRpc> provider::Provider for Provider<C> {
    fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion::V5
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    #[instrument(skip(self, config), name = "rpc.prepare_provider_config")]
    async fn prepare_config(&self, config: Value) -> (Config, Diagnostics) {
        debug!("PrepareProviderConfig called");
        let encoded = match codec::encode_dynamic_value(&config, &self.schema.provider_config) {
            Ok(encoded) => encoded,
            Err(diags) => return (Config::new(config), diags),
        };

        let request = wire::prepare_provider_config::Request {
            config: Some(encoded.into()),
        };
        let resp = match self.rpc.prepare_provider_config(request).await {
            Ok(resp) => resp,
            Err(status) => return (Config::new(config), Diagnostics::rpc_error(&status)),
        };

        let mut diags = convert::decode_diagnostics(resp.diagnostics);
        let prepared = match resp.prepared_config {
            Some(raw) => {
                let (value, decode_diags) =
                    codec::decode_dynamic_value(&raw.into(), &self.schema.provider_config);
                let failed = decode_diags.has_errors();
                diags.append(decode_diags);
                if failed {
                    config
                } else {
                    value
                }
            },
            None => config,
        };

        diags.log_outcome("PrepareProviderConfig");
        (Config::new(prepared), diags)
    }

    #[instrument(skip(self, config), name = "rpc.configure")]
    async fn configure(&self, config: &Config) -> Diagnostics {
        debug!("Configure called");
        let diags = self
            .state
            .configure_with(|| self.send_configure(config))
            .await;
        diags.log_outcome("Configure");
        diags
    }

    fn is_configured(&self) -> bool {
        self.state.is_configured()
    }

    fn managed_resource_type(
        &self,
        name: &str,
    ) -> Result<Box<dyn provider::ManagedResourceType>, ClientError> {
        Ok(Box::new(self.managed(name)?))
    }

    fn data_resource_type(
        &self,
        name: &str,
    ) -> Result<Box<dyn provider::DataResourceType>, ClientError> {
        Ok(Box::new(self.data(name)?))
    }

    #[instrument(skip(self), name = "rpc.stop")]
    async fn stop(&self) -> Diagnostics {
        debug!("Stop called");
        let diags: Diagnostics = match self.rpc.stop(wire::stop::Request {}).await {
            Ok(resp) if resp.error.is_empty() => Diagnostics::new(),
            Ok(resp) => Diagnostic::error("Provider failed to stop")
                .with_detail(resp.error)
                .into(),
            Err(status) => Diagnostics::rpc_error(&status),
        };
        diags.log_outcome("Stop");
        diags
    }

    fn close(self: Box<Self>) {
        debug!("Closing protocol 5 provider connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RPC_ERROR_SUMMARY;
    use crate::provider::{DataResourceType as _, ManagedResourceType as _, Provider as _};
    use crate::testing::{self, MockProviderV5};
    use crate::value::Type;

    fn config() -> Value {
        Value::object([("region", Value::string("us-east-1"))])
    }

    async fn provider(mock: MockProviderV5) -> Provider<MockProviderV5> {
        Provider::new(mock).await.unwrap()
    }

    #[tokio::test]
    async fn test_schema_loaded_at_construction() {
        let mock = MockProviderV5::with_schema(testing::example_schema());
        let calls = mock.calls();
        let p = provider(mock).await;

        assert_eq!(calls.names(), vec!["GetSchema"]);
        assert_eq!(p.protocol_version(), ProtocolVersion::V5);
        assert!(p.schema().managed_resource_type("example_instance").is_some());
        assert_eq!(
            p.schema().provider_config.implied_type(),
            Type::object([("region", Type::String)])
        );
    }

    #[tokio::test]
    async fn test_schema_errors_fail_construction() {
        let mock = MockProviderV5::with_schema(testing::example_schema()).on_get_schema(|_| {
            Ok(wire::get_provider_schema::Response {
                diagnostics: vec![testing::wire_error_v5("credentials missing")],
                ..Default::default()
            })
        });
        let err = Provider::new(mock).await.err().unwrap();
        assert!(matches!(err, ClientError::SchemaUnavailable(_)));
    }

    #[tokio::test]
    async fn test_prepare_config_round_trip() {
        let schema = testing::example_schema();
        let normalized = Value::object([("region", Value::string("us-west-2"))]);
        let prepared = testing::dynamic_value_v5(&normalized, &schema.provider_config);
        let mock = MockProviderV5::with_schema(schema).on_prepare_provider_config(move |req| {
            assert!(req.config.is_some());
            Ok(wire::prepare_provider_config::Response {
                prepared_config: Some(prepared.clone()),
                diagnostics: vec![],
            })
        });
        let p = provider(mock).await;

        let (cfg, diags) = p.prepare_config(config()).await;
        assert!(diags.is_empty());
        assert_eq!(cfg.value, normalized);
    }

    #[tokio::test]
    async fn test_prepare_config_without_result_keeps_input() {
        let p = provider(MockProviderV5::with_schema(testing::example_schema())).await;
        let (cfg, diags) = p.prepare_config(config()).await;
        assert!(diags.is_empty());
        assert_eq!(cfg.value, config());
    }

    #[tokio::test]
    async fn test_prepare_config_encode_failure_skips_rpc() {
        let mock = MockProviderV5::with_schema(testing::example_schema());
        let calls = mock.calls();
        let p = provider(mock).await;

        let (_, diags) = p.prepare_config(Value::object([("bogus", Value::from(true))])).await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Invalid object");
        assert!(!calls.contains("PrepareProviderConfig"));
    }

    #[tokio::test]
    async fn test_resource_types_require_configure() {
        let mock = MockProviderV5::with_schema(testing::example_schema());
        let calls = mock.calls();
        let p = provider(mock).await;

        assert!(matches!(
            p.managed_resource_type("example_instance").err(),
            Some(ClientError::NotConfigured)
        ));
        assert!(matches!(
            p.data_resource_type("example_image").err(),
            Some(ClientError::NotConfigured)
        ));
        assert!(matches!(
            p.validate_managed_resource_config("example_instance", &Value::Null).await,
            Err(ClientError::NotConfigured)
        ));
        assert_eq!(calls.names(), vec!["GetSchema"]);
    }

    #[tokio::test]
    async fn test_configure_then_lookup() {
        let p = provider(MockProviderV5::with_schema(testing::example_schema())).await;

        let diags = p.configure(&Config::new(config())).await;
        assert!(!diags.has_errors());
        assert!(p.is_configured());

        let rt = p.managed_resource_type("example_instance").unwrap();
        assert_eq!(rt.type_name(), "example_instance");
        assert!(matches!(
            p.managed_resource_type("example_nope").err(),
            Some(ClientError::ManagedResourceTypeNotFound(name)) if name == "example_nope"
        ));
        assert!(matches!(
            p.data_resource_type("example_instance").err(),
            Some(ClientError::DataResourceTypeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_configure_twice() {
        let mock = MockProviderV5::with_schema(testing::example_schema());
        let calls = mock.calls();
        let p = provider(mock).await;

        assert!(!p.configure(&Config::new(config())).await.has_errors());
        let diags = p.configure(&Config::new(config())).await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Provider already configured");
        assert_eq!(calls.count("Configure"), 1);
    }

    #[tokio::test]
    async fn test_configure_failure_allows_retry() {
        let mock = MockProviderV5::with_schema(testing::example_schema()).on_configure(|req| {
            let raw = req.config.unwrap_or_default();
            let block = testing::example_schema().provider_config;
            let (value, _) = codec::decode_dynamic_value(&raw.into(), &block);
            let diagnostics = if value.get_attr("region") == Some(&Value::string("mars")) {
                vec![testing::wire_error_v5("unknown region")]
            } else {
                vec![]
            };
            Ok(wire::configure::Response { diagnostics })
        });
        let p = provider(mock).await;

        let bad = Config::new(Value::object([("region", Value::string("mars"))]));
        let diags = p.configure(&bad).await;
        assert!(diags.has_errors());
        assert!(!p.is_configured());

        let diags = p.configure(&Config::new(config())).await;
        assert!(!diags.has_errors());
        assert!(p.is_configured());
    }

    #[tokio::test]
    async fn test_concurrent_configure() {
        let p = Arc::new(provider(MockProviderV5::with_schema(testing::example_schema())).await);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let p = Arc::clone(&p);
            handles.push(tokio::spawn(async move {
                p.configure(&Config::new(config())).await
            }));
        }

        let mut successes = 0;
        let mut already = 0;
        for handle in handles {
            let diags = handle.await.unwrap();
            if diags.has_errors() {
                assert_eq!(diags[0].summary, "Provider already configured");
                already += 1;
            } else {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(already, 4);
    }

    #[tokio::test]
    async fn test_configure_rpc_failure() {
        let mock = MockProviderV5::with_schema(testing::example_schema())
            .on_configure(|_| Err(tonic::Status::unavailable("plugin exited")));
        let p = provider(mock).await;

        let diags = p.configure(&Config::new(config())).await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, RPC_ERROR_SUMMARY);
        assert!(!p.is_configured());
    }

    #[tokio::test]
    async fn test_provider_level_validation() {
        let mock = MockProviderV5::with_schema(testing::example_schema())
            .on_validate_resource_type_config(|req| {
                assert_eq!(req.type_name, "example_instance");
                Ok(wire::validate_resource_type_config::Response {
                    diagnostics: vec![testing::wire_error_v5("ami is required")],
                })
            });
        let calls = mock.calls();
        let p = provider(mock).await;
        p.configure(&Config::new(config())).await;

        let diags = p
            .validate_managed_resource_config("example_instance", &testing::example_instance())
            .await
            .unwrap();
        assert!(diags.has_errors());
        assert_eq!(calls.count("ValidateResourceTypeConfig"), 1);

        let diags = p
            .validate_data_resource_config("example_image", &testing::example_image_config())
            .await
            .unwrap();
        assert!(!diags.has_errors());
        assert!(matches!(
            p.validate_data_resource_config("example_nope", &Value::Null).await,
            Err(ClientError::DataResourceTypeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stop() {
        let mock = MockProviderV5::with_schema(testing::example_schema()).on_stop(|_| {
            Ok(wire::stop::Response {
                error: "still busy".to_string(),
            })
        });
        let p = provider(mock).await;

        let diags = p.stop().await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].detail.as_deref(), Some("still busy"));
    }
}
