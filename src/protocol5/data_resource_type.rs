use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::client::ProviderRpc;
use super::convert;
use crate::codec;
use crate::diagnostics::Diagnostics;
use crate::provider;
use crate::schema::{DataResourceTypeSchema, Schema};
use crate::tfplugin5 as wire;
use crate::types::{DataResourceReadRequest, DataResourceReadResponse};
use crate::value::Value;

/// A data resource type served over protocol 5.
pub struct DataResourceType<C> {
    rpc: Arc<C>,
    type_name: String,
    schema: Arc<DataResourceTypeSchema>,
    provider_schema: Arc<Schema>,
}

impl<C: ProviderRpc> DataResourceType<C> {
    pub(crate) fn new(
        rpc: Arc<C>,
        type_name: &str,
        schema: Arc<DataResourceTypeSchema>,
        provider_schema: Arc<Schema>,
    ) -> Self {
        Self {
            rpc,
            type_name: type_name.to_string(),
            schema,
            provider_schema,
        }
    }
}

#[async_trait]
impl<C: ProviderRpc> provider::DataResourceType for DataResourceType<C> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn schema(&self) -> &DataResourceTypeSchema {
        &self.schema
    }

    #[instrument(skip(self, config), fields(type_name = %self.type_name), name = "rpc.validate_data_source_config")]
    async fn validate_config(&self, config: &Value) -> Diagnostics {
        debug!("ValidateDataSourceConfig called");
        let config = match codec::encode_dynamic_value(config, &self.schema.content) {
            Ok(config) => config,
            Err(diags) => return diags,
        };

        let request = wire::validate_data_source_config::Request {
            type_name: self.type_name.clone(),
            config: Some(config.into()),
        };
        let diags = match self.rpc.validate_data_source_config(request).await {
            Ok(resp) => convert::decode_diagnostics(resp.diagnostics),
            Err(status) => Diagnostics::rpc_error(&status),
        };
        diags.log_outcome("ValidateDataSourceConfig");
        diags
    }

    #[instrument(skip(self, request), fields(type_name = %self.type_name), name = "rpc.read_data_source")]
    async fn read(&self, request: DataResourceReadRequest) -> (DataResourceReadResponse, Diagnostics) {
        debug!("ReadDataSource called");
        let encoded = codec::encode_dynamic_value(&request.config, &self.schema.content).and_then(|config| {
            let meta = codec::encode_provider_meta(
                request.provider_meta.as_ref(),
                self.provider_schema.provider_meta.as_ref(),
            )?;
            Ok((config, meta))
        });
        let (config, provider_meta) = match encoded {
            Ok(encoded) => encoded,
            Err(diags) => return (Default::default(), diags),
        };

        let request = wire::read_data_source::Request {
            type_name: self.type_name.clone(),
            config: Some(config.into()),
            provider_meta: provider_meta.map(Into::into),
        };
        let resp = match self.rpc.read_data_source(request).await {
            Ok(resp) => resp,
            Err(status) => return (Default::default(), Diagnostics::rpc_error(&status)),
        };

        let mut diags = convert::decode_diagnostics(resp.diagnostics);
        let (state, decode_diags) =
            codec::decode_optional(resp.state.map(Into::into), &self.schema.content);
        diags.append(decode_diags);
        diags.log_outcome("ReadDataSource");
        (DataResourceReadResponse { state }, diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol5::Provider;
    use crate::provider::{DataResourceType as _, Provider as _};
    use crate::testing::{self, MockProviderV5};
    use crate::types::Config;

    async fn image_type(mock: MockProviderV5) -> Box<dyn provider::DataResourceType> {
        let provider = Provider::new(mock).await.unwrap();
        provider.configure(&Config::new(Value::Null)).await;
        provider.data_resource_type("example_image").unwrap()
    }

    #[tokio::test]
    async fn test_read_data_source() {
        let schema = testing::example_schema();
        let content = schema.data_resource_types["example_image"].content.clone();
        let state = Value::object([
            ("name", Value::string("ubuntu")),
            ("id", Value::string("ami-42")),
        ]);
        let encoded = testing::dynamic_value_v5(&state, &content);
        let mock = MockProviderV5::with_schema(schema).on_read_data_source(move |req| {
            assert_eq!(req.type_name, "example_image");
            assert!(req.provider_meta.is_none());
            Ok(wire::read_data_source::Response {
                state: Some(encoded.clone()),
                diagnostics: vec![testing::wire_warning_v5("image is old")],
            })
        });
        let dt = image_type(mock).await;

        let (resp, diags) = dt
            .read(DataResourceReadRequest::new(testing::example_image_config()))
            .await;
        assert_eq!(diags.len(), 1);
        assert!(!diags.has_errors());
        assert_eq!(resp.state, state);
    }

    #[tokio::test]
    async fn test_read_data_source_json_response() {
        let mock = MockProviderV5::with_schema(testing::example_schema()).on_read_data_source(|_| {
            Ok(wire::read_data_source::Response {
                state: Some(wire::DynamicValue {
                    msgpack: Vec::new(),
                    json: br#"{"name": "debian", "id": "ami-7"}"#.to_vec(),
                }),
                diagnostics: vec![],
            })
        });
        let dt = image_type(mock).await;

        let (resp, diags) = dt
            .read(DataResourceReadRequest::new(testing::example_image_config()))
            .await;
        assert!(diags.is_empty());
        assert_eq!(resp.state.get_attr("id"), Some(&Value::string("ami-7")));
    }

    #[tokio::test]
    async fn test_validate_config_encode_failure() {
        let mock = MockProviderV5::with_schema(testing::example_schema());
        let calls = mock.calls();
        let dt = image_type(mock).await;

        let diags = dt.validate_config(&Value::from("not an object")).await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Invalid object");
        assert!(!calls.contains("ValidateDataSourceConfig"));
    }
}
