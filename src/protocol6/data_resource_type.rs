use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::client::ProviderRpc;
use super::convert;
use crate::codec;
use crate::diagnostics::Diagnostics;
use crate::provider;
use crate::schema::{DataResourceTypeSchema, Schema};
use crate::tfplugin6 as wire;
use crate::types::{DataResourceReadRequest, DataResourceReadResponse};
use crate::value::Value;

/// A data resource type served over protocol 6.
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

    #[instrument(skip(self, config), fields(type_name = %self.type_name), name = "rpc.validate_data_resource_config")]
    async fn validate_config(&self, config: &Value) -> Diagnostics {
        debug!("ValidateDataResourceConfig called");
        let config = match codec::encode_dynamic_value(config, &self.schema.content) {
            Ok(config) => config,
            Err(diags) => return diags,
        };

        let request = wire::validate_data_resource_config::Request {
            type_name: self.type_name.clone(),
            config: Some(config.into()),
        };
        let diags = match self.rpc.validate_data_resource_config(request).await {
            Ok(resp) => convert::decode_diagnostics(resp.diagnostics),
            Err(status) => Diagnostics::rpc_error(&status),
        };
        diags.log_outcome("ValidateDataResourceConfig");
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
