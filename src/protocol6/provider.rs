//! The protocol 6 provider adapter.

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
use crate::tfplugin6 as wire;
use crate::types::Config;
use crate::value::Value;

/// A provider speaking plugin protocol version 6.
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

    async fn send_configure(&self, config: &Config) -> Diagnostics {
        let encoded = match codec::encode_dynamic_value(&config.value, &self.schema.provider_config) {
            Ok(encoded) => encoded,
            Err(diags) => return diags,
        };

        let request = wire::configure_provider::Request {
            terraform_version: String::new(),
            config: Some(encoded.into()),
        };
        match self.rpc.configure_provider(request).await {
            Ok(resp) => convert::decode_diagnostics(resp.diagnostics),
            Err(status) => Diagnostics::rpc_error(&status),
        }
    }
}

#[async_trait]
impl<C: ProviderRpc> provider::Provider for Provider<C> {
    fn protocol_version(&self) -> ProtocolVersion {
        ProtocolVersion::V6
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Protocol 6 has no preparation RPC. The value is only checked against
    /// the provider config schema and returned unchanged.
    #[instrument(skip(self, config), name = "rpc.prepare_config")]
    async fn prepare_config(&self, config: Value) -> (Config, Diagnostics) {
        debug!("Preparing provider config locally");
        let diags = match codec::encode_dynamic_value(&config, &self.schema.provider_config) {
            Ok(_) => Diagnostics::new(),
            Err(diags) => diags,
        };
        diags.log_outcome("PrepareConfig");
        (Config::new(config), diags)
    }

    #[instrument(skip(self, config), name = "rpc.configure_provider")]
    async fn configure(&self, config: &Config) -> Diagnostics {
        debug!("ConfigureProvider called");
        let diags = self
            .state
            .configure_with(|| self.send_configure(config))
            .await;
        diags.log_outcome("ConfigureProvider");
        diags
    }

    fn is_configured(&self) -> bool {
        self.state.is_configured()
    }

    fn managed_resource_type(
        &self,
        name: &str,
    ) -> Result<Box<dyn provider::ManagedResourceType>, ClientError> {
        self.state.require_configured()?;
        let schema = self
            .schema
            .managed_resource_type(name)
            .cloned()
            .ok_or_else(|| ClientError::ManagedResourceTypeNotFound(name.to_string()))?;
        Ok(Box::new(ManagedResourceType::new(
            Arc::clone(&self.rpc),
            name,
            schema,
            Arc::clone(&self.schema),
        )))
    }

    fn data_resource_type(
        &self,
        name: &str,
    ) -> Result<Box<dyn provider::DataResourceType>, ClientError> {
        self.state.require_configured()?;
        let schema = self
            .schema
            .data_resource_type(name)
            .cloned()
            .ok_or_else(|| ClientError::DataResourceTypeNotFound(name.to_string()))?;
        Ok(Box::new(DataResourceType::new(
            Arc::clone(&self.rpc),
            name,
            schema,
            Arc::clone(&self.schema),
        )))
    }

    #[instrument(skip(self), name = "rpc.stop_provider")]
    async fn stop(&self) -> Diagnostics {
        debug!("StopProvider called");
        let diags: Diagnostics = match self.rpc.stop_provider(wire::stop_provider::Request {}).await {
            Ok(resp) if resp.error.is_empty() => Diagnostics::new(),
            Ok(resp) => Diagnostic::error("Provider failed to stop")
                .with_detail(resp.error)
                .into(),
            Err(status) => Diagnostics::rpc_error(&status),
        };
        diags.log_outcome("StopProvider");
        diags
    }

    fn close(self: Box<Self>) {
        debug!("Closing protocol 6 provider connection");
    }
}
