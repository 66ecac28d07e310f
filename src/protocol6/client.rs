//! The transport seam for protocol version 6.

use async_trait::async_trait;
use tonic::transport::Channel;
use tonic::Status;

use crate::connection::CallPolicy;
use crate::tfplugin6 as wire;
use crate::tfplugin6::provider_client::ProviderClient;

/// One method per protocol 6 RPC.
///
/// [`GrpcClient`] is the production implementation;
/// [`MockProviderV6`](crate::testing::MockProviderV6) lets the adapter be
/// exercised without a plugin process.
#[async_trait]
pub trait ProviderRpc: Send + Sync + 'static {
    /// `GetProviderSchema`
    async fn get_provider_schema(
        &self,
        request: wire::get_provider_schema::Request,
    ) -> Result<wire::get_provider_schema::Response, Status>;

    /// `ValidateResourceConfig`
    async fn validate_resource_config(
        &self,
        request: wire::validate_resource_config::Request,
    ) -> Result<wire::validate_resource_config::Response, Status>;

    /// `ValidateDataResourceConfig`
    async fn validate_data_resource_config(
        &self,
        request: wire::validate_data_resource_config::Request,
    ) -> Result<wire::validate_data_resource_config::Response, Status>;

    /// `UpgradeResourceState`
    async fn upgrade_resource_state(
        &self,
        request: wire::upgrade_resource_state::Request,
    ) -> Result<wire::upgrade_resource_state::Response, Status>;

    /// `ConfigureProvider`
    async fn configure_provider(
        &self,
        request: wire::configure_provider::Request,
    ) -> Result<wire::configure_provider::Response, Status>;

    /// `ReadResource`
    async fn read_resource(
        &self,
        request: wire::read_resource::Request,
    ) -> Result<wire::read_resource::Response, Status>;

    /// `PlanResourceChange`
    async fn plan_resource_change(
        &self,
        request: wire::plan_resource_change::Request,
    ) -> Result<wire::plan_resource_change::Response, Status>;

    /// `ApplyResourceChange`
    async fn apply_resource_change(
        &self,
        request: wire::apply_resource_change::Request,
    ) -> Result<wire::apply_resource_change::Response, Status>;

    /// `ImportResourceState`
    async fn import_resource_state(
        &self,
        request: wire::import_resource_state::Request,
    ) -> Result<wire::import_resource_state::Response, Status>;

    /// `ReadDataSource`
    async fn read_data_source(
        &self,
        request: wire::read_data_source::Request,
    ) -> Result<wire::read_data_source::Response, Status>;

    /// `StopProvider`
    async fn stop_provider(
        &self,
        request: wire::stop_provider::Request,
    ) -> Result<wire::stop_provider::Response, Status>;
}

/// The tonic client for protocol 6, with every call run under a [`CallPolicy`].
#[derive(Debug, Clone)]
pub struct GrpcClient {
    inner: ProviderClient<Channel>,
    policy: CallPolicy,
}

impl GrpcClient {
    /// Create a client over an established channel.
    pub fn new(channel: Channel, policy: CallPolicy) -> Self {
        Self {
            inner: ProviderClient::new(channel),
            policy,
        }
    }
}

#[async_trait]
impl ProviderRpc for GrpcClient {
    async fn get_provider_schema(
        &self,
        request: wire::get_provider_schema::Request,
    ) -> Result<wire::get_provider_schema::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.get_provider_schema(request)).await?;
        Ok(response.into_inner())
    }

    async fn validate_resource_config(
        &self,
        request: wire::validate_resource_config::Request,
    ) -> Result<wire::validate_resource_config::Response, Status> {
        let mut client = self.inner.clone();
        let response = self
            .policy
            .run(client.validate_resource_config(request))
            .await?;
        Ok(response.into_inner())
    }

    async fn validate_data_resource_config(
        &self,
        request: wire::validate_data_resource_config::Request,
    ) -> Result<wire::validate_data_resource_config::Response, Status> {
        let mut client = self.inner.clone();
        let response = self
            .policy
            .run(client.validate_data_resource_config(request))
            .await?;
        Ok(response.into_inner())
    }

    async fn upgrade_resource_state(
        &self,
        request: wire::upgrade_resource_state::Request,
    ) -> Result<wire::upgrade_resource_state::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.upgrade_resource_state(request)).await?;
        Ok(response.into_inner())
    }

    async fn configure_provider(
        &self,
        request: wire::configure_provider::Request,
    ) -> Result<wire::configure_provider::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.configure_provider(request)).await?;
        Ok(response.into_inner())
    }

    async fn read_resource(
        &self,
        request: wire::read_resource::Request,
    ) -> Result<wire::read_resource::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.read_resource(request)).await?;
        Ok(response.into_inner())
    }

    async fn plan_resource_change(
        &self,
        request: wire::plan_resource_change::Request,
    ) -> Result<wire::plan_resource_change::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.plan_resource_change(request)).await?;
        Ok(response.into_inner())
    }

    async fn apply_resource_change(
        &self,
        request: wire::apply_resource_change::Request,
    ) -> Result<wire::apply_resource_change::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.apply_resource_change(request)).await?;
        Ok(response.into_inner())
    }

    async fn import_resource_state(
        &self,
        request: wire::import_resource_state::Request,
    ) -> Result<wire::import_resource_state::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.import_resource_state(request)).await?;
        Ok(response.into_inner())
    }

    async fn read_data_source(
        &self,
        request: wire::read_data_source::Request,
    ) -> Result<wire::read_data_source::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.read_data_source(request)).await?;
        Ok(response.into_inner())
    }

    async fn stop_provider(
        &self,
        request: wire::stop_provider::Request,
    ) -> Result<wire::stop_provider::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.stop_provider(request)).await?;
        Ok(response.into_inner())
    }
}
