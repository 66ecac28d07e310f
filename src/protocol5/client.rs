//! The transport seam for protocol version 5.

use async_trait::async_trait;
use tonic::transport::Channel;
use tonic::Status;

use crate::connection::CallPolicy;
use crate::tfplugin5 as wire;
use crate::tfplugin5::provider_client::ProviderClient;

/// One method per protocol 5 RPC.
///
/// [`GrpcClient`] is the production implementation;
/// [`MockProviderV5`](crate::testing::MockProviderV5) lets the adapter be
/// exercised without a plugin process.
#[async_trait]
pub trait ProviderRpc: Send + Sync + 'static {
    /// `GetSchema`
    async fn get_schema(
        &self,
        request: wire::get_provider_schema::Request,
    ) -> Result<wire::get_provider_schema::Response, Status>;

    /// `PrepareProviderConfig`
    async fn prepare_provider_config(
        &self,
        request: wire::prepare_provider_config::Request,
    ) -> Result<wire::prepare_provider_config::Response, Status>;

    /// `ValidateResourceTypeConfig`
    async fn validate_resource_type_config(
        &self,
        request: wire::validate_resource_type_config::Request,
    ) -> Result<wire::validate_resource_type_config::Response, Status>;

    /// `ValidateDataSourceConfig`
    async fn validate_data_source_config(
        &self,
        request: wire::validate_data_source_config::Request,
    ) -> Result<wire::validate_data_source_config::Response, Status>;

    /// `UpgradeResourceState`
    async fn upgrade_resource_state(
        &self,
        request: wire::upgrade_resource_state::Request,
    ) -> Result<wire::upgrade_resource_state::Response, Status>;

    /// `Configure`
    async fn configure(
        &self,
        request: wire::configure::Request,
    ) -> Result<wire::configure::Response, Status>;

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

    /// `Stop`
    async fn stop(&self, request: wire::stop::Request) -> Result<wire::stop::Response, Status>;
}

/// The tonic client for protocol 5, with every call run under a [`CallPolicy`].
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
    async fn get_schema(
        &self,
        request: wire::get_provider_schema::Request,
    ) -> Result<wire::get_provider_schema::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.get_schema(request)).await?;
        Ok(response.into_inner())
    }

    async fn prepare_provider_config(
        &self,
        request: wire::prepare_provider_config::Request,
    ) -> Result<wire::prepare_provider_config::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.prepare_provider_config(request)).await?;
        Ok(response.into_inner())
    }

    async fn validate_resource_type_config(
        &self,
        request: wire::validate_resource_type_config::Request,
    ) -> Result<wire::validate_resource_type_config::Response, Status> {
        let mut client = self.inner.clone();
        let response = self
            .policy
            .run(client.validate_resource_type_config(request))
            .await?;
        Ok(response.into_inner())
    }

    async fn validate_data_source_config(
        &self,
        request: wire::validate_data_source_config::Request,
    ) -> Result<wire::validate_data_source_config::Response, Status> {
        let mut client = self.inner.clone();
        let response = self
            .policy
            .run(client.validate_data_source_config(request))
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

    async fn configure(
        &self,
        request: wire::configure::Request,
    ) -> Result<wire::configure::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.configure(request)).await?;
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

    async fn stop(&self, request: wire::stop::Request) -> Result<wire::stop::Response, Status> {
        let mut client = self.inner.clone();
        let response = self.policy.run(client.stop(request)).await?;
        Ok(response.into_inner())
    }
}
