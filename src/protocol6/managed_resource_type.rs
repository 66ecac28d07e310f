use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::client::ProviderRpc;
use super::convert;
use crate::codec;
use crate::diagnostics::Diagnostics;
use crate::provider::{self, decode_imported_resource};
use crate::schema::{ManagedResourceTypeSchema, Schema};
use crate::tfplugin6 as wire;
use crate::types::{
    ManagedResourceApplyRequest, ManagedResourceApplyResponse, ManagedResourceImportRequest,
    ManagedResourceImportResponse, ManagedResourcePlanRequest, ManagedResourcePlanResponse,
    ManagedResourceReadRequest, ManagedResourceReadResponse, ManagedResourceUpgradeRequest,
    ManagedResourceUpgradeResponse,
};
use crate::value::Value;

/// A managed resource type served over protocol 6.
pub struct ManagedResourceType<C> {
    rpc: Arc<C>,
    type_name: String,
    schema: Arc<ManagedResourceTypeSchema>,
    provider_schema: Arc<Schema>,
}

impl<C: ProviderRpc> ManagedResourceType<C> {
    pub(crate) fn new(
        rpc: Arc<C>,
        type_name: &str,
        schema: Arc<ManagedResourceTypeSchema>,
        provider_schema: Arc<Schema>,
    ) -> Self {
        Self {
            rpc,
            type_name: type_name.to_string(),
            schema,
            provider_schema,
        }
    }

    fn encode(&self, value: &Value) -> Result<wire::DynamicValue, Diagnostics> {
        codec::encode_dynamic_value(value, &self.schema.content).map(Into::into)
    }

    fn encode_meta(&self, meta: Option<&Value>) -> Result<Option<wire::DynamicValue>, Diagnostics> {
        codec::encode_provider_meta(meta, self.provider_schema.provider_meta.as_ref())
            .map(|encoded| encoded.map(Into::into))
    }

    fn read_request(
        &self,
        request: ManagedResourceReadRequest,
    ) -> Result<wire::read_resource::Request, Diagnostics> {
        Ok(wire::read_resource::Request {
            type_name: self.type_name.clone(),
            current_state: Some(self.encode(&request.current_state)?),
            private: request.private,
            provider_meta: self.encode_meta(request.provider_meta.as_ref())?,
        })
    }

    fn plan_request(
        &self,
        request: ManagedResourcePlanRequest,
    ) -> Result<wire::plan_resource_change::Request, Diagnostics> {
        Ok(wire::plan_resource_change::Request {
            type_name: self.type_name.clone(),
            prior_state: Some(self.encode(&request.prior_state)?),
            proposed_new_state: Some(self.encode(&request.proposed_new_state)?),
            config: Some(self.encode(&request.config)?),
            prior_private: request.prior_private,
            provider_meta: self.encode_meta(request.provider_meta.as_ref())?,
        })
    }

    fn apply_request(
        &self,
        request: ManagedResourceApplyRequest,
    ) -> Result<wire::apply_resource_change::Request, Diagnostics> {
        Ok(wire::apply_resource_change::Request {
            type_name: self.type_name.clone(),
            prior_state: Some(self.encode(&request.prior_state)?),
            planned_state: Some(self.encode(&request.planned_state)?),
            config: Some(self.encode(&request.config)?),
            planned_private: request.planned_private,
            provider_meta: self.encode_meta(request.provider_meta.as_ref())?,
        })
    }

    fn decode(&self, raw: Option<wire::DynamicValue>, diags: &mut Diagnostics) -> Value {
        let (value, decode_diags) = codec::decode_optional(raw.map(Into::into), &self.schema.content);
        diags.append(decode_diags);
        value
    }
}

#[async_trait]
impl<C: ProviderRpc> provider::ManagedResourceType for ManagedResourceType<C> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn schema(&self) -> &ManagedResourceTypeSchema {
        &self.schema
    }

    #[instrument(skip(self, config), fields(type_name = %self.type_name), name = "rpc.validate_resource_config")]
    async fn validate_config(&self, config: &Value) -> Diagnostics {
        debug!("ValidateResourceConfig called");
        let config = match self.encode(config) {
            Ok(config) => config,
            Err(diags) => return diags,
        };

        let request = wire::validate_resource_config::Request {
            type_name: self.type_name.clone(),
            config: Some(config),
        };
        let diags = match self.rpc.validate_resource_config(request).await {
            Ok(resp) => convert::decode_diagnostics(resp.diagnostics),
            Err(status) => Diagnostics::rpc_error(&status),
        };
        diags.log_outcome("ValidateResourceConfig");
        diags
    }

    #[instrument(skip(self, request), fields(type_name = %self.type_name, version = request.version), name = "rpc.upgrade_resource_state")]
    async fn upgrade_state(
        &self,
        request: ManagedResourceUpgradeRequest,
    ) -> (ManagedResourceUpgradeResponse, Diagnostics) {
        debug!("UpgradeResourceState called");
        let request = wire::upgrade_resource_state::Request {
            type_name: self.type_name.clone(),
            version: request.version,
            raw_state: Some(wire::RawState {
                json: request.raw_state_json,
                flatmap: Default::default(),
            }),
        };
        let resp = match self.rpc.upgrade_resource_state(request).await {
            Ok(resp) => resp,
            Err(status) => return (Default::default(), Diagnostics::rpc_error(&status)),
        };

        let mut diags = convert::decode_diagnostics(resp.diagnostics);
        let upgraded_state = self.decode(resp.upgraded_state, &mut diags);
        diags.log_outcome("UpgradeResourceState");
        (ManagedResourceUpgradeResponse { upgraded_state }, diags)
    }

    #[instrument(skip(self, request), fields(type_name = %self.type_name), name = "rpc.read_resource")]
    async fn read(
        &self,
        request: ManagedResourceReadRequest,
    ) -> (ManagedResourceReadResponse, Diagnostics) {
        debug!("ReadResource called");
        let request = match self.read_request(request) {
            Ok(request) => request,
            Err(diags) => return (Default::default(), diags),
        };
        let resp = match self.rpc.read_resource(request).await {
            Ok(resp) => resp,
            Err(status) => return (Default::default(), Diagnostics::rpc_error(&status)),
        };

        let mut diags = convert::decode_diagnostics(resp.diagnostics);
        let new_state = self.decode(resp.new_state, &mut diags);
        diags.log_outcome("ReadResource");
        (
            ManagedResourceReadResponse {
                new_state,
                private: resp.private,
            },
            diags,
        )
    }

    #[instrument(skip(self, request), fields(type_name = %self.type_name), name = "rpc.plan_resource_change")]
    async fn plan(
        &self,
        request: ManagedResourcePlanRequest,
    ) -> (ManagedResourcePlanResponse, Diagnostics) {
        debug!("PlanResourceChange called");
        let request = match self.plan_request(request) {
            Ok(request) => request,
            Err(diags) => return (Default::default(), diags),
        };
        let resp = match self.rpc.plan_resource_change(request).await {
            Ok(resp) => resp,
            Err(status) => return (Default::default(), Diagnostics::rpc_error(&status)),
        };

        let mut diags = convert::decode_diagnostics(resp.diagnostics);
        let planned_state = self.decode(resp.planned_state, &mut diags);
        let requires_replace = resp
            .requires_replace
            .into_iter()
            .map(convert::decode_attribute_path)
            .collect();
        diags.log_outcome("PlanResourceChange");
        (
            ManagedResourcePlanResponse {
                planned_state,
                requires_replace,
                planned_private: resp.planned_private,
                legacy_type_system: resp.legacy_type_system,
            },
            diags,
        )
    }

    #[instrument(skip(self, request), fields(type_name = %self.type_name), name = "rpc.apply_resource_change")]
    async fn apply(
        &self,
        request: ManagedResourceApplyRequest,
    ) -> (ManagedResourceApplyResponse, Diagnostics) {
        debug!("ApplyResourceChange called");
        let request = match self.apply_request(request) {
            Ok(request) => request,
            Err(diags) => return (Default::default(), diags),
        };
        let resp = match self.rpc.apply_resource_change(request).await {
            Ok(resp) => resp,
            Err(status) => return (Default::default(), Diagnostics::rpc_error(&status)),
        };

        let mut diags = convert::decode_diagnostics(resp.diagnostics);
        let new_state = self.decode(resp.new_state, &mut diags);
        diags.log_outcome("ApplyResourceChange");
        (
            ManagedResourceApplyResponse {
                new_state,
                private: resp.private,
                legacy_type_system: resp.legacy_type_system,
            },
            diags,
        )
    }

    #[instrument(skip(self, request), fields(type_name = %self.type_name, id = %request.id), name = "rpc.import_resource_state")]
    async fn import(
        &self,
        request: ManagedResourceImportRequest,
    ) -> (ManagedResourceImportResponse, Diagnostics) {
        debug!("ImportResourceState called");
        let request = wire::import_resource_state::Request {
            type_name: self.type_name.clone(),
            id: request.id,
        };
        let resp = match self.rpc.import_resource_state(request).await {
            Ok(resp) => resp,
            Err(status) => return (Default::default(), Diagnostics::rpc_error(&status)),
        };

        let mut diags = convert::decode_diagnostics(resp.diagnostics);
        let imported = resp
            .imported_resources
            .into_iter()
            .filter_map(|raw| {
                decode_imported_resource(
                    &self.provider_schema,
                    raw.type_name,
                    raw.state.map(Into::into),
                    raw.private,
                    &mut diags,
                )
            })
            .collect();
        diags.log_outcome("ImportResourceState");
        (ManagedResourceImportResponse { imported }, diags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RPC_ERROR_SUMMARY;
    use crate::path::AttributePath;
    use crate::protocol6::Provider;
    use crate::provider::{ManagedResourceType as _, Provider as _};
    use crate::testing::{self, MockProviderV6};
    use crate::tfplugin6::attribute_path::{step::Selector, Step};
    use crate::types::Config;

    async fn instance_type(mock: MockProviderV6) -> Box<dyn provider::ManagedResourceType> {
        let provider = Provider::new(mock).await.unwrap();
        provider.configure(&Config::new(Value::Null)).await;
        provider.managed_resource_type("example_instance").unwrap()
    }

    #[tokio::test]
    async fn test_validate_config_forwards_type_name() {
        let mock = MockProviderV6::with_schema(testing::example_schema()).on_validate_resource_config(|req| {
            assert_eq!(req.type_name, "example_instance");
            assert!(req.config.is_some());
            Ok(wire::validate_resource_config::Response {
                diagnostics: vec![wire::Diagnostic {
                    severity: wire::diagnostic::Severity::Error as i32,
                    summary: "Invalid AMI".to_string(),
                    detail: "AMI IDs start with \"ami-\".".to_string(),
                    attribute: Some(wire::AttributePath {
                        steps: vec![Step {
                            selector: Some(Selector::AttributeName("ami".to_string())),
                        }],
                    }),
                }],
            })
        });
        let rt = instance_type(mock).await;
        assert_eq!(rt.schema().version, 1);

        let diags = rt.validate_config(&testing::example_instance()).await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute, Some(AttributePath::new().attribute("ami")));
    }

    #[tokio::test]
    async fn test_read_resource_gone() {
        let mock = MockProviderV6::with_schema(testing::example_schema()).on_read_resource(|_| {
            Ok(wire::read_resource::Response {
                new_state: None,
                diagnostics: vec![],
                private: Vec::new(),
            })
        });
        let rt = instance_type(mock).await;

        let (resp, diags) = rt.read(ManagedResourceReadRequest::new(testing::example_instance())).await;
        assert!(diags.is_empty());
        assert!(resp.new_state.is_null());
    }

    #[tokio::test]
    async fn test_plan_keeps_state_with_error_diagnostics() {
        let schema = testing::example_schema();
        let content = schema.managed_resource_types["example_instance"].content.clone();
        let planned = testing::dynamic_value_v6(&testing::example_instance(), &content);
        let mock = MockProviderV6::with_schema(schema).on_plan_resource_change(move |_| {
            Ok(wire::plan_resource_change::Response {
                planned_state: Some(planned.clone()),
                diagnostics: vec![testing::wire_error_v6("quota exceeded")],
                ..Default::default()
            })
        });
        let rt = instance_type(mock).await;

        let request = ManagedResourcePlanRequest::new(
            Value::Null,
            testing::example_instance(),
            testing::example_instance(),
        );
        let (resp, diags) = rt.plan(request).await;
        assert!(diags.has_errors());
        assert_eq!(resp.planned_state, testing::example_instance());
        assert!(resp.requires_replace.is_empty());
    }

    #[tokio::test]
    async fn test_apply_invalid_response() {
        let mock = MockProviderV6::with_schema(testing::example_schema()).on_apply_resource_change(|_| {
            Ok(wire::apply_resource_change::Response {
                new_state: Some(wire::DynamicValue {
                    msgpack: Vec::new(),
                    json: br#"{"id": true}"#.to_vec(),
                }),
                ..Default::default()
            })
        });
        let rt = instance_type(mock).await;

        let request = ManagedResourceApplyRequest::new(
            Value::Null,
            testing::example_instance(),
            testing::example_instance(),
        );
        let (resp, diags) = rt.apply(request).await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Provider returned invalid object");
        assert_eq!(resp.new_state, Value::Unknown);
    }

    #[tokio::test]
    async fn test_import_rpc_failure() {
        let mock = MockProviderV6::with_schema(testing::example_schema())
            .on_import_resource_state(|_| Err(tonic::Status::deadline_exceeded("request timed out")));
        let rt = instance_type(mock).await;

        let (resp, diags) = rt.import(ManagedResourceImportRequest::new("i-9")).await;
        assert!(resp.imported.is_empty());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, RPC_ERROR_SUMMARY);
    }

    #[tokio::test]
    async fn test_import_uses_each_returned_type_schema() {
        let schema = testing::example_schema();
        let instance_content = schema.managed_resource_types["example_instance"].content.clone();
        let volume_content = schema.managed_resource_types["example_volume"].content.clone();
        let instance = testing::dynamic_value_v6(&testing::example_instance(), &instance_content);
        let volume = testing::dynamic_value_v6(&testing::example_volume(), &volume_content);
        let mock = MockProviderV6::with_schema(schema).on_import_resource_state(move |req| {
            assert_eq!(req.type_name, "example_instance");
            Ok(wire::import_resource_state::Response {
                imported_resources: vec![
                    wire::import_resource_state::ImportedResource {
                        type_name: "example_instance".to_string(),
                        state: Some(instance.clone()),
                        private: Vec::new(),
                    },
                    wire::import_resource_state::ImportedResource {
                        type_name: "example_volume".to_string(),
                        state: Some(volume.clone()),
                        private: b"v".to_vec(),
                    },
                    wire::import_resource_state::ImportedResource {
                        type_name: "example_volume".to_string(),
                        state: Some(instance.clone()),
                        private: Vec::new(),
                    },
                ],
                diagnostics: vec![],
            })
        });
        let rt = instance_type(mock).await;

        let (resp, diags) = rt.import(ManagedResourceImportRequest::new("i-123")).await;
        let names: Vec<_> = resp.imported.iter().map(|r| r.type_name.as_str()).collect();
        assert_eq!(names, vec!["example_instance", "example_volume"]);
        assert_eq!(resp.imported[1].state, testing::example_volume());
        assert_eq!(resp.imported[1].private, b"v".to_vec());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Provider returned invalid object");
    }

    #[tokio::test]
    async fn test_upgrade_without_state() {
        let mock = MockProviderV6::with_schema(testing::example_schema());
        let calls = mock.calls();
        let rt = instance_type(mock).await;

        let (resp, diags) = rt
            .upgrade_state(ManagedResourceUpgradeRequest::new(0, Vec::new()))
            .await;
        assert!(diags.is_empty());
        assert!(resp.upgraded_state.is_null());
        assert_eq!(calls.count("UpgradeResourceState"), 1);
    }
}
