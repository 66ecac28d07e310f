use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::client::ProviderRpc;
use super::convert;
use crate::codec;
use crate::diagnostics::Diagnostics;
use crate::provider::{self, decode_imported_resource};
use crate::schema::{ManagedResourceTypeSchema, Schema};
use crate::tfplugin5 as wire;
use crate::types::{
    ManagedResourceApplyRequest, ManagedResourceApplyResponse, ManagedResourceImportRequest,
    ManagedResourceImportResponse, ManagedResourcePlanRequest, ManagedResourcePlanResponse,
    ManagedResourceReadRequest, ManagedResourceReadResponse, ManagedResourceUpgradeRequest,
    ManagedResourceUpgradeResponse,
};
use crate::value::Value;

/// A managed resource type served over protocol 5.
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

    #[instrument(skip(self, config), fields(type_name = %self.type_name), name = "rpc.validate_resource_type_config")]
    async fn validate_config(&self, config: &Value) -> Diagnostics {
        debug!("ValidateResourceTypeConfig called");
        let config = match self.encode(config) {
            Ok(config) => config,
            Err(diags) => return diags,
        };

        let request = wire::validate_resource_type_config::Request {
            type_name: self.type_name.clone(),
            config: Some(config),
        };
        let diags = match self.rpc.validate_resource_type_config(request).await {
            Ok(resp) => convert::decode_diagnostics(resp.diagnostics),
            Err(status) => Diagnostics::rpc_error(&status),
        };
        diags.log_outcome("ValidateResourceTypeConfig");
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
    use crate::protocol5::Provider;
    use crate::provider::{ManagedResourceType as _, Provider as _};
    use crate::testing::{self, MockProviderV5};
    use crate::types::Config;
    use crate::tfplugin5::attribute_path::{step::Selector, Step};

    async fn instance_type(mock: MockProviderV5) -> Box<dyn provider::ManagedResourceType> {
        let provider = Provider::new(mock).await.unwrap();
        provider.configure(&Config::new(Value::Null)).await;
        provider.managed_resource_type("example_instance").unwrap()
    }

    fn attr_step(name: &str) -> Step {
        Step {
            selector: Some(Selector::AttributeName(name.to_string())),
        }
    }

    #[tokio::test]
    async fn test_plan_requires_replace() {
        let schema = testing::example_schema();
        let content = schema.managed_resource_types["example_instance"].content.clone();
        let planned = testing::dynamic_value_v5(&testing::example_instance(), &content);
        let mock = MockProviderV5::with_schema(schema).on_plan_resource_change(move |req| {
            assert_eq!(req.type_name, "example_instance");
            assert_eq!(req.prior_private, b"prior".to_vec());
            Ok(wire::plan_resource_change::Response {
                planned_state: Some(planned.clone()),
                requires_replace: vec![
                    wire::AttributePath {
                        steps: vec![attr_step("id")],
                    },
                    wire::AttributePath {
                        steps: vec![Step {
                            selector: Some(Selector::ElementKeyInt(0)),
                        }],
                    },
                ],
                planned_private: b"planned".to_vec(),
                ..Default::default()
            })
        });
        let rt = instance_type(mock).await;

        let request = ManagedResourcePlanRequest::new(
            Value::Null,
            testing::example_instance(),
            testing::example_instance(),
        )
        .with_prior_private(b"prior".to_vec());
        let (resp, diags) = rt.plan(request).await;

        assert!(diags.is_empty());
        assert_eq!(resp.planned_state, testing::example_instance());
        assert_eq!(resp.planned_private, b"planned".to_vec());
        assert_eq!(
            resp.requires_replace,
            vec![AttributePath::new().attribute("id"), AttributePath::new().index(0)]
        );
    }

    #[tokio::test]
    async fn test_plan_encode_failure_skips_rpc() {
        let mock = MockProviderV5::with_schema(testing::example_schema());
        let calls = mock.calls();
        let rt = instance_type(mock).await;

        let bad = Value::object([("nope", Value::from(true))]);
        let request = ManagedResourcePlanRequest::new(bad, testing::example_instance(), Value::Null);
        let (resp, diags) = rt.plan(request).await;

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Invalid object");
        assert!(resp.planned_state.is_null());
        assert!(!calls.contains("PlanResourceChange"));
    }

    #[tokio::test]
    async fn test_read_with_empty_dynamic_value() {
        let mock = MockProviderV5::with_schema(testing::example_schema()).on_read_resource(|req| {
            Ok(wire::read_resource::Response {
                new_state: Some(wire::DynamicValue::default()),
                private: req.private,
                diagnostics: vec![],
            })
        });
        let rt = instance_type(mock).await;

        let request =
            ManagedResourceReadRequest::new(testing::example_instance()).with_private(b"blob".to_vec());
        let (resp, diags) = rt.read(request).await;

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Provider using unsupported response format");
        assert_eq!(resp.new_state, Value::Unknown);
        assert_eq!(resp.private, b"blob".to_vec());
    }

    #[tokio::test]
    async fn test_read_sends_provider_meta_only_when_given() {
        let mock = MockProviderV5::with_schema(testing::example_schema()).on_read_resource(|req| {
            let diagnostics = if req.provider_meta.is_some() {
                vec![testing::wire_warning_v5("meta received")]
            } else {
                vec![]
            };
            Ok(wire::read_resource::Response {
                new_state: req.current_state,
                private: Vec::new(),
                diagnostics,
            })
        });
        let rt = instance_type(mock).await;

        let (resp, diags) = rt.read(ManagedResourceReadRequest::new(testing::example_instance())).await;
        assert!(diags.is_empty());
        assert_eq!(resp.new_state, testing::example_instance());

        let request = ManagedResourceReadRequest::new(testing::example_instance())
            .with_provider_meta(Value::object([("module_path", Value::string("root"))]));
        let (_, diags) = rt.read(request).await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "meta received");
    }

    #[tokio::test]
    async fn test_apply_rpc_failure() {
        let mock = MockProviderV5::with_schema(testing::example_schema())
            .on_apply_resource_change(|_| Err(tonic::Status::cancelled("request cancelled")));
        let rt = instance_type(mock).await;

        let request = ManagedResourceApplyRequest::new(
            Value::Null,
            testing::example_instance(),
            testing::example_instance(),
        );
        let (resp, diags) = rt.apply(request).await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, RPC_ERROR_SUMMARY);
        assert!(resp.new_state.is_null());
    }

    #[tokio::test]
    async fn test_apply_passes_private_through() {
        let mock = MockProviderV5::with_schema(testing::example_schema()).on_apply_resource_change(|req| {
            Ok(wire::apply_resource_change::Response {
                new_state: req.planned_state,
                private: req.planned_private,
                diagnostics: vec![],
                legacy_type_system: true,
            })
        });
        let rt = instance_type(mock).await;

        let request = ManagedResourceApplyRequest::new(
            Value::Null,
            testing::example_instance(),
            testing::example_instance(),
        )
        .with_planned_private(vec![0, 159, 146, 150]);
        let (resp, diags) = rt.apply(request).await;
        assert!(diags.is_empty());
        assert_eq!(resp.private, vec![0, 159, 146, 150]);
        assert!(resp.legacy_type_system);
    }

    #[tokio::test]
    async fn test_import_resolves_returned_types() {
        let schema = testing::example_schema();
        let content = schema.managed_resource_types["example_instance"].content.clone();
        let state = testing::dynamic_value_v5(&testing::example_instance(), &content);
        let mock = MockProviderV5::with_schema(schema).on_import_resource_state(move |req| {
            assert_eq!(req.id, "i-123");
            Ok(wire::import_resource_state::Response {
                imported_resources: vec![
                    wire::import_resource_state::ImportedResource {
                        type_name: "example_instance".to_string(),
                        state: Some(state.clone()),
                        private: b"p".to_vec(),
                    },
                    wire::import_resource_state::ImportedResource {
                        type_name: "example_unknown".to_string(),
                        state: Some(state.clone()),
                        private: Vec::new(),
                    },
                ],
                diagnostics: vec![],
            })
        });
        let rt = instance_type(mock).await;

        let (resp, diags) = rt.import(ManagedResourceImportRequest::new("i-123")).await;
        assert_eq!(resp.imported.len(), 1);
        assert_eq!(resp.imported[0].type_name, "example_instance");
        assert_eq!(resp.imported[0].state, testing::example_instance());
        assert_eq!(resp.imported[0].private, b"p".to_vec());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Invalid imported resource type");
    }

    #[tokio::test]
    async fn test_import_decodes_against_returned_type() {
        let schema = testing::example_schema();
        let volume_content = schema.managed_resource_types["example_volume"].content.clone();
        let volume = testing::dynamic_value_v5(&testing::example_volume(), &volume_content);
        let mock = MockProviderV5::with_schema(schema).on_import_resource_state(move |_| {
            Ok(wire::import_resource_state::Response {
                imported_resources: vec![
                    wire::import_resource_state::ImportedResource {
                        type_name: "example_volume".to_string(),
                        state: Some(volume.clone()),
                        private: Vec::new(),
                    },
                    wire::import_resource_state::ImportedResource {
                        type_name: "example_instance".to_string(),
                        state: None,
                        private: Vec::new(),
                    },
                ],
                diagnostics: vec![],
            })
        });
        let rt = instance_type(mock).await;

        let (resp, diags) = rt.import(ManagedResourceImportRequest::new("i-123")).await;
        assert_eq!(resp.imported.len(), 1);
        assert_eq!(resp.imported[0].type_name, "example_volume");
        assert_eq!(resp.imported[0].state, testing::example_volume());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Provider using unsupported response format");
    }

    #[tokio::test]
    async fn test_upgrade_sends_raw_json() {
        let schema = testing::example_schema();
        let content = schema.managed_resource_types["example_instance"].content.clone();
        let upgraded = testing::dynamic_value_v5(&testing::example_instance(), &content);
        let mock = MockProviderV5::with_schema(schema).on_upgrade_resource_state(move |req| {
            assert_eq!(req.version, 1);
            let raw = req.raw_state.unwrap_or_default();
            assert_eq!(raw.json, br#"{"id":"i-1"}"#.to_vec());
            assert!(raw.flatmap.is_empty());
            Ok(wire::upgrade_resource_state::Response {
                upgraded_state: Some(upgraded.clone()),
                diagnostics: vec![],
            })
        });
        let rt = instance_type(mock).await;

        let (resp, diags) = rt
            .upgrade_state(ManagedResourceUpgradeRequest::new(1, r#"{"id":"i-1"}"#))
            .await;
        assert!(diags.is_empty());
        assert_eq!(resp.upgraded_state, testing::example_instance());
    }
}
