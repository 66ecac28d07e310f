//! The protocol-independent provider abstraction.
//!
//! [`Provider`], [`ManagedResourceType`] and [`DataResourceType`] are the
//! surface callers program against. Each protocol version supplies its own
//! implementation, chosen once when the connection is made
//! (see [`connect_provider`](crate::connect_provider)).

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::codec::{self, EncodedValue};
use crate::connection::ProtocolVersion;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ClientError;
use crate::schema::{DataResourceTypeSchema, ManagedResourceTypeSchema, Schema};
use crate::types::{
    Config, DataResourceReadRequest, DataResourceReadResponse, ImportedResource,
    ManagedResourceApplyRequest, ManagedResourceApplyResponse, ManagedResourceImportRequest,
    ManagedResourceImportResponse, ManagedResourcePlanRequest, ManagedResourcePlanResponse,
    ManagedResourceReadRequest, ManagedResourceReadResponse, ManagedResourceUpgradeRequest,
    ManagedResourceUpgradeResponse,
};
use crate::value::Value;

/// A connected provider plugin.
///
/// The schema is loaded before a `Provider` is handed out. The provider must
/// be configured exactly once before resource types can be obtained.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The protocol version this adapter speaks.
    fn protocol_version(&self) -> ProtocolVersion;

    /// The schema loaded when the provider was connected.
    fn schema(&self) -> &Schema;

    /// Check a candidate provider configuration before configuring.
    ///
    /// The returned [`Config`] is what should be passed to
    /// [`configure`](Provider::configure). Only some protocol versions let
    /// the provider normalize the value; do not rely on it being changed.
    async fn prepare_config(&self, config: Value) -> (Config, Diagnostics);

    /// Configure the provider.
    ///
    /// Succeeds at most once. A call made after a successful configure
    /// returns an error diagnostic without contacting the provider. If the
    /// provider reports errors the client stays unconfigured and the call
    /// may be retried.
    async fn configure(&self, config: &Config) -> Diagnostics;

    /// Whether [`configure`](Provider::configure) has succeeded.
    fn is_configured(&self) -> bool;

    /// Obtain a client for one managed resource type.
    fn managed_resource_type(&self, name: &str) -> Result<Box<dyn ManagedResourceType>, ClientError>;

    /// Obtain a client for one data resource type.
    fn data_resource_type(&self, name: &str) -> Result<Box<dyn DataResourceType>, ClientError>;

    /// Ask the provider to stop any in-flight operations.
    async fn stop(&self) -> Diagnostics;

    /// Release this provider's hold on the connection. No further
    /// provider-level operations are possible.
    ///
    /// Resource type clients obtained earlier share the connection and keep
    /// it open until they are dropped as well.
    fn close(self: Box<Self>);
}

/// Operations on one managed resource type.
#[async_trait]
pub trait ManagedResourceType: Send + Sync {
    /// The name of the resource type.
    fn type_name(&self) -> &str;

    /// The resource type's schema.
    fn schema(&self) -> &ManagedResourceTypeSchema;

    /// Validate a resource configuration.
    async fn validate_config(&self, config: &Value) -> Diagnostics;

    /// Upgrade state written by an older schema version.
    async fn upgrade_state(
        &self,
        request: ManagedResourceUpgradeRequest,
    ) -> (ManagedResourceUpgradeResponse, Diagnostics);

    /// Refresh the state of an existing object.
    async fn read(
        &self,
        request: ManagedResourceReadRequest,
    ) -> (ManagedResourceReadResponse, Diagnostics);

    /// Plan a change.
    async fn plan(
        &self,
        request: ManagedResourcePlanRequest,
    ) -> (ManagedResourcePlanResponse, Diagnostics);

    /// Apply a planned change.
    async fn apply(
        &self,
        request: ManagedResourceApplyRequest,
    ) -> (ManagedResourceApplyResponse, Diagnostics);

    /// Import existing remote objects by ID.
    async fn import(
        &self,
        request: ManagedResourceImportRequest,
    ) -> (ManagedResourceImportResponse, Diagnostics);
}

/// Operations on one data resource type.
#[async_trait]
pub trait DataResourceType: Send + Sync {
    /// The name of the data resource type.
    fn type_name(&self) -> &str;

    /// The data resource type's schema.
    fn schema(&self) -> &DataResourceTypeSchema;

    /// Validate a data source configuration.
    async fn validate_config(&self, config: &Value) -> Diagnostics;

    /// Read the data source.
    async fn read(&self, request: DataResourceReadRequest) -> (DataResourceReadResponse, Diagnostics);
}

/// The configured/unconfigured state of a provider.
///
/// Transitions are serialized by an async mutex held across the whole
/// configure attempt, so concurrent callers cannot both win. Readers only
/// look at the flag and never wait.
#[derive(Debug, Default)]
pub(crate) struct ConfigState {
    configured: AtomicBool,
    transition: Mutex<()>,
}

impl ConfigState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    pub(crate) fn require_configured(&self) -> Result<(), ClientError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(ClientError::NotConfigured)
        }
    }

    /// Run `attempt` if not already configured, and mark the state
    /// configured only if it reported no errors.
    pub(crate) async fn configure_with<F, Fut>(&self, attempt: F) -> Diagnostics
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Diagnostics>,
    {
        let _guard = self.transition.lock().await;
        if self.is_configured() {
            return Diagnostic::error("Provider already configured")
                .with_detail("This provider can't be configured more than once.")
                .into();
        }

        let diags = attempt().await;
        if !diags.has_errors() {
            self.configured.store(true, Ordering::Release);
        }
        diags
    }
}

/// Decode one imported resource against the schema of the type it names.
///
/// Returns `None`, after recording an error, when the provider named a type
/// that is not in its own schema, or when the state is missing or cannot be
/// decoded.
pub(crate) fn decode_imported_resource(
    schema: &Schema,
    type_name: String,
    state: Option<EncodedValue>,
    private: Vec<u8>,
    diags: &mut Diagnostics,
) -> Option<ImportedResource> {
    let Some(type_schema) = schema.managed_resource_type(&type_name) else {
        diags.push(
            Diagnostic::error("Invalid imported resource type").with_detail(format!(
                "The provider returned an imported resource of type {:?}, which it does not support.",
                type_name
            )),
        );
        return None;
    };

    let (state, decode_diags) =
        codec::decode_dynamic_value(&state.unwrap_or_default(), &type_schema.content);
    let failed = decode_diags.has_errors();
    diags.append(decode_diags);
    if failed {
        return None;
    }

    Some(ImportedResource {
        type_name,
        state,
        private,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_configure_once() {
        let state = ConfigState::new();
        assert!(!state.is_configured());
        assert!(matches!(state.require_configured(), Err(ClientError::NotConfigured)));

        let diags = state.configure_with(|| async { Diagnostics::new() }).await;
        assert!(!diags.has_errors());
        assert!(state.is_configured());
        assert!(state.require_configured().is_ok());

        let ran = AtomicBool::new(false);
        let diags = state
            .configure_with(|| async {
                ran.store(true, Ordering::SeqCst);
                Diagnostics::new()
            })
            .await;
        assert!(!ran.load(Ordering::SeqCst));
        assert!(diags.has_errors());
        assert_eq!(diags[0].summary, "Provider already configured");
    }

    #[tokio::test]
    async fn test_failed_configure_can_retry() {
        let state = ConfigState::new();
        let diags = state
            .configure_with(|| async { Diagnostic::error("bad region").into() })
            .await;
        assert!(diags.has_errors());
        assert!(!state.is_configured());

        let diags = state.configure_with(|| async { Diagnostics::new() }).await;
        assert!(!diags.has_errors());
        assert!(state.is_configured());
    }

    #[tokio::test]
    async fn test_concurrent_configure_has_one_winner() {
        let state = Arc::new(ConfigState::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = Arc::clone(&state);
            handles.push(tokio::spawn(async move {
                state
                    .configure_with(|| async {
                        tokio::task::yield_now().await;
                        Diagnostics::new()
                    })
                    .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if !handle.await.unwrap().has_errors() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[test]
    fn test_decode_imported_resource_unknown_type() {
        let schema = Schema::new();
        let mut diags = Diagnostics::new();
        let imported =
            decode_imported_resource(&schema, "nope".to_string(), None, Vec::new(), &mut diags);
        assert!(imported.is_none());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Invalid imported resource type");
    }

    #[test]
    fn test_decode_imported_resource_keeps_private() {
        let schema = Schema::new().with_managed_resource_type(
            "example_thing",
            ManagedResourceTypeSchema::new(0, Block::new().with_attribute("id", Attribute::computed_string())),
        );
        let state = codec::encode_dynamic_value(
            &Value::object([("id", Value::string("t-1"))]),
            &schema.managed_resource_types["example_thing"].content,
        )
        .unwrap();

        let mut diags = Diagnostics::new();
        let imported = decode_imported_resource(
            &schema,
            "example_thing".to_string(),
            Some(state),
            b"secret".to_vec(),
            &mut diags,
        )
        .unwrap();
        assert!(diags.is_empty());
        assert_eq!(imported.private, b"secret".to_vec());
        assert_eq!(imported.state.get_attr("id"), Some(&Value::string("t-1")));
    }

    #[test]
    fn test_decode_imported_resource_without_state() {
        let schema = Schema::new().with_managed_resource_type(
            "example_thing",
            ManagedResourceTypeSchema::new(0, Block::new().with_attribute("id", Attribute::computed_string())),
        );

        let mut diags = Diagnostics::new();
        let imported = decode_imported_resource(
            &schema,
            "example_thing".to_string(),
            None,
            Vec::new(),
            &mut diags,
        );
        assert!(imported.is_none());
        assert_eq!(diags.len(), 1);
        assert!(diags.has_errors());
        assert_eq!(diags[0].summary, "Provider using unsupported response format");
    }
}
