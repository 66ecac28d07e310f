//! Request and response types for resource operations.
//!
//! These types present provider operations in terms of decoded [`Value`]s.
//! The `private` fields are opaque provider-owned bytes: the client stores
//! and forwards them unchanged and never looks inside.

use crate::path::AttributePath;
use crate::value::Value;

/// A provider configuration prepared for [`Provider::configure`](crate::Provider::configure).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// The configuration object.
    pub value: Value,
}

impl Config {
    /// Wrap a configuration value.
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

/// Input to a managed resource read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagedResourceReadRequest {
    /// The state recorded after the last apply or refresh.
    pub current_state: Value,
    /// Private data returned with the current state.
    pub private: Vec<u8>,
    /// Per-module provider meta value, sent only if the provider has a meta schema.
    pub provider_meta: Option<Value>,
}

impl ManagedResourceReadRequest {
    /// Create a read request for the given state.
    pub fn new(current_state: Value) -> Self {
        Self {
            current_state,
            ..Default::default()
        }
    }

    /// Attach the private data returned alongside the state.
    pub fn with_private(mut self, private: Vec<u8>) -> Self {
        self.private = private;
        self
    }

    /// Attach a provider meta value.
    pub fn with_provider_meta(mut self, meta: Value) -> Self {
        self.provider_meta = Some(meta);
        self
    }
}

/// Result of a managed resource read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagedResourceReadResponse {
    /// The refreshed state. Null means the remote object no longer exists.
    pub new_state: Value,
    /// Private data to store with the new state.
    pub private: Vec<u8>,
}

/// Input to planning a managed resource change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagedResourcePlanRequest {
    /// The state before the change. Null for a create.
    pub prior_state: Value,
    /// Private data recorded with the prior state.
    pub prior_private: Vec<u8>,
    /// The state the configuration asks for. Null for a destroy.
    pub proposed_new_state: Value,
    /// The configuration as written.
    pub config: Value,
    /// Per-module provider meta value.
    pub provider_meta: Option<Value>,
}

impl ManagedResourcePlanRequest {
    /// Create a plan request.
    pub fn new(prior_state: Value, proposed_new_state: Value, config: Value) -> Self {
        Self {
            prior_state,
            proposed_new_state,
            config,
            ..Default::default()
        }
    }

    /// Attach the private data recorded with the prior state.
    pub fn with_prior_private(mut self, private: Vec<u8>) -> Self {
        self.prior_private = private;
        self
    }

    /// Attach a provider meta value.
    pub fn with_provider_meta(mut self, meta: Value) -> Self {
        self.provider_meta = Some(meta);
        self
    }
}

/// Result of planning a managed resource change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagedResourcePlanResponse {
    /// The state the provider expects after apply, possibly with unknowns.
    pub planned_state: Value,
    /// Attributes whose change forces the resource to be replaced.
    pub requires_replace: Vec<AttributePath>,
    /// Private data to pass to apply.
    pub planned_private: Vec<u8>,
    /// The provider uses the legacy SDK type system and may return
    /// values that don't strictly follow the plan.
    pub legacy_type_system: bool,
}

/// Input to applying a planned change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagedResourceApplyRequest {
    /// The state before the change.
    pub prior_state: Value,
    /// The state returned from plan.
    pub planned_state: Value,
    /// The configuration as written.
    pub config: Value,
    /// Private data returned from plan.
    pub planned_private: Vec<u8>,
    /// Per-module provider meta value.
    pub provider_meta: Option<Value>,
}

impl ManagedResourceApplyRequest {
    /// Create an apply request.
    pub fn new(prior_state: Value, planned_state: Value, config: Value) -> Self {
        Self {
            prior_state,
            planned_state,
            config,
            ..Default::default()
        }
    }

    /// Attach the private data returned from plan.
    pub fn with_planned_private(mut self, private: Vec<u8>) -> Self {
        self.planned_private = private;
        self
    }

    /// Attach a provider meta value.
    pub fn with_provider_meta(mut self, meta: Value) -> Self {
        self.provider_meta = Some(meta);
        self
    }
}

/// Result of applying a change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagedResourceApplyResponse {
    /// The state after the change. Null after a destroy.
    pub new_state: Value,
    /// Private data to store with the new state.
    pub private: Vec<u8>,
    /// See [`ManagedResourcePlanResponse::legacy_type_system`].
    pub legacy_type_system: bool,
}

/// Input to importing existing remote objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedResourceImportRequest {
    /// The provider-specific identifier of the object to import.
    pub id: String,
}

impl ManagedResourceImportRequest {
    /// Create an import request.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// One resource returned from an import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedResource {
    /// The managed resource type of this object. May differ from the type
    /// the import was requested for.
    pub type_name: String,
    /// The imported state, decoded against `type_name`'s schema.
    pub state: Value,
    /// Private data to store with the state.
    pub private: Vec<u8>,
}

/// Result of an import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagedResourceImportResponse {
    /// The resources that were imported and decoded successfully.
    pub imported: Vec<ImportedResource>,
}

/// Input to upgrading stored state to the current schema version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedResourceUpgradeRequest {
    /// Schema version the stored state was written with.
    pub version: i64,
    /// The stored state in its raw JSON form.
    pub raw_state_json: Vec<u8>,
}

impl ManagedResourceUpgradeRequest {
    /// Create an upgrade request.
    pub fn new(version: i64, raw_state_json: impl Into<Vec<u8>>) -> Self {
        Self {
            version,
            raw_state_json: raw_state_json.into(),
        }
    }
}

/// Result of a state upgrade.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagedResourceUpgradeResponse {
    /// The state conforming to the current schema.
    pub upgraded_state: Value,
}

/// Input to reading a data resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataResourceReadRequest {
    /// The data source configuration.
    pub config: Value,
    /// Per-module provider meta value.
    pub provider_meta: Option<Value>,
}

impl DataResourceReadRequest {
    /// Create a read request.
    pub fn new(config: Value) -> Self {
        Self {
            config,
            provider_meta: None,
        }
    }

    /// Attach a provider meta value.
    pub fn with_provider_meta(mut self, meta: Value) -> Self {
        self.provider_meta = Some(meta);
        self
    }
}

/// Result of reading a data resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataResourceReadResponse {
    /// The data source's state.
    pub state: Value,
}
