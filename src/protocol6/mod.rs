//! Plugin protocol version 6.
//!
//! Version 6 drops the remote config-preparation step and renames the
//! configure, stop and validation RPCs.

mod client;
mod convert;
mod data_resource_type;
mod managed_resource_type;
mod provider;

pub use client::{GrpcClient, ProviderRpc};
pub use data_resource_type::DataResourceType;
pub use managed_resource_type::ManagedResourceType;
pub use provider::Provider;
