//! Plugin protocol version 5.
//!
//! Version 5 has a remote config-preparation step and names its RPCs after
//! "resource types" and "data sources".

mod client;
mod convert;
mod data_resource_type;
mod managed_resource_type;
mod provider;

pub use client::{GrpcClient, ProviderRpc};
pub use data_resource_type::DataResourceType;
pub use managed_resource_type::ManagedResourceType;
pub use provider::Provider;
