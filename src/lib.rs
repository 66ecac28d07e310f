//! Terraform Provider Client
//!
//! This crate drives Terraform-protocol provider plugins from Rust. It speaks
//! both plugin protocol versions (5 and 6) over gRPC and presents them
//! through one protocol-independent API.
//!
//! # Overview
//!
//! - **Connection**: Parse the plugin handshake line and dial the plugin
//! - **Provider traits**: [`Provider`], [`ManagedResourceType`] and
//!   [`DataResourceType`], implemented once per protocol version
//! - **Schema types**: The provider schema, loaded once at connect time
//! - **Dynamic values**: [`Value`] and [`Type`], with MessagePack and JSON codecs
//! - **Diagnostics**: Every operation reports problems as [`Diagnostics`]
//! - **Logging**: Integration with `tracing` for structured logging
//! - **Testing**: In-process mock providers for both protocol versions
//!
//! # Quick Start
//!
//! ```ignore
//! use tfprovider_client::{
//!     connect_provider, Connection, ConnectOptions, Handshake,
//!     ManagedResourcePlanRequest, Value,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // The line the plugin printed on its stdout.
//!     let handshake: Handshake = "1|6|unix|/tmp/plugin123|grpc".parse()?;
//!     let connection = Connection::connect(&handshake, ConnectOptions::new()).await?;
//!     let provider = connect_provider(connection).await?;
//!
//!     let (config, diags) = provider
//!         .prepare_config(Value::object([("region", Value::string("us-east-1"))]))
//!         .await;
//!     let diags = provider.configure(&config).await;
//!     if diags.has_errors() {
//!         eprintln!("{}", diags);
//!         return Ok(());
//!     }
//!
//!     let instance = provider.managed_resource_type("example_instance")?;
//!     let desired = Value::object([("ami", Value::string("ami-42"))]);
//!     let (plan, diags) = instance
//!         .plan(ManagedResourcePlanRequest::new(Value::Null, desired.clone(), desired))
//!         .await;
//!     println!("{:?} ({} diagnostics)", plan.planned_state, diags.len());
//!
//!     provider.close();
//!     Ok(())
//! }
//! ```
//!
//! # Operation Semantics
//!
//! - The schema is fetched before a provider is handed out. Requests are
//!   encoded against it and responses decoded against it.
//! - Encoding failures stop an operation before any RPC is made.
//! - RPC failures, including cancellation and timeouts, become a single
//!   diagnostic whose summary is [`RPC_ERROR_SUMMARY`].
//! - Provider-private data is forwarded byte-for-byte and never inspected.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod connection;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod path;
pub mod protocol5;
pub mod protocol6;
pub mod provider;
pub mod schema;
pub mod testing;
pub mod types;
pub mod value;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod tfplugin5;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod tfplugin6;

// Re-export main types at crate root
pub use codec::EncodedValue;
pub use connection::{connect_provider, CallPolicy, ConnectOptions, Connection, Handshake, Network, ProtocolVersion};
pub use diagnostics::{Diagnostic, Diagnostics, Severity, RPC_ERROR_SUMMARY};
pub use error::{ClientError, Result};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use path::{AttributePath, PathStep};
pub use provider::{DataResourceType, ManagedResourceType, Provider};
pub use schema::{
    Attribute, AttributeFlags, Block, DataResourceTypeSchema, ManagedResourceTypeSchema,
    NestedBlock, NestingMode, Schema,
};
pub use types::{
    Config, DataResourceReadRequest, DataResourceReadResponse, ImportedResource,
    ManagedResourceApplyRequest, ManagedResourceApplyResponse, ManagedResourceImportRequest,
    ManagedResourceImportResponse, ManagedResourcePlanRequest, ManagedResourcePlanResponse,
    ManagedResourceReadRequest, ManagedResourceReadResponse, ManagedResourceUpgradeRequest,
    ManagedResourceUpgradeResponse,
};
pub use value::{CodecError, Type, Value};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use tokio_util::sync::CancellationToken;
pub use tonic;
pub use tracing;
