//! Error types for the provider client.
//!
//! Problems with the values sent to or returned by a provider are reported
//! as [`Diagnostics`](crate::Diagnostics). [`ClientError`] covers everything
//! that prevents an operation from being attempted at all: connecting,
//! loading the schema, and using the client out of order.

use thiserror::Error;

use crate::diagnostics::Diagnostics;

/// Errors that can occur when connecting to or driving a provider.
#[derive(Debug, Error)]
pub enum ClientError {
    /// An operation that needs a configured provider was called before
    /// [`Provider::configure`](crate::Provider::configure) succeeded.
    #[error("Provider is not configured")]
    NotConfigured,

    /// The provider schema has no managed resource type with this name.
    #[error("Managed resource type not found: {0}")]
    ManagedResourceTypeNotFound(String),

    /// The provider schema has no data resource type with this name.
    #[error("Data resource type not found: {0}")]
    DataResourceTypeNotFound(String),

    /// The provider reported errors while returning its schema.
    #[error("Provider schema unavailable: {0}")]
    SchemaUnavailable(Diagnostics),

    /// An RPC failed before the provider could respond.
    #[error("RPC error: {0}")]
    Rpc(#[from] tonic::Status),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The plugin negotiated a protocol version this client cannot speak.
    #[error("Unsupported protocol version: {0}")]
    UnsupportedProtocolVersion(u32),

    /// The plugin handshake line could not be parsed.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// The plugin advertised a network type this client cannot dial.
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),
}

impl ClientError {
    /// Whether the error comes from calling operations in the wrong order or
    /// with an unknown type name, rather than from the provider or network.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured
                | Self::ManagedResourceTypeNotFound(_)
                | Self::DataResourceTypeNotFound(_)
        )
    }
}

/// Convenience alias for results carrying a [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;
