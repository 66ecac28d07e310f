//! Connecting to a running provider plugin.
//!
//! A plugin announces where it is listening with a single handshake line on
//! its stdout:
//!
//! ```text
//! CORE-VERSION|PROTOCOL-VERSION|NETWORK|ADDRESS|PROTOCOL[|SERVER-CERT]
//! ```
//!
//! for example `1|6|unix|/tmp/plugin123|grpc`. [`Handshake`] parses that
//! line, [`Connection::connect`] dials the address, and
//! [`connect_provider`] picks the protocol adapter that matches the
//! negotiated version.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};

use crate::error::ClientError;
use crate::provider::Provider;
use crate::{protocol5, protocol6};

/// The plugin protocol versions this client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Protocol version 5.
    V5,
    /// Protocol version 6.
    V6,
}

impl TryFrom<u32> for ProtocolVersion {
    type Error = ClientError;

    fn try_from(version: u32) -> Result<Self, Self::Error> {
        match version {
            5 => Ok(Self::V5),
            6 => Ok(Self::V6),
            other => Err(ClientError::UnsupportedProtocolVersion(other)),
        }
    }
}

impl From<ProtocolVersion> for u32 {
    fn from(version: ProtocolVersion) -> Self {
        match version {
            ProtocolVersion::V5 => 5,
            ProtocolVersion::V6 => 6,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u32::from(*self))
    }
}

/// How to reach the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// A TCP `host:port` address.
    Tcp,
    /// A Unix domain socket path.
    Unix,
}

/// A parsed plugin handshake line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Version of the plugin handshake itself.
    pub core_version: u32,
    /// The negotiated plugin protocol version.
    pub protocol_version: ProtocolVersion,
    /// Network type of `address`.
    pub network: Network,
    /// Where the plugin is listening.
    pub address: String,
    /// Base64-encoded server certificate for mutual TLS, if the plugin sent one.
    pub server_cert: Option<String>,
}

impl Handshake {
    /// The URI to dial for this handshake.
    pub fn endpoint_uri(&self) -> String {
        match self.network {
            Network::Tcp => format!("http://{}", self.address),
            Network::Unix => format!("unix://{}", self.address),
        }
    }
}

impl FromStr for Handshake {
    type Err = ClientError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.trim().split('|').collect();
        if parts.len() < 5 || parts.len() > 6 {
            return Err(ClientError::InvalidHandshake(format!(
                "expected 5 or 6 fields, found {}",
                parts.len()
            )));
        }

        let core_version = parts[0].parse::<u32>().map_err(|_| {
            ClientError::InvalidHandshake(format!("invalid core version {:?}", parts[0]))
        })?;
        let protocol_version = parts[1].parse::<u32>().map_err(|_| {
            ClientError::InvalidHandshake(format!("invalid protocol version {:?}", parts[1]))
        })?;
        let protocol_version = ProtocolVersion::try_from(protocol_version)?;

        let network = match parts[2] {
            "tcp" => Network::Tcp,
            "unix" => Network::Unix,
            other => return Err(ClientError::UnsupportedNetwork(other.to_string())),
        };

        if parts[3].is_empty() {
            return Err(ClientError::InvalidHandshake("empty address".to_string()));
        }
        if parts[4] != "grpc" {
            return Err(ClientError::InvalidHandshake(format!(
                "unsupported plugin protocol {:?}",
                parts[4]
            )));
        }

        Ok(Self {
            core_version,
            protocol_version,
            network,
            address: parts[3].to_string(),
            server_cert: parts.get(5).filter(|c| !c.is_empty()).map(|c| c.to_string()),
        })
    }
}

/// Options for connecting to a plugin.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// How long to wait for the connection to be established.
    /// Default: 10 seconds.
    pub connect_timeout: Duration,
    /// Upper bound on each RPC. Default: none.
    pub request_timeout: Option<Duration>,
    /// Cancelling this token aborts every in-flight and future RPC.
    pub cancellation: CancellationToken,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            cancellation: CancellationToken::new(),
        }
    }
}

impl ConnectOptions {
    /// Create new connect options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set a per-RPC timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Use a caller-supplied cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The call policy these options describe.
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: self.request_timeout,
            cancellation: self.cancellation.clone(),
        }
    }
}

/// Cancellation and timeout applied to every RPC.
///
/// Both surface as an ordinary failed call, so callers see them as
/// transport-failure diagnostics.
#[derive(Debug, Clone, Default)]
pub struct CallPolicy {
    timeout: Option<Duration>,
    cancellation: CancellationToken,
}

impl CallPolicy {
    /// Create a policy.
    pub fn new(timeout: Option<Duration>, cancellation: CancellationToken) -> Self {
        Self {
            timeout,
            cancellation,
        }
    }

    /// Run one call under this policy.
    pub async fn run<T, F>(&self, call: F) -> Result<T, tonic::Status>
    where
        F: Future<Output = Result<T, tonic::Status>>,
    {
        let bounded = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(tonic::Status::deadline_exceeded(format!(
                        "request timed out after {:?}",
                        limit
                    ))),
                },
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => {
                Err(tonic::Status::cancelled("request cancelled"))
            }
            result = bounded => result,
        }
    }
}

/// An established connection to a plugin.
#[derive(Debug, Clone)]
pub struct Connection {
    channel: Channel,
    version: ProtocolVersion,
    policy: CallPolicy,
}

impl Connection {
    /// Dial the address announced in `handshake`.
    pub async fn connect(handshake: &Handshake, options: ConnectOptions) -> Result<Self, ClientError> {
        let uri = handshake.endpoint_uri();
        debug!(uri = %uri, version = %handshake.protocol_version, "Connecting to provider");

        let channel = Endpoint::from_shared(uri.clone())?
            .connect_timeout(options.connect_timeout)
            .connect()
            .await?;

        info!(uri = %uri, version = %handshake.protocol_version, "Connected to provider");
        Ok(Self::from_channel(channel, handshake.protocol_version, options))
    }

    /// Wrap an existing channel.
    pub fn from_channel(channel: Channel, version: ProtocolVersion, options: ConnectOptions) -> Self {
        Self {
            channel,
            version,
            policy: options.call_policy(),
        }
    }

    /// The negotiated protocol version.
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.version
    }

    /// Load the provider schema and return the adapter for this connection's
    /// protocol version.
    pub async fn into_provider(self) -> Result<Box<dyn Provider>, ClientError> {
        match self.version {
            ProtocolVersion::V5 => {
                let rpc = protocol5::GrpcClient::new(self.channel, self.policy);
                let provider = protocol5::Provider::new(rpc).await?;
                Ok(Box::new(provider))
            },
            ProtocolVersion::V6 => {
                let rpc = protocol6::GrpcClient::new(self.channel, self.policy);
                let provider = protocol6::Provider::new(rpc).await?;
                Ok(Box::new(provider))
            },
        }
    }
}

/// Build the provider adapter matching the connection's protocol version.
///
/// The schema is fetched before this returns; a provider whose schema
/// cannot be loaded is never handed out.
pub async fn connect_provider(connection: Connection) -> Result<Box<dyn Provider>, ClientError> {
    connection.into_provider().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix_handshake() {
        let hs: Handshake = "1|6|unix|/tmp/plugin123|grpc\n".parse().unwrap();
        assert_eq!(hs.core_version, 1);
        assert_eq!(hs.protocol_version, ProtocolVersion::V6);
        assert_eq!(hs.network, Network::Unix);
        assert_eq!(hs.endpoint_uri(), "unix:///tmp/plugin123");
        assert!(hs.server_cert.is_none());
    }

    #[test]
    fn test_parse_tcp_handshake_with_cert() {
        let hs: Handshake = "1|5|tcp|127.0.0.1:1234|grpc|MIIB".parse().unwrap();
        assert_eq!(hs.protocol_version, ProtocolVersion::V5);
        assert_eq!(hs.endpoint_uri(), "http://127.0.0.1:1234");
        assert_eq!(hs.server_cert.as_deref(), Some("MIIB"));
    }

    #[test]
    fn test_parse_invalid_handshakes() {
        assert!(matches!(
            "1|6|unix|/tmp/p".parse::<Handshake>(),
            Err(ClientError::InvalidHandshake(_))
        ));
        assert!(matches!(
            "1|4|tcp|127.0.0.1:1|grpc".parse::<Handshake>(),
            Err(ClientError::UnsupportedProtocolVersion(4))
        ));
        assert!(matches!(
            "1|5|pipe|x|grpc".parse::<Handshake>(),
            Err(ClientError::UnsupportedNetwork(_))
        ));
        assert!(matches!(
            "1|5|tcp|127.0.0.1:1|netrpc".parse::<Handshake>(),
            Err(ClientError::InvalidHandshake(_))
        ));
    }

    #[test]
    fn test_connect_options_builder() {
        let opts = ConnectOptions::new().with_request_timeout(Duration::from_secs(3));
        assert_eq!(opts.connect_timeout, Duration::from_secs(10));
        assert_eq!(opts.request_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_call_policy_passes_result_through() {
        let policy = CallPolicy::default();
        let result = tokio_test::block_on(policy.run(async { Ok::<_, tonic::Status>(7) }));
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_call_policy_cancellation() {
        let token = CancellationToken::new();
        let policy = CallPolicy::new(None, token.clone());
        token.cancel();

        let result = policy
            .run(std::future::pending::<Result<(), tonic::Status>>())
            .await;
        assert_eq!(result.unwrap_err().code(), tonic::Code::Cancelled);
    }

    #[tokio::test]
    async fn test_call_policy_timeout() {
        let policy = CallPolicy::new(Some(Duration::from_millis(50)), CancellationToken::new());
        let result = policy
            .run(std::future::pending::<Result<(), tonic::Status>>())
            .await;
        assert_eq!(result.unwrap_err().code(), tonic::Code::DeadlineExceeded);
    }
}
