//! Logging setup for programs that drive provider plugins.
//!
//! The client logs every RPC through `tracing`: a span per call named
//! `rpc.<operation>` carrying the resource type, a `debug` event when the
//! call starts and an `info` or `warn` event with the diagnostic count when
//! it finishes. Nothing is printed unless a subscriber is installed, either
//! by the host program or with one of the helpers below.
//!
//! Output goes to **stderr**, leaving stdout free for whatever the host
//! program prints.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `tfprovider_client=debug`)
//!
//! ```bash
//! # Trace every RPC the client makes
//! RUST_LOG=tfprovider_client=debug ./my-tool
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LEVEL: &str = "info";

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the default logging subscriber.
///
/// Respects `RUST_LOG` and falls back to `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
///
/// # Example
///
/// ```ignore
/// use tfprovider_client::init_logging;
///
/// #[tokio::main]
/// async fn main() {
///     init_logging();
///     tracing::info!("Launching provider");
/// }
/// ```
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Initialize logging with a custom default level, used when `RUST_LOG` is
/// not set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this never panics, so it is safe to call from
/// every test that wants log output.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(filter(DEFAULT_LEVEL))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}
