//! Relay Runtime - orchestration layer for the Relay bot framework.
//!
//! This crate provides:
//! - Layered configuration with figment ([`config`])
//! - Logging setup ([`logging`])
//! - The event ingestion loop ([`RelayRuntime`])
//!
//! ```ignore
//! use relay_runtime::RelayRuntime;
//! use relay_core::JsonClassifier;
//! use relay_framework::HelpPlugin;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut runtime = RelayRuntime::new();
//!     runtime.plugin(HelpPlugin::new())?;
//!
//!     // `driver` and `events` come from the chat platform client.
//!     runtime.run(driver, events, JsonClassifier::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, LoggingConfig, RelayConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use runtime::{RelayRuntime, RuntimeBuilder, WebhookSender, wait_for_shutdown};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for plugin code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
