//! Runtime error types.

use relay_core::ClassifyError;
use relay_framework::ConfigurationError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Plugins could not be registered or initialized.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The event classifier reported a fatal error.
    #[error("event classification failed: {0}")]
    Classify(#[from] ClassifyError),

    /// The runtime that owned this webhook sender has shut down.
    #[error("webhook queue is closed")]
    WebhookQueueClosed,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
