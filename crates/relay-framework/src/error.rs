//! Error types for the Relay framework.

use relay_core::BoxError;
use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors raised while plugins are registered and the manager is initialized.
///
/// All of these are fatal: they describe a bot that was assembled incorrectly.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A listener stacks a trigger its handler cannot serve, e.g. a message
    /// registration on a webhook handler.
    #[error("listener '{listener}' of plugin '{plugin}' is unsupported: {reason}")]
    UnsupportedListener {
        plugin: String,
        listener: String,
        reason: String,
    },

    /// A registration pattern failed to compile.
    #[error("listener '{listener}' of plugin '{plugin}' has an invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        plugin: String,
        listener: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The plugin's `initialize` hook returned an error.
    #[error("plugin '{plugin}' failed to initialize: {source}")]
    PluginInit {
        plugin: String,
        #[source]
        source: BoxError,
    },

    /// A plugin was initialized more than once.
    #[error("plugin '{0}' is already initialized")]
    PluginAlreadyInitialized(String),

    /// `initialize` was called on a manager that already ran it.
    #[error("plugin manager is already initialized")]
    ManagerAlreadyInitialized,

    /// A lifecycle call was made before `initialize` completed.
    #[error("plugin manager is not initialized")]
    ManagerNotReady,

    /// Plugins were added after the routing tables were built.
    #[error("plugin registration is closed once the manager is initialized")]
    RegistrationClosed,
}

impl ConfigurationError {
    /// Creates an unsupported-listener error.
    pub fn unsupported(
        plugin: impl Into<String>,
        listener: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedListener {
            plugin: plugin.into(),
            listener: listener.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for registration and lifecycle operations.
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;

// =============================================================================
// Handler Failures
// =============================================================================

/// A cooperative handler that did not complete successfully.
///
/// Failures are isolated: they are collected in the dispatch report and never
/// prevent other handlers from running.
#[derive(Debug, Error)]
pub enum HandlerFailure {
    /// The handler returned an error.
    #[error("handler '{listener}' of plugin '{plugin}' failed: {source}")]
    Failed {
        plugin: String,
        listener: String,
        #[source]
        source: BoxError,
    },

    /// The handler panicked.
    #[error("handler '{listener}' of plugin '{plugin}' panicked: {message}")]
    Panicked {
        plugin: String,
        listener: String,
        message: String,
    },

    /// The owning plugin instance was dropped before the handler could run.
    #[error("handler '{listener}' of plugin '{plugin}' has no live owner")]
    OwnerGone { plugin: String, listener: String },
}

impl HandlerFailure {
    /// Name of the plugin owning the failed handler.
    pub fn plugin(&self) -> &str {
        match self {
            Self::Failed { plugin, .. }
            | Self::Panicked { plugin, .. }
            | Self::OwnerGone { plugin, .. } => plugin,
        }
    }

    /// Name of the failed handler.
    pub fn listener(&self) -> &str {
        match self {
            Self::Failed { listener, .. }
            | Self::Panicked { listener, .. }
            | Self::OwnerGone { listener, .. } => listener,
        }
    }
}
