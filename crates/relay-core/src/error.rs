//! Error types shared by every Relay crate.
//!
//! Framework-level errors (configuration, handler failures) live in
//! `relay-framework`; the ones here describe problems at the boundary with
//! the chat platform.

use thiserror::Error;

/// Boxed error type used for opaque handler and plugin failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of running a single handler (or a job submitted on its behalf).
pub type HandlerResult = Result<(), BoxError>;

// =============================================================================
// Classification Errors
// =============================================================================

/// Errors produced while turning a raw platform payload into an [`Event`].
///
/// [`Event`]: crate::Event
#[derive(Debug, Clone, Error)]
pub enum ClassifyError {
    /// The classifier produced a kind the dispatcher does not know about.
    ///
    /// This is a programming error in the classifier and is fatal for the
    /// ingestion loop.
    #[error("unknown event kind: {0}")]
    UnknownEventKind(String),

    /// The payload claims a known kind but its body cannot be read.
    #[error("malformed {kind} payload: {reason}")]
    Malformed {
        /// The kind the payload claimed to be.
        kind: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl ClassifyError {
    /// Creates a malformed-payload error.
    pub fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            kind,
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error must stop the ingestion loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownEventKind(_))
    }
}

// =============================================================================
// Driver Errors
// =============================================================================

/// Errors reported by a [`Driver`](crate::Driver) when delivering replies.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The platform rejected or failed to deliver the reply.
    #[error("failed to deliver reply to channel '{channel_id}': {reason}")]
    DeliveryFailed {
        /// Channel the reply was addressed to.
        channel_id: String,
        /// Reason reported by the platform.
        reason: String,
    },

    /// The driver has no live session.
    #[error("driver is disconnected")]
    Disconnected,

    /// Any other driver-specific failure.
    #[error(transparent)]
    Other(BoxError),
}

impl DriverError {
    /// Creates a delivery failure error.
    pub fn delivery_failed(channel_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            channel_id: channel_id.into(),
            reason: reason.into(),
        }
    }
}
