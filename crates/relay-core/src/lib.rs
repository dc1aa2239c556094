//! Relay Core - event model and platform seams for the Relay bot framework.
//!
//! This crate is deliberately small: it defines what an event looks like and
//! the traits through which the dispatcher talks to the outside world.
//!
//! - [`Event`], [`MessageEvent`], [`WebhookEvent`]: classified inbound events
//! - [`EventStream`], [`EventClassifier`], [`WebhookClassifier`]: ingestion
//! - [`Driver`]: replying on the platform
//! - [`WorkerPool`]: executing blocking handlers off the event path

pub mod classify;
pub mod driver;
pub mod error;
pub mod event;

pub use classify::{
    Classified, EventClassifier, EventStream, JsonClassifier, JsonWebhookClassifier,
    WebhookClassifier,
};
pub use driver::{BlockingJob, Driver, WorkerPool};
pub use error::{BoxError, ClassifyError, DriverError, HandlerResult};
pub use event::{ChannelType, Event, EventKind, MessageEvent, RawEvent, WebhookEvent};
