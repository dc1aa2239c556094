//! # Relay Framework
//!
//! Plugin registration and event dispatch for chat bots.
//!
//! This layer provides:
//! - [`Plugin`]: a group of handlers sharing state
//! - [`listen_to`] / [`listen_webhook`]: declarative handler registration
//! - [`PluginManager`]: initialization, routing tables and dispatch
//! - [`HelpPlugin`]: help output built from registration metadata
//! - Clap-based command parsing (with the `command` feature)
//!
//! Events come in already classified (see `relay-core`); the runtime crate
//! wires a manager to an event stream.

pub mod context;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod handler;
pub mod help;
pub mod manager;
pub mod pattern;
pub mod plugin;
pub mod registration;
pub mod routing;
pub mod settings;

#[cfg(feature = "command")]
pub mod command;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{MessageContext, PluginContext, WebhookContext};
pub use dispatch::{DispatchReport, Router};
pub use error::{ConfigurationError, ConfigurationResult, HandlerFailure};
pub use executor::ThreadPool;
pub use handler::{
    AllowList, Doc, Execution, HandlerDescriptor, HandlerResponse, PluginRef, Reply, ScopeFlags,
    Trigger,
};
pub use help::{FunctionInfo, HelpPlugin, render_help};
pub use manager::{ManagerHandle, ManagerState, PluginManager};
pub use pattern::{MatchArgs, Pattern};
pub use plugin::{Plugin, PluginState};
pub use registration::{Listener, MessageListen, TriggerSpec, WebhookListen, listen_to, listen_webhook};
pub use routing::{Bucket, RoutingTable};
pub use settings::Settings;

#[cfg(feature = "command")]
pub use command::shell_split;

/// Everything a plugin author usually needs.
pub mod prelude {
    pub use std::sync::Arc;

    pub use async_trait::async_trait;
    pub use relay_core::BoxError;

    pub use crate::context::{MessageContext, PluginContext, WebhookContext};
    pub use crate::handler::Reply;
    pub use crate::pattern::MatchArgs;
    pub use crate::plugin::Plugin;
    pub use crate::registration::{Listener, listen_to, listen_webhook};
}
