//! The plugin trait.
//!
//! A plugin is a value that groups related handlers with the state they
//! share. Handlers receive the plugin as `Arc<Self>`:
//!
//! ```rust,ignore
//! use relay_framework::prelude::*;
//!
//! #[derive(Default)]
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! #[derive(serde::Deserialize, Default)]
//! #[serde(default)]
//! struct GreeterConfig {
//!     greeting: Option<String>,
//! }
//!
//! impl Greeter {
//!     async fn hello(self: Arc<Self>, msg: MessageContext, _: MatchArgs) -> String {
//!         format!("{}, {}!", self.greeting, msg.sender_name)
//!     }
//! }
//!
//! #[async_trait]
//! impl Plugin for Greeter {
//!     fn initialize(&mut self, ctx: &PluginContext) -> Result<(), BoxError> {
//!         let config: GreeterConfig = ctx.config()?;
//!         self.greeting = config.greeting.unwrap_or_else(|| "Hello".into());
//!         Ok(())
//!     }
//!
//!     fn listeners(&self) -> Vec<Listener<Self>> {
//!         vec![listen_to("^hello$").needs_mention().handler(Self::hello)]
//!     }
//! }
//! ```

mod slot;

pub(crate) use slot::{ErasedPlugin, PluginSlot};

use std::any::type_name;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{BoxError, WorkerPool};
use tracing::debug;

use crate::context::PluginContext;
use crate::registration::{Listener, short_type_name};

/// Lifecycle of a plugin inside a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Uninitialized,
    Initialized,
    Started,
    Stopped,
}

/// A group of handlers sharing state.
#[async_trait]
pub trait Plugin: Send + Sync + Sized + 'static {
    /// Name used in logs, help output and for the configuration section.
    ///
    /// Defaults to the type name.
    fn name(&self) -> String {
        short_type_name(type_name::<Self>()).to_owned()
    }

    /// Description shown alongside the plugin's handlers in help output.
    fn doc(&self) -> &str {
        ""
    }

    /// Called once before discovery, in declaration order.
    fn initialize(&mut self, ctx: &PluginContext) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    /// The handlers this plugin exposes.
    fn listeners(&self) -> Vec<Listener<Self>>;

    /// Pool for this plugin's blocking handlers. `None` uses the manager's.
    fn worker_pool(&self) -> Option<Arc<dyn WorkerPool>> {
        None
    }

    async fn on_start(&self) {
        debug!(plugin = %self.name(), "Plugin started");
    }

    async fn on_stop(&self) {
        debug!(plugin = %self.name(), "Plugin stopped");
    }
}
