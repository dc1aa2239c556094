//! # Relay
//!
//! A plugin-based chat bot framework.
//!
//! ## Overview
//!
//! Plugins declare which messages and webhooks they want with pattern
//! registrations. The plugin manager collects those registrations into
//! routing tables and fans every incoming event out to each matching handler.
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌─────────┐     ┌──────────────────────┐
//! │ event stream │──▶│ classifier │──▶│ runtime │──┬─▶│ ^ping$  → Echo::ping │
//! └──────────────┘   └────────────┘   │  loop   │  ├─▶│ ^help$  → HelpPlugin │
//! ┌──────────────┐                    │         │  └─▶│ deployed → Ci::hook  │
//! │  webhooks    │───────────────────▶│         │     └──────────────────────┘
//! └──────────────┘                    └─────────┘
//! ```
//!
//! - **Core**: event types and the seams to the chat platform
//! - **Framework**: registration, plugins, routing and help
//! - **Runtime**: configuration, logging and the ingestion loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use relay::prelude::*;
//!
//! #[derive(Default)]
//! struct Echo;
//!
//! impl Echo {
//!     async fn ping(self: Arc<Self>, _msg: MessageContext, _args: MatchArgs) -> &'static str {
//!         "pong"
//!     }
//!
//!     async fn echo(self: Arc<Self>, _msg: MessageContext, args: MatchArgs) -> String {
//!         args.get(0).unwrap_or_default().to_owned()
//!     }
//! }
//!
//! impl Plugin for Echo {
//!     fn doc(&self) -> &str {
//!         "Echoes things back."
//!     }
//!
//!     fn listeners(&self) -> Vec<Listener<Self>> {
//!         vec![
//!             listen_to("^ping$").handler(Self::ping).doc("Replies pong."),
//!             listen_to("^echo (.*)$").needs_mention().handler(Self::echo),
//!         ]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut runtime = RelayRuntime::new();
//!     runtime.plugin(HelpPlugin::new())?.plugin(Echo)?;
//!     runtime.run(driver, events, JsonClassifier::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `command` (default): clap-parsed command listeners
//! - `toml-config` (default): `relay.toml` configuration files
//! - `yaml-config`: `relay.yaml` configuration files
//! - `json-log`: JSON log output

pub use relay_core as core;
pub use relay_framework as framework;
pub use relay_runtime as runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    // Runtime - main entry point
    pub use relay_runtime::{RelayRuntime, WebhookSender};

    // Events and platform seams
    pub use relay_core::{
        BoxError, ChannelType, Driver, Event, EventStream, JsonClassifier, JsonWebhookClassifier,
        MessageEvent, WebhookEvent,
    };

    // Plugins and registration
    pub use relay_framework::prelude::*;
    pub use relay_framework::{HelpPlugin, PluginManager, Settings};

    // Logging
    pub use relay_runtime::prelude::*;
}
