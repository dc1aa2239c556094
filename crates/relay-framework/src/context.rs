//! Contexts handed to handlers and plugin hooks.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use relay_core::{Driver, DriverError, MessageEvent, WebhookEvent, WorkerPool};
use serde_json::Value;

use crate::manager::ManagerHandle;
use crate::settings::Settings;

// ─── MessageContext ───────────────────────────────────────────────────────────

/// A message being handled, plus the driver to answer it with.
///
/// Dereferences to the underlying [`MessageEvent`]:
///
/// ```rust,ignore
/// async fn echo(self: Arc<Self>, msg: MessageContext, _: MatchArgs) -> String {
///     format!("{} said: {}", msg.sender_name, msg.text)
/// }
/// ```
#[derive(Clone)]
pub struct MessageContext {
    event: Arc<MessageEvent>,
    driver: Arc<dyn Driver>,
}

impl MessageContext {
    pub fn new(event: Arc<MessageEvent>, driver: Arc<dyn Driver>) -> Self {
        Self { event, driver }
    }

    pub fn event(&self) -> &Arc<MessageEvent> {
        &self.event
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Replies in the channel the message was posted in.
    pub async fn reply(&self, text: &str) -> Result<(), DriverError> {
        self.driver.reply_to(&self.event, text, false).await
    }

    /// Replies to the sender in a direct message.
    pub async fn reply_direct(&self, text: &str) -> Result<(), DriverError> {
        self.driver.reply_to(&self.event, text, true).await
    }
}

impl Deref for MessageContext {
    type Target = MessageEvent;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageContext")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

// ─── WebhookContext ───────────────────────────────────────────────────────────

/// A webhook being handled. Dereferences to the [`WebhookEvent`].
#[derive(Clone)]
pub struct WebhookContext {
    event: Arc<WebhookEvent>,
    driver: Arc<dyn Driver>,
}

impl WebhookContext {
    pub fn new(event: Arc<WebhookEvent>, driver: Arc<dyn Driver>) -> Self {
        Self { event, driver }
    }

    pub fn event(&self) -> &Arc<WebhookEvent> {
        &self.event
    }

    /// Driver for posting follow-up messages.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }
}

impl Deref for WebhookContext {
    type Target = WebhookEvent;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl fmt::Debug for WebhookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookContext")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

// ─── PluginContext ────────────────────────────────────────────────────────────

/// Context passed to [`Plugin::initialize`](crate::Plugin::initialize).
///
/// Gives the plugin access to the driver, the bot settings, its own
/// configuration section and a handle on the manager that owns it.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(serde::Deserialize, Default)]
/// #[serde(default)]
/// struct GreeterConfig { greeting: String }
///
/// fn initialize(&mut self, ctx: &PluginContext) -> Result<(), BoxError> {
///     self.config = ctx.config::<GreeterConfig>()?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct PluginContext {
    plugin: String,
    driver: Arc<dyn Driver>,
    settings: Arc<Settings>,
    manager: ManagerHandle,
    worker_pool: Arc<dyn WorkerPool>,
}

impl PluginContext {
    pub(crate) fn new(
        plugin: String,
        driver: Arc<dyn Driver>,
        settings: Arc<Settings>,
        manager: ManagerHandle,
        worker_pool: Arc<dyn WorkerPool>,
    ) -> Self {
        Self {
            plugin,
            driver,
            settings,
            manager,
            worker_pool,
        }
    }

    /// Name of the plugin being initialized.
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Handle on the manager. Its routing tables become visible once
    /// initialization completes.
    pub fn manager(&self) -> &ManagerHandle {
        &self.manager
    }

    /// The pool blocking handlers run on unless the plugin supplies its own.
    pub fn worker_pool(&self) -> &Arc<dyn WorkerPool> {
        &self.worker_pool
    }

    /// Deserialises this plugin's configuration section into `T`.
    ///
    /// A missing section is read as an empty object, so a `T` with
    /// `#[serde(default)]` always succeeds.
    pub fn config<T>(&self) -> serde_json::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        match self.settings.plugin_section(&self.plugin) {
            Some(section) => T::deserialize(section),
            None => T::deserialize(&Value::Object(Default::default())),
        }
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin", &self.plugin)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
