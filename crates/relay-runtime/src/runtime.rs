//! Event ingestion loop.
//!
//! ```rust,ignore
//! use relay_runtime::RelayRuntime;
//! use relay_core::JsonClassifier;
//!
//! let mut runtime = RelayRuntime::builder().config_file("relay.toml").build()?;
//! runtime.plugin(HelpPlugin::new())?.plugin(Greeter::default())?;
//!
//! // Hand this to the HTTP server receiving webhooks.
//! let webhooks = runtime.webhook_sender();
//!
//! runtime.run(driver, event_stream, JsonClassifier::new()).await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use relay_core::{
    Driver, Event, EventClassifier, EventStream, JsonWebhookClassifier, WebhookClassifier,
    WebhookEvent, WorkerPool,
};
use relay_framework::{ConfigurationError, Plugin, PluginManager, Router, Settings};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

use crate::config::{ConfigLoader, ConfigResult, RelayConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Connects a [`PluginManager`] to an event stream.
///
/// Every classified event is routed on its own task, so a slow handler never
/// delays the next event. Handler failures are logged and never stop the
/// loop; only a fatal classification error does.
pub struct RelayRuntime {
    config: RelayConfig,
    manager: PluginManager,
    webhook_tx: mpsc::UnboundedSender<WebhookEvent>,
    webhook_rx: mpsc::UnboundedReceiver<WebhookEvent>,
    webhook_classifier: Arc<dyn WebhookClassifier>,
}

impl RelayRuntime {
    /// Creates a runtime from the configuration found in the current
    /// directory, falling back to defaults.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                RelayConfig::default()
            });

        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration and initializes logging from it.
    pub fn from_config(config: &RelayConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            workers = config.bot.threadpool_num_workers,
            "Runtime initialized from configuration"
        );

        let (webhook_tx, webhook_rx) = mpsc::unbounded_channel();
        Self {
            config: config.clone(),
            manager: PluginManager::new(),
            webhook_tx,
            webhook_rx,
            webhook_classifier: Arc::new(JsonWebhookClassifier),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.config.bot
    }

    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }

    /// Adds a plugin. Plugins are initialized in the order they are added.
    pub fn plugin<P: Plugin>(&mut self, plugin: P) -> RuntimeResult<&mut Self> {
        self.manager.add_plugin(plugin)?;
        Ok(self)
    }

    /// Runs blocking handlers on `pool` instead of the default thread pool.
    pub fn worker_pool(&mut self, pool: Arc<dyn WorkerPool>) -> &mut Self {
        self.manager = std::mem::take(&mut self.manager).with_worker_pool(pool);
        self
    }

    /// Sets how [`WebhookSender::post`] turns requests into events.
    ///
    /// Only affects senders created afterwards.
    pub fn webhook_classifier(&mut self, classifier: impl WebhookClassifier) -> &mut Self {
        self.webhook_classifier = Arc::new(classifier);
        self
    }

    /// A handle for queuing webhook requests into the loop.
    pub fn webhook_sender(&self) -> WebhookSender {
        WebhookSender {
            tx: self.webhook_tx.clone(),
            classifier: Arc::clone(&self.webhook_classifier),
        }
    }

    /// Runs until Ctrl+C or SIGTERM, or until the event stream closes.
    pub async fn run<S, C>(self, driver: Arc<dyn Driver>, stream: S, classifier: C) -> RuntimeResult<()>
    where
        S: EventStream,
        C: EventClassifier,
    {
        info!("Relay runtime is now running. Press Ctrl+C to stop.");
        self.run_until(driver, stream, classifier, wait_for_shutdown())
            .await
    }

    /// Runs until `shutdown` completes or the event stream closes.
    ///
    /// Initializes and starts the plugins first. On exit, plugins are
    /// stopped and in-flight dispatches are awaited.
    pub async fn run_until<S, C, F>(
        mut self,
        driver: Arc<dyn Driver>,
        mut stream: S,
        classifier: C,
        shutdown: F,
    ) -> RuntimeResult<()>
    where
        S: EventStream,
        C: EventClassifier,
        F: Future<Output = ()>,
    {
        let settings = Arc::new(self.config.bot.clone());
        self.manager
            .initialize(Arc::clone(&driver), Arc::clone(&settings))?;
        self.manager.start().await?;
        let router = self
            .manager
            .router()
            .ok_or(ConfigurationError::ManagerNotReady)?;

        let tracker = TaskTracker::new();
        let ingest = Ingest {
            router,
            settings,
            bot_user_id: driver.user_id().to_owned(),
            tracker: tracker.clone(),
        };

        tokio::pin!(shutdown);
        let result = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }

                Some(hook) = self.webhook_rx.recv() => {
                    ingest.dispatch(Event::Webhook(hook));
                }

                raw = stream.next_event() => {
                    let Some(raw) = raw else {
                        info!("Event stream closed");
                        break Ok(());
                    };
                    match classifier.classify(&raw) {
                        Ok(classified) => match classified.into_event() {
                            Some(event) => ingest.dispatch(event),
                            None => trace!("Ignoring unrecognized frame"),
                        },
                        Err(e) if e.is_fatal() => {
                            error!(error = %e, "Fatal classification error, stopping");
                            break Err(RuntimeError::from(e));
                        }
                        Err(e) => warn!(error = %e, "Dropping malformed frame"),
                    }
                }
            }
        };

        // Accepted events finish dispatching before any plugin is stopped.
        tracker.close();
        debug!(pending = tracker.len(), "Waiting for in-flight dispatches");
        tracker.wait().await;
        if let Err(e) = self.manager.stop().await {
            warn!(error = %e, "Failed to stop plugins");
        }
        info!("Relay runtime stopped");

        result
    }
}

impl Default for RelayRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run state shared by every dispatch.
struct Ingest {
    router: Arc<Router>,
    settings: Arc<Settings>,
    bot_user_id: String,
    tracker: TaskTracker,
}

impl Ingest {
    /// Whether a message should be routed at all.
    fn accepts(&self, event: &Event) -> bool {
        let Event::Message(message) = event else {
            return true;
        };
        if message.sender_id == self.bot_user_id {
            trace!(post_id = %message.post_id, "Ignoring own message");
            return false;
        }
        if self.settings.is_ignored(&message.sender_name) {
            debug!(sender = %message.sender_name, "Ignoring message from ignored user");
            return false;
        }
        true
    }

    fn dispatch(&self, event: Event) {
        if !self.accepts(&event) {
            return;
        }
        let router = Arc::clone(&self.router);
        self.tracker.spawn(async move {
            let report = router.route(event).await;
            for failure in &report.failures {
                error!(
                    plugin = %failure.plugin(),
                    listener = %failure.listener(),
                    error = %failure,
                    "Handler failed"
                );
            }
        });
    }
}

/// Waits for Ctrl+C or SIGTERM.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// WebhookSender
// =============================================================================

/// Queues webhook requests into a running [`RelayRuntime`].
///
/// Cloneable; typically held by the HTTP server receiving the webhooks.
#[derive(Clone)]
pub struct WebhookSender {
    tx: mpsc::UnboundedSender<WebhookEvent>,
    classifier: Arc<dyn WebhookClassifier>,
}

impl WebhookSender {
    /// Classifies a request and queues the resulting event.
    pub fn post(&self, path: &str, body: &[u8]) -> RuntimeResult<()> {
        let event = self.classifier.classify(path, body)?;
        self.send(event)
    }

    /// Queues an already classified event.
    pub fn send(&self, event: WebhookEvent) -> RuntimeResult<()> {
        debug!(webhook_id = %event.webhook_id, "Webhook queued");
        self.tx
            .send(event)
            .map_err(|_| RuntimeError::WebhookQueueClosed)
    }
}

impl std::fmt::Debug for WebhookSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSender")
            .field("closed", &self.tx.is_closed())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a `RelayRuntime` with custom configuration.
///
/// ```rust,ignore
/// let runtime = RelayRuntime::builder()
///     .config_file("config/relay.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: RelayConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn build(self) -> ConfigResult<RelayRuntime> {
        let config = self.config_loader.load()?;
        Ok(RelayRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
