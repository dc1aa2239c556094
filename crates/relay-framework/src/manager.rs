//! Plugin manager: owns the plugins and builds the routing tables.
//!
//! The manager moves through three states:
//!
//! 1. **Unconfigured**: plugins are added with [`PluginManager::add_plugin`].
//! 2. **Initializing**: [`PluginManager::initialize`] calls every plugin's
//!    `initialize` in declaration order, then discovers their listeners.
//! 3. **Ready**: the routing tables are frozen and events can be routed.
//!
//! Once ready, the tables are shared through a [`Router`] and never mutated.

use std::fmt;
use std::sync::{Arc, OnceLock};

use relay_core::{Driver, Event, EventKind, MessageEvent, WebhookEvent, WorkerPool};
use tracing::{debug, info};

use crate::context::PluginContext;
use crate::dispatch::{DispatchReport, Router};
use crate::error::{ConfigurationError, ConfigurationResult};
use crate::executor::ThreadPool;
use crate::help::{FunctionInfo, render_help};
use crate::plugin::{ErasedPlugin, Plugin, PluginSlot, PluginState};
use crate::routing::RoutingTable;
use crate::settings::Settings;

// =============================================================================
// ManagerHandle
// =============================================================================

/// Cloneable, read-only view of a manager's routing state.
///
/// Plugins receive one during initialization. It stays empty until the
/// manager is ready.
#[derive(Clone, Default)]
pub struct ManagerHandle {
    router: Arc<OnceLock<Arc<Router>>>,
}

impl ManagerHandle {
    pub fn router(&self) -> Option<&Arc<Router>> {
        self.router.get()
    }

    pub fn is_ready(&self) -> bool {
        self.router.get().is_some()
    }

    /// Help entries for every registered function. Empty before the manager
    /// is ready.
    pub fn get_help(&self) -> Vec<FunctionInfo> {
        self.router().map(|r| r.get_help()).unwrap_or_default()
    }

    pub fn get_help_string(&self) -> String {
        render_help(&self.get_help())
    }

    fn publish(&self, router: Arc<Router>) {
        // Only reachable once per manager.
        let _ = self.router.set(router);
    }
}

impl fmt::Debug for ManagerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

// =============================================================================
// PluginManager
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Unconfigured,
    Initializing,
    Ready,
}

/// Owns the plugins and the routing tables built from them.
pub struct PluginManager {
    plugins: Vec<Box<dyn ErasedPlugin>>,
    state: ManagerState,
    /// Pool injected with [`with_worker_pool`](Self::with_worker_pool).
    worker_pool: Option<Arc<dyn WorkerPool>>,
    /// Pool shared by plugins without their own, set on initialization.
    shared_pool: Option<Arc<dyn WorkerPool>>,
    handle: ManagerHandle,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            state: ManagerState::Unconfigured,
            worker_pool: None,
            shared_pool: None,
            handle: ManagerHandle::default(),
        }
    }

    /// Uses `pool` for blocking handlers instead of a [`ThreadPool`] sized
    /// from the settings.
    pub fn with_worker_pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        self.worker_pool = Some(pool);
        self
    }

    // ─── Plugin registration ─────────────────────────────────────────────────

    /// Adds a plugin. Plugins are initialized in the order they are added.
    ///
    /// Fails once [`initialize`](Self::initialize) has been called.
    pub fn add_plugin<P: Plugin>(&mut self, plugin: P) -> ConfigurationResult<()> {
        if self.state != ManagerState::Unconfigured {
            return Err(ConfigurationError::RegistrationClosed);
        }
        let slot = PluginSlot::new(plugin);
        debug!(plugin = %slot.name(), "Plugin added");
        self.plugins.push(Box::new(slot));
        Ok(())
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Name and lifecycle state of every plugin, in declaration order.
    pub fn plugin_states(&self) -> Vec<(&str, PluginState)> {
        self.plugins.iter().map(|p| (p.name(), p.state())).collect()
    }

    pub fn handle(&self) -> &ManagerHandle {
        &self.handle
    }

    // ─── Initialization ──────────────────────────────────────────────────────

    /// Initializes every plugin and builds the routing tables.
    ///
    /// Every plugin is initialized before any listener is discovered, so a
    /// plugin can shape its listeners from its configuration. On error the
    /// manager stays in [`ManagerState::Initializing`] and cannot be used.
    pub fn initialize(
        &mut self,
        driver: Arc<dyn Driver>,
        settings: Arc<Settings>,
    ) -> ConfigurationResult<()> {
        if self.state != ManagerState::Unconfigured {
            return Err(ConfigurationError::ManagerAlreadyInitialized);
        }
        self.state = ManagerState::Initializing;

        let pool: Arc<dyn WorkerPool> = match &self.worker_pool {
            Some(pool) => Arc::clone(pool),
            None => Arc::new(ThreadPool::new(settings.threadpool_num_workers)),
        };

        for plugin in &mut self.plugins {
            let ctx = PluginContext::new(
                plugin.name().to_owned(),
                Arc::clone(&driver),
                Arc::clone(&settings),
                self.handle.clone(),
                Arc::clone(&pool),
            );
            plugin.initialize(&ctx)?;
        }

        let mut message = RoutingTable::new();
        let mut webhook = RoutingTable::new();
        for plugin in &mut self.plugins {
            for descriptor in plugin.discover(&pool)? {
                match descriptor.kind() {
                    EventKind::Message => message.insert(descriptor),
                    EventKind::Webhook => webhook.insert(descriptor),
                }
            }
        }

        info!(
            plugins = self.plugins.len(),
            message_handlers = message.len(),
            webhook_handlers = webhook.len(),
            "Plugin manager ready"
        );

        self.handle
            .publish(Arc::new(Router::new(message, webhook, driver)));
        self.shared_pool = Some(pool);
        self.state = ManagerState::Ready;
        Ok(())
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Runs every plugin's `on_start` hook in declaration order.
    pub async fn start(&mut self) -> ConfigurationResult<()> {
        if self.state != ManagerState::Ready {
            return Err(ConfigurationError::ManagerNotReady);
        }
        for plugin in &mut self.plugins {
            plugin.start().await;
        }
        Ok(())
    }

    /// Runs every plugin's `on_stop` hook and closes the shared worker pool.
    pub async fn stop(&mut self) -> ConfigurationResult<()> {
        if self.state != ManagerState::Ready {
            return Err(ConfigurationError::ManagerNotReady);
        }
        for plugin in &mut self.plugins {
            plugin.stop().await;
        }
        if let Some(pool) = &self.shared_pool {
            pool.close();
        }
        info!("Plugin manager stopped");
        Ok(())
    }

    // ─── Dispatch ────────────────────────────────────────────────────────────

    /// The routing state, once ready.
    pub fn router(&self) -> Option<Arc<Router>> {
        self.handle.router().cloned()
    }

    fn ready_router(&self) -> ConfigurationResult<&Arc<Router>> {
        self.handle.router().ok_or(ConfigurationError::ManagerNotReady)
    }

    pub async fn route(&self, event: Event) -> ConfigurationResult<DispatchReport> {
        Ok(self.ready_router()?.route(event).await)
    }

    pub async fn route_message(&self, event: MessageEvent) -> ConfigurationResult<DispatchReport> {
        Ok(self.ready_router()?.route_message(Arc::new(event)).await)
    }

    pub async fn route_webhook(&self, event: WebhookEvent) -> ConfigurationResult<DispatchReport> {
        Ok(self.ready_router()?.route_webhook(Arc::new(event)).await)
    }

    // ─── Help ────────────────────────────────────────────────────────────────

    pub fn get_help(&self) -> Vec<FunctionInfo> {
        self.handle.get_help()
    }

    pub fn get_help_string(&self) -> String {
        self.handle.get_help_string()
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.plugin_states())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use relay_core::{BlockingJob, BoxError, ChannelType};
    use serde_json::json;

    use super::*;
    use crate::context::{MessageContext, WebhookContext};
    use crate::error::HandlerFailure;
    use crate::handler::Reply;
    use crate::help::HelpPlugin;
    use crate::pattern::MatchArgs;
    use crate::registration::{Listener, listen_to, listen_webhook};
    use crate::testing::MockDriver;

    #[derive(Default)]
    struct Example {
        hooks: Arc<AtomicUsize>,
    }

    impl Example {
        async fn ping(self: Arc<Self>, _msg: MessageContext, _args: MatchArgs) -> &'static str {
            "pong"
        }

        async fn hook(self: Arc<Self>, ctx: WebhookContext) {
            assert_eq!(ctx.text_field("text"), Some("hello"));
            self.hooks.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Plugin for Example {
        fn doc(&self) -> &str {
            "Example plugin."
        }

        fn listeners(&self) -> Vec<Listener<Self>> {
            vec![
                listen_to("^ping$").handler(Self::ping).doc("Replies pong."),
                listen_webhook("hook1").handler(Self::hook),
            ]
        }
    }

    #[derive(Default)]
    struct Stacked {
        calls: Arc<AtomicUsize>,
    }

    impl Stacked {
        async fn answer(self: Arc<Self>, _msg: MessageContext, args: MatchArgs) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            format!("matched {}", args.matched())
        }
    }

    impl Plugin for Stacked {
        fn listeners(&self) -> Vec<Listener<Self>> {
            vec![
                listen_to("^pingpong$")
                    .handler(Self::answer)
                    .listen_to("^pp$")
                    .stack(listen_to("^secret$").direct_only()),
            ]
        }
    }

    struct Failing;

    impl Failing {
        async fn boom(self: Arc<Self>, _msg: MessageContext, _args: MatchArgs) -> Result<(), BoxError> {
            Err("boom".into())
        }

        async fn panics(self: Arc<Self>, _msg: MessageContext, _args: MatchArgs) {
            panic!("handler exploded");
        }
    }

    impl Plugin for Failing {
        fn listeners(&self) -> Vec<Listener<Self>> {
            vec![
                listen_to("^fail$").handler(Self::boom),
                listen_to("^panic$").handler(Self::panics),
            ]
        }
    }

    fn message(text: &str) -> MessageEvent {
        MessageEvent::new(text)
            .with_sender("u1", "alice")
            .with_channel("c1", "town-square", ChannelType::Open)
    }

    fn ready(manager: &mut PluginManager, driver: &Arc<MockDriver>) {
        let driver: Arc<dyn Driver> = driver.clone();
        manager
            .initialize(driver, Arc::new(Settings::default()))
            .unwrap();
    }

    #[tokio::test]
    async fn test_message_and_webhook_routing() {
        let plugin = Example::default();
        let hooks = plugin.hooks.clone();
        let driver = Arc::new(MockDriver::new("bot"));

        let mut manager = PluginManager::new();
        manager.add_plugin(plugin).unwrap();
        manager.add_plugin(Stacked::default()).unwrap();
        ready(&mut manager, &driver);
        manager.start().await.unwrap();

        let report = manager.route_message(message("ping")).await.unwrap();
        assert_eq!(report.invoked, 1);
        assert!(report.succeeded());
        assert_eq!(driver.replies().last().map(|r| r.0.as_str()), Some("pong"));

        let report = manager.route_message(message("pingpong")).await.unwrap();
        assert_eq!(report.invoked, 1);
        assert_eq!(
            driver.replies().last().map(|r| r.0.as_str()),
            Some("matched pingpong")
        );

        let report = manager
            .route_webhook(WebhookEvent::new("hook1", json!({ "text": "hello" })))
            .await
            .unwrap();
        assert_eq!(report.invoked, 1);
        assert_eq!(hooks.load(Ordering::SeqCst), 1);

        // Webhook ids match exactly.
        let report = manager
            .route_webhook(WebhookEvent::new("hook10", json!({})))
            .await
            .unwrap();
        assert!(report.is_empty());

        let report = manager.route_message(message("nothing here")).await.unwrap();
        assert!(report.is_empty());
        manager.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stacked_registrations_share_one_handler() {
        let plugin = Stacked::default();
        let calls = plugin.calls.clone();
        let driver = Arc::new(MockDriver::new("bot"));

        let mut manager = PluginManager::new();
        manager.add_plugin(plugin).unwrap();
        ready(&mut manager, &driver);

        manager.route_message(message("pp")).await.unwrap();
        // `secret` only fires in direct messages.
        let report = manager.route_message(message("secret")).await.unwrap();
        assert!(report.is_empty());

        let direct = MessageEvent::new("secret")
            .with_sender("u1", "alice")
            .with_channel("d1", "", ChannelType::Direct);
        let report = manager.route_message(direct).await.unwrap();
        assert_eq!(report.invoked, 1);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(manager.get_help().len(), 3);
    }

    #[tokio::test]
    async fn test_direct_message_without_mention_skips_mention_handlers() {
        struct Whisper {
            calls: Arc<AtomicUsize>,
        }

        impl Plugin for Whisper {
            fn listeners(&self) -> Vec<Listener<Self>> {
                vec![listen_to("^secret$").needs_mention().handler(
                    |p: Arc<Self>, _m, _a| async move {
                        p.calls.fetch_add(1, Ordering::SeqCst);
                    },
                )]
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let driver = Arc::new(MockDriver::new("bot"));
        let mut manager = PluginManager::new();
        manager
            .add_plugin(Whisper {
                calls: calls.clone(),
            })
            .unwrap();
        ready(&mut manager, &driver);

        let direct = || {
            MessageEvent::new("secret")
                .with_sender("u1", "alice")
                .with_channel("d1", "bot__alice", ChannelType::Direct)
        };
        let report = manager.route_message(direct()).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let report = manager
            .route_message(direct().with_mention("bot"))
            .await
            .unwrap();
        assert_eq!(report.invoked, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_reported_and_isolated() {
        let driver = Arc::new(MockDriver::new("bot"));
        let mut manager = PluginManager::new();
        manager.add_plugin(Failing).unwrap();
        manager.add_plugin(Example::default()).unwrap();
        ready(&mut manager, &driver);

        let report = manager.route_message(message("fail")).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        match &report.failures[0] {
            HandlerFailure::Failed {
                plugin, listener, ..
            } => {
                assert_eq!(plugin, "Failing");
                assert_eq!(listener, "boom");
            }
            other => panic!("unexpected failure: {other}"),
        }

        let report = manager.route_message(message("panic")).await.unwrap();
        assert!(matches!(
            &report.failures[0],
            HandlerFailure::Panicked { message, .. } if message == "handler exploded"
        ));

        // Later events still route.
        let report = manager.route_message(message("ping")).await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.invoked, 1);
    }

    #[derive(Default)]
    struct Duplicated {
        calls: Arc<AtomicUsize>,
    }

    impl Plugin for Duplicated {
        fn listeners(&self) -> Vec<Listener<Self>> {
            let handler = |p: Arc<Self>, _m: MessageContext, _a: MatchArgs| async move {
                p.calls.fetch_add(1, Ordering::SeqCst);
            };
            vec![
                listen_to("^dup$").handler(handler),
                listen_to("^dup$").handler(handler),
            ]
        }
    }

    #[tokio::test]
    async fn test_identical_registrations_fan_out() {
        let plugin = Duplicated::default();
        let calls = plugin.calls.clone();
        let driver = Arc::new(MockDriver::new("bot"));

        let mut manager = PluginManager::new();
        manager.add_plugin(plugin).unwrap();
        ready(&mut manager, &driver);

        let router = manager.router().unwrap();
        assert_eq!(router.message_table().buckets().len(), 1);
        assert_eq!(router.message_table().len(), 2);

        let report = manager.route_message(message("dup")).await.unwrap();
        assert_eq!(report.invoked, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct Worker;

    impl Worker {
        fn crunch(self: Arc<Self>, _msg: MessageContext, args: MatchArgs) -> Reply {
            std::thread::sleep(Duration::from_millis(10));
            Reply::channel(format!("crunched {}", args.get(0).unwrap_or_default()))
        }
    }

    impl Plugin for Worker {
        fn listeners(&self) -> Vec<Listener<Self>> {
            vec![listen_to("^crunch (\\d+)$").blocking(Self::crunch)]
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_handlers_run_on_the_pool() {
        let pool = Arc::new(ThreadPool::new(2));
        let driver = Arc::new(MockDriver::new("bot"));

        let mut manager = PluginManager::new().with_worker_pool(pool.clone());
        manager.add_plugin(Worker).unwrap();
        ready(&mut manager, &driver);

        let report = manager.route_message(message("crunch 42")).await.unwrap();
        assert_eq!(report.submitted, 1);
        assert_eq!(report.invoked, 0);

        pool.drain().await;
        assert_eq!(driver.replies()[0].0, "crunched 42");
    }

    #[derive(Default)]
    struct HoldingPool {
        jobs: parking_lot::Mutex<Vec<BlockingJob>>,
    }

    impl WorkerPool for HoldingPool {
        fn submit(&self, job: BlockingJob) {
            self.jobs.lock().push(job);
        }

        fn close(&self) {}
    }

    #[tokio::test]
    async fn test_submitted_job_outlives_the_manager() {
        let pool = Arc::new(HoldingPool::default());
        let driver = Arc::new(MockDriver::new("bot"));

        let mut manager = PluginManager::new().with_worker_pool(pool.clone());
        manager.add_plugin(Worker).unwrap();
        ready(&mut manager, &driver);
        let report = manager.route_message(message("crunch 7")).await.unwrap();
        assert_eq!(report.submitted, 1);

        manager.stop().await.unwrap();
        drop(manager);

        let jobs = std::mem::take(&mut *pool.jobs.lock());
        for job in jobs {
            job().await.unwrap();
        }
        assert_eq!(driver.replies()[0].0, "crunched 7");
    }

    #[derive(Default)]
    struct CountingPool {
        submitted: AtomicUsize,
        closed: AtomicUsize,
    }

    impl WorkerPool for CountingPool {
        fn submit(&self, _job: BlockingJob) {
            self.submitted.fetch_add(1, Ordering::SeqCst);
        }

        fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_injected_pool_is_used_and_closed() {
        let pool = Arc::new(CountingPool::default());
        let driver = Arc::new(MockDriver::new("bot"));

        let mut manager = PluginManager::new().with_worker_pool(pool.clone());
        manager.add_plugin(Worker).unwrap();
        ready(&mut manager, &driver);

        manager.route_message(message("crunch 1")).await.unwrap();
        manager.route_message(message("crunch 2")).await.unwrap();
        assert_eq!(pool.submitted.load(Ordering::SeqCst), 2);

        manager.stop().await.unwrap();
        assert_eq!(pool.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_help_plugin_lists_functions() {
        let driver = Arc::new(MockDriver::new("bot"));
        let mut manager = PluginManager::new();
        manager.add_plugin(HelpPlugin::new()).unwrap();
        manager.add_plugin(Example::default()).unwrap();
        assert!(manager.get_help().is_empty());

        ready(&mut manager, &driver);
        assert_eq!(manager.get_help().len(), 4);

        let report = manager.route_message(message("help")).await.unwrap();
        assert!(report.is_empty());

        let dm = MessageEvent::new("help")
            .with_sender("u1", "alice")
            .with_channel("d1", "bot__alice", ChannelType::Direct);
        let report = manager.route_message(dm).await.unwrap();
        assert_eq!(report.invoked, 1);

        let report = manager
            .route_message(message("help").with_mention("bot"))
            .await
            .unwrap();
        assert_eq!(report.invoked, 1);

        let replies = driver.replies();
        let (text, direct, _) = &replies[0];
        assert!(*direct);
        assert_eq!(text, &manager.get_help_string());
        assert!(text.contains("- `^ping$` - Replies pong."));
        assert!(text.contains("- `hook1` - (webhook) "));
        assert!(text.contains("- `^help$` `(*)` - Shows this help information."));
        assert!(text.contains("- `^help$` `(+)` - Shows this help information."));
        assert_eq!(replies.len(), 2);
    }

    #[tokio::test]
    async fn test_channel_help_is_opt_in() {
        let driver = Arc::new(MockDriver::new("bot"));
        let mut manager = PluginManager::new();
        manager.add_plugin(HelpPlugin::new().direct_help(false)).unwrap();
        let settings = Settings {
            respond_channel_help: true,
            ..Settings::default()
        };
        manager.initialize(driver.clone(), Arc::new(settings)).unwrap();

        let report = manager.route_message(message("!help")).await.unwrap();
        assert_eq!(report.invoked, 1);
        assert!(!driver.replies()[0].1);
    }

    #[test]
    fn test_state_transitions() {
        let driver = Arc::new(MockDriver::new("bot"));
        let mut manager = PluginManager::new();
        assert_eq!(manager.state(), ManagerState::Unconfigured);
        assert!(!manager.handle().is_ready());

        manager.add_plugin(Example::default()).unwrap();
        ready(&mut manager, &driver);
        assert_eq!(manager.state(), ManagerState::Ready);
        assert!(manager.handle().is_ready());
        assert_eq!(
            manager.plugin_states(),
            vec![("Example", PluginState::Initialized)]
        );

        assert!(matches!(
            manager.add_plugin(Stacked::default()),
            Err(ConfigurationError::RegistrationClosed)
        ));
        assert!(matches!(
            manager.initialize(driver, Arc::new(Settings::default())),
            Err(ConfigurationError::ManagerAlreadyInitialized)
        ));
    }

    #[tokio::test]
    async fn test_routing_before_initialize_fails() {
        let mut manager = PluginManager::new();
        assert!(matches!(
            manager.route_message(message("ping")).await,
            Err(ConfigurationError::ManagerNotReady)
        ));
        assert!(matches!(
            manager.start().await,
            Err(ConfigurationError::ManagerNotReady)
        ));
    }

    struct BadPattern;

    impl Plugin for BadPattern {
        fn listeners(&self) -> Vec<Listener<Self>> {
            vec![listen_to("[unclosed").handler(|_p: Arc<Self>, _m, _a| async {})]
        }
    }

    #[test]
    fn test_invalid_pattern_fails_initialization() {
        let driver = Arc::new(MockDriver::new("bot"));
        let mut manager = PluginManager::new();
        manager.add_plugin(BadPattern).unwrap();

        let err = manager
            .initialize(driver, Arc::new(Settings::default()))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidPattern { .. }));
        assert_eq!(manager.state(), ManagerState::Initializing);
        assert!(manager.get_help().is_empty());
    }

    #[derive(Default)]
    struct Configured {
        greeting: String,
    }

    #[derive(serde::Deserialize, Default)]
    #[serde(default)]
    struct GreeterConfig {
        greeting: Option<String>,
    }

    impl Plugin for Configured {
        fn initialize(&mut self, ctx: &PluginContext) -> Result<(), BoxError> {
            let config: GreeterConfig = ctx.config()?;
            self.greeting = config.greeting.unwrap_or_else(|| "hello".to_owned());
            Ok(())
        }

        fn listeners(&self) -> Vec<Listener<Self>> {
            // Listeners can depend on configuration read in `initialize`.
            vec![listen_to(format!("^{}$", self.greeting))
                .handler(|p: Arc<Self>, _m, _a| async move { p.greeting.clone() })]
        }
    }

    #[tokio::test]
    async fn test_plugins_are_configured_before_discovery() {
        let driver = Arc::new(MockDriver::new("bot"));
        let mut settings = Settings::default();
        settings
            .plugins
            .insert("Configured".to_owned(), json!({ "greeting": "ahoy" }));

        let mut manager = PluginManager::new();
        manager.add_plugin(Configured::default()).unwrap();
        manager.initialize(driver.clone(), Arc::new(settings)).unwrap();

        let report = manager.route_message(message("ahoy")).await.unwrap();
        assert_eq!(report.invoked, 1);
        assert_eq!(driver.replies()[0].0, "ahoy");
    }

    #[cfg(feature = "command")]
    mod command {
        use clap::Parser;

        use super::*;

        #[derive(Parser, Debug)]
        struct Deploy {
            /// Service to deploy.
            service: String,
            #[arg(long, default_value_t = 1)]
            replicas: u32,
        }

        struct Ops;

        impl Ops {
            async fn deploy(self: Arc<Self>, _msg: MessageContext, options: Deploy) -> String {
                format!("deploying {} x{}", options.service, options.replicas)
            }
        }

        impl Plugin for Ops {
            fn listeners(&self) -> Vec<Listener<Self>> {
                vec![listen_to("deploy").command(Self::deploy)]
            }
        }

        #[tokio::test]
        async fn test_command_parses_arguments() {
            let driver = Arc::new(MockDriver::new("bot"));
            let mut manager = PluginManager::new();
            manager.add_plugin(Ops).unwrap();
            ready(&mut manager, &driver);

            manager
                .route_message(message("deploy api --replicas 3"))
                .await
                .unwrap();
            assert_eq!(driver.replies()[0].0, "deploying api x3");

            manager.route_message(message("deploy")).await.unwrap();
            assert!(driver.replies()[1].0.contains("Usage"));

            let help = manager.get_help();
            assert!(help[0].is_command);
            assert!(help[0].function_doc.full().contains("--replicas"));
        }
    }
}
