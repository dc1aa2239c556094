//! Type-erased plugin storage used by the manager.

use std::sync::Arc;

use async_trait::async_trait;
use relay_core::WorkerPool;
use tracing::{debug, info};

use super::{Plugin, PluginState};
use crate::context::PluginContext;
use crate::error::{ConfigurationError, ConfigurationResult};
use crate::handler::{HandlerDescriptor, PluginRef};

/// Object-safe view of a plugin and its lifecycle state.
#[async_trait]
pub(crate) trait ErasedPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn state(&self) -> PluginState;

    fn initialize(&mut self, ctx: &PluginContext) -> ConfigurationResult<()>;

    /// Freezes the plugin behind an `Arc` and materialises its descriptors.
    fn discover(
        &mut self,
        default_pool: &Arc<dyn WorkerPool>,
    ) -> ConfigurationResult<Vec<Arc<HandlerDescriptor>>>;

    async fn start(&mut self);

    async fn stop(&mut self);
}

enum Instance<P> {
    /// Owned and mutable, before discovery.
    Pending(P),
    /// Shared with the descriptors bound to it.
    Live(Arc<P>),
    /// Transient state while moving between the two.
    Vacant,
}

pub(crate) struct PluginSlot<P> {
    name: String,
    state: PluginState,
    instance: Instance<P>,
}

impl<P: Plugin> PluginSlot<P> {
    pub(crate) fn new(plugin: P) -> Self {
        Self {
            name: plugin.name(),
            state: PluginState::Uninitialized,
            instance: Instance::Pending(plugin),
        }
    }

    fn live(&self) -> Option<&Arc<P>> {
        match &self.instance {
            Instance::Live(plugin) => Some(plugin),
            _ => None,
        }
    }
}

#[async_trait]
impl<P: Plugin> ErasedPlugin for PluginSlot<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> PluginState {
        self.state
    }

    fn initialize(&mut self, ctx: &PluginContext) -> ConfigurationResult<()> {
        let Instance::Pending(plugin) = &mut self.instance else {
            return Err(ConfigurationError::PluginAlreadyInitialized(self.name.clone()));
        };
        if self.state != PluginState::Uninitialized {
            return Err(ConfigurationError::PluginAlreadyInitialized(self.name.clone()));
        }

        plugin
            .initialize(ctx)
            .map_err(|source| ConfigurationError::PluginInit {
                plugin: self.name.clone(),
                source,
            })?;
        self.state = PluginState::Initialized;
        debug!(plugin = %self.name, "Plugin initialized");
        Ok(())
    }

    fn discover(
        &mut self,
        default_pool: &Arc<dyn WorkerPool>,
    ) -> ConfigurationResult<Vec<Arc<HandlerDescriptor>>> {
        let plugin = match std::mem::replace(&mut self.instance, Instance::Vacant) {
            Instance::Pending(plugin) => Arc::new(plugin),
            other => {
                self.instance = other;
                return Err(ConfigurationError::PluginAlreadyInitialized(self.name.clone()));
            }
        };

        let pool = plugin
            .worker_pool()
            .unwrap_or_else(|| Arc::clone(default_pool));
        let owner = PluginRef::new(&plugin, &self.name, plugin.doc());

        let mut descriptors = Vec::new();
        let mut result = Ok(());
        for listener in plugin.listeners() {
            match listener.materialize(&plugin, &owner, &pool) {
                Ok(built) => descriptors.extend(built),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.instance = Instance::Live(plugin);
        result?;

        info!(
            plugin = %self.name,
            handlers = descriptors.len(),
            "Plugin handlers registered"
        );
        Ok(descriptors)
    }

    async fn start(&mut self) {
        if self.state != PluginState::Initialized {
            return;
        }
        if let Some(plugin) = self.live() {
            plugin.on_start().await;
            self.state = PluginState::Started;
        }
    }

    async fn stop(&mut self) {
        if matches!(self.state, PluginState::Uninitialized | PluginState::Stopped) {
            return;
        }
        if let Some(plugin) = self.live() {
            plugin.on_stop().await;
            self.state = PluginState::Stopped;
        }
    }
}
