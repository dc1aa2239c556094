//! Bot-wide settings consumed by the framework.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Settings shared with every plugin through its [`PluginContext`].
///
/// Every field has a default, so an empty configuration section is valid.
///
/// [`PluginContext`]: crate::PluginContext
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Also answer `!help` in channels, without mentioning the bot.
    pub respond_channel_help: bool,

    /// Usernames whose messages are never routed.
    pub ignore_users: Vec<String>,

    /// Size of the default worker pool for blocking handlers.
    pub threadpool_num_workers: usize,

    /// Per-plugin configuration sections, keyed by plugin name.
    pub plugins: HashMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            respond_channel_help: false,
            ignore_users: Vec::new(),
            threadpool_num_workers: 10,
            plugins: HashMap::new(),
        }
    }
}

impl Settings {
    /// Whether messages from `username` should be dropped before routing.
    pub fn is_ignored(&self, username: &str) -> bool {
        self.ignore_users
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(username))
    }

    /// Configuration section for the named plugin, if present.
    pub fn plugin_section(&self, plugin: &str) -> Option<&Value> {
        self.plugins.get(plugin)
    }
}
