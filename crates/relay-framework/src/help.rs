//! Help output derived from registration metadata.
//!
//! Rendering is a pure function of the registered descriptors: it never calls
//! a handler, and the result does not depend on the order in which plugins
//! were declared.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{BoxError, EventKind};
use serde_json::{Map, Value};

use crate::context::{MessageContext, PluginContext};
use crate::handler::{Doc, HandlerDescriptor, Reply};
use crate::manager::ManagerHandle;
use crate::pattern::MatchArgs;
use crate::plugin::Plugin;
use crate::registration::{Listener, listen_to};

const HELP_HEADER: &str = "### The following functions have been registered:\n\n\
###### `(*)` require the use of `@botname`, `(+)` can only be used in direct message\n";

/// Read-only view of one descriptor for help output.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub kind: EventKind,
    /// Name of the owning plugin.
    pub location: String,
    /// The pattern as declared.
    pub pattern: String,
    pub plugin_doc: Doc,
    pub function_doc: Doc,
    /// Only usable in direct messages.
    pub direct: bool,
    /// Requires mentioning the bot.
    pub mention: bool,
    pub is_command: bool,
    pub annotations: Map<String, Value>,
    pub descriptor: Arc<HandlerDescriptor>,
}

impl FunctionInfo {
    pub fn from_descriptor(descriptor: &Arc<HandlerDescriptor>) -> Self {
        let scope = descriptor.trigger().scope();
        Self {
            kind: descriptor.kind(),
            location: descriptor.owner().name().to_owned(),
            pattern: descriptor.pattern().source().to_owned(),
            plugin_doc: descriptor.owner().doc().clone(),
            function_doc: descriptor.doc().clone(),
            direct: scope.is_some_and(|s| s.direct_only),
            mention: scope.is_some_and(|s| s.needs_mention),
            is_command: descriptor.is_command(),
            annotations: descriptor.annotations().clone(),
            descriptor: Arc::clone(descriptor),
        }
    }

    /// The `category` annotation, if set.
    pub fn category(&self) -> Option<&str> {
        self.descriptor.category()
    }

    /// What users should type: the `human_description` annotation or the
    /// raw pattern.
    pub fn syntax(&self) -> &str {
        self.descriptor
            .human_description()
            .unwrap_or(&self.pattern)
    }

    fn sort_key(&self) -> (&str, EventKind, &str, &str, &str, &str, &str, bool, bool) {
        (
            self.category().unwrap_or_default(),
            self.kind,
            self.pattern.trim_start_matches(['^', '[', '(', '-']),
            &self.pattern,
            &self.location,
            self.syntax(),
            self.function_doc.summary(),
            self.mention,
            self.direct,
        )
    }

    fn render_into(&self, out: &mut String) {
        out.push_str("- `");
        out.push_str(self.syntax());
        out.push('`');
        if self.mention {
            out.push_str(" `(*)`");
        }
        if self.direct {
            out.push_str(" `(+)`");
        }

        let summary = self.function_doc.summary();
        match self.kind {
            EventKind::Webhook => {
                out.push_str(" - (webhook) ");
                out.push_str(summary);
            }
            EventKind::Message if !summary.is_empty() => {
                out.push_str(" - ");
                out.push_str(summary);
            }
            EventKind::Message => {}
        }
        out.push('\n');
    }
}

fn compare(a: &FunctionInfo, b: &FunctionInfo) -> Ordering {
    a.sort_key().cmp(&b.sort_key())
}

/// Renders the help string for `functions`.
///
/// Entries are sorted by category, then kind (messages before webhooks),
/// then pattern ignoring leading `^[(-`. A header line opens every named
/// category; uncategorised entries come first, without a header.
pub fn render_help(functions: &[FunctionInfo]) -> String {
    let mut sorted: Vec<&FunctionInfo> = functions.iter().collect();
    sorted.sort_by(|a, b| compare(a, b));

    let mut out = String::from(HELP_HEADER);
    let mut current: Option<&str> = None;
    for info in sorted {
        let category = info.category();
        if category != current {
            if let Some(name) = category {
                out.push_str(&format!("Category `{name}`:\n"));
            }
            current = category;
        }
        info.render_into(&mut out);
    }
    out
}

// =============================================================================
// HelpPlugin
// =============================================================================

/// Answers `help` with the list of registered functions.
///
/// Responds to `help` when mentioned, and to a plain `help` in a direct
/// message. With `respond_channel_help` enabled in the settings it also
/// answers `!help` in any channel.
#[derive(Debug, Clone)]
pub struct HelpPlugin {
    direct_help: bool,
    channel_help: bool,
    manager: Option<ManagerHandle>,
}

impl HelpPlugin {
    pub fn new() -> Self {
        Self {
            direct_help: true,
            channel_help: false,
            manager: None,
        }
    }

    /// Whether help is sent as a direct message (default) or in the channel.
    pub fn direct_help(mut self, direct: bool) -> Self {
        self.direct_help = direct;
        self
    }

    async fn help(self: Arc<Self>, _msg: MessageContext, _args: MatchArgs) -> Reply {
        let text = self
            .manager
            .as_ref()
            .map(ManagerHandle::get_help_string)
            .unwrap_or_else(|| render_help(&[]));
        Reply {
            text,
            direct: self.direct_help,
        }
    }
}

impl Default for HelpPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for HelpPlugin {
    fn name(&self) -> String {
        "HelpPlugin".to_owned()
    }

    fn doc(&self) -> &str {
        "Provides the help command."
    }

    fn initialize(&mut self, ctx: &PluginContext) -> Result<(), BoxError> {
        self.channel_help = ctx.settings().respond_channel_help;
        self.manager = Some(ctx.manager().clone());
        Ok(())
    }

    fn listeners(&self) -> Vec<Listener<Self>> {
        let help = listen_to("^help$")
            .needs_mention()
            .handler(Self::help)
            .doc("Shows this help information.")
            .stack(listen_to("^help$").direct_only());
        let help = if self.channel_help {
            help.listen_to("^!help$")
        } else {
            help
        };
        vec![help]
    }
}
