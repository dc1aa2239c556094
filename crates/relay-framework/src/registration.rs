//! Registration builders.
//!
//! A plugin declares its handlers by returning [`Listener`]s from
//! [`Plugin::listeners`](crate::Plugin::listeners). Each listener starts from
//! [`listen_to`] (chat messages) or [`listen_webhook`] (webhooks), optionally
//! sets scope flags and annotations, and is finished by attaching a handler:
//!
//! ```rust,ignore
//! impl Plugin for Ops {
//!     fn listeners(&self) -> Vec<Listener<Self>> {
//!         vec![
//!             listen_to("^deploy (.*)$")
//!                 .needs_mention()
//!                 .allowed_users(["alice", "bob"])
//!                 .category("admin")
//!                 .handler(Self::deploy)
//!                 .doc("Deploys the given service."),
//!             // One handler, two triggers.
//!             listen_to("^status$")
//!                 .blocking(Self::status)
//!                 .listen_to("^!status$"),
//!             listen_webhook("deployed").handler(Self::on_deployed),
//!         ]
//!     }
//! }
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use relay_core::{EventKind, HandlerResult, WorkerPool};
use serde_json::{Map, Value};

use crate::context::{MessageContext, WebhookContext};
use crate::error::{ConfigurationError, ConfigurationResult};
use crate::handler::{
    AllowList, BoundCallable, BoundMessageFn, BoundWebhookFn, Doc, Execution, HandlerDescriptor,
    HandlerResponse, PluginRef, PreparedCall, ScopeFlags, Trigger,
};
use crate::pattern::{MatchArgs, Pattern};

// ─── Entry points ─────────────────────────────────────────────────────────────

/// Starts a message registration for `pattern`.
///
/// The pattern is a regular expression searched anywhere in the message text;
/// anchor it with `^...$` to require a full match.
pub fn listen_to(pattern: impl Into<String>) -> MessageListen {
    MessageListen {
        pattern: pattern.into(),
        scope: ScopeFlags::default(),
        case_insensitive: false,
        annotations: Map::new(),
    }
}

/// Starts a webhook registration for `pattern`.
///
/// The pattern must match the whole webhook id.
pub fn listen_webhook(pattern: impl Into<String>) -> WebhookListen {
    WebhookListen {
        pattern: pattern.into(),
        annotations: Map::new(),
    }
}

// ─── MessageListen ────────────────────────────────────────────────────────────

/// A message registration under construction.
#[derive(Debug, Clone)]
pub struct MessageListen {
    pattern: String,
    scope: ScopeFlags,
    case_insensitive: bool,
    annotations: Map<String, Value>,
}

impl MessageListen {
    /// Only fire when the bot is mentioned.
    pub fn needs_mention(mut self) -> Self {
        self.scope.needs_mention = true;
        self
    }

    /// Only fire in direct conversations with the bot.
    pub fn direct_only(mut self) -> Self {
        self.scope.direct_only = true;
        self
    }

    /// Only fire for the listed users, by id or username.
    pub fn allowed_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.scope.allowed_users = AllowList::only(users);
        self
    }

    /// Only fire in the listed channels, by id or name.
    pub fn allowed_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.scope.allowed_channels = AllowList::only(channels);
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// Groups the handler under `category` in the help output.
    pub fn category(self, category: impl Into<String>) -> Self {
        self.annotate("category", category.into())
    }

    /// Shows `description` instead of the raw pattern in the help output.
    pub fn human_description(self, description: impl Into<String>) -> Self {
        self.annotate("human_description", description.into())
    }

    /// Attaches an arbitrary annotation.
    pub fn annotate(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn scope(&self) -> &ScopeFlags {
        &self.scope
    }

    /// Finishes with an async handler, awaited on the runtime.
    pub fn handler<P, F, Fut, R>(self, f: F) -> Listener<P>
    where
        P: Send + Sync + 'static,
        F: Fn(Arc<P>, MessageContext, MatchArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: HandlerResponse,
    {
        let f = Arc::new(f);
        let callable: MessageFn<P> = Arc::new(
            move |plugin: Arc<P>, ctx: MessageContext, args: MatchArgs| -> BoxFuture<'static, HandlerResult> {
                let f = Arc::clone(&f);
                Box::pin(async move { f(plugin, ctx.clone(), args).await.respond(Some(&ctx)).await })
            },
        );
        let name = handler_name::<F>(&self.pattern);
        Listener::new(
            name,
            TriggerSpec::Message(self),
            Callable::Message(callable),
            Execution::Cooperative,
        )
    }

    /// Finishes with a synchronous handler, run on a worker pool.
    pub fn blocking<P, F, R>(self, f: F) -> Listener<P>
    where
        P: Send + Sync + 'static,
        F: Fn(Arc<P>, MessageContext, MatchArgs) -> R + Send + Sync + 'static,
        R: HandlerResponse,
    {
        let callable: MessageFn<P> = Arc::new(
            move |plugin: Arc<P>, ctx: MessageContext, args: MatchArgs| -> BoxFuture<'static, HandlerResult> {
                let response = f(plugin, ctx.clone(), args);
                Box::pin(async move { response.respond(Some(&ctx)).await })
            },
        );
        let name = handler_name::<F>(&self.pattern);
        Listener::new(
            name,
            TriggerSpec::Message(self),
            Callable::Message(callable),
            Execution::Blocking,
        )
    }

    /// Finishes with a handler taking structured options parsed by clap.
    ///
    /// The registration fires on `<pattern>` optionally followed by arguments.
    /// The arguments are shell-split and parsed into `T`; parse errors and
    /// `--help` output are replied to the sender instead of calling `f`.
    #[cfg(feature = "command")]
    pub fn command<P, T, F, Fut, R>(self, f: F) -> Listener<P>
    where
        P: Send + Sync + 'static,
        T: clap::Parser + Send + 'static,
        F: Fn(Arc<P>, MessageContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: HandlerResponse,
    {
        let program = crate::command::program_name(&self.pattern);
        let help = crate::command::render_help::<T>(&program);

        let f = Arc::new(f);
        let callable: MessageFn<P> = Arc::new(
            move |plugin: Arc<P>, ctx: MessageContext, args: MatchArgs| -> BoxFuture<'static, HandlerResult> {
                let f = Arc::clone(&f);
                let program = program.clone();
                Box::pin(async move {
                    match crate::command::parse::<T>(&program, &args) {
                        Ok(options) => {
                            f(plugin, ctx.clone(), options).await.respond(Some(&ctx)).await
                        }
                        Err(err) => {
                            ctx.reply(&err.to_string()).await?;
                            Ok(())
                        }
                    }
                })
            },
        );

        let name = handler_name::<F>(&self.pattern);
        let mut listener = Listener::new(
            name,
            TriggerSpec::Message(self),
            Callable::Message(callable),
            Execution::Cooperative,
        );
        listener.is_command = true;
        listener.extra_doc = Some(help);
        listener
    }
}

// ─── WebhookListen ────────────────────────────────────────────────────────────

/// A webhook registration under construction.
#[derive(Debug, Clone)]
pub struct WebhookListen {
    pattern: String,
    annotations: Map<String, Value>,
}

impl WebhookListen {
    pub fn category(self, category: impl Into<String>) -> Self {
        self.annotate("category", category.into())
    }

    pub fn human_description(self, description: impl Into<String>) -> Self {
        self.annotate("human_description", description.into())
    }

    pub fn annotate(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Finishes with an async handler, awaited on the runtime.
    pub fn handler<P, F, Fut, R>(self, f: F) -> Listener<P>
    where
        P: Send + Sync + 'static,
        F: Fn(Arc<P>, WebhookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: HandlerResponse,
    {
        let f = Arc::new(f);
        let callable: WebhookFn<P> =
            Arc::new(move |plugin: Arc<P>, ctx: WebhookContext| -> BoxFuture<'static, HandlerResult> {
                let f = Arc::clone(&f);
                Box::pin(async move { f(plugin, ctx).await.respond(None).await })
            });
        let name = handler_name::<F>(&self.pattern);
        Listener::new(
            name,
            TriggerSpec::Webhook(self),
            Callable::Webhook(callable),
            Execution::Cooperative,
        )
    }

    /// Finishes with a synchronous handler, run on a worker pool.
    pub fn blocking<P, F, R>(self, f: F) -> Listener<P>
    where
        P: Send + Sync + 'static,
        F: Fn(Arc<P>, WebhookContext) -> R + Send + Sync + 'static,
        R: HandlerResponse,
    {
        let callable: WebhookFn<P> =
            Arc::new(move |plugin: Arc<P>, ctx: WebhookContext| -> BoxFuture<'static, HandlerResult> {
                let response = f(plugin, ctx);
                Box::pin(async move { response.respond(None).await })
            });
        let name = handler_name::<F>(&self.pattern);
        Listener::new(
            name,
            TriggerSpec::Webhook(self),
            Callable::Webhook(callable),
            Execution::Blocking,
        )
    }
}

// ─── TriggerSpec ──────────────────────────────────────────────────────────────

/// A registration that can be stacked onto a [`Listener`].
#[derive(Debug, Clone)]
pub enum TriggerSpec {
    Message(MessageListen),
    Webhook(WebhookListen),
}

impl TriggerSpec {
    fn pattern(&self) -> &str {
        match self {
            Self::Message(m) => &m.pattern,
            Self::Webhook(w) => &w.pattern,
        }
    }

    fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::Webhook(_) => EventKind::Webhook,
        }
    }
}

impl From<MessageListen> for TriggerSpec {
    fn from(spec: MessageListen) -> Self {
        Self::Message(spec)
    }
}

impl From<WebhookListen> for TriggerSpec {
    fn from(spec: WebhookListen) -> Self {
        Self::Webhook(spec)
    }
}

// ─── Listener ─────────────────────────────────────────────────────────────────

type MessageFn<P> =
    Arc<dyn Fn(Arc<P>, MessageContext, MatchArgs) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

type WebhookFn<P> =
    Arc<dyn Fn(Arc<P>, WebhookContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// An unbound handler, generic over the plugin it will be bound to.
enum Callable<P> {
    Message(MessageFn<P>),
    Webhook(WebhookFn<P>),
}

impl<P: Send + Sync + 'static> Callable<P> {
    /// Binds to `plugin` without keeping it alive. Each call upgrades the
    /// reference and keeps the plugin until the prepared call has run.
    fn bind(&self, plugin: &Arc<P>) -> BoundCallable {
        let weak = Arc::downgrade(plugin);
        match self {
            Self::Message(f) => {
                let f = Arc::clone(f);
                let bound: BoundMessageFn = Arc::new(
                    move |ctx: MessageContext, args: MatchArgs| -> Option<PreparedCall> {
                        let plugin = weak.upgrade()?;
                        let f = Arc::clone(&f);
                        Some(Box::new(move || f(plugin, ctx, args)))
                    },
                );
                BoundCallable::Message(bound)
            }
            Self::Webhook(f) => {
                let f = Arc::clone(f);
                let bound: BoundWebhookFn = Arc::new(move |ctx: WebhookContext| -> Option<PreparedCall> {
                    let plugin = weak.upgrade()?;
                    let f = Arc::clone(&f);
                    Some(Box::new(move || f(plugin, ctx)))
                });
                BoundCallable::Webhook(bound)
            }
        }
    }
}

/// A handler together with every registration stacked on it.
///
/// Built by finishing a [`MessageListen`] or [`WebhookListen`]. Further
/// registrations are stacked with [`stack`](Self::stack),
/// [`listen_to`](Self::listen_to) or [`listen_webhook`](Self::listen_webhook);
/// each one becomes its own descriptor sharing this handler.
pub struct Listener<P> {
    name: String,
    doc: Doc,
    extra_doc: Option<String>,
    callable: Callable<P>,
    execution: Execution,
    is_command: bool,
    root: TriggerSpec,
    siblings: Vec<TriggerSpec>,
}

impl<P: Send + Sync + 'static> Listener<P> {
    fn new(name: String, root: TriggerSpec, callable: Callable<P>, execution: Execution) -> Self {
        Self {
            name,
            doc: Doc::default(),
            extra_doc: None,
            callable,
            execution,
            is_command: false,
            root,
            siblings: Vec::new(),
        }
    }

    /// Overrides the handler name shown in logs and failures.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the handler documentation. The first line is its help summary.
    pub fn doc(mut self, text: &str) -> Self {
        self.doc = Doc::new(text);
        self
    }

    /// Stacks another registration onto the same handler.
    pub fn stack(mut self, spec: impl Into<TriggerSpec>) -> Self {
        self.siblings.push(spec.into());
        self
    }

    /// Stacks a message registration with default flags.
    pub fn listen_to(self, pattern: impl Into<String>) -> Self {
        self.stack(listen_to(pattern))
    }

    /// Stacks a webhook registration.
    pub fn listen_webhook(self, pattern: impl Into<String>) -> Self {
        self.stack(listen_webhook(pattern))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn execution(&self) -> Execution {
        self.execution
    }

    /// Number of registrations, the root included.
    pub fn registrations(&self) -> usize {
        1 + self.siblings.len()
    }

    /// Binds the handler to `plugin` and builds one descriptor per
    /// registration, root first.
    pub(crate) fn materialize(
        self,
        plugin: &Arc<P>,
        owner: &PluginRef,
        pool: &Arc<dyn WorkerPool>,
    ) -> ConfigurationResult<Vec<Arc<HandlerDescriptor>>> {
        let mut doc = self.doc.clone();
        if let Some(extra) = &self.extra_doc {
            doc.append(extra);
        }

        let parts = Parts {
            name: &self.name,
            doc,
            execution: self.execution,
            is_command: self.is_command,
            callable: self.callable.bind(plugin),
            owner,
            pool,
        };

        let siblings = self
            .siblings
            .into_iter()
            .map(|spec| parts.build(spec, Vec::new()))
            .collect::<ConfigurationResult<Vec<_>>>()?;
        let root = parts.build(self.root, siblings.clone())?;

        let mut descriptors = Vec::with_capacity(1 + siblings.len());
        descriptors.push(root);
        descriptors.extend(siblings);
        Ok(descriptors)
    }
}

impl<P> fmt::Debug for Listener<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.name)
            .field("execution", &self.execution)
            .field("root", &self.root)
            .field("siblings", &self.siblings)
            .finish_non_exhaustive()
    }
}

/// Shared state for building the descriptors of one listener.
struct Parts<'a> {
    name: &'a str,
    doc: Doc,
    execution: Execution,
    is_command: bool,
    callable: BoundCallable,
    owner: &'a PluginRef,
    pool: &'a Arc<dyn WorkerPool>,
}

impl Parts<'_> {
    fn build(
        &self,
        spec: TriggerSpec,
        siblings: Vec<Arc<HandlerDescriptor>>,
    ) -> ConfigurationResult<Arc<HandlerDescriptor>> {
        if spec.kind() != self.callable.kind() {
            return Err(ConfigurationError::unsupported(
                self.owner.name(),
                self.name,
                format!(
                    "{} pattern '{}' cannot be stacked on a {} handler",
                    spec.kind(),
                    spec.pattern(),
                    self.callable.kind(),
                ),
            ));
        }

        let invalid = |source| ConfigurationError::InvalidPattern {
            plugin: self.owner.name().to_owned(),
            listener: self.name.to_owned(),
            pattern: spec.pattern().to_owned(),
            source,
        };

        let (trigger, annotations) = match &spec {
            TriggerSpec::Message(m) => {
                let pattern = if self.is_command {
                    Pattern::command(&m.pattern, m.case_insensitive)
                } else if m.case_insensitive {
                    Pattern::message_case_insensitive(&m.pattern)
                } else {
                    Pattern::message(&m.pattern)
                }
                .map_err(invalid)?;
                let trigger = Trigger::Message {
                    pattern,
                    scope: m.scope.clone(),
                };
                (trigger, m.annotations.clone())
            }
            TriggerSpec::Webhook(w) => {
                let pattern = Pattern::webhook(&w.pattern).map_err(invalid)?;
                (Trigger::Webhook { pattern }, w.annotations.clone())
            }
        };

        Ok(Arc::new(HandlerDescriptor {
            name: self.name.to_owned(),
            trigger,
            execution: self.execution,
            is_command: self.is_command,
            doc: self.doc.clone(),
            annotations,
            callable: self.callable.clone(),
            owner: self.owner.clone(),
            pool: Arc::clone(self.pool),
            siblings,
        }))
    }
}

/// Last path segment of a type name, without generic arguments.
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Name of a handler function, or `fallback` for closures.
fn handler_name<F>(fallback: &str) -> String {
    let full = type_name::<F>();
    if full.contains("{{closure}}") {
        return fallback.to_owned();
    }
    short_type_name(full).to_owned()
}
