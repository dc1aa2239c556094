//! Handler descriptors: one per (registration, plugin instance) pair.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use futures::future::{self, BoxFuture};
use futures::{FutureExt, TryFutureExt};
use relay_core::{BlockingJob, BoxError, EventKind, HandlerResult, MessageEvent, WorkerPool};
use serde_json::{Map, Value};

use super::scope::ScopeFlags;
use crate::context::{MessageContext, WebhookContext};
use crate::error::HandlerFailure;
use crate::executor;
use crate::pattern::{MatchArgs, Pattern};

/// How a handler is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Execution {
    /// Awaited on the async runtime.
    Cooperative,
    /// Submitted to a worker pool; the router does not wait for it.
    Blocking,
}

// ─── Doc ──────────────────────────────────────────────────────────────────────

/// Documentation text with its first line kept as a summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Doc {
    summary: String,
    full: String,
}

impl Doc {
    pub fn new(text: &str) -> Self {
        let full = text.trim().to_owned();
        let summary = full.lines().next().unwrap_or_default().trim().to_owned();
        Self { summary, full }
    }

    /// First line of the text.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn full(&self) -> &str {
        &self.full
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }

    /// Appends a paragraph to the full text. The summary is only set if it
    /// was empty.
    pub(crate) fn append(&mut self, paragraph: &str) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            return;
        }
        if self.full.is_empty() {
            *self = Self::new(paragraph);
        } else {
            self.full.push_str("\n\n");
            self.full.push_str(paragraph);
        }
    }
}

// ─── PluginRef ────────────────────────────────────────────────────────────────

/// Non-owning reference to the plugin instance a descriptor belongs to.
#[derive(Clone)]
pub struct PluginRef {
    name: Arc<str>,
    doc: Arc<Doc>,
    instance: Weak<dyn Any + Send + Sync>,
}

impl PluginRef {
    pub(crate) fn new<P: Send + Sync + 'static>(plugin: &Arc<P>, name: &str, doc: &str) -> Self {
        let erased: Arc<dyn Any + Send + Sync> = plugin.clone();
        Self {
            name: Arc::from(name),
            doc: Arc::new(Doc::new(doc)),
            instance: Arc::downgrade(&erased),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    /// Whether the plugin instance is still alive.
    pub fn is_alive(&self) -> bool {
        self.instance.strong_count() > 0
    }

    /// Returns the plugin instance if it is alive and of type `P`.
    pub fn downcast<P: Send + Sync + 'static>(&self) -> Option<Arc<P>> {
        self.instance.upgrade()?.downcast::<P>().ok()
    }

    /// Whether both references point at the same plugin instance.
    pub fn same_instance(&self, other: &PluginRef) -> bool {
        Weak::ptr_eq(&self.instance, &other.instance)
    }
}

impl fmt::Debug for PluginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRef")
            .field("name", &self.name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

// ─── Trigger ──────────────────────────────────────────────────────────────────

/// What makes a descriptor fire.
#[derive(Debug, Clone)]
pub enum Trigger {
    Message { pattern: Pattern, scope: ScopeFlags },
    Webhook { pattern: Pattern },
}

impl Trigger {
    pub fn pattern(&self) -> &Pattern {
        match self {
            Self::Message { pattern, .. } | Self::Webhook { pattern } => pattern,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message { .. } => EventKind::Message,
            Self::Webhook { .. } => EventKind::Webhook,
        }
    }

    pub fn scope(&self) -> Option<&ScopeFlags> {
        match self {
            Self::Message { scope, .. } => Some(scope),
            Self::Webhook { .. } => None,
        }
    }
}

// ─── Bound callables ──────────────────────────────────────────────────────────

/// One handler call with its plugin already resolved. Holds the plugin alive
/// until the call has run.
pub(crate) type PreparedCall = Box<dyn FnOnce() -> BoxFuture<'static, HandlerResult> + Send>;

/// A message handler bound to its plugin. Returns `None` once the plugin is gone.
pub(crate) type BoundMessageFn =
    Arc<dyn Fn(MessageContext, MatchArgs) -> Option<PreparedCall> + Send + Sync>;

/// A webhook handler bound to its plugin. Returns `None` once the plugin is gone.
pub(crate) type BoundWebhookFn = Arc<dyn Fn(WebhookContext) -> Option<PreparedCall> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum BoundCallable {
    Message(BoundMessageFn),
    Webhook(BoundWebhookFn),
}

impl BoundCallable {
    pub(crate) fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::Webhook(_) => EventKind::Webhook,
        }
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Message(a), Self::Message(b)) => Arc::ptr_eq(a, b),
            (Self::Webhook(a), Self::Webhook(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Outcome of invoking a descriptor.
pub enum Invocation {
    /// A cooperative handler; the future must be awaited by the caller.
    Pending(BoxFuture<'static, Result<(), HandlerFailure>>),
    /// A blocking handler, handed to the worker pool.
    Submitted,
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(_) => f.write_str("Pending"),
            Self::Submitted => f.write_str("Submitted"),
        }
    }
}

// ─── HandlerDescriptor ────────────────────────────────────────────────────────

/// A materialised registration: one trigger, bound to one plugin instance.
///
/// Stacked registrations on one handler produce one descriptor each. The first
/// registration is the root and lists the others as [`siblings`]; all of them
/// share the same callable and owner.
///
/// [`siblings`]: HandlerDescriptor::siblings
pub struct HandlerDescriptor {
    pub(crate) name: String,
    pub(crate) trigger: Trigger,
    pub(crate) execution: Execution,
    pub(crate) is_command: bool,
    pub(crate) doc: Doc,
    pub(crate) annotations: Map<String, Value>,
    pub(crate) callable: BoundCallable,
    pub(crate) owner: PluginRef,
    pub(crate) pool: Arc<dyn WorkerPool>,
    pub(crate) siblings: Vec<Arc<HandlerDescriptor>>,
}

impl HandlerDescriptor {
    /// Name of the handler function.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn pattern(&self) -> &Pattern {
        self.trigger.pattern()
    }

    pub fn kind(&self) -> EventKind {
        self.trigger.kind()
    }

    pub fn execution(&self) -> Execution {
        self.execution
    }

    /// Whether arguments are parsed as structured command options.
    pub fn is_command(&self) -> bool {
        self.is_command
    }

    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    pub fn annotations(&self) -> &Map<String, Value> {
        &self.annotations
    }

    pub fn annotation(&self, key: &str) -> Option<&Value> {
        self.annotations.get(key)
    }

    /// The `category` annotation, if set to a non-empty string.
    pub fn category(&self) -> Option<&str> {
        self.annotation_str("category")
    }

    /// The `human_description` annotation, if set to a non-empty string.
    pub fn human_description(&self) -> Option<&str> {
        self.annotation_str("human_description")
    }

    fn annotation_str(&self, key: &str) -> Option<&str> {
        self.annotations
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn owner(&self) -> &PluginRef {
        &self.owner
    }

    /// Descriptors stacked on this one. Empty unless this is a root.
    pub fn siblings(&self) -> &[Arc<HandlerDescriptor>] {
        &self.siblings
    }

    /// Whether both descriptors resolve to the same underlying callable.
    pub fn shares_callable(&self, other: &HandlerDescriptor) -> bool {
        self.callable.ptr_eq(&other.callable)
    }

    /// Matches the pattern against `text` without checking scope.
    pub fn matches(&self, text: &str) -> Option<MatchArgs> {
        self.pattern().captures(text)
    }

    /// Whether the scope flags admit `event`. Webhook descriptors admit nothing.
    pub fn scope_permits(&self, event: &MessageEvent, bot_user_id: &str) -> bool {
        self.trigger
            .scope()
            .is_some_and(|scope| scope.permits(event, bot_user_id))
    }

    /// Invokes a message handler. Returns `None` for webhook descriptors.
    pub fn invoke_message(&self, ctx: MessageContext, args: MatchArgs) -> Option<Invocation> {
        let BoundCallable::Message(callable) = &self.callable else {
            return None;
        };
        Some(self.invoke_with(callable(ctx, args)))
    }

    /// Invokes a webhook handler. Returns `None` for message descriptors.
    pub fn invoke_webhook(&self, ctx: WebhookContext) -> Option<Invocation> {
        let BoundCallable::Webhook(callable) = &self.callable else {
            return None;
        };
        Some(self.invoke_with(callable(ctx)))
    }

    /// `call` already holds the plugin, so a job handed to the pool still runs
    /// if the manager releases the plugin meanwhile.
    fn invoke_with(&self, call: Option<PreparedCall>) -> Invocation {
        let plugin = self.owner.name().to_owned();
        let listener = self.name.clone();

        let Some(call) = call else {
            return Invocation::Pending(
                future::ready(Err(HandlerFailure::OwnerGone { plugin, listener })).boxed(),
            );
        };

        match self.execution {
            Execution::Cooperative => Invocation::Pending(
                call()
                    .map_err(move |source| HandlerFailure::Failed {
                        plugin,
                        listener,
                        source,
                    })
                    .boxed(),
            ),
            Execution::Blocking => {
                let job: BlockingJob = Box::new(move || blocking_job(call, plugin, listener));
                executor::submit_blocking(self.pool.as_ref(), job);
                Invocation::Submitted
            }
        }
    }
}

/// Body of a blocking job: runs the handler on the worker thread and returns
/// the follow-up future with failures labelled by plugin and listener.
fn blocking_job(call: PreparedCall, plugin: String, listener: String) -> BoxFuture<'static, HandlerResult> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(fut) => Box::pin(fut.map_err(move |source| -> BoxError {
            Box::new(HandlerFailure::Failed {
                plugin,
                listener,
                source,
            })
        })),
        Err(payload) => {
            let failure = HandlerFailure::Panicked {
                plugin,
                listener,
                message: executor::panic_message(payload.as_ref()),
            };
            Box::pin(future::ready(Err(Box::new(failure) as BoxError)))
        }
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("execution", &self.execution)
            .field("is_command", &self.is_command)
            .field("owner", &self.owner)
            .field("siblings", &self.siblings.len())
            .finish_non_exhaustive()
    }
}
