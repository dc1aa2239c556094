//! Fan-out of classified events to matching handlers.

use std::sync::Arc;

use futures::future::join_all;
use relay_core::{Driver, Event, MessageEvent, WebhookEvent};
use tracing::{Instrument, debug, debug_span, warn};

use crate::context::{MessageContext, WebhookContext};
use crate::error::HandlerFailure;
use crate::executor;
use crate::handler::{HandlerDescriptor, Invocation};
use crate::help::FunctionInfo;
use crate::routing::RoutingTable;

/// Outcome of routing one event.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Cooperative handlers that were awaited.
    pub invoked: usize,
    /// Blocking handlers handed to a worker pool.
    pub submitted: usize,
    /// Cooperative handlers that failed or panicked.
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    /// Number of handlers the event reached.
    pub fn matched(&self) -> usize {
        self.invoked + self.submitted
    }

    /// Whether no handler matched.
    pub fn is_empty(&self) -> bool {
        self.matched() == 0
    }

    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Read-only routing state built by [`PluginManager::initialize`].
///
/// Cheap to share: the runtime clones the `Arc` into every dispatch task.
///
/// [`PluginManager::initialize`]: crate::PluginManager::initialize
pub struct Router {
    message: RoutingTable,
    webhook: RoutingTable,
    driver: Arc<dyn Driver>,
}

impl Router {
    pub(crate) fn new(message: RoutingTable, webhook: RoutingTable, driver: Arc<dyn Driver>) -> Self {
        Self {
            message,
            webhook,
            driver,
        }
    }

    pub fn message_table(&self) -> &RoutingTable {
        &self.message
    }

    pub fn webhook_table(&self) -> &RoutingTable {
        &self.webhook
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Routes any classified event.
    pub async fn route(&self, event: Event) -> DispatchReport {
        match event {
            Event::Message(m) => self.route_message(Arc::new(m)).await,
            Event::Webhook(w) => self.route_webhook(Arc::new(w)).await,
        }
    }

    /// Invokes every message handler whose scope admits `event` and whose
    /// pattern matches its text.
    pub async fn route_message(&self, event: Arc<MessageEvent>) -> DispatchReport {
        let span = debug_span!("dispatch", kind = "message", post_id = %event.post_id);
        async move {
            let bot_user_id = self.driver.user_id();
            let ctx = MessageContext::new(Arc::clone(&event), Arc::clone(&self.driver));
            let mut report = DispatchReport::default();
            let mut pending = Vec::new();

            for bucket in self.message.buckets() {
                let eligible: Vec<&Arc<HandlerDescriptor>> = bucket
                    .descriptors()
                    .iter()
                    .filter(|d| d.scope_permits(&event, bot_user_id))
                    .collect();
                if eligible.is_empty() {
                    continue;
                }
                let Some(args) = bucket.pattern().captures(&event.text) else {
                    continue;
                };

                for descriptor in eligible {
                    debug!(
                        plugin = %descriptor.owner().name(),
                        listener = %descriptor.name(),
                        pattern = %bucket.pattern(),
                        "Message matched"
                    );
                    match descriptor.invoke_message(ctx.clone(), args.clone()) {
                        Some(invocation) => {
                            collect(&mut report, &mut pending, descriptor, invocation)
                        }
                        None => warn!(
                            listener = %descriptor.name(),
                            "Non-message handler found in the message table"
                        ),
                    }
                }
            }

            finish(report, pending).await
        }
        .instrument(span)
        .await
    }

    /// Invokes every webhook handler whose pattern matches the webhook id.
    pub async fn route_webhook(&self, event: Arc<WebhookEvent>) -> DispatchReport {
        let span = debug_span!("dispatch", kind = "webhook", webhook_id = %event.webhook_id);
        async move {
            let ctx = WebhookContext::new(Arc::clone(&event), Arc::clone(&self.driver));
            let mut report = DispatchReport::default();
            let mut pending = Vec::new();

            for bucket in self.webhook.buckets() {
                if !bucket.pattern().is_match(&event.webhook_id) {
                    continue;
                }
                for descriptor in bucket.descriptors() {
                    debug!(
                        plugin = %descriptor.owner().name(),
                        listener = %descriptor.name(),
                        "Webhook matched"
                    );
                    match descriptor.invoke_webhook(ctx.clone()) {
                        Some(invocation) => {
                            collect(&mut report, &mut pending, descriptor, invocation)
                        }
                        None => warn!(
                            listener = %descriptor.name(),
                            "Non-webhook handler found in the webhook table"
                        ),
                    }
                }
            }

            finish(report, pending).await
        }
        .instrument(span)
        .await
    }

    /// Help entries for every descriptor: message handlers first, then
    /// webhooks, each in routing order.
    pub fn get_help(&self) -> Vec<FunctionInfo> {
        self.message
            .descriptors()
            .chain(self.webhook.descriptors())
            .map(FunctionInfo::from_descriptor)
            .collect()
    }
}

type PendingHandler<'a> = (
    &'a HandlerDescriptor,
    futures::future::BoxFuture<'static, Result<(), HandlerFailure>>,
);

fn collect<'a>(
    report: &mut DispatchReport,
    pending: &mut Vec<PendingHandler<'a>>,
    descriptor: &'a HandlerDescriptor,
    invocation: Invocation,
) {
    match invocation {
        Invocation::Pending(fut) => pending.push((descriptor, fut)),
        Invocation::Submitted => report.submitted += 1,
    }
}

/// Awaits the cooperative handlers concurrently and records their failures.
async fn finish(mut report: DispatchReport, pending: Vec<PendingHandler<'_>>) -> DispatchReport {
    report.invoked = pending.len();
    let results = join_all(
        pending
            .into_iter()
            .map(|(descriptor, fut)| executor::await_cooperative(descriptor, fut)),
    )
    .await;
    report.failures = results.into_iter().filter_map(Result::err).collect();

    debug!(
        invoked = report.invoked,
        submitted = report.submitted,
        failed = report.failures.len(),
        "Dispatch finished"
    );
    report
}
