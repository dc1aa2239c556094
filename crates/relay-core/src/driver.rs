//! Outbound seams: replying on the chat platform and running blocking work.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::{DriverError, HandlerResult};
use crate::event::MessageEvent;

/// Connection to the chat platform, as seen by handlers.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// User id of the bot account.
    fn user_id(&self) -> &str;

    /// Replies to `message`, in its channel or as a direct message.
    async fn reply_to(
        &self,
        message: &MessageEvent,
        text: &str,
        direct: bool,
    ) -> Result<(), DriverError>;
}

/// A unit of blocking work.
///
/// Calling the closure performs the blocking part on a worker thread; the
/// returned future finishes any asynchronous follow-up (such as sending the
/// reply) and is driven on the async runtime.
pub type BlockingJob = Box<dyn FnOnce() -> BoxFuture<'static, HandlerResult> + Send + 'static>;

/// Executor for blocking handlers.
///
/// `submit` must return without waiting for the job to start. Failures of a
/// submitted job are the pool's to report; they never flow back to the caller.
pub trait WorkerPool: Send + Sync + 'static {
    fn submit(&self, job: BlockingJob);

    /// Stops accepting new jobs. Already submitted jobs may still run.
    fn close(&self) {}
}
