//! Turning handler return values into replies.

use async_trait::async_trait;
use relay_core::{BoxError, HandlerResult};
use tracing::warn;

use crate::context::MessageContext;

/// A reply with an explicit destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Send as a direct message instead of in the channel.
    pub direct: bool,
}

impl Reply {
    /// Reply in the channel the message came from.
    pub fn channel(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            direct: false,
        }
    }

    /// Reply to the sender in a direct message.
    pub fn direct(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            direct: true,
        }
    }
}

/// Values a handler may return.
///
/// - `()` does nothing.
/// - `String`, `&'static str` and [`Reply`] are sent back to the message.
/// - `Option<T>` responds with `T` when present.
/// - `Result<T, E>` responds with `T` on success; `Err` fails the handler.
///
/// Webhook handlers have no message to answer, so textual responses from them
/// are dropped with a warning.
#[async_trait]
pub trait HandlerResponse: Send + 'static {
    async fn respond(self, target: Option<&MessageContext>) -> HandlerResult;
}

#[async_trait]
impl HandlerResponse for () {
    async fn respond(self, _target: Option<&MessageContext>) -> HandlerResult {
        Ok(())
    }
}

#[async_trait]
impl HandlerResponse for Reply {
    async fn respond(self, target: Option<&MessageContext>) -> HandlerResult {
        let Some(ctx) = target else {
            warn!("Handler produced a reply but there is no message to answer");
            return Ok(());
        };
        ctx.driver()
            .reply_to(ctx.event(), &self.text, self.direct)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl HandlerResponse for String {
    async fn respond(self, target: Option<&MessageContext>) -> HandlerResult {
        Reply::channel(self).respond(target).await
    }
}

#[async_trait]
impl HandlerResponse for &'static str {
    async fn respond(self, target: Option<&MessageContext>) -> HandlerResult {
        Reply::channel(self).respond(target).await
    }
}

#[async_trait]
impl<T: HandlerResponse> HandlerResponse for Option<T> {
    async fn respond(self, target: Option<&MessageContext>) -> HandlerResult {
        match self {
            Some(t) => t.respond(target).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<T, E> HandlerResponse for Result<T, E>
where
    T: HandlerResponse,
    E: Into<BoxError> + Send + 'static,
{
    async fn respond(self, target: Option<&MessageContext>) -> HandlerResult {
        match self {
            Ok(t) => t.respond(target).await,
            Err(e) => Err(e.into()),
        }
    }
}
