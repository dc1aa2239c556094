//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{Driver, DriverError, MessageEvent};

/// Records replies instead of sending them.
#[derive(Debug)]
pub(crate) struct MockDriver {
    user_id: String,
    /// `(text, direct, channel_id)` per reply.
    replies: Mutex<Vec<(String, bool, String)>>,
}

impl MockDriver {
    pub(crate) fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            replies: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn replies(&self) -> Vec<(String, bool, String)> {
        self.replies.lock().clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn reply_to(
        &self,
        message: &MessageEvent,
        text: &str,
        direct: bool,
    ) -> Result<(), DriverError> {
        self.replies
            .lock()
            .push((text.to_owned(), direct, message.channel_id.clone()));
        Ok(())
    }
}
