//! A [`ResponseSink`] that records instead of transmitting.

use crate::error::Error;
use crate::plugin::ResponseSink;
use trust_dns_proto::op::Message;

/// Holds back the answer a downstream handler writes so it can be inspected before anything
/// reaches the client. Only the most recent write is kept.
#[derive(Debug, Default, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct CaptureSink {
    message: Option<Message>,
}

impl CaptureSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last message written, if any.
    #[must_use]
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    #[must_use]
    pub fn into_message(self) -> Option<Message> {
        self.message
    }
}

#[async_trait::async_trait]
impl ResponseSink for CaptureSink {
    async fn write(&mut self, message: Message) -> Result<(), Error> {
        self.message = Some(message);
        Ok(())
    }
}
