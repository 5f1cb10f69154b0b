use anyhow::{
    Error,
    Result,
};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::message::message::Message;

/// The session an invocation responds through.
///
/// Sending suspends until the session has accepted the message. Any error is a transmission
/// failure, which invocations never recover from.
#[async_trait]
pub trait Session: Send + Sync {
    /// Sends a message to the router.
    async fn send(&self, message: Message) -> Result<()>;
}

#[async_trait]
impl Session for mpsc::Sender<Message> {
    async fn send(&self, message: Message) -> Result<()> {
        mpsc::Sender::send(self, message)
            .await
            .map_err(|err| {
                Error::msg(format!(
                    "failed to send {} message: session closed",
                    err.0.message_name()
                ))
            })
    }
}

#[async_trait]
impl Session for mpsc::UnboundedSender<Message> {
    async fn send(&self, message: Message) -> Result<()> {
        mpsc::UnboundedSender::send(self, message)
            .map_err(|err| {
                Error::msg(format!(
                    "failed to send {} message: session closed",
                    err.0.message_name()
                ))
            })
    }
}
