//! In-process request/reply transport.
//!
//! Commands are sent on a channel per aggregate type (`command.<type>`). The
//! listener answers right away with an acknowledgement (`ok:ack` or
//! `error:<message>`); the real outcome is published later on the command's
//! correlation id through [`CommandBus::publish`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc, oneshot};

use crate::correlation::{CorrelationRegistry, Outcome};
use crate::error::{MessagingError, Result};

/// Acknowledgement sent when a request was accepted.
pub const ACK_OK: &str = "ok:ack";

const ACK_ERROR_PREFIX: &str = "error:";

/// Builds the negative acknowledgement for `message`.
pub fn ack_error(message: impl std::fmt::Display) -> String {
    format!("{ACK_ERROR_PREFIX}{message}")
}

/// Channel name for commands targeting `aggregate_type`.
pub fn command_subject(aggregate_type: &str) -> String {
    format!("command.{aggregate_type}")
}

/// A command in flight, waiting for its acknowledgement.
#[derive(Debug)]
pub struct Request {
    pub payload: Vec<u8>,
    reply: oneshot::Sender<String>,
}

impl Request {
    /// Sends the acknowledgement back to the requester. A requester that
    /// stopped waiting is ignored.
    pub fn reply(self, ack: impl Into<String>) {
        if self.reply.send(ack.into()).is_err() {
            tracing::debug!("requester gone before acknowledgement");
        }
    }
}

/// Routes requests to bound listeners and outcomes to correlation waiters.
///
/// Cheap to clone; clones share channels and subscriptions.
#[derive(Clone, Default)]
pub struct CommandBus {
    channels: Arc<RwLock<HashMap<String, mpsc::Sender<Request>>>>,
    correlations: CorrelationRegistry,
}

impl CommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn correlations(&self) -> &CorrelationRegistry {
        &self.correlations
    }

    /// Binds a listener queue to `subject`, replacing any previous one.
    pub async fn bind(&self, subject: impl Into<String>, capacity: usize) -> mpsc::Receiver<Request> {
        let subject = subject.into();
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        tracing::debug!(%subject, "listener bound");
        self.channels.write().await.insert(subject, sender);
        receiver
    }

    /// Removes the binding for `subject`. The listener's queue drains and
    /// then closes.
    pub async fn unbind(&self, subject: &str) {
        if self.channels.write().await.remove(subject).is_some() {
            tracing::debug!(%subject, "listener unbound");
        }
    }

    /// Sends `payload` on `subject` and waits for the acknowledgement.
    #[tracing::instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub async fn request(&self, subject: &str, payload: Vec<u8>, timeout: Duration) -> Result<()> {
        let sender = self
            .channels
            .read()
            .await
            .get(subject)
            .cloned()
            .ok_or_else(|| MessagingError::NoListener(subject.to_string()))?;

        // One deadline covers both a full queue and a silent listener.
        let (reply, ack) = oneshot::channel();
        let exchange = async {
            sender
                .send(Request { payload, reply })
                .await
                .map_err(|_| MessagingError::NoListener(subject.to_string()))?;
            ack.await
                .map_err(|_| MessagingError::NoListener(subject.to_string()))
        };
        let ack = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| MessagingError::AckTimeout(timeout))??;

        parse_ack(&ack)
    }

    /// Publishes raw outcome bytes on an `event.<correlation_id>.<kind>`
    /// subject.
    pub fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        let (correlation_id, outcome) = Outcome::from_subject(subject, payload)
            .ok_or_else(|| MessagingError::InvalidSubject(subject.to_string()))?;
        self.correlations.publish(&correlation_id, outcome)?;
        Ok(())
    }
}

fn parse_ack(ack: &str) -> Result<()> {
    if ack == ACK_OK {
        return Ok(());
    }
    match ack.strip_prefix(ACK_ERROR_PREFIX) {
        Some(message) => Err(MessagingError::Rejected(message.to_string())),
        None => Err(MessagingError::InvalidReply(ack.to_string())),
    }
}
