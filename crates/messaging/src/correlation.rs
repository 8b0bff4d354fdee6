//! Matching asynchronous command outcomes back to their waiting caller.
//!
//! A caller subscribes to its correlation id *before* sending the command,
//! waits with a deadline, and unsubscribes on every exit path. Each
//! subscription is a one-slot rendezvous: the first outcome is kept, any
//! further delivery is refused with [`CorrelationError::AlreadyDelivered`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use common::CorrelationId;
use tokio::sync::oneshot;

use crate::error::CorrelationError;

const SUBJECT_PREFIX: &str = "event.";
const SUCCESS_SUFFIX: &str = "success";
const ERROR_SUFFIX: &str = "error";

/// The single result of a command, published on its correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The command was persisted. Carries the aggregate id bytes.
    Success(Vec<u8>),
    /// The command failed. Carries the error text.
    Error(String),
}

impl Outcome {
    /// Subject this outcome is published on: `event.<correlation_id>.success`
    /// or `event.<correlation_id>.error`.
    pub fn subject(&self, correlation_id: &CorrelationId) -> String {
        let suffix = match self {
            Outcome::Success(_) => SUCCESS_SUFFIX,
            Outcome::Error(_) => ERROR_SUFFIX,
        };
        format!("{SUBJECT_PREFIX}{correlation_id}.{suffix}")
    }

    /// Rebuilds an outcome from a subject and its raw payload.
    ///
    /// Returns `None` for subjects outside the `event.<id>.<kind>` scheme.
    pub fn from_subject(subject: &str, payload: Vec<u8>) -> Option<(CorrelationId, Outcome)> {
        let rest = subject.strip_prefix(SUBJECT_PREFIX)?;
        let (correlation_id, kind) = rest.rsplit_once('.')?;
        if correlation_id.is_empty() {
            return None;
        }

        let outcome = match kind {
            SUCCESS_SUFFIX => Outcome::Success(payload),
            ERROR_SUFFIX => Outcome::Error(String::from_utf8_lossy(&payload).into_owned()),
            _ => return None,
        };
        Some((CorrelationId::new(correlation_id), outcome))
    }

    /// Raw bytes carried on the wire.
    pub fn into_payload(self) -> Vec<u8> {
        match self {
            Outcome::Success(bytes) => bytes,
            Outcome::Error(message) => message.into_bytes(),
        }
    }
}

#[derive(Default)]
struct Slot {
    sender: Option<oneshot::Sender<Outcome>>,
    receiver: Option<oneshot::Receiver<Outcome>>,
}

type Slots = HashMap<CorrelationId, Slot>;

/// Registry of open correlation subscriptions.
///
/// Cheap to clone; clones share the same subscriptions. The lock is never
/// held across an `.await`, so every method except [`wait`](Self::wait) is
/// synchronous and cleanup can run from `Drop`.
#[derive(Clone, Default)]
pub struct CorrelationRegistry {
    slots: Arc<Mutex<Slots>>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens the one-slot buffer for `correlation_id`.
    pub fn subscribe(&self, correlation_id: &CorrelationId) -> Result<(), CorrelationError> {
        let mut slots = self.slots();
        if slots.contains_key(correlation_id) {
            return Err(CorrelationError::AlreadySubscribed(correlation_id.to_string()));
        }

        let (sender, receiver) = oneshot::channel();
        slots.insert(
            correlation_id.clone(),
            Slot {
                sender: Some(sender),
                receiver: Some(receiver),
            },
        );
        tracing::trace!(%correlation_id, "subscribed");
        Ok(())
    }

    /// Subscribes and returns a guard that unsubscribes when dropped, on
    /// every exit path including cancellation of the waiting future.
    pub fn subscription(&self, correlation_id: &CorrelationId) -> Result<Subscription, CorrelationError> {
        self.subscribe(correlation_id)?;
        Ok(Subscription {
            registry: self.clone(),
            correlation_id: correlation_id.clone(),
        })
    }

    /// Delivers the outcome for `correlation_id`.
    ///
    /// Only the first delivery is accepted. A later one fails with
    /// [`CorrelationError::AlreadyDelivered`] and never replaces the first.
    pub fn publish(
        &self,
        correlation_id: &CorrelationId,
        outcome: Outcome,
    ) -> Result<(), CorrelationError> {
        let sender = {
            let mut slots = self.slots();
            let slot = slots
                .get_mut(correlation_id)
                .ok_or_else(|| CorrelationError::NotSubscribed(correlation_id.to_string()))?;
            slot.sender
                .take()
                .ok_or_else(|| CorrelationError::AlreadyDelivered(correlation_id.to_string()))?
        };

        sender
            .send(outcome)
            .map_err(|_| CorrelationError::Closed(correlation_id.to_string()))
    }

    /// Waits for the outcome of `correlation_id` until `timeout` elapses.
    ///
    /// A success yields the payload bytes; a remote failure yields
    /// [`CorrelationError::Remote`], distinct from [`CorrelationError::Timeout`].
    /// The subscription stays open; call [`CorrelationRegistry::unsubscribe`]
    /// afterwards.
    #[tracing::instrument(skip(self))]
    pub async fn wait(
        &self,
        correlation_id: &CorrelationId,
        timeout: Duration,
    ) -> Result<Vec<u8>, CorrelationError> {
        let receiver = {
            let mut slots = self.slots();
            let slot = slots
                .get_mut(correlation_id)
                .ok_or_else(|| CorrelationError::NotSubscribed(correlation_id.to_string()))?;
            slot.receiver
                .take()
                .ok_or_else(|| CorrelationError::Closed(correlation_id.to_string()))?
        };

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(Outcome::Success(payload))) => Ok(payload),
            Ok(Ok(Outcome::Error(message))) => Err(CorrelationError::Remote(message)),
            Ok(Err(_)) => Err(CorrelationError::Closed(correlation_id.to_string())),
            Err(_) => {
                metrics::counter!("correlation_timeouts_total").increment(1);
                tracing::warn!(?timeout, "timed out waiting for outcome");
                Err(CorrelationError::Timeout(timeout))
            }
        }
    }

    /// Releases the subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, correlation_id: &CorrelationId) {
        if self.slots().remove(correlation_id).is_some() {
            tracing::trace!(%correlation_id, "unsubscribed");
        }
    }

    /// Number of open subscriptions.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }
}

/// An open subscription, released on drop.
pub struct Subscription {
    registry: CorrelationRegistry,
    correlation_id: CorrelationId,
}

impl Subscription {
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// See [`CorrelationRegistry::wait`].
    pub async fn wait(&self, timeout: Duration) -> Result<Vec<u8>, CorrelationError> {
        self.registry.wait(&self.correlation_id, timeout).await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(&self.correlation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corr(id: &str) -> CorrelationId {
        CorrelationId::new(id)
    }

    mod subjects {
        use super::*;

        #[test]
        fn outcome_subjects() {
            let id = corr("c-1");
            assert_eq!(Outcome::Success(vec![]).subject(&id), "event.c-1.success");
            assert_eq!(Outcome::Error("x".into()).subject(&id), "event.c-1.error");
        }

        #[test]
        fn parses_published_subjects() {
            let (id, outcome) =
                Outcome::from_subject("event.c-1.success", b"u-1".to_vec()).unwrap();
            assert_eq!(id, corr("c-1"));
            assert_eq!(outcome, Outcome::Success(b"u-1".to_vec()));

            let (_, outcome) = Outcome::from_subject("event.c-1.error", b"boom".to_vec()).unwrap();
            assert_eq!(outcome, Outcome::Error("boom".into()));
        }

        #[test]
        fn rejects_foreign_subjects() {
            assert!(Outcome::from_subject("command.user", vec![]).is_none());
            assert!(Outcome::from_subject("event.c-1.done", vec![]).is_none());
            assert!(Outcome::from_subject("event..success", vec![]).is_none());
        }
    }

    #[tokio::test]
    async fn success_reaches_waiter() {
        let registry = CorrelationRegistry::new();
        let id = corr("c-1");
        registry.subscribe(&id).unwrap();

        registry
            .publish(&id, Outcome::Success(b"u-1".to_vec()))
            .unwrap();
        let payload = registry.wait(&id, Duration::from_secs(1)).await.unwrap();

        assert_eq!(payload, b"u-1");
        registry.unsubscribe(&id);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn remote_error_is_distinct_from_timeout() {
        let registry = CorrelationRegistry::new();
        let id = corr("c-1");
        registry.subscribe(&id).unwrap();
        registry
            .publish(&id, Outcome::Error("email taken".into()))
            .unwrap();

        assert_eq!(
            registry.wait(&id, Duration::from_secs(1)).await,
            Err(CorrelationError::Remote("email taken".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out() {
        let registry = CorrelationRegistry::new();
        let id = corr("c-1");
        registry.subscribe(&id).unwrap();

        let result = registry.wait(&id, Duration::from_millis(50)).await;
        assert_eq!(
            result,
            Err(CorrelationError::Timeout(Duration::from_millis(50)))
        );
    }

    #[tokio::test]
    async fn waiting_without_subscription_is_a_usage_error() {
        let registry = CorrelationRegistry::new();
        assert!(matches!(
            registry.wait(&corr("c-1"), Duration::from_secs(1)).await,
            Err(CorrelationError::NotSubscribed(_))
        ));
        assert!(matches!(
            registry.publish(&corr("c-1"), Outcome::Success(vec![])),
            Err(CorrelationError::NotSubscribed(_))
        ));
    }

    #[tokio::test]
    async fn double_subscription_is_refused() {
        let registry = CorrelationRegistry::new();
        registry.subscribe(&corr("c-1")).unwrap();
        assert!(matches!(
            registry.subscribe(&corr("c-1")),
            Err(CorrelationError::AlreadySubscribed(_))
        ));
    }

    #[tokio::test]
    async fn second_outcome_is_refused_and_first_wins() {
        let registry = CorrelationRegistry::new();
        let id = corr("c-1");
        registry.subscribe(&id).unwrap();

        registry
            .publish(&id, Outcome::Success(b"first".to_vec()))
            .unwrap();
        let second = registry
            .publish(&id, Outcome::Success(b"second".to_vec()));

        assert_eq!(
            second,
            Err(CorrelationError::AlreadyDelivered("c-1".into()))
        );
        assert_eq!(
            registry.wait(&id, Duration::from_secs(1)).await.unwrap(),
            b"first"
        );
    }

    #[tokio::test]
    async fn publish_after_waiter_left_reports_closed() {
        let registry = CorrelationRegistry::new();
        let id = corr("c-1");
        registry.subscribe(&id).unwrap();
        let _ = registry.wait(&id, Duration::from_millis(1)).await;

        assert!(matches!(
            registry.publish(&id, Outcome::Success(vec![])),
            Err(CorrelationError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn waiter_sees_outcome_published_later() {
        let registry = CorrelationRegistry::new();
        let id = corr("c-1");
        registry.subscribe(&id).unwrap();

        let publisher = registry.clone();
        let published = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher
                .publish(&published, Outcome::Success(b"late".to_vec()))
                .unwrap();
        });

        assert_eq!(
            registry.wait(&id, Duration::from_secs(2)).await.unwrap(),
            b"late"
        );
    }

    #[tokio::test]
    async fn unsubscribe_unknown_is_noop() {
        let registry = CorrelationRegistry::new();
        registry.unsubscribe(&corr("missing"));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn subscription_releases_on_drop() {
        let registry = CorrelationRegistry::new();
        let id = corr("c-1");

        let subscription = registry.subscription(&id).unwrap();
        assert_eq!(registry.len(), 1);
        registry.publish(&id, Outcome::Success(b"u-1".to_vec())).unwrap();
        assert_eq!(subscription.wait(Duration::from_secs(1)).await.unwrap(), b"u-1");

        drop(subscription);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_still_releases_subscription() {
        let registry = CorrelationRegistry::new();
        let id = corr("c-1");

        let waiting = {
            let registry = registry.clone();
            let id = id.clone();
            async move {
                let subscription = registry.subscription(&id)?;
                subscription.wait(Duration::from_secs(60)).await
            }
        };
        let result = tokio::time::timeout(Duration::from_millis(10), waiting).await;

        assert!(result.is_err());
        assert!(registry.is_empty());
    }
}
