use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventHook, EventStoreError, Result};

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Core trait for event store implementations.
///
/// An event store is an append-only log keyed by aggregate identifier.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Saves a batch of events.
    ///
    /// The batch is atomic: either every event becomes visible to `load`, or
    /// none does. After a successful save every registered hook is invoked
    /// once per event. An empty batch is a successful no-op.
    async fn save(&self, events: Vec<EventEnvelope>) -> Result<()>;

    /// Loads all events for one aggregate, oldest first.
    ///
    /// An unknown aggregate yields an empty vector, not an error.
    async fn load(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>>;

    /// Loads every event whose shape identifier is in `event_ids`, oldest
    /// first, across all aggregates.
    async fn load_by_event_ids(&self, event_ids: &[&str]) -> Result<Vec<EventEnvelope>>;

    /// Streams the whole log in append order.
    ///
    /// The order is stable across calls and new events only ever appear at
    /// the end, so a consumer may resume by skipping the events it has
    /// already seen.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Registers a hook to run after every successful save.
    async fn register_hook(&self, hook: Arc<dyn EventHook>);
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn save(&self, events: Vec<EventEnvelope>) -> Result<()> {
        (**self).save(events).await
    }

    async fn load(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>> {
        (**self).load(aggregate_id).await
    }

    async fn load_by_event_ids(&self, event_ids: &[&str]) -> Result<Vec<EventEnvelope>> {
        (**self).load_by_event_ids(event_ids).await
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        (**self).stream_all_events().await
    }

    async fn register_hook(&self, hook: Arc<dyn EventHook>) {
        (**self).register_hook(hook).await
    }
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Saves a single event.
    async fn save_event(&self, event: EventEnvelope) -> Result<()> {
        self.save(vec![event]).await
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks a batch before it is written.
///
/// Every event must name its shape and its aggregate; a single bad event
/// rejects the whole batch.
pub fn validate_events_for_save(events: &[EventEnvelope]) -> Result<()> {
    for (index, event) in events.iter().enumerate() {
        if event.event_id.is_empty() {
            return Err(EventStoreError::InvalidEvent(format!(
                "event at position {index} has no event_id"
            )));
        }
        if event.aggregate_id.is_empty() {
            return Err(EventStoreError::InvalidEvent(format!(
                "event {} at position {index} has no aggregate_id",
                event.event_id
            )));
        }
    }
    Ok(())
}
