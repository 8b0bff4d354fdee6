use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AfterSaveHooks, AggregateId, EventEnvelope, EventHook, Result,
    store::{EventStore, EventStream, validate_events_for_save},
};

/// In-memory event store implementation.
///
/// Events are kept in insertion order. Per-aggregate and per-shape reads sort
/// by `created_at` with a stable sort so insertion order breaks timestamp
/// ties; the full-log stream is plain insertion order.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
    hooks: AfterSaveHooks,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Clears all events. Registered hooks are kept.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }

    fn sorted(mut events: Vec<EventEnvelope>) -> Vec<EventEnvelope> {
        events.sort_by_key(|e| e.created_at);
        events
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn save(&self, events: Vec<EventEnvelope>) -> Result<()> {
        validate_events_for_save(&events)?;
        if events.is_empty() {
            return Ok(());
        }

        {
            let mut store = self.events.write().await;
            store.extend(events.iter().cloned());
        }

        metrics::counter!("event_store_events_saved_total").increment(events.len() as u64);
        self.hooks.run(&events).await;
        Ok(())
    }

    async fn load(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let events = store
            .iter()
            .filter(|e| &e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        Ok(Self::sorted(events))
    }

    async fn load_by_event_ids(&self, event_ids: &[&str]) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let events = store
            .iter()
            .filter(|e| event_ids.contains(&e.event_id.as_str()))
            .cloned()
            .collect();
        Ok(Self::sorted(events))
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.events.read().await.clone();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn register_hook(&self, hook: Arc<dyn EventHook>) {
        self.hooks.register(hook).await;
    }
}
