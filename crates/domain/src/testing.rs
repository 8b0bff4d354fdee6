//! Test doubles shared by the unit tests of this crate.

use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use event_store::{EventEnvelope, EventHook, EventStore, EventStoreError, EventStream, Result};

/// A store whose writes always fail and which holds no events.
pub(crate) struct FailingStore;

#[async_trait]
impl EventStore for FailingStore {
    async fn save(&self, _events: Vec<EventEnvelope>) -> Result<()> {
        Err(EventStoreError::InvalidEvent("store is read-only".into()))
    }

    async fn load(&self, _aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>> {
        Ok(Vec::new())
    }

    async fn load_by_event_ids(&self, _event_ids: &[&str]) -> Result<Vec<EventEnvelope>> {
        Ok(Vec::new())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        Ok(Box::pin(futures_util::stream::empty()))
    }

    async fn register_hook(&self, _hook: Arc<dyn EventHook>) {}
}
