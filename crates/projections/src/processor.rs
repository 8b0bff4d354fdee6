//! Feeds the event log to registered projections.

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;

use crate::Result;
use crate::projection::Projection;

/// Drives projections from an [`EventStore`].
///
/// On boot, [`run_catch_up`](Self::run_catch_up) streams the whole log and
/// offers each projection only the events past its position. After that,
/// new events arrive through [`process_event`](Self::process_event) or a
/// [`ProjectionHook`](crate::ProjectionHook).
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        tracing::debug!(projection = projection.name(), "projection registered");
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Brings every projection up to the end of the log.
    ///
    /// Returns the length of the log.
    #[tracing::instrument(skip(self), fields(projections = self.projections.len()))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut stream = self.store.stream_all_events().await?;
        let mut log_index: u64 = 0;

        while let Some(event) = stream.next().await {
            let event = event?;
            log_index += 1;

            for projection in &self.projections {
                if projection.position().await.is_behind(log_index) {
                    Self::deliver(projection.as_ref(), &event).await?;
                }
            }
        }

        tracing::info!(log_length = log_index, "catch-up complete");
        Ok(log_index)
    }

    /// Offers one new event to every projection.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.event_id))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        for projection in &self.projections {
            Self::deliver(projection.as_ref(), event).await?;
        }
        Ok(())
    }

    /// Resets every projection, then replays the whole log.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }

    async fn deliver(projection: &dyn Projection, event: &EventEnvelope) -> Result<()> {
        projection.handle(event).await?;
        metrics::counter!("projections_events_processed", "projection" => projection.name())
            .increment(1);
        Ok(())
    }
}
