//! Live delivery of saved events to a projection.

use async_trait::async_trait;
use event_store::{EventEnvelope, EventHook, HookError};

use crate::projection::Projection;

/// Adapts a projection into an after-save hook so it follows new events as
/// they are saved.
///
/// Register it only after catch-up has finished, otherwise the projection
/// position no longer matches the log.
pub struct ProjectionHook<P> {
    projection: P,
}

impl<P: Projection> ProjectionHook<P> {
    pub fn new(projection: P) -> Self {
        Self { projection }
    }
}

#[async_trait]
impl<P: Projection> EventHook for ProjectionHook<P> {
    fn name(&self) -> &'static str {
        self.projection.name()
    }

    async fn after_save(&self, event: &EventEnvelope) -> Result<(), HookError> {
        self.projection.handle(event).await?;
        metrics::counter!("projections_events_processed", "projection" => self.projection.name())
            .increment(1);
        Ok(())
    }
}
