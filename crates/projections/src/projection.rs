//! Projection contract and the log position each projection has reached.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_store::EventEnvelope;

use crate::Result;

/// How far into the event log a projection has read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Events consumed so far, including those the projection ignored.
    pub events_processed: u64,

    /// Creation time of the last consumed event.
    pub last_event_at: Option<DateTime<Utc>>,
}

impl ProjectionPosition {
    /// Nothing consumed yet.
    pub const START: Self = Self {
        events_processed: 0,
        last_event_at: None,
    };

    /// The position once `event` has been consumed.
    pub fn after(&self, event: &EventEnvelope) -> Self {
        Self {
            events_processed: self.events_processed + 1,
            last_event_at: Some(event.created_at),
        }
    }

    /// True while the event at 1-based `log_index` has not been consumed.
    pub fn is_behind(&self, log_index: u64) -> bool {
        self.events_processed < log_index
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.last_event_at {
            Some(at) => write!(f, "{} events (last at {})", self.events_processed, at.to_rfc3339()),
            None => write!(f, "{} events", self.events_processed),
        }
    }
}

/// Folds the event log into a read model.
///
/// Every event of the log is offered, whatever its aggregate type; a
/// projection skips what it does not care about but still advances its
/// position so catch-up can resume from it.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Label used in logs and the `projections_events_processed` metric.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops all projected state and rewinds to [`ProjectionPosition::START`].
    async fn reset(&self) -> Result<()>;
}
