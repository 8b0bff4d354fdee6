//! Event model.

use chrono::{DateTime, Utc};
use common::{AggregateId, CorrelationId};
use event_store::EventEnvelope;
use serde::Serialize;

use crate::command::{Command, CommandPayload};
use crate::error::DomainError;

/// Trait for domain events.
///
/// Domain events are pure data records naming something that already
/// happened. The identifier is used for serialization and category queries.
pub trait DomainEvent: Serialize + Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Returns the identifier of this event's shape.
    fn event_id(&self) -> &'static str;
}

/// Fields every event carries regardless of its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    pub event_id: String,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub correlation_id: CorrelationId,
    pub created_at: DateTime<Utc>,
}

/// An immutable record of a state change of one aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<P> {
    metadata: EventMetadata,
    payload: P,
}

impl<P: DomainEvent> Event<P> {
    /// Creates a new event stamped with the current UTC time.
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: AggregateId,
        correlation_id: CorrelationId,
        payload: P,
    ) -> Self {
        Self {
            metadata: EventMetadata {
                event_id: payload.event_id().to_string(),
                aggregate_id,
                aggregate_type: aggregate_type.into(),
                correlation_id,
                created_at: Utc::now(),
            },
            payload,
        }
    }

    /// Creates an event caused by `command`, copying its aggregate type and
    /// correlation id. `aggregate_id` is explicit because creation commands
    /// carry none.
    pub fn for_command<C: CommandPayload>(
        command: &Command<C>,
        aggregate_id: AggregateId,
        payload: P,
    ) -> Self {
        Self::new(
            command.aggregate_type(),
            aggregate_id,
            command.correlation_id().clone(),
            payload,
        )
    }

    pub(crate) fn from_parts(metadata: EventMetadata, payload: P) -> Self {
        Self { metadata, payload }
    }

    pub fn event_id(&self) -> &str {
        &self.metadata.event_id
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        &self.metadata.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.metadata.aggregate_type
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.metadata.correlation_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.metadata.created_at
    }

    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Converts to the stored form.
    pub fn to_envelope(&self) -> Result<EventEnvelope, DomainError> {
        let envelope = EventEnvelope::builder()
            .event_id(self.metadata.event_id.clone())
            .aggregate_id(self.metadata.aggregate_id.clone())
            .aggregate_type(self.metadata.aggregate_type.clone())
            .correlation_id(self.metadata.correlation_id.clone())
            .created_at(self.metadata.created_at)
            .payload(&self.payload)?
            .build()?;
        Ok(envelope)
    }
}
