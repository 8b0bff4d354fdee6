use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AggregateId, CorrelationId, EventStoreError, Result};

/// The stored and wire form of an event.
///
/// `event_id` names the event *shape* (for example `user.email.changed`),
/// not the individual occurrence. The payload is kept as opaque JSON so the
/// envelope can be decoded before the shape is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Identifier of the event shape.
    pub event_id: String,

    /// The aggregate this event belongs to. Never empty once stored.
    pub aggregate_id: AggregateId,

    /// The type of aggregate (e.g. "user").
    pub aggregate_type: String,

    /// Correlation id copied from the originating command.
    #[serde(default)]
    pub correlation_id: CorrelationId,

    /// When the event was created (server side, UTC).
    pub created_at: DateTime<Utc>,

    /// The shape-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    correlation_id: Option<CorrelationId>,
    created_at: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event shape identifier.
    pub fn event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn aggregate_id(mut self, id: impl Into<AggregateId>) -> Self {
        self.aggregate_id = Some(id.into());
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn correlation_id(mut self, id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Sets the creation time. If not set, the current time will be used.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the envelope.
    ///
    /// Fails with [`EventStoreError::InvalidEvent`] when the event id or the
    /// aggregate id is missing or empty. A missing payload becomes an empty
    /// JSON object.
    pub fn build(self) -> Result<EventEnvelope> {
        let event_id = self
            .event_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| EventStoreError::InvalidEvent("event_id is required".into()))?;
        let aggregate_id = self
            .aggregate_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                EventStoreError::InvalidEvent(format!("aggregate_id is required for {event_id}"))
            })?;

        Ok(EventEnvelope {
            event_id,
            aggregate_id,
            aggregate_type: self.aggregate_type.unwrap_or_default(),
            correlation_id: self.correlation_id.unwrap_or_default(),
            created_at: self.created_at.unwrap_or_else(Utc::now),
            payload: self
                .payload
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
        })
    }
}
