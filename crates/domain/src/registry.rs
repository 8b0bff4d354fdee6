//! Identifier-driven serialization for commands and events.
//!
//! Payloads travel as untyped JSON. Decoding happens in two phases: the
//! envelope is read first with the payload kept opaque, then the identifier
//! selects the decoder for the payload. Registries are plain values built at
//! startup and shared read-only afterwards.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use event_store::{EventEnvelope, EventStoreError};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::command::{Command, CommandEnvelope, CommandPayload};
use crate::error::DomainError;
use crate::event::{DomainEvent, Event, EventMetadata};

type Decoder<T> = Box<dyn Fn(serde_json::Value) -> Result<T, serde_json::Error> + Send + Sync>;

fn decoder<S, T>(wrap: fn(S) -> T) -> Decoder<T>
where
    S: DeserializeOwned + 'static,
    T: 'static,
{
    Box::new(move |payload| serde_json::from_value::<S>(payload).map(wrap))
}

/// An absent or null payload decodes as the empty shape, so every field
/// falls back to its default.
fn normalize(payload: serde_json::Value) -> serde_json::Value {
    match payload {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        other => other,
    }
}

#[derive(Deserialize)]
struct RawCommand {
    #[serde(flatten)]
    envelope: CommandEnvelope,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Maps command identifiers to payload decoders.
pub struct CommandRegistry<P> {
    decoders: HashMap<String, Decoder<P>>,
}

impl<P: CommandPayload> CommandRegistry<P> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers the payload shape `S` under `command_id`, wrapped into the
    /// aggregate's command type by `wrap`. Re-registering an identifier
    /// replaces the previous decoder.
    pub fn register<S>(&mut self, command_id: impl Into<String>, wrap: fn(S) -> P) -> &mut Self
    where
        S: DeserializeOwned + 'static,
    {
        self.decoders.insert(command_id.into(), decoder(wrap));
        self
    }

    pub fn is_registered(&self, command_id: &str) -> bool {
        self.decoders.contains_key(command_id)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Serializes a command. Fails for identifiers this registry could not
    /// decode again.
    pub fn marshal(&self, command: &Command<P>) -> Result<Vec<u8>, DomainError> {
        if !self.is_registered(command.command_id()) {
            return Err(DomainError::UnknownIdentifier {
                kind: "command",
                id: command.command_id().to_string(),
            });
        }
        Ok(serde_json::to_vec(command)?)
    }

    pub fn unmarshal(&self, bytes: &[u8]) -> Result<Command<P>, DomainError> {
        let raw: RawCommand = serde_json::from_slice(bytes)?;
        let payload = self.decode_payload(&raw.envelope.command_id, raw.payload)?;
        Ok(Command::from_parts(raw.envelope, payload))
    }

    /// Second decode phase: payload only, selected by identifier.
    pub fn decode_payload(
        &self,
        command_id: &str,
        payload: serde_json::Value,
    ) -> Result<P, DomainError> {
        let decode = self
            .decoders
            .get(command_id)
            .ok_or_else(|| DomainError::UnknownIdentifier {
                kind: "command",
                id: command_id.to_string(),
            })?;

        let payload = decode(normalize(payload))?;
        if payload.command_id() != command_id {
            return Err(DomainError::IdentifierMismatch {
                kind: "command",
                registered: command_id.to_string(),
                decoded: payload.command_id(),
            });
        }
        Ok(payload)
    }
}

impl<P: CommandPayload> Default for CommandRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps event identifiers to payload decoders.
pub struct EventRegistry<P> {
    decoders: HashMap<String, Decoder<P>>,
}

impl<P: DomainEvent> EventRegistry<P> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers the payload shape `S` under `event_id`. Re-registering an
    /// identifier replaces the previous decoder.
    pub fn register<S>(&mut self, event_id: impl Into<String>, wrap: fn(S) -> P) -> &mut Self
    where
        S: DeserializeOwned + 'static,
    {
        self.decoders.insert(event_id.into(), decoder(wrap));
        self
    }

    pub fn is_registered(&self, event_id: &str) -> bool {
        self.decoders.contains_key(event_id)
    }

    /// Registered identifiers, for category queries.
    pub fn event_ids(&self) -> Vec<&str> {
        self.decoders.keys().map(String::as_str).collect()
    }

    pub fn marshal(&self, event: &Event<P>) -> Result<Vec<u8>, DomainError> {
        Ok(serde_json::to_vec(&self.encode(event)?)?)
    }

    pub fn unmarshal(&self, bytes: &[u8]) -> Result<Event<P>, DomainError> {
        #[derive(Deserialize)]
        struct RawEvent {
            event_id: String,
            #[serde(default)]
            aggregate_id: common::AggregateId,
            #[serde(default)]
            aggregate_type: String,
            #[serde(default)]
            correlation_id: common::CorrelationId,
            created_at: Option<DateTime<Utc>>,
            #[serde(default)]
            payload: serde_json::Value,
        }

        let raw: RawEvent = serde_json::from_slice(bytes)?;
        if !self.is_registered(&raw.event_id) {
            return Err(DomainError::UnknownIdentifier {
                kind: "event",
                id: raw.event_id,
            });
        }
        // The timestamp is stamped once when the event is produced; decoding
        // never invents one.
        let created_at = raw.created_at.ok_or_else(|| {
            EventStoreError::InvalidEvent(format!("{} has no created_at", raw.event_id))
        })?;

        self.decode(EventEnvelope {
            event_id: raw.event_id,
            aggregate_id: raw.aggregate_id,
            aggregate_type: raw.aggregate_type,
            correlation_id: raw.correlation_id,
            created_at,
            payload: raw.payload,
        })
    }

    /// Converts a typed event to its stored form.
    pub fn encode(&self, event: &Event<P>) -> Result<EventEnvelope, DomainError> {
        if !self.is_registered(event.event_id()) {
            return Err(DomainError::UnknownIdentifier {
                kind: "event",
                id: event.event_id().to_string(),
            });
        }
        event.to_envelope()
    }

    /// Decodes a stored event into its typed form.
    pub fn decode(&self, envelope: EventEnvelope) -> Result<Event<P>, DomainError> {
        let decode =
            self.decoders
                .get(&envelope.event_id)
                .ok_or_else(|| DomainError::UnknownIdentifier {
                    kind: "event",
                    id: envelope.event_id.clone(),
                })?;

        if envelope.aggregate_id.is_empty() {
            return Err(EventStoreError::InvalidEvent(format!(
                "{} has no aggregate_id",
                envelope.event_id
            ))
            .into());
        }

        let payload = decode(normalize(envelope.payload))?;
        if payload.event_id() != envelope.event_id {
            return Err(DomainError::IdentifierMismatch {
                kind: "event",
                registered: envelope.event_id,
                decoded: payload.event_id(),
            });
        }

        Ok(Event::from_parts(
            EventMetadata {
                event_id: envelope.event_id,
                aggregate_id: envelope.aggregate_id,
                aggregate_type: envelope.aggregate_type,
                correlation_id: envelope.correlation_id,
                created_at: envelope.created_at,
            },
            payload,
        ))
    }
}

impl<P: DomainEvent> Default for EventRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}
