//! Command model.

use common::{AggregateId, CorrelationId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Fields every command carries regardless of its shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Identifier of the command shape, e.g. `user.change.email`.
    pub command_id: String,

    /// Target aggregate. Empty for creation commands.
    #[serde(default)]
    pub aggregate_id: AggregateId,

    /// Target aggregate type, e.g. `user`.
    pub aggregate_type: String,

    /// Unique per invocation.
    #[serde(default)]
    pub correlation_id: CorrelationId,
}

/// The shape-specific part of a command.
///
/// Implemented by the closed set of commands an aggregate accepts.
pub trait CommandPayload: Serialize + Clone + std::fmt::Debug + Send + Sync + 'static {
    /// The aggregate this command is validated against.
    type Aggregate;

    /// Identifier of this payload's shape.
    fn command_id(&self) -> &'static str;

    /// Checks the command against the reconstructed target aggregate.
    fn validate(
        &self,
        envelope: &CommandEnvelope,
        aggregate: &Self::Aggregate,
    ) -> Result<(), DomainError>;
}

/// An immutable request to change the state of one aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command<P> {
    #[serde(flatten)]
    envelope: CommandEnvelope,
    payload: P,
}

impl<P: CommandPayload> Command<P> {
    /// Builds a command; the shape identifier is taken from the payload.
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<AggregateId>,
        correlation_id: impl Into<CorrelationId>,
        payload: P,
    ) -> Self {
        Self {
            envelope: CommandEnvelope {
                command_id: payload.command_id().to_string(),
                aggregate_id: aggregate_id.into(),
                aggregate_type: aggregate_type.into(),
                correlation_id: correlation_id.into(),
            },
            payload,
        }
    }

    pub(crate) fn from_parts(envelope: CommandEnvelope, payload: P) -> Self {
        Self { envelope, payload }
    }

    pub fn command_id(&self) -> &str {
        &self.envelope.command_id
    }

    pub fn aggregate_id(&self) -> &AggregateId {
        &self.envelope.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.envelope.aggregate_type
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.envelope.correlation_id
    }

    pub fn envelope(&self) -> &CommandEnvelope {
        &self.envelope
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Self-validation against the reconstructed target aggregate.
    pub fn validate(&self, aggregate: &P::Aggregate) -> Result<(), DomainError> {
        self.payload.validate(&self.envelope, aggregate)
    }

    pub fn into_parts(self) -> (CommandEnvelope, P) {
        (self.envelope, self.payload)
    }
}
