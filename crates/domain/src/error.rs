//! Domain error types.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

use crate::user::UserError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No constructor is registered for a command or event identifier.
    #[error("Unknown {kind} identifier: {id}")]
    UnknownIdentifier { kind: &'static str, id: String },

    /// The repository has no constructor for an aggregate type.
    #[error("Unknown aggregate type: {0}")]
    UnknownAggregateType(String),

    /// A registered decoder produced a value of a different shape than the
    /// identifier it was registered under.
    #[error("Registry for {kind} {registered} decoded a {decoded} payload")]
    IdentifierMismatch {
        kind: &'static str,
        registered: String,
        decoded: &'static str,
    },

    /// An event addressed to one aggregate was applied to another.
    #[error("Event for aggregate {event} applied to aggregate {aggregate}")]
    AggregateMismatch {
        aggregate: AggregateId,
        event: AggregateId,
    },

    /// Generic validation failure.
    #[error("Validation error: {0}")]
    Validation(String),

    /// One or more cross-cutting validators rejected the command.
    #[error("Command rejected: {0}")]
    Rejected(ValidationErrors),

    /// A programming invariant did not hold. Never a user error.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// An error occurred in the user aggregate.
    #[error("User error: {0}")]
    User(#[from] UserError),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true for failures the caller could not have caused:
    /// broken invariants, storage and encoding problems.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            DomainError::InvariantViolation(_)
                | DomainError::IdentifierMismatch { .. }
                | DomainError::EventStore(_)
                | DomainError::Serialization(_)
        )
    }
}

/// Every failure reported by the validators of one command.
#[derive(Debug, Default)]
pub struct ValidationErrors(Vec<DomainError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: DomainError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn errors(&self) -> &[DomainError] {
        &self.0
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}
