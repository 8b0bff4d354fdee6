//! Aggregate root contract.

use common::AggregateId;

use crate::command::{Command, CommandPayload};
use crate::error::DomainError;
use crate::event::{DomainEvent, Event};

/// State shared by every aggregate root: its identity and the events
/// recorded by the command currently being handled.
#[derive(Debug, Clone)]
pub struct Root<E> {
    id: AggregateId,
    changes: Vec<Event<E>>,
}

impl<E> Default for Root<E> {
    fn default() -> Self {
        Self {
            id: AggregateId::default(),
            changes: Vec::new(),
        }
    }
}

impl<E: DomainEvent> Root<E> {
    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    /// True once the creation event has been applied.
    pub fn is_live(&self) -> bool {
        !self.id.is_empty()
    }

    /// Assigns the identity. It can be set exactly once.
    pub fn assign_id(&mut self, id: AggregateId) -> Result<(), DomainError> {
        if self.is_live() {
            return Err(DomainError::InvariantViolation(format!(
                "aggregate {} cannot be re-identified as {id}",
                self.id
            )));
        }
        if id.is_empty() {
            return Err(DomainError::InvariantViolation(
                "aggregate identity cannot be empty".into(),
            ));
        }
        self.id = id;
        Ok(())
    }

    /// Pending changes, oldest first.
    pub fn changes(&self) -> &[Event<E>] {
        &self.changes
    }

    pub fn record(&mut self, event: Event<E>) {
        self.changes.push(event);
    }

    pub fn clear_changes(&mut self) {
        self.changes.clear();
    }
}

/// Trait for event-sourced aggregate roots.
///
/// State is never set directly: commands produce events, and events are
/// applied. Replaying the same event sequence from the zero value always
/// yields the same state.
pub trait AggregateRoot: Send + Sync + Sized {
    /// The closed set of commands this aggregate handles.
    type Command: CommandPayload<Aggregate = Self>;

    /// The closed set of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    fn root(&self) -> &Root<Self::Event>;

    fn root_mut(&mut self) -> &mut Root<Self::Event>;

    /// Mutates state for one event. Implementations must not record the
    /// event; [`AggregateRoot::apply`] does that.
    fn apply_event(&mut self, event: &Event<Self::Event>) -> Result<(), DomainError>;

    /// Produces the events for `command` and applies each of them with
    /// `apply(true, ..)`.
    fn handle_command(&mut self, command: &Command<Self::Command>) -> Result<(), DomainError>;

    /// Applies an event. New events are also recorded as pending changes;
    /// replayed ones are not.
    fn apply(&mut self, is_new: bool, event: Event<Self::Event>) -> Result<(), DomainError> {
        let root = self.root();
        if root.is_live() && event.aggregate_id() != root.id() {
            return Err(DomainError::AggregateMismatch {
                aggregate: root.id().clone(),
                event: event.aggregate_id().clone(),
            });
        }

        self.apply_event(&event)?;
        if is_new {
            self.root_mut().record(event);
        }
        Ok(())
    }

    fn id(&self) -> &AggregateId {
        self.root().id()
    }

    fn changes(&self) -> &[Event<Self::Event>] {
        self.root().changes()
    }

    fn clear_changes(&mut self) {
        self.root_mut().clear_changes();
    }
}
