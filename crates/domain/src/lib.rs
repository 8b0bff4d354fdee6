//! Domain layer for the users CQRS service.
//!
//! This crate provides the write-side abstractions:
//! - [`Command`] and [`Event`] value types with their shared envelopes
//! - [`CommandRegistry`] / [`EventRegistry`] for identifier-driven decoding
//! - [`AggregateRoot`] contract and the [`Repository`] that replays it
//! - [`CommandHandler`] orchestration with cross-cutting validators
//! - the [`User`] aggregate

pub mod aggregate;
pub mod command;
pub mod error;
pub mod event;
pub mod handler;
pub mod registry;
pub mod repository;
pub mod user;

#[cfg(test)]
mod testing;

pub use aggregate::{AggregateRoot, Root};
pub use command::{Command, CommandEnvelope, CommandPayload};
pub use error::{DomainError, ValidationErrors};
pub use event::{DomainEvent, Event, EventMetadata};
pub use handler::{CommandHandler, CommandResult, CommandValidator};
pub use registry::{CommandRegistry, EventRegistry};
pub use repository::Repository;
pub use user::{
    ChangeUserEmail, ChangeUserPassword, CreateUser, DisableUser, EmailUniqueness, EnableUser,
    ModifyUser, USER_AGGREGATE_TYPE, User, UserCommand, UserCreated, UserDisabled,
    UserEmailChanged, UserEnabled, UserError, UserEvent, UserPasswordChanged, UserService,
};
