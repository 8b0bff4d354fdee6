//! User aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod validation;

pub use aggregate::User;
pub use commands::{
    ChangeUserEmail, ChangeUserPassword, CreateUser, DisableUser, EnableUser, ModifyUser,
    UserCommand, is_pre_hashed,
};
pub use events::{
    UserCreated, UserDisabled, UserEmailChanged, UserEnabled, UserEvent, UserPasswordChanged,
};
pub use service::UserService;
pub use validation::EmailUniqueness;

use thiserror::Error;

use crate::registry::{CommandRegistry, EventRegistry};

/// Aggregate type name used on commands, events and transport channels.
pub const USER_AGGREGATE_TYPE: &str = "user";

/// Errors that can occur during user operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserError {
    /// A creation command targeted an aggregate that already has an identity.
    #[error("User ID should not be set for create user command (found {0})")]
    AlreadyCreated(String),

    /// A non-creation command targeted a user that was never created.
    #[error("User does not exist: {0}")]
    NotFound(String),

    /// Passwords must arrive already hashed.
    #[error("Password is not hashed")]
    PasswordNotHashed,

    /// Another user already owns the email address.
    #[error("Email {0:?} is taken")]
    EmailTaken(String),
}

/// Builds the command registry for every user command shape.
pub fn command_registry() -> CommandRegistry<UserCommand> {
    let mut registry = CommandRegistry::new();
    registry
        .register(commands::CREATE_USER, UserCommand::Create)
        .register(commands::CHANGE_USER_EMAIL, UserCommand::ChangeEmail)
        .register(commands::CHANGE_USER_PASSWORD, UserCommand::ChangePassword)
        .register(commands::ENABLE_USER, UserCommand::Enable)
        .register(commands::DISABLE_USER, UserCommand::Disable)
        .register(commands::MODIFY_USER, UserCommand::Modify);
    registry
}

/// Builds the event registry for every user event shape.
pub fn event_registry() -> EventRegistry<UserEvent> {
    let mut registry = EventRegistry::new();
    registry
        .register(events::USER_CREATED, UserEvent::Created)
        .register(events::USER_EMAIL_CHANGED, UserEvent::EmailChanged)
        .register(events::USER_PASSWORD_CHANGED, UserEvent::PasswordChanged)
        .register(events::USER_ENABLED, UserEvent::Enabled)
        .register(events::USER_DISABLED, UserEvent::Disabled);
    registry
}

pub use commands::{
    CHANGE_USER_EMAIL, CHANGE_USER_PASSWORD, CREATE_USER, DISABLE_USER, ENABLE_USER, MODIFY_USER,
};
pub use events::{
    USER_CREATED, USER_DISABLED, USER_EMAIL_CHANGED, USER_ENABLED, USER_PASSWORD_CHANGED,
};
