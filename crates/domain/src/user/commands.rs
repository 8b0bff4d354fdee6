//! User commands.

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateRoot;
use crate::command::{CommandEnvelope, CommandPayload};
use crate::error::DomainError;

use super::{User, UserError};

pub const CREATE_USER: &str = "user.create";
pub const CHANGE_USER_EMAIL: &str = "user.change.email";
pub const CHANGE_USER_PASSWORD: &str = "user.change.password";
pub const ENABLE_USER: &str = "user.enable";
pub const DISABLE_USER: &str = "user.disable";
pub const MODIFY_USER: &str = "user.modify";

/// Command to create a new user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateUser {
    pub email: String,

    /// Must already be hashed.
    pub password: String,
}

/// Command to replace a user's email address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeUserEmail {
    pub email: String,
}

/// Command to replace a user's password.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeUserPassword {
    /// Must already be hashed.
    pub password: String,
}

/// Command to enable a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableUser {}

/// Command to disable a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableUser {}

/// Command to change any subset of a user's fields at once.
///
/// Only fields that are present and differ from the current state produce
/// events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifyUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
}

/// Every command the user aggregate accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UserCommand {
    Create(CreateUser),
    ChangeEmail(ChangeUserEmail),
    ChangePassword(ChangeUserPassword),
    Enable(EnableUser),
    Disable(DisableUser),
    Modify(ModifyUser),
}

impl UserCommand {
    /// The email this command would assign, if any.
    pub fn email(&self) -> Option<&str> {
        match self {
            UserCommand::Create(c) => Some(&c.email),
            UserCommand::ChangeEmail(c) => Some(&c.email),
            UserCommand::Modify(c) => c.email.as_deref(),
            _ => None,
        }
    }
}

impl CommandPayload for UserCommand {
    type Aggregate = User;

    fn command_id(&self) -> &'static str {
        match self {
            UserCommand::Create(_) => CREATE_USER,
            UserCommand::ChangeEmail(_) => CHANGE_USER_EMAIL,
            UserCommand::ChangePassword(_) => CHANGE_USER_PASSWORD,
            UserCommand::Enable(_) => ENABLE_USER,
            UserCommand::Disable(_) => DISABLE_USER,
            UserCommand::Modify(_) => MODIFY_USER,
        }
    }

    fn validate(&self, envelope: &CommandEnvelope, user: &User) -> Result<(), DomainError> {
        if let UserCommand::Create(create) = self {
            if !user.id().is_empty() {
                return Err(UserError::AlreadyCreated(user.id().to_string()).into());
            }
            return ensure_pre_hashed(&create.password);
        }

        if user.id().is_empty() {
            return Err(UserError::NotFound(envelope.aggregate_id.to_string()).into());
        }

        match self {
            UserCommand::ChangePassword(c) => ensure_pre_hashed(&c.password),
            UserCommand::Modify(ModifyUser {
                password: Some(password),
                ..
            }) => ensure_pre_hashed(password),
            _ => Ok(()),
        }
    }
}

fn ensure_pre_hashed(password: &str) -> Result<(), DomainError> {
    if is_pre_hashed(password) {
        Ok(())
    } else {
        Err(UserError::PasswordNotHashed.into())
    }
}

/// True for modular-crypt strings (`$2b$...`) and `scheme:digest` forms.
pub fn is_pre_hashed(password: &str) -> bool {
    if let Some(rest) = password.strip_prefix('$') {
        return !rest.is_empty();
    }
    match password.split_once(':') {
        Some((scheme, digest)) => {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric())
                && !digest.is_empty()
        }
        None => false,
    }
}
