//! User domain events.

use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;

pub const USER_CREATED: &str = "user.created";
pub const USER_EMAIL_CHANGED: &str = "user.email.changed";
pub const USER_PASSWORD_CHANGED: &str = "user.password.changed";
pub const USER_ENABLED: &str = "user.enabled";
pub const USER_DISABLED: &str = "user.disabled";

/// Events that can occur on a user aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UserEvent {
    /// User was created.
    Created(UserCreated),

    /// Email address was replaced.
    EmailChanged(UserEmailChanged),

    /// Password hash was replaced.
    PasswordChanged(UserPasswordChanged),

    /// User was enabled.
    Enabled(UserEnabled),

    /// User was disabled.
    Disabled(UserDisabled),
}

impl DomainEvent for UserEvent {
    fn event_id(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => USER_CREATED,
            UserEvent::EmailChanged(_) => USER_EMAIL_CHANGED,
            UserEvent::PasswordChanged(_) => USER_PASSWORD_CHANGED,
            UserEvent::Enabled(_) => USER_ENABLED,
            UserEvent::Disabled(_) => USER_DISABLED,
        }
    }
}

/// Data for the `user.created` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserCreated {
    pub email: String,
    pub password: String,
    pub is_enabled: bool,
}

/// Data for the `user.email.changed` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserEmailChanged {
    pub old_email: String,
    pub new_email: String,
}

/// Data for the `user.password.changed` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPasswordChanged {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEnabled {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDisabled {}
