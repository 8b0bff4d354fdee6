//! User aggregate implementation.

use common::AggregateId;

use crate::aggregate::{AggregateRoot, Root};
use crate::command::Command;
use crate::error::DomainError;
use crate::event::Event;

use super::{
    ModifyUser, USER_AGGREGATE_TYPE, UserCommand, UserCreated, UserDisabled, UserEmailChanged,
    UserEnabled, UserEvent, UserPasswordChanged,
};

/// User aggregate root.
///
/// Holds the email address, the password hash and the enabled flag. A new
/// user starts disabled.
#[derive(Debug, Default)]
pub struct User {
    root: Root<UserEvent>,
    email: String,
    password: String,
    is_enabled: bool,
}

impl AggregateRoot for User {
    type Command = UserCommand;
    type Event = UserEvent;

    fn aggregate_type() -> &'static str {
        USER_AGGREGATE_TYPE
    }

    fn root(&self) -> &Root<UserEvent> {
        &self.root
    }

    fn root_mut(&mut self) -> &mut Root<UserEvent> {
        &mut self.root
    }

    fn apply_event(&mut self, event: &Event<UserEvent>) -> Result<(), DomainError> {
        match event.payload() {
            UserEvent::Created(data) => {
                self.root.assign_id(event.aggregate_id().clone())?;
                self.email = data.email.clone();
                self.password = data.password.clone();
                self.is_enabled = data.is_enabled;
            }
            UserEvent::EmailChanged(data) => self.email = data.new_email.clone(),
            UserEvent::PasswordChanged(data) => self.password = data.new_password.clone(),
            UserEvent::Enabled(_) => self.is_enabled = true,
            UserEvent::Disabled(_) => self.is_enabled = false,
        }
        Ok(())
    }

    fn handle_command(&mut self, command: &Command<UserCommand>) -> Result<(), DomainError> {
        let (aggregate_id, payloads) = match command.payload() {
            UserCommand::Create(c) => (
                AggregateId::generate(),
                vec![Self::created(&c.email, &c.password)],
            ),
            UserCommand::ChangeEmail(c) => (self.id().clone(), vec![self.email_changed(&c.email)]),
            UserCommand::ChangePassword(c) => (
                self.id().clone(),
                vec![self.password_changed(&c.password)],
            ),
            UserCommand::Enable(_) => (self.id().clone(), vec![UserEvent::Enabled(UserEnabled {})]),
            UserCommand::Disable(_) => (
                self.id().clone(),
                vec![UserEvent::Disabled(UserDisabled {})],
            ),
            UserCommand::Modify(c) => (self.id().clone(), self.modified(c)),
        };

        for payload in payloads {
            let event = Event::for_command(command, aggregate_id.clone(), payload);
            self.apply(true, event)?;
        }
        Ok(())
    }
}

// Query methods
impl User {
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the stored password hash.
    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }
}

// Event construction
impl User {
    fn created(email: &str, password: &str) -> UserEvent {
        UserEvent::Created(UserCreated {
            email: email.to_string(),
            password: password.to_string(),
            is_enabled: false,
        })
    }

    fn email_changed(&self, email: &str) -> UserEvent {
        UserEvent::EmailChanged(UserEmailChanged {
            old_email: self.email.clone(),
            new_email: email.to_string(),
        })
    }

    fn password_changed(&self, password: &str) -> UserEvent {
        UserEvent::PasswordChanged(UserPasswordChanged {
            old_password: self.password.clone(),
            new_password: password.to_string(),
        })
    }

    /// One event per field that is present and differs from current state,
    /// ordered email, password, enabled flag.
    fn modified(&self, modify: &ModifyUser) -> Vec<UserEvent> {
        let mut events = Vec::new();

        if let Some(email) = modify.email.as_deref().filter(|e| *e != self.email) {
            events.push(self.email_changed(email));
        }
        if let Some(password) = modify.password.as_deref().filter(|p| *p != self.password) {
            events.push(self.password_changed(password));
        }
        match modify.is_enabled {
            Some(true) if !self.is_enabled => events.push(UserEvent::Enabled(UserEnabled {})),
            Some(false) if self.is_enabled => events.push(UserEvent::Disabled(UserDisabled {})),
            _ => {}
        }

        events
    }
}
