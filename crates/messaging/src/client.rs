//! Caller side of the command transport.

use std::sync::Arc;
use std::time::Duration;

use common::{AggregateId, CorrelationId};
use domain::{
    ChangeUserEmail, ChangeUserPassword, Command, CommandRegistry, CreateUser, DisableUser,
    EnableUser, ModifyUser, USER_AGGREGATE_TYPE, UserCommand,
};

use crate::bus::{CommandBus, command_subject};
use crate::config::Config;
use crate::error::{MessagingError, Result};

/// Sends user commands over the [`CommandBus`] and waits for their outcome.
///
/// Each call uses a fresh correlation id. The subscription is opened before
/// the command is sent and released on every exit path.
#[derive(Clone)]
pub struct UserClient {
    bus: CommandBus,
    commands: Arc<CommandRegistry<UserCommand>>,
    ack_timeout: Duration,
    command_timeout: Duration,
}

impl UserClient {
    pub fn new(bus: CommandBus, commands: Arc<CommandRegistry<UserCommand>>, config: &Config) -> Self {
        Self {
            bus,
            commands,
            ack_timeout: config.ack_timeout,
            command_timeout: config.command_timeout,
        }
    }

    /// Creates a user and returns the new id. The password must already be
    /// hashed.
    #[tracing::instrument(skip(self, password))]
    pub async fn create(&self, email: &str, password: &str) -> Result<AggregateId> {
        self.send(
            AggregateId::default(),
            UserCommand::Create(CreateUser {
                email: email.to_string(),
                password: password.to_string(),
            }),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn change_email(&self, user_id: AggregateId, email: &str) -> Result<AggregateId> {
        self.send(
            user_id,
            UserCommand::ChangeEmail(ChangeUserEmail {
                email: email.to_string(),
            }),
        )
        .await
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn change_password(&self, user_id: AggregateId, password: &str) -> Result<AggregateId> {
        self.send(
            user_id,
            UserCommand::ChangePassword(ChangeUserPassword {
                password: password.to_string(),
            }),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn enable(&self, user_id: AggregateId) -> Result<AggregateId> {
        self.send(user_id, UserCommand::Enable(EnableUser {})).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn disable(&self, user_id: AggregateId) -> Result<AggregateId> {
        self.send(user_id, UserCommand::Disable(DisableUser {})).await
    }

    #[tracing::instrument(skip(self, modify))]
    pub async fn modify(&self, user_id: AggregateId, modify: ModifyUser) -> Result<AggregateId> {
        self.send(user_id, UserCommand::Modify(modify)).await
    }

    async fn send(&self, user_id: AggregateId, payload: UserCommand) -> Result<AggregateId> {
        let correlation_id = CorrelationId::generate();
        let command = Command::new(USER_AGGREGATE_TYPE, user_id, correlation_id.clone(), payload);
        let bytes = self.commands.marshal(&command)?;

        // Dropped on every exit, including when the caller abandons this future.
        let subscription = self.bus.correlations().subscription(&correlation_id)?;
        self.bus
            .request(&command_subject(USER_AGGREGATE_TYPE), bytes, self.ack_timeout)
            .await?;
        let payload = subscription.wait(self.command_timeout).await?;

        let id = String::from_utf8(payload)
            .map(AggregateId::from)
            .map_err(|error| MessagingError::InvalidReply(error.to_string()))?;
        tracing::debug!(%correlation_id, aggregate_id = %id, "command succeeded");
        Ok(id)
    }
}
