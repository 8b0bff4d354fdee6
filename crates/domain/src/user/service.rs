//! User service providing a simplified API for user operations.

use std::sync::Arc;

use common::{AggregateId, CorrelationId};
use event_store::EventStore;

use crate::aggregate::AggregateRoot;
use crate::command::Command;
use crate::error::DomainError;
use crate::handler::{CommandHandler, CommandResult, CommandValidator};
use crate::registry::EventRegistry;
use crate::repository::Repository;

use super::{
    ChangeUserEmail, ChangeUserPassword, CreateUser, DisableUser, EmailUniqueness, EnableUser,
    ModifyUser, USER_AGGREGATE_TYPE, User, UserCommand, UserEvent,
};

/// Service for managing users.
///
/// Provides a high-level API for user operations, wrapping the command handler
/// and providing convenient methods for common operations. Each call starts a
/// new correlation.
pub struct UserService<S: EventStore> {
    handler: CommandHandler<S, User>,
}

impl<S: EventStore> UserService<S> {
    /// Creates a new user service with the given event store and no
    /// cross-cutting validators.
    pub fn new(store: S, events: Arc<EventRegistry<UserEvent>>) -> Self {
        let mut repository = Repository::new(store, events);
        repository.register_constructor(USER_AGGREGATE_TYPE, User::default);
        Self {
            handler: CommandHandler::new(repository),
        }
    }

    /// Creates a service that rejects duplicate emails.
    ///
    /// The index is seeded from `store` and registered on it as an
    /// after-save hook.
    pub async fn with_email_uniqueness(
        store: S,
        events: Arc<EventRegistry<UserEvent>>,
    ) -> Result<Self, DomainError> {
        let index = EmailUniqueness::from_store(&store, events.clone()).await?;
        store.register_hook(Arc::new(index.clone())).await;

        let mut service = Self::new(store, events);
        service.add_validator(Arc::new(index));
        Ok(service)
    }

    pub fn add_validator(&mut self, validator: Arc<dyn CommandValidator<UserCommand>>) -> &mut Self {
        self.handler.add_validator(validator);
        self
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, User> {
        &self.handler
    }

    /// Handles an already-built command.
    pub async fn handle(
        &self,
        command: &Command<UserCommand>,
    ) -> Result<CommandResult<User>, DomainError> {
        self.handler.handle(command).await
    }

    /// Creates a new user. The password must already be hashed.
    #[tracing::instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<CommandResult<User>, DomainError> {
        self.execute(
            AggregateId::default(),
            UserCommand::Create(CreateUser {
                email: email.to_string(),
                password: password.to_string(),
            }),
        )
        .await
    }

    /// Changes a user's email.
    #[tracing::instrument(skip(self))]
    pub async fn change_email(
        &self,
        user_id: AggregateId,
        email: &str,
    ) -> Result<CommandResult<User>, DomainError> {
        self.execute(
            user_id,
            UserCommand::ChangeEmail(ChangeUserEmail {
                email: email.to_string(),
            }),
        )
        .await
    }

    /// Changes a user's password. The password must already be hashed.
    #[tracing::instrument(skip(self, password))]
    pub async fn change_password(
        &self,
        user_id: AggregateId,
        password: &str,
    ) -> Result<CommandResult<User>, DomainError> {
        self.execute(
            user_id,
            UserCommand::ChangePassword(ChangeUserPassword {
                password: password.to_string(),
            }),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn enable(&self, user_id: AggregateId) -> Result<CommandResult<User>, DomainError> {
        self.execute(user_id, UserCommand::Enable(EnableUser {}))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn disable(&self, user_id: AggregateId) -> Result<CommandResult<User>, DomainError> {
        self.execute(user_id, UserCommand::Disable(DisableUser {}))
            .await
    }

    /// Applies every present field of `modify` that differs from the
    /// current state.
    #[tracing::instrument(skip(self, modify))]
    pub async fn modify(
        &self,
        user_id: AggregateId,
        modify: ModifyUser,
    ) -> Result<CommandResult<User>, DomainError> {
        self.execute(user_id, UserCommand::Modify(modify)).await
    }

    /// Loads a user by ID.
    ///
    /// Returns None if the user doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, user_id: AggregateId) -> Result<Option<User>, DomainError> {
        if user_id.is_empty() {
            return Ok(None);
        }

        let user = self
            .handler
            .repository()
            .load(USER_AGGREGATE_TYPE, &user_id)
            .await?;
        Ok((!user.id().is_empty()).then_some(user))
    }

    async fn execute(
        &self,
        user_id: AggregateId,
        payload: UserCommand,
    ) -> Result<CommandResult<User>, DomainError> {
        let command = Command::new(
            USER_AGGREGATE_TYPE,
            user_id,
            CorrelationId::generate(),
            payload,
        );
        self.handler.handle(&command).await
    }
}
