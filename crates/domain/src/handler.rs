//! Command handling infrastructure.

use std::sync::Arc;

use async_trait::async_trait;
use event_store::EventStore;

use crate::aggregate::AggregateRoot;
use crate::command::{Command, CommandPayload};
use crate::error::{DomainError, ValidationErrors};
use crate::event::Event;
use crate::repository::Repository;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: AggregateRoot> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<Event<A::Event>>,
}

/// A cross-cutting check run against the raw command before execution.
///
/// Unlike a command's self-validation, validators see no aggregate state
/// and typically consult an external index.
#[async_trait]
pub trait CommandValidator<P: CommandPayload>: Send + Sync {
    /// Name used in log output.
    fn name(&self) -> &'static str;

    async fn validate(&self, command: &Command<P>) -> Result<(), DomainError>;
}

/// Handler for executing commands against aggregates.
///
/// The handler is responsible for:
/// 1. Loading the aggregate through the repository
/// 2. Letting the command validate itself against that state
/// 3. Running every registered validator, collecting all failures
/// 4. Executing the command to produce and apply events
/// 5. Checking the aggregate ended up with an identity
/// 6. Persisting the new events
///
/// Any failure before step 6 leaves the store untouched. Nothing is retried.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: AggregateRoot,
{
    repository: Repository<S, A>,
    validators: Vec<Arc<dyn CommandValidator<A::Command>>>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: AggregateRoot,
{
    /// Creates a handler with no validators.
    pub fn new(repository: Repository<S, A>) -> Self {
        Self {
            repository,
            validators: Vec::new(),
        }
    }

    /// Adds a cross-cutting validator. Validators run in registration order.
    pub fn add_validator(&mut self, validator: Arc<dyn CommandValidator<A::Command>>) -> &mut Self {
        self.validators.push(validator);
        self
    }

    pub fn repository(&self) -> &Repository<S, A> {
        &self.repository
    }

    /// Executes a command and persists the resulting events.
    #[tracing::instrument(
        skip(self, command),
        fields(
            command_id = %command.command_id(),
            aggregate_id = %command.aggregate_id(),
            correlation_id = %command.correlation_id()
        )
    )]
    pub async fn handle(
        &self,
        command: &Command<A::Command>,
    ) -> Result<CommandResult<A>, DomainError> {
        match self.execute(command).await {
            Ok(result) => {
                metrics::counter!(
                    "commands_handled_total",
                    "command_id" => command.command_id().to_string()
                )
                .increment(1);
                tracing::debug!(
                    events = result.events.len(),
                    aggregate_id = %result.aggregate.id(),
                    "command handled"
                );
                Ok(result)
            }
            Err(error) => {
                metrics::counter!(
                    "commands_failed_total",
                    "command_id" => command.command_id().to_string()
                )
                .increment(1);
                if error.is_internal() {
                    tracing::error!(%error, "command failed");
                } else {
                    tracing::debug!(%error, "command rejected");
                }
                Err(error)
            }
        }
    }

    async fn execute(
        &self,
        command: &Command<A::Command>,
    ) -> Result<CommandResult<A>, DomainError> {
        let mut aggregate = self
            .repository
            .load(command.aggregate_type(), command.aggregate_id())
            .await?;

        command.validate(&aggregate)?;
        self.run_validators(command).await?;

        aggregate.handle_command(command)?;

        if aggregate.id().is_empty() {
            return Err(DomainError::InvariantViolation(format!(
                "{} produced an aggregate without identity",
                command.command_id()
            )));
        }

        let events = self.repository.save(&mut aggregate).await?;
        Ok(CommandResult { aggregate, events })
    }

    async fn run_validators(&self, command: &Command<A::Command>) -> Result<(), DomainError> {
        let mut errors = ValidationErrors::new();
        for validator in &self.validators {
            if let Err(error) = validator.validate(command).await {
                tracing::debug!(validator = validator.name(), %error, "validator rejected command");
                errors.push(error);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Rejected(errors))
        }
    }
}
