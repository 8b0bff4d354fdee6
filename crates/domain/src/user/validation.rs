//! Email uniqueness across users.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use event_store::{EventEnvelope, EventHook, EventStore, HookError};
use tokio::sync::RwLock;

use crate::command::Command;
use crate::error::DomainError;
use crate::handler::CommandValidator;
use crate::registry::EventRegistry;

use super::{USER_CREATED, USER_EMAIL_CHANGED, UserCommand, UserError, UserEvent};

/// Index of email address to owning user.
///
/// Seeded from the store at startup and kept current as an after-save hook.
/// The check and the later save are not atomic: two concurrent commands may
/// both pass for the same address.
#[derive(Clone)]
pub struct EmailUniqueness {
    owners: Arc<RwLock<HashMap<String, AggregateId>>>,
    events: Arc<EventRegistry<UserEvent>>,
}

impl EmailUniqueness {
    /// Creates an empty index.
    pub fn new(events: Arc<EventRegistry<UserEvent>>) -> Self {
        Self {
            owners: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    /// Builds the index from every stored creation and email change.
    #[tracing::instrument(skip_all)]
    pub async fn from_store<S: EventStore + ?Sized>(
        store: &S,
        events: Arc<EventRegistry<UserEvent>>,
    ) -> Result<Self, DomainError> {
        let index = Self::new(events);
        let history = store
            .load_by_event_ids(&[USER_CREATED, USER_EMAIL_CHANGED])
            .await?;

        tracing::info!(events = history.len(), "seeding email index");
        for envelope in history {
            index.record(envelope).await?;
        }
        Ok(index)
    }

    /// Returns the owner of `email`, if any.
    pub async fn owner(&self, email: &str) -> Option<AggregateId> {
        self.owners.read().await.get(email).cloned()
    }

    pub async fn len(&self) -> usize {
        self.owners.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.owners.read().await.is_empty()
    }

    async fn record(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        if envelope.event_id != USER_CREATED && envelope.event_id != USER_EMAIL_CHANGED {
            return Ok(());
        }

        let event = self.events.decode(envelope)?;
        let owner = event.aggregate_id().clone();
        let mut owners = self.owners.write().await;

        match event.payload() {
            UserEvent::Created(data) => {
                owners.insert(data.email.clone(), owner);
            }
            UserEvent::EmailChanged(data) => {
                if owners.get(&data.old_email) == Some(&owner) {
                    owners.remove(&data.old_email);
                }
                owners.insert(data.new_email.clone(), owner);
            }
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl CommandValidator<UserCommand> for EmailUniqueness {
    fn name(&self) -> &'static str {
        "email-uniqueness"
    }

    async fn validate(&self, command: &Command<UserCommand>) -> Result<(), DomainError> {
        let Some(email) = command.payload().email() else {
            return Ok(());
        };

        match self.owner(email).await {
            Some(owner) if &owner != command.aggregate_id() => {
                Err(UserError::EmailTaken(email.to_string()).into())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl EventHook for EmailUniqueness {
    fn name(&self) -> &'static str {
        "email-uniqueness"
    }

    async fn after_save(&self, event: &EventEnvelope) -> Result<(), HookError> {
        self.record(event.clone()).await.map_err(Into::into)
    }
}
