//! User directory read model: one row per user, as last seen in the log.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{EventRegistry, USER_AGGREGATE_TYPE, UserEvent};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// Summary of a user in the directory. Password hashes are not projected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub user_id: AggregateId,
    pub email: String,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read model view of every known user.
#[derive(Clone)]
pub struct UserDirectoryView {
    users: Arc<RwLock<HashMap<AggregateId, UserSummary>>>,
    position: Arc<RwLock<ProjectionPosition>>,
    events: Arc<EventRegistry<UserEvent>>,
}

impl UserDirectoryView {
    /// Creates a new empty user directory.
    pub fn new(events: Arc<EventRegistry<UserEvent>>) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            position: Arc::new(RwLock::new(ProjectionPosition::START)),
            events,
        }
    }

    /// Gets a specific user.
    pub async fn get_user(&self, user_id: &AggregateId) -> Option<UserSummary> {
        self.users.read().await.get(user_id).cloned()
    }

    /// Finds a user by email address.
    pub async fn find_by_email(&self, email: &str) -> Option<UserSummary> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
    }

    /// Gets all users, ordered by creation time.
    pub async fn get_all_users(&self) -> Vec<UserSummary> {
        let mut users: Vec<_> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        users
    }

    /// Gets enabled users, ordered by creation time.
    pub async fn get_enabled_users(&self) -> Vec<UserSummary> {
        let mut users: Vec<_> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.is_enabled)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        users
    }

    async fn advance(&self, event: &EventEnvelope) {
        let mut pos = self.position.write().await;
        *pos = pos.after(event);
    }
}

#[async_trait]
impl Projection for UserDirectoryView {
    fn name(&self) -> &'static str {
        "UserDirectoryView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != USER_AGGREGATE_TYPE {
            self.advance(event).await;
            return Ok(());
        }

        // The event occupies a log slot whether or not it decodes.
        let decoded = match self.events.decode(event.clone()) {
            Ok(decoded) => decoded,
            Err(error) => {
                self.advance(event).await;
                return Err(error.into());
            }
        };
        let user_id = decoded.aggregate_id().clone();
        let at = decoded.created_at();

        let mut users = self.users.write().await;
        match decoded.payload() {
            UserEvent::Created(data) => {
                users.insert(
                    user_id.clone(),
                    UserSummary {
                        user_id,
                        email: data.email.clone(),
                        is_enabled: data.is_enabled,
                        created_at: at,
                        updated_at: at,
                    },
                );
            }
            UserEvent::EmailChanged(data) => {
                if let Some(user) = users.get_mut(&user_id) {
                    user.email = data.new_email.clone();
                    user.updated_at = at;
                }
            }
            UserEvent::PasswordChanged(_) => {
                if let Some(user) = users.get_mut(&user_id) {
                    user.updated_at = at;
                }
            }
            UserEvent::Enabled(_) | UserEvent::Disabled(_) => {
                if let Some(user) = users.get_mut(&user_id) {
                    user.is_enabled = matches!(decoded.payload(), UserEvent::Enabled(_));
                    user.updated_at = at;
                }
            }
        }
        drop(users);

        self.advance(event).await;
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.users.write().await.clear();
        *self.position.write().await = ProjectionPosition::START;
        Ok(())
    }
}
