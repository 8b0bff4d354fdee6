//! Transport, correlation matching and service wiring for the users service.
//!
//! - [`CorrelationRegistry`] one-slot outcome rendezvous per correlation id
//! - [`CommandBus`] in-process request/acknowledge transport
//! - [`CommandListener`] decodes, acknowledges and executes incoming commands
//! - [`UserClient`] caller API returning the affected user id
//! - [`UsersApp`] boots the whole service on top of an event store

pub mod bus;
pub mod client;
pub mod config;
pub mod correlation;
pub mod error;
pub mod listener;
pub mod telemetry;

use std::sync::Arc;

use domain::{USER_AGGREGATE_TYPE, UserService, user};
use event_store::EventStore;
use projections::{Projection, ProjectionHook, ProjectionProcessor, UserDirectoryView};
use tokio::task::JoinHandle;

pub use bus::{CommandBus, Request};
pub use client::UserClient;
pub use config::{Config, LogFormat};
pub use correlation::{CorrelationRegistry, Outcome, Subscription};
pub use error::{CorrelationError, MessagingError, Result};
pub use listener::CommandListener;

const LISTENER_QUEUE: usize = 256;

/// A running users service: write side, read side and transport.
pub struct UsersApp<S: EventStore> {
    pub service: Arc<UserService<S>>,
    pub directory: UserDirectoryView,
    pub client: UserClient,
    pub bus: CommandBus,
    listener: JoinHandle<()>,
}

impl<S: EventStore + Clone + 'static> UsersApp<S> {
    /// Wires every component on top of `store`.
    ///
    /// The email index and the user directory are rebuilt from the log
    /// before the listener starts accepting commands.
    #[tracing::instrument(skip_all)]
    pub async fn start(store: S, config: &Config) -> Result<Self> {
        let events = Arc::new(user::event_registry());
        let commands = Arc::new(user::command_registry());

        let service = Arc::new(UserService::with_email_uniqueness(store.clone(), events.clone()).await?);

        let directory = UserDirectoryView::new(events);
        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(directory.clone()) as Box<dyn Projection>);
        let replayed = processor.run_catch_up().await?;
        store
            .register_hook(Arc::new(ProjectionHook::new(directory.clone())))
            .await;

        let bus = CommandBus::new();
        let queue = bus
            .bind(bus::command_subject(USER_AGGREGATE_TYPE), LISTENER_QUEUE)
            .await;
        let listener = CommandListener::new(service.clone(), commands.clone(), bus.clone()).spawn(queue);
        let client = UserClient::new(bus.clone(), commands, config);

        tracing::info!(replayed, "users service started");

        Ok(Self {
            service,
            directory,
            client,
            bus,
            listener,
        })
    }

    /// Stops accepting commands and waits until every acknowledged command
    /// has finished.
    pub async fn shutdown(self) {
        self.bus
            .unbind(&bus::command_subject(USER_AGGREGATE_TYPE))
            .await;
        if let Err(error) = self.listener.await {
            tracing::error!(%error, "command listener panicked");
        }
        tracing::info!("users service stopped");
    }
}
