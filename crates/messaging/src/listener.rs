//! Server side of the command transport.

use std::sync::Arc;

use domain::{AggregateRoot, Command, CommandRegistry, UserCommand, UserService};
use event_store::EventStore;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::bus::{ACK_OK, CommandBus, Request, ack_error};
use crate::correlation::Outcome;

/// Consumes requests for one aggregate type and runs them through the
/// [`UserService`].
///
/// Every request is decoded and acknowledged immediately. The command itself
/// runs on its own task; its outcome is published on the command's
/// correlation id. Once the queue closes, the listener waits for every
/// acknowledged command to finish before it stops.
pub struct CommandListener<S: EventStore> {
    service: Arc<UserService<S>>,
    commands: Arc<CommandRegistry<UserCommand>>,
    bus: CommandBus,
}

impl<S: EventStore + 'static> CommandListener<S> {
    pub fn new(
        service: Arc<UserService<S>>,
        commands: Arc<CommandRegistry<UserCommand>>,
        bus: CommandBus,
    ) -> Self {
        Self {
            service,
            commands,
            bus,
        }
    }

    /// Runs until the queue closes and all in-flight commands are done.
    pub fn spawn(self, mut queue: mpsc::Receiver<Request>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut in_flight = JoinSet::new();
            loop {
                tokio::select! {
                    request = queue.recv() => match request {
                        Some(request) => self.accept(request, &mut in_flight),
                        None => break,
                    },
                    Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                        report(finished);
                    }
                }
            }

            tracing::debug!(pending = in_flight.len(), "draining in-flight commands");
            while let Some(finished) = in_flight.join_next().await {
                report(finished);
            }
            tracing::info!("command listener stopped");
        })
    }

    fn accept(&self, request: Request, in_flight: &mut JoinSet<()>) {
        let command = match self.commands.unmarshal(&request.payload) {
            Ok(command) => command,
            Err(error) => {
                tracing::warn!(%error, "rejecting undecodable command");
                request.reply(ack_error(error));
                return;
            }
        };

        request.reply(ACK_OK);

        let service = self.service.clone();
        let bus = self.bus.clone();
        in_flight.spawn(async move {
            let outcome = execute(&service, &command).await;
            let subject = outcome.subject(command.correlation_id());
            if let Err(error) = bus.publish(&subject, outcome.into_payload()) {
                tracing::warn!(%error, %subject, "failed to publish outcome");
            }
        });
    }
}

fn report(finished: Result<(), JoinError>) {
    if let Err(error) = finished {
        tracing::error!(%error, "command task failed");
    }
}

#[tracing::instrument(skip_all, fields(command_id = %command.command_id()))]
async fn execute<S: EventStore>(service: &UserService<S>, command: &Command<UserCommand>) -> Outcome {
    match service.handle(command).await {
        Ok(result) => Outcome::Success(result.aggregate.id().as_str().as_bytes().to_vec()),
        Err(error) => Outcome::Error(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use common::CorrelationId;
    use domain::{CreateUser, USER_AGGREGATE_TYPE, user};
    use event_store::InMemoryEventStore;

    use crate::bus::command_subject;
    use crate::error::{CorrelationError, MessagingError};

    const TIMEOUT: Duration = Duration::from_secs(2);

    async fn start(store: InMemoryEventStore) -> (CommandBus, Arc<CommandRegistry<UserCommand>>) {
        let bus = CommandBus::new();
        let commands = Arc::new(user::command_registry());
        let service = Arc::new(UserService::new(store, Arc::new(user::event_registry())));
        let queue = bus.bind(command_subject(USER_AGGREGATE_TYPE), 16).await;
        CommandListener::new(service, commands.clone(), bus.clone()).spawn(queue);
        (bus, commands)
    }

    fn create(correlation_id: &CorrelationId, password: &str) -> Command<UserCommand> {
        Command::new(
            USER_AGGREGATE_TYPE,
            "",
            correlation_id.clone(),
            UserCommand::Create(CreateUser {
                email: "a@x.com".into(),
                password: password.into(),
            }),
        )
    }

    #[tokio::test]
    async fn success_outcome_carries_aggregate_id() {
        let store = InMemoryEventStore::new();
        let (bus, commands) = start(store.clone()).await;
        let id = CorrelationId::generate();
        bus.correlations().subscribe(&id).unwrap();

        let payload = commands.marshal(&create(&id, "hashed:abc")).unwrap();
        bus.request("command.user", payload, TIMEOUT).await.unwrap();
        let user_id = bus.correlations().wait(&id, TIMEOUT).await.unwrap();

        let user_id = String::from_utf8(user_id).unwrap();
        assert!(!user_id.is_empty());
        assert_eq!(store.load(&user_id.into()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failure_outcome_carries_error_text() {
        let store = InMemoryEventStore::new();
        let (bus, commands) = start(store.clone()).await;
        let id = CorrelationId::generate();
        bus.correlations().subscribe(&id).unwrap();

        let payload = commands.marshal(&create(&id, "plaintext")).unwrap();
        bus.request("command.user", payload, TIMEOUT).await.unwrap();

        let result = bus.correlations().wait(&id, TIMEOUT).await;
        assert!(matches!(result, Err(CorrelationError::Remote(_))));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn undecodable_request_is_nacked() {
        let (bus, _) = start(InMemoryEventStore::new()).await;

        let unknown = br#"{"command_id":"user.delete","aggregate_type":"user","payload":{}}"#;
        let result = bus.request("command.user", unknown.to_vec(), TIMEOUT).await;
        assert!(matches!(result, Err(MessagingError::Rejected(_))));

        let garbage = bus.request("command.user", b"not json".to_vec(), TIMEOUT).await;
        assert!(matches!(garbage, Err(MessagingError::Rejected(_))));
    }
}
