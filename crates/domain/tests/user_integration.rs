//! Integration tests for the User aggregate.
//!
//! These tests drive commands through the public service and handler API and
//! check what ends up in the event store.

use std::sync::Arc;

use common::AggregateId;
use domain::{
    AggregateRoot, Command, CommandHandler, DomainError, DomainEvent, EnableUser, Event,
    ModifyUser, Repository, USER_AGGREGATE_TYPE, User, UserCommand, UserCreated, UserError,
    UserEvent, UserService, user,
};
use event_store::{EventStore, InMemoryEventStore};

/// Helper to create a test user service
fn create_service(store: InMemoryEventStore) -> UserService<InMemoryEventStore> {
    UserService::new(store, Arc::new(user::event_registry()))
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn create_user_emits_single_created_event() {
        let store = InMemoryEventStore::new();
        let service = create_service(store.clone());

        let result = service.create_user("a@x.com", "hashed:abc").await.unwrap();
        let id = result.aggregate.id().clone();

        assert!(!id.is_empty());
        assert_eq!(result.events.len(), 1);
        assert_eq!(
            result.events[0].payload(),
            &UserEvent::Created(UserCreated {
                email: "a@x.com".into(),
                password: "hashed:abc".into(),
                is_enabled: false,
            })
        );

        let stored = store.load(&id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].event_id, "user.created");
        assert_eq!(stored[0].aggregate_type, USER_AGGREGATE_TYPE);
        assert_eq!(stored[0].payload["is_enabled"], false);
    }

    #[tokio::test]
    async fn change_email_replays_to_new_address() {
        let store = InMemoryEventStore::new();
        let service = create_service(store.clone());

        let id = service
            .create_user("a@x.com", "hashed:abc")
            .await
            .unwrap()
            .aggregate
            .id()
            .clone();

        let result = service.change_email(id.clone(), "b@x.com").await.unwrap();
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].event_id(), "user.email.changed");

        let stored = store.load(&id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].payload["old_email"], "a@x.com");
        assert_eq!(stored[1].payload["new_email"], "b@x.com");

        let replayed = service.get_user(id).await.unwrap().unwrap();
        assert_eq!(replayed.email(), "b@x.com");
    }

    #[tokio::test]
    async fn enable_unknown_user_persists_nothing() {
        let store = InMemoryEventStore::new();
        let service = create_service(store.clone());

        let result = service.enable(AggregateId::new("never-created")).await;

        assert!(matches!(
            result,
            Err(DomainError::User(UserError::NotFound(ref id))) if id == "never-created"
        ));
        assert_eq!(store.event_count().await, 0);
    }
}

mod laws {
    use super::*;

    #[tokio::test]
    async fn replay_is_deterministic() {
        let store = InMemoryEventStore::new();
        let service = create_service(store.clone());

        let id = service
            .create_user("a@x.com", "hashed:abc")
            .await
            .unwrap()
            .aggregate
            .id()
            .clone();
        service.enable(id.clone()).await.unwrap();
        service.change_password(id.clone(), "hashed:def").await.unwrap();

        let first = service.get_user(id.clone()).await.unwrap().unwrap();
        let second = service.get_user(id.clone()).await.unwrap().unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(first.email(), second.email());
        assert_eq!(first.password(), second.password());
        assert_eq!(first.is_enabled(), second.is_enabled());
        assert!(first.is_enabled());
    }

    #[tokio::test]
    async fn stored_events_round_trip_through_registry() {
        let store = InMemoryEventStore::new();
        let service = create_service(store.clone());
        let registry = user::event_registry();

        let result = service.create_user("a@x.com", "hashed:abc").await.unwrap();
        let id = result.aggregate.id().clone();
        service.change_email(id.clone(), "b@x.com").await.unwrap();

        for envelope in store.load(&id).await.unwrap() {
            let event: Event<UserEvent> = registry.decode(envelope.clone()).unwrap();
            assert_eq!(event.event_id(), envelope.event_id);
            assert_eq!(registry.encode(&event).unwrap(), envelope);
        }
    }

    #[tokio::test]
    async fn commands_round_trip_through_registry() {
        let registry = user::command_registry();
        let command = Command::new(
            USER_AGGREGATE_TYPE,
            "u-1",
            "corr-1",
            UserCommand::Modify(ModifyUser {
                email: Some("a@x.com".into()),
                password: Some("hashed:abc".into()),
                is_enabled: Some(false),
            }),
        );

        let bytes = registry.marshal(&command).unwrap();
        assert_eq!(registry.unmarshal(&bytes).unwrap(), command);
    }

    #[tokio::test]
    async fn every_successful_command_leaves_an_identity() {
        let service = create_service(InMemoryEventStore::new());

        let created = service.create_user("a@x.com", "hashed:abc").await.unwrap();
        assert!(!created.aggregate.id().is_empty());

        let id = created.aggregate.id().clone();
        let unchanged = service
            .modify(id.clone(), ModifyUser::default())
            .await
            .unwrap();
        assert!(unchanged.events.is_empty());
        assert_eq!(unchanged.aggregate.id(), &id);
    }

    #[tokio::test]
    async fn modify_changes_only_differing_fields() {
        let store = InMemoryEventStore::new();
        let service = create_service(store.clone());

        let id = service
            .create_user("a@x.com", "hashed:abc")
            .await
            .unwrap()
            .aggregate
            .id()
            .clone();

        let result = service
            .modify(
                id.clone(),
                ModifyUser {
                    email: Some("a@x.com".into()),
                    password: Some("hashed:new".into()),
                    is_enabled: Some(true),
                },
            )
            .await
            .unwrap();

        let ids: Vec<_> = result.events.iter().map(|e| e.payload().event_id()).collect();
        assert_eq!(ids, vec!["user.password.changed", "user.enabled"]);
        assert_eq!(store.load(&id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unknown_command_shape_fails_to_decode() {
        let registry = user::command_registry();
        let bytes = br#"{"command_id":"user.rename","aggregate_id":"u-1","aggregate_type":"user","correlation_id":"c-1","payload":{"name":"x"}}"#;

        assert!(matches!(
            registry.unmarshal(bytes),
            Err(DomainError::UnknownIdentifier { kind: "command", .. })
        ));
    }
}

mod handler {
    use super::*;

    #[tokio::test]
    async fn handler_can_be_built_directly() {
        let store = InMemoryEventStore::new();
        let mut repository: Repository<_, User> =
            Repository::new(store.clone(), Arc::new(user::event_registry()));
        repository.register_constructor(USER_AGGREGATE_TYPE, User::default);
        let handler = CommandHandler::new(repository);

        let created = handler
            .handle(&Command::new(
                USER_AGGREGATE_TYPE,
                AggregateId::default(),
                "corr-1",
                UserCommand::Create(domain::CreateUser {
                    email: "a@x.com".into(),
                    password: "$2b$10$abcdefghijklmnop".into(),
                }),
            ))
            .await
            .unwrap();

        let id = created.aggregate.id().clone();
        let enabled = handler
            .handle(&Command::new(
                USER_AGGREGATE_TYPE,
                id.clone(),
                "corr-2",
                UserCommand::Enable(EnableUser {}),
            ))
            .await
            .unwrap();

        assert!(enabled.aggregate.is_enabled());
        assert_eq!(enabled.events[0].correlation_id().as_str(), "corr-2");
        assert_eq!(store.load(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn plain_text_password_is_rejected() {
        let store = InMemoryEventStore::new();
        let service = create_service(store.clone());

        let result = service.create_user("a@x.com", "password123").await;

        assert!(matches!(
            result,
            Err(DomainError::User(UserError::PasswordNotHashed))
        ));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_commands_on_one_user_all_persist() {
        let store = InMemoryEventStore::new();
        let service = Arc::new(create_service(store.clone()));

        let id = service
            .create_user("a@x.com", "hashed:abc")
            .await
            .unwrap()
            .aggregate
            .id()
            .clone();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                service
                    .change_email(id, &format!("user{i}@x.com"))
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // No concurrency guard: every command lands, last writer wins.
        assert_eq!(store.load(&id).await.unwrap().len(), 9);
    }
}
