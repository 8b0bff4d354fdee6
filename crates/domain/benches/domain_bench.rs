use std::sync::Arc;

use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    AggregateRoot, Event, USER_AGGREGATE_TYPE, UserCreated, UserEmailChanged, UserEvent,
    UserService, user,
};
use event_store::{EventEnvelope, EventStore, InMemoryEventStore};

fn make_envelope(aggregate_id: &AggregateId, payload: UserEvent) -> EventEnvelope {
    Event::new(
        USER_AGGREGATE_TYPE,
        aggregate_id.clone(),
        Default::default(),
        payload,
    )
    .to_envelope()
    .unwrap()
}

fn populate(rt: &tokio::runtime::Runtime, store: &InMemoryEventStore, changes: usize) -> AggregateId {
    let user_id = AggregateId::generate();
    rt.block_on(async {
        let mut events = vec![make_envelope(
            &user_id,
            UserEvent::Created(UserCreated {
                email: "user0@x.com".into(),
                password: "hashed:abc".into(),
                is_enabled: false,
            }),
        )];
        for v in 1..changes {
            events.push(make_envelope(
                &user_id,
                UserEvent::EmailChanged(UserEmailChanged {
                    old_email: format!("user{}@x.com", v - 1),
                    new_email: format!("user{v}@x.com"),
                }),
            ));
        }
        store.save(events).await.unwrap();
    });
    user_id
}

fn bench_create_user(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let events = Arc::new(user::event_registry());

    c.bench_function("domain/create_user", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = UserService::new(InMemoryEventStore::new(), events.clone());
                service.create_user("a@x.com", "hashed:abc").await.unwrap();
            });
        });
    });
}

fn bench_change_email(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = UserService::new(InMemoryEventStore::new(), Arc::new(user::event_registry()));
    let user_id = rt.block_on(async {
        service
            .create_user("a@x.com", "hashed:abc")
            .await
            .unwrap()
            .aggregate
            .id()
            .clone()
    });

    c.bench_function("domain/change_email", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .change_email(user_id.clone(), "b@x.com")
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_replay(c: &mut Criterion, changes: usize) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let user_id = populate(&rt, &store, changes);
    let service = UserService::new(store, Arc::new(user::event_registry()));

    c.bench_function(&format!("domain/replay_{changes}_events"), |b| {
        b.iter(|| {
            rt.block_on(async {
                service.get_user(user_id.clone()).await.unwrap().unwrap();
            });
        });
    });
}

fn bench_replay_50(c: &mut Criterion) {
    bench_replay(c, 50);
}

fn bench_replay_100(c: &mut Criterion) {
    bench_replay(c, 100);
}

criterion_group!(
    benches,
    bench_create_user,
    bench_change_email,
    bench_replay_50,
    bench_replay_100,
);
criterion_main!(benches);
