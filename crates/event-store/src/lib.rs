//! Durable, append-only event log keyed by aggregate identifier.
//!
//! The [`EventStore`] trait is the persistence contract used by the domain
//! layer. Two backends are provided: [`InMemoryEventStore`] for tests and
//! single-process deployments, and [`PostgresEventStore`] backed by `sqlx`.

pub mod error;
pub mod event;
pub mod hooks;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::{AggregateId, CorrelationId};
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder};
pub use hooks::{AfterSaveHooks, EventHook, HookError};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{EventStore, EventStoreExt, EventStream};
