//! Reconstruction and persistence of aggregate roots.

use std::collections::HashMap;
use std::sync::Arc;

use common::AggregateId;
use event_store::EventStore;

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::event::Event;
use crate::registry::EventRegistry;

type Constructor<A> = Box<dyn Fn() -> A + Send + Sync>;

/// Binds aggregate type names to constructors and replays stored events
/// into freshly constructed aggregates.
pub struct Repository<S, A: AggregateRoot> {
    store: S,
    events: Arc<EventRegistry<A::Event>>,
    constructors: HashMap<String, Constructor<A>>,
}

impl<S, A> Repository<S, A>
where
    S: EventStore,
    A: AggregateRoot,
{
    /// Creates a repository with no registered constructors.
    pub fn new(store: S, events: Arc<EventRegistry<A::Event>>) -> Self {
        Self {
            store,
            events,
            constructors: HashMap::new(),
        }
    }

    /// Registers the zero-value constructor for `type_name`.
    pub fn register_constructor(
        &mut self,
        type_name: impl Into<String>,
        constructor: impl Fn() -> A + Send + Sync + 'static,
    ) -> &mut Self {
        self.constructors
            .insert(type_name.into(), Box::new(constructor));
        self
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn event_registry(&self) -> &Arc<EventRegistry<A::Event>> {
        &self.events
    }

    /// Constructs the zero value for `type_name` and replays the history of
    /// `aggregate_id` into it.
    ///
    /// An empty id means a creation command: the zero value is returned
    /// without touching the store.
    #[tracing::instrument(skip(self, aggregate_id), fields(aggregate_id = %aggregate_id))]
    pub async fn load(&self, type_name: &str, aggregate_id: &AggregateId) -> Result<A, DomainError> {
        let constructor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| DomainError::UnknownAggregateType(type_name.to_string()))?;
        let mut aggregate = constructor();

        if aggregate_id.is_empty() {
            return Ok(aggregate);
        }

        let history = self.store.load(aggregate_id).await?;
        tracing::debug!(events = history.len(), "replaying aggregate");
        for envelope in history {
            let event = self.events.decode(envelope)?;
            aggregate.apply(false, event)?;
        }

        Ok(aggregate)
    }

    /// Persists the aggregate's pending changes as one batch and clears
    /// them. On failure the pending changes are kept so the caller may retry.
    ///
    /// Returns the events that were persisted.
    #[tracing::instrument(skip(self, aggregate), fields(aggregate_id = %aggregate.id()))]
    pub async fn save(&self, aggregate: &mut A) -> Result<Vec<Event<A::Event>>, DomainError> {
        let envelopes = aggregate
            .changes()
            .iter()
            .map(|event| self.events.encode(event))
            .collect::<Result<Vec<_>, _>>()?;

        self.store.save(envelopes).await?;

        let saved = aggregate.changes().to_vec();
        aggregate.clear_changes();
        Ok(saved)
    }
}
