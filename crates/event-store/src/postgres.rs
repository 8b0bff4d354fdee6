use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    AfterSaveHooks, AggregateId, CorrelationId, EventEnvelope, EventHook, EventStoreError, Result,
    store::{EventStore, EventStream, validate_events_for_save},
};

const LOAD_BY_AGGREGATE: &str = r#"
    SELECT event_id, aggregate_id, aggregate_type, correlation_id, created_at, payload
    FROM events
    WHERE aggregate_id = $1
    ORDER BY created_at ASC, seq ASC
"#;

const LOAD_BY_EVENT_IDS: &str = r#"
    SELECT event_id, aggregate_id, aggregate_type, correlation_id, created_at, payload
    FROM events
    WHERE event_id = ANY($1)
    ORDER BY created_at ASC, seq ASC
"#;

const LOAD_ALL: &str = r#"
    SELECT event_id, aggregate_id, aggregate_type, correlation_id, created_at, payload
    FROM events
    ORDER BY seq ASC
"#;

/// PostgreSQL-backed event store implementation.
///
/// Each batch is written in one transaction. The `seq` column breaks
/// `created_at` ties so read-back order matches insertion order, and alone
/// orders the full-log stream.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
    hooks: AfterSaveHooks,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            hooks: AfterSaveHooks::new(),
        }
    }

    /// Connects to `database_url` with a pool of at most `max_connections`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        Ok(EventEnvelope {
            event_id: row.try_get("event_id")?,
            aggregate_id: AggregateId::from(row.try_get::<String, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            correlation_id: CorrelationId::from(row.try_get::<String, _>("correlation_id")?),
            created_at: row.try_get("created_at")?,
            payload: row.try_get("payload")?,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn save(&self, events: Vec<EventEnvelope>) -> Result<()> {
        validate_events_for_save(&events)?;
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for event in &events {
            sqlx::query(
                r#"
                INSERT INTO events (event_id, aggregate_id, aggregate_type, correlation_id, created_at, payload)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&event.event_id)
            .bind(event.aggregate_id.as_str())
            .bind(&event.aggregate_type)
            .bind(event.correlation_id.as_str())
            .bind(event.created_at)
            .bind(&event.payload)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        metrics::counter!("event_store_events_saved_total").increment(events.len() as u64);
        self.hooks.run(&events).await;
        Ok(())
    }

    async fn load(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(LOAD_BY_AGGREGATE)
            .bind(aggregate_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn load_by_event_ids(&self, event_ids: &[&str]) -> Result<Vec<EventEnvelope>> {
        let ids: Vec<String> = event_ids.iter().map(|id| id.to_string()).collect();
        let rows = sqlx::query(LOAD_BY_EVENT_IDS)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::StreamExt;

        // Collected eagerly: the returned stream may not borrow the pool.
        let rows = sqlx::query(LOAD_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(EventStoreError::Database)?;

        let stream = futures_util::stream::iter(rows).map(Self::row_to_event);
        Ok(Box::pin(stream))
    }

    async fn register_hook(&self, hook: Arc<dyn EventHook>) {
        self.hooks.register(hook).await;
    }
}
