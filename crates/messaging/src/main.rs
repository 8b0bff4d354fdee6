//! Users service entry point.

use event_store::{InMemoryEventStore, PostgresEventStore};
use messaging::{Config, MessagingError, UsersApp, telemetry};
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), MessagingError> {
    // 1. Configuration and tracing
    let config = Config::from_env();
    telemetry::init_tracing(&config);
    config.validate()?;

    // 2. Pick the event store and run the service until shutdown
    match &config.database_url {
        Some(url) => {
            tracing::info!("using PostgreSQL event store");
            let store = PostgresEventStore::connect(url, config.db_max_connections).await?;
            store.run_migrations().await?;
            run(store, &config).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, events are kept in memory");
            run(InMemoryEventStore::new(), &config).await
        }
    }
}

async fn run<S>(store: S, config: &Config) -> Result<(), MessagingError>
where
    S: event_store::EventStore + Clone + 'static,
{
    let app = UsersApp::start(store, config).await?;
    shutdown_signal().await;
    app.shutdown().await;
    Ok(())
}
