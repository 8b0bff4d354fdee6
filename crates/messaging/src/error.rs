//! Messaging error types.

use std::time::Duration;

use thiserror::Error;

/// Failures of the per-correlation outcome rendezvous.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorrelationError {
    /// Waiting or publishing on a correlation id nobody subscribed to.
    #[error("no subscription for correlation {0}")]
    NotSubscribed(String),

    #[error("correlation {0} already has a subscription")]
    AlreadySubscribed(String),

    /// The one-slot buffer already holds or handed out an outcome.
    #[error("an outcome was already delivered for correlation {0}")]
    AlreadyDelivered(String),

    /// No outcome arrived before the deadline.
    #[error("no outcome within {0:?}")]
    Timeout(Duration),

    /// The command finished with a failure on the remote side.
    #[error("remote error: {0}")]
    Remote(String),

    /// The waiting side is gone, or the outcome was already consumed.
    #[error("correlation {0} is closed")]
    Closed(String),
}

/// Errors raised by the transport, the listener and service bootstrap.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// The listener refused the request in its acknowledgement.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("no listener bound to {0}")]
    NoListener(String),

    #[error("no acknowledgement within {0:?}")]
    AckTimeout(Duration),

    #[error("malformed acknowledgement: {0}")]
    InvalidReply(String),

    #[error("malformed subject: {0}")]
    InvalidSubject(String),

    #[error(transparent)]
    Domain(#[from] domain::DomainError),

    #[error(transparent)]
    Store(#[from] event_store::EventStoreError),

    #[error(transparent)]
    Projection(#[from] projections::ProjectionError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
