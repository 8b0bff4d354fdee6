//! Read models and projections for the CQRS query side.
//!
//! This crate provides the query side of the CQRS pattern:
//! - [`Projection`] trait for processing events into read models
//! - [`ProjectionProcessor`] for feeding events from the store to projections
//! - [`ProjectionHook`] for following new events as they are saved
//! - [`UserDirectoryView`], the user directory read model

pub mod error;
pub mod hook;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use hook::ProjectionHook;
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use views::{UserDirectoryView, UserSummary};
