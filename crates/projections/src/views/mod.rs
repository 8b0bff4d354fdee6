//! Read model views maintained by projections.

pub mod user_directory;

pub use user_directory::{UserDirectoryView, UserSummary};
