mod errors;
pub mod fingerprint;
pub mod models;
pub mod repository;
pub mod service;

pub use errors::SnapshotError;
pub use models::*;
pub use repository::{InMemorySnapshotRepository, PostgresSnapshotRepository, SnapshotRepository};
pub use service::SnapshotStore;
