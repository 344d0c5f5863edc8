pub mod models;
pub mod repository;
pub mod tracker;

pub use models::*;
pub use repository::{ActivityRepository, InMemoryActivityRepository, PostgresActivityRepository};
pub use tracker::{ActivityOutcome, ActivityTracker};
