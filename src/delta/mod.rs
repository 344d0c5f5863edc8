pub mod calculator;
pub mod models;
pub mod repository;
pub mod service;

pub use models::DailyDelta;
pub use repository::{DeltaRepository, InMemoryDeltaRepository, PostgresDeltaRepository};
pub use service::DeltaService;
