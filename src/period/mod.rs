pub mod aggregator;
pub mod models;
pub mod repository;
pub mod service;

pub use models::{PeriodSummary, PeriodType, PeriodWindow};
pub use repository::{
    InMemoryPeriodSummaryRepository, PeriodSummaryRepository, PostgresPeriodSummaryRepository,
};
pub use service::PeriodService;
