pub mod catalog;
pub mod evaluator;
pub mod models;
pub mod repository;

pub use catalog::AchievementCatalog;
pub use evaluator::{AchievementEvaluator, AchievementEvaluatorBuilder};
pub use models::*;
pub use repository::{
    AchievementRepository, InMemoryAchievementRepository, PostgresAchievementRepository,
};
