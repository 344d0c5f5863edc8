use chrono::{FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    models::{ActivityCounters, ChatActivity},
    repository::ActivityRepository,
};
use crate::achievement::{AchievementEvaluator, AwardedAchievement};
use crate::shared::{calendar_day, AppError};

#[derive(Debug, Clone, Serialize)]
pub struct ActivityOutcome {
    pub counters: ActivityCounters,
    pub newly_awarded: Vec<AwardedAchievement>,
}

/// Records chat activity of subjects and re-evaluates their achievements
pub struct ActivityTracker {
    repository: Arc<dyn ActivityRepository>,
    evaluator: Arc<AchievementEvaluator>,
    day_offset: FixedOffset,
}

impl ActivityTracker {
    pub fn new(
        repository: Arc<dyn ActivityRepository>,
        evaluator: Arc<AchievementEvaluator>,
        day_offset: FixedOffset,
    ) -> Self {
        Self {
            repository,
            evaluator,
            day_offset,
        }
    }

    pub async fn record_message(&self, subject_id: &str) -> Result<ActivityOutcome, AppError> {
        self.record(subject_id, ChatActivity::Message, self.today())
            .await
    }

    pub async fn record_helpful_action(
        &self,
        subject_id: &str,
    ) -> Result<ActivityOutcome, AppError> {
        self.record(subject_id, ChatActivity::HelpfulAction, self.today())
            .await
    }

    #[instrument(skip(self))]
    pub async fn record(
        &self,
        subject_id: &str,
        activity: ChatActivity,
        day: NaiveDate,
    ) -> Result<ActivityOutcome, AppError> {
        let counters = self
            .repository
            .apply_event(subject_id, day, &activity.contribution())
            .await?;
        debug!(
            total_messages = counters.total_messages,
            helpful_actions = counters.helpful_actions,
            streak = counters.current_streak,
            "Chat activity recorded"
        );

        let newly_awarded = self.evaluator.evaluate(subject_id).await?;
        Ok(ActivityOutcome {
            counters,
            newly_awarded,
        })
    }

    pub async fn counters(&self, subject_id: &str) -> Result<ActivityCounters, AppError> {
        Ok(self
            .repository
            .get_counters(subject_id)
            .await?
            .unwrap_or_else(|| ActivityCounters::new(subject_id)))
    }

    fn today(&self) -> NaiveDate {
        calendar_day(Utc::now(), self.day_offset)
    }
}
