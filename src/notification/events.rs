use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::period::{PeriodSummary, PeriodType};

/// Events delivered to the chat layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    AchievementUnlocked {
        subject_id: String,
        achievement_key: String,
        achievement_name: String,
        reward_points: u32,
        awarded_at: DateTime<Utc>,
    },
    PeriodReport {
        subject_id: String,
        period_type: PeriodType,
        summary: PeriodSummary,
    },
}

impl NotificationEvent {
    pub fn subject_id(&self) -> &str {
        match self {
            NotificationEvent::AchievementUnlocked { subject_id, .. }
            | NotificationEvent::PeriodReport { subject_id, .. } => subject_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::AchievementUnlocked { .. } => "achievement_unlocked",
            NotificationEvent::PeriodReport { .. } => "period_report",
        }
    }
}
