use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::activity::{ActivityCounters, CounterField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AchievementCategory {
    Activity,
    Quality,
    Social,
    Game,
    Special,
}

/// Catalog entry: unlocked once `counter` reaches `threshold`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub key: String,
    pub name: String,
    pub category: AchievementCategory,
    pub counter: CounterField,
    pub threshold: u64,
    pub reward_points: u32,
    pub active: bool,
}

impl AchievementDefinition {
    pub fn new(
        key: &str,
        name: &str,
        category: AchievementCategory,
        counter: CounterField,
        threshold: u64,
        reward_points: u32,
    ) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            category,
            counter,
            threshold,
            reward_points,
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn is_met(&self, counters: &ActivityCounters) -> bool {
        counters.value(self.counter) >= self.threshold
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardedAchievement {
    pub subject_id: String,
    pub achievement_key: String,
    /// Counter value at the moment of the award
    pub counter_value: u64,
    pub awarded_at: DateTime<Utc>,
}

/// One row of a subject's progress view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEntry {
    pub key: String,
    pub name: String,
    pub category: AchievementCategory,
    pub counter: CounterField,
    pub current: u64,
    pub threshold: u64,
    /// 0..=100
    pub percentage: f64,
    pub unlocked: bool,
}

impl ProgressEntry {
    pub fn new(definition: &AchievementDefinition, current: u64, unlocked: bool) -> Self {
        let percentage = if unlocked || definition.threshold == 0 {
            100.0
        } else {
            (current as f64 / definition.threshold as f64 * 100.0).min(100.0)
        };

        Self {
            key: definition.key.clone(),
            name: definition.name.clone(),
            category: definition.category,
            counter: definition.counter,
            current,
            threshold: definition.threshold,
            percentage,
            unlocked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectProfile {
    pub subject_id: String,
    pub total_points: u64,
    pub level: u32,
    pub unlocked: usize,
    pub available: usize,
}

/// Summed award points of one subject, as ranked by the award store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectScore {
    pub subject_id: String,
    pub total_points: u64,
    pub unlocked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based
    pub rank: usize,
    pub subject_id: String,
    pub total_points: u64,
    pub level: u32,
    pub unlocked: usize,
}

/// Points needed to reach `level`
pub fn points_for_level(level: u32) -> u64 {
    (100.0 * f64::from(level).powf(1.5)).floor() as u64
}

/// Highest level whose requirement is covered by `points`; level 1 is free
pub fn level_for_points(points: u64) -> u32 {
    let mut level = 1;
    while points >= points_for_level(level + 1) {
        level += 1;
    }
    level
}
