use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::achievement::{AwardedAchievement, LeaderboardEntry, ProgressEntry, SubjectProfile};
use crate::activity::ChatActivity;
use crate::period::{PeriodSummary, PeriodType};

/// Optional body of `POST /jobs/ingest`; tracked players are used when absent
#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub player_tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub kind: ChatActivity,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PeriodSummaryResponse {
    pub player_tag: String,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub summary: Option<PeriodSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AchievementsResponse {
    pub profile: SubjectProfile,
    pub progress: Vec<ProgressEntry>,
    pub awards: Vec<AwardedAchievement>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

impl LeaderboardQuery {
    pub const DEFAULT_LIMIT: usize = 10;
    pub const MAX_LIMIT: usize = 100;
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
}
