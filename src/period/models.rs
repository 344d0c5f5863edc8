use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::shared::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PeriodType {
    Week,
    Month,
}

impl PeriodType {
    /// Start of the period that contains `day`
    pub fn start_containing(self, day: NaiveDate) -> NaiveDate {
        match self {
            PeriodType::Week => day
                .checked_sub_days(Days::new(u64::from(day.weekday().num_days_from_monday())))
                .unwrap_or(day),
            PeriodType::Month => day.with_day(1).unwrap_or(day),
        }
    }
}

/// Half-open date range `[start, end)` of one period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub period_type: PeriodType,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodWindow {
    /// Weeks start on Monday, months on the first
    pub fn new(period_type: PeriodType, start: NaiveDate) -> Result<Self, AppError> {
        let end = match period_type {
            PeriodType::Week => {
                if start.weekday() != Weekday::Mon {
                    return Err(AppError::Validation(format!(
                        "week must start on a Monday, got {} ({})",
                        start,
                        start.weekday()
                    )));
                }
                start.checked_add_days(Days::new(7))
            }
            PeriodType::Month => {
                if start.day() != 1 {
                    return Err(AppError::Validation(format!(
                        "month must start on the first day, got {}",
                        start
                    )));
                }
                start.checked_add_months(Months::new(1))
            }
        }
        .ok_or_else(|| AppError::Validation(format!("period starting {} is out of range", start)))?;

        Ok(Self {
            period_type,
            start,
            end,
        })
    }

    /// Window that contains `day`
    pub fn containing(period_type: PeriodType, day: NaiveDate) -> Result<Self, AppError> {
        Self::new(period_type, period_type.start_containing(day))
    }

    /// The window right before this one
    pub fn previous(&self) -> Result<Self, AppError> {
        let day_before = self
            .start
            .pred_opt()
            .ok_or_else(|| AppError::Validation("no period before this one".to_string()))?;
        Self::containing(self.period_type, day_before)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start && day < self.end
    }
}

/// Rollup of one player's daily deltas over a week or month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub player_tag: String,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub days_recorded: u32,
    pub active_days: u32,
    pub trophy_delta: i64,
    pub exp_gained: u64,
    pub attack_wins: u64,
    pub defense_wins: u64,
    pub war_stars: u64,
    pub donations_made: u64,
    pub donations_received: u64,
    pub gold_farmed: u64,
    pub elixir_farmed: u64,
    pub dark_elixir_farmed: u64,
    pub capital_gold_farmed: u64,
    pub buildings_destroyed: u64,
    pub obstacles_removed: u64,
    pub clan_changes: u32,
    pub role_changes: u32,
    pub avg_trophy_delta: f64,
    pub avg_donations_made: f64,
    pub avg_donations_received: f64,
    /// Standard deviation of the daily trophy delta over `|mean| + 1`.
    /// Lower is steadier; the `+ 1` keeps near-zero means finite.
    pub consistency_score: f64,
}

impl PeriodSummary {
    pub fn has_data(&self) -> bool {
        self.days_recorded > 0
    }
}
