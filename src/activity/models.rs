use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Cumulative activity of one subject. Every total only grows;
/// `current_streak` is the one field that resets after a gap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounters {
    pub subject_id: String,
    pub total_messages: u64,
    pub helpful_actions: u64,
    pub gold_farmed: u64,
    pub elixir_farmed: u64,
    pub dark_elixir_farmed: u64,
    pub capital_gold_farmed: u64,
    pub buildings_destroyed: u64,
    pub wars_participated: u64,
    pub donations_made: u64,
    pub current_streak: u64,
    pub best_streak: u64,
    pub last_activity_date: Option<NaiveDate>,
}

/// Counter fields an achievement threshold can refer to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CounterField {
    TotalMessages,
    HelpfulActions,
    GoldFarmed,
    ElixirFarmed,
    DarkElixirFarmed,
    CapitalGoldFarmed,
    BuildingsDestroyed,
    WarsParticipated,
    DonationsMade,
    CurrentStreak,
    BestStreak,
}

impl ActivityCounters {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            ..Self::default()
        }
    }

    pub fn value(&self, field: CounterField) -> u64 {
        match field {
            CounterField::TotalMessages => self.total_messages,
            CounterField::HelpfulActions => self.helpful_actions,
            CounterField::GoldFarmed => self.gold_farmed,
            CounterField::ElixirFarmed => self.elixir_farmed,
            CounterField::DarkElixirFarmed => self.dark_elixir_farmed,
            CounterField::CapitalGoldFarmed => self.capital_gold_farmed,
            CounterField::BuildingsDestroyed => self.buildings_destroyed,
            CounterField::WarsParticipated => self.wars_participated,
            CounterField::DonationsMade => self.donations_made,
            CounterField::CurrentStreak => self.current_streak,
            CounterField::BestStreak => self.best_streak,
        }
    }

    /// Adds one contribution made on `day`
    pub fn apply(&mut self, contribution: &CounterContribution, day: NaiveDate) {
        self.total_messages = self.total_messages.saturating_add(contribution.messages);
        self.helpful_actions = self
            .helpful_actions
            .saturating_add(contribution.helpful_actions);
        self.gold_farmed = self.gold_farmed.saturating_add(contribution.gold);
        self.elixir_farmed = self.elixir_farmed.saturating_add(contribution.elixir);
        self.dark_elixir_farmed = self
            .dark_elixir_farmed
            .saturating_add(contribution.dark_elixir);
        self.capital_gold_farmed = self
            .capital_gold_farmed
            .saturating_add(contribution.capital_gold);
        self.buildings_destroyed = self
            .buildings_destroyed
            .saturating_add(contribution.buildings_destroyed);
        self.wars_participated = self
            .wars_participated
            .saturating_add(contribution.wars_participated);
        self.donations_made = self
            .donations_made
            .saturating_add(contribution.donations_made);

        if contribution.active {
            self.register_active_day(day);
        }
    }

    /// Extends or restarts the streak. Days older than the last active day
    /// (late backfills) leave the streak alone.
    pub fn register_active_day(&mut self, day: NaiveDate) {
        match self.last_activity_date {
            Some(last) if day <= last => return,
            Some(last) if last.succ_opt() == Some(day) => self.current_streak += 1,
            _ => self.current_streak = 1,
        }

        self.best_streak = self.best_streak.max(self.current_streak);
        self.last_activity_date = Some(day);
    }
}

/// Increment for one subject, produced by one daily delta or one chat event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterContribution {
    pub messages: u64,
    pub helpful_actions: u64,
    pub gold: u64,
    pub elixir: u64,
    pub dark_elixir: u64,
    pub capital_gold: u64,
    pub buildings_destroyed: u64,
    pub wars_participated: u64,
    pub donations_made: u64,
    /// Whether the day counts towards the active streak
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChatActivity {
    Message,
    HelpfulAction,
}

impl ChatActivity {
    pub fn contribution(self) -> CounterContribution {
        match self {
            ChatActivity::Message => CounterContribution {
                messages: 1,
                active: true,
                ..CounterContribution::default()
            },
            ChatActivity::HelpfulAction => CounterContribution {
                helpful_actions: 1,
                active: true,
                ..CounterContribution::default()
            },
        }
    }
}
