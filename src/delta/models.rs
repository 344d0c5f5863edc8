use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::activity::CounterContribution;
use crate::snapshot::ResourceKind;

/// Change of one player between day D-1 and day D.
/// Every count except `trophy_delta` is non-negative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyDelta {
    pub player_tag: String,
    pub delta_date: NaiveDate,
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
    pub clan_changed: bool,
    pub new_clan_tag: Option<String>,
    pub role_changed: bool,
}

impl DailyDelta {
    pub fn farmed(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::Gold => self.gold_farmed,
            ResourceKind::Elixir => self.elixir_farmed,
            ResourceKind::DarkElixir => self.dark_elixir_farmed,
            ResourceKind::CapitalGold => self.capital_gold_farmed,
        }
    }

    /// Any numeric field moved
    pub fn is_active(&self) -> bool {
        self.trophy_delta != 0
            || [
                self.exp_gained,
                self.attack_wins,
                self.defense_wins,
                self.war_stars,
                self.donations_made,
                self.donations_received,
                self.gold_farmed,
                self.elixir_farmed,
                self.dark_elixir_farmed,
                self.capital_gold_farmed,
                self.buildings_destroyed,
                self.obstacles_removed,
            ]
            .iter()
            .any(|v| *v > 0)
    }

    /// What this day adds to the owning subject's counters
    pub fn contribution(&self) -> CounterContribution {
        CounterContribution {
            gold: self.gold_farmed,
            elixir: self.elixir_farmed,
            dark_elixir: self.dark_elixir_farmed,
            capital_gold: self.capital_gold_farmed,
            buildings_destroyed: self.buildings_destroyed,
            wars_participated: u64::from(self.war_stars > 0),
            donations_made: self.donations_made,
            active: self.is_active(),
            ..CounterContribution::default()
        }
    }
}
