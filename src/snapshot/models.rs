use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::debug;

use super::{fingerprint::fingerprint, SnapshotError};
use crate::client::PlayerPayload;

/// Game achievements whose progress counters feed daily deltas.
///
/// The API keys achievements by display name; anything not listed here is
/// dropped during normalization.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum TrackedAchievement {
    #[strum(serialize = "Gold Grab")]
    #[serde(rename = "Gold Grab")]
    GoldGrab,
    #[strum(serialize = "Elixir Escapade")]
    #[serde(rename = "Elixir Escapade")]
    ElixirEscapade,
    #[strum(serialize = "Heroic Heist")]
    #[serde(rename = "Heroic Heist")]
    HeroicHeist,
    #[strum(serialize = "Aggressive Capitalism")]
    #[serde(rename = "Aggressive Capitalism")]
    AggressiveCapitalism,
    #[strum(serialize = "Wall Buster")]
    #[serde(rename = "Wall Buster")]
    WallBuster,
    #[strum(serialize = "Humiliator")]
    #[serde(rename = "Humiliator")]
    Humiliator,
    #[strum(serialize = "Un-Build It")]
    #[serde(rename = "Un-Build It")]
    UnBuildIt,
    #[strum(serialize = "Nice and Tidy")]
    #[serde(rename = "Nice and Tidy")]
    NiceAndTidy,
    #[strum(serialize = "War Hero")]
    #[serde(rename = "War Hero")]
    WarHero,
    #[strum(serialize = "Friend in Need")]
    #[serde(rename = "Friend in Need")]
    FriendInNeed,
}

impl TrackedAchievement {
    /// Achievements counted towards "buildings destroyed"
    pub const DESTRUCTION: [TrackedAchievement; 3] = [
        TrackedAchievement::WallBuster,
        TrackedAchievement::Humiliator,
        TrackedAchievement::UnBuildIt,
    ];

    pub fn resource(self) -> Option<ResourceKind> {
        match self {
            TrackedAchievement::GoldGrab => Some(ResourceKind::Gold),
            TrackedAchievement::ElixirEscapade => Some(ResourceKind::Elixir),
            TrackedAchievement::HeroicHeist => Some(ResourceKind::DarkElixir),
            TrackedAchievement::AggressiveCapitalism => Some(ResourceKind::CapitalGold),
            _ => None,
        }
    }
}

/// Farmable resources derived from achievement counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    Gold,
    Elixir,
    DarkElixir,
    CapitalGold,
}

impl ResourceKind {
    pub fn achievement(self) -> TrackedAchievement {
        match self {
            ResourceKind::Gold => TrackedAchievement::GoldGrab,
            ResourceKind::Elixir => TrackedAchievement::ElixirEscapade,
            ResourceKind::DarkElixir => TrackedAchievement::HeroicHeist,
            ResourceKind::CapitalGold => TrackedAchievement::AggressiveCapitalism,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementProgress {
    pub value: i64,
    pub target: i64,
    pub completed: bool,
}

impl AchievementProgress {
    pub fn new(value: i64, target: i64) -> Self {
        Self {
            value,
            target,
            completed: target > 0 && value >= target,
        }
    }
}

/// Immutable state of one player on one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player_tag: String,
    pub snapshot_date: NaiveDate,
    pub name: String,
    pub trophies: i64,
    pub best_trophies: i64,
    pub exp_level: i64,
    pub town_hall_level: i64,
    pub town_hall_weapon_level: Option<i64>,
    pub builder_hall_level: Option<i64>,
    pub builder_trophies: Option<i64>,
    pub league: Option<String>,
    pub attack_wins: i64,
    pub defense_wins: i64,
    pub war_stars: i64,
    pub donations: i64,
    pub donations_received: i64,
    pub clan_tag: Option<String>,
    pub clan_name: Option<String>,
    pub role: Option<String>,
    pub achievements: BTreeMap<TrackedAchievement, AchievementProgress>,
    pub fingerprint: String,
    pub fetched_at: DateTime<Utc>,
}

impl PlayerSnapshot {
    /// Normalizes a raw API payload into the snapshot for `day`.
    pub fn from_payload(
        player_tag: &str,
        payload: &PlayerPayload,
        day: NaiveDate,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, SnapshotError> {
        let expected = normalize_tag(player_tag);
        let actual = normalize_tag(required(payload.tag.as_deref(), "tag")?);
        if actual != expected {
            return Err(SnapshotError::TagMismatch { expected, actual });
        }

        let mut snapshot = PlayerSnapshot {
            player_tag: expected,
            snapshot_date: day,
            name: required(payload.name.as_deref(), "name")?.to_string(),
            trophies: required(payload.trophies, "trophies")?,
            best_trophies: required(payload.best_trophies, "bestTrophies")?,
            exp_level: required(payload.exp_level, "expLevel")?,
            town_hall_level: required(payload.town_hall_level, "townHallLevel")?,
            town_hall_weapon_level: payload.town_hall_weapon_level,
            builder_hall_level: payload.builder_hall_level,
            builder_trophies: payload.builder_base_trophies,
            league: payload.league.as_ref().and_then(|l| l.name.clone()),
            attack_wins: required(payload.attack_wins, "attackWins")?,
            defense_wins: required(payload.defense_wins, "defenseWins")?,
            war_stars: required(payload.war_stars, "warStars")?,
            donations: required(payload.donations, "donations")?,
            donations_received: required(payload.donations_received, "donationsReceived")?,
            clan_tag: payload
                .clan
                .as_ref()
                .and_then(|c| c.tag.as_deref())
                .map(normalize_tag),
            clan_name: payload.clan.as_ref().and_then(|c| c.name.clone()),
            role: payload.role.clone(),
            achievements: tracked_achievements(payload),
            fingerprint: String::new(),
            fetched_at,
        };

        snapshot.fingerprint = fingerprint(&snapshot);
        Ok(snapshot)
    }

    pub fn achievement_value(&self, achievement: TrackedAchievement) -> Option<i64> {
        self.achievements.get(&achievement).map(|p| p.value)
    }
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, SnapshotError> {
    value.ok_or(SnapshotError::Malformed { field })
}

fn tracked_achievements(
    payload: &PlayerPayload,
) -> BTreeMap<TrackedAchievement, AchievementProgress> {
    let mut tracked = BTreeMap::new();
    let mut ignored = 0usize;

    for entry in payload.achievements.iter().flatten() {
        match TrackedAchievement::from_str(&entry.name) {
            Ok(kind) => {
                tracked
                    .entry(kind)
                    .or_insert_with(|| AchievementProgress::new(entry.value, entry.target));
            }
            Err(_) => ignored += 1,
        }
    }

    if ignored > 0 {
        debug!(
            ignored = ignored,
            tracked = tracked.len(),
            "Ignored untracked achievements"
        );
    }

    tracked
}

/// Canonical player tag: uppercase and `#`-prefixed
pub fn normalize_tag(tag: &str) -> String {
    format!("#{}", tag.trim().trim_start_matches('#').to_uppercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SnapshotOutcome {
    /// False when a snapshot for the same day already existed
    pub stored: bool,
    /// False when the content matches the most recent earlier snapshot
    pub changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AchievementPayload, ClanPayload};
    use rstest::rstest;

    mod helpers {
        use super::*;

        pub fn payload(tag: &str) -> PlayerPayload {
            PlayerPayload {
                tag: Some(tag.to_string()),
                name: Some("Chief".to_string()),
                trophies: Some(3000),
                best_trophies: Some(3200),
                exp_level: Some(150),
                town_hall_level: Some(13),
                attack_wins: Some(40),
                defense_wins: Some(3),
                war_stars: Some(500),
                donations: Some(100),
                donations_received: Some(50),
                role: Some("member".to_string()),
                clan: Some(ClanPayload {
                    tag: Some("#clan1".to_string()),
                    name: Some("Night Owls".to_string()),
                }),
                achievements: Some(vec![
                    AchievementPayload {
                        name: "Gold Grab".to_string(),
                        value: 1_000_000,
                        target: 100_000_000,
                    },
                    AchievementPayload {
                        name: "Sweet Victory!".to_string(),
                        value: 10,
                        target: 5,
                    },
                    AchievementPayload {
                        name: "Gold Grab".to_string(),
                        value: 5,
                        target: 5,
                    },
                ]),
                ..PlayerPayload::default()
            }
        }

        pub fn day() -> NaiveDate {
            NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
        }
    }

    use helpers::*;

    #[rstest]
    #[case("#2ppyq", "#2PPYQ")]
    #[case("  2PPYQ ", "#2PPYQ")]
    #[case("#gone", "#GONE")]
    fn normalizes_tags(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_tag(raw), expected);
    }

    #[test]
    fn keeps_tracked_achievements_only_and_first_duplicate_wins() {
        let snapshot =
            PlayerSnapshot::from_payload("#2PP", &payload("#2PP"), day(), Utc::now()).unwrap();

        assert_eq!(snapshot.achievements.len(), 1);
        let gold = snapshot.achievements[&TrackedAchievement::GoldGrab];
        assert_eq!(gold.value, 1_000_000);
        assert!(!gold.completed);
        assert_eq!(snapshot.clan_tag.as_deref(), Some("#CLAN1"));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let mut raw = payload("#2PP");
        raw.trophies = None;

        let err = PlayerSnapshot::from_payload("#2PP", &raw, day(), Utc::now()).unwrap_err();
        assert!(matches!(err, SnapshotError::Malformed { field: "trophies" }));
    }

    #[test]
    fn payload_for_another_player_is_rejected() {
        let err = PlayerSnapshot::from_payload("#2PP", &payload("#OTHER"), day(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, SnapshotError::TagMismatch { .. }));
    }

    #[test]
    fn achievement_names_round_trip_through_strum() {
        assert_eq!(
            TrackedAchievement::from_str("Un-Build It").unwrap(),
            TrackedAchievement::UnBuildIt
        );
        assert_eq!(TrackedAchievement::HeroicHeist.to_string(), "Heroic Heist");
        assert_eq!(
            ResourceKind::CapitalGold.achievement().resource(),
            Some(ResourceKind::CapitalGold)
        );
    }
}
