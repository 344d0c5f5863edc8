use serde::{Deserialize, Serialize};

/// Player object as returned by the game API.
///
/// Every field is optional here; required fields are enforced when the
/// payload is normalized into a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPayload {
    pub tag: Option<String>,
    pub name: Option<String>,
    pub trophies: Option<i64>,
    pub best_trophies: Option<i64>,
    pub exp_level: Option<i64>,
    pub town_hall_level: Option<i64>,
    pub town_hall_weapon_level: Option<i64>,
    pub builder_hall_level: Option<i64>,
    pub builder_base_trophies: Option<i64>,
    pub attack_wins: Option<i64>,
    pub defense_wins: Option<i64>,
    pub war_stars: Option<i64>,
    pub donations: Option<i64>,
    pub donations_received: Option<i64>,
    pub role: Option<String>,
    pub league: Option<LeaguePayload>,
    pub clan: Option<ClanPayload>,
    pub achievements: Option<Vec<AchievementPayload>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaguePayload {
    pub id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClanPayload {
    pub tag: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AchievementPayload {
    pub name: String,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub target: i64,
}
