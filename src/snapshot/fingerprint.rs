use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::models::{AchievementProgress, PlayerSnapshot, TrackedAchievement};

/// Normalized content of a snapshot, without the day and fetch time
#[derive(Serialize)]
struct FingerprintView<'a> {
    player_tag: &'a str,
    name: &'a str,
    trophies: i64,
    best_trophies: i64,
    exp_level: i64,
    town_hall_level: i64,
    town_hall_weapon_level: Option<i64>,
    builder_hall_level: Option<i64>,
    builder_trophies: Option<i64>,
    league: Option<&'a str>,
    attack_wins: i64,
    defense_wins: i64,
    war_stars: i64,
    donations: i64,
    donations_received: i64,
    clan_tag: Option<&'a str>,
    clan_name: Option<&'a str>,
    role: Option<&'a str>,
    achievements: &'a BTreeMap<TrackedAchievement, AchievementProgress>,
}

/// Hex SHA-256 of the canonical JSON of the normalized fields
pub fn fingerprint(snapshot: &PlayerSnapshot) -> String {
    let view = FingerprintView {
        player_tag: &snapshot.player_tag,
        name: &snapshot.name,
        trophies: snapshot.trophies,
        best_trophies: snapshot.best_trophies,
        exp_level: snapshot.exp_level,
        town_hall_level: snapshot.town_hall_level,
        town_hall_weapon_level: snapshot.town_hall_weapon_level,
        builder_hall_level: snapshot.builder_hall_level,
        builder_trophies: snapshot.builder_trophies,
        league: snapshot.league.as_deref(),
        attack_wins: snapshot.attack_wins,
        defense_wins: snapshot.defense_wins,
        war_stars: snapshot.war_stars,
        donations: snapshot.donations,
        donations_received: snapshot.donations_received,
        clan_tag: snapshot.clan_tag.as_deref(),
        clan_name: snapshot.clan_name.as_deref(),
        role: snapshot.role.as_deref(),
        achievements: &snapshot.achievements,
    };

    // struct fields serialize in declaration order and the map is sorted
    let canonical = serde_json::to_vec(&view).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}
