use crate::snapshot::{PlayerSnapshot, ResourceKind, TrackedAchievement};

use super::models::DailyDelta;

/// Difference between two adjacent snapshots of the same player.
///
/// Counters that went down (season resets, API anomalies) contribute 0.
/// An achievement missing from either side contributes 0 as well.
pub fn compute(previous: &PlayerSnapshot, current: &PlayerSnapshot) -> DailyDelta {
    let clan_changed = previous.clan_tag != current.clan_tag;

    DailyDelta {
        player_tag: current.player_tag.clone(),
        delta_date: current.snapshot_date,
        trophy_delta: current.trophies - previous.trophies,
        exp_gained: gain(previous.exp_level, current.exp_level),
        attack_wins: gain(previous.attack_wins, current.attack_wins),
        defense_wins: gain(previous.defense_wins, current.defense_wins),
        war_stars: gain(previous.war_stars, current.war_stars),
        donations_made: gain(previous.donations, current.donations),
        donations_received: gain(previous.donations_received, current.donations_received),
        gold_farmed: farmed(previous, current, ResourceKind::Gold),
        elixir_farmed: farmed(previous, current, ResourceKind::Elixir),
        dark_elixir_farmed: farmed(previous, current, ResourceKind::DarkElixir),
        capital_gold_farmed: farmed(previous, current, ResourceKind::CapitalGold),
        buildings_destroyed: TrackedAchievement::DESTRUCTION
            .iter()
            .fold(0u64, |total, a| {
                total.saturating_add(achievement_gain(previous, current, *a))
            }),
        obstacles_removed: achievement_gain(previous, current, TrackedAchievement::NiceAndTidy),
        clan_changed,
        new_clan_tag: if clan_changed {
            current.clan_tag.clone()
        } else {
            None
        },
        role_changed: previous.role != current.role,
    }
}

fn gain(before: i64, after: i64) -> u64 {
    u64::try_from(after.saturating_sub(before)).unwrap_or(0)
}

fn achievement_gain(
    previous: &PlayerSnapshot,
    current: &PlayerSnapshot,
    achievement: TrackedAchievement,
) -> u64 {
    match (
        previous.achievement_value(achievement),
        current.achievement_value(achievement),
    ) {
        (Some(before), Some(after)) => gain(before, after),
        _ => 0,
    }
}

fn farmed(previous: &PlayerSnapshot, current: &PlayerSnapshot, kind: ResourceKind) -> u64 {
    achievement_gain(previous, current, kind.achievement())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::AchievementProgress;
    use chrono::{NaiveDate, Utc};
    use rstest::rstest;
    use std::collections::BTreeMap;

    mod helpers {
        use super::*;

        pub fn snapshot(day: u32, achievements: &[(TrackedAchievement, i64)]) -> PlayerSnapshot {
            PlayerSnapshot {
                player_tag: "#2PP".to_string(),
                snapshot_date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
                name: "Chief".to_string(),
                trophies: 3000,
                best_trophies: 3200,
                exp_level: 150,
                town_hall_level: 13,
                town_hall_weapon_level: None,
                builder_hall_level: None,
                builder_trophies: None,
                league: None,
                attack_wins: 10,
                defense_wins: 2,
                war_stars: 300,
                donations: 40,
                donations_received: 10,
                clan_tag: Some("#CLAN".to_string()),
                clan_name: Some("Night Owls".to_string()),
                role: Some("member".to_string()),
                achievements: achievements
                    .iter()
                    .map(|(kind, value)| (*kind, AchievementProgress::new(*value, 100_000_000)))
                    .collect::<BTreeMap<_, _>>(),
                fingerprint: String::new(),
                fetched_at: Utc::now(),
            }
        }
    }

    use helpers::*;

    #[rstest]
    #[case(Some(1_000_000), Some(1_250_000), 250_000)]
    #[case(Some(1_000_000), Some(900_000), 0)]
    #[case(None, Some(1_250_000), 0)]
    #[case(Some(1_000_000), None, 0)]
    fn gold_is_derived_from_gold_grab(
        #[case] before: Option<i64>,
        #[case] after: Option<i64>,
        #[case] expected: u64,
    ) {
        let to_map = |v: Option<i64>| -> Vec<(TrackedAchievement, i64)> {
            v.map(|v| vec![(TrackedAchievement::GoldGrab, v)])
                .unwrap_or_default()
        };
        let previous = snapshot(5, &to_map(before));
        let current = snapshot(6, &to_map(after));

        let delta = compute(&previous, &current);

        assert_eq!(delta.gold_farmed, expected);
    }

    #[test]
    fn trophies_may_drop_but_counters_never_go_negative() {
        let previous = snapshot(5, &[]);
        let mut current = snapshot(6, &[]);
        current.trophies = 2950;
        current.donations = 0; // season reset
        current.war_stars = 303;

        let delta = compute(&previous, &current);

        assert_eq!(delta.trophy_delta, -50);
        assert_eq!(delta.donations_made, 0);
        assert_eq!(delta.war_stars, 3);
        assert_eq!(delta.delta_date, current.snapshot_date);
    }

    #[test]
    fn each_resource_uses_its_own_achievement() {
        let previous = snapshot(
            5,
            &[
                (TrackedAchievement::ElixirEscapade, 500),
                (TrackedAchievement::HeroicHeist, 100),
                (TrackedAchievement::AggressiveCapitalism, 2_000),
            ],
        );
        let current = snapshot(
            6,
            &[
                (TrackedAchievement::ElixirEscapade, 800),
                (TrackedAchievement::HeroicHeist, 150),
                (TrackedAchievement::AggressiveCapitalism, 2_500),
            ],
        );

        let delta = compute(&previous, &current);

        assert_eq!(delta.gold_farmed, 0);
        assert_eq!(delta.elixir_farmed, 300);
        assert_eq!(delta.dark_elixir_farmed, 50);
        assert_eq!(delta.capital_gold_farmed, 500);
    }

    #[test]
    fn buildings_sum_destruction_achievements() {
        let previous = snapshot(
            5,
            &[
                (TrackedAchievement::WallBuster, 100),
                (TrackedAchievement::Humiliator, 10),
                (TrackedAchievement::UnBuildIt, 5),
                (TrackedAchievement::NiceAndTidy, 20),
            ],
        );
        let current = snapshot(
            6,
            &[
                (TrackedAchievement::WallBuster, 130),
                (TrackedAchievement::Humiliator, 12),
                (TrackedAchievement::UnBuildIt, 4),
                (TrackedAchievement::NiceAndTidy, 23),
            ],
        );

        let delta = compute(&previous, &current);

        assert_eq!(delta.buildings_destroyed, 32);
        assert_eq!(delta.obstacles_removed, 3);
    }

    #[rstest]
    #[case(i64::MAX, u64::MAX)]
    #[case(1_000, 3_000)]
    fn destruction_gains_saturate_instead_of_overflowing(
        #[case] value: i64,
        #[case] expected: u64,
    ) {
        let previous = snapshot(
            5,
            &[
                (TrackedAchievement::WallBuster, 0),
                (TrackedAchievement::Humiliator, 0),
                (TrackedAchievement::UnBuildIt, 0),
            ],
        );
        let current = snapshot(
            6,
            &[
                (TrackedAchievement::WallBuster, value),
                (TrackedAchievement::Humiliator, value),
                (TrackedAchievement::UnBuildIt, value),
            ],
        );

        let delta = compute(&previous, &current);

        assert_eq!(delta.buildings_destroyed, expected);
    }

    #[test]
    fn clan_and_role_changes_are_flagged() {
        let previous = snapshot(5, &[]);
        let mut current = snapshot(6, &[]);
        current.clan_tag = Some("#OTHER".to_string());
        current.role = Some("elder".to_string());

        let delta = compute(&previous, &current);

        assert!(delta.clan_changed);
        assert_eq!(delta.new_clan_tag.as_deref(), Some("#OTHER"));
        assert!(delta.role_changed);

        let unchanged = compute(&previous, &snapshot(6, &[]));
        assert!(!unchanged.clan_changed);
        assert_eq!(unchanged.new_clan_tag, None);
        assert!(!unchanged.role_changed);
    }
}
