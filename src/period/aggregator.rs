use crate::delta::DailyDelta;

use super::models::{PeriodSummary, PeriodWindow};

/// Rolls daily deltas into a period summary.
///
/// Only deltas of `player_tag` inside the window are used. The result
/// depends on nothing but the arguments.
pub fn aggregate(player_tag: &str, window: &PeriodWindow, deltas: &[DailyDelta]) -> PeriodSummary {
    let mut days: Vec<&DailyDelta> = deltas
        .iter()
        .filter(|d| d.player_tag == player_tag && window.contains(d.delta_date))
        .collect();
    days.sort_by_key(|d| d.delta_date);
    days.dedup_by_key(|d| d.delta_date);

    let mut summary = PeriodSummary {
        player_tag: player_tag.to_string(),
        period_type: window.period_type,
        period_start: window.start,
        period_end: window.end,
        days_recorded: days.len() as u32,
        active_days: 0,
        trophy_delta: 0,
        exp_gained: 0,
        attack_wins: 0,
        defense_wins: 0,
        war_stars: 0,
        donations_made: 0,
        donations_received: 0,
        gold_farmed: 0,
        elixir_farmed: 0,
        dark_elixir_farmed: 0,
        capital_gold_farmed: 0,
        buildings_destroyed: 0,
        obstacles_removed: 0,
        clan_changes: 0,
        role_changes: 0,
        avg_trophy_delta: 0.0,
        avg_donations_made: 0.0,
        avg_donations_received: 0.0,
        consistency_score: 0.0,
    };

    for day in &days {
        summary.trophy_delta = summary.trophy_delta.saturating_add(day.trophy_delta);
        summary.exp_gained = summary.exp_gained.saturating_add(day.exp_gained);
        summary.attack_wins = summary.attack_wins.saturating_add(day.attack_wins);
        summary.defense_wins = summary.defense_wins.saturating_add(day.defense_wins);
        summary.war_stars = summary.war_stars.saturating_add(day.war_stars);
        summary.donations_made = summary.donations_made.saturating_add(day.donations_made);
        summary.donations_received = summary
            .donations_received
            .saturating_add(day.donations_received);
        summary.gold_farmed = summary.gold_farmed.saturating_add(day.gold_farmed);
        summary.elixir_farmed = summary.elixir_farmed.saturating_add(day.elixir_farmed);
        summary.dark_elixir_farmed = summary
            .dark_elixir_farmed
            .saturating_add(day.dark_elixir_farmed);
        summary.capital_gold_farmed = summary
            .capital_gold_farmed
            .saturating_add(day.capital_gold_farmed);
        summary.buildings_destroyed = summary
            .buildings_destroyed
            .saturating_add(day.buildings_destroyed);
        summary.obstacles_removed = summary
            .obstacles_removed
            .saturating_add(day.obstacles_removed);
        summary.clan_changes += u32::from(day.clan_changed);
        summary.role_changes += u32::from(day.role_changed);
        summary.active_days += u32::from(day.is_active());
    }

    if !days.is_empty() {
        let n = days.len() as f64;
        summary.avg_trophy_delta = summary.trophy_delta as f64 / n;
        summary.avg_donations_made = summary.donations_made as f64 / n;
        summary.avg_donations_received = summary.donations_received as f64 / n;

        let mean = summary.avg_trophy_delta;
        let variance = days
            .iter()
            .map(|d| {
                let diff = d.trophy_delta as f64 - mean;
                diff * diff
            })
            .sum::<f64>()
            / n;
        summary.consistency_score = variance.sqrt() / (mean.abs() + 1.0);
    }

    summary
}
