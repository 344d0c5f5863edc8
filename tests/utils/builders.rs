use chrono::NaiveDate;

use clanstats::client::{AchievementPayload, ClanPayload, LeaguePayload, PlayerPayload};

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

// ============================================================================
// Payload Builder
// ============================================================================

/// Builds API player payloads with sensible defaults
pub struct PayloadBuilder {
    payload: PlayerPayload,
}

impl PayloadBuilder {
    pub fn new(player_tag: &str) -> Self {
        let payload = PlayerPayload {
            tag: Some(player_tag.to_string()),
            name: Some("Chief".to_string()),
            trophies: Some(3000),
            best_trophies: Some(3200),
            exp_level: Some(150),
            town_hall_level: Some(13),
            town_hall_weapon_level: Some(2),
            builder_hall_level: Some(9),
            builder_base_trophies: Some(2500),
            attack_wins: Some(10),
            defense_wins: Some(2),
            war_stars: Some(100),
            donations: Some(0),
            donations_received: Some(0),
            role: Some("member".to_string()),
            league: Some(LeaguePayload {
                id: Some(29000012),
                name: Some("Crystal League I".to_string()),
            }),
            clan: Some(ClanPayload {
                tag: Some("#CLAN".to_string()),
                name: Some("Night Owls".to_string()),
            }),
            achievements: Some(Vec::new()),
        };
        Self { payload }
    }

    fn achievement(mut self, name: &str, value: i64) -> Self {
        let achievements = self.payload.achievements.get_or_insert_with(Vec::new);
        match achievements.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => achievements.push(AchievementPayload {
                name: name.to_string(),
                value,
                target: 0,
            }),
        }
        self
    }

    pub fn gold(self, value: i64) -> Self {
        self.achievement("Gold Grab", value)
    }

    pub fn elixir(self, value: i64) -> Self {
        self.achievement("Elixir Escapade", value)
    }

    pub fn dark_elixir(self, value: i64) -> Self {
        self.achievement("Heroic Heist", value)
    }

    pub fn walls(self, value: i64) -> Self {
        self.achievement("Wall Buster", value)
    }

    pub fn trophies(mut self, value: i64) -> Self {
        self.payload.trophies = Some(value);
        self
    }

    pub fn donations(mut self, value: i64) -> Self {
        self.payload.donations = Some(value);
        self
    }

    pub fn war_stars(mut self, value: i64) -> Self {
        self.payload.war_stars = Some(value);
        self
    }

    pub fn clan(mut self, tag: &str) -> Self {
        self.payload.clan = Some(ClanPayload {
            tag: Some(tag.to_string()),
            name: Some("Other Clan".to_string()),
        });
        self
    }

    /// Drops the player name, which snapshots require
    pub fn without_name(mut self) -> Self {
        self.payload.name = None;
        self
    }

    pub fn build(self) -> PlayerPayload {
        self.payload
    }
}
