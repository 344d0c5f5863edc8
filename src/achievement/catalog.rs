use super::models::{AchievementCategory as Category, AchievementDefinition};
use crate::activity::CounterField as Field;

type Row = (&'static str, &'static str, Category, Field, u64, u32);

const STANDARD: &[Row] = &[
    // activity
    ("first_message", "First Words", Category::Activity, Field::TotalMessages, 1, 10),
    ("chatterbox", "Chatterbox", Category::Activity, Field::TotalMessages, 100, 25),
    (
        "voice_of_the_clan",
        "Voice of the Clan",
        Category::Activity,
        Field::TotalMessages,
        1_000,
        100,
    ),
    ("week_streak", "Week Warrior", Category::Activity, Field::BestStreak, 7, 50),
    ("month_streak", "Unstoppable", Category::Activity, Field::BestStreak, 30, 200),
    // social
    ("helping_hand", "Helping Hand", Category::Social, Field::HelpfulActions, 10, 30),
    ("generous", "Generous Soul", Category::Social, Field::DonationsMade, 1_000, 40),
    ("philanthropist", "Philanthropist", Category::Social, Field::DonationsMade, 10_000, 150),
    // game
    ("gold_digger", "Gold Digger", Category::Game, Field::GoldFarmed, 1_000_000, 20),
    ("gold_baron", "Gold Baron", Category::Game, Field::GoldFarmed, 10_000_000, 75),
    ("gold_tycoon", "Gold Tycoon", Category::Game, Field::GoldFarmed, 100_000_000, 250),
    ("elixir_collector", "Elixir Collector", Category::Game, Field::ElixirFarmed, 1_000_000, 20),
    ("elixir_alchemist", "Elixir Alchemist", Category::Game, Field::ElixirFarmed, 10_000_000, 75),
    ("dark_harvester", "Dark Harvester", Category::Game, Field::DarkElixirFarmed, 100_000, 50),
    ("capital_builder", "Capital Builder", Category::Game, Field::CapitalGoldFarmed, 50_000, 50),
    ("demolisher", "Demolisher", Category::Game, Field::BuildingsDestroyed, 500, 60),
    ("war_veteran", "War Veteran", Category::Game, Field::WarsParticipated, 10, 80),
    // quality
    ("mentor", "Mentor", Category::Quality, Field::HelpfulActions, 100, 120),
    // special
    ("legend", "Legend", Category::Special, Field::BestStreak, 100, 500),
];

/// Set of achievement definitions, unique by key
#[derive(Debug, Clone, Default)]
pub struct AchievementCatalog {
    definitions: Vec<AchievementDefinition>,
}

impl AchievementCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let catalog = STANDARD.iter().fold(
            Self::empty(),
            |catalog, &(key, name, category, counter, threshold, points)| {
                catalog.with_definition(AchievementDefinition::new(
                    key, name, category, counter, threshold, points,
                ))
            },
        );
        // retired, kept so existing awards still resolve
        catalog.with_definition(
            AchievementDefinition::new(
                "founder",
                "Founder",
                Category::Special,
                Field::TotalMessages,
                1,
                300,
            )
            .inactive(),
        )
    }

    /// Adds a definition, replacing one with the same key
    pub fn with_definition(mut self, definition: AchievementDefinition) -> Self {
        match self.definitions.iter_mut().find(|d| d.key == definition.key) {
            Some(existing) => *existing = definition,
            None => self.definitions.push(definition),
        }
        self
    }

    pub fn all(&self) -> &[AchievementDefinition] {
        &self.definitions
    }

    pub fn active(&self) -> impl Iterator<Item = &AchievementDefinition> {
        self.definitions.iter().filter(|d| d.active)
    }

    pub fn get(&self, key: &str) -> Option<&AchievementDefinition> {
        self.definitions.iter().find(|d| d.key == key)
    }
}
