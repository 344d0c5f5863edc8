use chrono::{FixedOffset, Offset, Utc};
use std::env;
use std::time::Duration;

use crate::shared::AppError;

pub const DEFAULT_API_BASE_URL: &str = "https://api.clashofclans.com/v1";

/// Up to ten numbered tokens are read: CLASH_TOKEN, CLASH_TOKEN_2 .. CLASH_TOKEN_10
const MAX_NUMBERED_TOKENS: usize = 10;

#[derive(Clone, Debug)]
pub struct Config {
    pub http_port: u16,
    pub database_url: Option<String>,
    pub clash: ClashApiConfig,
    pub ingest: IngestConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Clone, Debug)]
pub struct ClashApiConfig {
    pub base_url: String,
    pub tokens: Vec<String>,
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct IngestConfig {
    /// Number of players fetched concurrently
    pub concurrency: usize,
    /// Attempts per player for retryable failures (first try included)
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts
    pub base_backoff: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    /// Offset used to decide which calendar day a snapshot belongs to
    pub day_offset: FixedOffset,
    pub snapshot_retention_days: u32,
    /// How long after local midnight delta computation runs
    pub delta_delay: Duration,
    /// How long after local midnight period rollups run
    pub rollup_delay: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            day_offset: moscow_offset(),
            snapshot_retention_days: 30,
            delta_delay: Duration::from_secs(30 * 60),
            rollup_delay: Duration::from_secs(60 * 60),
        }
    }
}

fn moscow_offset() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).unwrap_or_else(utc)
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let day_offset_hours: i32 = env_or_parse("DAY_OFFSET_HOURS", 3);
        let day_offset = FixedOffset::east_opt(day_offset_hours * 3600).unwrap_or_else(utc);

        Self {
            http_port: env_or_parse("HTTP_PORT", 3000),
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            clash: ClashApiConfig {
                base_url: env_or("CLASH_API_BASE_URL", DEFAULT_API_BASE_URL),
                tokens: collect_tokens(|key| env::var(key).ok()),
                rate_limit: env_or_parse("CLASH_RATE_LIMIT", 35),
                rate_window: Duration::from_millis(env_or_parse("CLASH_RATE_WINDOW_MS", 1000)),
                request_timeout: Duration::from_secs(env_or_parse(
                    "CLASH_REQUEST_TIMEOUT_SECS",
                    30,
                )),
                connect_timeout: Duration::from_secs(env_or_parse(
                    "CLASH_CONNECT_TIMEOUT_SECS",
                    10,
                )),
            },
            ingest: IngestConfig {
                concurrency: env_or_parse("INGEST_CONCURRENCY", 8).max(1),
                max_attempts: env_or_parse("INGEST_MAX_ATTEMPTS", 3).max(1),
                base_backoff: Duration::from_millis(env_or_parse("INGEST_BACKOFF_MS", 500)),
            },
            schedule: ScheduleConfig {
                day_offset,
                snapshot_retention_days: env_or_parse("SNAPSHOT_RETENTION_DAYS", 30),
                delta_delay: Duration::from_secs(60 * env_or_parse("DELTA_DELAY_MINUTES", 30)),
                rollup_delay: Duration::from_secs(60 * env_or_parse("ROLLUP_DELAY_MINUTES", 60)),
            },
        }
    }

    /// The HTTP game client cannot run without at least one credential
    pub fn require_tokens(&self) -> Result<&[String], AppError> {
        if self.clash.tokens.is_empty() {
            return Err(AppError::Validation(
                "set CLASH_TOKEN or CLASH_TOKENS (comma separated)".to_string(),
            ));
        }
        Ok(&self.clash.tokens)
    }
}

/// Numbered tokens first, then the comma separated list, without duplicates
fn collect_tokens(lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();

    for i in 1..=MAX_NUMBERED_TOKENS {
        let key = if i == 1 {
            "CLASH_TOKEN".to_string()
        } else {
            format!("CLASH_TOKEN_{}", i)
        };
        if let Some(token) = lookup(&key).map(|t| t.trim().to_string()) {
            if !token.is_empty() && !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }

    if let Some(list) = lookup("CLASH_TOKENS") {
        for token in list.split(',').map(str::trim) {
            if !token.is_empty() && !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }
    }

    tokens
}
