use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::shared::AppError;
use crate::snapshot::normalize_tag;

/// Read side of passport bindings: which subject owns a player tag and
/// which tags are tracked. Binding itself is managed by the chat layer.
#[async_trait]
pub trait PassportDirectory: Send + Sync {
    async fn subject_for_player(&self, player_tag: &str) -> Result<Option<String>, AppError>;

    /// Every tracked player tag, sorted
    async fn tracked_players(&self) -> Result<Vec<String>, AppError>;
}

/// In-memory directory for development and tests
pub struct InMemoryPassportDirectory {
    player_to_subject: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryPassportDirectory {
    pub fn new() -> Self {
        Self {
            player_to_subject: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Binds a player tag to a subject, replacing an earlier binding
    pub async fn bind(&self, player_tag: &str, subject_id: &str) -> Option<String> {
        let tag = normalize_tag(player_tag);
        let mut bindings = self.player_to_subject.write().await;
        let previous = bindings.insert(tag.clone(), subject_id.to_string());

        info!(
            player_tag = %tag,
            subject_id = %subject_id,
            previous = ?previous,
            "Bound player to subject"
        );
        previous
    }

    pub async fn unbind(&self, player_tag: &str) -> bool {
        let tag = normalize_tag(player_tag);
        let removed = self.player_to_subject.write().await.remove(&tag).is_some();

        if removed {
            info!(player_tag = %tag, "Unbound player");
        } else {
            warn!(player_tag = %tag, "Attempted to unbind unknown player");
        }
        removed
    }
}

impl Default for InMemoryPassportDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PassportDirectory for InMemoryPassportDirectory {
    async fn subject_for_player(&self, player_tag: &str) -> Result<Option<String>, AppError> {
        let bindings = self.player_to_subject.read().await;
        let subject = bindings.get(&normalize_tag(player_tag)).cloned();

        debug!(player_tag = %player_tag, subject_id = ?subject, "Player to subject lookup");
        Ok(subject)
    }

    async fn tracked_players(&self) -> Result<Vec<String>, AppError> {
        let bindings = self.player_to_subject.read().await;
        let mut tags: Vec<String> = bindings.keys().cloned().collect();
        tags.sort();
        Ok(tags)
    }
}

/// PostgreSQL directory over the `player_bindings` table
pub struct PostgresPassportDirectory {
    pool: PgPool,
}

impl PostgresPassportDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PassportDirectory for PostgresPassportDirectory {
    #[instrument(skip(self))]
    async fn subject_for_player(&self, player_tag: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT subject_id FROM player_bindings WHERE player_tag = $1")
            .bind(normalize_tag(player_tag))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to look up player binding");
                AppError::DatabaseError(e.to_string())
            })?;

        Ok(row.map(|row| row.get("subject_id")))
    }

    #[instrument(skip(self))]
    async fn tracked_players(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query("SELECT player_tag FROM player_bindings ORDER BY player_tag")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("player_tag")).collect())
    }
}
