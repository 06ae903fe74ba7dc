//! Archival of finished games.

use async_trait::async_trait;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// A game that has just ended.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedGame {
    pub session_id: Uuid,
    pub score: u32,
    pub history: Vec<String>,
    pub persona: String,
    pub finished_at: OffsetDateTime,
}

/// Receives every game once, when it transitions to game over.
#[async_trait]
pub trait GameArchive: Send + Sync {
    async fn record(&self, game: &FinishedGame);
}

/// Writes finished games to the log as structured records.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogArchive;

#[async_trait]
impl GameArchive for LogArchive {
    async fn record(&self, game: &FinishedGame) {
        let history = serde_json::to_string(&game.history).unwrap_or_default();
        let finished_at = game.finished_at.format(&Rfc3339).unwrap_or_default();
        tracing::info!(
            target: "beatrock::archive",
            session_id = %game.session_id,
            score = game.score,
            persona = %game.persona,
            moves = game.history.len(),
            history = %history,
            finished_at = %finished_at,
            "game archived"
        );
    }
}
