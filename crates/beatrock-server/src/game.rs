//! Request-level game operations.
//!
//! [`GameService`] is what a router calls. It loads the session, screens the
//! guess, obtains a verdict (cache first, judge on a miss), updates counters,
//! persists the session and hands finished games to the archive.

use std::sync::Arc;

use beatrock_core::{CounterKey, Persona, Screening, SessionRecord, VerdictKey};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::archive::{FinishedGame, GameArchive};
use crate::cache::{CacheFacade, SessionStore};
use crate::clock::SharedClock;
use crate::config::GameConfig;
use crate::error::GameError;
use crate::judge::{Judge, Verdict};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStart {
    pub session_id: Uuid,
    pub word: String,
    pub message: String,
    pub persona: Persona,
    pub word_count_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuessOutcome {
    pub valid: bool,
    pub message: String,
    /// The new current word, when the guess was accepted.
    pub new_word: Option<String>,
    pub score: u32,
    /// The most recent words, oldest first.
    pub history: Vec<String>,
    /// Times the current word has been played, across all games.
    pub global_count: u64,
    pub game_over: bool,
    pub word_count_message: String,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameHistory {
    pub history: Vec<String>,
    pub score: u32,
    pub game_over: bool,
}

pub struct GameService {
    sessions: SessionStore,
    cache: CacheFacade,
    judge: Arc<dyn Judge>,
    archive: Arc<dyn GameArchive>,
    config: GameConfig,
    clock: SharedClock,
}

impl GameService {
    pub fn new(
        sessions: SessionStore,
        cache: CacheFacade,
        judge: Arc<dyn Judge>,
        archive: Arc<dyn GameArchive>,
        config: GameConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            sessions,
            cache,
            judge,
            archive,
            config,
            clock,
        }
    }

    pub async fn start_game(&self, persona: Option<&str>) -> GameStart {
        let persona = persona.map(Persona::from_id).unwrap_or_default();
        let word = self.config.initial_word.clone();
        let record = SessionRecord::new(&word, persona.id());
        let session_id = self.sessions.create(&record).await;
        let count = self.cache.get_count(&CounterKey::word(&word)).await;

        tracing::info!(session_id = %session_id, persona = %persona, "game started");
        GameStart {
            session_id,
            message: format!("Game started! What beats {word}?"),
            word_count_message: word_count_message(&word, count),
            word,
            persona,
        }
    }

    pub async fn guess(&self, session_id: Uuid, guess: &str) -> Result<GuessOutcome, GameError> {
        let mut record = self
            .sessions
            .load(session_id)
            .await
            .ok_or(GameError::SessionNotFound(session_id))?;

        let guess = guess.trim();
        if guess.is_empty() {
            return Err(GameError::EmptyGuess);
        }

        let was_over = record.game_over;
        let beaten = record.current_word.clone();
        let result = match record.screen_guess(guess) {
            Screening::Settled(result) => result,
            Screening::NeedsVerdict => {
                let persona = Persona::from_id(&record.persona);
                let beats = self.verdict(&beaten, guess, persona).await;
                let feedback = self.judge.explain(&beaten, guess, beats, persona).await;
                record.apply_verdict(guess, beats, feedback)
            }
        };

        // A finished game is never written again.
        if !was_over {
            self.sessions.save(session_id, &record).await;
        }

        if result.valid {
            self.cache.increment(&CounterKey::word(guess)).await;
            self.cache.increment(&CounterKey::pair(&beaten, guess)).await;
        }
        let global_count = self
            .cache
            .get_count(&CounterKey::word(&record.current_word))
            .await;

        if !was_over && record.game_over {
            self.archive(session_id, &record).await;
        }

        tracing::debug!(
            session_id = %session_id,
            guess = %guess,
            valid = result.valid,
            score = record.score,
            game_over = record.game_over,
            "guess processed"
        );

        Ok(GuessOutcome {
            valid: result.valid,
            message: result.message,
            new_word: result.valid.then(|| record.current_word.clone()),
            score: record.score,
            history: record
                .recent_history(self.config.recent_history)
                .to_vec(),
            global_count,
            game_over: record.game_over,
            word_count_message: word_count_message(&record.current_word, global_count),
            feedback: result.feedback,
        })
    }

    pub async fn history(&self, session_id: Uuid) -> Result<GameHistory, GameError> {
        let record = self
            .sessions
            .load(session_id)
            .await
            .ok_or(GameError::SessionNotFound(session_id))?;
        Ok(GameHistory {
            history: record.history,
            score: record.score,
            game_over: record.game_over,
        })
    }

    pub async fn word_count(&self, word: &str) -> u64 {
        self.cache.get_count(&CounterKey::word(word)).await
    }

    /// How often `beater` has been accepted against `beaten`.
    pub async fn pair_count(&self, beaten: &str, beater: &str) -> u64 {
        self.cache.get_count(&CounterKey::pair(beaten, beater)).await
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.active_count().await
    }

    pub async fn end_session(&self, session_id: Uuid) -> bool {
        self.sessions.delete(session_id).await
    }

    async fn verdict(&self, subject: &str, challenger: &str, persona: Persona) -> bool {
        let key = VerdictKey::new(subject, challenger);
        if let Some(beats) = self.cache.get_verdict(&key).await {
            tracing::debug!(key = %key, beats, "verdict cache hit");
            return beats;
        }
        match self.judge.evaluate(subject, challenger, persona).await {
            Verdict::Judged(beats) => {
                self.cache.save_verdict(&key, beats).await;
                beats
            }
            Verdict::Defaulted => {
                tracing::warn!(key = %key, "no verdict obtained, counting as a loss");
                false
            }
        }
    }

    async fn archive(&self, session_id: Uuid, record: &SessionRecord) {
        let nanos = i128::from(self.clock.epoch_millis()) * 1_000_000;
        let finished_at =
            OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH);
        let game = FinishedGame {
            session_id,
            score: record.score,
            history: record.history.clone(),
            persona: record.persona.clone(),
            finished_at,
        };
        self.archive.record(&game).await;
    }
}

fn word_count_message(word: &str, count: u64) -> String {
    format!("{word} → {count} total guesses so far")
}
