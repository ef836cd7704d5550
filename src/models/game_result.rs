//! Game result model: one immutable record of a completed match.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{PlayerId, ResultId};
use crate::calculate::calculate_pieces_per_minute;

/// Game mode a result was played in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Classic,
    Sprint,
    Ultra,
    Zen,
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameMode::Classic => write!(f, "classic"),
            GameMode::Sprint => write!(f, "sprint"),
            GameMode::Ultra => write!(f, "ultra"),
            GameMode::Zen => write!(f, "zen"),
        }
    }
}

/// Difficulty setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
    Expert,
}

/// Line clears broken down by size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineClears {
    pub single: u32,
    pub double: u32,
    pub triple: u32,
    pub tetris: u32,
}

/// Combo counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Combos {
    pub max_combo: u32,
    pub total_combos: u32,
}

/// Detailed per-game statistics reported by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailedStats {
    pub total_pieces: u32,

    /// Derived at write time from `total_pieces` and the time played
    pub pieces_per_minute: u32,

    pub perfect_clears: u32,
    pub t_spins: u32,
    pub combos: Combos,
    pub line_clears: LineClears,
}

/// A submitted field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// A game result as submitted, before validation.
///
/// The headline counters are signed so out-of-range input can be
/// reported instead of failing to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSubmission {
    pub score: i64,
    pub level: i64,
    pub lines_cleared: i64,
    /// Seconds
    pub time_played: i64,
    #[serde(default)]
    pub game_mode: GameMode,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub stats: DetailedStats,
    #[serde(default)]
    pub won: bool,
}

impl ResultSubmission {
    pub fn new(score: i64, level: i64, lines_cleared: i64, time_played: i64) -> Self {
        Self {
            score,
            level,
            lines_cleared,
            time_played,
            game_mode: GameMode::default(),
            difficulty: Difficulty::default(),
            stats: DetailedStats::default(),
            won: false,
        }
    }

    pub fn with_mode(mut self, game_mode: GameMode) -> Self {
        self.game_mode = game_mode;
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_stats(mut self, stats: DetailedStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_outcome(mut self, won: bool) -> Self {
        self.won = won;
        self
    }

    /// Check ranges and convert into unsigned counters.
    pub fn validate(self) -> Result<ValidatedResult, ValidationError> {
        let score = non_negative("score", self.score)?;
        let lines_cleared = non_negative("lines_cleared", self.lines_cleared)?;
        let time_played = non_negative("time_played", self.time_played)?;

        if self.level < 1 {
            return Err(ValidationError::new(
                "level",
                format!("must be at least 1, got {}", self.level),
            ));
        }
        let level = u32::try_from(self.level)
            .map_err(|_| ValidationError::new("level", format!("out of range: {}", self.level)))?;

        Ok(ValidatedResult {
            score,
            level,
            lines_cleared,
            time_played,
            game_mode: self.game_mode,
            difficulty: self.difficulty,
            stats: self.stats,
            won: self.won,
        })
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<u64, ValidationError> {
    u64::try_from(value)
        .map_err(|_| ValidationError::new(field, format!("must not be negative, got {}", value)))
}

/// A submission whose fields passed range checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedResult {
    pub score: u64,
    pub level: u32,
    pub lines_cleared: u64,
    pub time_played: u64,
    pub game_mode: GameMode,
    pub difficulty: Difficulty,
    pub stats: DetailedStats,
    pub won: bool,
}

/// One recorded game. Never mutated once it is in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub id: ResultId,

    pub player_id: PlayerId,

    pub score: u64,

    /// Level reached (1-based)
    pub level: u32,

    pub lines_cleared: u64,

    /// Seconds
    pub time_played: u64,

    pub game_mode: GameMode,

    pub difficulty: Difficulty,

    pub stats: DetailedStats,

    /// Outcome flag supplied by the caller
    pub won: bool,

    /// Set when this result strictly beat the player's previous best
    pub is_personal_best: bool,

    pub created_at: DateTime<Utc>,
}

impl GameResult {
    /// Create a new result with a fresh ID and derived pieces-per-minute.
    pub fn new(player_id: PlayerId, validated: ValidatedResult, created_at: DateTime<Utc>) -> Self {
        let mut stats = validated.stats;
        stats.pieces_per_minute =
            calculate_pieces_per_minute(stats.total_pieces as u64, validated.time_played);

        Self {
            id: ResultId::new(),
            player_id,
            score: validated.score,
            level: validated.level,
            lines_cleared: validated.lines_cleared,
            time_played: validated.time_played,
            game_mode: validated.game_mode,
            difficulty: validated.difficulty,
            stats,
            won: validated.won,
            is_personal_best: false,
            created_at,
        }
    }

    /// Builder method to flag the result as a personal best.
    pub fn as_personal_best(mut self, is_personal_best: bool) -> Self {
        self.is_personal_best = is_personal_best;
        self
    }
}
