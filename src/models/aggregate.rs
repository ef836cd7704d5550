//! Lifetime per-player rollup.

use serde::{Deserialize, Serialize};

use super::GameResult;
use crate::calculate::{calculate_average_score, calculate_win_rate};

/// Rolling lifetime summary of all of a player's results.
///
/// `best_score` always equals the maximum score in the player's ledger
/// history; it only moves through [`PlayerAggregate::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAggregate {
    pub total_games: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    pub best_score: u64,
    pub total_score: u64,
    pub total_lines_cleared: u64,
    /// Seconds
    pub total_time_played: u64,

    /// round(total_score / total_games)
    pub average_score: u64,

    /// round(100 * total_wins / total_games)
    pub win_rate: u32,
}

impl PlayerAggregate {
    /// Whether `score` would set a new personal best.
    ///
    /// Strictly greater only: a tie with the current best is not a new best.
    /// A player's first result is always a new best.
    pub fn is_new_best(&self, score: u64) -> bool {
        self.total_games == 0 || score > self.best_score
    }

    /// Fold one result into the counters and recompute derived fields.
    pub fn apply(&mut self, result: &GameResult) {
        self.total_games = self.total_games.saturating_add(1);
        self.total_score = self.total_score.saturating_add(result.score);
        self.total_lines_cleared = self.total_lines_cleared.saturating_add(result.lines_cleared);
        self.total_time_played = self.total_time_played.saturating_add(result.time_played);

        if result.won {
            self.total_wins += 1;
        } else {
            self.total_losses += 1;
        }

        if result.is_personal_best {
            self.best_score = result.score;
        }

        self.average_score = calculate_average_score(self.total_score, self.total_games);
        self.win_rate = calculate_win_rate(self.total_wins, self.total_games);
    }
}
