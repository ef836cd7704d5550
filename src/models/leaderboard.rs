//! Leaderboard cache records and ranked rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GameMode, GameResult, PaginationMeta, PlayerId, PlayerSummary};

/// A player's current best result, denormalized for ranked reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Unique key: one entry per player
    pub player_id: PlayerId,

    pub best_score: u64,

    /// Level reached in the best game
    pub level: u32,

    pub lines_cleared: u64,

    pub game_mode: GameMode,

    /// When the best score was set; earlier ranks higher on ties
    pub achieved_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl LeaderboardEntry {
    /// Build the entry for a result that set a new personal best.
    pub fn from_result(result: &GameResult, now: DateTime<Utc>) -> Self {
        Self {
            player_id: result.player_id.clone(),
            best_score: result.score,
            level: result.level,
            lines_cleared: result.lines_cleared,
            game_mode: result.game_mode,
            achieved_at: now,
            updated_at: now,
        }
    }
}

/// One ranked row of a Top-N answer.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    /// 1-based rank within the queried partition
    pub rank: u64,
    pub player: PlayerSummary,
    pub best_score: u64,
    pub level: u32,
    pub lines_cleared: u64,
    pub game_mode: GameMode,
    pub achieved_at: DateTime<Utc>,

    /// Results inside the window (windowed queries only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub games_in_window: Option<u64>,
}

/// One page of a Top-N answer.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardPage {
    pub partition: String,
    pub rows: Vec<LeaderboardRow>,
    pub pagination: PaginationMeta,
}

/// A player's position inside a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRank {
    pub player_id: PlayerId,
    pub partition: String,
    /// 1-based
    pub rank: u64,
    pub best_score: u64,
    /// Ranked players in the partition
    pub total_ranked: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultSubmission;

    #[test]
    fn test_entry_from_result() {
        let validated = ResultSubmission::new(4200, 7, 40, 300)
            .with_mode(GameMode::Ultra)
            .validate()
            .unwrap();
        let created = Utc::now();
        let result = GameResult::new(PlayerId::from("p1"), validated, created);

        let entry = LeaderboardEntry::from_result(&result, created);
        assert_eq!(entry.player_id, PlayerId::from("p1"));
        assert_eq!(entry.best_score, 4200);
        assert_eq!(entry.level, 7);
        assert_eq!(entry.lines_cleared, 40);
        assert_eq!(entry.game_mode, GameMode::Ultra);
        assert_eq!(entry.achieved_at, created);
    }
}
