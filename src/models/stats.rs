//! Derived statistics models.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use super::{GameMode, GameResult, LineClears, PlayerId, PlayerSummary};

/// Reporting period for statistics, counted back from "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatsPeriod {
    #[default]
    All,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl StatsPeriod {
    /// Start of the period ending at `now`; `None` for all time.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            StatsPeriod::All => None,
            StatsPeriod::Daily => Some(now - Duration::days(1)),
            StatsPeriod::Weekly => Some(now - Duration::days(7)),
            StatsPeriod::Monthly => now.checked_sub_months(Months::new(1)),
            StatsPeriod::Yearly => now.checked_sub_months(Months::new(12)),
        }
    }
}

impl std::fmt::Display for StatsPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsPeriod::All => write!(f, "all"),
            StatsPeriod::Daily => write!(f, "daily"),
            StatsPeriod::Weekly => write!(f, "weekly"),
            StatsPeriod::Monthly => write!(f, "monthly"),
            StatsPeriod::Yearly => write!(f, "yearly"),
        }
    }
}

/// Game counts per mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeCounts {
    pub classic: u64,
    pub sprint: u64,
    pub ultra: u64,
    pub zen: u64,
}

impl ModeCounts {
    pub fn record(&mut self, mode: GameMode) {
        match mode {
            GameMode::Classic => self.classic += 1,
            GameMode::Sprint => self.sprint += 1,
            GameMode::Ultra => self.ultra += 1,
            GameMode::Zen => self.zen += 1,
        }
    }
}

/// Line clears summed over many games.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineClearTotals {
    pub single: u64,
    pub double: u64,
    pub triple: u64,
    pub tetris: u64,
}

impl LineClearTotals {
    pub fn add(&mut self, clears: &LineClears) {
        self.single += clears.single as u64;
        self.double += clears.double as u64;
        self.triple += clears.triple as u64;
        self.tetris += clears.tetris as u64;
    }

    pub fn weighted_total(&self) -> u64 {
        self.tetris * 4 + self.triple * 3 + self.double * 2 + self.single
    }
}

/// One point of a player's score history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorePoint {
    pub date: DateTime<Utc>,
    pub score: u64,
    pub level: u32,
    pub game_mode: GameMode,
}

/// A player's statistics over a period, computed from the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStatsReport {
    pub player_id: PlayerId,
    pub period: StatsPeriod,

    pub total_games: u64,
    pub total_score: u64,
    pub best_score: u64,
    pub average_score: u64,
    pub total_lines_cleared: u64,
    pub total_time_played: u64,
    pub average_time_played: u64,

    pub games_by_mode: ModeCounts,

    pub total_pieces: u64,
    pub total_t_spins: u64,
    pub total_perfect_clears: u64,
    pub max_combo: u32,
    pub line_clears: LineClearTotals,

    /// Weighted line-clear efficiency, percent
    pub efficiency: u32,
    pub pieces_per_minute: u32,

    /// Most recent results, oldest first
    pub score_history: Vec<ScorePoint>,

    /// Latest personal-best results, newest first (not period-filtered)
    pub personal_bests: Vec<GameResult>,

    /// Latest results in the period, newest first
    pub recent_games: Vec<GameResult>,
}

/// A single high-scoring result in the global report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopScore {
    pub player_id: PlayerId,
    pub score: u64,
    pub level: u32,
    pub lines_cleared: u64,
    pub time_played: u64,
    pub game_mode: GameMode,
    pub created_at: DateTime<Utc>,
}

impl From<&GameResult> for TopScore {
    fn from(result: &GameResult) -> Self {
        Self {
            player_id: result.player_id.clone(),
            score: result.score,
            level: result.level,
            lines_cleared: result.lines_cleared,
            time_played: result.time_played,
            game_mode: result.game_mode,
            created_at: result.created_at,
        }
    }
}

/// Game-wide statistics over a period.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStatsReport {
    pub period: StatsPeriod,

    /// Players with at least one result in the period
    pub total_players: u64,
    pub total_games: u64,
    pub total_score: u64,
    pub average_score: u64,
    pub best_score: u64,
    pub total_lines_cleared: u64,
    pub total_time_played: u64,
    pub average_time_played: u64,
    pub pieces_per_minute: u32,

    pub games_by_mode: ModeCounts,

    pub top_scores: Vec<TopScore>,
}

/// Lifetime totals for one side of a player comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonStats {
    pub total_games: u64,
    pub best_score: u64,
    pub average_score: u64,
    pub total_lines_cleared: u64,
    pub total_time_played: u64,
    pub total_pieces: u64,
    pub total_t_spins: u64,
    pub max_combo: u32,
    pub pieces_per_minute: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparedPlayer {
    pub player: PlayerSummary,
    pub stats: ComparisonStats,
}

/// Two players side by side, in the order they were asked for.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerComparison {
    pub players: Vec<ComparedPlayer>,
}

/// Profile count and mean ranking points for one country.
///
/// `country` is `None` for players whose profile carries no country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryStats {
    pub country: Option<String>,
    pub players: u64,
    pub average_ranking_points: i64,
}

/// Headline numbers for the leaderboard page.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardStats {
    /// Known player profiles
    pub total_players: u64,
    /// Players with a leaderboard entry
    pub total_ranked: u64,
    pub global: GlobalStatsReport,
    /// Largest countries first
    pub countries: Vec<CountryStats>,
}
