//! Statistics calculation engine.
//!
//! Pure arithmetic shared by ingestion and the statistics reports:
//! - Rounded averages and win rates for player aggregates
//! - Pieces per minute and line-clear efficiency
//! - Period reports over ledger scans (see [`report`])

pub mod report;

/// Integer ratio rounded half up, `0` when the denominator is zero.
pub fn rounded_ratio(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    let n = numerator as u128;
    let d = denominator as u128;
    ((2 * n + d) / (2 * d)) as u64
}

/// Average score over `total_games`, rounded to the nearest integer.
pub fn calculate_average_score(total_score: u64, total_games: u64) -> u64 {
    rounded_ratio(total_score, total_games)
}

/// Win rate as a whole percentage (0..=100).
pub fn calculate_win_rate(wins: u64, total_games: u64) -> u32 {
    rounded_ratio(wins.saturating_mul(100), total_games) as u32
}

/// Pieces placed per minute of play.
pub fn calculate_pieces_per_minute(total_pieces: u64, seconds_played: u64) -> u32 {
    if seconds_played == 0 {
        return 0;
    }
    rounded_ratio(total_pieces.saturating_mul(60), seconds_played) as u32
}

/// Weighted line-clear efficiency as a percentage of lines cleared.
///
/// `weighted_lines` counts a tetris as 4, a triple 3, a double 2 and a single 1.
pub fn calculate_efficiency(weighted_lines: u64, total_lines: u64) -> u32 {
    rounded_ratio(weighted_lines.saturating_mul(100), total_lines) as u32
}
