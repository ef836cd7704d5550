//! Period statistics reports built from ledger scans.

use std::collections::{BTreeMap, HashSet};

use crate::models::{
    ComparisonStats, CountryStats, GameResult, GlobalStatsReport, LineClearTotals, ModeCounts,
    PlayerId, PlayerProfile, PlayerStatsReport, ScorePoint, StatsPeriod, TopScore,
};

use super::{
    calculate_average_score, calculate_efficiency, calculate_pieces_per_minute, rounded_ratio,
};

/// How many results the score history covers.
pub const SCORE_HISTORY_LEN: usize = 30;

/// How many recent games and personal bests a player report lists.
pub const RECENT_LEN: usize = 10;

/// How many individual results the global report lists.
pub const TOP_SCORES_LEN: usize = 10;

/// How many countries the leaderboard breakdown lists.
pub const COUNTRY_STATS_LEN: usize = 10;

/// Build a player's report.
///
/// Totals saturate at `u64::MAX`, as the aggregates do.
///
/// `results` are the player's results inside the period, newest first.
/// `personal_bests` are the player's personal-best results, newest first.
pub fn player_report(
    player_id: PlayerId,
    period: StatsPeriod,
    results: &[GameResult],
    personal_bests: Vec<GameResult>,
) -> PlayerStatsReport {
    let mut total_score = 0u64;
    let mut best_score = 0u64;
    let mut total_lines = 0u64;
    let mut total_time = 0u64;
    let mut total_pieces = 0u64;
    let mut total_t_spins = 0u64;
    let mut total_perfect_clears = 0u64;
    let mut max_combo = 0u32;
    let mut modes = ModeCounts::default();
    let mut line_clears = LineClearTotals::default();

    for result in results {
        total_score = total_score.saturating_add(result.score);
        best_score = best_score.max(result.score);
        total_lines = total_lines.saturating_add(result.lines_cleared);
        total_time = total_time.saturating_add(result.time_played);
        total_pieces = total_pieces.saturating_add(result.stats.total_pieces as u64);
        total_t_spins = total_t_spins.saturating_add(result.stats.t_spins as u64);
        total_perfect_clears =
            total_perfect_clears.saturating_add(result.stats.perfect_clears as u64);
        max_combo = max_combo.max(result.stats.combos.max_combo);
        modes.record(result.game_mode);
        line_clears.add(&result.stats.line_clears);
    }

    let total_games = results.len() as u64;

    let score_history = results
        .iter()
        .take(SCORE_HISTORY_LEN)
        .rev()
        .map(|r| ScorePoint {
            date: r.created_at,
            score: r.score,
            level: r.level,
            game_mode: r.game_mode,
        })
        .collect();

    PlayerStatsReport {
        player_id,
        period,
        total_games,
        total_score,
        best_score,
        average_score: calculate_average_score(total_score, total_games),
        total_lines_cleared: total_lines,
        total_time_played: total_time,
        average_time_played: rounded_ratio(total_time, total_games),
        games_by_mode: modes,
        total_pieces,
        total_t_spins,
        total_perfect_clears,
        max_combo,
        efficiency: calculate_efficiency(line_clears.weighted_total(), total_lines),
        line_clears,
        pieces_per_minute: calculate_pieces_per_minute(total_pieces, total_time),
        score_history,
        personal_bests: personal_bests.into_iter().take(RECENT_LEN).collect(),
        recent_games: results.iter().take(RECENT_LEN).cloned().collect(),
    }
}

/// Build the game-wide report from every result in the period.
pub fn global_report(period: StatsPeriod, results: &[GameResult]) -> GlobalStatsReport {
    let mut players = HashSet::new();
    let mut total_score = 0u64;
    let mut best_score = 0u64;
    let mut total_lines = 0u64;
    let mut total_time = 0u64;
    let mut total_pieces = 0u64;
    let mut modes = ModeCounts::default();

    for result in results {
        players.insert(&result.player_id);
        total_score = total_score.saturating_add(result.score);
        best_score = best_score.max(result.score);
        total_lines = total_lines.saturating_add(result.lines_cleared);
        total_time = total_time.saturating_add(result.time_played);
        total_pieces = total_pieces.saturating_add(result.stats.total_pieces as u64);
        modes.record(result.game_mode);
    }

    let total_games = results.len() as u64;

    let mut ranked: Vec<&GameResult> = results.iter().collect();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });

    GlobalStatsReport {
        period,
        total_players: players.len() as u64,
        total_games,
        total_score,
        average_score: calculate_average_score(total_score, total_games),
        best_score,
        total_lines_cleared: total_lines,
        total_time_played: total_time,
        average_time_played: rounded_ratio(total_time, total_games),
        pieces_per_minute: calculate_pieces_per_minute(total_pieces, total_time),
        games_by_mode: modes,
        top_scores: ranked
            .into_iter()
            .take(TOP_SCORES_LEN)
            .map(TopScore::from)
            .collect(),
    }
}

/// Lifetime totals over all of one player's results.
pub fn comparison_stats(results: &[GameResult]) -> ComparisonStats {
    let mut stats = ComparisonStats {
        total_games: results.len() as u64,
        ..ComparisonStats::default()
    };
    let mut total_score = 0u64;

    for result in results {
        total_score = total_score.saturating_add(result.score);
        stats.best_score = stats.best_score.max(result.score);
        stats.total_lines_cleared = stats.total_lines_cleared.saturating_add(result.lines_cleared);
        stats.total_time_played = stats.total_time_played.saturating_add(result.time_played);
        stats.total_pieces = stats
            .total_pieces
            .saturating_add(result.stats.total_pieces as u64);
        stats.total_t_spins = stats.total_t_spins.saturating_add(result.stats.t_spins as u64);
        stats.max_combo = stats.max_combo.max(result.stats.combos.max_combo);
    }

    stats.average_score = calculate_average_score(total_score, stats.total_games);
    stats.pieces_per_minute =
        calculate_pieces_per_minute(stats.total_pieces, stats.total_time_played);
    stats
}

/// Group profiles by country, largest groups first, ties by country code.
pub fn country_breakdown(profiles: &[PlayerProfile], limit: usize) -> Vec<CountryStats> {
    let mut groups: BTreeMap<Option<&str>, (u64, i128)> = BTreeMap::new();
    for profile in profiles {
        let group = groups.entry(profile.country.as_deref()).or_default();
        group.0 += 1;
        group.1 += profile.ranking_points as i128;
    }

    let mut countries: Vec<CountryStats> = groups
        .into_iter()
        .map(|(country, (players, points))| CountryStats {
            country: country.map(str::to_string),
            players,
            average_ranking_points: rounded_mean(points, players),
        })
        .collect();
    // Stable sort keeps the map's country order among equal counts
    countries.sort_by(|a, b| b.players.cmp(&a.players));
    countries.truncate(limit);
    countries
}

/// Signed mean rounded half up. `count` must be non-zero.
fn rounded_mean(sum: i128, count: u64) -> i64 {
    let count = count as i128;
    (2 * sum + count).div_euclid(2 * count) as i64
}
