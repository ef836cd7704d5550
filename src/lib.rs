//! # Rank Keeper
//!
//! Score ingestion and rank maintenance for a block-stacking game backend.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (results, aggregates, leaderboard rows)
//! - **ingest**: Per-player serialized result submission
//! - **ranking**: Leaderboard cache, partitions and rank queries
//! - **storage**: Append-only JSONL ledger and profile lookups
//! - **api**: REST API endpoints
//! - **calculate**: Statistics and derived metrics computation
//! - **config**: Configuration loading and validation

pub mod api;
pub mod calculate;
pub mod config;
pub mod ingest;
pub mod models;
pub mod ranking;
pub mod storage;

pub use models::*;

use std::time::Duration;

/// Parse a human-friendly duration string (e.g., "7d", "6h", "30m", "90s").
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('w') {
        (n, 7 * 86400)
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 86400)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Default to seconds
        (s, 1)
    };

    let num: u64 = num_str.trim().parse().ok()?;
    Some(Duration::from_secs(num.checked_mul(multiplier)?))
}
