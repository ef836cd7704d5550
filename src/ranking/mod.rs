//! Rank maintenance and rank queries.
//!
//! - **cache**: best-score leaderboard cache, one entry per player
//! - **state**: aggregates plus cache, rebuilt from the ledger
//! - **partition**: global, country, friends and time-window selectors
//! - **query**: rank, Top-N, history and statistics reads

mod cache;
mod partition;
mod query;
mod state;

pub use cache::*;
pub use partition::*;
pub use query::*;
pub use state::*;

use thiserror::Error;

use crate::models::ValidationError;
use crate::storage::StorageError;

/// Errors returned by ingestion and rank queries.
///
/// Each kind is distinct so callers can tell a bad request from a storage
/// failure they may retry.
#[derive(Debug, Error)]
pub enum RankingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Not found: {0}")]
    NotFound(String),
}
