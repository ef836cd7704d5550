//! Append-only result ledger.
//!
//! Every accepted submission becomes exactly one [`LedgerRecord`]: the
//! finalized game result plus the player's aggregate after it and, when the
//! result set a new personal best, the replacement leaderboard entry. One
//! record is one line, so a submission is either entirely on disk or not
//! at all. Aggregates and the leaderboard cache are rebuilt from these
//! records on startup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Deadline, EntityType, JsonlReader, JsonlWriter, StorageConfig, StorageError};
use crate::models::{GameMode, GameResult, LeaderboardEntry, PlayerAggregate, PlayerId};

/// One committed submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub result: GameResult,

    /// The player's aggregate after this result was applied
    pub aggregate: PlayerAggregate,

    /// Present only when this result replaced the leaderboard entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaderboard: Option<LeaderboardEntry>,
}

/// A player's best result inside a time window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowBest {
    pub player_id: PlayerId,
    pub best_score: u64,
    pub level: u32,
    pub lines_cleared: u64,
    pub game_mode: GameMode,
    /// Earliest time the window maximum was reached
    pub achieved_at: DateTime<Utc>,
    /// Results the player recorded inside the window
    pub games: u64,
}

/// Durable store of game results.
///
/// `append` must not return `Ok` before the record is durable. Scans see
/// every record whose `append` has returned.
///
/// `append` checks its deadline before writing anything and never after:
/// a write that has started reports its real outcome, however long it
/// took, so `StorageError::Timeout` always means nothing was written.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Store identifier for logging.
    fn name(&self) -> &'static str;

    /// Durably append one committed submission.
    async fn append(&self, record: &LedgerRecord, deadline: Deadline)
        -> Result<(), StorageError>;

    /// Every record in commit order, for replay.
    async fn records(&self) -> Result<Vec<LedgerRecord>, StorageError>;

    /// A player's results, newest first, optionally from `since` onwards.
    async fn player_results(
        &self,
        player_id: &PlayerId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<GameResult>, StorageError>;

    /// All results created in `[from, to]`, oldest first.
    async fn results_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<GameResult>, StorageError>;

    /// Per-player maximum score over results created in `[from, to]`.
    async fn best_by_player(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<WindowBest>, StorageError> {
        let results = self.results_between(from, to).await?;
        Ok(group_best_by_player(&results))
    }
}

/// Fold oldest-first results into one [`WindowBest`] per player.
pub fn group_best_by_player(results: &[GameResult]) -> Vec<WindowBest> {
    let mut best: HashMap<&PlayerId, WindowBest> = HashMap::new();

    for result in results {
        best.entry(&result.player_id)
            .and_modify(|b| {
                b.games += 1;
                // Strict: keep the earliest result reaching the maximum
                if result.score > b.best_score {
                    b.best_score = result.score;
                    b.level = result.level;
                    b.lines_cleared = result.lines_cleared;
                    b.game_mode = result.game_mode;
                    b.achieved_at = result.created_at;
                }
            })
            .or_insert_with(|| WindowBest {
                player_id: result.player_id.clone(),
                best_score: result.score,
                level: result.level,
                lines_cleared: result.lines_cleared,
                game_mode: result.game_mode,
                achieved_at: result.created_at,
                games: 1,
            });
    }

    best.into_values().collect()
}

/// In-memory scan index over ledger results, kept sorted by `created_at`.
#[derive(Default)]
struct ResultIndex {
    by_time: RwLock<Vec<GameResult>>,
    by_player: DashMap<PlayerId, Vec<GameResult>>,
}

fn insert_sorted(results: &mut Vec<GameResult>, result: GameResult) {
    let pos = results.partition_point(|r| r.created_at <= result.created_at);
    results.insert(pos, result);
}

impl ResultIndex {
    fn insert(&self, result: &GameResult) {
        insert_sorted(&mut self.by_time.write(), result.clone());
        insert_sorted(
            &mut self.by_player.entry(result.player_id.clone()).or_default(),
            result.clone(),
        );
    }

    fn player_results(&self, player_id: &PlayerId, since: Option<DateTime<Utc>>) -> Vec<GameResult> {
        let Some(results) = self.by_player.get(player_id) else {
            return Vec::new();
        };
        let start = since
            .map(|s| results.partition_point(|r| r.created_at < s))
            .unwrap_or(0);
        results[start..].iter().rev().cloned().collect()
    }

    fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<GameResult> {
        if from > to {
            return Vec::new();
        }
        let results = self.by_time.read();
        let start = results.partition_point(|r| r.created_at < from);
        let end = results.partition_point(|r| r.created_at <= to);
        results[start..end].to_vec()
    }
}

/// Ledger kept in memory only. Used by tests and embedded callers.
#[derive(Default)]
pub struct MemoryLedger {
    records: RwLock<Vec<LedgerRecord>>,
    index: ResultIndex,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for MemoryLedger {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn append(&self, record: &LedgerRecord, deadline: Deadline) -> Result<(), StorageError> {
        deadline.check()?;
        self.records.write().push(record.clone());
        self.index.insert(&record.result);
        Ok(())
    }

    async fn records(&self) -> Result<Vec<LedgerRecord>, StorageError> {
        Ok(self.records.read().clone())
    }

    async fn player_results(
        &self,
        player_id: &PlayerId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<GameResult>, StorageError> {
        Ok(self.index.player_results(player_id, since))
    }

    async fn results_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<GameResult>, StorageError> {
        Ok(self.index.between(from, to))
    }
}

/// Ledger backed by `ledger/results.jsonl`, fsynced on every append.
pub struct JsonlLedger {
    writer: Arc<JsonlWriter<LedgerRecord>>,
    config: StorageConfig,
    write_lock: Arc<Mutex<()>>,
    index: ResultIndex,
}

impl JsonlLedger {
    /// Open the ledger, indexing any records already on disk.
    ///
    /// A torn final line from an interrupted append is truncated first, so
    /// later appends start on a line of their own.
    pub async fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        let ledger = Self {
            writer: Arc::new(JsonlWriter::for_entity(config, EntityType::LedgerRecord)),
            config: config.clone(),
            write_lock: Arc::new(Mutex::new(())),
            index: ResultIndex::default(),
        };

        let writer = ledger.writer.clone();
        tokio::task::spawn_blocking(move || writer.repair_tail())
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;

        let records = ledger.records().await?;
        for record in &records {
            ledger.index.insert(&record.result);
        }
        info!(
            "Opened ledger {:?} with {} results",
            ledger.writer.path(),
            records.len()
        );

        Ok(ledger)
    }
}

#[async_trait]
impl ResultStore for JsonlLedger {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    async fn append(&self, record: &LedgerRecord, deadline: Deadline) -> Result<(), StorageError> {
        let writer = self.writer.clone();
        let write_lock = self.write_lock.clone();
        let line = record.clone();

        tokio::task::spawn_blocking(move || {
            let _guard = write_lock.lock();
            deadline.check()?;
            writer.append(&line)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))??;

        self.index.insert(&record.result);
        Ok(())
    }

    async fn records(&self) -> Result<Vec<LedgerRecord>, StorageError> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            JsonlReader::<LedgerRecord>::for_entity(&config, EntityType::LedgerRecord).read_all()
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }

    async fn player_results(
        &self,
        player_id: &PlayerId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<GameResult>, StorageError> {
        Ok(self.index.player_results(player_id, since))
    }

    async fn results_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<GameResult>, StorageError> {
        Ok(self.index.between(from, to))
    }
}
