//! Result ingestion.
//!
//! Applies one validated game result to a player's aggregate and the
//! leaderboard cache. Per submission:
//!
//! 1. Validate the submission (nothing is written on failure)
//! 2. Take the player's lock; different players never contend
//! 3. Decide the personal best and fold the result into the aggregate
//! 4. Append one ledger record holding result, aggregate and cache entry
//! 5. Only then apply the record to the in-memory state
//!
//! Steps 3-5 run in their own task holding the lock, so a caller that
//! gives up cannot interrupt a commit halfway. A player's lock is dropped
//! from the map once no submission holds it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::timeout_at;
use tracing::{debug, info};

use crate::models::{
    GameResult, LeaderboardEntry, PlayerAggregate, PlayerId, ResultSubmission, ValidatedResult,
};
use crate::ranking::{RankingError, RankingState};
use crate::storage::{Deadline, LedgerRecord, ResultStore, StorageError};

/// Outcome of an accepted submission.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub result: GameResult,
    pub aggregate: PlayerAggregate,
    pub is_new_personal_best: bool,
}

/// Serializes submissions per player and commits them to the ledger.
pub struct Ingestor {
    store: Arc<dyn ResultStore>,
    state: Arc<RankingState>,
    locks: DashMap<PlayerId, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl Ingestor {
    /// Wrap existing state. `state` must already reflect `store`.
    pub fn new(store: Arc<dyn ResultStore>, state: Arc<RankingState>, timeout: Duration) -> Self {
        Self {
            store,
            state,
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Replay the store into fresh state.
    pub async fn open(store: Arc<dyn ResultStore>, timeout: Duration) -> Result<Self, StorageError> {
        let records = store.records().await?;
        let state = Arc::new(RankingState::from_records(&records));
        info!(
            "Ingestor ready on {} ledger ({} players)",
            store.name(),
            state.player_count()
        );
        Ok(Self::new(store, state, timeout))
    }

    pub fn state(&self) -> Arc<RankingState> {
        self.state.clone()
    }

    pub fn store(&self) -> Arc<dyn ResultStore> {
        self.store.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Submit a result recorded now.
    pub async fn submit(
        &self,
        player_id: PlayerId,
        submission: ResultSubmission,
    ) -> Result<Submission, RankingError> {
        self.submit_at(player_id, submission, Utc::now()).await
    }

    /// Submit a result recorded at `now`.
    ///
    /// One deadline covers waiting for the player's lock and starting the
    /// ledger append. Past it the submission fails with a timeout and nothing
    /// is written. An append that has started is awaited to the end and its
    /// real outcome returned, so a success is never reported as a failure.
    pub async fn submit_at(
        &self,
        player_id: PlayerId,
        submission: ResultSubmission,
        now: DateTime<Utc>,
    ) -> Result<Submission, RankingError> {
        let validated = submission.validate()?;
        let deadline = Deadline::after(self.timeout);

        let lock = self.lock_for(&player_id);
        let outcome = self
            .commit_locked(lock.clone(), player_id.clone(), validated, now, deadline)
            .await;

        drop(lock);
        self.locks
            .remove_if(&player_id, |_, lock| Arc::strong_count(lock) == 1);
        outcome
    }

    async fn commit_locked(
        &self,
        lock: Arc<Mutex<()>>,
        player_id: PlayerId,
        validated: ValidatedResult,
        now: DateTime<Utc>,
        deadline: Deadline,
    ) -> Result<Submission, RankingError> {
        let guard = timeout_at(deadline.instant(), lock.lock_owned())
            .await
            .map_err(|_| StorageError::Timeout(deadline.limit()))?;

        let store = self.store.clone();
        let state = self.state.clone();
        let task = tokio::spawn(async move {
            let outcome = commit(store.as_ref(), &state, player_id, validated, now, deadline).await;
            drop(guard);
            outcome
        });

        match task.await {
            Ok(outcome) => Ok(outcome?),
            Err(e) => Err(StorageError::Task(e.to_string()).into()),
        }
    }

    fn lock_for(&self, player_id: &PlayerId) -> Arc<Mutex<()>> {
        self.locks.entry(player_id.clone()).or_default().clone()
    }
}

async fn commit(
    store: &dyn ResultStore,
    state: &RankingState,
    player_id: PlayerId,
    validated: ValidatedResult,
    now: DateTime<Utc>,
    deadline: Deadline,
) -> Result<Submission, StorageError> {
    let mut aggregate = state.aggregate(&player_id).unwrap_or_default();
    let is_new_personal_best = aggregate.is_new_best(validated.score);

    let result = GameResult::new(player_id, validated, now).as_personal_best(is_new_personal_best);
    aggregate.apply(&result);

    let record = LedgerRecord {
        leaderboard: is_new_personal_best.then(|| LeaderboardEntry::from_result(&result, now)),
        result,
        aggregate,
    };

    store.append(&record, deadline).await?;
    state.apply(&record);

    debug!("Committed result {} to {} ledger", record.result.id, store.name());
    if is_new_personal_best {
        info!(
            "New personal best for {}: {}",
            record.result.player_id, record.result.score
        );
    }

    Ok(Submission {
        result: record.result,
        aggregate: record.aggregate,
        is_new_personal_best,
    })
}
