//! In-memory projection of the ledger: aggregates plus leaderboard cache.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

use super::LeaderboardCache;
use crate::models::{GameResult, PlayerAggregate, PlayerId};
use crate::storage::LedgerRecord;

/// Per-player aggregates and the best-score cache.
///
/// Only changed by [`RankingState::apply`], after the record it applies
/// is durable in the ledger.
#[derive(Default)]
pub struct RankingState {
    aggregates: DashMap<PlayerId, PlayerAggregate>,
    cache: LeaderboardCache,
}

/// A player whose derived state disagrees with the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub player_id: PlayerId,
    pub ledger_games: u64,
    pub ledger_best: Option<u64>,
    pub aggregate_games: Option<u64>,
    pub aggregate_best: Option<u64>,
    pub cached_best: Option<u64>,
}

impl RankingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from records in commit order.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a LedgerRecord>) -> Self {
        let state = Self::new();
        let mut count = 0usize;
        for record in records {
            state.apply(record);
            count += 1;
        }
        info!(
            "Replayed {} ledger records into {} aggregates",
            count,
            state.aggregates.len()
        );
        state
    }

    /// Apply one committed record.
    pub fn apply(&self, record: &LedgerRecord) {
        self.aggregates
            .insert(record.result.player_id.clone(), record.aggregate.clone());
        if let Some(entry) = &record.leaderboard {
            self.cache.upsert(entry.clone());
        }
    }

    /// The player's aggregate, if they have any results.
    pub fn aggregate(&self, player_id: &PlayerId) -> Option<PlayerAggregate> {
        self.aggregates.get(player_id).map(|a| a.clone())
    }

    pub fn cache(&self) -> &LeaderboardCache {
        &self.cache
    }

    pub fn player_count(&self) -> usize {
        self.aggregates.len()
    }

    /// Compare aggregates and cache against the full ledger.
    ///
    /// Reports every player whose game count or best score differs, or
    /// who has derived state with no ledger results. Empty when consistent.
    pub fn audit(&self, results: &[GameResult]) -> Vec<Divergence> {
        let mut ledger: HashMap<&PlayerId, (u64, u64)> = HashMap::new();
        for result in results {
            let (games, best) = ledger.entry(&result.player_id).or_insert((0, 0));
            *games += 1;
            *best = (*best).max(result.score);
        }

        let mut players: Vec<PlayerId> = ledger.keys().map(|p| (*p).clone()).collect();
        players.extend(
            self.aggregates
                .iter()
                .map(|a| a.key().clone())
                .filter(|p| !ledger.contains_key(p)),
        );
        players.sort();

        players
            .into_iter()
            .filter_map(|player_id| {
                let (ledger_games, ledger_best) = match ledger.get(&player_id) {
                    Some((games, best)) => (*games, Some(*best)),
                    None => (0, None),
                };
                let aggregate = self.aggregate(&player_id);
                let cached_best = self.cache.get(&player_id).map(|e| e.best_score);

                let consistent = aggregate.as_ref().map(|a| (a.total_games, a.best_score))
                    == ledger_best.map(|best| (ledger_games, best))
                    && cached_best == ledger_best;

                (!consistent).then(|| Divergence {
                    player_id,
                    ledger_games,
                    ledger_best,
                    aggregate_games: aggregate.as_ref().map(|a| a.total_games),
                    aggregate_best: aggregate.as_ref().map(|a| a.best_score),
                    cached_best,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeaderboardEntry, ResultSubmission};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    /// Build records the way ingestion does, without the storage round trip.
    fn commit(state: &RankingState, player: &str, score: i64) -> LedgerRecord {
        let player_id = PlayerId::from(player);
        let mut aggregate = state.aggregate(&player_id).unwrap_or_default();
        let validated = ResultSubmission::new(score, 1, 0, 0).validate().unwrap();
        let is_best = aggregate.is_new_best(validated.score);
        let result = GameResult::new(player_id, validated, Utc::now()).as_personal_best(is_best);
        aggregate.apply(&result);

        let record = LedgerRecord {
            leaderboard: is_best.then(|| LeaderboardEntry::from_result(&result, result.created_at)),
            result,
            aggregate,
        };
        state.apply(&record);
        record
    }

    #[test]
    fn test_apply_tracks_best_and_cache() {
        let state = RankingState::new();
        commit(&state, "p1", 100);
        commit(&state, "p1", 250);
        commit(&state, "p1", 180);

        let aggregate = state.aggregate(&"p1".into()).unwrap();
        assert_eq!(aggregate.best_score, 250);
        assert_eq!(aggregate.total_games, 3);
        assert_eq!(state.cache().get(&"p1".into()).unwrap().best_score, 250);
    }

    #[test]
    fn test_from_records_matches_live_state() {
        let live = RankingState::new();
        let records = vec![
            commit(&live, "a", 10),
            commit(&live, "b", 30),
            commit(&live, "a", 50),
        ];

        let replayed = RankingState::from_records(&records);
        assert_eq!(replayed.aggregate(&"a".into()), live.aggregate(&"a".into()));
        assert_eq!(replayed.cache().rank_of(&"a".into()), Some(1));
        assert_eq!(replayed.player_count(), 2);
    }

    #[test]
    fn test_audit_clean_state() {
        let state = RankingState::new();
        let records = vec![commit(&state, "a", 10), commit(&state, "a", 5)];
        let results: Vec<GameResult> = records.into_iter().map(|r| r.result).collect();

        assert!(state.audit(&results).is_empty());
    }

    #[test]
    fn test_audit_reports_missing_and_extra() {
        let state = RankingState::new();
        let kept = commit(&state, "a", 10);
        commit(&state, "ghost", 99);

        let validated = ResultSubmission::new(40, 1, 0, 0).validate().unwrap();
        let unseen = GameResult::new("b".into(), validated, Utc::now());

        let divergences = state.audit(&[kept.result, unseen]);
        let players: Vec<&str> = divergences.iter().map(|d| d.player_id.as_str()).collect();
        assert_eq!(players, vec!["b", "ghost"]);
        assert_eq!(divergences[0].ledger_best, Some(40));
        assert_eq!(divergences[0].aggregate_best, None);
        assert_eq!(divergences[1].cached_best, Some(99));
    }
}
