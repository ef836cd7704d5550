//! Denormalized best-score cache.
//!
//! Holds one [`LeaderboardEntry`] per player, kept ordered by
//! `best_score` desc, `achieved_at` asc, `player_id` asc. All-time rank
//! reads never touch the ledger.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::models::{LeaderboardEntry, PlayerId};

/// Position of an entry in the ranked order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    score: Reverse<u64>,
    achieved_at: DateTime<Utc>,
    player_id: PlayerId,
}

impl SortKey {
    pub fn new(best_score: u64, achieved_at: DateTime<Utc>, player_id: PlayerId) -> Self {
        Self {
            score: Reverse(best_score),
            achieved_at,
            player_id,
        }
    }

    fn of(entry: &LeaderboardEntry) -> Self {
        Self::new(entry.best_score, entry.achieved_at, entry.player_id.clone())
    }
}

#[derive(Default)]
struct Inner {
    keys: HashMap<PlayerId, SortKey>,
    ranked: BTreeMap<SortKey, LeaderboardEntry>,
}

/// Ordered cache of every player's best result.
#[derive(Default)]
pub struct LeaderboardCache {
    inner: RwLock<Inner>,
}

impl LeaderboardCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry`, or replace the player's entry if it scores strictly
    /// higher. Returns whether the cache changed.
    pub fn upsert(&self, entry: LeaderboardEntry) -> bool {
        let mut inner = self.inner.write();

        if let Some(old) = inner.keys.get(&entry.player_id).cloned() {
            if entry.best_score <= old.score.0 {
                return false;
            }
            inner.ranked.remove(&old);
        }

        let key = SortKey::of(&entry);
        inner.keys.insert(entry.player_id.clone(), key.clone());
        inner.ranked.insert(key, entry);
        true
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<LeaderboardEntry> {
        let inner = self.inner.read();
        let key = inner.keys.get(player_id)?;
        inner.ranked.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Global 1-based rank, `None` without an entry.
    pub fn rank_of(&self, player_id: &PlayerId) -> Option<u64> {
        let inner = self.inner.read();
        let key = inner.keys.get(player_id)?;
        Some(inner.ranked.range(..key).count() as u64 + 1)
    }

    /// Rank among `members` only. The player must be a member.
    pub fn rank_within(&self, player_id: &PlayerId, members: &HashSet<PlayerId>) -> Option<u64> {
        if !members.contains(player_id) {
            return None;
        }
        let inner = self.inner.read();
        let key = inner.keys.get(player_id)?;
        let ahead = inner
            .ranked
            .range(..key)
            .filter(|(k, _)| members.contains(&k.player_id))
            .count();
        Some(ahead as u64 + 1)
    }

    /// Number of ranked players, optionally restricted to `members`.
    pub fn count(&self, members: Option<&HashSet<PlayerId>>) -> u64 {
        let inner = self.inner.read();
        match members {
            None => inner.keys.len() as u64,
            Some(members) => members.iter().filter(|m| inner.keys.contains_key(*m)).count() as u64,
        }
    }

    /// One page of ranked entries plus the partition total.
    ///
    /// Ranks are positions within the filtered order.
    pub fn page(
        &self,
        members: Option<&HashSet<PlayerId>>,
        offset: u64,
        limit: u64,
    ) -> (Vec<(u64, LeaderboardEntry)>, u64) {
        let inner = self.inner.read();
        let mut rows = Vec::new();
        let mut total = 0u64;

        let in_partition = inner
            .ranked
            .values()
            .filter(|e| members.map_or(true, |m| m.contains(&e.player_id)));

        for entry in in_partition {
            total += 1;
            if total > offset && (rows.len() as u64) < limit {
                rows.push((total, entry.clone()));
            }
        }

        (rows, total)
    }
}
