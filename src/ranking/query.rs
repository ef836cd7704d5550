//! Read side: ranks, Top-N pages, history and statistics.
//!
//! All-time partitions read the leaderboard cache. Time windows and
//! statistics scan the ledger. Nothing here writes.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Divergence, Partition, RankingError, RankingState};
use crate::calculate::report::{
    comparison_stats, country_breakdown, global_report, player_report, COUNTRY_STATS_LEN,
};
use crate::models::{
    ComparedPlayer, GameMode, GameResult, GlobalStatsReport, LeaderboardEntry, LeaderboardPage,
    LeaderboardRow, LeaderboardStats, Pagination, PaginationMeta, PlayerAggregate,
    PlayerComparison, PlayerId, PlayerProfile, PlayerRank, PlayerStatsReport, PlayerSummary,
    StatsPeriod, ValidationError,
};
use crate::storage::{with_timeout, ProfileSource, ResultStore, WindowBest};

/// One page of a player's game history, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub player_id: PlayerId,
    pub games: Vec<GameResult>,
    pub pagination: PaginationMeta,
}

/// Rank and statistics queries.
#[derive(Clone)]
pub struct RankQuery {
    store: Arc<dyn ResultStore>,
    profiles: Arc<dyn ProfileSource>,
    state: Arc<RankingState>,
    timeout: Duration,
}

impl RankQuery {
    pub fn new(
        store: Arc<dyn ResultStore>,
        profiles: Arc<dyn ProfileSource>,
        state: Arc<RankingState>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            profiles,
            state,
            timeout,
        }
    }

    /// The player's lifetime aggregate.
    pub fn aggregate(&self, player_id: &PlayerId) -> Result<PlayerAggregate, RankingError> {
        self.state
            .aggregate(player_id)
            .ok_or_else(|| RankingError::NotFound(format!("player {}", player_id)))
    }

    /// The player's rank in `partition`; `None` when they are not ranked there.
    pub async fn rank(
        &self,
        player_id: &PlayerId,
        partition: &Partition,
    ) -> Result<Option<PlayerRank>, RankingError> {
        self.rank_at(player_id, partition, Utc::now()).await
    }

    pub async fn rank_at(
        &self,
        player_id: &PlayerId,
        partition: &Partition,
        now: DateTime<Utc>,
    ) -> Result<Option<PlayerRank>, RankingError> {
        let cache = self.state.cache();

        let ranked = match partition {
            Partition::Global => cache.rank_of(player_id).map(|rank| (rank, cache.count(None))),
            Partition::Country(code) => {
                let members = self.country_members(code).await?;
                cache
                    .rank_within(player_id, &members)
                    .map(|rank| (rank, cache.count(Some(&members))))
            }
            Partition::Friends(friends) => {
                let mut members = friends.clone();
                members.insert(player_id.clone());
                cache
                    .rank_within(player_id, &members)
                    .map(|rank| (rank, cache.count(Some(&members))))
            }
            Partition::Window(length) => {
                let standings = self.window_standings(*length, now).await?;
                let total = standings.len() as u64;
                return Ok(standings
                    .iter()
                    .position(|b| &b.player_id == player_id)
                    .map(|pos| PlayerRank {
                        player_id: player_id.clone(),
                        partition: partition.to_string(),
                        rank: pos as u64 + 1,
                        best_score: standings[pos].best_score,
                        total_ranked: total,
                    }));
            }
        };

        let Some((rank, total_ranked)) = ranked else {
            return Ok(None);
        };
        let Some(entry) = cache.get(player_id) else {
            return Ok(None);
        };

        Ok(Some(PlayerRank {
            player_id: player_id.clone(),
            partition: partition.to_string(),
            rank,
            best_score: entry.best_score,
            total_ranked,
        }))
    }

    /// One page of the partition's standings.
    pub async fn top_n(
        &self,
        partition: &Partition,
        pagination: Pagination,
    ) -> Result<LeaderboardPage, RankingError> {
        self.top_n_at(partition, pagination, Utc::now()).await
    }

    pub async fn top_n_at(
        &self,
        partition: &Partition,
        pagination: Pagination,
        now: DateTime<Utc>,
    ) -> Result<LeaderboardPage, RankingError> {
        let members = match partition {
            Partition::Global => None,
            Partition::Country(code) => Some(self.country_members(code).await?),
            Partition::Friends(friends) => Some(friends.clone()),
            Partition::Window(length) => {
                return self.window_page(partition, *length, pagination, now).await;
            }
        };

        let (entries, total) =
            self.state
                .cache()
                .page(members.as_ref(), pagination.offset(), pagination.page_size as u64);

        let ids: Vec<PlayerId> = entries.iter().map(|(_, e)| e.player_id.clone()).collect();
        let profiles = self.profiles_for(&ids).await?;

        let rows = entries
            .into_iter()
            .map(|(rank, entry)| cached_row(rank, entry, &profiles))
            .collect();

        Ok(LeaderboardPage {
            partition: partition.to_string(),
            rows,
            pagination: PaginationMeta::new(&pagination, total),
        })
    }

    /// A player's results, newest first, optionally for one game mode.
    pub async fn history(
        &self,
        player_id: &PlayerId,
        mode: Option<GameMode>,
        pagination: Pagination,
    ) -> Result<HistoryPage, RankingError> {
        let mut games = with_timeout(self.timeout, self.store.player_results(player_id, None)).await?;
        if let Some(mode) = mode {
            games.retain(|g| g.game_mode == mode);
        }

        Ok(HistoryPage {
            player_id: player_id.clone(),
            pagination: PaginationMeta::new(&pagination, games.len() as u64),
            games: pagination.slice(&games).to_vec(),
        })
    }

    pub async fn player_stats(
        &self,
        player_id: &PlayerId,
        period: StatsPeriod,
    ) -> Result<PlayerStatsReport, RankingError> {
        self.player_stats_at(player_id, period, Utc::now()).await
    }

    pub async fn player_stats_at(
        &self,
        player_id: &PlayerId,
        period: StatsPeriod,
        now: DateTime<Utc>,
    ) -> Result<PlayerStatsReport, RankingError> {
        let all = with_timeout(self.timeout, self.store.player_results(player_id, None)).await?;

        let since = period.since(now);
        let in_period: Vec<GameResult> = all
            .iter()
            .filter(|r| r.created_at <= now && since.map_or(true, |s| r.created_at >= s))
            .cloned()
            .collect();
        let personal_bests = all.into_iter().filter(|r| r.is_personal_best).collect();

        Ok(player_report(
            player_id.clone(),
            period,
            &in_period,
            personal_bests,
        ))
    }

    pub async fn global_stats(&self, period: StatsPeriod) -> Result<GlobalStatsReport, RankingError> {
        self.global_stats_at(period, Utc::now()).await
    }

    pub async fn global_stats_at(
        &self,
        period: StatsPeriod,
        now: DateTime<Utc>,
    ) -> Result<GlobalStatsReport, RankingError> {
        let from = period.since(now).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let results = with_timeout(self.timeout, self.store.results_between(from, now)).await?;
        Ok(global_report(period, &results))
    }

    /// Lifetime statistics of two players side by side.
    ///
    /// A player is known if they have a profile or at least one result;
    /// known players without results compare with zeroed totals.
    pub async fn compare(
        &self,
        first: &PlayerId,
        second: &PlayerId,
    ) -> Result<PlayerComparison, RankingError> {
        if first == second {
            return Err(
                ValidationError::new("player_id", "cannot compare a player with themselves").into(),
            );
        }

        let profiles = self.profiles_for(&[first.clone(), second.clone()]).await?;
        let mut players = Vec::with_capacity(2);
        for player_id in [first, second] {
            if !profiles.contains_key(player_id) && self.state.aggregate(player_id).is_none() {
                return Err(RankingError::NotFound(format!("player {}", player_id)));
            }
            let results =
                with_timeout(self.timeout, self.store.player_results(player_id, None)).await?;
            players.push(ComparedPlayer {
                player: summary(player_id, &profiles),
                stats: comparison_stats(&results),
            });
        }

        Ok(PlayerComparison { players })
    }

    /// All-time totals, top scores and the per-country player breakdown.
    pub async fn leaderboard_stats(&self) -> Result<LeaderboardStats, RankingError> {
        let global = self.global_stats(StatsPeriod::All).await?;
        let profiles = with_timeout(self.timeout, self.profiles.all_profiles()).await?;

        Ok(LeaderboardStats {
            total_players: profiles.len() as u64,
            total_ranked: self.state.cache().len() as u64,
            global,
            countries: country_breakdown(&profiles, COUNTRY_STATS_LEN),
        })
    }

    /// Compare derived state against the whole ledger.
    pub async fn audit(&self) -> Result<Vec<Divergence>, RankingError> {
        let results = with_timeout(
            self.timeout,
            self.store
                .results_between(DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC),
        )
        .await?;
        Ok(self.state.audit(&results))
    }

    async fn country_members(&self, code: &str) -> Result<HashSet<PlayerId>, RankingError> {
        Ok(with_timeout(self.timeout, self.profiles.players_in_country(code)).await?)
    }

    async fn profiles_for(
        &self,
        ids: &[PlayerId],
    ) -> Result<HashMap<PlayerId, PlayerProfile>, RankingError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(with_timeout(self.timeout, self.profiles.profiles(ids)).await?)
    }

    /// Per-player window maxima in ranked order.
    async fn window_standings(
        &self,
        length: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<WindowBest>, RankingError> {
        let from = chrono::Duration::from_std(length)
            .ok()
            .and_then(|span| now.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut standings = with_timeout(self.timeout, self.store.best_by_player(from, now)).await?;
        standings.sort_by(|a, b| {
            (Reverse(a.best_score), a.achieved_at, &a.player_id).cmp(&(
                Reverse(b.best_score),
                b.achieved_at,
                &b.player_id,
            ))
        });
        Ok(standings)
    }

    async fn window_page(
        &self,
        partition: &Partition,
        length: Duration,
        pagination: Pagination,
        now: DateTime<Utc>,
    ) -> Result<LeaderboardPage, RankingError> {
        let standings = self.window_standings(length, now).await?;
        let page = pagination.slice(&standings);

        let ids: Vec<PlayerId> = page.iter().map(|b| b.player_id.clone()).collect();
        let profiles = self.profiles_for(&ids).await?;

        let rows = page
            .iter()
            .enumerate()
            .map(|(i, best)| LeaderboardRow {
                rank: pagination.offset() + i as u64 + 1,
                player: summary(&best.player_id, &profiles),
                best_score: best.best_score,
                level: best.level,
                lines_cleared: best.lines_cleared,
                game_mode: best.game_mode,
                achieved_at: best.achieved_at,
                games_in_window: Some(best.games),
            })
            .collect();

        Ok(LeaderboardPage {
            partition: partition.to_string(),
            rows,
            pagination: PaginationMeta::new(&pagination, standings.len() as u64),
        })
    }
}

fn summary(player_id: &PlayerId, profiles: &HashMap<PlayerId, PlayerProfile>) -> PlayerSummary {
    profiles
        .get(player_id)
        .map(PlayerSummary::from)
        .unwrap_or_else(|| PlayerSummary::anonymous(player_id.clone()))
}

fn cached_row(
    rank: u64,
    entry: LeaderboardEntry,
    profiles: &HashMap<PlayerId, PlayerProfile>,
) -> LeaderboardRow {
    LeaderboardRow {
        rank,
        player: summary(&entry.player_id, profiles),
        best_score: entry.best_score,
        level: entry.level,
        lines_cleared: entry.lines_cleared,
        game_mode: entry.game_mode,
        achieved_at: entry.achieved_at,
        games_in_window: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Ingestor;
    use crate::models::ResultSubmission;
    use crate::storage::{MemoryLedger, MemoryProfiles};
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;

    const LIMIT: Duration = Duration::from_secs(5);

    struct Fixture {
        ingestor: Ingestor,
        query: RankQuery,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn ResultStore> = Arc::new(MemoryLedger::new());
        let profiles = Arc::new(MemoryProfiles::from_profiles([
            PlayerProfile::new("fr1".into(), "amelie".to_string()).with_country("FR"),
            PlayerProfile::new("fr2".into(), "bastien".to_string()).with_country("FR"),
            PlayerProfile::new("de1".into(), "dieter".to_string()).with_country("DE"),
        ]));
        let state = Arc::new(RankingState::new());
        Fixture {
            ingestor: Ingestor::new(store.clone(), state.clone(), LIMIT),
            query: RankQuery::new(store, profiles, state, LIMIT),
        }
    }

    impl Fixture {
        async fn play(&self, player: &str, score: i64, at: DateTime<Utc>) {
            self.ingestor
                .submit_at(player.into(), ResultSubmission::new(score, 1, 4, 60), at)
                .await
                .unwrap();
        }
    }

    fn ranked_ids(page: &LeaderboardPage) -> Vec<&str> {
        page.rows.iter().map(|r| r.player.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_global_rank_and_missing_player() {
        let f = fixture();
        let now = Utc::now();
        f.play("fr1", 100, now).await;
        f.play("de1", 300, now).await;

        let rank = f
            .query
            .rank(&"fr1".into(), &Partition::Global)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rank.rank, 2);
        assert_eq!(rank.total_ranked, 2);
        assert_eq!(rank.best_score, 100);

        let none = f.query.rank(&"nobody".into(), &Partition::Global).await.unwrap();
        assert!(none.is_none());
        assert!(matches!(
            f.query.aggregate(&"nobody".into()),
            Err(RankingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_tie_at_300_earlier_ranks_higher() {
        let f = fixture();
        let now = Utc::now();
        f.play("fr2", 300, now).await;
        f.play("de1", 300, now - ChronoDuration::minutes(1)).await;

        let first = f.query.rank(&"de1".into(), &Partition::Global).await.unwrap();
        let second = f.query.rank(&"fr2".into(), &Partition::Global).await.unwrap();
        assert_eq!(first.unwrap().rank, 1);
        assert_eq!(second.unwrap().rank, 2);
    }

    #[tokio::test]
    async fn test_country_rank_and_top_n() {
        let f = fixture();
        let now = Utc::now();
        f.play("de1", 900, now).await;
        f.play("fr1", 200, now).await;
        f.play("fr2", 500, now).await;

        let france = Partition::country("fr").unwrap();
        let rank = f.query.rank(&"fr1".into(), &france).await.unwrap().unwrap();
        assert_eq!(rank.rank, 2);
        assert_eq!(rank.total_ranked, 2);

        let outsider = f.query.rank(&"de1".into(), &france).await.unwrap();
        assert!(outsider.is_none());

        let page = f.query.top_n(&france, Pagination::default()).await.unwrap();
        assert_eq!(ranked_ids(&page), vec!["fr2", "fr1"]);
        assert_eq!(page.rows[0].player.username.as_deref(), Some("bastien"));
        assert_eq!(page.partition, "country:FR");
    }

    #[tokio::test]
    async fn test_friends_rank_includes_self() {
        let f = fixture();
        let now = Utc::now();
        f.play("me", 400, now).await;
        f.play("pal", 500, now).await;
        f.play("stranger", 999, now).await;

        let friends = Partition::friends(["pal".into()]);
        let rank = f.query.rank(&"me".into(), &friends).await.unwrap().unwrap();
        assert_eq!(rank.rank, 2);
        assert_eq!(rank.total_ranked, 2);
    }

    #[tokio::test]
    async fn test_global_top_n_pages_and_anonymous_players() {
        let f = fixture();
        let now = Utc::now();
        for (i, player) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            f.play(player, 100 * (i as i64 + 1), now).await;
        }

        let page = f
            .query
            .top_n(&Partition::Global, Pagination::new(Some(2), Some(2)))
            .await
            .unwrap();

        assert_eq!(ranked_ids(&page), vec!["c", "b"]);
        assert_eq!(page.rows[0].rank, 3);
        assert!(page.rows[0].player.username.is_none());
        assert_eq!(page.pagination.total_items, 5);
        assert_eq!(page.pagination.total_pages, 3);
    }

    #[tokio::test]
    async fn test_window_top_n_excludes_players_outside_window() {
        let f = fixture();
        let now = Utc::now();
        f.play("old", 10_000, now - ChronoDuration::days(30)).await;
        f.play("fr1", 100, now - ChronoDuration::days(2)).await;
        f.play("fr1", 700, now - ChronoDuration::days(1)).await;
        f.play("de1", 400, now - ChronoDuration::hours(3)).await;

        let week = Partition::window(Duration::from_secs(7 * 86400)).unwrap();
        let page = f.query.top_n_at(&week, Pagination::default(), now).await.unwrap();

        assert_eq!(ranked_ids(&page), vec!["fr1", "de1"]);
        assert_eq!(page.rows[0].best_score, 700);
        assert_eq!(page.rows[0].games_in_window, Some(2));
        assert_eq!(page.pagination.total_items, 2);

        let old = f.query.rank_at(&"old".into(), &week, now).await.unwrap();
        assert!(old.is_none());
        let de = f.query.rank_at(&"de1".into(), &week, now).await.unwrap().unwrap();
        assert_eq!(de.rank, 2);

        // All-time cache still has the old score on top
        let global = f.query.rank(&"old".into(), &Partition::Global).await.unwrap();
        assert_eq!(global.unwrap().rank, 1);
    }

    #[tokio::test]
    async fn test_history_filters_mode_and_pages() {
        let f = fixture();
        let player = PlayerId::from("p1");
        for score in [10, 20, 30] {
            f.ingestor
                .submit(player.clone(), ResultSubmission::new(score, 1, 0, 0))
                .await
                .unwrap();
        }
        f.ingestor
            .submit(
                player.clone(),
                ResultSubmission::new(40, 1, 0, 0).with_mode(GameMode::Zen),
            )
            .await
            .unwrap();

        let page = f
            .query
            .history(&player, Some(GameMode::Classic), Pagination::new(Some(1), Some(2)))
            .await
            .unwrap();

        let scores: Vec<u64> = page.games.iter().map(|g| g.score).collect();
        assert_eq!(scores, vec![30, 20]);
        assert_eq!(page.pagination.total_items, 3);
    }

    #[tokio::test]
    async fn test_player_stats_period() {
        let f = fixture();
        let now = Utc::now();
        f.play("p1", 900, now - ChronoDuration::days(10)).await;
        f.play("p1", 100, now - ChronoDuration::hours(2)).await;
        f.play("p1", 300, now - ChronoDuration::hours(1)).await;

        let weekly = f
            .query
            .player_stats_at(&"p1".into(), StatsPeriod::Weekly, now)
            .await
            .unwrap();
        assert_eq!(weekly.total_games, 2);
        assert_eq!(weekly.best_score, 300);
        assert_eq!(weekly.average_score, 200);
        // Personal bests are all-time
        assert_eq!(weekly.personal_bests.len(), 1);
        assert_eq!(weekly.personal_bests[0].score, 900);

        let all = f
            .query
            .player_stats_at(&"p1".into(), StatsPeriod::All, now)
            .await
            .unwrap();
        assert_eq!(all.total_games, 3);
    }

    #[tokio::test]
    async fn test_global_stats_and_audit() {
        let f = fixture();
        let now = Utc::now();
        f.play("a", 100, now - ChronoDuration::days(3)).await;
        f.play("b", 200, now - ChronoDuration::hours(1)).await;

        let daily = f.query.global_stats_at(StatsPeriod::Daily, now).await.unwrap();
        assert_eq!(daily.total_players, 1);
        assert_eq!(daily.total_games, 1);

        let all = f.query.global_stats_at(StatsPeriod::All, now).await.unwrap();
        assert_eq!(all.total_players, 2);
        assert_eq!(all.best_score, 200);

        assert!(f.query.audit().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_friends_top_n_with_viewer() {
        let f = fixture();
        let now = Utc::now();
        f.play("fr1", 100, now).await;
        f.play("de1", 300, now).await;
        f.play("fr2", 200, now).await;

        let friends = Partition::friends(["de1".into()]);
        let page = f
            .query
            .top_n(&friends.clone().with_viewer(&"fr1".into()), Pagination::default())
            .await
            .unwrap();
        assert_eq!(ranked_ids(&page), vec!["de1", "fr1"]);
        assert_eq!(page.pagination.total_items, 2);

        let page = f.query.top_n(&friends, Pagination::default()).await.unwrap();
        assert_eq!(ranked_ids(&page), vec!["de1"]);
    }

    #[tokio::test]
    async fn test_compare_players() {
        let f = fixture();
        let now = Utc::now();
        f.play("fr1", 100, now).await;
        f.play("fr1", 251, now).await;
        f.play("anon", 50, now).await;

        let comparison = f.query.compare(&"fr1".into(), &"anon".into()).await.unwrap();
        let [first, second] = &comparison.players[..] else {
            panic!("expected two players");
        };
        assert_eq!(first.player.username.as_deref(), Some("amelie"));
        assert_eq!(first.stats.total_games, 2);
        assert_eq!(first.stats.best_score, 251);
        assert_eq!(first.stats.average_score, 176);
        assert!(second.player.username.is_none());
        assert_eq!(second.stats.total_games, 1);

        // Profile but no games yet
        let comparison = f.query.compare(&"fr2".into(), &"fr1".into()).await.unwrap();
        assert_eq!(comparison.players[0].stats.total_games, 0);
        assert_eq!(comparison.players[0].stats.average_score, 0);

        assert!(matches!(
            f.query.compare(&"ghost".into(), &"fr1".into()).await,
            Err(RankingError::NotFound(_))
        ));
        assert!(matches!(
            f.query.compare(&"fr1".into(), &"fr1".into()).await,
            Err(RankingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_leaderboard_stats() {
        let f = fixture();
        let now = Utc::now();
        f.play("fr1", 100, now).await;
        f.play("anon", 300, now).await;

        let stats = f.query.leaderboard_stats().await.unwrap();
        assert_eq!(stats.total_players, 3);
        assert_eq!(stats.total_ranked, 2);
        assert_eq!(stats.global.total_games, 2);
        assert_eq!(stats.global.best_score, 300);

        let countries: Vec<(Option<&str>, u64)> = stats
            .countries
            .iter()
            .map(|c| (c.country.as_deref(), c.players))
            .collect();
        assert_eq!(countries, vec![(Some("FR"), 2), (Some("DE"), 1)]);
        assert_eq!(stats.countries[0].average_ranking_points, 1000);
    }
}
