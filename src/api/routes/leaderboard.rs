use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{LeaderboardPage, LeaderboardStats, PlayerId, PlayerRank};
use crate::ranking::Partition;

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    pub partition: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Player viewing a friends board; ranked alongside their friends
    pub viewer: Option<String>,
}

fn parse_partition(raw: Option<&str>) -> Result<Partition, ApiError> {
    Ok(raw.unwrap_or("global").parse::<Partition>()?)
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<LeaderboardPage>, ApiError> {
    let mut partition = parse_partition(params.partition.as_deref())?;
    if let Some(viewer) = params.viewer {
        partition = partition.with_viewer(&PlayerId::new(viewer));
    }
    let pagination = state.pagination(params.page, params.page_size);
    let page = state.ranks.top_n(&partition, pagination).await?;
    Ok(Json(page))
}

pub async fn leaderboard_stats(
    State(state): State<AppState>,
) -> Result<Json<LeaderboardStats>, ApiError> {
    let stats = state.ranks.leaderboard_stats().await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct RankParams {
    pub partition: Option<String>,
}

pub async fn player_rank(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Query(params): Query<RankParams>,
) -> Result<Json<PlayerRank>, ApiError> {
    let partition = parse_partition(params.partition.as_deref())?;
    let player_id = PlayerId::new(player_id);

    state
        .ranks
        .rank(&player_id, &partition)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no {} rank for {}", partition, player_id)))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{app, get_json, setup_test_state, submit};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_global_leaderboard() {
        let state = setup_test_state();
        submit(&state, "fr1", 300).await;
        submit(&state, "de1", 500).await;
        submit(&state, "anon", 100).await;

        let (status, json) = get_json(app(state), "/api/leaderboard").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["partition"], "global");
        let rows = json["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["player"]["id"], "de1");
        assert_eq!(rows[0]["player"]["username"], "dieter");
        assert_eq!(rows[0]["rank"], 1);
        assert!(rows[2]["player"]["username"].is_null());
        assert!(rows[0].get("games_in_window").is_none());
    }

    #[tokio::test]
    async fn test_country_leaderboard() {
        let state = setup_test_state();
        submit(&state, "fr1", 300).await;
        submit(&state, "de1", 500).await;

        let (status, json) = get_json(app(state), "/api/leaderboard?partition=country:fr").await;

        assert_eq!(status, StatusCode::OK);
        let rows = json["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["player"]["id"], "fr1");
    }

    #[tokio::test]
    async fn test_window_leaderboard_counts_games() {
        let state = setup_test_state();
        submit(&state, "fr1", 300).await;
        submit(&state, "fr1", 100).await;

        let (status, json) = get_json(app(state), "/api/leaderboard?partition=window:1d").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["rows"][0]["best_score"], 300);
        assert_eq!(json["rows"][0]["games_in_window"], 2);
    }

    #[tokio::test]
    async fn test_bad_partition_is_bad_request() {
        let state = setup_test_state();
        let (status, json) = get_json(app(state), "/api/leaderboard?partition=country:FRA").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_player_rank() {
        let state = setup_test_state();
        submit(&state, "fr1", 300).await;
        submit(&state, "de1", 500).await;

        let (status, json) = get_json(app(state.clone()), "/api/players/fr1/rank").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["rank"], 2);
        assert_eq!(json["total_ranked"], 2);

        let (status, json) = get_json(
            app(state),
            "/api/players/fr1/rank?partition=friends:nobody",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["rank"], 1);
    }

    #[tokio::test]
    async fn test_unranked_player_is_not_found() {
        let state = setup_test_state();
        let (status, json) = get_json(app(state), "/api/players/ghost/rank").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_friends_leaderboard_includes_viewer() {
        let state = setup_test_state();
        submit(&state, "fr1", 300).await;
        submit(&state, "de1", 500).await;
        submit(&state, "anon", 900).await;

        let (status, json) = get_json(
            app(state.clone()),
            "/api/leaderboard?partition=friends:de1&viewer=fr1",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rows = json["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["player"]["id"], "de1");
        assert_eq!(rows[1]["player"]["id"], "fr1");
        assert_eq!(rows[1]["rank"], 2);

        let (_, json) = get_json(app(state), "/api/leaderboard?partition=friends:de1").await;
        assert_eq!(json["rows"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_leaderboard_stats() {
        let state = setup_test_state();
        submit(&state, "fr1", 300).await;
        submit(&state, "de1", 500).await;
        submit(&state, "de1", 100).await;

        let (status, json) = get_json(app(state), "/api/leaderboard/stats").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_players"], 2);
        assert_eq!(json["total_ranked"], 2);
        assert_eq!(json["global"]["total_games"], 3);
        assert_eq!(json["global"]["best_score"], 500);
        assert_eq!(json["global"]["top_scores"][0]["score"], 500);
        let countries = json["countries"].as_array().unwrap();
        assert_eq!(countries.len(), 2);
        assert_eq!(countries[0]["players"], 1);
    }
}
