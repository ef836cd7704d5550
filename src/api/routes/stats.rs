use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{
    GlobalStatsReport, PlayerComparison, PlayerId, PlayerStatsReport, StatsPeriod,
};

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    #[serde(default)]
    pub period: StatsPeriod,
}

pub async fn player_stats(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Query(params): Query<StatsParams>,
) -> Result<Json<PlayerStatsReport>, ApiError> {
    let report = state
        .ranks
        .player_stats(&PlayerId::new(player_id), params.period)
        .await?;
    Ok(Json(report))
}

pub async fn global_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Result<Json<GlobalStatsReport>, ApiError> {
    let report = state.ranks.global_stats(params.period).await?;
    Ok(Json(report))
}

pub async fn compare_players(
    State(state): State<AppState>,
    Path((first, second)): Path<(String, String)>,
) -> Result<Json<PlayerComparison>, ApiError> {
    let comparison = state
        .ranks
        .compare(&PlayerId::new(first), &PlayerId::new(second))
        .await?;
    Ok(Json(comparison))
}
