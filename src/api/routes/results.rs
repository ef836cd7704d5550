use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::ingest::Submission;
use crate::models::{GameMode, PlayerId, ResultSubmission};
use crate::ranking::HistoryPage;

pub async fn submit_result(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Json(submission): Json<ResultSubmission>,
) -> Result<(StatusCode, Json<Submission>), ApiError> {
    let outcome = state
        .ingestor
        .submit(PlayerId::new(player_id), submission)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct ListGamesParams {
    pub mode: Option<GameMode>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub async fn list_games(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Query(params): Query<ListGamesParams>,
) -> Result<Json<HistoryPage>, ApiError> {
    let pagination = state.pagination(params.page, params.page_size);
    let page = state
        .ranks
        .history(&PlayerId::new(player_id), params.mode, pagination)
        .await?;
    Ok(Json(page))
}
