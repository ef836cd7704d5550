use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub ledger: &'static str,
    pub players: usize,
    pub ranked_players: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let ranking = state.ingestor.state();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        ledger: state.ingestor.store().name(),
        players: ranking.player_count(),
        ranked_players: ranking.cache().len(),
    })
}
