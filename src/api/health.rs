//! `GET /health` (spec §6.1): liveness plus the reachability of the two
//! external dependencies the scoring path degrades around.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    cache: &'static str,
    store: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache = if state.cache.is_reachable() { "ok" } else { "degraded" };
    let store = match state.store.list_rule_accuracy().await {
        Ok(_) => "ok",
        Err(_) => "degraded",
    };
    let status = if cache == "ok" && store == "ok" { "ok" } else { "degraded" };
    Json(HealthResponse { status, cache, store })
}
