//! HTTP surface (spec §6.1): route table wiring handlers to the shared
//! `AppState`, with API-key auth applied to every tenant-scoped route.

pub mod check;
pub mod feedback;
pub mod health;
pub mod stats;
pub mod verticals;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::api_key_auth;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let tenant_routes = Router::new()
        .route("/fraud/check", post(check::check))
        .route("/fraud/check/batch", post(check::check_batch))
        .route("/feedback", post(feedback::feedback))
        .route("/verticals/:vertical/config", get(verticals::vertical_config))
        .route("/stats/rules", get(stats::rule_stats))
        .route("/stats/consortium/:digest", get(stats::consortium_stats))
        .layer(middleware::from_fn_with_state(state.clone(), api_key_auth));

    let public_routes = Router::new().route("/verticals", get(verticals::list_verticals));

    Router::new()
        .route("/health", get(health::health))
        .nest(
            "/api/v1",
            tenant_routes.merge(public_routes),
        )
        .with_state(state)
}
