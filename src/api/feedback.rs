//! `POST /api/v1/feedback` (spec §4.8, §6.1): reports ground truth on a
//! past transaction and drives the learning loop.

use axum::extract::{Extension, State};
use axum::Json;

use crate::error::CoreError;
use crate::learning::LearningLoop;
use crate::models::{FeedbackRequest, FeedbackResponse};
use crate::state::AppState;
use crate::store::Client;

pub async fn feedback(
    State(state): State<AppState>,
    Extension(client): Extension<Client>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, CoreError> {
    let learning = LearningLoop {
        store: &state.store,
        policy: &state.policy,
    };
    let response = learning.apply(&client.id, &req, &state.rules).await?;
    Ok(Json(response))
}
