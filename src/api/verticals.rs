//! `GET /api/v1/verticals` and `GET /api/v1/verticals/{v}/config` (spec §6.1):
//! read-only views of which verticals exist and how one is currently
//! configured (threshold, per-rule weights, disabled rules).

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::error::CoreError;
use crate::models::Vertical;
use crate::state::AppState;

#[derive(Serialize)]
pub struct VerticalListResponse {
    verticals: Vec<&'static str>,
}

pub async fn list_verticals() -> Json<VerticalListResponse> {
    Json(VerticalListResponse {
        verticals: Vertical::all().iter().map(|v| v.as_str()).collect(),
    })
}

#[derive(Serialize)]
pub struct VerticalConfigResponse {
    vertical: &'static str,
    threshold: u8,
    rule_weights: Vec<RuleWeightEntry>,
    disabled_rules: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct RuleWeightEntry {
    rule_name: &'static str,
    weight: f64,
}

pub async fn vertical_config(
    State(state): State<AppState>,
    Path(vertical): Path<String>,
) -> Result<Json<VerticalConfigResponse>, CoreError> {
    let vertical = Vertical::all()
        .iter()
        .copied()
        .find(|v| v.as_str() == vertical)
        .ok_or_else(|| CoreError::InvalidInput(format!("unknown vertical: {vertical}")))?;

    let policy = state.policy.current();
    let rule_weights = state
        .rules
        .iter()
        .filter(|r| r.applies_to(vertical))
        .map(|r| RuleWeightEntry {
            rule_name: r.name,
            weight: policy.weight(r.name, vertical),
        })
        .collect();
    let disabled_rules = state
        .rules
        .iter()
        .filter(|r| r.applies_to(vertical) && !policy.is_enabled(r.name, vertical))
        .map(|r| r.name)
        .collect();

    Ok(Json(VerticalConfigResponse {
        vertical: vertical.as_str(),
        threshold: policy.threshold(vertical),
        rule_weights,
        disabled_rules,
    }))
}
