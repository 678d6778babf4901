//! `GET /api/v1/stats/rules` and `GET /api/v1/stats/consortium/{digest}`
//! (SPEC_FULL supplement): read-only observability over the learning loop's
//! own bookkeeping, so an operator can see a rule's precision and current
//! weight without opening the database directly.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::error::CoreError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct RuleStatsEntry {
    rule_name: String,
    vertical: &'static str,
    true_positive: u64,
    false_positive: u64,
    true_negative: u64,
    false_negative: u64,
    precision: Option<f64>,
    sample_size: u64,
    weight: f64,
}

pub async fn rule_stats(State(state): State<AppState>) -> Result<Json<Vec<RuleStatsEntry>>, CoreError> {
    let rows = state.store.list_rule_accuracy().await?;
    let entries = rows
        .into_iter()
        .map(|(rule_name, vertical, acc)| RuleStatsEntry {
            rule_name,
            vertical: vertical.as_str(),
            true_positive: acc.true_positive,
            false_positive: acc.false_positive,
            true_negative: acc.true_negative,
            false_negative: acc.false_negative,
            precision: acc.precision(),
            sample_size: acc.sample_size(),
            weight: acc.weight,
        })
        .collect();
    Ok(Json(entries))
}

#[derive(Serialize)]
pub struct ConsortiumStatsResponse {
    tenant_count_30d: u64,
    fraud_confirmations: u64,
}

/// `digest` is whatever identity digest the caller already computed client
/// side (or read back from a prior response's metadata) — this endpoint
/// never accepts or returns a raw identifier.
pub async fn consortium_stats(
    State(state): State<AppState>,
    Path(digest): Path<String>,
) -> Result<Json<ConsortiumStatsResponse>, CoreError> {
    let tenant_count_30d = state.store.consortium_tenant_count(&digest, 30).await?;
    let fraud_confirmations = state.store.consortium_fraud_confirmations(&digest).await?;
    Ok(Json(ConsortiumStatsResponse {
        tenant_count_30d,
        fraud_confirmations,
    }))
}
