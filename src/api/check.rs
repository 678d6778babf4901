//! `POST /api/v1/fraud/check` and its batch variant (spec §6.1, SPEC_FULL
//! supplement): idempotency cache lookup, then — on a miss — context
//! assembly, rule evaluation, ML blend, aggregation, persistence, a
//! fire-and-forget webhook on decline/critical, and a cache store of the
//! result so a replay within the TTL short-circuits the whole pipeline.

use std::time::{Duration, Instant};

use axum::extract::{Extension, State};
use axum::Json;

use crate::error::CoreError;
use crate::models::{FraudCheckResponse, TransactionRequest};
use crate::rules;
use crate::state::AppState;
use crate::store::{Client, PersistedTransaction};

const MAX_BATCH_SIZE: usize = 1_000;

/// Idempotency/result-cache key for `(tenant, transaction_id)` (spec §2
/// "cache lookup (short-circuit if hit) -> ... -> cache store"; §5 "the
/// same idempotency window as the result cache").
fn idempotency_key(tenant_id: &str, transaction_id: &str) -> String {
    format!("idem:{tenant_id}:{transaction_id}")
}

pub async fn check(
    State(state): State<AppState>,
    Extension(client): Extension<Client>,
    Json(req): Json<TransactionRequest>,
) -> Result<Json<FraudCheckResponse>, CoreError> {
    let response = score_one(&state, &client, &req).await?;
    Ok(Json(response))
}

pub async fn check_batch(
    State(state): State<AppState>,
    Extension(client): Extension<Client>,
    Json(reqs): Json<Vec<TransactionRequest>>,
) -> Result<Json<Vec<FraudCheckResponse>>, CoreError> {
    if reqs.len() > MAX_BATCH_SIZE {
        return Err(CoreError::InvalidInput(format!(
            "batch size {} exceeds the maximum of {MAX_BATCH_SIZE}",
            reqs.len()
        )));
    }
    let mut responses = Vec::with_capacity(reqs.len());
    for req in &reqs {
        responses.push(score_one(&state, &client, req).await?);
    }
    Ok(Json(responses))
}

async fn score_one(
    state: &AppState,
    client: &Client,
    req: &TransactionRequest,
) -> Result<FraudCheckResponse, CoreError> {
    let start = Instant::now();

    if req.transaction_id.trim().is_empty() {
        return Err(CoreError::SchemaViolation("transaction_id is required".to_string()));
    }

    let idem_key = idempotency_key(&client.id, &req.transaction_id);
    if let Some(cached) = state.cache.get(&idem_key) {
        if let Ok(response) = serde_json::from_value::<FraudCheckResponse>(cached) {
            return Ok(response);
        }
    }

    let ctx = state
        .assembler()
        .assemble(&client.id, req.vertical, req, true)
        .await?;

    let policy = state.policy.current();
    let fired = rules::evaluate(&ctx, &state.rules, &policy);

    let ml_outcome = if state.config.ml_enabled {
        crate::ml::predict_with_deadline(state.ml.as_ref(), &ctx, state.config.ml_timeout_ms).await
    } else {
        None
    };

    let result = crate::aggregator::aggregate(fired, req.vertical, ml_outcome, &policy, None);

    let now = chrono::Utc::now().timestamp();
    let context_digest_snapshot = serde_json::json!({
        "user": ctx.user_digest,
        "device_id": ctx.device_id_digest,
        "device_fingerprint": ctx.device_fingerprint_digest,
        "ip": ctx.ip_digest,
        "email": ctx.email_digest,
        "phone": ctx.phone_digest,
        "national_id": ctx.national_id_digest,
        "wallet": ctx.wallet_digest,
    })
    .to_string();
    let flags_json = serde_json::to_string(&result.flags).unwrap_or_else(|_| "[]".to_string());

    let persisted = PersistedTransaction {
        tenant_id: client.id.clone(),
        transaction_id: req.transaction_id.clone(),
        vertical: req.vertical,
        context_digest_snapshot,
        score: result.score,
        level: result.level.as_str().to_string(),
        decision: result.decision.as_str().to_string(),
        flags_json,
        latency_ms: start.elapsed().as_millis() as u64,
        ruleset_version: env!("CARGO_PKG_VERSION").to_string(),
        outcome: None,
        fraud_type: None,
        created_at: now,
    };
    state.store.insert_transaction_if_absent(&persisted).await?;

    if let (Some(url), Some(secret)) = (&client.webhook_url, &client.webhook_secret) {
        if let Some(payload) = crate::webhook::WebhookPayload::for_decision(
            req.transaction_id.clone(),
            result.score,
            result.level,
            result.decision,
            result.flags.clone(),
            now,
        ) {
            let sender = state.webhook.clone();
            let url = url.clone();
            let secret = secret.clone();
            tokio::spawn(async move {
                sender.deliver(&url, &secret, &payload).await;
            });
        }
    }

    let response = FraudCheckResponse {
        transaction_id: req.transaction_id.clone(),
        risk_score: result.score,
        risk_level: result.level.as_str().to_string(),
        decision: result.decision.as_str().to_string(),
        flags: result.flags,
        recommendation: result.recommendation,
        processing_time_ms: start.elapsed().as_millis() as u64,
        degraded: ctx.degraded,
    };

    if let Ok(value) = serde_json::to_value(&response) {
        state
            .cache
            .set(&idem_key, value, Duration::from_secs(state.config.cache_ttl_seconds));
    }

    Ok(response)
}
