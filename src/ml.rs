//! ML adapter (spec §4.5): an optional, pluggable probability source that
//! the aggregator blends with rule scores when present and healthy.
//!
//! The spec treats the model as an external dependency the core must
//! survive losing; `tokio::time::timeout` enforces the soft deadline the
//! same way the teacher bounds its own outbound calls (see
//! `vault::execution`'s use of `tokio::time::timeout` around signed HTTP
//! calls), and a failed/late call degrades to "ML unavailable", not an
//! error.

use std::time::Duration;

use async_trait::async_trait;

use crate::context::EvaluationContext;

#[derive(Debug, Clone, Copy)]
pub struct MlOutcome {
    /// Fraud probability in `[0.0, 1.0]`.
    pub probability: f64,
}

#[async_trait]
pub trait MlAdapter: Send + Sync {
    async fn predict(&self, ctx: &EvaluationContext) -> anyhow::Result<MlOutcome>;
}

/// Disables the ML blend entirely; the aggregator falls back to
/// rules-only scoring (spec §4.7 "if ML unavailable").
pub struct NullMlAdapter;

#[async_trait]
impl MlAdapter for NullMlAdapter {
    async fn predict(&self, _ctx: &EvaluationContext) -> anyhow::Result<MlOutcome> {
        anyhow::bail!("ml adapter not configured")
    }
}

/// Reads `ml_derived.precomputed_fraud_probability` straight from the
/// request's feature bag, standing in for a real model call until one is
/// wired up; a caller-supplied precomputed score is itself a legitimate ML
/// source per spec §3.
pub struct StubMlAdapter;

#[async_trait]
impl MlAdapter for StubMlAdapter {
    async fn predict(&self, ctx: &EvaluationContext) -> anyhow::Result<MlOutcome> {
        let probability = ctx
            .features
            .ml_derived
            .as_ref()
            .and_then(|m| m.precomputed_fraud_probability)
            .ok_or_else(|| anyhow::anyhow!("no precomputed_fraud_probability on this request"))?;
        Ok(MlOutcome {
            probability: probability.clamp(0.0, 1.0),
        })
    }
}

/// Runs `adapter.predict` under the configured soft deadline. Returns
/// `None` on timeout or error — the aggregator treats both as "ML
/// unavailable for this request" rather than failing the request.
pub async fn predict_with_deadline(
    adapter: &dyn MlAdapter,
    ctx: &EvaluationContext,
    timeout_ms: u64,
) -> Option<MlOutcome> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), adapter.predict(ctx)).await {
        Ok(Ok(outcome)) => Some(outcome),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "ml adapter returned error");
            None
        }
        Err(_) => {
            tracing::warn!(timeout_ms, "ml adapter missed soft deadline");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureBag, MlDerivedFeatures, Vertical};

    fn ctx_with_probability(p: Option<f64>) -> EvaluationContext {
        EvaluationContext {
            tenant_id: "t1".into(),
            vertical: Vertical::Fintech,
            transaction_id: "tx1".into(),
            amount: 10.0,
            currency: "USD".into(),
            transaction_type: "purchase".into(),
            declared_country: None,
            user_digest: "u".into(),
            device_id_digest: None,
            device_fingerprint_digest: None,
            ip_digest: None,
            email_digest: None,
            phone_digest: None,
            national_id_digest: None,
            wallet_digest: None,
            user_velocity: Default::default(),
            device_velocity: Default::default(),
            ip_velocity: Default::default(),
            tenant_velocity: Default::default(),
            consortium_tenant_counts: Default::default(),
            consortium_fraud_confirmations: Default::default(),
            is_new_account: None,
            is_very_new_account: None,
            is_night: None,
            is_weekend: None,
            is_business_hours: None,
            is_round_amount: false,
            is_impossible_travel: None,
            implied_travel_speed_kmh: None,
            is_new_device: None,
            is_device_shared: None,
            features: FeatureBag {
                ml_derived: Some(MlDerivedFeatures {
                    precomputed_fraud_probability: p,
                    feature_vector: None,
                }),
                ..Default::default()
            },
            degraded: false,
        }
    }

    #[tokio::test]
    async fn stub_adapter_reads_precomputed_probability() {
        let ctx = ctx_with_probability(Some(0.73));
        let outcome = predict_with_deadline(&StubMlAdapter, &ctx, 50).await.unwrap();
        assert_eq!(outcome.probability, 0.73);
    }

    #[tokio::test]
    async fn stub_adapter_degrades_to_none_without_a_score() {
        let ctx = ctx_with_probability(None);
        assert!(predict_with_deadline(&StubMlAdapter, &ctx, 50).await.is_none());
    }

    #[tokio::test]
    async fn null_adapter_always_degrades_to_none() {
        let ctx = ctx_with_probability(Some(0.9));
        assert!(predict_with_deadline(&NullMlAdapter, &ctx, 50).await.is_none());
    }
}
