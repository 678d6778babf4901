//! Feedback-driven learning loop (spec §4.8): updates rule weights and
//! consortium fraud-confirmation counters from a tenant's reported ground
//! truth on a past transaction.
//!
//! Grounded in shape on the teacher's `vault_db` read-then-write pattern,
//! but the "single transactional update per feedback" failure model (spec
//! §4.8) is this module's own contract: any individual rule's accuracy
//! update can fail without corrupting another rule's weight.

use crate::error::CoreError;
use crate::models::{FeedbackRequest, FeedbackResponse, Outcome, Vertical};
use crate::policy::PolicyStore;
use crate::rules::RuleDescriptor;
use crate::store::Store;

const MIN_SAMPLE_SIZE: u64 = 50;

/// Recomputes one rule's weight multiplier from its updated accuracy
/// counters (spec §4.8 step 4). Rules below the minimum sample size stay
/// at the registry default.
fn recompute_weight(true_positive: u64, false_positive: u64, old_weight: f64) -> f64 {
    let sample = true_positive + false_positive;
    if sample < MIN_SAMPLE_SIZE {
        return old_weight;
    }
    let precision = true_positive as f64 / sample as f64;
    (old_weight * (0.5 + precision)).clamp(0.1, 3.0)
}

pub struct LearningLoop<'a> {
    pub store: &'a Store,
    pub policy: &'a PolicyStore,
}

impl<'a> LearningLoop<'a> {
    /// Applies one feedback submission. Returns how many rules' accuracy
    /// counters were updated (spec §4.8 steps 3-6).
    pub async fn apply(
        &self,
        tenant_id: &str,
        req: &FeedbackRequest,
        all_rules: &[RuleDescriptor],
    ) -> Result<FeedbackResponse, CoreError> {
        let tx = self
            .store
            .get_transaction(tenant_id, &req.transaction_id)
            .await?
            .ok_or(CoreError::NotFound)?;

        if let Some(existing) = tx.outcome {
            if existing == req.actual_outcome {
                return Ok(FeedbackResponse {
                    transaction_id: req.transaction_id.clone(),
                    outcome: existing,
                    rules_updated: 0,
                });
            }
            return Err(CoreError::OutcomeConflict);
        }

        let set = self
            .store
            .set_outcome(tenant_id, &req.transaction_id, req.actual_outcome, req.fraud_type.as_deref())
            .await?;
        if !set {
            // Lost a race with a concurrent feedback submission; the first
            // submission wins (spec §4.8 "Failure model").
            return Err(CoreError::OutcomeConflict);
        }

        let fired = Store::parse_flags(&tx);
        let fired_names: std::collections::HashSet<&str> = fired.iter().map(|f| f.rule_name.as_str()).collect();
        let vertical = tx.vertical;
        let applicable: Vec<&RuleDescriptor> = all_rules.iter().filter(|r| r.applies_to(vertical)).collect();

        let mut updated = 0usize;
        for rule in applicable {
            let did_fire = fired_names.contains(rule.name);
            let is_fraud = req.actual_outcome == Outcome::Fraud;
            let (tp, fp, tn, fnc) = match (did_fire, is_fraud) {
                (true, true) => (1, 0, 0, 0),
                (true, false) => (0, 1, 0, 0),
                (false, true) => (0, 0, 0, 1),
                (false, false) => (0, 0, 1, 0),
            };

            let accuracy = self.store.get_rule_accuracy(rule.name, vertical).await?;
            let new_weight = recompute_weight(accuracy.true_positive + tp, accuracy.false_positive + fp, accuracy.weight);
            self.store
                .upsert_rule_accuracy(rule.name, vertical, tp, fp, tn, fnc, new_weight)
                .await?;
            self.policy.update_weight(rule.name, vertical, new_weight);
            updated += 1;
        }

        if req.actual_outcome == Outcome::Fraud {
            for digest in extract_digests(&tx.context_digest_snapshot) {
                self.store.increment_fraud_confirmation(&digest).await?;
            }
        }

        Ok(FeedbackResponse {
            transaction_id: req.transaction_id.clone(),
            outcome: req.actual_outcome,
            rules_updated: updated,
        })
    }
}

/// The persisted "context digest snapshot" is a JSON object of digest
/// kind -> digest value; this extracts the values so fraud confirmations
/// can be recorded against every identity the transaction touched (spec
/// §4.8 step 5).
fn extract_digests(snapshot_json: &str) -> Vec<String> {
    let value: serde_json::Value = match serde_json::from_str(snapshot_json) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };
    match value.as_object() {
        Some(map) => map
            .values()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect(),
        None => Vec::new(),
    }
}
