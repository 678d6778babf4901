//! Lending-vertical rules (spec §4.4): loan-stacking (scenario S1) and
//! maximum-amount first transaction.

use crate::models::{Severity, Vertical};
use crate::rules::{RuleDescriptor, RuleHit};

const LENDING: &[Vertical] = &[Vertical::Lending];

/// Total distinct tenants (including the requesting one, since the
/// consortium touch happens before this count is read) that have seen the
/// phone digest on this transaction. S1's "4 other tenants" clears this
/// with room to spare.
const LOAN_STACKING_TENANT_THRESHOLD: u64 = 4;

const MAX_FIRST_TRANSACTION_AMOUNT: f64 = 100_000.0;

pub fn rules() -> Vec<RuleDescriptor> {
    vec![
        RuleDescriptor {
            name: "loan_stacking",
            severity: Severity::Critical,
            base_score: 40.0,
            confidence: 0.85,
            message: "applicant's phone digest has been used across an unusual number of lenders recently",
            applicable_verticals: Some(LENDING),
            check: Box::new(|ctx| {
                let tenant_count = ctx.consortium_tenant_counts.get("phone").copied().unwrap_or(0);
                if tenant_count >= LOAN_STACKING_TENANT_THRESHOLD {
                    Some(RuleHit::with(serde_json::json!({
                        "tenant_count": tenant_count,
                    })))
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "lending_max_first_transaction",
            severity: Severity::High,
            base_score: 25.0,
            confidence: 0.7,
            message: "first loan transaction for this applicant is at or near the maximum allowed amount",
            applicable_verticals: Some(LENDING),
            check: Box::new(|ctx| {
                let is_first = ctx
                    .features
                    .transaction
                    .as_ref()
                    .and_then(|t| t.is_first_transaction_for_user)?;
                if is_first && ctx.amount >= MAX_FIRST_TRANSACTION_AMOUNT {
                    Some(RuleHit::with(serde_json::json!({ "amount": ctx.amount })))
                } else {
                    None
                }
            }),
        },
    ]
}
