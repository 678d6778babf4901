//! Account-category rules (spec §4.4): new-account + large amount, dormant
//! reactivation, sequential-account email pattern.

use crate::models::Severity;
use crate::rules::{RuleDescriptor, RuleHit};

const LARGE_AMOUNT_THRESHOLD: f64 = 10_000.0;
const DORMANT_DAYS: i64 = 90;

pub fn rules() -> Vec<RuleDescriptor> {
    vec![
        RuleDescriptor {
            name: "new_account_large_amount",
            severity: Severity::High,
            base_score: 35.0,
            confidence: 0.8,
            message: "new account transacting a large amount",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                if ctx.is_new_account == Some(true) && ctx.amount >= LARGE_AMOUNT_THRESHOLD {
                    Some(RuleHit::with(serde_json::json!({
                        "amount": ctx.amount,
                    })))
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "dormant_reactivation_large_amount",
            severity: Severity::Medium,
            base_score: 20.0,
            confidence: 0.7,
            message: "dormant account reactivated with a large transaction",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                let last_activity = ctx
                    .features
                    .behavioral
                    .as_ref()
                    .and_then(|b| b.last_activity_days_ago)?;
                if last_activity >= DORMANT_DAYS && ctx.amount >= LARGE_AMOUNT_THRESHOLD {
                    Some(RuleHit::with(serde_json::json!({
                        "last_activity_days_ago": last_activity,
                    })))
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "sequential_account_email_pattern",
            severity: Severity::Medium,
            base_score: 15.0,
            confidence: 0.6,
            message: "account email follows a sequential/bulk-registration pattern",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                if ctx
                    .features
                    .behavioral
                    .as_ref()
                    .and_then(|b| b.sequential_email_pattern)
                    == Some(true)
                {
                    Some(RuleHit::empty())
                } else {
                    None
                }
            }),
        },
    ]
}
