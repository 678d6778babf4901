//! Crypto-vertical rules (spec §4.4): new wallet at high value, known
//! suspicious wallet, and P2P velocity.

use crate::models::{Severity, Vertical};
use crate::rules::{RuleDescriptor, RuleHit};

const CRYPTO: &[Vertical] = &[Vertical::Crypto];

const HIGH_VALUE_THRESHOLD: f64 = 5_000.0;
const NEW_WALLET_AGE_DAYS: i64 = 3;
const P2P_VELOCITY_1H_LIMIT: u64 = 5;

pub fn rules() -> Vec<RuleDescriptor> {
    vec![
        RuleDescriptor {
            name: "new_wallet_high_value",
            severity: Severity::High,
            base_score: 30.0,
            confidence: 0.75,
            message: "wallet was created recently and is moving a high-value amount",
            applicable_verticals: Some(CRYPTO),
            check: Box::new(|ctx| {
                let age = ctx.features.derived.as_ref().and_then(|d| d.wallet_age_days)?;
                if age <= NEW_WALLET_AGE_DAYS && ctx.amount >= HIGH_VALUE_THRESHOLD {
                    Some(RuleHit::with(serde_json::json!({ "wallet_age_days": age })))
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "known_suspicious_wallet",
            severity: Severity::Critical,
            base_score: 42.0,
            confidence: 0.85,
            message: "destination wallet is flagged suspicious",
            applicable_verticals: Some(CRYPTO),
            check: Box::new(|ctx| {
                if ctx.features.derived.as_ref().and_then(|d| d.wallet_known_suspicious) == Some(true) {
                    Some(RuleHit::empty())
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "p2p_velocity_exceeded",
            severity: Severity::Medium,
            base_score: 20.0,
            confidence: 0.68,
            message: "unusually high number of peer-to-peer transfers in the last hour",
            applicable_verticals: Some(CRYPTO),
            check: Box::new(|ctx| {
                if ctx.transaction_type != "p2p_transfer" {
                    return None;
                }
                let count = ctx.user_velocity.get(crate::context::VelocityWindow::Hour1);
                if count > P2P_VELOCITY_1H_LIMIT {
                    Some(RuleHit::with(serde_json::json!({ "count_1h": count })))
                } else {
                    None
                }
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DerivedHints;
    use crate::rules::tests_support::base_ctx;

    #[test]
    fn new_wallet_high_value_fires() {
        let mut ctx = base_ctx();
        ctx.amount = 10_000.0;
        ctx.features.derived = Some(DerivedHints {
            wallet_age_days: Some(1),
            ..Default::default()
        });
        let rule = rules().into_iter().find(|r| r.name == "new_wallet_high_value").unwrap();
        assert!((rule.check)(&ctx).is_some());
    }

    #[test]
    fn known_suspicious_wallet_fires() {
        let mut ctx = base_ctx();
        ctx.features.derived = Some(DerivedHints {
            wallet_known_suspicious: Some(true),
            ..Default::default()
        });
        let rule = rules().into_iter().find(|r| r.name == "known_suspicious_wallet").unwrap();
        assert!((rule.check)(&ctx).is_some());
    }
}
