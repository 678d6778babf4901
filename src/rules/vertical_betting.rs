//! Betting/gaming-vertical rules (spec §4.4): bonus abuse via a device
//! shared at signup, withdrawal without wagering, and excessive withdrawals.

use crate::models::{Severity, Vertical};
use crate::rules::{RuleDescriptor, RuleHit};

const BETTING_GAMING: &[Vertical] = &[Vertical::Betting, Vertical::Gaming];

const WITHDRAWAL_LIMIT_24H: u32 = 5;

pub fn rules() -> Vec<RuleDescriptor> {
    vec![
        RuleDescriptor {
            name: "bonus_abuse_shared_device",
            severity: Severity::High,
            base_score: 28.0,
            confidence: 0.75,
            message: "signup bonus claimed on a device already linked to other accounts",
            applicable_verticals: Some(BETTING_GAMING),
            check: Box::new(|ctx| {
                let claimed_at_signup = ctx.features.derived.as_ref().and_then(|d| d.bonus_claimed_at_signup) == Some(true);
                if claimed_at_signup && ctx.is_device_shared == Some(true) {
                    Some(RuleHit::empty())
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "withdrawal_without_wagering",
            severity: Severity::Critical,
            base_score: 38.0,
            confidence: 0.8,
            message: "withdrawal requested before the deposited funds were ever wagered",
            applicable_verticals: Some(BETTING_GAMING),
            check: Box::new(|ctx| {
                let wagered = ctx.features.derived.as_ref().and_then(|d| d.wagering_completed);
                if ctx.transaction_type == "withdrawal" && wagered == Some(false) {
                    Some(RuleHit::empty())
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "excessive_withdrawals",
            severity: Severity::Medium,
            base_score: 18.0,
            confidence: 0.65,
            message: "unusually high number of withdrawals in the last 24 hours",
            applicable_verticals: Some(BETTING_GAMING),
            check: Box::new(|ctx| {
                let count = ctx.features.derived.as_ref().and_then(|d| d.withdrawal_count_24h)?;
                if count >= WITHDRAWAL_LIMIT_24H {
                    Some(RuleHit::with(serde_json::json!({ "withdrawal_count_24h": count })))
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
    fn withdrawal_without_wagering_fires() {
        let mut ctx = base_ctx();
        ctx.transaction_type = "withdrawal".into();
        ctx.features.derived = Some(DerivedHints {
            wagering_completed: Some(false),
            ..Default::default()
        });
        let rule = rules().into_iter().find(|r| r.name == "withdrawal_without_wagering").unwrap();
        assert!((rule.check)(&ctx).is_some());
    }

    #[test]
    fn withdrawal_after_wagering_is_silent() {
        let mut ctx = base_ctx();
        ctx.transaction_type = "withdrawal".into();
        ctx.features.derived = Some(DerivedHints {
            wagering_completed: Some(true),
            ..Default::default()
        });
        let rule = rules().into_iter().find(|r| r.name == "withdrawal_without_wagering").unwrap();
        assert!((rule.check)(&ctx).is_none());
    }
}
