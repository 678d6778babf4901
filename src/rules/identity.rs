//! Identity-category rules (spec §4.4): disposable email domains, the
//! SIM-swap pattern (scenario S2), and contact-change-then-withdrawal.

use crate::models::Severity;
use crate::rules::{RuleDescriptor, RuleHit};

const DISPOSABLE_EMAIL_DOMAINS: &[&str] = &[
    "mailinator.com",
    "tempmail.com",
    "10minutemail.com",
    "guerrillamail.com",
    "trashmail.com",
];

const CASH_OUT_TRANSACTION_TYPES: &[&str] = &["loan_disbursement", "withdrawal", "cash_out", "payout"];

fn is_cash_out(transaction_type: &str) -> bool {
    CASH_OUT_TRANSACTION_TYPES.contains(&transaction_type)
}

pub fn rules() -> Vec<RuleDescriptor> {
    vec![
        RuleDescriptor {
            name: "disposable_email_domain",
            severity: Severity::Medium,
            base_score: 15.0,
            confidence: 0.75,
            message: "email domain is a known disposable-address provider",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                let domain = ctx.features.identity.as_ref().and_then(|i| i.email_domain.as_deref())?;
                if DISPOSABLE_EMAIL_DOMAINS.contains(&domain.to_lowercase().as_str()) {
                    Some(RuleHit::with(serde_json::json!({ "domain": domain })))
                } else {
                    None
                }
            }),
        },
        // S2: phone_changed_recently=true, new device_id, transaction_type=loan_disbursement.
        RuleDescriptor {
            name: "sim_swap_pattern",
            severity: Severity::Critical,
            base_score: 45.0,
            confidence: 0.88,
            message: "recent phone change combined with a new device on a cash-out transaction",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                let phone_changed = ctx
                    .features
                    .identity
                    .as_ref()
                    .and_then(|i| i.phone_changed_recently)
                    == Some(true);
                if phone_changed && ctx.is_new_device == Some(true) && is_cash_out(&ctx.transaction_type) {
                    Some(RuleHit::with(serde_json::json!({
                        "transaction_type": ctx.transaction_type,
                    })))
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "contact_change_then_withdrawal",
            severity: Severity::High,
            base_score: 30.0,
            confidence: 0.78,
            message: "contact details changed recently and this transaction withdraws funds",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                let contact_changed = ctx
                    .features
                    .identity
                    .as_ref()
                    .and_then(|i| i.contact_changed_recently)
                    == Some(true);
                if contact_changed && is_cash_out(&ctx.transaction_type) {
                    Some(RuleHit::empty())
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
    use crate::models::IdentityFeatures;
    use crate::rules::tests_support::base_ctx;

    #[test]
    fn sim_swap_requires_all_three_conditions() {
        let mut ctx = base_ctx();
        ctx.transaction_type = "loan_disbursement".into();
        ctx.is_new_device = Some(true);
        ctx.features.identity = Some(IdentityFeatures {
            phone_changed_recently: Some(true),
            ..Default::default()
        });
        let rule = rules().into_iter().find(|r| r.name == "sim_swap_pattern").unwrap();
        let hit = (rule.check)(&ctx);
        assert!(hit.is_some());
        assert_eq!(rule.base_score, 45.0);
        assert_eq!(rule.confidence, 0.88);
        assert_eq!(rule.severity, Severity::Critical);
    }

    #[test]
    fn sim_swap_does_not_fire_without_new_device() {
        let mut ctx = base_ctx();
        ctx.transaction_type = "loan_disbursement".into();
        ctx.is_new_device = Some(false);
        ctx.features.identity = Some(IdentityFeatures {
            phone_changed_recently: Some(true),
            ..Default::default()
        });
        let rule = rules().into_iter().find(|r| r.name == "sim_swap_pattern").unwrap();
        assert!((rule.check)(&ctx).is_none());
    }

    #[test]
    fn disposable_email_domain_matches_case_insensitively() {
        let mut ctx = base_ctx();
        ctx.features.identity = Some(IdentityFeatures {
            email_domain: Some("Mailinator.com".into()),
            ..Default::default()
        });
        let rule = rules().into_iter().find(|r| r.name == "disposable_email_domain").unwrap();
        assert!((rule.check)(&ctx).is_some());
    }
}
