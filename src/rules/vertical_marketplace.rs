//! Marketplace-vertical rules (spec §4.4): new seller at high value,
//! low-rated seller, and a high-risk category paired with a new buyer.

use crate::models::{Severity, Vertical};
use crate::rules::{RuleDescriptor, RuleHit};

const MARKETPLACE: &[Vertical] = &[Vertical::Marketplace];

const HIGH_VALUE_THRESHOLD: f64 = 1_000.0;
const NEW_SELLER_AGE_DAYS: i64 = 14;
const LOW_SELLER_RATING: f64 = 2.5;

pub fn rules() -> Vec<RuleDescriptor> {
    vec![
        RuleDescriptor {
            name: "new_seller_high_value",
            severity: Severity::High,
            base_score: 26.0,
            confidence: 0.72,
            message: "seller account is new and listing a high-value item",
            applicable_verticals: Some(MARKETPLACE),
            check: Box::new(|ctx| {
                let age = ctx.features.merchant_abuse.as_ref().and_then(|m| m.seller_account_age_days)?;
                if age <= NEW_SELLER_AGE_DAYS && ctx.amount >= HIGH_VALUE_THRESHOLD {
                    Some(RuleHit::with(serde_json::json!({ "seller_account_age_days": age })))
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "low_rated_seller",
            severity: Severity::Medium,
            base_score: 16.0,
            confidence: 0.6,
            message: "seller rating is below the trusted threshold",
            applicable_verticals: Some(MARKETPLACE),
            check: Box::new(|ctx| {
                let rating = ctx.features.merchant_abuse.as_ref().and_then(|m| m.seller_rating)?;
                if rating < LOW_SELLER_RATING {
                    Some(RuleHit::with(serde_json::json!({ "seller_rating": rating })))
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "high_risk_category_new_buyer",
            severity: Severity::Medium,
            base_score: 20.0,
            confidence: 0.65,
            message: "high-risk merchandise category purchased by a brand-new buyer account",
            applicable_verticals: Some(MARKETPLACE),
            check: Box::new(|ctx| {
                let high_risk = ctx.features.merchant_abuse.as_ref().and_then(|m| m.merchant_category_high_risk) == Some(true);
                if high_risk && ctx.is_very_new_account == Some(true) {
                    Some(RuleHit::empty())
                } else {
                    None
                }
            }),
        },
    ]
}
