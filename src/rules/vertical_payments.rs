//! Payments/ecommerce-vertical rules (spec §4.4): card-BIN reputation,
//! multiple failed payments, shipping/billing mismatch on a high-value
//! order, and digital goods purchased by a brand-new account.

use crate::models::{Severity, Vertical};
use crate::rules::{RuleDescriptor, RuleHit};

const PAYMENTS_ECOMMERCE: &[Vertical] = &[Vertical::Payments, Vertical::Ecommerce];

const FAILED_PAYMENT_LIMIT_24H: u32 = 3;
const HIGH_VALUE_THRESHOLD: f64 = 2_000.0;

pub fn rules() -> Vec<RuleDescriptor> {
    vec![
        RuleDescriptor {
            name: "card_bin_bad_reputation",
            severity: Severity::High,
            base_score: 28.0,
            confidence: 0.75,
            message: "card BIN is on a known bad-reputation list",
            applicable_verticals: Some(PAYMENTS_ECOMMERCE),
            check: Box::new(|ctx| {
                if ctx.features.funding.as_ref().and_then(|f| f.card_bin_reputation_bad) == Some(true) {
                    Some(RuleHit::empty())
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "multiple_failed_payments",
            severity: Severity::Medium,
            base_score: 18.0,
            confidence: 0.68,
            message: "multiple failed payment attempts in the last 24 hours",
            applicable_verticals: Some(PAYMENTS_ECOMMERCE),
            check: Box::new(|ctx| {
                let count = ctx.features.funding.as_ref().and_then(|f| f.failed_payment_count_24h)?;
                if count >= FAILED_PAYMENT_LIMIT_24H {
                    Some(RuleHit::with(serde_json::json!({ "failed_payment_count_24h": count })))
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "shipping_billing_mismatch_high_value",
            severity: Severity::High,
            base_score: 22.0,
            confidence: 0.7,
            message: "shipping address differs from billing address on a high-value order",
            applicable_verticals: Some(PAYMENTS_ECOMMERCE),
            check: Box::new(|ctx| {
                let abuse = ctx.features.merchant_abuse.as_ref()?;
                let shipping = abuse.shipping_address.as_deref()?;
                let billing = abuse.billing_address.as_deref()?;
                if shipping != billing && ctx.amount >= HIGH_VALUE_THRESHOLD {
                    Some(RuleHit::empty())
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "digital_goods_new_account",
            severity: Severity::Medium,
            base_score: 20.0,
            confidence: 0.65,
            message: "brand-new account purchasing instantly-deliverable digital goods",
            applicable_verticals: Some(PAYMENTS_ECOMMERCE),
            check: Box::new(|ctx| {
                let digital = ctx.features.merchant_abuse.as_ref().and_then(|m| m.is_digital_goods) == Some(true);
                if digital && ctx.is_very_new_account == Some(true) {
                    Some(RuleHit::empty())
                } else {
                    None
                }
            }),
        },
    ]
}
