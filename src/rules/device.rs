//! Device-category rules (spec §4.4): new device + large amount, device
//! shared across many users, fingerprint history fraud, velocity on device.

use crate::models::Severity;
use crate::rules::{RuleDescriptor, RuleHit};

const LARGE_AMOUNT_THRESHOLD: f64 = 10_000.0;
const DEVICE_VELOCITY_1H_LIMIT: u64 = 5;
const FINGERPRINT_FRAUD_CONFIRMATION_MIN: u64 = 1;

pub fn rules() -> Vec<RuleDescriptor> {
    vec![
        RuleDescriptor {
            name: "new_device_large_amount",
            severity: Severity::High,
            base_score: 30.0,
            confidence: 0.75,
            message: "unrecognized device used for a large transaction",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                if ctx.is_new_device == Some(true) && ctx.amount >= LARGE_AMOUNT_THRESHOLD {
                    Some(RuleHit::empty())
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "device_shared_across_users",
            severity: Severity::Medium,
            base_score: 25.0,
            confidence: 0.65,
            message: "device has been used by an unusually large number of distinct accounts",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                if ctx.is_device_shared == Some(true) {
                    Some(RuleHit::empty())
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "fingerprint_history_fraud",
            severity: Severity::Critical,
            base_score: 40.0,
            confidence: 0.85,
            message: "device fingerprint is linked to a confirmed fraud elsewhere in the consortium",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                let confirmations = ctx
                    .consortium_fraud_confirmations
                    .get("device_fingerprint")
                    .copied()
                    .unwrap_or(0);
                if confirmations >= FINGERPRINT_FRAUD_CONFIRMATION_MIN {
                    Some(RuleHit::with(serde_json::json!({
                        "fraud_confirmations": confirmations,
                    })))
                } else {
                    None
                }
            }),
        },
        RuleDescriptor {
            name: "device_velocity_exceeded",
            severity: Severity::Medium,
            base_score: 20.0,
            confidence: 0.7,
            message: "device used for an unusually high number of transactions in the last hour",
            applicable_verticals: None,
            check: Box::new(|ctx| {
                let count = ctx.device_velocity.get(crate::context::VelocityWindow::Hour1);
                if count > DEVICE_VELOCITY_1H_LIMIT {
                    Some(RuleHit::with(serde_json::json!({ "count_1h": count })))
                } else {
                    None
                }
            }),
        },
    ]
}
