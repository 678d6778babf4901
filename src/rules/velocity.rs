//! Velocity-category rules (spec §4.4): too many events in a window, and a
//! first transaction submitted at an unusually high amount.

use crate::context::VelocityWindow;
use crate::models::Severity;
use crate::rules::{RuleDescriptor, RuleHit};

/// (window, max allowed events before the rule fires) pairs, per §4.4
/// "for each (w, k) configured pair".
const USER_VELOCITY_LIMITS: &[(VelocityWindow, u64)] = &[
    (VelocityWindow::Minute1, 3),
    (VelocityWindow::Minute10, 8),
    (VelocityWindow::Hour1, 15),
    (VelocityWindow::Hour24, 40),
];

const FIRST_TRANSACTION_MAX_AMOUNT: f64 = 5_000.0;

fn user_velocity_rule(window: VelocityWindow, limit: u64, name: &'static str) -> RuleDescriptor {
    RuleDescriptor {
        name,
        severity: Severity::Medium,
        base_score: 18.0,
        confidence: 0.7,
        message: "user exceeded the configured transaction velocity for this window",
        applicable_verticals: None,
        check: Box::new(move |ctx| {
            let count = ctx.user_velocity.get(window);
            if count > limit {
                Some(RuleHit::with(serde_json::json!({
                    "window": format!("{window:?}"),
                    "count": count,
                    "limit": limit,
                })))
            } else {
                None
            }
        }),
    }
}

pub fn rules() -> Vec<RuleDescriptor> {
    let mut rules: Vec<RuleDescriptor> = USER_VELOCITY_LIMITS
        .iter()
        .map(|(window, limit)| {
            let name: &'static str = match window {
                VelocityWindow::Minute1 => "user_velocity_1m",
                VelocityWindow::Minute10 => "user_velocity_10m",
                VelocityWindow::Hour1 => "user_velocity_1h",
                VelocityWindow::Hour24 => "user_velocity_24h",
                VelocityWindow::Day7 => "user_velocity_7d",
            };
            user_velocity_rule(*window, *limit, name)
        })
        .collect();

    rules.push(RuleDescriptor {
        name: "first_transaction_at_maximum",
        severity: Severity::High,
        base_score: 28.0,
        confidence: 0.72,
        message: "first transaction for this user is unusually large",
        applicable_verticals: None,
        check: Box::new(|ctx| {
            let is_first = ctx
                .features
                .transaction
                .as_ref()
                .and_then(|t| t.is_first_transaction_for_user)?;
            if is_first && ctx.amount >= FIRST_TRANSACTION_MAX_AMOUNT {
                Some(RuleHit::with(serde_json::json!({ "amount": ctx.amount })))
            } else {
                None
            }
        }),
    });

    rules
}
