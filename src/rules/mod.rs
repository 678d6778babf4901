//! Rule registry (spec §4.4): a flat list of pure, named checks against an
//! `EvaluationContext`. Every rule is data (severity, base score,
//! confidence, applicable verticals) plus one function pointer; there is
//! no inheritance or rule-specific state.
//!
//! Grounded on the teacher's `signals::detector::SignalDetector`, whose
//! `detect_*` methods are each a pure function from a snapshot to
//! `Option<MarketSignal>`; the registry here generalizes that into a table
//! so rules can be added without touching the aggregator.

mod account;
mod device;
mod geo_network;
mod identity;
mod vertical_betting;
mod vertical_crypto;
mod vertical_lending;
mod vertical_marketplace;
mod vertical_payments;
mod velocity;

use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;

use crate::context::EvaluationContext;
use crate::models::{Severity, Vertical};
use crate::policy::VerticalPolicySnapshot;

/// What a fired rule contributes beyond its static descriptor fields:
/// free-form detail for the response's flag metadata.
#[derive(Debug, Clone)]
pub struct RuleHit {
    pub metadata: serde_json::Value,
}

impl RuleHit {
    pub fn empty() -> Self {
        Self {
            metadata: serde_json::json!({}),
        }
    }

    pub fn with(metadata: serde_json::Value) -> Self {
        Self { metadata }
    }
}

pub struct RuleDescriptor {
    pub name: &'static str,
    pub severity: Severity,
    pub base_score: f64,
    pub confidence: f64,
    pub message: &'static str,
    /// `None` means "applicable in every vertical".
    pub applicable_verticals: Option<&'static [Vertical]>,
    /// Boxed rather than a bare function pointer so parameterized rule
    /// families (e.g. one velocity rule per window) can close over their
    /// own threshold instead of each needing a hand-written fn (spec §9:
    /// "function pointer / closure / interface method" are equivalent here).
    pub check: Box<dyn Fn(&EvaluationContext) -> Option<RuleHit> + Send + Sync>,
}

impl RuleDescriptor {
    pub fn applies_to(&self, vertical: Vertical) -> bool {
        match self.applicable_verticals {
            None => true,
            Some(verticals) => verticals.contains(&vertical),
        }
    }
}

/// Every rule the engine knows about, assembled from each category module's
/// `rules()` slice. Building this list is the only place new rules need to
/// be registered.
pub fn all_rules() -> Vec<RuleDescriptor> {
    let mut rules = Vec::new();
    rules.extend(account::rules());
    rules.extend(device::rules());
    rules.extend(velocity::rules());
    rules.extend(identity::rules());
    rules.extend(geo_network::rules());
    rules.extend(vertical_lending::rules());
    rules.extend(vertical_payments::rules());
    rules.extend(vertical_betting::rules());
    rules.extend(vertical_crypto::rules());
    rules.extend(vertical_marketplace::rules());
    rules
}

/// A rule that fired, carrying everything the aggregator needs: the
/// descriptor's static fields plus the hit's dynamic metadata.
#[derive(Debug, Clone)]
pub struct FiredRule {
    pub rule_name: &'static str,
    pub severity: Severity,
    pub base_score: f64,
    pub confidence: f64,
    pub message: &'static str,
    pub metadata: serde_json::Value,
}

/// Fans rule evaluation out across a worker pool (spec §5: "rule
/// evaluation fans out to a bounded worker pool... because rules are pure
/// and independent"). A rule that panics is logged and skipped rather than
/// failing the whole request (spec §7 "a single rule throws").
pub fn evaluate(
    ctx: &EvaluationContext,
    rules: &[RuleDescriptor],
    policy: &VerticalPolicySnapshot,
) -> Vec<FiredRule> {
    rules
        .par_iter()
        .filter(|rule| rule.applies_to(ctx.vertical) && policy.is_enabled(rule.name, ctx.vertical))
        .filter_map(|rule| {
            match catch_unwind(AssertUnwindSafe(|| (rule.check)(ctx))) {
                Ok(Some(hit)) => Some(FiredRule {
                    rule_name: rule.name,
                    severity: rule.severity,
                    base_score: rule.base_score,
                    confidence: rule.confidence,
                    message: rule.message,
                    metadata: hit.metadata,
                }),
                Ok(None) => None,
                Err(_) => {
                    tracing::error!(rule = rule.name, "rule check panicked, skipping");
                    None
                }
            }
        })
        .collect()
}

/// Startup-time invariant (spec §4.4 "rule names are unique"): panics
/// rather than silently shadowing a duplicate, since a collision would
/// make weight/accuracy tracking ambiguous.
pub fn validate_unique_names(rules: &[RuleDescriptor]) {
    let mut seen = std::collections::HashSet::new();
    for rule in rules {
        if !seen.insert(rule.name) {
            panic!("duplicate rule name registered: {}", rule.name);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_unique_names() {
        let rules = all_rules();
        assert!(!rules.is_empty());
        validate_unique_names(&rules);
    }

    #[test]
    #[should_panic(expected = "duplicate rule name registered")]
    fn validate_panics_on_duplicate() {
        let dup = RuleDescriptor {
            name: "dup",
            severity: Severity::Low,
            base_score: 1.0,
            confidence: 1.0,
            message: "dup",
            applicable_verticals: None,
            check: Box::new(|_| None),
        };
        let dup2 = RuleDescriptor {
            name: "dup",
            severity: Severity::Low,
            base_score: 1.0,
            confidence: 1.0,
            message: "dup",
            applicable_verticals: None,
            check: Box::new(|_| None),
        };
        validate_unique_names(&[dup, dup2]);
    }

    #[test]
    fn evaluate_skips_disabled_rules_and_wrong_vertical() {
        let always_fires = RuleDescriptor {
            name: "always_fires",
            severity: Severity::Low,
            base_score: 5.0,
            confidence: 1.0,
            message: "always fires",
            applicable_verticals: None,
            check: Box::new(|_| Some(RuleHit::empty())),
        };
        let crypto_only = RuleDescriptor {
            name: "crypto_only",
            severity: Severity::Low,
            base_score: 5.0,
            confidence: 1.0,
            message: "crypto only",
            applicable_verticals: Some(&[Vertical::Crypto]),
            check: Box::new(|_| Some(RuleHit::empty())),
        };
        let panics = RuleDescriptor {
            name: "panics",
            severity: Severity::Low,
            base_score: 5.0,
            confidence: 1.0,
            message: "panics",
            applicable_verticals: None,
            check: Box::new(|_| panic!("boom")),
        };
        let registry = vec![always_fires, crypto_only, panics];
        let ctx = tests_support::base_ctx();
        let policy = VerticalPolicySnapshot::from_thresholds(Default::default())
            .with_disabled("always_fires", Vertical::Fintech);
        let fired = evaluate(&ctx, &registry, &policy);
        assert!(fired.is_empty(), "disabled rule, wrong-vertical rule, and panicking rule should all be excluded");
    }
}
