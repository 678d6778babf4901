//! Decision aggregator (spec §4.7): turns fired rules plus an optional ML
//! probability into a score, level, decision, and ordered flag list.
//!
//! The algorithm itself is prescribed step-by-step by the spec; this
//! module is the one place it lives, mirroring the teacher's practice of
//! keeping a scoring/decision algorithm in a single small function rather
//! than spreading it across handlers (see `signals::detector` computing a
//! signal's strength in one place and handing a finished value upward).

use crate::models::{Decision, FlagView, RiskLevel};
use crate::ml::MlOutcome;
use crate::policy::VerticalPolicySnapshot;
use crate::rules::FiredRule;

pub struct AggregationResult {
    pub score: u8,
    pub level: RiskLevel,
    pub decision: Decision,
    pub flags: Vec<FlagView>,
    pub recommendation: String,
}

struct Weighted {
    fired: FiredRule,
    weighted_score: f64,
}

/// `top_k` caps the number of flags returned in the response; `None` means
/// unlimited (spec §4.7's default).
pub fn aggregate(
    fired: Vec<FiredRule>,
    vertical: crate::models::Vertical,
    ml: Option<MlOutcome>,
    policy: &VerticalPolicySnapshot,
    top_k: Option<usize>,
) -> AggregationResult {
    let mut weighted: Vec<Weighted> = fired
        .into_iter()
        .map(|f| {
            let weight = policy.weight(f.rule_name, vertical);
            Weighted {
                weighted_score: f.base_score * weight,
                fired: f,
            }
        })
        .collect();

    // Sorted by weighted score descending, ties by rule name ascending (I-8).
    weighted.sort_by(|a, b| {
        b.weighted_score
            .partial_cmp(&a.weighted_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.fired.rule_name.cmp(b.fired.rule_name))
    });

    let rules_score = weighted.iter().map(|w| w.weighted_score).sum::<f64>().clamp(0.0, 100.0);

    let final_score = match ml {
        Some(outcome) => 0.7 * (outcome.probability * 100.0) + 0.3 * rules_score,
        None => rules_score,
    };
    let final_score = final_score.clamp(0.0, 100.0);

    let threshold = policy.threshold(vertical) as f64;
    let level = if final_score < 0.6 * threshold {
        RiskLevel::Low
    } else if final_score < threshold {
        RiskLevel::Medium
    } else if final_score < threshold + 15.0 {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    };

    let decision = match level {
        RiskLevel::Low => Decision::Approve,
        RiskLevel::Medium => Decision::Review,
        RiskLevel::High | RiskLevel::Critical => Decision::Decline,
    };

    let recommendation = recommendation_sentence(level, weighted.first().map(|w| &w.fired));

    let flags_all: Vec<FlagView> = weighted
        .iter()
        .map(|w| FlagView {
            rule_name: w.fired.rule_name.to_string(),
            severity: w.fired.severity.as_str().to_string(),
            message: w.fired.message.to_string(),
            score: w.weighted_score,
            confidence: w.fired.confidence,
            metadata: w.fired.metadata.clone(),
        })
        .collect();

    let flags = match top_k {
        Some(k) => flags_all.into_iter().take(k).collect(),
        None => flags_all,
    };

    AggregationResult {
        score: final_score.round() as u8,
        level,
        decision,
        flags,
        recommendation,
    }
}

fn recommendation_sentence(level: RiskLevel, top_flag: Option<&FiredRule>) -> String {
    match (level, top_flag) {
        (RiskLevel::Low, _) => "No significant risk signals detected; approve.".to_string(),
        (RiskLevel::Medium, Some(flag)) => {
            format!("Moderate risk driven primarily by {}; route to manual review.", flag.rule_name)
        }
        (RiskLevel::Medium, None) => "Moderate risk; route to manual review.".to_string(),
        (RiskLevel::High, Some(flag)) => {
            format!("High risk driven primarily by {}; recommend decline.", flag.rule_name)
        }
        (RiskLevel::High, None) => "High risk; recommend decline.".to_string(),
        (RiskLevel::Critical, Some(flag)) => {
            format!("Critical risk driven primarily by {}; decline immediately.", flag.rule_name)
        }
        (RiskLevel::Critical, None) => "Critical risk; decline immediately.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Severity, Vertical};
    use std::collections::HashMap;

    fn fired(name: &'static str, severity: Severity, base_score: f64, confidence: f64) -> FiredRule {
        FiredRule {
            rule_name: name,
            severity,
            base_score,
            confidence,
            message: "test message",
            metadata: serde_json::json!({}),
        }
    }

    fn policy_with_threshold(vertical: Vertical, threshold: u8) -> VerticalPolicySnapshot {
        let mut thresholds = HashMap::new();
        thresholds.insert(vertical, threshold);
        VerticalPolicySnapshot::from_thresholds(thresholds)
    }

    #[test]
    fn rules_only_scoring_clamped_to_100() {
        let policy = policy_with_threshold(Vertical::Fintech, 60);
        let fired = vec![
            fired("a", Severity::Critical, 60.0, 0.9),
            fired("b", Severity::Critical, 60.0, 0.9),
        ];
        let result = aggregate(fired, Vertical::Fintech, None, &policy, None);
        assert_eq!(result.score, 100);
        assert_eq!(result.level, RiskLevel::Critical);
        assert_eq!(result.decision, Decision::Decline);
    }

    #[test]
    fn ml_blend_uses_0_7_0_3_weighting() {
        let policy = policy_with_threshold(Vertical::Fintech, 60);
        let fired = vec![fired("a", Severity::Medium, 30.0, 0.7)];
        let result = aggregate(
            fired,
            Vertical::Fintech,
            Some(MlOutcome { probability: 0.9 }),
            &policy,
            None,
        );
        // final = 0.7*90 + 0.3*30 = 63 + 9 = 72
        assert_eq!(result.score, 72);
    }

    #[test]
    fn flags_sorted_by_weighted_score_desc_ties_by_name() {
        let policy = policy_with_threshold(Vertical::Fintech, 60);
        let fired = vec![
            fired("zzz", Severity::Low, 10.0, 0.5),
            fired("aaa", Severity::Low, 10.0, 0.5),
            fired("big", Severity::High, 50.0, 0.8),
        ];
        let result = aggregate(fired, Vertical::Fintech, None, &policy, None);
        let names: Vec<&str> = result.flags.iter().map(|f| f.rule_name.as_str()).collect();
        assert_eq!(names, vec!["big", "aaa", "zzz"]);
    }

    #[test]
    fn top_k_caps_flag_list() {
        let policy = policy_with_threshold(Vertical::Fintech, 60);
        let fired = vec![
            fired("a", Severity::Low, 10.0, 0.5),
            fired("b", Severity::Low, 20.0, 0.5),
            fired("c", Severity::Low, 30.0, 0.5),
        ];
        let result = aggregate(fired, Vertical::Fintech, None, &policy, Some(2));
        assert_eq!(result.flags.len(), 2);
    }

    #[test]
    fn weight_multiplier_applied_before_clamping() {
        let policy = policy_with_threshold(Vertical::Lending, 65).with_weight("loan_stacking", Vertical::Lending, 1.5);
        let fired = vec![fired("loan_stacking", Severity::Critical, 40.0, 0.85)];
        let result = aggregate(fired, Vertical::Lending, None, &policy, None);
        assert_eq!(result.flags[0].score, 60.0);
    }

    #[test]
    fn scenario_s1_reaches_critical_decline() {
        // S1: new_account_large_amount (35) + loan_stacking (40 * 1.5 weight) in lending (threshold 65)
        let policy = policy_with_threshold(Vertical::Lending, 65).with_weight("loan_stacking", Vertical::Lending, 1.5);
        let fired = vec![
            fired("new_account_large_amount", Severity::High, 35.0, 0.8),
            fired("loan_stacking", Severity::Critical, 40.0, 0.85),
        ];
        let result = aggregate(fired, Vertical::Lending, None, &policy, None);
        assert!(result.score >= 80, "score was {}", result.score);
        assert_eq!(result.level, RiskLevel::Critical);
        assert_eq!(result.decision, Decision::Decline);
    }

    #[test]
    fn scenario_s2_sim_swap_decline_for_crypto_review_for_lending() {
        // Same sim_swap_pattern base/confidence as S2, but the vertical's own
        // threshold decides whether the resulting level is high/critical
        // (decline) or merely medium (review).
        let base = vec![fired("sim_swap_pattern", Severity::Critical, 45.0, 0.88)];

        // crypto threshold 50: band edges are 30/50/65; a score of 45 already
        // clears "medium" and approaches "high".
        let crypto_policy = policy_with_threshold(Vertical::Crypto, 50).with_weight("sim_swap_pattern", Vertical::Crypto, 1.5);
        let crypto_result = aggregate(base.clone(), Vertical::Crypto, None, &crypto_policy, None);
        assert!(crypto_result.score >= 65, "score was {}", crypto_result.score);
        assert_eq!(crypto_result.decision, Decision::Decline);

        // lending threshold 65: the same base flag, unweighted, lands in the
        // medium band (39..65) and is routed to review instead of decline.
        let lending_policy = policy_with_threshold(Vertical::Lending, 65);
        let lending_result = aggregate(base, Vertical::Lending, None, &lending_policy, None);
        assert_eq!(lending_result.decision, Decision::Review);
    }
}
