//! Core data model (spec §3): clients, transaction requests/records, flags,
//! rule descriptors, rule-accuracy aggregates, vertical policy, consortium
//! and velocity types live in their owning modules (`policy`, `store`); this
//! file holds the request/response wire shapes and the feature bag.
//!
//! Every nested feature category is `Option`; every leaf inside a category
//! is also `Option`. Absence is a first-class variant distinct from a
//! present-but-false/zero value — several rules key off exactly that
//! distinction (spec §9, "Feature bags").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vertical {
    Lending,
    Fintech,
    Payments,
    Crypto,
    Ecommerce,
    Betting,
    Gaming,
    Marketplace,
}

impl Vertical {
    pub fn as_str(self) -> &'static str {
        match self {
            Vertical::Lending => "lending",
            Vertical::Fintech => "fintech",
            Vertical::Payments => "payments",
            Vertical::Crypto => "crypto",
            Vertical::Ecommerce => "ecommerce",
            Vertical::Betting => "betting",
            Vertical::Gaming => "gaming",
            Vertical::Marketplace => "marketplace",
        }
    }

    pub fn all() -> &'static [Vertical] {
        &[
            Vertical::Lending,
            Vertical::Fintech,
            Vertical::Payments,
            Vertical::Crypto,
            Vertical::Ecommerce,
            Vertical::Betting,
            Vertical::Gaming,
            Vertical::Marketplace,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Review,
    Decline,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Review => "review",
            Decision::Decline => "decline",
        }
    }

    pub fn from_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => Decision::Approve,
            RiskLevel::Medium => Decision::Review,
            RiskLevel::High | RiskLevel::Critical => Decision::Decline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Fraud,
    Legitimate,
}

/// Device fingerprint component bag: raw string key/value pairs (user
/// agent, canvas hash, screen resolution, ...). Opaque to rules except via
/// the derived booleans the context assembler computes from it.
pub type DeviceComponents = HashMap<String, String>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityFeatures {
    pub email_domain: Option<String>,
    pub phone_changed_recently: Option<bool>,
    pub contact_changed_recently: Option<bool>,
    pub national_id_provided: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehavioralFeatures {
    pub account_age_days: Option<i64>,
    pub last_activity_days_ago: Option<i64>,
    pub sequential_email_pattern: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFeatures {
    pub is_first_transaction_for_user: Option<bool>,
    pub previous_declines_24h: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkFeatures {
    pub is_vpn_or_proxy: Option<bool>,
    pub ip_country: Option<String>,
    pub ip_latitude: Option<f64>,
    pub ip_longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AtoFeatures {
    pub failed_login_attempts_24h: Option<u32>,
    pub password_reset_recently: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundingFeatures {
    pub funding_source_type: Option<String>,
    pub card_bin: Option<String>,
    pub card_last4: Option<String>,
    pub failed_payment_count_24h: Option<u32>,
    pub card_bin_reputation_bad: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MerchantAbuseFeatures {
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub is_digital_goods: Option<bool>,
    pub seller_account_age_days: Option<i64>,
    pub seller_rating: Option<f64>,
    pub merchant_category_high_risk: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MlDerivedFeatures {
    pub precomputed_fraud_probability: Option<f64>,
    pub feature_vector: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivedHints {
    pub wagering_completed: Option<bool>,
    pub bonus_claimed_at_signup: Option<bool>,
    pub wallet_age_days: Option<i64>,
    pub wallet_known_suspicious: Option<bool>,
    pub withdrawal_count_24h: Option<u32>,
}

/// The nine feature categories from spec §3. Every category is optional;
/// an absent category means "unknown", never "zero" or "false".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureBag {
    pub identity: Option<IdentityFeatures>,
    pub behavioral: Option<BehavioralFeatures>,
    pub transaction: Option<TransactionFeatures>,
    pub network: Option<NetworkFeatures>,
    pub ato: Option<AtoFeatures>,
    pub funding: Option<FundingFeatures>,
    pub merchant_abuse: Option<MerchantAbuseFeatures>,
    pub ml_derived: Option<MlDerivedFeatures>,
    pub derived: Option<DerivedHints>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub transaction_id: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub transaction_type: String,
    pub vertical: Vertical,
    pub device_id: Option<String>,
    pub device_fingerprint: Option<String>,
    pub device_components: Option<DeviceComponents>,
    pub ip: Option<String>,
    pub country: Option<String>,
    /// RFC3339 timestamp carrying its own offset; §9 fixes time-of-day
    /// derivations to this offset when present, UTC otherwise.
    pub timestamp: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub national_id: Option<String>,
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub features: FeatureBag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagView {
    #[serde(rename = "type")]
    pub rule_name: String,
    pub severity: String,
    pub message: String,
    pub score: f64,
    pub confidence: f64,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudCheckResponse {
    pub transaction_id: String,
    pub risk_score: u8,
    pub risk_level: String,
    pub decision: String,
    pub flags: Vec<FlagView>,
    pub recommendation: String,
    pub processing_time_ms: u64,
    pub degraded: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub transaction_id: String,
    pub actual_outcome: Outcome,
    pub fraud_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub transaction_id: String,
    pub outcome: Outcome,
    pub rules_updated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_category_is_not_false() {
        let bag = FeatureBag::default();
        assert!(bag.identity.is_none());
        assert!(bag.network.is_none());
    }

    #[test]
    fn decision_derives_from_level() {
        assert_eq!(Decision::from_level(RiskLevel::Low), Decision::Approve);
        assert_eq!(Decision::from_level(RiskLevel::Medium), Decision::Review);
        assert_eq!(Decision::from_level(RiskLevel::High), Decision::Decline);
        assert_eq!(Decision::from_level(RiskLevel::Critical), Decision::Decline);
    }
}
