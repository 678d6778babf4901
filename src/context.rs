//! Context assembly (spec §4.3): turns a raw `TransactionRequest` plus
//! tenant identity into the fully-digested, velocity-annotated
//! `EvaluationContext` that every rule reads.
//!
//! Grounded on the teacher's `signals::detector::SignalDetector`, which
//! takes a raw market snapshot and produces a typed, pre-computed view for
//! its check functions to read — here the "snapshot" is a digested,
//! velocity-enriched transaction instead of an order book.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};

use crate::cache::Cache;
use crate::geo::{haversine_km, implied_speed_kmh, Coordinates};
use crate::hasher::{DigestKind, Hasher};
use crate::models::{FeatureBag, TransactionRequest, Vertical};
use crate::store::Store;

const NEW_ACCOUNT_DAYS: i64 = 7;
const VERY_NEW_ACCOUNT_DAYS: i64 = 3;
const NIGHT_START_HOUR: u32 = 2;
const NIGHT_END_HOUR: u32 = 5;
const BUSINESS_START_HOUR: u32 = 9;
const BUSINESS_END_HOUR: u32 = 17;
const CONSORTIUM_WINDOW_DAYS: i64 = 30;
const DEVICE_SHARING_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VelocityWindow {
    Minute1,
    Minute10,
    Hour1,
    Hour24,
    Day7,
}

impl VelocityWindow {
    pub const ALL: [VelocityWindow; 5] = [
        VelocityWindow::Minute1,
        VelocityWindow::Minute10,
        VelocityWindow::Hour1,
        VelocityWindow::Hour24,
        VelocityWindow::Day7,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            VelocityWindow::Minute1 => "1m",
            VelocityWindow::Minute10 => "10m",
            VelocityWindow::Hour1 => "1h",
            VelocityWindow::Hour24 => "24h",
            VelocityWindow::Day7 => "7d",
        }
    }

    fn duration(self) -> Duration {
        match self {
            VelocityWindow::Minute1 => Duration::from_secs(60),
            VelocityWindow::Minute10 => Duration::from_secs(10 * 60),
            VelocityWindow::Hour1 => Duration::from_secs(60 * 60),
            VelocityWindow::Hour24 => Duration::from_secs(24 * 60 * 60),
            VelocityWindow::Day7 => Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Transaction counts over the five standard windows for one velocity
/// subject (a user, a device, an ip, or a tenant). Each entry is `None`
/// when the subject itself is unknown (no digest to key on) rather than 0.
#[derive(Debug, Clone, Default)]
pub struct VelocityCounts {
    pub counts: HashMap<&'static str, u64>,
}

impl VelocityCounts {
    pub fn get(&self, window: VelocityWindow) -> u64 {
        self.counts.get(window.label()).copied().unwrap_or(0)
    }
}

/// The fully assembled, rule-facing view of one transaction (spec §4.3).
/// Holds only digests and derived scalars — never a raw identifier.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub tenant_id: String,
    pub vertical: Vertical,
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
    pub transaction_type: String,
    pub declared_country: Option<String>,

    pub user_digest: String,
    pub device_id_digest: Option<String>,
    pub device_fingerprint_digest: Option<String>,
    pub ip_digest: Option<String>,
    pub email_digest: Option<String>,
    pub phone_digest: Option<String>,
    pub national_id_digest: Option<String>,
    pub wallet_digest: Option<String>,

    pub user_velocity: VelocityCounts,
    pub device_velocity: VelocityCounts,
    pub ip_velocity: VelocityCounts,
    pub tenant_velocity: VelocityCounts,

    /// Distinct-tenant touch count for each identity digest this
    /// transaction carries, read from the consortium index (spec §9: a
    /// count only, never the originating tenants).
    pub consortium_tenant_counts: HashMap<&'static str, u64>,
    /// Confirmed-fraud count for those same digests.
    pub consortium_fraud_confirmations: HashMap<&'static str, u64>,

    pub is_new_account: Option<bool>,
    pub is_very_new_account: Option<bool>,
    pub is_night: Option<bool>,
    pub is_weekend: Option<bool>,
    pub is_business_hours: Option<bool>,
    pub is_round_amount: bool,
    pub is_impossible_travel: Option<bool>,
    pub implied_travel_speed_kmh: Option<f64>,
    pub is_new_device: Option<bool>,
    pub is_device_shared: Option<bool>,

    pub features: FeatureBag,

    /// Set when any upstream dependency (cache or store) degraded during
    /// assembly; propagated to the response's `degraded` field (spec §4.2).
    pub degraded: bool,
}

fn is_round_amount(amount: f64) -> bool {
    if amount <= 0.0 {
        return false;
    }
    let cents = (amount * 100.0).round() as i64;
    cents % 10_000 == 0
}

fn local_timestamp(raw: Option<&str>) -> DateTime<FixedOffset> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .unwrap_or_else(|| Utc::now().fixed_offset())
}

fn derive_time_hints(ts: DateTime<FixedOffset>) -> (bool, bool, bool) {
    let hour = ts.hour();
    let is_night = (NIGHT_START_HOUR..NIGHT_END_HOUR).contains(&hour);
    let weekday = ts.weekday();
    let is_weekend = matches!(weekday, chrono::Weekday::Sat | chrono::Weekday::Sun);
    let is_business_hours =
        !is_weekend && (BUSINESS_START_HOUR..BUSINESS_END_HOUR).contains(&hour);
    (is_night, is_weekend, is_business_hours)
}

pub struct Assembler<'a> {
    pub hasher: &'a Hasher,
    pub cache: &'a Cache,
    pub store: &'a Store,
    pub impossible_travel_speed_kmh: f64,
    pub device_shared_user_threshold: u64,
}

impl<'a> Assembler<'a> {
    fn velocity_counts(&self, subject_kind: &str, subject_key: Option<&str>) -> VelocityCounts {
        let mut counts = HashMap::new();
        if let Some(key) = subject_key {
            for window in VelocityWindow::ALL {
                let cache_key = format!("velocity:{subject_kind}:{key}:{}", window.label());
                counts.insert(window.label(), self.cache.zrange_count(&cache_key, window.duration()));
            }
        }
        VelocityCounts { counts }
    }

    fn record_velocity(&self, subject_kind: &str, subject_key: Option<&str>) {
        if let Some(key) = subject_key {
            for window in VelocityWindow::ALL {
                let cache_key = format!("velocity:{subject_kind}:{key}:{}", window.label());
                self.cache.zadd_now(&cache_key, window.duration());
            }
        }
    }

    /// Assembles the evaluation context for `req`. `record_velocity` must be
    /// `false` on an idempotent replay (spec I-2, §5): velocity counters are
    /// incremented once per distinct transaction, inside the same
    /// idempotency window the result cache uses, never on a replay that
    /// shares that window.
    pub async fn assemble(
        &self,
        tenant_id: &str,
        vertical: Vertical,
        req: &TransactionRequest,
        record_velocity: bool,
    ) -> anyhow::Result<EvaluationContext> {
        let mut degraded = !self.cache.is_reachable();

        let user_digest = self.hasher.digest(DigestKind::Email, &req.user_id);
        let device_id_digest = self.hasher.digest_opt(DigestKind::DeviceId, req.device_id.as_deref());
        let device_fingerprint_digest = self
            .hasher
            .digest_opt(DigestKind::DeviceFingerprint, req.device_fingerprint.as_deref());
        let ip_digest = self.hasher.digest_opt(DigestKind::Ip, req.ip.as_deref());
        let email_digest = self.hasher.digest_opt(DigestKind::Email, req.email.as_deref());
        let phone_digest = self.hasher.digest_opt(DigestKind::Phone, req.phone.as_deref());
        let national_id_digest = self
            .hasher
            .digest_opt(DigestKind::NationalId, req.national_id.as_deref());
        let wallet_digest = self.hasher.digest_opt(DigestKind::Wallet, req.wallet_address.as_deref());

        // Read velocity before recording this transaction's own event, so a
        // transaction never counts itself (spec §4.3 "velocity is prior activity").
        let user_velocity = self.velocity_counts("user", Some(&user_digest));
        let device_velocity = self.velocity_counts("device", device_id_digest.as_deref());
        let ip_velocity = self.velocity_counts("ip", ip_digest.as_deref());
        let tenant_velocity = self.velocity_counts("tenant", Some(tenant_id));

        if record_velocity {
            self.record_velocity("user", Some(&user_digest));
            self.record_velocity("device", device_id_digest.as_deref());
            self.record_velocity("ip", ip_digest.as_deref());
            self.record_velocity("tenant", Some(tenant_id));
        }

        let mut consortium_tenant_counts = HashMap::new();
        let mut consortium_fraud_confirmations = HashMap::new();
        let consortium_subjects: [(&'static str, &Option<String>); 4] = [
            ("email", &email_digest),
            ("phone", &phone_digest),
            ("device_fingerprint", &device_fingerprint_digest),
            ("national_id", &national_id_digest),
        ];
        for (kind, digest) in consortium_subjects {
            if let Some(d) = digest {
                match self.store.touch_consortium(d, tenant_id).await {
                    Ok(()) => {}
                    Err(_) => degraded = true,
                }
                let tenant_count = self.store.consortium_tenant_count(d, CONSORTIUM_WINDOW_DAYS).await.unwrap_or_else(|_| {
                    degraded = true;
                    0
                });
                let fraud_count = self.store.consortium_fraud_confirmations(d).await.unwrap_or_else(|_| {
                    degraded = true;
                    0
                });
                consortium_tenant_counts.insert(kind, tenant_count);
                consortium_fraud_confirmations.insert(kind, fraud_count);
            }
        }

        let is_new_device = match &device_id_digest {
            Some(digest) => {
                let prior = self.cache.zrange_count(
                    &format!("velocity:device:{digest}:{}", VelocityWindow::Day7.label()),
                    VelocityWindow::Day7.duration(),
                );
                Some(prior <= 1)
            }
            None => None,
        };

        let is_device_shared = match &device_id_digest {
            Some(digest) => {
                self.store.touch_device_user(digest, &user_digest, tenant_id).await.ok();
                let distinct = self
                    .store
                    .distinct_users_on_device(digest, tenant_id, DEVICE_SHARING_WINDOW_DAYS)
                    .await
                    .unwrap_or_else(|_| {
                        degraded = true;
                        0
                    });
                Some(distinct >= self.device_shared_user_threshold)
            }
            None => None,
        };

        let ts = local_timestamp(req.timestamp.as_deref());
        let (is_night, is_weekend, is_business_hours) = derive_time_hints(ts);

        let account_age_days = req
            .features
            .behavioral
            .as_ref()
            .and_then(|b| b.account_age_days);
        let is_new_account = account_age_days.map(|age| age <= NEW_ACCOUNT_DAYS);
        let is_very_new_account = account_age_days.map(|age| age <= VERY_NEW_ACCOUNT_DAYS);

        let current_coords = match (
            req.features.network.as_ref().and_then(|n| n.ip_latitude),
            req.features.network.as_ref().and_then(|n| n.ip_longitude),
        ) {
            (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
            _ => None,
        };

        let (is_impossible_travel, implied_travel_speed_kmh) = match current_coords {
            Some(coords) => {
                let prior = self.store.last_location(tenant_id, &user_digest).await.unwrap_or_else(|_| {
                    degraded = true;
                    None
                });
                let result = match prior {
                    Some((lat, lon, observed_at)) => {
                        let elapsed = (ts.timestamp() - observed_at) as f64;
                        let speed = implied_speed_kmh(Coordinates { lat, lon }, coords, elapsed);
                        let impossible = speed.map(|s| s > self.impossible_travel_speed_kmh);
                        (impossible, speed)
                    }
                    None => (Some(false), None),
                };
                self.store
                    .set_last_location(tenant_id, &user_digest, coords.lat, coords.lon, ts.timestamp())
                    .await
                    .ok();
                result
            }
            None => (None, None),
        };

        Ok(EvaluationContext {
            tenant_id: tenant_id.to_string(),
            vertical,
            transaction_id: req.transaction_id.clone(),
            amount: req.amount,
            currency: req.currency.clone(),
            transaction_type: req.transaction_type.clone(),
            declared_country: req.country.clone(),
            user_digest,
            device_id_digest,
            device_fingerprint_digest,
            ip_digest,
            email_digest,
            phone_digest,
            national_id_digest,
            wallet_digest,
            user_velocity,
            device_velocity,
            ip_velocity,
            tenant_velocity,
            consortium_tenant_counts,
            consortium_fraud_confirmations,
            is_new_account,
            is_very_new_account,
            is_night: Some(is_night),
            is_weekend: Some(is_weekend),
            is_business_hours: Some(is_business_hours),
            is_round_amount: is_round_amount(req.amount),
            is_impossible_travel,
            implied_travel_speed_kmh,
            is_new_device,
            is_device_shared,
            features: req.features.clone(),
            degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_amount_detection() {
        assert!(is_round_amount(100.0));
        assert!(is_round_amount(250.0));
        assert!(!is_round_amount(99.99));
        assert!(!is_round_amount(0.0));
    }

    #[test]
    fn time_hints_night_and_weekend() {
        let ts = DateTime::parse_from_rfc3339("2026-07-25T03:30:00+00:00").unwrap(); // Saturday
        let (night, weekend, business) = derive_time_hints(ts);
        assert!(night);
        assert!(weekend);
        assert!(!business);
    }

    #[test]
    fn time_hints_business_hours_weekday() {
        let ts = DateTime::parse_from_rfc3339("2026-07-28T10:00:00+00:00").unwrap(); // Tuesday
        let (night, weekend, business) = derive_time_hints(ts);
        assert!(!night);
        assert!(!weekend);
        assert!(business);
    }

    #[test]
    fn missing_timestamp_falls_back_to_now() {
        let ts = local_timestamp(None);
        assert!(ts.timestamp() > 0);
    }
}
