//! Outbound webhook delivery (spec §6.2): a signed POST fired on decline and
//! critical-level decisions. Delivery is best-effort and asynchronous to the
//! request that triggered it — a slow or unreachable client endpoint must
//! never add latency to a fraud-check response.
//!
//! HMAC signing follows `hasher.rs`'s reuse of the teacher's
//! `vault::execution::sign_request` shape (an `Hmac<Sha256>` over a message
//! built from the request's own fields). Retry backoff is grounded on the
//! teacher's `scrapers::binance_session::BackoffCalculator`: exponential
//! with a capped max and jitter from a small xorshift64 PRNG, since this
//! crate never reaches for a full `rand` dependency for one call site.

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::models::{Decision, FlagView, RiskLevel};

type HmacSha256 = Hmac<Sha256>;

const MAX_ATTEMPTS: u32 = 5;
const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_MAX_MS: u64 = 10_000;
const BACKOFF_MULTIPLIER: f64 = 2.0;
const JITTER_FACTOR: f64 = 0.3;

#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub event: &'static str,
    pub transaction_id: String,
    pub risk_score: u8,
    pub risk_level: String,
    pub decision: String,
    pub flags: Vec<FlagView>,
    pub timestamp: i64,
}

impl WebhookPayload {
    pub fn for_decision(
        transaction_id: String,
        risk_score: u8,
        risk_level: RiskLevel,
        decision: Decision,
        flags: Vec<FlagView>,
        timestamp: i64,
    ) -> Option<Self> {
        let event = match (risk_level, decision) {
            (_, Decision::Decline) => "fraud.declined",
            (RiskLevel::Critical, _) => "fraud.critical",
            _ => return None,
        };
        Some(Self {
            event,
            transaction_id,
            risk_score,
            risk_level: risk_level.as_str().to_string(),
            decision: decision.as_str().to_string(),
            flags,
            timestamp,
        })
    }
}

/// Exponential backoff with jitter, same shape as the teacher's
/// `BackoffCalculator` but scoped to one webhook delivery attempt rather
/// than a long-lived reconnect loop.
struct Backoff {
    attempt: u32,
    rng_state: u64,
}

impl Backoff {
    fn new(seed: u64) -> Self {
        Self { attempt: 0, rng_state: seed.max(1) }
    }

    fn next_random(&mut self) -> f64 {
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 7;
        self.rng_state ^= self.rng_state << 17;
        (self.rng_state as f64) / (u64::MAX as f64)
    }

    fn next_delay(&mut self) -> std::time::Duration {
        let base = (BACKOFF_BASE_MS as f64) * BACKOFF_MULTIPLIER.powi(self.attempt as i32);
        let capped = base.min(BACKOFF_MAX_MS as f64);
        let jitter_range = capped * JITTER_FACTOR;
        let jitter = (self.next_random() * 2.0 - 1.0) * jitter_range;
        let final_ms = (capped + jitter).max(BACKOFF_BASE_MS as f64);
        self.attempt += 1;
        std::time::Duration::from_millis(final_ms as u64)
    }
}

#[derive(Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()
                .expect("reqwest client builder"),
        }
    }

    fn sign(secret: &str, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Delivers one payload with bounded retries. Every failure (network,
    /// non-2xx, or signing) is logged and swallowed — the caller's fraud
    /// check has already returned its own response by the time this runs.
    pub async fn deliver(&self, url: &str, secret: &str, payload: &WebhookPayload) {
        let body = match serde_json::to_string(payload) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to serialize webhook payload");
                return;
            }
        };
        let signature = Self::sign(secret, &body);
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0xA5A5A5A5);
        let mut backoff = Backoff::new(seed);

        for attempt in 0..MAX_ATTEMPTS {
            let result = self
                .client
                .post(url)
                .header("Content-Type", "application/json")
                .header("X-Signature", &signature)
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    debug!(url, attempt, "webhook delivered");
                    return;
                }
                Ok(resp) => {
                    warn!(url, attempt, status = %resp.status(), "webhook endpoint returned non-success");
                }
                Err(e) => {
                    warn!(url, attempt, error = %e, "webhook delivery failed");
                }
            }

            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(backoff.next_delay()).await;
            }
        }
        warn!(url, "webhook delivery exhausted all retries, giving up");
    }
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}
