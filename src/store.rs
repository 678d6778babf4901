//! Durable store (spec §4.9, §6.3): clients, transactions, flags,
//! rule-accuracy aggregates, and the cross-tenant consortium index.
//!
//! Grounded on the teacher's `vault::vault_db::VaultDb`: a single
//! `rusqlite::Connection` behind a `tokio::sync::Mutex`, schema created with
//! `CREATE TABLE IF NOT EXISTS` + indexes on every hot lookup column, and
//! `INSERT ... ON CONFLICT DO UPDATE` for idempotent upserts. All
//! identifier-like columns here are digests (spec §3 "no raw PII
//! persisted") — callers never pass a raw email/phone/ip into this module.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::models::{FlagView, Outcome, Vertical};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "silver" => Tier::Silver,
            "gold" => Tier::Gold,
            _ => Tier::Bronze,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    pub id: String,
    pub api_key_digest: String,
    pub tier: Tier,
    pub vertical: Vertical,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct PersistedTransaction {
    pub tenant_id: String,
    pub transaction_id: String,
    pub vertical: Vertical,
    pub context_digest_snapshot: String,
    pub score: u8,
    pub level: String,
    pub decision: String,
    pub flags_json: String,
    pub latency_ms: u64,
    pub ruleset_version: String,
    pub outcome: Option<Outcome>,
    pub fraud_type: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct RuleAccuracy {
    pub true_positive: u64,
    pub false_positive: u64,
    pub true_negative: u64,
    pub false_negative: u64,
    pub weight: f64,
    pub updated_at: i64,
}

impl RuleAccuracy {
    pub fn precision(&self) -> Option<f64> {
        let denom = self.true_positive + self.false_positive;
        if denom == 0 {
            None
        } else {
            Some(self.true_positive as f64 / denom as f64)
        }
    }

    pub fn sample_size(&self) -> u64 {
        self.true_positive + self.false_positive
    }
}

fn vertical_str(v: Vertical) -> &'static str {
    v.as_str()
}

fn vertical_from_str(s: &str) -> Vertical {
    Vertical::all()
        .iter()
        .copied()
        .find(|v| v.as_str() == s)
        .unwrap_or(Vertical::Fintech)
}

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("open fraud store db")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS clients (
                id TEXT PRIMARY KEY,
                api_key_digest TEXT UNIQUE NOT NULL,
                tier TEXT NOT NULL,
                vertical TEXT NOT NULL,
                webhook_url TEXT,
                webhook_secret TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS transactions (
                tenant_id TEXT NOT NULL,
                transaction_id TEXT NOT NULL,
                vertical TEXT NOT NULL,
                context_digest_snapshot TEXT NOT NULL,
                score INTEGER NOT NULL,
                level TEXT NOT NULL,
                decision TEXT NOT NULL,
                flags_json TEXT NOT NULL,
                latency_ms INTEGER NOT NULL,
                ruleset_version TEXT NOT NULL,
                outcome TEXT,
                fraud_type TEXT,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (tenant_id, transaction_id)
            );

            CREATE TABLE IF NOT EXISTS rule_accuracy (
                rule_name TEXT NOT NULL,
                vertical TEXT NOT NULL,
                true_positive INTEGER NOT NULL DEFAULT 0,
                false_positive INTEGER NOT NULL DEFAULT 0,
                true_negative INTEGER NOT NULL DEFAULT 0,
                false_negative INTEGER NOT NULL DEFAULT 0,
                weight REAL NOT NULL DEFAULT 1.0,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (rule_name, vertical)
            );

            CREATE TABLE IF NOT EXISTS consortium_digest (
                digest TEXT PRIMARY KEY,
                fraud_confirmations INTEGER NOT NULL DEFAULT 0,
                first_seen INTEGER NOT NULL,
                last_seen INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS consortium_tenant_touch (
                digest TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                last_seen INTEGER NOT NULL,
                PRIMARY KEY (digest, tenant_id)
            );

            CREATE TABLE IF NOT EXISTS device_user_touch (
                device_digest TEXT NOT NULL,
                user_digest TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                last_seen INTEGER NOT NULL,
                PRIMARY KEY (device_digest, user_digest, tenant_id)
            );

            CREATE TABLE IF NOT EXISTS user_last_location (
                tenant_id TEXT NOT NULL,
                user_digest TEXT NOT NULL,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                observed_at INTEGER NOT NULL,
                PRIMARY KEY (tenant_id, user_digest)
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_tenant ON transactions(tenant_id, created_at DESC);
            ",
        )?;
        Ok(())
    }

    // ---- clients ----

    pub async fn get_client_by_api_key_digest(&self, api_key_digest: &str) -> Result<Option<Client>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT id, api_key_digest, tier, vertical, webhook_url, webhook_secret, created_at
                 FROM clients WHERE api_key_digest = ?1",
                params![api_key_digest],
                |row| {
                    Ok(Client {
                        id: row.get(0)?,
                        api_key_digest: row.get(1)?,
                        tier: Tier::from_str(&row.get::<_, String>(2)?),
                        vertical: vertical_from_str(&row.get::<_, String>(3)?),
                        webhook_url: row.get(4)?,
                        webhook_secret: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()
            .context("query client")?;
        Ok(row)
    }

    pub async fn upsert_client(&self, client: &Client) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO clients (id, api_key_digest, tier, vertical, webhook_url, webhook_secret, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                tier = excluded.tier,
                webhook_url = excluded.webhook_url,
                webhook_secret = excluded.webhook_secret",
            params![
                client.id,
                client.api_key_digest,
                client.tier.as_str(),
                vertical_str(client.vertical),
                client.webhook_url,
                client.webhook_secret,
                client.created_at,
            ],
        )?;
        Ok(())
    }

    // ---- transactions ----

    /// Inserts the transaction row only if (tenant_id, transaction_id) is
    /// new. Returns `true` if this call performed the insert (i.e. this
    /// request "won" the persistence race per spec §5), `false` if a row
    /// already existed.
    pub async fn insert_transaction_if_absent(&self, tx: &PersistedTransaction) -> Result<bool> {
        let conn = self.conn.lock().await;
        let affected = conn.execute(
            "INSERT OR IGNORE INTO transactions
             (tenant_id, transaction_id, vertical, context_digest_snapshot, score, level, decision, flags_json, latency_ms, ruleset_version, outcome, fraud_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                tx.tenant_id,
                tx.transaction_id,
                vertical_str(tx.vertical),
                tx.context_digest_snapshot,
                tx.score,
                tx.level,
                tx.decision,
                tx.flags_json,
                tx.latency_ms,
                tx.ruleset_version,
                tx.outcome.map(|o| format!("{o:?}").to_lowercase()),
                tx.fraud_type,
                tx.created_at,
            ],
        )?;
        Ok(affected == 1)
    }

    pub async fn get_transaction(
        &self,
        tenant_id: &str,
        transaction_id: &str,
    ) -> Result<Option<PersistedTransaction>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT tenant_id, transaction_id, vertical, context_digest_snapshot, score, level, decision, flags_json, latency_ms, ruleset_version, outcome, fraud_type, created_at
                 FROM transactions WHERE tenant_id = ?1 AND transaction_id = ?2",
                params![tenant_id, transaction_id],
                |row| {
                    let outcome_str: Option<String> = row.get(10)?;
                    Ok(PersistedTransaction {
                        tenant_id: row.get(0)?,
                        transaction_id: row.get(1)?,
                        vertical: vertical_from_str(&row.get::<_, String>(2)?),
                        context_digest_snapshot: row.get(3)?,
                        score: row.get(4)?,
                        level: row.get(5)?,
                        decision: row.get(6)?,
                        flags_json: row.get(7)?,
                        latency_ms: row.get(8)?,
                        ruleset_version: row.get(9)?,
                        outcome: outcome_str.map(|s| if s == "fraud" { Outcome::Fraud } else { Outcome::Legitimate }),
                        fraud_type: row.get(11)?,
                        created_at: row.get(12)?,
                    })
                },
            )
            .optional()
            .context("query transaction")?;
        Ok(row)
    }

    /// Sets the outcome exactly once. Returns `Ok(true)` if this call set
    /// it, `Ok(false)` if it was already set to the same value
    /// (idempotent no-op). Caller is responsible for detecting a
    /// differing prior value as `OutcomeConflict` before calling this.
    pub async fn set_outcome(
        &self,
        tenant_id: &str,
        transaction_id: &str,
        outcome: Outcome,
        fraud_type: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock().await;
        let outcome_str = match outcome {
            Outcome::Fraud => "fraud",
            Outcome::Legitimate => "legitimate",
        };
        let affected = conn.execute(
            "UPDATE transactions SET outcome = ?1, fraud_type = ?2
             WHERE tenant_id = ?3 AND transaction_id = ?4 AND outcome IS NULL",
            params![outcome_str, fraud_type, tenant_id, transaction_id],
        )?;
        Ok(affected == 1)
    }

    pub fn parse_flags(tx: &PersistedTransaction) -> Vec<FlagView> {
        serde_json::from_str(&tx.flags_json).unwrap_or_default()
    }

    // ---- rule accuracy ----

    pub async fn get_rule_accuracy(&self, rule_name: &str, vertical: Vertical) -> Result<RuleAccuracy> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT true_positive, false_positive, true_negative, false_negative, weight, updated_at
                 FROM rule_accuracy WHERE rule_name = ?1 AND vertical = ?2",
                params![rule_name, vertical_str(vertical)],
                |row| {
                    Ok(RuleAccuracy {
                        true_positive: row.get(0)?,
                        false_positive: row.get(1)?,
                        true_negative: row.get(2)?,
                        false_negative: row.get(3)?,
                        weight: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()
            .context("query rule accuracy")?;
        Ok(row.unwrap_or_else(|| RuleAccuracy {
            weight: 1.0,
            ..Default::default()
        }))
    }

    pub async fn list_rule_accuracy(&self) -> Result<Vec<(String, Vertical, RuleAccuracy)>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT rule_name, vertical, true_positive, false_positive, true_negative, false_negative, weight, updated_at FROM rule_accuracy",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let rule_name: String = row.get(0)?;
                let vertical: String = row.get(1)?;
                Ok((
                    rule_name,
                    vertical,
                    RuleAccuracy {
                        true_positive: row.get(2)?,
                        false_positive: row.get(3)?,
                        true_negative: row.get(4)?,
                        false_negative: row.get(5)?,
                        weight: row.get(6)?,
                        updated_at: row.get(7)?,
                    },
                ))
            })?
            .filter_map(|r| r.ok())
            .map(|(name, v, acc)| (name, vertical_from_str(&v), acc))
            .collect();
        Ok(rows)
    }

    /// Single transactional upsert, per §4.8's "best-effort, one
    /// transactional update per feedback" failure model.
    pub async fn upsert_rule_accuracy(
        &self,
        rule_name: &str,
        vertical: Vertical,
        tp_delta: u64,
        fp_delta: u64,
        tn_delta: u64,
        fn_delta: u64,
        new_weight: f64,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO rule_accuracy (rule_name, vertical, true_positive, false_positive, true_negative, false_negative, weight, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(rule_name, vertical) DO UPDATE SET
                true_positive = true_positive + excluded.true_positive,
                false_positive = false_positive + excluded.false_positive,
                true_negative = true_negative + excluded.true_negative,
                false_negative = false_negative + excluded.false_negative,
                weight = excluded.weight,
                updated_at = excluded.updated_at",
            params![
                rule_name,
                vertical_str(vertical),
                tp_delta,
                fp_delta,
                tn_delta,
                fn_delta,
                new_weight,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    // ---- consortium ----

    pub async fn touch_consortium(&self, digest: &str, tenant_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        let now = Utc::now().timestamp();
        conn.execute(
            "INSERT INTO consortium_digest (digest, fraud_confirmations, first_seen, last_seen)
             VALUES (?1, 0, ?2, ?2)
             ON CONFLICT(digest) DO UPDATE SET last_seen = excluded.last_seen",
            params![digest, now],
        )?;
        conn.execute(
            "INSERT INTO consortium_tenant_touch (digest, tenant_id, last_seen)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(digest, tenant_id) DO UPDATE SET last_seen = excluded.last_seen",
            params![digest, tenant_id, now],
        )?;
        Ok(())
    }

    /// Distinct tenant count touching `digest` within the last `window_days`.
    /// Never returns originating tenant identities, only the count (spec §9).
    pub async fn consortium_tenant_count(&self, digest: &str, window_days: i64) -> Result<u64> {
        let conn = self.conn.lock().await;
        let cutoff = Utc::now().timestamp() - window_days * 86_400;
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT tenant_id) FROM consortium_tenant_touch WHERE digest = ?1 AND last_seen >= ?2",
            params![digest, cutoff],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub async fn consortium_fraud_confirmations(&self, digest: &str) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: Option<i64> = conn
            .query_row(
                "SELECT fraud_confirmations FROM consortium_digest WHERE digest = ?1",
                params![digest],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0) as u64)
    }

    pub async fn increment_fraud_confirmation(&self, digest: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        let now = Utc::now().timestamp();
        conn.execute(
            "INSERT INTO consortium_digest (digest, fraud_confirmations, first_seen, last_seen)
             VALUES (?1, 1, ?2, ?2)
             ON CONFLICT(digest) DO UPDATE SET fraud_confirmations = fraud_confirmations + 1, last_seen = excluded.last_seen",
            params![digest, now],
        )?;
        Ok(())
    }

    /// Scheduled age-out job (spec §9: "not part of the request path").
    pub async fn age_out_consortium(&self, window_days: i64) -> Result<u64> {
        let conn = self.conn.lock().await;
        let cutoff = Utc::now().timestamp() - window_days * 86_400;
        let removed = conn.execute(
            "DELETE FROM consortium_tenant_touch WHERE last_seen < ?1",
            params![cutoff],
        )?;
        conn.execute(
            "DELETE FROM consortium_digest WHERE last_seen < ?1",
            params![cutoff],
        )?;
        Ok(removed as u64)
    }

    // ---- device sharing ----

    pub async fn touch_device_user(&self, device_digest: &str, user_digest: &str, tenant_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO device_user_touch (device_digest, user_digest, tenant_id, last_seen)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(device_digest, user_digest, tenant_id) DO UPDATE SET last_seen = excluded.last_seen",
            params![device_digest, user_digest, tenant_id, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    pub async fn distinct_users_on_device(&self, device_digest: &str, tenant_id: &str, window_days: i64) -> Result<u64> {
        let conn = self.conn.lock().await;
        let cutoff = Utc::now().timestamp() - window_days * 86_400;
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT user_digest) FROM device_user_touch WHERE device_digest = ?1 AND tenant_id = ?2 AND last_seen >= ?3",
            params![device_digest, tenant_id, cutoff],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ---- geo history ----

    pub async fn last_location(&self, tenant_id: &str, user_digest: &str) -> Result<Option<(f64, f64, i64)>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT lat, lon, observed_at FROM user_last_location WHERE tenant_id = ?1 AND user_digest = ?2",
                params![tenant_id, user_digest],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        Ok(row)
    }

    pub async fn set_last_location(&self, tenant_id: &str, user_digest: &str, lat: f64, lon: f64, observed_at: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO user_last_location (tenant_id, user_digest, lat, lon, observed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(tenant_id, user_digest) DO UPDATE SET lat = excluded.lat, lon = excluded.lon, observed_at = excluded.observed_at",
            params![tenant_id, user_digest, lat, lon, observed_at],
        )?;
        Ok(())
    }
}
