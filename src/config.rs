//! Runtime configuration (spec §6.4).
//!
//! Follows the teacher's `Config::from_env` in shape: `dotenv().ok()` then a
//! sequence of `env::var(...).unwrap_or(...)`/`.parse().unwrap_or(...)`
//! reads, collected into a plain struct.

use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: String,
    pub db_url: String,
    pub cache_url: Option<String>,
    pub rate_limit_tiers: HashMap<String, u32>,
    pub cache_ttl_seconds: u64,
    pub ml_enabled: bool,
    pub ml_timeout_ms: u64,
    pub vertical_thresholds: HashMap<String, u8>,
    pub impossible_travel_speed_kmh: f64,
    pub device_shared_user_threshold: u64,
    pub port: u16,
}

fn bool_env(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
        .unwrap_or(default)
}

fn parse_tier_map(raw: &str, defaults: &[(&str, u32)]) -> HashMap<String, u32> {
    let mut map: HashMap<String, u32> = defaults
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();
    for pair in raw.split(',').filter(|s| !s.trim().is_empty()) {
        if let Some((tier, limit)) = pair.split_once(':') {
            if let Ok(limit) = limit.trim().parse::<u32>() {
                map.insert(tier.trim().to_string(), limit);
            }
        }
    }
    map
}

fn parse_threshold_map(raw: &str, defaults: &[(&str, u8)]) -> HashMap<String, u8> {
    let mut map: HashMap<String, u8> = defaults
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();
    for pair in raw.split(',').filter(|s| !s.trim().is_empty()) {
        if let Some((vertical, threshold)) = pair.split_once(':') {
            if let Ok(threshold) = threshold.trim().parse::<u8>() {
                map.insert(vertical.trim().to_string(), threshold);
            }
        }
    }
    map
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let secret_key = env::var("SECRET_KEY").context("SECRET_KEY is required")?;
        let db_url =
            env::var("DB_URL").unwrap_or_else(|_| "./fraudscore.db".to_string());
        let cache_url = env::var("CACHE_URL").ok();

        let default_tiers = [("bronze", 100), ("silver", 1000), ("gold", 10000)];
        let rate_limit_tiers = env::var("RATE_LIMIT_TIERS")
            .map(|raw| parse_tier_map(&raw, &default_tiers))
            .unwrap_or_else(|_| parse_tier_map("", &default_tiers));

        let cache_ttl_seconds = env::var("CACHE_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        let ml_enabled = bool_env("ML_ENABLED", false);
        let ml_timeout_ms = env::var("ML_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);

        let default_thresholds = [
            ("lending", 65),
            ("fintech", 60),
            ("payments", 70),
            ("crypto", 50),
            ("ecommerce", 60),
            ("betting", 55),
            ("gaming", 50),
            ("marketplace", 60),
        ];
        let vertical_thresholds = env::var("VERTICAL_THRESHOLDS")
            .map(|raw| parse_threshold_map(&raw, &default_thresholds))
            .unwrap_or_else(|_| parse_threshold_map("", &default_thresholds));

        let impossible_travel_speed_kmh = env::var("IMPOSSIBLE_TRAVEL_SPEED_KMH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(900.0);

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        let device_shared_user_threshold = env::var("DEVICE_SHARED_USER_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        Ok(Self {
            secret_key,
            db_url,
            cache_url,
            rate_limit_tiers,
            cache_ttl_seconds,
            ml_enabled,
            ml_timeout_ms,
            vertical_thresholds,
            impossible_travel_speed_kmh,
            device_shared_user_threshold,
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_map_defaults_and_overrides() {
        let m = parse_tier_map("bronze:50,platinum:50000", &[("bronze", 100), ("silver", 1000)]);
        assert_eq!(m["bronze"], 50);
        assert_eq!(m["silver"], 1000);
        assert_eq!(m["platinum"], 50000);
    }

    #[test]
    fn threshold_map_defaults_and_overrides() {
        let m = parse_threshold_map("crypto:40", &[("crypto", 50), ("lending", 65)]);
        assert_eq!(m["crypto"], 40);
        assert_eq!(m["lending"], 65);
    }
}
