//! End-to-end scenarios against the full axum router (spec §8, S1-S6):
//! each test drives the HTTP surface with `tower::ServiceExt::oneshot`
//! against a fresh in-memory store, the same way the teacher drives its
//! backtest_v2 router in-process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use fraudscore_backend::api;
use fraudscore_backend::cache::Cache;
use fraudscore_backend::config::Config;
use fraudscore_backend::hasher::{DigestKind, Hasher};
use fraudscore_backend::ml::NullMlAdapter;
use fraudscore_backend::models::{FeedbackResponse, FraudCheckResponse, Vertical};
use fraudscore_backend::policy::{PolicyStore, VerticalPolicySnapshot};
use fraudscore_backend::rules;
use fraudscore_backend::state::AppState;
use fraudscore_backend::store::{Client, Store, Tier};
use fraudscore_backend::webhook::WebhookSender;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret-key";

fn test_config() -> Config {
    let mut vertical_thresholds = HashMap::new();
    vertical_thresholds.insert("lending".to_string(), 65);
    vertical_thresholds.insert("crypto".to_string(), 50);
    vertical_thresholds.insert("fintech".to_string(), 60);

    let mut rate_limit_tiers = HashMap::new();
    rate_limit_tiers.insert("bronze".to_string(), 10_000);
    rate_limit_tiers.insert("silver".to_string(), 10_000);
    rate_limit_tiers.insert("gold".to_string(), 10_000);

    Config {
        secret_key: SECRET.to_string(),
        db_url: ":memory:".to_string(),
        cache_url: None,
        rate_limit_tiers,
        cache_ttl_seconds: 300,
        ml_enabled: false,
        ml_timeout_ms: 50,
        vertical_thresholds,
        impossible_travel_speed_kmh: 900.0,
        device_shared_user_threshold: 3,
        port: 0,
    }
}

fn test_policy() -> VerticalPolicySnapshot {
    let mut thresholds = HashMap::new();
    for v in Vertical::all() {
        thresholds.insert(*v, 60);
    }
    thresholds.insert(Vertical::Lending, 65);
    thresholds.insert(Vertical::Crypto, 50);
    VerticalPolicySnapshot::from_thresholds(thresholds)
        .with_weight("loan_stacking", Vertical::Lending, 1.5)
        .with_weight("sim_swap_pattern", Vertical::Crypto, 1.5)
}

/// Builds a fresh in-memory-backed `AppState` and registers one client,
/// returning the state, the router, and the client's raw API key.
async fn test_app(vertical: Vertical, tier: Tier) -> (axum::Router, String, Store, Arc<Hasher>, Cache) {
    let config = Arc::new(test_config());
    let hasher = Arc::new(Hasher::new(&config.secret_key).unwrap());
    let store = Store::open(&config.db_url).unwrap();
    let cache = Cache::new();

    let api_key = format!("test-key-{}", vertical.as_str());
    let client = Client {
        id: format!("tenant-{}", vertical.as_str()),
        api_key_digest: hasher.digest(DigestKind::ApiKey, &api_key),
        tier,
        vertical,
        webhook_url: None,
        webhook_secret: None,
        created_at: 0,
    };
    store.upsert_client(&client).await.unwrap();

    let state = AppState {
        config,
        store: store.clone(),
        cache: cache.clone(),
        hasher: hasher.clone(),
        policy: Arc::new(PolicyStore::new(test_policy())),
        rules: Arc::new(rules::all_rules()),
        ml: Arc::new(NullMlAdapter),
        rate_limiter: Arc::new(fraudscore_backend::cache::RateLimiter::new(Cache::new())),
        webhook: Arc::new(WebhookSender::new()),
    };

    (api::router(state), api_key, store, hasher, cache)
}

fn check_request(api_key: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/fraud/check")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-API-Key", api_key)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn s1_request() -> Value {
    json!({
        "transaction_id": "tx-s1",
        "user_id": "user-s1",
        "amount": 500000.0,
        "currency": "USD",
        "transaction_type": "loan_disbursement",
        "vertical": "lending",
        "device_fingerprint": "fp-A",
        "phone": "+234-000-0000",
        "ip": "102.89.0.1",
        "country": "NG",
        "features": {
            "behavioral": { "account_age_days": 2 }
        }
    })
}

/// S1: loan-stacking critical decline. The phone digest must already show
/// at least 4 other tenants in the consortium index before this request is
/// scored, exactly as the scenario describes ("phone digest seen at 4 other
/// tenants in last 7 days").
#[tokio::test]
async fn s1_loan_stacking_critical_decline() {
    let (app, api_key, store, hasher, _cache) = test_app(Vertical::Lending, Tier::Gold).await;

    let req = s1_request();
    let phone_digest = hasher.digest(DigestKind::Phone, req["phone"].as_str().unwrap());
    for i in 0..4 {
        store.touch_consortium(&phone_digest, &format!("other-tenant-{i}")).await.unwrap();
    }

    let response = app.oneshot(check_request(&api_key, &req)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: FraudCheckResponse = serde_json::from_value(body_json(response).await).unwrap();

    assert!(parsed.risk_score >= 80, "score was {}", parsed.risk_score);
    assert_eq!(parsed.risk_level, "critical");
    assert_eq!(parsed.decision, "decline");
    let flag_names: Vec<&str> = parsed.flags.iter().map(|f| f.rule_name.as_str()).collect();
    assert!(flag_names.contains(&"new_account_large_amount"));
    assert!(flag_names.contains(&"loan_stacking"));
}

fn s2_request() -> Value {
    json!({
        "transaction_id": "tx-s2",
        "user_id": "user-s2",
        "amount": 250000.0,
        "currency": "USD",
        "transaction_type": "loan_disbursement",
        "vertical": "crypto",
        "device_id": "brand-new-device",
        "features": {
            "identity": { "phone_changed_recently": true },
            "behavioral": { "account_age_days": 30 }
        }
    })
}

/// S2: SIM-swap pattern, scored against crypto (threshold 50) where it
/// should decline.
#[tokio::test]
async fn s2_sim_swap_declines_in_crypto() {
    let (app, api_key, _store, _hasher, _cache) = test_app(Vertical::Crypto, Tier::Gold).await;
    let req = s2_request();

    let response = app.oneshot(check_request(&api_key, &req)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: FraudCheckResponse = serde_json::from_value(body_json(response).await).unwrap();

    assert!(parsed.risk_score >= 65, "score was {}", parsed.risk_score);
    assert_eq!(parsed.decision, "decline");
    assert!(parsed.flags.iter().any(|f| f.rule_name == "sim_swap_pattern"));
}

/// S3: idempotent replay. Submitting the same transaction_id twice returns
/// a byte-identical response (I-2), persists exactly one row, and
/// increments the user's velocity counter exactly once — the replay must
/// short-circuit on the result cache before velocity is ever touched again.
#[tokio::test]
async fn s3_idempotent_replay() {
    let (app, api_key, store, hasher, cache) = test_app(Vertical::Crypto, Tier::Gold).await;
    let req = s2_request();

    let first = app.clone().oneshot(check_request(&api_key, &req)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_body: FraudCheckResponse = serde_json::from_value(body_json(first).await).unwrap();

    let second = app.oneshot(check_request(&api_key, &req)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body: FraudCheckResponse = serde_json::from_value(body_json(second).await).unwrap();

    assert_eq!(first_body.risk_score, second_body.risk_score);
    assert_eq!(first_body.decision, second_body.decision);
    assert_eq!(first_body.flags.len(), second_body.flags.len());
    assert_eq!(first_body.processing_time_ms, second_body.processing_time_ms);

    let stored = store
        .get_transaction("tenant-crypto", "tx-s2")
        .await
        .unwrap()
        .expect("transaction should be persisted");
    assert_eq!(stored.transaction_id, "tx-s2");

    let user_digest = hasher.digest(DigestKind::Email, "user-s2");
    let velocity_key = format!("velocity:user:{user_digest}:1m");
    assert_eq!(cache.zrange_count(&velocity_key, Duration::from_secs(60)), 1);
}

/// S4: cache outage. The service still answers 200 with `degraded=true`;
/// `new_account_large_amount` (account-age derived, no cache dependency)
/// still fires even though velocity/consortium reads are degraded.
#[tokio::test]
async fn s4_cache_outage_still_scores_degraded() {
    let hasher = Arc::new(Hasher::new(SECRET).unwrap());
    let store = Store::open(":memory:").unwrap();
    let cache = Cache::new();
    cache.set_reachable(false);

    let api_key = "test-key-outage";
    let client = Client {
        id: "tenant-outage".to_string(),
        api_key_digest: hasher.digest(DigestKind::ApiKey, api_key),
        tier: Tier::Gold,
        vertical: Vertical::Lending,
        webhook_url: None,
        webhook_secret: None,
        created_at: 0,
    };
    store.upsert_client(&client).await.unwrap();
    let state = AppState {
        config: Arc::new(test_config()),
        store,
        cache,
        hasher,
        policy: Arc::new(PolicyStore::new(test_policy())),
        rules: Arc::new(rules::all_rules()),
        ml: Arc::new(NullMlAdapter),
        rate_limiter: Arc::new(fraudscore_backend::cache::RateLimiter::new(Cache::new())),
        webhook: Arc::new(WebhookSender::new()),
    };
    let app = api::router(state);

    let response = app.oneshot(check_request(api_key, &s1_request())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: FraudCheckResponse = serde_json::from_value(body_json(response).await).unwrap();

    assert!(parsed.degraded);
    assert!(parsed.flags.iter().any(|f| f.rule_name == "new_account_large_amount"));
}

/// S5: feedback update. Confirming S2 as fraud raises `sim_swap_pattern`'s
/// recorded true-positive count and, once enough samples accumulate,
/// lifts its weight without exceeding the 3.0 ceiling.
#[tokio::test]
async fn s5_feedback_raises_true_positive_and_weight_within_bounds() {
    let (app, api_key, store, hasher, _cache) = test_app(Vertical::Crypto, Tier::Gold).await;
    let req = s2_request();

    let check_response = app.clone().oneshot(check_request(&api_key, &req)).await.unwrap();
    assert_eq!(check_response.status(), StatusCode::OK);

    // Prime accuracy history above the minimum sample size so this single
    // feedback submission can move the weight immediately.
    store
        .upsert_rule_accuracy("sim_swap_pattern", Vertical::Crypto, 60, 0, 0, 0, 1.0)
        .await
        .unwrap();

    let feedback_body = json!({
        "transaction_id": "tx-s2",
        "actual_outcome": "fraud",
        "fraud_type": "sim_swap"
    });
    let feedback_req = Request::builder()
        .method("POST")
        .uri("/api/v1/feedback")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-API-Key", &api_key)
        .body(Body::from(feedback_body.to_string()))
        .unwrap();

    let response = app.oneshot(feedback_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: FeedbackResponse = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(parsed.transaction_id, "tx-s2");
    assert!(parsed.rules_updated > 0);

    let acc = store.get_rule_accuracy("sim_swap_pattern", Vertical::Crypto).await.unwrap();
    assert!(acc.true_positive > 0);
    assert!(acc.weight <= 3.0);

    let device_digest = hasher.digest(DigestKind::DeviceId, "brand-new-device");
    let confirmations = store.consortium_fraud_confirmations(&device_digest).await.unwrap();
    assert_eq!(confirmations, 1);
}

/// S6: impossible travel. Two requests for the same user 30 minutes apart
/// from opposite hemispheres exceed the configured travel speed.
#[tokio::test]
async fn s6_impossible_travel_flags_second_request() {
    let (app, api_key, _store, _hasher, _cache) = test_app(Vertical::Fintech, Tier::Gold).await;

    let first = json!({
        "transaction_id": "tx-s6-a",
        "user_id": "user-s6",
        "amount": 100.0,
        "currency": "USD",
        "transaction_type": "purchase",
        "vertical": "fintech",
        "timestamp": "2026-07-28T10:00:00+00:00",
        "features": { "network": { "ip_latitude": 6.45, "ip_longitude": 3.40 } }
    });
    let response = app.clone().oneshot(check_request(&api_key, &first)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let second = json!({
        "transaction_id": "tx-s6-b",
        "user_id": "user-s6",
        "amount": 100.0,
        "currency": "USD",
        "transaction_type": "purchase",
        "vertical": "fintech",
        "timestamp": "2026-07-28T10:30:00+00:00",
        "features": { "network": { "ip_latitude": 51.50, "ip_longitude": -0.12 } }
    });
    let response = app.oneshot(check_request(&api_key, &second)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: FraudCheckResponse = serde_json::from_value(body_json(response).await).unwrap();

    let flag = parsed
        .flags
        .iter()
        .find(|f| f.rule_name == "impossible_travel")
        .expect("impossible_travel should have fired");
    assert_eq!(flag.severity, "critical");
}

/// Missing API key is rejected before any scoring happens.
#[tokio::test]
async fn missing_api_key_is_unauthorized() {
    let (app, _api_key, _store, _hasher, _cache) = test_app(Vertical::Fintech, Tier::Gold).await;
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/fraud/check")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(s2_request().to_string()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// `GET /api/v1/verticals` needs no API key.
#[tokio::test]
async fn public_verticals_endpoint_needs_no_auth() {
    let (app, _api_key, _store, _hasher, _cache) = test_app(Vertical::Fintech, Tier::Gold).await;
    let response = app
        .oneshot(Request::builder().uri("/api/v1/verticals").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
