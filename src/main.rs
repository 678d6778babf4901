use std::sync::Arc;

use anyhow::{Context, Result};
use fraudscore_backend::api;
use fraudscore_backend::cache::{Cache, RateLimiter};
use fraudscore_backend::config::Config;
use fraudscore_backend::hasher::Hasher;
use fraudscore_backend::ml::{MlAdapter, NullMlAdapter, StubMlAdapter};
use fraudscore_backend::policy::{PolicyStore, VerticalPolicySnapshot};
use fraudscore_backend::rules;
use fraudscore_backend::state::AppState;
use fraudscore_backend::store::Store;
use fraudscore_backend::webhook::WebhookSender;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::prelude::*;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fraudscore_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Translates the config's flat `vertical -> threshold` map into the typed
/// snapshot the policy store publishes at startup. `loan_stacking` (lending)
/// and `sim_swap_pattern` (crypto) ship weighted 1.5x (spec §8 scenarios S1,
/// S2): both are consortium/identity-derived signals strong enough to
/// warrant outsized influence on the decision from day one, before the
/// learning loop has any accuracy history of its own to earn it.
fn initial_policy(config: &Config) -> VerticalPolicySnapshot {
    use fraudscore_backend::models::Vertical;
    let mut thresholds = std::collections::HashMap::new();
    for vertical in Vertical::all() {
        if let Some(t) = config.vertical_thresholds.get(vertical.as_str()) {
            thresholds.insert(*vertical, *t);
        }
    }
    VerticalPolicySnapshot::from_thresholds(thresholds)
        .with_weight("loan_stacking", Vertical::Lending, 1.5)
        .with_weight("sim_swap_pattern", Vertical::Crypto, 1.5)
}

/// Scheduled age-out job (spec §9: "not part of the request path"). Runs
/// independently of any request and never blocks one.
async fn age_out_job(store: Store) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(6 * 60 * 60));
    loop {
        interval.tick().await;
        match store.age_out_consortium(90).await {
            Ok(removed) => info!(removed, "consortium age-out completed"),
            Err(e) => tracing::warn!(error = %e, "consortium age-out failed"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("loading configuration")?;
    info!(port = config.port, "fraud scoring engine starting");

    let hasher = Arc::new(Hasher::new(&config.secret_key)?);
    let store = Store::open(&config.db_url).context("opening durable store")?;
    let cache = Cache::new();
    let rate_limiter = Arc::new(RateLimiter::new(cache.clone()));
    let webhook = Arc::new(WebhookSender::new());

    let policy = Arc::new(PolicyStore::new(initial_policy(&config)));

    let mut all_rules = rules::all_rules();
    all_rules.shrink_to_fit();
    rules::validate_unique_names(&all_rules);
    info!(count = all_rules.len(), "rule registry loaded");

    let ml: Arc<dyn MlAdapter> = if config.ml_enabled {
        Arc::new(StubMlAdapter)
    } else {
        Arc::new(NullMlAdapter)
    };

    let state = AppState {
        config: Arc::new(config.clone()),
        store: store.clone(),
        cache,
        hasher,
        policy,
        rules: Arc::new(all_rules),
        ml,
        rate_limiter,
        webhook,
    };

    tokio::spawn(age_out_job(store));

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(
            fraudscore_backend::middleware::request_logging_simple,
        ));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await.context("binding listener")?;
    info!(addr, "fraud scoring engine listening");

    axum::serve(listener, app.into_make_service())
        .await
        .context("server error")?;

    Ok(())
}
