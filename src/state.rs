//! Shared application state (spec §6): the handful of long-lived services
//! every request handler and middleware needs a handle to.
//!
//! Grounded on the teacher's `AppState` in `main.rs`, which bundles the
//! vault, signal detector, and execution engine behind `Arc` for cheap
//! cloning into axum's `State` extractor.

use std::sync::Arc;

use crate::cache::{Cache, RateLimiter};
use crate::config::Config;
use crate::context::Assembler;
use crate::hasher::Hasher;
use crate::ml::MlAdapter;
use crate::policy::PolicyStore;
use crate::rules::RuleDescriptor;
use crate::store::Store;
use crate::webhook::WebhookSender;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub cache: Cache,
    pub hasher: Arc<Hasher>,
    pub policy: Arc<PolicyStore>,
    pub rules: Arc<Vec<RuleDescriptor>>,
    pub ml: Arc<dyn MlAdapter>,
    pub rate_limiter: Arc<RateLimiter>,
    pub webhook: Arc<WebhookSender>,
}

impl AppState {
    pub fn assembler(&self) -> Assembler<'_> {
        Assembler {
            hasher: &self.hasher,
            cache: &self.cache,
            store: &self.store,
            impossible_travel_speed_kmh: self.config.impossible_travel_speed_kmh,
            device_shared_user_threshold: self.config.device_shared_user_threshold,
        }
    }
}
