//! API-key authentication (spec §6.1): every request carries `X-API-Key`,
//! which is digested and looked up against the `clients` table. No session,
//! no JWT — the key itself is the bearer credential, digested the same way
//! every other identifier in this crate is (never stored or logged raw).
//!
//! Grounded on the teacher's `auth::middleware::auth_middleware` shape
//! (header extraction, a typed error enum implementing `IntoResponse`,
//! inserting the resolved principal into request extensions) with JWT
//! validation swapped for a digest-and-lookup.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::CoreError;
use crate::hasher::DigestKind;
use crate::state::AppState;
use crate::store::Client;

/// Resolves `X-API-Key` to a `Client` and inserts it into request
/// extensions so handlers can pull the authenticated tenant out without
/// re-querying the store.
pub async fn api_key_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, CoreError> {
    let api_key = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(CoreError::Unauthorized)?;

    let digest = state.hasher.digest(DigestKind::ApiKey, api_key);
    let client = state
        .store
        .get_client_by_api_key_digest(&digest)
        .await?
        .ok_or(CoreError::Unauthorized)?;

    match state.rate_limiter.check(&client.id, state.config.rate_limit_tiers.get(client.tier.as_str()).copied().unwrap_or(100)) {
        crate::cache::RateLimitOutcome::Exceeded { retry_after_secs } => {
            return Err(CoreError::RateLimited { retry_after_secs });
        }
        crate::cache::RateLimitOutcome::Allowed | crate::cache::RateLimitOutcome::Degraded => {}
    }

    req.extensions_mut().insert(client);
    Ok(next.run(req).await)
}

pub fn extract_client(req: &Request) -> Option<&Client> {
    req.extensions().get::<Client>()
}
