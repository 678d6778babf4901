//! Middleware for observability.
//!
//! This module provides request logging with latency tracking. Rate
//! limiting is tenant-tier based and lives in `cache::RateLimiter`,
//! enforced from `auth::api_key_auth` once a client is known.

pub mod logging;

pub use logging::request_logging_simple;
