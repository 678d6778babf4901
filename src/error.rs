//! Core error kinds and their HTTP mapping.
//!
//! Mirrors the shape of the teacher's `AuthApiError`: a flat enum matched
//! once into `(StatusCode, error_code, message)`, with no internal detail
//! (SQL text, stack traces) ever reaching the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

/// Abstract error kinds from the spec's error-handling design (§7).
#[derive(Debug)]
pub enum CoreError {
    InvalidInput(String),
    Unauthorized,
    SchemaViolation(String),
    RateLimited { retry_after_secs: u64 },
    NotFound,
    OutcomeConflict,
    CoreFailure(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error_code: &'static str,
    message: String,
    request_id: String,
}

impl CoreError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            CoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            CoreError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            CoreError::SchemaViolation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "schema_violation"),
            CoreError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            CoreError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            CoreError::OutcomeConflict => (StatusCode::CONFLICT, "outcome_conflict"),
            CoreError::CoreFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, "core_failure"),
        }
    }

    fn message(&self) -> String {
        match self {
            CoreError::InvalidInput(m) => m.clone(),
            CoreError::Unauthorized => "missing or invalid API key".to_string(),
            CoreError::SchemaViolation(m) => m.clone(),
            CoreError::RateLimited { .. } => "request rate limit exceeded".to_string(),
            CoreError::NotFound => "transaction not found".to_string(),
            CoreError::OutcomeConflict => "feedback outcome conflicts with a previously recorded outcome".to_string(),
            CoreError::CoreFailure(_) => "internal error".to_string(),
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        let retry_after = match &self {
            CoreError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        if let CoreError::CoreFailure(detail) = &self {
            tracing::error!(detail = %detail, "core failure");
        }
        let body = ErrorBody {
            error_code,
            message: self.message(),
            request_id: Uuid::new_v4().to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert("Retry-After", secs.to_string().parse().unwrap());
        }
        response
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(e: anyhow::Error) -> Self {
        CoreError::CoreFailure(e.to_string())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::CoreFailure(e.to_string())
    }
}
