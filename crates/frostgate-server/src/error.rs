// frostgate-server/src/error.rs
// ============================================================================
// Module: HTTP Error Response
// Description: Uniform `{"detail": "<string>"}` error body for every route.
// Purpose: Give every handler one way to fail without leaking internals.
// Dependencies: axum, serde
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;

use crate::auth::AuthError;

// ============================================================================
// SECTION: Error Body
// ============================================================================

/// The uniform error body every non-2xx response carries, per §6.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Minimal, non-sensitive failure detail.
    detail: String,
}

/// An HTTP-facing error: a status code plus a detail string.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status code to return.
    pub status: StatusCode,
    /// Detail string placed in the response body.
    pub detail: String,
}

impl ApiError {
    /// Builds an error with an explicit status and detail.
    #[must_use]
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self { status, detail: detail.into() }
    }

    /// Builds a 404 with a fixed detail, used when a feature flag is off.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }

    /// Builds a 429 carrying a `Retry-After` hint in the detail string.
    #[must_use]
    pub fn rate_limited(retry_after_ms: u64) -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            format!("Rate limit exceeded; retry after {retry_after_ms}ms"),
        )
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = match error {
            AuthError::AuthMissing | AuthError::AuthInvalid => StatusCode::UNAUTHORIZED,
            AuthError::TenantRevoked => StatusCode::UNAUTHORIZED,
            AuthError::ScopeForbidden => StatusCode::FORBIDDEN,
        };
        Self::new(status, error.detail())
    }
}

impl From<frostgate_store::StoreError> for ApiError {
    fn from(error: frostgate_store::StoreError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}
