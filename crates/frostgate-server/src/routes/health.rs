// frostgate-server/src/routes/health.rs
// ============================================================================
// Module: Health / Status Routes
// Description: Liveness, readiness, and auth-gated status endpoints (C10).
// Purpose: Give operators and load balancers a cheap way to probe the
//          process and the store without touching the decision pipeline.
// Dependencies: axum, frostgate-store
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::error::ApiError;
use crate::routes::credentials_from_headers;
use crate::state::AppState;

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /health` — mirrors config, no auth.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": state.config.service,
        "env": state.config.env,
        "auth_enabled": state.config.auth_enabled,
    }))
}

/// `GET /health/live` — 200 whenever the process can answer at all.
pub async fn live() -> impl IntoResponse {
    StatusCode::OK
}

/// `GET /health/ready` — 200 iff the database file exists and is queryable.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_decisions(&frostgate_store::DecisionFilter {
        limit: 1,
        ..Default::default()
    }) {
        Ok(_) => StatusCode::OK.into_response(),
        Err(err) => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("DB missing or unqueryable: {err}"),
        )
        .into_response(),
    }
}

/// `GET /status`, `GET /v1/status` — auth-gated service metadata.
pub async fn status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = credentials_from_headers(&headers);
    let decision = crate::auth::authorize(&credentials, &state.config, &state.store, "")?;
    state.audit.record(&crate::audit::AuditEvent::auth(
        "/status",
        "allow",
        None,
        decision.tenant_id.clone(),
        decision.credential_fingerprint,
    ));
    Ok(Json(json!({
        "service": state.config.service,
        "env": state.config.env,
        "auth_enabled": state.config.auth_enabled,
        "features": {
            "dev_events_enabled": state.config.features.dev_events_enabled,
            "mission_envelope_enabled": state.config.features.mission_envelope_enabled,
            "ring_router_enabled": state.config.features.ring_router_enabled,
            "roe_engine_enabled": state.config.features.roe_engine_enabled,
            "forensics_enabled": state.config.features.forensics_enabled,
            "governance_enabled": state.config.features.governance_enabled,
        },
    })))
}
