// frostgate-server/src/routes/defend.rs
// ============================================================================
// Module: Defend Route
// Description: POST /defend, /v1/defend — the core decision endpoint.
// Purpose: Wire C2 (auth + rate limit) through C3-C6 (the pure pipeline in
//          frostgate-core) to C7 (best-effort persistence) and back.
// Dependencies: axum, frostgate-core, frostgate-store, time
// ============================================================================

//! ## Overview
//! `/defend` is the only hot-path route: authorize, rate-limit, run the pure
//! decision pipeline, persist best-effort, and reply. Per §4.7/§7, a
//! persistence failure never turns into a 5xx — the decision the pipeline
//! already computed is what the caller gets regardless of whether the store
//! accepted it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use frostgate_core::decide_with_event;
use frostgate_store::NewDecisionRecord;
use serde_json::Value;
use time::OffsetDateTime;

use crate::auth;
use crate::audit::AuditEvent;
use crate::error::ApiError;
use crate::rate_limit::RateLimitDecision;
use crate::routes::credentials_from_headers;
use crate::state::AppState;

// ============================================================================
// SECTION: Handler
// ============================================================================

const REQUIRED_SCOPE: &str = "defend:write";

/// `POST /defend`, `POST /v1/defend`.
///
/// # Errors
///
/// Returns [`ApiError`] on auth failure or rate-limit exhaustion. Pipeline
/// and persistence failures never surface here (see §7).
pub async fn defend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(raw_request): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();
    let credentials = credentials_from_headers(&headers);
    let auth_decision = auth::authorize(&credentials, &state.config, &state.store, REQUIRED_SCOPE)?;

    let rate_limit_key = format!(
        "{}:/defend",
        auth_decision.tenant_id.as_deref().unwrap_or("global")
    );
    if let RateLimitDecision::Limited { retry_after_ms } = state.rate_limiter.check(&rate_limit_key)
    {
        state.audit.record(&AuditEvent::auth(
            "/defend",
            "deny",
            Some("rate limited".to_string()),
            auth_decision.tenant_id.clone(),
            auth_decision.credential_fingerprint.clone(),
        ));
        return Err(ApiError::rate_limited(retry_after_ms));
    }

    let now = OffsetDateTime::now_utc();
    let (event, decision) = match decide_with_event(now, &raw_request, state.config.clock_stale_ms) {
        Ok(result) => result,
        Err(err) => {
            // RuleEngineError per §7: should not occur; fall back to the
            // minimal response rather than failing the request.
            state.audit.record(&AuditEvent::defend("error", auth_decision.tenant_id.clone()));
            return Err(ApiError::new(
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("decision pipeline failed: {err}"),
            ));
        }
    };

    let response_json = serde_json::to_value(&decision)
        .unwrap_or_else(|_| serde_json::json!({"event_id": decision.event_id}));

    let tenant_id = auth_decision
        .tenant_id
        .clone()
        .or_else(|| event.tenant_id.clone())
        .unwrap_or_default();
    let latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

    let new_record = NewDecisionRecord {
        tenant_id,
        source: event.source.clone(),
        event_id: decision.event_id.clone(),
        event_type: event.event_type.clone(),
        threat_level: decision.threat_level.as_str().to_string(),
        score: decision.score,
        anomaly_score: decision.anomaly_score,
        ai_adversarial_score: 0.0,
        pq_fallback: false,
        rules_triggered: decision.rules_triggered.clone(),
        request_json: raw_request,
        response_json,
        latency_ms,
        explain_summary: decision.explanation_brief.clone(),
    };

    // Best-effort persistence: a store failure is logged and never turns
    // the already-computed decision into a 5xx (see §4.7/§7).
    match state.store.insert_decision(new_record) {
        Ok(_) => {
            state.audit.record(&AuditEvent::defend(
                decision.gating_decision.as_str(),
                auth_decision.tenant_id.clone(),
            ));
        }
        Err(err) => {
            state.audit.record(&AuditEvent::auth(
                "/defend",
                "allow",
                Some(format!("persistence failed: {err}")),
                auth_decision.tenant_id.clone(),
                auth_decision.credential_fingerprint.clone(),
            ));
        }
    }

    Ok(Json(decision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use frostgate_config::ConfigOverrides;
    use frostgate_store::DecisionFilter;
    use frostgate_store::SqliteStoreConfig;
    use std::sync::Arc;

    fn test_state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store =
            frostgate_store::DecisionStore::open(&SqliteStoreConfig::new(dir.path().join("db")))
                .expect("open store");
        let (config, _warnings) = frostgate_config::resolve_from(
            |_| None,
            ConfigOverrides { auth_enabled: Some(false) },
        )
        .expect("config");
        let state = AppState::new(config, store, Arc::new(crate::audit::NoopAuditSink));
        (dir, state)
    }

    #[tokio::test]
    async fn bruteforce_scenario_persists_and_returns_high() {
        let (_dir, state) = test_state();
        let raw = serde_json::json!({
            "source": "pytest",
            "event_type": "auth.bruteforce",
            "payload": {"src_ip": "1.2.3.4", "failed_auths": 7},
        });
        let response = defend(State(state.clone()), HeaderMap::new(), Json(raw))
            .await
            .expect("defend succeeds")
            .into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let rows = state
            .store
            .list_decisions(&DecisionFilter { limit: 10, ..Default::default() })
            .expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].threat_level, "high");
    }

    #[tokio::test]
    async fn rate_limit_exhaustion_returns_non_2xx_without_failing_open() {
        let (_dir, state) = test_state();
        let raw = serde_json::json!({"source": "pytest", "event_type": "heartbeat", "payload": {}});
        for _ in 0..state.config.rate_limit.max_requests {
            let _ = defend(State(state.clone()), HeaderMap::new(), Json(raw.clone())).await;
        }
        let result = defend(State(state.clone()), HeaderMap::new(), Json(raw)).await;
        assert!(result.is_err());
    }
}
