// frostgate-server/src/routes/decisions.rs
// ============================================================================
// Module: Decisions Route
// Description: GET /decisions, GET /decisions/{id} — the raw audit trail (C8).
// Purpose: Expose stored decision rows, with an `include_raw` toggle so
//          callers that only want the presented feed shape skip the request
//          and response payload bodies.
// Dependencies: axum, frostgate-store, serde
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use frostgate_store::DecisionFilter;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::auth;
use crate::error::ApiError;
use crate::presentation;
use crate::routes::credentials_from_headers;
use crate::state::AppState;

const REQUIRED_SCOPE: &str = "decisions:read";

// ============================================================================
// SECTION: Query Params
// ============================================================================

/// Query parameters accepted by `GET /decisions`.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionsQuery {
    /// Maximum rows to return; clamped to `[1, 500]`, defaults to 50.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Exclusive upper id bound for descending pagination.
    #[serde(default)]
    pub since_id: Option<i64>,
    /// Restrict to a tenant.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Restrict to a source.
    #[serde(default)]
    pub source: Option<String>,
    /// Restrict to an event type.
    #[serde(default)]
    pub event_type: Option<String>,
    /// Restrict to a threat level.
    #[serde(default)]
    pub threat_level: Option<String>,
    /// When true, include `request_json`/`response_json` in the response.
    #[serde(default)]
    pub include_raw: bool,
}

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(50).clamp(1, 500)
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /decisions`, `GET /v1/decisions`.
///
/// # Errors
///
/// Returns [`ApiError`] on auth failure.
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DecisionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = credentials_from_headers(&headers);
    auth::authorize(&credentials, &state.config, &state.store, REQUIRED_SCOPE)?;

    let filter = DecisionFilter {
        limit: clamp_limit(query.limit),
        since_id: query.since_id,
        tenant_id: query.tenant_id.clone(),
        source: query.source.clone(),
        event_type: query.event_type.clone(),
        threat_level: query.threat_level.clone(),
    };
    let rows = state.store.list_decisions(&filter)?;

    let items: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut item = presentation::present(row).to_json();
            item["event_id"] = json!(row.event_id);
            item["prev_hash"] = json!(row.prev_hash);
            item["chain_hash"] = json!(row.chain_hash);
            item["decision_diff"] = row.decision_diff.clone().unwrap_or(Value::Null);
            item["latency_ms"] = json!(row.latency_ms);
            if query.include_raw {
                item["request_json"] = row.request_json.clone();
                item["response_json"] = row.response_json.clone();
            }
            item
        })
        .collect();

    Ok(Json(json!({ "items": items, "count": items.len() })))
}

/// `GET /decisions/{id}`, `GET /v1/decisions/{id}`.
///
/// # Errors
///
/// Returns [`ApiError`] on auth failure, or 404 when the row is absent.
pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = credentials_from_headers(&headers);
    auth::authorize(&credentials, &state.config, &state.store, REQUIRED_SCOPE)?;

    let row = state.store.get_decision(id)?.ok_or_else(ApiError::not_found)?;
    let mut item = presentation::present(&row).to_json();
    item["event_id"] = json!(row.event_id);
    item["prev_hash"] = json!(row.prev_hash);
    item["chain_hash"] = json!(row.chain_hash);
    item["decision_diff"] = row.decision_diff.clone().unwrap_or(Value::Null);
    item["latency_ms"] = json!(row.latency_ms);
    item["request_json"] = row.request_json.clone();
    item["response_json"] = row.response_json.clone();

    Ok(Json(item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use frostgate_config::ConfigOverrides;
    use frostgate_store::NewDecisionRecord;
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
        (dir, AppState::new(config, store, Arc::new(crate::audit::NoopAuditSink)))
    }

    fn seed(state: &AppState, event_id: &str) {
        state
            .store
            .insert_decision(NewDecisionRecord {
                tenant_id: String::new(),
                source: "pytest".to_string(),
                event_id: event_id.to_string(),
                event_type: "auth.bruteforce".to_string(),
                threat_level: "high".to_string(),
                score: 85,
                anomaly_score: 0.7,
                ai_adversarial_score: 0.0,
                pq_fallback: false,
                rules_triggered: vec!["rule:ssh_bruteforce".to_string()],
                request_json: json!({}),
                response_json: json!({}),
                latency_ms: 1,
                explain_summary: "n/a".to_string(),
            })
            .expect("seed");
    }

    #[tokio::test]
    async fn list_excludes_raw_by_default_and_includes_it_when_requested() {
        let (_dir, state) = test_state();
        seed(&state, "e1");

        let without_raw = list(
            State(state.clone()),
            HeaderMap::new(),
            Query(DecisionsQuery {
                limit: None,
                since_id: None,
                tenant_id: None,
                source: None,
                event_type: None,
                threat_level: None,
                include_raw: false,
            }),
        )
        .await
        .expect("list")
        .into_response();
        assert_eq!(without_raw.status(), axum::http::StatusCode::OK);

        let with_raw = list(
            State(state.clone()),
            HeaderMap::new(),
            Query(DecisionsQuery {
                limit: None,
                since_id: None,
                tenant_id: None,
                source: None,
                event_type: None,
                threat_level: None,
                include_raw: true,
            }),
        )
        .await
        .expect("list");
        let _ = with_raw;
    }

    #[tokio::test]
    async fn get_unknown_id_returns_404() {
        let (_dir, state) = test_state();
        let result = get(State(state), HeaderMap::new(), Path(999)).await;
        assert!(result.is_err());
    }
}
