// frostgate-server/src/routes/dev_seed.rs
// ============================================================================
// Module: Dev Seed Route
// Description: POST /dev/seed, POST /dev/emit — synthetic data for local UI
//              development (C9).
// Purpose: Give a developer pointing a UI at FrostGate something to look at
//          without wiring a real telemetry source, gated behind
//          FG_DEV_EVENTS_ENABLED so it never mounts in production.
// Dependencies: axum, frostgate-store, serde
// ============================================================================

//! ## Overview
//! The seeded dataset always carries `source == "dev_seed"` and includes at
//! least one noise row (`log_only`, info/low severity) and one actionable
//! row (`quarantine`, high/critical severity). The actionable row is
//! preceded by a same-key baseline insert so its `decision_diff_json` is
//! non-null, satisfying the dataset invariant without any bespoke diff path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use frostgate_store::NewDecisionRecord;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::auth;
use crate::error::ApiError;
use crate::routes::credentials_from_headers;
use crate::state::AppState;

// ============================================================================
// SECTION: Request Body
// ============================================================================

/// Optional body for `POST /dev/emit`; omitted or unrecognized `kind`
/// defaults to emitting a noise row.
#[derive(Debug, Default, Deserialize)]
pub struct EmitRequest {
    /// `"noise"` or `"actionable"`; defaults to `"noise"`.
    #[serde(default)]
    pub kind: Option<String>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `POST /dev/seed` — inserts the full deterministic dataset.
///
/// # Errors
///
/// Returns [`ApiError`] on auth failure, 404 when dev events are disabled,
/// or a store failure.
pub async fn seed(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    guard(&state, &headers)?;

    let mut inserted = Vec::new();
    inserted.push(insert_noise(&state, "seed-noise-1")?);
    insert_baseline(&state, "seed-actionable")?;
    inserted.push(insert_actionable(&state, "seed-actionable")?);

    Ok(Json(json!({ "inserted": inserted.len() })))
}

/// `POST /dev/emit` — inserts one event, `kind` selected by the request
/// body.
///
/// # Errors
///
/// Returns [`ApiError`] on auth failure, 404 when dev events are disabled,
/// or a store failure.
pub async fn emit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<EmitRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    guard(&state, &headers)?;

    let kind = body.and_then(|Json(request)| request.kind).unwrap_or_else(|| "noise".to_string());
    let record = if kind == "actionable" {
        let key = format!("emit-actionable-{}", state.store.list_decisions(&Default::default())?.len());
        insert_baseline(&state, &key)?;
        insert_actionable(&state, &key)?
    } else {
        insert_noise(&state, "emit-noise")?
    };

    Ok(Json(json!({ "id": record.id, "event_id": record.event_id })))
}

fn guard(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if !state.config.features.dev_events_enabled {
        return Err(ApiError::not_found());
    }
    let credentials = credentials_from_headers(headers);
    auth::authorize(&credentials, &state.config, &state.store, "")?;
    Ok(())
}

fn insert_noise(
    state: &AppState,
    event_id: &str,
) -> Result<frostgate_store::DecisionRecord, ApiError> {
    Ok(state.store.insert_decision(NewDecisionRecord {
        tenant_id: String::new(),
        source: "dev_seed".to_string(),
        event_id: event_id.to_string(),
        event_type: "heartbeat".to_string(),
        threat_level: "none".to_string(),
        score: 2,
        anomaly_score: 0.05,
        ai_adversarial_score: 0.0,
        pq_fallback: false,
        rules_triggered: vec!["rule:default_allow".to_string()],
        request_json: json!({"source": "dev_seed", "event_type": "heartbeat"}),
        response_json: json!({"threat_level": "none"}),
        latency_ms: 1,
        explain_summary: "No rule matched; default allow.".to_string(),
    })?)
}

/// Inserts a low-severity baseline under the same `(tenant_id, source,
/// event_type)` key that [`insert_actionable`] uses, purely so the next
/// insert's diff computation has a predecessor to compare against.
fn insert_baseline(state: &AppState, key: &str) -> Result<(), ApiError> {
    state.store.insert_decision(NewDecisionRecord {
        tenant_id: String::new(),
        source: "dev_seed".to_string(),
        event_id: format!("{key}-baseline"),
        event_type: "auth.bruteforce".to_string(),
        threat_level: "low".to_string(),
        score: 20,
        anomaly_score: 0.2,
        ai_adversarial_score: 0.0,
        pq_fallback: false,
        rules_triggered: Vec::new(),
        request_json: json!({"source": "dev_seed", "event_type": "auth.bruteforce"}),
        response_json: json!({"threat_level": "low"}),
        latency_ms: 1,
        explain_summary: "Baseline signal, below bruteforce threshold.".to_string(),
    })?;
    Ok(())
}

fn insert_actionable(
    state: &AppState,
    key: &str,
) -> Result<frostgate_store::DecisionRecord, ApiError> {
    Ok(state.store.insert_decision(NewDecisionRecord {
        tenant_id: String::new(),
        source: "dev_seed".to_string(),
        event_id: format!("{key}-high"),
        event_type: "auth.bruteforce".to_string(),
        threat_level: "high".to_string(),
        score: 90,
        anomaly_score: 0.8,
        ai_adversarial_score: 0.0,
        pq_fallback: false,
        rules_triggered: vec!["rule:ssh_bruteforce".to_string()],
        request_json: json!({
            "source": "dev_seed",
            "event_type": "auth.bruteforce",
            "payload": {"src_ip": "203.0.113.7", "failed_auths": 9},
        }),
        response_json: json!({"threat_level": "high"}),
        latency_ms: 1,
        explain_summary: "Suspicious behavior matched rule 'rule:ssh_bruteforce'.".to_string(),
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation;
    use frostgate_config::ConfigOverrides;
    use frostgate_store::SqliteStoreConfig;
    use std::sync::Arc;

    fn test_state(dev_events_enabled: bool) -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store =
            frostgate_store::DecisionStore::open(&SqliteStoreConfig::new(dir.path().join("db")))
                .expect("open store");
        let lookup = move |key: &str| {
            if key == "FG_DEV_EVENTS_ENABLED" && dev_events_enabled {
                Some("1".to_string())
            } else {
                None
            }
        };
        let (config, _warnings) =
            frostgate_config::resolve_from(lookup, ConfigOverrides { auth_enabled: Some(false) })
                .expect("config");
        (dir, AppState::new(config, store, Arc::new(crate::audit::NoopAuditSink)))
    }

    #[tokio::test]
    async fn disabled_feature_returns_404() {
        let (_dir, state) = test_state(false);
        let result = seed(State(state), HeaderMap::new()).await;
        let err = result.err().expect("must fail");
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn seeded_dataset_satisfies_noise_and_actionable_invariants() {
        let (_dir, state) = test_state(true);
        seed(State(state.clone()), HeaderMap::new()).await.expect("seed");

        let rows = state
            .store
            .list_decisions(&frostgate_store::DecisionFilter { limit: 10, ..Default::default() })
            .expect("list");
        assert!(rows.iter().all(|row| row.source == "dev_seed"));

        let items: Vec<_> = rows.iter().map(presentation::present).collect();
        assert!(items.iter().any(|item| item.is_noise()));

        let actionable = rows.iter().find(|row| row.event_id.ends_with("-high")).expect("actionable row");
        assert!(actionable.decision_diff.is_some());
    }
}
