// frostgate-server/src/lib.rs
// ============================================================================
// Crate: frostgate-server
// Description: HTTP surface for FrostGate: auth, rate limiting, the decision
//              endpoint, the audit/feed query surface, health, and dev seed.
// Purpose: Wire C2/C8/C9/C10 together behind one axum::Router and expose a
//          single `serve` entry point for frostgate-cli.
// Dependencies: axum, frostgate-config, frostgate-store, tokio
// ============================================================================

//! ## Overview
//! `frostgate-server` owns every I/O-facing concern around the pure pipeline
//! in `frostgate-core`: request auth (C2), rate limiting, routing, the
//! presentation engine (C8), dev-seed (C9), and health/status (C10). Feature
//! flags in [`frostgate_config::FeatureFlags`] gate optional surfaces; a
//! flag that is off means its routes are never mounted, so the request falls
//! through to the uniform 404 fallback rather than a bespoke guard in every
//! handler.

#![allow(clippy::missing_errors_doc, reason = "error docs are carried on the error enums themselves")]

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod auth;
pub mod error;
pub mod presentation;
pub mod rate_limit;
pub mod routes;
pub mod state;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use axum::routing::post;
use thiserror::Error;

use crate::error::ApiError;
pub use crate::state::AppState;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal errors raised while binding or running the HTTP listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured bind address could not be parsed.
    #[error("invalid bind address {0:?}")]
    InvalidBindAddr(String),
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the listener attempted to bind.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The server loop exited with an error.
    #[error("server loop failed: {0}")]
    Serve(std::io::Error),
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the full axum router for `state`, mounting feature-flagged
/// surfaces only when their flag is on.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(routes::health::health))
        .route("/health/live", get(routes::health::live))
        .route("/health/ready", get(routes::health::ready))
        .route("/status", get(routes::health::status))
        .route("/v1/status", get(routes::health::status))
        .route("/defend", post(routes::defend::defend))
        .route("/v1/defend", post(routes::defend::defend))
        .route("/decisions", get(routes::decisions::list))
        .route("/decisions/{id}", get(routes::decisions::get))
        .route("/v1/decisions", get(routes::decisions::list))
        .route("/v1/decisions/{id}", get(routes::decisions::get))
        .route("/feed/live", get(routes::feed::live))
        .route("/v1/feed/live", get(routes::feed::live))
        .route(
            "/feed/stream",
            get(routes::feed::stream_get).head(routes::feed::stream_head),
        )
        .route(
            "/v1/feed/stream",
            get(routes::feed::stream_get).head(routes::feed::stream_head),
        )
        .route("/dev/seed", post(routes::dev_seed::seed))
        .route("/dev/emit", post(routes::dev_seed::emit))
        .fallback(not_found);

    router = mount_feature_surfaces(router, &state);
    router.with_state(state)
}

/// Mounts the declared-but-unimplemented feature-flagged surfaces behind a
/// common interface: one stub route per flag, present only when the flag is
/// on. These surfaces are contract-only per the specification's Design
/// Notes — the route shape is reserved, the behavior is not part of this
/// build.
fn mount_feature_surfaces(mut router: Router<AppState>, state: &AppState) -> Router<AppState> {
    let features = state.config.features;
    if features.mission_envelope_enabled {
        router = router.route("/mission-envelope", get(feature_stub));
    }
    if features.ring_router_enabled {
        router = router.route("/ring-router", get(feature_stub));
    }
    if features.roe_engine_enabled {
        router = router.route("/roe-engine", get(feature_stub));
    }
    if features.forensics_enabled {
        router = router.route("/forensics", get(feature_stub));
    }
    if features.governance_enabled {
        router = router.route("/governance", get(feature_stub));
    }
    router
}

async fn feature_stub() -> ApiError {
    ApiError::new(StatusCode::NOT_IMPLEMENTED, "feature surface reserved, not implemented")
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}

// ============================================================================
// SECTION: Serve
// ============================================================================

/// Binds and serves `state`'s configured listener until the process is
/// signaled to stop.
///
/// # Errors
///
/// Returns [`ServerError`] if the bind address is invalid, the listener
/// cannot be bound, or the server loop fails.
pub async fn serve(state: AppState) -> Result<(), ServerError> {
    let addr: SocketAddr = state
        .config
        .bind_addr
        .parse()
        .map_err(|_| ServerError::InvalidBindAddr(state.config.bind_addr.clone()))?;
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    axum::serve(listener, router.into_make_service()).await.map_err(ServerError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use frostgate_config::ConfigOverrides;
    use frostgate_store::SqliteStoreConfig;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

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
        (dir, AppState::new(config, store, Arc::new(audit::NoopAuditSink)))
    }

    #[tokio::test]
    async fn health_route_is_always_mounted() {
        let (_dir, state) = test_state(false);
        let router = build_router(state);
        let response = router
            .oneshot(axum::http::Request::builder().uri("/health").body(axum::body::Body::empty()).unwrap())
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_uniform_404_body() {
        let (_dir, state) = test_state(false);
        let router = build_router(state);
        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri("/nonexistent")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["detail"], "Not found");
    }

    #[tokio::test]
    async fn dev_seed_route_absent_unless_flag_enabled() {
        let (_dir, state) = test_state(false);
        let router = build_router(state);
        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/dev/seed")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
