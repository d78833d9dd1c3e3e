// frostgate-server/src/state.rs
// ============================================================================
// Module: Server State
// Description: Shared state threaded through every axum handler.
// Purpose: Bundle config, store, audit sink, and rate limiter behind one
//          cheaply-clonable handle.
// Dependencies: frostgate-config, frostgate-store
// ============================================================================

//! ## Overview
//! One immutable [`FrostgateConfig`] (resolved once at startup, per §4.1),
//! one [`DecisionStore`] handle, one [`AuditSink`], and one [`RateLimiter`]
//! are bundled into [`AppState`] and cloned into every request — cloning is
//! cheap because the store and sink are themselves `Arc`-backed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use frostgate_config::FrostgateConfig;
use frostgate_store::DecisionStore;

use crate::audit::AuditSink;
use crate::rate_limit::RateLimiter;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared, cheaply-clonable server state.
#[derive(Clone)]
pub struct AppState {
    /// Resolved, immutable configuration.
    pub config: Arc<FrostgateConfig>,
    /// Decision store handle.
    pub store: DecisionStore,
    /// Audit sink for auth and defend events.
    pub audit: Arc<dyn AuditSink>,
    /// Per-tenant-per-route rate limiter.
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Builds application state from a resolved config and an open store.
    #[must_use]
    pub fn new(config: FrostgateConfig, store: DecisionStore, audit: Arc<dyn AuditSink>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit));
        Self { config: Arc::new(config), store, audit, rate_limiter }
    }
}
