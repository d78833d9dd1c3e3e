// frostgate-store/src/types.rs
// ============================================================================
// Module: Store Types
// Description: Row and input types for the decision, api_keys, and tenants
//              tables.
// Purpose: Give the insert/query paths one stable shape independent of the
//          underlying SQL column layout.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`DecisionRecord`] mirrors the `decisions` table row-for-row. Callers
//! build a [`NewDecisionRecord`] (everything the caller knows before the
//! store assigns `id`, `created_at_ms`, `prev_hash`, and `chain_hash`) and
//! hand it to `DecisionStore::insert_decision`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Decision Record
// ============================================================================

/// A persisted row in the `decisions` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionRecord {
    /// Monotonic integer primary key.
    pub id: i64,
    /// Row creation instant, unix epoch milliseconds.
    pub created_at_ms: i64,
    /// Tenant identifier, empty string when the caller asserted none.
    pub tenant_id: String,
    /// Reporting source.
    pub source: String,
    /// sha256 hex digest of the canonical request JSON.
    pub event_id: String,
    /// Resolved event type.
    pub event_type: String,
    /// Threat tier label (`none`/`low`/`medium`/`high`/`critical`).
    pub threat_level: String,
    /// Total rule score that produced `threat_level`, kept alongside it so
    /// `decision_diff` can report a precise `score.from`/`score.to`/`delta`
    /// (not itemized as its own column in the distilled data model, but
    /// required to compute the diff it specifies).
    pub score: u32,
    /// Anomaly score in `[0, 1]`.
    pub anomaly_score: f64,
    /// Legacy adversarial-model score in `[0, 1]`; zero unless a caller
    /// (e.g. dev seed) explicitly sets it. Not computed by the MVP rule
    /// engine.
    pub ai_adversarial_score: f64,
    /// Legacy post-quantum-fallback flag; false unless explicitly set.
    pub pq_fallback: bool,
    /// Rule identifiers triggered, in stable order, deduplicated.
    pub rules_triggered: Vec<String>,
    /// Structured delta against the prior record for this key; `None` when
    /// there was no prior record or diff computation failed.
    pub decision_diff: Option<Value>,
    /// Raw request body as submitted.
    pub request_json: Value,
    /// Response body as returned to the caller.
    pub response_json: Value,
    /// Hex chain-hash of the predecessor row; empty string for the first
    /// record in a chain.
    pub prev_hash: String,
    /// `sha256(prev_hash || canonical(record_minus_hashes))`.
    pub chain_hash: String,
    /// Request handling latency in milliseconds.
    pub latency_ms: i64,
    /// One-line explanation, duplicated from the decision for fast listing.
    pub explain_summary: String,
}

// ============================================================================
// SECTION: New Decision Record
// ============================================================================

/// Caller-supplied fields for a new `decisions` row; the store computes
/// `id`, `created_at_ms`, `prev_hash`, and `chain_hash`.
#[derive(Debug, Clone)]
pub struct NewDecisionRecord {
    /// Tenant identifier, empty string when none.
    pub tenant_id: String,
    /// Reporting source.
    pub source: String,
    /// sha256 hex digest of the canonical request JSON.
    pub event_id: String,
    /// Resolved event type.
    pub event_type: String,
    /// Threat tier label.
    pub threat_level: String,
    /// Total rule score that produced `threat_level`.
    pub score: u32,
    /// Anomaly score in `[0, 1]`.
    pub anomaly_score: f64,
    /// Legacy adversarial-model score; defaults to `0.0` for the MVP rule
    /// engine's own output.
    pub ai_adversarial_score: f64,
    /// Legacy post-quantum-fallback flag; defaults to `false`.
    pub pq_fallback: bool,
    /// Rule identifiers triggered.
    pub rules_triggered: Vec<String>,
    /// Raw request body.
    pub request_json: Value,
    /// Response body returned to the caller.
    pub response_json: Value,
    /// Request handling latency in milliseconds.
    pub latency_ms: i64,
    /// One-line explanation.
    pub explain_summary: String,
}

/// Canonical projection of a [`DecisionRecord`] used as the chain-hash
/// payload: excludes `id`, `prev_hash`, `chain_hash`, and `created_at_ms` so
/// the hash covers only content, not storage bookkeeping (see the
/// specification's Design Notes on chain hashing).
#[derive(Debug, Serialize)]
pub(crate) struct ChainPayload<'a> {
    pub tenant_id: &'a str,
    pub source: &'a str,
    pub event_id: &'a str,
    pub event_type: &'a str,
    pub threat_level: &'a str,
    pub score: u32,
    pub anomaly_score: f64,
    pub ai_adversarial_score: f64,
    pub pq_fallback: bool,
    pub rules_triggered: &'a [String],
    pub decision_diff: &'a Option<Value>,
    pub request_json: &'a Value,
    pub response_json: &'a Value,
    pub latency_ms: i64,
    pub explain_summary: &'a str,
}

// ============================================================================
// SECTION: Api Key / Tenant Records
// ============================================================================

/// A persisted row in the `api_keys` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiKeyRecord {
    /// Monotonic integer primary key.
    pub id: i64,
    /// Human-readable label for the key.
    pub name: String,
    /// sha256 hex digest of the key's secret segment.
    pub key_hash: String,
    /// Scopes granted to the key (e.g. `defend:write`).
    pub scopes: Vec<String>,
    /// Tenant this key is bound to, when scoped.
    pub tenant_id: Option<String>,
    /// Row creation instant, unix epoch milliseconds.
    pub created_at_ms: i64,
    /// Revocation instant, when revoked.
    pub revoked_at_ms: Option<i64>,
}

impl ApiKeyRecord {
    /// Returns true when the key has not been revoked.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.revoked_at_ms.is_none()
    }

    /// Returns true when `scope` is granted.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|granted| granted == scope)
    }
}

/// A persisted row in the `tenants` table.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantRecord {
    /// Tenant identifier.
    pub id: String,
    /// Human-readable tenant name.
    pub name: String,
    /// API key compared verbatim on the tenant auth path.
    pub api_key: String,
    /// Lifecycle status: `"active"`, `"suspended"`, or `"revoked"`.
    pub status: String,
    /// Row creation instant, unix epoch milliseconds.
    pub created_at_ms: i64,
}

impl TenantRecord {
    /// Returns true when `status == "active"`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

// ============================================================================
// SECTION: Query Filters
// ============================================================================

/// Filters accepted by `DecisionStore::list_decisions` (C8's `/decisions`
/// and `/feed/live`, which layer additional filtering on top of this).
#[derive(Debug, Clone, Default)]
pub struct DecisionFilter {
    /// Maximum rows to return.
    pub limit: u32,
    /// Only return rows with `id < since_id` (exclusive upper bound for
    /// descending/backward pagination); `None` means no bound.
    pub since_id: Option<i64>,
    /// Only return rows with `id > after_id` (exclusive lower bound for
    /// forward polling, e.g. the SSE feed's rolling cursor); `None` means no
    /// bound. Mutually exclusive with `since_id` in practice, but both may
    /// be set.
    pub after_id: Option<i64>,
    /// Restrict to a tenant.
    pub tenant_id: Option<String>,
    /// Restrict to a source.
    pub source: Option<String>,
    /// Restrict to an event type.
    pub event_type: Option<String>,
    /// Restrict to a threat level.
    pub threat_level: Option<String>,
}
