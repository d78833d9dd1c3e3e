// frostgate-store/src/lib.rs
// ============================================================================
// Crate: frostgate-store
// Description: SQLite-backed persistence for decisions, api keys, tenants.
// Purpose: Implement C7 (Persistence) from the specification.
// Dependencies: frostgate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate owns the durable side of FrostGate: a WAL-mode SQLite
//! database holding the decision audit trail and the identity tables the
//! auth boundary consults. Every decision insert runs the same protocol —
//! load predecessor, diff, chain hash, insert with duplicate tolerance — so
//! the chain can be replayed and verified from the stored rows alone.

#![allow(clippy::missing_errors_doc, reason = "documented once here; see StoreError variants")]

// ============================================================================
// SECTION: Modules
// ============================================================================

mod diff;
mod schema;
mod store;
mod types;

pub use schema::SqliteStoreConfig;
pub use schema::SqliteStoreMode;
pub use schema::SqliteSyncMode;
pub use store::DecisionStore;
pub use types::ApiKeyRecord;
pub use types::DecisionFilter;
pub use types::DecisionRecord;
pub use types::NewDecisionRecord;
pub use types::TenantRecord;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the decision store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem I/O failure (e.g. cannot create the parent directory).
    #[error("store io error: {0}")]
    Io(String),
    /// SQLite engine error.
    #[error("store db error: {0}")]
    Db(String),
    /// Stored schema version is not one this build understands.
    #[error("store schema version mismatch: {0}")]
    VersionMismatch(String),
    /// Malformed data rejected before it reached SQL.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Chain hash computation failed; per §4.7 this never fails the caller
    /// at the decision-assembly layer, but the store surfaces it so the
    /// server can log and fall back to an empty chain hash.
    #[error("store chain hash error: {0}")]
    Chain(String),
}
