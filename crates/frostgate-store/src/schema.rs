// frostgate-store/src/schema.rs
// ============================================================================
// Module: Schema
// Description: Connection setup, pragmas, and versioned schema migration.
// Purpose: Open a durable SQLite connection and ensure the decisions/
//          api_keys/tenants tables exist before the store serves requests.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! Schema state lives in a single-row `store_meta` table, the same pattern
//! used elsewhere in this codebase's persistence layer: a stored integer
//! version is matched against [`SCHEMA_VERSION`] and future migrations are
//! dispatched by matching on the prior value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// SQLite schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// SQLite journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended; the default).
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the SQLite pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// SQLite synchronous mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced; acceptable under WAL).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the SQLite pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the decision store's SQLite connection.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// Journal mode.
    pub journal_mode: SqliteStoreMode,
    /// Synchronous mode.
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config pointed at `path` with the store's recommended
    /// durability defaults (WAL, full sync, 5s busy timeout).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::Wal,
            sync_mode: SqliteSyncMode::Full,
        }
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Opens a connection and ensures the schema is initialized, creating the
/// database file and its parent directory when absent.
///
/// # Errors
///
/// Returns [`StoreError`] when the parent directory cannot be created, the
/// connection cannot be opened, pragmas cannot be applied, or the schema is
/// at an unsupported version.
pub fn open(config: &SqliteStoreConfig) -> Result<Connection, StoreError> {
    ensure_parent_dir(&config.path)?;
    let mut connection = open_connection(config)?;
    initialize_schema(&mut connection)?;
    Ok(connection)
}

fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| StoreError::Io(err.to_string()))
}

fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, StoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| StoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), StoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| StoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| StoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| StoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| StoreError::Db(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Schema Migration
// ============================================================================

fn initialize_schema(connection: &mut Connection) -> Result<(), StoreError> {
    let tx = connection.transaction().map_err(|err| StoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| StoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| StoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| StoreError::Db(err.to_string()))?;
            create_tables(&tx)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(StoreError::VersionMismatch(format!(
                "unsupported store schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| StoreError::Db(err.to_string()))
}

fn create_tables(tx: &rusqlite::Transaction<'_>) -> Result<(), StoreError> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS decisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at_ms INTEGER NOT NULL,
            tenant_id TEXT NOT NULL,
            source TEXT NOT NULL,
            event_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            threat_level TEXT NOT NULL,
            score INTEGER NOT NULL,
            anomaly_score REAL NOT NULL,
            ai_adversarial_score REAL NOT NULL,
            pq_fallback INTEGER NOT NULL,
            rules_triggered_json TEXT NOT NULL,
            decision_diff_json TEXT,
            request_json TEXT NOT NULL,
            response_json TEXT NOT NULL,
            prev_hash TEXT NOT NULL,
            chain_hash TEXT NOT NULL,
            latency_ms INTEGER NOT NULL,
            explain_summary TEXT NOT NULL,
            UNIQUE (event_id)
        );
        CREATE INDEX IF NOT EXISTS idx_decisions_key
            ON decisions (tenant_id, source, event_type, id DESC);
        CREATE INDEX IF NOT EXISTS idx_decisions_id_desc
            ON decisions (id DESC);
        CREATE TABLE IF NOT EXISTS api_keys (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            key_hash TEXT NOT NULL UNIQUE,
            scopes_json TEXT NOT NULL,
            tenant_id TEXT,
            created_at_ms INTEGER NOT NULL,
            revoked_at_ms INTEGER
        );
        CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            api_key TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at_ms INTEGER NOT NULL
        );",
    )
    .map_err(|err| StoreError::Db(err.to_string()))
}
