// frostgate-store/src/store.rs
// ============================================================================
// Module: Decision Store
// Description: SQLite-backed DecisionStore implementing the C7 insert
//              protocol, paginated listing, and api_keys/tenants lookups.
// Purpose: Give the server crate a single durable home for decisions and
//          the out-of-band-administered identity tables.
// Dependencies: frostgate-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! [`DecisionStore`] wraps a single [`rusqlite::Connection`] behind a mutex,
//! matching this codebase's single-writer SQLite concurrency model: one
//! connection, one lock, WAL for concurrent readers. The insert path runs
//! the full §4.7 protocol (load predecessor, diff, chain hash, insert with
//! duplicate-`event_id` tolerance) inside one transaction so a concurrent
//! insert can never observe a half-written chain link.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use frostgate_core::hashing::chain_hash;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde_json::Value;

use crate::StoreError;
use crate::diff;
use crate::schema;
use crate::schema::SqliteStoreConfig;
use crate::types::ApiKeyRecord;
use crate::types::ChainPayload;
use crate::types::DecisionFilter;
use crate::types::DecisionRecord;
use crate::types::NewDecisionRecord;
use crate::types::TenantRecord;

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed decision store.
#[derive(Clone)]
pub struct DecisionStore {
    connection: Arc<Mutex<Connection>>,
}

impl DecisionStore {
    /// Opens (creating if absent) the decision store at the configured
    /// path and ensures its schema is current.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, StoreError> {
        let connection = schema::open(config)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.connection.lock().map_err(|_| StoreError::Io("store mutex poisoned".to_string()))
    }

    // ------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------

    /// Runs the full §4.7 insert protocol: loads the predecessor for
    /// `(tenant_id, source, event_type)`, computes `decision_diff`, computes
    /// the chain hash, and inserts the row. A unique-constraint violation on
    /// `event_id` is treated as a soft event: the existing row is returned
    /// rather than raising.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any I/O or SQL failure other than the
    /// duplicate-`event_id` case, which this method swallows by design.
    pub fn insert_decision(
        &self,
        input: NewDecisionRecord,
    ) -> Result<DecisionRecord, StoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| StoreError::Db(err.to_string()))?;

        let prev = load_latest_for_key(&tx, &input.tenant_id, &input.source, &input.event_type)?;
        let decision_diff =
            diff::compute(prev.as_ref(), input.score, &input.threat_level, &input.rules_triggered);
        let prev_hash = prev.as_ref().map_or_else(String::new, |row| row.chain_hash.clone());

        let payload = ChainPayload {
            tenant_id: &input.tenant_id,
            source: &input.source,
            event_id: &input.event_id,
            event_type: &input.event_type,
            threat_level: &input.threat_level,
            score: input.score,
            anomaly_score: input.anomaly_score,
            ai_adversarial_score: input.ai_adversarial_score,
            pq_fallback: input.pq_fallback,
            rules_triggered: &input.rules_triggered,
            decision_diff: &decision_diff,
            request_json: &input.request_json,
            response_json: &input.response_json,
            latency_ms: input.latency_ms,
            explain_summary: &input.explain_summary,
        };
        let chain = chain_hash(&prev_hash, &payload).map_err(|err| StoreError::Chain(err.to_string()))?;

        let created_at_ms = unix_millis();
        let rules_json = serde_json::to_string(&input.rules_triggered)
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        let diff_json = decision_diff
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        let request_json = serde_json::to_string(&input.request_json)
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        let response_json = serde_json::to_string(&input.response_json)
            .map_err(|err| StoreError::Invalid(err.to_string()))?;

        let insert_result = tx.execute(
            "INSERT INTO decisions (
                created_at_ms, tenant_id, source, event_id, event_type, threat_level, score,
                anomaly_score, ai_adversarial_score, pq_fallback, rules_triggered_json,
                decision_diff_json, request_json, response_json, prev_hash, chain_hash,
                latency_ms, explain_summary
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)",
            params![
                created_at_ms,
                input.tenant_id,
                input.source,
                input.event_id,
                input.event_type,
                input.threat_level,
                input.score,
                input.anomaly_score,
                input.ai_adversarial_score,
                input.pq_fallback,
                rules_json,
                diff_json,
                request_json,
                response_json,
                prev_hash,
                chain.value,
                input.latency_ms,
                input.explain_summary,
            ],
        );

        let record = match insert_result {
            Ok(_) => {
                let id = tx.last_insert_rowid();
                load_by_id(&tx, id)?.ok_or_else(|| {
                    StoreError::Db("inserted decision row vanished before reselect".to_string())
                })?
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                load_by_event_id(&tx, &input.event_id)?.ok_or_else(|| {
                    StoreError::Db("event_id collision but no existing row found".to_string())
                })?
            }
            Err(err) => return Err(StoreError::Db(err.to_string())),
        };

        tx.commit().map_err(|err| StoreError::Db(err.to_string()))?;
        Ok(record)
    }

    /// Fetches a single decision by row id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on SQL failure.
    pub fn get_decision(&self, id: i64) -> Result<Option<DecisionRecord>, StoreError> {
        let guard = self.lock()?;
        load_by_id(&guard, id)
    }

    /// Lists decisions newest-first by descending `id`, applying `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on SQL failure.
    pub fn list_decisions(
        &self,
        filter: &DecisionFilter,
    ) -> Result<Vec<DecisionRecord>, StoreError> {
        let guard = self.lock()?;
        let mut sql = String::from("SELECT * FROM decisions WHERE 1=1");
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(since_id) = filter.since_id {
            sql.push_str(" AND id < ?");
            bound.push(Box::new(since_id));
        }
        if let Some(after_id) = filter.after_id {
            sql.push_str(" AND id > ?");
            bound.push(Box::new(after_id));
        }
        if let Some(tenant_id) = &filter.tenant_id {
            sql.push_str(" AND tenant_id = ?");
            bound.push(Box::new(tenant_id.clone()));
        }
        if let Some(source) = &filter.source {
            sql.push_str(" AND source = ?");
            bound.push(Box::new(source.clone()));
        }
        if let Some(event_type) = &filter.event_type {
            sql.push_str(" AND event_type = ?");
            bound.push(Box::new(event_type.clone()));
        }
        if let Some(threat_level) = &filter.threat_level {
            sql.push_str(" AND threat_level = ?");
            bound.push(Box::new(threat_level.clone()));
        }
        // Forward polling (after_id set, since_id not) orders ascending so a
        // LIMIT never drops the oldest backlog rows in favor of newer ones
        // the caller hasn't advanced its cursor past yet; every other query
        // keeps the usual newest-first order.
        if filter.after_id.is_some() && filter.since_id.is_none() {
            sql.push_str(" ORDER BY id ASC LIMIT ?");
        } else {
            sql.push_str(" ORDER BY id DESC LIMIT ?");
        }
        let limit = i64::from(if filter.limit == 0 { 100 } else { filter.limit });
        bound.push(Box::new(limit));

        let mut statement = guard.prepare(&sql).map_err(|err| StoreError::Db(err.to_string()))?;
        let params_ref: Vec<&dyn rusqlite::ToSql> =
            bound.iter().map(std::convert::AsRef::as_ref).collect();
        let rows = statement
            .query_map(params_ref.as_slice(), row_to_record)
            .map_err(|err| StoreError::Db(err.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|err| StoreError::Db(err.to_string()))?);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Identity tables (administered out-of-band; see §4.2)
    // ------------------------------------------------------------------

    /// Looks up an active api key record by its sha256 hash.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on SQL failure.
    pub fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT id, name, key_hash, scopes_json, tenant_id, created_at_ms, revoked_at_ms
                 FROM api_keys WHERE key_hash = ?1",
                params![key_hash],
                row_to_api_key,
            )
            .optional()
            .map_err(|err| StoreError::Db(err.to_string()))
    }

    /// Inserts a new api key record (out-of-band administration surface,
    /// also used by dev-seed).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on SQL failure.
    pub fn insert_api_key(
        &self,
        name: &str,
        key_hash: &str,
        scopes: &[String],
        tenant_id: Option<&str>,
    ) -> Result<ApiKeyRecord, StoreError> {
        let guard = self.lock()?;
        let scopes_json =
            serde_json::to_string(scopes).map_err(|err| StoreError::Invalid(err.to_string()))?;
        let created_at_ms = unix_millis();
        guard
            .execute(
                "INSERT INTO api_keys (name, key_hash, scopes_json, tenant_id, created_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![name, key_hash, scopes_json, tenant_id, created_at_ms],
            )
            .map_err(|err| StoreError::Db(err.to_string()))?;
        let id = guard.last_insert_rowid();
        Ok(ApiKeyRecord {
            id,
            name: name.to_string(),
            key_hash: key_hash.to_string(),
            scopes: scopes.to_vec(),
            tenant_id: tenant_id.map(str::to_string),
            created_at_ms,
            revoked_at_ms: None,
        })
    }

    /// Looks up a tenant by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on SQL failure.
    pub fn find_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT id, name, api_key, status, created_at_ms FROM tenants WHERE id = ?1",
                params![tenant_id],
                row_to_tenant,
            )
            .optional()
            .map_err(|err| StoreError::Db(err.to_string()))
    }

    /// Inserts or replaces a tenant record (out-of-band administration
    /// surface, also used by dev-seed).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on SQL failure.
    pub fn upsert_tenant(&self, tenant: &TenantRecord) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO tenants (id, name, api_key, status, created_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    api_key = excluded.api_key,
                    status = excluded.status",
                params![
                    tenant.id,
                    tenant.name,
                    tenant.api_key,
                    tenant.status,
                    tenant.created_at_ms
                ],
            )
            .map_err(|err| StoreError::Db(err.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

fn load_latest_for_key(
    tx: &rusqlite::Transaction<'_>,
    tenant_id: &str,
    source: &str,
    event_type: &str,
) -> Result<Option<DecisionRecord>, StoreError> {
    tx.query_row(
        "SELECT * FROM decisions
         WHERE tenant_id = ?1 AND source = ?2 AND event_type = ?3
         ORDER BY id DESC LIMIT 1",
        params![tenant_id, source, event_type],
        row_to_record,
    )
    .optional()
    .map_err(|err| StoreError::Db(err.to_string()))
}

fn load_by_id(
    connection: &Connection,
    id: i64,
) -> Result<Option<DecisionRecord>, StoreError> {
    connection
        .query_row("SELECT * FROM decisions WHERE id = ?1", params![id], row_to_record)
        .optional()
        .map_err(|err| StoreError::Db(err.to_string()))
}

fn load_by_event_id(
    tx: &rusqlite::Transaction<'_>,
    event_id: &str,
) -> Result<Option<DecisionRecord>, StoreError> {
    tx.query_row(
        "SELECT * FROM decisions WHERE event_id = ?1",
        params![event_id],
        row_to_record,
    )
    .optional()
    .map_err(|err| StoreError::Db(err.to_string()))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<DecisionRecord> {
    let rules_json: String = row.get("rules_triggered_json")?;
    let rules_triggered: Vec<String> = serde_json::from_str(&rules_json).unwrap_or_default();
    let diff_json: Option<String> = row.get("decision_diff_json")?;
    let decision_diff: Option<Value> =
        diff_json.and_then(|text| serde_json::from_str(&text).ok());
    let request_text: String = row.get("request_json")?;
    let response_text: String = row.get("response_json")?;

    Ok(DecisionRecord {
        id: row.get("id")?,
        created_at_ms: row.get("created_at_ms")?,
        tenant_id: row.get("tenant_id")?,
        source: row.get("source")?,
        event_id: row.get("event_id")?,
        event_type: row.get("event_type")?,
        threat_level: row.get("threat_level")?,
        score: row.get("score")?,
        anomaly_score: row.get("anomaly_score")?,
        ai_adversarial_score: row.get("ai_adversarial_score")?,
        pq_fallback: row.get("pq_fallback")?,
        rules_triggered,
        decision_diff,
        request_json: serde_json::from_str(&request_text).unwrap_or(Value::Null),
        response_json: serde_json::from_str(&response_text).unwrap_or(Value::Null),
        prev_hash: row.get("prev_hash")?,
        chain_hash: row.get("chain_hash")?,
        latency_ms: row.get("latency_ms")?,
        explain_summary: row.get("explain_summary")?,
    })
}

fn row_to_api_key(row: &Row<'_>) -> rusqlite::Result<ApiKeyRecord> {
    let scopes_json: String = row.get(3)?;
    let scopes: Vec<String> = serde_json::from_str(&scopes_json).unwrap_or_default();
    Ok(ApiKeyRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        key_hash: row.get(2)?,
        scopes,
        tenant_id: row.get(4)?,
        created_at_ms: row.get(5)?,
        revoked_at_ms: row.get(6)?,
    })
}

fn row_to_tenant(row: &Row<'_>) -> rusqlite::Result<TenantRecord> {
    Ok(TenantRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        api_key: row.get(2)?,
        status: row.get(3)?,
        created_at_ms: row.get(4)?,
    })
}

fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_store() -> (tempfile::TempDir, DecisionStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = SqliteStoreConfig::new(dir.path().join("frostgate.db"));
        let store = DecisionStore::open(&config).expect("open store");
        (dir, store)
    }

    fn sample_input(failed_auths_label: &str) -> NewDecisionRecord {
        NewDecisionRecord {
            tenant_id: String::new(),
            source: "pytest".to_string(),
            event_id: format!("event-{failed_auths_label}"),
            event_type: "auth".to_string(),
            threat_level: "high".to_string(),
            score: 85,
            anomaly_score: 0.7,
            ai_adversarial_score: 0.0,
            pq_fallback: false,
            rules_triggered: vec!["rule:ssh_bruteforce".to_string()],
            request_json: json!({"failed_auths": failed_auths_label}),
            response_json: json!({"threat_level": "high"}),
            latency_ms: 3,
            explain_summary: "Suspicious behavior matched rule 'rule:ssh_bruteforce'.".to_string(),
        }
    }

    #[test]
    fn first_insert_has_empty_prev_hash() {
        let (_dir, store) = open_store();
        let record = store.insert_decision(sample_input("1")).expect("insert");
        assert_eq!(record.prev_hash, "");
        assert!(!record.chain_hash.is_empty());
        assert!(record.decision_diff.is_none());
    }

    #[test]
    fn second_insert_chains_and_diffs() {
        let (_dir, store) = open_store();
        let mut first = sample_input("1");
        first.event_id = "event-a".to_string();
        let first_record = store.insert_decision(first).expect("insert first");

        let mut second = sample_input("2");
        second.event_id = "event-b".to_string();
        let second_record = store.insert_decision(second).expect("insert second");

        assert_eq!(second_record.prev_hash, first_record.chain_hash);
        let diff = second_record.decision_diff.expect("diff present");
        assert_eq!(diff["no_change"], json!(true));
    }

    #[test]
    fn duplicate_event_id_returns_existing_row() {
        let (_dir, store) = open_store();
        let input = sample_input("dup");
        let first = store.insert_decision(input.clone()).expect("first insert");
        let second = store.insert_decision(input).expect("duplicate insert returns existing");
        assert_eq!(first.id, second.id);

        let filter = DecisionFilter { limit: 10, ..Default::default() };
        let rows = store.list_decisions(&filter).expect("list");
        assert_eq!(rows.len(), 1, "duplicate event_id must not create a second row");
    }

    #[test]
    fn after_id_returns_only_newer_rows_in_ascending_order() {
        let (_dir, store) = open_store();
        let mut first = sample_input("1");
        first.event_id = "event-a".to_string();
        let first_record = store.insert_decision(first).expect("insert first");

        let mut second = sample_input("2");
        second.event_id = "event-b".to_string();
        let second_record = store.insert_decision(second).expect("insert second");

        let filter =
            DecisionFilter { limit: 10, after_id: Some(first_record.id), ..Default::default() };
        let rows = store.list_decisions(&filter).expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, second_record.id);
    }

    #[test]
    fn tenants_and_api_keys_round_trip() {
        let (_dir, store) = open_store();
        store
            .upsert_tenant(&TenantRecord {
                id: "acme".to_string(),
                name: "Acme".to_string(),
                api_key: "tenant-secret".to_string(),
                status: "active".to_string(),
                created_at_ms: 0,
            })
            .expect("upsert tenant");
        let tenant = store.find_tenant("acme").expect("find").expect("present");
        assert!(tenant.is_active());

        let key = store
            .insert_api_key("ci", "hash123", &["defend:write".to_string()], None)
            .expect("insert api key");
        assert!(key.is_active());
        let found = store.find_api_key_by_hash("hash123").expect("find").expect("present");
        assert!(found.has_scope("defend:write"));
    }
}
