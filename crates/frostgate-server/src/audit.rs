// frostgate-server/src/audit.rs
// ============================================================================
// Module: Audit Logging
// Description: Structured audit events for auth decisions and defend calls.
// Purpose: Emit redacted, structured JSON audit lines without a hard
//          dependency on a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! FrostGate logs structured JSON lines rather than depending on a logging
//! framework: every auth decision and every `/defend` call emits one
//! [`AuditEvent`] through an [`AuditSink`]. Deployments that want a richer
//! pipeline implement their own sink; the default sinks here cover local
//! development and tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Event
// ============================================================================

/// A single structured audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event identifier, e.g. `"auth"` or `"defend"`.
    pub event: &'static str,
    /// Event timestamp, milliseconds since epoch.
    pub timestamp_ms: u128,
    /// HTTP route the event pertains to.
    pub route: &'static str,
    /// Decision outcome: `"allow"`, `"deny"`, or a gating decision label.
    pub decision: &'static str,
    /// Human-readable reason, present on deny/reject outcomes.
    pub reason: Option<String>,
    /// Tenant identifier, when known.
    pub tenant_id: Option<String>,
    /// sha256 fingerprint of the presented credential; never the raw secret.
    pub credential_fingerprint: Option<String>,
    /// Request identifier, when available.
    pub request_id: Option<String>,
}

impl AuditEvent {
    /// Builds an auth-boundary audit event.
    #[must_use]
    pub fn auth(
        route: &'static str,
        decision: &'static str,
        reason: Option<String>,
        tenant_id: Option<String>,
        credential_fingerprint: Option<String>,
    ) -> Self {
        Self {
            event: "auth",
            timestamp_ms: unix_millis(),
            route,
            decision,
            reason,
            tenant_id,
            credential_fingerprint,
            request_id: None,
        }
    }

    /// Builds a `/defend` decision audit event.
    #[must_use]
    pub fn defend(decision: &'static str, tenant_id: Option<String>) -> Self {
        Self {
            event: "defend",
            timestamp_ms: unix_millis(),
            route: "/defend",
            decision,
            reason: None,
            tenant_id,
            credential_fingerprint: None,
            request_id: None,
        }
    }
}

fn unix_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|duration| duration.as_millis()).unwrap_or(0)
}

// ============================================================================
// SECTION: Sink Trait
// ============================================================================

/// Audit sink for FrostGate request events.
pub trait AuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &AuditEvent);
}

// ============================================================================
// SECTION: Default Sinks
// ============================================================================

/// Audit sink that writes JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) {
        let Ok(payload) = serde_json::to_string(event) else {
            return;
        };
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Audit sink that discards every event; used in tests.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_event_carries_no_raw_secret_field() {
        let event = AuditEvent::auth("/v1/defend", "deny", Some("bad key".to_string()), None, Some("fingerprint".to_string()));
        let payload = serde_json::to_string(&event).expect("serializes");
        assert!(!payload.contains("supersecret"));
        assert!(payload.contains("\"credential_fingerprint\":\"fingerprint\""));
    }

    #[test]
    fn noop_sink_does_not_panic() {
        NoopAuditSink.record(&AuditEvent::defend("allow", None));
    }
}
