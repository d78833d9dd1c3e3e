// frostgate-core/src/event.rs
// ============================================================================
// Module: Telemetry Normalizer
// Description: Converts heterogeneous request shapes into a canonical event.
// Purpose: Keep the tolerant legacy input shape strictly at the edge so the
//          rule engine and doctrine gate operate on one stable type.
// Dependencies: serde_json, time
// ============================================================================

//! ## Overview
//! Clients post telemetry in several legacy shapes: some place fields at the
//! request root, some nest everything under `payload`, some nest it under
//! `event`. [`normalize`] absorbs that variance once, at the edge, and
//! returns a [`CanonicalEvent`] that every downstream component can treat as
//! a single stable type. The normalizer never fails: malformed input (an
//! unparseable timestamp, a non-numeric `failed_auths`) degrades to a
//! documented default rather than raising an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

const SRC_IP_KEYS: &[&str] = &["src_ip", "source_ip", "source_ip_addr", "ip", "remote_ip"];
const FAILED_AUTHS_KEYS: &[&str] =
    &["failed_auths", "fail_count", "failures", "attempts", "failed_attempts"];

// ============================================================================
// SECTION: Canonical Event
// ============================================================================

/// Normalized telemetry event consumed by the rule engine and doctrine gate.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEvent {
    /// Reporting source, e.g. a test harness or agent name.
    pub source: String,
    /// Tenant identifier, when the caller asserted one.
    pub tenant_id: Option<String>,
    /// Event instant; defaults to the normalization instant when absent or
    /// unparseable.
    pub timestamp: OffsetDateTime,
    /// Raw classification string (compared case-insensitively downstream).
    pub classification: Option<String>,
    /// Raw persona string (compared case-insensitively downstream).
    pub persona: Option<String>,
    /// Resolved event type, defaulting to `"unknown"`.
    pub event_type: String,
    /// Resolved source IP address, when present under any recognized alias.
    pub src_ip: Option<String>,
    /// Resolved failed-authentication count, defaulting to zero.
    pub failed_auths: i64,
    /// Mirrored `payload`/`event` mapping (both views share this map).
    pub payload: Map<String, Value>,
}

impl CanonicalEvent {
    /// Returns true when `src_ip` is present and non-empty.
    #[must_use]
    pub fn has_src_ip(&self) -> bool {
        self.src_ip.as_deref().is_some_and(|ip| !ip.is_empty())
    }

    /// Returns the classification compared case-insensitively.
    #[must_use]
    pub fn classification_eq(&self, expected: &str) -> bool {
        self.classification.as_deref().is_some_and(|value| value.eq_ignore_ascii_case(expected))
    }

    /// Returns the persona compared case-insensitively.
    #[must_use]
    pub fn persona_eq(&self, expected: &str) -> bool {
        self.persona.as_deref().is_some_and(|value| value.eq_ignore_ascii_case(expected))
    }
}

/// Soft warnings emitted by the normalizer. Never fails the request; the
/// caller logs these as a counter so malformed clients remain visible (see
/// Design Notes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizationWarnings {
    /// Set when the request timestamp was absent or failed to parse and was
    /// defaulted to "now".
    pub timestamp_defaulted: bool,
}

// ============================================================================
// SECTION: Normalizer
// ============================================================================

/// Normalizes a raw JSON request body into a [`CanonicalEvent`].
///
/// `now` is supplied by the caller rather than read internally, keeping this
/// function a pure, deterministic transform of its inputs.
#[must_use]
pub fn normalize(now: OffsetDateTime, raw: &Value) -> (CanonicalEvent, NormalizationWarnings) {
    let root = raw.as_object().cloned().unwrap_or_default();

    let raw_payload = object_field(&root, "payload");
    let raw_event = object_field(&root, "event");
    let merged = mirror(raw_payload, raw_event);

    let source = string_field(&root, "source").unwrap_or_default();
    let tenant_id = string_field(&root, "tenant_id");
    let classification = string_field(&root, "classification");
    let persona = string_field(&root, "persona");

    let event_type = string_field(&root, "event_type")
        .or_else(|| string_field(&merged, "event_type"))
        .unwrap_or_else(|| "unknown".to_string());

    let src_ip = resolve_aliased_string(&root, &merged, SRC_IP_KEYS);
    let failed_auths = resolve_aliased_int(&root, &merged, FAILED_AUTHS_KEYS).unwrap_or(0);

    let (timestamp, warnings) = match string_field(&root, "timestamp") {
        Some(raw_ts) => match OffsetDateTime::parse(&raw_ts, &Rfc3339) {
            Ok(parsed) => (parsed, NormalizationWarnings::default()),
            Err(_) => (now, NormalizationWarnings { timestamp_defaulted: true }),
        },
        None => (now, NormalizationWarnings { timestamp_defaulted: true }),
    };

    let event = CanonicalEvent {
        source,
        tenant_id,
        timestamp,
        classification,
        persona,
        event_type,
        src_ip,
        failed_auths,
        payload: merged,
    };
    (event, warnings)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Mirrors `payload`/`event` per §4.3: if one is dict-empty and the other is
/// non-empty, the non-empty one wins; otherwise both default to `{}`.
fn mirror(payload: Map<String, Value>, event: Map<String, Value>) -> Map<String, Value> {
    if !payload.is_empty() {
        payload
    } else if !event.is_empty() {
        event
    } else {
        Map::new()
    }
}

fn object_field(root: &Map<String, Value>, key: &str) -> Map<String, Value> {
    root.get(key).and_then(Value::as_object).cloned().unwrap_or_default()
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Checks root-level aliases first (legacy flat shapes), then the mirrored
/// payload/event dict, returning the first alias that resolves.
fn resolve_aliased_string(
    root: &Map<String, Value>,
    merged: &Map<String, Value>,
    keys: &[&str],
) -> Option<String> {
    keys.iter()
        .find_map(|key| string_field(root, key))
        .or_else(|| keys.iter().find_map(|key| string_field(merged, key)))
}

fn resolve_aliased_int(
    root: &Map<String, Value>,
    merged: &Map<String, Value>,
    keys: &[&str],
) -> Option<i64> {
    keys.iter()
        .find_map(|key| root.get(key).and_then(coerce_int))
        .or_else(|| keys.iter().find_map(|key| merged.get(key).and_then(coerce_int)))
}

/// Coerces a JSON value to an integer, tolerating numeric strings and
/// truncating floats. Never panics; unrecognized shapes yield `None`.
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => {
            number.as_i64().or_else(|| number.as_f64().map(|float| float as i64))
        }
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}
