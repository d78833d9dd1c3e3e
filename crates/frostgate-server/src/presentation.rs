// frostgate-server/src/presentation.rs
// ============================================================================
// Module: Presentation Engine
// Description: Deterministic projection of a DecisionRecord into feed item
//              fields (C8).
// Purpose: Compute `score_display`, `confidence`, `action_taken`, `severity`,
//          and templated title/summary the same way for every feed caller.
// Dependencies: frostgate-store, time
// ============================================================================

//! ## Overview
//! [`present`] is a pure function of a single [`DecisionRecord`]: same row
//! in, same [`FeedItem`] out. `/decisions`, `/feed/live`, and `/feed/stream`
//! all route through this one projection so the three surfaces never
//! disagree about severity or action taken for the same row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use frostgate_store::DecisionRecord;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Action / Severity
// ============================================================================

/// Action the presentation engine assigns to a decision row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTaken {
    /// Logged only; no response action implied.
    LogOnly,
    /// Caller should be challenged (step-up auth, CAPTCHA, etc.).
    Challenge,
    /// The source should be quarantined/blocked.
    Quarantine,
}

impl ActionTaken {
    /// Returns the wire label used in feed JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LogOnly => "log_only",
            Self::Challenge => "challenge",
            Self::Quarantine => "quarantine",
        }
    }
}

/// Human severity tier derived from `threat_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// No signal, or an unrecognized threat level.
    Info,
    /// Low concern.
    Low,
    /// Medium concern.
    Medium,
    /// High concern.
    High,
    /// Critical concern.
    Critical,
}

impl Severity {
    /// Returns the wire label used in feed JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    fn from_threat_level(threat_level: &str) -> Self {
        match threat_level {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Info,
        }
    }

    fn threat_weight(self) -> f64 {
        match self {
            Self::Info => 5.0,
            Self::Low => 25.0,
            Self::Medium => 55.0,
            Self::High => 85.0,
            Self::Critical => 95.0,
        }
    }
}

// ============================================================================
// SECTION: Feed Item
// ============================================================================

/// A presented feed item: everything `/decisions`, `/feed/live`, and
/// `/feed/stream` return, derived from one [`DecisionRecord`].
#[derive(Debug, Clone)]
pub struct FeedItem {
    /// Source row id.
    pub id: i64,
    /// ISO-8601 timestamp of `created_at_ms`.
    pub timestamp: String,
    /// Tenant identifier, empty string when none.
    pub tenant_id: String,
    /// Reporting source.
    pub source: String,
    /// Resolved event type.
    pub event_type: String,
    /// Raw threat level string.
    pub threat_level: String,
    /// Derived severity tier.
    pub severity: Severity,
    /// Clamped 0-100 display score.
    pub score_display: f64,
    /// Clamped 0-1 confidence.
    pub confidence: f64,
    /// Derived action.
    pub action_taken: ActionTaken,
    /// Templated one-line title.
    pub title: String,
    /// Templated one-line summary.
    pub summary: String,
    /// Whether the underlying decision_diff shows any changed field.
    pub has_changes: bool,
}

impl FeedItem {
    /// Returns true when the item should be suppressed by `only_actionable`:
    /// `action_taken == log_only` and severity is info/low.
    #[must_use]
    pub fn is_noise(&self) -> bool {
        self.action_taken == ActionTaken::LogOnly
            && matches!(self.severity, Severity::Info | Severity::Low)
    }

    /// Returns true when `q` occurs (case-insensitively) in any indexed
    /// text field this item exposes.
    #[must_use]
    pub fn matches_query(&self, q: &str) -> bool {
        let needle = q.to_ascii_lowercase();
        [&self.source, &self.event_type, &self.threat_level, &self.title, &self.summary]
            .into_iter()
            .any(|field| field.to_ascii_lowercase().contains(&needle))
    }

    /// Renders this item as the JSON shape `/decisions`, `/feed/live`, and
    /// `/feed/stream` all return.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "timestamp": self.timestamp,
            "tenant_id": self.tenant_id,
            "source": self.source,
            "event_type": self.event_type,
            "threat_level": self.threat_level,
            "severity": self.severity.as_str(),
            "score_display": self.score_display,
            "confidence": self.confidence,
            "action_taken": self.action_taken.as_str(),
            "title": self.title,
            "summary": self.summary,
            "has_changes": self.has_changes,
        })
    }
}

// ============================================================================
// SECTION: Presentation
// ============================================================================

/// Projects a stored decision row into a [`FeedItem`].
#[must_use]
pub fn present(record: &DecisionRecord) -> FeedItem {
    let severity = Severity::from_threat_level(&record.threat_level);
    let score_display = clamp(
        max3(
            severity.threat_weight(),
            record.anomaly_score * 100.0,
            record.ai_adversarial_score * 100.0,
        ),
        0.0,
        100.0,
    );
    let confidence = clamp(0.5 + score_display / 200.0, 0.0, 1.0);
    let action_taken = action_for(
        f64::from(record.score),
        severity,
        record.ai_adversarial_score,
    );
    let timestamp = format_timestamp(record.created_at_ms);
    let title = template_title(&record.event_type, action_taken);
    let summary = template_summary(record, severity, score_display);
    let has_changes = record
        .decision_diff
        .as_ref()
        .is_some_and(|diff| diff.get("no_change") != Some(&serde_json::Value::Bool(true)));

    FeedItem {
        id: record.id,
        timestamp,
        tenant_id: record.tenant_id.clone(),
        source: record.source.clone(),
        event_type: record.event_type.clone(),
        threat_level: record.threat_level.clone(),
        severity,
        score_display,
        confidence,
        action_taken,
        title,
        summary,
        has_changes,
    }
}

fn action_for(score: f64, severity: Severity, ai_adversarial_score: f64) -> ActionTaken {
    let high_confidence_adversarial =
        matches!(severity, Severity::High | Severity::Critical) && ai_adversarial_score >= 0.6;
    if score >= 85.0 || high_confidence_adversarial {
        ActionTaken::Quarantine
    } else if score >= 65.0 {
        ActionTaken::Challenge
    } else {
        ActionTaken::LogOnly
    }
}

fn template_title(event_type: &str, action_taken: ActionTaken) -> String {
    match action_taken {
        ActionTaken::Quarantine => format!("Quarantined: {event_type}"),
        ActionTaken::Challenge => format!("Challenge issued: {event_type}"),
        ActionTaken::LogOnly => format!("Observed: {event_type}"),
    }
}

fn template_summary(record: &DecisionRecord, severity: Severity, score_display: f64) -> String {
    format!(
        "{source} reported {event_type} ({severity}, score {score_display:.0}) — threat level {threat_level}",
        source = record.source,
        event_type = record.event_type,
        severity = severity.as_str(),
        threat_level = record.threat_level,
    )
}

fn format_timestamp(created_at_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp(created_at_ms / 1000)
        .ok()
        .and_then(|instant| instant.format(&Rfc3339).ok())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

fn clamp(value: f64, low: f64, high: f64) -> f64 {
    value.max(low).min(high)
}

fn max3(a: f64, b: f64, c: f64) -> f64 {
    a.max(b).max(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(threat_level: &str, score: u32, anomaly: f64, ai_adv: f64) -> DecisionRecord {
        DecisionRecord {
            id: 1,
            created_at_ms: 1_700_000_000_000,
            tenant_id: String::new(),
            source: "pytest".to_string(),
            event_id: "e1".to_string(),
            event_type: "auth.bruteforce".to_string(),
            threat_level: threat_level.to_string(),
            score,
            anomaly_score: anomaly,
            ai_adversarial_score: ai_adv,
            pq_fallback: false,
            rules_triggered: vec!["rule:ssh_bruteforce".to_string()],
            decision_diff: None,
            request_json: json!({}),
            response_json: json!({}),
            prev_hash: String::new(),
            chain_hash: "c".to_string(),
            latency_ms: 1,
            explain_summary: "n/a".to_string(),
        }
    }

    #[test]
    fn high_score_is_quarantined() {
        let item = present(&record("high", 85, 0.7, 0.0));
        assert_eq!(item.action_taken, ActionTaken::Quarantine);
        assert_eq!(item.severity.as_str(), "high");
    }

    #[test]
    fn high_confidence_adversarial_forces_quarantine_even_at_mid_score() {
        let item = present(&record("high", 60, 0.4, 0.9));
        assert_eq!(item.action_taken, ActionTaken::Quarantine);
    }

    #[test]
    fn low_score_is_log_only_and_counts_as_noise() {
        let item = present(&record("none", 0, 0.1, 0.0));
        assert_eq!(item.action_taken, ActionTaken::LogOnly);
        assert!(item.is_noise());
    }

    #[test]
    fn score_display_and_confidence_stay_in_bounds() {
        let item = present(&record("critical", 95, 1.0, 1.0));
        assert!((0.0..=100.0).contains(&item.score_display));
        assert!((0.0..=1.0).contains(&item.confidence));
    }

    #[test]
    fn query_matches_are_case_insensitive_over_indexed_fields() {
        let item = present(&record("high", 85, 0.7, 0.0));
        assert!(item.matches_query("PYTEST"));
        assert!(item.matches_query("bruteforce"));
        assert!(!item.matches_query("nonexistent"));
    }
}
