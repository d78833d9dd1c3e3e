// frostgate-core/src/decision.rs
// ============================================================================
// Module: Decision Types
// Description: Output types produced by the rule engine, doctrine gate, and
//              decision assembler.
// Purpose: Give every downstream consumer (persistence, feed, HTTP response)
//          one stable, serializable shape for a per-event decision.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Decision`] is the fully assembled per-event assessment returned by
//! `/defend` and persisted (as part of a `DecisionRecord`) by the store.
//! `ThreatLevel` and `GatingDecision` are closed enumerations; `critical` is
//! part of the contract but unreachable from the MVP rule set (see
//! `rules::score_to_threat_level`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Threat Level
// ============================================================================

/// Threat severity tier assigned by the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    /// No meaningful threat signal.
    None,
    /// Low-severity signal.
    Low,
    /// Medium-severity signal.
    Medium,
    /// High-severity signal.
    High,
    /// Reserved tier: part of the contract, unreachable from the MVP rule
    /// set (no rule scores high enough to reach it).
    Critical,
}

impl ThreatLevel {
    /// Returns the wire label used in JSON and stored rows.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parses a stored/wire label, defaulting to [`ThreatLevel::None`] for
    /// legacy or unrecognized values (read-path tolerance; see store).
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::None,
        }
    }
}

// ============================================================================
// SECTION: Gating Decision
// ============================================================================

/// Outcome of the doctrine/ROE gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatingDecision {
    /// Mitigations may proceed without further approval.
    Allow,
    /// Mitigations require out-of-band approval before acting.
    RequireApproval,
    /// Mitigations are rejected outright.
    Reject,
}

impl GatingDecision {
    /// Returns the wire label used in JSON and stored rows.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::RequireApproval => "require_approval",
            Self::Reject => "reject",
        }
    }
}

// ============================================================================
// SECTION: Mitigation
// ============================================================================

/// A structured mitigation action attached to a [`Decision`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationAction {
    /// Action identifier, e.g. `"block_ip"`.
    pub action: String,
    /// Target of the action, when applicable (e.g. an IP address).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Human-readable reason for the mitigation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Confidence in this mitigation, defaulting to 0.5.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

const fn default_confidence() -> f64 {
    0.5
}

impl MitigationAction {
    /// Builds a `block_ip` mitigation targeting the given address.
    #[must_use]
    pub fn block_ip(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: "block_ip".to_string(),
            target: Some(target.into()),
            reason: Some(reason.into()),
            confidence: default_confidence(),
        }
    }

    /// Returns true for the one disruptive mitigation kind recognized in
    /// MVP: `block_ip`.
    #[must_use]
    pub fn is_disruptive(&self) -> bool {
        self.action == "block_ip"
    }
}

// ============================================================================
// SECTION: TieD Impact
// ============================================================================

/// Threat-impact-estimate-on-doctrine tuple: always present, both floats
/// clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TieD {
    /// Estimated impact on service availability.
    pub service_impact: f64,
    /// Estimated impact on legitimate users.
    pub user_impact: f64,
}

impl TieD {
    /// Builds a clamped impact tuple.
    #[must_use]
    pub fn new(service_impact: f64, user_impact: f64) -> Self {
        Self {
            service_impact: service_impact.clamp(0.0, 1.0),
            user_impact: user_impact.clamp(0.0, 1.0),
        }
    }

    /// Zero-impact baseline.
    #[must_use]
    pub const fn zero() -> Self {
        Self { service_impact: 0.0, user_impact: 0.0 }
    }
}

// ============================================================================
// SECTION: Explain
// ============================================================================

/// Explanatory payload nested in a [`Decision`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explain {
    /// One-line human-readable summary, equal to `explanation_brief`.
    pub summary: String,
    /// Rule identifiers triggered, in stable order, deduplicated.
    pub rules_triggered: Vec<String>,
    /// Anomaly score in `[0, 1]`.
    pub anomaly_score: f64,
    /// Total rule score.
    pub score: u32,
    /// Impact tuple, always present.
    pub tie_d: TieD,
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Fully assembled per-event decision returned by `/defend` and persisted by
/// the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// sha256 hex digest of the canonical request JSON.
    pub event_id: String,
    /// Threat severity tier.
    pub threat_level: ThreatLevel,
    /// Total rule score (non-negative).
    pub score: u32,
    /// Anomaly score in `[0, 1]`.
    pub anomaly_score: f64,
    /// Rule identifiers triggered, in stable order, deduplicated.
    pub rules_triggered: Vec<String>,
    /// Structured mitigation actions.
    pub mitigations: Vec<MitigationAction>,
    /// Explanatory payload.
    pub explain: Explain,
    /// Impact tuple (duplicated at top level for convenient access).
    pub tie_d: TieD,
    /// Whether the Guardian+SECRET ROE policy applied.
    pub roe_applied: bool,
    /// Whether out-of-band approval is required before acting.
    pub ao_required: bool,
    /// Whether the doctrine gate filtered or reduced mitigations.
    pub disruption_limited: bool,
    /// Gating outcome.
    pub gating_decision: GatingDecision,
    /// Clock drift in milliseconds; zero when age exceeds the stale
    /// threshold.
    pub clock_drift_ms: i64,
    /// Deterministic one-line explanation; never empty.
    pub explanation_brief: String,
}
