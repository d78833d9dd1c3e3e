// frostgate-core/src/assembler.rs
// ============================================================================
// Module: Decision Assembler
// Description: Builds the final response envelope from rule engine and
//              doctrine gate output.
// Purpose: Compute event_id, clock_drift_ms, and explanation_brief, and
//          stitch every prior stage's output into one Decision.
// Dependencies: frostgate-core::decision, frostgate-core::doctrine,
//               frostgate-core::event, frostgate-core::hashing,
//               frostgate-core::rules, serde_json
// ============================================================================

//! ## Overview
//! The assembler is the last pure step before persistence: it never
//! re-derives rule or doctrine outcomes, only packages them together with
//! the two fields that depend on wall-clock time and on the raw request
//! body (`clock_drift_ms`, `event_id`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use time::OffsetDateTime;

use crate::decision::Decision;
use crate::decision::Explain;
use crate::doctrine::DoctrineOutcome;
use crate::event::CanonicalEvent;
use crate::hashing;
use crate::rules::RuleOutcome;

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Assembles a [`Decision`] from the normalized event and the rule
/// engine/doctrine gate outputs.
///
/// `raw_request` is the original (pre-normalization) JSON body; its
/// canonical serialization is what `event_id` hashes, so identical request
/// bodies always yield identical event ids regardless of normalization.
///
/// # Errors
///
/// Returns [`hashing::HashError`] only if `raw_request` cannot be
/// canonicalized (not expected for any `serde_json::Value` produced by a
/// JSON parser).
pub fn assemble(
    now: OffsetDateTime,
    raw_request: &Value,
    event: &CanonicalEvent,
    rule_outcome: &RuleOutcome,
    doctrine: &DoctrineOutcome,
    clock_stale_ms: i64,
) -> Result<Decision, hashing::HashError> {
    let event_id = hashing::hash_canonical_json(hashing::HashAlgorithm::Sha256, raw_request)?.value;
    let clock_drift_ms = compute_clock_drift_ms(now, event.timestamp, clock_stale_ms);
    let explanation_brief = explanation_brief_for(&rule_outcome.rules_triggered);

    let explain = Explain {
        summary: explanation_brief.clone(),
        rules_triggered: rule_outcome.rules_triggered.clone(),
        anomaly_score: rule_outcome.anomaly_score,
        score: rule_outcome.score,
        tie_d: doctrine.tie_d,
    };

    Ok(Decision {
        event_id,
        threat_level: rule_outcome.threat_level,
        score: rule_outcome.score,
        anomaly_score: rule_outcome.anomaly_score,
        rules_triggered: rule_outcome.rules_triggered.clone(),
        mitigations: doctrine.mitigations.clone(),
        explain,
        tie_d: doctrine.tie_d,
        roe_applied: doctrine.roe_applied,
        ao_required: doctrine.ao_required,
        disruption_limited: doctrine.disruption_limited,
        gating_decision: doctrine.gating_decision,
        clock_drift_ms,
        explanation_brief,
    })
}

/// Computes clock drift; zero when the event is older than the stale
/// threshold (so stale replays do not masquerade as fresh events).
fn compute_clock_drift_ms(
    server_now: OffsetDateTime,
    event_timestamp: OffsetDateTime,
    clock_stale_ms: i64,
) -> i64 {
    let age_ms = (server_now - event_timestamp).whole_milliseconds().unsigned_abs();
    let stale_ms = u128::try_from(clock_stale_ms.max(0)).unwrap_or(0);
    if age_ms > stale_ms { 0 } else { i64::try_from(age_ms).unwrap_or(i64::MAX) }
}

/// Builds the deterministic one-line explanation from the triggered rule
/// list; never null or empty.
fn explanation_brief_for(rules_triggered: &[String]) -> String {
    let Some(primary) = rules_triggered.first() else {
        return "No threat rules triggered for this event.".to_string();
    };
    match primary.as_str() {
        "rule:default_allow" => "No threat rules triggered for this event.".to_string(),
        "rule:ssh_bruteforce" => {
            "Repeated authentication failures matched rule 'rule:ssh_bruteforce'.".to_string()
        }
        other => format!("Suspicious behavior matched rule '{other}'."),
    }
}
