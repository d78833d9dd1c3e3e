// frostgate-core/src/lib.rs
// ============================================================================
// Module: FrostGate Core
// Description: Normalization, rule engine, doctrine gate, and decision
//              assembly for FrostGate's per-event security decision pipeline.
// Purpose: Provide the pure, deterministic domain logic shared by the HTTP
//          server and the persistence layer.
// Dependencies: serde, serde_jcs, serde_json, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! `frostgate-core` holds every component of the decision pipeline that does
//! not touch I/O: the telemetry normalizer (C3), the rule engine (C4), the
//! doctrine/ROE gate (C5), and the decision assembler (C6), plus the
//! canonical-hashing utilities shared with the persistence layer's audit
//! chain.
//!
//! Everything here is pure and `Send + Sync`; the HTTP server
//! (`frostgate-server`) and the store (`frostgate-store`) wrap these
//! functions with the I/O, auth, and persistence concerns that surround them.

#![allow(clippy::missing_errors_doc, reason = "error docs are carried on the error enums themselves")]

pub mod assembler;
pub mod decision;
pub mod doctrine;
pub mod event;
pub mod hashing;
pub mod rules;

pub use assembler::assemble;
pub use decision::Decision;
pub use decision::Explain;
pub use decision::GatingDecision;
pub use decision::MitigationAction;
pub use decision::ThreatLevel;
pub use decision::TieD;
pub use doctrine::DoctrineOutcome;
pub use event::CanonicalEvent;
pub use event::NormalizationWarnings;
pub use event::normalize;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use rules::RuleOutcome;

use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

/// Errors surfaced by the end-to-end decision pipeline
/// (normalize → evaluate → apply → assemble).
///
/// Per the error taxonomy, [`DecisionError`] should not occur in practice:
/// every stage except hashing is total. Callers that receive one should log
/// it and fall back to a minimal `rule:default_allow` decision rather than
/// failing the request (see `RuleEngineError` in the specification).
#[derive(Debug, Error)]
pub enum DecisionError {
    /// The raw request body could not be canonicalized for hashing.
    #[error("failed to compute event id: {0}")]
    Hashing(#[from] HashError),
}

/// Runs the full pure decision pipeline: normalize, evaluate, gate, and
/// assemble, in one call.
///
/// # Errors
///
/// Returns [`DecisionError`] if `raw_request`'s canonical JSON cannot be
/// computed.
pub fn decide(
    now: OffsetDateTime,
    raw_request: &Value,
    clock_stale_ms: i64,
) -> Result<Decision, DecisionError> {
    let (_event, decision) = decide_with_event(now, raw_request, clock_stale_ms)?;
    Ok(decision)
}

/// Runs the same pipeline as [`decide`] but also returns the normalized
/// [`CanonicalEvent`], which callers that persist the decision need for its
/// `source`/`event_type`/`tenant_id` (the persistence key per §4.7).
///
/// # Errors
///
/// Returns [`DecisionError`] if `raw_request`'s canonical JSON cannot be
/// computed.
pub fn decide_with_event(
    now: OffsetDateTime,
    raw_request: &Value,
    clock_stale_ms: i64,
) -> Result<(CanonicalEvent, Decision), DecisionError> {
    let (event, _warnings) = normalize(now, raw_request);
    let rule_outcome = rules::evaluate(&event);
    let doctrine_outcome = doctrine::apply(&event, &rule_outcome);
    let decision = assembler::assemble(
        now,
        raw_request,
        &event,
        &rule_outcome,
        &doctrine_outcome,
        clock_stale_ms,
    )?;
    Ok((event, decision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid unix timestamp")
    }

    #[test]
    fn end_to_end_bruteforce_scenario_reaches_high_threat() {
        let raw = json!({
            "source": "pytest",
            "event_type": "auth.bruteforce",
            "payload": {"src_ip": "1.2.3.4", "failed_auths": 7},
        });
        let decision = decide(now(), &raw, 300_000).expect("decide succeeds");
        assert_eq!(decision.threat_level, ThreatLevel::High);
        assert!(decision.mitigations.iter().any(|m| m.action == "block_ip"
            && m.target.as_deref() == Some("1.2.3.4")));
        assert!(decision.rules_triggered.iter().any(|r| r == "rule:ssh_bruteforce"));
    }

    #[test]
    fn universal_invariant_explain_and_tie_d_always_present() {
        let raw = json!({"source": "pytest", "event_type": "heartbeat", "payload": {}});
        let decision = decide(now(), &raw, 300_000).expect("decide succeeds");
        assert!(!decision.explanation_brief.is_empty());
        assert!((0.0..=1.0).contains(&decision.explain.tie_d.service_impact));
        assert!((0.0..=1.0).contains(&decision.explain.tie_d.user_impact));
    }
}
