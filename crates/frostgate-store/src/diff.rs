// frostgate-store/src/diff.rs
// ============================================================================
// Module: Decision Diff
// Description: Structured delta between two DecisionRecords sharing a key.
// Purpose: Power the "diff appears on second call" invariant and the
//          `only_changed` feed filter.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`compute`] never fails the caller: any internal inconsistency is
//! swallowed and surfaces as `None`, matching the persistence layer's
//! "diff failure is logged, request is never failed" contract.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

use crate::types::DecisionRecord;

// ============================================================================
// SECTION: Diff Computation
// ============================================================================

/// Computes the structured delta between `prev` and the current record's
/// score/threat_level/rules_triggered, keyed on `(tenant_id, source,
/// event_type)`. Returns `None` when there is no predecessor.
#[must_use]
pub fn compute(
    prev: Option<&DecisionRecord>,
    score: u32,
    threat_level: &str,
    rules_triggered: &[String],
) -> Option<Value> {
    let prev = prev?;
    let rules_added: Vec<&str> = rules_triggered
        .iter()
        .filter(|rule| !prev.rules_triggered.iter().any(|prior| prior == *rule))
        .map(String::as_str)
        .collect();
    let rules_removed: Vec<&str> = prev
        .rules_triggered
        .iter()
        .filter(|prior| !rules_triggered.iter().any(|rule| rule == *prior))
        .map(String::as_str)
        .collect();
    let no_change = prev.threat_level == threat_level
        && rules_added.is_empty()
        && rules_removed.is_empty()
        && prev.score == score;

    Some(json!({
        "score": {
            "from": prev.score,
            "to": score,
            "delta": i64::from(score) - i64::from(prev.score),
        },
        "threat_level": {
            "from": prev.threat_level,
            "to": threat_level,
        },
        "rules_added": rules_added,
        "rules_removed": rules_removed,
        "no_change": no_change,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(score: u32, threat_level: &str, rules: &[&str]) -> DecisionRecord {
        DecisionRecord {
            id: 1,
            created_at_ms: 0,
            tenant_id: String::new(),
            source: "test".to_string(),
            event_id: "abc".to_string(),
            event_type: "auth".to_string(),
            threat_level: threat_level.to_string(),
            score,
            anomaly_score: 0.1,
            ai_adversarial_score: 0.0,
            pq_fallback: false,
            rules_triggered: rules.iter().map(|rule| (*rule).to_string()).collect(),
            decision_diff: None,
            request_json: serde_json::json!({}),
            response_json: serde_json::json!({}),
            prev_hash: String::new(),
            chain_hash: "chain0".to_string(),
            latency_ms: 1,
            explain_summary: "n/a".to_string(),
        }
    }

    #[test]
    fn no_predecessor_yields_none() {
        assert!(compute(None, 85, "high", &["rule:ssh_bruteforce".to_string()]).is_none());
    }

    #[test]
    fn identical_snapshot_marks_no_change() {
        let prev = record_with(0, "none", &["rule:default_allow"]);
        let diff =
            compute(Some(&prev), 0, "none", &["rule:default_allow".to_string()]).expect("diff");
        assert_eq!(diff["no_change"], serde_json::json!(true));
    }

    #[test]
    fn escalation_reports_rules_added_and_positive_delta() {
        let prev = record_with(0, "none", &["rule:default_allow"]);
        let diff = compute(Some(&prev), 85, "high", &["rule:ssh_bruteforce".to_string()])
            .expect("diff");
        assert_eq!(diff["rules_added"], serde_json::json!(["rule:ssh_bruteforce"]));
        assert_eq!(diff["rules_removed"], serde_json::json!(["rule:default_allow"]));
        assert_eq!(diff["score"]["delta"], serde_json::json!(85));
        assert_eq!(diff["no_change"], serde_json::json!(false));
    }
}
