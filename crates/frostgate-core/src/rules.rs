// frostgate-core/src/rules.rs
// ============================================================================
// Module: Rule Engine
// Description: Stateless, deterministic evaluation of the MVP rule set.
// Purpose: Turn a CanonicalEvent into a rules-triggered list, score, threat
//          level, mitigations, and anomaly score.
// Dependencies: frostgate-core::event
// ============================================================================

//! ## Overview
//! The rule engine is a pure function of a [`CanonicalEvent`]: same event in,
//! same [`RuleOutcome`] out. The MVP rule set has exactly two rules,
//! evaluated in a fixed order inside [`evaluate`]; rule identifiers in the
//! output preserve that evaluation order with duplicates removed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::decision::MitigationAction;
use crate::event::CanonicalEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Event type aliases recognized by `rule:ssh_bruteforce`.
const BRUTEFORCE_EVENT_TYPES: &[&str] = &["auth", "auth.bruteforce", "auth_attempt"];
/// Minimum failed-auth count required to trigger `rule:ssh_bruteforce`.
const BRUTEFORCE_MIN_FAILED_AUTHS: i64 = 5;

/// Fixed score contribution for `rule:ssh_bruteforce`.
const SCORE_SSH_BRUTEFORCE: u32 = 85;
/// Fixed score contribution for `rule:default_allow`.
const SCORE_DEFAULT_ALLOW: u32 = 0;

/// Score threshold at and above which the threat level is `high`.
const THRESHOLD_HIGH: u32 = 80;
/// Score threshold at and above which the threat level is `medium`.
const THRESHOLD_MEDIUM: u32 = 50;
/// Score threshold at and above which the threat level is `low`.
const THRESHOLD_LOW: u32 = 20;

/// Baseline anomaly score applied to every event.
const ANOMALY_BASELINE: f64 = 0.1;
/// Additional anomaly contribution when `rule:ssh_bruteforce` fires.
const ANOMALY_BRUTEFORCE_BONUS: f64 = 0.55;

// ============================================================================
// SECTION: Rule Outcome
// ============================================================================

/// Output of the rule engine: everything the doctrine gate and decision
/// assembler need before persona/classification policy is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    /// Rule identifiers triggered, in evaluation order, deduplicated.
    pub rules_triggered: Vec<String>,
    /// Sum of triggered rules' fixed scores.
    pub score: u32,
    /// Deterministic threat tier derived from `score`.
    pub threat_level: crate::decision::ThreatLevel,
    /// Deterministic anomaly score in `[0, 1]`.
    pub anomaly_score: f64,
    /// Mitigations proposed before doctrine/ROE gating.
    pub mitigations: Vec<MitigationAction>,
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates the MVP rule set against a canonical event.
///
/// Pure and total: every `CanonicalEvent` produces a `RuleOutcome`, falling
/// back to `rule:default_allow` when nothing else fires.
#[must_use]
pub fn evaluate(event: &CanonicalEvent) -> RuleOutcome {
    let mut rules_triggered = Vec::new();
    let mut mitigations = Vec::new();
    let mut score = 0u32;

    if ssh_bruteforce_fires(event) {
        rules_triggered.push("rule:ssh_bruteforce".to_string());
        score += SCORE_SSH_BRUTEFORCE;
        if let Some(src_ip) = event.src_ip.as_deref() {
            mitigations.push(MitigationAction::block_ip(
                src_ip,
                "repeated authentication failures from this source",
            ));
        }
    }

    if rules_triggered.is_empty() {
        rules_triggered.push("rule:default_allow".to_string());
        score += SCORE_DEFAULT_ALLOW;
    }

    dedup_preserve_order(&mut rules_triggered);

    let threat_level = score_to_threat_level(score);
    let anomaly_score = anomaly_score_for(score, &rules_triggered);

    RuleOutcome { rules_triggered, score, threat_level, anomaly_score, mitigations }
}

fn ssh_bruteforce_fires(event: &CanonicalEvent) -> bool {
    BRUTEFORCE_EVENT_TYPES.contains(&event.event_type.as_str())
        && event.failed_auths >= BRUTEFORCE_MIN_FAILED_AUTHS
        && event.has_src_ip()
}

/// Maps a total rule score to a threat tier. `critical` is never emitted by
/// this mapping in MVP (see Open Questions in the specification); the
/// contract still permits a future rule to reach it.
#[must_use]
pub fn score_to_threat_level(score: u32) -> crate::decision::ThreatLevel {
    use crate::decision::ThreatLevel;
    if score >= THRESHOLD_HIGH {
        ThreatLevel::High
    } else if score >= THRESHOLD_MEDIUM {
        ThreatLevel::Medium
    } else if score >= THRESHOLD_LOW {
        ThreatLevel::Low
    } else {
        ThreatLevel::None
    }
}

/// Monotonic, deterministic anomaly score: a fixed baseline plus a
/// rule-identity bonus, clamped to `[0, 1]`.
fn anomaly_score_for(score: u32, rules_triggered: &[String]) -> f64 {
    let mut anomaly = ANOMALY_BASELINE;
    if rules_triggered.iter().any(|rule| rule == "rule:ssh_bruteforce") {
        anomaly += ANOMALY_BRUTEFORCE_BONUS;
    }
    // Score contributes a small monotonic nudge so two rules at different
    // scores never produce identical anomaly scores by coincidence alone.
    anomaly += f64::from(score) / 1000.0;
    anomaly.clamp(0.0, 1.0)
}

fn dedup_preserve_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::normalize;
    use serde_json::json;
    use time::OffsetDateTime;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid unix timestamp")
    }

    #[test]
    fn bruteforce_fires_and_maps_to_high() {
        let raw = json!({
            "source": "pytest",
            "event_type": "auth.bruteforce",
            "payload": {"src_ip": "1.2.3.4", "failed_auths": 7},
        });
        let (event, _warnings) = normalize(now(), &raw);
        let outcome = evaluate(&event);
        assert_eq!(outcome.rules_triggered, vec!["rule:ssh_bruteforce"]);
        assert_eq!(outcome.threat_level, crate::decision::ThreatLevel::High);
        assert_eq!(outcome.mitigations.len(), 1);
        assert!(outcome.mitigations[0].is_disruptive());
        assert_eq!(outcome.mitigations[0].target.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn default_allow_when_nothing_fires() {
        let raw = json!({"source": "pytest", "event_type": "heartbeat", "payload": {}});
        let (event, _warnings) = normalize(now(), &raw);
        let outcome = evaluate(&event);
        assert_eq!(outcome.rules_triggered, vec!["rule:default_allow"]);
        assert_eq!(outcome.threat_level, crate::decision::ThreatLevel::None);
        assert!(outcome.mitigations.is_empty());
        assert_eq!(outcome.score, 0);
    }

    #[test]
    fn bruteforce_requires_src_ip_present() {
        let raw = json!({
            "source": "pytest",
            "event_type": "auth",
            "payload": {"failed_auths": 9},
        });
        let (event, _warnings) = normalize(now(), &raw);
        let outcome = evaluate(&event);
        assert_eq!(outcome.rules_triggered, vec!["rule:default_allow"]);
    }

    #[test]
    fn score_threshold_mapping_is_exact() {
        assert_eq!(score_to_threat_level(79), crate::decision::ThreatLevel::Medium);
        assert_eq!(score_to_threat_level(80), crate::decision::ThreatLevel::High);
        assert_eq!(score_to_threat_level(50), crate::decision::ThreatLevel::Medium);
        assert_eq!(score_to_threat_level(49), crate::decision::ThreatLevel::Low);
        assert_eq!(score_to_threat_level(20), crate::decision::ThreatLevel::Low);
        assert_eq!(score_to_threat_level(19), crate::decision::ThreatLevel::None);
    }

    proptest::proptest! {
        #[test]
        fn score_threshold_mapping_holds_for_any_score(score in 0u32..10_000) {
            use crate::decision::ThreatLevel;
            let level = score_to_threat_level(score);
            match level {
                ThreatLevel::High => proptest::prop_assert!(score >= THRESHOLD_HIGH),
                ThreatLevel::Medium => proptest::prop_assert!(
                    score >= THRESHOLD_MEDIUM && score < THRESHOLD_HIGH
                ),
                ThreatLevel::Low => proptest::prop_assert!(
                    score >= THRESHOLD_LOW && score < THRESHOLD_MEDIUM
                ),
                ThreatLevel::None => proptest::prop_assert!(score < THRESHOLD_LOW),
                ThreatLevel::Critical => proptest::prop_assert!(false, "unreachable from score mapping"),
            }
        }
    }
}
