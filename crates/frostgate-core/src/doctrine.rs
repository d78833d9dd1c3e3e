// frostgate-core/src/doctrine.rs
// ============================================================================
// Module: Doctrine / ROE Gate
// Description: Persona+classification policy layer bounding disruption.
// Purpose: Post-process rule engine output under the Guardian+SECRET ROE
//          policy (and the permissive default for all other personas).
// Dependencies: frostgate-core::decision, frostgate-core::event,
//               frostgate-core::rules
// ============================================================================

//! ## Overview
//! The doctrine gate never changes `rules_triggered`, `score`, or
//! `threat_level` — it only shapes `mitigations`, `tie_d`, and the gating
//! outcome. It is pure: a function of a [`RuleOutcome`] plus the event's
//! classification/persona.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::decision::GatingDecision;
use crate::decision::MitigationAction;
use crate::decision::TieD;
use crate::event::CanonicalEvent;
use crate::rules::RuleOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

const BASELINE_SERVICE_IMPACT_WITH_BLOCK: f64 = 0.35;
const BASELINE_USER_IMPACT_WITH_BLOCK: f64 = 0.20;

const GUARDIAN_PERSONA: &str = "guardian";
const SECRET_CLASSIFICATION: &str = "SECRET";

/// Maximum number of `block_ip` mitigations permitted once the Guardian+
/// SECRET policy applies.
const MAX_BLOCK_IP_UNDER_ROE: usize = 1;

// ============================================================================
// SECTION: Doctrine Outcome
// ============================================================================

/// Output of the doctrine/ROE gate: the final mitigation list plus the
/// policy-derived fields of a [`crate::decision::Decision`].
#[derive(Debug, Clone, PartialEq)]
pub struct DoctrineOutcome {
    /// Mitigations remaining after policy filtering.
    pub mitigations: Vec<MitigationAction>,
    /// Impact tuple, always present, never increased by filtering.
    pub tie_d: TieD,
    /// Whether the Guardian+SECRET ROE policy applied.
    pub roe_applied: bool,
    /// Whether out-of-band approval is required before acting.
    pub ao_required: bool,
    /// Whether mitigations were filtered or impact was reduced.
    pub disruption_limited: bool,
    /// Final gating outcome.
    pub gating_decision: GatingDecision,
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Applies the doctrine/ROE gate to a rule engine outcome.
#[must_use]
pub fn apply(event: &CanonicalEvent, outcome: &RuleOutcome) -> DoctrineOutcome {
    let baseline_tie_d = baseline_impact(&outcome.mitigations);

    let is_guardian_secret =
        event.persona_eq(GUARDIAN_PERSONA) && event.classification_eq(SECRET_CLASSIFICATION);

    if is_guardian_secret {
        apply_guardian_secret_policy(outcome.mitigations.clone(), baseline_tie_d)
    } else {
        apply_default_policy(outcome.mitigations.clone(), baseline_tie_d)
    }
}

/// Baseline impact before any doctrine reduction: present whenever a
/// `block_ip` mitigation is proposed, regardless of persona.
fn baseline_impact(mitigations: &[MitigationAction]) -> TieD {
    if mitigations.iter().any(MitigationAction::is_disruptive) {
        TieD::new(BASELINE_SERVICE_IMPACT_WITH_BLOCK, BASELINE_USER_IMPACT_WITH_BLOCK)
    } else {
        TieD::zero()
    }
}

fn apply_guardian_secret_policy(
    mitigations: Vec<MitigationAction>,
    baseline_tie_d: TieD,
) -> DoctrineOutcome {
    let original_len = mitigations.len();
    let filtered = limit_block_ip(mitigations, MAX_BLOCK_IP_UNDER_ROE);
    let disruption_limited = filtered.len() < original_len;

    // Disruption reduction must never increase impact; filtering can only
    // hold impact steady or (in a future rule set with more disruptive
    // kinds) lower it.
    let tie_d = baseline_tie_d;

    let any_disruptive_remaining = filtered.iter().any(MitigationAction::is_disruptive);
    let gating_decision =
        if any_disruptive_remaining { GatingDecision::RequireApproval } else { GatingDecision::Allow };

    DoctrineOutcome {
        mitigations: filtered,
        tie_d,
        roe_applied: true,
        ao_required: true,
        disruption_limited,
        gating_decision,
    }
}

fn apply_default_policy(
    mitigations: Vec<MitigationAction>,
    baseline_tie_d: TieD,
) -> DoctrineOutcome {
    DoctrineOutcome {
        mitigations,
        tie_d: baseline_tie_d,
        roe_applied: false,
        ao_required: false,
        disruption_limited: false,
        gating_decision: GatingDecision::Allow,
    }
}

/// Keeps at most `limit` `block_ip` mitigations (in original order),
/// dropping the rest; non-disruptive mitigations are never removed.
fn limit_block_ip(mitigations: Vec<MitigationAction>, limit: usize) -> Vec<MitigationAction> {
    let mut block_ip_seen = 0usize;
    mitigations
        .into_iter()
        .filter(|mitigation| {
            if mitigation.is_disruptive() {
                block_ip_seen += 1;
                block_ip_seen <= limit
            } else {
                true
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::normalize;
    use crate::rules::evaluate;
    use serde_json::json;
    use time::OffsetDateTime;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid unix timestamp")
    }

    #[test]
    fn guardian_secret_requires_approval_and_limits_to_one_block() {
        let raw = json!({
            "source": "pytest",
            "event_type": "auth.bruteforce",
            "classification": "SECRET",
            "persona": "guardian",
            "payload": {"src_ip": "1.2.3.4", "failed_auths": 7},
        });
        let (event, _warnings) = normalize(now(), &raw);
        let rule_outcome = evaluate(&event);
        let doctrine = apply(&event, &rule_outcome);

        assert!(doctrine.roe_applied);
        assert!(doctrine.ao_required);
        let block_ip_count =
            doctrine.mitigations.iter().filter(|m| m.is_disruptive()).count();
        assert!(block_ip_count <= 1);
        assert_eq!(doctrine.gating_decision, GatingDecision::RequireApproval);
        assert!(doctrine.tie_d.service_impact >= 0.35);
    }

    #[test]
    fn other_personas_default_to_allow_without_roe() {
        let raw = json!({
            "source": "pytest",
            "event_type": "auth.bruteforce",
            "persona": "sentinel",
            "payload": {"src_ip": "1.2.3.4", "failed_auths": 7},
        });
        let (event, _warnings) = normalize(now(), &raw);
        let rule_outcome = evaluate(&event);
        let doctrine = apply(&event, &rule_outcome);

        assert!(!doctrine.roe_applied);
        assert!(!doctrine.ao_required);
        assert_eq!(doctrine.gating_decision, GatingDecision::Allow);
        assert!(!doctrine.disruption_limited);
    }

    #[test]
    fn no_mitigations_yields_zero_baseline_impact() {
        let raw = json!({"source": "pytest", "event_type": "heartbeat", "payload": {}});
        let (event, _warnings) = normalize(now(), &raw);
        let rule_outcome = evaluate(&event);
        let doctrine = apply(&event, &rule_outcome);
        assert_eq!(doctrine.tie_d, TieD::zero());
    }
}
