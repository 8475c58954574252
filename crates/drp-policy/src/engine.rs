use std::collections::BTreeSet;

use tracing::debug;

use drp_core::claims::{ActivityClaim, Verdict, VerdictKind};
use drp_core::constants::{
    APPROVE_THRESHOLD, ENERGY_BONUS_CAP, ENERGY_BONUS_DIVISOR, PROOF_BONUS, RECENCY_PENALTY,
    RECENCY_WINDOW_SECS, REVIEW_THRESHOLD, WEIGHT_CIVIC_WORK, WEIGHT_DEFAULT, WEIGHT_HEALTHCARE,
    WEIGHT_LEARNING, WEIGHT_RENEWABLE_ENERGY,
};
use drp_core::types::Timestamp;

/// Deterministic activity-claim assessor.
///
/// Used as a signing precondition inline, and exposed as its own endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn new() -> Self {
        Self
    }

    fn base_weight(kind: &str) -> f64 {
        match kind {
            "learning" => WEIGHT_LEARNING,
            "renewable_energy" => WEIGHT_RENEWABLE_ENERGY,
            "healthcare" => WEIGHT_HEALTHCARE,
            "civic_work" => WEIGHT_CIVIC_WORK,
            _ => WEIGHT_DEFAULT,
        }
    }

    /// Assess `claim` against the policy tables at server time `now`.
    ///
    /// Weak claims come back as `reject` verdicts, never as errors; the
    /// error taxonomy is reserved for malformed requests and
    /// infrastructure.
    pub fn assess(&self, claim: &ActivityClaim, now: Timestamp) -> Verdict {
        if claim.evidences.is_empty() {
            return Verdict {
                score: 0.0,
                verdict: VerdictKind::Reject,
                rationale: "no evidence".into(),
                obligations: vec!["provide at least one verifiable proof".into()],
                policy_tags: vec!["insufficient_evidence".into()],
            };
        }

        let recency_penalty = if now - claim.timestamp > RECENCY_WINDOW_SECS {
            RECENCY_PENALTY
        } else {
            0.0
        };

        let mut score = 0.0;
        let mut tags: BTreeSet<String> = BTreeSet::new();
        for ev in &claim.evidences {
            let mut partial = Self::base_weight(&ev.kind);
            if ev.kind == "renewable_energy" {
                if let Some(kwh) = ev.energy_kwh {
                    if kwh >= 0.0 {
                        partial += (kwh / ENERGY_BONUS_DIVISOR).min(ENERGY_BONUS_CAP);
                        tags.insert("energy_bonus".into());
                    }
                }
            }
            if !ev.proofs.is_empty() {
                partial += PROOF_BONUS;
                tags.insert("has_proof".into());
            }
            score += partial;
        }

        // Round to three decimals before classifying so no platform's
        // floating-point representation can flip a threshold.
        score = ((score - recency_penalty).clamp(0.0, 1.0) * 1000.0).round() / 1000.0;

        let (verdict, rationale) = if score >= APPROVE_THRESHOLD {
            (
                VerdictKind::Approve,
                "sufficient diversified evidence meeting policy thresholds",
            )
        } else if score >= REVIEW_THRESHOLD {
            (
                VerdictKind::Review,
                "moderate evidence; requires human or auditor review",
            )
        } else {
            (
                VerdictKind::Reject,
                "evidence insufficient versus policy thresholds",
            )
        };

        let mut obligations = Vec::new();
        if verdict != VerdictKind::Approve {
            obligations.push("submit stronger or more recent proofs".to_string());
        }
        if claim.evidences.iter().any(|e| e.geo_hint.is_some()) {
            obligations.push("add regional sustainability context if possible".to_string());
        }

        debug!(actor = %claim.actor_id, score, verdict = verdict.as_str(), "assessed claim");

        Verdict {
            score,
            verdict,
            rationale: rationale.into(),
            obligations,
            policy_tags: tags.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drp_core::claims::ActivityEvidence;

    const NOW: Timestamp = 1_735_142_096;

    fn evidence(kind: &str) -> ActivityEvidence {
        ActivityEvidence {
            kind: kind.into(),
            description: String::new(),
            proofs: vec![],
            energy_kwh: None,
            geo_hint: None,
        }
    }

    fn claim(evidences: Vec<ActivityEvidence>) -> ActivityClaim {
        ActivityClaim {
            actor_id: "did:drp:alice".into(),
            timestamp: NOW,
            evidences,
        }
    }

    #[test]
    fn empty_evidence_rejects() {
        let v = PolicyEngine::new().assess(&claim(vec![]), NOW);
        assert_eq!(v.score, 0.0);
        assert_eq!(v.verdict, VerdictKind::Reject);
        assert_eq!(
            v.obligations,
            vec!["provide at least one verifiable proof".to_string()]
        );
        assert_eq!(v.policy_tags, vec!["insufficient_evidence".to_string()]);
    }

    #[test]
    fn strong_mixed_claim_approves_at_full_score() {
        let mut renewable = evidence("renewable_energy");
        renewable.energy_kwh = Some(120.0);
        renewable.proofs = vec!["att://m/1".into()];
        let mut learning = evidence("learning");
        learning.proofs = vec!["cred://c/1".into()];

        let v = PolicyEngine::new().assess(&claim(vec![renewable, learning]), NOW);
        // 0.4 + 0.3 (capped energy) + 0.1 + 0.25 + 0.1 clamps to 1.0.
        assert_eq!(v.score, 1.0);
        assert_eq!(v.verdict, VerdictKind::Approve);
        assert_eq!(
            v.policy_tags,
            vec!["energy_bonus".to_string(), "has_proof".to_string()]
        );
        assert!(v.obligations.is_empty());
    }

    #[test]
    fn approve_boundary_is_inclusive() {
        // 0.40 + 0.20 = exactly the approve threshold.
        let v = PolicyEngine::new().assess(
            &claim(vec![evidence("renewable_energy"), evidence("healthcare")]),
            NOW,
        );
        assert_eq!(v.score, 0.6);
        assert_eq!(v.verdict, VerdictKind::Approve);
    }

    #[test]
    fn review_boundary_is_inclusive() {
        // 0.20 + 0.15 = exactly the review threshold.
        let v = PolicyEngine::new().assess(
            &claim(vec![evidence("healthcare"), evidence("civic_work")]),
            NOW,
        );
        assert_eq!(v.score, 0.35);
        assert_eq!(v.verdict, VerdictKind::Review);
        assert_eq!(
            v.obligations,
            vec!["submit stronger or more recent proofs".to_string()]
        );
    }

    #[test]
    fn below_review_threshold_rejects() {
        let v = PolicyEngine::new().assess(&claim(vec![evidence("civic_work")]), NOW);
        assert_eq!(v.score, 0.15);
        assert_eq!(v.verdict, VerdictKind::Reject);
    }

    #[test]
    fn unknown_kind_gets_default_weight() {
        let v = PolicyEngine::new().assess(&claim(vec![evidence("interpretive_dance")]), NOW);
        assert_eq!(v.score, 0.05);
        assert_eq!(v.verdict, VerdictKind::Reject);
    }

    #[test]
    fn stale_claim_pays_recency_penalty() {
        let mut c = claim(vec![evidence("learning")]);
        c.timestamp = NOW - 91 * 24 * 3600;
        let v = PolicyEngine::new().assess(&c, NOW);
        assert_eq!(v.score, 0.15);
    }

    #[test]
    fn claim_just_inside_window_pays_no_penalty() {
        let mut c = claim(vec![evidence("learning")]);
        c.timestamp = NOW - 90 * 24 * 3600;
        let v = PolicyEngine::new().assess(&c, NOW);
        assert_eq!(v.score, 0.25);
    }

    #[test]
    fn energy_bonus_caps_at_point_three() {
        let mut big = evidence("renewable_energy");
        big.energy_kwh = Some(10_000.0);
        let v = PolicyEngine::new().assess(&claim(vec![big]), NOW);
        // 0.4 base + 0.3 cap, no proof bonus.
        assert_eq!(v.score, 0.7);
        assert_eq!(v.policy_tags, vec!["energy_bonus".to_string()]);
    }

    #[test]
    fn geo_hint_adds_context_obligation() {
        let mut e = evidence("civic_work");
        e.geo_hint = Some("eu-west".into());
        let v = PolicyEngine::new().assess(&claim(vec![e]), NOW);
        assert!(v
            .obligations
            .contains(&"add regional sustainability context if possible".to_string()));
    }

    #[test]
    fn assessment_is_deterministic() {
        let mut e = evidence("renewable_energy");
        e.energy_kwh = Some(42.5);
        e.proofs = vec!["att://x".into()];
        let c = claim(vec![e]);
        let engine = PolicyEngine::new();
        let a = engine.assess(&c, NOW);
        let b = engine.assess(&c, NOW);
        assert_eq!(a, b);
    }
}
