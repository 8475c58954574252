use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use drp_core::dispute::{DisputeCase, DisputeCategory, DisputeStatus, ReviewVote};
use drp_core::DrpError;

use crate::retry::retry_read;
use crate::store::LedgerDb;

/// Side-effects of dispute lifecycle transitions, emitted as events.
///
/// The core never executes governance outcomes; downstream consumers
/// (model registry, policy pipeline) subscribe to this stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OversightEvent {
    DisputeOpened {
        dispute_id: String,
        decision_id: String,
    },
    DisputeResolved {
        dispute_id: String,
        decision_id: String,
        resolution: ReviewVote,
        model_update_required: bool,
        policy_change_required: bool,
    },
    DisputeClosed {
        dispute_id: String,
    },
}

/// AI/human agreement summary over resolved disputes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementStats {
    pub total_disputes: u64,
    pub resolved_disputes: u64,
    pub ai_supported: u64,
    pub ai_overturned: u64,
    pub ai_accuracy_percent: f64,
    pub pending_disputes: u64,
}

/// Dispute lifecycle driver.
///
/// Transitions are guarded per dispute, so concurrent voting on distinct
/// disputes never contends. All transitions are monotonic:
/// `open → in_review → resolved → closed`.
pub struct OversightManager {
    db: Arc<LedgerDb>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    events: mpsc::UnboundedSender<OversightEvent>,
}

fn new_dispute_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl OversightManager {
    pub fn new(db: Arc<LedgerDb>) -> (Self, mpsc::UnboundedReceiver<OversightEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                db,
                locks: Mutex::new(HashMap::new()),
                events,
            },
            rx,
        )
    }

    fn lock_for(&self, dispute_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(
            locks
                .entry(dispute_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    fn emit(&self, event: OversightEvent) {
        // Receiver may have been dropped (e.g. in tests); events are
        // advisory, losing them does not affect ledger state.
        let _ = self.events.send(event);
    }

    /// Open a dispute against a recorded decision. A decision may carry
    /// any number of disputes.
    pub async fn open_dispute(
        &self,
        decision_id: &str,
        reason: &str,
        category: DisputeCategory,
        submitter_id: &str,
    ) -> Result<DisputeCase, DrpError> {
        if reason.trim().is_empty() {
            return Err(DrpError::InvalidInput("dispute reason must be non-empty".into()));
        }
        let decision = retry_read("dispute_target", || self.db.get_decision(decision_id)).await?;
        if decision.is_none() {
            return Err(DrpError::not_found("decision", decision_id));
        }

        let dispute = DisputeCase {
            dispute_id: new_dispute_id(),
            decision_id: decision_id.to_string(),
            reason: reason.to_string(),
            category,
            submitter_id: submitter_id.to_string(),
            submitted_at: now_iso(),
            status: DisputeStatus::Open,
            reviewers: Vec::new(),
            votes: Default::default(),
            resolution: None,
            resolved_at: None,
            resolution_notes: None,
            model_update_required: false,
            policy_change_required: false,
        };
        self.db.put_dispute(&dispute)?;
        info!(dispute_id = %dispute.dispute_id, decision_id, "dispute opened");
        self.emit(OversightEvent::DisputeOpened {
            dispute_id: dispute.dispute_id.clone(),
            decision_id: decision_id.to_string(),
        });
        Ok(dispute)
    }

    /// Fix the reviewer set and move the dispute into review. Only valid
    /// from `open`; the set cannot be changed afterwards.
    pub async fn assign_reviewers(
        &self,
        dispute_id: &str,
        reviewers: &[String],
    ) -> Result<DisputeCase, DrpError> {
        let lock = self.lock_for(dispute_id);
        let _guard = lock.lock().await;

        let mut dispute = self.load(dispute_id).await?;
        if dispute.status != DisputeStatus::Open {
            return Err(DrpError::PreconditionFailed(format!(
                "reviewers can only be assigned to an open dispute (status is {})",
                dispute.status
            )));
        }

        let mut unique = Vec::new();
        for r in reviewers {
            if !r.is_empty() && !unique.contains(r) {
                unique.push(r.clone());
            }
        }
        if unique.is_empty() {
            return Err(DrpError::InvalidInput(
                "at least one reviewer must be assigned".into(),
            ));
        }

        dispute.reviewers = unique;
        dispute.status = DisputeStatus::InReview;
        self.db.put_dispute(&dispute)?;
        info!(dispute_id, reviewers = dispute.reviewers.len(), "reviewers assigned");
        Ok(dispute)
    }

    /// Record one reviewer's vote; a later vote from the same reviewer
    /// overwrites. The vote that completes the set resolves the dispute by
    /// majority of support/overturn, ties favoring the AI decision.
    pub async fn submit_vote(
        &self,
        dispute_id: &str,
        reviewer_id: &str,
        vote: ReviewVote,
    ) -> Result<DisputeCase, DrpError> {
        let lock = self.lock_for(dispute_id);
        let _guard = lock.lock().await;

        let mut dispute = self.load(dispute_id).await?;
        if dispute.status != DisputeStatus::InReview {
            return Err(DrpError::PreconditionFailed(format!(
                "votes are only accepted while in review (status is {})",
                dispute.status
            )));
        }
        if !dispute.is_reviewer(reviewer_id) {
            return Err(DrpError::UnauthorizedAction(format!(
                "reviewer {reviewer_id} is not assigned to dispute {dispute_id}"
            )));
        }

        dispute.votes.insert(reviewer_id.to_string(), vote);
        info!(dispute_id, reviewer_id, vote = vote.as_str(), "vote recorded");

        if dispute.all_votes_in() {
            self.resolve(&mut dispute);
        }

        self.db.put_dispute(&dispute)?;
        Ok(dispute)
    }

    fn resolve(&self, dispute: &mut DisputeCase) {
        let support = dispute
            .votes
            .values()
            .filter(|v| **v == ReviewVote::SupportAi)
            .count();
        let overturn = dispute
            .votes
            .values()
            .filter(|v| **v == ReviewVote::OverturnAi)
            .count();

        let (resolution, notes) = if overturn > support {
            (
                ReviewVote::OverturnAi,
                format!("Human reviewers overturned AI decision ({overturn} vs {support})"),
            )
        } else {
            (
                ReviewVote::SupportAi,
                format!("Human reviewers supported AI decision ({support} vs {overturn})"),
            )
        };

        dispute.resolution = Some(resolution);
        dispute.resolution_notes = Some(notes);
        dispute.resolved_at = Some(now_iso());
        dispute.status = DisputeStatus::Resolved;

        if resolution == ReviewVote::OverturnAi {
            dispute.model_update_required = true;
            dispute.policy_change_required = dispute.category.escalates_policy();
        }

        info!(
            dispute_id = %dispute.dispute_id,
            resolution = resolution.as_str(),
            "dispute resolved"
        );
        self.emit(OversightEvent::DisputeResolved {
            dispute_id: dispute.dispute_id.clone(),
            decision_id: dispute.decision_id.clone(),
            resolution,
            model_update_required: dispute.model_update_required,
            policy_change_required: dispute.policy_change_required,
        });
    }

    /// Terminal transition; only a resolved dispute can close.
    pub async fn close(&self, dispute_id: &str) -> Result<DisputeCase, DrpError> {
        let lock = self.lock_for(dispute_id);
        let _guard = lock.lock().await;

        let mut dispute = self.load(dispute_id).await?;
        if dispute.status != DisputeStatus::Resolved {
            return Err(DrpError::PreconditionFailed(format!(
                "only a resolved dispute can be closed (status is {})",
                dispute.status
            )));
        }
        dispute.status = DisputeStatus::Closed;
        self.db.put_dispute(&dispute)?;
        self.emit(OversightEvent::DisputeClosed {
            dispute_id: dispute_id.to_string(),
        });
        Ok(dispute)
    }

    pub async fn get_dispute(&self, dispute_id: &str) -> Result<DisputeCase, DrpError> {
        self.load(dispute_id).await
    }

    pub async fn list_by_status(&self, status: DisputeStatus) -> Result<Vec<DisputeCase>, DrpError> {
        retry_read("list_disputes", || self.db.iter_disputes_by_status(status)).await
    }

    /// AI/human agreement summary across all disputes.
    pub async fn agreement_stats(&self) -> Result<AgreementStats, DrpError> {
        let disputes = retry_read("agreement_stats", || self.db.iter_disputes()).await?;
        let total = disputes.len() as u64;
        let pending = disputes
            .iter()
            .filter(|d| d.status == DisputeStatus::Open)
            .count() as u64;
        let resolved: Vec<_> = disputes
            .iter()
            .filter(|d| {
                d.status == DisputeStatus::Resolved || d.status == DisputeStatus::Closed
            })
            .collect();
        let supported = resolved
            .iter()
            .filter(|d| d.resolution == Some(ReviewVote::SupportAi))
            .count() as u64;
        let overturned = resolved
            .iter()
            .filter(|d| d.resolution == Some(ReviewVote::OverturnAi))
            .count() as u64;
        let resolved_count = resolved.len() as u64;

        Ok(AgreementStats {
            total_disputes: total,
            resolved_disputes: resolved_count,
            ai_supported: supported,
            ai_overturned: overturned,
            ai_accuracy_percent: if resolved_count > 0 {
                (supported as f64 / resolved_count as f64 * 10_000.0).round() / 100.0
            } else {
                0.0
            },
            pending_disputes: pending,
        })
    }

    async fn load(&self, dispute_id: &str) -> Result<DisputeCase, DrpError> {
        retry_read("get_dispute", || self.db.get_dispute(dispute_id))
            .await?
            .ok_or_else(|| DrpError::not_found("dispute", dispute_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drp_core::decision::{DecisionRecord, InputType, Outcome};

    fn seeded_db(tag: &str) -> Arc<LedgerDb> {
        let dir = std::env::temp_dir().join(format!("drp_disputes_{tag}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(LedgerDb::open(dir).unwrap());
        db.insert_decision_if_absent(&DecisionRecord {
            decision_id: "d0d0d0d0d0d0d0d0".into(),
            model_id: "face_verification_v1".into(),
            model_version: "1.2.0".into(),
            input_type: InputType::Image,
            input_commitment: "ab".repeat(32),
            outcome: Outcome::Denied,
            confidence: 0.91,
            explanation_cid: None,
            explanation_png_cid: None,
            zk_proof_cid: None,
            elder_pub: "cd".repeat(32),
            signature: "ee".repeat(64),
            timestamp: "2026-01-01T00:00:00Z".into(),
        })
        .unwrap();
        db
    }

    fn reviewers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn overturn_majority_sets_impact_flags() {
        let (mgr, mut rx) = OversightManager::new(seeded_db("overturn"));
        let dispute = mgr
            .open_dispute("d0d0d0d0d0d0d0d0", "demographic skew", DisputeCategory::Bias, "user-1")
            .await
            .unwrap();
        mgr.assign_reviewers(&dispute.dispute_id, &reviewers(&["r1", "r2", "r3"]))
            .await
            .unwrap();

        mgr.submit_vote(&dispute.dispute_id, "r1", ReviewVote::OverturnAi)
            .await
            .unwrap();
        mgr.submit_vote(&dispute.dispute_id, "r2", ReviewVote::OverturnAi)
            .await
            .unwrap();
        let resolved = mgr
            .submit_vote(&dispute.dispute_id, "r3", ReviewVote::SupportAi)
            .await
            .unwrap();

        assert_eq!(resolved.status, DisputeStatus::Resolved);
        assert_eq!(resolved.resolution, Some(ReviewVote::OverturnAi));
        assert!(resolved.model_update_required);
        assert!(resolved.policy_change_required);
        assert_eq!(
            resolved.resolution_notes.as_deref(),
            Some("Human reviewers overturned AI decision (2 vs 1)")
        );

        // Opened + resolved events.
        assert!(matches!(rx.recv().await, Some(OversightEvent::DisputeOpened { .. })));
        match rx.recv().await {
            Some(OversightEvent::DisputeResolved {
                resolution,
                model_update_required,
                policy_change_required,
                ..
            }) => {
                assert_eq!(resolution, ReviewVote::OverturnAi);
                assert!(model_update_required);
                assert!(policy_change_required);
            }
            other => panic!("expected resolution event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tie_favors_the_ai_decision() {
        let (mgr, _rx) = OversightManager::new(seeded_db("tie"));
        let dispute = mgr
            .open_dispute("d0d0d0d0d0d0d0d0", "unclear", DisputeCategory::Accuracy, "user-1")
            .await
            .unwrap();
        mgr.assign_reviewers(&dispute.dispute_id, &reviewers(&["r1", "r2", "r3"]))
            .await
            .unwrap();
        mgr.submit_vote(&dispute.dispute_id, "r1", ReviewVote::SupportAi)
            .await
            .unwrap();
        mgr.submit_vote(&dispute.dispute_id, "r2", ReviewVote::OverturnAi)
            .await
            .unwrap();
        let resolved = mgr
            .submit_vote(&dispute.dispute_id, "r3", ReviewVote::Abstain)
            .await
            .unwrap();

        assert_eq!(resolved.resolution, Some(ReviewVote::SupportAi));
        assert!(!resolved.model_update_required);
        assert!(!resolved.policy_change_required);
    }

    #[tokio::test]
    async fn later_vote_overwrites_earlier_one() {
        let (mgr, _rx) = OversightManager::new(seeded_db("overwrite"));
        let dispute = mgr
            .open_dispute("d0d0d0d0d0d0d0d0", "check", DisputeCategory::Other, "user-1")
            .await
            .unwrap();
        mgr.assign_reviewers(&dispute.dispute_id, &reviewers(&["r1", "r2"]))
            .await
            .unwrap();

        mgr.submit_vote(&dispute.dispute_id, "r1", ReviewVote::SupportAi)
            .await
            .unwrap();
        let after = mgr
            .submit_vote(&dispute.dispute_id, "r1", ReviewVote::OverturnAi)
            .await
            .unwrap();
        // Still in review: r2 has not voted, and r1 holds a single vote.
        assert_eq!(after.status, DisputeStatus::InReview);
        assert_eq!(after.votes.len(), 1);
        assert_eq!(after.votes.get("r1"), Some(&ReviewVote::OverturnAi));
    }

    #[tokio::test]
    async fn unassigned_reviewer_is_rejected_loudly() {
        let (mgr, _rx) = OversightManager::new(seeded_db("stranger"));
        let dispute = mgr
            .open_dispute("d0d0d0d0d0d0d0d0", "check", DisputeCategory::Other, "user-1")
            .await
            .unwrap();
        mgr.assign_reviewers(&dispute.dispute_id, &reviewers(&["r1"]))
            .await
            .unwrap();
        let err = mgr
            .submit_vote(&dispute.dispute_id, "intruder", ReviewVote::OverturnAi)
            .await
            .unwrap_err();
        assert!(matches!(err, DrpError::UnauthorizedAction(_)));
    }

    #[tokio::test]
    async fn lifecycle_is_monotonic() {
        let (mgr, _rx) = OversightManager::new(seeded_db("monotonic"));
        let dispute = mgr
            .open_dispute("d0d0d0d0d0d0d0d0", "check", DisputeCategory::Other, "user-1")
            .await
            .unwrap();
        let id = dispute.dispute_id.clone();

        // Voting before review fails.
        assert!(matches!(
            mgr.submit_vote(&id, "r1", ReviewVote::SupportAi).await,
            Err(DrpError::PreconditionFailed(_))
        ));
        // Closing before resolution fails.
        assert!(matches!(mgr.close(&id).await, Err(DrpError::PreconditionFailed(_))));

        mgr.assign_reviewers(&id, &reviewers(&["r1"])).await.unwrap();
        // Re-assignment after entering review fails.
        assert!(matches!(
            mgr.assign_reviewers(&id, &reviewers(&["r9"])).await,
            Err(DrpError::PreconditionFailed(_))
        ));

        mgr.submit_vote(&id, "r1", ReviewVote::SupportAi).await.unwrap();
        let closed = mgr.close(&id).await.unwrap();
        assert_eq!(closed.status, DisputeStatus::Closed);

        // Closing twice fails.
        assert!(matches!(mgr.close(&id).await, Err(DrpError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn decision_can_carry_multiple_disputes() {
        let (mgr, _rx) = OversightManager::new(seeded_db("multi"));
        let a = mgr
            .open_dispute("d0d0d0d0d0d0d0d0", "first", DisputeCategory::Bias, "user-1")
            .await
            .unwrap();
        let b = mgr
            .open_dispute("d0d0d0d0d0d0d0d0", "second", DisputeCategory::Accuracy, "user-2")
            .await
            .unwrap();
        assert_ne!(a.dispute_id, b.dispute_id);
        assert_eq!(mgr.list_by_status(DisputeStatus::Open).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dispute_against_unknown_decision_fails() {
        let (mgr, _rx) = OversightManager::new(seeded_db("unknown"));
        let err = mgr
            .open_dispute("ffffffffffffffff", "ghost", DisputeCategory::Other, "user-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DrpError::NotFound { .. }));
    }

    #[tokio::test]
    async fn agreement_stats_summarize_resolutions() {
        let (mgr, _rx) = OversightManager::new(seeded_db("stats"));
        let d1 = mgr
            .open_dispute("d0d0d0d0d0d0d0d0", "one", DisputeCategory::Bias, "u1")
            .await
            .unwrap();
        mgr.assign_reviewers(&d1.dispute_id, &reviewers(&["r1"])).await.unwrap();
        mgr.submit_vote(&d1.dispute_id, "r1", ReviewVote::OverturnAi)
            .await
            .unwrap();

        let _open = mgr
            .open_dispute("d0d0d0d0d0d0d0d0", "two", DisputeCategory::Other, "u2")
            .await
            .unwrap();

        let stats = mgr.agreement_stats().await.unwrap();
        assert_eq!(stats.total_disputes, 2);
        assert_eq!(stats.resolved_disputes, 1);
        assert_eq!(stats.ai_overturned, 1);
        assert_eq!(stats.pending_disputes, 1);
        assert_eq!(stats.ai_accuracy_percent, 0.0);
    }
}
