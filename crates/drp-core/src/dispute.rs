use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Dispute lifecycle states. Transitions are strictly monotonic:
/// `open → in_review → resolved → closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    InReview,
    Resolved,
    Closed,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::InReview => "in_review",
            DisputeStatus::Resolved => "resolved",
            DisputeStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reviewer's vote on a disputed decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVote {
    SupportAi,
    OverturnAi,
    Abstain,
}

impl ReviewVote {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewVote::SupportAi => "support_ai",
            ReviewVote::OverturnAi => "overturn_ai",
            ReviewVote::Abstain => "abstain",
        }
    }
}

/// Dispute classification; bias and fairness findings escalate to a
/// policy-change requirement when the decision is overturned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisputeCategory {
    Bias,
    Accuracy,
    Fairness,
    Other,
}

impl DisputeCategory {
    pub fn escalates_policy(&self) -> bool {
        matches!(self, DisputeCategory::Bias | DisputeCategory::Fairness)
    }
}

/// A structured challenge against a recorded decision.
///
/// `votes` maps reviewer id to the latest vote; one vote per reviewer,
/// later submissions overwrite. `resolution_notes` is produced by the
/// state machine, never free-form user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeCase {
    pub dispute_id: String,
    pub decision_id: String,
    pub reason: String,
    pub category: DisputeCategory,
    pub submitter_id: String,
    /// ISO-8601 UTC.
    pub submitted_at: String,
    pub status: DisputeStatus,
    /// Fixed once reviewers are assigned; order preserved.
    pub reviewers: Vec<String>,
    pub votes: BTreeMap<String, ReviewVote>,
    pub resolution: Option<ReviewVote>,
    pub resolved_at: Option<String>,
    pub resolution_notes: Option<String>,
    pub model_update_required: bool,
    pub policy_change_required: bool,
}

impl DisputeCase {
    pub fn is_reviewer(&self, reviewer_id: &str) -> bool {
        self.reviewers.iter().any(|r| r == reviewer_id)
    }

    pub fn all_votes_in(&self) -> bool {
        !self.reviewers.is_empty() && self.votes.len() >= self.reviewers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_order_is_monotonic() {
        assert!(DisputeStatus::Open < DisputeStatus::InReview);
        assert!(DisputeStatus::InReview < DisputeStatus::Resolved);
        assert!(DisputeStatus::Resolved < DisputeStatus::Closed);
    }

    #[test]
    fn bias_and_fairness_escalate() {
        assert!(DisputeCategory::Bias.escalates_policy());
        assert!(DisputeCategory::Fairness.escalates_policy());
        assert!(!DisputeCategory::Accuracy.escalates_policy());
        assert!(!DisputeCategory::Other.escalates_policy());
    }

    #[test]
    fn vote_labels_match_wire_form() {
        assert_eq!(
            serde_json::to_string(&ReviewVote::SupportAi).unwrap(),
            "\"support_ai\""
        );
        assert_eq!(
            serde_json::to_string(&DisputeStatus::InReview).unwrap(),
            "\"in_review\""
        );
    }
}
