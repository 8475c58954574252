use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// One typed piece of evidence inside an activity claim.
///
/// `kind` is an open set; kinds outside the weight table score the default
/// weight. `geo_hint` is a coarse region only; exact coordinates are
/// rejected upstream and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvidence {
    pub kind: String,
    #[serde(default)]
    pub description: String,
    /// Opaque proof references (URIs or attestation tokens).
    #[serde(default)]
    pub proofs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_kwh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_hint: Option<String>,
}

/// An activity-attestation claim submitted for policy assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityClaim {
    /// Opaque actor identifier; never PII.
    pub actor_id: String,
    pub timestamp: Timestamp,
    pub evidences: Vec<ActivityEvidence>,
}

/// Policy verdict buckets, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictKind {
    Approve,
    Review,
    Reject,
}

impl VerdictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictKind::Approve => "approve",
            VerdictKind::Review => "review",
            VerdictKind::Reject => "reject",
        }
    }
}

/// Output of the policy engine for one claim.
///
/// `policy_tags` is kept sorted and deduplicated so that identical inputs
/// produce bit-identical output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Rounded to three decimal places.
    pub score: f64,
    pub verdict: VerdictKind,
    pub rationale: String,
    pub obligations: Vec<String>,
    pub policy_tags: Vec<String>,
}
