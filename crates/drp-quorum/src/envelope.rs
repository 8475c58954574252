use serde::{Deserialize, Serialize};

use drp_core::types::{ElderId, ElderPublicKey, ElderSignature, Timestamp};

/// One Elder's detached signature over a canonical header.
///
/// `elder_id` is advisory; deduplication and validity are judged by
/// `signer`, the public key that actually verifies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleSignature {
    pub elder_id: ElderId,
    /// Base64 raw Ed25519 public key.
    pub signer: ElderPublicKey,
    /// Base64 detached signature.
    pub signature: ElderSignature,
    pub signed_at: Timestamp,
}

/// The m-of-n policy an envelope was produced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumPolicy {
    pub m: u32,
    pub n: u32,
}

/// An ordered set of independent signatures plus the policy they target.
///
/// The service returns whatever was collected, even below `m`; callers
/// decide what to do with sub-quorum envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuorumEnvelope {
    pub signatures: Vec<SingleSignature>,
    pub policy: QuorumPolicy,
}

impl QuorumEnvelope {
    pub fn signer_ids(&self) -> Vec<&ElderId> {
        self.signatures.iter().map(|s| &s.elder_id).collect()
    }
}

/// Result of verifying an envelope against canonical header bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub valid: bool,
    /// Advisory ids of signers whose signatures verified, first-seen order,
    /// one entry per distinct public key.
    pub valid_signers: Vec<ElderId>,
    pub required_m: u32,
    pub total_distinct: u32,
}
