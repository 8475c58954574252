//! drp-quorum
//!
//! m-of-n multi-signature service over canonicalized block headers.
//!
//! Each Elder signs independently with Ed25519; a quorum is at least `m`
//! distinct verifying signers over the same canonical bytes. This is a
//! simple multi-signature by design, not an aggregated threshold scheme;
//! upgrading to BLS-style threshold signatures is a separate protocol
//! change.

pub mod committee;
pub mod envelope;
pub mod service;

pub use committee::{Committee, ElderRecord};
pub use envelope::{QuorumEnvelope, QuorumPolicy, SingleSignature, VerifyReport};
pub use service::{CommitteeView, ElderSummary, QuorumConfig, QuorumService};
