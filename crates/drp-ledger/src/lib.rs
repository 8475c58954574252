//! drp-ledger
//!
//! Append-only decision ledger and dispute oversight.
//!
//! Every recorded decision carries a hash commitment of its input, an
//! operator signature over the canonical record JSON, and content
//! addresses of encrypted explanation artifacts. Records are immutable
//! once written; disputes run a monotonic review lifecycle over them.

pub mod artifacts;
pub mod disputes;
pub mod ledger;
pub mod retry;
pub mod store;

pub use artifacts::{ArtifactPipeline, ArtifactStore, MemoryArtifactStore};
pub use disputes::{AgreementStats, OversightEvent, OversightManager};
pub use ledger::{DecisionFilter, DecisionLedger, DecisionStats};
pub use store::LedgerDb;
