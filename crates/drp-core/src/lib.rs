pub mod claims;
pub mod constants;
pub mod decision;
pub mod dispute;
pub mod error;
pub mod header;
pub mod types;

pub use claims::{ActivityClaim, ActivityEvidence, Verdict, VerdictKind};
pub use constants::*;
pub use decision::{DecideInput, DecisionRecord, InputType, Outcome};
pub use dispute::{DisputeCase, DisputeCategory, DisputeStatus, ReviewVote};
pub use error::DrpError;
pub use header::BlockHeader;
pub use types::*;
