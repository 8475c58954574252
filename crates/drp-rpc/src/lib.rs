//! drp-rpc
//!
//! JSON-RPC 2.0 server for the DRP core.
//!
//! Namespace: "drp"
//! Methods:
//!   drp_listElders       — committee listing with fingerprints and m/n
//!   drp_assessActivity   — run the policy engine over an activity claim
//!   drp_signBlock        — collect elder signatures over a block header
//!   drp_verifyQuorum     — validate an envelope against canonical bytes
//!   drp_decide           — record a signed model decision
//!   drp_getDecision      — fetch a decision record (CIDs only)
//!   drp_listDecisions    — filtered, paged decision listing
//!   drp_aggregateStats   — outcome counts and means
//!   drp_openDispute      — challenge a recorded decision
//!   drp_getDispute / drp_listDisputes / drp_agreementStats
//!   drp_assignReviewers / drp_submitVote / drp_closeDispute
//!   drp_rotateElder / drp_revokeElder
//!   drp_health           — liveness and store contact points

pub mod api;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerState};
pub use types::{
    RpcDecideResponse, RpcDecisionQuery, RpcDisputeInput, RpcDisputeOpened, RpcHealth,
    RpcSignRequest, RpcStoreContact, RpcVerifyRequest,
};
