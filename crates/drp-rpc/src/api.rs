use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use drp_core::claims::{ActivityClaim, Verdict};
use drp_core::decision::DecisionRecord;
use drp_core::dispute::{DisputeCase, DisputeStatus, ReviewVote};
use drp_ledger::{AgreementStats, DecisionStats};
use drp_quorum::{CommitteeView, QuorumEnvelope, VerifyReport};

use crate::types::{
    RpcDecideResponse, RpcDecisionQuery, RpcDisputeInput, RpcDisputeOpened, RpcHealth,
    RpcSignRequest, RpcVerifyRequest,
};

/// DRP JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "drp_" via `namespace = "drp"`.
#[rpc(server, namespace = "drp")]
pub trait DrpApi {
    /// List the elder committee: `n`, `m`, and per-elder public key,
    /// fingerprint, status and reputation.
    #[method(name = "listElders")]
    async fn list_elders(&self) -> RpcResult<CommitteeView>;

    /// Run the policy engine over an activity claim.
    #[method(name = "assessActivity")]
    async fn assess_activity(&self, claim: ActivityClaim) -> RpcResult<Verdict>;

    /// Collect elder signatures over a block header. Returns whatever was
    /// collected, tagged with the m-of-n policy; sub-quorum envelopes are
    /// the caller's problem.
    #[method(name = "signBlock")]
    async fn sign_block(&self, req: RpcSignRequest) -> RpcResult<QuorumEnvelope>;

    /// Verify an envelope against a canonical header string.
    #[method(name = "verifyQuorum")]
    async fn verify_quorum(&self, req: RpcVerifyRequest) -> RpcResult<VerifyReport>;

    /// Record a model decision; returns ids, CIDs and the operator
    /// signature.
    #[method(name = "decide")]
    async fn decide(&self, input: drp_core::decision::DecideInput) -> RpcResult<RpcDecideResponse>;

    /// Fetch a decision record by id. Artifact plaintext is never
    /// returned, only CIDs.
    #[method(name = "getDecision")]
    async fn get_decision(&self, decision_id: String) -> RpcResult<DecisionRecord>;

    /// Filtered, newest-first page of decision records (limit capped at
    /// 200).
    #[method(name = "listDecisions")]
    async fn list_decisions(&self, query: RpcDecisionQuery) -> RpcResult<Vec<DecisionRecord>>;

    /// Outcome counts and mean confidence, optionally over a trailing
    /// window in seconds.
    #[method(name = "aggregateStats")]
    async fn aggregate_stats(&self, window_secs: Option<i64>) -> RpcResult<DecisionStats>;

    /// Open a dispute against a recorded decision.
    #[method(name = "openDispute")]
    async fn open_dispute(&self, input: RpcDisputeInput) -> RpcResult<RpcDisputeOpened>;

    /// Fetch a dispute by id.
    #[method(name = "getDispute")]
    async fn get_dispute(&self, dispute_id: String) -> RpcResult<DisputeCase>;

    /// List disputes in a given lifecycle state.
    #[method(name = "listDisputes")]
    async fn list_disputes(&self, status: DisputeStatus) -> RpcResult<Vec<DisputeCase>>;

    /// Fix the reviewer set for an open dispute and move it into review.
    #[method(name = "assignReviewers")]
    async fn assign_reviewers(
        &self,
        dispute_id: String,
        reviewers: Vec<String>,
    ) -> RpcResult<DisputeCase>;

    /// Submit (or overwrite) one reviewer's vote; the completing vote
    /// resolves the dispute by majority.
    #[method(name = "submitVote")]
    async fn submit_vote(
        &self,
        dispute_id: String,
        reviewer_id: String,
        vote: ReviewVote,
    ) -> RpcResult<DisputeCase>;

    /// Close a resolved dispute (terminal).
    #[method(name = "closeDispute")]
    async fn close_dispute(&self, dispute_id: String) -> RpcResult<DisputeCase>;

    /// AI/human agreement summary across all disputes.
    #[method(name = "agreementStats")]
    async fn agreement_stats(&self) -> RpcResult<AgreementStats>;

    /// Rotate an elder to fresh key material (probe-verified).
    #[method(name = "rotateElder")]
    async fn rotate_elder(&self, elder_id: String) -> RpcResult<bool>;

    /// Permanently revoke an elder for this process lifetime.
    #[method(name = "revokeElder")]
    async fn revoke_elder(&self, elder_id: String, reason: String) -> RpcResult<bool>;

    /// Liveness, committee sizing, store contact points and record counts.
    #[method(name = "health")]
    async fn health(&self) -> RpcResult<RpcHealth>;
}
