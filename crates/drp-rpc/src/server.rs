use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use drp_core::claims::{ActivityClaim, Verdict};
use drp_core::decision::{DecideInput, DecisionRecord};
use drp_core::dispute::{DisputeCase, DisputeCategory, DisputeStatus, ReviewVote};
use drp_core::types::ElderId;
use drp_core::DrpError;
use drp_ledger::{AgreementStats, DecisionFilter, DecisionLedger, DecisionStats, OversightManager};
use drp_policy::PolicyEngine;
use drp_quorum::{CommitteeView, QuorumEnvelope, QuorumService, VerifyReport};

use crate::api::DrpApiServer;
use crate::types::{
    RpcDecideResponse, RpcDecisionQuery, RpcDisputeInput, RpcDisputeOpened, RpcHealth,
    RpcSignRequest, RpcStoreContact, RpcVerifyRequest,
};

/// Translate the core error taxonomy into JSON-RPC error codes.
fn rpc_err(e: DrpError) -> ErrorObject<'static> {
    let code = match &e {
        DrpError::InvalidInput(_) => -32602,
        DrpError::NotFound { .. } => -32001,
        DrpError::UnauthorizedAction(_) => -32002,
        DrpError::PreconditionFailed(_) => -32003,
        DrpError::InfrastructureUnavailable(_) => -32603,
    };
    ErrorObject::owned(code, e.to_string(), None::<()>)
}

/// Shared state passed to the RPC server.
pub struct RpcServerState {
    pub quorum: Arc<QuorumService>,
    pub ledger: Arc<DecisionLedger>,
    pub oversight: Arc<OversightManager>,
    pub policy: PolicyEngine,
    /// External wide-column contact points, reported via `drp_health`.
    pub store_contact: RpcStoreContact,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

#[async_trait]
impl DrpApiServer for RpcServer {
    async fn list_elders(&self) -> RpcResult<CommitteeView> {
        Ok(self.state.quorum.list_elders().await)
    }

    async fn assess_activity(&self, claim: ActivityClaim) -> RpcResult<Verdict> {
        let now = chrono::Utc::now().timestamp();
        Ok(self.state.policy.assess(&claim, now))
    }

    async fn sign_block(&self, req: RpcSignRequest) -> RpcResult<QuorumEnvelope> {
        let elder_ids: Option<Vec<ElderId>> = req
            .elder_ids
            .map(|ids| ids.iter().map(|s| ElderId::from(s.as_str())).collect());
        let deadline = req.deadline_ms.map(Duration::from_millis);

        self.state
            .quorum
            .sign_block(&req.header, elder_ids.as_deref(), deadline)
            .await
            .map_err(rpc_err)
    }

    async fn verify_quorum(&self, req: RpcVerifyRequest) -> RpcResult<VerifyReport> {
        Ok(self
            .state
            .quorum
            .verify_quorum(req.header_canonical.as_bytes(), &req.quorum)
            .await)
    }

    async fn decide(&self, input: DecideInput) -> RpcResult<RpcDecideResponse> {
        let record = self.state.ledger.decide(input).await.map_err(rpc_err)?;
        Ok(RpcDecideResponse {
            decision_id: record.decision_id,
            outcome: record.outcome,
            confidence: record.confidence,
            explanation_cid: record.explanation_cid,
            explanation_png_cid: record.explanation_png_cid,
            zk_proof_cid: record.zk_proof_cid,
            signature: record.signature,
            timestamp: record.timestamp,
        })
    }

    async fn get_decision(&self, decision_id: String) -> RpcResult<DecisionRecord> {
        self.state
            .ledger
            .get_decision(&decision_id)
            .await
            .map_err(rpc_err)
    }

    async fn list_decisions(&self, query: RpcDecisionQuery) -> RpcResult<Vec<DecisionRecord>> {
        let filter = DecisionFilter {
            model_id: query.model_id,
            outcome: query.outcome,
            input_type: query.input_type,
        };
        self.state
            .ledger
            .list_decisions(&filter, query.limit.unwrap_or(50), query.offset.unwrap_or(0))
            .await
            .map_err(rpc_err)
    }

    async fn aggregate_stats(&self, window_secs: Option<i64>) -> RpcResult<DecisionStats> {
        self.state
            .ledger
            .aggregate_stats(window_secs)
            .await
            .map_err(rpc_err)
    }

    async fn open_dispute(&self, input: RpcDisputeInput) -> RpcResult<RpcDisputeOpened> {
        let dispute = self
            .state
            .oversight
            .open_dispute(
                &input.decision_id,
                &input.reason,
                input.category.unwrap_or(DisputeCategory::Other),
                input.submitter_id.as_deref().unwrap_or("anonymous"),
            )
            .await
            .map_err(rpc_err)?;
        Ok(RpcDisputeOpened {
            ok: true,
            dispute_id: dispute.dispute_id,
        })
    }

    async fn get_dispute(&self, dispute_id: String) -> RpcResult<DisputeCase> {
        self.state
            .oversight
            .get_dispute(&dispute_id)
            .await
            .map_err(rpc_err)
    }

    async fn list_disputes(&self, status: DisputeStatus) -> RpcResult<Vec<DisputeCase>> {
        self.state
            .oversight
            .list_by_status(status)
            .await
            .map_err(rpc_err)
    }

    async fn assign_reviewers(
        &self,
        dispute_id: String,
        reviewers: Vec<String>,
    ) -> RpcResult<DisputeCase> {
        self.state
            .oversight
            .assign_reviewers(&dispute_id, &reviewers)
            .await
            .map_err(rpc_err)
    }

    async fn submit_vote(
        &self,
        dispute_id: String,
        reviewer_id: String,
        vote: ReviewVote,
    ) -> RpcResult<DisputeCase> {
        self.state
            .oversight
            .submit_vote(&dispute_id, &reviewer_id, vote)
            .await
            .map_err(rpc_err)
    }

    async fn close_dispute(&self, dispute_id: String) -> RpcResult<DisputeCase> {
        self.state
            .oversight
            .close(&dispute_id)
            .await
            .map_err(rpc_err)
    }

    async fn agreement_stats(&self) -> RpcResult<AgreementStats> {
        self.state
            .oversight
            .agreement_stats()
            .await
            .map_err(rpc_err)
    }

    async fn rotate_elder(&self, elder_id: String) -> RpcResult<bool> {
        self.state
            .quorum
            .rotate_elder(&ElderId::from(elder_id.as_str()))
            .await
            .map_err(rpc_err)?;
        Ok(true)
    }

    async fn revoke_elder(&self, elder_id: String, reason: String) -> RpcResult<bool> {
        self.state
            .quorum
            .revoke_elder(&ElderId::from(elder_id.as_str()), &reason)
            .await
            .map_err(rpc_err)?;
        Ok(true)
    }

    async fn health(&self) -> RpcResult<RpcHealth> {
        let config = self.state.quorum.config();
        Ok(RpcHealth {
            status: "ok".into(),
            time: chrono::Utc::now().to_rfc3339(),
            n: config.n,
            m: config.m,
            store: self.state.store_contact.clone(),
            decisions: self.state.ledger.db().count_decisions(),
            disputes: self.state.ledger.db().count_disputes(),
        })
    }
}
