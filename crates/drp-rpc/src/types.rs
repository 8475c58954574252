use serde::{Deserialize, Serialize};

use drp_core::decision::{InputType, Outcome};
use drp_core::dispute::DisputeCategory;
use drp_core::header::BlockHeader;
use drp_quorum::QuorumEnvelope;

/// Request body for `drp_signBlock`.
///
/// Omitting `elder_ids` selects every active elder. `deadline_ms` bounds
/// the whole signing round; on expiry a partial envelope is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSignRequest {
    pub header: BlockHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elder_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

/// Request body for `drp_verifyQuorum`. The caller supplies the exact
/// canonical header string the envelope was signed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcVerifyRequest {
    pub header_canonical: String,
    pub quorum: QuorumEnvelope,
}

/// Condensed `decide` result: the fields a caller needs to reference and
/// re-verify the record later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcDecideResponse {
    pub decision_id: String,
    pub outcome: Outcome,
    pub confidence: f64,
    pub explanation_cid: Option<String>,
    pub explanation_png_cid: Option<String>,
    pub zk_proof_cid: Option<String>,
    pub signature: String,
    pub timestamp: String,
}

/// Request body for `drp_openDispute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcDisputeInput {
    pub decision_id: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<DisputeCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcDisputeOpened {
    pub ok: bool,
    pub dispute_id: String,
}

/// Filter + paging for `drp_listDecisions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcDecisionQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<InputType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

/// Contact points of the external wide-column store, surfaced for
/// operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcStoreContact {
    pub host: String,
    pub port: u16,
}

/// Liveness report returned by `drp_health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcHealth {
    pub status: String,
    /// ISO-8601 UTC server time.
    pub time: String,
    pub n: u32,
    pub m: u32,
    pub store: RpcStoreContact,
    pub decisions: u64,
    pub disputes: u64,
}
