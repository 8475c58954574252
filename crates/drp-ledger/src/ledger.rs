use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use drp_core::constants::MAX_PAGE_LIMIT;
use drp_core::decision::{DecideInput, DecisionRecord, InputType, Outcome};
use drp_core::DrpError;
use drp_crypto::{verify_signature, ElderKeyPair};

use crate::artifacts::{build_explanation, build_zk_placeholder, render_chart_svg, ArtifactPipeline};
use crate::retry::retry_read;
use crate::store::LedgerDb;

/// Optional filters for listing decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<InputType>,
}

/// Aggregate ledger statistics over an optional trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionStats {
    pub total: u64,
    pub approved: u64,
    pub flagged: u64,
    pub denied: u64,
    pub mean_confidence: f64,
    pub mean_processing_ms: f64,
}

/// The append-only decision ledger.
///
/// Owns the operator signing key (separate from Elder committee keys) and
/// the artifact pipeline. Insertion is at-most-once per decision id; a
/// failed `decide` leaves no partial state behind.
pub struct DecisionLedger {
    db: Arc<LedgerDb>,
    operator: ElderKeyPair,
    artifacts: ArtifactPipeline,
    processing_micros: AtomicU64,
    processed: AtomicU64,
}

fn new_decision_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl DecisionLedger {
    pub fn new(db: Arc<LedgerDb>, operator: ElderKeyPair, artifacts: ArtifactPipeline) -> Self {
        Self {
            db,
            operator,
            artifacts,
            processing_micros: AtomicU64::new(0),
            processed: AtomicU64::new(0),
        }
    }

    /// Hex of the operator public key, as recorded in `elder_pub`.
    pub fn operator_pub_hex(&self) -> String {
        self.operator.public_key().to_hex()
    }

    /// Record a model decision: build and pin artifacts, sign the
    /// canonical record, persist it.
    ///
    /// Artifact failures degrade to null CIDs; a persistence failure fails
    /// the whole call and the decision is NOT committed.
    pub async fn decide(&self, input: DecideInput) -> Result<DecisionRecord, DrpError> {
        let started = Instant::now();
        input.validate()?;

        let decision_id = new_decision_id();
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        // Explanation artifact: envelope around the top-factor core. The
        // raw features never leave this function.
        let explanation = build_explanation(input.features.as_ref());
        let explanation_doc = json!({
            "model_id": input.model_id,
            "model_version": input.model_version,
            "input_commitment": input.input_commitment,
            "explanation": explanation,
            "timestamp": timestamp,
        });
        let explanation_cid = self.artifacts.encrypt_and_pin(
            &decision_id,
            "explanation",
            explanation_doc.to_string().as_bytes(),
        );

        // Chart blob is best-effort.
        let explanation_png_cid = render_chart_svg(&explanation)
            .and_then(|svg| self.artifacts.encrypt_and_pin(&decision_id, "chart", &svg));

        let zk = build_zk_placeholder(input.confidence, &decision_id, &timestamp);
        let zk_proof_cid =
            self.artifacts
                .encrypt_and_pin(&decision_id, "zk_proof", zk.to_string().as_bytes());

        let mut record = DecisionRecord {
            decision_id: decision_id.clone(),
            model_id: input.model_id,
            model_version: input.model_version,
            input_type: input.input_type,
            input_commitment: input.input_commitment,
            outcome: input.decision,
            confidence: input.confidence,
            explanation_cid,
            explanation_png_cid,
            zk_proof_cid,
            elder_pub: self.operator_pub_hex(),
            signature: String::new(),
            timestamp,
        };
        record.signature = self.operator.sign(&record.signing_bytes()).to_hex();

        // Non-idempotent write: no internal retry, the caller decides.
        self.db.insert_decision_if_absent(&record)?;

        let elapsed = started.elapsed().as_micros() as u64;
        self.processing_micros.fetch_add(elapsed, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);

        info!(
            decision_id = %record.decision_id,
            outcome = %record.outcome,
            confidence = record.confidence,
            "decision recorded"
        );
        Ok(record)
    }

    /// Fetch a record by id. Only CIDs are returned, never artifact
    /// plaintext (the ledger never held it).
    pub async fn get_decision(&self, decision_id: &str) -> Result<DecisionRecord, DrpError> {
        retry_read("get_decision", || self.db.get_decision(decision_id))
            .await?
            .ok_or_else(|| DrpError::not_found("decision", decision_id))
    }

    /// Newest-first page of records matching `filter`.
    pub async fn list_decisions(
        &self,
        filter: &DecisionFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<DecisionRecord>, DrpError> {
        let limit = limit.min(MAX_PAGE_LIMIT) as usize;
        let mut records = retry_read("list_decisions", || self.db.iter_decisions()).await?;

        records.retain(|r| {
            filter.model_id.as_ref().map_or(true, |m| &r.model_id == m)
                && filter.outcome.map_or(true, |o| r.outcome == o)
                && filter.input_type.map_or(true, |t| r.input_type == t)
        });
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records
            .into_iter()
            .skip(offset as usize)
            .take(limit)
            .collect())
    }

    /// Aggregate counts and means, optionally restricted to the trailing
    /// `window_secs`.
    pub async fn aggregate_stats(&self, window_secs: Option<i64>) -> Result<DecisionStats, DrpError> {
        let records = retry_read("aggregate_stats", || self.db.iter_decisions()).await?;
        let cutoff = window_secs.map(|w| Utc::now().timestamp() - w);

        let mut total = 0u64;
        let mut approved = 0u64;
        let mut flagged = 0u64;
        let mut denied = 0u64;
        let mut confidence_sum = 0.0;

        for record in &records {
            if let Some(cutoff) = cutoff {
                let in_window = DateTime::parse_from_rfc3339(&record.timestamp)
                    .map(|t| t.timestamp() >= cutoff)
                    .unwrap_or(false);
                if !in_window {
                    continue;
                }
            }
            total += 1;
            confidence_sum += record.confidence;
            match record.outcome {
                Outcome::Approved => approved += 1,
                Outcome::Flagged => flagged += 1,
                Outcome::Denied => denied += 1,
            }
        }

        let processed = self.processed.load(Ordering::Relaxed);
        let mean_processing_ms = if processed > 0 {
            self.processing_micros.load(Ordering::Relaxed) as f64 / processed as f64 / 1000.0
        } else {
            0.0
        };

        Ok(DecisionStats {
            total,
            approved,
            flagged,
            denied,
            mean_confidence: if total > 0 {
                confidence_sum / total as f64
            } else {
                0.0
            },
            mean_processing_ms,
        })
    }

    /// Re-check the operator signature on a stored record.
    pub fn verify_record(record: &DecisionRecord) -> bool {
        let Ok(pubkey) = drp_core::types::ElderPublicKey::from_hex(&record.elder_pub) else {
            return false;
        };
        let Ok(sig_bytes) = hex::decode(&record.signature) else {
            return false;
        };
        verify_signature(
            &pubkey,
            &record.signing_bytes(),
            &drp_core::types::ElderSignature(sig_bytes),
        )
        .is_ok()
    }

    pub fn db(&self) -> &Arc<LedgerDb> {
        &self.db
    }
}
