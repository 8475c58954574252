use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use drp_core::header::BlockHeader;
use drp_core::types::{ElderId, ElderPublicKey, ElderSignature, ElderStatus};
use drp_core::DrpError;
use drp_crypto::ed25519::SignatureError;
use drp_crypto::{fingerprint, verify_signature, ElderKeyPair, Signer};
use drp_keystore::Keystore;

use crate::committee::{Committee, ElderRecord};
use crate::envelope::{QuorumEnvelope, QuorumPolicy, SingleSignature, VerifyReport};

/// Committee sizing. `m` distinct valid signatures make a quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumConfig {
    pub n: u32,
    pub m: u32,
}

impl QuorumConfig {
    /// Boot-time arithmetic check; the service refuses to start otherwise.
    pub fn validate(&self) -> Result<(), DrpError> {
        if self.n == 0 {
            return Err(DrpError::PreconditionFailed(
                "committee size n must be at least 1".into(),
            ));
        }
        if self.m == 0 {
            return Err(DrpError::PreconditionFailed(
                "quorum threshold m must be at least 1".into(),
            ));
        }
        if self.m > self.n {
            return Err(DrpError::PreconditionFailed(format!(
                "quorum threshold m={} cannot exceed committee size n={}",
                self.m, self.n
            )));
        }
        Ok(())
    }

    /// The usual Byzantine choice: `⌊2n/3⌋ + 1`.
    pub fn byzantine_threshold(n: u32) -> u32 {
        (2 * n) / 3 + 1
    }
}

/// Committee summary for the query surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElderSummary {
    pub elder_id: ElderId,
    pub public_key_b64: String,
    /// First 16 hex chars of SHA-256(public key).
    pub fingerprint: String,
    pub status: ElderStatus,
    pub reputation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteeView {
    pub n: u32,
    pub m: u32,
    pub elders: Vec<ElderSummary>,
}

struct Inner {
    committee: Committee,
    signers: HashMap<ElderId, Arc<dyn Signer>>,
}

/// The Elder quorum service: owns the committee, the keystore handle, and
/// the m-of-n policy. Instantiated once at process init and passed
/// explicitly.
pub struct QuorumService {
    config: QuorumConfig,
    keystore: Arc<Keystore>,
    inner: RwLock<Inner>,
}

impl QuorumService {
    /// Load (or create) `n` elders from the keystore and build the
    /// committee. Fails fast on invalid quorum arithmetic.
    pub fn init(config: QuorumConfig, keystore: Arc<Keystore>) -> Result<Self, DrpError> {
        config.validate()?;

        let now = chrono::Utc::now().timestamp();
        let mut committee = Committee::new();
        let mut signers: HashMap<ElderId, Arc<dyn Signer>> = HashMap::new();

        for index in 0..config.n {
            let kp = keystore.load_or_create_elder(index)?;
            let elder_id = ElderId::from_index(index);
            committee.register(ElderRecord::new(elder_id.clone(), kp.public_key(), now))?;
            signers.insert(elder_id, Arc::new(kp));
        }

        info!(n = config.n, m = config.m, "elder committee initialized");
        Ok(Self {
            config,
            keystore,
            inner: RwLock::new(Inner { committee, signers }),
        })
    }

    pub fn config(&self) -> QuorumConfig {
        self.config
    }

    /// Committee listing with fingerprints, for the query surface.
    pub async fn list_elders(&self) -> CommitteeView {
        let inner = self.inner.read().await;
        let elders = inner
            .committee
            .iter()
            .map(|m| ElderSummary {
                elder_id: m.elder_id.clone(),
                public_key_b64: m.public_key.to_b64(),
                fingerprint: fingerprint(&m.public_key),
                status: m.status,
                reputation: m.reputation,
            })
            .collect();
        CommitteeView {
            n: self.config.n,
            m: self.config.m,
            elders,
        }
    }

    /// Collect signatures over `header` from the selected elders.
    ///
    /// With no explicit selection, every `active` elder signs. Elders are
    /// visited in lexicographic id order and the envelope preserves that
    /// order regardless of task completion order. A single elder's failure
    /// (or the deadline expiring) shrinks the envelope instead of failing
    /// the call; reaching `m` is the caller's concern.
    pub async fn sign_block(
        &self,
        header: &BlockHeader,
        elder_ids: Option<&[ElderId]>,
        deadline: Option<Duration>,
    ) -> Result<QuorumEnvelope, DrpError> {
        header.validate()?;
        let canonical: Arc<Vec<u8>> = Arc::new(header.canonical_bytes());

        // Resolve the selection under the read lock; signing itself runs
        // without any lock held.
        let selected: Vec<(ElderId, Arc<dyn Signer>)> = {
            let inner = self.inner.read().await;
            let ids: Vec<ElderId> = match elder_ids {
                Some(requested) => {
                    let unique: BTreeSet<ElderId> = requested.iter().cloned().collect();
                    for id in &unique {
                        let member = inner
                            .committee
                            .get(id)
                            .ok_or_else(|| DrpError::not_found("elder", id.to_string()))?;
                        if member.status != ElderStatus::Active {
                            return Err(DrpError::UnauthorizedAction(format!(
                                "elder {id} is {} and cannot sign",
                                member.status
                            )));
                        }
                    }
                    unique.into_iter().collect()
                }
                None => inner.committee.active_ids(),
            };
            ids.into_iter()
                .filter_map(|id| inner.signers.get(&id).map(|s| (id, Arc::clone(s))))
                .collect()
        };

        // Fan out one signing task per elder.
        type SignTask = (
            ElderId,
            ElderPublicKey,
            JoinHandle<Result<ElderSignature, SignatureError>>,
        );
        let tasks: Vec<SignTask> = selected
            .into_iter()
            .map(|(id, signer)| {
                let bytes = Arc::clone(&canonical);
                let pubkey = signer.public_key();
                let handle = tokio::spawn(async move { signer.try_sign(&bytes) });
                (id, pubkey, handle)
            })
            .collect();

        let expiry = deadline.map(|d| Instant::now() + d);
        let mut signatures = Vec::new();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for (elder_id, signer_key, handle) in tasks {
            let outcome = match expiry {
                Some(at) => {
                    let remaining = at.saturating_duration_since(Instant::now());
                    match tokio::time::timeout(remaining, handle).await {
                        Ok(join) => join,
                        Err(_) => {
                            warn!(%elder_id, "deadline expired; returning partial envelope");
                            failed.push(elder_id);
                            continue;
                        }
                    }
                }
                None => handle.await,
            };

            match outcome {
                Ok(Ok(signature)) => {
                    signatures.push(SingleSignature {
                        elder_id: elder_id.clone(),
                        signer: signer_key,
                        signature,
                        signed_at: chrono::Utc::now().timestamp(),
                    });
                    succeeded.push(elder_id);
                }
                Ok(Err(e)) => {
                    warn!(%elder_id, error = %e, "elder failed to sign; continuing without it");
                    failed.push(elder_id);
                }
                Err(e) => {
                    warn!(%elder_id, error = %e, "signing task aborted; continuing without it");
                    failed.push(elder_id);
                }
            }
        }

        {
            let now = chrono::Utc::now().timestamp();
            let mut inner = self.inner.write().await;
            for id in &succeeded {
                inner.committee.note_success(id, now);
            }
            for id in &failed {
                inner.committee.note_failure(id);
            }
        }

        Ok(QuorumEnvelope {
            signatures,
            policy: QuorumPolicy {
                m: self.config.m,
                n: self.config.n,
            },
        })
    }

    /// Verify every signature in `envelope` against `canonical` bytes.
    ///
    /// Pure CPU; runs to completion. Signers are deduplicated by public
    /// key (ids are advisory), and keys belonging to slashed elders never
    /// count.
    pub async fn verify_quorum(&self, canonical: &[u8], envelope: &QuorumEnvelope) -> VerifyReport {
        let inner = self.inner.read().await;
        let mut seen: BTreeSet<ElderPublicKey> = BTreeSet::new();
        let mut valid_signers = Vec::new();

        for sig in &envelope.signatures {
            if verify_signature(&sig.signer, canonical, &sig.signature).is_err() {
                continue;
            }
            if let Some(member) = inner.committee.find_by_public_key(&sig.signer) {
                if member.status == ElderStatus::Slashed {
                    warn!(elder_id = %sig.elder_id, "signature from slashed elder rejected");
                    continue;
                }
            }
            if seen.insert(sig.signer.clone()) {
                valid_signers.push(sig.elder_id.clone());
            }
        }

        let total_distinct = seen.len() as u32;
        VerifyReport {
            valid: total_distinct >= self.config.m,
            valid_signers,
            required_m: self.config.m,
            total_distinct,
        }
    }

    /// Rotate an elder's key material.
    ///
    /// The member transitions `active → rotating`; after the keystore
    /// write and a sign/self-verify probe it returns to `active`, or lands
    /// `inactive` on any failure. Historical records are untouched.
    pub async fn rotate_elder(&self, elder_id: &ElderId) -> Result<(), DrpError> {
        {
            let mut inner = self.inner.write().await;
            let member = inner
                .committee
                .get_mut(elder_id)
                .ok_or_else(|| DrpError::not_found("elder", elder_id.to_string()))?;
            if member.status == ElderStatus::Slashed {
                return Err(DrpError::PreconditionFailed(format!(
                    "elder {elder_id} is slashed and cannot rotate"
                )));
            }
            member.status = ElderStatus::Rotating;
        }

        let fresh = ElderKeyPair::generate();
        if let Err(e) = self.keystore.rotate(elder_id, &fresh) {
            self.set_status(elder_id, ElderStatus::Inactive).await;
            return Err(e.into());
        }

        // Verification probe before the new key goes live.
        let probe = b"drp-rotation-probe";
        let probe_ok = fresh
            .try_sign(probe)
            .map(|sig| verify_signature(&fresh.public_key(), probe, &sig).is_ok())
            .unwrap_or(false);
        if !probe_ok {
            warn!(%elder_id, "rotation probe failed; elder marked inactive");
            self.set_status(elder_id, ElderStatus::Inactive).await;
            return Err(DrpError::InfrastructureUnavailable(format!(
                "rotation probe failed for {elder_id}"
            )));
        }

        let mut inner = self.inner.write().await;
        if let Some(member) = inner.committee.get_mut(elder_id) {
            member.public_key = fresh.public_key();
            member.status = ElderStatus::Active;
        }
        inner.signers.insert(elder_id.clone(), Arc::new(fresh));
        info!(%elder_id, "elder rotated to fresh key material");
        Ok(())
    }

    /// Permanently exclude an elder for this process lifetime.
    ///
    /// Its key is dropped from the signer set and any of its signatures in
    /// later envelopes is treated as invalid. Historical decision records
    /// are not altered.
    pub async fn revoke_elder(&self, elder_id: &ElderId, reason: &str) -> Result<(), DrpError> {
        let mut inner = self.inner.write().await;
        let member = inner
            .committee
            .get_mut(elder_id)
            .ok_or_else(|| DrpError::not_found("elder", elder_id.to_string()))?;
        if member.status == ElderStatus::Slashed {
            return Err(DrpError::PreconditionFailed(format!(
                "elder {elder_id} is already slashed"
            )));
        }
        member.status = ElderStatus::Slashed;
        inner.signers.remove(elder_id);
        warn!(%elder_id, reason, "elder revoked");
        Ok(())
    }

    /// Background reconciliation pass.
    ///
    /// Members stuck in `rotating` are re-probed with their current signer
    /// and settled to `active` or `inactive`. Returns the number of
    /// currently active members so the caller can log committee health
    /// against the quorum threshold.
    pub async fn reconcile(&self) -> u32 {
        let mut inner = self.inner.write().await;
        let stuck: Vec<ElderId> = inner
            .committee
            .iter()
            .filter(|m| m.status == ElderStatus::Rotating)
            .map(|m| m.elder_id.clone())
            .collect();

        for elder_id in stuck {
            let probe = b"drp-reconcile-probe";
            let settled = inner
                .signers
                .get(&elder_id)
                .and_then(|s| s.try_sign(probe).ok().map(|sig| (s.public_key(), sig)))
                .map(|(pk, sig)| verify_signature(&pk, probe, &sig).is_ok())
                .unwrap_or(false);
            let status = if settled {
                ElderStatus::Active
            } else {
                ElderStatus::Inactive
            };
            warn!(%elder_id, ?status, "settled elder stuck in rotation");
            if let Some(member) = inner.committee.get_mut(&elder_id) {
                member.status = status;
            }
        }

        inner.committee.active_ids().len() as u32
    }

    async fn set_status(&self, elder_id: &ElderId, status: ElderStatus) {
        let mut inner = self.inner.write().await;
        if let Some(member) = inner.committee.get_mut(elder_id) {
            member.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis_header() -> BlockHeader {
        BlockHeader {
            index: 0,
            previous_hash: "0".into(),
            timestamp: 1_735_142_096,
            merkle_root: String::new(),
            data_hash: String::new(),
            miner_id: "genesis".into(),
            nonce: 0,
            difficulty: 0,
        }
    }

    fn service(tag: &str, n: u32, m: u32) -> QuorumService {
        let dir = std::env::temp_dir().join(format!("drp_quorum_{tag}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let keystore = Arc::new(Keystore::open(dir, Some(format!("seed-{tag}"))).unwrap());
        QuorumService::init(QuorumConfig { n, m }, keystore).unwrap()
    }

    fn ids(raw: &[&str]) -> Vec<ElderId> {
        raw.iter().map(|s| ElderId::from(*s)).collect()
    }

    #[test]
    fn boot_rejects_bad_quorum_arithmetic() {
        assert!(QuorumConfig { n: 5, m: 6 }.validate().is_err());
        assert!(QuorumConfig { n: 5, m: 0 }.validate().is_err());
        assert!(QuorumConfig { n: 0, m: 1 }.validate().is_err());
        assert!(QuorumConfig { n: 5, m: 5 }.validate().is_ok());
    }

    #[test]
    fn byzantine_threshold_formula() {
        assert_eq!(QuorumConfig::byzantine_threshold(5), 4);
        assert_eq!(QuorumConfig::byzantine_threshold(21), 15);
    }

    #[tokio::test]
    async fn single_elder_genesis_signing() {
        let svc = service("s1", 1, 1);
        let header = genesis_header();
        let envelope = svc.sign_block(&header, None, None).await.unwrap();
        assert_eq!(envelope.signatures.len(), 1);
        assert_eq!(envelope.signatures[0].elder_id.as_str(), "elder-0");

        let report = svc.verify_quorum(&header.canonical_bytes(), &envelope).await;
        assert!(report.valid);
        assert_eq!(report.valid_signers, ids(&["elder-0"]));
        assert_eq!(report.required_m, 1);
        assert_eq!(report.total_distinct, 1);
    }

    #[tokio::test]
    async fn three_of_five_quorum_in_selection_order() {
        let svc = service("s2", 5, 3);
        let header = genesis_header();
        let selection = ids(&["elder-0", "elder-2", "elder-4"]);
        let envelope = svc
            .sign_block(&header, Some(&selection), None)
            .await
            .unwrap();
        assert_eq!(
            envelope.signer_ids(),
            selection.iter().collect::<Vec<_>>(),
            "envelope must preserve selection order"
        );
        assert_eq!(envelope.policy, QuorumPolicy { m: 3, n: 5 });

        let report = svc.verify_quorum(&header.canonical_bytes(), &envelope).await;
        assert!(report.valid);
        assert_eq!(report.valid_signers, selection);
    }

    #[tokio::test]
    async fn sub_quorum_envelope_is_returned_but_invalid() {
        let svc = service("s3", 5, 3);
        let header = genesis_header();
        let envelope = svc
            .sign_block(&header, Some(&ids(&["elder-0", "elder-1"])), None)
            .await
            .unwrap();
        assert_eq!(envelope.signatures.len(), 2);

        let report = svc.verify_quorum(&header.canonical_bytes(), &envelope).await;
        assert!(!report.valid);
        assert_eq!(report.valid_signers, ids(&["elder-0", "elder-1"]));
        assert_eq!(report.required_m, 3);
        assert_eq!(report.total_distinct, 2);
    }

    #[tokio::test]
    async fn duplicate_signer_never_raises_distinct_count() {
        let svc = service("dedup", 3, 2);
        let header = genesis_header();
        let mut envelope = svc
            .sign_block(&header, Some(&ids(&["elder-0"])), None)
            .await
            .unwrap();
        let dup = envelope.signatures[0].clone();
        envelope.signatures.push(dup);

        let report = svc.verify_quorum(&header.canonical_bytes(), &envelope).await;
        assert_eq!(report.total_distinct, 1);
        assert!(!report.valid);
    }

    #[tokio::test]
    async fn quorum_is_monotonic_in_m() {
        // The same keystore (same keys) behind a strict and a lax policy.
        let dir = std::env::temp_dir().join(format!("drp_quorum_mono_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let keystore = Arc::new(Keystore::open(&dir, Some("seed-mono".into())).unwrap());
        let strict = QuorumService::init(QuorumConfig { n: 5, m: 3 }, Arc::clone(&keystore)).unwrap();
        let lax = QuorumService::init(QuorumConfig { n: 5, m: 1 }, keystore).unwrap();

        let header = genesis_header();
        let envelope = strict.sign_block(&header, None, None).await.unwrap();

        assert!(strict.verify_quorum(&header.canonical_bytes(), &envelope).await.valid);
        assert!(lax.verify_quorum(&header.canonical_bytes(), &envelope).await.valid);
    }

    #[tokio::test]
    async fn m_equals_n_requires_every_elder() {
        let svc = service("full", 3, 3);
        let header = genesis_header();
        let mut envelope = svc.sign_block(&header, None, None).await.unwrap();
        assert!(svc.verify_quorum(&header.canonical_bytes(), &envelope).await.valid);

        envelope.signatures.pop();
        assert!(!svc.verify_quorum(&header.canonical_bytes(), &envelope).await.valid);
    }

    #[tokio::test]
    async fn unknown_elder_selection_fails() {
        let svc = service("unknown", 2, 1);
        let err = svc
            .sign_block(&genesis_header(), Some(&ids(&["elder-9"])), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DrpError::NotFound { .. }));
    }

    #[tokio::test]
    async fn inactive_elder_selection_is_unauthorized() {
        let svc = service("inactive", 2, 1);
        svc.set_status(&ElderId::from_index(1), ElderStatus::Inactive)
            .await;
        let err = svc
            .sign_block(&genesis_header(), Some(&ids(&["elder-1"])), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DrpError::UnauthorizedAction(_)));
    }

    #[tokio::test]
    async fn revoked_elder_is_excluded_and_its_signatures_rejected() {
        let svc = service("revoke", 3, 1);
        let header = genesis_header();

        // Sign before revocation so the envelope carries elder-1's key.
        let before = svc
            .sign_block(&header, Some(&ids(&["elder-1"])), None)
            .await
            .unwrap();

        svc.revoke_elder(&ElderId::from_index(1), "misbehavior")
            .await
            .unwrap();

        // Excluded from default selection.
        let after = svc.sign_block(&header, None, None).await.unwrap();
        assert!(!after.signer_ids().iter().any(|id| id.as_str() == "elder-1"));

        // Old signatures from the slashed key no longer count.
        let report = svc.verify_quorum(&header.canonical_bytes(), &before).await;
        assert_eq!(report.total_distinct, 0);
        assert!(!report.valid);

        // Revocation is terminal.
        assert!(matches!(
            svc.revoke_elder(&ElderId::from_index(1), "again").await,
            Err(DrpError::PreconditionFailed(_))
        ));
    }

    #[tokio::test]
    async fn rotation_swaps_key_and_returns_to_active() {
        let svc = service("rotate", 2, 1);
        let old_key = svc.list_elders().await.elders[0].public_key_b64.clone();

        svc.rotate_elder(&ElderId::from_index(0)).await.unwrap();

        let view = svc.list_elders().await;
        assert_ne!(view.elders[0].public_key_b64, old_key);
        assert_eq!(view.elders[0].status, ElderStatus::Active);

        // The fresh key signs and verifies.
        let header = genesis_header();
        let envelope = svc
            .sign_block(&header, Some(&ids(&["elder-0"])), None)
            .await
            .unwrap();
        assert!(svc.verify_quorum(&header.canonical_bytes(), &envelope).await.valid);
    }

    #[tokio::test]
    async fn failing_signer_shrinks_envelope_instead_of_failing() {
        struct FailingSigner(ElderPublicKey);
        impl Signer for FailingSigner {
            fn public_key(&self) -> ElderPublicKey {
                self.0.clone()
            }
            fn try_sign(&self, _message: &[u8]) -> Result<ElderSignature, SignatureError> {
                Err(SignatureError::InvalidSignature)
            }
        }

        let svc = service("partial", 3, 2);
        {
            let mut inner = svc.inner.write().await;
            let pk = inner
                .committee
                .get(&ElderId::from_index(1))
                .unwrap()
                .public_key
                .clone();
            inner
                .signers
                .insert(ElderId::from_index(1), Arc::new(FailingSigner(pk)));
        }

        let header = genesis_header();
        let envelope = svc.sign_block(&header, None, None).await.unwrap();
        let signers: Vec<&str> = envelope.signer_ids().iter().map(|i| i.as_str()).collect();
        assert_eq!(signers, vec!["elder-0", "elder-2"]);

        let report = svc.verify_quorum(&header.canonical_bytes(), &envelope).await;
        assert!(report.valid);

        // The failure is reflected in reputation.
        let view = svc.list_elders().await;
        let failed = view
            .elders
            .iter()
            .find(|e| e.elder_id.as_str() == "elder-1")
            .unwrap();
        assert!(failed.reputation < 1.0);
    }

    #[tokio::test]
    async fn envelope_wire_form_uses_base64() {
        let svc = service("wire", 1, 1);
        let envelope = svc.sign_block(&genesis_header(), None, None).await.unwrap();
        let json = serde_json::to_value(&envelope).unwrap();
        let sig = &json["signatures"][0];
        assert!(sig["signer"].is_string());
        assert!(sig["signature"].is_string());
        assert_eq!(json["policy"]["m"], 1);
    }
}
