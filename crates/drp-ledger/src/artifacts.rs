use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::warn;

use drp_core::constants::ZK_CONFIDENCE_THRESHOLD;
use drp_core::DrpError;
use drp_crypto::{sha256, sha256_hex};

/// Content-addressed artifact sink.
///
/// The real store is an external collaborator; the core only needs "pin
/// ciphertext, get back a CID". Plaintext never crosses this boundary.
pub trait ArtifactStore: Send + Sync {
    fn pin(&self, ciphertext: &[u8]) -> Result<String, DrpError>;
}

/// In-process store for development and tests. CIDs are the SHA-256 hex of
/// the pinned ciphertext.
#[derive(Default)]
pub struct MemoryArtifactStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cid: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(cid).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn pin(&self, ciphertext: &[u8]) -> Result<String, DrpError> {
        let cid = sha256_hex(ciphertext);
        self.blobs
            .lock()
            .unwrap()
            .insert(cid.clone(), ciphertext.to_vec());
        Ok(cid)
    }
}

// ── Artifact builders ─────────────────────────────────────────────────────────

/// Explanation core: top-5 features by absolute contribution, descending.
/// Without features the factor list is empty, never omitted.
pub fn build_explanation(features: Option<&BTreeMap<String, f64>>) -> Value {
    let mut top_factors = Vec::new();
    if let Some(features) = features {
        let mut ranked: Vec<(&String, &f64)> = features.iter().collect();
        ranked.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        top_factors = ranked
            .into_iter()
            .take(5)
            .map(|(feature, contribution)| json!({"feature": feature, "contribution": contribution}))
            .collect();
    }
    json!({"method": "heuristic", "top_factors": top_factors})
}

/// Placeholder proof artifact.
///
/// This is NOT a cryptographic proof: it restates the confidence against a
/// fixed threshold in the shape a future prover will fill in.
pub fn build_zk_placeholder(confidence: f64, decision_id: &str, ts: &str) -> Value {
    json!({
        "type": "confidence_threshold",
        "confidence": confidence,
        "threshold": ZK_CONFIDENCE_THRESHOLD,
        "valid": confidence >= ZK_CONFIDENCE_THRESHOLD,
        "decision_id": decision_id,
        "ts": ts,
    })
}

/// Render the explanation as a small SVG bar chart.
///
/// The blob format is implementation-defined; rendering is best-effort and
/// an empty factor list yields no chart.
pub fn render_chart_svg(explanation: &Value) -> Option<Vec<u8>> {
    let factors = explanation.get("top_factors")?.as_array()?;
    if factors.is_empty() {
        return None;
    }

    let bar_height = 18;
    let gap = 6;
    let width = 360;
    let height = factors.len() * (bar_height + gap) + gap;
    let max_abs = factors
        .iter()
        .filter_map(|f| f.get("contribution")?.as_f64())
        .map(f64::abs)
        .fold(0.0_f64, f64::max)
        .max(1e-9);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}">"#
    );
    for (i, factor) in factors.iter().enumerate() {
        let name = factor.get("feature")?.as_str()?;
        let value = factor.get("contribution")?.as_f64()?;
        let y = gap + i * (bar_height + gap);
        let len = (value.abs() / max_abs * 200.0).round() as u32;
        let fill = if value >= 0.0 { "#3b82f6" } else { "#ef4444" };
        svg.push_str(&format!(
            r#"<rect x="120" y="{y}" width="{len}" height="{bar_height}" fill="{fill}"/><text x="4" y="{}" font-size="11">{name}</text>"#,
            y + bar_height - 5,
        ));
    }
    svg.push_str("</svg>");
    Some(svg.into_bytes())
}

// ── Encrypt-and-pin pipeline ──────────────────────────────────────────────────

/// Encrypts artifacts with per-object derived keys and pins them.
///
/// Pinning is rate-limited; on saturation the caller gets `None` CIDs and
/// the decision records without artifacts. Artifacts are advisory, records
/// are authoritative.
pub struct ArtifactPipeline {
    store: Arc<dyn ArtifactStore>,
    master_key: [u8; 32],
    permits: Arc<Semaphore>,
}

impl ArtifactPipeline {
    pub fn new(store: Arc<dyn ArtifactStore>, master_key: [u8; 32], max_inflight: usize) -> Self {
        Self {
            store,
            master_key,
            permits: Arc::new(Semaphore::new(max_inflight)),
        }
    }

    fn derive_key(&self, decision_id: &str, kind: &str) -> [u8; 32] {
        let mut material = Vec::with_capacity(self.master_key.len() + decision_id.len() + kind.len() + 2);
        material.extend_from_slice(&self.master_key);
        material.push(b':');
        material.extend_from_slice(decision_id.as_bytes());
        material.push(b':');
        material.extend_from_slice(kind.as_bytes());
        sha256(&material)
    }

    /// Encrypt `plaintext` under a key derived for (`decision_id`, `kind`)
    /// and pin the ciphertext. Any failure is non-fatal and yields `None`.
    pub fn encrypt_and_pin(&self, decision_id: &str, kind: &str, plaintext: &[u8]) -> Option<String> {
        // Backpressure: skip pinning rather than block request processing.
        let _permit = match self.permits.try_acquire() {
            Ok(p) => p,
            Err(_) => {
                warn!(decision_id, kind, "artifact store saturated; skipping pin");
                return None;
            }
        };

        let key_bytes = self.derive_key(decision_id, kind);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
        // The key is unique per object, so a derived nonce is single-use.
        let nonce_material = sha256(format!("{decision_id}:{kind}:nonce").as_bytes());
        let nonce = Nonce::from_slice(&nonce_material[..12]);

        let ciphertext = match cipher.encrypt(nonce, plaintext) {
            Ok(ct) => ct,
            Err(e) => {
                warn!(decision_id, kind, error = %e, "artifact encryption failed");
                return None;
            }
        };

        match self.store.pin(&ciphertext) {
            Ok(cid) => Some(cid),
            Err(e) => {
                warn!(decision_id, kind, error = %e, "artifact pin failed; recording null CID");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn explanation_ranks_by_absolute_contribution() {
        let f = features(&[
            ("age", 0.1),
            ("blur", -0.9),
            ("light", 0.5),
            ("pose", -0.2),
            ("scale", 0.05),
            ("noise", 0.3),
        ]);
        let exp = build_explanation(Some(&f));
        let factors = exp["top_factors"].as_array().unwrap();
        assert_eq!(factors.len(), 5);
        assert_eq!(factors[0]["feature"], "blur");
        assert_eq!(factors[1]["feature"], "light");
        // The weakest feature fell off the top-5.
        assert!(!factors.iter().any(|f| f["feature"] == "scale"));
    }

    #[test]
    fn explanation_without_features_has_empty_factors() {
        let exp = build_explanation(None);
        assert_eq!(exp["method"], "heuristic");
        assert!(exp["top_factors"].as_array().unwrap().is_empty());
    }

    #[test]
    fn zk_placeholder_shape() {
        let zk = build_zk_placeholder(0.94, "abcd", "2026-01-01T00:00:00Z");
        assert_eq!(zk["type"], "confidence_threshold");
        assert_eq!(zk["threshold"], 0.8);
        assert_eq!(zk["valid"], true);
        let below = build_zk_placeholder(0.5, "abcd", "2026-01-01T00:00:00Z");
        assert_eq!(below["valid"], false);
    }

    #[test]
    fn chart_rendering_is_skipped_for_empty_factors() {
        assert!(render_chart_svg(&build_explanation(None)).is_none());
        let f = features(&[("blur", -0.9)]);
        let svg = render_chart_svg(&build_explanation(Some(&f))).unwrap();
        assert!(String::from_utf8(svg).unwrap().contains("blur"));
    }

    #[test]
    fn pinned_artifacts_are_ciphertext_not_plaintext() {
        let store = Arc::new(MemoryArtifactStore::new());
        let pipeline = ArtifactPipeline::new(Arc::clone(&store) as Arc<dyn ArtifactStore>, [7u8; 32], 4);
        let cid = pipeline
            .encrypt_and_pin("deadbeefdeadbeef", "explanation", b"secret factors")
            .unwrap();
        let stored = store.get(&cid).unwrap();
        assert_ne!(stored, b"secret factors".to_vec());
        assert!(!String::from_utf8_lossy(&stored).contains("secret"));
    }

    #[test]
    fn distinct_objects_get_distinct_keys() {
        let pipeline = ArtifactPipeline::new(Arc::new(MemoryArtifactStore::new()), [7u8; 32], 4);
        assert_ne!(
            pipeline.derive_key("id-1", "explanation"),
            pipeline.derive_key("id-1", "zk_proof")
        );
        assert_ne!(
            pipeline.derive_key("id-1", "explanation"),
            pipeline.derive_key("id-2", "explanation")
        );
    }

    #[test]
    fn saturation_skips_pinning() {
        let pipeline = ArtifactPipeline::new(Arc::new(MemoryArtifactStore::new()), [7u8; 32], 0);
        assert!(pipeline.encrypt_and_pin("id", "explanation", b"x").is_none());
    }
}
