use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::DrpError;

/// Committed input modality of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Image,
    Gps,
    Text,
    Sensor,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Image => "image",
            InputType::Gps => "gps",
            InputType::Text => "text",
            InputType::Sensor => "sensor",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Model decision outcome recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Approved,
    Flagged,
    Denied,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Approved => "approved",
            Outcome::Flagged => "flagged",
            Outcome::Denied => "denied",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input to the `decide` operation.
///
/// `input_commitment` is a hash binding to the upstream input; the raw
/// input never reaches the core. `features` feed only the explanation
/// artifact and are never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideInput {
    pub model_id: String,
    pub model_version: String,
    pub input_type: InputType,
    pub input_commitment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<BTreeMap<String, f64>>,
    pub confidence: f64,
    pub decision: Outcome,
}

impl DecideInput {
    pub fn validate(&self) -> Result<(), DrpError> {
        if self.model_id.is_empty() {
            return Err(DrpError::InvalidInput("model_id must be non-empty".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(DrpError::InvalidInput(format!(
                "confidence must be within [0, 1], got {}",
                self.confidence
            )));
        }
        if self.input_commitment.is_empty() || hex::decode(&self.input_commitment).is_err() {
            return Err(DrpError::InvalidInput(
                "input_commitment must be non-empty hex".into(),
            ));
        }
        Ok(())
    }
}

/// An immutable, operator-signed ledger entry.
///
/// The signature covers the canonical JSON of every field except
/// `signature` itself. CID fields are content addresses into the external
/// artifact store; plaintext artifacts never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// 16 hex chars of server-generated randomness.
    pub decision_id: String,
    pub model_id: String,
    pub model_version: String,
    pub input_type: InputType,
    pub input_commitment: String,
    pub outcome: Outcome,
    pub confidence: f64,
    pub explanation_cid: Option<String>,
    pub explanation_png_cid: Option<String>,
    pub zk_proof_cid: Option<String>,
    /// Hex of the operator signing key.
    pub elder_pub: String,
    /// Hex-encoded Ed25519 signature over `signing_json()`.
    pub signature: String,
    /// ISO-8601 UTC.
    pub timestamp: String,
}

fn opt_value(v: &Option<String>) -> Value {
    match v {
        Some(s) => Value::from(s.clone()),
        None => Value::Null,
    }
}

impl DecisionRecord {
    /// Canonical JSON of the record minus `signature`: keys sorted, no
    /// whitespace, absent CIDs as explicit nulls. These are the signed
    /// bytes; verifiers must rebuild them identically.
    pub fn signing_json(&self) -> String {
        let mut map = Map::new();
        map.insert("confidence".into(), Value::from(self.confidence));
        map.insert("decision_id".into(), Value::from(self.decision_id.clone()));
        map.insert("elder_pub".into(), Value::from(self.elder_pub.clone()));
        map.insert("explanation_cid".into(), opt_value(&self.explanation_cid));
        map.insert(
            "explanation_png_cid".into(),
            opt_value(&self.explanation_png_cid),
        );
        map.insert(
            "input_commitment".into(),
            Value::from(self.input_commitment.clone()),
        );
        map.insert("input_type".into(), Value::from(self.input_type.as_str()));
        map.insert("model_id".into(), Value::from(self.model_id.clone()));
        map.insert(
            "model_version".into(),
            Value::from(self.model_version.clone()),
        );
        map.insert("outcome".into(), Value::from(self.outcome.as_str()));
        map.insert("timestamp".into(), Value::from(self.timestamp.clone()));
        map.insert("zk_proof_cid".into(), opt_value(&self.zk_proof_cid));
        Value::Object(map).to_string()
    }

    pub fn signing_bytes(&self) -> Vec<u8> {
        self.signing_json().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DecisionRecord {
        DecisionRecord {
            decision_id: "00ff00ff00ff00ff".into(),
            model_id: "face_verification_v1".into(),
            model_version: "1.2.0".into(),
            input_type: InputType::Image,
            input_commitment: "ab".repeat(32),
            outcome: Outcome::Approved,
            confidence: 0.94,
            explanation_cid: Some("cid-1".into()),
            explanation_png_cid: None,
            zk_proof_cid: Some("cid-2".into()),
            elder_pub: "cd".repeat(32),
            signature: String::new(),
            timestamp: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn signing_json_excludes_signature_and_keeps_nulls() {
        let json = record().signing_json();
        assert!(!json.contains("signature"));
        assert!(json.contains(r#""explanation_png_cid":null"#));
    }

    #[test]
    fn signing_json_keys_are_sorted() {
        let json = record().signing_json();
        let conf = json.find("\"confidence\"").unwrap();
        let id = json.find("\"decision_id\"").unwrap();
        let ts = json.find("\"timestamp\"").unwrap();
        let zk = json.find("\"zk_proof_cid\"").unwrap();
        assert!(conf < id && id < ts && ts < zk);
    }

    #[test]
    fn confidence_bounds_are_enforced() {
        let input = DecideInput {
            model_id: "m".into(),
            model_version: "1".into(),
            input_type: InputType::Text,
            input_commitment: "ab".repeat(32),
            features: None,
            confidence: 1.2,
            decision: Outcome::Approved,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn commitment_must_be_hex() {
        let input = DecideInput {
            model_id: "m".into(),
            model_version: "1".into(),
            input_type: InputType::Text,
            input_commitment: "not hex!".into(),
            features: None,
            confidence: 0.5,
            decision: Outcome::Flagged,
        };
        assert!(input.validate().is_err());
    }
}
