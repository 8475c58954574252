use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DrpError;

/// A block header submitted for quorum signing.
///
/// The canonical serialization is a total function of exactly these eight
/// fields; nothing else may influence the signed bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub index: u64,
    pub previous_hash: String,
    /// Seconds since epoch, UTC.
    pub timestamp: u64,
    #[serde(default)]
    pub merkle_root: String,
    #[serde(default)]
    pub data_hash: String,
    #[serde(default)]
    pub miner_id: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub difficulty: u64,
}

impl BlockHeader {
    /// Boundary validation. Numeric fields are u64 by type, so range is
    /// enforced by deserialization; only structural constraints remain.
    pub fn validate(&self) -> Result<(), DrpError> {
        if self.previous_hash.is_empty() {
            return Err(DrpError::InvalidInput(
                "previous_hash must be non-empty".into(),
            ));
        }
        Ok(())
    }

    /// Canonical JSON form: only the eight header fields, keys sorted
    /// lexicographically, no whitespace, integers as minimal decimals,
    /// empty strings serialized as `""` (never omitted).
    ///
    /// Keys are inserted in sorted order so the output is stable whether or
    /// not the JSON map preserves insertion order.
    pub fn canonical_json(&self) -> String {
        let mut map = Map::new();
        map.insert("data_hash".into(), Value::from(self.data_hash.clone()));
        map.insert("difficulty".into(), Value::from(self.difficulty));
        map.insert("index".into(), Value::from(self.index));
        map.insert("merkle_root".into(), Value::from(self.merkle_root.clone()));
        map.insert("miner_id".into(), Value::from(self.miner_id.clone()));
        map.insert("nonce".into(), Value::from(self.nonce));
        map.insert(
            "previous_hash".into(),
            Value::from(self.previous_hash.clone()),
        );
        map.insert("timestamp".into(), Value::from(self.timestamp));
        Value::Object(map).to_string()
    }

    /// The exact bytes every elder signs.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_json().into_bytes()
    }
}
