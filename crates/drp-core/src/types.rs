use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix timestamp (seconds, UTC).
pub type Timestamp = i64;

// ── ElderId ──────────────────────────────────────────────────────────────────

/// Stable committee-member label, canonically `elder-{i}` (hyphen form).
///
/// Ordering is plain lexicographic string order; signing selection relies
/// on this to produce deterministic envelopes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElderId(pub String);

impl ElderId {
    pub fn from_index(index: u32) -> Self {
        Self(format!("elder-{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ElderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElderId({})", self.0)
    }
}

impl From<&str> for ElderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── ElderStatus ──────────────────────────────────────────────────────────────

/// Lifecycle status of a committee member. Elders are never destroyed;
/// `Slashed` is terminal for the process lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElderStatus {
    Active,
    Inactive,
    Rotating,
    Slashed,
}

impl fmt::Display for ElderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElderStatus::Active => "active",
            ElderStatus::Inactive => "inactive",
            ElderStatus::Rotating => "rotating",
            ElderStatus::Slashed => "slashed",
        };
        write!(f, "{s}")
    }
}

// ── ElderPublicKey ───────────────────────────────────────────────────────────

/// Raw Ed25519 public key (32 bytes). Serializes as base64 per the wire
/// contract; hash/commitment contexts use the hex form explicitly.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElderPublicKey(pub [u8; 32]);

impl Serialize for ElderPublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_b64())
    }
}

impl<'de> Deserialize<'de> for ElderPublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_b64(&s).map_err(serde::de::Error::custom)
    }
}

impl ElderPublicKey {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_b64(&self) -> String {
        B64.encode(self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, crate::error::DrpError> {
        let bytes = B64
            .decode(s)
            .map_err(|e| crate::error::DrpError::InvalidInput(format!("bad base64 key: {e}")))?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            crate::error::DrpError::InvalidInput(format!(
                "public key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, crate::error::DrpError> {
        let bytes = hex::decode(s)
            .map_err(|e| crate::error::DrpError::InvalidInput(format!("bad hex key: {e}")))?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            crate::error::DrpError::InvalidInput(format!(
                "public key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for ElderPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElderPublicKey({}…)", &self.to_hex()[..8])
    }
}

// ── ElderSignature ───────────────────────────────────────────────────────────

/// Detached Ed25519 signature (64 bytes raw). Serializes as base64.
#[derive(Clone, PartialEq, Eq)]
pub struct ElderSignature(pub Vec<u8>);

impl Serialize for ElderSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_b64())
    }
}

impl<'de> Deserialize<'de> for ElderSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_b64(&s).map_err(serde::de::Error::custom)
    }
}

impl ElderSignature {
    pub fn to_b64(&self) -> String {
        B64.encode(&self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, crate::error::DrpError> {
        let bytes = B64.decode(s).map_err(|e| {
            crate::error::DrpError::InvalidInput(format!("bad base64 signature: {e}"))
        })?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for ElderSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElderSignature({}b)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elder_id_canonical_form() {
        assert_eq!(ElderId::from_index(0).as_str(), "elder-0");
        assert_eq!(ElderId::from_index(17).as_str(), "elder-17");
    }

    #[test]
    fn elder_ids_sort_lexicographically() {
        let mut ids: Vec<ElderId> = vec![
            ElderId::from_index(2),
            ElderId::from_index(10),
            ElderId::from_index(0),
        ];
        ids.sort();
        // "elder-10" < "elder-2" in string order.
        assert_eq!(ids[0].as_str(), "elder-0");
        assert_eq!(ids[1].as_str(), "elder-10");
        assert_eq!(ids[2].as_str(), "elder-2");
    }

    #[test]
    fn public_key_b64_round_trip() {
        let pk = ElderPublicKey::from_bytes([7u8; 32]);
        let b64 = pk.to_b64();
        assert_eq!(ElderPublicKey::from_b64(&b64).unwrap(), pk);
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        let short = B64.encode([1u8; 16]);
        assert!(ElderPublicKey::from_b64(&short).is_err());
    }
}
