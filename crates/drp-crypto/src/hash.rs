use sha2::{Digest, Sha256};

use drp_core::types::ElderPublicKey;
use drp_core::FINGERPRINT_HEX_LEN;

/// Compute SHA-256 of arbitrary bytes → 32-byte array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of arbitrary bytes as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Public-key fingerprint: the first 16 hex chars of SHA-256(key bytes).
pub fn fingerprint(public_key: &ElderPublicKey) -> String {
    let mut hex = sha256_hex(public_key.as_bytes());
    hex.truncate(FINGERPRINT_HEX_LEN);
    hex
}
