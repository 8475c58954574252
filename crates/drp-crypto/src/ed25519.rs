use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use thiserror::Error;

use drp_core::types::{ElderPublicKey, ElderSignature};

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("invalid secret key length: expected 32, got {got}")]
    InvalidSecretKeyLength { got: usize },
}

/// Sign `message` with a raw 32-byte Ed25519 secret key.
/// Returns a detached 64-byte signature.
pub fn sign(secret_key_bytes: &[u8], message: &[u8]) -> Result<ElderSignature, SignatureError> {
    let seed: zeroize::Zeroizing<[u8; 32]> = zeroize::Zeroizing::new(
        secret_key_bytes
            .try_into()
            .map_err(|_| SignatureError::InvalidSecretKeyLength {
                got: secret_key_bytes.len(),
            })?,
    );
    let sk = SigningKey::from_bytes(&seed);
    let sig = sk.sign(message);
    Ok(ElderSignature(sig.to_bytes().to_vec()))
}

/// Verify a detached Ed25519 signature.
pub fn verify_signature(
    public_key: &ElderPublicKey,
    message: &[u8],
    signature: &ElderSignature,
) -> Result<(), SignatureError> {
    let pk = VerifyingKey::from_bytes(public_key.as_bytes())
        .map_err(|_| SignatureError::InvalidPublicKey)?;
    let sig =
        Signature::from_slice(&signature.0).map_err(|_| SignatureError::InvalidSignature)?;
    pk.verify(message, &sig)
        .map_err(|_| SignatureError::InvalidSignature)
}
