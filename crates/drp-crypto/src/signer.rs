use drp_core::types::{ElderPublicKey, ElderSignature};

use crate::ed25519::SignatureError;

/// Signing capability of an Elder.
///
/// The quorum service only sees this trait; whether the key sits on local
/// disk, in an HSM, or behind a remote signer is the keystore's business.
pub trait Signer: Send + Sync {
    fn public_key(&self) -> ElderPublicKey;
    fn try_sign(&self, message: &[u8]) -> Result<ElderSignature, SignatureError>;
}

/// Verification capability over an Elder's own key material.
pub trait Verifier: Send + Sync {
    fn verify(&self, message: &[u8], signature: &ElderSignature) -> Result<(), SignatureError>;
}
