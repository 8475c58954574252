use ed25519_dalek::{Signer as _, SigningKey};
use rand::rngs::OsRng;

use drp_core::types::{ElderPublicKey, ElderSignature};

use crate::ed25519::SignatureError;
use crate::signer::{Signer, Verifier};

/// An Elder signing keypair.
///
/// The secret half lives inside `SigningKey`, which zeroizes its memory on
/// drop. `secret_bytes` exists only for the keystore persistence path; the
/// raw seed must not cross a process boundary.
pub struct ElderKeyPair {
    signing: SigningKey,
}

impl ElderKeyPair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild a keypair from a 32-byte seed (deterministic derivation or
    /// keystore load).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// Restore from raw key material loaded from disk. The stored public
    /// key must match the one derived from the seed.
    pub fn from_raw(secret: [u8; 32], public: [u8; 32]) -> Result<Self, SignatureError> {
        let kp = Self::from_seed(secret);
        if kp.public_key().0 != public {
            return Err(SignatureError::InvalidPublicKey);
        }
        Ok(kp)
    }

    pub fn public_key(&self) -> ElderPublicKey {
        ElderPublicKey(self.signing.verifying_key().to_bytes())
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> ElderSignature {
        ElderSignature(self.signing.sign(message).to_bytes().to_vec())
    }
}

impl std::fmt::Debug for ElderKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ElderKeyPair {{ public: {:?} }}", self.public_key())
    }
}

impl Signer for ElderKeyPair {
    fn public_key(&self) -> ElderPublicKey {
        ElderKeyPair::public_key(self)
    }

    fn try_sign(&self, message: &[u8]) -> Result<ElderSignature, SignatureError> {
        Ok(self.sign(message))
    }
}

impl Verifier for ElderKeyPair {
    fn verify(&self, message: &[u8], signature: &ElderSignature) -> Result<(), SignatureError> {
        crate::ed25519::verify_signature(&self.public_key(), message, signature)
    }
}
