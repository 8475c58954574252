pub mod ed25519;
pub mod hash;
pub mod keypair;
pub mod signer;

pub use ed25519::{sign, verify_signature, SignatureError};
pub use hash::{fingerprint, sha256, sha256_hex};
pub use keypair::ElderKeyPair;
pub use signer::{Signer, Verifier};
