//! drp-keystore
//!
//! Durable storage of Elder signing material. Keys are raw 32-byte files
//! (`elder-0.priv` / `elder-0.pub`) protected by filesystem permissions.
//! With a development seed configured, key material is derived
//! deterministically so a dev cluster is reproducible; without it, keys
//! come from the OS RNG and derivation requests fail.
//!
//! Private key bytes never leave the process hosting the keystore.

mod store;

pub use store::{Keystore, KeystoreError};
