use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use drp_core::types::ElderId;
use drp_core::DrpError;
use drp_crypto::ElderKeyPair;

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("key-load-error: {path}: {source}")]
    KeyLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key-load-error: {path}: corrupt key material ({detail})")]
    CorruptKey { path: PathBuf, detail: String },

    #[error("unsafe-derivation: deterministic keys require a development seed")]
    UnsafeDerivation,

    #[error("keystore I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<KeystoreError> for DrpError {
    fn from(e: KeystoreError) -> Self {
        match e {
            KeystoreError::UnsafeDerivation => DrpError::PreconditionFailed(e.to_string()),
            other => DrpError::InfrastructureUnavailable(other.to_string()),
        }
    }
}

/// On-disk keystore for Elder signing keys.
///
/// Owns exclusive write access to its directory; writes are atomic
/// (temp-file + fsync + rename) so concurrent readers never observe a torn
/// key file.
pub struct Keystore {
    dir: PathBuf,
    dev_seed: Option<String>,
}

impl Keystore {
    /// Open (creating if needed) a keystore rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, dev_seed: Option<String>) -> Result<Self, KeystoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        if dev_seed.is_some() {
            info!(dir = %dir.display(), "keystore opened with development seed; NOT for production");
        }
        Ok(Self { dir, dev_seed })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_paths(&self, elder_id: &ElderId) -> (PathBuf, PathBuf) {
        (
            self.dir.join(format!("{elder_id}.priv")),
            self.dir.join(format!("{elder_id}.pub")),
        )
    }

    /// Derive a 32-byte seed as `SHA256(secret ":" namespace ":" index)`.
    ///
    /// Fails with `unsafe-derivation` when no development seed is
    /// configured; production keys must come from the OS RNG.
    pub fn derive_seed(&self, namespace: &str, index: u32) -> Result<[u8; 32], KeystoreError> {
        let secret = self
            .dev_seed
            .as_deref()
            .ok_or(KeystoreError::UnsafeDerivation)?;
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.update(b":");
        hasher.update(namespace.as_bytes());
        hasher.update(b":");
        hasher.update(index.to_string().as_bytes());
        Ok(hasher.finalize().into())
    }

    /// Load the keypair for `elder-{index}`, creating and persisting one if
    /// no key files exist yet. With a development seed, fresh keys are
    /// derived deterministically; otherwise they are generated.
    pub fn load_or_create_elder(&self, index: u32) -> Result<ElderKeyPair, KeystoreError> {
        let elder_id = ElderId::from_index(index);
        let (priv_path, pub_path) = self.key_paths(&elder_id);

        if priv_path.exists() && pub_path.exists() {
            let secret = read_key_file(&priv_path)?;
            let public = read_key_file(&pub_path)?;
            let kp = ElderKeyPair::from_raw(secret, public).map_err(|e| {
                KeystoreError::CorruptKey {
                    path: priv_path.clone(),
                    detail: e.to_string(),
                }
            })?;
            debug!(%elder_id, "loaded existing keypair");
            return Ok(kp);
        }

        let kp = if self.dev_seed.is_some() {
            ElderKeyPair::from_seed(self.derive_seed("elder", index)?)
        } else {
            ElderKeyPair::generate()
        };
        self.persist(&elder_id, &kp)?;
        info!(%elder_id, "created and persisted new keypair");
        Ok(kp)
    }

    /// Load the ledger operator keypair (`operator.priv` / `operator.pub`),
    /// creating one if absent. Separate from the Elder committee keys.
    pub fn load_or_create_operator(&self) -> Result<ElderKeyPair, KeystoreError> {
        let priv_path = self.dir.join("operator.priv");
        let pub_path = self.dir.join("operator.pub");

        if priv_path.exists() && pub_path.exists() {
            let secret = read_key_file(&priv_path)?;
            let public = read_key_file(&pub_path)?;
            return ElderKeyPair::from_raw(secret, public).map_err(|e| KeystoreError::CorruptKey {
                path: priv_path,
                detail: e.to_string(),
            });
        }

        let kp = if self.dev_seed.is_some() {
            ElderKeyPair::from_seed(self.derive_seed("operator", 0)?)
        } else {
            ElderKeyPair::generate()
        };
        write_key_atomic(&priv_path, &kp.secret_bytes())?;
        write_key_atomic(&pub_path, &kp.public_key().0)?;
        info!("created and persisted operator keypair");
        Ok(kp)
    }

    /// Atomically replace the stored keypair for `elder_id`.
    ///
    /// On any write error the previously stored material is left intact:
    /// content goes to temp files first, is fsynced, then renamed over the
    /// live files.
    pub fn rotate(&self, elder_id: &ElderId, new: &ElderKeyPair) -> Result<(), KeystoreError> {
        self.persist(elder_id, new)?;
        info!(%elder_id, "rotated key material");
        Ok(())
    }

    fn persist(&self, elder_id: &ElderId, kp: &ElderKeyPair) -> Result<(), KeystoreError> {
        let (priv_path, pub_path) = self.key_paths(elder_id);
        write_key_atomic(&priv_path, &kp.secret_bytes())?;
        write_key_atomic(&pub_path, &kp.public_key().0)?;
        Ok(())
    }
}

fn read_key_file(path: &Path) -> Result<[u8; 32], KeystoreError> {
    let bytes = fs::read(path).map_err(|source| KeystoreError::KeyLoad {
        path: path.to_path_buf(),
        source,
    })?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeystoreError::CorruptKey {
            path: path.to_path_buf(),
            detail: format!("expected 32 bytes, got {}", bytes.len()),
        })
}

/// Write-then-fsync-then-rename so readers never see a torn file.
fn write_key_atomic(path: &Path, bytes: &[u8]) -> Result<(), KeystoreError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("key");
    let tmp_path = path.with_extension(format!("{ext}.tmp"));
    let mut f = open_owner_only(&tmp_path)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    drop(f);
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(unix)]
fn open_owner_only(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_owner_only(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_keystore(tag: &str, dev_seed: Option<&str>) -> (Keystore, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "drp_keystore_{}_{}_{}",
            tag,
            std::process::id(),
            std::thread::current().name().unwrap_or("t").len()
        ));
        let _ = fs::remove_dir_all(&dir);
        let ks = Keystore::open(&dir, dev_seed.map(String::from)).unwrap();
        (ks, dir)
    }

    #[test]
    fn derivation_is_deterministic_per_namespace_and_index() {
        let (ks, dir) = temp_keystore("derive", Some("demo"));
        let a = ks.derive_seed("elder", 0).unwrap();
        let b = ks.derive_seed("elder", 0).unwrap();
        let c = ks.derive_seed("elder", 1).unwrap();
        let d = ks.derive_seed("operator", 0).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn derivation_without_dev_seed_is_refused() {
        let (ks, dir) = temp_keystore("noseed", None);
        assert!(matches!(
            ks.derive_seed("elder", 0),
            Err(KeystoreError::UnsafeDerivation)
        ));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_or_create_round_trips_through_disk() {
        let (ks, dir) = temp_keystore("roundtrip", None);
        let first = ks.load_or_create_elder(0).unwrap();
        let second = ks.load_or_create_elder(0).unwrap();
        assert_eq!(first.public_key(), second.public_key());
        assert!(dir.join("elder-0.priv").exists());
        assert!(dir.join("elder-0.pub").exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn dev_seed_yields_reproducible_cluster() {
        let (ks_a, dir_a) = temp_keystore("cluster_a", Some("demo"));
        let (ks_b, dir_b) = temp_keystore("cluster_b", Some("demo"));
        let a = ks_a.load_or_create_elder(3).unwrap();
        let b = ks_b.load_or_create_elder(3).unwrap();
        assert_eq!(a.public_key(), b.public_key());
        let _ = fs::remove_dir_all(dir_a);
        let _ = fs::remove_dir_all(dir_b);
    }

    #[test]
    fn rotate_replaces_stored_material() {
        let (ks, dir) = temp_keystore("rotate", None);
        let old = ks.load_or_create_elder(0).unwrap();
        let fresh = ElderKeyPair::generate();
        ks.rotate(&ElderId::from_index(0), &fresh).unwrap();
        let loaded = ks.load_or_create_elder(0).unwrap();
        assert_eq!(loaded.public_key(), fresh.public_key());
        assert_ne!(loaded.public_key(), old.public_key());
        // No stray temp files left behind.
        assert!(!dir.join("elder-0.priv.tmp").exists());
        assert!(!dir.join("elder-0.pub.tmp").exists());
        let _ = fs::remove_dir_all(dir);
    }
}
