//! Filesystem adapter: Implementation of ArtifactStore over a directory.
//!
//! Expected layout:
//!
//! ```text
//! <dir>/classifier.json
//! <dir>/encoders.json
//! <dir>/features.json
//! <dir>/manifest.json   SHA-256 of each artifact
//! <dir>/manifest.sig    Ed25519 signature over manifest.json (optional)
//! ```
//!
//! # Security
//!
//! - Every artifact is bound to the manifest by its SHA-256 digest
//! - When a verifying key is configured the manifest must carry a valid
//!   Ed25519 signature
//! - In release builds a manifest is mandatory; debug builds may skip it
//!   (see `config::Settings`)

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ports::{ArtifactError, ArtifactKind, ArtifactStore};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "manifest.sig";

const MANIFEST_VERSION: u32 = 1;

/// How strictly artifacts are checked before use.
#[derive(Debug, Clone, Default)]
pub struct IntegrityPolicy {
    /// Refuse to open a directory without `manifest.json`.
    pub require_manifest: bool,
    /// When set, `manifest.sig` must verify against this key.
    pub verifying_key: Option<VerifyingKey>,
}

impl IntegrityPolicy {
    #[must_use]
    pub fn strict(verifying_key: Option<VerifyingKey>) -> Self {
        Self {
            require_manifest: true,
            verifying_key,
        }
    }

    #[must_use]
    pub fn permissive() -> Self {
        Self::default()
    }
}

/// Digest list binding each artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    pub files: BTreeMap<String, String>,
}

impl ArtifactManifest {
    /// Hash the artifacts currently in `dir`.
    ///
    /// # Errors
    /// Returns error if an artifact cannot be read.
    pub fn for_dir(dir: &Path) -> Result<Self, ArtifactError> {
        let mut files = BTreeMap::new();
        for kind in ArtifactKind::ALL {
            let bytes = read_artifact(dir, kind)?;
            files.insert(kind.file_name().to_string(), sha256_hex(&bytes));
        }
        Ok(Self {
            version: MANIFEST_VERSION,
            files,
        })
    }

    /// Check that `bytes` is the artifact this manifest bound.
    ///
    /// # Errors
    /// Returns `Integrity` if the artifact is unbound or its digest differs.
    pub fn verify(&self, kind: ArtifactKind, bytes: &[u8]) -> Result<(), ArtifactError> {
        let expected = self.files.get(kind.file_name()).ok_or_else(|| {
            ArtifactError::Integrity(format!("{} is not bound by the manifest", kind.file_name()))
        })?;
        if !constant_time_eq_str(&sha256_hex(bytes), expected) {
            return Err(ArtifactError::Integrity(format!(
                "hash mismatch for {}",
                kind.file_name()
            )));
        }
        Ok(())
    }

    /// Serialized form written to `manifest.json`.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| ArtifactError::Integrity(format!("cannot serialize manifest: {e}")))
    }

    /// Sign the serialized manifest.
    #[must_use]
    pub fn sign(manifest_bytes: &[u8], key: &SigningKey) -> [u8; 64] {
        key.sign(manifest_bytes).to_bytes()
    }
}

/// Directory-backed artifact store.
#[derive(Debug)]
pub struct FsArtifactStore {
    dir: PathBuf,
    manifest: Option<ArtifactManifest>,
}

impl FsArtifactStore {
    /// Open an artifact directory, verifying its manifest under `policy`.
    ///
    /// Artifacts themselves are read lazily by `fetch`.
    ///
    /// # Errors
    /// Returns error if the manifest is required but absent, malformed, or
    /// its signature does not verify.
    pub fn open(dir: impl Into<PathBuf>, policy: &IntegrityPolicy) -> Result<Self, ArtifactError> {
        let dir = dir.into();
        let manifest_path = dir.join(MANIFEST_FILE);

        let manifest_bytes = match fs::read(&manifest_path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(ArtifactError::Integrity(format!(
                    "failed to read {}: {e}",
                    manifest_path.display()
                )))
            }
        };

        let Some(manifest_bytes) = manifest_bytes else {
            if policy.require_manifest || policy.verifying_key.is_some() {
                tracing::error!("No artifact manifest at {:?}", manifest_path);
                return Err(ArtifactError::Integrity(format!(
                    "{} is required",
                    manifest_path.display()
                )));
            }
            tracing::warn!(
                "Opening UNVERIFIED artifacts in {:?} (no manifest). Only allowed in debug builds.",
                dir
            );
            return Ok(Self {
                dir,
                manifest: None,
            });
        };

        if let Some(key) = &policy.verifying_key {
            verify_signature(&dir, &manifest_bytes, key)?;
        }

        let manifest: ArtifactManifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| ArtifactError::Integrity(format!("invalid manifest.json format: {e}")))?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ArtifactError::Integrity(format!(
                "unsupported manifest version: {}",
                manifest.version
            )));
        }
        for kind in ArtifactKind::ALL {
            if !manifest.files.contains_key(kind.file_name()) {
                return Err(ArtifactError::Integrity(format!(
                    "manifest does not bind {}",
                    kind.file_name()
                )));
            }
        }

        tracing::info!(
            "Opened artifact directory {:?} (manifest verified, signed={})",
            dir,
            policy.verifying_key.is_some()
        );
        Ok(Self {
            dir,
            manifest: Some(manifest),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.manifest.is_some()
    }
}

impl ArtifactStore for FsArtifactStore {
    fn fetch(&self, kind: ArtifactKind) -> Result<Vec<u8>, ArtifactError> {
        let bytes = read_artifact(&self.dir, kind)?;
        if let Some(manifest) = &self.manifest {
            manifest.verify(kind, &bytes)?;
        }
        tracing::debug!("Fetched {} ({} bytes)", kind, bytes.len());
        Ok(bytes)
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Decode a base64 Ed25519 verifying key (32 bytes).
///
/// # Errors
/// Returns `Signature` if the text is not a valid key.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::Signature("invalid public key base64".into()))?;
    let key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Signature("invalid public key length (expected 32 bytes)".into()))?;
    VerifyingKey::from_bytes(&key)
        .map_err(|_| ArtifactError::Signature("invalid verifying key".into()))
}

fn verify_signature(dir: &Path, manifest_bytes: &[u8], key: &VerifyingKey) -> Result<(), ArtifactError> {
    let sig_path = dir.join(SIGNATURE_FILE);
    let sig_bytes = fs::read(&sig_path)
        .map_err(|e| ArtifactError::Signature(format!("failed to read {}: {e}", sig_path.display())))?;
    let sig: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Signature("invalid signature length (expected 64 bytes)".into()))?;
    key.verify(manifest_bytes, &Signature::from_bytes(&sig))
        .map_err(|_| ArtifactError::Signature("manifest signature does not verify".into()))
}

/// Read one artifact in a single call.
fn read_artifact(dir: &Path, kind: ArtifactKind) -> Result<Vec<u8>, ArtifactError> {
    let path = dir.join(kind.file_name());
    fs::read(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ArtifactError::Missing {
            artifact: kind,
            location: path.display().to_string(),
        },
        _ => ArtifactError::Read {
            artifact: kind,
            source: e,
        },
    })
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
