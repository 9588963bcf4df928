//! Artifact signing utility.
//!
//! Writes `manifest.json` (SHA-256 of every artifact) into an artifact
//! directory and, when a signing key is supplied, an Ed25519 signature over
//! it in `manifest.sig`. Without a key any existing `manifest.sig` is
//! removed, since it would no longer match.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sign_artifacts -- models --key-file signing_key.b64
//! cargo run --bin sign_artifacts -- models --generate-key signing_key.b64
//! ```
//!
//! # Security
//!
//! - The key file holds the base64 32-byte Ed25519 seed
//! - Seed material is zeroized after use
//! - Generated key files are created exclusively, mode 0600 on Unix
//! - The printed verifying key goes into `HEARTRISK_ARTIFACT_PUBKEY_B64_FILE`

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use clap::Parser;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use heartrisk::adapters::filesystem::{ArtifactManifest, MANIFEST_FILE, SIGNATURE_FILE};

#[derive(Debug, Parser)]
#[command(name = "sign_artifacts", version, about = "Bind and sign heartrisk model artifacts")]
struct Cli {
    /// Artifact directory containing classifier.json, encoders.json and features.json
    #[arg(value_name = "DIR")]
    dir: PathBuf,

    /// File holding the base64 Ed25519 signing seed
    #[arg(long, value_name = "FILE", env = "HEARTRISK_SIGNING_KEY_B64_FILE")]
    key_file: Option<PathBuf>,

    /// Create a new signing seed at FILE (must not exist) and sign with it
    #[arg(long, value_name = "FILE", conflicts_with = "key_file")]
    generate_key: Option<PathBuf>,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn read_seed(path: &Path) -> Result<Seed> {
    let content = Zeroizing::new(
        fs::read_to_string(path)
            .with_context(|| format!("failed reading signing key file {}", path.display()))?,
    );
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(content.trim())
            .context("invalid base64 in signing key")?,
    );
    if raw.len() != 32 {
        bail!(
            "signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        );
    }
    let mut seed = Seed([0u8; 32]);
    seed.0.copy_from_slice(&raw);
    Ok(seed)
}

/// Create the seed file atomically: it must not exist, and on Unix it is
/// created with mode 0600 so the seed is never readable by others.
fn generate_seed(path: &Path) -> Result<Seed> {
    let mut seed = Seed([0u8; 32]);
    rand::rngs::OsRng
        .try_fill_bytes(&mut seed.0)
        .context("failed to gather randomness")?;
    let b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed.0));

    let mut opts = fs::OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts.open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            anyhow!("refusing to overwrite existing key file {}", path.display())
        } else {
            anyhow!("failed creating key file {}: {e}", path.display())
        }
    })?;
    file.write_all(b64.as_bytes())
        .with_context(|| format!("failed writing key file {}", path.display()))?;
    file.write_all(b"\n")?;
    Ok(seed)
}

/// Remove a signature left by an earlier run; returns whether one existed.
fn remove_stale_signature(dir: &Path) -> Result<bool> {
    match fs::remove_file(dir.join(SIGNATURE_FILE)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed removing stale {SIGNATURE_FILE}")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Digests are computed and the key resolved before anything is written,
    // so a bad key never leaves a new manifest beside an old signature.
    let manifest = ArtifactManifest::for_dir(&cli.dir)?;
    let manifest_bytes = manifest.to_bytes()?;

    let seed = match (&cli.key_file, &cli.generate_key) {
        (Some(path), _) => Some(read_seed(path)?),
        (None, Some(path)) => {
            let seed = generate_seed(path)?;
            println!("Generated signing key {}", path.display());
            Some(seed)
        }
        (None, None) => None,
    };

    fs::write(cli.dir.join(MANIFEST_FILE), &manifest_bytes)
        .with_context(|| format!("failed writing {MANIFEST_FILE}"))?;
    println!("Wrote {}", cli.dir.join(MANIFEST_FILE).display());
    for (name, digest) in &manifest.files {
        println!("  {name}: {digest}");
    }

    let Some(seed) = seed else {
        if remove_stale_signature(&cli.dir)? {
            println!("Removed stale {SIGNATURE_FILE}; the new manifest is unsigned.");
        } else {
            println!("No signing key given; {SIGNATURE_FILE} not written.");
        }
        return Ok(());
    };

    let signing_key = SigningKey::from_bytes(&seed.0);
    let sig = ArtifactManifest::sign(&manifest_bytes, &signing_key);
    fs::write(cli.dir.join(SIGNATURE_FILE), sig)
        .with_context(|| format!("failed writing {SIGNATURE_FILE}"))?;

    println!("Wrote {}", cli.dir.join(SIGNATURE_FILE).display());
    println!(
        "Verifying key (base64): {}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().to_bytes())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_seed_round_trips_through_key_file() {
        let dir = TempDir::new().expect("Should create temp dir");
        let path = dir.path().join("signing_key.b64");

        let seed = generate_seed(&path).expect("Should generate");
        let read = read_seed(&path).expect("Should read back");
        assert_eq!(seed.0, read.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_generated_seed_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("Should create temp dir");
        let path = dir.path().join("signing_key.b64");
        generate_seed(&path).expect("Should generate");

        let mode = fs::metadata(&path).expect("Should stat").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_generate_refuses_existing_file() {
        let dir = TempDir::new().expect("Should create temp dir");
        let path = dir.path().join("signing_key.b64");
        fs::write(&path, "keep me").expect("Should write");

        let err = generate_seed(&path).err().expect("Should refuse");
        assert!(err.to_string().contains("refusing to overwrite"), "{err}");
        assert_eq!(fs::read_to_string(&path).expect("Should read"), "keep me");
    }

    #[test]
    fn test_stale_signature_is_removed() {
        let dir = TempDir::new().expect("Should create temp dir");
        fs::write(dir.path().join(SIGNATURE_FILE), "old").expect("Should write");

        assert!(remove_stale_signature(dir.path()).expect("Should remove"));
        assert!(!dir.path().join(SIGNATURE_FILE).exists());
        assert!(!remove_stale_signature(dir.path()).expect("Missing file is fine"));
    }
}
