//! Runtime settings read from the environment.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `HEARTRISK_ARTIFACT_DIR` | artifact directory (default `models`) |
//! | `HEARTRISK_ARTIFACT_PUBKEY_B64_FILE` | base64 Ed25519 key; enables signature checks |
//! | `HEARTRISK_ALLOW_UNVERIFIED_ARTIFACTS` | debug builds only: allow a directory without manifest |
//! | `HEARTRISK_LOG_MODE` | `stderr` (default) or `file` |
//! | `HEARTRISK_LOG_FILE` | log path when `HEARTRISK_LOG_MODE=file` |

use std::path::PathBuf;

use ed25519_dalek::VerifyingKey;

use crate::adapters::filesystem::{verifying_key_from_b64, IntegrityPolicy};
use crate::HeartRiskError;

pub const DEFAULT_ARTIFACT_DIR: &str = "models";
pub const DEFAULT_LOG_FILE: &str = "heartrisk.log";

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    #[default]
    Stderr,
    File,
}

impl LogMode {
    fn parse(value: &str) -> Result<Self, HeartRiskError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "stderr" => Ok(Self::Stderr),
            "file" => Ok(Self::File),
            other => Err(HeartRiskError::Config(format!(
                "HEARTRISK_LOG_MODE must be 'stderr' or 'file', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub artifact_dir: PathBuf,
    pub verifying_key: Option<VerifyingKey>,
    pub allow_unverified: bool,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            verifying_key: None,
            allow_unverified: false,
            log_mode: LogMode::Stderr,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Errors
    /// Returns `HeartRiskError::Config` if a variable holds an invalid value
    /// or the public key file cannot be read or decoded.
    pub fn from_env() -> Result<Self, HeartRiskError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HeartRiskError> {
        let mut settings = Self::default();

        if let Some(dir) = lookup("HEARTRISK_ARTIFACT_DIR").filter(|v| !v.trim().is_empty()) {
            settings.artifact_dir = PathBuf::from(dir);
        }

        if let Some(path) = lookup("HEARTRISK_ARTIFACT_PUBKEY_B64_FILE") {
            let b64 = std::fs::read_to_string(&path).map_err(|e| {
                HeartRiskError::Config(format!("failed to read public key file {path}: {e}"))
            })?;
            let key = verifying_key_from_b64(&b64)
                .map_err(|e| HeartRiskError::Config(format!("{path}: {e}")))?;
            settings.verifying_key = Some(key);
        }

        settings.allow_unverified = lookup("HEARTRISK_ALLOW_UNVERIFIED_ARTIFACTS")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        if let Some(mode) = lookup("HEARTRISK_LOG_MODE") {
            settings.log_mode = LogMode::parse(&mode)?;
        }
        if let Some(file) = lookup("HEARTRISK_LOG_FILE").filter(|v| !v.trim().is_empty()) {
            settings.log_file = PathBuf::from(file);
        }

        Ok(settings)
    }

    /// Integrity policy for opening the artifact directory.
    ///
    /// A manifest is mandatory unless this is a debug build and unverified
    /// artifacts were explicitly allowed.
    #[must_use]
    pub fn integrity_policy(&self) -> IntegrityPolicy {
        let skip_manifest = cfg!(debug_assertions) && self.allow_unverified;
        if self.allow_unverified && !cfg!(debug_assertions) {
            tracing::warn!("HEARTRISK_ALLOW_UNVERIFIED_ARTIFACTS is ignored in release builds");
        }
        IntegrityPolicy {
            require_manifest: !skip_manifest,
            verifying_key: self.verifying_key,
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "yes" | "YES")
}
