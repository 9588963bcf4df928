//! Artifact store port: Trait for retrieving the frozen model artifacts.
//!
//! This trait abstracts where the classifier, encoders and feature schema
//! live (a directory on disk in production, memory in tests).

use std::fmt;

/// The three artifacts produced by training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    Classifier,
    Encoders,
    FeatureSchema,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Classifier,
        ArtifactKind::Encoders,
        ArtifactKind::FeatureSchema,
    ];

    /// Well-known file name of the artifact.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Classifier => "classifier.json",
            Self::Encoders => "encoders.json",
            Self::FeatureSchema => "features.json",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classifier => f.write_str("classifier"),
            Self::Encoders => f.write_str("encoders"),
            Self::FeatureSchema => f.write_str("feature schema"),
        }
    }
}

/// Errors that can occur while retrieving or validating artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("{artifact} artifact not found at {location}")]
    Missing {
        artifact: ArtifactKind,
        location: String,
    },

    #[error("Failed to read {artifact} artifact: {source}")]
    Read {
        artifact: ArtifactKind,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {artifact} artifact: {message}")]
    Malformed {
        artifact: ArtifactKind,
        message: String,
    },

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Signature verification failed: {0}")]
    Signature(String),

    #[error("Artifacts are inconsistent: {0}")]
    Inconsistent(String),
}

impl ArtifactError {
    pub(crate) fn malformed(artifact: ArtifactKind, message: impl fmt::Display) -> Self {
        Self::Malformed {
            artifact,
            message: message.to_string(),
        }
    }
}

/// Trait for read-only artifact storage.
///
/// Each `fetch` returns the complete artifact or an error, never a partial
/// read.
pub trait ArtifactStore: Send + Sync {
    /// Retrieve the raw bytes of one artifact.
    ///
    /// # Errors
    /// Returns `ArtifactError` if the artifact is missing, unreadable, or
    /// fails an integrity check.
    fn fetch(&self, kind: ArtifactKind) -> Result<Vec<u8>, ArtifactError>;

    /// Where the artifacts come from, for logs and error messages.
    fn location(&self) -> String;
}
