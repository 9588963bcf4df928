//! # heartrisk
//!
//! Heart disease risk inference against frozen model artifacts.
//!
//! This crate provides:
//! - Label encoding of categorical clinical attributes
//! - Feature assembly in the exact column order the classifier was trained on
//! - Binary risk classification with a positive-class probability
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (patient record, encoders, schema, prediction)
//! - `ports`: Trait definitions for the artifact store and the classifier
//! - `adapters`: Concrete implementations (filesystem store, tree ensemble,
//!   logistic model, log sanitization)
//! - `application`: Artifact caching and the encode/assemble/predict pipeline
//! - `config`: Environment-driven settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{assemble, parse_record, predict, Artifacts, Assessment, RiskService};
pub use domain::{EncodedRecord, PatientRecord, PredictionResult, RawRecord, RiskLabel};

use ports::{ArtifactError, ClassifierError};

/// Result type for heartrisk operations
pub type Result<T> = std::result::Result<T, HeartRiskError>;

/// Main error type for heartrisk
#[derive(Debug, thiserror::Error)]
pub enum HeartRiskError {
    #[error("Artifact load failed: {0}")]
    ArtifactLoad(#[from] ArtifactError),

    #[error("Unknown category {value:?} for field '{field}' (known: {})", .known.join(", "))]
    UnknownCategory {
        field: String,
        value: String,
        known: Vec<String>,
    },

    #[error("Input does not match the feature schema; missing: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("Inference failed: {0}")]
    Inference(#[from] ClassifierError),

    #[error("Invalid patient data: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HeartRiskError {
    /// Failure category reported to the presentation layer.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::ArtifactLoad(_) => "ArtifactLoad",
            Self::UnknownCategory { .. } => "UnknownCategory",
            Self::SchemaMismatch { .. } => "SchemaMismatch",
            Self::Inference(_) => "Inference",
            Self::Validation(_) => "Validation",
            Self::Config(_) => "Config",
        }
    }

    /// Whether the process cannot serve any request until this is fixed.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ArtifactLoad(_) | Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let err = HeartRiskError::UnknownCategory {
            field: "sex".into(),
            value: "unknown".into(),
            known: vec!["female".into(), "male".into()],
        };
        assert_eq!(err.category(), "UnknownCategory");
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Unknown category \"unknown\" for field 'sex' (known: female, male)"
        );

        let err = HeartRiskError::SchemaMismatch {
            missing: vec!["thal".into()],
        };
        assert_eq!(err.category(), "SchemaMismatch");
        assert!(err.to_string().ends_with("missing: thal"));

        let err = HeartRiskError::from(ArtifactError::Integrity("bad digest".into()));
        assert_eq!(err.category(), "ArtifactLoad");
        assert!(err.is_fatal());
    }
}
