//! Prediction result types.
//!
//! Represents the output of the heart disease risk classifier.

use serde::{Deserialize, Serialize};

/// Binary risk label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLabel {
    /// The classifier predicted the positive class
    AtRisk,
    /// Any other class
    NotAtRisk,
}

impl RiskLabel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AtRisk => "at_risk",
            Self::NotAtRisk => "not_at_risk",
        }
    }

    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::AtRisk => "Heart disease risk detected",
            Self::NotAtRisk => "No significant heart disease risk detected",
        }
    }

    #[must_use]
    pub fn is_at_risk(&self) -> bool {
        matches!(self, Self::AtRisk)
    }
}

impl std::fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier verdict for one patient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Label from the classifier's own decision boundary
    pub label: RiskLabel,

    /// Raw positive-class probability (0.0 to 1.0), not recalibrated
    pub probability: f64,
}

impl PredictionResult {
    #[must_use]
    pub fn new(label: RiskLabel, probability: f64) -> Self {
        Self { label, probability }
    }

    /// Probability formatted as a percentage with two decimals.
    #[must_use]
    pub fn percentage(&self) -> String {
        format!("{:.2}%", self.probability * 100.0)
    }
}

impl std::fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label, self.percentage())
    }
}
