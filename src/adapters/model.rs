//! Classifier artifact format.
//!
//! `classifier.json` is a tagged envelope:
//!
//! ```json
//! { "kind": "random_forest", "classes": [0, 1], "positive_class": 1,
//!   "n_features": 13, "trees": [ ... ] }
//! { "kind": "logistic_regression", "classes": [0, 1],
//!   "coefficients": [ ... ], "intercept": -0.3, "scaler": { "mean": [ ... ], "scale": [ ... ] } }
//! ```
//!
//! `positive_class` is optional and defaults to the larger class label.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::forest::{DecisionTree, RandomForest};
use super::logistic::{LogisticModel, StandardScaler};
use crate::ports::{ArtifactError, ArtifactKind, Classifier, ClassifierError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub classes: Vec<i64>,
    #[serde(default)]
    pub positive_class: Option<i64>,
    #[serde(flatten)]
    pub params: ModelParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelParams {
    RandomForest {
        n_features: usize,
        trees: Vec<DecisionTree>,
    },
    LogisticRegression {
        coefficients: Vec<f64>,
        intercept: f64,
        #[serde(default)]
        scaler: Option<StandardScaler>,
    },
}

impl ClassifierArtifact {
    /// Parse and build the classifier from artifact bytes.
    ///
    /// # Errors
    /// Returns `ArtifactError::Malformed` if the JSON is invalid or the model
    /// fails validation.
    pub fn from_slice(bytes: &[u8]) -> Result<Arc<dyn Classifier>, ArtifactError> {
        let artifact: Self = serde_json::from_slice(bytes)
            .map_err(|e| ArtifactError::malformed(ArtifactKind::Classifier, e))?;
        artifact
            .build()
            .map_err(|e| ArtifactError::malformed(ArtifactKind::Classifier, e))
    }

    /// The positive class: explicit, or the larger of the two labels.
    ///
    /// # Errors
    /// Returns error unless the model is binary and the positive class is
    /// one of its labels.
    pub fn resolve_positive_class(&self) -> Result<i64, ClassifierError> {
        match self.classes.as_slice() {
            [a, b] if a != b => {
                let positive = self.positive_class.unwrap_or(*a.max(b));
                if positive == *a || positive == *b {
                    Ok(positive)
                } else {
                    Err(ClassifierError::Malformed(format!(
                        "positive class {positive} is not one of {:?}",
                        self.classes
                    )))
                }
            }
            _ => Err(ClassifierError::Malformed(format!(
                "expected two distinct classes, got {:?}",
                self.classes
            ))),
        }
    }

    /// # Errors
    /// Returns the model's validation error.
    pub fn build(self) -> Result<Arc<dyn Classifier>, ClassifierError> {
        let positive = self.resolve_positive_class()?;
        let classifier: Arc<dyn Classifier> = match self.params {
            ModelParams::RandomForest { n_features, trees } => {
                Arc::new(RandomForest::new(self.classes, positive, n_features, trees)?)
            }
            ModelParams::LogisticRegression {
                coefficients,
                intercept,
                scaler,
            } => Arc::new(LogisticModel::new(
                self.classes,
                positive,
                coefficients,
                intercept,
                scaler,
            )?),
        };
        Ok(classifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGISTIC: &str = r#"{
        "kind": "logistic_regression",
        "classes": [0, 1],
        "coefficients": [0.5, -0.25],
        "intercept": 0.1
    }"#;

    #[test]
    fn test_parse_logistic_envelope() {
        let classifier = ClassifierArtifact::from_slice(LOGISTIC.as_bytes()).expect("Should parse");
        assert_eq!(classifier.n_features(), 2);
        assert_eq!(classifier.positive_class(), 1);
        assert!(classifier.describe().starts_with("logistic regression"));
    }

    #[test]
    fn test_parse_forest_envelope() {
        let json = r#"{
            "kind": "random_forest",
            "classes": [0, 1],
            "positive_class": 0,
            "n_features": 1,
            "trees": [{
                "children_left": [-1],
                "children_right": [-1],
                "feature": [-2],
                "threshold": [-2.0],
                "value": [[3.0, 1.0]]
            }]
        }"#;
        let classifier = ClassifierArtifact::from_slice(json.as_bytes()).expect("Should parse");
        assert_eq!(classifier.positive_class(), 0);
        assert_eq!(classifier.classes(), &[0, 1]);
    }

    #[test]
    fn test_positive_class_defaults_to_larger_label() {
        let artifact: ClassifierArtifact = serde_json::from_str(
            r#"{"kind": "logistic_regression", "classes": [2, 4], "coefficients": [1.0], "intercept": 0.0}"#,
        )
        .expect("Should parse");
        assert_eq!(artifact.resolve_positive_class().expect("Should resolve"), 4);
    }

    #[test]
    fn test_rejects_non_binary_or_foreign_positive_class() {
        let three = r#"{"kind": "logistic_regression", "classes": [0, 1, 2], "coefficients": [1.0], "intercept": 0.0}"#;
        assert!(matches!(
            ClassifierArtifact::from_slice(three.as_bytes()),
            Err(ArtifactError::Malformed { .. })
        ));

        let foreign = r#"{"kind": "logistic_regression", "classes": [0, 1], "positive_class": 7, "coefficients": [1.0], "intercept": 0.0}"#;
        assert!(ClassifierArtifact::from_slice(foreign.as_bytes()).is_err());

        let unknown_kind = r#"{"kind": "svm", "classes": [0, 1]}"#;
        assert!(ClassifierArtifact::from_slice(unknown_kind.as_bytes()).is_err());
    }
}
