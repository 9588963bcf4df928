//! Logistic regression adapter.
//!
//! Standardizes each feature with the training scaler, takes the linear
//! combination with the fitted coefficients, and applies the sigmoid:
//! `p = sigmoid(intercept + sum(coef_i * (x_i - mean_i) / scale_i))`.

use serde::{Deserialize, Serialize};

use crate::ports::{check_row, Classifier, ClassifierError};

/// Standard scaler parameters captured at training time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Binary logistic regression; `classes[1]` is the class modeled by the
/// sigmoid.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    classes: Vec<i64>,
    positive_class: i64,
    coefficients: Vec<f64>,
    intercept: f64,
    scaler: Option<StandardScaler>,
}

impl LogisticModel {
    /// # Errors
    /// Returns `ClassifierError::Malformed` if parameter lengths disagree or
    /// a parameter is not finite.
    pub fn new(
        classes: Vec<i64>,
        positive_class: i64,
        coefficients: Vec<f64>,
        intercept: f64,
        scaler: Option<StandardScaler>,
    ) -> Result<Self, ClassifierError> {
        let n = coefficients.len();
        if n == 0 {
            return Err(ClassifierError::Malformed("model has no coefficients".into()));
        }
        if classes.len() != 2 {
            return Err(ClassifierError::Malformed(
                "logistic regression needs exactly two classes".into(),
            ));
        }
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ClassifierError::Malformed("non-finite model parameter".into()));
        }
        if let Some(scaler) = &scaler {
            if scaler.mean.len() != n || scaler.scale.len() != n {
                return Err(ClassifierError::Malformed(
                    "scaler lengths do not match coefficient count".into(),
                ));
            }
            if scaler.scale.iter().any(|s| !s.is_finite() || *s == 0.0)
                || scaler.mean.iter().any(|m| !m.is_finite())
            {
                return Err(ClassifierError::Malformed(
                    "scaler has a zero or non-finite parameter".into(),
                ));
            }
        }

        Ok(Self {
            classes,
            positive_class,
            coefficients,
            intercept,
            scaler,
        })
    }

    /// Decision function (log-odds of `classes[1]`).
    fn logit(&self, row: &[f64]) -> f64 {
        let mut z = self.intercept;
        for (i, (&x, &coef)) in row.iter().zip(&self.coefficients).enumerate() {
            let x = match &self.scaler {
                Some(s) => (x - s.mean[i]) / s.scale[i],
                None => x,
            };
            z += coef * x;
        }
        z
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Classifier for LogisticModel {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn positive_class(&self) -> i64 {
        self.positive_class
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        check_row(row, self.n_features())?;
        let p = sigmoid(self.logit(row));
        Ok(vec![1.0 - p, p])
    }

    fn describe(&self) -> String {
        format!(
            "logistic regression: {} features, {}, classes {:?}, positive class {}",
            self.coefficients.len(),
            if self.scaler.is_some() { "standardized" } else { "unscaled" },
            self.classes,
            self.positive_class
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_at_decision_boundary() {
        let model =
            LogisticModel::new(vec![0, 1], 1, vec![2.0], -4.0, None).expect("Should build");
        let proba = model.predict_proba(&[2.0]).expect("Should predict");
        assert!((proba[1] - 0.5).abs() < 1e-12);
        // Exactly on the boundary the first class wins.
        assert_eq!(model.predict(&[2.0]).expect("Should predict"), 0);
        assert_eq!(model.predict(&[3.0]).expect("Should predict"), 1);
    }

    #[test]
    fn test_scaler_is_applied() {
        let scaler = StandardScaler {
            mean: vec![50.0],
            scale: vec![10.0],
        };
        let model = LogisticModel::new(vec![0, 1], 1, vec![1.0], 0.0, Some(scaler))
            .expect("Should build");
        let proba = model.predict_proba(&[60.0]).expect("Should predict");
        assert!((proba[1] - sigmoid(1.0)).abs() < 1e-12);
        assert!((proba[0] + proba[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_inconsistent_parameters() {
        let scaler = StandardScaler {
            mean: vec![0.0],
            scale: vec![0.0],
        };
        assert!(LogisticModel::new(vec![0, 1], 1, vec![1.0], 0.0, Some(scaler)).is_err());
        assert!(LogisticModel::new(vec![0, 1], 1, vec![], 0.0, None).is_err());
        assert!(LogisticModel::new(vec![0, 1, 2], 1, vec![1.0], 0.0, None).is_err());
        assert!(LogisticModel::new(vec![0, 1], 1, vec![f64::NAN], 0.0, None).is_err());
    }
}
