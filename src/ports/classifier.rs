//! Classifier port: Trait for the frozen binary classifier.
//!
//! This trait abstracts the model family (tree ensemble, linear model) from
//! the inference pipeline.

/// Errors raised when a classifier rejects its input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifierError {
    #[error("Feature count mismatch: got {got}, expected {expected}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("Feature {index} is not a finite number ({value})")]
    NonFinite { index: usize, value: f64 },

    #[error("Probability {0} outside [0, 1]")]
    InvalidProbability(f64),

    #[error("Malformed model: {0}")]
    Malformed(String),
}

/// Trait for a trained binary classifier.
///
/// Implementations are immutable after construction and shared across
/// threads.
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// Number of input columns the model was trained on.
    fn n_features(&self) -> usize;

    /// Class labels, in the column order of `predict_proba`.
    fn classes(&self) -> &[i64];

    /// The class that means "at risk".
    fn positive_class(&self) -> i64;

    /// Class likelihoods for one row, aligned with `classes()`.
    ///
    /// # Errors
    /// Returns `ClassifierError` if the row does not fit the model.
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ClassifierError>;

    /// Predicted class label for one row.
    ///
    /// The default picks the most likely class, the first one on ties.
    ///
    /// # Errors
    /// Returns `ClassifierError` if the row does not fit the model.
    fn predict(&self, row: &[f64]) -> Result<i64, ClassifierError> {
        let proba = self.predict_proba(row)?;
        let best = proba
            .iter()
            .enumerate()
            .fold(None::<(usize, f64)>, |best, (i, &p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
            .map(|(i, _)| i)
            .ok_or_else(|| ClassifierError::Malformed("model has no classes".into()))?;
        self.classes()
            .get(best)
            .copied()
            .ok_or_else(|| ClassifierError::Malformed("probability/class length mismatch".into()))
    }

    /// One-line summary for diagnostics.
    fn describe(&self) -> String;
}

/// Reject rows of the wrong width or with non-finite values.
///
/// # Errors
/// Returns `ShapeMismatch` or `NonFinite`.
pub fn check_row(row: &[f64], n_features: usize) -> Result<(), ClassifierError> {
    if row.len() != n_features {
        return Err(ClassifierError::ShapeMismatch {
            expected: n_features,
            got: row.len(),
        });
    }
    if let Some((index, &value)) = row.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(ClassifierError::NonFinite { index, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(Vec<f64>);

    impl Classifier for Fixed {
        fn n_features(&self) -> usize {
            1
        }
        fn classes(&self) -> &[i64] {
            &[0, 1]
        }
        fn positive_class(&self) -> i64 {
            1
        }
        fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ClassifierError> {
            check_row(row, 1)?;
            Ok(self.0.clone())
        }
        fn describe(&self) -> String {
            "fixed".into()
        }
    }

    #[test]
    fn test_default_predict_takes_argmax() {
        assert_eq!(Fixed(vec![0.2, 0.8]).predict(&[0.0]).expect("Should predict"), 1);
        assert_eq!(Fixed(vec![0.7, 0.3]).predict(&[0.0]).expect("Should predict"), 0);
    }

    #[test]
    fn test_default_predict_tie_goes_to_first_class() {
        assert_eq!(Fixed(vec![0.5, 0.5]).predict(&[0.0]).expect("Should predict"), 0);
    }

    #[test]
    fn test_check_row() {
        assert!(check_row(&[1.0, 2.0], 2).is_ok());
        assert_eq!(
            check_row(&[1.0], 2),
            Err(ClassifierError::ShapeMismatch {
                expected: 2,
                got: 1
            })
        );
        assert!(matches!(
            check_row(&[1.0, f64::NAN], 2),
            Err(ClassifierError::NonFinite { index: 1, .. })
        ));
    }
}
