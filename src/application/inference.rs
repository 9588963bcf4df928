//! Inference service: Orchestrates encoding, assembly and classification.
//!
//! This service coordinates:
//! - Artifact loading (once per process)
//! - Categorical encoding and schema ordering
//! - Classification and positive-class probability

use std::sync::Arc;

use serde::Serialize;

use super::artifacts::{ArtifactCache, Artifacts};
use super::assembler::assemble;
use crate::domain::{EncodedRecord, PatientRecord, PredictionResult, RawRecord, RiskLabel};
use crate::ports::{ArtifactStore, Classifier, ClassifierError};
use crate::HeartRiskError;

/// Run the classifier on one assembled row.
///
/// The label comes from the classifier's own decision; the probability is
/// its unmodified estimate for the positive class.
///
/// # Errors
/// Returns `HeartRiskError::Inference` if the classifier rejects the row or
/// returns a probability outside `[0, 1]`.
pub fn predict(
    encoded: &EncodedRecord,
    classifier: &dyn Classifier,
) -> Result<PredictionResult, HeartRiskError> {
    let row = encoded.values();
    let positive = classifier.positive_class();

    let label = classifier.predict(&row)?;
    let proba = classifier.predict_proba(&row)?;

    let index = classifier
        .classes()
        .iter()
        .position(|&c| c == positive)
        .ok_or_else(|| {
            ClassifierError::Malformed(format!("positive class {positive} not among classes"))
        })?;
    let probability = proba.get(index).copied().ok_or_else(|| {
        ClassifierError::Malformed("probability/class length mismatch".into())
    })?;
    if !(0.0..=1.0).contains(&probability) {
        return Err(ClassifierError::InvalidProbability(probability).into());
    }

    let label = if label == positive {
        RiskLabel::AtRisk
    } else {
        RiskLabel::NotAtRisk
    };
    Ok(PredictionResult::new(label, probability))
}

/// Outcome of one request: what the model saw and what it answered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub encoded: EncodedRecord,
    pub result: PredictionResult,
}

/// Service for running risk predictions against cached artifacts.
///
/// Cheap to share: wrap in an `Arc` and call from any number of threads.
pub struct RiskService<S: ArtifactStore> {
    artifacts: ArtifactCache<S>,
}

impl<S: ArtifactStore> RiskService<S> {
    /// Create a service; artifacts are loaded on first use.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            artifacts: ArtifactCache::new(store),
        }
    }

    /// Load artifacts now so that a broken deployment fails at startup.
    ///
    /// # Errors
    /// Returns `HeartRiskError::ArtifactLoad` if loading fails.
    pub fn warm_up(&self) -> Result<Arc<Artifacts>, HeartRiskError> {
        self.artifacts.get()
    }

    /// # Errors
    /// Returns `HeartRiskError::ArtifactLoad` if loading fails.
    pub fn artifacts(&self) -> Result<Arc<Artifacts>, HeartRiskError> {
        self.artifacts.get()
    }

    pub fn store(&self) -> &S {
        self.artifacts.store()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.artifacts.is_loaded()
    }

    /// Run the full pipeline on a raw record.
    ///
    /// # Errors
    /// Returns the first failure; no partial result is produced.
    pub fn assess(&self, raw: &RawRecord) -> Result<Assessment, HeartRiskError> {
        let artifacts = self.artifacts.get()?;

        tracing::debug!("Encoding {} input fields...", raw.len());
        let encoded = assemble(raw, artifacts.encoders(), artifacts.schema())?;

        tracing::debug!("Running classifier...");
        let result = predict(&encoded, artifacts.classifier())?;

        tracing::info!(
            "Prediction complete: label={}, probability={:.2}%",
            result.label,
            result.probability * 100.0
        );
        Ok(Assessment { encoded, result })
    }

    /// Validate a typed patient record, then run the pipeline.
    ///
    /// # Errors
    /// Returns `HeartRiskError::Validation` listing every out-of-domain value,
    /// or any pipeline failure.
    pub fn assess_patient(&self, patient: &PatientRecord) -> Result<Assessment, HeartRiskError> {
        patient
            .validate()
            .map_err(|errors| HeartRiskError::Validation(errors.join("; ")))?;
        self.assess(&patient.to_raw_record())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::filesystem::tests::fixture_dir;
    use crate::adapters::filesystem::{FsArtifactStore, IntegrityPolicy};
    use crate::adapters::logistic::LogisticModel;
    use crate::application::artifacts::tests::MemoryStore;
    use crate::domain::Field;
    use std::thread;

    fn create_test_service() -> RiskService<FsArtifactStore> {
        let store = FsArtifactStore::open(fixture_dir(), &IntegrityPolicy::strict(None))
            .expect("Fixture should open");
        RiskService::new(store)
    }

    fn high_risk_patient() -> PatientRecord {
        PatientRecord {
            age: 63,
            cp: "asymptomatic".into(),
            exang: "yes".into(),
            ca: 2,
            thal: "reversible defect".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_patient_is_not_at_risk() {
        let service = create_test_service();
        let assessment = service
            .assess_patient(&PatientRecord::default())
            .expect("Should run inference");

        // Mean of the three fixture trees' leaf distributions: 10/70, 15/85, 30/90.
        let expected = (10.0 / 70.0 + 15.0 / 85.0 + 30.0 / 90.0) / 3.0;
        assert_eq!(assessment.result.label, RiskLabel::NotAtRisk);
        assert!((assessment.result.probability - expected).abs() < 1e-12);
        assert_eq!(assessment.result.percentage(), "21.76%");
    }

    #[test]
    fn test_high_risk_patient() {
        let service = create_test_service();
        let assessment = service
            .assess_patient(&high_risk_patient())
            .expect("Should run inference");

        let expected = (45.0 / 50.0 + 40.0 / 43.0 + 70.0 / 100.0) / 3.0;
        assert_eq!(assessment.result.label, RiskLabel::AtRisk);
        assert!((assessment.result.probability - expected).abs() < 1e-12);
    }

    #[test]
    fn test_mixed_case_input_is_identical() {
        let service = create_test_service();
        let lower = service
            .assess_patient(&PatientRecord::default())
            .expect("Should run inference");
        let mixed = service
            .assess_patient(&PatientRecord {
                sex: "Male".into(),
                cp: " Typical Angina".into(),
                ..Default::default()
            })
            .expect("Should run inference");
        assert_eq!(lower, mixed);
    }

    #[test]
    fn test_unknown_chest_pain_produces_no_prediction() {
        let service = create_test_service();
        let err = service
            .assess_patient(&PatientRecord {
                cp: "chest pain".into(),
                ..Default::default()
            })
            .expect_err("Should fail");
        assert_eq!(err.category(), "UnknownCategory");
        assert!(err.to_string().contains("chest pain"));
    }

    #[test]
    fn test_unknown_sex_fails() {
        let service = create_test_service();
        let mut raw = PatientRecord::default().to_raw_record();
        raw.insert("sex", "unknown");
        assert!(matches!(
            service.assess(&raw),
            Err(HeartRiskError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_missing_thal_fails() {
        let service = create_test_service();
        let mut raw = PatientRecord::default().to_raw_record();
        raw.remove("thal");
        assert!(matches!(
            service.assess(&raw),
            Err(HeartRiskError::SchemaMismatch { ref missing }) if missing == &["thal"]
        ));
    }

    #[test]
    fn test_out_of_domain_patient_is_rejected_before_encoding() {
        let service = create_test_service();
        let err = service
            .assess_patient(&PatientRecord {
                age: 95,
                ..Default::default()
            })
            .expect_err("Should fail");
        assert_eq!(err.category(), "Validation");
        assert!(!service.is_ready(), "validation runs before artifacts load");
    }

    #[test]
    fn test_every_domain_option_is_predictable() {
        let service = create_test_service();
        for field in Field::ALL {
            let crate::domain::FieldDomain::Options(options) = field.domain() else {
                continue;
            };
            for option in options {
                let mut raw = PatientRecord::default().to_raw_record();
                raw.insert(field.name(), *option);
                let assessment = service.assess(&raw).expect("Should run inference");
                let p = assessment.result.probability;
                assert!((0.0..=1.0).contains(&p), "{field}={option} gave {p}");
            }
        }
    }

    #[test]
    fn test_boundary_values_are_predictable() {
        let service = create_test_service();
        let low = PatientRecord {
            age: 20,
            trestbps: 80,
            chol: 100,
            thalach: 60,
            oldpeak: 0.0,
            ca: 0,
            ..Default::default()
        };
        let high = PatientRecord {
            age: 90,
            trestbps: 200,
            chol: 400,
            thalach: 220,
            oldpeak: 6.0,
            ca: 3,
            ..Default::default()
        };
        for patient in [low, high] {
            let p = service
                .assess_patient(&patient)
                .expect("Should run inference")
                .result
                .probability;
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_concurrent_requests_share_artifacts() {
        let service = Arc::new(RiskService::new(MemoryStore::fixture()));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let service = Arc::clone(&service);
                thread::spawn(move || {
                    let patient = if i % 2 == 0 {
                        PatientRecord::default()
                    } else {
                        high_risk_patient()
                    };
                    service.assess_patient(&patient).expect("Should run inference")
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("Thread should not panic");
        }
        let artifacts = service.artifacts().expect("Should be cached");
        assert_eq!(artifacts.schema().len(), 13);
    }

    #[test]
    fn test_predict_rejects_shape_mismatch() {
        let model = LogisticModel::new(vec![0, 1], 1, vec![1.0, 1.0], 0.0, None)
            .expect("Should build");
        let encoded = EncodedRecord::from_columns(vec![("age".into(), 50.0)]);
        let err = predict(&encoded, &model).expect_err("Should fail");
        assert_eq!(err.category(), "Inference");
    }

    #[test]
    fn test_predict_honors_explicit_positive_class() {
        // Class 0 declared positive: a confident class-1 prediction is not at risk.
        let model =
            LogisticModel::new(vec![0, 1], 0, vec![1.0], 0.0, None).expect("Should build");
        let encoded = EncodedRecord::from_columns(vec![("age".into(), 5.0)]);
        let result = predict(&encoded, &model).expect("Should predict");
        assert_eq!(result.label, RiskLabel::NotAtRisk);
        assert!(result.probability < 0.01);
    }
}
