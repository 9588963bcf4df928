//! Artifact loading and process-wide caching.
//!
//! [`Artifacts`] is the immutable context every request runs against. It is
//! loaded through an [`ArtifactStore`], validated as a whole, and cached by
//! [`ArtifactCache`] so storage is read at most once per process.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::adapters::model::ClassifierArtifact;
use crate::domain::{EncoderSet, FeatureSchema, Field, FieldKind};
use crate::ports::{ArtifactError, ArtifactKind, ArtifactStore, Classifier};
use crate::HeartRiskError;

/// The three frozen training artifacts, checked for mutual consistency.
#[derive(Debug, Clone)]
pub struct Artifacts {
    classifier: Arc<dyn Classifier>,
    encoders: EncoderSet,
    schema: FeatureSchema,
}

impl Artifacts {
    /// Load and validate all artifacts from `store`.
    ///
    /// # Errors
    /// Returns `ArtifactError` if any artifact is missing, unreadable,
    /// malformed, or inconsistent with the others.
    pub fn load<S: ArtifactStore + ?Sized>(store: &S) -> Result<Self, ArtifactError> {
        tracing::info!("Loading model artifacts from {}", store.location());

        let classifier = ClassifierArtifact::from_slice(&store.fetch(ArtifactKind::Classifier)?)?;

        let categories: BTreeMap<String, Vec<String>> =
            serde_json::from_slice(&store.fetch(ArtifactKind::Encoders)?)
                .map_err(|e| ArtifactError::malformed(ArtifactKind::Encoders, e))?;
        let encoders = EncoderSet::from_categories(categories)
            .map_err(|e| ArtifactError::malformed(ArtifactKind::Encoders, e))?;

        let names: Vec<String> = serde_json::from_slice(&store.fetch(ArtifactKind::FeatureSchema)?)
            .map_err(|e| ArtifactError::malformed(ArtifactKind::FeatureSchema, e))?;
        let schema = FeatureSchema::new(names)
            .map_err(|e| ArtifactError::malformed(ArtifactKind::FeatureSchema, e))?;

        let artifacts = Self::new(classifier, encoders, schema)?;
        tracing::info!(
            "Loaded artifacts: {} features, {} encoders, {}",
            artifacts.schema.len(),
            artifacts.encoders.len(),
            artifacts.classifier.describe()
        );
        Ok(artifacts)
    }

    /// Assemble artifacts, rejecting combinations that cannot serve requests.
    ///
    /// # Errors
    /// Returns `ArtifactError::Inconsistent` describing the first conflict.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        encoders: EncoderSet,
        schema: FeatureSchema,
    ) -> Result<Self, ArtifactError> {
        if classifier.n_features() != schema.len() {
            return Err(ArtifactError::Inconsistent(format!(
                "classifier expects {} features but the schema lists {}",
                classifier.n_features(),
                schema.len()
            )));
        }

        for name in schema.iter() {
            let field = Field::from_name(name).ok_or_else(|| {
                ArtifactError::Inconsistent(format!("schema column '{name}' is not a known input field"))
            })?;
            match (field.kind(), encoders.is_categorical(name)) {
                (FieldKind::Categorical, false) => {
                    return Err(ArtifactError::Inconsistent(format!(
                        "categorical column '{name}' has no encoder"
                    )))
                }
                (FieldKind::Numeric, true) => {
                    return Err(ArtifactError::Inconsistent(format!(
                        "numeric column '{name}' has an encoder"
                    )))
                }
                _ => {}
            }
        }

        for encoder in encoders.iter() {
            if !schema.contains(encoder.field()) {
                tracing::warn!("Encoder for '{}' is not used by the schema", encoder.field());
            }
        }

        Ok(Self {
            classifier,
            encoders,
            schema,
        })
    }

    #[must_use]
    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    #[must_use]
    pub fn encoders(&self) -> &EncoderSet {
        &self.encoders
    }

    #[must_use]
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }
}

/// Loads artifacts on first use and hands out the same instance afterwards.
///
/// Concurrent first callers serialize on an init lock; exactly one of them
/// reads storage and the rest block until the value is cached. A failed load
/// is not cached, so the next call retries against storage.
pub struct ArtifactCache<S> {
    store: S,
    cell: OnceLock<Arc<Artifacts>>,
    init: Mutex<()>,
}

impl<S: ArtifactStore> ArtifactCache<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            cell: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Cached artifacts, loading them if this is the first use.
    ///
    /// # Errors
    /// Returns `HeartRiskError::ArtifactLoad` if loading fails.
    pub fn get(&self) -> Result<Arc<Artifacts>, HeartRiskError> {
        if let Some(artifacts) = self.cell.get() {
            return Ok(Arc::clone(artifacts));
        }

        // The guarded value is `()`, so a poisoned lock carries no broken state.
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(artifacts) = self.cell.get() {
            return Ok(Arc::clone(artifacts));
        }

        let artifacts = Artifacts::load(&self.store).map_err(|e| {
            tracing::error!("Artifact load failed: {e}");
            HeartRiskError::ArtifactLoad(e)
        })?;
        Ok(Arc::clone(self.cell.get_or_init(|| Arc::new(artifacts))))
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::filesystem::tests::fixture_dir;
    use crate::adapters::filesystem::{FsArtifactStore, IntegrityPolicy};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// In-memory store that counts fetches.
    pub(crate) struct MemoryStore {
        pub(crate) classifier: Vec<u8>,
        pub(crate) encoders: Vec<u8>,
        pub(crate) features: Vec<u8>,
        pub(crate) fetches: AtomicUsize,
    }

    impl MemoryStore {
        pub(crate) fn fixture() -> Self {
            let read = |kind: ArtifactKind| {
                std::fs::read(fixture_dir().join(kind.file_name())).expect("Should read fixture")
            };
            Self {
                classifier: read(ArtifactKind::Classifier),
                encoders: read(ArtifactKind::Encoders),
                features: read(ArtifactKind::FeatureSchema),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    impl ArtifactStore for MemoryStore {
        fn fetch(&self, kind: ArtifactKind) -> Result<Vec<u8>, ArtifactError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            // Widen the race window for concurrent first access.
            thread::sleep(std::time::Duration::from_millis(5));
            Ok(match kind {
                ArtifactKind::Classifier => self.classifier.clone(),
                ArtifactKind::Encoders => self.encoders.clone(),
                ArtifactKind::FeatureSchema => self.features.clone(),
            })
        }

        fn location(&self) -> String {
            "memory".into()
        }
    }

    #[test]
    fn test_load_fixture_artifacts() {
        let store = FsArtifactStore::open(fixture_dir(), &IntegrityPolicy::strict(None))
            .expect("Should open");
        let artifacts = Artifacts::load(&store).expect("Should load");
        assert_eq!(artifacts.schema().len(), 13);
        assert_eq!(artifacts.encoders().len(), 7);
        assert_eq!(artifacts.classifier().n_features(), 13);
        assert_eq!(artifacts.classifier().positive_class(), 1);
    }

    #[test]
    fn test_cache_reads_storage_once_under_contention() {
        let cache = Arc::new(ArtifactCache::new(MemoryStore::fixture()));
        assert!(!cache.is_loaded());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get().expect("Should load"))
            })
            .collect();
        let loaded: Vec<Arc<Artifacts>> = handles
            .into_iter()
            .map(|h| h.join().expect("Thread should not panic"))
            .collect();

        assert!(cache.is_loaded());
        // One fetch per artifact, no matter how many callers raced.
        assert_eq!(cache.store().fetches.load(Ordering::SeqCst), 3);
        assert!(loaded.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

        cache.get().expect("Should hit cache");
        assert_eq!(cache.store().fetches.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let mut store = MemoryStore::fixture();
        store.features = b"not json".to_vec();
        let cache = ArtifactCache::new(store);

        let err = cache.get().expect_err("Should fail");
        assert_eq!(err.category(), "ArtifactLoad");
        assert!(!cache.is_loaded());

        // Retry reads storage again rather than replaying the failure.
        let before = cache.store().fetches.load(Ordering::SeqCst);
        let _ = cache.get();
        assert!(cache.store().fetches.load(Ordering::SeqCst) > before);
    }

    #[test]
    fn test_schema_must_match_classifier_width() {
        let mut store = MemoryStore::fixture();
        store.features = br#"["age", "sex"]"#.to_vec();
        assert!(matches!(
            Artifacts::load(&store),
            Err(ArtifactError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_categorical_schema_column_needs_encoder() {
        let mut store = MemoryStore::fixture();
        store.encoders = br#"{"sex": ["female", "male"]}"#.to_vec();
        let err = Artifacts::load(&store).expect_err("Should fail");
        assert!(err.to_string().contains("has no encoder"), "{err}");
    }

    #[test]
    fn test_numeric_schema_column_must_not_have_encoder() {
        let mut store = MemoryStore::fixture();
        let mut encoders: std::collections::BTreeMap<String, Vec<String>> =
            serde_json::from_slice(&store.encoders).expect("Should parse fixture");
        encoders.insert("age".into(), vec!["adult".into(), "senior".into()]);
        store.encoders = serde_json::to_vec(&encoders).expect("Should serialize");

        let err = Artifacts::load(&store).expect_err("Should fail");
        assert!(matches!(err, ArtifactError::Inconsistent(_)));
        assert!(err.to_string().contains("numeric column 'age' has an encoder"), "{err}");
    }

    #[test]
    fn test_unknown_schema_column_is_rejected() {
        let mut store = MemoryStore::fixture();
        let mut names: Vec<String> =
            serde_json::from_slice(&store.features).expect("Should parse fixture");
        names[0] = "height".into();
        store.features = serde_json::to_vec(&names).expect("Should serialize");
        let err = Artifacts::load(&store).expect_err("Should fail");
        assert!(err.to_string().contains("'height'"), "{err}");
    }

    #[test]
    fn test_malformed_encoder_is_rejected() {
        let mut store = MemoryStore::fixture();
        store.encoders = br#"{"sex": ["Male", "female"]}"#.to_vec();
        assert!(matches!(
            Artifacts::load(&store),
            Err(ArtifactError::Malformed {
                artifact: ArtifactKind::Encoders,
                ..
            })
        ));
    }
}
