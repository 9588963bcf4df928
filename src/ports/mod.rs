//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the pipeline and its collaborators (artifact storage, the trained
//! classifier).

mod artifact_store;
mod classifier;

pub use artifact_store::{ArtifactError, ArtifactKind, ArtifactStore};
pub use classifier::{check_row, Classifier, ClassifierError};
