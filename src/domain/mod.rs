//! Domain layer: Core types and logic.
//!
//! This module contains pure Rust types with no I/O.
//! Artifact-derived types are immutable once constructed.

mod encoding;
mod patient;
mod prediction;

pub use encoding::{normalize, EncodedRecord, EncoderSet, FeatureSchema, FieldEncoder};
pub use patient::{Field, FieldDomain, FieldKind, PatientRecord, RawRecord, RawValue};
pub use prediction::{PredictionResult, RiskLabel};
