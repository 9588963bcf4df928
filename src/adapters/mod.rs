//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with storage and model formats:
//! - `filesystem`: artifact directory with SHA-256 manifest and Ed25519 signature
//! - `forest`: decision-tree ensemble classifier
//! - `logistic`: logistic regression classifier
//! - `model`: `classifier.json` decoding into a concrete classifier
//! - `sanitize`: patient-data filtering for logs

pub mod filesystem;
pub mod forest;
pub mod logistic;
pub mod model;
pub mod sanitize;
