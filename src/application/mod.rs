//! Application layer: Use cases and services.
//!
//! This module wires domain logic to the ports:
//! - `artifacts`: load, validate and cache the frozen training artifacts
//! - `input`: patient JSON to validated raw record
//! - `assembler`: raw record to schema-ordered numeric row
//! - `inference`: classification and the end-to-end risk service

mod artifacts;
mod assembler;
mod inference;
mod input;

pub use artifacts::{ArtifactCache, Artifacts};
pub use assembler::assemble;
pub use inference::{predict, Assessment, RiskService};
pub use input::parse_record;
