//! Patient JSON to validated raw record.

use crate::domain::{PatientRecord, RawRecord};
use crate::HeartRiskError;

/// Parse a JSON patient object and check its numeric domains.
///
/// By default the record is taken as given: a missing attribute later fails
/// assembly with `SchemaMismatch`. With `fill_defaults`, absent attributes
/// take the form defaults, and any key that is not an input field is
/// rejected so a misspelled attribute cannot be replaced by its default.
///
/// # Errors
/// Returns `HeartRiskError::Validation` for malformed JSON, unknown keys in
/// fill mode, or out-of-domain numeric values.
pub fn parse_record(text: &str, fill_defaults: bool) -> Result<RawRecord, HeartRiskError> {
    let mut raw: RawRecord = serde_json::from_str(text).map_err(|e| {
        HeartRiskError::Validation(format!("input is not a JSON patient object: {e}"))
    })?;

    if fill_defaults {
        let unknown = raw.unknown_fields();
        if !unknown.is_empty() {
            return Err(HeartRiskError::Validation(format!(
                "unknown input fields: {}",
                unknown.join(", ")
            )));
        }
        raw.fill_from(&PatientRecord::default().to_raw_record());
        tracing::debug!("Filled form defaults; record has {} fields", raw.len());
    }

    raw.validate()
        .map_err(|errors| HeartRiskError::Validation(errors.join("; ")))?;
    Ok(raw)
}
