//! Feature assembly: raw record to schema-ordered numeric row.

use std::collections::HashMap;

use crate::domain::{EncodedRecord, EncoderSet, FeatureSchema, RawRecord};
use crate::HeartRiskError;

/// Encode categorical fields and lay out every schema column in order.
///
/// Fields with an encoder are label-encoded; all other fields pass through
/// as numbers. Fields outside the schema are dropped.
///
/// # Errors
/// - `UnknownCategory` if a categorical value was not seen at training time
/// - `Validation` if a numeric schema field holds non-numeric text
/// - `SchemaMismatch` listing every schema column absent from `raw`
pub fn assemble(
    raw: &RawRecord,
    encoders: &EncoderSet,
    schema: &FeatureSchema,
) -> Result<EncodedRecord, HeartRiskError> {
    let mut values: HashMap<&str, f64> = HashMap::with_capacity(raw.len());

    for (name, value) in raw.iter() {
        let numeric = match encoders.get(name) {
            Some(encoder) => f64::from(encoder.encode(&value.as_text())?),
            None => match value.as_number() {
                Some(x) => x,
                None if schema.contains(name) => {
                    return Err(HeartRiskError::Validation(format!(
                        "'{name}' must be numeric"
                    )))
                }
                None => continue,
            },
        };
        values.insert(name, numeric);
    }

    let mut columns = Vec::with_capacity(schema.len());
    let mut missing = Vec::new();
    for name in schema.iter() {
        match values.get(name) {
            Some(&v) => columns.push((name.to_string(), v)),
            None => missing.push(name.to_string()),
        }
    }
    if !missing.is_empty() {
        tracing::warn!("Input is missing schema columns: {}", missing.join(", "));
        return Err(HeartRiskError::SchemaMismatch { missing });
    }

    tracing::debug!(
        "Assembled {} columns from {} input fields",
        columns.len(),
        raw.len()
    );
    Ok(EncodedRecord::from_columns(columns))
}
