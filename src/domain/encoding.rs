//! Categorical encoding and the model's feature schema.
//!
//! Encoders and the schema are fixed at training time. Nothing here creates
//! categories or columns on the fly.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::HeartRiskError;

/// Normalize a raw categorical value before lookup: trimmed and lowercased.
#[must_use]
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Label encoder for one categorical field.
///
/// Category at index `i` encodes to `i`.
#[derive(Debug, Clone)]
pub struct FieldEncoder {
    field: String,
    categories: Vec<String>,
    codes: HashMap<String, u32>,
}

impl FieldEncoder {
    /// Build an encoder from its trained category list.
    ///
    /// # Errors
    /// Returns error if the list is empty, contains duplicates, or contains a
    /// category that would never match a normalized input.
    pub fn new(field: impl Into<String>, categories: Vec<String>) -> Result<Self, String> {
        let field = field.into();
        if categories.is_empty() {
            return Err(format!("encoder for '{field}' has no categories"));
        }

        let mut codes = HashMap::with_capacity(categories.len());
        for (i, category) in categories.iter().enumerate() {
            if normalize(category) != *category {
                return Err(format!(
                    "encoder for '{field}' has non-normalized category {category:?}"
                ));
            }
            let code = u32::try_from(i)
                .map_err(|_| format!("encoder for '{field}' has too many categories"))?;
            if codes.insert(category.clone(), code).is_some() {
                return Err(format!(
                    "encoder for '{field}' lists category {category:?} twice"
                ));
            }
        }

        Ok(Self {
            field,
            categories,
            codes,
        })
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Known categories, in code order.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Encode a raw value to its training-time code.
    ///
    /// # Errors
    /// Returns `HeartRiskError::UnknownCategory` if the normalized value was
    /// not seen at training time.
    pub fn encode(&self, raw: &str) -> Result<u32, HeartRiskError> {
        let value = normalize(raw);
        self.codes
            .get(&value)
            .copied()
            .ok_or_else(|| HeartRiskError::UnknownCategory {
                field: self.field.clone(),
                value,
                known: self.categories.clone(),
            })
    }

    #[must_use]
    pub fn decode(&self, code: u32) -> Option<&str> {
        self.categories.get(code as usize).map(String::as_str)
    }
}

/// All label encoders, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct EncoderSet {
    encoders: BTreeMap<String, FieldEncoder>,
}

impl EncoderSet {
    /// Build from the serialized field to categories mapping.
    ///
    /// # Errors
    /// Returns the first encoder construction error.
    pub fn from_categories(categories: BTreeMap<String, Vec<String>>) -> Result<Self, String> {
        let encoders = categories
            .into_iter()
            .map(|(field, cats)| -> Result<(String, FieldEncoder), String> {
                Ok((field.clone(), FieldEncoder::new(field, cats)?))
            })
            .collect::<Result<_, String>>()?;
        Ok(Self { encoders })
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldEncoder> {
        self.encoders.get(field)
    }

    #[must_use]
    pub fn is_categorical(&self, field: &str) -> bool {
        self.encoders.contains_key(field)
    }

    /// Encode a value of the named categorical field.
    ///
    /// # Errors
    /// Returns `Validation` if the field has no encoder and
    /// `UnknownCategory` if the value is not a known category.
    pub fn encode(&self, field: &str, raw: &str) -> Result<u32, HeartRiskError> {
        self.get(field)
            .ok_or_else(|| {
                HeartRiskError::Validation(format!("'{field}' is not a categorical field"))
            })?
            .encode(raw)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldEncoder> {
        self.encoders.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}

/// Ordered feature names the classifier was trained on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// # Errors
    /// Returns error if the schema is empty or names a column twice.
    pub fn new(names: Vec<String>) -> Result<Self, String> {
        if names.is_empty() {
            return Err("feature schema is empty".into());
        }
        let mut seen = HashSet::with_capacity(names.len());
        if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(format!("feature schema lists '{dup}' twice"));
        }
        Ok(Self { names })
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Numeric model input in schema order.
///
/// Only the feature assembler constructs these, so the column set always
/// equals the schema it was assembled against.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRecord {
    columns: Vec<(String, f64)>,
}

impl EncodedRecord {
    pub(crate) fn from_columns(columns: Vec<(String, f64)>) -> Self {
        Self { columns }
    }

    /// Feature values as a single model row.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.columns.iter().map(|(_, v)| *v).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), *v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// Serialized as a JSON object whose key order is the schema order.
impl Serialize for EncodedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
