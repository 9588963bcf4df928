//! Patient input types for heart disease risk prediction.
//!
//! Based on the 13 clinical attributes of the UCI heart disease dataset.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Whether an attribute is fed to the model as-is or through a label encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Categorical,
}

/// Documented input domain of an attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDomain {
    /// Inclusive numeric range. `step` of 1.0 means integers only.
    Range { min: f64, max: f64, step: f64 },
    /// Fixed option list offered to the user.
    Options(&'static [&'static str]),
}

/// The clinical attributes collected for one patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Age,
    Sex,
    ChestPain,
    RestingBp,
    Cholesterol,
    FastingBloodSugar,
    RestEcg,
    MaxHeartRate,
    ExerciseAngina,
    StDepression,
    StSlope,
    MajorVessels,
    Thalassemia,
}

impl Field {
    /// All attributes, in input form order.
    pub const ALL: [Field; 13] = [
        Field::Age,
        Field::Sex,
        Field::ChestPain,
        Field::RestingBp,
        Field::Cholesterol,
        Field::FastingBloodSugar,
        Field::RestEcg,
        Field::MaxHeartRate,
        Field::ExerciseAngina,
        Field::StDepression,
        Field::StSlope,
        Field::MajorVessels,
        Field::Thalassemia,
    ];

    /// Column name used by the model artifacts.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Sex => "sex",
            Self::ChestPain => "cp",
            Self::RestingBp => "trestbps",
            Self::Cholesterol => "chol",
            Self::FastingBloodSugar => "fbs",
            Self::RestEcg => "restecg",
            Self::MaxHeartRate => "thalach",
            Self::ExerciseAngina => "exang",
            Self::StDepression => "oldpeak",
            Self::StSlope => "slope",
            Self::MajorVessels => "ca",
            Self::Thalassemia => "thal",
        }
    }

    /// Look up an attribute by its column name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Human-readable label.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Age => "Age (years)",
            Self::Sex => "Sex",
            Self::ChestPain => "Chest pain type",
            Self::RestingBp => "Resting blood pressure (mmHg)",
            Self::Cholesterol => "Serum cholesterol (mg/dl)",
            Self::FastingBloodSugar => "Fasting blood sugar > 120 mg/dl",
            Self::RestEcg => "Resting ECG result",
            Self::MaxHeartRate => "Maximum heart rate achieved",
            Self::ExerciseAngina => "Exercise induced angina",
            Self::StDepression => "ST depression induced by exercise",
            Self::StSlope => "Slope of peak exercise ST segment",
            Self::MajorVessels => "Major vessels colored by fluoroscopy",
            Self::Thalassemia => "Thalassemia",
        }
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self.domain() {
            FieldDomain::Range { .. } => FieldKind::Numeric,
            FieldDomain::Options(_) => FieldKind::Categorical,
        }
    }

    #[must_use]
    pub fn domain(&self) -> FieldDomain {
        const fn ints(min: f64, max: f64) -> FieldDomain {
            FieldDomain::Range { min, max, step: 1.0 }
        }

        match self {
            Self::Age => ints(20.0, 90.0),
            Self::Sex => FieldDomain::Options(&["male", "female"]),
            Self::ChestPain => FieldDomain::Options(&[
                "typical angina",
                "atypical angina",
                "non-anginal pain",
                "asymptomatic",
            ]),
            Self::RestingBp => ints(80.0, 200.0),
            Self::Cholesterol => ints(100.0, 400.0),
            Self::FastingBloodSugar => FieldDomain::Options(&["false", "true"]),
            Self::RestEcg => FieldDomain::Options(&[
                "normal",
                "st-t wave abnormality",
                "left ventricular hypertrophy",
            ]),
            Self::MaxHeartRate => ints(60.0, 220.0),
            Self::ExerciseAngina => FieldDomain::Options(&["no", "yes"]),
            Self::StDepression => FieldDomain::Range {
                min: 0.0,
                max: 6.0,
                step: 0.1,
            },
            Self::StSlope => FieldDomain::Options(&["upsloping", "flat", "downsloping"]),
            Self::MajorVessels => ints(0.0, 3.0),
            Self::Thalassemia => {
                FieldDomain::Options(&["normal", "fixed defect", "reversible defect"])
            }
        }
    }

    /// Check a raw value against the documented numeric domain.
    ///
    /// Categorical values are not checked here: membership is decided by the
    /// trained label encoder, not by the form's option list.
    ///
    /// # Errors
    /// Returns a description of the violation.
    pub fn check(&self, value: &RawValue) -> Result<(), String> {
        let FieldDomain::Range { min, max, step } = self.domain() else {
            return Ok(());
        };

        let Some(x) = value.as_number() else {
            return Err(format!("{} must be numeric, got {:?}", self.name(), value.as_text()));
        };
        if !(min..=max).contains(&x) {
            return Err(format!("{} {x} out of range [{min}, {max}]", self.name()));
        }
        let steps = (x - min) / step;
        if (steps - steps.round()).abs() > 1e-6 {
            return Err(format!("{} {x} is not a multiple of {step}", self.name()));
        }
        Ok(())
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single raw input value: a number or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Text form used for categorical lookup.
    ///
    /// Integral numbers render without a fractional part, so `1` becomes `"1"`.
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s),
            Self::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                Cow::Owned(format!("{}", *n as i64))
            }
            Self::Number(n) => Cow::Owned(n.to_string()),
        }
    }

    /// Numeric form; text is parsed after trimming.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for RawValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Unordered field name to raw value mapping, one per prediction request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one for that field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Option<RawValue> {
        self.fields.insert(name.into(), value.into())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<RawValue> {
        self.fields.remove(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fill in every field absent here from `defaults`.
    pub fn fill_from(&mut self, defaults: &RawRecord) {
        for (name, value) in &defaults.fields {
            self.fields
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Names present here that are not one of the known input fields.
    #[must_use]
    pub fn unknown_fields(&self) -> Vec<&str> {
        self.fields
            .keys()
            .map(String::as_str)
            .filter(|name| Field::from_name(name).is_none())
            .collect()
    }

    /// Validate the numeric domains of every known attribute present.
    ///
    /// Unknown fields are left for the feature assembler to drop.
    ///
    /// # Errors
    /// Returns validation errors as a vector of strings.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self
            .iter()
            .filter_map(|(name, value)| Field::from_name(name).map(|f| f.check(value)))
            .filter_map(Result::err)
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Typed patient input: one field per documented attribute.
///
/// Categorical attributes stay as raw strings so that values outside the
/// trained category set reach the encoder and fail there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatientRecord {
    /// Age in years (20-90)
    pub age: u32,

    /// male / female
    pub sex: String,

    /// Chest pain type
    pub cp: String,

    /// Resting blood pressure in mmHg (80-200)
    pub trestbps: u32,

    /// Serum cholesterol in mg/dl (100-400)
    pub chol: u32,

    /// Fasting blood sugar above 120 mg/dl: "true" / "false"
    pub fbs: String,

    /// Resting electrocardiogram result
    pub restecg: String,

    /// Maximum heart rate achieved (60-220)
    pub thalach: u32,

    /// Exercise induced angina: "yes" / "no"
    pub exang: String,

    /// ST depression induced by exercise relative to rest (0.0-6.0, step 0.1)
    pub oldpeak: f64,

    /// Slope of the peak exercise ST segment
    pub slope: String,

    /// Number of major vessels colored by fluoroscopy (0-3)
    pub ca: u32,

    /// Thalassemia result
    pub thal: String,
}

impl Default for PatientRecord {
    /// Initial values of the clinical input form.
    fn default() -> Self {
        Self {
            age: 50,
            sex: "male".into(),
            cp: "typical angina".into(),
            trestbps: 130,
            chol: 250,
            fbs: "false".into(),
            restecg: "normal".into(),
            thalach: 150,
            exang: "no".into(),
            oldpeak: 1.0,
            slope: "upsloping".into(),
            ca: 0,
            thal: "normal".into(),
        }
    }
}

impl PatientRecord {
    /// Convert into the loosely typed record consumed by the pipeline.
    #[must_use]
    pub fn to_raw_record(&self) -> RawRecord {
        Field::ALL
            .into_iter()
            .map(|field| (field.name(), self.value(field)))
            .collect()
    }

    fn value(&self, field: Field) -> RawValue {
        match field {
            Field::Age => self.age.into(),
            Field::Sex => self.sex.as_str().into(),
            Field::ChestPain => self.cp.as_str().into(),
            Field::RestingBp => self.trestbps.into(),
            Field::Cholesterol => self.chol.into(),
            Field::FastingBloodSugar => self.fbs.as_str().into(),
            Field::RestEcg => self.restecg.as_str().into(),
            Field::MaxHeartRate => self.thalach.into(),
            Field::ExerciseAngina => self.exang.as_str().into(),
            Field::StDepression => self.oldpeak.into(),
            Field::StSlope => self.slope.as_str().into(),
            Field::MajorVessels => self.ca.into(),
            Field::Thalassemia => self.thal.as_str().into(),
        }
    }

    /// Validate that all numeric attributes are within their documented ranges.
    ///
    /// # Errors
    /// Returns validation errors as a vector of strings.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        self.to_raw_record().validate()
    }
}
