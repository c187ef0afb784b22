//! Field taxonomy: which patient fields a narrative depends on, and how.
//!
//! Critical fields change the facts a story narrates (what animal, what is
//! wrong with it, what is being done). Cosmetic fields only change labels the
//! story uses for those same facts, so they can be patched in place.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::PatientRecord;

use super::{StoryError, StoryResult};

/// Tracked patient fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryField {
    Species,
    AgeRange,
    Conditions,
    Treatments,
    PatientCase,
    LocationFound,
    DateAdmitted,
}

/// The two disjoint field classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    /// Changing the value changes the story's facts
    Critical,
    /// Changing the value only changes a label in the story
    Cosmetic,
}

pub const CRITICAL_FIELDS: [StoryField; 4] = [
    StoryField::Species,
    StoryField::AgeRange,
    StoryField::Conditions,
    StoryField::Treatments,
];

pub const COSMETIC_FIELDS: [StoryField; 3] = [
    StoryField::PatientCase,
    StoryField::LocationFound,
    StoryField::DateAdmitted,
];

/// Fields that must be filled before a story is generated or patched.
pub const REQUIRED_FOR_STORY: [StoryField; 4] = [
    StoryField::PatientCase,
    StoryField::Species,
    StoryField::LocationFound,
    StoryField::DateAdmitted,
];

impl StoryField {
    pub const ALL: [StoryField; 7] = [
        StoryField::Species,
        StoryField::AgeRange,
        StoryField::Conditions,
        StoryField::Treatments,
        StoryField::PatientCase,
        StoryField::LocationFound,
        StoryField::DateAdmitted,
    ];

    /// Canonical field name.
    pub fn name(&self) -> &'static str {
        match self {
            StoryField::Species => "species",
            StoryField::AgeRange => "age_range",
            StoryField::Conditions => "conditions",
            StoryField::Treatments => "treatments",
            StoryField::PatientCase => "patient_case",
            StoryField::LocationFound => "location_found",
            StoryField::DateAdmitted => "date_admitted",
        }
    }

    /// Human-readable label for change reports.
    pub fn label(&self) -> &'static str {
        match self {
            StoryField::Species => "Species",
            StoryField::AgeRange => "Age Range",
            StoryField::Conditions => "Conditions",
            StoryField::Treatments => "Treatments",
            StoryField::PatientCase => "Case Number",
            StoryField::LocationFound => "Location Found",
            StoryField::DateAdmitted => "Date Admitted",
        }
    }

    /// Parse a canonical name or a form column name.
    pub fn from_name(name: &str) -> StoryResult<Self> {
        let field = match name.trim().to_lowercase().as_str() {
            "species" | "species_id" => StoryField::Species,
            "age_range" | "age_range_id" | "age" => StoryField::AgeRange,
            "conditions" | "patient_conditions" => StoryField::Conditions,
            "treatments" | "patient_treatments" => StoryField::Treatments,
            "patient_case" | "case_number" | "case_label" => StoryField::PatientCase,
            "location_found" | "location" => StoryField::LocationFound,
            "date_admitted" | "admission_date" => StoryField::DateAdmitted,
            _ => return Err(StoryError::UnknownField(name.to_string())),
        };
        Ok(field)
    }

    pub fn class(&self) -> FieldClass {
        match self {
            StoryField::Species
            | StoryField::AgeRange
            | StoryField::Conditions
            | StoryField::Treatments => FieldClass::Critical,
            StoryField::PatientCase | StoryField::LocationFound | StoryField::DateAdmitted => {
                FieldClass::Cosmetic
            }
        }
    }

    /// Current value of this field on a record.
    pub fn value_of(&self, record: &PatientRecord) -> FieldValue {
        match self {
            StoryField::Species => FieldValue::Id(record.species_id),
            StoryField::AgeRange => FieldValue::Id(record.age_range_id),
            StoryField::Conditions => FieldValue::Ids(record.conditions.clone()),
            StoryField::Treatments => FieldValue::Ids(record.treatments.clone()),
            StoryField::PatientCase => FieldValue::Text(record.patient_case.clone()),
            StoryField::LocationFound => FieldValue::Text(record.location_found.clone()),
            StoryField::DateAdmitted => FieldValue::Date(record.date_admitted),
        }
    }
}

impl fmt::Display for StoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FieldClass {
    /// Members of this class, in report order.
    pub fn fields(&self) -> &'static [StoryField] {
        match self {
            FieldClass::Critical => &CRITICAL_FIELDS,
            FieldClass::Cosmetic => &COSMETIC_FIELDS,
        }
    }
}

impl fmt::Display for FieldClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldClass::Critical => f.write_str("critical"),
            FieldClass::Cosmetic => f.write_str("cosmetic"),
        }
    }
}

/// Classify a field by name. Unknown names are an error.
pub fn classify(name: &str) -> StoryResult<FieldClass> {
    StoryField::from_name(name).map(|field| field.class())
}

/// A captured field value.
///
/// Equality is exact; `Ids` compares element-wise, so reordering counts as a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Id(Option<i64>),
    Ids(Vec<i64>),
    Text(String),
    Date(Option<NaiveDate>),
}

impl FieldValue {
    /// True when the value counts as "not filled in".
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Id(id) => id.is_none(),
            FieldValue::Ids(ids) => ids.is_empty(),
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::Date(date) => date.is_none(),
        }
    }
}

/// Required story fields that are blank on the record.
pub fn missing_required(record: &PatientRecord) -> Vec<StoryField> {
    REQUIRED_FOR_STORY
        .iter()
        .filter(|field| field.value_of(record).is_blank())
        .copied()
        .collect()
}
