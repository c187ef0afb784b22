//! Field snapshots taken when a story was last generated or patched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::PatientRecord;

use super::fields::{FieldClass, FieldValue, StoryField};

/// Values of one field class at a point in time.
///
/// Snapshots are replaced wholesale; there is no per-field update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    class: FieldClass,
    values: BTreeMap<StoryField, FieldValue>,
}

impl FieldSnapshot {
    /// A snapshot with nothing captured (patient has no story yet).
    pub fn empty(class: FieldClass) -> Self {
        Self {
            class,
            values: BTreeMap::new(),
        }
    }

    /// Capture every field of `class` from the record.
    pub fn capture(record: &PatientRecord, class: FieldClass) -> Self {
        let values = class
            .fields()
            .iter()
            .map(|field| (*field, field.value_of(record)))
            .collect();
        Self { class, values }
    }

    pub fn class(&self) -> FieldClass {
        self.class
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Captured value for a field, if any.
    pub fn value(&self, field: StoryField) -> Option<&FieldValue> {
        self.values.get(&field)
    }
}
