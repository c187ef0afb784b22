//! Drift detection between a record and its last story snapshot.

use serde::{Deserialize, Serialize};

use crate::models::PatientRecord;

use super::fields::{FieldClass, StoryField};
use super::snapshot::FieldSnapshot;

/// Fields of one class whose value moved away from the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub class: FieldClass,
    pub changed: Vec<StoryField>,
}

impl ChangeReport {
    pub fn empty(class: FieldClass) -> Self {
        Self {
            class,
            changed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Labels for display ("Species", "Case Number", ...).
    pub fn labels(&self) -> Vec<&'static str> {
        self.changed.iter().map(|field| field.label()).collect()
    }
}

/// Compare the record's `class` fields against a snapshot.
///
/// A record without a story never drifts. A field the snapshot never
/// captured counts as changed.
pub fn detect(record: &PatientRecord, snapshot: &FieldSnapshot, class: FieldClass) -> ChangeReport {
    if !record.has_story() {
        return ChangeReport::empty(class);
    }

    if snapshot.class() != class {
        tracing::warn!(
            expected = %class,
            found = %snapshot.class(),
            "Snapshot class mismatch, treating every field as changed"
        );
    }

    let changed: Vec<StoryField> = class
        .fields()
        .iter()
        .filter(|field| {
            let current = field.value_of(record);
            snapshot.class() != class || snapshot.value(**field) != Some(&current)
        })
        .copied()
        .collect();

    if !changed.is_empty() {
        tracing::debug!(class = %class, fields = ?changed, "Story drift detected");
    }

    ChangeReport { class, changed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn storied_record() -> PatientRecord {
        let mut record = PatientRecord::new("BAEA 083".into());
        record.species_id = Some(1);
        record.age_range_id = Some(5);
        record.conditions = vec![3, 4, 5];
        record.treatments = vec![1, 3];
        record.location_found = "Campbell River".into();
        record.date_admitted = NaiveDate::from_ymd_opt(2024, 3, 28);
        record.set_story(Some("An eagle from Campbell River.".into()));
        record
    }

    #[test]
    fn test_no_drift_right_after_capture() {
        let record = storied_record();
        let critical = FieldSnapshot::capture(&record, FieldClass::Critical);
        let cosmetic = FieldSnapshot::capture(&record, FieldClass::Cosmetic);

        assert!(detect(&record, &critical, FieldClass::Critical).is_empty());
        assert!(detect(&record, &cosmetic, FieldClass::Cosmetic).is_empty());
    }

    #[test]
    fn test_classes_are_independent() {
        let mut record = storied_record();
        let critical = FieldSnapshot::capture(&record, FieldClass::Critical);
        let cosmetic = FieldSnapshot::capture(&record, FieldClass::Cosmetic);

        record.species_id = Some(2);
        record.location_found = "Comox".into();

        let critical_report = detect(&record, &critical, FieldClass::Critical);
        let cosmetic_report = detect(&record, &cosmetic, FieldClass::Cosmetic);
        assert_eq!(critical_report.changed, vec![StoryField::Species]);
        assert_eq!(cosmetic_report.changed, vec![StoryField::LocationFound]);
        assert_eq!(cosmetic_report.labels(), vec!["Location Found"]);
    }

    #[test]
    fn test_reordering_conditions_is_drift() {
        let mut record = storied_record();
        let critical = FieldSnapshot::capture(&record, FieldClass::Critical);

        record.conditions = vec![5, 4, 3];

        let report = detect(&record, &critical, FieldClass::Critical);
        assert_eq!(report.changed, vec![StoryField::Conditions]);
    }

    #[test]
    fn test_duplicate_ids_are_drift() {
        let mut record = storied_record();
        let critical = FieldSnapshot::capture(&record, FieldClass::Critical);

        record.treatments = vec![1, 3, 3];

        assert_eq!(
            detect(&record, &critical, FieldClass::Critical).changed,
            vec![StoryField::Treatments]
        );
    }

    #[test]
    fn test_no_story_never_drifts() {
        let mut record = storied_record();
        let critical = FieldSnapshot::capture(&record, FieldClass::Critical);
        record.set_story(None);
        record.species_id = Some(9);

        assert!(detect(&record, &critical, FieldClass::Critical).is_empty());
        let empty = FieldSnapshot::empty(FieldClass::Cosmetic);
        assert!(detect(&record, &empty, FieldClass::Cosmetic).is_empty());
    }

    #[test]
    fn test_uncaptured_snapshot_reports_everything() {
        let record = storied_record();
        let empty = FieldSnapshot::empty(FieldClass::Cosmetic);
        let report = detect(&record, &empty, FieldClass::Cosmetic);
        assert_eq!(report.changed.len(), 3);
    }
}
