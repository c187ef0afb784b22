//! In-place narrative patching for cosmetic field changes.

use regex::{NoExpand, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::dates::rewrite_dates;
use super::fields::{FieldClass, FieldValue, StoryField, COSMETIC_FIELDS};
use super::snapshot::FieldSnapshot;
use super::{StoryError, StoryResult};

/// Why a field was not patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Old text was blank, so there is nothing to search for
    EmptyOldValue,
    /// No old value was captured
    MissingOldValue,
    /// The field was cleared
    MissingNewValue,
}

/// Per-field patch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchStatus {
    Replaced { occurrences: usize },
    /// Value did not change
    Unchanged,
    /// Old value does not appear in the narrative
    NotFound,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPatch {
    pub field: StoryField,
    pub status: PatchStatus,
}

/// Patched narrative plus what happened to each cosmetic field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOutcome {
    pub text: String,
    pub fields: Vec<FieldPatch>,
}

impl PatchOutcome {
    /// True if any substitution happened.
    pub fn changed(&self) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f.status, PatchStatus::Replaced { .. }))
    }

    pub fn status(&self, field: StoryField) -> Option<PatchStatus> {
        self.fields.iter().find(|f| f.field == field).map(|f| f.status)
    }
}

/// Rewrite a narrative so it uses the current cosmetic values.
///
/// Text fields get a case-insensitive literal replacement of old by new;
/// the admission date goes through the date rewriter. A field whose old
/// value is missing from the text is reported as `NotFound` and the others
/// still proceed. Replacing the snapshot afterwards is up to the caller.
pub fn patch(narrative: &str, snapshot: &FieldSnapshot, current: &FieldSnapshot) -> StoryResult<PatchOutcome> {
    if narrative.trim().is_empty() {
        return Err(StoryError::NothingToPatch);
    }
    for found in [snapshot.class(), current.class()] {
        if found != FieldClass::Cosmetic {
            return Err(StoryError::WrongSnapshotClass {
                expected: FieldClass::Cosmetic,
                found,
            });
        }
    }

    let mut text = narrative.to_string();
    let mut fields = Vec::with_capacity(COSMETIC_FIELDS.len());

    for field in COSMETIC_FIELDS {
        let status = match (snapshot.value(field), current.value(field)) {
            (None, _) => PatchStatus::Skipped(SkipReason::MissingOldValue),
            (_, None) => PatchStatus::Skipped(SkipReason::MissingNewValue),
            (Some(old), Some(new)) if old == new => PatchStatus::Unchanged,
            (Some(FieldValue::Text(old)), Some(FieldValue::Text(new))) => {
                if old.is_empty() {
                    PatchStatus::Skipped(SkipReason::EmptyOldValue)
                } else {
                    let (patched, occurrences) = replace_literal(&text, old, new);
                    text = patched;
                    found_status(occurrences)
                }
            }
            (Some(FieldValue::Date(old)), Some(FieldValue::Date(new))) => match (old, new) {
                (None, _) => PatchStatus::Skipped(SkipReason::MissingOldValue),
                (_, None) => PatchStatus::Skipped(SkipReason::MissingNewValue),
                (Some(old), Some(new)) => {
                    let rewrite = rewrite_dates(&text, Some(*old), *new);
                    text = rewrite.text;
                    found_status(rewrite.rewritten)
                }
            },
            _ => PatchStatus::Skipped(SkipReason::MissingOldValue),
        };

        match status {
            PatchStatus::Unchanged | PatchStatus::Skipped(_) => {
                tracing::debug!(field = %field, ?status, "No effective change")
            }
            PatchStatus::NotFound => {
                tracing::debug!(field = %field, "Old value not found in narrative")
            }
            PatchStatus::Replaced { occurrences } => {
                tracing::debug!(field = %field, occurrences, "Patched narrative")
            }
        }
        fields.push(FieldPatch { field, status });
    }

    Ok(PatchOutcome { text, fields })
}

fn found_status(occurrences: usize) -> PatchStatus {
    if occurrences == 0 {
        PatchStatus::NotFound
    } else {
        PatchStatus::Replaced { occurrences }
    }
}

/// Case-insensitive literal replacement. Returns the new text and the
/// number of replaced occurrences.
fn replace_literal(text: &str, old: &str, new: &str) -> (String, usize) {
    let pattern = match RegexBuilder::new(&regex::escape(old))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern,
        Err(e) => {
            tracing::warn!(error = %e, "Could not build replacement pattern");
            return (text.to_string(), 0);
        }
    };

    let occurrences = pattern.find_iter(text).count();
    if occurrences == 0 {
        return (text.to_string(), 0);
    }
    (pattern.replace_all(text, NoExpand(new)).into_owned(), occurrences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatientRecord;
    use chrono::NaiveDate;

    fn record() -> PatientRecord {
        let mut record = PatientRecord::new("BAEA 083".into());
        record.species_id = Some(1);
        record.location_found = "Campbell River".into();
        record.date_admitted = NaiveDate::from_ymd_opt(2024, 6, 15);
        record
    }

    fn cosmetic(record: &PatientRecord) -> FieldSnapshot {
        FieldSnapshot::capture(record, FieldClass::Cosmetic)
    }

    #[test]
    fn test_noop_patch_is_identity() {
        let record = record();
        let snapshot = cosmetic(&record);
        let story = "BAEA 083 was found at Campbell River on June 15, 2024.";

        let outcome = patch(story, &snapshot, &cosmetic(&record)).unwrap();
        assert_eq!(outcome.text, story);
        assert!(!outcome.changed());
        assert!(outcome.fields.iter().all(|f| f.status == PatchStatus::Unchanged));
    }

    #[test]
    fn test_case_insensitive_global_replace() {
        let mut record = record();
        let snapshot = cosmetic(&record);
        record.location_found = "Comox".into();

        let story = "Found near campbell river. CAMPBELL RIVER residents helped.";
        let outcome = patch(story, &snapshot, &cosmetic(&record)).unwrap();
        assert_eq!(outcome.text, "Found near Comox. Comox residents helped.");
        assert_eq!(
            outcome.status(StoryField::LocationFound),
            Some(PatchStatus::Replaced { occurrences: 2 })
        );
    }

    #[test]
    fn test_old_value_is_escaped_and_new_is_literal() {
        let mut record = record();
        record.location_found = "St. John's (north) [bay]".into();
        let snapshot = cosmetic(&record);
        record.location_found = "$1 Beach".into();

        let story = "Rescued at St. John's (north) [bay]. StX John's north bay is nearby.";
        let outcome = patch(story, &snapshot, &cosmetic(&record)).unwrap();
        assert_eq!(outcome.text, "Rescued at $1 Beach. StX John's north bay is nearby.");
    }

    #[test]
    fn test_all_cosmetic_fields_together() {
        let mut record = record();
        let snapshot = cosmetic(&record);
        record.patient_case = "BAEA 090".into();
        record.location_found = "Comox".into();
        record.date_admitted = NaiveDate::from_ymd_opt(2024, 7, 3);

        let story = "BAEA 083 came from Campbell River on 15 June, 2024 (06/15/2024).";
        let outcome = patch(story, &snapshot, &cosmetic(&record)).unwrap();
        assert_eq!(
            outcome.text,
            "BAEA 090 came from Comox on 3 July, 2024 (07/03/2024)."
        );
        assert_eq!(
            outcome.status(StoryField::DateAdmitted),
            Some(PatchStatus::Replaced { occurrences: 2 })
        );
    }

    #[test]
    fn test_not_found_is_not_fatal() {
        let mut record = record();
        let snapshot = cosmetic(&record);
        record.patient_case = "BAEA 090".into();
        record.location_found = "Comox".into();

        let story = "An eagle was found at Campbell River.";
        let outcome = patch(story, &snapshot, &cosmetic(&record)).unwrap();
        assert_eq!(outcome.text, "An eagle was found at Comox.");
        assert_eq!(outcome.status(StoryField::PatientCase), Some(PatchStatus::NotFound));
    }

    #[test]
    fn test_empty_old_value_skipped() {
        let mut record = record();
        record.location_found = String::new();
        let snapshot = cosmetic(&record);
        record.location_found = "Comox".into();

        let outcome = patch("An eagle story.", &snapshot, &cosmetic(&record)).unwrap();
        assert_eq!(outcome.text, "An eagle story.");
        assert_eq!(
            outcome.status(StoryField::LocationFound),
            Some(PatchStatus::Skipped(SkipReason::EmptyOldValue))
        );
    }

    #[test]
    fn test_date_without_old_value_skipped() {
        let mut record = record();
        record.date_admitted = None;
        let snapshot = cosmetic(&record);
        record.date_admitted = NaiveDate::from_ymd_opt(2024, 7, 3);

        let outcome = patch("Admitted June 15.", &snapshot, &cosmetic(&record)).unwrap();
        assert_eq!(outcome.text, "Admitted June 15.");
        assert_eq!(
            outcome.status(StoryField::DateAdmitted),
            Some(PatchStatus::Skipped(SkipReason::MissingOldValue))
        );
    }

    #[test]
    fn test_empty_narrative_is_declined() {
        let record = record();
        let result = patch("  ", &cosmetic(&record), &cosmetic(&record));
        assert!(matches!(result, Err(StoryError::NothingToPatch)));
    }

    #[test]
    fn test_wrong_snapshot_class() {
        let record = record();
        let critical = FieldSnapshot::capture(&record, FieldClass::Critical);
        let result = patch("A story.", &critical, &cosmetic(&record));
        assert!(matches!(
            result,
            Err(StoryError::WrongSnapshotClass {
                found: FieldClass::Critical,
                ..
            })
        ));
    }
}
