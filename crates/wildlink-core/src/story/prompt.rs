//! Prompt assembly for story regeneration.

use chrono::NaiveDate;
use wildlink_llm::{join_labels, render_story_prompt, StoryPromptFields, StorySettings};

use crate::models::{PatientOptions, PatientRecord};

use super::fields::missing_required;
use super::{StoryError, StoryResult};

/// Date format used inside prompts ("March 28, 2024").
pub const PROMPT_DATE_FORMAT: &str = "%B %-d, %Y";

/// Resolve a record into prompt values.
///
/// Fails with `MissingFields` if a required field is blank.
pub fn build_prompt_fields(
    record: &PatientRecord,
    options: &PatientOptions,
    today: NaiveDate,
) -> StoryResult<StoryPromptFields> {
    let missing = missing_required(record);
    if !missing.is_empty() {
        return Err(StoryError::MissingFields(missing));
    }

    let species = record
        .species_id
        .and_then(|id| options.species_label(id))
        .unwrap_or_else(|| {
            tracing::warn!(species_id = ?record.species_id, "Species not in option catalog");
            ""
        });
    let age_range = record
        .age_range_id
        .and_then(|id| options.age_range_label(id))
        .unwrap_or_default();

    Ok(StoryPromptFields {
        patient_case: record.patient_case.clone(),
        species: species.to_string(),
        age_range: age_range.to_string(),
        location_found: record.location_found.clone(),
        date_admitted: record
            .date_admitted
            .map(|d| d.format(PROMPT_DATE_FORMAT).to_string())
            .unwrap_or_default(),
        days_in_care: record.days_in_care(today).unwrap_or(0),
        current_date: today.format(PROMPT_DATE_FORMAT).to_string(),
        conditions: join_labels(&options.condition_labels(&record.conditions)),
        treatments: join_labels(&options.treatment_labels(&record.treatments)),
    })
}

/// Render the configured template for a record.
pub fn assemble_prompt(
    record: &PatientRecord,
    options: &PatientOptions,
    settings: &StorySettings,
    today: NaiveDate,
) -> StoryResult<String> {
    let fields = build_prompt_fields(record, options, today)?;
    Ok(render_story_prompt(&settings.prompt_template, &fields))
}
