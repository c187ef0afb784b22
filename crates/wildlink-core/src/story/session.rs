//! Story editing session.
//!
//! A session owns a working copy of one patient plus the two field
//! snapshots, and sequences the only slow operations (narrative generation
//! and saving) through tickets so late answers can be recognised and dropped.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use wildlink_llm::{
    clean_narrative, GeneratorResult, NarrativeGenerator, SettingsProvider, StorySettings,
    DEFAULT_TIMEOUT, GENERATING_PLACEHOLDER,
};

use crate::db::PatientStore;
use crate::models::{PatientOptions, PatientRecord};

use super::drift::{detect, ChangeReport};
use super::fields::{missing_required, FieldClass};
use super::patcher::{patch, PatchOutcome};
use super::prompt::assemble_prompt;
use super::snapshot::FieldSnapshot;
use super::{StoryError, StoryResult};

/// Narrative generation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationState {
    Idle,
    Generating { request_id: u64 },
    /// Last request failed; the previous narrative is still in place
    Failed { error: String },
}

/// Persistence state of the working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveState {
    Saved,
    Unsaved,
    Saving { save_id: u64 },
    Failed { error: String },
}

/// Identifies one generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTicket {
    pub session_id: String,
    pub request_id: u64,
}

/// What to send to the narrative generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub ticket: GenerationTicket,
    pub prompt: String,
    pub model: String,
    pub timeout: Duration,
}

/// One outstanding save, carrying the record as it was when the save began.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket {
    pub session_id: String,
    pub save_id: u64,
    pub revision: u64,
    pub record: PatientRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegenerationOutcome {
    /// New narrative is in place
    Applied,
    /// Response arrived for a cancelled or superseded request
    Discarded,
}

/// A staff edit to one patient field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Species(Option<i64>),
    AgeRange(Option<i64>),
    Conditions(Vec<i64>),
    Treatments(Vec<i64>),
    PatientCase(String),
    LocationFound(String),
    DateAdmitted(Option<NaiveDate>),
    ReleaseDate(Option<NaiveDate>),
    /// Staff-chosen image; `None` returns to the species default
    Image(Option<String>),
    /// Manual narrative edit
    Story(Option<String>),
}

/// Editing session for one patient.
#[derive(Debug, Clone)]
pub struct StorySession {
    session_id: String,
    record: PatientRecord,
    critical: FieldSnapshot,
    cosmetic: FieldSnapshot,
    generation: GenerationState,
    save: SaveState,
    next_id: u64,
    revision: u64,
    closed: bool,
    timeout: Duration,
}

impl StorySession {
    /// Start a session. A record that already has a story is assumed to be
    /// in step with it.
    pub fn open(record: PatientRecord) -> Self {
        let (critical, cosmetic) = if record.has_story() {
            (
                FieldSnapshot::capture(&record, FieldClass::Critical),
                FieldSnapshot::capture(&record, FieldClass::Cosmetic),
            )
        } else {
            (
                FieldSnapshot::empty(FieldClass::Critical),
                FieldSnapshot::empty(FieldClass::Cosmetic),
            )
        };

        let session_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(session_id = %session_id, patient_id = %record.patient_id, "Opened story session");

        Self {
            session_id,
            record,
            critical,
            cosmetic,
            generation: GenerationState::Idle,
            save: SaveState::Saved,
            next_id: 1,
            revision: 0,
            closed: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the generator timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record(&self) -> &PatientRecord {
        &self.record
    }

    pub fn critical_snapshot(&self) -> &FieldSnapshot {
        &self.critical
    }

    pub fn cosmetic_snapshot(&self) -> &FieldSnapshot {
        &self.cosmetic
    }

    pub fn generation_state(&self) -> &GenerationState {
        &self.generation
    }

    pub fn save_state(&self) -> &SaveState {
        &self.save
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.generation, GenerationState::Generating { .. })
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn critical_changes(&self) -> ChangeReport {
        detect(&self.record, &self.critical, FieldClass::Critical)
    }

    pub fn cosmetic_changes(&self) -> ChangeReport {
        detect(&self.record, &self.cosmetic, FieldClass::Cosmetic)
    }

    /// Story facts are stale; only regeneration fixes this.
    pub fn needs_story_update(&self) -> bool {
        !self.critical_changes().is_empty()
    }

    /// Story labels are stale; a cosmetic patch fixes this.
    pub fn needs_cosmetic_patch(&self) -> bool {
        !self.cosmetic_changes().is_empty()
    }

    /// Narrative to display. Shows a placeholder while generating.
    pub fn display_story(&self) -> Option<&str> {
        if self.is_generating() {
            Some(GENERATING_PLACEHOLDER)
        } else {
            self.record.story()
        }
    }

    /// Apply a field edit to the working copy.
    pub fn apply(&mut self, edit: FieldEdit) -> StoryResult<()> {
        self.ensure_open()?;
        if self.is_generating() {
            return Err(StoryError::GenerationInProgress);
        }

        match edit {
            FieldEdit::Species(id) => self.record.species_id = id,
            FieldEdit::AgeRange(id) => self.record.age_range_id = id,
            FieldEdit::Conditions(ids) => self.record.conditions = ids,
            FieldEdit::Treatments(ids) => self.record.treatments = ids,
            FieldEdit::PatientCase(case) => self.record.patient_case = case,
            FieldEdit::LocationFound(location) => self.record.location_found = location,
            FieldEdit::DateAdmitted(date) => self.record.date_admitted = date,
            FieldEdit::ReleaseDate(date) => self.record.release_date = date,
            FieldEdit::Image(image) => {
                self.record.user_uploaded_image = image.is_some();
                self.record.patient_image = image;
            }
            FieldEdit::Story(story) => {
                let had_story = self.record.has_story();
                self.record.set_story(story);
                if !self.record.has_story() {
                    self.reset_snapshots();
                } else if !had_story {
                    self.capture_snapshots();
                }
            }
        }

        self.record.touch();
        self.mark_dirty();
        Ok(())
    }

    /// Point the image at the species default unless staff uploaded one.
    pub fn sync_default_image(&mut self, options: &PatientOptions) {
        let before = self.record.patient_image.clone();
        self.record.apply_species_image(options);
        if self.record.patient_image != before {
            self.mark_dirty();
        }
    }

    /// Fix cosmetic drift by rewriting the narrative in place.
    ///
    /// The cosmetic snapshot is replaced even when no old value was found
    /// in the text; the critical snapshot is never touched.
    pub fn apply_cosmetic_patch(&mut self) -> StoryResult<PatchOutcome> {
        self.ensure_writable()?;
        self.ensure_required()?;

        let story = self.record.story().ok_or(StoryError::NothingToPatch)?;
        let current = FieldSnapshot::capture(&self.record, FieldClass::Cosmetic);
        let outcome = patch(story, &self.cosmetic, &current)?;

        if outcome.text != story {
            self.record.set_story(Some(outcome.text.clone()));
            self.mark_dirty();
        }
        self.cosmetic = current;

        tracing::info!(
            session_id = %self.session_id,
            patient_id = %self.record.patient_id,
            changed = outcome.changed(),
            "Applied cosmetic patch"
        );
        Ok(outcome)
    }

    /// Start a regeneration and hand back the request to run.
    pub fn begin_regeneration(
        &mut self,
        settings: &StorySettings,
        options: &PatientOptions,
        today: NaiveDate,
    ) -> StoryResult<GenerationRequest> {
        self.ensure_writable()?;

        let settings = settings.clone().normalized();
        let prompt = assemble_prompt(&self.record, options, &settings, today)?;

        let request_id = self.next_id();
        self.generation = GenerationState::Generating { request_id };
        tracing::info!(
            session_id = %self.session_id,
            patient_id = %self.record.patient_id,
            request_id,
            model = %settings.ai_model,
            "Story generation started"
        );

        Ok(GenerationRequest {
            ticket: GenerationTicket {
                session_id: self.session_id.clone(),
                request_id,
            },
            prompt,
            model: settings.ai_model,
            timeout: self.timeout,
        })
    }

    /// Deliver the generator's answer for a ticket.
    ///
    /// Answers for closed sessions, cancelled requests or other sessions are
    /// discarded. A failure keeps the previous narrative and snapshots.
    pub fn complete_regeneration(
        &mut self,
        ticket: &GenerationTicket,
        result: GeneratorResult<String>,
    ) -> StoryResult<RegenerationOutcome> {
        let current = GenerationState::Generating {
            request_id: ticket.request_id,
        };
        if self.closed || ticket.session_id != self.session_id || self.generation != current {
            tracing::warn!(
                session_id = %ticket.session_id,
                request_id = ticket.request_id,
                "Discarding late story generation response"
            );
            return Ok(RegenerationOutcome::Discarded);
        }

        match result.and_then(|text| clean_narrative(&text)) {
            Ok(story) => {
                self.record.set_story(Some(story));
                self.capture_snapshots();
                self.generation = GenerationState::Idle;
                self.mark_dirty();
                tracing::info!(
                    session_id = %self.session_id,
                    patient_id = %self.record.patient_id,
                    request_id = ticket.request_id,
                    "Story generated"
                );
                Ok(RegenerationOutcome::Applied)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    session_id = %self.session_id,
                    request_id = ticket.request_id,
                    "Story generation failed"
                );
                self.generation = GenerationState::Failed {
                    error: e.to_string(),
                };
                Err(StoryError::Generator(e))
            }
        }
    }

    /// Abandon the in-flight request; its answer will be discarded.
    pub fn cancel_generation(&mut self) {
        if let GenerationState::Generating { request_id } = self.generation {
            tracing::info!(session_id = %self.session_id, request_id, "Story generation cancelled");
            self.generation = GenerationState::Idle;
        }
    }

    /// Regenerate the narrative and persist it.
    pub fn regenerate(
        &mut self,
        generator: &dyn NarrativeGenerator,
        settings: &dyn SettingsProvider,
        store: &dyn PatientStore,
        today: NaiveDate,
    ) -> StoryResult<RegenerationOutcome> {
        let settings = settings.story_settings()?;
        let options = store.list_options()?;

        let request = self.begin_regeneration(&settings, &options, today)?;
        let result = generator.generate(&request.prompt, &request.model, request.timeout);
        let outcome = self.complete_regeneration(&request.ticket, result)?;

        if outcome == RegenerationOutcome::Applied {
            self.save(store)?;
        }
        Ok(outcome)
    }

    /// Start a save of the working copy.
    pub fn begin_save(&mut self) -> StoryResult<SaveTicket> {
        self.ensure_open()?;
        if matches!(self.save, SaveState::Saving { .. }) {
            return Err(StoryError::SaveInProgress);
        }

        let save_id = self.next_id();
        self.save = SaveState::Saving { save_id };
        Ok(SaveTicket {
            session_id: self.session_id.clone(),
            save_id,
            revision: self.revision,
            record: self.record.clone(),
        })
    }

    /// Record the outcome of a save.
    pub fn complete_save(&mut self, ticket: &SaveTicket, result: Result<(), String>) -> StoryResult<()> {
        let current = SaveState::Saving {
            save_id: ticket.save_id,
        };
        if ticket.session_id != self.session_id || self.save != current {
            tracing::warn!(session_id = %ticket.session_id, save_id = ticket.save_id, "Ignoring stale save result");
            return Ok(());
        }

        match result {
            Ok(()) => {
                self.save = if ticket.revision == self.revision {
                    SaveState::Saved
                } else {
                    SaveState::Unsaved
                };
                tracing::debug!(session_id = %self.session_id, patient_id = %self.record.patient_id, "Patient saved");
                Ok(())
            }
            Err(error) => {
                tracing::warn!(error = %error, session_id = %self.session_id, "Patient save failed");
                self.save = SaveState::Failed {
                    error: error.clone(),
                };
                Err(StoryError::Persistence(error))
            }
        }
    }

    /// Save the working copy through a store.
    pub fn save(&mut self, store: &dyn PatientStore) -> StoryResult<()> {
        let ticket = self.begin_save()?;
        let result = store.save_patient(&ticket.record).map_err(|e| e.to_string());
        self.complete_save(&ticket, result)
    }

    /// End the session. Pending answers are discarded on arrival.
    pub fn close(&mut self) {
        self.cancel_generation();
        self.closed = true;
        tracing::debug!(session_id = %self.session_id, "Closed story session");
    }

    fn capture_snapshots(&mut self) {
        self.critical = FieldSnapshot::capture(&self.record, FieldClass::Critical);
        self.cosmetic = FieldSnapshot::capture(&self.record, FieldClass::Cosmetic);
    }

    fn reset_snapshots(&mut self) {
        self.critical = FieldSnapshot::empty(FieldClass::Critical);
        self.cosmetic = FieldSnapshot::empty(FieldClass::Cosmetic);
    }

    fn mark_dirty(&mut self) {
        self.revision += 1;
        if self.save == SaveState::Saved {
            self.save = SaveState::Unsaved;
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn ensure_open(&self) -> StoryResult<()> {
        if self.closed {
            return Err(StoryError::SessionClosed);
        }
        Ok(())
    }

    fn ensure_required(&self) -> StoryResult<()> {
        let missing = missing_required(&self.record);
        if !missing.is_empty() {
            return Err(StoryError::MissingFields(missing));
        }
        Ok(())
    }

    /// Patch and regenerate need an idle session with no save outstanding.
    fn ensure_writable(&self) -> StoryResult<()> {
        self.ensure_open()?;
        if self.is_generating() {
            return Err(StoryError::GenerationInProgress);
        }
        match &self.save {
            SaveState::Saving { .. } => Err(StoryError::SaveInProgress),
            SaveState::Failed { error } => Err(StoryError::UnsavedChanges(error.clone())),
            SaveState::Saved | SaveState::Unsaved => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wildlink_llm::GeneratorError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn eagle() -> PatientRecord {
        let mut record = PatientRecord::new("BAEA 083".into());
        record.species_id = Some(1);
        record.age_range_id = Some(5);
        record.conditions = vec![3, 4];
        record.treatments = vec![3];
        record.location_found = "Campbell River".into();
        record.date_admitted = Some(date(2024, 6, 15));
        record
    }

    fn storied_session() -> StorySession {
        let mut record = eagle();
        record.set_story(Some("BAEA 083 was found at Campbell River on June 15, 2024.".into()));
        StorySession::open(record)
    }

    fn begin(session: &mut StorySession) -> StoryResult<GenerationRequest> {
        session.begin_regeneration(
            &StorySettings::default(),
            &PatientOptions::center_defaults(),
            date(2024, 6, 20),
        )
    }

    #[test]
    fn test_open_without_story_has_empty_snapshots() {
        let session = StorySession::open(eagle());
        assert!(session.critical_snapshot().is_empty());
        assert!(session.cosmetic_snapshot().is_empty());
        assert!(!session.needs_story_update());
        assert!(!session.needs_cosmetic_patch());
        assert_eq!(session.save_state(), &SaveState::Saved);
    }

    #[test]
    fn test_edits_drive_drift_reports() {
        let mut session = storied_session();
        session.apply(FieldEdit::Conditions(vec![4, 3])).unwrap();
        session.apply(FieldEdit::LocationFound("Comox".into())).unwrap();

        assert_eq!(session.critical_changes().labels(), vec!["Conditions"]);
        assert_eq!(session.cosmetic_changes().labels(), vec!["Location Found"]);
        assert_eq!(session.save_state(), &SaveState::Unsaved);
    }

    #[test]
    fn test_cosmetic_patch_replaces_only_cosmetic_snapshot() {
        let mut session = storied_session();
        session.apply(FieldEdit::Species(Some(2))).unwrap();
        session.apply(FieldEdit::PatientCase("BAEA 090".into())).unwrap();
        session.apply(FieldEdit::DateAdmitted(Some(date(2024, 7, 3)))).unwrap();

        let outcome = session.apply_cosmetic_patch().unwrap();
        assert!(outcome.changed());
        assert_eq!(
            session.record().story(),
            Some("BAEA 090 was found at Campbell River on July 3, 2024.")
        );
        assert!(!session.needs_cosmetic_patch());
        assert!(session.needs_story_update());
    }

    #[test]
    fn test_patch_without_story_declined() {
        let mut session = StorySession::open(eagle());
        assert!(matches!(
            session.apply_cosmetic_patch(),
            Err(StoryError::NothingToPatch)
        ));
    }

    #[test]
    fn test_patch_refused_when_required_missing() {
        let mut session = storied_session();
        session.apply(FieldEdit::LocationFound(String::new())).unwrap();
        let story = session.record().patient_story.clone();

        assert!(matches!(
            session.apply_cosmetic_patch(),
            Err(StoryError::MissingFields(_))
        ));
        assert_eq!(session.record().patient_story, story);
    }

    #[test]
    fn test_regeneration_applies_and_captures() {
        let mut session = storied_session();
        session.apply(FieldEdit::Species(Some(3))).unwrap();

        let request = begin(&mut session).unwrap();
        assert!(request.prompt.contains("Raccoon"));
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(session.display_story(), Some(GENERATING_PLACEHOLDER));

        let outcome = session
            .complete_regeneration(&request.ticket, Ok("  A raccoon recovers.  ".into()))
            .unwrap();
        assert_eq!(outcome, RegenerationOutcome::Applied);
        assert_eq!(session.display_story(), Some("A raccoon recovers."));
        assert!(!session.needs_story_update());
        assert_eq!(session.generation_state(), &GenerationState::Idle);
    }

    #[test]
    fn test_edits_rejected_while_generating() {
        let mut session = storied_session();
        let _request = begin(&mut session).unwrap();
        assert!(matches!(
            session.apply(FieldEdit::Species(Some(2))),
            Err(StoryError::GenerationInProgress)
        ));
        assert!(matches!(begin(&mut session), Err(StoryError::GenerationInProgress)));
    }

    #[test]
    fn test_generation_failure_keeps_story_and_snapshots() {
        let mut session = storied_session();
        session.apply(FieldEdit::Treatments(vec![1])).unwrap();
        let story = session.record().patient_story.clone();
        let critical = session.critical_snapshot().clone();
        let cosmetic = session.cosmetic_snapshot().clone();

        let request = begin(&mut session).unwrap();
        let result = session.complete_regeneration(&request.ticket, Err(GeneratorError::Timeout(30)));

        assert!(matches!(result, Err(StoryError::Generator(GeneratorError::Timeout(30)))));
        assert_eq!(session.record().patient_story, story);
        assert_eq!(session.critical_snapshot(), &critical);
        assert_eq!(session.cosmetic_snapshot(), &cosmetic);
        assert!(matches!(session.generation_state(), GenerationState::Failed { .. }));
        // session is usable again
        session.apply(FieldEdit::Treatments(vec![1, 2])).unwrap();
    }

    #[test]
    fn test_blank_generation_is_failure() {
        let mut session = storied_session();
        let request = begin(&mut session).unwrap();
        let result = session.complete_regeneration(&request.ticket, Ok("   ".into()));
        assert!(matches!(result, Err(StoryError::Generator(GeneratorError::EmptyNarrative))));
    }

    #[test]
    fn test_cancelled_response_discarded() {
        let mut session = storied_session();
        let story = session.record().patient_story.clone();
        let request = begin(&mut session).unwrap();
        session.cancel_generation();

        let outcome = session
            .complete_regeneration(&request.ticket, Ok("Late story.".into()))
            .unwrap();
        assert_eq!(outcome, RegenerationOutcome::Discarded);
        assert_eq!(session.record().patient_story, story);
    }

    #[test]
    fn test_closed_session_discards_response() {
        let mut session = storied_session();
        let request = begin(&mut session).unwrap();
        session.close();

        let outcome = session
            .complete_regeneration(&request.ticket, Ok("Late story.".into()))
            .unwrap();
        assert_eq!(outcome, RegenerationOutcome::Discarded);
        assert!(matches!(
            session.apply(FieldEdit::Species(None)),
            Err(StoryError::SessionClosed)
        ));
    }

    #[test]
    fn test_foreign_ticket_discarded() {
        let mut session = storied_session();
        let request = begin(&mut session).unwrap();
        let foreign = GenerationTicket {
            session_id: "other".into(),
            request_id: request.ticket.request_id,
        };
        let outcome = session.complete_regeneration(&foreign, Ok("Story.".into())).unwrap();
        assert_eq!(outcome, RegenerationOutcome::Discarded);
        assert!(session.is_generating());
    }

    #[test]
    fn test_save_sequencing() {
        let mut session = storied_session();
        session.apply(FieldEdit::LocationFound("Comox".into())).unwrap();

        let ticket = session.begin_save().unwrap();
        assert!(matches!(session.begin_save(), Err(StoryError::SaveInProgress)));
        assert!(matches!(session.apply_cosmetic_patch(), Err(StoryError::SaveInProgress)));
        assert!(matches!(begin(&mut session), Err(StoryError::SaveInProgress)));

        let failed = session.complete_save(&ticket, Err("disk full".into()));
        assert!(matches!(failed, Err(StoryError::Persistence(_))));
        assert!(matches!(session.apply_cosmetic_patch(), Err(StoryError::UnsavedChanges(_))));

        let retry = session.begin_save().unwrap();
        session.complete_save(&retry, Ok(())).unwrap();
        assert_eq!(session.save_state(), &SaveState::Saved);
        assert!(session.apply_cosmetic_patch().is_ok());
    }

    #[test]
    fn test_edit_during_save_leaves_unsaved() {
        let mut session = storied_session();
        session.apply(FieldEdit::LocationFound("Comox".into())).unwrap();
        let ticket = session.begin_save().unwrap();
        session.apply(FieldEdit::PatientCase("BAEA 090".into())).unwrap();
        session.complete_save(&ticket, Ok(())).unwrap();
        assert_eq!(session.save_state(), &SaveState::Unsaved);
        assert_eq!(ticket.record.patient_case, "BAEA 083");
    }

    #[test]
    fn test_manual_story_captures_snapshots() {
        let mut session = StorySession::open(eagle());
        session
            .apply(FieldEdit::Story(Some("Written by hand.".into())))
            .unwrap();
        assert!(!session.critical_snapshot().is_empty());
        assert!(!session.needs_story_update());

        session.apply(FieldEdit::Story(Some("   ".into()))).unwrap();
        assert!(session.critical_snapshot().is_empty());
        assert_eq!(session.record().patient_story, None);
    }

    #[test]
    fn test_image_edits_and_species_default() {
        let options = PatientOptions::center_defaults();
        let mut session = StorySession::open(eagle());
        session.sync_default_image(&options);
        assert_eq!(session.record().patient_image.as_deref(), Some("images/bald-eagle.jpg"));

        session.apply(FieldEdit::Image(Some("uploads/eagle.jpg".into()))).unwrap();
        session.apply(FieldEdit::Species(Some(2))).unwrap();
        session.sync_default_image(&options);
        assert_eq!(session.record().patient_image.as_deref(), Some("uploads/eagle.jpg"));

        session.apply(FieldEdit::Image(None)).unwrap();
        session.sync_default_image(&options);
        assert_eq!(session.record().patient_image.as_deref(), Some("images/common-raven.jpg"));
    }
}
