//! Wildlink Core Library
//!
//! Patient records for a wildlife rehabilitation center, and the engine that
//! keeps each patient's public story consistent with the record.
//!
//! # Architecture
//!
//! ```text
//!   field edit ──► StorySession ──► drift reports (critical / cosmetic)
//!                      │
//!        ┌─────────────┴──────────────┐
//!        ▼                            ▼
//!   cosmetic patch               regeneration
//!   (text + date rewrite)        (prompt → narrative generator)
//!        │                            │
//!        └─────────────┬──────────────┘
//!                      ▼
//!              snapshots replaced
//!                      │
//!                      ▼
//!              save (PatientStore)
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite layer (patients, option catalogs, settings)
//! - [`models`]: Patient record and option catalogs
//! - [`story`]: Field classifier, drift detector, text patcher, date rewriter, sessions

pub mod db;
pub mod models;
pub mod story;

// Re-export commonly used types
pub use db::{Database, PatientStore};
pub use models::{PatientOptions, PatientRecord, PatientStatus};
pub use story::{
    classify, detect, patch, rewrite_dates, ChangeReport, FieldClass, FieldEdit, FieldSnapshot,
    StoryError, StoryField, StorySession,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use models::OptionKind;
use story::{
    GenerationState, GenerationTicket, PatchStatus, RegenerationOutcome, SaveState, SkipReason,
};
use wildlink_llm::{GeneratorError, StorySettings, SYSTEM_PROMPT};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum WildlinkError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Generator error: {0}")]
    GeneratorError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),
}

impl From<db::DbError> for WildlinkError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => WildlinkError::NotFound(what),
            db::DbError::Constraint(msg) => WildlinkError::InvalidInput(msg),
            other => WildlinkError::DatabaseError(other.to_string()),
        }
    }
}

impl From<StoryError> for WildlinkError {
    fn from(e: StoryError) -> Self {
        match e {
            StoryError::UnknownField(_)
            | StoryError::MissingFields(_)
            | StoryError::NothingToPatch
            | StoryError::WrongSnapshotClass { .. }
            | StoryError::SessionClosed => WildlinkError::InvalidInput(e.to_string()),
            StoryError::GenerationInProgress
            | StoryError::SaveInProgress
            | StoryError::UnsavedChanges(_) => WildlinkError::Busy(e.to_string()),
            StoryError::Generator(inner) => WildlinkError::GeneratorError(inner.to_string()),
            StoryError::Settings(inner) => WildlinkError::InvalidInput(inner.to_string()),
            StoryError::Persistence(msg) => WildlinkError::PersistenceError(msg),
            StoryError::Database(inner) => inner.into(),
        }
    }
}

impl From<serde_json::Error> for WildlinkError {
    fn from(e: serde_json::Error) -> Self {
        WildlinkError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for WildlinkError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        WildlinkError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<WildlinkCore>, WildlinkError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(WildlinkCore::new(db)))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<WildlinkCore>, WildlinkError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(WildlinkCore::new(db)))
}

/// Install the log subscriber. Later calls are ignored.
///
/// `filter` uses `RUST_LOG` syntax; defaults to info for both crates.
#[uniffi::export]
pub fn init_logging(filter: Option<String>) {
    let filter = filter.unwrap_or_else(|| "wildlink_core=info,wildlink_llm=info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}

/// Classify a patient field name.
#[uniffi::export]
pub fn classify_field(name: String) -> Result<FfiFieldClass, WildlinkError> {
    Ok(classify(&name)?.into())
}

/// Rewrite mentions of `old_date` in `text` as `new_date` (both `YYYY-MM-DD`).
#[uniffi::export]
pub fn rewrite_admission_dates(
    text: String,
    old_date: Option<String>,
    new_date: String,
) -> Result<String, WildlinkError> {
    let old = old_date.as_deref().map(parse_date).transpose()?;
    let new = parse_date(&new_date)?;
    Ok(rewrite_dates(&text, old, new).text)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database and session registry for FFI.
///
/// Locks are always taken sessions first, then database.
#[derive(uniffi::Object)]
pub struct WildlinkCore {
    db: Arc<Mutex<Database>>,
    sessions: Mutex<HashMap<String, StorySession>>,
}

impl WildlinkCore {
    fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

#[uniffi::export]
impl WildlinkCore {
    // =========================================================================
    // Options and Settings
    // =========================================================================

    /// Seed the default option catalogs into an empty database.
    pub fn seed_default_options(&self) -> Result<u32, WildlinkError> {
        let db = self.db.lock()?;
        Ok(db.seed_default_options()? as u32)
    }

    /// All option catalogs.
    pub fn list_options(&self) -> Result<FfiPatientOptions, WildlinkError> {
        let db = self.db.lock()?;
        Ok(db.list_options()?.into())
    }

    /// Add an option and return its ID.
    pub fn add_option(&self, kind: FfiOptionKind, label: String) -> Result<i64, WildlinkError> {
        let db = self.db.lock()?;
        Ok(db.add_option(kind.into(), &label)?)
    }

    pub fn get_story_settings(&self) -> Result<FfiStorySettings, WildlinkError> {
        let db = self.db.lock()?;
        Ok(db.get_story_settings()?.into())
    }

    pub fn save_story_settings(&self, settings: FfiStorySettings) -> Result<(), WildlinkError> {
        let db = self.db.lock()?;
        db.save_story_settings(&settings.into())?;
        Ok(())
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Create and store a new patient.
    pub fn create_patient(&self, patient_case: String) -> Result<FfiPatient, WildlinkError> {
        let db = self.db.lock()?;
        let patient = PatientRecord::new(patient_case);
        db.save_patient(&patient)?;
        Ok(patient.into())
    }

    pub fn get_patient(&self, patient_id: String) -> Result<Option<FfiPatient>, WildlinkError> {
        let db = self.db.lock()?;
        Ok(db.get_patient(&patient_id)?.map(Into::into))
    }

    pub fn list_patients(&self) -> Result<Vec<FfiPatient>, WildlinkError> {
        let db = self.db.lock()?;
        Ok(db.list_patients()?.into_iter().map(Into::into).collect())
    }

    /// Delete a patient. Refused while a session is open on it.
    pub fn delete_patient(&self, patient_id: String) -> Result<bool, WildlinkError> {
        let sessions = self.sessions.lock()?;
        ensure_no_live_session(&sessions, &patient_id)?;
        let db = self.db.lock()?;
        Ok(db.delete_patient(&patient_id)?)
    }

    // =========================================================================
    // Story Sessions
    // =========================================================================

    /// Open an editing session for a patient and return its ID.
    ///
    /// A patient has at most one live session; close it before opening
    /// another.
    pub fn open_session(&self, patient_id: String) -> Result<String, WildlinkError> {
        let mut sessions = self.sessions.lock()?;
        ensure_no_live_session(&sessions, &patient_id)?;
        let db = self.db.lock()?;
        let patient = db
            .get_patient(&patient_id)?
            .ok_or_else(|| WildlinkError::NotFound(format!("patient {patient_id}")))?;

        let session = StorySession::open(patient);
        let session_id = session.session_id().to_string();
        sessions.insert(session_id.clone(), session);
        Ok(session_id)
    }

    /// Close a session. Pending generation results for it are dropped.
    pub fn close_session(&self, session_id: String) -> Result<(), WildlinkError> {
        let mut sessions = self.sessions.lock()?;
        if let Some(mut session) = sessions.remove(&session_id) {
            session.close();
        }
        Ok(())
    }

    pub fn session_state(&self, session_id: String) -> Result<FfiSessionState, WildlinkError> {
        let sessions = self.sessions.lock()?;
        let session = find_session(&sessions, &session_id)?;
        Ok(session_state(session))
    }

    /// Apply one field edit and return the new session state.
    pub fn edit_field(
        &self,
        session_id: String,
        edit: FfiFieldEdit,
    ) -> Result<FfiSessionState, WildlinkError> {
        let mut sessions = self.sessions.lock()?;
        let session = find_session_mut(&mut sessions, &session_id)?;
        let edit = edit.into_edit()?;
        let touches_image = matches!(edit, FieldEdit::Species(_) | FieldEdit::Image(None));

        session.apply(edit)?;
        if touches_image {
            let db = self.db.lock()?;
            session.sync_default_image(&db.list_options()?);
        }
        Ok(session_state(session))
    }

    /// Fix cosmetic drift in place.
    pub fn apply_cosmetic_patch(&self, session_id: String) -> Result<FfiPatchResult, WildlinkError> {
        let mut sessions = self.sessions.lock()?;
        let session = find_session_mut(&mut sessions, &session_id)?;
        let outcome = session.apply_cosmetic_patch()?;

        Ok(FfiPatchResult {
            story: outcome.text.clone(),
            changed: outcome.changed(),
            fields: outcome
                .fields
                .iter()
                .map(|f| FfiFieldPatch {
                    field: f.field.name().to_string(),
                    status: patch_status_name(f.status).to_string(),
                    occurrences: match f.status {
                        PatchStatus::Replaced { occurrences } => occurrences as u32,
                        _ => 0,
                    },
                })
                .collect(),
        })
    }

    /// Start a regeneration. The host runs the request and reports back
    /// with [`WildlinkCore::complete_regeneration`].
    pub fn begin_regeneration(
        &self,
        session_id: String,
        today: String,
    ) -> Result<FfiGenerationRequest, WildlinkError> {
        let today = parse_date(&today)?;
        let mut sessions = self.sessions.lock()?;
        let session = find_session_mut(&mut sessions, &session_id)?;

        let (settings, options) = {
            let db = self.db.lock()?;
            (db.get_story_settings()?, db.list_options()?)
        };
        let request = session.begin_regeneration(&settings, &options, today)?;

        Ok(FfiGenerationRequest {
            session_id: request.ticket.session_id,
            request_id: request.ticket.request_id,
            system_prompt: SYSTEM_PROMPT.to_string(),
            prompt: request.prompt,
            model: request.model,
            timeout_secs: request.timeout.as_secs(),
        })
    }

    /// Deliver a generation result. Returns false when the result was
    /// discarded (session closed or request cancelled).
    ///
    /// A delivered narrative is saved right away.
    pub fn complete_regeneration(
        &self,
        session_id: String,
        request_id: u64,
        story: Option<String>,
        error: Option<String>,
    ) -> Result<bool, WildlinkError> {
        let mut sessions = self.sessions.lock()?;
        let Some(session) = sessions.get_mut(&session_id) else {
            tracing::warn!(session_id = %session_id, request_id, "Generation result for unknown session");
            return Ok(false);
        };

        let result = match (story, error) {
            (Some(story), None) => Ok(story),
            (_, Some(error)) => Err(GeneratorError::Http(error)),
            (None, None) => Err(GeneratorError::EmptyNarrative),
        };
        let ticket = GenerationTicket {
            session_id,
            request_id,
        };

        let outcome = session.complete_regeneration(&ticket, result)?;
        if outcome == RegenerationOutcome::Applied {
            let db = self.db.lock()?;
            session.save(&*db)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Abandon the in-flight generation for a session.
    pub fn cancel_generation(&self, session_id: String) -> Result<(), WildlinkError> {
        let mut sessions = self.sessions.lock()?;
        find_session_mut(&mut sessions, &session_id)?.cancel_generation();
        Ok(())
    }

    /// Persist the session's working copy.
    pub fn save_session(&self, session_id: String) -> Result<FfiSessionState, WildlinkError> {
        let mut sessions = self.sessions.lock()?;
        let session = find_session_mut(&mut sessions, &session_id)?;
        let db = self.db.lock()?;
        session.save(&*db)?;
        Ok(session_state(session))
    }
}

fn ensure_no_live_session(
    sessions: &HashMap<String, StorySession>,
    patient_id: &str,
) -> Result<(), WildlinkError> {
    match sessions
        .values()
        .find(|session| session.record().patient_id == patient_id)
    {
        Some(live) => Err(WildlinkError::Busy(format!(
            "patient {patient_id} is open in session {}",
            live.session_id()
        ))),
        None => Ok(()),
    }
}

fn find_session<'a>(
    sessions: &'a HashMap<String, StorySession>,
    session_id: &str,
) -> Result<&'a StorySession, WildlinkError> {
    sessions
        .get(session_id)
        .ok_or_else(|| WildlinkError::NotFound(format!("session {session_id}")))
}

fn find_session_mut<'a>(
    sessions: &'a mut HashMap<String, StorySession>,
    session_id: &str,
) -> Result<&'a mut StorySession, WildlinkError> {
    sessions
        .get_mut(session_id)
        .ok_or_else(|| WildlinkError::NotFound(format!("session {session_id}")))
}

fn parse_date(text: &str) -> Result<NaiveDate, WildlinkError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|e| WildlinkError::InvalidInput(format!("bad date {text:?}: {e}")))
}

fn parse_optional_date(text: Option<String>) -> Result<Option<NaiveDate>, WildlinkError> {
    text.filter(|t| !t.trim().is_empty())
        .as_deref()
        .map(parse_date)
        .transpose()
}

fn session_state(session: &StorySession) -> FfiSessionState {
    FfiSessionState {
        session_id: session.session_id().to_string(),
        patient: session.record().clone().into(),
        display_story: session.display_story().map(str::to_string),
        critical_changes: labels(&session.critical_changes()),
        cosmetic_changes: labels(&session.cosmetic_changes()),
        needs_story_update: session.needs_story_update(),
        needs_cosmetic_patch: session.needs_cosmetic_patch(),
        is_generating: session.is_generating(),
        generation_error: match session.generation_state() {
            GenerationState::Failed { error } => Some(error.clone()),
            _ => None,
        },
        save_state: match session.save_state() {
            SaveState::Saved => "saved",
            SaveState::Unsaved => "unsaved",
            SaveState::Saving { .. } => "saving",
            SaveState::Failed { .. } => "failed",
        }
        .to_string(),
    }
}

fn labels(report: &ChangeReport) -> Vec<String> {
    report.labels().into_iter().map(str::to_string).collect()
}

fn patch_status_name(status: PatchStatus) -> &'static str {
    match status {
        PatchStatus::Replaced { .. } => "replaced",
        PatchStatus::Unchanged => "unchanged",
        PatchStatus::NotFound => "not_found",
        PatchStatus::Skipped(SkipReason::EmptyOldValue) => "skipped_empty_old_value",
        PatchStatus::Skipped(SkipReason::MissingOldValue) => "skipped_missing_old_value",
        PatchStatus::Skipped(SkipReason::MissingNewValue) => "skipped_missing_new_value",
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient. Dates are `YYYY-MM-DD` strings.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub patient_id: String,
    pub patient_case: String,
    pub species_id: Option<i64>,
    pub age_range_id: Option<i64>,
    pub conditions: Vec<i64>,
    pub treatments: Vec<i64>,
    pub date_admitted: Option<String>,
    pub location_found: String,
    pub release_date: Option<String>,
    pub released: bool,
    pub patient_image: Option<String>,
    pub user_uploaded_image: bool,
    pub patient_story: Option<String>,
    pub story_updated_at: Option<String>,
}

impl From<PatientRecord> for FfiPatient {
    fn from(patient: PatientRecord) -> Self {
        let format = |d: NaiveDate| d.format("%Y-%m-%d").to_string();
        Self {
            released: patient.status() == PatientStatus::Released,
            patient_id: patient.patient_id,
            patient_case: patient.patient_case,
            species_id: patient.species_id,
            age_range_id: patient.age_range_id,
            conditions: patient.conditions,
            treatments: patient.treatments,
            date_admitted: patient.date_admitted.map(format),
            location_found: patient.location_found,
            release_date: patient.release_date.map(format),
            patient_image: patient.patient_image,
            user_uploaded_image: patient.user_uploaded_image,
            patient_story: patient.patient_story,
            story_updated_at: patient.story_updated_at,
        }
    }
}

/// One field edit from the patient form.
#[derive(Debug, Clone, uniffi::Enum)]
pub enum FfiFieldEdit {
    Species { id: Option<i64> },
    AgeRange { id: Option<i64> },
    Conditions { ids: Vec<i64> },
    Treatments { ids: Vec<i64> },
    PatientCase { value: String },
    LocationFound { value: String },
    DateAdmitted { date: Option<String> },
    ReleaseDate { date: Option<String> },
    Image { image: Option<String> },
    Story { text: Option<String> },
}

impl FfiFieldEdit {
    fn into_edit(self) -> Result<FieldEdit, WildlinkError> {
        let edit = match self {
            FfiFieldEdit::Species { id } => FieldEdit::Species(id),
            FfiFieldEdit::AgeRange { id } => FieldEdit::AgeRange(id),
            FfiFieldEdit::Conditions { ids } => FieldEdit::Conditions(ids),
            FfiFieldEdit::Treatments { ids } => FieldEdit::Treatments(ids),
            FfiFieldEdit::PatientCase { value } => FieldEdit::PatientCase(value),
            FfiFieldEdit::LocationFound { value } => FieldEdit::LocationFound(value),
            FfiFieldEdit::DateAdmitted { date } => FieldEdit::DateAdmitted(parse_optional_date(date)?),
            FfiFieldEdit::ReleaseDate { date } => FieldEdit::ReleaseDate(parse_optional_date(date)?),
            FfiFieldEdit::Image { image } => FieldEdit::Image(image),
            FfiFieldEdit::Story { text } => FieldEdit::Story(text),
        };
        Ok(edit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiFieldClass {
    Critical,
    Cosmetic,
}

impl From<FieldClass> for FfiFieldClass {
    fn from(class: FieldClass) -> Self {
        match class {
            FieldClass::Critical => FfiFieldClass::Critical,
            FieldClass::Cosmetic => FfiFieldClass::Cosmetic,
        }
    }
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiOptionKind {
    Species,
    AgeRange,
    Condition,
    Treatment,
}

impl From<FfiOptionKind> for OptionKind {
    fn from(kind: FfiOptionKind) -> Self {
        match kind {
            FfiOptionKind::Species => OptionKind::Species,
            FfiOptionKind::AgeRange => OptionKind::AgeRange,
            FfiOptionKind::Condition => OptionKind::Condition,
            FfiOptionKind::Treatment => OptionKind::Treatment,
        }
    }
}

/// Everything a form needs to render one session.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSessionState {
    pub session_id: String,
    pub patient: FfiPatient,
    /// Narrative, or the placeholder while generating
    pub display_story: Option<String>,
    pub critical_changes: Vec<String>,
    pub cosmetic_changes: Vec<String>,
    pub needs_story_update: bool,
    pub needs_cosmetic_patch: bool,
    pub is_generating: bool,
    pub generation_error: Option<String>,
    /// saved, unsaved, saving or failed
    pub save_state: String,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFieldPatch {
    pub field: String,
    pub status: String,
    pub occurrences: u32,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatchResult {
    pub story: String,
    pub changed: bool,
    pub fields: Vec<FfiFieldPatch>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiGenerationRequest {
    pub session_id: String,
    pub request_id: u64,
    pub system_prompt: String,
    pub prompt: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStorySettings {
    pub prompt_template: String,
    pub ai_model: String,
}

impl From<StorySettings> for FfiStorySettings {
    fn from(settings: StorySettings) -> Self {
        Self {
            prompt_template: settings.prompt_template,
            ai_model: settings.ai_model,
        }
    }
}

impl From<FfiStorySettings> for StorySettings {
    fn from(settings: FfiStorySettings) -> Self {
        StorySettings {
            prompt_template: settings.prompt_template,
            ai_model: settings.ai_model,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSpeciesOption {
    pub id: i64,
    pub common_name: String,
    pub scientific_name: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOption {
    pub id: i64,
    pub label: String,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTreatmentOption {
    pub id: i64,
    pub label: String,
    pub cost_cents: i64,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientOptions {
    pub species: Vec<FfiSpeciesOption>,
    pub age_ranges: Vec<FfiOption>,
    pub conditions: Vec<FfiOption>,
    pub treatments: Vec<FfiTreatmentOption>,
}

impl From<PatientOptions> for FfiPatientOptions {
    fn from(options: PatientOptions) -> Self {
        let plain = |items: Vec<models::OptionItem>| -> Vec<FfiOption> {
            items
                .into_iter()
                .map(|i| FfiOption {
                    id: i.id,
                    label: i.label,
                })
                .collect()
        };
        Self {
            species: options
                .species
                .into_iter()
                .map(|s| FfiSpeciesOption {
                    id: s.id,
                    common_name: s.common_name,
                    scientific_name: s.scientific_name,
                    image: s.image,
                })
                .collect(),
            age_ranges: plain(options.age_ranges),
            conditions: plain(options.conditions),
            treatments: options
                .treatments
                .into_iter()
                .map(|t| FfiTreatmentOption {
                    id: t.id,
                    label: t.label,
                    cost_cents: t.cost_cents,
                })
                .collect(),
        }
    }
}
