//! Story consistency engine.
//!
//! Keeps a patient's narrative in step with the record it describes:
//!
//! 1. **Classify**: every tracked field is critical or cosmetic
//! 2. **Snapshot**: field values are captured when a story is written
//! 3. **Detect**: current values are compared against the snapshots
//! 4. **Patch**: cosmetic drift is fixed by text substitution
//! 5. **Regenerate**: critical drift needs a fresh narrative

mod dates;
mod drift;
mod fields;
mod patcher;
mod prompt;
mod session;
mod snapshot;

pub use dates::*;
pub use drift::*;
pub use fields::*;
pub use patcher::*;
pub use prompt::*;
pub use session::*;
pub use snapshot::*;

use thiserror::Error;
use wildlink_llm::{GeneratorError, SettingsError};

use crate::db::DbError;

/// Story engine errors.
#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Missing required fields: {}", .0.iter().map(|f| f.label()).collect::<Vec<_>>().join(", "))]
    MissingFields(Vec<StoryField>),

    #[error("Patient has no story to patch")]
    NothingToPatch,

    #[error("Snapshot class mismatch: expected {expected}, found {found}")]
    WrongSnapshotClass { expected: FieldClass, found: FieldClass },

    #[error("Story generation already in progress")]
    GenerationInProgress,

    #[error("Save already in progress")]
    SaveInProgress,

    #[error("Previous save failed, save again before editing the story: {0}")]
    UnsavedChanges(String),

    #[error("Story session is closed")]
    SessionClosed,

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type StoryResult<T> = Result<T, StoryError>;
