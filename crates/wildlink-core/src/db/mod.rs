//! Database layer for Wildlink.

mod options;
mod patients;
mod schema;
mod settings;

pub use schema::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

use crate::models::{PatientOptions, PatientRecord};

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Where patients and option catalogs come from and go back to.
pub trait PatientStore {
    fn get_patient(&self, patient_id: &str) -> DbResult<Option<PatientRecord>>;
    fn list_options(&self) -> DbResult<PatientOptions>;
    fn save_patient(&self, patient: &PatientRecord) -> DbResult<()>;
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl PatientStore for Database {
    fn get_patient(&self, patient_id: &str) -> DbResult<Option<PatientRecord>> {
        Database::get_patient(self, patient_id)
    }

    fn list_options(&self) -> DbResult<PatientOptions> {
        Database::list_options(self)
    }

    fn save_patient(&self, patient: &PatientRecord) -> DbResult<()> {
        Database::save_patient(self, patient)
    }
}
