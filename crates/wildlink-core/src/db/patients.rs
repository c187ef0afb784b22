//! Patient database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::PatientRecord;

const DATE_FORMAT: &str = "%Y-%m-%d";

const PATIENT_COLUMNS: &str = r#"
    patient_id, patient_case, species_id, age_range_id, conditions, treatments,
    date_admitted, location_found, release_date, patient_image, user_uploaded_image,
    patient_story, story_created_at, story_updated_at, created_at, updated_at
"#;

impl Database {
    /// Insert or update a patient.
    pub fn save_patient(&self, patient: &PatientRecord) -> DbResult<()> {
        if patient.patient_case.trim().is_empty() {
            return Err(DbError::Constraint("patient_case must not be empty".into()));
        }

        let conditions_json = serde_json::to_string(&patient.conditions)?;
        let treatments_json = serde_json::to_string(&patient.treatments)?;

        self.conn.execute(
            r#"
            INSERT INTO patients (
                patient_id, patient_case, species_id, age_range_id, conditions, treatments,
                date_admitted, location_found, release_date, patient_image, user_uploaded_image,
                patient_story, story_created_at, story_updated_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ON CONFLICT(patient_id) DO UPDATE SET
                patient_case = excluded.patient_case,
                species_id = excluded.species_id,
                age_range_id = excluded.age_range_id,
                conditions = excluded.conditions,
                treatments = excluded.treatments,
                date_admitted = excluded.date_admitted,
                location_found = excluded.location_found,
                release_date = excluded.release_date,
                patient_image = excluded.patient_image,
                user_uploaded_image = excluded.user_uploaded_image,
                patient_story = excluded.patient_story,
                story_created_at = excluded.story_created_at,
                story_updated_at = excluded.story_updated_at,
                updated_at = excluded.updated_at
            "#,
            params![
                patient.patient_id,
                patient.patient_case,
                patient.species_id,
                patient.age_range_id,
                conditions_json,
                treatments_json,
                patient.date_admitted.map(format_date),
                patient.location_found,
                patient.release_date.map(format_date),
                patient.patient_image,
                patient.user_uploaded_image,
                patient.story(),
                patient.story_created_at,
                patient.story_updated_at,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: &str) -> DbResult<Option<PatientRecord>> {
        let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE patient_id = ?");
        let row = self
            .conn
            .query_row(&sql, [patient_id], PatientRow::from_row)
            .optional()?;

        row.map(PatientRecord::try_from).transpose()
    }

    /// List all patients, newest admission first.
    pub fn list_patients(&self) -> DbResult<Vec<PatientRecord>> {
        let sql = format!(
            "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY date_admitted DESC, patient_case"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], PatientRow::from_row)?;

        rows.map(|row| PatientRecord::try_from(row?))
            .collect::<DbResult<Vec<_>>>()
    }

    /// Delete a patient.
    pub fn delete_patient(&self, patient_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE patient_id = ?", [patient_id])?;
        Ok(rows_affected > 0)
    }
}

/// Raw row before JSON and date parsing.
struct PatientRow {
    patient_id: String,
    patient_case: String,
    species_id: Option<i64>,
    age_range_id: Option<i64>,
    conditions: String,
    treatments: String,
    date_admitted: Option<String>,
    location_found: String,
    release_date: Option<String>,
    patient_image: Option<String>,
    user_uploaded_image: bool,
    patient_story: Option<String>,
    story_created_at: Option<String>,
    story_updated_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            patient_id: row.get(0)?,
            patient_case: row.get(1)?,
            species_id: row.get(2)?,
            age_range_id: row.get(3)?,
            conditions: row.get(4)?,
            treatments: row.get(5)?,
            date_admitted: row.get(6)?,
            location_found: row.get(7)?,
            release_date: row.get(8)?,
            patient_image: row.get(9)?,
            user_uploaded_image: row.get(10)?,
            patient_story: row.get(11)?,
            story_created_at: row.get(12)?,
            story_updated_at: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}

impl TryFrom<PatientRow> for PatientRecord {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(PatientRecord {
            patient_id: row.patient_id,
            patient_case: row.patient_case,
            species_id: row.species_id,
            age_range_id: row.age_range_id,
            conditions: serde_json::from_str(&row.conditions)?,
            treatments: serde_json::from_str(&row.treatments)?,
            date_admitted: row.date_admitted.as_deref().map(parse_date).transpose()?,
            location_found: row.location_found,
            release_date: row.release_date.as_deref().map(parse_date).transpose()?,
            patient_image: row.patient_image,
            user_uploaded_image: row.user_uploaded_image,
            patient_story: row.patient_story.filter(|s| !s.trim().is_empty()),
            story_created_at: row.story_created_at,
            story_updated_at: row.story_updated_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(text: &str) -> DbResult<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| DbError::InvalidData(format!("bad date {text:?}: {e}")))
}
