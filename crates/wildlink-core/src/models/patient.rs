//! Patient models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::PatientOptions;

/// Whether a patient is still being cared for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PatientStatus {
    /// No release date recorded
    InCare,
    /// Released back to the wild
    Released,
}

/// One animal admitted to the center.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    /// Local UUID
    pub patient_id: String,
    /// Case label (e.g., "BAEA 083")
    pub patient_case: String,
    /// Species option ID
    pub species_id: Option<i64>,
    /// Age-range option ID
    pub age_range_id: Option<i64>,
    /// Condition option IDs, in the order staff entered them
    pub conditions: Vec<i64>,
    /// Treatment option IDs, in the order staff entered them
    pub treatments: Vec<i64>,
    /// Admission date
    pub date_admitted: Option<NaiveDate>,
    /// Where the animal was found
    pub location_found: String,
    /// Release date (None while in care)
    pub release_date: Option<NaiveDate>,
    /// Image reference (URL or media ID)
    pub patient_image: Option<String>,
    /// True once staff picked an image instead of the species default
    pub user_uploaded_image: bool,
    /// Public narrative; never Some("")
    pub patient_story: Option<String>,
    /// When the narrative was first written
    pub story_created_at: Option<String>,
    /// When the narrative last changed
    pub story_updated_at: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl PatientRecord {
    /// Create a new patient with only a case label.
    pub fn new(patient_case: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            patient_id: uuid::Uuid::new_v4().to_string(),
            patient_case,
            species_id: None,
            age_range_id: None,
            conditions: Vec::new(),
            treatments: Vec::new(),
            date_admitted: None,
            location_found: String::new(),
            release_date: None,
            patient_image: None,
            user_uploaded_image: false,
            patient_story: None,
            story_created_at: None,
            story_updated_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// The narrative, if one exists.
    pub fn story(&self) -> Option<&str> {
        self.patient_story.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Check if a narrative exists.
    pub fn has_story(&self) -> bool {
        self.story().is_some()
    }

    /// Replace the narrative. Blank text clears it.
    pub fn set_story(&mut self, story: Option<String>) {
        let story = story.filter(|s| !s.trim().is_empty());
        let now = chrono::Utc::now().to_rfc3339();

        match story {
            Some(text) => {
                if self.story_created_at.is_none() {
                    self.story_created_at = Some(now.clone());
                }
                self.story_updated_at = Some(now);
                self.patient_story = Some(text);
            }
            None => {
                self.patient_story = None;
                self.story_created_at = None;
                self.story_updated_at = None;
            }
        }
        self.touch();
    }

    /// Released once a release date is recorded.
    pub fn status(&self) -> PatientStatus {
        if self.release_date.is_some() {
            PatientStatus::Released
        } else {
            PatientStatus::InCare
        }
    }

    /// Whole days since admission, counted up to `today`.
    pub fn days_in_care(&self, today: NaiveDate) -> Option<i64> {
        self.date_admitted
            .map(|admitted| (today - admitted).num_days())
    }

    /// Point the image at the species default unless staff uploaded one.
    pub fn apply_species_image(&mut self, options: &PatientOptions) {
        if self.user_uploaded_image {
            return;
        }
        let default_image = self
            .species_id
            .and_then(|id| options.species_image(id))
            .map(str::to_string);
        if default_image.is_some() && default_image != self.patient_image {
            self.patient_image = default_image;
            self.touch();
        }
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}
