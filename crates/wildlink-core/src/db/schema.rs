//! SQLite schema definition.

/// Complete database schema for Wildlink.
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Option Catalogs
-- ============================================================================

CREATE TABLE IF NOT EXISTS species (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    common_name TEXT NOT NULL UNIQUE,
    scientific_name TEXT NOT NULL DEFAULT '',
    image TEXT
);

CREATE TABLE IF NOT EXISTS age_ranges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS conditions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS treatments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL UNIQUE,
    cost_cents INTEGER NOT NULL DEFAULT 0
);

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,
    patient_case TEXT NOT NULL,
    species_id INTEGER,
    age_range_id INTEGER,
    conditions TEXT NOT NULL DEFAULT '[]',       -- JSON array of condition ids, entry order
    treatments TEXT NOT NULL DEFAULT '[]',       -- JSON array of treatment ids, entry order
    date_admitted TEXT,                          -- YYYY-MM-DD
    location_found TEXT NOT NULL DEFAULT '',
    release_date TEXT,                           -- YYYY-MM-DD, NULL while in care
    patient_image TEXT,
    user_uploaded_image INTEGER NOT NULL DEFAULT 0,
    patient_story TEXT CHECK (patient_story IS NULL OR length(trim(patient_story)) > 0),
    story_created_at TEXT,
    story_updated_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_case ON patients(patient_case);
CREATE INDEX IF NOT EXISTS idx_patients_release ON patients(release_date);

-- ============================================================================
-- Settings
-- ============================================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,                         -- JSON
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
