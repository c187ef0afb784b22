//! Option catalog database operations.

use rusqlite::params;

use super::{Database, DbError, DbResult};
use crate::models::{OptionItem, OptionKind, PatientOptions, SpeciesOption, TreatmentOption};

impl Database {
    /// Load every option catalog.
    pub fn list_options(&self) -> DbResult<PatientOptions> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, common_name, scientific_name, image FROM species ORDER BY id")?;
        let species = stmt
            .query_map([], |row| {
                Ok(SpeciesOption {
                    id: row.get(0)?,
                    common_name: row.get(1)?,
                    scientific_name: row.get(2)?,
                    image: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT id, label, cost_cents FROM treatments ORDER BY id")?;
        let treatments = stmt
            .query_map([], |row| {
                Ok(TreatmentOption {
                    id: row.get(0)?,
                    label: row.get(1)?,
                    cost_cents: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PatientOptions {
            species,
            age_ranges: self.list_labelled("age_ranges")?,
            conditions: self.list_labelled("conditions")?,
            treatments,
        })
    }

    /// Seed the center's default catalogs into empty tables.
    ///
    /// Returns the number of options inserted.
    pub fn seed_default_options(&self) -> DbResult<usize> {
        let defaults = PatientOptions::center_defaults();
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;

        if table_is_empty(&tx, "species")? {
            for s in &defaults.species {
                tx.execute(
                    "INSERT INTO species (id, common_name, scientific_name, image) VALUES (?1, ?2, ?3, ?4)",
                    params![s.id, s.common_name, s.scientific_name, s.image],
                )?;
                inserted += 1;
            }
        }
        for (table, items) in [("age_ranges", &defaults.age_ranges), ("conditions", &defaults.conditions)] {
            if table_is_empty(&tx, table)? {
                for item in items {
                    tx.execute(
                        &format!("INSERT INTO {table} (id, label) VALUES (?1, ?2)"),
                        params![item.id, item.label],
                    )?;
                    inserted += 1;
                }
            }
        }
        if table_is_empty(&tx, "treatments")? {
            for t in &defaults.treatments {
                tx.execute(
                    "INSERT INTO treatments (id, label, cost_cents) VALUES (?1, ?2, ?3)",
                    params![t.id, t.label, t.cost_cents],
                )?;
                inserted += 1;
            }
        }

        tx.commit()?;
        tracing::debug!(inserted, "Seeded default options");
        Ok(inserted)
    }

    /// Add an option and return its ID. Species get no image.
    pub fn add_option(&self, kind: OptionKind, label: &str) -> DbResult<i64> {
        let label = label.trim();
        if label.is_empty() {
            return Err(DbError::Constraint("option label must not be empty".into()));
        }

        match kind {
            OptionKind::Species => self.conn.execute(
                "INSERT INTO species (common_name) VALUES (?1)",
                [label],
            )?,
            OptionKind::AgeRange => self
                .conn
                .execute("INSERT INTO age_ranges (label) VALUES (?1)", [label])?,
            OptionKind::Condition => self
                .conn
                .execute("INSERT INTO conditions (label) VALUES (?1)", [label])?,
            OptionKind::Treatment => self
                .conn
                .execute("INSERT INTO treatments (label) VALUES (?1)", [label])?,
        };
        Ok(self.conn.last_insert_rowid())
    }

    fn list_labelled(&self, table: &str) -> DbResult<Vec<OptionItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, label FROM {table} ORDER BY id"))?;
        let items = stmt
            .query_map([], |row| {
                Ok(OptionItem {
                    id: row.get(0)?,
                    label: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

fn table_is_empty(conn: &rusqlite::Connection, table: &str) -> DbResult<bool> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(count == 0)
}
