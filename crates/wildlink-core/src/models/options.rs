//! Option catalogs for patient fields (species, age ranges, conditions, treatments).

use serde::{Deserialize, Serialize};

/// A species staff can assign to a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeciesOption {
    pub id: i64,
    /// Display name (e.g., "Bald Eagle")
    pub common_name: String,
    pub scientific_name: String,
    /// Default patient image for this species
    pub image: Option<String>,
}

/// A plain labelled option (age range, condition).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionItem {
    pub id: i64,
    pub label: String,
}

/// A treatment with its cost to the center.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreatmentOption {
    pub id: i64,
    pub label: String,
    /// Cost in cents
    pub cost_cents: i64,
}

/// Which option catalog an entry belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OptionKind {
    Species,
    AgeRange,
    Condition,
    Treatment,
}

/// Everything the patient form can pick from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientOptions {
    pub species: Vec<SpeciesOption>,
    pub age_ranges: Vec<OptionItem>,
    pub conditions: Vec<OptionItem>,
    pub treatments: Vec<TreatmentOption>,
}

impl PatientOptions {
    /// Species common name by ID.
    pub fn species_label(&self, id: i64) -> Option<&str> {
        self.species
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.common_name.as_str())
    }

    /// Default image for a species.
    pub fn species_image(&self, id: i64) -> Option<&str> {
        self.species
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.image.as_deref())
    }

    /// Age-range label by ID.
    pub fn age_range_label(&self, id: i64) -> Option<&str> {
        self.age_ranges
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.label.as_str())
    }

    /// Condition labels in the order given. Unknown IDs are skipped.
    pub fn condition_labels(&self, ids: &[i64]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.conditions.iter().find(|c| c.id == *id))
            .map(|c| c.label.clone())
            .collect()
    }

    /// Treatment labels in the order given. Unknown IDs are skipped.
    pub fn treatment_labels(&self, ids: &[i64]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.treatments.iter().find(|t| t.id == *id))
            .map(|t| t.label.clone())
            .collect()
    }

    /// The catalogs a new center starts with.
    pub fn center_defaults() -> Self {
        let species = [
            ("Bald Eagle", "Haliaeetus leucocephalus", "bald-eagle.jpg"),
            ("Common Raven", "Corvus corax", "common-raven.jpg"),
            ("Raccoon", "Procyon lotor", "racoon.png"),
            ("Varied Thrush", "Ixoreus naevius", "varied-thrush.png"),
            ("Sea Otter", "Enhydra lutris", "sea-otter.png"),
            ("River Otter", "Lontra canadensis", "river-otter.png"),
            ("Harbour Seal", "Pinniped", "harbour-seal.png"),
            ("Sea Lion", "Otariinae", "sea-lions.png"),
            ("Marmot", "Marmota", "marmot.png"),
            ("Roosevelt Elk", "Cervus canadensis roosevelti", "roosevelt-elk.png"),
            ("Crow", "Corvus", "crow.png"),
            ("Pileated Woodpecker", "Picidae", "pileated-woodpecker.png"),
            ("Violet Green Swallow", "Hirundinidae", "violet-green-swallow.png"),
            ("Least Sandpiper", "Scolopacidae", "leasts-sandpiper.png"),
            ("Deer", "Cervidae", "deer.png"),
        ];
        let age_ranges = ["Baby", "Hatchling", "Fledgling", "Juvenile", "Sub-Adult", "Adult"];
        let conditions = [
            "Cat Attack",
            "Dog Attack",
            "Broken Wing",
            "Infection",
            "Emaciation",
            "Window Strike",
            "Boat Strike",
            "Car Strike",
            "Head Trauma",
        ];
        let treatments = [
            ("Physiotherapy", 20000),
            ("Fluid Therapy", 10000),
            ("Wing Wrap", 6000),
            ("Anti-Biotics", 15000),
            ("Trauma Therapy", 30000),
            ("Nutritional Support", 15000),
            ("Orphan Care", 50000),
        ];

        Self {
            species: species
                .iter()
                .zip(1..)
                .map(|((common, scientific, image), id)| SpeciesOption {
                    id,
                    common_name: common.to_string(),
                    scientific_name: scientific.to_string(),
                    image: Some(format!("images/{}", image)),
                })
                .collect(),
            age_ranges: labelled(&age_ranges),
            conditions: labelled(&conditions),
            treatments: treatments
                .iter()
                .zip(1..)
                .map(|((label, cost), id)| TreatmentOption {
                    id,
                    label: label.to_string(),
                    cost_cents: *cost,
                })
                .collect(),
        }
    }
}

fn labelled(labels: &[&str]) -> Vec<OptionItem> {
    labels
        .iter()
        .zip(1..)
        .map(|(label, id)| OptionItem {
            id,
            label: label.to_string(),
        })
        .collect()
}
