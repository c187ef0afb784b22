//! Story prompts for patient narrative generation.
//!
//! Templates are plain text with `{field_name}` placeholders. Rendering is a
//! single left-to-right pass, so substituted values are never re-expanded.

use serde::{Deserialize, Serialize};

/// System prompt sent ahead of every story request.
pub const SYSTEM_PROMPT: &str = "You are a wildlife rehabilitation center storyteller. Your goal is to create engaging, accurate, and hopeful stories about animals in care.";

/// Text shown in place of the narrative while a story is being written.
pub const GENERATING_PLACEHOLDER: &str = "We are writing the story please wait...";

/// Default story template used when the settings provider has none.
pub const DEFAULT_STORY_TEMPLATE: &str = r#"Create a detailed 2-paragraph story about a {age} {species} (Identified as {patient_case}) in our wildlife rehabilitation center's care. The animal was admitted on {date_admitted} and has been in care for {days_in_care} days (current date: {current_date}). The story should focus specifically on the medical journey and recovery process.

First paragraph: Describe the circumstances of admission, found in {location_found}. Detail the specific medical conditions: {conditions}. Explain how these conditions affect the animal and why they required professional care.

Second paragraph: Focus on the treatment progress SO FAR, keeping in mind this animal has only been in care for {days_in_care} days. If {days_in_care} is less than 7 days, focus on initial response to treatment and immediate care plans rather than long-term progress. If {days_in_care} is more than 7 days, you may describe longer-term progress. Explain how each treatment ({treatments}) is contributing to the recovery process. Keep the timeline realistic - do not imply weeks or months of progress unless the admission date supports this.

Important guidelines:
- Maintain medical accuracy while being engaging
- Specifically address each listed condition and treatment
- Focus on the rehabilitation process rather than general observations
- Use professional but accessible language
- Do not include specific staff names or center location
- Keep the tone hopeful but realistic about the recovery process
- CRITICAL: Ensure all timeline references match the actual time in care ({days_in_care} days)
- Use natural language when describing the animals time in our care"#;

/// Placeholder names understood by [`render_story_prompt`].
///
/// `age` and `age_range` are synonyms.
pub const PLACEHOLDERS: &[&str] = &[
    "patient_case",
    "species",
    "age",
    "age_range",
    "location_found",
    "date_admitted",
    "days_in_care",
    "current_date",
    "conditions",
    "treatments",
];

/// Values substituted into a story template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryPromptFields {
    /// Case label (e.g. "BAEA 083")
    pub patient_case: String,
    /// Species common name
    pub species: String,
    /// Age-range label (e.g. "Sub-Adult")
    pub age_range: String,
    /// Where the animal was found
    pub location_found: String,
    /// Admission date, already formatted for prose
    pub date_admitted: String,
    /// Whole days between admission and the current date
    pub days_in_care: i64,
    /// Current date, already formatted for prose
    pub current_date: String,
    /// Joined condition labels
    pub conditions: String,
    /// Joined treatment labels
    pub treatments: String,
}

impl StoryPromptFields {
    /// Look up the value for a placeholder name.
    pub fn value(&self, placeholder: &str) -> Option<String> {
        let value = match placeholder {
            "patient_case" => self.patient_case.clone(),
            "species" => self.species.clone(),
            "age" | "age_range" => self.age_range.clone(),
            "location_found" => self.location_found.clone(),
            "date_admitted" => self.date_admitted.clone(),
            "days_in_care" => self.days_in_care.to_string(),
            "current_date" => self.current_date.clone(),
            "conditions" => self.conditions.clone(),
            "treatments" => self.treatments.clone(),
            _ => return None,
        };
        Some(value)
    }
}

/// Fill a story template. Unknown placeholders are kept verbatim.
pub fn render_story_prompt(template: &str, fields: &StoryPromptFields) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match placeholder_name(after) {
            Some(name) => {
                match fields.value(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// All `{name}` tokens in a template, in order of first appearance.
pub fn placeholders_in(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match placeholder_name(after) {
            Some(name) => {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
                rest = &after[name.len() + 1..];
            }
            None => rest = after,
        }
    }

    names
}

/// Placeholders in a template that [`render_story_prompt`] would leave unfilled.
pub fn unknown_placeholders(template: &str) -> Vec<String> {
    placeholders_in(template)
        .into_iter()
        .filter(|name| !PLACEHOLDERS.contains(&name.as_str()))
        .collect()
}

/// Join labels for prose: "a", "a and b", "a, b and c".
pub fn join_labels<S: AsRef<str>>(labels: &[S]) -> String {
    match labels {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(|s| s.as_ref()).collect();
            format!("{} and {}", head.join(", "), last.as_ref())
        }
    }
}

/// Identifier right after an opening brace, if it is closed by `}`.
fn placeholder_name(after_brace: &str) -> Option<&str> {
    let close = after_brace.find('}')?;
    let name = &after_brace[..close];
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}
