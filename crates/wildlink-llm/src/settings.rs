//! Story generation settings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prompts::{unknown_placeholders, DEFAULT_STORY_TEMPLATE};

/// Model used when none (or an unsupported one) is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Models the story generator may be configured with.
pub const SUPPORTED_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini"];

/// Settings errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("Prompt template is empty")]
    EmptyTemplate,

    #[error("Unknown placeholders in template: {}", .0.join(", "))]
    UnknownPlaceholders(Vec<String>),

    #[error("Settings storage error: {0}")]
    Storage(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Active prompt template and model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorySettings {
    /// Template with `{field_name}` placeholders
    pub prompt_template: String,
    /// Model identifier passed to the narrative generator
    pub ai_model: String,
}

impl Default for StorySettings {
    fn default() -> Self {
        Self {
            prompt_template: DEFAULT_STORY_TEMPLATE.to_string(),
            ai_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl StorySettings {
    /// Replace a blank template or unsupported model with the defaults.
    pub fn normalized(mut self) -> Self {
        if self.prompt_template.trim().is_empty() {
            self.prompt_template = DEFAULT_STORY_TEMPLATE.to_string();
        }
        if !SUPPORTED_MODELS.contains(&self.ai_model.as_str()) {
            tracing::warn!(model = %self.ai_model, "Unsupported model, falling back to {DEFAULT_MODEL}");
            self.ai_model = DEFAULT_MODEL.to_string();
        }
        self
    }

    /// Strict check used before saving settings entered by staff.
    pub fn validate(&self) -> SettingsResult<()> {
        if self.prompt_template.trim().is_empty() {
            return Err(SettingsError::EmptyTemplate);
        }
        if !SUPPORTED_MODELS.contains(&self.ai_model.as_str()) {
            return Err(SettingsError::UnsupportedModel(self.ai_model.clone()));
        }
        let unknown = unknown_placeholders(&self.prompt_template);
        if !unknown.is_empty() {
            return Err(SettingsError::UnknownPlaceholders(unknown));
        }
        Ok(())
    }

    /// Parse settings JSON, filling gaps with defaults.
    pub fn from_json(json: &str) -> SettingsResult<Self> {
        let settings: StorySettings = serde_json::from_str(json)?;
        Ok(settings.normalized())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> SettingsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Source of the active story settings.
pub trait SettingsProvider {
    fn story_settings(&self) -> SettingsResult<StorySettings>;
}

impl SettingsProvider for StorySettings {
    fn story_settings(&self) -> SettingsResult<StorySettings> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = StorySettings::default();
        assert_eq!(settings.ai_model, "gpt-4o");
        assert!(settings.prompt_template.contains("{days_in_care}"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_normalized_fallbacks() {
        let settings = StorySettings {
            prompt_template: "   ".into(),
            ai_model: "gpt-3".into(),
        }
        .normalized();
        assert_eq!(settings, StorySettings::default());
    }

    #[test]
    fn test_from_json_partial() {
        let settings = StorySettings::from_json(r#"{"ai_model":"gpt-4o-mini"}"#).unwrap();
        assert_eq!(settings.ai_model, "gpt-4o-mini");
        assert_eq!(settings.prompt_template, DEFAULT_STORY_TEMPLATE);
    }

    #[test]
    fn test_validate_rejects() {
        let bad_model = StorySettings {
            ai_model: "claude".into(),
            ..Default::default()
        };
        assert!(matches!(bad_model.validate(), Err(SettingsError::UnsupportedModel(_))));

        let bad_template = StorySettings {
            prompt_template: "A {species} weighing {weight}".into(),
            ..Default::default()
        };
        match bad_template.validate() {
            Err(SettingsError::UnknownPlaceholders(names)) => assert_eq!(names, vec!["weight"]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let settings = StorySettings::default();
        let json = settings.to_json().unwrap();
        assert_eq!(StorySettings::from_json(&json).unwrap(), settings);
    }
}
