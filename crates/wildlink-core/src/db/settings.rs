//! Story settings persistence.

use rusqlite::OptionalExtension;
use wildlink_llm::{SettingsError, SettingsProvider, SettingsResult, StorySettings};

use super::{Database, DbError, DbResult};

const STORY_SETTINGS_KEY: &str = "story_settings";

impl Database {
    /// Active story settings; defaults when none were saved.
    pub fn get_story_settings(&self) -> DbResult<StorySettings> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                [STORY_SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(serde_json::from_str::<StorySettings>(&json)?.normalized()),
            None => Ok(StorySettings::default()),
        }
    }

    /// Validate and store story settings.
    pub fn save_story_settings(&self, settings: &StorySettings) -> DbResult<()> {
        settings
            .validate()
            .map_err(|e| DbError::Constraint(e.to_string()))?;

        let json = serde_json::to_string(settings)?;
        self.conn.execute(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')
            "#,
            [STORY_SETTINGS_KEY, json.as_str()],
        )?;
        tracing::info!(model = %settings.ai_model, "Saved story settings");
        Ok(())
    }
}

impl SettingsProvider for Database {
    fn story_settings(&self) -> SettingsResult<StorySettings> {
        self.get_story_settings()
            .map_err(|e| SettingsError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_story_settings().unwrap(), StorySettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let db = Database::open_in_memory().unwrap();
        let settings = StorySettings {
            prompt_template: "A story about {species} from {location_found}.".into(),
            ai_model: "gpt-4o-mini".into(),
        };
        db.save_story_settings(&settings).unwrap();
        assert_eq!(db.story_settings().unwrap(), settings);

        let updated = StorySettings {
            ai_model: "gpt-4o".into(),
            ..settings
        };
        db.save_story_settings(&updated).unwrap();
        assert_eq!(db.get_story_settings().unwrap(), updated);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let db = Database::open_in_memory().unwrap();
        let settings = StorySettings {
            prompt_template: "{species} {weight}".into(),
            ai_model: "gpt-4o".into(),
        };
        assert!(matches!(
            db.save_story_settings(&settings),
            Err(DbError::Constraint(_))
        ));
    }

    #[test]
    fn test_stored_unsupported_model_normalized() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO settings (key, value) VALUES ('story_settings', ?)",
                [r#"{"prompt_template":"{species}","ai_model":"gpt-2"}"#],
            )
            .unwrap();
        let settings = db.get_story_settings().unwrap();
        assert_eq!(settings.ai_model, "gpt-4o");
        assert_eq!(settings.prompt_template, "{species}");
    }
}
