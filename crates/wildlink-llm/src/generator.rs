//! Narrative generator boundary.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default time allowed for one generation request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Generator errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("Narrative generator is not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Generator API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Generator returned an empty narrative")]
    EmptyNarrative,
}

pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// A single blocking prompt-to-narrative request.
pub trait NarrativeGenerator {
    fn generate(&self, prompt: &str, model: &str, timeout: Duration) -> GeneratorResult<String>;
}

/// Trim generator output; blank output is an error.
pub fn clean_narrative(raw: &str) -> GeneratorResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GeneratorError::EmptyNarrative);
    }
    Ok(trimmed.to_string())
}

/// One recorded call to a [`MockGenerator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationCall {
    pub prompt: String,
    pub model: String,
}

/// Mock generator for testing without a live API.
pub struct MockGenerator {
    outcome: GeneratorResult<String>,
    calls: Mutex<Vec<GenerationCall>>,
}

impl MockGenerator {
    /// Always answer with `story`.
    pub fn succeed(story: &str) -> Self {
        Self {
            outcome: Ok(story.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always fail with `error`.
    pub fn fail(error: GeneratorError) -> Self {
        Self {
            outcome: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<GenerationCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NarrativeGenerator for MockGenerator {
    fn generate(&self, prompt: &str, model: &str, _timeout: Duration) -> GeneratorResult<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(GenerationCall {
                prompt: prompt.to_string(),
                model: model.to_string(),
            });
        }
        match &self.outcome {
            Ok(story) => clean_narrative(story),
            Err(e) => Err(e.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_narrative() {
        assert_eq!(clean_narrative("  A story.\n").unwrap(), "A story.");
        assert_eq!(clean_narrative(" \n\t"), Err(GeneratorError::EmptyNarrative));
    }

    #[test]
    fn test_mock_records_calls() {
        let generator = MockGenerator::succeed("An eagle recovers.");
        let story = generator
            .generate("Write about an eagle", "gpt-4o", DEFAULT_TIMEOUT)
            .unwrap();

        assert_eq!(story, "An eagle recovers.");
        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "gpt-4o");
        assert_eq!(calls[0].prompt, "Write about an eagle");
    }

    #[test]
    fn test_mock_failure() {
        let generator = MockGenerator::fail(GeneratorError::Timeout(30));
        let result = generator.generate("prompt", "gpt-4o", DEFAULT_TIMEOUT);
        assert_eq!(result, Err(GeneratorError::Timeout(30)));
        assert_eq!(generator.calls().len(), 1);
    }

    #[test]
    fn test_mock_blank_story_is_error() {
        let generator = MockGenerator::succeed("   ");
        let result = generator.generate("prompt", "gpt-4o", DEFAULT_TIMEOUT);
        assert_eq!(result, Err(GeneratorError::EmptyNarrative));
    }
}
