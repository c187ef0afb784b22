//! Story prompts and narrative generators for Wildlink.
//!
//! This crate renders the configurable story template for a patient and
//! sends it to a narrative generator. The OpenAI client is behind the
//! `openai` feature; [`MockGenerator`] serves tests and offline use.

pub mod generator;
#[cfg(feature = "openai")]
pub mod openai;
pub mod prompts;
pub mod settings;

pub use generator::*;
pub use prompts::*;
pub use settings::*;
