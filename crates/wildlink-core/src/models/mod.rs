//! Domain models for the wildlink system.

mod options;
mod patient;

pub use options::*;
pub use patient::*;
