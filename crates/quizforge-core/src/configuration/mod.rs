//! Quiz configuration parsing and validation.
//!
//! A configuration names the quiz, its difficulty and how many questions of
//! each type to generate. Files are checked against an embedded JSON Schema
//! before the count rules run.

mod parser;
mod schema;

pub use parser::{ConfigurationError, QuizConfiguration, MAX_QUESTIONS};
pub use schema::validate_configuration_schema;
