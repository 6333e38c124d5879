//! Quiz configuration from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_configuration_schema;
use crate::types::{Difficulty, QuestionType};

/// Upper bound on the total question count, bounding prompt and reply size.
pub const MAX_QUESTIONS: u32 = 30;

/// Errors that can occur when loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration does not match schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Quiz must request at least one question")]
    NoQuestions,

    #[error("Quiz requests {requested} questions, the limit is {limit}")]
    TooManyQuestions { requested: u64, limit: u32 },
}

/// The requested shape of a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizConfiguration {
    /// Human-readable name
    pub name: String,

    #[serde(default)]
    pub difficulty: Difficulty,

    #[serde(default)]
    pub mcq_count: u32,

    #[serde(default)]
    pub saq_count: u32,

    #[serde(default)]
    pub laq_count: u32,
}

impl QuizConfiguration {
    /// A configuration with no questions requested yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            difficulty: Difficulty::default(),
            mcq_count: 0,
            saq_count: 0,
            laq_count: 0,
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_counts(mut self, mcq: u32, saq: u32, laq: u32) -> Self {
        self.mcq_count = mcq;
        self.saq_count = saq;
        self.laq_count = laq;
        self
    }

    /// Requested count for one question type.
    pub fn count(&self, question_type: QuestionType) -> u32 {
        match question_type {
            QuestionType::Mcq => self.mcq_count,
            QuestionType::Saq => self.saq_count,
            QuestionType::Laq => self.laq_count,
        }
    }

    /// Total requested questions. Widened so absurd counts cannot overflow.
    pub fn total(&self) -> u64 {
        u64::from(self.mcq_count) + u64::from(self.saq_count) + u64::from(self.laq_count)
    }

    /// Total marks a fully generated quiz would carry.
    pub fn requested_marks(&self) -> u64 {
        QuestionType::ALL
            .iter()
            .map(|t| u64::from(self.count(*t)) * u64::from(t.marks()))
            .sum()
    }

    /// Validate counts against [`MAX_QUESTIONS`].
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.validate_within(MAX_QUESTIONS)
    }

    /// Validate counts against a caller-chosen limit.
    pub fn validate_within(&self, limit: u32) -> Result<(), ConfigurationError> {
        let requested = self.total();
        if requested == 0 {
            return Err(ConfigurationError::NoQuestions);
        }
        if requested > u64::from(limit) {
            return Err(ConfigurationError::TooManyQuestions { requested, limit });
        }
        Ok(())
    }

    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        let document: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_document(document)
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let document: serde_json::Value = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Parse a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn from_document(document: serde_json::Value) -> Result<Self, ConfigurationError> {
        validate_configuration_schema(&document).map_err(ConfigurationError::SchemaViolation)?;
        let configuration: QuizConfiguration = serde_json::from_value(document)?;
        configuration.validate()?;
        Ok(configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONFIGURATION: &str = r#"
name: "Cell Biology"
difficulty: hard
mcq_count: 5
saq_count: 2
laq_count: 1
"#;

    #[test]
    fn test_parse_valid_configuration() {
        let config = QuizConfiguration::from_yaml(VALID_CONFIGURATION).unwrap();
        assert_eq!(config.name, "Cell Biology");
        assert_eq!(config.difficulty, Difficulty::Hard);
        assert_eq!(config.total(), 8);
        assert_eq!(config.requested_marks(), 5 + 6 + 5);
    }

    #[test]
    fn test_missing_counts_default_to_zero() {
        let config = QuizConfiguration::from_json(r#"{"name": "Quick", "saq_count": 2}"#).unwrap();
        assert_eq!(config.mcq_count, 0);
        assert_eq!(config.count(QuestionType::Saq), 2);
        assert_eq!(config.difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_zero_questions_rejected() {
        let result = QuizConfiguration::from_yaml("name: Empty\n");
        assert!(matches!(result, Err(ConfigurationError::NoQuestions)));
    }

    #[test]
    fn test_too_many_questions_rejected() {
        let config = QuizConfiguration::new("Big").with_counts(20, 10, 1);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::TooManyQuestions { requested: 31, limit: 30 })
        ));
        assert!(QuizConfiguration::new("Big").with_counts(20, 10, 0).validate().is_ok());
    }

    #[test]
    fn test_huge_counts_do_not_overflow() {
        let config = QuizConfiguration::new("Huge").with_counts(u32::MAX, u32::MAX, u32::MAX);
        assert!(matches!(config.validate(), Err(ConfigurationError::TooManyQuestions { .. })));
    }

    #[test]
    fn test_custom_limit() {
        let config = QuizConfiguration::new("Small").with_counts(3, 0, 0);
        assert!(config.validate_within(2).is_err());
        assert!(config.validate_within(3).is_ok());
    }

    #[test]
    fn test_schema_violation_reported() {
        let result = QuizConfiguration::from_yaml("name: Bad\nmcq_count: -2\n");
        match result {
            Err(ConfigurationError::SchemaViolation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("mcq_count")));
            }
            other => panic!("Expected schema violation, got {:?}", other),
        }
    }
}
