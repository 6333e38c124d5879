//! Engine configuration.
//!
//! ```yaml
//! completion:
//!   provider: openai        # or anthropic
//!   model: gpt-4o-mini
//!   timeout: 30s
//! generation:
//!   max_content_chars: 3000
//!   shortfall_policy: accept_partial
//! evaluation:
//!   saq_threshold: 90
//!   laq_threshold: 75
//! ```
//!
//! Every field has a default, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use quizforge_core::{QuestionType, LAQ_THRESHOLD, MAX_QUESTIONS, SAQ_THRESHOLD};
use quizforge_core::prompts::DEFAULT_MAX_CONTENT_CHARS;

use crate::providers::{CompletionConfig, LlmProvider, ProviderError, ProviderRegistry};

/// Errors from loading engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read engine configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse engine configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid engine configuration: {0}")]
    Invalid(String),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),
}

/// What to do when a reply yields fewer questions than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    /// Keep the valid subset and report the shortfall.
    #[default]
    AcceptPartial,
    /// Fail the generation attempt.
    RejectPartial,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub completion: CompletionSettings,
    pub generation: GenerationSettings,
    pub evaluation: EvaluationSettings,
}

/// Completion-service settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// Registered provider name
    pub provider: String,

    /// Model; the provider's default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub max_tokens: u32,

    pub temperature: f32,

    /// Bound on a single completion call, e.g. `30s` or `1m 30s`
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Falls back to the provider's environment variable when absent
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        let defaults = CompletionConfig::default();
        Self {
            provider: "openai".to_string(),
            model: None,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            timeout: defaults.timeout,
            base_url: None,
            api_key: None,
        }
    }
}

impl fmt::Debug for CompletionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Question-generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Source content beyond this many characters is truncated
    pub max_content_chars: usize,

    /// Upper bound on questions per quiz
    pub max_questions: u32,

    pub shortfall_policy: ShortfallPolicy,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
            max_questions: MAX_QUESTIONS,
            shortfall_policy: ShortfallPolicy::default(),
        }
    }
}

/// Similarity thresholds for free-text answers, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    pub saq_threshold: u8,
    pub laq_threshold: u8,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            saq_threshold: SAQ_THRESHOLD,
            laq_threshold: LAQ_THRESHOLD,
        }
    }
}

impl EvaluationSettings {
    /// Threshold for a free-text type; `None` for MCQ.
    pub fn threshold_for(&self, question_type: QuestionType) -> Option<u8> {
        match question_type {
            QuestionType::Mcq => None,
            QuestionType::Saq => Some(self.saq_threshold),
            QuestionType::Laq => Some(self.laq_threshold),
        }
    }
}

impl EngineConfig {
    /// Parse from YAML. An empty document yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, threshold) in [
            ("saq_threshold", self.evaluation.saq_threshold),
            ("laq_threshold", self.evaluation.laq_threshold),
        ] {
            if threshold > 100 {
                return Err(ConfigError::Invalid(format!("{} must be 0-100, got {}", name, threshold)));
            }
        }
        if self.generation.max_questions == 0 {
            return Err(ConfigError::Invalid("max_questions must be at least 1".to_string()));
        }
        if self.generation.max_content_chars == 0 {
            return Err(ConfigError::Invalid("max_content_chars must be at least 1".to_string()));
        }
        if self.completion.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Provider JSON handed to the registry.
    pub fn provider_json(&self) -> serde_json::Value {
        let mut json = serde_json::Map::new();
        if let Some(key) = &self.completion.api_key {
            json.insert("api_key".to_string(), key.clone().into());
        }
        if let Some(url) = &self.completion.base_url {
            json.insert("base_url".to_string(), url.clone().into());
        }
        serde_json::Value::Object(json)
    }

    /// Request settings, taking the model from the provider defaults when unset.
    pub fn completion_config(&self, registry: &ProviderRegistry) -> CompletionConfig {
        let model = self
            .completion
            .model
            .clone()
            .or_else(|| {
                registry
                    .default_config(&self.completion.provider)
                    .and_then(|c| c["model"].as_str().map(str::to_string))
            })
            .unwrap_or_else(|| CompletionConfig::default().model);

        CompletionConfig {
            model,
            max_tokens: self.completion.max_tokens,
            temperature: self.completion.temperature,
            timeout: self.completion.timeout,
        }
    }

    /// Create the configured provider.
    pub fn build_provider(&self, registry: &ProviderRegistry) -> Result<Arc<dyn LlmProvider>, ConfigError> {
        Ok(registry.create(&self.completion.provider, &self.provider_json())?)
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
