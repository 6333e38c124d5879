//! OpenAI-compatible chat-completions provider.
//!
//! Works against any endpoint that speaks the `/chat/completions` shape
//! (OpenAI, OpenRouter, local gateways) via `base_url`.

use super::{
    endpoint, error_for_status,
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    transport_error, validate_base_url, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider,
    ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "OpenAI API key",
        ))
    }

    /// Read `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        ApiCredential::from_env(OPENAI_API_KEY_ENV, "OpenAI API key").map(Self::with_credential)
    }

    /// Build from provider JSON (`api_key`, `base_url`), with the API key
    /// falling back to `OPENAI_API_KEY`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential =
            ApiCredential::from_config_or_env(config, "api_key", OPENAI_API_KEY_ENV, "OpenAI API key")?;

        let provider = Self::with_credential(credential);
        Ok(match config["base_url"].as_str() {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    fn with_credential(credential: ApiCredential) -> Self {
        Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl ChatResponse {
    fn into_completion(self, requested_model: &str) -> Result<CompletionResponse, ProviderError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;

        let content = choice
            .message
            .content
            .ok_or_else(|| ProviderError::ParseError("choice has no message content".to_string()))?;

        let usage = self.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });

        Ok(CompletionResponse {
            content,
            usage,
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
            stop_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        if self.credential.is_empty() {
            return Err(ProviderError::AuthError);
        }

        let request = ChatRequest {
            model: &config.model,
            messages: &messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(self.credential.expose())
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, config.timeout))?;

        let response = error_for_status(response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        body.into_completion(&config.model)
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Creates [`OpenAiProvider`]s from JSON.
///
/// ```json
/// {
///   "api_key": "sk-...",           // Optional, falls back to OPENAI_API_KEY env
///   "base_url": "https://..."      // Optional, any chat-completions endpoint
/// }
/// ```
pub struct OpenAiProviderFactory;

impl ProviderFactory for OpenAiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "openai"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(OpenAiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", OPENAI_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "OpenAI API key required: set 'api_key' in config or {} env",
                OPENAI_API_KEY_ENV
            )));
        }
        validate_base_url(config)
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "model": "gpt-4o-mini",
            "base_url": DEFAULT_BASE_URL
        })
    }

    fn description(&self) -> &'static str {
        "OpenAI-compatible chat completions"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::user("Write a quiz")];
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            max_tokens: 1024,
            temperature: 0.2,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_first_choice() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"MCQ: 2+2?"},"finish_reason":"stop"}],
                "model":"gpt-4o-mini","usage":{"prompt_tokens":12,"completion_tokens":5}}"#,
        )
        .unwrap();

        let completion = body.into_completion("requested").unwrap();
        assert_eq!(completion.content, "MCQ: 2+2?");
        assert_eq!(completion.model, "gpt-4o-mini");
        assert_eq!(completion.usage.total(), 17);
        assert_eq!(completion.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_response_without_choices_is_parse_error() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(body.into_completion("m"), Err(ProviderError::ParseError(_))));
    }

    #[test]
    fn test_factory_type_and_validation() {
        let factory = OpenAiProviderFactory;
        assert_eq!(factory.provider_type(), "openai");
        assert!(factory
            .validate_config(&serde_json::json!({"api_key": "k", "base_url": "localhost"}))
            .is_err());

        let provider = factory
            .create(&serde_json::json!({"api_key": "k", "base_url": "http://localhost:8080/v1"}))
            .unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret = "sk-openai-secret-98765";
        let debug_output = format!("{:?}", OpenAiProvider::new(secret));
        assert!(!debug_output.contains(secret));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_empty_key_fails_without_network() {
        let result = OpenAiProvider::new("")
            .complete(vec![ChatMessage::user("hi")], &CompletionConfig::default())
            .await;
        assert!(matches!(result, Err(ProviderError::AuthError)));
    }
}
