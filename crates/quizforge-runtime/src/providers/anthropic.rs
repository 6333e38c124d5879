//! Anthropic messages API provider.

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

/// Environment variable name for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Anthropic provider.
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_credential(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "Anthropic API key",
        ))
    }

    /// Read `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        ApiCredential::from_env(ANTHROPIC_API_KEY_ENV, "Anthropic API key").map(Self::with_credential)
    }

    /// Build from provider JSON (`api_key`, `base_url`), with the API key
    /// falling back to `ANTHROPIC_API_KEY`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            ANTHROPIC_API_KEY_ENV,
            "Anthropic API key",
        )?;

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
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlockResponse>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlockResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        if self.credential.is_empty() {
            return Err(ProviderError::AuthError);
        }

        let request = AnthropicRequest {
            model: &config.model,
            max_tokens: config.max_tokens,
            messages: &messages,
            temperature: config.temperature,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "messages"))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, config.timeout))?;

        let response = error_for_status(response).await?;

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let content = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Creates [`AnthropicProvider`]s from JSON.
///
/// ```json
/// {
///   "api_key": "sk-ant-...",       // Optional, falls back to ANTHROPIC_API_KEY env
///   "base_url": "https://..."      // Optional
/// }
/// ```
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(AnthropicProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic API key required: set 'api_key' in config or {} env",
                ANTHROPIC_API_KEY_ENV
            )));
        }
        validate_base_url(config)
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "model": "claude-sonnet-4-5",
            "base_url": DEFAULT_BASE_URL
        })
    }

    fn description(&self) -> &'static str {
        "Anthropic messages API"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = AnthropicProvider::new("test-key");
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::user("Grade this")];
        let request = AnthropicRequest {
            model: "claude-sonnet-4-5",
            max_tokens: 512,
            messages: &messages,
            temperature: 0.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Grade this");
        assert_eq!(json["max_tokens"], 512);
    }

    #[test]
    fn test_response_text_blocks() {
        let body: AnthropicResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Similarity Score: 80"}],"model":"m","stop_reason":"end_turn","usage":{"input_tokens":10,"output_tokens":4}}"#,
        )
        .unwrap();
        assert_eq!(body.content[0].text.as_deref(), Some("Similarity Score: 80"));
        assert_eq!(body.usage.output_tokens, 4);
    }

    #[test]
    fn test_factory_create_with_api_key() {
        let provider = AnthropicProviderFactory
            .create(&serde_json::json!({"api_key": "test-api-key"}))
            .unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn test_factory_rejects_invalid_base_url() {
        let config = serde_json::json!({"api_key": "test-key", "base_url": "invalid-url"});
        assert!(AnthropicProviderFactory.validate_config(&config).is_err());
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "sk-ant-REDACTED";
        let debug_output = format!("{:?}", AnthropicProvider::new(secret_key));
        assert!(!debug_output.contains(secret_key));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_empty_key_fails_without_network() {
        let provider = AnthropicProvider::new("");
        assert!(!provider.health_check().await);

        let result = provider
            .complete(vec![ChatMessage::user("hi")], &CompletionConfig::default())
            .await;
        assert!(matches!(result, Err(ProviderError::AuthError)));
    }

    #[test]
    fn test_from_config_tracks_source() {
        let config = serde_json::json!({"api_key": "config-api-key", "base_url": "https://custom.api.com/v1"});
        let provider = AnthropicProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "https://custom.api.com/v1");
        assert_eq!(provider.credential.source(), CredentialSource::Config);
    }
}
