//! Single-shot completion calls with a bounded wait.
//!
//! [`CompletionClient`] sends exactly one user message per call, never
//! retries, and reports every failure as one of four [`CompletionError`]s.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};

/// Why a completion call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Completion service rejected the credential")]
    Unauthorized,

    #[error("Completion service returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Completion service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Completion service unreachable: {0}")]
    Unreachable(String),
}

impl CompletionError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::Unauthorized => "unauthorized",
            CompletionError::Upstream { .. } => "upstream",
            CompletionError::Timeout(_) => "timeout",
            CompletionError::Unreachable(_) => "unreachable",
        }
    }
}

impl From<ProviderError> for CompletionError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::AuthError => CompletionError::Unauthorized,
            ProviderError::ApiError { status: 401 | 403, .. } => CompletionError::Unauthorized,
            ProviderError::ApiError { status, message } => CompletionError::Upstream {
                status,
                body: message,
            },
            ProviderError::RateLimited { retry_after } => CompletionError::Upstream {
                status: 429,
                body: match retry_after {
                    Some(after) => format!("rate limited, retry after {}s", after.as_secs()),
                    None => "rate limited".to_string(),
                },
            },
            ProviderError::ParseError(message) => CompletionError::Upstream {
                status: 200,
                body: format!("unreadable response: {}", message),
            },
            ProviderError::Timeout(after) => CompletionError::Timeout(after),
            ProviderError::Transport(message) | ProviderError::NotConfigured(message) => {
                CompletionError::Unreachable(message)
            }
        }
    }
}

/// Sends prompts to the completion service.
#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self { provider, config }
    }

    /// Same provider with a different per-call bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send `prompt` as one user message and return the reply text.
    ///
    /// The call is abandoned once the configured timeout elapses.
    pub async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let messages = vec![ChatMessage::user(prompt)];
        let bound = self.config.timeout;

        let result = match timeout(bound, self.provider.complete(messages, &self.config)).await {
            Ok(result) => result.map_err(CompletionError::from),
            Err(_) => Err(CompletionError::Timeout(bound)),
        };

        match &result {
            Ok(response) => debug!(
                provider = self.provider.name(),
                model = %response.model,
                prompt_tokens = response.usage.prompt_tokens,
                completion_tokens = response.usage.completion_tokens,
                "Completion succeeded"
            ),
            Err(e) => warn!(
                provider = self.provider.name(),
                kind = e.kind(),
                error = %e,
                "Completion failed"
            ),
        }

        result.map(|response| response.content)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{client, ScriptedProvider, Step};
    use super::*;
    use crate::providers::status_error;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_sends_one_user_message() {
        let provider = ScriptedProvider::replying("reply text");
        let reply = client(provider.clone()).complete("the prompt").await.unwrap();

        assert_eq!(reply, "reply text");
        let prompts = provider.prompts.lock();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0], vec![ChatMessage::user("the prompt")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_enforced() {
        let provider = ScriptedProvider::new([Step::Hang]);
        let result = client(provider).complete("prompt").await;
        assert_eq!(result, Err(CompletionError::Timeout(Duration::from_millis(200))));
    }

    #[tokio::test]
    async fn test_no_retry_on_failure() {
        let provider = ScriptedProvider::new([Step::Fail(500), Step::Reply("late".to_string())]);
        let result = client(provider.clone()).complete("prompt").await;

        assert!(matches!(result, Err(CompletionError::Upstream { status: 500, .. })));
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_provider_error_mapping() {
        assert_eq!(CompletionError::from(ProviderError::AuthError), CompletionError::Unauthorized);
        assert_eq!(
            CompletionError::from(ProviderError::ApiError { status: 403, message: "no".into() }),
            CompletionError::Unauthorized
        );
        assert!(matches!(
            CompletionError::from(ProviderError::RateLimited { retry_after: Some(Duration::from_secs(5)) }),
            CompletionError::Upstream { status: 429, .. }
        ));
        assert_eq!(
            CompletionError::from(ProviderError::Timeout(Duration::from_secs(1))),
            CompletionError::Timeout(Duration::from_secs(1))
        );
        assert!(matches!(
            CompletionError::from(ProviderError::Transport("refused".into())),
            CompletionError::Unreachable(_)
        ));
        assert!(matches!(
            CompletionError::from(ProviderError::ParseError("bad json".into())),
            CompletionError::Upstream { status: 200, .. }
        ));
    }

    proptest! {
        #[test]
        fn prop_http_failures_map_to_one_reason(
            status in 400u16..600,
            retry_after in proptest::option::of("[0-9]{1,4}"),
            body in "\\PC{0,60}",
        ) {
            let error = CompletionError::from(status_error(status, retry_after.as_deref(), &body));
            match status {
                401 | 403 => {
                    prop_assert_eq!(error, CompletionError::Unauthorized);
                }
                expected => {
                    prop_assert!(matches!(error, CompletionError::Upstream { status, .. } if status == expected), "expected Upstream with status {}", expected);
                }
            }
        }
    }
}
