//! # quizforge-runtime
//!
//! Completion-service backed quiz generation and grading.
//!
//! `quizforge-core` owns every deterministic rule: prompts, the reply parser,
//! scoring and the quiz lifecycle. This crate adds the parts that suspend:
//! calls to the completion service and reads/writes against the stores.
//!
//! ## Degradation
//!
//! - Generation fails loudly. A failed attempt leaves the quiz in GENERATING
//!   with the reason recorded; [`QuizGenerator::regenerate`] retries it.
//! - Evaluation never fails. When the completion service is unavailable or
//!   its judgment is unreadable, free-text answers are graded by lexical
//!   overlap.
//!
//! ## Example
//!
//! ```rust,ignore
//! use quizforge_runtime::{EngineConfig, ProviderRegistry, CompletionClient};
//!
//! let config = EngineConfig::from_yaml_file("engine.yaml")?;
//! let registry = ProviderRegistry::with_defaults();
//! let client = CompletionClient::new(
//!     config.build_provider(&registry)?,
//!     config.completion_config(&registry),
//! );
//!
//! let generator = QuizGenerator::new(client.clone(), quizzes.clone(), content, config.generation.clone());
//! let generated = generator.generate(request).await?;
//!
//! let session = QuizSession::new(AnswerEvaluator::new(client, config.evaluation), quizzes);
//! session.submit_answer(generated.quiz.id(), 1, "2").await?;
//! let report = session.finish(generated.quiz.id()).await?;
//! ```

pub mod completion;
pub mod config;
pub mod evaluator;
pub mod generator;
pub mod providers;
pub mod session;
pub mod store;

pub use completion::{CompletionClient, CompletionError};
pub use config::{
    CompletionSettings, ConfigError, EngineConfig, EvaluationSettings, GenerationSettings,
    ShortfallPolicy,
};
pub use evaluator::AnswerEvaluator;
pub use generator::{GeneratedQuiz, GenerationError, GenerationRequest, QuizGenerator};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ProviderFactory, ProviderRegistry, TokenUsage,
};
pub use session::{QuestionResult, QuizReport, QuizSession, SessionError};
pub use store::{
    completed_text, ContentStore, Document, DocumentStatus, InMemoryContentStore,
    InMemoryQuizStore, QuizStore, StoreError,
};
