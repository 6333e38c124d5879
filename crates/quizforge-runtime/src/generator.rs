//! Quiz generation: content in, READY quiz out.
//!
//! One generation attempt is one completion call. The quiz is persisted in
//! GENERATING before the call, so a dropped or failed attempt always leaves
//! a quiz that can be inspected and regenerated.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use quizforge_core::prompts::PromptBuilder;
use quizforge_core::{
    ConfigurationError, LifecycleError, QuestionSetParser, Quiz, QuizConfiguration, QuizId,
    QuizStatus, Shortfall,
};

use crate::completion::{CompletionClient, CompletionError};
use crate::config::{GenerationSettings, ShortfallPolicy};
use crate::store::{completed_text, ContentStore, QuizStore, StoreError};

/// Errors from a generation attempt.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Invalid quiz configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("No completed document text to generate from")]
    NoContent,

    #[error("Completion service unavailable for quiz {quiz_id}: {source}")]
    CompletionUnavailable {
        quiz_id: QuizId,
        #[source]
        source: CompletionError,
    },

    #[error("Reply for quiz {quiz_id} contained no valid questions")]
    NoValidQuestions { quiz_id: QuizId },

    #[error("Reply for quiz {quiz_id} fell short: {shortfall}")]
    Shortfall { quiz_id: QuizId, shortfall: Shortfall },

    #[error("Quiz {quiz_id} is {status} and cannot be regenerated")]
    NotRegenerable { quiz_id: QuizId, status: QuizStatus },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl GenerationError {
    /// The quiz left behind in GENERATING, if one was created.
    pub fn quiz_id(&self) -> Option<QuizId> {
        match self {
            GenerationError::CompletionUnavailable { quiz_id, .. }
            | GenerationError::NoValidQuestions { quiz_id }
            | GenerationError::Shortfall { quiz_id, .. }
            | GenerationError::NotRegenerable { quiz_id, .. } => Some(*quiz_id),
            _ => None,
        }
    }
}

/// What to generate a quiz from.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub configuration: QuizConfiguration,
    pub document_ids: Vec<String>,
}

/// A quiz that reached READY.
#[derive(Debug, Clone)]
pub struct GeneratedQuiz {
    pub quiz: Quiz,
    /// Set when the reply held fewer questions than requested.
    pub shortfall: Option<Shortfall>,
    /// Question blocks dropped by validation.
    pub discarded: usize,
}

/// Runs generation attempts against the completion service.
pub struct QuizGenerator {
    client: CompletionClient,
    quizzes: Arc<dyn QuizStore>,
    content: Arc<dyn ContentStore>,
    settings: GenerationSettings,
    prompts: PromptBuilder,
}

impl QuizGenerator {
    pub fn new(
        client: CompletionClient,
        quizzes: Arc<dyn QuizStore>,
        content: Arc<dyn ContentStore>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            prompts: PromptBuilder::with_max_content_chars(settings.max_content_chars),
            client,
            quizzes,
            content,
            settings,
        }
    }

    /// Generate a new quiz.
    ///
    /// Configuration and content problems are reported before anything is
    /// persisted or sent.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GeneratedQuiz, GenerationError> {
        let quiz = Quiz::start_generation_within(request.configuration, self.settings.max_questions)?;
        let text = self.source_text(&request.document_ids).await?;

        self.quizzes.save_quiz(&quiz).await?;
        self.quizzes.save_sources(quiz.id(), &request.document_ids).await?;
        info!(quiz_id = %quiz.id(), documents = request.document_ids.len(), "Quiz generation started");

        self.attempt(quiz, &text).await
    }

    /// Retry generation for a quiz left in GENERATING, keeping its id.
    pub async fn regenerate(&self, quiz_id: QuizId) -> Result<GeneratedQuiz, GenerationError> {
        let quiz = self.quizzes.load_quiz(quiz_id).await?;
        if quiz.status() != QuizStatus::Generating {
            return Err(GenerationError::NotRegenerable {
                quiz_id,
                status: quiz.status(),
            });
        }

        let document_ids = self.quizzes.sources(quiz_id).await?;
        let text = self.source_text(&document_ids).await?;
        info!(quiz_id = %quiz_id, "Quiz regeneration started");

        self.attempt(quiz, &text).await
    }

    async fn source_text(&self, document_ids: &[String]) -> Result<String, GenerationError> {
        let documents = self.content.documents(document_ids).await?;
        let text = completed_text(&documents);
        if text.is_empty() {
            return Err(GenerationError::NoContent);
        }
        Ok(text)
    }

    async fn attempt(&self, mut quiz: Quiz, text: &str) -> Result<GeneratedQuiz, GenerationError> {
        let quiz_id = quiz.id();
        let prompt = self.prompts.generation_prompt(text, quiz.configuration());

        let reply = match self.client.complete(&prompt).await {
            Ok(reply) => reply,
            Err(source) => {
                quiz.mark_generation_failed(source.to_string())?;
                self.quizzes.save_quiz(&quiz).await?;
                return Err(GenerationError::CompletionUnavailable { quiz_id, source });
            }
        };

        let outcome = QuestionSetParser::new(quiz.configuration()).parse(&reply);

        if let Some(shortfall) = outcome.shortfall {
            if self.settings.shortfall_policy == ShortfallPolicy::RejectPartial && !outcome.questions.is_empty() {
                quiz.mark_generation_failed(format!("reply fell short: {}", shortfall))?;
                self.quizzes.save_quiz(&quiz).await?;
                return Err(GenerationError::Shortfall { quiz_id, shortfall });
            }
        }

        match quiz.on_generated(outcome.questions) {
            Ok(()) => {}
            Err(LifecycleError::NoQuestions) => {
                self.quizzes.save_quiz(&quiz).await?;
                warn!(quiz_id = %quiz_id, discarded = outcome.discarded, "Generation produced no valid questions");
                return Err(GenerationError::NoValidQuestions { quiz_id });
            }
            Err(e) => return Err(e.into()),
        }

        self.quizzes.save_quiz(&quiz).await?;
        info!(
            quiz_id = %quiz_id,
            questions = quiz.questions().len(),
            total_marks = quiz.total_marks(),
            shortfall = outcome.shortfall.is_some(),
            "Quiz ready"
        );

        Ok(GeneratedQuiz {
            quiz,
            shortfall: outcome.shortfall,
            discarded: outcome.discarded,
        })
    }
}
