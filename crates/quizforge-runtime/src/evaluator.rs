//! Answer evaluation with graceful degradation.
//!
//! Multiple-choice answers are graded locally. Free-text answers are judged by
//! the completion service; when the call fails or the reply cannot be read,
//! the lexical-overlap fallback grades the answer instead. Evaluation itself
//! never fails.

use futures::future::join_all;
use tracing::{debug, warn};

use quizforge_core::prompts::PromptBuilder;
use quizforge_core::scoring::{fallback_verdict, grade_option, Judgment};
use quizforge_core::{Question, Verdict};

use crate::completion::CompletionClient;
use crate::config::EvaluationSettings;

/// Grades answers against questions.
#[derive(Debug, Clone)]
pub struct AnswerEvaluator {
    client: CompletionClient,
    prompts: PromptBuilder,
    settings: EvaluationSettings,
}

impl AnswerEvaluator {
    pub fn new(client: CompletionClient, settings: EvaluationSettings) -> Self {
        Self {
            client,
            prompts: PromptBuilder::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    /// Grade one answer.
    pub async fn evaluate(&self, question: &Question, user_answer: &str) -> Verdict {
        match self.settings.threshold_for(question.question_type()) {
            None => grade_option(question, user_answer),
            Some(threshold) => self.judge(question, user_answer, threshold).await,
        }
    }

    /// Grade independent answers concurrently. Results keep input order.
    pub async fn evaluate_many(&self, answers: &[(&Question, &str)]) -> Vec<Verdict> {
        join_all(
            answers
                .iter()
                .map(|(question, answer)| self.evaluate(question, answer)),
        )
        .await
    }

    async fn judge(&self, question: &Question, user_answer: &str, threshold: u8) -> Verdict {
        if user_answer.trim().is_empty() {
            debug!(ordinal = question.ordinal(), "Blank free-text answer graded locally");
            return fallback_verdict(question, user_answer, threshold);
        }

        let prompt = self.prompts.similarity_prompt(
            user_answer,
            question.reference_answer(),
            question.text(),
            threshold,
        );

        match self.client.complete(&prompt).await {
            Ok(reply) => match Judgment::parse(&reply, threshold) {
                Some(judgment) => {
                    debug!(
                        ordinal = question.ordinal(),
                        question_type = %question.question_type(),
                        score = judgment.score,
                        "Answer judged"
                    );
                    judgment.into_verdict(question)
                }
                None => {
                    warn!(
                        ordinal = question.ordinal(),
                        "Judgment reply had neither score nor verdict, using lexical fallback"
                    );
                    fallback_verdict(question, user_answer, threshold)
                }
            },
            Err(e) => {
                warn!(
                    ordinal = question.ordinal(),
                    kind = e.kind(),
                    error = %e,
                    "Judgment unavailable, using lexical fallback"
                );
                fallback_verdict(question, user_answer, threshold)
            }
        }
    }
}
