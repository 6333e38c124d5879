//! Taking a quiz: answers in, report out.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use quizforge_core::{Answer, LifecycleError, Question, QuestionType, Quiz, QuizId, QuizStatus, VerdictSource};

use crate::evaluator::AnswerEvaluator;
use crate::store::{QuizStore, StoreError};

/// Errors from a quiz session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Quiz {0} not found")]
    QuizNotFound(QuizId),

    #[error("Quiz {quiz_id} has no question {ordinal}")]
    UnknownQuestion { quiz_id: QuizId, ordinal: u32 },

    #[error("Quiz {quiz_id} is {status} and does not accept answers")]
    NotAcceptingAnswers { quiz_id: QuizId, status: QuizStatus },

    #[error("Question {ordinal} of quiz {quiz_id} was already answered")]
    AlreadyAnswered { quiz_id: QuizId, ordinal: u32 },

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl From<StoreError> for SessionError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::QuizNotFound(id) => SessionError::QuizNotFound(id),
            StoreError::DuplicateAnswer { quiz_id, ordinal } => SessionError::AlreadyAnswered { quiz_id, ordinal },
            StoreError::QuizClosed { quiz_id, status } => SessionError::NotAcceptingAnswers { quiz_id, status },
            StoreError::Lifecycle(e) => SessionError::Lifecycle(e),
            other => SessionError::Store(other),
        }
    }
}

/// Result for one question in a [`QuizReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionResult {
    pub ordinal: u32,
    pub question_type: QuestionType,
    pub marks: u32,
    pub answered: bool,
    pub is_correct: bool,
    pub marks_obtained: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<VerdictSource>,
}

/// Final score of a completed quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizReport {
    pub quiz_id: QuizId,
    pub total_marks: u32,
    pub marks_obtained: u32,
    pub percentage: u8,
    pub answered: usize,
    pub results: Vec<QuestionResult>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuizReport {
    /// Build from a completed quiz and its persisted answers. Unanswered
    /// questions score zero.
    fn build(quiz: &Quiz, answers: &[Answer]) -> Self {
        let by_ordinal: HashMap<u32, &Answer> = answers.iter().map(|a| (a.question_ordinal(), a)).collect();

        let results: Vec<QuestionResult> = quiz
            .questions()
            .iter()
            .map(|question| match by_ordinal.get(&question.ordinal()) {
                Some(answer) => QuestionResult {
                    ordinal: question.ordinal(),
                    question_type: question.question_type(),
                    marks: question.marks(),
                    answered: true,
                    is_correct: answer.is_correct(),
                    marks_obtained: answer.marks_obtained(),
                    similarity_score: answer.similarity_score(),
                    source: Some(answer.source()),
                },
                None => QuestionResult {
                    ordinal: question.ordinal(),
                    question_type: question.question_type(),
                    marks: question.marks(),
                    answered: false,
                    is_correct: false,
                    marks_obtained: 0,
                    similarity_score: None,
                    source: None,
                },
            })
            .collect();

        Self {
            quiz_id: quiz.id(),
            total_marks: quiz.total_marks(),
            marks_obtained: quiz.marks_obtained().unwrap_or(0),
            percentage: quiz.percentage().unwrap_or(0),
            answered: results.iter().filter(|r| r.answered).count(),
            results,
            completed_at: quiz.completed_at(),
        }
    }
}

/// Drives a quiz from READY to COMPLETED.
pub struct QuizSession {
    evaluator: AnswerEvaluator,
    store: Arc<dyn QuizStore>,
}

impl QuizSession {
    pub fn new(evaluator: AnswerEvaluator, store: Arc<dyn QuizStore>) -> Self {
        Self { evaluator, store }
    }

    /// Open the quiz for answering. Idempotent.
    pub async fn start(&self, quiz_id: QuizId) -> Result<Quiz, SessionError> {
        let quiz = self.store.start_quiz(quiz_id).await?;
        info!(quiz_id = %quiz_id, "Quiz started");
        Ok(quiz)
    }

    /// Grade and persist one answer.
    pub async fn submit_answer(
        &self,
        quiz_id: QuizId,
        ordinal: u32,
        user_answer: &str,
    ) -> Result<Answer, SessionError> {
        let mut answers = self.submit_answers(quiz_id, vec![(ordinal, user_answer.to_string())]).await?;
        answers.pop().ok_or(SessionError::UnknownQuestion { quiz_id, ordinal })
    }

    /// Grade a batch of answers concurrently, then persist them in order.
    ///
    /// The whole batch is checked before anything is graded. A store failure
    /// part-way leaves the earlier answers persisted. If the quiz is finished
    /// while answers are being graded, the late answers are rejected with
    /// [`SessionError::NotAcceptingAnswers`].
    pub async fn submit_answers(
        &self,
        quiz_id: QuizId,
        submissions: Vec<(u32, String)>,
    ) -> Result<Vec<Answer>, SessionError> {
        let quiz = self.open(quiz_id).await?;

        let answered: HashSet<u32> = self
            .store
            .answers(quiz_id)
            .await?
            .iter()
            .map(Answer::question_ordinal)
            .collect();

        let mut seen = HashSet::new();
        let mut questions: Vec<Question> = Vec::with_capacity(submissions.len());
        for (ordinal, _) in &submissions {
            let question = quiz
                .question(*ordinal)
                .cloned()
                .ok_or(SessionError::UnknownQuestion { quiz_id, ordinal: *ordinal })?;
            if answered.contains(ordinal) || !seen.insert(*ordinal) {
                return Err(SessionError::AlreadyAnswered { quiz_id, ordinal: *ordinal });
            }
            questions.push(question);
        }

        if quiz.status() == QuizStatus::Ready {
            self.store.start_quiz(quiz_id).await.map_err(|e| match e {
                StoreError::Lifecycle(LifecycleError::InvalidTransition { from, .. }) => {
                    SessionError::NotAcceptingAnswers { quiz_id, status: from }
                }
                other => other.into(),
            })?;
            info!(quiz_id = %quiz_id, "Quiz started");
        }

        let pairs: Vec<(&Question, &str)> = questions
            .iter()
            .zip(&submissions)
            .map(|(question, (_, answer))| (question, answer.as_str()))
            .collect();
        let verdicts = self.evaluator.evaluate_many(&pairs).await;

        let mut recorded = Vec::with_capacity(verdicts.len());
        for ((question, answer), verdict) in pairs.into_iter().zip(verdicts) {
            let answer = Answer::record(quiz_id, question, answer, &verdict);
            self.store.insert_answer(&answer).await?;
            debug!(
                quiz_id = %quiz_id,
                ordinal = answer.question_ordinal(),
                correct = answer.is_correct(),
                marks = answer.marks_obtained(),
                "Answer recorded"
            );
            recorded.push(answer);
        }

        Ok(recorded)
    }

    /// Complete the quiz from the persisted answers.
    pub async fn finish(&self, quiz_id: QuizId) -> Result<QuizReport, SessionError> {
        let quiz = self.store.complete_quiz(quiz_id).await?;

        info!(
            quiz_id = %quiz_id,
            marks_obtained = quiz.marks_obtained().unwrap_or(0),
            total_marks = quiz.total_marks(),
            percentage = quiz.percentage().unwrap_or(0),
            "Quiz completed"
        );

        let answers = self.store.answers(quiz_id).await?;
        Ok(QuizReport::build(&quiz, &answers))
    }

    async fn open(&self, quiz_id: QuizId) -> Result<Quiz, SessionError> {
        let quiz = self.store.load_quiz(quiz_id).await?;
        if !quiz.status().accepts_answers() {
            return Err(SessionError::NotAcceptingAnswers {
                quiz_id,
                status: quiz.status(),
            });
        }
        Ok(quiz)
    }
}
