//! Quiz lifecycle: GENERATING -> READY -> IN_PROGRESS -> COMPLETED.
//!
//! Transitions only move forward. Total marks are fixed when the quiz becomes
//! READY; the obtained marks are supplied once, at completion, from the
//! persisted answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::configuration::{ConfigurationError, QuizConfiguration, MAX_QUESTIONS};
use crate::types::{Question, QuizId};

/// Where a quiz is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizStatus {
    Generating,
    Ready,
    InProgress,
    Completed,
}

impl QuizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStatus::Generating => "GENERATING",
            QuizStatus::Ready => "READY",
            QuizStatus::InProgress => "IN_PROGRESS",
            QuizStatus::Completed => "COMPLETED",
        }
    }

    /// Whether answers may be submitted in this state.
    pub fn accepts_answers(&self) -> bool {
        matches!(self, QuizStatus::Ready | QuizStatus::InProgress)
    }
}

impl fmt::Display for QuizStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Cannot move quiz from {from} to {to}")]
    InvalidTransition { from: QuizStatus, to: QuizStatus },

    #[error("Generation produced no valid questions")]
    NoQuestions,

    #[error("Quiz has no marks to score against")]
    ZeroTotalMarks,

    #[error("Obtained marks {obtained} exceed the quiz total {total}")]
    MarksExceedTotal { obtained: u32, total: u32 },
}

/// A quiz and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    id: QuizId,
    configuration: QuizConfiguration,
    questions: Vec<Question>,
    status: QuizStatus,
    total_marks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    marks_obtained: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    percentage: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generation_failure: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl Quiz {
    /// Allocate a quiz in GENERATING after validating its configuration.
    pub fn start_generation(configuration: QuizConfiguration) -> Result<Self, ConfigurationError> {
        Self::start_generation_within(configuration, MAX_QUESTIONS)
    }

    /// Like [`Quiz::start_generation`] with a caller-chosen question limit.
    pub fn start_generation_within(
        configuration: QuizConfiguration,
        limit: u32,
    ) -> Result<Self, ConfigurationError> {
        configuration.validate_within(limit)?;
        Ok(Self {
            id: QuizId::new(),
            configuration,
            questions: Vec::new(),
            status: QuizStatus::Generating,
            total_marks: 0,
            marks_obtained: None,
            percentage: None,
            generation_failure: None,
            created_at: Utc::now(),
            completed_at: None,
        })
    }

    /// Attach generated questions and move to READY.
    ///
    /// An empty list leaves the quiz in GENERATING with a recorded failure.
    pub fn on_generated(&mut self, questions: Vec<Question>) -> Result<(), LifecycleError> {
        self.require(QuizStatus::Generating, QuizStatus::Ready)?;

        if questions.is_empty() {
            self.generation_failure = Some(LifecycleError::NoQuestions.to_string());
            return Err(LifecycleError::NoQuestions);
        }

        self.total_marks = questions.iter().map(Question::marks).sum();
        self.questions = questions;
        self.generation_failure = None;
        self.status = QuizStatus::Ready;
        Ok(())
    }

    /// Record why generation failed. The quiz stays in GENERATING.
    pub fn mark_generation_failed(&mut self, reason: impl Into<String>) -> Result<(), LifecycleError> {
        if self.status != QuizStatus::Generating {
            return Err(LifecycleError::InvalidTransition {
                from: self.status,
                to: QuizStatus::Generating,
            });
        }
        self.generation_failure = Some(reason.into());
        Ok(())
    }

    /// READY -> IN_PROGRESS. Returns whether the state changed; calling it
    /// again while IN_PROGRESS is a no-op.
    pub fn on_first_interaction(&mut self) -> Result<bool, LifecycleError> {
        match self.status {
            QuizStatus::InProgress => Ok(false),
            QuizStatus::Ready => {
                self.status = QuizStatus::InProgress;
                Ok(true)
            }
            from => Err(LifecycleError::InvalidTransition {
                from,
                to: QuizStatus::InProgress,
            }),
        }
    }

    /// IN_PROGRESS -> COMPLETED, freezing `marks_obtained` and the percentage.
    ///
    /// `marks_obtained` must be the sum over the persisted answers.
    pub fn complete(&mut self, marks_obtained: u32) -> Result<u8, LifecycleError> {
        self.require(QuizStatus::InProgress, QuizStatus::Completed)?;

        let percentage = percentage(marks_obtained, self.total_marks)?;
        self.marks_obtained = Some(marks_obtained);
        self.percentage = Some(percentage);
        self.completed_at = Some(Utc::now());
        self.status = QuizStatus::Completed;
        Ok(percentage)
    }

    fn require(&self, from: QuizStatus, to: QuizStatus) -> Result<(), LifecycleError> {
        if self.status == from {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition { from: self.status, to })
        }
    }

    pub fn id(&self) -> QuizId {
        self.id
    }

    pub fn configuration(&self) -> &QuizConfiguration {
        &self.configuration
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Question by ordinal.
    pub fn question(&self, ordinal: u32) -> Option<&Question> {
        self.questions.iter().find(|q| q.ordinal() == ordinal)
    }

    pub fn status(&self) -> QuizStatus {
        self.status
    }

    pub fn total_marks(&self) -> u32 {
        self.total_marks
    }

    /// Set once COMPLETED.
    pub fn marks_obtained(&self) -> Option<u32> {
        self.marks_obtained
    }

    /// Set once COMPLETED.
    pub fn percentage(&self) -> Option<u8> {
        self.percentage
    }

    pub fn generation_failure(&self) -> Option<&str> {
        self.generation_failure.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

/// `round(100 * obtained / total)`.
pub fn percentage(obtained: u32, total: u32) -> Result<u8, LifecycleError> {
    if total == 0 {
        return Err(LifecycleError::ZeroTotalMarks);
    }
    if obtained > total {
        return Err(LifecycleError::MarksExceedTotal { obtained, total });
    }
    let percent = (f64::from(obtained) * 100.0 / f64::from(total)).round();
    Ok(percent as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionType;
    use proptest::prelude::*;

    fn configuration() -> QuizConfiguration {
        QuizConfiguration::new("Lifecycle").with_counts(1, 1, 1)
    }

    fn questions() -> Vec<Question> {
        let options = ["a", "b", "c", "d"].map(String::from);
        vec![
            Question::mcq(1, "Q1", options, 1, "E").unwrap(),
            Question::free_text(2, QuestionType::Saq, "Q2", "A", "E").unwrap(),
            Question::free_text(3, QuestionType::Laq, "Q3", "A", "E").unwrap(),
        ]
    }

    fn ready_quiz() -> Quiz {
        let mut quiz = Quiz::start_generation(configuration()).unwrap();
        quiz.on_generated(questions()).unwrap();
        quiz
    }

    #[test]
    fn test_start_generation_validates_configuration() {
        let empty = QuizConfiguration::new("Empty");
        assert!(matches!(Quiz::start_generation(empty), Err(ConfigurationError::NoQuestions)));

        let quiz = Quiz::start_generation(configuration()).unwrap();
        assert_eq!(quiz.status(), QuizStatus::Generating);
        assert_eq!(quiz.total_marks(), 0);
    }

    #[test]
    fn test_on_generated_fixes_total_marks() {
        let quiz = ready_quiz();
        assert_eq!(quiz.status(), QuizStatus::Ready);
        assert_eq!(quiz.total_marks(), 9);
        assert_eq!(quiz.question(2).map(Question::marks), Some(3));
        assert!(quiz.question(4).is_none());
    }

    #[test]
    fn test_empty_generation_stays_generating() {
        let mut quiz = Quiz::start_generation(configuration()).unwrap();
        assert_eq!(quiz.on_generated(Vec::new()), Err(LifecycleError::NoQuestions));
        assert_eq!(quiz.status(), QuizStatus::Generating);
        assert!(quiz.generation_failure().is_some());

        // A later successful attempt clears the failure.
        quiz.on_generated(questions()).unwrap();
        assert_eq!(quiz.generation_failure(), None);
    }

    #[test]
    fn test_generated_twice_is_rejected() {
        let mut quiz = ready_quiz();
        assert_eq!(
            quiz.on_generated(questions()),
            Err(LifecycleError::InvalidTransition {
                from: QuizStatus::Ready,
                to: QuizStatus::Ready
            })
        );
        assert_eq!(quiz.total_marks(), 9);
    }

    #[test]
    fn test_first_interaction_is_idempotent() {
        let mut quiz = ready_quiz();
        assert_eq!(quiz.on_first_interaction(), Ok(true));
        assert_eq!(quiz.on_first_interaction(), Ok(false));
        assert_eq!(quiz.status(), QuizStatus::InProgress);
    }

    #[test]
    fn test_first_interaction_before_ready_is_rejected() {
        let mut quiz = Quiz::start_generation(configuration()).unwrap();
        assert!(quiz.on_first_interaction().is_err());
    }

    #[test]
    fn test_complete_only_from_in_progress() {
        let mut generating = Quiz::start_generation(configuration()).unwrap();
        assert!(generating.complete(0).is_err());

        let mut ready = ready_quiz();
        assert_eq!(
            ready.complete(0),
            Err(LifecycleError::InvalidTransition {
                from: QuizStatus::Ready,
                to: QuizStatus::Completed
            })
        );
    }

    #[test]
    fn test_complete_computes_percentage() {
        let mut quiz = ready_quiz();
        quiz.on_first_interaction().unwrap();

        assert_eq!(quiz.complete(4), Ok(44));
        assert_eq!(quiz.status(), QuizStatus::Completed);
        assert_eq!(quiz.marks_obtained(), Some(4));
        assert_eq!(quiz.percentage(), Some(44));
        assert!(quiz.completed_at().is_some());

        // Frozen.
        assert!(quiz.complete(9).is_err());
        assert_eq!(quiz.percentage(), Some(44));
    }

    #[test]
    fn test_marks_above_total_rejected() {
        let mut quiz = ready_quiz();
        quiz.on_first_interaction().unwrap();
        assert_eq!(
            quiz.complete(10),
            Err(LifecycleError::MarksExceedTotal { obtained: 10, total: 9 })
        );
        assert_eq!(quiz.status(), QuizStatus::InProgress);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), Ok(33));
        assert_eq!(percentage(2, 3), Ok(67));
        assert_eq!(percentage(1, 8), Ok(13));
        assert_eq!(percentage(0, 0), Err(LifecycleError::ZeroTotalMarks));
    }

    #[test]
    fn test_status_serializes_screaming() {
        assert_eq!(serde_json::to_value(QuizStatus::InProgress).unwrap(), "IN_PROGRESS");
        assert_eq!(QuizStatus::Generating.to_string(), "GENERATING");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Generated(bool),
        Interact,
        Complete(u32),
        Fail,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<bool>().prop_map(Op::Generated),
            Just(Op::Interact),
            (0u32..12).prop_map(Op::Complete),
            Just(Op::Fail),
        ]
    }

    proptest! {
        #[test]
        fn prop_status_never_moves_backwards(ops in proptest::collection::vec(op(), 0..12)) {
            let mut quiz = Quiz::start_generation(configuration()).unwrap();
            let mut previous = quiz.status();
            let mut total_after_ready = None;

            for op in ops {
                let _ = match op {
                    Op::Generated(full) => quiz.on_generated(if full { questions() } else { Vec::new() }).map(|_| ()),
                    Op::Interact => quiz.on_first_interaction().map(|_| ()),
                    Op::Complete(marks) => quiz.complete(marks).map(|_| ()),
                    Op::Fail => quiz.mark_generation_failed("upstream"),
                };

                prop_assert!(quiz.status() >= previous);
                if previous == QuizStatus::Generating {
                    prop_assert!(quiz.status() <= QuizStatus::Ready);
                }
                if quiz.status() >= QuizStatus::Ready {
                    let total = *total_after_ready.get_or_insert(quiz.total_marks());
                    prop_assert_eq!(quiz.total_marks(), total);
                }
                previous = quiz.status();
            }
        }
    }
}
