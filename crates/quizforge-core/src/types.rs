//! Core types for quiz generation and grading.
//!
//! Questions and answers carry invariants (fixed marks per type, four options
//! exactly for multiple choice, all-or-nothing marks) that are enforced by
//! their constructors. Persisted shapes go through [`QuestionRecord`], which
//! re-validates on the way back in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Number of options on every multiple-choice question.
pub const OPTION_COUNT: usize = 4;

/// Identifier of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizId(Uuid);

impl QuizId {
    /// Allocate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for QuizId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for QuizId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Requested difficulty of a generated quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three question types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuestionType {
    /// Multiple choice, one of four options is correct.
    Mcq,
    /// Short free-text answer.
    Saq,
    /// Long free-text answer.
    Laq,
}

impl QuestionType {
    /// All types, in the order they are requested in generation prompts.
    pub const ALL: [QuestionType; 3] = [QuestionType::Mcq, QuestionType::Saq, QuestionType::Laq];

    /// Marks awarded for a correct answer. Fixed by type.
    pub fn marks(self) -> u32 {
        match self {
            QuestionType::Mcq => 1,
            QuestionType::Saq => 3,
            QuestionType::Laq => 5,
        }
    }

    /// Short uppercase label, as used in the output grammar.
    pub fn label(self) -> &'static str {
        match self {
            QuestionType::Mcq => "MCQ",
            QuestionType::Saq => "SAQ",
            QuestionType::Laq => "LAQ",
        }
    }

    /// Line marker that opens a question block of this type.
    pub fn marker(self) -> &'static str {
        match self {
            QuestionType::Mcq => "MCQ:",
            QuestionType::Saq => "SAQ:",
            QuestionType::Laq => "LAQ:",
        }
    }

    /// Whether answers are graded by similarity rather than option match.
    pub fn is_free_text(self) -> bool {
        !matches!(self, QuestionType::Mcq)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors raised when a question would violate its invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuestionError {
    #[error("Question ordinal must be 1 or greater")]
    ZeroOrdinal,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Multiple-choice question needs exactly 4 options, found {0}")]
    OptionCount(usize),

    #[error("Option {0} is empty")]
    EmptyOption(u8),

    #[error("Correct option {0} is outside 1..=4")]
    OptionOutOfRange(u8),

    #[error("Could not resolve the correct option from answer '{0}'")]
    UnresolvedAnswer(String),

    #[error("{0} questions cannot carry options")]
    UnexpectedOptions(QuestionType),

    #[error("Reference answer does not match the text of option {0}")]
    ReferenceMismatch(u8),

    #[error("Marks {found} do not match {question_type} (expected {expected})")]
    MarksMismatch {
        question_type: QuestionType,
        expected: u32,
        found: u32,
    },
}

/// A single gradable question.
///
/// Built only through [`Question::mcq`] and [`Question::free_text`]; fields are
/// read through accessors so the invariants cannot be broken after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionRecord", into = "QuestionRecord")]
pub struct Question {
    ordinal: u32,
    question_type: QuestionType,
    text: String,
    options: Option<[String; OPTION_COUNT]>,
    reference_answer: String,
    correct_option: Option<u8>,
    explanation: String,
}

impl Question {
    /// Build a multiple-choice question.
    ///
    /// The reference answer is the text of `correct_option` (1-based).
    pub fn mcq(
        ordinal: u32,
        text: impl Into<String>,
        options: [String; OPTION_COUNT],
        correct_option: u8,
        explanation: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let text = required(text.into(), "text")?;
        let explanation = required(explanation.into(), "explanation")?;
        check_ordinal(ordinal)?;

        if !(1..=OPTION_COUNT as u8).contains(&correct_option) {
            return Err(QuestionError::OptionOutOfRange(correct_option));
        }

        let options = options.map(|o| o.trim().to_string());
        if let Some(empty) = options.iter().position(|o| o.is_empty()) {
            return Err(QuestionError::EmptyOption(empty as u8 + 1));
        }

        let reference_answer = options[usize::from(correct_option) - 1].clone();

        Ok(Self {
            ordinal,
            question_type: QuestionType::Mcq,
            text,
            options: Some(options),
            reference_answer,
            correct_option: Some(correct_option),
            explanation,
        })
    }

    /// Build a short- or long-answer question.
    pub fn free_text(
        ordinal: u32,
        question_type: QuestionType,
        text: impl Into<String>,
        reference_answer: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        if question_type == QuestionType::Mcq {
            return Err(QuestionError::MissingField("options"));
        }
        check_ordinal(ordinal)?;

        Ok(Self {
            ordinal,
            question_type,
            text: required(text.into(), "text")?,
            options: None,
            reference_answer: required(reference_answer.into(), "reference_answer")?,
            correct_option: None,
            explanation: required(explanation.into(), "explanation")?,
        })
    }

    /// Return the same question under a different ordinal.
    pub fn with_ordinal(mut self, ordinal: u32) -> Result<Self, QuestionError> {
        check_ordinal(ordinal)?;
        self.ordinal = ordinal;
        Ok(self)
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn question_type(&self) -> QuestionType {
        self.question_type
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The four options, present iff this is a multiple-choice question.
    pub fn options(&self) -> Option<&[String; OPTION_COUNT]> {
        self.options.as_ref()
    }

    /// Text of option `number` (1-based).
    pub fn option(&self, number: u8) -> Option<&str> {
        let index = usize::from(number).checked_sub(1)?;
        self.options.as_ref()?.get(index).map(String::as_str)
    }

    pub fn reference_answer(&self) -> &str {
        &self.reference_answer
    }

    /// Correct option number, present iff this is a multiple-choice question.
    pub fn correct_option(&self) -> Option<u8> {
        self.correct_option
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Marks for a correct answer, derived from the question type.
    pub fn marks(&self) -> u32 {
        self.question_type.marks()
    }
}

fn required(value: String, field: &'static str) -> Result<String, QuestionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(QuestionError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn check_ordinal(ordinal: u32) -> Result<(), QuestionError> {
    if ordinal == 0 {
        Err(QuestionError::ZeroOrdinal)
    } else {
        Ok(())
    }
}

/// Flat, persisted shape of a [`Question`].
///
/// Options are keyed `"1"`..`"4"`. `marks` is written for readers of the
/// stored record and checked against the type when read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub ordinal: u32,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, String>>,
    pub reference_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_option_number: Option<u8>,
    pub explanation: String,
    pub marks: u32,
}

impl From<Question> for QuestionRecord {
    fn from(question: Question) -> Self {
        let marks = question.marks();
        let options = question.options.map(|options| {
            options
                .into_iter()
                .enumerate()
                .map(|(i, text)| ((i + 1).to_string(), text))
                .collect()
        });

        Self {
            ordinal: question.ordinal,
            question_type: question.question_type,
            text: question.text,
            options,
            reference_answer: question.reference_answer,
            correct_option_number: question.correct_option,
            explanation: question.explanation,
            marks,
        }
    }
}

impl TryFrom<QuestionRecord> for Question {
    type Error = QuestionError;

    fn try_from(record: QuestionRecord) -> Result<Self, Self::Error> {
        let expected = record.question_type.marks();
        if record.marks != expected {
            return Err(QuestionError::MarksMismatch {
                question_type: record.question_type,
                expected,
                found: record.marks,
            });
        }

        match record.question_type {
            QuestionType::Mcq => {
                let mut map = record.options.ok_or(QuestionError::MissingField("options"))?;
                if map.len() != OPTION_COUNT {
                    return Err(QuestionError::OptionCount(map.len()));
                }

                let mut options: [String; OPTION_COUNT] = Default::default();
                for (i, slot) in options.iter_mut().enumerate() {
                    *slot = map
                        .remove(&(i + 1).to_string())
                        .ok_or(QuestionError::OptionCount(i))?;
                }

                let correct = record
                    .correct_option_number
                    .ok_or(QuestionError::MissingField("correct_option_number"))?;

                let question = Question::mcq(
                    record.ordinal,
                    record.text,
                    options,
                    correct,
                    record.explanation,
                )?;

                if question.reference_answer != record.reference_answer.trim() {
                    return Err(QuestionError::ReferenceMismatch(correct));
                }

                Ok(question)
            }
            question_type => {
                if record.options.is_some() || record.correct_option_number.is_some() {
                    return Err(QuestionError::UnexpectedOptions(question_type));
                }
                Question::free_text(
                    record.ordinal,
                    question_type,
                    record.text,
                    record.reference_answer,
                    record.explanation,
                )
            }
        }
    }
}

/// How a verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    /// Selected option compared against the correct option number.
    OptionMatch,
    /// Similarity judgment returned by the completion service.
    Judged,
    /// Local token-overlap heuristic, used when the service failed.
    LexicalFallback,
}

/// Outcome of grading one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_correct: bool,
    pub marks_obtained: u32,
    /// 0-100 for free-text questions, `None` for multiple choice.
    pub similarity_score: Option<u8>,
    pub source: VerdictSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Verdict {
    /// Build a verdict for `question`; marks are all or nothing.
    pub fn for_question(
        question: &Question,
        is_correct: bool,
        similarity_score: Option<u8>,
        source: VerdictSource,
    ) -> Self {
        Self {
            is_correct,
            marks_obtained: if is_correct { question.marks() } else { 0 },
            similarity_score,
            source,
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: Option<String>) -> Self {
        self.explanation = explanation;
        self
    }
}

/// A learner's persisted answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    quiz_id: QuizId,
    question_ordinal: u32,
    user_answer: String,
    is_correct: bool,
    marks_obtained: u32,
    similarity_score: Option<u8>,
    source: VerdictSource,
    answered_at: DateTime<Utc>,
}

impl Answer {
    /// Record an answer. Marks are recomputed from the question so they are
    /// always either zero or the question's full marks.
    pub fn record(
        quiz_id: QuizId,
        question: &Question,
        user_answer: impl Into<String>,
        verdict: &Verdict,
    ) -> Self {
        let similarity_score = if question.question_type().is_free_text() {
            verdict.similarity_score.map(|s| s.min(100))
        } else {
            None
        };

        Self {
            quiz_id,
            question_ordinal: question.ordinal(),
            user_answer: user_answer.into(),
            is_correct: verdict.is_correct,
            marks_obtained: if verdict.is_correct { question.marks() } else { 0 },
            similarity_score,
            source: verdict.source,
            answered_at: Utc::now(),
        }
    }

    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    pub fn question_ordinal(&self) -> u32 {
        self.question_ordinal
    }

    pub fn user_answer(&self) -> &str {
        &self.user_answer
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    pub fn marks_obtained(&self) -> u32 {
        self.marks_obtained
    }

    pub fn similarity_score(&self) -> Option<u8> {
        self.similarity_score
    }

    pub fn source(&self) -> VerdictSource {
        self.source
    }

    pub fn answered_at(&self) -> DateTime<Utc> {
        self.answered_at
    }
}
