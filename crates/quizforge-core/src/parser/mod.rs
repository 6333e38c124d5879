//! Parsing of generation replies into validated questions.
//!
//! The reply is scanned line by line ([`scan`]) into drafts, then each draft
//! passes a validity gate. Drafts that fail the gate are dropped, never
//! repaired. The result is never larger than the requested counts, and a
//! shorter result is reported as a [`Shortfall`] rather than an error.

mod options;
mod scan;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::configuration::QuizConfiguration;
use crate::types::{Question, QuestionError, QuestionType, OPTION_COUNT};
use scan::{Draft, Scanner};

/// A count per question type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub mcq: u32,
    pub saq: u32,
    pub laq: u32,
}

impl TypeCounts {
    /// The counts requested by a configuration.
    pub fn requested(configuration: &QuizConfiguration) -> Self {
        Self {
            mcq: configuration.mcq_count,
            saq: configuration.saq_count,
            laq: configuration.laq_count,
        }
    }

    /// Tally the types of `questions`.
    pub fn of(questions: &[Question]) -> Self {
        let mut counts = Self::default();
        for question in questions {
            counts.increment(question.question_type());
        }
        counts
    }

    pub fn get(&self, question_type: QuestionType) -> u32 {
        match question_type {
            QuestionType::Mcq => self.mcq,
            QuestionType::Saq => self.saq,
            QuestionType::Laq => self.laq,
        }
    }

    pub fn increment(&mut self, question_type: QuestionType) {
        let slot = match question_type {
            QuestionType::Mcq => &mut self.mcq,
            QuestionType::Saq => &mut self.saq,
            QuestionType::Laq => &mut self.laq,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u64 {
        u64::from(self.mcq) + u64::from(self.saq) + u64::from(self.laq)
    }
}

impl fmt::Display for TypeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} MCQ, {} SAQ, {} LAQ", self.mcq, self.saq, self.laq)
    }
}

/// Fewer valid questions than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub requested: TypeCounts,
    pub parsed: TypeCounts,
}

impl Shortfall {
    /// Number of requested questions that are missing.
    pub fn missing(&self) -> u64 {
        self.requested.total().saturating_sub(self.parsed.total())
    }
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "requested {}, parsed {}", self.requested, self.parsed)
    }
}

/// Result of parsing one generation reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOutcome {
    /// Valid questions, numbered 1.. in reply order.
    pub questions: Vec<Question>,
    pub requested: TypeCounts,
    pub parsed: TypeCounts,
    /// Blocks that were opened but failed validation.
    pub discarded: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<Shortfall>,
}

impl ParseOutcome {
    pub fn is_complete(&self) -> bool {
        self.shortfall.is_none()
    }
}

/// Parses generation replies for one configuration.
#[derive(Debug, Clone)]
pub struct QuestionSetParser {
    requested: TypeCounts,
}

impl QuestionSetParser {
    pub fn new(configuration: &QuizConfiguration) -> Self {
        Self {
            requested: TypeCounts::requested(configuration),
        }
    }

    /// Parse `reply`, keeping at most the requested number of each type.
    pub fn parse(&self, reply: &str) -> ParseOutcome {
        let mut scanner = Scanner::new(self.requested);
        for line in reply.lines() {
            scanner.feed(line);
        }
        let drafts = scanner.finish();
        let opened = drafts.len();

        let mut questions = Vec::with_capacity(opened);
        for draft in drafts {
            let ordinal = questions.len() as u32 + 1;
            let question_type = draft.question_type;
            match validate_draft(draft, ordinal) {
                Ok(question) => questions.push(question),
                Err(e) => debug!(question_type = %question_type, error = %e, "Discarding invalid question block"),
            }
        }

        let parsed = TypeCounts::of(&questions);
        let shortfall = (parsed != self.requested).then_some(Shortfall {
            requested: self.requested,
            parsed,
        });

        if let Some(shortfall) = &shortfall {
            warn!(
                requested = %shortfall.requested,
                parsed = %shortfall.parsed,
                missing = shortfall.missing(),
                "Generation reply yielded fewer questions than requested"
            );
        }

        ParseOutcome {
            discarded: opened - questions.len(),
            questions,
            requested: self.requested,
            parsed,
            shortfall,
        }
    }
}

/// Parse `reply` against `configuration`.
pub fn parse_questions(reply: &str, configuration: &QuizConfiguration) -> ParseOutcome {
    QuestionSetParser::new(configuration).parse(reply)
}

/// The validity gate: a draft becomes a question only if every field is present
/// and, for multiple choice, four options and a resolvable answer exist.
fn validate_draft(draft: Draft, ordinal: u32) -> Result<Question, QuestionError> {
    let answer = draft.answer.ok_or(QuestionError::MissingField("answer"))?;
    let explanation = draft.explanation.ok_or(QuestionError::MissingField("explanation"))?;

    match draft.question_type {
        QuestionType::Mcq => {
            let options: [String; OPTION_COUNT] = draft
                .options
                .try_into()
                .map_err(|o: Vec<String>| QuestionError::OptionCount(o.len()))?;
            let correct = options::resolve_answer(&answer, &options)
                .ok_or_else(|| QuestionError::UnresolvedAnswer(answer.clone()))?;
            Question::mcq(ordinal, draft.text, options, correct, explanation)
        }
        question_type => Question::free_text(ordinal, question_type, draft.text, answer, explanation),
    }
}
