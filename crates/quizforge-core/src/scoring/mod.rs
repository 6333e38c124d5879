//! Deterministic grading: option matching, judgment parsing and the
//! lexical-overlap fallback.
//!
//! Nothing here talks to the completion service; the runtime's evaluator
//! decides when a judgment is requested and when the fallback applies.

mod judgment;
mod overlap;

pub use judgment::Judgment;
pub use overlap::{fallback_verdict, lexical_overlap_score};

use crate::types::{Question, QuestionType, Verdict, VerdictSource};

/// Similarity needed for a short answer to count as correct.
pub const SAQ_THRESHOLD: u8 = 90;

/// Similarity needed for a long answer to count as correct.
pub const LAQ_THRESHOLD: u8 = 75;

/// Default similarity threshold for a free-text type; `None` for MCQ.
pub fn default_threshold(question_type: QuestionType) -> Option<u8> {
    match question_type {
        QuestionType::Mcq => None,
        QuestionType::Saq => Some(SAQ_THRESHOLD),
        QuestionType::Laq => Some(LAQ_THRESHOLD),
    }
}

/// Whether `score` meets `threshold`. Equality counts as correct.
pub fn meets_threshold(score: u8, threshold: u8) -> bool {
    score >= threshold
}

/// Read a selected option number from learner input.
///
/// Accepts `"2"`, `" 2 "`, `"2)"`, `"2."` and `"(2)"`.
pub fn parse_option_number(input: &str) -> Option<u8> {
    input
        .trim()
        .trim_start_matches('(')
        .trim_end_matches([')', '.'])
        .trim()
        .parse()
        .ok()
}

/// Grade a multiple-choice answer. Unparseable input is simply incorrect.
pub fn grade_option(question: &Question, user_answer: &str) -> Verdict {
    let selected = parse_option_number(user_answer);
    let is_correct = selected.is_some() && selected == question.correct_option();
    let score = if is_correct { 100 } else { 0 };
    Verdict::for_question(question, is_correct, Some(score), VerdictSource::OptionMatch)
}
