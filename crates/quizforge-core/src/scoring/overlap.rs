//! Token-overlap similarity used when no judgment is available.

use std::collections::HashSet;

use super::meets_threshold;
use crate::types::{Question, Verdict, VerdictSource};

/// Tokens of this many characters or fewer are ignored.
const MIN_TOKEN_CHARS: usize = 2;

fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() > MIN_TOKEN_CHARS)
        .collect()
}

/// Share of learner tokens found in the reference, as a 0-100 percentage of
/// the longer token list.
///
/// Total over all inputs: an empty token list on either side yields 0.
pub fn lexical_overlap_score(user_answer: &str, reference_answer: &str) -> u8 {
    let user = tokens(user_answer);
    let reference = tokens(reference_answer);

    let denominator = user.len().max(reference.len());
    if user.is_empty() || reference.is_empty() {
        return 0;
    }

    let reference: HashSet<&str> = reference.iter().map(String::as_str).collect();
    let matched = user.iter().filter(|t| reference.contains(t.as_str())).count();

    let percent = (matched as f64 * 100.0 / denominator as f64).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Grade a free-text answer from token overlap alone.
pub fn fallback_verdict(question: &Question, user_answer: &str, threshold: u8) -> Verdict {
    let score = lexical_overlap_score(user_answer, question.reference_answer());
    Verdict::for_question(
        question,
        meets_threshold(score, threshold),
        Some(score),
        VerdictSource::LexicalFallback,
    )
}
