//! Reading similarity judgments returned by the completion service.

use lazy_static::lazy_static;
use regex::Regex;

use super::meets_threshold;
use crate::types::{Question, Verdict, VerdictSource};

lazy_static! {
    static ref SCORE: Regex =
        Regex::new(r"(?i)similarity\s*score\W{0,4}?\s*[:=]\s*\**\s*(\d{1,3})\b").unwrap();
    static ref VERDICT: Regex =
        Regex::new(r"(?i)is\s*correct\W{0,4}?\s*[:=]\s*\**\s*(yes|no)\b").unwrap();
    static ref EXPLANATION: Regex =
        Regex::new(r"(?im)^\W{0,4}explanation\W{0,4}?\s*:\s*\**\s*(.+?)\s*$").unwrap();
}

/// A parsed similarity judgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    /// 0-100.
    pub score: u8,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

impl Judgment {
    /// Parse a judgment reply against `threshold`.
    ///
    /// Returns `None` when neither a score nor a verdict can be found. A score
    /// without a verdict is compared with `threshold`; a verdict without a
    /// score counts as 100 or 0; when both are present the verdict wins.
    pub fn parse(reply: &str, threshold: u8) -> Option<Self> {
        let score = SCORE
            .captures(reply)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u8>().ok())
            .filter(|score| *score <= 100);

        let verdict = VERDICT
            .captures(reply)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().eq_ignore_ascii_case("yes"));

        let explanation = EXPLANATION
            .captures(reply)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim_end_matches('*').trim().to_string())
            .filter(|e| !e.is_empty());

        let (score, is_correct) = match (score, verdict) {
            (None, None) => return None,
            (Some(score), Some(verdict)) => (score, verdict),
            (Some(score), None) => (score, meets_threshold(score, threshold)),
            (None, Some(verdict)) => (if verdict { 100 } else { 0 }, verdict),
        };

        Some(Self {
            score,
            is_correct,
            explanation,
        })
    }

    /// Verdict for `question`.
    pub fn into_verdict(self, question: &Question) -> Verdict {
        Verdict::for_question(question, self.is_correct, Some(self.score), VerdictSource::Judged)
            .with_explanation(self.explanation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionType;

    #[test]
    fn test_parse_well_formed_reply() {
        let reply = "Similarity Score: 92\nExplanation: Same meaning.\nIs Correct: YES";
        let judgment = Judgment::parse(reply, 90).unwrap();
        assert_eq!(judgment.score, 92);
        assert!(judgment.is_correct);
        assert_eq!(judgment.explanation.as_deref(), Some("Same meaning."));
    }

    #[test]
    fn test_tolerates_markdown_and_case() {
        let reply = "**Similarity Score:** 40\n**Explanation:** Misses the key idea.\n**is correct:** no, it is not";
        let judgment = Judgment::parse(reply, 75).unwrap();
        assert_eq!(judgment.score, 40);
        assert!(!judgment.is_correct);
        assert_eq!(judgment.explanation.as_deref(), Some("Misses the key idea."));
    }

    #[test]
    fn test_score_only_uses_threshold() {
        assert!(Judgment::parse("Similarity Score: 90", 90).unwrap().is_correct);
        assert!(!Judgment::parse("Similarity Score: 89", 90).unwrap().is_correct);
        assert!(Judgment::parse("similarity score = 75 out of 100", 75).unwrap().is_correct);
    }

    #[test]
    fn test_explicit_verdict_wins() {
        let judgment = Judgment::parse("Similarity Score: 95\nIs Correct: NO", 90).unwrap();
        assert_eq!(judgment.score, 95);
        assert!(!judgment.is_correct);
    }

    #[test]
    fn test_verdict_only() {
        let yes = Judgment::parse("Is Correct: YES", 90).unwrap();
        assert_eq!((yes.score, yes.is_correct), (100, true));

        let no = Judgment::parse("Is correct: no", 90).unwrap();
        assert_eq!((no.score, no.is_correct), (0, false));
    }

    #[test]
    fn test_malformed_replies() {
        assert_eq!(Judgment::parse("", 90), None);
        assert_eq!(Judgment::parse("I think it's mostly right.", 90), None);
        assert_eq!(Judgment::parse("Similarity Score: 250", 90), None);
        assert_eq!(Judgment::parse("Is Correct: maybe", 90), None);
    }

    #[test]
    fn test_into_verdict() {
        let q = Question::free_text(1, QuestionType::Laq, "Explain", "Because", "Why").unwrap();
        let verdict = Judgment::parse("Similarity Score: 80\nExplanation: close", 75)
            .unwrap()
            .into_verdict(&q);

        assert!(verdict.is_correct);
        assert_eq!(verdict.marks_obtained, 5);
        assert_eq!(verdict.similarity_score, Some(80));
        assert_eq!(verdict.source, VerdictSource::Judged);
        assert_eq!(verdict.explanation.as_deref(), Some("close"));
    }
}
