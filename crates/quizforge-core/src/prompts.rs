//! Prompt rendering for question generation and answer judgment.
//!
//! Both prompts pin the reply to a line grammar that the parsers in this
//! crate read back:
//! - generation replies are read by [`crate::parser::QuestionSetParser`]
//! - judgment replies are read by [`crate::scoring::Judgment`]
//!
//! Rendering is pure. Thresholds and counts are parameters, never baked into
//! the templates.

use std::borrow::Cow;

use crate::configuration::QuizConfiguration;
use crate::types::{Difficulty, QuestionType};

/// Default cap on source content interpolated into a generation prompt.
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 3000;

/// Appended to content that was cut at the cap.
pub const TRUNCATION_MARKER: &str = "...";

/// Opening of every generation prompt.
pub const GENERATION_PREAMBLE: &str = r#"You are an assessment author writing a quiz from study material.
Every question must be answerable from the source material alone.
Do not invent facts that the material does not state."#;

/// Output rules shared by all generation prompts.
pub const GENERATION_FORMAT_RULES: &str = r#"## Output Format
Write each question as a block in exactly the format shown for its type.
Separate blocks with one blank line.
Start every block with its type marker at the beginning of the line.
Do not number the blocks, do not use markdown, and do not add any other text."#;

/// Block grammar for multiple-choice questions.
pub const MCQ_GRAMMAR: &str = r#"MCQ: <question text>
Options: 1) <option 1> 2) <option 2> 3) <option 3> 4) <option 4>
Answer: <number of the correct option>
Explanation: <why that option is correct>"#;

/// Block grammar for short-answer questions.
pub const SAQ_GRAMMAR: &str = r#"SAQ: <question text>
Answer: <model answer in one or two sentences>
Explanation: <what a correct answer must contain>"#;

/// Block grammar for long-answer questions.
pub const LAQ_GRAMMAR: &str = r#"LAQ: <question text>
Answer: <model answer in one or two paragraphs>
Explanation: <what a correct answer must contain>"#;

/// Opening of every similarity-judgment prompt.
pub const SIMILARITY_PREAMBLE: &str = r#"You are grading a learner's answer against a reference answer.
Judge whether the learner answer expresses the same meaning as the reference answer.
Wording, spelling and order do not matter; missing or contradicting facts do."#;

/// Reply grammar for similarity judgments.
pub const SIMILARITY_GRAMMAR: &str = r#"Similarity Score: <integer from 0 to 100>
Explanation: <one sentence>
Is Correct: YES|NO"#;

/// Renders generation and similarity prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    max_content_chars: usize,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::with_max_content_chars(DEFAULT_MAX_CONTENT_CHARS)
    }

    /// Use a different content cap.
    pub fn with_max_content_chars(max_content_chars: usize) -> Self {
        Self { max_content_chars }
    }

    pub fn max_content_chars(&self) -> usize {
        self.max_content_chars
    }

    /// Render the generation prompt for `content` under `configuration`.
    ///
    /// Content beyond the cap is cut and marked with [`TRUNCATION_MARKER`].
    /// Requested counts appear verbatim so a reply can be checked against them.
    pub fn generation_prompt(&self, content: &str, configuration: &QuizConfiguration) -> String {
        let content = truncate_content(content, self.max_content_chars);
        let requested: Vec<QuestionType> = QuestionType::ALL
            .into_iter()
            .filter(|t| configuration.count(*t) > 0)
            .collect();

        let mut prompt = String::with_capacity(content.len() + 1500);
        prompt.push_str(GENERATION_PREAMBLE);
        prompt.push_str("\n\n");

        prompt.push_str(&format!("Quiz: {}\n", configuration.name.trim()));
        prompt.push_str(&format!("Difficulty: {}\n", configuration.difficulty));
        prompt.push_str(difficulty_guidance(configuration.difficulty));
        prompt.push_str("\n\n");

        prompt.push_str("## Questions Required\n");
        for question_type in &requested {
            prompt.push_str(&format!(
                "- Exactly {} {} question(s) ({})\n",
                configuration.count(*question_type),
                question_type.label(),
                type_description(*question_type),
            ));
        }
        prompt.push_str(&format!(
            "Write {} questions in total: first all MCQ, then all SAQ, then all LAQ. Never write more than requested.\n\n",
            configuration.total()
        ));

        prompt.push_str(GENERATION_FORMAT_RULES);
        prompt.push_str("\n\n");
        for question_type in &requested {
            prompt.push_str(grammar_for(*question_type));
            prompt.push_str("\n\n");
        }

        prompt.push_str("## Source Material\n");
        prompt.push_str(&content);
        prompt.push('\n');
        prompt
    }

    /// Render a similarity-judgment prompt.
    ///
    /// `threshold_percent` is the score at or above which the answer counts
    /// as correct.
    pub fn similarity_prompt(
        &self,
        user_answer: &str,
        reference_answer: &str,
        question: &str,
        threshold_percent: u8,
    ) -> String {
        format!(
            "{preamble}\n\n\
             Question: {question}\n\
             Reference answer: {reference}\n\
             Learner answer: {answer}\n\n\
             Rate the similarity in meaning from 0 (unrelated) to 100 (equivalent).\n\
             The learner answer is correct when the score is {threshold} or higher.\n\n\
             Respond in exactly this format and nothing else:\n\
             {grammar}\n",
            preamble = SIMILARITY_PREAMBLE,
            question = question.trim(),
            reference = reference_answer.trim(),
            answer = user_answer.trim(),
            threshold = threshold_percent,
            grammar = SIMILARITY_GRAMMAR,
        )
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a generation prompt with the default content cap.
pub fn build_generation_prompt(content: &str, configuration: &QuizConfiguration) -> String {
    PromptBuilder::new().generation_prompt(content, configuration)
}

/// Render a similarity-judgment prompt.
pub fn build_similarity_prompt(
    user_answer: &str,
    reference_answer: &str,
    question: &str,
    threshold_percent: u8,
) -> String {
    PromptBuilder::new().similarity_prompt(user_answer, reference_answer, question, threshold_percent)
}

/// Cut `content` to at most `max_chars` characters, appending
/// [`TRUNCATION_MARKER`] when anything was removed.
///
/// Counts characters, not bytes, so multi-byte text is never split.
pub fn truncate_content(content: &str, max_chars: usize) -> Cow<'_, str> {
    match content.char_indices().nth(max_chars) {
        None => Cow::Borrowed(content),
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + TRUNCATION_MARKER.len());
            truncated.push_str(&content[..cut]);
            truncated.push_str(TRUNCATION_MARKER);
            Cow::Owned(truncated)
        }
    }
}

fn grammar_for(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Mcq => MCQ_GRAMMAR,
        QuestionType::Saq => SAQ_GRAMMAR,
        QuestionType::Laq => LAQ_GRAMMAR,
    }
}

fn type_description(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Mcq => "multiple choice, four options, one correct",
        QuestionType::Saq => "short answer",
        QuestionType::Laq => "long answer",
    }
}

fn difficulty_guidance(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "Ask about definitions and facts stated directly in the material.",
        Difficulty::Medium => "Ask questions that require understanding and connecting ideas from the material.",
        Difficulty::Hard => "Ask questions that require analysis, comparison or applying the material to new cases.",
    }
}
