//! # quizforge-core
//!
//! Deterministic quiz generation and grading logic.
//!
//! This crate turns a completion-service reply into gradable questions and
//! grades answers against them, without touching the network:
//! - What prompt asks for this quiz?
//! - Which questions did the reply actually contain?
//! - Is this answer correct, and how many marks does it earn?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No network calls**: The runtime crate owns the completion service
//! 3. **Bounded**: A parsed reply never yields more questions than requested
//! 4. **All-or-nothing marks**: An answer earns either zero or the question's full marks
//!
//! ## Example
//!
//! ```rust,ignore
//! use quizforge_core::{parse_questions, grade_option, QuizConfiguration};
//!
//! let config = QuizConfiguration::from_yaml_file("quiz.yaml")?;
//! let outcome = parse_questions(&reply, &config);
//! if let Some(shortfall) = &outcome.shortfall {
//!     eprintln!("short reply: {}", shortfall);
//! }
//! let verdict = grade_option(&outcome.questions[0], "2");
//! ```

pub mod configuration;
pub mod lifecycle;
pub mod parser;
pub mod prompts;
pub mod scoring;
pub mod types;

// Re-export main types at crate root
pub use configuration::{ConfigurationError, QuizConfiguration, MAX_QUESTIONS};
pub use lifecycle::{LifecycleError, Quiz, QuizStatus};
pub use parser::{parse_questions, ParseOutcome, QuestionSetParser, Shortfall, TypeCounts};
pub use prompts::{build_generation_prompt, build_similarity_prompt, PromptBuilder};
pub use scoring::{
    default_threshold, fallback_verdict, grade_option, lexical_overlap_score, Judgment,
    LAQ_THRESHOLD, SAQ_THRESHOLD,
};
pub use types::{
    Answer, Difficulty, Question, QuestionError, QuestionRecord, QuestionType, QuizId, Verdict,
    VerdictSource,
};
