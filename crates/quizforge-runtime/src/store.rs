//! Persistence collaborators.
//!
//! The engine keeps no state between calls; quizzes, answers and source text
//! live behind [`QuizStore`] and [`ContentStore`]. The in-memory
//! implementations back the CLI and the tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use quizforge_core::{Answer, LifecycleError, Quiz, QuizId, QuizStatus};

/// Errors from a store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Quiz {0} not found")]
    QuizNotFound(QuizId),

    #[error("Question {ordinal} of quiz {quiz_id} already has an answer")]
    DuplicateAnswer { quiz_id: QuizId, ordinal: u32 },

    #[error("Quiz {quiz_id} is {status} and does not accept answers")]
    QuizClosed { quiz_id: QuizId, status: QuizStatus },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Store backend failed: {0}")]
    Backend(String),
}

/// Durable storage for quizzes and answers.
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Insert or replace a quiz.
    async fn save_quiz(&self, quiz: &Quiz) -> Result<(), StoreError>;

    async fn load_quiz(&self, id: QuizId) -> Result<Quiz, StoreError>;

    /// Remember which documents a quiz was generated from.
    async fn save_sources(&self, id: QuizId, document_ids: &[String]) -> Result<(), StoreError>;

    async fn sources(&self, id: QuizId) -> Result<Vec<String>, StoreError>;

    /// READY -> IN_PROGRESS on the stored quiz. Idempotent.
    async fn start_quiz(&self, id: QuizId) -> Result<Quiz, StoreError>;

    /// Complete the stored quiz with the sum of its answers' marks.
    ///
    /// Must be atomic with respect to [`QuizStore::insert_answer`], so the
    /// frozen marks always equal the persisted answers.
    async fn complete_quiz(&self, id: QuizId) -> Result<Quiz, StoreError>;

    /// Insert an answer. At most one answer per (quiz, question), and only
    /// while the quiz accepts answers.
    async fn insert_answer(&self, answer: &Answer) -> Result<(), StoreError>;

    /// Answers of a quiz, ordered by question ordinal.
    async fn answers(&self, id: QuizId) -> Result<Vec<Answer>, StoreError>;

    /// Sum of `marks_obtained` over the quiz's answers.
    async fn sum_marks(&self, id: QuizId) -> Result<u32, StoreError>;
}

/// Extraction state of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A source document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub status: DocumentStatus,
    #[serde(default)]
    pub text: String,
}

impl Document {
    pub fn completed(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: DocumentStatus::Completed,
            text: text.into(),
        }
    }
}

/// Read access to previously extracted document text.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Documents with the given ids, in request order. Unknown ids are skipped.
    async fn documents(&self, ids: &[String]) -> Result<Vec<Document>, StoreError>;
}

/// Text of the completed documents, joined by blank lines.
pub fn completed_text(documents: &[Document]) -> String {
    documents
        .iter()
        .filter(|d| d.status == DocumentStatus::Completed)
        .map(|d| d.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Default)]
struct QuizRecords {
    quizzes: HashMap<QuizId, Quiz>,
    sources: HashMap<QuizId, Vec<String>>,
    answers: HashMap<QuizId, BTreeMap<u32, Answer>>,
}

/// [`QuizStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryQuizStore {
    records: RwLock<QuizRecords>,
}

impl InMemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizStore for InMemoryQuizStore {
    async fn save_quiz(&self, quiz: &Quiz) -> Result<(), StoreError> {
        self.records.write().quizzes.insert(quiz.id(), quiz.clone());
        Ok(())
    }

    async fn load_quiz(&self, id: QuizId) -> Result<Quiz, StoreError> {
        self.records
            .read()
            .quizzes
            .get(&id)
            .cloned()
            .ok_or(StoreError::QuizNotFound(id))
    }

    async fn save_sources(&self, id: QuizId, document_ids: &[String]) -> Result<(), StoreError> {
        self.records.write().sources.insert(id, document_ids.to_vec());
        Ok(())
    }

    async fn sources(&self, id: QuizId) -> Result<Vec<String>, StoreError> {
        let records = self.records.read();
        if !records.quizzes.contains_key(&id) {
            return Err(StoreError::QuizNotFound(id));
        }
        Ok(records.sources.get(&id).cloned().unwrap_or_default())
    }

    async fn start_quiz(&self, id: QuizId) -> Result<Quiz, StoreError> {
        let mut records = self.records.write();
        let quiz = records.quizzes.get_mut(&id).ok_or(StoreError::QuizNotFound(id))?;
        quiz.on_first_interaction()?;
        Ok(quiz.clone())
    }

    async fn complete_quiz(&self, id: QuizId) -> Result<Quiz, StoreError> {
        let mut records = self.records.write();
        let marks: u32 = records
            .answers
            .get(&id)
            .map(|answers| answers.values().map(Answer::marks_obtained).sum())
            .unwrap_or(0);
        let quiz = records.quizzes.get_mut(&id).ok_or(StoreError::QuizNotFound(id))?;
        quiz.complete(marks)?;
        Ok(quiz.clone())
    }

    async fn insert_answer(&self, answer: &Answer) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let quiz_id = answer.quiz_id();
        let status = records
            .quizzes
            .get(&quiz_id)
            .map(Quiz::status)
            .ok_or(StoreError::QuizNotFound(quiz_id))?;
        if !status.accepts_answers() {
            return Err(StoreError::QuizClosed { quiz_id, status });
        }

        let answers = records.answers.entry(quiz_id).or_default();
        let ordinal = answer.question_ordinal();
        if answers.contains_key(&ordinal) {
            return Err(StoreError::DuplicateAnswer { quiz_id, ordinal });
        }
        answers.insert(ordinal, answer.clone());
        Ok(())
    }

    async fn answers(&self, id: QuizId) -> Result<Vec<Answer>, StoreError> {
        Ok(self
            .records
            .read()
            .answers
            .get(&id)
            .map(|answers| answers.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn sum_marks(&self, id: QuizId) -> Result<u32, StoreError> {
        Ok(self
            .records
            .read()
            .answers
            .get(&id)
            .map(|answers| answers.values().map(Answer::marks_obtained).sum())
            .unwrap_or(0))
    }
}

/// [`ContentStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document.
    pub fn insert(&self, document: Document) {
        self.documents.write().insert(document.id.clone(), document);
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn documents(&self, ids: &[String]) -> Result<Vec<Document>, StoreError> {
        let documents = self.documents.read();
        Ok(ids.iter().filter_map(|id| documents.get(id).cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizforge_core::{Question, QuestionType, QuizConfiguration, Verdict, VerdictSource};

    fn ready_quiz() -> Quiz {
        let mut quiz = Quiz::start_generation(QuizConfiguration::new("Store").with_counts(0, 2, 0)).unwrap();
        quiz.on_generated(vec![
            Question::free_text(1, QuestionType::Saq, "Q1", "A1", "E").unwrap(),
            Question::free_text(2, QuestionType::Saq, "Q2", "A2", "E").unwrap(),
        ])
        .unwrap();
        quiz
    }

    fn answer(quiz: &Quiz, ordinal: u32, correct: bool) -> Answer {
        let question = quiz.question(ordinal).unwrap();
        let verdict = Verdict::for_question(question, correct, Some(50), VerdictSource::Judged);
        Answer::record(quiz.id(), question, "text", &verdict)
    }

    #[tokio::test]
    async fn test_quiz_round_trip() {
        let store = InMemoryQuizStore::new();
        let quiz = ready_quiz();
        store.save_quiz(&quiz).await.unwrap();
        assert_eq!(store.load_quiz(quiz.id()).await.unwrap(), quiz);

        let missing = QuizId::new();
        assert_eq!(store.load_quiz(missing).await, Err(StoreError::QuizNotFound(missing)));
    }

    #[tokio::test]
    async fn test_answer_uniqueness_and_sum() {
        let store = InMemoryQuizStore::new();
        let quiz = ready_quiz();
        store.save_quiz(&quiz).await.unwrap();

        store.insert_answer(&answer(&quiz, 2, true)).await.unwrap();
        store.insert_answer(&answer(&quiz, 1, false)).await.unwrap();
        assert_eq!(
            store.insert_answer(&answer(&quiz, 2, false)).await,
            Err(StoreError::DuplicateAnswer { quiz_id: quiz.id(), ordinal: 2 })
        );

        assert_eq!(store.sum_marks(quiz.id()).await, Ok(3));
        let ordinals: Vec<_> = store.answers(quiz.id()).await.unwrap().iter().map(Answer::question_ordinal).collect();
        assert_eq!(ordinals, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_complete_freezes_persisted_marks() {
        let store = InMemoryQuizStore::new();
        let quiz = ready_quiz();
        store.save_quiz(&quiz).await.unwrap();

        assert_eq!(store.start_quiz(quiz.id()).await.unwrap().status(), QuizStatus::InProgress);
        assert_eq!(store.start_quiz(quiz.id()).await.unwrap().status(), QuizStatus::InProgress);
        store.insert_answer(&answer(&quiz, 1, true)).await.unwrap();

        let completed = store.complete_quiz(quiz.id()).await.unwrap();
        assert_eq!(completed.status(), QuizStatus::Completed);
        assert_eq!(completed.marks_obtained(), Some(3));
        assert_eq!(store.load_quiz(quiz.id()).await.unwrap(), completed);

        assert_eq!(
            store.insert_answer(&answer(&quiz, 2, true)).await,
            Err(StoreError::QuizClosed { quiz_id: quiz.id(), status: QuizStatus::Completed })
        );
        assert_eq!(store.sum_marks(quiz.id()).await, Ok(3));
    }

    #[tokio::test]
    async fn test_complete_requires_in_progress() {
        let store = InMemoryQuizStore::new();
        let quiz = ready_quiz();
        store.save_quiz(&quiz).await.unwrap();

        assert!(matches!(
            store.complete_quiz(quiz.id()).await,
            Err(StoreError::Lifecycle(LifecycleError::InvalidTransition { .. }))
        ));
        assert_eq!(store.load_quiz(quiz.id()).await.unwrap().status(), QuizStatus::Ready);
    }

    #[tokio::test]
    async fn test_answer_for_unknown_quiz_rejected() {
        let store = InMemoryQuizStore::new();
        let quiz = ready_quiz();
        assert!(matches!(
            store.insert_answer(&answer(&quiz, 1, true)).await,
            Err(StoreError::QuizNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_content_store_keeps_request_order() {
        let store = InMemoryContentStore::new();
        store.insert(Document::completed("b", "second"));
        store.insert(Document::completed("a", "first"));
        store.insert(Document {
            id: "c".to_string(),
            status: DocumentStatus::Processing,
            text: "partial".to_string(),
        });

        let ids = ["a", "c", "b", "zz"].map(String::from);
        let documents = store.documents(&ids).await.unwrap();
        assert_eq!(documents.len(), 3);
        assert_eq!(completed_text(&documents), "first\n\nsecond");
    }
}
