//! End-to-end flows over the public API with an in-process provider.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use quizforge_core::{QuestionType, QuizConfiguration, QuizStatus, VerdictSource};
use quizforge_runtime::{
    AnswerEvaluator, ChatMessage, CompletionClient, CompletionConfig, CompletionResponse, Document,
    EvaluationSettings, GenerationError, GenerationRequest, GenerationSettings, InMemoryContentStore,
    InMemoryQuizStore, LlmProvider, ProviderError, QuizGenerator, QuizSession, QuizStore, TokenUsage,
};

enum Reply {
    Text(&'static str),
    Timeout,
    Status(u16),
}

/// Answers calls from a fixed queue of replies.
struct QueueProvider {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<usize>,
}

impl QueueProvider {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl LlmProvider for QueueProvider {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        *self.calls.lock() += 1;
        let reply = self.replies.lock().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(CompletionResponse {
                content: text.to_string(),
                usage: TokenUsage::default(),
                model: config.model.clone(),
                stop_reason: None,
            }),
            Some(Reply::Timeout) => {
                tokio::time::sleep(config.timeout * 10).await;
                Err(ProviderError::Transport("too late".to_string()))
            }
            Some(Reply::Status(status)) => Err(ProviderError::ApiError {
                status,
                message: "unavailable".to_string(),
            }),
            None => Err(ProviderError::Transport("no reply queued".to_string())),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "queue"
    }
}

struct Engine {
    generator: QuizGenerator,
    session: QuizSession,
    quizzes: Arc<InMemoryQuizStore>,
    provider: Arc<QueueProvider>,
}

fn engine(replies: Vec<Reply>) -> Engine {
    let provider = QueueProvider::new(replies);
    let client = CompletionClient::new(
        provider.clone(),
        CompletionConfig {
            timeout: Duration::from_secs(5),
            ..CompletionConfig::default()
        },
    );

    let quizzes = Arc::new(InMemoryQuizStore::new());
    let content = Arc::new(InMemoryContentStore::new());
    content.insert(Document::completed("biology", "Photosynthesis converts light energy into chemical energy."));
    content.insert(Document::completed("arithmetic", "Two plus two is four."));

    Engine {
        generator: QuizGenerator::new(client.clone(), quizzes.clone(), content, GenerationSettings::default()),
        session: QuizSession::new(AnswerEvaluator::new(client, EvaluationSettings::default()), quizzes.clone()),
        quizzes,
        provider,
    }
}

fn request(configuration: QuizConfiguration) -> GenerationRequest {
    GenerationRequest {
        configuration,
        document_ids: vec!["biology".to_string(), "arithmetic".to_string()],
    }
}

#[tokio::test]
async fn happy_path_mcq_from_generation_to_report() {
    let engine = engine(vec![Reply::Text(
        "MCQ: 2+2?\nOptions: 1) 3 2) 4 3) 5 4) 6\nAnswer: 2\nExplanation: basic addition",
    )]);

    let generated = engine
        .generator
        .generate(request(QuizConfiguration::new("Sums").with_counts(1, 0, 0)))
        .await
        .unwrap();
    let quiz_id = generated.quiz.id();

    let question = generated.quiz.question(1).unwrap();
    assert_eq!(question.correct_option(), Some(2));
    assert_eq!(question.reference_answer(), "4");
    assert_eq!(generated.quiz.total_marks(), 1);

    let answer = engine.session.submit_answer(quiz_id, 1, "2").await.unwrap();
    assert!(answer.is_correct());
    assert_eq!(answer.marks_obtained(), 1);

    let report = engine.session.finish(quiz_id).await.unwrap();
    assert_eq!(report.percentage, 100);
    assert_eq!(engine.quizzes.load_quiz(quiz_id).await.unwrap().status(), QuizStatus::Completed);
    assert_eq!(engine.provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn degraded_saq_is_graded_by_overlap() {
    let engine = engine(vec![
        Reply::Text(
            "SAQ: What does photosynthesis do?\n\
             Answer: photosynthesis converts light energy into chemical energy\n\
             Explanation: definition",
        ),
        Reply::Timeout,
    ]);

    let generated = engine
        .generator
        .generate(request(QuizConfiguration::new("Biology").with_counts(0, 1, 0)))
        .await
        .unwrap();
    let quiz_id = generated.quiz.id();
    assert_eq!(generated.quiz.question(1).unwrap().question_type(), QuestionType::Saq);

    let answer = engine
        .session
        .submit_answer(quiz_id, 1, "photosynthesis converts light to energy")
        .await
        .unwrap();

    assert_eq!(answer.source(), VerdictSource::LexicalFallback);
    assert_eq!(answer.similarity_score(), Some(57));
    assert!(!answer.is_correct());
    assert_eq!(answer.marks_obtained(), 0);

    let report = engine.session.finish(quiz_id).await.unwrap();
    assert_eq!(report.marks_obtained, 0);
    assert_eq!(report.total_marks, 3);
}

#[tokio::test]
async fn over_cap_marker_becomes_trailing_content() {
    let engine = engine(vec![Reply::Text(
        "MCQ: First?\nOptions: 1) a 2) b 3) c 4) d\nAnswer: 1\nExplanation: one\n\n\
         MCQ: Second?\nOptions: 1) a 2) b 3) c 4) d\nAnswer: 2\nExplanation: two\n\n\
         MCQ: Third?\nOptions: 1) a 2) b 3) c 4) d\nAnswer: 3\nExplanation: three",
    )]);

    let generated = engine
        .generator
        .generate(request(QuizConfiguration::new("Caps").with_counts(2, 0, 0)))
        .await
        .unwrap();

    let texts: Vec<_> = generated.quiz.questions().iter().map(|q| q.text()).collect();
    assert_eq!(texts, vec!["First?", "Second?"]);
    assert_eq!(generated.quiz.questions()[1].explanation(), "two");
    assert!(generated.shortfall.is_none());
}

#[tokio::test]
async fn failed_generation_can_be_retried() {
    let engine = engine(vec![
        Reply::Status(503),
        Reply::Text("LAQ: Explain photosynthesis\nAnswer: light becomes chemical energy\nExplanation: summary"),
    ]);

    let err = engine
        .generator
        .generate(request(QuizConfiguration::new("Retry").with_counts(0, 0, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::CompletionUnavailable { .. }));

    let quiz_id = err.quiz_id().unwrap();
    let stored = engine.quizzes.load_quiz(quiz_id).await.unwrap();
    assert_eq!(stored.status(), QuizStatus::Generating);
    assert!(stored.questions().is_empty());

    let generated = engine.generator.regenerate(quiz_id).await.unwrap();
    assert_eq!(generated.quiz.id(), quiz_id);
    assert_eq!(generated.quiz.total_marks(), 5);
}
