//! quizforge command-line interface.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use quizforge_core::{parse_questions, PromptBuilder, Question, QuizConfiguration, Shortfall};
use quizforge_runtime::{
    AnswerEvaluator, CompletionClient, Document, EngineConfig, GenerationRequest, InMemoryContentStore,
    InMemoryQuizStore, ProviderRegistry, QuizGenerator,
};

#[derive(Parser)]
#[command(name = "quizforge", version, about = "Generate quizzes from text and grade answers")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a saved generation reply into questions
    Parse {
        /// File holding the reply text
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        counts: Counts,
    },

    /// Print the generation prompt for some content
    Prompt {
        /// Plain-text source content
        #[arg(short, long)]
        content: PathBuf,

        /// Quiz configuration (YAML); the count flags apply when absent
        #[arg(short = 'f', long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        counts: Counts,

        /// Truncate content beyond this many characters
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// Generate a quiz with the configured completion provider
    Generate {
        #[arg(short, long)]
        content: PathBuf,

        #[arg(short = 'f', long)]
        config: PathBuf,

        /// Engine configuration (YAML); defaults apply when absent
        #[arg(short, long)]
        engine: Option<PathBuf>,
    },

    /// Grade one answer against a question from a JSON question list
    Evaluate {
        /// JSON array of questions, as printed by `parse` or `generate`
        #[arg(short, long)]
        questions: PathBuf,

        #[arg(short, long)]
        ordinal: u32,

        #[arg(short, long)]
        answer: String,

        #[arg(short, long)]
        engine: Option<PathBuf>,
    },
}

/// Requested questions per type.
#[derive(Args)]
struct Counts {
    #[arg(long, default_value_t = 0)]
    mcq: u32,

    #[arg(long, default_value_t = 0)]
    saq: u32,

    #[arg(long, default_value_t = 0)]
    laq: u32,
}

impl Counts {
    fn configuration(&self) -> QuizConfiguration {
        QuizConfiguration::new("quiz").with_counts(self.mcq, self.saq, self.laq)
    }
}

#[derive(Serialize)]
struct QuestionsOutput<'a> {
    questions: &'a [Question],
    #[serde(skip_serializing_if = "Option::is_none")]
    shortfall: Option<Shortfall>,
}

/// Either a bare question list or the output of `parse`/`generate`.
#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionsFile {
    List(Vec<Question>),
    Output { questions: Vec<Question> },
}

impl QuestionsFile {
    fn into_questions(self) -> Vec<Question> {
        match self {
            QuestionsFile::List(questions) | QuestionsFile::Output { questions } => questions,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Command::Parse { input, counts } => {
            let reply = read(&input)?;
            let configuration = counts.configuration();
            let outcome = parse_questions(&reply, &configuration);
            if outcome.discarded > 0 {
                warn!(discarded = outcome.discarded, "Dropped malformed question blocks");
            }
            print_json(&QuestionsOutput {
                questions: &outcome.questions,
                shortfall: outcome.shortfall,
            })
        }

        Command::Prompt {
            content,
            config,
            counts,
            max_chars,
        } => {
            let configuration = match config {
                Some(path) => load_quiz_configuration(&path)?,
                None => counts.configuration(),
            };
            configuration.validate()?;
            let builder = match max_chars {
                Some(limit) => PromptBuilder::with_max_content_chars(limit),
                None => PromptBuilder::new(),
            };
            println!("{}", builder.generation_prompt(&read(&content)?, &configuration));
            Ok(())
        }

        Command::Generate { content, config, engine } => {
            let engine = load_engine(engine.as_deref())?;
            let configuration = load_quiz_configuration(&config)?;

            let documents = Arc::new(InMemoryContentStore::new());
            documents.insert(Document::completed("content", read(&content)?));

            let generator = QuizGenerator::new(
                completion_client(&engine)?,
                Arc::new(InMemoryQuizStore::new()),
                documents,
                engine.generation.clone(),
            );
            let generated = generator
                .generate(GenerationRequest {
                    configuration,
                    document_ids: vec!["content".to_string()],
                })
                .await?;

            print_json(&QuestionsOutput {
                questions: generated.quiz.questions(),
                shortfall: generated.shortfall,
            })
        }

        Command::Evaluate {
            questions,
            ordinal,
            answer,
            engine,
        } => {
            let engine = load_engine(engine.as_deref())?;
            let file: QuestionsFile = serde_json::from_str(&read(&questions)?)
                .with_context(|| format!("reading questions from {}", questions.display()))?;

            let Some(question) = file.into_questions().into_iter().find(|q| q.ordinal() == ordinal) else {
                bail!("no question {} in {}", ordinal, questions.display());
            };

            let evaluator = AnswerEvaluator::new(completion_client(&engine)?, engine.evaluation);
            print_json(&evaluator.evaluate(&question, &answer).await)
        }
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_quiz_configuration(path: &Path) -> Result<QuizConfiguration> {
    QuizConfiguration::from_yaml_file(path)
        .with_context(|| format!("loading quiz configuration {}", path.display()))
}

fn load_engine(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("loading engine configuration {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn completion_client(engine: &EngineConfig) -> Result<CompletionClient> {
    let registry = ProviderRegistry::with_defaults();
    let provider = engine.build_provider(&registry)?;
    Ok(CompletionClient::new(provider, engine.completion_config(&registry)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
