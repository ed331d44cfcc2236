mod config;

use crate::config::{Config, Provider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;
use viva_core::controller::{ControllerStep, SessionController};
use viva_core::model::{Difficulty, Feedback};
use viva_core::orchestrator::{ChatProvider, GeminiChat, OpenAiChat, Orchestrator};
use viva_core::service::{InterviewService, LocalBackend, SubmitOutcome};
use viva_core::speech::{NarrationError, Narrator, SpeechBackend};
use viva_core::store::MemoryStore;

#[derive(Parser)]
#[command(name = "viva", about = "Run a simulated interview in the terminal")]
struct Cli {
    /// The role to interview for, e.g. "backend engineer"
    role: String,

    /// Difficulty tier: junior, mid or senior
    #[arg(long, default_value = "mid")]
    difficulty: Difficulty,

    /// Optional path to a plain-text resume to ground questions in
    #[arg(long)]
    resume: Option<PathBuf>,

    /// User identity recorded against the session
    #[arg(long, default_value = "local-user")]
    user: String,
}

/// Terminal stand-in for the speech synthesis collaborator: questions
/// are voiced by printing them.
struct ConsoleSpeech;

#[async_trait]
impl SpeechBackend for ConsoleSpeech {
    async fn speak(&self, text: &str) -> Result<(), NarrationError> {
        println!("\nInterviewer: {text}");
        Ok(())
    }
}

fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let openai = config.openai_api_key.clone().map(|key| {
        Arc::new(OpenAiChat::new(key, config.chat_model.clone())) as Arc<dyn ChatProvider>
    });
    let gemini = config.gemini_api_key.clone().map(|key| {
        Arc::new(GeminiChat::new(key, config.gemini_model.clone())) as Arc<dyn ChatProvider>
    });

    let (primary, secondary) = match config.provider {
        Provider::OpenAI => (openai, gemini),
        Provider::Gemini => (gemini, openai),
    };
    let primary = primary.context("primary provider key missing")?;

    let mut orchestrator = Orchestrator::new(primary);
    if let Some(secondary) = secondary {
        orchestrator = orchestrator.with_secondary(secondary);
    }
    Ok(orchestrator)
}

fn render_feedback(feedback: &Feedback) {
    println!("\n=== Interview feedback ===");
    println!("Overall score: {}/100", feedback.overall_score);
    for category in &feedback.category_scores {
        println!("  {}: {}/100", category.name, category.score);
    }
    for review in &feedback.question_reviews {
        println!("\nQ: {}", review.question);
        println!("Critique: {}", review.critique);
        println!("Ideal answer: {}", review.ideal_answer);
    }
    if !feedback.summary.is_empty() {
        println!("\n{}", feedback.summary);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let args = Cli::parse();

    let resume_text = match &args.resume {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read resume file {}", path.display()))?,
        ),
        None => None,
    };

    let orchestrator = build_orchestrator(&config)?;
    let service = Arc::new(InterviewService::new(orchestrator, MemoryStore::new()));
    let backend = LocalBackend::new(Arc::clone(&service), args.user.clone());

    // The narrator outlives the controller on purpose; see the speech
    // module docs.
    let narrator = Narrator::install(Arc::new(ConsoleSpeech)).clone();
    let mut controller =
        SessionController::new(backend, narrator, args.role.clone(), args.difficulty);

    println!(
        "Generating a {} {} interview...",
        args.difficulty, args.role
    );
    controller
        .begin(resume_text)
        .await
        .context("Question generation failed; the session cannot start")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut step = controller.enter_question().await?;

    loop {
        match step {
            ControllerStep::Finished(SubmitOutcome::Graded(feedback)) => {
                render_feedback(&feedback);
                break;
            }
            ControllerStep::Finished(SubmitOutcome::Processing) => {
                println!("\nYour session is being graded. Check back for the report shortly.");
                break;
            }
            ControllerStep::AwaitingAnswer => {
                // The narrator already voiced the question text.
                println!(
                    "[question {} of {}]",
                    controller.current_index() + 1,
                    controller.queue_len()
                );
                print!("> ");
                std::io::stdout().flush()?;

                let Some(line) = lines.next_line().await? else {
                    println!("\nInput closed, leaving the session unfinished.");
                    break;
                };
                if line.trim().is_empty() {
                    println!("An empty answer is not submitted; say something, even briefly.");
                    step = ControllerStep::AwaitingAnswer;
                    continue;
                }
                step = controller.submit_answer(&line).await?;
            }
        }
    }

    Ok(())
}
