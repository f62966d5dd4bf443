use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diagnosis::{DiagnosisEngine, EngineConfig, SessionStore, DEFAULT_SESSION_ID};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "motodiag", about = "Konsultasi masalah motor dari terminal")]
struct Cli {
    /// Knowledge base JSON (overrides MOTODIAG_KNOWLEDGE_PATH)
    #[arg(long, global = true)]
    knowledge: Option<PathBuf>,
    /// Seed for canned replies, for reproducible transcripts
    #[arg(long, global = true)]
    seed: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read one utterance per stdin line and answer each in the same session
    Chat {
        /// Session id (default: a fresh random id)
        #[arg(long)]
        session: Option<String>,
        /// Print the conversation summary at end of input
        #[arg(long, default_value_t = false)]
        summary: bool,
    },
    /// Answer a single utterance
    Ask {
        /// The utterance; multiple words are joined with spaces
        #[arg(required = true)]
        text: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = EngineConfig::from_env();
    if let Some(path) = cli.knowledge {
        config.knowledge_path = path;
    }
    if cli.seed.is_some() {
        config.reply_seed = cli.seed;
    }

    let engine = DiagnosisEngine::from_config(config).context("failed to start diagnosis engine")?;
    info!(records = engine.knowledge().len(), "knowledge base ready");

    match cli.command {
        Commands::Chat { session, summary } => {
            let session = session.unwrap_or_else(SessionStore::generate_id);
            run_chat(&engine, &session, summary)
        }
        Commands::Ask { text } => {
            println!("{}", engine.diagnose(&text.join(" "), DEFAULT_SESSION_ID));
            Ok(())
        }
    }
}

fn run_chat(engine: &DiagnosisEngine, session: &str, summary: bool) -> Result<()> {
    info!(session = %session, "chat started");
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        writeln!(stdout, "{}\n", engine.diagnose(&line, session)).context("failed to write response")?;
        stdout.flush().context("failed to flush stdout")?;
    }

    if summary {
        writeln!(stdout, "{}", engine.summary(session)).context("failed to write summary")?;
    }
    engine.end_session(session);
    Ok(())
}
