//! Nova application binary - composition root.
//!
//! Ties the workspace crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Initialize storage (SQLite documents table)
//! 3. Build the orchestrator over the store, language service, and speech sink
//! 4. Run the requested command (chat REPL, export, import, memories)
//!
//! The binary wires the scripted language service; a hosted provider plugs in
//! behind the same `LanguageService` trait.

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use nova_chat::{NullSpeech, Orchestrator, SpeechOutput};
use nova_core::config::NovaConfig;
use nova_core::events::DomainEvent;
use nova_language::{LanguageService, ScriptedLanguageService};
use nova_store::{Database, SqliteStore, StateStore};

use cli::{CliArgs, Command};

/// Expand ~ to the home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if let Some(rest) = data_dir.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(data_dir)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = NovaConfig::load_or_default(&config_file);
    if args.muted {
        config.speech.muted = true;
    }

    // Tracing.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    tracing::info!("Starting Nova v{}", env!("CARGO_PKG_VERSION"));

    // Storage.
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| resolve_data_dir(&config.general.data_dir));
    let db_path = data_dir.join("nova.db");
    let db = Arc::new(Database::new(&db_path)?);
    let store: Arc<dyn StateStore> = Arc::new(SqliteStore::new(db));
    tracing::info!(path = %db_path.display(), "SQLite store opened");

    // Language service and speech sink.
    let language: Arc<dyn LanguageService> = Arc::new(ScriptedLanguageService::new());
    let speech: Arc<dyn SpeechOutput> = Arc::new(NullSpeech);

    let orchestrator = Orchestrator::new(store, language, speech, &config);

    match args.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(&orchestrator).await?,
        Command::Export { out } => run_export(&orchestrator, out)?,
        Command::Import { file, yes } => run_import(&orchestrator, &file, yes).await?,
        Command::Memories => run_memories(&orchestrator),
    }

    orchestrator.shutdown();
    Ok(())
}

/// Interactive chat loop over stdin/stdout.
async fn run_chat(orchestrator: &Orchestrator) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = orchestrator.bootstrap().await;
    tracing::debug!(?outcome, "Bootstrap complete");

    // Print any messages injected by bootstrap or the scheduler.
    let mut events = orchestrator.subscribe();
    for message in orchestrator.messages().iter().rev().take(1) {
        println!("nova> {}", message.text);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        // Drain events that arrived between turns (nudges, memory toasts).
        while let Ok(event) = events.try_recv() {
            match event {
                DomainEvent::NudgeFired { .. } => {
                    if let Some(last) = orchestrator.messages().last() {
                        println!("nova> {}", last.text);
                    }
                }
                DomainEvent::MemoryExtracted { text, .. } => {
                    println!("[remembered: {}]", text);
                }
                _ => {}
            }
        }

        let Some(line) = lines.next_line().await? else {
            break; // EOF
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        match orchestrator.send_text(&line).await {
            Ok(reply) => println!("nova> {}", reply.text),
            Err(e) => eprintln!("error: {}", e),
        }
        if let Some(fact) = orchestrator.take_last_extracted_fact() {
            println!("[remembered: {}]", fact);
        }
    }
    Ok(())
}

fn run_export(
    orchestrator: &Orchestrator,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let document = orchestrator.export_backup();
    let path = out.unwrap_or_else(|| PathBuf::from(document.suggested_filename()));
    std::fs::write(&path, document.to_json()?)?;
    println!(
        "Exported {} memories and {} messages to {}",
        document.memories.len(),
        document.messages.len(),
        path.display()
    );
    Ok(())
}

async fn run_import(
    orchestrator: &Orchestrator,
    file: &PathBuf,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(file)?;
    let pending = match orchestrator.prepare_import(&raw) {
        Ok(pending) => pending,
        Err(e) => {
            eprintln!("Import failed: {}", e);
            return Ok(());
        }
    };

    if !yes {
        println!("{} [y/N]", pending.confirmation_prompt());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let answer = lines.next_line().await?.unwrap_or_default();
        if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            println!("Import cancelled.");
            return Ok(());
        }
    }

    let (memories, messages) = orchestrator.apply_import(pending);
    println!("Brain restored: {} memories, {} messages.", memories, messages);
    Ok(())
}

fn run_memories(orchestrator: &Orchestrator) {
    let memories = orchestrator.memories();
    if memories.is_empty() {
        println!("No memories stored yet.");
        return;
    }
    for memory in memories {
        println!(
            "[{}] {:?}: {}",
            memory.timestamp.format("%Y-%m-%d %H:%M"),
            memory.category,
            memory.text
        );
    }
}
