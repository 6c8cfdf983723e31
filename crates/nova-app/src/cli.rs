//! CLI argument definitions for the Nova binary.
//!
//! Uses `clap` with derive macros. Priority resolution: CLI args > env vars
//! > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Nova — a conversational companion with long-term memory.
#[derive(Parser, Debug)]
#[command(name = "nova", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory for the SQLite store.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Start with audio output muted.
    #[arg(long = "muted")]
    pub muted: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive chat session (default).
    Chat,
    /// Export transcript and memories to a backup file.
    Export {
        /// Output path; defaults to nova-memory-YYYY-MM-DD.json.
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },
    /// Import a backup file, replacing the current transcript and memories.
    Import {
        /// Backup file to import.
        file: PathBuf,
        /// Skip the confirmation prompt.
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
    /// List stored memories, most recent first.
    Memories,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > NOVA_CONFIG env var > ~/.nova/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref path) = self.config {
            return path.clone();
        }
        if let Ok(path) = std::env::var("NOVA_CONFIG") {
            return PathBuf::from(path);
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".nova").join("config.toml");
        }
        PathBuf::from("config.toml")
    }

    /// Resolve the log level. Priority: --log-level flag > config value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}
