use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{NovaError, Result};

/// Top-level configuration for the Nova engine.
///
/// Loaded from `~/.nova/config.toml` by default. Each section corresponds to
/// one component of the orchestration engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NovaConfig {
    pub general: GeneralConfig,
    pub chat: ChatConfig,
    pub scheduler: SchedulerConfig,
    pub speech: SpeechConfig,
}

impl NovaConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NovaConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file does not
    /// exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| NovaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite store.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.nova/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Conversation pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// How many trailing transcript entries accompany a reply request.
    /// Older context is recoverable only through memory.
    pub reply_context_messages: usize,
    /// Gap (whole hours) after which session bootstrap generates a
    /// "welcome back" message instead of silently resuming.
    pub welcome_threshold_hours: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reply_context_messages: 10,
            welcome_threshold_hours: 1,
        }
    }
}

/// Re-engagement scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Quiet period (seconds of user inactivity) before a proactive
    /// question may fire.
    pub quiet_period_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quiet_period_secs: 120,
        }
    }
}

/// Speech output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Start with audio output muted.
    pub muted: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self { muted: false }
    }
}
