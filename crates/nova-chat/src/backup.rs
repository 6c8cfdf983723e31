//! Versioned backup export and fail-closed, two-phase import.
//!
//! Export is a pure snapshot of session state. Import validates the raw
//! document fully before anything else happens; only a validated
//! [`PendingImport`] can be applied, and applying it is the single atomic
//! multi-field mutation in the engine. Dropping a `PendingImport` dismisses
//! the import with no state change.

use chrono::{DateTime, Utc};
use nova_core::types::{Memory, Message};
use serde::{Deserialize, Serialize};

/// The only backup schema version this engine reads or writes.
pub const BACKUP_VERSION: u32 = 1;

/// Errors from backup parsing and validation. All are fatal to the import
/// operation and leave session state untouched.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("failed to parse backup document: {0}")]
    Malformed(String),
    #[error("invalid backup file format: missing memories or messages")]
    MissingCollections,
    #[error("unsupported backup version: {0}")]
    UnsupportedVersion(String),
}

/// A point-in-time snapshot of session state plus a schema version tag.
///
/// Wire form is camelCase (`exportedAt`) to match documents written by
/// earlier clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub memories: Vec<Memory>,
    pub messages: Vec<Message>,
}

impl BackupDocument {
    /// Snapshot the given collections with `version = 1` and the current
    /// instant.
    pub fn snapshot(memories: Vec<Memory>, messages: Vec<Message>) -> Self {
        Self {
            version: BACKUP_VERSION,
            exported_at: Utc::now(),
            memories,
            messages,
        }
    }

    /// Serialize to the pretty-printed UTF-8 JSON handed to the host's
    /// file-save mechanism.
    pub fn to_json(&self) -> Result<String, BackupError> {
        serde_json::to_string_pretty(self).map_err(|e| BackupError::Malformed(e.to_string()))
    }

    /// Suggested export filename, e.g. `nova-memory-2024-04-05.json`.
    pub fn suggested_filename(&self) -> String {
        format!("nova-memory-{}.json", self.exported_at.format("%Y-%m-%d"))
    }
}

/// A backup document that passed validation and awaits user confirmation.
///
/// Holds the parsed document but touches no session state. The caller shows
/// [`PendingImport::confirmation_prompt`] to the user; on approval the
/// orchestrator applies it atomically, on dismissal the value is simply
/// dropped.
#[derive(Debug)]
pub struct PendingImport {
    document: BackupDocument,
}

impl PendingImport {
    /// Parse and validate raw document text.
    ///
    /// Validation order: well-formed JSON object, both collections present,
    /// `version == 1`, then full deserialization with instant revival.
    /// Any failure aborts the import with a descriptive error.
    pub fn parse(raw: &str) -> Result<Self, BackupError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| BackupError::Malformed(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| BackupError::Malformed("document is not a JSON object".to_string()))?;

        if !object.contains_key("memories") || !object.contains_key("messages") {
            return Err(BackupError::MissingCollections);
        }

        match object.get("version") {
            Some(version) if version.as_u64() == Some(u64::from(BACKUP_VERSION)) => {}
            Some(version) => return Err(BackupError::UnsupportedVersion(version.to_string())),
            None => return Err(BackupError::UnsupportedVersion("unknown".to_string())),
        }

        let document: BackupDocument =
            serde_json::from_value(value).map_err(|e| BackupError::Malformed(e.to_string()))?;
        Ok(Self { document })
    }

    pub fn memory_count(&self) -> usize {
        self.document.memories.len()
    }

    pub fn message_count(&self) -> usize {
        self.document.messages.len()
    }

    /// The destructive-action confirmation shown before applying.
    pub fn confirmation_prompt(&self) -> String {
        format!(
            "Found {} memories and {} messages. Overwrite current brain?",
            self.memory_count(),
            self.message_count()
        )
    }

    /// Surrender the validated document for application.
    pub fn into_document(self) -> BackupDocument {
        self.document
    }
}
