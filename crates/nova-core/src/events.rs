use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MemoryCategory, Role};

/// Domain events emitted by the orchestrator after state changes.
///
/// Consumed by:
/// - The UI layer (typing indicator, fact-processing spinner, "new memory"
///   toast) via a broadcast channel
/// - The log (for audit/debugging)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DomainEvent {
    /// A message was appended to the transcript.
    MessageAppended {
        message_id: String,
        role: Role,
        timestamp: DateTime<Utc>,
    },

    /// The fact pipeline committed a new memory.
    MemoryExtracted {
        memory_id: String,
        category: MemoryCategory,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// The reply pipeline started or finished (typing indicator).
    TypingChanged {
        typing: bool,
        timestamp: DateTime<Utc>,
    },

    /// The fact pipeline started or finished (processing indicator).
    FactProcessingChanged {
        processing: bool,
        timestamp: DateTime<Utc>,
    },

    /// The re-engagement scheduler injected a proactive question.
    NudgeFired {
        message_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A backup document replaced both collections.
    BackupImported {
        memory_count: usize,
        message_count: usize,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Returns the instant at which the event occurred.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::MessageAppended { timestamp, .. }
            | DomainEvent::MemoryExtracted { timestamp, .. }
            | DomainEvent::TypingChanged { timestamp, .. }
            | DomainEvent::FactProcessingChanged { timestamp, .. }
            | DomainEvent::NudgeFired { timestamp, .. }
            | DomainEvent::BackupImported { timestamp, .. } => *timestamp,
        }
    }

    /// Returns a stable event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            DomainEvent::MessageAppended { .. } => "message_appended",
            DomainEvent::MemoryExtracted { .. } => "memory_extracted",
            DomainEvent::TypingChanged { .. } => "typing_changed",
            DomainEvent::FactProcessingChanged { .. } => "fact_processing_changed",
            DomainEvent::NudgeFired { .. } => "nudge_fired",
            DomainEvent::BackupImported { .. } => "backup_imported",
        }
    }
}
