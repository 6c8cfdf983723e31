//! Conversation orchestration engine for Nova.
//!
//! Owns message/memory state, coordinates the two concurrent per-turn
//! pipelines (fact extraction, reply generation), runs the time-based
//! re-engagement scheduler, performs session bootstrap, and handles
//! versioned backup import/export with destructive-action confirmation.

pub mod backup;
pub mod bootstrap;
pub mod error;
pub mod orchestrator;
mod scheduler;
pub mod session;
pub mod speech;

pub use backup::{BackupDocument, BackupError, PendingImport, BACKUP_VERSION};
pub use bootstrap::{BootstrapOutcome, FIRST_RUN_GREETING};
pub use error::ChatError;
pub use orchestrator::Orchestrator;
pub use session::SessionState;
pub use speech::{NullSpeech, RecordingSpeech, SpeechOutput};
