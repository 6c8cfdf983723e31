//! Error types for the conversation engine.

/// Errors surfaced to the caller of the orchestrator.
///
/// Reply-generation failures never appear here: they are converted into an
/// in-transcript apology so turn-taking is preserved. Fact-extraction
/// failures are logged and swallowed.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The utterance was empty after trimming.
    #[error("message cannot be empty")]
    EmptyMessage,
    /// Audio could not be transcribed. User-actionable: shown as a
    /// dismissible notice, never a crash.
    #[error("transcription failed: {0}")]
    Transcription(String),
}
