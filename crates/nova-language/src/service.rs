//! The asynchronous, fallible Language Service contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nova_core::types::{Memory, Message};

use crate::types::ExtractedFact;

/// Errors from the language provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LanguageError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("language service unavailable")]
    Unavailable,
}

/// External language operations consumed by the orchestrator.
///
/// All operations are asynchronous and fallible. Prompt construction and
/// model selection are implementation concerns; the orchestrator only
/// guarantees the contract around the calls (ordering, isolation,
/// persistence).
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// Inspect a user utterance for a durable fact worth remembering.
    ///
    /// `Ok(None)` means nothing memorable this turn.
    async fn extract_fact(&self, utterance: &str) -> Result<Option<ExtractedFact>, LanguageError>;

    /// Generate the next assistant reply.
    ///
    /// `history` is already truncated by the caller; older context is
    /// recoverable only through `memories`.
    async fn generate_reply(
        &self,
        history: &[Message],
        utterance: &str,
        memories: &[Memory],
    ) -> Result<String, LanguageError>;

    /// Transcribe captured audio to text.
    async fn transcribe_audio(&self, audio: &[u8]) -> Result<String, LanguageError>;

    /// Generate a context-aware greeting after a long gap.
    async fn generate_welcome_message(
        &self,
        memories: &[Memory],
        last_message_at: DateTime<Utc>,
    ) -> Result<String, LanguageError>;

    /// Generate a question to re-engage a quiet user.
    async fn generate_proactive_question(
        &self,
        memories: &[Memory],
    ) -> Result<String, LanguageError>;
}
