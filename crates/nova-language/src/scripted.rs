//! Deterministic, queue-driven language service.
//!
//! Each operation pops the next scripted response from its queue, falling
//! back to a fixed default when the queue is empty. This allows testing the
//! orchestration contract (ordering, isolation, failure handling) without a
//! real provider, and doubles as the offline mode for the binary.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nova_core::types::{Memory, Message};

use crate::service::{LanguageError, LanguageService};
use crate::types::ExtractedFact;

/// Default reply when no response is scripted.
pub const DEFAULT_REPLY: &str = "I'm lost for words...";
/// Default welcome-back text when no response is scripted.
pub const DEFAULT_WELCOME: &str = "Hey! It's good to see you.";
/// Default proactive question when no response is scripted.
pub const DEFAULT_QUESTION: &str = "Whatcha thinking about?";

type Script<T> = Mutex<VecDeque<Result<T, LanguageError>>>;

/// Scripted implementation of [`LanguageService`].
#[derive(Default)]
pub struct ScriptedLanguageService {
    facts: Script<Option<ExtractedFact>>,
    replies: Script<String>,
    transcriptions: Script<String>,
    welcomes: Script<String>,
    questions: Script<String>,

    fact_calls: AtomicUsize,
    reply_calls: AtomicUsize,
    transcription_calls: AtomicUsize,
    welcome_calls: AtomicUsize,
    question_calls: AtomicUsize,

    last_reply_context: Mutex<Option<Vec<Message>>>,
}

fn push<T>(script: &Script<T>, response: Result<T, LanguageError>) {
    if let Ok(mut queue) = script.lock() {
        queue.push_back(response);
    }
}

fn pop<T>(script: &Script<T>) -> Option<Result<T, LanguageError>> {
    script.lock().ok().and_then(|mut queue| queue.pop_front())
}

impl ScriptedLanguageService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next fact-extraction result.
    pub fn push_fact(&self, fact: Option<ExtractedFact>) {
        push(&self.facts, Ok(fact));
    }

    /// Make the next fact extraction fail.
    pub fn push_fact_error(&self, message: impl Into<String>) {
        push(&self.facts, Err(LanguageError::Provider(message.into())));
    }

    /// Script the next reply.
    pub fn push_reply(&self, text: impl Into<String>) {
        push(&self.replies, Ok(text.into()));
    }

    /// Make the next reply generation fail.
    pub fn push_reply_error(&self, message: impl Into<String>) {
        push(&self.replies, Err(LanguageError::Provider(message.into())));
    }

    /// Script the next transcription.
    pub fn push_transcription(&self, text: impl Into<String>) {
        push(&self.transcriptions, Ok(text.into()));
    }

    /// Make the next transcription fail.
    pub fn push_transcription_error(&self, message: impl Into<String>) {
        push(
            &self.transcriptions,
            Err(LanguageError::Provider(message.into())),
        );
    }

    /// Script the next welcome message.
    pub fn push_welcome(&self, text: impl Into<String>) {
        push(&self.welcomes, Ok(text.into()));
    }

    /// Make the next welcome-message generation fail.
    pub fn push_welcome_error(&self, message: impl Into<String>) {
        push(&self.welcomes, Err(LanguageError::Provider(message.into())));
    }

    /// Script the next proactive question.
    pub fn push_question(&self, text: impl Into<String>) {
        push(&self.questions, Ok(text.into()));
    }

    /// Make the next proactive-question generation fail.
    pub fn push_question_error(&self, message: impl Into<String>) {
        push(&self.questions, Err(LanguageError::Provider(message.into())));
    }

    pub fn fact_calls(&self) -> usize {
        self.fact_calls.load(Ordering::SeqCst)
    }

    pub fn reply_calls(&self) -> usize {
        self.reply_calls.load(Ordering::SeqCst)
    }

    pub fn transcription_calls(&self) -> usize {
        self.transcription_calls.load(Ordering::SeqCst)
    }

    pub fn welcome_calls(&self) -> usize {
        self.welcome_calls.load(Ordering::SeqCst)
    }

    pub fn question_calls(&self) -> usize {
        self.question_calls.load(Ordering::SeqCst)
    }

    /// The transcript context passed to the most recent reply call.
    pub fn last_reply_context(&self) -> Option<Vec<Message>> {
        self.last_reply_context
            .lock()
            .ok()
            .and_then(|context| context.clone())
    }

    /// Total calls across all operations.
    pub fn total_calls(&self) -> usize {
        self.fact_calls()
            + self.reply_calls()
            + self.transcription_calls()
            + self.welcome_calls()
            + self.question_calls()
    }
}

#[async_trait]
impl LanguageService for ScriptedLanguageService {
    async fn extract_fact(&self, _utterance: &str) -> Result<Option<ExtractedFact>, LanguageError> {
        self.fact_calls.fetch_add(1, Ordering::SeqCst);
        pop(&self.facts).unwrap_or(Ok(None))
    }

    async fn generate_reply(
        &self,
        history: &[Message],
        _utterance: &str,
        _memories: &[Memory],
    ) -> Result<String, LanguageError> {
        self.reply_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut context) = self.last_reply_context.lock() {
            *context = Some(history.to_vec());
        }
        pop(&self.replies).unwrap_or_else(|| Ok(DEFAULT_REPLY.to_string()))
    }

    async fn transcribe_audio(&self, _audio: &[u8]) -> Result<String, LanguageError> {
        self.transcription_calls.fetch_add(1, Ordering::SeqCst);
        pop(&self.transcriptions).unwrap_or_else(|| Ok(String::new()))
    }

    async fn generate_welcome_message(
        &self,
        _memories: &[Memory],
        _last_message_at: DateTime<Utc>,
    ) -> Result<String, LanguageError> {
        self.welcome_calls.fetch_add(1, Ordering::SeqCst);
        pop(&self.welcomes).unwrap_or_else(|| Ok(DEFAULT_WELCOME.to_string()))
    }

    async fn generate_proactive_question(
        &self,
        _memories: &[Memory],
    ) -> Result<String, LanguageError> {
        self.question_calls.fetch_add(1, Ordering::SeqCst);
        pop(&self.questions).unwrap_or_else(|| Ok(DEFAULT_QUESTION.to_string()))
    }
}
