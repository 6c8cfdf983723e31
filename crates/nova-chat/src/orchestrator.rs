//! The conversation orchestration engine.
//!
//! Owns session state and coordinates the two concurrent per-turn pipelines
//! (fact extraction and reply generation), the re-engagement scheduler,
//! session bootstrap, and backup import/export. All mutation flows through
//! this single owner; pipelines merge their results via pure appends under
//! the state lock, so interleaved completions can never lose updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use nova_core::config::NovaConfig;
use nova_core::events::DomainEvent;
use nova_core::types::{Memory, Message, Role};
use nova_language::LanguageService;
use nova_store::StateStore;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backup::{BackupDocument, BackupError, PendingImport};
use crate::bootstrap::{self, BootstrapOutcome};
use crate::error::ChatError;
use crate::scheduler::ReengagementScheduler;
use crate::session::SessionState;
use crate::speech::SpeechOutput;

/// Substitute reply when generation fails; the error description is
/// appended so the user always sees a turn-for-turn response.
const REPLY_FAILURE_TEXT: &str =
    "I'm having a little trouble connecting to my brain right now. Can you say that again?";

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Shared engine core. The scheduler's timer task holds a `Weak` reference
/// to this, so a dropped orchestrator silently cancels any pending nudge.
pub(crate) struct Inner {
    state: Mutex<SessionState>,
    pub(crate) language: Arc<dyn LanguageService>,
    speech: Arc<dyn SpeechOutput>,
    events: broadcast::Sender<DomainEvent>,
    muted: AtomicBool,
    reply_context_messages: usize,
    pub(crate) welcome_threshold_hours: i64,
    scheduler: ReengagementScheduler,
}

impl Inner {
    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn emit(&self, event: DomainEvent) {
        debug!(event = event.event_name(), "Domain event");
        // No receivers is fine; events are best-effort observability.
        let _ = self.events.send(event);
    }

    pub(crate) fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    pub(crate) fn speak_unless_muted(&self, text: &str) {
        if !self.is_muted() {
            self.speech.speak(text);
        }
    }

    pub(crate) fn reschedule(&self) {
        self.scheduler.reschedule();
    }

    /// Scheduler premise: the conversation is non-empty, the user spoke
    /// last, and no reply is in flight.
    pub(crate) fn nudge_premise_holds(&self) -> bool {
        let state = self.state();
        state.last_role() == Some(Role::User) && !state.typing()
    }

    /// Append an assistant message, persist, notify observers, and rearm
    /// the scheduler.
    pub(crate) fn append_model_message(&self, text: impl Into<String>) -> Message {
        let message = Message::model(text);
        self.state().append_message(message.clone());
        self.emit(DomainEvent::MessageAppended {
            message_id: message.id.clone(),
            role: Role::Model,
            timestamp: message.timestamp,
        });
        self.reschedule();
        message
    }

    fn set_typing(&self, typing: bool) {
        let changed = self.state().set_typing(typing);
        if changed {
            self.emit(DomainEvent::TypingChanged {
                typing,
                timestamp: Utc::now(),
            });
            self.reschedule();
        }
    }

    fn set_processing_fact(&self, processing: bool) {
        let changed = self.state().set_processing_fact(processing);
        if changed {
            self.emit(DomainEvent::FactProcessingChanged {
                processing,
                timestamp: Utc::now(),
            });
        }
    }

    /// Fact extraction pipeline. Runs concurrently with reply generation
    /// and never blocks it; `None` and errors are both "no fact this turn".
    async fn run_fact_pipeline(&self, utterance: String) {
        self.set_processing_fact(true);
        match self.language.extract_fact(&utterance).await {
            Ok(Some(extracted)) => {
                let memory = Memory::new(extracted.fact, extracted.category);
                {
                    let mut state = self.state();
                    state.append_memory(memory.clone());
                    state.set_last_extracted_fact(memory.text.clone());
                }
                self.emit(DomainEvent::MemoryExtracted {
                    memory_id: memory.id.clone(),
                    category: memory.category,
                    text: memory.text.clone(),
                    timestamp: memory.timestamp,
                });
                debug!(category = ?memory.category, "Memory committed");
            }
            Ok(None) => debug!("No memorable fact this turn"),
            Err(e) => warn!(error = %e, "Fact extraction failed"),
        }
        // The flag must never stick: success, no-fact, and error all land here.
        self.set_processing_fact(false);
    }

    /// Reply generation pipeline. Always appends exactly one assistant
    /// message — the generated reply or the apology on failure.
    async fn run_reply_pipeline(
        &self,
        history: Vec<Message>,
        utterance: String,
        memories: Vec<Memory>,
    ) -> Message {
        self.set_typing(true);

        // Older context is recoverable only through memory.
        let start = history.len().saturating_sub(self.reply_context_messages);
        let context = &history[start..];

        let message = match self
            .language
            .generate_reply(context, &utterance, &memories)
            .await
        {
            Ok(text) => {
                let message = self.append_model_message(text);
                self.speak_unless_muted(&message.text);
                message
            }
            Err(e) => {
                warn!(error = %e, "Reply generation failed");
                self.append_model_message(format!("{} (Error: {})", REPLY_FAILURE_TEXT, e))
            }
        };

        self.set_typing(false);
        message
    }

    /// Quiet-period elapse path. Re-reads current state; the snapshot taken
    /// when the timer was armed is never trusted.
    pub(crate) async fn fire_nudge(&self) {
        if !self.nudge_premise_holds() {
            return;
        }
        let memories = self.state().memories().to_vec();

        match self.language.generate_proactive_question(&memories).await {
            Ok(question) => {
                // The premise may have lapsed during the call.
                if !self.nudge_premise_holds() {
                    return;
                }
                let message = self.append_model_message(question);
                self.emit(DomainEvent::NudgeFired {
                    message_id: message.id.clone(),
                    timestamp: message.timestamp,
                });
                self.speak_unless_muted(&message.text);
                info!("Re-engagement question injected");
            }
            Err(e) => warn!(error = %e, "Proactive nudge failed"),
        }
    }
}

/// Public entry point to the engine.
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Build the engine over a store, a language service, and a speech sink,
    /// restoring any persisted session state.
    ///
    /// The re-engagement scheduler starts watching once [`bootstrap`] runs.
    ///
    /// [`bootstrap`]: Orchestrator::bootstrap
    pub fn new(
        store: Arc<dyn StateStore>,
        language: Arc<dyn LanguageService>,
        speech: Arc<dyn SpeechOutput>,
        config: &NovaConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = SessionState::load(store);
        let inner = Arc::new(Inner {
            state: Mutex::new(state),
            language,
            speech,
            events,
            muted: AtomicBool::new(config.speech.muted),
            reply_context_messages: config.chat.reply_context_messages,
            welcome_threshold_hours: config.chat.welcome_threshold_hours,
            scheduler: ReengagementScheduler::new(Duration::from_secs(
                config.scheduler.quiet_period_secs,
            )),
        });
        inner.scheduler.bind(Arc::downgrade(&inner));
        Self { inner }
    }

    /// Subscribe to domain events (typing indicator, new memories, nudges).
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.inner.events.subscribe()
    }

    /// Run session bootstrap. Call once, at startup, before any user
    /// interaction; this also starts the idle watch.
    pub async fn bootstrap(&self) -> BootstrapOutcome {
        bootstrap::run(&self.inner).await
    }

    /// Process a typed user utterance: append it, then drive fact
    /// extraction and reply generation concurrently. Returns the assistant
    /// message (reply or apology) once the turn completes.
    pub async fn send_text(&self, text: &str) -> Result<Message, ChatError> {
        self.process_utterance(text, false).await
    }

    /// Process an audio utterance. Transcribes first; a transcription that
    /// is empty after trimming is ignored (`Ok(None)`, no turn).
    pub async fn send_audio(&self, audio: &[u8]) -> Result<Option<Message>, ChatError> {
        let text = self
            .inner
            .language
            .transcribe_audio(audio)
            .await
            .map_err(|e| ChatError::Transcription(e.to_string()))?;
        if text.trim().is_empty() {
            debug!("Empty transcription, ignoring audio turn");
            return Ok(None);
        }
        self.process_utterance(&text, true).await.map(Some)
    }

    async fn process_utterance(&self, text: &str, is_audio: bool) -> Result<Message, ChatError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        // A new user message interrupts any ongoing speech.
        self.inner.speech.cancel();

        let user_message = Message::new(Role::User, trimmed, is_audio);

        // Snapshot the pre-turn transcript and current memory set, then
        // append the user message (write-through).
        let (history, memories) = {
            let mut state = self.inner.state();
            let history = state.messages().to_vec();
            state.append_message(user_message.clone());
            (history, state.memories().to_vec())
        };
        self.inner.emit(DomainEvent::MessageAppended {
            message_id: user_message.id.clone(),
            role: Role::User,
            timestamp: user_message.timestamp,
        });
        self.inner.reschedule();

        // Fire both pipelines concurrently; they complete independently and
        // mutate disjoint collections.
        let fact = self.inner.run_fact_pipeline(trimmed.to_string());
        let reply = self
            .inner
            .run_reply_pipeline(history, trimmed.to_string(), memories);
        let ((), reply_message) = tokio::join!(fact, reply);

        Ok(reply_message)
    }

    /// Transcript snapshot in chronological order.
    pub fn messages(&self) -> Vec<Message> {
        self.inner.state().messages().to_vec()
    }

    /// Memory snapshot, most recent first (presentation order).
    pub fn memories(&self) -> Vec<Memory> {
        self.inner.state().memories_recent_first()
    }

    /// Consume the "new memory" notification, if one is pending.
    pub fn take_last_extracted_fact(&self) -> Option<String> {
        self.inner.state().take_last_extracted_fact()
    }

    pub fn is_typing(&self) -> bool {
        self.inner.state().typing()
    }

    pub fn is_processing_fact(&self) -> bool {
        self.inner.state().processing_fact()
    }

    pub fn is_muted(&self) -> bool {
        self.inner.is_muted()
    }

    /// Toggle audio output. Muting cancels any ongoing speech.
    pub fn set_muted(&self, muted: bool) {
        if muted {
            self.inner.speech.cancel();
        }
        self.inner.muted.store(muted, Ordering::SeqCst);
    }

    /// Snapshot session state into a versioned backup document. Pure:
    /// session state is untouched.
    pub fn export_backup(&self) -> BackupDocument {
        let state = self.inner.state();
        BackupDocument::snapshot(state.memories().to_vec(), state.messages().to_vec())
    }

    /// Validate raw backup text into a [`PendingImport`]. Fail-closed: any
    /// error leaves session state untouched.
    pub fn prepare_import(&self, raw: &str) -> Result<PendingImport, BackupError> {
        PendingImport::parse(raw)
    }

    /// Apply a confirmed import: atomically replace both collections,
    /// persist, and report the applied counts. Dismissal is simply dropping
    /// the [`PendingImport`] instead.
    pub fn apply_import(&self, pending: PendingImport) -> (usize, usize) {
        let document = pending.into_document();
        let counts = (document.memories.len(), document.messages.len());
        self.inner
            .state()
            .replace_all(document.memories, document.messages);
        self.inner.emit(DomainEvent::BackupImported {
            memory_count: counts.0,
            message_count: counts.1,
            timestamp: Utc::now(),
        });
        self.inner.reschedule();
        info!(
            memories = counts.0,
            messages = counts.1,
            "Backup imported"
        );
        counts
    }

    /// Whether a re-engagement quiet-period timer is currently running.
    pub fn is_reengagement_armed(&self) -> bool {
        self.inner.scheduler.is_armed()
    }

    /// Stop the idle watch. Dropping the orchestrator does the same.
    pub fn shutdown(&self) {
        self.inner.scheduler.disarm();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::FIRST_RUN_GREETING;
    use crate::speech::RecordingSpeech;
    use nova_core::types::MemoryCategory;
    use nova_language::{ExtractedFact, ScriptedLanguageService};
    use nova_store::{save_collection, MemoryStore, NAMESPACE_MEMORIES, NAMESPACE_MESSAGES};

    struct Harness {
        orchestrator: Orchestrator,
        language: Arc<ScriptedLanguageService>,
        speech: Arc<RecordingSpeech>,
        store: Arc<MemoryStore>,
    }

    fn harness() -> Harness {
        harness_with(Arc::new(MemoryStore::new()), NovaConfig::default())
    }

    fn harness_with(store: Arc<MemoryStore>, config: NovaConfig) -> Harness {
        let language = Arc::new(ScriptedLanguageService::new());
        let speech = Arc::new(RecordingSpeech::new());
        let orchestrator = Orchestrator::new(
            Arc::clone(&store) as Arc<dyn StateStore>,
            Arc::clone(&language) as Arc<dyn LanguageService>,
            Arc::clone(&speech) as Arc<dyn SpeechOutput>,
            &config,
        );
        Harness {
            orchestrator,
            language,
            speech,
            store,
        }
    }

    fn seeded_store(messages: &[Message], memories: &[Memory]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        save_collection(store.as_ref(), NAMESPACE_MESSAGES, messages).unwrap();
        save_collection(store.as_ref(), NAMESPACE_MEMORIES, memories).unwrap();
        store
    }

    /// Let spawned timer tasks run to completion on the paused clock.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    // ---- Turn processing ----

    #[tokio::test]
    async fn test_turn_appends_user_then_reply_in_order() {
        let h = harness();
        h.language.push_reply("Nice to meet you!");

        let reply = h.orchestrator.send_text("hello").await.unwrap();
        assert_eq!(reply.text, "Nice to meet you!");

        let messages = h.orchestrator.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[1].role, Role::Model);
        assert_eq!(messages[1].id, reply.id);
    }

    #[tokio::test]
    async fn test_transcript_stays_chronological_over_turns() {
        let h = harness();
        for i in 0..5 {
            h.language.push_reply(format!("reply {}", i));
            h.orchestrator.send_text(&format!("turn {}", i)).await.unwrap();
        }

        let messages = h.orchestrator.messages();
        assert_eq!(messages.len(), 10);
        for pair in messages.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        // Alternating roles: user, model, user, model, ...
        for (i, message) in messages.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Model };
            assert_eq!(message.role, expected);
        }
    }

    #[tokio::test]
    async fn test_empty_and_whitespace_input_rejected() {
        let h = harness();
        assert!(matches!(
            h.orchestrator.send_text("").await,
            Err(ChatError::EmptyMessage)
        ));
        assert!(matches!(
            h.orchestrator.send_text("   \n\t").await,
            Err(ChatError::EmptyMessage)
        ));
        assert!(h.orchestrator.messages().is_empty());
        assert_eq!(h.language.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_input_is_trimmed() {
        let h = harness();
        h.orchestrator.send_text("  hello  ").await.unwrap();
        assert_eq!(h.orchestrator.messages()[0].text, "hello");
    }

    #[tokio::test]
    async fn test_user_message_cancels_ongoing_speech() {
        let h = harness();
        h.orchestrator.send_text("hi").await.unwrap();
        assert_eq!(h.speech.cancel_count(), 1);
    }

    // ---- Reply pipeline ----

    #[tokio::test]
    async fn test_successful_reply_is_spoken() {
        let h = harness();
        h.language.push_reply("hello there");
        h.orchestrator.send_text("hi").await.unwrap();
        assert_eq!(h.speech.spoken(), vec!["hello there"]);
    }

    #[tokio::test]
    async fn test_muted_reply_is_not_spoken() {
        let h = harness();
        h.orchestrator.set_muted(true);
        h.language.push_reply("quiet reply");
        h.orchestrator.send_text("hi").await.unwrap();
        assert!(h.speech.spoken().is_empty());
    }

    #[tokio::test]
    async fn test_reply_failure_appends_exactly_one_apology() {
        let h = harness();
        h.language.push_reply_error("model melted");

        let reply = h.orchestrator.send_text("hi").await.unwrap();
        assert!(reply
            .text
            .starts_with("I'm having a little trouble connecting to my brain"));
        assert!(reply.text.contains("model melted"));

        // Exactly one assistant message: never zero, never two.
        let messages = h.orchestrator.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Model);
        // The apology is not auto-spoken.
        assert!(h.speech.spoken().is_empty());
    }

    #[tokio::test]
    async fn test_reply_context_is_truncated_to_last_ten() {
        let mut seed = Vec::new();
        for i in 0..25 {
            seed.push(Message::user(format!("old {}", i)));
        }
        let store = seeded_store(&seed, &[]);
        let h = harness_with(store, NovaConfig::default());

        h.orchestrator.send_text("newest").await.unwrap();

        let context = h.language.last_reply_context().unwrap();
        assert_eq!(context.len(), 10);
        // The most recent pre-turn entries, in order.
        assert_eq!(context[0].text, "old 15");
        assert_eq!(context[9].text, "old 24");
        // The new utterance itself is not part of the history snapshot.
        assert!(context.iter().all(|m| m.text != "newest"));
    }

    #[tokio::test]
    async fn test_reply_sees_pre_turn_transcript_snapshot() {
        let h = harness();
        h.orchestrator.send_text("first").await.unwrap();
        h.orchestrator.send_text("second").await.unwrap();

        // The second turn's context ends at the first turn's reply.
        let context = h.language.last_reply_context().unwrap();
        assert_eq!(context.len(), 2);
        assert_eq!(context[0].text, "first");
        assert_eq!(context[1].role, Role::Model);
    }

    #[tokio::test]
    async fn test_typing_flag_clears_on_success_and_failure() {
        let h = harness();
        h.orchestrator.send_text("one").await.unwrap();
        assert!(!h.orchestrator.is_typing());

        h.language.push_reply_error("down");
        h.orchestrator.send_text("two").await.unwrap();
        assert!(!h.orchestrator.is_typing());
    }

    // ---- Fact pipeline ----

    #[tokio::test]
    async fn test_extracted_fact_becomes_memory() {
        let h = harness();
        h.language.push_fact(Some(ExtractedFact::from_provider(
            "User is allergic to peanuts",
            Some("fact"),
        )));

        h.orchestrator.send_text("I'm allergic to peanuts").await.unwrap();

        let memories = h.orchestrator.memories();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].text, "User is allergic to peanuts");
        assert_eq!(memories[0].category, MemoryCategory::Fact);
        assert_eq!(
            h.orchestrator.take_last_extracted_fact().as_deref(),
            Some("User is allergic to peanuts")
        );
        // Consumed.
        assert!(h.orchestrator.take_last_extracted_fact().is_none());
    }

    #[tokio::test]
    async fn test_memories_presented_most_recent_first() {
        let h = harness();
        h.language
            .push_fact(Some(ExtractedFact::from_provider("first", Some("fact"))));
        h.orchestrator.send_text("a").await.unwrap();
        h.language
            .push_fact(Some(ExtractedFact::from_provider("second", Some("fact"))));
        h.orchestrator.send_text("b").await.unwrap();

        let memories = h.orchestrator.memories();
        assert_eq!(memories[0].text, "second");
        assert_eq!(memories[1].text, "first");
    }

    #[tokio::test]
    async fn test_no_fact_turn_leaves_memory_set_unchanged() {
        let h = harness();
        h.orchestrator.send_text("hello").await.unwrap();
        assert!(h.orchestrator.memories().is_empty());
        assert!(h.orchestrator.take_last_extracted_fact().is_none());
    }

    #[tokio::test]
    async fn test_fact_failure_never_blocks_reply() {
        let h = harness();
        h.language.push_fact_error("extractor offline");
        h.language.push_reply("still here!");

        let reply = h.orchestrator.send_text("hi").await.unwrap();
        assert_eq!(reply.text, "still here!");
        assert!(h.orchestrator.memories().is_empty());
        assert!(!h.orchestrator.is_processing_fact());
    }

    #[tokio::test]
    async fn test_reply_failure_never_blocks_fact() {
        let h = harness();
        h.language.push_fact(Some(ExtractedFact::from_provider(
            "User plays chess",
            Some("preference"),
        )));
        h.language.push_reply_error("no reply for you");

        h.orchestrator.send_text("I play chess daily").await.unwrap();
        let memories = h.orchestrator.memories();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].text, "User plays chess");
    }

    #[tokio::test]
    async fn test_processing_flag_clears_on_all_paths() {
        let h = harness();

        // No fact.
        h.orchestrator.send_text("a").await.unwrap();
        assert!(!h.orchestrator.is_processing_fact());

        // Fact found.
        h.language
            .push_fact(Some(ExtractedFact::from_provider("f", Some("fact"))));
        h.orchestrator.send_text("b").await.unwrap();
        assert!(!h.orchestrator.is_processing_fact());

        // Extraction error.
        h.language.push_fact_error("broken");
        h.orchestrator.send_text("c").await.unwrap();
        assert!(!h.orchestrator.is_processing_fact());
    }

    // ---- Audio turns ----

    #[tokio::test]
    async fn test_audio_turn_is_transcribed_and_flagged() {
        let h = harness();
        h.language.push_transcription("I said this out loud");
        h.language.push_reply("heard you");

        let reply = h.orchestrator.send_audio(&[1, 2, 3]).await.unwrap();
        assert_eq!(reply.unwrap().text, "heard you");

        let messages = h.orchestrator.messages();
        assert_eq!(messages[0].text, "I said this out loud");
        assert!(messages[0].is_audio);
    }

    #[tokio::test]
    async fn test_whitespace_transcription_is_ignored() {
        let h = harness();
        h.language.push_transcription("   \n");

        let result = h.orchestrator.send_audio(&[9]).await.unwrap();
        assert!(result.is_none());
        assert!(h.orchestrator.messages().is_empty());
        assert_eq!(h.language.reply_calls(), 0);
    }

    #[tokio::test]
    async fn test_transcription_failure_is_user_actionable() {
        let h = harness();
        h.language.push_transcription_error("couldn't hear that");

        let err = h.orchestrator.send_audio(&[7]).await.unwrap_err();
        assert!(matches!(err, ChatError::Transcription(_)));
        assert!(err.to_string().contains("couldn't hear that"));
        assert!(h.orchestrator.messages().is_empty());
    }

    // ---- Persistence ----

    #[tokio::test]
    async fn test_state_survives_engine_restart() {
        let store = Arc::new(MemoryStore::new());
        {
            let h = harness_with(Arc::clone(&store), NovaConfig::default());
            h.language
                .push_fact(Some(ExtractedFact::from_provider("f", Some("fact"))));
            h.orchestrator.send_text("remember me").await.unwrap();
        }

        let h = harness_with(store, NovaConfig::default());
        assert_eq!(h.orchestrator.messages().len(), 2);
        assert_eq!(h.orchestrator.memories().len(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_is_nonfatal() {
        let h = harness();
        h.store.fail_saves(true);

        let reply = h.orchestrator.send_text("still works").await.unwrap();
        assert!(!reply.text.is_empty());
        assert_eq!(h.orchestrator.messages().len(), 2);
    }

    // ---- Backup export/import ----

    #[tokio::test]
    async fn test_export_is_pure_and_versioned() {
        let h = harness();
        h.orchestrator.send_text("hi").await.unwrap();

        let before = h.orchestrator.messages();
        let doc = h.orchestrator.export_backup();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.messages, before);
        // Export touched nothing.
        assert_eq!(h.orchestrator.messages(), before);
    }

    #[tokio::test]
    async fn test_export_import_round_trip_is_idempotent() {
        let h = harness();
        h.language.push_fact(Some(ExtractedFact::from_provider(
            "User speaks French",
            Some("fact"),
        )));
        h.orchestrator.send_text("je parle francais").await.unwrap();

        let doc = h.orchestrator.export_backup();
        let json = doc.to_json().unwrap();

        // Restore into a fresh engine.
        let other = harness();
        let pending = other.orchestrator.prepare_import(&json).unwrap();
        other.orchestrator.apply_import(pending);

        assert_eq!(other.orchestrator.messages(), h.orchestrator.messages());
        assert_eq!(other.orchestrator.memories(), h.orchestrator.memories());
    }

    #[tokio::test]
    async fn test_import_wrong_version_leaves_state_untouched() {
        let h = harness();
        h.orchestrator.send_text("precious state").await.unwrap();
        let before_messages = h.store.load(NAMESPACE_MESSAGES).unwrap();
        let before_memories = h.store.load(NAMESPACE_MEMORIES).unwrap();

        let err = h
            .orchestrator
            .prepare_import(r#"{"version": 3, "memories": [], "messages": []}"#)
            .unwrap_err();
        assert!(err.to_string().contains("3"));

        // Byte-for-byte unchanged.
        assert_eq!(h.store.load(NAMESPACE_MESSAGES).unwrap(), before_messages);
        assert_eq!(h.store.load(NAMESPACE_MEMORIES).unwrap(), before_memories);
    }

    #[tokio::test]
    async fn test_import_missing_collections_leaves_state_untouched() {
        let h = harness();
        h.orchestrator.send_text("precious state").await.unwrap();
        let before = h.orchestrator.messages();

        let err = h
            .orchestrator
            .prepare_import(r#"{"version": 1, "messages": []}"#)
            .unwrap_err();
        assert!(matches!(err, BackupError::MissingCollections));
        assert_eq!(h.orchestrator.messages(), before);
    }

    #[tokio::test]
    async fn test_import_dismissed_leaves_state_untouched() {
        let h = harness();
        h.orchestrator.send_text("keep me").await.unwrap();
        let before = h.orchestrator.messages();

        let incoming = BackupDocument::snapshot(vec![], vec![Message::user("intruder")]);
        let pending = h
            .orchestrator
            .prepare_import(&incoming.to_json().unwrap())
            .unwrap();
        assert_eq!(
            pending.confirmation_prompt(),
            "Found 0 memories and 1 messages. Overwrite current brain?"
        );
        // Negative confirmation: drop the pending import.
        drop(pending);

        assert_eq!(h.orchestrator.messages(), before);
    }

    #[tokio::test]
    async fn test_import_confirmed_replaces_both_collections() {
        let h = harness();
        h.orchestrator.send_text("will be replaced").await.unwrap();

        let incoming = BackupDocument::snapshot(
            vec![Memory::new("imported fact", MemoryCategory::History)],
            vec![Message::user("imported message")],
        );
        let mut events = h.orchestrator.subscribe();

        let pending = h
            .orchestrator
            .prepare_import(&incoming.to_json().unwrap())
            .unwrap();
        let (memory_count, message_count) = h.orchestrator.apply_import(pending);
        assert_eq!((memory_count, message_count), (1, 1));

        assert_eq!(h.orchestrator.messages(), incoming.messages);
        assert_eq!(h.orchestrator.memories(), incoming.memories);

        // Import is also durable immediately.
        let reloaded = harness_with(Arc::clone(&h.store), NovaConfig::default());
        assert_eq!(reloaded.orchestrator.messages(), incoming.messages);

        let mut saw_import_event = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, DomainEvent::BackupImported { .. }) {
                saw_import_event = true;
            }
        }
        assert!(saw_import_event);
    }

    // ---- Bootstrap ----

    #[tokio::test]
    async fn test_bootstrap_first_run_injects_fixed_greeting() {
        let h = harness();
        let outcome = h.orchestrator.bootstrap().await;
        assert_eq!(outcome, BootstrapOutcome::FirstRun);

        let messages = h.orchestrator.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Model);
        assert_eq!(messages[0].text, FIRST_RUN_GREETING);
        // No Language Service call was made.
        assert_eq!(h.language.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_recent_transcript_is_noop() {
        let mut last = Message::user("ten minutes ago");
        last.timestamp = Utc::now() - chrono::Duration::minutes(10);
        let store = seeded_store(&[last], &[]);

        let h = harness_with(store, NovaConfig::default());
        let outcome = h.orchestrator.bootstrap().await;
        assert_eq!(outcome, BootstrapOutcome::Resumed);
        assert_eq!(h.orchestrator.messages().len(), 1);
        assert_eq!(h.language.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_long_gap_generates_welcome() {
        let mut last = Message::model("two hours ago");
        last.timestamp = Utc::now() - chrono::Duration::hours(2);
        let store = seeded_store(&[last], &[]);

        let h = harness_with(store, NovaConfig::default());
        h.language.push_welcome("Good to see you again!");

        let outcome = h.orchestrator.bootstrap().await;
        assert_eq!(outcome, BootstrapOutcome::WelcomeBack);
        assert_eq!(h.language.welcome_calls(), 1);

        let messages = h.orchestrator.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "Good to see you again!");
        // The welcome is auto-spoken.
        assert_eq!(h.speech.spoken(), vec!["Good to see you again!"]);
    }

    #[tokio::test]
    async fn test_bootstrap_welcome_failure_is_swallowed() {
        let mut last = Message::model("long ago");
        last.timestamp = Utc::now() - chrono::Duration::hours(5);
        let store = seeded_store(&[last], &[]);

        let h = harness_with(store, NovaConfig::default());
        h.language.push_welcome_error("provider down");

        let outcome = h.orchestrator.bootstrap().await;
        assert_eq!(outcome, BootstrapOutcome::Resumed);
        assert_eq!(h.orchestrator.messages().len(), 1);
    }

    // ---- Re-engagement scheduler ----

    fn user_last_store() -> Arc<MemoryStore> {
        let mut recent = Message::user("are you there?");
        recent.timestamp = Utc::now() - chrono::Duration::minutes(1);
        seeded_store(&[recent], &[])
    }

    #[tokio::test(start_paused = true)]
    async fn test_nudge_fires_after_quiet_period_when_user_spoke_last() {
        let h = harness_with(user_last_store(), NovaConfig::default());
        h.language.push_question("What's your favorite season?");

        h.orchestrator.bootstrap().await;
        assert!(h.orchestrator.is_reengagement_armed());

        // Let the spawned timer task register its deadline on the paused
        // clock before advancing, otherwise the sleep arms past the jump.
        settle().await;
        tokio::time::advance(Duration::from_secs(121)).await;
        settle().await;

        assert_eq!(h.language.question_calls(), 1);
        let messages = h.orchestrator.messages();
        assert_eq!(messages.last().map(|m| m.role), Some(Role::Model));
        assert_eq!(
            messages.last().map(|m| m.text.as_str()),
            Some("What's your favorite season?")
        );
        assert_eq!(h.speech.spoken(), vec!["What's your favorite season?"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nudge_fires_at_most_once_per_quiet_period() {
        let h = harness_with(user_last_store(), NovaConfig::default());
        h.orchestrator.bootstrap().await;

        // Register the armed timer on the paused clock before advancing.
        settle().await;
        tokio::time::advance(Duration::from_secs(121)).await;
        settle().await;
        assert_eq!(h.language.question_calls(), 1);

        // The nudge made the assistant the last speaker, so the scheduler
        // is disarmed until the user speaks again.
        assert!(!h.orchestrator.is_reengagement_armed());
        tokio::time::advance(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(h.language.question_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_nudge_when_assistant_spoke_last() {
        let h = harness();
        h.orchestrator.bootstrap().await; // Greeting: assistant spoke last.
        h.orchestrator.send_text("hi").await.unwrap(); // Reply appended last.

        assert!(!h.orchestrator.is_reengagement_armed());
        tokio::time::advance(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(h.language.question_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_restarts_the_countdown() {
        let h = harness_with(user_last_store(), NovaConfig::default());
        h.orchestrator.bootstrap().await;

        // Register the armed timer on the paused clock before advancing.
        settle().await;
        // Halfway through the quiet period, state changes (an import with
        // the user still last) restart the countdown.
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        let doc = h.orchestrator.export_backup();
        let pending = h
            .orchestrator
            .prepare_import(&doc.to_json().unwrap())
            .unwrap();
        h.orchestrator.apply_import(pending);
        // Let the restarted timer register before advancing again.
        settle().await;

        // The original deadline passes without a fire.
        tokio::time::advance(Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(h.language.question_calls(), 0);

        // The restarted countdown elapses.
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(h.language.question_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_muted_nudge_is_not_spoken() {
        let h = harness_with(user_last_store(), NovaConfig::default());
        h.orchestrator.set_muted(true);
        h.orchestrator.bootstrap().await;

        // Register the armed timer on the paused clock before advancing.
        settle().await;
        tokio::time::advance(Duration::from_secs(121)).await;
        settle().await;
        assert_eq!(h.language.question_calls(), 1);
        assert!(h.speech.spoken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nudge_failure_is_swallowed() {
        let h = harness_with(user_last_store(), NovaConfig::default());
        h.language.push_question_error("no question today");
        h.orchestrator.bootstrap().await;

        let before = h.orchestrator.messages();
        tokio::time::advance(Duration::from_secs(121)).await;
        settle().await;
        assert_eq!(h.orchestrator.messages(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_disarms_scheduler() {
        let h = harness_with(user_last_store(), NovaConfig::default());
        h.orchestrator.bootstrap().await;
        assert!(h.orchestrator.is_reengagement_armed());

        h.orchestrator.shutdown();
        tokio::time::advance(Duration::from_secs(600)).await;
        settle().await;
        assert_eq!(h.language.question_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nudge_emits_event() {
        let h = harness_with(user_last_store(), NovaConfig::default());
        let mut events = h.orchestrator.subscribe();
        h.orchestrator.bootstrap().await;

        // Register the armed timer on the paused clock before advancing.
        settle().await;
        tokio::time::advance(Duration::from_secs(121)).await;
        settle().await;

        let mut saw_nudge = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, DomainEvent::NudgeFired { .. }) {
                saw_nudge = true;
            }
        }
        assert!(saw_nudge);
    }

    // ---- Events ----

    #[tokio::test]
    async fn test_turn_emits_observable_event_sequence() {
        let h = harness();
        let mut events = h.orchestrator.subscribe();
        h.language.push_fact(Some(ExtractedFact::from_provider(
            "User has a dog",
            Some("fact"),
        )));
        h.orchestrator.send_text("my dog says hi").await.unwrap();

        let mut names = Vec::new();
        while let Ok(event) = events.try_recv() {
            names.push(event.event_name());
        }

        assert_eq!(names.iter().filter(|n| **n == "message_appended").count(), 2);
        assert!(names.contains(&"memory_extracted"));
        // Typing toggled on and off.
        assert_eq!(names.iter().filter(|n| **n == "typing_changed").count(), 2);
        assert_eq!(
            names.iter().filter(|n| **n == "fact_processing_changed").count(),
            2
        );
        // The user append is observable before the model append.
        let first_append = names.iter().position(|n| *n == "message_appended");
        assert_eq!(first_append, Some(0));
    }

    // ---- Mute toggling ----

    #[tokio::test]
    async fn test_muting_cancels_ongoing_speech() {
        let h = harness();
        assert!(!h.orchestrator.is_muted());
        h.orchestrator.set_muted(true);
        assert!(h.orchestrator.is_muted());
        assert_eq!(h.speech.cancel_count(), 1);

        // Unmuting does not cancel.
        h.orchestrator.set_muted(false);
        assert_eq!(h.speech.cancel_count(), 1);
    }

    #[tokio::test]
    async fn test_muted_config_is_honored() {
        let mut config = NovaConfig::default();
        config.speech.muted = true;
        let h = harness_with(Arc::new(MemoryStore::new()), config);
        assert!(h.orchestrator.is_muted());
    }
}
