//! Session state: the transcript, the memory set, and transient flags.
//!
//! Owned exclusively by the orchestrator; everything else observes
//! snapshots. Every mutation of either collection is immediately followed by
//! a full re-serialization to the store (write-through), so an abrupt
//! termination loses at most an in-flight pipeline result.

use std::sync::Arc;

use nova_core::types::{Memory, Message, Role};
use nova_store::{
    load_collection, save_collection, StateStore, NAMESPACE_MEMORIES, NAMESPACE_MESSAGES,
};
use tracing::warn;

/// In-memory session state with write-through persistence.
pub struct SessionState {
    messages: Vec<Message>,
    memories: Vec<Memory>,
    typing: bool,
    processing_fact: bool,
    last_extracted_fact: Option<String>,
    store: Arc<dyn StateStore>,
}

impl SessionState {
    /// Restore state from the store.
    ///
    /// A load failure yields an empty collection, never a crash
    /// (persistence-warning policy).
    pub fn load(store: Arc<dyn StateStore>) -> Self {
        let messages = match load_collection::<Message>(store.as_ref(), NAMESPACE_MESSAGES) {
            Ok(Some(messages)) => messages,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load transcript, starting empty");
                Vec::new()
            }
        };
        let memories = match load_collection::<Memory>(store.as_ref(), NAMESPACE_MEMORIES) {
            Ok(Some(memories)) => memories,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load memory set, starting empty");
                Vec::new()
            }
        };

        Self {
            messages,
            memories,
            typing: false,
            processing_fact: false,
            last_extracted_fact: None,
            store,
        }
    }

    /// Transcript in insertion (chronological) order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Memory set in insertion order.
    pub fn memories(&self) -> &[Memory] {
        &self.memories
    }

    /// Memory set for presentation: most recent first.
    pub fn memories_recent_first(&self) -> Vec<Memory> {
        self.memories.iter().rev().cloned().collect()
    }

    /// The newest transcript entry, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Role of the newest transcript entry.
    pub fn last_role(&self) -> Option<Role> {
        self.messages.last().map(|m| m.role)
    }

    pub fn typing(&self) -> bool {
        self.typing
    }

    pub fn processing_fact(&self) -> bool {
        self.processing_fact
    }

    /// Append a message and persist the transcript.
    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
        self.persist_messages();
    }

    /// Append a memory and persist the memory set.
    pub fn append_memory(&mut self, memory: Memory) {
        self.memories.push(memory);
        self.persist_memories();
    }

    /// Atomically replace both collections (backup import) and persist.
    pub fn replace_all(&mut self, memories: Vec<Memory>, messages: Vec<Message>) {
        self.memories = memories;
        self.messages = messages;
        self.persist_memories();
        self.persist_messages();
    }

    /// Set the typing flag, returning true when the value changed.
    pub fn set_typing(&mut self, typing: bool) -> bool {
        let changed = self.typing != typing;
        self.typing = typing;
        changed
    }

    /// Set the fact-processing flag, returning true when the value changed.
    pub fn set_processing_fact(&mut self, processing: bool) -> bool {
        let changed = self.processing_fact != processing;
        self.processing_fact = processing;
        changed
    }

    /// Record the text of the most recently extracted fact (drives the
    /// "new memory" notification surface).
    pub fn set_last_extracted_fact(&mut self, fact: String) {
        self.last_extracted_fact = Some(fact);
    }

    /// Consume the most recently extracted fact notification.
    pub fn take_last_extracted_fact(&mut self) -> Option<String> {
        self.last_extracted_fact.take()
    }

    fn persist_messages(&self) {
        if let Err(e) = save_collection(self.store.as_ref(), NAMESPACE_MESSAGES, &self.messages) {
            // Non-fatal: in-memory state stays authoritative.
            warn!(error = %e, "Failed to persist transcript");
        }
    }

    fn persist_memories(&self) {
        if let Err(e) = save_collection(self.store.as_ref(), NAMESPACE_MEMORIES, &self.memories) {
            warn!(error = %e, "Failed to persist memory set");
        }
    }
}
