use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Who authored a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human user.
    User,
    /// The assistant.
    Model,
}

/// Classification of an extracted memory.
///
/// Closed enumeration; free-form category strings from the Language Service
/// are validated at that boundary via [`MemoryCategory::parse_lenient`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    /// Likes, dislikes, tastes ("hates horror movies").
    Preference,
    /// Stable personal detail ("allergic to peanuts").
    Fact,
    /// Past events or ongoing plans ("training for a marathon").
    History,
    /// Anything that does not fit the above.
    Other,
}

impl MemoryCategory {
    /// Parse a category string from the Language Service.
    ///
    /// Unrecognized values fall back to `Other` rather than failing the
    /// extraction.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "preference" => MemoryCategory::Preference,
            "fact" => MemoryCategory::Fact,
            "history" => MemoryCategory::History,
            _ => MemoryCategory::Other,
        }
    }
}

// =============================================================================
// Entities
// =============================================================================

/// A single transcript entry.
///
/// Immutable once created; the transcript is append-only and insertion order
/// equals chronological order. Wire form is camelCase (`isAudio`) to stay
/// compatible with historical backup documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Opaque unique identifier (UUID v4 in this implementation; imported
    /// documents may carry other formats).
    pub id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// True when the utterance arrived as transcribed audio.
    #[serde(default)]
    pub is_audio: bool,
}

impl Message {
    /// Create a message with a fresh identifier and the current instant.
    pub fn new(role: Role, text: impl Into<String>, is_audio: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
            is_audio,
        }
    }

    /// Create a typed user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text, false)
    }

    /// Create an assistant message.
    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text, false)
    }
}

/// A durable fact about the user, extracted from conversation.
///
/// Immutable and append-only; the core never merges or deduplicates
/// memories — relevance filtering is the Language Service's job at
/// extraction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Opaque unique identifier; see [`Message::id`].
    pub id: String,
    pub text: String,
    pub category: MemoryCategory,
    pub timestamp: DateTime<Utc>,
}

impl Memory {
    /// Create a memory with a fresh identifier and the current instant.
    pub fn new(text: impl Into<String>, category: MemoryCategory) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            category,
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
