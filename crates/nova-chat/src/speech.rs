//! Speech output boundary.
//!
//! Text-to-speech playback is host plumbing; the engine only needs
//! fire-and-forget `speak`/`cancel`. The orchestrator cancels any ongoing
//! speech whenever the user sends a message and when muting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Sink for spoken assistant output.
pub trait SpeechOutput: Send + Sync {
    /// Start speaking the given text. Must not block.
    fn speak(&self, text: &str);
    /// Stop any ongoing speech.
    fn cancel(&self);
}

/// No-op speech output for headless environments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSpeech;

impl SpeechOutput for NullSpeech {
    fn speak(&self, _text: &str) {}
    fn cancel(&self) {}
}

/// Speech output that records calls instead of producing audio.
///
/// Used by tests to assert what was (or was not) spoken.
#[derive(Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
    cancels: AtomicUsize,
}

impl RecordingSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    /// All texts spoken so far, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Number of times speech was cancelled.
    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl SpeechOutput for RecordingSpeech {
    fn speak(&self, text: &str) {
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}
