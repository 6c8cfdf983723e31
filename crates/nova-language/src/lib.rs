//! Language Service boundary for the Nova engine.
//!
//! The orchestrator only ever talks to the [`LanguageService`] trait; the
//! actual provider (prompting, model selection, transport) lives behind it.
//! `ScriptedLanguageService` is the deterministic implementation used by
//! tests and the offline binary.

pub mod scripted;
pub mod service;
pub mod types;

pub use scripted::ScriptedLanguageService;
pub use service::{LanguageError, LanguageService};
pub use types::ExtractedFact;
