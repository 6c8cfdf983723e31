//! Shared foundation for the Nova companion engine.
//!
//! Defines the domain types (messages, memories, categories), the top-level
//! error type, domain events consumed by observers, and TOML configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::NovaConfig;
pub use error::{NovaError, Result};
pub use events::DomainEvent;
pub use types::{Memory, MemoryCategory, Message, Role};
