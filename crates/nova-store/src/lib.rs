//! Durable key-value persistence for Nova session state.
//!
//! Two namespaced JSON documents ("messages" and "memories") survive process
//! restarts with no expiry. The SQLite backend is the production store; an
//! in-memory map backs tests and ephemeral sessions.

pub mod db;
pub mod store;

pub use db::Database;
pub use store::{
    load_collection, save_collection, MemoryStore, SqliteStore, StateStore, StoreError,
    NAMESPACE_MEMORIES, NAMESPACE_MESSAGES,
};
