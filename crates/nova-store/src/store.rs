//! The persistent store port and its implementations.
//!
//! The orchestrator persists each collection as one JSON document per
//! namespace, rewritten in full on every mutation (write-through). Store
//! failures are surfaced to the caller, which treats them as warnings and
//! keeps serving from in-memory state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::Database;

/// Namespace for the chat transcript document.
pub const NAMESPACE_MESSAGES: &str = "messages";
/// Namespace for the memory-set document.
pub const NAMESPACE_MEMORIES: &str = "memories";

/// Errors from the persistent store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable key-value persistence of namespaced JSON documents.
///
/// `load` returns `None` when the namespace has never been written.
pub trait StateStore: Send + Sync {
    /// Load the document stored under `namespace`, if any.
    fn load(&self, namespace: &str) -> Result<Option<String>, StoreError>;

    /// Replace the document stored under `namespace`.
    fn save(&self, namespace: &str, document: &str) -> Result<(), StoreError>;
}

/// Deserialize a stored collection, `None` when the namespace is absent.
///
/// Timestamps revive at full instant precision (RFC 3339 round-trip).
pub fn load_collection<T: DeserializeOwned>(
    store: &dyn StateStore,
    namespace: &str,
) -> Result<Option<Vec<T>>, StoreError> {
    match store.load(namespace)? {
        Some(document) => Ok(Some(serde_json::from_str(&document)?)),
        None => Ok(None),
    }
}

/// Serialize and persist a full collection under `namespace`.
pub fn save_collection<T: Serialize>(
    store: &dyn StateStore,
    namespace: &str,
    items: &[T],
) -> Result<(), StoreError> {
    let document = serde_json::to_string(items)?;
    store.save(namespace, &document)
}

// =============================================================================
// SqliteStore
// =============================================================================

/// SQLite-backed store: one row per namespace in the `documents` table.
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl StateStore for SqliteStore {
    fn load(&self, namespace: &str) -> Result<Option<String>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT body FROM documents WHERE namespace = ?1")
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let mut rows = stmt
                .query(rusqlite::params![namespace])
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            match rows.next().map_err(|e| StoreError::Backend(e.to_string()))? {
                Some(row) => {
                    let body: String = row.get(0).map_err(|e| StoreError::Backend(e.to_string()))?;
                    Ok(Some(body))
                }
                None => Ok(None),
            }
        })
    }

    fn save(&self, namespace: &str, document: &str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (namespace, body, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(namespace) DO UPDATE SET body = ?2, updated_at = ?3",
                rusqlite::params![namespace, document, chrono::Utc::now().timestamp()],
            )
            .map_err(|e| StoreError::Backend(format!("Failed to save document: {}", e)))?;
            Ok(())
        })
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, String>>,
    fail_saves: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail (persistence-warning path testing).
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

impl StateStore for MemoryStore {
    fn load(&self, namespace: &str) -> Result<Option<String>, StoreError> {
        let documents = self
            .documents
            .lock()
            .map_err(|e| StoreError::Backend(format!("store lock poisoned: {}", e)))?;
        Ok(documents.get(namespace).cloned())
    }

    fn save(&self, namespace: &str, document: &str) -> Result<(), StoreError> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated save failure".to_string()));
        }
        let mut documents = self
            .documents
            .lock()
            .map_err(|e| StoreError::Backend(format!("store lock poisoned: {}", e)))?;
        documents.insert(namespace.to_string(), document.to_string());
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
