//! In-memory state backend for testing.

use crate::backend::StateBackend;
use crate::error::StoreResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory state backend.
///
/// This backend stores all collections in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral engines that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    collections: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of a collection's bytes.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<Vec<u8>> {
        self.collections.read().get(name).cloned()
    }

    /// Clears all collections.
    pub fn clear(&self) {
        self.collections.write().clear();
    }
}

impl StateBackend for InMemoryBackend {
    fn load(&self, collection: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.collections.read().get(collection).cloned())
    }

    fn save(&self, collection: &str, bytes: &[u8]) -> StoreResult<()> {
        self.collections
            .write()
            .insert(collection.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, collection: &str) -> StoreResult<()> {
        self.collections.write().remove(collection);
        Ok(())
    }

    fn flush(&self) -> StoreResult<()> {
        // In-memory backend has no pending writes
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.load("records").unwrap(), None);
    }

    #[test]
    fn memory_save_and_load() {
        let backend = InMemoryBackend::new();
        backend.save("records", b"hello").unwrap();
        assert_eq!(backend.load("records").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn memory_save_replaces() {
        let backend = InMemoryBackend::new();
        backend.save("records", b"one").unwrap();
        backend.save("records", b"two").unwrap();
        assert_eq!(backend.load("records").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn memory_collections_are_independent() {
        let backend = InMemoryBackend::new();
        backend.save("records", b"r").unwrap();
        backend.save("queue", b"q").unwrap();
        assert_eq!(backend.load("records").unwrap(), Some(b"r".to_vec()));
        assert_eq!(backend.load("queue").unwrap(), Some(b"q".to_vec()));
    }

    #[test]
    fn memory_remove_is_idempotent() {
        let backend = InMemoryBackend::new();
        backend.save("records", b"r").unwrap();
        backend.remove("records").unwrap();
        assert_eq!(backend.load("records").unwrap(), None);
        backend.remove("records").unwrap();
    }

    #[test]
    fn memory_flush_succeeds() {
        let backend = InMemoryBackend::new();
        backend.save("records", b"r").unwrap();
        assert!(backend.flush().is_ok());
    }
}
