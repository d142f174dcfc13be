//! State backend trait definition.

use crate::error::StoreResult;

/// A keyed-blob persistence backend for offsync.
///
/// Backends are **opaque blob stores**: each named collection maps to one
/// serialized blob, written and read whole. The store owns all format
/// interpretation - backends do not understand records or queue entries.
///
/// # Invariants
///
/// - `load` returns exactly the bytes previously saved for that collection
/// - `save` atomically replaces the collection's previous contents
/// - `flush` ensures all saved data is durable
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing and ephemeral engines
/// - [`super::FileBackend`] - For persistent storage
/// - [`super::CodecBackend`] - Wrapper applying a payload codec
pub trait StateBackend: Send + Sync {
    /// Loads the blob for a collection, or `None` if never saved.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn load(&self, collection: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replaces the blob for a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn save(&self, collection: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Removes a collection. Removing an absent collection is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn remove(&self, collection: &str) -> StoreResult<()>;

    /// Flushes all pending writes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> StoreResult<()>;
}
