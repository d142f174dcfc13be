//! Payload codec hook for compression or encryption at rest.

use crate::backend::StateBackend;
use crate::error::StoreResult;

/// Transforms collection blobs on their way to and from a backend.
///
/// The default [`IdentityCodec`] passes bytes through unchanged; a real
/// compression or encryption codec can be substituted without touching
/// store logic.
pub trait PayloadCodec: Send + Sync {
    /// Encodes bytes before they are persisted.
    fn encode(&self, bytes: &[u8]) -> StoreResult<Vec<u8>>;

    /// Decodes bytes after they are loaded.
    fn decode(&self, bytes: &[u8]) -> StoreResult<Vec<u8>>;
}

/// The pass-through codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl PayloadCodec for IdentityCodec {
    fn encode(&self, bytes: &[u8]) -> StoreResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// A backend wrapper that applies a codec to every collection blob.
///
/// Mirrors the layering of an encrypting storage wrapper: the inner
/// backend only ever sees encoded bytes.
pub struct CodecBackend<B: StateBackend, C: PayloadCodec> {
    inner: B,
    codec: C,
}

impl<B: StateBackend, C: PayloadCodec> CodecBackend<B, C> {
    /// Wraps a backend with the given codec.
    pub fn new(inner: B, codec: C) -> Self {
        Self { inner, codec }
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B: StateBackend, C: PayloadCodec> StateBackend for CodecBackend<B, C> {
    fn load(&self, collection: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.inner.load(collection)? {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, collection: &str, bytes: &[u8]) -> StoreResult<()> {
        let encoded = self.codec.encode(bytes)?;
        self.inner.save(collection, &encoded)
    }

    fn remove(&self, collection: &str) -> StoreResult<()> {
        self.inner.remove(collection)
    }

    fn flush(&self) -> StoreResult<()> {
        self.inner.flush()
    }
}
