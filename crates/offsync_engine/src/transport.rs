//! Remote transport abstraction for sync operations.

use crate::error::{EngineError, EngineResult};
use offsync_protocol::RemoteRecord;
use offsync_store::now_ms;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// A remote transport handles communication with the sync endpoint.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, mock for testing, etc.). Calls block; they are
/// the engine's only suspension points.
pub trait RemoteTransport: Send + Sync {
    /// Creates an entity on the remote endpoint.
    fn create(&self, entity_type: &str, entity_id: &str, payload: &[u8]) -> EngineResult<()>;

    /// Updates an entity on the remote endpoint.
    fn update(&self, entity_type: &str, entity_id: &str, payload: &[u8]) -> EngineResult<()>;

    /// Deletes an entity from the remote endpoint.
    fn delete(&self, entity_type: &str, entity_id: &str) -> EngineResult<()>;

    /// Fetches the server-observed version of an entity, or `None` if
    /// the remote endpoint does not know it.
    fn fetch(&self, entity_type: &str, entity_id: &str) -> EngineResult<Option<RemoteRecord>>;
}

/// A mock transport for testing.
///
/// Keeps an in-memory map of remote records, captures every call in
/// order, and can inject failures or latency.
#[derive(Default)]
pub struct MockTransport {
    remote: RwLock<HashMap<(String, String), RemoteRecord>>,
    calls: Mutex<Vec<String>>,
    fail_remaining: AtomicU32,
    fail_always: AtomicBool,
    delay: RwLock<Option<Duration>>,
}

impl MockTransport {
    /// Creates a new mock transport with an empty remote state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the server-observed version of an entity.
    pub fn seed_remote(&self, entity_type: &str, entity_id: &str, record: RemoteRecord) {
        self.remote
            .write()
            .insert((entity_type.to_string(), entity_id.to_string()), record);
    }

    /// Returns the server-observed version of an entity, if any.
    pub fn remote_record(&self, entity_type: &str, entity_id: &str) -> Option<RemoteRecord> {
        self.remote
            .read()
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .cloned()
    }

    /// Returns all captured calls in order, e.g. `"create tasks/t1"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Makes the next `n` mutating calls fail.
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Makes every mutating call fail until reset.
    pub fn set_fail_always(&self, fail: bool) {
        self.fail_always.store(fail, Ordering::SeqCst);
    }

    /// Adds artificial latency to every call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write() = Some(delay);
    }

    fn observe(&self, call: String) {
        if let Some(delay) = *self.delay.read() {
            std::thread::sleep(delay);
        }
        self.calls.lock().push(call);
    }

    fn should_fail(&self) -> bool {
        if self.fail_always.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn mutate(
        &self,
        call: String,
        entity_type: &str,
        entity_id: &str,
        payload: Option<&[u8]>,
    ) -> EngineResult<()> {
        self.observe(call);
        if self.should_fail() {
            return Err(EngineError::remote_retryable("injected failure"));
        }

        let key = (entity_type.to_string(), entity_id.to_string());
        match payload {
            Some(payload) => {
                self.remote
                    .write()
                    .insert(key, RemoteRecord::new(payload.to_vec(), now_ms()));
            }
            None => {
                self.remote.write().remove(&key);
            }
        }
        Ok(())
    }
}

impl RemoteTransport for MockTransport {
    fn create(&self, entity_type: &str, entity_id: &str, payload: &[u8]) -> EngineResult<()> {
        self.mutate(
            format!("create {entity_type}/{entity_id}"),
            entity_type,
            entity_id,
            Some(payload),
        )
    }

    fn update(&self, entity_type: &str, entity_id: &str, payload: &[u8]) -> EngineResult<()> {
        self.mutate(
            format!("update {entity_type}/{entity_id}"),
            entity_type,
            entity_id,
            Some(payload),
        )
    }

    fn delete(&self, entity_type: &str, entity_id: &str) -> EngineResult<()> {
        self.mutate(
            format!("delete {entity_type}/{entity_id}"),
            entity_type,
            entity_id,
            None,
        )
    }

    fn fetch(&self, entity_type: &str, entity_id: &str) -> EngineResult<Option<RemoteRecord>> {
        self.observe(format!("fetch {entity_type}/{entity_id}"));
        Ok(self.remote_record(entity_type, entity_id))
    }
}
