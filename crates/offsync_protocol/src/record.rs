//! Offline records: locally persisted entity snapshots.

use serde::{Deserialize, Serialize};

/// Logical timestamp in milliseconds.
pub type Timestamp = u64;

/// Fixed per-record overhead used for storage budget accounting,
/// covering the metadata fields alongside key and payload bytes.
const RECORD_OVERHEAD_BYTES: usize = 64;

/// Identifies a record: one entity of a given type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Entity type, e.g. `"projects"` or `"tasks"`.
    pub entity_type: String,
    /// Entity ID within the type.
    pub entity_id: String,
}

impl RecordKey {
    /// Creates a new record key.
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}

/// Synchronization status of an offline record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local changes not yet confirmed against the remote system.
    Pending,
    /// Local and remote versions are known to match.
    Synced,
    /// Local and remote versions have diverged; awaiting arbitration.
    Conflict,
    /// The last attempt to reconcile this record failed.
    Error,
}

/// A locally persisted snapshot of a domain entity.
///
/// The payload is an opaque blob; the engine only interprets it when
/// merging under the merge conflict policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineRecord {
    /// Record key.
    pub key: RecordKey,
    /// Opaque entity payload.
    pub payload: Vec<u8>,
    /// Monotonic version, bumped on every local write.
    pub version: u64,
    /// Synchronization status.
    pub sync_status: SyncStatus,
    /// When the record was first stored.
    pub created_at: Timestamp,
    /// When the record was last modified. Never decreases.
    pub last_modified: Timestamp,
}

impl OfflineRecord {
    /// Creates a fresh pending record.
    pub fn new(key: RecordKey, payload: Vec<u8>, now: Timestamp) -> Self {
        Self {
            key,
            payload,
            version: 1,
            sync_status: SyncStatus::Pending,
            created_at: now,
            last_modified: now,
        }
    }

    /// Returns true if the record needs no synchronization.
    pub fn is_synced(&self) -> bool {
        self.sync_status == SyncStatus::Synced
    }

    /// Approximate storage footprint in bytes, used for budget accounting.
    pub fn approximate_size(&self) -> usize {
        self.payload.len()
            + self.key.entity_type.len()
            + self.key.entity_id.len()
            + RECORD_OVERHEAD_BYTES
    }
}
