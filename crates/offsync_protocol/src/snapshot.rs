//! Export/import snapshot format.

use crate::conflict::ConflictPolicy;
use crate::mutation::QueuedMutation;
use crate::record::{OfflineRecord, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current snapshot format version.
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

/// Errors from snapshot encoding or decoding.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot could not be encoded.
    #[error("snapshot encode failed: {0}")]
    Encode(String),

    /// The snapshot bytes are not a valid snapshot.
    #[error("invalid snapshot: {0}")]
    Invalid(String),

    /// The snapshot was produced by an unsupported format version.
    #[error("unsupported snapshot format version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the snapshot.
        found: u16,
        /// Version this build supports.
        supported: u16,
    },
}

/// Engine configuration as plain snapshot data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Storage budget in bytes.
    pub max_storage_budget_bytes: u64,
    /// Sync cadence in milliseconds.
    pub sync_interval_ms: u64,
    /// Maximum transmission attempts per queue entry.
    pub max_retries: u32,
    /// Whether periodic sync is enabled.
    pub auto_sync_enabled: bool,
    /// Conflict resolution policy.
    pub conflict_policy: ConflictPolicy,
}

/// A full export of engine state: records, queue, and configuration.
///
/// Import fully replaces the current record set and queue; a malformed
/// snapshot fails without partial application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Snapshot format version.
    pub format_version: u16,
    /// When the snapshot was taken.
    pub exported_at: Timestamp,
    /// Engine configuration at export time (diagnostic; not applied on
    /// import).
    pub config: SnapshotConfig,
    /// All offline records.
    pub records: Vec<OfflineRecord>,
    /// All queued mutations in drain order.
    pub queue: Vec<QueuedMutation>,
}

impl EngineSnapshot {
    /// Creates a snapshot of the given state.
    pub fn new(
        exported_at: Timestamp,
        config: SnapshotConfig,
        records: Vec<OfflineRecord>,
        queue: Vec<QueuedMutation>,
    ) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            exported_at,
            config,
            records,
            queue,
        }
    }

    /// Encodes the snapshot to CBOR bytes.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out)
            .map_err(|e| SnapshotError::Encode(e.to_string()))?;
        Ok(out)
    }

    /// Decodes a snapshot from CBOR bytes, validating the format version.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = ciborium::de::from_reader(bytes)
            .map_err(|e| SnapshotError::Invalid(e.to_string()))?;

        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.format_version,
                supported: SNAPSHOT_FORMAT_VERSION,
            });
        }

        Ok(snapshot)
    }
}
