//! Conflict detection and policy-driven resolution.

use crate::record::{OfflineRecord, SyncStatus, Timestamp};
use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Policy for resolving divergence between local and remote versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The local payload is pushed to the remote endpoint unchanged.
    ClientWins,
    /// The local payload is replaced by the remote payload.
    ServerWins,
    /// Shallow field union, local fields winning on collision; the merged
    /// record is then pushed.
    Merge,
    /// No automatic resolution; the record is flagged for arbitration.
    Manual,
}

impl ConflictPolicy {
    /// Returns true if this policy resolves divergence without caller
    /// involvement.
    pub fn auto_resolves(&self) -> bool {
        !matches!(self, ConflictPolicy::Manual)
    }
}

/// The server-observed counterpart of a local record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Remote entity payload.
    pub payload: Vec<u8>,
    /// Remote modification timestamp.
    pub last_modified: Timestamp,
}

impl RemoteRecord {
    /// Creates a new remote record.
    pub fn new(payload: Vec<u8>, last_modified: Timestamp) -> Self {
        Self {
            payload,
            last_modified,
        }
    }
}

/// Outcome of resolving a local record against its remote counterpart.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Push the record to the remote endpoint; it becomes synced only
    /// once the push is confirmed.
    Push(OfflineRecord),
    /// Accept the record locally as already in sync with the server.
    Accept(OfflineRecord),
    /// Arbitration required; both versions are handed to the caller.
    Manual {
        /// The local record, untouched.
        local: OfflineRecord,
        /// The remote counterpart.
        remote: RemoteRecord,
    },
}

/// Errors from conflict resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Merge requires both payloads to be CBOR maps.
    #[error("payloads are not mergeable: {0}")]
    NotMergeable(String),
}

/// Returns true if the remote version diverged from the local snapshot.
///
/// Divergence requires the remote side to have changed after the local
/// snapshot was taken, and the local record to carry unconfirmed state.
pub fn is_diverged(local: &OfflineRecord, remote: &RemoteRecord) -> bool {
    remote.last_modified > local.last_modified && local.sync_status != SyncStatus::Synced
}

/// Resolves a local record against its remote counterpart.
///
/// Pure: the caller applies the returned resolution. With no remote
/// counterpart, or no divergence, the local record is simply pushed.
pub fn resolve(
    local: &OfflineRecord,
    remote: Option<&RemoteRecord>,
    policy: ConflictPolicy,
) -> Result<Resolution, ResolveError> {
    let remote = match remote {
        Some(remote) if is_diverged(local, remote) => remote,
        _ => return Ok(Resolution::Push(local.clone())),
    };

    match policy {
        ConflictPolicy::ClientWins => Ok(Resolution::Push(local.clone())),
        ConflictPolicy::ServerWins => {
            let mut accepted = local.clone();
            accepted.payload = remote.payload.clone();
            accepted.last_modified = remote.last_modified;
            accepted.version += 1;
            accepted.sync_status = SyncStatus::Synced;
            Ok(Resolution::Accept(accepted))
        }
        ConflictPolicy::Merge => {
            let mut merged = local.clone();
            merged.payload = merge_payloads(&local.payload, &remote.payload)?;
            merged.last_modified = local.last_modified.max(remote.last_modified);
            merged.version += 1;
            merged.sync_status = SyncStatus::Pending;
            Ok(Resolution::Push(merged))
        }
        ConflictPolicy::Manual => Ok(Resolution::Manual {
            local: local.clone(),
            remote: remote.clone(),
        }),
    }
}

/// Shallow union of two CBOR map payloads, local fields winning on key
/// collision.
fn merge_payloads(local: &[u8], remote: &[u8]) -> Result<Vec<u8>, ResolveError> {
    let local_map = decode_map(local, "local")?;
    let remote_map = decode_map(remote, "remote")?;

    let mut merged = remote_map;
    for (key, value) in local_map {
        if let Some(slot) = merged.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            merged.push((key, value));
        }
    }

    let mut out = Vec::new();
    ciborium::ser::into_writer(&Value::Map(merged), &mut out)
        .map_err(|e| ResolveError::NotMergeable(e.to_string()))?;
    Ok(out)
}

fn decode_map(bytes: &[u8], side: &str) -> Result<Vec<(Value, Value)>, ResolveError> {
    let value: Value = ciborium::de::from_reader(bytes)
        .map_err(|e| ResolveError::NotMergeable(format!("{side} payload: {e}")))?;
    match value {
        Value::Map(map) => Ok(map),
        other => Err(ResolveError::NotMergeable(format!(
            "{side} payload is not a map: {other:?}"
        ))),
    }
}
