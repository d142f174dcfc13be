//! # offsync Protocol
//!
//! Record, mutation queue, and conflict resolution types for offsync.
//!
//! This crate provides:
//! - `OfflineRecord` for locally persisted entity snapshots
//! - `QueuedMutation` and the priority-ordered `MutationQueue`
//! - Conflict detection and policy-driven resolution
//! - The `EngineSnapshot` export/import format
//!
//! This is a pure data crate with no I/O operations.
//!
//! ## Key Invariants
//!
//! - Exactly one `OfflineRecord` per `(entity_type, entity_id)` key
//! - `last_modified` never decreases for a given key
//! - Queue entries drain critical-first, FIFO within a priority class
//! - Conflict resolution is a pure function of local state, remote state,
//!   and policy

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod mutation;
mod priority;
mod queue;
mod record;
mod snapshot;

pub use conflict::{is_diverged, resolve, ConflictPolicy, RemoteRecord, Resolution, ResolveError};
pub use mutation::{MutationKind, QueuedMutation};
pub use priority::Priority;
pub use queue::MutationQueue;
pub use record::{OfflineRecord, RecordKey, SyncStatus, Timestamp};
pub use snapshot::{
    EngineSnapshot, SnapshotConfig, SnapshotError, SNAPSHOT_FORMAT_VERSION,
};
