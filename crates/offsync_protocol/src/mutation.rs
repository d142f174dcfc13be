//! Queued mutations awaiting transmission.

use crate::priority::Priority;
use crate::record::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of remote operation a queued mutation maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Create the entity on the remote endpoint.
    Create,
    /// Update the entity on the remote endpoint.
    Update,
    /// Delete the entity from the remote endpoint.
    Delete,
}

/// A pending mutation recorded while offline (or awaiting its sync pass).
///
/// # Fields
///
/// - `id`: unique entry identifier
/// - `kind`: Create, Update, or Delete
/// - `entity_type` / `entity_id`: the affected entity
/// - `payload`: entity body for Create/Update; `None` for Delete
/// - `priority`: drain-order class
/// - `retry_count`: failed transmission attempts so far; monotonically
///   non-decreasing, entry is dropped once it reaches the configured maximum
/// - `enqueued_at`: logical timestamp of enqueue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMutation {
    /// Unique entry ID.
    pub id: Uuid,
    /// Operation kind.
    pub kind: MutationKind,
    /// Entity type.
    pub entity_type: String,
    /// Entity ID.
    pub entity_id: String,
    /// Entity payload (for Create/Update).
    pub payload: Option<Vec<u8>>,
    /// Priority class.
    pub priority: Priority,
    /// Failed transmission attempts so far.
    pub retry_count: u32,
    /// Logical timestamp of enqueue.
    pub enqueued_at: Timestamp,
}

impl QueuedMutation {
    /// Creates a new Create mutation.
    pub fn create(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: Vec<u8>,
        priority: Priority,
        now: Timestamp,
    ) -> Self {
        Self::build(
            MutationKind::Create,
            entity_type,
            entity_id,
            Some(payload),
            priority,
            now,
        )
    }

    /// Creates a new Update mutation.
    pub fn update(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: Vec<u8>,
        priority: Priority,
        now: Timestamp,
    ) -> Self {
        Self::build(
            MutationKind::Update,
            entity_type,
            entity_id,
            Some(payload),
            priority,
            now,
        )
    }

    /// Creates a new Delete mutation.
    pub fn delete(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        priority: Priority,
        now: Timestamp,
    ) -> Self {
        Self::build(MutationKind::Delete, entity_type, entity_id, None, priority, now)
    }

    fn build(
        kind: MutationKind,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: Option<Vec<u8>>,
        priority: Priority,
        now: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            payload,
            priority,
            retry_count: 0,
            enqueued_at: now,
        }
    }

    /// Returns the size of the payload in bytes.
    pub fn payload_size(&self) -> usize {
        self.payload.as_ref().map(|p| p.len()).unwrap_or(0)
    }
}
