//! The budget-enforcing offline record store.

use crate::backend::StateBackend;
use crate::clock::LogicalClock;
use crate::error::{StoreError, StoreResult};
use offsync_protocol::{OfflineRecord, RecordKey, SyncStatus, Timestamp};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Backend collection holding the record set.
pub const RECORDS_COLLECTION: &str = "records";

/// Backend collection holding the mutation queue.
///
/// The queue itself lives in the engine; the name is defined here so the
/// persisted layout is declared in one place.
pub const QUEUE_COLLECTION: &str = "queue";

/// Fraction denominator for eviction: the oldest 1/4 of records go.
const EVICTION_DIVISOR: usize = 4;

/// Result of a `put`: the stored record and how many records were
/// evicted to make room for it.
#[derive(Debug, Clone)]
pub struct PutOutcome {
    /// The record as stored.
    pub record: OfflineRecord,
    /// Number of records evicted by the budget check (0 if none).
    pub evicted: usize,
}

/// Durable local store of offline records.
///
/// Holds exactly one record per `(entity_type, entity_id)` key. Every
/// mutation is applied in memory and flushed to the backend before
/// returning. When the storage budget would be exceeded, the oldest 25%
/// of records by creation time are evicted first and the write then
/// proceeds unconditionally.
///
/// All methods serialize concurrent callers through an internal lock.
pub struct OfflineStore {
    backend: Arc<dyn StateBackend>,
    records: RwLock<HashMap<RecordKey, OfflineRecord>>,
    clock: LogicalClock,
    budget_bytes: u64,
}

impl OfflineStore {
    /// Opens a store over the given backend, loading any persisted
    /// records.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or persisted state cannot
    /// be decoded.
    pub fn open(backend: Arc<dyn StateBackend>, budget_bytes: u64) -> StoreResult<Self> {
        let clock = LogicalClock::new();
        let mut records = HashMap::new();

        if let Some(bytes) = backend.load(RECORDS_COLLECTION)? {
            let loaded: Vec<OfflineRecord> = ciborium::de::from_reader(bytes.as_slice())
                .map_err(|e| StoreError::codec(e.to_string()))?;
            for record in loaded {
                clock.advance_to(record.last_modified);
                records.insert(record.key.clone(), record);
            }
        }

        Ok(Self {
            backend,
            records: RwLock::new(records),
            clock,
            budget_bytes,
        })
    }

    /// Upserts a record, marking it pending and bumping its version.
    ///
    /// If the write would exceed the storage budget, the oldest 25% of
    /// records are evicted first; the write is then retried once,
    /// unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence flush fails.
    pub fn put(
        &self,
        entity_type: &str,
        entity_id: &str,
        payload: Vec<u8>,
    ) -> StoreResult<PutOutcome> {
        let key = RecordKey::new(entity_type, entity_id);
        let now = self.clock.next();
        let mut records = self.records.write();

        let (record, existing_size) = match records.get(&key) {
            Some(existing) => {
                let mut updated = existing.clone();
                updated.payload = payload;
                updated.version += 1;
                updated.sync_status = SyncStatus::Pending;
                updated.last_modified = now;
                (updated, existing.approximate_size() as u64)
            }
            None => (OfflineRecord::new(key.clone(), payload, now), 0),
        };

        let projected =
            Self::usage_of(&records) - existing_size + record.approximate_size() as u64;
        let evicted = if projected > self.budget_bytes {
            Self::evict_oldest_quarter(&mut records)
        } else {
            0
        };

        records.insert(key, record.clone());
        self.persist_locked(&records)?;

        Ok(PutOutcome { record, evicted })
    }

    /// Returns the record for a key, or `None` if absent.
    pub fn get(&self, entity_type: &str, entity_id: &str) -> Option<OfflineRecord> {
        let key = RecordKey::new(entity_type, entity_id);
        self.records.read().get(&key).cloned()
    }

    /// Returns all records of a type, oldest first. Unknown types yield
    /// an empty list.
    pub fn get_all(&self, entity_type: &str) -> Vec<OfflineRecord> {
        let records = self.records.read();
        let mut matched: Vec<OfflineRecord> = records
            .values()
            .filter(|r| r.key.entity_type == entity_type)
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.created_at);
        matched
    }

    /// Removes a record. Removing an absent key is a no-op.
    ///
    /// Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence flush fails.
    pub fn delete(&self, entity_type: &str, entity_id: &str) -> StoreResult<bool> {
        let key = RecordKey::new(entity_type, entity_id);
        let mut records = self.records.write();
        let removed = records.remove(&key).is_some();
        if removed {
            self.persist_locked(&records)?;
        }
        Ok(removed)
    }

    /// Estimated storage usage in bytes.
    pub fn estimate_usage(&self) -> u64 {
        Self::usage_of(&self.records.read())
    }

    /// Number of records in the store.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Marks a record synced. Returns whether the record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence flush fails.
    pub fn mark_synced(&self, key: &RecordKey) -> StoreResult<bool> {
        self.set_status(key, SyncStatus::Synced)
    }

    /// Sets a record's sync status. Returns whether the record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence flush fails.
    pub fn set_status(&self, key: &RecordKey, status: SyncStatus) -> StoreResult<bool> {
        let mut records = self.records.write();
        match records.get_mut(key) {
            Some(record) => {
                record.sync_status = status;
                self.persist_locked(&records)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replaces a record wholesale, e.g. with a resolver-accepted version.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence flush fails.
    pub fn apply(&self, record: OfflineRecord) -> StoreResult<()> {
        self.clock.advance_to(record.last_modified);
        let mut records = self.records.write();
        records.insert(record.key.clone(), record);
        self.persist_locked(&records)
    }

    /// Re-stamps a record as locally modified: pending status, bumped
    /// version and `last_modified`. Used when the caller keeps the local
    /// version of a conflicted record.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence flush fails.
    pub fn touch(&self, key: &RecordKey) -> StoreResult<Option<OfflineRecord>> {
        let now = self.clock.next();
        let mut records = self.records.write();
        match records.get_mut(key) {
            Some(record) => {
                record.version += 1;
                record.last_modified = now;
                record.sync_status = SyncStatus::Pending;
                let touched = record.clone();
                self.persist_locked(&records)?;
                Ok(Some(touched))
            }
            None => Ok(None),
        }
    }

    /// Records awaiting reconciliation: status pending or error, oldest
    /// first. Conflicted records are excluded; they wait for explicit
    /// arbitration.
    pub fn pending_records(&self) -> Vec<OfflineRecord> {
        let records = self.records.read();
        let mut pending: Vec<OfflineRecord> = records
            .values()
            .filter(|r| {
                matches!(r.sync_status, SyncStatus::Pending | SyncStatus::Error)
            })
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending
    }

    /// All records, oldest first, for export.
    pub fn export_records(&self) -> Vec<OfflineRecord> {
        let records = self.records.read();
        let mut all: Vec<OfflineRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        all
    }

    /// Replaces the entire record set, e.g. from an imported snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence flush fails.
    pub fn replace_all(&self, new_records: Vec<OfflineRecord>) -> StoreResult<()> {
        let mut records = self.records.write();
        records.clear();
        for record in new_records {
            self.clock.advance_to(record.last_modified);
            records.insert(record.key.clone(), record);
        }
        self.persist_locked(&records)
    }

    /// Returns the next logical timestamp from the store's clock.
    pub fn next_timestamp(&self) -> Timestamp {
        self.clock.next()
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &Arc<dyn StateBackend> {
        &self.backend
    }

    /// Flushes the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> StoreResult<()> {
        self.backend.flush()
    }

    fn usage_of(records: &HashMap<RecordKey, OfflineRecord>) -> u64 {
        records.values().map(|r| r.approximate_size() as u64).sum()
    }

    fn evict_oldest_quarter(records: &mut HashMap<RecordKey, OfflineRecord>) -> usize {
        let count = records.len() / EVICTION_DIVISOR;
        if count == 0 {
            return 0;
        }

        let mut by_age: Vec<(Timestamp, RecordKey)> = records
            .values()
            .map(|r| (r.created_at, r.key.clone()))
            .collect();
        by_age.sort_by_key(|(created_at, _)| *created_at);

        for (_, key) in by_age.into_iter().take(count) {
            records.remove(&key);
        }

        tracing::debug!(evicted = count, "storage budget exceeded, evicted oldest records");
        count
    }

    fn persist_locked(&self, records: &HashMap<RecordKey, OfflineRecord>) -> StoreResult<()> {
        let mut all: Vec<&OfflineRecord> = records.values().collect();
        all.sort_by_key(|r| r.created_at);

        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&all, &mut bytes)
            .map_err(|e| StoreError::codec(e.to_string()))?;
        self.backend.save(RECORDS_COLLECTION, &bytes)
    }
}
