//! The sync orchestrator and engine facade.

use crate::config::EngineConfig;
use crate::driver::SyncSignal;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::monitor::{NetworkMonitor, NetworkState, ReachabilityProbe};
use crate::transport::RemoteTransport;
use offsync_protocol::{
    resolve, EngineSnapshot, MutationKind, MutationQueue, OfflineRecord, Priority, QueuedMutation,
    RecordKey, RemoteRecord, Resolution, SnapshotConfig, SyncStatus,
};
use offsync_store::{OfflineStore, StateBackend, StoreError, QUEUE_COLLECTION};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The current phase of the sync orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No pass in flight.
    Idle,
    /// A pass is running.
    Syncing,
    /// The last pass aborted; cleared by the next trigger.
    Error,
}

/// Result of one completed sync pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassSummary {
    /// Mutations and records confirmed against the remote endpoint.
    pub synced: usize,
    /// Failed transmissions and reconciliations.
    pub failed: usize,
    /// Entries still queued after the pass.
    pub remaining: usize,
    /// Conflicts flagged for manual arbitration.
    pub conflicts: usize,
    /// Duration of the pass.
    pub duration: Duration,
}

/// Outcome of a sync trigger.
#[derive(Debug, Clone)]
pub enum PassOutcome {
    /// The pass ran to completion.
    Completed(PassSummary),
    /// Another pass was already in flight; this trigger was dropped.
    Skipped,
}

/// Caller decision for a record in the conflict state.
#[derive(Debug, Clone)]
pub enum ConflictChoice {
    /// Keep the local version; it is re-stamped and pushed on the next
    /// pass.
    KeepLocal,
    /// Accept the given remote version; the record becomes synced.
    AcceptRemote(RemoteRecord),
}

/// Statistics about engine activity.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total number of completed passes.
    pub passes_completed: u64,
    /// Total mutations and records confirmed.
    pub mutations_synced: u64,
    /// Total failed transmissions and reconciliations.
    pub mutations_failed: u64,
    /// Total conflicts flagged for arbitration.
    pub conflicts_detected: u64,
    /// Total records evicted by the storage budget.
    pub records_evicted: u64,
    /// Last pass time.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// The offline-first synchronization engine.
///
/// Owns the durable store, the mutation queue, the network monitor, and
/// the event bus; drains the queue against a remote transport and
/// reconciles stored records through the conflict resolver.
///
/// # Key Invariants
///
/// - At most one sync pass is in flight; extra triggers are dropped
/// - Local writes never block on the network
/// - Queue entries drain in the priority-then-FIFO order fixed at pass
///   start; entries enqueued mid-pass wait for the next trigger
/// - A record in the conflict state is only changed by
///   [`OfflineEngine::resolve_conflict`]
///
/// # Example
///
/// ```
/// use offsync_engine::{EngineConfig, MockTransport, OfflineEngine};
/// use offsync_engine::{LinkClass, ProbeSample, ReachabilityProbe};
/// use offsync_protocol::{MutationKind, Priority};
/// use offsync_store::InMemoryBackend;
/// use std::sync::Arc;
///
/// struct AlwaysUp;
/// impl ReachabilityProbe for AlwaysUp {
///     fn probe(&self) -> Result<ProbeSample, String> {
///         Ok(ProbeSample { latency_ms: 1, link: LinkClass::Wired })
///     }
/// }
///
/// let engine = OfflineEngine::new(
///     EngineConfig::default(),
///     Arc::new(InMemoryBackend::new()),
///     Arc::new(MockTransport::new()),
///     Arc::new(AlwaysUp),
/// )
/// .unwrap();
///
/// engine.store_offline("tasks", "t1", b"payload".to_vec()).unwrap();
/// engine
///     .enqueue(MutationKind::Create, "tasks", "t1", Some(b"payload".to_vec()), Priority::High)
///     .unwrap();
/// engine.set_online(true);
/// engine.sync_now().unwrap();
/// ```
pub struct OfflineEngine {
    config: EngineConfig,
    store: OfflineStore,
    queue: Mutex<MutationQueue>,
    monitor: NetworkMonitor,
    bus: Arc<EventBus>,
    transport: Arc<dyn RemoteTransport>,
    in_flight: AtomicBool,
    phase: RwLock<SyncPhase>,
    stats: RwLock<SyncStats>,
    signal: Arc<SyncSignal>,
}

impl OfflineEngine {
    /// Creates an engine over the given backend, transport, and probe,
    /// loading any persisted records and queue entries.
    ///
    /// To compress or encrypt persisted state, wrap the backend in an
    /// [`offsync_store::CodecBackend`] before passing it in.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted state cannot be loaded or decoded.
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn StateBackend>,
        transport: Arc<dyn RemoteTransport>,
        probe: Arc<dyn ReachabilityProbe>,
    ) -> EngineResult<Self> {
        let bus = Arc::new(EventBus::new());
        let store = OfflineStore::open(backend.clone(), config.max_storage_budget_bytes)?;

        let mut queue = MutationQueue::new();
        if let Some(bytes) = backend.load(QUEUE_COLLECTION)? {
            let entries: Vec<QueuedMutation> = ciborium::de::from_reader(bytes.as_slice())
                .map_err(|e| StoreError::codec(e.to_string()))?;
            queue.replace_all(entries);
        }

        let monitor = NetworkMonitor::new(probe, Arc::clone(&bus));

        Ok(Self {
            config,
            store,
            queue: Mutex::new(queue),
            monitor,
            bus,
            transport,
            in_flight: AtomicBool::new(false),
            phase: RwLock::new(SyncPhase::Idle),
            stats: RwLock::new(SyncStats::default()),
            signal: Arc::new(SyncSignal::new()),
        })
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the event bus for subscribing to lifecycle events.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Returns the current orchestrator phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.read()
    }

    /// Returns a copy of the engine statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Stores a record locally, marking it pending for synchronization.
    ///
    /// Never blocks on the network. May evict old records to enforce the
    /// storage budget, in which case a `DataCleanup` event reports the
    /// count removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence flush fails.
    pub fn store_offline(
        &self,
        entity_type: &str,
        entity_id: &str,
        payload: Vec<u8>,
    ) -> EngineResult<OfflineRecord> {
        let outcome = self.store.put(entity_type, entity_id, payload)?;

        if outcome.evicted > 0 {
            self.stats.write().records_evicted += outcome.evicted as u64;
            self.bus.emit(EngineEvent::DataCleanup {
                removed: outcome.evicted,
            });
        }

        Ok(outcome.record)
    }

    /// Returns the locally stored record for a key, or `None`.
    pub fn get_offline(&self, entity_type: &str, entity_id: &str) -> Option<OfflineRecord> {
        self.store.get(entity_type, entity_id)
    }

    /// Returns all locally stored records of a type, oldest first.
    pub fn get_all_offline(&self, entity_type: &str) -> Vec<OfflineRecord> {
        self.store.get_all(entity_type)
    }

    /// Removes a record from local storage. Removing an absent key is a
    /// no-op. Never blocks on the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence flush fails.
    pub fn delete_offline(&self, entity_type: &str, entity_id: &str) -> EngineResult<()> {
        self.store.delete(entity_type, entity_id)?;
        Ok(())
    }

    /// Estimated local storage usage in bytes.
    pub fn estimate_usage(&self) -> u64 {
        self.store.estimate_usage()
    }

    /// Enqueues a mutation for transmission.
    ///
    /// `payload` is required for create/update and ignored for delete.
    /// A critical-priority enqueue while online signals the sync driver
    /// to start a pass immediately instead of waiting for the next tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be persisted.
    pub fn enqueue(
        &self,
        kind: MutationKind,
        entity_type: &str,
        entity_id: &str,
        payload: Option<Vec<u8>>,
        priority: Priority,
    ) -> EngineResult<QueuedMutation> {
        let now = self.store.next_timestamp();
        let mutation = match kind {
            MutationKind::Create => QueuedMutation::create(
                entity_type,
                entity_id,
                payload.unwrap_or_default(),
                priority,
                now,
            ),
            MutationKind::Update => QueuedMutation::update(
                entity_type,
                entity_id,
                payload.unwrap_or_default(),
                priority,
                now,
            ),
            MutationKind::Delete => {
                QueuedMutation::delete(entity_type, entity_id, priority, now)
            }
        };

        {
            let mut queue = self.queue.lock();
            queue.push(mutation.clone());
        }
        self.persist_queue()?;

        if priority == Priority::Critical && self.monitor.is_online() {
            tracing::debug!(entity_type, entity_id, "critical enqueue, requesting sync");
            self.request_sync();
        }

        Ok(mutation)
    }

    /// Number of entries awaiting transmission.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Applies a host connectivity signal. An offline-to-online
    /// transition requests an immediate sync pass.
    pub fn set_online(&self, online: bool) {
        let transitioned = self.monitor.set_online(online);
        if transitioned && online {
            self.request_sync();
        }
    }

    /// Returns the current network state snapshot.
    pub fn network_state(&self) -> NetworkState {
        self.monitor.state()
    }

    /// Re-probes network quality while online. Called by the driver on
    /// each tick.
    pub fn refresh_network(&self) {
        self.monitor.refresh();
    }

    /// Requests an asynchronous sync pass from the driver.
    pub fn request_sync(&self) {
        self.signal.request();
    }

    pub(crate) fn sync_signal(&self) -> &Arc<SyncSignal> {
        &self.signal
    }

    /// Runs a sync pass now, regardless of the auto-sync setting.
    ///
    /// At most one pass runs at a time: a trigger while a pass is in
    /// flight returns [`PassOutcome::Skipped`] without error. Callers
    /// needing a guaranteed post-state sync should trigger again after
    /// completion.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Offline`] if the network is unreachable,
    /// or a store error if the pass aborted mid-way. Either way a
    /// `SyncFailed` event is emitted.
    pub fn sync_now(&self) -> EngineResult<PassOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("sync already in progress, trigger dropped");
            return Ok(PassOutcome::Skipped);
        }

        let result = self.run_pass();
        self.in_flight.store(false, Ordering::SeqCst);

        match result {
            Ok(summary) => {
                *self.phase.write() = SyncPhase::Idle;
                Ok(PassOutcome::Completed(summary))
            }
            Err(e) => {
                *self.phase.write() = SyncPhase::Error;
                self.stats.write().last_error = Some(e.to_string());
                self.bus.emit(EngineEvent::SyncFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn run_pass(&self) -> EngineResult<PassSummary> {
        if !self.monitor.is_online() {
            return Err(EngineError::Offline);
        }

        *self.phase.write() = SyncPhase::Syncing;
        self.bus.emit(EngineEvent::SyncStarted);
        let start = Instant::now();

        let mut synced = 0usize;
        let mut failed = 0usize;
        let mut conflicts = 0usize;

        // Ordering is fixed at pass start; entries enqueued from here on
        // wait for the next trigger.
        let entries = self.queue.lock().snapshot();
        tracing::debug!(entries = entries.len(), "sync pass started");

        for entry in entries {
            match self.transmit(&entry) {
                Ok(()) => {
                    self.queue.lock().remove(entry.id);
                    self.persist_queue()?;

                    if entry.kind != MutationKind::Delete {
                        let key = RecordKey::new(&entry.entity_type, &entry.entity_id);
                        self.store.mark_synced(&key)?;
                    }
                    synced += 1;
                }
                Err(e) => {
                    let retries = self.queue.lock().record_failure(entry.id);
                    match retries {
                        Some(count) if count >= self.config.max_retries => {
                            let dropped = self.queue.lock().remove(entry.id);
                            self.persist_queue()?;
                            failed += 1;

                            if let Some(dropped) = dropped {
                                tracing::warn!(
                                    entity_type = %dropped.entity_type,
                                    entity_id = %dropped.entity_id,
                                    retries = count,
                                    "queue entry exhausted retries, dropping"
                                );
                                self.bus.emit(EngineEvent::SyncItemFailed {
                                    mutation: dropped,
                                    error: e.to_string(),
                                });
                            }
                        }
                        Some(_) => {
                            self.persist_queue()?;
                        }
                        None => {}
                    }
                }
            }
        }

        // Reconcile records still carrying unconfirmed state. Conflicted
        // records are excluded; they wait for explicit arbitration.
        for local in self.store.pending_records() {
            let remote = match self
                .transport
                .fetch(&local.key.entity_type, &local.key.entity_id)
            {
                Ok(remote) => remote,
                Err(e) => {
                    tracing::debug!(key = %local.key, error = %e, "fetch failed during reconcile");
                    failed += 1;
                    continue;
                }
            };

            match resolve(&local, remote.as_ref(), self.config.conflict_policy) {
                Ok(Resolution::Push(record)) => {
                    match self.transport.update(
                        &record.key.entity_type,
                        &record.key.entity_id,
                        &record.payload,
                    ) {
                        Ok(()) => {
                            let mut confirmed = record;
                            confirmed.sync_status = SyncStatus::Synced;
                            self.store.apply(confirmed)?;
                            synced += 1;
                        }
                        Err(e) => {
                            tracing::debug!(key = %record.key, error = %e, "push failed during reconcile");
                            self.store.set_status(&record.key, SyncStatus::Error)?;
                            failed += 1;
                        }
                    }
                }
                Ok(Resolution::Accept(record)) => {
                    self.store.apply(record)?;
                    synced += 1;
                }
                Ok(Resolution::Manual { local, remote }) => {
                    self.store.set_status(&local.key, SyncStatus::Conflict)?;
                    conflicts += 1;
                    self.bus
                        .emit(EngineEvent::ConflictDetected { local, remote });
                }
                Err(e) => {
                    tracing::warn!(key = %local.key, error = %e, "resolution failed");
                    failed += 1;
                }
            }
        }

        let summary = PassSummary {
            synced,
            failed,
            remaining: self.queue.lock().len(),
            conflicts,
            duration: start.elapsed(),
        };

        {
            let mut stats = self.stats.write();
            stats.passes_completed += 1;
            stats.mutations_synced += synced as u64;
            stats.mutations_failed += failed as u64;
            stats.conflicts_detected += conflicts as u64;
            stats.last_sync_time = Some(Instant::now());
            stats.last_error = None;
        }

        *self.phase.write() = SyncPhase::Idle;
        tracing::info!(
            synced,
            failed,
            remaining = summary.remaining,
            conflicts,
            "sync pass completed"
        );
        self.bus.emit(EngineEvent::SyncCompleted(summary.clone()));

        Ok(summary)
    }

    fn transmit(&self, entry: &QueuedMutation) -> EngineResult<()> {
        let payload = entry.payload.as_deref().unwrap_or_default();
        match entry.kind {
            MutationKind::Create => {
                self.transport
                    .create(&entry.entity_type, &entry.entity_id, payload)
            }
            MutationKind::Update => {
                self.transport
                    .update(&entry.entity_type, &entry.entity_id, payload)
            }
            MutationKind::Delete => self.transport.delete(&entry.entity_type, &entry.entity_id),
        }
    }

    /// Applies a caller decision to a conflicted record.
    ///
    /// This is the only way a record leaves the conflict state.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistence flush fails.
    pub fn resolve_conflict(
        &self,
        entity_type: &str,
        entity_id: &str,
        choice: ConflictChoice,
    ) -> EngineResult<()> {
        let key = RecordKey::new(entity_type, entity_id);
        match choice {
            ConflictChoice::KeepLocal => {
                self.store.touch(&key)?;
            }
            ConflictChoice::AcceptRemote(remote) => {
                if let Some(local) = self.store.get(entity_type, entity_id) {
                    let mut accepted = local;
                    accepted.payload = remote.payload;
                    accepted.last_modified = remote.last_modified;
                    accepted.version += 1;
                    accepted.sync_status = SyncStatus::Synced;
                    self.store.apply(accepted)?;
                }
            }
        }
        Ok(())
    }

    /// Exports engine state (records, queue, config) as a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be encoded.
    pub fn export(&self) -> EngineResult<Vec<u8>> {
        let snapshot = EngineSnapshot::new(
            self.store.next_timestamp(),
            SnapshotConfig::from(&self.config),
            self.store.export_records(),
            self.queue.lock().snapshot(),
        );
        snapshot
            .encode()
            .map_err(|e| EngineError::Snapshot(e.to_string()))
    }

    /// Imports a snapshot, fully replacing the record set and queue.
    ///
    /// A malformed snapshot fails with [`EngineError::ImportFormat`] and
    /// leaves existing state untouched.
    ///
    /// # Errors
    ///
    /// Returns an error on a malformed snapshot or a persistence
    /// failure.
    pub fn import(&self, bytes: &[u8]) -> EngineResult<()> {
        let snapshot =
            EngineSnapshot::decode(bytes).map_err(|e| EngineError::ImportFormat(e.to_string()))?;

        self.store.replace_all(snapshot.records)?;
        self.queue.lock().replace_all(snapshot.queue);
        self.persist_queue()?;

        tracing::info!("snapshot imported");
        Ok(())
    }

    /// Flushes pending writes. Call before dropping the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn shutdown(&self) -> EngineResult<()> {
        self.persist_queue()?;
        self.store.flush()?;
        tracing::info!("engine shut down");
        Ok(())
    }

    fn persist_queue(&self) -> EngineResult<()> {
        let entries = self.queue.lock().snapshot();
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&entries, &mut bytes)
            .map_err(|e| StoreError::codec(e.to_string()))?;
        self.store.backend().save(QUEUE_COLLECTION, &bytes)?;
        Ok(())
    }
}
