//! Integration tests for the offline-first engine.

use offsync_engine::{
    ConflictChoice, EngineConfig, EngineError, EngineEvent, EventKind, LinkClass, MockTransport,
    OfflineEngine, PassOutcome, ProbeSample, ReachabilityProbe, SyncDriver,
};
use offsync_protocol::{
    ConflictPolicy, EngineSnapshot, MutationKind, Priority, RemoteRecord, SyncStatus,
};
use offsync_store::{FileBackend, InMemoryBackend, StateBackend};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

struct AlwaysUp;

impl ReachabilityProbe for AlwaysUp {
    fn probe(&self) -> Result<ProbeSample, String> {
        Ok(ProbeSample {
            latency_ms: 1,
            link: LinkClass::Wired,
        })
    }
}

fn make_engine(config: EngineConfig) -> (Arc<OfflineEngine>, Arc<MockTransport>) {
    make_engine_on(config, Arc::new(InMemoryBackend::new()))
}

fn make_engine_on(
    config: EngineConfig,
    backend: Arc<dyn StateBackend>,
) -> (Arc<OfflineEngine>, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let engine =
        OfflineEngine::new(config, backend, transport.clone(), Arc::new(AlwaysUp)).unwrap();
    (Arc::new(engine), transport)
}

fn collect(engine: &OfflineEngine, kind: EventKind) -> Arc<Mutex<Vec<EngineEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    engine
        .events()
        .on(kind, move |event| sink.lock().push(event.clone()));
    events
}

fn cbor(value: &serde_json::Value) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).unwrap();
    out
}

fn decode(bytes: &[u8]) -> serde_json::Value {
    ciborium::de::from_reader(bytes).unwrap()
}

#[test]
fn offline_edits_sync_in_priority_order() {
    let (engine, transport) = make_engine(EngineConfig::default());
    let completed = collect(&engine, EventKind::SyncCompleted);

    // Edits land while offline
    for (id, priority) in [
        ("t1", Priority::Low),
        ("t2", Priority::Critical),
        ("t3", Priority::Medium),
        ("t4", Priority::High),
    ] {
        engine.store_offline("tasks", id, vec![1]).unwrap();
        engine
            .enqueue(MutationKind::Create, "tasks", id, Some(vec![1]), priority)
            .unwrap();
    }
    assert_eq!(engine.queue_len(), 4);

    engine.set_online(true);
    let outcome = engine.sync_now().unwrap();

    match outcome {
        PassOutcome::Completed(summary) => {
            assert_eq!(summary.synced, 4);
            assert_eq!(summary.remaining, 0);
        }
        PassOutcome::Skipped => panic!("pass should have run"),
    }

    // Drained critical-first, and everything is confirmed
    let creates: Vec<String> = transport
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("create"))
        .collect();
    assert_eq!(
        creates,
        vec![
            "create tasks/t2",
            "create tasks/t4",
            "create tasks/t3",
            "create tasks/t1"
        ]
    );
    assert_eq!(engine.queue_len(), 0);
    for id in ["t1", "t2", "t3", "t4"] {
        assert!(engine.get_offline("tasks", id).unwrap().is_synced());
    }
    assert_eq!(completed.lock().len(), 1);
}

#[test]
fn retry_bound_drops_entry_with_one_failure_event() {
    let config = EngineConfig::default().with_max_retries(2);
    let (engine, transport) = make_engine(config);
    let failures = collect(&engine, EventKind::SyncItemFailed);

    transport.set_fail_always(true);
    engine
        .enqueue(MutationKind::Create, "tasks", "t1", Some(vec![1]), Priority::Medium)
        .unwrap();
    engine.set_online(true);

    // First pass: one failed attempt, entry stays queued
    engine.sync_now().unwrap();
    assert_eq!(engine.queue_len(), 1);
    assert!(failures.lock().is_empty());

    // Second pass reaches the retry bound: entry dropped, one event
    engine.sync_now().unwrap();
    assert_eq!(engine.queue_len(), 0);
    assert_eq!(failures.lock().len(), 1);

    // Exactly max_retries transmission attempts happened
    let attempts = transport
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("create"))
        .count();
    assert_eq!(attempts, 2);

    match &failures.lock()[0] {
        EngineEvent::SyncItemFailed { mutation, error } => {
            assert_eq!(mutation.entity_id, "t1");
            assert_eq!(mutation.retry_count, 2);
            assert!(error.contains("injected failure"));
        }
        other => panic!("unexpected event {other:?}"),
    };
}

#[test]
fn single_flight_drops_second_trigger() {
    let (engine, transport) = make_engine(EngineConfig::default());
    let completed = collect(&engine, EventKind::SyncCompleted);

    transport.set_delay(Duration::from_millis(300));
    engine
        .enqueue(MutationKind::Create, "tasks", "t1", Some(vec![1]), Priority::Medium)
        .unwrap();
    engine.set_online(true);

    let first = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || engine.sync_now().unwrap())
    };

    // Give the first pass time to take the in-flight guard
    std::thread::sleep(Duration::from_millis(100));
    let second = engine.sync_now().unwrap();
    assert!(matches!(second, PassOutcome::Skipped));

    let first = first.join().unwrap();
    assert!(matches!(first, PassOutcome::Completed(_)));
    assert_eq!(completed.lock().len(), 1);
}

#[test]
fn export_import_round_trip() {
    let (source, _) = make_engine(EngineConfig::default());
    source.store_offline("tasks", "t1", vec![1, 2]).unwrap();
    source.store_offline("projects", "p1", vec![3]).unwrap();
    source
        .enqueue(MutationKind::Update, "tasks", "t1", Some(vec![1, 2]), Priority::High)
        .unwrap();
    source
        .enqueue(MutationKind::Delete, "projects", "p2", None, Priority::Low)
        .unwrap();

    let exported = source.export().unwrap();

    let (target, _) = make_engine(EngineConfig::default());
    target.store_offline("stale", "s1", vec![9]).unwrap();
    target.import(&exported).unwrap();

    // Import fully replaced records and queue
    assert!(target.get_offline("stale", "s1").is_none());
    let original = EngineSnapshot::decode(&exported).unwrap();
    let reexported = EngineSnapshot::decode(&target.export().unwrap()).unwrap();
    assert_eq!(reexported.records, original.records);
    assert_eq!(reexported.queue, original.queue);
}

#[test]
fn malformed_import_leaves_state_untouched() {
    let (engine, _) = make_engine(EngineConfig::default());
    engine.store_offline("tasks", "t1", vec![1]).unwrap();
    engine
        .enqueue(MutationKind::Update, "tasks", "t1", Some(vec![1]), Priority::Medium)
        .unwrap();

    let err = engine.import(b"definitely not a snapshot").unwrap_err();
    assert!(matches!(err, EngineError::ImportFormat(_)));

    assert!(engine.get_offline("tasks", "t1").is_some());
    assert_eq!(engine.queue_len(), 1);
}

#[test]
fn server_wins_reconciliation_accepts_remote() {
    let config = EngineConfig::default().with_conflict_policy(ConflictPolicy::ServerWins);
    let (engine, transport) = make_engine(config);

    let local = engine
        .store_offline("tasks", "t1", cbor(&serde_json::json!({"title": "local"})))
        .unwrap();
    let remote_payload = cbor(&serde_json::json!({"title": "remote"}));
    transport.seed_remote(
        "tasks",
        "t1",
        RemoteRecord::new(remote_payload.clone(), local.last_modified + 1),
    );

    engine.set_online(true);
    engine.sync_now().unwrap();

    let record = engine.get_offline("tasks", "t1").unwrap();
    assert_eq!(record.payload, remote_payload);
    assert_eq!(record.last_modified, local.last_modified + 1);
    assert_eq!(record.sync_status, SyncStatus::Synced);
}

#[test]
fn client_wins_reconciliation_pushes_local() {
    let config = EngineConfig::default().with_conflict_policy(ConflictPolicy::ClientWins);
    let (engine, transport) = make_engine(config);

    let payload = cbor(&serde_json::json!({"title": "local"}));
    let local = engine.store_offline("tasks", "t1", payload.clone()).unwrap();
    transport.seed_remote(
        "tasks",
        "t1",
        RemoteRecord::new(cbor(&serde_json::json!({"title": "remote"})), local.last_modified + 1),
    );

    engine.set_online(true);
    engine.sync_now().unwrap();

    // Local payload unchanged, pushed to the remote endpoint
    let record = engine.get_offline("tasks", "t1").unwrap();
    assert_eq!(record.payload, payload);
    assert!(record.is_synced());
    assert_eq!(
        transport.remote_record("tasks", "t1").unwrap().payload,
        payload
    );
}

#[test]
fn merge_policy_pushes_shallow_union() {
    let config = EngineConfig::default().with_conflict_policy(ConflictPolicy::Merge);
    let (engine, transport) = make_engine(config);

    let local = engine
        .store_offline(
            "tasks",
            "t1",
            cbor(&serde_json::json!({"title": "local", "owner": "ada"})),
        )
        .unwrap();
    transport.seed_remote(
        "tasks",
        "t1",
        RemoteRecord::new(
            cbor(&serde_json::json!({"title": "remote", "status": "done"})),
            local.last_modified + 1,
        ),
    );

    engine.set_online(true);
    engine.sync_now().unwrap();

    let record = engine.get_offline("tasks", "t1").unwrap();
    assert!(record.is_synced());
    assert_eq!(record.last_modified, local.last_modified + 1);
    assert_eq!(
        decode(&record.payload),
        serde_json::json!({"title": "local", "status": "done", "owner": "ada"})
    );
    // The merged record is what was pushed
    assert_eq!(
        transport.remote_record("tasks", "t1").unwrap().payload,
        record.payload
    );
}

#[test]
fn manual_conflict_waits_for_arbitration() {
    let config = EngineConfig::default().with_conflict_policy(ConflictPolicy::Manual);
    let (engine, transport) = make_engine(config);
    let conflicts = collect(&engine, EventKind::ConflictDetected);

    let payload = cbor(&serde_json::json!({"title": "local"}));
    let local = engine.store_offline("tasks", "t1", payload.clone()).unwrap();
    transport.seed_remote(
        "tasks",
        "t1",
        RemoteRecord::new(cbor(&serde_json::json!({"title": "remote"})), local.last_modified + 1),
    );

    engine.set_online(true);
    engine.sync_now().unwrap();

    // Flagged, untouched, and the event carries both versions
    let record = engine.get_offline("tasks", "t1").unwrap();
    assert_eq!(record.sync_status, SyncStatus::Conflict);
    assert_eq!(record.payload, payload);
    assert_eq!(conflicts.lock().len(), 1);
    match &conflicts.lock()[0] {
        EngineEvent::ConflictDetected { local, remote } => {
            assert_eq!(local.payload, payload);
            assert_eq!(remote.payload, cbor(&serde_json::json!({"title": "remote"})));
        }
        other => panic!("unexpected event {other:?}"),
    }

    // A further pass never auto-clears the conflict
    engine.sync_now().unwrap();
    assert_eq!(conflicts.lock().len(), 1);
    assert_eq!(
        engine.get_offline("tasks", "t1").unwrap().sync_status,
        SyncStatus::Conflict
    );

    // Arbitration: keep the local version, then sync pushes it
    engine
        .resolve_conflict("tasks", "t1", ConflictChoice::KeepLocal)
        .unwrap();
    engine.sync_now().unwrap();

    let record = engine.get_offline("tasks", "t1").unwrap();
    assert!(record.is_synced());
    assert_eq!(
        transport.remote_record("tasks", "t1").unwrap().payload,
        payload
    );
}

#[test]
fn accept_remote_arbitration_adopts_remote_version() {
    let config = EngineConfig::default().with_conflict_policy(ConflictPolicy::Manual);
    let (engine, transport) = make_engine(config);

    let local = engine
        .store_offline("tasks", "t1", cbor(&serde_json::json!({"title": "local"})))
        .unwrap();
    let remote = RemoteRecord::new(
        cbor(&serde_json::json!({"title": "remote"})),
        local.last_modified + 1,
    );
    transport.seed_remote("tasks", "t1", remote.clone());

    engine.set_online(true);
    engine.sync_now().unwrap();
    assert_eq!(
        engine.get_offline("tasks", "t1").unwrap().sync_status,
        SyncStatus::Conflict
    );

    engine
        .resolve_conflict("tasks", "t1", ConflictChoice::AcceptRemote(remote.clone()))
        .unwrap();

    let record = engine.get_offline("tasks", "t1").unwrap();
    assert_eq!(record.payload, remote.payload);
    assert_eq!(record.last_modified, remote.last_modified);
    assert!(record.is_synced());
}

#[test]
fn eviction_reports_data_cleanup() {
    let config = EngineConfig::default().with_storage_budget(650);
    let (engine, _) = make_engine(config);
    let cleanups = collect(&engine, EventKind::DataCleanup);

    for i in 0..9 {
        engine
            .store_offline("tasks", &format!("t{i}"), vec![0; 8])
            .unwrap();
    }

    assert_eq!(cleanups.lock().len(), 1);
    match cleanups.lock()[0] {
        EngineEvent::DataCleanup { removed } => assert_eq!(removed, 2),
        ref other => panic!("unexpected event {other:?}"),
    }
    assert!(engine.get_offline("tasks", "t0").is_none());
    assert!(engine.get_offline("tasks", "t8").is_some());
    assert_eq!(engine.stats().records_evicted, 2);
}

#[test]
fn file_backend_survives_restart_then_syncs() {
    let dir = tempfile::tempdir().unwrap();

    {
        let backend = Arc::new(FileBackend::open(dir.path()).unwrap());
        let (engine, _) = make_engine_on(EngineConfig::default(), backend);
        engine.store_offline("tasks", "t1", vec![7]).unwrap();
        engine
            .enqueue(MutationKind::Create, "tasks", "t1", Some(vec![7]), Priority::High)
            .unwrap();
        engine.shutdown().unwrap();
    }

    let backend = Arc::new(FileBackend::open(dir.path()).unwrap());
    let (engine, transport) = make_engine_on(EngineConfig::default(), backend);

    assert_eq!(engine.get_offline("tasks", "t1").unwrap().payload, vec![7]);
    assert_eq!(engine.queue_len(), 1);

    engine.set_online(true);
    engine.sync_now().unwrap();
    assert_eq!(engine.queue_len(), 0);
    assert_eq!(transport.calls(), vec!["create tasks/t1"]);
}

#[test]
fn driver_syncs_in_background() {
    let config = EngineConfig::default().with_sync_interval(Duration::from_millis(50));
    let (engine, _) = make_engine(config);
    engine.set_online(true);

    engine
        .enqueue(MutationKind::Create, "tasks", "t1", Some(vec![1]), Priority::Medium)
        .unwrap();

    let driver = SyncDriver::start(Arc::clone(&engine));
    std::thread::sleep(Duration::from_millis(500));
    driver.stop();

    assert_eq!(engine.queue_len(), 0);
    assert!(engine.stats().passes_completed >= 1);
}

#[test]
fn coming_online_triggers_sync() {
    let config = EngineConfig::default()
        .with_sync_interval(Duration::from_secs(60))
        .with_auto_sync(false);
    let (engine, _) = make_engine(config);

    engine
        .enqueue(MutationKind::Create, "tasks", "t1", Some(vec![1]), Priority::Medium)
        .unwrap();

    let driver = SyncDriver::start(Arc::clone(&engine));
    std::thread::sleep(Duration::from_millis(50));

    // The transition signal wakes the driver well before the interval
    engine.set_online(true);
    std::thread::sleep(Duration::from_millis(500));
    driver.stop();

    assert_eq!(engine.queue_len(), 0);
}

#[test]
fn critical_enqueue_triggers_immediate_sync() {
    let config = EngineConfig::default()
        .with_sync_interval(Duration::from_secs(60))
        .with_auto_sync(false);
    let (engine, _) = make_engine(config);
    engine.set_online(true);

    let driver = SyncDriver::start(Arc::clone(&engine));
    std::thread::sleep(Duration::from_millis(50));

    engine
        .enqueue(MutationKind::Create, "tasks", "t1", Some(vec![1]), Priority::Critical)
        .unwrap();
    std::thread::sleep(Duration::from_millis(500));
    driver.stop();

    assert_eq!(engine.queue_len(), 0);
}
