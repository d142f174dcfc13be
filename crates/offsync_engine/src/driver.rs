//! Background auto-sync driver.

use crate::engine::OfflineEngine;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Wakeup signal between the engine and its driver thread.
///
/// A critical-priority enqueue, an offline-to-online transition, or an
/// explicit sync request sets the flag and wakes the driver instead of
/// waiting for the next tick.
#[derive(Default)]
pub struct SyncSignal {
    flag: Mutex<bool>,
    condvar: Condvar,
}

impl SyncSignal {
    /// Creates a new unsignalled instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests an immediate sync, waking a waiting driver.
    pub fn request(&self) {
        *self.flag.lock() = true;
        self.condvar.notify_one();
    }

    /// Waits until signalled or the timeout elapses.
    ///
    /// Returns true if a sync was requested; the flag is consumed.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut flag = self.flag.lock();
        if !*flag {
            self.condvar.wait_for(&mut flag, timeout);
        }
        std::mem::take(&mut *flag)
    }
}

/// Runs the periodic sync loop on a dedicated thread.
///
/// Each iteration waits for the engine's sync interval (or an early
/// wakeup signal), re-probes network quality, and runs a sync pass when
/// auto-sync is enabled and the network is online. The engine's
/// single-flight guard makes a racing explicit `sync_now` harmless.
pub struct SyncDriver {
    engine: Arc<OfflineEngine>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SyncDriver {
    /// Spawns the driver thread for an engine.
    pub fn start(engine: Arc<OfflineEngine>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let engine = Arc::clone(&engine);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                tracing::debug!("sync driver started");
                let interval = engine.config().sync_interval;

                loop {
                    let signalled = engine.sync_signal().wait_for(interval);
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }

                    engine.refresh_network();

                    let due = engine.config().auto_sync_enabled && engine.network_state().is_online;
                    if signalled || due {
                        if let Err(e) = engine.sync_now() {
                            tracing::debug!(error = %e, "scheduled sync pass failed");
                        }
                    }
                }

                tracing::debug!("sync driver stopped");
            })
        };

        Self {
            engine,
            stop,
            handle: Some(handle),
        }
    }

    /// Stops the driver and joins its thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.store(true, Ordering::SeqCst);
            self.engine.sync_signal().request();
            let _ = handle.join();
        }
    }
}

impl Drop for SyncDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
