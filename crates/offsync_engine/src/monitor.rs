//! Network reachability and quality monitoring.

use crate::events::{EngineEvent, EventBus};
use offsync_protocol::Timestamp;
use offsync_store::now_ms;
use parking_lot::RwLock;
use std::sync::Arc;

/// Coarse classification of the current network link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClass {
    /// Wireless LAN.
    Wifi,
    /// Mobile data.
    Cellular,
    /// Wired connection.
    Wired,
    /// Unknown link type.
    Unknown,
}

/// A snapshot of network reachability and quality.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkState {
    /// Whether the network is reachable.
    pub is_online: bool,
    /// Link classification from the last probe.
    pub link: LinkClass,
    /// Latency of the last probe in milliseconds; `-1` if the probe
    /// failed.
    pub latency_ms: i64,
    /// When the state was last updated.
    pub last_checked_at: Timestamp,
}

/// Result of one quality probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSample {
    /// Round-trip latency in milliseconds.
    pub latency_ms: u64,
    /// Observed link classification.
    pub link: LinkClass,
}

/// Measures reachability and latency with a lightweight round trip.
///
/// A failing probe only affects the quality figures; it is not proof of
/// disconnection and never forces the monitor offline.
pub trait ReachabilityProbe: Send + Sync {
    /// Runs one probe, returning latency and link classification.
    fn probe(&self) -> Result<ProbeSample, String>;
}

/// Tracks reachability signals and quality probes.
///
/// The monitor is a two-state machine (online/offline) driven by host
/// connectivity callbacks via [`NetworkMonitor::set_online`]. Entering
/// the online state triggers an immediate quality probe; while online,
/// [`NetworkMonitor::refresh`] re-probes periodically. Every transition
/// emits a `NetworkChanged` event carrying the full state snapshot.
pub struct NetworkMonitor {
    state: RwLock<NetworkState>,
    probe: Arc<dyn ReachabilityProbe>,
    bus: Arc<EventBus>,
}

impl NetworkMonitor {
    /// Creates a monitor in the offline state.
    pub fn new(probe: Arc<dyn ReachabilityProbe>, bus: Arc<EventBus>) -> Self {
        Self {
            state: RwLock::new(NetworkState {
                is_online: false,
                link: LinkClass::Unknown,
                latency_ms: -1,
                last_checked_at: 0,
            }),
            probe,
            bus,
        }
    }

    /// Returns whether the network is currently reachable.
    pub fn is_online(&self) -> bool {
        self.state.read().is_online
    }

    /// Returns the current state snapshot.
    pub fn state(&self) -> NetworkState {
        self.state.read().clone()
    }

    /// Applies a host connectivity signal.
    ///
    /// Returns true if this was a transition. Entering the online state
    /// runs an immediate quality probe; transitions emit
    /// `NetworkChanged`.
    pub fn set_online(&self, online: bool) -> bool {
        if self.state.read().is_online == online {
            return false;
        }

        // Probe outside the lock so readers are not blocked on I/O.
        let probed = if online { Some(self.probe.probe()) } else { None };

        let snapshot = {
            let mut state = self.state.write();
            state.is_online = online;
            state.last_checked_at = now_ms();
            match probed {
                Some(Ok(sample)) => {
                    state.latency_ms = sample.latency_ms as i64;
                    state.link = sample.link;
                }
                Some(Err(reason)) => {
                    tracing::debug!(%reason, "quality probe failed on reconnect");
                    state.latency_ms = -1;
                }
                None => {
                    state.latency_ms = -1;
                    state.link = LinkClass::Unknown;
                }
            }
            state.clone()
        };

        tracing::info!(online, "network transition");
        self.bus.emit(EngineEvent::NetworkChanged(snapshot));
        true
    }

    /// Re-runs the quality probe while online.
    ///
    /// A probe failure sets `latency_ms = -1` but does not force the
    /// monitor offline. Offline, this is a no-op.
    pub fn refresh(&self) {
        if !self.state.read().is_online {
            return;
        }

        let probed = self.probe.probe();

        let mut state = self.state.write();
        state.last_checked_at = now_ms();
        match probed {
            Ok(sample) => {
                state.latency_ms = sample.latency_ms as i64;
                state.link = sample.link;
            }
            Err(reason) => {
                tracing::debug!(%reason, "quality probe failed");
                state.latency_ms = -1;
            }
        }
    }
}
