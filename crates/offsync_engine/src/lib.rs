//! # offsync Engine
//!
//! Offline-first synchronization engine for offsync.
//!
//! This crate provides:
//! - Sync orchestrator state machine (idle → syncing → idle)
//! - Network reachability and quality monitoring
//! - Priority-aware queue draining with bounded retries
//! - Conflict reconciliation under a configurable policy
//! - Typed event bus for lifecycle notifications
//! - HTTP transport abstraction and a background sync driver
//!
//! ## Architecture
//!
//! The engine implements a **drain-then-reconcile** synchronization
//! model:
//! 1. Drain the mutation queue against the remote endpoint
//! 2. Reconcile stored records against their remote counterparts
//! 3. Notify observers of progress, conflicts, and failures
//!
//! Local writes are synchronous (in-memory plus a persistence flush) and
//! never block on the network; all I/O suspension happens inside the
//! transport and probe seams.
//!
//! ## Key Invariants
//!
//! - At most one sync pass is in flight per engine
//! - Queue entries drain critical-first, FIFO within a priority class
//! - A single probe failure never forces the monitor offline
//! - Conflicted records change only through explicit arbitration

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod driver;
mod engine;
mod error;
mod events;
mod http;
mod monitor;
mod transport;

pub use config::EngineConfig;
pub use driver::SyncDriver;
pub use engine::{
    ConflictChoice, OfflineEngine, PassOutcome, PassSummary, SyncPhase, SyncStats,
};
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventBus, EventKind, SubscriptionId};
pub use http::{HttpClient, HttpProbe, HttpRemote, HttpResponse};
pub use monitor::{LinkClass, NetworkMonitor, NetworkState, ProbeSample, ReachabilityProbe};
pub use transport::{MockTransport, RemoteTransport};
