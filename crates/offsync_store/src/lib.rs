//! # offsync Store
//!
//! Durable local storage with budget enforcement for offsync.
//!
//! This crate provides:
//! - `StateBackend` trait for keyed-blob persistence
//! - `InMemoryBackend` and `FileBackend` implementations
//! - `PayloadCodec` hook for compression/encryption at rest
//! - `LogicalClock` for strictly increasing timestamps
//! - `OfflineStore`, the budget-enforcing record store
//!
//! ## Design Principles
//!
//! - Backends are opaque keyed blob stores; the store owns all format
//!   interpretation
//! - Writes are synchronous: in-memory mutation plus a persistence flush
//! - When usage exceeds the configured budget, the oldest 25% of records
//!   by creation time are evicted before the write proceeds

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod clock;
mod codec;
mod error;
mod file;
mod memory;
mod store;

pub use backend::StateBackend;
pub use clock::{now_ms, LogicalClock};
pub use codec::{CodecBackend, IdentityCodec, PayloadCodec};
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use store::{OfflineStore, PutOutcome, QUEUE_COLLECTION, RECORDS_COLLECTION};
