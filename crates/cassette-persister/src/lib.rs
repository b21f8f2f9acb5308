//! Cassette Persister
//!
//! This crate buffers recorded requests per recording and flushes them to a
//! pluggable [`RecordingBackend`](cassette_core::RecordingBackend):
//! - Pending-request buffering (`record_request`)
//! - Concurrent all-or-nothing flushes (`persist`)
//! - Cache-through reads and cache-evicting writes (`find`, `save`, `delete`)
//! - Replay lookups (`find_entry`)

mod cache;
mod pending;
pub mod persister;

pub use pending::PendingBucket;
pub use persister::{Persister, PersisterBuilder};
