//! Durable persistence for the index+store pair.
//!
//! A snapshot is captured atomically under the commit lock, then
//! serialized and written off-lock through a pluggable byte backend.

mod backend;
mod manager;
mod snapshot;

pub use backend::{FileBackend, PersistenceBackend};
pub use manager::PersistenceManager;
pub use snapshot::{Snapshot, SnapshotError};
