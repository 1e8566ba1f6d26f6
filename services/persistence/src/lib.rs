//! Persistence Service
//!
//! Durable storage for the marketplace documents: the engine's full state is
//! periodically written as a checksummed, optionally compressed snapshot and
//! the newest valid snapshot is loaded back on startup.

pub mod snapshot;

pub use snapshot::{
    compute_hash, Snapshot, SnapshotCleanupPolicy, SnapshotError, SnapshotIntervalPolicy,
    SnapshotLoader, SnapshotWriter, SNAPSHOT_VERSION,
};
