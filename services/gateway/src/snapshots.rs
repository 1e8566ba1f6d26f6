//! Periodic persistence of the engine's documents

use crate::state::AppState;
use anyhow::Context;
use chrono::Utc;
use marketplace::{Marketplace, MarketplaceState};
use persistence::{
    Snapshot, SnapshotCleanupPolicy, SnapshotIntervalPolicy, SnapshotLoader, SnapshotWriter,
};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

pub struct SnapshotStore {
    writer: SnapshotWriter,
    loader: SnapshotLoader,
    cleanup: SnapshotCleanupPolicy,
    policy: Mutex<SnapshotIntervalPolicy>,
    min_changes: u64,
    compress: bool,
}

/// Documents recovered at startup
pub struct Restored {
    pub market: Marketplace,
    pub revision: u64,
    pub path: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: &Path, compress: bool, retain: usize, min_changes: u64) -> Self {
        Self {
            writer: SnapshotWriter::new(dir, compress),
            loader: SnapshotLoader::new(dir),
            cleanup: SnapshotCleanupPolicy::new(retain),
            policy: Mutex::new(SnapshotIntervalPolicy::with_interval(min_changes, 0)),
            min_changes,
            compress,
        }
    }

    /// Load the newest snapshot that passes its integrity check. Damaged
    /// files are skipped in favor of older ones.
    pub fn restore(&self) -> anyhow::Result<Option<Restored>> {
        let snapshots = self
            .loader
            .list_snapshots()
            .context("listing snapshots")?;

        for (sequence, path) in snapshots.into_iter().rev() {
            match self.loader.load::<MarketplaceState>(&path) {
                Ok(snapshot) => {
                    self.reset_policy(snapshot.sequence);
                    info!(
                        path = %path.display(),
                        revision = snapshot.sequence,
                        "restored snapshot"
                    );
                    return Ok(Some(Restored {
                        market: Marketplace::from_state(snapshot.state),
                        revision: snapshot.sequence,
                        path,
                    }));
                }
                Err(e) => {
                    warn!(path = %path.display(), sequence, error = %e, "skipping unreadable snapshot")
                }
            }
        }
        Ok(None)
    }

    fn reset_policy(&self, revision: u64) {
        if let Ok(mut policy) = self.policy.lock() {
            *policy = SnapshotIntervalPolicy::with_interval(self.min_changes, revision);
        }
    }

    fn is_due(&self, revision: u64, force: bool) -> bool {
        match self.policy.lock() {
            Ok(policy) if force => revision > policy.last_snapshot_seq,
            Ok(policy) => policy.should_snapshot(revision),
            Err(_) => true,
        }
    }

    /// Write a snapshot if enough has changed since the last one (or, when
    /// `force` is set, if anything has). Returns the new file's path.
    pub async fn snapshot(&self, state: &AppState, force: bool) -> anyhow::Result<Option<PathBuf>> {
        if !self.is_due(state.revision(), force) {
            return Ok(None);
        }

        // Revision is bumped under the write lock, so this pair is consistent
        let (documents, revision) = {
            let market = state.market.read().await;
            (market.state().clone(), state.revision())
        };

        let writer = self.writer.clone();
        let cleanup = self.cleanup.clone();
        let dir = self.writer.dir().to_path_buf();
        let compress = self.compress;
        let path = tokio::task::spawn_blocking(move || -> anyhow::Result<PathBuf> {
            let snapshot = Snapshot::new(
                revision,
                Utc::now().timestamp_millis(),
                documents,
                compress,
            )?;
            let path = writer.write(&snapshot)?;
            let removed = cleanup.cleanup(&dir)?;
            if !removed.is_empty() {
                info!(removed = removed.len(), "pruned old snapshots");
            }
            Ok(path)
        })
        .await
        .context("snapshot task panicked")??;

        if let Ok(mut policy) = self.policy.lock() {
            policy.record_snapshot(revision);
        }
        info!(path = %path.display(), revision, "snapshot written");
        Ok(Some(path))
    }
}
