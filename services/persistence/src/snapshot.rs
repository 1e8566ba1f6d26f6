//! Snapshot System: document snapshots with integrity and compression
//!
//! Features:
//! - Serializes any document set (`T: Serialize + DeserializeOwned`) with bincode
//! - SHA-256 integrity hash over the serialized state
//! - Optional zstd compression
//! - Snapshot versioning for forward compatibility
//! - Change-count policy deciding when a new snapshot is due
//! - Cleanup policy (keep last N)
//!
//! The hash is only stable if `T` serializes deterministically, so document
//! sets should use `BTreeMap` rather than `HashMap`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("No snapshots found")]
    NoSnapshots,
}

/// Deterministic SHA-256 hex digest of a document set.
pub fn compute_hash<T: Serialize>(state: &T) -> Result<String, SnapshotError> {
    let bytes =
        bincode::serialize(state).map_err(|e| SnapshotError::Serialization(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

// ── Snapshot ────────────────────────────────────────────────────────

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A complete copy of the documents at a given revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    /// Snapshot format version for forward compatibility.
    pub version: u32,
    /// Number of applied mutations when the snapshot was taken.
    pub sequence: u64,
    /// Unix millisecond timestamp when the snapshot was taken.
    pub timestamp: i64,
    pub state: T,
    /// SHA-256 hash of the serialized state.
    pub checksum: String,
    /// Whether the data on disk is zstd-compressed.
    pub compressed: bool,
}

impl<T: Serialize> Snapshot<T> {
    /// Create a new snapshot with computed integrity hash.
    pub fn new(
        sequence: u64,
        timestamp: i64,
        state: T,
        compressed: bool,
    ) -> Result<Self, SnapshotError> {
        let checksum = compute_hash(&state)?;
        Ok(Self {
            version: SNAPSHOT_VERSION,
            sequence,
            timestamp,
            state,
            checksum,
            compressed,
        })
    }

    /// Verify the snapshot's integrity hash.
    pub fn verify_integrity(&self) -> bool {
        compute_hash(&self.state)
            .map(|computed| computed == self.checksum)
            .unwrap_or(false)
    }
}

// ── Snapshot Writer ─────────────────────────────────────────────────

/// Writes snapshots to disk with optional zstd compression.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
    compress: bool,
}

impl SnapshotWriter {
    /// Create a new writer. `compress` enables zstd compression.
    pub fn new(dir: impl Into<PathBuf>, compress: bool) -> Self {
        Self {
            dir: dir.into(),
            compress,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a snapshot atomically: serialize → compress → write tmp → fsync → rename.
    pub fn write<T: Serialize>(&self, snapshot: &Snapshot<T>) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.dir)?;

        let data = bincode::serialize(snapshot)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        let (final_data, ext) = if self.compress {
            let compressed = zstd::encode_all(data.as_slice(), 3)
                .map_err(|e| SnapshotError::Compression(e.to_string()))?;
            (compressed, "snap.zst")
        } else {
            (data, "snap")
        };

        let filename = format!("snapshot-{:012}.{}", snapshot.sequence, ext);
        let path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!("{}.tmp", filename));

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&final_data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        Ok(path)
    }
}

// ── Snapshot Loader ─────────────────────────────────────────────────

/// Loads snapshots from disk, verifying integrity.
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    dir: PathBuf,
}

impl SnapshotLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load a specific snapshot file.
    pub fn load<T>(&self, path: &Path) -> Result<Snapshot<T>, SnapshotError>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let is_compressed = path.extension().map(|e| e == "zst").unwrap_or(false);

        let decompressed = if is_compressed {
            zstd::decode_all(data.as_slice())
                .map_err(|e| SnapshotError::Compression(e.to_string()))?
        } else {
            data
        };

        let snapshot: Snapshot<T> = bincode::deserialize(&decompressed)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }

        let actual = compute_hash(&snapshot.state)?;
        if actual != snapshot.checksum {
            return Err(SnapshotError::IntegrityFailure {
                expected: snapshot.checksum.clone(),
                actual,
            });
        }

        Ok(snapshot)
    }

    /// Load the latest snapshot (highest sequence number).
    pub fn load_latest<T>(&self) -> Result<Snapshot<T>, SnapshotError>
    where
        T: Serialize + DeserializeOwned,
    {
        let path = self.find_latest()?;
        self.load(&path)
    }

    /// Find the path to the latest snapshot.
    pub fn find_latest(&self) -> Result<PathBuf, SnapshotError> {
        self.list_snapshots()?
            .into_iter()
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, path)| path)
            .ok_or(SnapshotError::NoSnapshots)
    }

    /// List all snapshots as (sequence, path) pairs, ascending.
    pub fn list_snapshots(&self) -> Result<Vec<(u64, PathBuf)>, SnapshotError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("snapshot-")
                && (name.ends_with(".snap") || name.ends_with(".snap.zst"))
            {
                if let Some(seq) = Self::parse_sequence(&name) {
                    results.push((seq, entry.path()));
                }
            }
        }
        results.sort_by_key(|(seq, _)| *seq);
        Ok(results)
    }

    fn parse_sequence(filename: &str) -> Option<u64> {
        let stripped = filename
            .trim_start_matches("snapshot-")
            .trim_end_matches(".snap.zst")
            .trim_end_matches(".snap");
        stripped.parse::<u64>().ok()
    }
}

// ── Snapshot Interval Policy ────────────────────────────────────────

/// Decides whether enough has changed to justify a new snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotIntervalPolicy {
    /// Minimum number of mutations between snapshots.
    pub min_changes: u64,
    /// Sequence at which the last snapshot was taken.
    pub last_snapshot_seq: u64,
}

impl SnapshotIntervalPolicy {
    /// Snapshot after any change.
    pub fn on_any_change(last_snapshot_seq: u64) -> Self {
        Self::with_interval(1, last_snapshot_seq)
    }

    pub fn with_interval(min_changes: u64, last_snapshot_seq: u64) -> Self {
        Self {
            min_changes: min_changes.max(1),
            last_snapshot_seq,
        }
    }

    pub fn should_snapshot(&self, current_seq: u64) -> bool {
        current_seq >= self.last_snapshot_seq + self.min_changes
    }

    pub fn record_snapshot(&mut self, seq: u64) {
        self.last_snapshot_seq = seq;
    }
}

// ── Snapshot Cleanup Policy ─────────────────────────────────────────

/// Policy for cleaning up old snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotCleanupPolicy {
    /// Maximum number of snapshots to retain.
    pub max_snapshots: usize,
}

impl SnapshotCleanupPolicy {
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            max_snapshots: max_snapshots.max(1),
        }
    }

    /// Remove old snapshots, keeping only the most recent `max_snapshots`.
    pub fn cleanup(&self, dir: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
        let snapshots = SnapshotLoader::new(dir).list_snapshots()?;

        let mut removed = Vec::new();
        if snapshots.len() > self.max_snapshots {
            let to_remove = snapshots.len() - self.max_snapshots;
            for (_, path) in snapshots.into_iter().take(to_remove) {
                fs::remove_file(&path)?;
                removed.push(path);
            }
        }
        Ok(removed)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
