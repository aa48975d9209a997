//! Disk Tier
//!
//! Content-addressed file store: one JSON envelope per key at
//! `<root>/<hex(sha256(key))[0:2]>/<hex(sha256(key))>.json`.

use crate::cache::compression::{CompressionConfig, CompressionManager};
use crate::cache::entry::{expiry_from_now, now_ms};
use crate::cache::metrics::{DiskMetrics, DiskStatsSnapshot};
use crate::cache::storage::{ColdStore, DiskEnvelope, DiskRead, SweepReport, WriteOutcome};
use crate::cache::Closeable;
use crate::error::{Error, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

/// Default lifetime of disk entries: 24 hours
pub const DEFAULT_DISK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Files examined before a sweep yields
pub const DEFAULT_DISK_SWEEP_BATCH: usize = 128;

const ENVELOPE_EXTENSION: &str = "json";
const HEALTH_CHECK_FILE: &str = ".health_check";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a disk tier
#[derive(Debug, Clone)]
pub struct DiskTierConfig {
    /// Directory owned exclusively by this tier
    pub root: PathBuf,
    pub default_ttl: Duration,
    /// Maximum number of files kept after a sweep (None = unbounded)
    pub max_entries: Option<usize>,
    pub compression: CompressionConfig,
    pub sweep_batch: usize,
}

impl DiskTierConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            default_ttl: DEFAULT_DISK_TTL,
            max_entries: None,
            compression: CompressionConfig::default(),
            sweep_batch: DEFAULT_DISK_SWEEP_BATCH,
        }
    }
}

// =============================================================================
// Disk Tier
// =============================================================================

/// Cold tier persisted as one file per key
pub struct DiskTier {
    root: PathBuf,
    default_ttl: Duration,
    max_entries: Option<usize>,
    sweep_batch: usize,
    compression: CompressionManager,
    metrics: DiskMetrics,
    closed: AtomicBool,
}

impl DiskTier {
    /// Create the tier, creating its root directory if needed
    pub async fn new(config: DiskTierConfig) -> Result<Self> {
        fs::create_dir_all(&config.root)
            .await
            .map_err(|e| Error::disk_io(&config.root, e))?;

        debug!(root = %config.root.display(), "Disk tier ready");

        Ok(Self {
            root: config.root,
            default_ttl: config.default_ttl,
            max_entries: config.max_entries,
            sweep_batch: config.sweep_batch.max(1),
            compression: CompressionManager::new(config.compression),
            metrics: DiskMetrics::default(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for a key
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.root
            .join(&digest[..2])
            .join(format!("{}.{}", digest, ENVELOPE_EXTENSION))
    }

    /// Remove a file, reporting whether it existed
    async fn remove_file(&self, path: &Path) -> bool {
        match fs::remove_file(path).await {
            Ok(()) => {
                self.metrics.record_remove();
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                self.metrics.record_io_error();
                warn!(path = %path.display(), error = %e, "Failed to remove cache file");
                false
            }
        }
    }

    async fn read_envelope(&self, path: &Path) -> std::result::Result<DiskEnvelope, DiskRead> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            // Deleted between lookups, or never written
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(DiskRead::Absent),
            Err(e) => return Err(DiskRead::IoError(e)),
        };
        serde_json::from_slice(&raw).map_err(|e| DiskRead::Corrupt(corrupt(path, e)))
    }

    /// List envelope files under the root
    async fn list_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut shards = match fs::read_dir(&self.root).await {
            Ok(shards) => shards,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(Error::disk_io(&self.root, e)),
        };

        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let mut entries = match fs::read_dir(shard.path()).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(shard = %shard.path().display(), error = %e, "Skipping unreadable shard");
                    continue;
                }
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().map_or(false, |ext| ext == ENVELOPE_EXTENSION) {
                    files.push(path);
                }
            }
        }
        Ok(files)
    }
}

fn corrupt(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::CorruptEntry {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl ColdStore for DiskTier {
    async fn read(&self, key: &str) -> DiskRead {
        self.metrics.record_read();
        let path = self.path_for(key);

        let envelope = match self.read_envelope(&path).await {
            Ok(envelope) => envelope,
            Err(outcome) => {
                match &outcome {
                    DiskRead::Absent => self.metrics.record_miss(),
                    DiskRead::Corrupt(reason) => {
                        self.metrics.record_corrupt();
                        warn!(key = %key, path = %path.display(), reason = %reason, "Corrupt cache envelope");
                    }
                    DiskRead::IoError(e) => {
                        self.metrics.record_io_error();
                        warn!(key = %key, path = %path.display(), error = %e, "Disk read failed");
                    }
                    DiskRead::Value { .. } => {}
                }
                return outcome;
            }
        };

        if envelope.is_expired_at(now_ms()) {
            if self.remove_file(&path).await {
                self.metrics.record_expired(1);
            }
            self.metrics.record_miss();
            return DiskRead::Absent;
        }

        match envelope.decode(&self.compression) {
            Ok(value) => {
                self.metrics.record_hit();
                DiskRead::Value {
                    value,
                    expires_at_ms: envelope.expires_at,
                }
            }
            Err(e) => {
                self.metrics.record_corrupt();
                warn!(key = %key, path = %path.display(), error = %e, "Undecodable cache payload");
                DiskRead::Corrupt(corrupt(&path, e))
            }
        }
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> Result<WriteOutcome> {
        let path = self.path_for(key);
        let envelope = DiskEnvelope::encode(value, now_ms(), expiry_from_now(ttl), &self.compression)?;
        let json = serde_json::to_vec(&envelope)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::disk_io(parent, e))?;
        }
        let existed = fs::try_exists(&path).await.unwrap_or(false);

        if let Err(e) = fs::write(&path, &json).await {
            self.metrics.record_io_error();
            return Err(Error::disk_io(path, e));
        }

        self.metrics.record_write(json.len(), envelope.compressed, !existed);
        debug!(
            key = %key,
            bytes = json.len(),
            compressed = envelope.compressed,
            "Wrote cache envelope"
        );

        Ok(WriteOutcome {
            compressed: envelope.compressed,
            bytes: json.len(),
        })
    }

    async fn delete(&self, key: &str) -> bool {
        self.remove_file(&self.path_for(key)).await
    }

    async fn has(&self, key: &str) -> bool {
        fs::try_exists(self.path_for(key)).await.unwrap_or(false)
    }

    /// Unexpired and decodable, so a following `read` would hit
    async fn is_live(&self, key: &str) -> bool {
        match self.read_envelope(&self.path_for(key)).await {
            Ok(envelope) => {
                !envelope.is_expired_at(now_ms()) && envelope.decode(&self.compression).is_ok()
            }
            Err(_) => false,
        }
    }

    async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let files = match self.list_files().await {
            Ok(files) => files,
            Err(e) => {
                self.metrics.record_io_error();
                warn!(root = %self.root.display(), error = %e, "Disk sweep could not list files");
                report.errors += 1;
                return report;
            }
        };

        let now = now_ms();
        let mut live: Vec<(i64, PathBuf)> = Vec::new();

        for (i, path) in files.into_iter().enumerate() {
            if i > 0 && i % self.sweep_batch == 0 {
                tokio::task::yield_now().await;
            }
            report.scanned += 1;

            match self.read_envelope(&path).await {
                Ok(envelope) if envelope.is_expired_at(now) => {
                    if self.remove_file(&path).await {
                        report.expired += 1;
                    }
                }
                Ok(envelope) => live.push((envelope.created_at, path)),
                Err(DiskRead::Corrupt(reason)) => {
                    self.metrics.record_corrupt();
                    debug!(path = %path.display(), reason = %reason, "Removing corrupt envelope");
                    if self.remove_file(&path).await {
                        report.corrupt += 1;
                    }
                }
                Err(DiskRead::IoError(e)) => {
                    self.metrics.record_io_error();
                    warn!(path = %path.display(), error = %e, "Skipping unreadable envelope");
                    report.errors += 1;
                }
                // Removed concurrently
                Err(_) => {}
            }
        }

        if let Some(max) = self.max_entries {
            if live.len() > max {
                live.sort_by_key(|(created_at, _)| *created_at);
                let excess = live.len() - max;
                for (_, path) in live.drain(..excess) {
                    if self.remove_file(&path).await {
                        report.evicted += 1;
                    }
                }
            }
        }

        report.remaining = live.len();
        self.metrics.record_expired(report.expired as u64);
        self.metrics.record_evictions(report.evicted as u64);
        self.metrics.set_entries(live.len() as u64);

        if report.expired + report.corrupt + report.evicted > 0 {
            debug!(
                root = %self.root.display(),
                scanned = report.scanned,
                expired = report.expired,
                corrupt = report.corrupt,
                evicted = report.evicted,
                "Disk sweep finished"
            );
        }
        report
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::disk_io(&self.root, e)),
        }
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::disk_io(&self.root, e))?;
        self.metrics.set_entries(0);
        info!(root = %self.root.display(), "Disk tier cleared");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let probe = self.root.join(HEALTH_CHECK_FILE);
        match fs::write(&probe, b"ok").await {
            Ok(()) => {
                let _ = fs::remove_file(&probe).await;
                true
            }
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "Disk tier health check failed");
                false
            }
        }
    }

    fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn stats(&self) -> DiskStatsSnapshot {
        self.metrics.snapshot()
    }
}

impl Closeable for DiskTier {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
