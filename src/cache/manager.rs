//! Tiered Cache Manager
//!
//! Coordinates the hot and warm in-memory tiers, the cold disk tier and the
//! access tracker. Reads go top-down; writes land in exactly one tier chosen
//! by the key's temperature. A key is held by at most one tier.

use crate::cache::access::AccessTracker;
use crate::cache::entry::{remaining_ttl, validate_key};
use crate::cache::events::CacheEvent;
use crate::cache::lru::{LruCache, LruConfig, LruStats};
use crate::cache::maintenance::PeriodicTask;
use crate::cache::memory::{MemoryProbe, SystemMemoryProbe};
use crate::cache::metrics::{CacheMetrics, CacheStatsSnapshot, DiskStatsSnapshot};
use crate::cache::storage::{ColdStore, DiskRead, DiskTier, DiskTierConfig, SweepReport};
use crate::cache::tier::{CacheTier, Temperature, TemperatureConfig};
use crate::cache::{CacheLookupResult, Closeable};
use crate::error::{Error, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Default period of the tier maintenance pass: 5 minutes
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Warm-tier keys examined before the rebalance pass yields
pub const DEFAULT_REBALANCE_BATCH: usize = 128;

pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Configuration for a tiered cache
#[derive(Debug, Clone)]
pub struct TieredCacheConfig {
    pub hot: LruConfig,
    pub warm: LruConfig,
    pub disk: DiskTierConfig,
    pub temperature: TemperatureConfig,
    /// Period of the sweep/rebalance/prune pass (None = manual only)
    pub maintenance_interval: Option<Duration>,
    pub rebalance_batch: usize,
    pub event_channel_capacity: usize,
}

impl TieredCacheConfig {
    pub fn new(
        hot: LruConfig,
        warm: LruConfig,
        disk: DiskTierConfig,
        temperature: TemperatureConfig,
    ) -> Self {
        Self {
            hot,
            warm,
            disk,
            temperature,
            maintenance_interval: Some(DEFAULT_MAINTENANCE_INTERVAL),
            rebalance_batch: DEFAULT_REBALANCE_BATCH,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.hot.validate()?;
        self.warm.validate()?;
        self.temperature.validate()?;
        if self.rebalance_batch == 0 {
            return Err(Error::Configuration("rebalance batch must be at least 1".into()));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::Configuration("event channel capacity must be at least 1".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Outcome of one maintenance pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub disk: SweepReport,
    /// Warm entries moved to disk
    pub demoted: usize,
    /// Access records dropped
    pub pruned: usize,
}

/// Detailed statistics of one tiered cache
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TieredCacheStats {
    pub name: String,
    pub hit_rate: f64,
    pub requests: CacheStatsSnapshot,
    pub hot: LruStats,
    pub warm: LruStats,
    pub disk: DiskStatsSnapshot,
    pub tracked_keys: usize,
}

/// Lifetime left on an entry, capped by the destination tier's default
fn capped_ttl(expires_at_ms: i64, cap: Duration) -> Option<Duration> {
    remaining_ttl(expires_at_ms).map(|remaining| remaining.min(cap))
}

// =============================================================================
// Tiered Cache
// =============================================================================

/// Hot/warm/cold cache placing keys by access frequency
pub struct TieredCache {
    name: String,
    hot: Arc<LruCache<Bytes>>,
    warm: Arc<LruCache<Bytes>>,
    disk: Arc<dyn ColdStore>,
    tracker: AccessTracker,
    rebalance_batch: usize,
    metrics: CacheMetrics,
    event_tx: broadcast::Sender<CacheEvent>,
    maintenance: Mutex<Option<PeriodicTask>>,
    closed: AtomicBool,
}

impl fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("name", &self.name)
            .field("hot", &self.hot.len())
            .field("warm", &self.warm.len())
            .field("tracked_keys", &self.tracker.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl TieredCache {
    /// Create a tiered cache from per-tier configs
    pub async fn new(
        name: impl Into<String>,
        hot: LruConfig,
        warm: LruConfig,
        disk: DiskTierConfig,
        temperature: TemperatureConfig,
    ) -> Result<Arc<Self>> {
        Self::with_config(name, TieredCacheConfig::new(hot, warm, disk, temperature)).await
    }

    /// Create a tiered cache backed by a `DiskTier`
    pub async fn with_config(name: impl Into<String>, config: TieredCacheConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let disk = DiskTier::new(config.disk.clone()).await?;
        Self::with_cold_store(name, config, Arc::new(disk))
    }

    /// Create a tiered cache over any cold store and start its timers
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_cold_store(
        name: impl Into<String>,
        config: TieredCacheConfig,
        disk: Arc<dyn ColdStore>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let name = name.into();

        let probe: Arc<dyn MemoryProbe> = Arc::new(SystemMemoryProbe::new());
        let hot = Arc::new(LruCache::with_probe(
            format!("{}-hot", name),
            config.hot.clone(),
            probe.clone(),
        )?);
        let warm = Arc::new(LruCache::with_probe(
            format!("{}-warm", name),
            config.warm.clone(),
            probe,
        )?);

        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);

        let cache = Arc::new(Self {
            name,
            hot,
            warm,
            disk,
            tracker: AccessTracker::new(config.temperature.clone()),
            rebalance_batch: config.rebalance_batch,
            metrics: CacheMetrics::new(),
            event_tx,
            maintenance: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        cache.start_maintenance(config.maintenance_interval)?;

        info!(
            partition = %cache.name,
            hot_capacity = config.hot.max_size,
            warm_capacity = config.warm.max_size,
            disk_root = %config.disk.root.display(),
            "Tiered cache initialized"
        );
        Ok(cache)
    }

    fn start_maintenance(self: &Arc<Self>, interval: Option<Duration>) -> Result<()> {
        self.hot.start_maintenance()?;
        self.warm.start_maintenance()?;

        let period = match interval {
            Some(period) => period,
            None => return Ok(()),
        };
        let weak = Arc::downgrade(self);
        let task = PeriodicTask::spawn(
            format!("{}-tier-maintenance", self.name),
            period,
            move || {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(cache) => {
                            cache.run_maintenance().await;
                            ControlFlow::Continue(())
                        }
                        None => ControlFlow::Break(()),
                    }
                }
            },
        )?;
        *self.maintenance.lock() = Some(task);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe to cache events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.event_tx.subscribe()
    }

    fn emit_event(&self, event: CacheEvent) {
        let _ = self.event_tx.send(event);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look up a key, reporting which tier answered
    ///
    /// Records one access before probing. Disk faults are absorbed as
    /// misses; a corrupt envelope is deleted.
    pub async fn lookup(&self, key: &str) -> CacheLookupResult {
        self.metrics.record_request();
        self.tracker.record(key);
        let temperature = self.tracker.temperature(key);

        if let Some(data) = self.hot.get(key) {
            return self.hit(key, CacheTier::Hot, data, false);
        }

        if let Some(data) = self.warm.get(key) {
            let promoted = temperature == Temperature::Hot && self.promote_from_warm(key);
            return self.hit(key, CacheTier::Warm, data, promoted);
        }

        match self.disk.read(key).await {
            DiskRead::Value { value, expires_at_ms } => {
                let promoted = self.promote_from_disk(key, value.clone(), expires_at_ms).await;
                self.hit(key, CacheTier::Cold, value, promoted)
            }
            DiskRead::Absent => self.miss(key),
            DiskRead::Corrupt(reason) => {
                self.disk.delete(key).await;
                debug!(partition = %self.name, key = %key, "Removed corrupt disk entry");
                self.emit_event(CacheEvent::disk_fault(Some(key), reason.to_string()));
                self.miss(key)
            }
            DiskRead::IoError(e) => {
                self.emit_event(CacheEvent::disk_fault(Some(key), e.to_string()));
                self.miss(key)
            }
        }
    }

    /// Get a value from whichever tier holds it
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.lookup(key).await.into_data()
    }

    fn hit(&self, key: &str, tier: CacheTier, data: Bytes, promoted: bool) -> CacheLookupResult {
        self.metrics.tier(tier).record_hit();
        trace!(partition = %self.name, key = %key, tier = %tier, promoted, "Cache hit");
        self.emit_event(CacheEvent::hit(key, tier, promoted));
        CacheLookupResult::Hit {
            data,
            tier,
            promoted,
        }
    }

    fn miss(&self, key: &str) -> CacheLookupResult {
        self.metrics.record_miss();
        trace!(partition = %self.name, key = %key, "Cache miss");
        self.emit_event(CacheEvent::miss(key));
        CacheLookupResult::Miss
    }

    /// Move a warm entry into the hot tier
    fn promote_from_warm(&self, key: &str) -> bool {
        let taken = match self.warm.take(key) {
            Some(taken) => taken,
            None => return false,
        };
        let ttl = match capped_ttl(taken.expires_at_ms, self.hot.config().default_ttl) {
            Some(ttl) => ttl,
            None => return false,
        };
        if let Err(e) = self.hot.set(key, taken.value, Some(ttl)) {
            warn!(partition = %self.name, key = %key, error = %e, "Promotion to hot tier failed");
            return false;
        }

        self.metrics.record_promotion(CacheTier::Warm, CacheTier::Hot);
        self.emit_event(CacheEvent::promote(key, CacheTier::Warm, CacheTier::Hot));
        debug!(partition = %self.name, key = %key, from = %CacheTier::Warm, to = %CacheTier::Hot, "Promoted cache entry");
        true
    }

    /// Move a disk entry into the warm tier
    async fn promote_from_disk(&self, key: &str, value: Bytes, expires_at_ms: i64) -> bool {
        // A newer write reached memory while the disk read was in flight
        if self.in_memory(key) {
            self.disk.delete(key).await;
            return false;
        }
        let ttl = match capped_ttl(expires_at_ms, self.warm.config().default_ttl) {
            Some(ttl) => ttl,
            None => return false,
        };
        if let Err(e) = self.warm.set(key, value, Some(ttl)) {
            warn!(partition = %self.name, key = %key, error = %e, "Promotion to warm tier failed");
            return false;
        }
        self.disk.delete(key).await;

        self.metrics.record_promotion(CacheTier::Cold, CacheTier::Warm);
        self.emit_event(CacheEvent::promote(key, CacheTier::Cold, CacheTier::Warm));
        debug!(partition = %self.name, key = %key, from = %CacheTier::Cold, to = %CacheTier::Warm, "Promoted cache entry");
        true
    }

    /// Whether any tier holds a live copy
    pub async fn has(&self, key: &str) -> bool {
        self.hot.has(key) || self.warm.has(key) || self.disk.is_live(key).await
    }

    /// Tier currently holding a live copy of the key
    pub async fn locate(&self, key: &str) -> Option<CacheTier> {
        if self.hot.has(key) {
            Some(CacheTier::Hot)
        } else if self.warm.has(key) {
            Some(CacheTier::Warm)
        } else if self.disk.is_live(key).await {
            Some(CacheTier::Cold)
        } else {
            None
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a value in the tier selected by the key's temperature
    ///
    /// Records one access, then classifies. Copies held by other tiers are
    /// removed. Disk write failures are returned.
    pub async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        self.tracker.record(key);
        let tier = CacheTier::for_temperature(self.tracker.temperature(key));
        let size_bytes = value.len() as u64;

        let compressed = match tier {
            CacheTier::Hot => {
                self.hot.set(key, value, ttl)?;
                self.warm.delete(key);
                self.disk.delete(key).await;
                false
            }
            CacheTier::Warm => {
                self.warm.set(key, value, ttl)?;
                self.hot.delete(key);
                self.disk.delete(key).await;
                false
            }
            CacheTier::Cold => {
                self.hot.delete(key);
                self.warm.delete(key);
                let ttl = ttl.unwrap_or_else(|| self.disk.default_ttl());
                self.disk.write(key, &value, ttl).await?.compressed
            }
        };

        self.metrics.tier(tier).record_write();
        trace!(partition = %self.name, key = %key, tier = %tier, size_bytes, "Stored cache entry");
        self.emit_event(CacheEvent::put(key, tier, size_bytes, compressed));
        Ok(())
    }

    /// Remove a key from every tier and forget its access history
    pub async fn delete(&self, key: &str) -> bool {
        let in_hot = self.hot.delete(key);
        let in_warm = self.warm.delete(key);
        let on_disk = self.disk.delete(key).await;
        self.tracker.remove(key);

        let removed = in_hot || in_warm || on_disk;
        if removed {
            self.emit_event(CacheEvent::Delete {
                key: key.to_string(),
            });
        }
        removed
    }

    /// Empty every tier, the access tracker and the disk namespace
    pub async fn clear(&self) -> Result<()> {
        let hot = self.hot.clear();
        let warm = self.warm.clear();
        self.tracker.clear();
        self.disk.clear().await?;

        info!(partition = %self.name, hot, warm, "Tiered cache cleared");
        self.emit_event(CacheEvent::Cleared);
        Ok(())
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Sweep the disk tier, demote cold warm entries, prune the tracker
    ///
    /// Individual failures are logged and skipped.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let disk = self.disk.sweep().await;
        if disk.expired > 0 {
            self.emit_event(CacheEvent::Expired {
                tier: CacheTier::Cold,
                count: disk.expired as u64,
            });
        }

        let demoted = self.rebalance().await;
        let pruned = self.tracker.prune(self.tracker.config().retention);

        debug!(
            partition = %self.name,
            disk_expired = disk.expired,
            disk_evicted = disk.evicted,
            demoted,
            pruned,
            "Tier maintenance finished"
        );

        MaintenanceReport {
            disk,
            demoted,
            pruned,
        }
    }

    fn in_memory(&self, key: &str) -> bool {
        self.hot.has(key) || self.warm.has(key)
    }

    /// Demote warm entries whose temperature decayed to cold
    async fn rebalance(&self) -> usize {
        let keys = self.warm.keys();
        let mut demoted = 0;

        for chunk in keys.chunks(self.rebalance_batch) {
            for key in chunk {
                if self.tracker.temperature(key) != Temperature::Cold {
                    continue;
                }
                if self.demote(key).await {
                    demoted += 1;
                }
            }
            tokio::task::yield_now().await;
        }
        demoted
    }

    async fn demote(&self, key: &str) -> bool {
        let taken = match self.warm.take(key) {
            Some(taken) => taken,
            None => return false,
        };
        let ttl = match capped_ttl(taken.expires_at_ms, self.disk.default_ttl()) {
            Some(ttl) => ttl,
            None => return false,
        };

        match self.disk.write(key, &taken.value, ttl).await {
            Ok(_) if self.in_memory(key) => {
                // Superseded by a write that landed in memory during the disk write
                self.disk.delete(key).await;
                debug!(partition = %self.name, key = %key, "Demotion superseded by a newer write");
                false
            }
            Ok(_) => {
                self.metrics.record_demotion(CacheTier::Warm, CacheTier::Cold);
                self.emit_event(CacheEvent::demote(key, CacheTier::Warm, CacheTier::Cold));
                debug!(partition = %self.name, key = %key, from = %CacheTier::Warm, to = %CacheTier::Cold, "Demoted cache entry");
                true
            }
            Err(e) => {
                warn!(partition = %self.name, key = %key, error = %e, "Demotion failed, keeping entry in warm tier");
                if let Some(ttl) = remaining_ttl(taken.expires_at_ms) {
                    if let Err(e) = self.warm.set(key, taken.value, Some(ttl)) {
                        warn!(partition = %self.name, key = %key, error = %e, "Failed to restore entry after demotion failure");
                    }
                }
                self.emit_event(CacheEvent::disk_fault(Some(key), e.to_string()));
                false
            }
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn detailed_stats(&self) -> TieredCacheStats {
        let requests = self.metrics.snapshot();
        TieredCacheStats {
            name: self.name.clone(),
            hit_rate: requests.hit_ratio(),
            requests,
            hot: self.hot.stats(),
            warm: self.warm.stats(),
            disk: self.disk.stats(),
            tracked_keys: self.tracker.len(),
        }
    }

    /// Check that the disk tier is writable
    pub async fn health_check(&self) -> bool {
        self.disk.health_check().await
    }

    pub fn hot_tier(&self) -> &LruCache<Bytes> {
        &self.hot
    }

    pub fn warm_tier(&self) -> &LruCache<Bytes> {
        &self.warm
    }

    pub fn cold_tier(&self) -> &dyn ColdStore {
        self.disk.as_ref()
    }

    pub fn tracker(&self) -> &AccessTracker {
        &self.tracker
    }

    /// Number of running background timers across all tiers
    pub fn active_timers(&self) -> usize {
        let own = self
            .maintenance
            .lock()
            .as_ref()
            .map_or(0, |task| usize::from(task.is_running()));
        own + self.hot.active_timers() + self.warm.active_timers()
    }
}

impl Closeable for TieredCache {
    /// Stop every timer; in-memory data stays usable
    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.maintenance.lock().take() {
            task.stop();
        }
        self.hot.close();
        self.warm.close();
        self.disk.close();
        info!(partition = %self.name, "Tiered cache closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
