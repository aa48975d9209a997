//! Cache Metrics
//!
//! Cache-line aligned atomic counters for the orchestrator and the disk tier,
//! with serializable point-in-time snapshots.

use crate::cache::entry::now_ms;
use crate::cache::tier::CacheTier;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache line size for alignment (64 bytes on most modern CPUs)
pub const CACHE_LINE_SIZE: usize = 64;

#[inline]
fn load(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

#[inline]
fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

// =============================================================================
// Per-Tier Metrics (Cache-Line Aligned)
// =============================================================================

/// Orchestrator-level counters for one tier, aligned to prevent false sharing
#[repr(C, align(64))]
#[derive(Debug)]
pub struct CacheTierMetrics {
    /// Lookups answered by this tier
    pub hits: AtomicU64,
    /// Writes routed to this tier by temperature
    pub writes: AtomicU64,
    /// Entries promoted into this tier
    pub promotions_in: AtomicU64,
    /// Entries demoted out of this tier
    pub demotions_out: AtomicU64,
    /// Last update timestamp (Unix millis)
    pub last_update_ms: AtomicU64,
    _padding: [u8; 24],
}

const _: () = assert!(std::mem::size_of::<CacheTierMetrics>() <= CACHE_LINE_SIZE);

impl Default for CacheTierMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheTierMetrics {
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            promotions_in: AtomicU64::new(0),
            demotions_out: AtomicU64::new(0),
            last_update_ms: AtomicU64::new(0),
            _padding: [0; 24],
        }
    }

    #[inline]
    pub fn record_hit(&self) {
        bump(&self.hits);
        self.touch();
    }

    #[inline]
    pub fn record_write(&self) {
        bump(&self.writes);
        self.touch();
    }

    #[inline]
    fn touch(&self) {
        self.last_update_ms
            .store(now_ms().max(0) as u64, Ordering::Release);
    }

    pub fn snapshot(&self) -> TierMetricsSnapshot {
        TierMetricsSnapshot {
            hits: load(&self.hits),
            writes: load(&self.writes),
            promotions_in: load(&self.promotions_in),
            demotions_out: load(&self.demotions_out),
            last_update_ms: load(&self.last_update_ms),
        }
    }
}

/// Point-in-time snapshot of tier metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierMetricsSnapshot {
    pub hits: u64,
    pub writes: u64,
    pub promotions_in: u64,
    pub demotions_out: u64,
    /// Last activity in this tier (Unix millis, 0 = never)
    pub last_update_ms: u64,
}

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Counters for one tiered cache
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hot: CacheTierMetrics,
    pub warm: CacheTierMetrics,
    pub cold: CacheTierMetrics,
    /// Total `get` calls
    pub requests: AtomicU64,
    /// Lookups that missed every tier
    pub misses: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get metrics for a specific tier
    pub fn tier(&self, tier: CacheTier) -> &CacheTierMetrics {
        match tier {
            CacheTier::Hot => &self.hot,
            CacheTier::Warm => &self.warm,
            CacheTier::Cold => &self.cold,
        }
    }

    #[inline]
    pub fn record_request(&self) {
        bump(&self.requests);
    }

    #[inline]
    pub fn record_miss(&self) {
        bump(&self.misses);
    }

    pub fn record_promotion(&self, from: CacheTier, to: CacheTier) {
        bump(&self.tier(to).promotions_in);
        self.tier(from).touch();
        self.tier(to).touch();
    }

    pub fn record_demotion(&self, from: CacheTier, to: CacheTier) {
        bump(&self.tier(from).demotions_out);
        self.tier(from).touch();
        self.tier(to).touch();
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot::from_tier_metrics(
            self.hot.snapshot(),
            self.warm.snapshot(),
            self.cold.snapshot(),
            load(&self.requests),
            load(&self.misses),
        )
    }
}

/// Aggregate request statistics across all tiers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSnapshot {
    pub hot: TierMetricsSnapshot,
    pub warm: TierMetricsSnapshot,
    pub cold: TierMetricsSnapshot,
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub promotions: u64,
    pub demotions: u64,
}

impl CacheStatsSnapshot {
    pub fn from_tier_metrics(
        hot: TierMetricsSnapshot,
        warm: TierMetricsSnapshot,
        cold: TierMetricsSnapshot,
        requests: u64,
        misses: u64,
    ) -> Self {
        let hits = hot.hits + warm.hits + cold.hits;
        let promotions = hot.promotions_in + warm.promotions_in + cold.promotions_in;
        let demotions = hot.demotions_out + warm.demotions_out + cold.demotions_out;
        Self {
            hot,
            warm,
            cold,
            requests,
            hits,
            misses,
            promotions,
            demotions,
        }
    }

    /// Get overall hit ratio
    pub fn hit_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.requests as f64
        }
    }

    pub fn tier(&self, tier: CacheTier) -> &TierMetricsSnapshot {
        match tier {
            CacheTier::Hot => &self.hot,
            CacheTier::Warm => &self.warm,
            CacheTier::Cold => &self.cold,
        }
    }
}

// =============================================================================
// Disk Tier Metrics
// =============================================================================

/// Counters for the disk tier
#[derive(Debug, Default)]
pub struct DiskMetrics {
    pub reads: AtomicU64,
    pub writes: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub corrupt: AtomicU64,
    pub io_errors: AtomicU64,
    pub compressions: AtomicU64,
    pub bytes_written: AtomicU64,
    /// Files removed because their entry expired
    pub expired: AtomicU64,
    /// Files removed to honour the entry cap
    pub evictions: AtomicU64,
    /// Approximate number of files on disk
    pub entries: AtomicU64,
}

impl DiskMetrics {
    #[inline]
    pub fn record_read(&self) {
        bump(&self.reads);
    }

    #[inline]
    pub fn record_hit(&self) {
        bump(&self.hits);
    }

    #[inline]
    pub fn record_miss(&self) {
        bump(&self.misses);
    }

    #[inline]
    pub fn record_corrupt(&self) {
        bump(&self.corrupt);
    }

    #[inline]
    pub fn record_io_error(&self) {
        bump(&self.io_errors);
    }

    pub fn record_write(&self, bytes: usize, compressed: bool, new_file: bool) {
        bump(&self.writes);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        if compressed {
            bump(&self.compressions);
        }
        if new_file {
            bump(&self.entries);
        }
    }

    /// Record a removed file
    pub fn record_remove(&self) {
        let _ = self
            .entries
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)));
    }

    pub fn record_expired(&self, count: u64) {
        self.expired.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Overwrite the entry estimate with a counted value
    pub fn set_entries(&self, count: u64) {
        self.entries.store(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiskStatsSnapshot {
        DiskStatsSnapshot {
            reads: load(&self.reads),
            writes: load(&self.writes),
            hits: load(&self.hits),
            misses: load(&self.misses),
            corrupt: load(&self.corrupt),
            io_errors: load(&self.io_errors),
            compressions: load(&self.compressions),
            bytes_written: load(&self.bytes_written),
            expired: load(&self.expired),
            evictions: load(&self.evictions),
            entries: load(&self.entries),
        }
    }
}

/// Point-in-time snapshot of disk tier metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskStatsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub hits: u64,
    pub misses: u64,
    pub corrupt: u64,
    pub io_errors: u64,
    pub compressions: u64,
    pub bytes_written: u64,
    pub expired: u64,
    pub evictions: u64,
    pub entries: u64,
}

impl DiskStatsSnapshot {
    pub fn hit_ratio(&self) -> f64 {
        if self.reads == 0 {
            0.0
        } else {
            self.hits as f64 / self.reads as f64
        }
    }
}
