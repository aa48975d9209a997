//! Tiered Caching Engine
//!
//! A three-tier cache that places each key by its observed access frequency:
//! - **Hot**: in-memory LRU for keys accessed at least `hotThreshold` times
//! - **Warm**: in-memory LRU for keys accessed at least `warmThreshold` times
//! - **Cold**: disk tier, one JSON envelope per key, optionally compressed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Partition Registry                              │
//! │        "search-results"      "templates"      "metadata"   ...          │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                     Tiered Cache (one per partition)                     │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────────┐   │
//! │  │   L1 Hot     │  │   L2 Warm    │  │          L3 Cold             │   │
//! │  │ (LruCache)   │  │ (LruCache)   │  │  (DiskTier, sha256 fan-out)  │   │
//! │  └──────────────┘  └──────────────┘  └──────────────────────────────┘   │
//! │         ▲ promote         ▲ promote              │                       │
//! │         └─────────────────┴──── demote ──────────┘                       │
//! │                    ┌────────────────┐                                    │
//! │                    │ Access Tracker │                                    │
//! │                    │ (rolling window)│                                   │
//! │                    └────────────────┘                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use tiered_cache::cache::{Closeable, PartitionRegistry};
//! use tiered_cache::config::RegistryConfig;
//! use bytes::Bytes;
//!
//! let registry = PartitionRegistry::new(RegistryConfig::new("/var/cache/app"));
//! let templates = registry.get_or_create("templates", None).await?;
//!
//! templates.set("welcome", Bytes::from("Hello {{name}}"), None).await?;
//! if let Some(body) = templates.get("welcome").await {
//!     println!("{}", String::from_utf8_lossy(&body));
//! }
//!
//! let stats = registry.get_all_stats();
//! println!("Hit rate: {:.2}%", stats.aggregate.hit_rate * 100.0);
//!
//! registry.shutdown();
//! ```

pub mod access;
pub mod compression;
pub mod entry;
pub mod events;
pub mod lru;
pub mod maintenance;
pub mod manager;
pub mod memory;
pub mod metrics;
pub mod registry;
pub mod storage;
pub mod tier;

// Re-export main types
pub use access::{AccessRecord, AccessTracker};
pub use compression::{CompressionAlgorithm, CompressionConfig, CompressionManager, Compressor};
pub use events::CacheEvent;
pub use lru::{LruCache, LruConfig, LruStats};
pub use maintenance::PeriodicTask;
pub use manager::{MaintenanceReport, TieredCache, TieredCacheConfig, TieredCacheStats};
pub use memory::{FixedMemoryProbe, MemoryProbe, SystemMemoryProbe};
pub use metrics::{CacheMetrics, CacheStatsSnapshot, DiskStatsSnapshot};
pub use registry::{AggregateStats, PartitionRegistry, RegistryStats};
pub use storage::{ColdStore, DiskEnvelope, DiskRead, DiskTier, DiskTierConfig};
pub use tier::{CacheTier, Temperature, TemperatureConfig};

use bytes::Bytes;

// =============================================================================
// Closeable
// =============================================================================

/// A component owning background work that must be stopped explicitly
///
/// `close` is idempotent: calls after the first are no-ops.
pub trait Closeable {
    fn close(&self);

    fn is_closed(&self) -> bool;
}

// =============================================================================
// Cache Lookup Result
// =============================================================================

/// Result of a tiered lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookupResult {
    Hit {
        /// The cached value (decompressed)
        data: Bytes,
        /// Tier that answered the lookup
        tier: CacheTier,
        /// Whether the entry moved up a tier as part of this lookup
        promoted: bool,
    },
    Miss,
}

impl CacheLookupResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookupResult::Hit { .. })
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheLookupResult::Miss)
    }

    pub fn data(&self) -> Option<&Bytes> {
        match self {
            CacheLookupResult::Hit { data, .. } => Some(data),
            CacheLookupResult::Miss => None,
        }
    }

    pub fn tier(&self) -> Option<CacheTier> {
        match self {
            CacheLookupResult::Hit { tier, .. } => Some(*tier),
            CacheLookupResult::Miss => None,
        }
    }

    pub fn into_data(self) -> Option<Bytes> {
        match self {
            CacheLookupResult::Hit { data, .. } => Some(data),
            CacheLookupResult::Miss => None,
        }
    }
}
