//! Tiered Cache
//!
//! An in-process caching engine that places each key in one of three tiers
//! according to how often it has been accessed recently, with independently
//! configured partitions per data domain.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Partition Registry                              │
//! │              (one TieredCache per partition name)                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────────┐   │
//! │  │   L1 Hot     │  │   L2 Warm    │  │          L3 Cold             │   │
//! │  │  LRU + TTL   │  │  LRU + TTL   │  │  JSON envelopes on disk      │   │
//! │  │              │  │              │  │  (lz4 / zstd / snappy)       │   │
//! │  └──────────────┘  └──────────────┘  └──────────────────────────────┘   │
//! │                    ┌────────────────┐                                    │
//! │                    │ Access Tracker │                                    │
//! │                    └────────────────┘                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: Cache primitive, tier orchestrator and partition registry
//! - [`config`]: Partition profiles and registry configuration loading
//! - [`error`]: Error types and handling
//! - [`telemetry`]: Logging initialisation

pub mod cache;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types
pub use cache::{
    AccessTracker, CacheEvent, CacheLookupResult, CacheTier, Closeable, ColdStore,
    CompressionAlgorithm, CompressionConfig, DiskTier, DiskTierConfig, LruCache, LruConfig,
    LruStats, PartitionRegistry, RegistryStats, Temperature, TemperatureConfig, TieredCache,
    TieredCacheConfig, TieredCacheStats,
};

pub use config::{PartitionConfig, RegistryConfig};

pub use error::{Error, ErrorAction, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
