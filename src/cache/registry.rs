//! Partition Registry
//!
//! Creates and multiplexes independently configured tiered caches by name.
//! A registry is constructed explicitly and handed to whatever needs
//! partitioned caching; there is no process-wide instance.

use crate::cache::manager::{TieredCache, TieredCacheStats};
use crate::cache::Closeable;
use crate::config::{validate_partition_name, PartitionConfig, RegistryConfig};
use crate::error::{Error, Result};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Totals across every partition
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub partitions: usize,
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub hot_entries: usize,
    pub warm_entries: usize,
    pub disk_entries: u64,
    pub promotions: u64,
    pub demotions: u64,
    pub compressions: u64,
}

impl AggregateStats {
    fn add(&mut self, stats: &TieredCacheStats) {
        self.partitions += 1;
        self.requests += stats.requests.requests;
        self.hits += stats.requests.hits;
        self.misses += stats.requests.misses;
        self.hot_entries += stats.hot.size;
        self.warm_entries += stats.warm.size;
        self.disk_entries += stats.disk.entries;
        self.promotions += stats.requests.promotions;
        self.demotions += stats.requests.demotions;
        self.compressions += stats.disk.compressions;
    }
}

/// Per-partition statistics plus their aggregate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub partitions: BTreeMap<String, TieredCacheStats>,
    pub aggregate: AggregateStats,
}

fn closed_error(name: &str) -> Error {
    Error::Closed(format!("partition registry (requested {})", name))
}

/// Named tiered caches, each built once per registry lifetime
pub struct PartitionRegistry {
    config: RegistryConfig,
    partitions: DashMap<String, Arc<TieredCache>>,
    /// Serializes construction so concurrent callers share one instance
    creation: tokio::sync::Mutex<()>,
    closed: AtomicBool,
}

impl PartitionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            partitions: DashMap::new(),
            creation: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Return the named partition, creating it on first request
    ///
    /// `config` is only consulted on creation. Without it, the registry's
    /// override for the name is used, then the built-in profile, then the
    /// generic default.
    pub async fn get_or_create(
        &self,
        name: &str,
        config: Option<PartitionConfig>,
    ) -> Result<Arc<TieredCache>> {
        validate_partition_name(name)?;
        if self.is_closed() {
            return Err(closed_error(name));
        }
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }

        let _guard = self.creation.lock().await;
        if self.is_closed() {
            return Err(closed_error(name));
        }
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }

        let partition = config.unwrap_or_else(|| self.config.partition_config(name));
        partition.validate()?;
        let cache = TieredCache::with_config(
            name,
            partition.to_tiered_config(name, &self.config.base_dir),
        )
        .await?;

        // Publish before re-checking: a concurrent shutdown either sees this
        // partition or is seen here
        self.partitions.insert(name.to_string(), cache.clone());
        if self.is_closed() {
            self.partitions.remove(name);
            cache.close();
            return Err(closed_error(name));
        }
        info!(
            partition = %name,
            l1_max_size = partition.l1_max_size,
            l2_max_size = partition.l2_max_size,
            compression = partition.compression,
            "Partition created"
        );
        Ok(cache)
    }

    /// Existing partition by name
    pub fn get(&self, name: &str) -> Option<Arc<TieredCache>> {
        self.partitions.get(name).map(|entry| entry.value().clone())
    }

    /// Registered partition names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.partitions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Close and drop a partition; its disk files are left in place
    pub fn remove(&self, name: &str) -> bool {
        match self.partitions.remove(name) {
            Some((_, cache)) => {
                cache.close();
                debug!(partition = %name, "Partition removed");
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> Vec<Arc<TieredCache>> {
        self.partitions.iter().map(|e| e.value().clone()).collect()
    }

    /// Detailed stats of every partition and their totals
    pub fn get_all_stats(&self) -> RegistryStats {
        let mut partitions = BTreeMap::new();
        let mut aggregate = AggregateStats::default();

        for cache in self.snapshot() {
            let stats = cache.detailed_stats();
            aggregate.add(&stats);
            partitions.insert(cache.name().to_string(), stats);
        }
        if aggregate.requests > 0 {
            aggregate.hit_rate = aggregate.hits as f64 / aggregate.requests as f64;
        }

        RegistryStats {
            partitions,
            aggregate,
        }
    }

    /// Clear every partition
    ///
    /// All partitions are attempted; the first failure is returned.
    pub async fn clear_all(&self) -> Result<()> {
        let mut first_error = None;
        for cache in self.snapshot() {
            if let Err(e) = cache.clear().await {
                warn!(partition = %cache.name(), error = %e, "Failed to clear partition");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stop every partition's timers and release them
    ///
    /// Calls after the first are no-ops.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut count = 0;
        self.partitions.retain(|_, cache| {
            cache.close();
            count += 1;
            false
        });
        info!(partitions = count, "Partition registry shut down");
    }
}

impl Closeable for PartitionRegistry {
    fn close(&self) {
        self.shutdown();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for PartitionRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}
