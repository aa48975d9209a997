//! Access Tracker
//!
//! Counts accesses per key within a fixed window and classifies the
//! resulting temperature. Records exist independently of where, or whether,
//! a key is currently cached.

use crate::cache::entry::now_ms;
use crate::cache::tier::{Temperature, TemperatureConfig};
use dashmap::DashMap;
use std::time::Duration;
use tracing::debug;

/// Per-key access statistics for the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRecord {
    /// Accesses since `window_start_ms`
    pub count: u32,
    pub window_start_ms: i64,
    pub last_access_ms: i64,
}

/// Rolling-window access counter backed by a concurrent map
#[derive(Debug)]
pub struct AccessTracker {
    records: DashMap<String, AccessRecord>,
    config: TemperatureConfig,
}

impl AccessTracker {
    pub fn new(config: TemperatureConfig) -> Self {
        Self {
            records: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &TemperatureConfig {
        &self.config
    }

    #[inline]
    fn window_ms(&self) -> i64 {
        duration_ms(self.config.window)
    }

    /// Record one access and return the count for the current window
    ///
    /// A record whose window has elapsed restarts at 1.
    pub fn record(&self, key: &str) -> u32 {
        self.record_at(key, now_ms())
    }

    fn record_at(&self, key: &str, now: i64) -> u32 {
        let window = self.window_ms();
        let mut record = self
            .records
            .entry(key.to_string())
            .or_insert(AccessRecord {
                count: 0,
                window_start_ms: now,
                last_access_ms: now,
            });

        if now - record.window_start_ms > window {
            record.count = 1;
            record.window_start_ms = now;
        } else {
            record.count = record.count.saturating_add(1);
        }
        record.last_access_ms = now;
        record.count
    }

    /// Current temperature; a record outside its window has decayed to cold
    pub fn temperature(&self, key: &str) -> Temperature {
        self.temperature_at(key, now_ms())
    }

    fn temperature_at(&self, key: &str, now: i64) -> Temperature {
        match self.records.get(key) {
            Some(record) if now - record.window_start_ms <= self.window_ms() => {
                self.config.classify(record.count)
            }
            _ => Temperature::Cold,
        }
    }

    /// Snapshot of a key's record
    pub fn get(&self, key: &str) -> Option<AccessRecord> {
        self.records.get(key).map(|r| *r)
    }

    /// Drop the record for a key
    pub fn remove(&self, key: &str) -> bool {
        self.records.remove(key).is_some()
    }

    /// Drop records whose last access is older than `retention`
    pub fn prune(&self, retention: Duration) -> usize {
        let cutoff = now_ms() - duration_ms(retention);
        let before = self.records.len();
        self.records.retain(|_, record| record.last_access_ms >= cutoff);
        let removed = before.saturating_sub(self.records.len());
        if removed > 0 {
            debug!(removed, remaining = self.records.len(), "Pruned access records");
        }
        removed
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn duration_ms(duration: Duration) -> i64 {
    duration.as_millis().min(i64::MAX as u128) as i64
}
