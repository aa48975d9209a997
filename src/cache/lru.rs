//! LRU + TTL Cache Primitive
//!
//! A bounded key/value store with O(1) get, set, delete and eviction.
//!
//! Entries live in a slab arena (`Vec<Option<CacheEntry>>` plus a free list)
//! and are threaded onto a doubly-linked recency list through integer
//! indices. A hash map resolves keys to arena slots. Head = most recently
//! used, tail = least recently used.

use crate::cache::entry::{now_ms, validate_key, CacheEntry, NodeIndex};
use crate::cache::maintenance::PeriodicTask;
use crate::cache::memory::{MemoryProbe, SystemMemoryProbe};
use crate::cache::Closeable;
use crate::error::{Error, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

// =============================================================================
// Constants
// =============================================================================

/// Default maximum number of entries
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Default entry lifetime: 5 minutes
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default memory usage ratio above which the cache shrinks
pub const DEFAULT_MEMORY_THRESHOLD_RATIO: f64 = 0.85;

/// Fraction of `max_size` a memory-pressure shrink evicts down to
pub const SHRINK_TARGET_RATIO: f64 = 0.8;

/// Arena slots examined per step of a background expiry sweep
pub const DEFAULT_SWEEP_BATCH: usize = 256;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a cache primitive
#[derive(Debug, Clone)]
pub struct LruConfig {
    /// Maximum number of entries held at once
    pub max_size: usize,
    /// Lifetime of entries set without an explicit TTL
    pub default_ttl: Duration,
    /// Period of the background expiry sweep (None = no timer)
    pub cleanup_interval: Option<Duration>,
    /// Memory usage ratio (0.0-1.0) that triggers a shrink
    pub memory_threshold_ratio: f64,
    /// Period of the memory-pressure check (None = no timer)
    pub memory_check_interval: Option<Duration>,
    /// Arena slots examined before the background sweep yields
    pub sweep_batch: usize,
}

impl Default for LruConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

impl LruConfig {
    /// Create a config with no background timers
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            max_size,
            default_ttl,
            cleanup_interval: None,
            memory_threshold_ratio: DEFAULT_MEMORY_THRESHOLD_RATIO,
            memory_check_interval: None,
            sweep_batch: DEFAULT_SWEEP_BATCH,
        }
    }

    /// Enable the periodic expiry sweep
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Enable the periodic memory-pressure check
    pub fn with_memory_check(mut self, interval: Duration, threshold_ratio: f64) -> Self {
        self.memory_check_interval = Some(interval);
        self.memory_threshold_ratio = threshold_ratio;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::Configuration("maxSize must be at least 1".into()));
        }
        if !(self.memory_threshold_ratio > 0.0 && self.memory_threshold_ratio <= 1.0) {
            return Err(Error::Configuration(format!(
                "memoryThresholdRatio must be in (0, 1], got {}",
                self.memory_threshold_ratio
            )));
        }
        if self.sweep_batch == 0 {
            return Err(Error::Configuration("sweep batch must be at least 1".into()));
        }
        Ok(())
    }

    /// Entry count a memory-pressure shrink evicts down to
    pub fn shrink_target(&self) -> usize {
        (self.max_size as f64 * SHRINK_TARGET_RATIO) as usize
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Slab of entries threaded onto an index-linked recency list
#[derive(Debug)]
struct Arena<V> {
    nodes: Vec<Option<CacheEntry<V>>>,
    free: Vec<NodeIndex>,
    index: HashMap<String, NodeIndex>,
    head: Option<NodeIndex>,
    tail: Option<NodeIndex>,
}

impl<V> Arena<V> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    fn lookup(&self, key: &str) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }

    #[inline]
    fn node(&self, idx: NodeIndex) -> Option<&CacheEntry<V>> {
        self.nodes.get(idx).and_then(|slot| slot.as_ref())
    }

    #[inline]
    fn node_mut(&mut self, idx: NodeIndex) -> Option<&mut CacheEntry<V>> {
        self.nodes.get_mut(idx).and_then(|slot| slot.as_mut())
    }

    /// Unlink a node from the recency list, leaving it in its slot
    fn detach(&mut self, idx: NodeIndex) {
        let (prev, next) = match self.node(idx) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = None;
        }
    }

    /// Link a detached node in at the head
    fn push_front(&mut self, idx: NodeIndex) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.node_mut(h) {
                node.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn move_to_front(&mut self, idx: NodeIndex) {
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.push_front(idx);
    }

    /// Store a new entry at the head; the key must not be present
    fn insert(&mut self, entry: CacheEntry<V>) -> NodeIndex {
        let key = entry.key.clone();
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(entry);
                idx
            }
            None => {
                self.nodes.push(Some(entry));
                self.nodes.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.push_front(idx);
        idx
    }

    fn remove(&mut self, idx: NodeIndex) -> Option<CacheEntry<V>> {
        self.node(idx)?;
        self.detach(idx);
        let entry = self.nodes.get_mut(idx)?.take()?;
        self.free.push(idx);
        self.index.remove(&entry.key);
        Some(entry)
    }

    fn pop_tail(&mut self) -> Option<CacheEntry<V>> {
        let tail = self.tail?;
        self.remove(tail)
    }

    fn clear(&mut self) -> usize {
        let count = self.len();
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
        count
    }

    /// Keys from most to least recently used
    fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            match self.node(idx) {
                Some(node) => {
                    keys.push(node.key.clone());
                    cursor = node.next;
                }
                None => break,
            }
        }
        keys
    }
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Default)]
struct LruCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
    cleanups: AtomicU64,
}

impl LruCounters {
    #[inline]
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Point-in-time counters of a cache primitive
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LruStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    /// Entries removed because they expired
    pub cleanups: u64,
    pub size: usize,
    pub capacity: usize,
}

impl LruStats {
    /// Calculate hit ratio
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A live entry removed from the cache for relocation
#[derive(Debug, Clone)]
pub struct TakenEntry<V> {
    pub value: V,
    pub expires_at_ms: i64,
}

// =============================================================================
// LRU Cache
// =============================================================================

/// Bounded LRU cache with per-entry TTL
pub struct LruCache<V = Bytes> {
    name: String,
    config: LruConfig,
    arena: Mutex<Arena<V>>,
    counters: LruCounters,
    probe: Arc<dyn MemoryProbe>,
    tasks: Mutex<Vec<PeriodicTask>>,
    closed: AtomicBool,
}

impl<V> LruCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache that samples system memory for pressure checks
    pub fn new(name: impl Into<String>, config: LruConfig) -> Result<Self> {
        Self::with_probe(name, config, Arc::new(SystemMemoryProbe::new()))
    }

    /// Create a cache with a custom memory probe
    pub fn with_probe(
        name: impl Into<String>,
        config: LruConfig,
        probe: Arc<dyn MemoryProbe>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            arena: Mutex::new(Arena::with_capacity(config.max_size.min(4096))),
            config,
            counters: LruCounters::default(),
            probe,
            tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Insert or replace a value
    ///
    /// Replacing refreshes the value and expiry in place and moves the entry
    /// to the head. Inserting at capacity evicts the tail first.
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        validate_key(key)?;
        let ttl = ttl.unwrap_or(self.config.default_ttl);

        let mut arena = self.arena.lock();
        match arena.lookup(key) {
            Some(idx) => {
                if let Some(entry) = arena.node_mut(idx) {
                    entry.value = value;
                    entry.refresh(ttl);
                }
                arena.move_to_front(idx);
            }
            None => {
                while arena.len() >= self.config.max_size {
                    match arena.pop_tail() {
                        Some(evicted) => {
                            LruCounters::bump(&self.counters.evictions, 1);
                            trace!(cache = %self.name, key = %evicted.key, "Evicted LRU entry");
                        }
                        None => break,
                    }
                }
                arena.insert(CacheEntry::new(key.to_string(), value, ttl));
            }
        }
        drop(arena);

        LruCounters::bump(&self.counters.sets, 1);
        Ok(())
    }

    /// Look up a live value, moving it to the head
    pub fn get(&self, key: &str) -> Option<V> {
        let now = now_ms();
        let mut arena = self.arena.lock();

        let idx = match arena.lookup(key) {
            Some(idx) => idx,
            None => {
                LruCounters::bump(&self.counters.misses, 1);
                return None;
            }
        };

        if arena.node(idx).map_or(true, |e| e.is_expired_at(now)) {
            arena.remove(idx);
            LruCounters::bump(&self.counters.cleanups, 1);
            LruCounters::bump(&self.counters.misses, 1);
            return None;
        }

        arena.move_to_front(idx);
        let value = arena.node_mut(idx).map(|entry| {
            entry.record_access();
            entry.value.clone()
        });
        LruCounters::bump(&self.counters.hits, 1);
        value
    }

    /// Check for a live value without touching recency
    pub fn has(&self, key: &str) -> bool {
        let now = now_ms();
        let arena = self.arena.lock();
        arena
            .lookup(key)
            .and_then(|idx| arena.node(idx))
            .map_or(false, |e| !e.is_expired_at(now))
    }

    /// Remove a key; returns whether it was present
    pub fn delete(&self, key: &str) -> bool {
        let mut arena = self.arena.lock();
        let removed = match arena.lookup(key) {
            Some(idx) => arena.remove(idx).is_some(),
            None => false,
        };
        if removed {
            LruCounters::bump(&self.counters.deletes, 1);
        }
        removed
    }

    /// Remove a live entry and hand it over for placement elsewhere
    ///
    /// Counts neither as a hit nor as a delete.
    pub fn take(&self, key: &str) -> Option<TakenEntry<V>> {
        let now = now_ms();
        let mut arena = self.arena.lock();
        let idx = arena.lookup(key)?;
        let entry = arena.remove(idx)?;
        if entry.is_expired_at(now) {
            LruCounters::bump(&self.counters.cleanups, 1);
            return None;
        }
        Some(TakenEntry {
            value: entry.value,
            expires_at_ms: entry.expires_at_ms,
        })
    }

    /// Reset the expiry of a live entry and move it to the head
    pub fn touch(&self, key: &str, ttl: Duration) -> bool {
        let now = now_ms();
        let mut arena = self.arena.lock();
        let idx = match arena.lookup(key) {
            Some(idx) => idx,
            None => return false,
        };

        if arena.node(idx).map_or(true, |e| e.is_expired_at(now)) {
            arena.remove(idx);
            LruCounters::bump(&self.counters.cleanups, 1);
            return false;
        }

        if let Some(entry) = arena.node_mut(idx) {
            entry.refresh(ttl);
        }
        arena.move_to_front(idx);
        true
    }

    /// Remove every expired entry, walking from tail to head
    ///
    /// Expiry is not ordered by recency, so the whole list is scanned.
    pub fn cleanup_expired(&self) -> usize {
        let now = now_ms();
        let mut arena = self.arena.lock();
        let mut removed = 0;
        let mut cursor = arena.tail;

        while let Some(idx) = cursor {
            let (prev, expired) = match arena.node(idx) {
                Some(entry) => (entry.prev, entry.is_expired_at(now)),
                None => break,
            };
            if expired && arena.remove(idx).is_some() {
                removed += 1;
            }
            cursor = prev;
        }
        drop(arena);

        if removed > 0 {
            LruCounters::bump(&self.counters.cleanups, removed as u64);
            debug!(cache = %self.name, removed, "Removed expired entries");
        }
        removed
    }

    /// Remove expired entries from arena slots `[start, start + batch)`
    ///
    /// Returns the number removed and the next slot to scan, if any.
    fn cleanup_slots(&self, start: NodeIndex, batch: usize) -> (usize, Option<NodeIndex>) {
        let now = now_ms();
        let mut arena = self.arena.lock();
        let end = start.saturating_add(batch).min(arena.nodes.len());
        let mut removed = 0;

        for idx in start..end {
            let expired = arena.node(idx).map_or(false, |e| e.is_expired_at(now));
            if expired && arena.remove(idx).is_some() {
                removed += 1;
            }
        }

        let next = if end < arena.nodes.len() { Some(end) } else { None };
        (removed, next)
    }

    /// Expiry sweep in bounded steps, yielding to the scheduler between steps
    pub async fn sweep_expired(&self) -> usize {
        let mut cursor = 0;
        let mut removed = 0;

        loop {
            let (count, next) = self.cleanup_slots(cursor, self.config.sweep_batch);
            removed += count;
            match next {
                Some(next) => {
                    cursor = next;
                    tokio::task::yield_now().await;
                }
                None => break,
            }
        }

        if removed > 0 {
            LruCounters::bump(&self.counters.cleanups, removed as u64);
            debug!(cache = %self.name, removed, "Background sweep removed expired entries");
        }
        removed
    }

    /// Evict the least recently used entry, returning its key
    pub fn evict_lru(&self) -> Option<String> {
        let evicted = self.arena.lock().pop_tail()?;
        LruCounters::bump(&self.counters.evictions, 1);
        trace!(cache = %self.name, key = %evicted.key, "Evicted LRU entry");
        Some(evicted.key)
    }

    /// Drop expired entries, then evict until at most `target` remain
    pub fn shrink_to(&self, target: usize) -> usize {
        let mut removed = self.cleanup_expired();
        while self.len() > target {
            if self.evict_lru().is_none() {
                break;
            }
            removed += 1;
        }
        removed
    }

    /// Shrink to the target size if process memory is above the threshold
    ///
    /// Returns the number of entries removed.
    pub fn check_memory_pressure(&self) -> usize {
        let ratio = match self.probe.usage_ratio() {
            Some(ratio) => ratio,
            None => return 0,
        };
        if ratio <= self.config.memory_threshold_ratio {
            return 0;
        }

        let target = self.config.shrink_target();
        let removed = self.shrink_to(target);
        warn!(
            cache = %self.name,
            usage_ratio = ratio,
            threshold = self.config.memory_threshold_ratio,
            removed,
            size = self.len(),
            "Memory pressure, shrank cache"
        );
        removed
    }

    /// Remove every entry, returning how many there were
    pub fn clear(&self) -> usize {
        let count = self.arena.lock().clear();
        debug!(cache = %self.name, entries = count, "Cleared cache");
        count
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> Vec<String> {
        self.arena.lock().keys()
    }

    /// Current entry count (including not yet purged expired entries)
    pub fn len(&self) -> usize {
        self.arena.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.config.max_size
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LruConfig {
        &self.config
    }

    /// Get cumulative counters and current size
    pub fn stats(&self) -> LruStats {
        LruStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            cleanups: self.counters.cleanups.load(Ordering::Relaxed),
            size: self.len(),
            capacity: self.config.max_size,
        }
    }

    /// Start the configured expiry and memory-pressure timers
    ///
    /// Timers hold a weak reference and stop on `close` or when the cache
    /// is dropped. Calling again while timers run is a no-op.
    pub fn start_maintenance(self: &Arc<Self>) -> Result<()> {
        let mut tasks = self.tasks.lock();
        if self.is_closed() || !tasks.is_empty() {
            return Ok(());
        }

        if let Some(period) = self.config.cleanup_interval {
            let weak = Arc::downgrade(self);
            tasks.push(PeriodicTask::spawn(
                format!("{}-ttl-sweep", self.name),
                period,
                move || {
                    let weak = weak.clone();
                    async move {
                        match weak.upgrade() {
                            Some(cache) => {
                                cache.sweep_expired().await;
                                ControlFlow::Continue(())
                            }
                            None => ControlFlow::Break(()),
                        }
                    }
                },
            )?);
        }

        if let Some(period) = self.config.memory_check_interval {
            let weak = Arc::downgrade(self);
            tasks.push(PeriodicTask::spawn(
                format!("{}-memory-check", self.name),
                period,
                move || {
                    let weak = weak.clone();
                    async move {
                        match weak.upgrade() {
                            Some(cache) => {
                                cache.check_memory_pressure();
                                ControlFlow::Continue(())
                            }
                            None => ControlFlow::Break(()),
                        }
                    }
                },
            )?);
        }

        Ok(())
    }

    /// Number of running background timers
    pub fn active_timers(&self) -> usize {
        self.tasks.lock().iter().filter(|t| t.is_running()).count()
    }
}

impl<V> Closeable for LruCache<V> {
    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for task in self.tasks.lock().drain(..) {
            task.stop();
        }
        debug!(cache = %self.name, "Cache closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::FixedMemoryProbe;

    fn cache(max_size: usize, ttl: Duration) -> LruCache<String> {
        LruCache::with_probe(
            "test",
            LruConfig::new(max_size, ttl),
            Arc::new(FixedMemoryProbe(0.0)),
        )
        .unwrap()
    }

    fn set(cache: &LruCache<String>, key: &str, value: &str) {
        cache.set(key, value.to_string(), None).unwrap();
    }

    #[test]
    fn test_round_trip() {
        let cache = cache(10, Duration::from_secs(60));
        set(&cache, "search:rust", "results");
        assert_eq!(cache.get("search:rust"), Some("results".to_string()));
        assert!(cache.has("search:rust"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_replace_updates_in_place() {
        let cache = cache(10, Duration::from_secs(60));
        set(&cache, "a", "1");
        set(&cache, "a", "2");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some("2".to_string()));
    }

    #[test]
    fn test_invalid_key() {
        let cache = cache(10, Duration::from_secs(60));
        let result = cache.set("", "v".to_string(), None);
        assert!(matches!(result, Err(Error::InvalidKey(_))));
        assert_eq!(cache.stats().sets, 0);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = cache(10, Duration::from_secs(60));
        cache
            .set("short", "lived".to_string(), Some(Duration::from_millis(50)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(80));

        assert!(!cache.has("short"));
        assert_eq!(cache.get("short"), None);
        // Lazily purged on access
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = cache(3, Duration::from_secs(60));
        for key in ["a", "b", "c", "d"] {
            set(&cache, key, key);
        }

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("d"), Some("d".to_string()));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_recency_refresh() {
        let cache = cache(3, Duration::from_secs(60));
        set(&cache, "a", "1");
        set(&cache, "b", "2");
        set(&cache, "c", "3");
        assert!(cache.get("a").is_some());
        set(&cache, "d", "4");

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some("1".to_string()));
        assert_eq!(cache.get("d"), Some("4".to_string()));
    }

    #[test]
    fn test_example_scenario() {
        let cache = cache(2, Duration::from_millis(1000));
        set(&cache, "x", "1");
        set(&cache, "y", "2");
        set(&cache, "z", "3");

        assert_eq!(cache.get("x"), None);
        assert_eq!(cache.get("y"), Some("2".to_string()));
        assert_eq!(cache.get("z"), Some("3".to_string()));
    }

    #[test]
    fn test_has_does_not_refresh_recency() {
        let cache = cache(2, Duration::from_secs(60));
        set(&cache, "a", "1");
        set(&cache, "b", "2");
        assert!(cache.has("a"));
        set(&cache, "c", "3");

        // "a" stayed least recently used despite has()
        assert!(!cache.has("a"));
        assert!(cache.has("b"));
    }

    #[test]
    fn test_delete_idempotent() {
        let cache = cache(5, Duration::from_secs(60));
        set(&cache, "a", "1");
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.stats().deletes, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_touch() {
        let cache = cache(2, Duration::from_secs(60));
        cache
            .set("a", "1".to_string(), Some(Duration::from_millis(40)))
            .unwrap();
        set(&cache, "b", "2");

        assert!(cache.touch("a", Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.has("a"));

        // touch moved "a" to the head, so "b" is evicted next
        set(&cache, "c", "3");
        assert!(!cache.has("b"));
        assert!(!cache.touch("missing", Duration::from_secs(1)));
    }

    #[test]
    fn test_touch_expired_is_false() {
        let cache = cache(2, Duration::from_secs(60));
        cache
            .set("a", "1".to_string(), Some(Duration::from_millis(10)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert!(!cache.touch("a", Duration::from_secs(60)));
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_cleanup_expired_scans_whole_list() {
        let cache = cache(10, Duration::from_secs(60));
        // Expiry order differs from recency order
        cache.set("old-long", "1".into(), Some(Duration::from_secs(60))).unwrap();
        cache.set("mid-short", "2".into(), Some(Duration::from_millis(10))).unwrap();
        cache.set("new-long", "3".into(), Some(Duration::from_secs(60))).unwrap();
        cache.set("newest-short", "4".into(), Some(Duration::from_millis(10))).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.keys(), vec!["new-long".to_string(), "old-long".to_string()]);
        assert_eq!(cache.stats().cleanups, 2);
    }

    #[test]
    fn test_evict_lru_removes_tail() {
        let cache = cache(5, Duration::from_secs(60));
        set(&cache, "a", "1");
        set(&cache, "b", "2");
        assert_eq!(cache.evict_lru(), Some("a".to_string()));
        assert_eq!(cache.evict_lru(), Some("b".to_string()));
        assert_eq!(cache.evict_lru(), None);
    }

    #[test]
    fn test_clear() {
        let cache = cache(5, Duration::from_secs(60));
        set(&cache, "a", "1");
        set(&cache, "b", "2");
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);

        // Arena is reusable after clear
        set(&cache, "c", "3");
        assert_eq!(cache.get("c"), Some("3".to_string()));
    }

    #[test]
    fn test_slots_are_reused() {
        let cache = cache(3, Duration::from_secs(60));
        for i in 0..100 {
            set(&cache, &format!("k{}", i), "v");
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.arena.lock().nodes.len() <= 3);
        assert_eq!(
            cache.keys(),
            vec!["k99".to_string(), "k98".to_string(), "k97".to_string()]
        );
    }

    #[test]
    fn test_take_relocates_live_entry() {
        let cache = cache(5, Duration::from_secs(60));
        set(&cache, "a", "1");
        let taken = cache.take("a").unwrap();
        assert_eq!(taken.value, "1");
        assert!(taken.expires_at_ms > now_ms());
        assert!(!cache.has("a"));
        assert_eq!(cache.stats().deletes, 0);
        assert!(cache.take("a").is_none());
    }

    #[test]
    fn test_stats() {
        let cache = cache(2, Duration::from_secs(60));
        set(&cache, "a", "1");
        cache.get("a");
        cache.get("missing");
        set(&cache, "b", "2");
        set(&cache, "c", "3");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 3);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.size, 2);
        assert_eq!(stats.capacity, 2);
        assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_memory_pressure_shrinks_to_target() {
        let cache: LruCache<String> = LruCache::with_probe(
            "pressure",
            LruConfig::new(10, Duration::from_secs(60)),
            Arc::new(FixedMemoryProbe(0.99)),
        )
        .unwrap();
        for i in 0..10 {
            set(&cache, &format!("k{}", i), "v");
        }

        assert_eq!(cache.check_memory_pressure(), 2);
        assert_eq!(cache.len(), 8);
        // Oldest entries went first
        assert!(!cache.has("k0"));
        assert!(!cache.has("k1"));
        assert!(cache.has("k9"));
    }

    #[test]
    fn test_no_pressure_below_threshold() {
        let cache = cache(10, Duration::from_secs(60));
        for i in 0..10 {
            set(&cache, &format!("k{}", i), "v");
        }
        assert_eq!(cache.check_memory_pressure(), 0);
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_config_validation() {
        let bad = LruConfig::new(0, Duration::from_secs(1));
        assert!(LruCache::<String>::new("bad", bad).is_err());

        let bad_ratio = LruConfig::new(1, Duration::from_secs(1))
            .with_memory_check(Duration::from_secs(1), 1.5);
        assert!(bad_ratio.validate().is_err());
    }

    #[tokio::test]
    async fn test_sweep_expired_in_batches() {
        let mut config = LruConfig::new(50, Duration::from_secs(60));
        config.sweep_batch = 4;
        let cache: LruCache<String> =
            LruCache::with_probe("sweep", config, Arc::new(FixedMemoryProbe(0.0))).unwrap();

        for i in 0..20 {
            let ttl = if i % 2 == 0 {
                Duration::from_millis(10)
            } else {
                Duration::from_secs(60)
            };
            cache.set(&format!("k{}", i), "v".into(), Some(ttl)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.sweep_expired().await, 10);
        assert_eq!(cache.len(), 10);
        assert!(cache.has("k1"));
    }

    #[tokio::test]
    async fn test_background_cleanup_and_close() {
        let config = LruConfig::new(10, Duration::from_millis(20))
            .with_cleanup_interval(Duration::from_millis(20))
            .with_memory_check(Duration::from_millis(20), 0.9);
        let cache: Arc<LruCache<String>> = Arc::new(
            LruCache::with_probe("timers", config, Arc::new(FixedMemoryProbe(0.0))).unwrap(),
        );
        cache.start_maintenance().unwrap();
        assert_eq!(cache.active_timers(), 2);

        set(&cache, "a", "1");
        tokio::time::sleep(Duration::from_millis(100)).await;
        // Swept without any get()
        assert_eq!(cache.len(), 0);

        cache.close();
        cache.close();
        assert!(cache.is_closed());
        assert_eq!(cache.active_timers(), 0);
    }
}
