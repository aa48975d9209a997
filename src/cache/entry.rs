//! Cache Entry Types
//!
//! Key validation, wall-clock helpers and the arena node that carries a
//! cached value through the recency list.

use crate::error::{Error, Result};
use chrono::Utc;
use std::time::Duration;

/// Index of a node inside an arena
pub type NodeIndex = usize;

// =============================================================================
// Clock
// =============================================================================

/// Current wall-clock time in Unix milliseconds
#[inline]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Absolute expiry for a TTL starting now
#[inline]
pub fn expiry_from_now(ttl: Duration) -> i64 {
    now_ms().saturating_add(ttl.as_millis().min(i64::MAX as u128) as i64)
}

/// Remaining lifetime of an absolute expiry, `None` once elapsed
pub fn remaining_ttl(expires_at_ms: i64) -> Option<Duration> {
    let remaining = expires_at_ms - now_ms();
    if remaining > 0 {
        Some(Duration::from_millis(remaining as u64))
    } else {
        None
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Reject keys the cache cannot address
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey(key.to_string()));
    }
    Ok(())
}

// =============================================================================
// Cache Entry
// =============================================================================

/// A cached value with its expiry and access metadata
///
/// `prev` and `next` are arena indices into the owning cache's recency
/// list (head = most recently used).
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    /// Absolute expiry (Unix millis)
    pub expires_at_ms: i64,
    pub created_at_ms: i64,
    pub last_accessed_ms: i64,
    pub access_count: u64,
    pub(crate) prev: Option<NodeIndex>,
    pub(crate) next: Option<NodeIndex>,
}

impl<V> CacheEntry<V> {
    /// Create a detached entry expiring after `ttl`
    pub fn new(key: String, value: V, ttl: Duration) -> Self {
        let now = now_ms();
        Self {
            key,
            value,
            expires_at_ms: now.saturating_add(ttl.as_millis().min(i64::MAX as u128) as i64),
            created_at_ms: now,
            last_accessed_ms: now,
            access_count: 0,
            prev: None,
            next: None,
        }
    }

    /// Check if the entry has expired at `now`
    #[inline]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at_ms <= now
    }

    /// Check if the entry has expired
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_ms())
    }

    /// Record a read hit
    pub fn record_access(&mut self) {
        self.last_accessed_ms = now_ms();
        self.access_count += 1;
    }

    /// Reset the expiry to `ttl` from now
    pub fn refresh(&mut self, ttl: Duration) {
        self.expires_at_ms = expiry_from_now(ttl);
        self.last_accessed_ms = now_ms();
    }
}
