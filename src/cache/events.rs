//! Cache Events
//!
//! Events published by a tiered cache for monitoring and tests.

use crate::cache::tier::CacheTier;
use serde::{Deserialize, Serialize};

/// Events emitted by a tiered cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CacheEvent {
    /// Value stored in the tier its temperature selected
    Put {
        key: String,
        tier: CacheTier,
        size_bytes: u64,
        compressed: bool,
    },

    Hit {
        key: String,
        tier: CacheTier,
        promoted: bool,
    },

    /// Not found in any tier
    Miss { key: String },

    Delete { key: String },

    Promote {
        key: String,
        from_tier: CacheTier,
        to_tier: CacheTier,
    },

    Demote {
        key: String,
        from_tier: CacheTier,
        to_tier: CacheTier,
    },

    /// Expired entries removed by a maintenance sweep
    Expired { tier: CacheTier, count: u64 },

    /// A disk read or demotion failed and was absorbed
    DiskFault { key: Option<String>, reason: String },

    /// Every tier was emptied
    Cleared,
}

impl CacheEvent {
    pub fn put(key: &str, tier: CacheTier, size_bytes: u64, compressed: bool) -> Self {
        CacheEvent::Put {
            key: key.to_string(),
            tier,
            size_bytes,
            compressed,
        }
    }

    pub fn hit(key: &str, tier: CacheTier, promoted: bool) -> Self {
        CacheEvent::Hit {
            key: key.to_string(),
            tier,
            promoted,
        }
    }

    pub fn miss(key: &str) -> Self {
        CacheEvent::Miss {
            key: key.to_string(),
        }
    }

    pub fn promote(key: &str, from_tier: CacheTier, to_tier: CacheTier) -> Self {
        CacheEvent::Promote {
            key: key.to_string(),
            from_tier,
            to_tier,
        }
    }

    pub fn demote(key: &str, from_tier: CacheTier, to_tier: CacheTier) -> Self {
        CacheEvent::Demote {
            key: key.to_string(),
            from_tier,
            to_tier,
        }
    }

    pub fn disk_fault(key: Option<&str>, reason: impl Into<String>) -> Self {
        CacheEvent::DiskFault {
            key: key.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// Get the key associated with this event (if any)
    pub fn key(&self) -> Option<&str> {
        match self {
            CacheEvent::Put { key, .. }
            | CacheEvent::Hit { key, .. }
            | CacheEvent::Miss { key }
            | CacheEvent::Delete { key }
            | CacheEvent::Promote { key, .. }
            | CacheEvent::Demote { key, .. } => Some(key),
            CacheEvent::DiskFault { key, .. } => key.as_deref(),
            CacheEvent::Expired { .. } | CacheEvent::Cleared => None,
        }
    }

    /// Get the tier associated with this event (if any)
    ///
    /// Moves report their destination tier.
    pub fn tier(&self) -> Option<CacheTier> {
        match self {
            CacheEvent::Put { tier, .. }
            | CacheEvent::Hit { tier, .. }
            | CacheEvent::Expired { tier, .. } => Some(*tier),
            CacheEvent::Promote { to_tier, .. } | CacheEvent::Demote { to_tier, .. } => {
                Some(*to_tier)
            }
            CacheEvent::DiskFault { .. } => Some(CacheTier::Cold),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CacheEvent::DiskFault { .. })
    }
}
