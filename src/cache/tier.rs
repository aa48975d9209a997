//! Cache Tier Definitions
//!
//! Defines the three-tier hierarchy and the access-frequency temperature
//! that decides where a write lands.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// =============================================================================
// Defaults
// =============================================================================

/// Default number of accesses within the window for a key to be hot
pub const DEFAULT_HOT_THRESHOLD: u32 = 10;

/// Default number of accesses within the window for a key to be warm
pub const DEFAULT_WARM_THRESHOLD: u32 = 3;

/// Default temperature window: one hour
pub const DEFAULT_TEMPERATURE_WINDOW: Duration = Duration::from_secs(60 * 60);

// =============================================================================
// Cache Tier
// =============================================================================

/// Cache tier representing the storage hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// Tier 1: in-memory cache for hot keys
    #[default]
    Hot,
    /// Tier 2: in-memory cache for warm keys
    Warm,
    /// Tier 3: disk-backed cache for cold keys
    Cold,
}

impl CacheTier {
    /// Tier that a write for the given temperature lands in
    pub fn for_temperature(temperature: Temperature) -> Self {
        match temperature {
            Temperature::Hot => CacheTier::Hot,
            Temperature::Warm => CacheTier::Warm,
            Temperature::Cold => CacheTier::Cold,
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTier::Hot => write!(f, "L1-Hot"),
            CacheTier::Warm => write!(f, "L2-Warm"),
            CacheTier::Cold => write!(f, "L3-Cold"),
        }
    }
}

// =============================================================================
// Temperature
// =============================================================================

/// Access-frequency classification of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    Hot,
    Warm,
    Cold,
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Temperature::Hot => write!(f, "hot"),
            Temperature::Warm => write!(f, "warm"),
            Temperature::Cold => write!(f, "cold"),
        }
    }
}

// =============================================================================
// Temperature Configuration
// =============================================================================

/// Thresholds and windows used to classify key temperature
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureConfig {
    /// Accesses within the window at or above which a key is hot
    pub hot_threshold: u32,
    /// Accesses within the window at or above which a key is warm
    pub warm_threshold: u32,
    /// Length of the counting window
    pub window: Duration,
    /// Records idle for longer than this are pruned
    pub retention: Duration,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOT_THRESHOLD, DEFAULT_WARM_THRESHOLD, DEFAULT_TEMPERATURE_WINDOW)
    }
}

impl TemperatureConfig {
    /// Create a config whose retention is twice the window
    pub fn new(hot_threshold: u32, warm_threshold: u32, window: Duration) -> Self {
        Self {
            hot_threshold,
            warm_threshold,
            window,
            retention: window * 2,
        }
    }

    /// Check the thresholds are monotone and non-zero
    pub fn validate(&self) -> Result<()> {
        if self.warm_threshold == 0 {
            return Err(Error::Configuration("warmThreshold must be at least 1".into()));
        }
        if self.hot_threshold <= self.warm_threshold {
            return Err(Error::Configuration(format!(
                "hotThreshold ({}) must exceed warmThreshold ({})",
                self.hot_threshold, self.warm_threshold
            )));
        }
        if self.window.is_zero() {
            return Err(Error::Configuration("temperature window must be non-zero".into()));
        }
        Ok(())
    }

    /// Classify an access count; meeting a threshold exactly qualifies
    pub fn classify(&self, count: u32) -> Temperature {
        if count >= self.hot_threshold {
            Temperature::Hot
        } else if count >= self.warm_threshold {
            Temperature::Warm
        } else {
            Temperature::Cold
        }
    }
}
