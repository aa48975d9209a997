//! Partition Configuration
//!
//! Per-partition tuning (tier sizes, TTLs, temperature thresholds,
//! compression) with built-in profiles, plus the registry-wide config that
//! can be loaded from YAML or JSON.

use crate::cache::compression::{CompressionAlgorithm, CompressionConfig};
use crate::cache::lru::LruConfig;
use crate::cache::manager::TieredCacheConfig;
use crate::cache::storage::DiskTierConfig;
use crate::cache::tier::TemperatureConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;

// =============================================================================
// Partition Configuration
// =============================================================================

/// Tuning for one named partition
///
/// TTLs and intervals are milliseconds; an interval of 0 disables that
/// background task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartitionConfig {
    pub l1_max_size: usize,
    pub l2_max_size: usize,
    /// Disk entries kept after a sweep (0 = unbounded)
    pub l3_max_size: usize,
    #[serde(rename = "l1TTL")]
    pub l1_ttl_ms: u64,
    #[serde(rename = "l2TTL")]
    pub l2_ttl_ms: u64,
    #[serde(rename = "l3TTL")]
    pub l3_ttl_ms: u64,
    pub hot_threshold: u32,
    pub warm_threshold: u32,
    pub compression: bool,
    pub compression_threshold_bytes: usize,
    pub compression_algorithm: CompressionAlgorithm,
    pub temperature_window_ms: u64,
    pub cleanup_interval_ms: u64,
    pub maintenance_interval_ms: u64,
    pub memory_check_interval_ms: u64,
    pub memory_threshold_ratio: f64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            l1_max_size: 100,
            l2_max_size: 500,
            l3_max_size: 2000,
            l1_ttl_ms: 5 * MINUTE_MS,
            l2_ttl_ms: 30 * MINUTE_MS,
            l3_ttl_ms: 24 * HOUR_MS,
            hot_threshold: 10,
            warm_threshold: 3,
            compression: true,
            compression_threshold_bytes: 1024,
            compression_algorithm: CompressionAlgorithm::default(),
            temperature_window_ms: HOUR_MS,
            cleanup_interval_ms: MINUTE_MS,
            maintenance_interval_ms: 5 * MINUTE_MS,
            memory_check_interval_ms: 30 * 1000,
            memory_threshold_ratio: 0.85,
        }
    }
}

impl PartitionConfig {
    /// Built-in profile for a well-known partition name
    pub fn profile(name: &str) -> Option<Self> {
        let base = Self::default();
        let profile = match name {
            // Reused often and cheap to hold: promote fast, expire fast
            "search-results" => Self {
                l1_max_size: 200,
                l2_max_size: 1000,
                l3_max_size: 5000,
                l1_ttl_ms: 2 * MINUTE_MS,
                l2_ttl_ms: 10 * MINUTE_MS,
                l3_ttl_ms: HOUR_MS,
                hot_threshold: 3,
                warm_threshold: 2,
                compression_threshold_bytes: 2048,
                ..base
            },
            // Stable bodies: long cold lifetime, compressed
            "templates" => Self {
                l1_max_size: 50,
                l2_max_size: 200,
                l3_max_size: 1000,
                l1_ttl_ms: 30 * MINUTE_MS,
                l2_ttl_ms: 2 * HOUR_MS,
                l3_ttl_ms: 7 * 24 * HOUR_MS,
                hot_threshold: 5,
                warm_threshold: 2,
                compression_threshold_bytes: 512,
                ..base
            },
            // Tiny and hot: compression is not worth the CPU
            "metadata" => Self {
                l1_max_size: 500,
                l2_max_size: 2000,
                l3_max_size: 10_000,
                l1_ttl_ms: 10 * MINUTE_MS,
                l2_ttl_ms: HOUR_MS,
                hot_threshold: 5,
                warm_threshold: 2,
                compression: false,
                ..base
            },
            "file-content" => Self {
                l1_max_size: 20,
                l2_max_size: 100,
                l3_max_size: 1000,
                compression_algorithm: CompressionAlgorithm::Lz4,
                ..base
            },
            _ => return None,
        };
        Some(profile)
    }

    /// Profile for `name`, or the generic default
    pub fn for_partition(name: &str) -> Self {
        Self::profile(name).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.l1_max_size == 0 || self.l2_max_size == 0 {
            return Err(Error::Configuration(
                "l1MaxSize and l2MaxSize must be at least 1".into(),
            ));
        }
        if self.l1_ttl_ms == 0 || self.l2_ttl_ms == 0 || self.l3_ttl_ms == 0 {
            return Err(Error::Configuration("TTLs must be non-zero".into()));
        }
        if !(self.memory_threshold_ratio > 0.0 && self.memory_threshold_ratio <= 1.0) {
            return Err(Error::Configuration(format!(
                "memoryThresholdRatio must be in (0, 1], got {}",
                self.memory_threshold_ratio
            )));
        }
        self.temperature().validate()
    }

    pub fn temperature(&self) -> TemperatureConfig {
        TemperatureConfig::new(
            self.hot_threshold,
            self.warm_threshold,
            Duration::from_millis(self.temperature_window_ms),
        )
    }

    fn memory_tier(&self, max_size: usize, ttl_ms: u64) -> LruConfig {
        let mut config = LruConfig::new(max_size, Duration::from_millis(ttl_ms));
        config.cleanup_interval = interval(self.cleanup_interval_ms);
        config.memory_check_interval = interval(self.memory_check_interval_ms);
        config.memory_threshold_ratio = self.memory_threshold_ratio;
        config
    }

    pub fn hot_tier(&self) -> LruConfig {
        self.memory_tier(self.l1_max_size, self.l1_ttl_ms)
    }

    pub fn warm_tier(&self) -> LruConfig {
        self.memory_tier(self.l2_max_size, self.l2_ttl_ms)
    }

    /// Disk tier config rooted at `root`
    pub fn disk_tier(&self, root: impl Into<PathBuf>) -> DiskTierConfig {
        let mut config = DiskTierConfig::new(root);
        config.default_ttl = Duration::from_millis(self.l3_ttl_ms);
        config.max_entries = (self.l3_max_size > 0).then_some(self.l3_max_size);
        config.compression = CompressionConfig {
            enabled: self.compression,
            algorithm: self.compression_algorithm,
            threshold_bytes: self.compression_threshold_bytes,
            ..CompressionConfig::default()
        };
        config
    }

    /// Full orchestrator config with the disk tier at `base_dir/<name>`
    pub fn to_tiered_config(&self, name: &str, base_dir: &Path) -> TieredCacheConfig {
        let mut config = TieredCacheConfig::new(
            self.hot_tier(),
            self.warm_tier(),
            self.disk_tier(base_dir.join(partition_dir_name(name))),
            self.temperature(),
        );
        config.maintenance_interval = interval(self.maintenance_interval_ms);
        config
    }
}

fn interval(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Reject partition names that cannot own a directory of their own
pub fn validate_partition_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Configuration("partition name must not be empty".into()));
    }
    Ok(())
}

/// Directory name for a partition
///
/// ASCII letters, digits and '-' are kept; every other byte, '_' included,
/// becomes `_xx` (lowercase hex), so distinct names never share a directory.
pub fn partition_dir_name(name: &str) -> String {
    let mut dir = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            dir.push(byte as char);
        } else {
            dir.push('_');
            dir.push_str(&hex::encode([byte]));
        }
    }
    dir
}

// =============================================================================
// Registry Configuration
// =============================================================================

/// Configuration shared by every partition of a registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    /// Parent directory of every partition's disk tier
    pub base_dir: PathBuf,
    /// Explicit per-partition overrides
    pub partitions: HashMap<String, PartitionConfig>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("tiered-cache"))
    }
}

impl RegistryConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            partitions: HashMap::new(),
        }
    }

    pub fn with_partition(mut self, name: impl Into<String>, config: PartitionConfig) -> Self {
        self.partitions.insert(name.into(), config);
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json` file, or YAML for any other extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::disk_io(path, e))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, partition) in &self.partitions {
            validate_partition_name(name)?;
            partition
                .validate()
                .map_err(|e| Error::Configuration(format!("partition {}: {}", name, e)))?;
        }
        Ok(())
    }

    /// Explicit override, else built-in profile, else generic default
    pub fn partition_config(&self, name: &str) -> PartitionConfig {
        self.partitions
            .get(name)
            .cloned()
            .unwrap_or_else(|| PartitionConfig::for_partition(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_profiles() {
        for name in ["search-results", "templates", "metadata", "file-content"] {
            let profile = PartitionConfig::profile(name).unwrap();
            assert!(profile.validate().is_ok(), "{} profile invalid", name);
        }
        assert!(!PartitionConfig::profile("metadata").unwrap().compression);
        assert!(
            PartitionConfig::profile("search-results").unwrap().hot_threshold
                < PartitionConfig::default().hot_threshold
        );
        assert!(PartitionConfig::profile("unknown").is_none());
        assert_eq!(PartitionConfig::for_partition("unknown"), PartitionConfig::default());
    }

    #[test]
    fn test_yaml_wire_names() {
        let yaml = r#"
baseDir: /var/cache/prompts
partitions:
  templates:
    l1MaxSize: 5
    l1TTL: 1000
    l3TTL: 60000
    hotThreshold: 4
    warmThreshold: 2
    compression: false
    compressionAlgorithm: snappy
"#;
        let config = RegistryConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/var/cache/prompts"));

        let templates = config.partition_config("templates");
        assert_eq!(templates.l1_max_size, 5);
        assert_eq!(templates.l1_ttl_ms, 1000);
        assert_eq!(templates.l3_ttl_ms, 60_000);
        assert_eq!(templates.hot_threshold, 4);
        assert!(!templates.compression);
        assert_eq!(templates.compression_algorithm, CompressionAlgorithm::Snappy);
        // Unspecified fields fall back to defaults
        assert_eq!(templates.l2_max_size, PartitionConfig::default().l2_max_size);

        // Partitions without overrides use their profile
        assert_eq!(
            config.partition_config("metadata"),
            PartitionConfig::profile("metadata").unwrap()
        );
    }

    #[test]
    fn test_json() {
        let json = r#"{"baseDir":"/tmp/c","partitions":{"a":{"l2MaxSize":7,"l2TTL":500}}}"#;
        let config = RegistryConfig::from_json_str(json).unwrap();
        let a = config.partition_config("a");
        assert_eq!(a.l2_max_size, 7);
        assert_eq!(a.l2_ttl_ms, 500);

        let round = serde_json::to_value(&a).unwrap();
        assert_eq!(round["l2TTL"], 500);
        assert_eq!(round["compressionAlgorithm"], "zstd");
    }

    #[test]
    fn test_validation() {
        let yaml = "partitions:\n  bad:\n    hotThreshold: 2\n    warmThreshold: 2\n";
        assert_matches!(RegistryConfig::from_yaml_str(yaml), Err(Error::Configuration(_)));

        let zero = PartitionConfig {
            l1_max_size: 0,
            ..PartitionConfig::default()
        };
        assert!(zero.validate().is_err());

        assert_matches!(RegistryConfig::from_json_str("{not json"), Err(Error::Json(_)));
    }

    #[test]
    fn test_to_tiered_config() {
        let partition = PartitionConfig {
            l3_max_size: 0,
            cleanup_interval_ms: 0,
            ..PartitionConfig::for_partition("templates")
        };
        let config = partition.to_tiered_config("templates", Path::new("/cache"));

        assert_eq!(config.hot.max_size, 50);
        assert_eq!(config.hot.default_ttl, Duration::from_millis(30 * MINUTE_MS));
        assert_eq!(config.hot.cleanup_interval, None);
        assert_eq!(config.disk.root, PathBuf::from("/cache/templates"));
        assert_eq!(config.disk.max_entries, None);
        assert_eq!(config.disk.compression.threshold_bytes, 512);
        assert_eq!(config.temperature.hot_threshold, 5);
        assert_eq!(config.maintenance_interval, Some(Duration::from_millis(5 * MINUTE_MS)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partition_dir_name() {
        assert_eq!(partition_dir_name("search-results"), "search-results");
        assert_eq!(partition_dir_name("../etc/passwd"), "_2e_2e_2fetc_2fpasswd");
        assert_eq!(partition_dir_name("user_sessions"), "user_5fsessions");

        let names = ["user.sessions", "user/sessions", "user_sessions", "user_2esessions"];
        let dirs: std::collections::HashSet<String> =
            names.iter().map(|n| partition_dir_name(n)).collect();
        assert_eq!(dirs.len(), names.len());
    }

    #[test]
    fn test_empty_partition_name_rejected() {
        assert_matches!(validate_partition_name(""), Err(Error::Configuration(_)));
        assert!(validate_partition_name("templates").is_ok());

        let config = RegistryConfig::new("/cache").with_partition("", PartitionConfig::default());
        assert_matches!(config.validate(), Err(Error::Configuration(_)));
    }

    #[test]
    fn test_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cache.yaml");
        std::fs::write(&path, "baseDir: /data\n").unwrap();
        let config = RegistryConfig::from_file(&path).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/data"));

        assert_matches!(
            RegistryConfig::from_file(tmp.path().join("missing.yaml")),
            Err(Error::DiskIo { .. })
        );
    }
}
