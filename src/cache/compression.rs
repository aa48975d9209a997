//! Compression Support
//!
//! Payload compression for the disk tier. A payload is compressed only when
//! it exceeds the partition's threshold, and the compressed form is kept only
//! when it is actually smaller.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default size above which disk payloads are compressed
pub const DEFAULT_COMPRESSION_THRESHOLD_BYTES: usize = 1024;

// =============================================================================
// Algorithm
// =============================================================================

/// Compression algorithm recorded alongside a compressed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    Lz4,
    #[default]
    Zstd,
    Snappy,
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionAlgorithm::Lz4 => write!(f, "lz4"),
            CompressionAlgorithm::Zstd => write!(f, "zstd"),
            CompressionAlgorithm::Snappy => write!(f, "snappy"),
        }
    }
}

// =============================================================================
// Compression Configuration
// =============================================================================

/// Per-partition compression settings
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionConfig {
    /// Whether payloads may be compressed at all
    pub enabled: bool,
    pub algorithm: CompressionAlgorithm,
    /// Payloads larger than this are compressed
    pub threshold_bytes: usize,
    /// Compression level (algorithm-specific)
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: CompressionAlgorithm::default(),
            threshold_bytes: DEFAULT_COMPRESSION_THRESHOLD_BYTES,
            level: 3,
        }
    }
}

impl CompressionConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

// =============================================================================
// Compressor Trait
// =============================================================================

/// Trait for compression implementations
pub trait Compressor: Send + Sync {
    fn algorithm(&self) -> CompressionAlgorithm;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// LZ4 block compressor with a size prefix
pub struct Lz4Compressor {
    level: i32,
}

impl Lz4Compressor {
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Compressor for Lz4Compressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mode = lz4::block::CompressionMode::HIGHCOMPRESSION(self.level);
        lz4::block::compress(data, Some(mode), true)
            .map_err(|e| Error::Compression(format!("lz4 compress: {}", e)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None)
            .map_err(|e| Error::Compression(format!("lz4 decompress: {}", e)))
    }
}

pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Compressor for ZstdCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Zstd
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.level)
            .map_err(|e| Error::Compression(format!("zstd compress: {}", e)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| Error::Compression(format!("zstd decompress: {}", e)))
    }
}

/// Snappy raw-format compressor
pub struct SnappyCompressor;

impl Compressor for SnappyCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Snappy
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| Error::Compression(format!("snappy compress: {}", e)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| Error::Compression(format!("snappy decompress: {}", e)))
    }
}

// =============================================================================
// Compression Manager
// =============================================================================

/// Applies a partition's compression policy
pub struct CompressionManager {
    config: CompressionConfig,
    lz4: Lz4Compressor,
    zstd: ZstdCompressor,
    snappy: SnappyCompressor,
}

impl CompressionManager {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            lz4: Lz4Compressor::with_level(config.level),
            zstd: ZstdCompressor::with_level(config.level),
            snappy: SnappyCompressor,
            config,
        }
    }

    fn compressor(&self, algorithm: CompressionAlgorithm) -> &dyn Compressor {
        match algorithm {
            CompressionAlgorithm::Lz4 => &self.lz4,
            CompressionAlgorithm::Zstd => &self.zstd,
            CompressionAlgorithm::Snappy => &self.snappy,
        }
    }

    /// Whether a payload of `len` bytes qualifies for compression
    pub fn should_compress(&self, len: usize) -> bool {
        self.config.enabled && len > self.config.threshold_bytes
    }

    /// Compress `data` if policy allows and it helps
    ///
    /// Returns `None` when the payload should be stored as-is. A compressor
    /// failure is returned as an error so the write can be reported.
    pub fn compress(&self, data: &[u8]) -> Result<Option<(Bytes, CompressionAlgorithm)>> {
        if !self.should_compress(data.len()) {
            return Ok(None);
        }

        let algorithm = self.config.algorithm;
        let compressed = self.compressor(algorithm).compress(data)?;
        if compressed.len() < data.len() {
            Ok(Some((Bytes::from(compressed), algorithm)))
        } else {
            Ok(None)
        }
    }

    pub fn decompress(&self, data: &[u8], algorithm: CompressionAlgorithm) -> Result<Bytes> {
        self.compressor(algorithm).decompress(data).map(Bytes::from)
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }
}

impl Default for CompressionManager {
    fn default() -> Self {
        Self::new(CompressionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repetitive(len: usize) -> Vec<u8> {
        b"search result: src/cache/lru.rs line 42; "
            .iter()
            .cycle()
            .take(len)
            .copied()
            .collect()
    }

    #[test]
    fn test_each_algorithm_roundtrip() {
        let data = repetitive(4096);
        for algorithm in [
            CompressionAlgorithm::Lz4,
            CompressionAlgorithm::Zstd,
            CompressionAlgorithm::Snappy,
        ] {
            let manager = CompressionManager::new(CompressionConfig {
                algorithm,
                ..CompressionConfig::default()
            });
            let (compressed, used) = manager.compress(&data).unwrap().unwrap();
            assert_eq!(used, algorithm);
            assert!(compressed.len() < data.len());

            let restored = manager.decompress(&compressed, used).unwrap();
            assert_eq!(restored.as_ref(), data.as_slice());
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let manager = CompressionManager::new(CompressionConfig {
            threshold_bytes: 100,
            ..CompressionConfig::default()
        });
        assert!(!manager.should_compress(100));
        assert!(manager.should_compress(101));
        assert!(manager.compress(&repetitive(100)).unwrap().is_none());
    }

    #[test]
    fn test_disabled() {
        let manager = CompressionManager::new(CompressionConfig::disabled());
        assert!(manager.compress(&repetitive(10_000)).unwrap().is_none());
    }

    #[test]
    fn test_incompressible_kept_raw() {
        let manager = CompressionManager::new(CompressionConfig {
            threshold_bytes: 16,
            algorithm: CompressionAlgorithm::Snappy,
            ..CompressionConfig::default()
        });
        // Short, high-entropy input grows under compression framing
        let data: Vec<u8> = (0u32..40).map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8).collect();
        if let Some((compressed, _)) = manager.compress(&data).unwrap() {
            assert!(compressed.len() < data.len());
        }
    }

    #[test]
    fn test_decompress_garbage_fails() {
        let manager = CompressionManager::default();
        let result = manager.decompress(b"not zstd at all", CompressionAlgorithm::Zstd);
        assert!(matches!(result, Err(Error::Compression(_))));
    }
}
