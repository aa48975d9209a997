//! Cold Tier Storage
//!
//! The on-disk envelope, the explicit read result and the `ColdStore` trait
//! the orchestrator drives its cold tier through.

mod local;

pub use local::{DiskTier, DiskTierConfig};

use crate::cache::compression::{CompressionAlgorithm, CompressionManager};
use crate::cache::metrics::DiskStatsSnapshot;
use crate::cache::Closeable;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Envelope
// =============================================================================

/// How the envelope's `value` string encodes the payload bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    Base64,
}

/// Serialized record for one key
///
/// Uncompressed UTF-8 payloads are stored verbatim; compressed or binary
/// payloads are base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskEnvelope {
    pub value: String,
    /// Absolute expiry (Unix millis)
    pub expires_at: i64,
    pub compressed: bool,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<CompressionAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<PayloadEncoding>,
}

impl DiskEnvelope {
    /// Wrap a payload, compressing it if the manager's policy allows
    pub fn encode(
        payload: &[u8],
        created_at: i64,
        expires_at: i64,
        compression: &CompressionManager,
    ) -> Result<Self> {
        if let Some((compressed, algorithm)) = compression.compress(payload)? {
            return Ok(Self {
                value: BASE64.encode(&compressed),
                expires_at,
                compressed: true,
                created_at,
                algorithm: Some(algorithm),
                encoding: Some(PayloadEncoding::Base64),
            });
        }

        let (value, encoding) = match std::str::from_utf8(payload) {
            Ok(text) => (text.to_string(), None),
            Err(_) => (BASE64.encode(payload), Some(PayloadEncoding::Base64)),
        };
        Ok(Self {
            value,
            expires_at,
            compressed: false,
            created_at,
            algorithm: None,
            encoding,
        })
    }

    /// Recover the payload bytes
    ///
    /// Compressed envelopes written without an `algorithm` field use the
    /// manager's configured algorithm.
    pub fn decode(&self, compression: &CompressionManager) -> Result<Bytes> {
        let base64 = self.compressed || self.encoding == Some(PayloadEncoding::Base64);
        let raw = if base64 {
            BASE64
                .decode(self.value.as_bytes())
                .map_err(|e| Error::Compression(format!("invalid base64 payload: {}", e)))?
        } else {
            self.value.as_bytes().to_vec()
        };

        if !self.compressed {
            return Ok(Bytes::from(raw));
        }
        let algorithm = self.algorithm.unwrap_or(compression.config().algorithm);
        compression.decompress(&raw, algorithm)
    }

    #[inline]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

// =============================================================================
// Read Result
// =============================================================================

/// Outcome of a cold tier read
///
/// The caller decides the policy for each failure; none of them is fatal.
#[derive(Debug)]
pub enum DiskRead {
    Value { value: Bytes, expires_at_ms: i64 },
    /// No file, or the entry expired
    Absent,
    /// The file exists but could not be decoded; always `Error::CorruptEntry`
    Corrupt(Error),
    IoError(std::io::Error),
}

impl DiskRead {
    pub fn is_hit(&self) -> bool {
        matches!(self, DiskRead::Value { .. })
    }

    /// Collapse to a plain lookup result
    pub fn into_value(self) -> Option<Bytes> {
        match self {
            DiskRead::Value { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Result of a successful cold tier write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub compressed: bool,
    /// Envelope size on disk
    pub bytes: usize,
}

/// Summary of one expiry sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub corrupt: usize,
    /// Live files removed to honour the entry cap
    pub evicted: usize,
    pub errors: usize,
    /// Live files left after the sweep
    pub remaining: usize,
}

// =============================================================================
// ColdStore Trait
// =============================================================================

/// Storage behind the cold tier
///
/// Reads never fail: faults come back as `DiskRead` variants. Writes and
/// `clear` surface errors so callers know the data was not stored.
#[async_trait]
pub trait ColdStore: Closeable + Send + Sync {
    async fn read(&self, key: &str) -> DiskRead;

    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> Result<WriteOutcome>;

    /// Remove a key; a missing file is not an error
    async fn delete(&self, key: &str) -> bool;

    /// Existence check only, does not validate expiry
    async fn has(&self, key: &str) -> bool;

    /// Whether a readable, unexpired envelope exists for the key
    async fn is_live(&self, key: &str) -> bool;

    /// Remove expired and corrupt files and enforce the entry cap
    async fn sweep(&self) -> SweepReport;

    async fn clear(&self) -> Result<()>;

    async fn health_check(&self) -> bool;

    /// Default lifetime of entries written without an explicit TTL
    fn default_ttl(&self) -> Duration;

    fn stats(&self) -> DiskStatsSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::compression::CompressionConfig;

    fn manager(threshold_bytes: usize) -> CompressionManager {
        CompressionManager::new(CompressionConfig {
            threshold_bytes,
            ..CompressionConfig::default()
        })
    }

    #[test]
    fn test_text_stored_verbatim() {
        let compression = manager(1024);
        let envelope = DiskEnvelope::encode(b"hello", 1, 2, &compression).unwrap();
        assert_eq!(envelope.value, "hello");
        assert!(!envelope.compressed);
        assert!(envelope.encoding.is_none());

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["expiresAt"], 2);
        assert_eq!(json["createdAt"], 1);
        assert!(json.get("algorithm").is_none());
        assert_eq!(envelope.decode(&compression).unwrap().as_ref(), b"hello");
    }

    #[test]
    fn test_binary_uses_base64() {
        let compression = manager(1024);
        let payload = [0xff, 0xfe, 0x00, 0x01];
        let envelope = DiskEnvelope::encode(&payload, 1, 2, &compression).unwrap();
        assert_eq!(envelope.encoding, Some(PayloadEncoding::Base64));
        assert_eq!(envelope.decode(&compression).unwrap().as_ref(), &payload);
    }

    #[test]
    fn test_large_payload_compressed() {
        let compression = manager(64);
        let payload = "a template body that repeats. ".repeat(100);
        let envelope = DiskEnvelope::encode(payload.as_bytes(), 1, 2, &compression).unwrap();
        assert!(envelope.compressed);
        assert_eq!(envelope.algorithm, Some(CompressionAlgorithm::Zstd));
        assert!(envelope.value.len() < payload.len());
        assert_eq!(envelope.decode(&compression).unwrap().as_ref(), payload.as_bytes());
    }

    #[test]
    fn test_minimal_envelope_parses() {
        let json = r#"{"value":"v","expiresAt":10,"compressed":false,"createdAt":5}"#;
        let envelope: DiskEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.is_expired_at(10));
        assert!(!envelope.is_expired_at(9));
        assert_eq!(envelope.decode(&manager(1024)).unwrap().as_ref(), b"v");
    }

    #[test]
    fn test_bad_compressed_payload_fails_decode() {
        let envelope = DiskEnvelope {
            value: "!!not base64!!".to_string(),
            expires_at: 10,
            compressed: true,
            created_at: 1,
            algorithm: None,
            encoding: None,
        };
        assert!(envelope.decode(&manager(1024)).is_err());
    }
}
