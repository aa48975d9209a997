//! Error types for the tiered cache
//!
//! Provides structured error types for the cache primitive, the disk tier,
//! compression, configuration loading and the partition registry.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the cache engine
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Cache Primitive Errors
    // =========================================================================
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("Cache closed: {0}")]
    Closed(String),

    // =========================================================================
    // Disk Tier Errors
    // =========================================================================
    #[error("Disk I/O error at {path}: {source}")]
    DiskIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache entry at {path}: {reason}")]
    CorruptEntry { path: PathBuf, reason: String },

    #[error("Compression error: {0}")]
    Compression(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a caller should do after a failed cache operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Treat as a miss and fall back to the original source
    FallBackToSource,
    /// Caller bug or bad configuration, do not retry
    Fail,
}

impl Error {
    /// Build a disk I/O error for a path
    pub fn disk_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::DiskIo {
            path: path.into(),
            source,
        }
    }

    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Storage hiccups degrade to "always a miss"
            Error::DiskIo { .. }
            | Error::CorruptEntry { .. }
            | Error::Compression(_)
            | Error::Io(_) => ErrorAction::FallBackToSource,

            Error::Closed(_)
            | Error::InvalidKey(_)
            | Error::Configuration(_)
            | Error::Json(_)
            | Error::Yaml(_) => ErrorAction::Fail,

            Error::Internal(_) => ErrorAction::FallBackToSource,
        }
    }

    /// Check if this error is a transient storage fault
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::DiskIo { .. } | Error::CorruptEntry { .. } | Error::Compression(_) | Error::Io(_)
        )
    }
}

/// Result type alias for the cache engine
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_actions() {
        let err = Error::InvalidKey(String::new());
        assert_eq!(err.action(), ErrorAction::Fail);

        let err = Error::disk_io(
            "/tmp/cache/ab/abcd.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.action(), ErrorAction::FallBackToSource);
        assert!(err.is_transient());

        let err = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "shard vanished"));
        assert_eq!(err.action(), ErrorAction::FallBackToSource);

        let err = Error::Closed("partition registry".into());
        assert_eq!(err.action(), ErrorAction::Fail);

        let err = Error::Configuration("hotThreshold must exceed warmThreshold".into());
        assert_eq!(err.action(), ErrorAction::Fail);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = Error::CorruptEntry {
            path: PathBuf::from("/cache/ab/abcd.json"),
            reason: "expected value".into(),
        };
        assert_eq!(
            err.to_string(),
            "Corrupt cache entry at /cache/ab/abcd.json: expected value"
        );
    }
}
