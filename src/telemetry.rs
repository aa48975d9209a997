//! Logging initialisation
//!
//! The library itself only emits `tracing` events. Binaries and tests that
//! embed the cache call [`init_logging`] once to install a subscriber.

use crate::error::{Error, Result};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Parse a level name, falling back to `info`
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install a global subscriber with an `EnvFilter` and a plain or JSON layer
///
/// `RUST_LOG` directives are honoured on top of `level`. Returns
/// `Error::Internal` when a global subscriber is already set.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(parse_level(level).into());

    let installed = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()
    };

    installed.map_err(|e| Error::Internal(format!("logging already initialised: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_second_init_is_rejected() {
        // Other tests may have installed a subscriber first
        let _ = init_logging("debug", false);
        assert!(init_logging("info", true).is_err());
    }
}
