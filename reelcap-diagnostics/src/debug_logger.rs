//! Structured logging setup

use reelcap_core::CaptureError;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Installs the process-wide `tracing` subscriber
#[derive(Debug, Default)]
pub struct DebugLogger;

impl DebugLogger {
    pub fn new() -> Self {
        Self
    }

    /// Initialise from `RUST_LOG`, falling back to `info`
    ///
    /// Returns `Ok(false)` when a subscriber was already installed.
    pub fn init_logging() -> Result<bool, CaptureError> {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        Ok(Self::install(filter))
    }

    /// Initialise with an explicit filter directive, e.g. `reelcap=debug`
    pub fn init_logging_with(directives: &str) -> Result<bool, CaptureError> {
        let filter = EnvFilter::try_new(directives).map_err(|e| CaptureError::Initialization {
            reason: format!("invalid log filter '{directives}': {e}"),
        })?;
        Ok(Self::install(filter))
    }

    fn install(filter: EnvFilter) -> bool {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_not_an_error() {
        assert!(DebugLogger::init_logging_with("debug").is_ok());
        assert!(!DebugLogger::init_logging_with("info").unwrap());
        assert!(DebugLogger::init_logging().is_ok());
    }

    #[test]
    fn test_bad_filter_is_rejected() {
        let err = DebugLogger::init_logging_with("reelcap=notalevel").unwrap_err();
        assert!(matches!(err, CaptureError::Initialization { ref reason } if reason.contains("notalevel")));
    }
}
