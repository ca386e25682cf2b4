/*!
 * Logging functionality for Portlink.
 *
 * This module provides tracing setup and utilities for consistent logging
 * across the Portlink crates.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

/// Initialize the logging system with default configuration
pub fn init() -> Result<()> {
    init_with_filter("info")
}

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "portlink=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| Error::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create a new span for a device session
///
/// # Arguments
///
/// * `protocol` - The magic of the protocol driving the session
/// * `device` - An optional identifier of the device
pub fn session_span(protocol: &str, device: Option<&str>) -> Span {
    match device {
        Some(device) => tracing::info_span!("session", protocol = %protocol, device = %device),
        None => tracing::info_span!("session", protocol = %protocol),
    }
}

/// Create a new span for a protocol operation
///
/// # Arguments
///
/// * `name` - The name of the operation
/// * `channel` - The channel the operation correlates on
pub fn operation_span(name: &str, channel: i32) -> Span {
    tracing::info_span!("operation", name = %name, channel = channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        // This will fail if called multiple times in the same process
        // but it's fine for a single test
        let _ = init();
    }

    #[test]
    fn test_session_span() {
        let span = session_span("BP", Some("dev-1"));
        assert!(span.is_none()); // Span is not entered so is_none() should be true

        let span = session_span("EP", None);
        assert!(span.is_none());
    }

    #[test]
    fn test_operation_span() {
        let span = operation_span("getDeviceCapabilities", 32);
        assert!(span.is_none());
    }
}
