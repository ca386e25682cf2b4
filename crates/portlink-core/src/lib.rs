/*!
 * Portlink Core
 *
 * This crate provides the core building blocks of the Portlink protocol
 * stack: the wire codec, the message value type and its serial form,
 * the error taxonomy, configuration and logging.
 */

#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod prelude;
pub mod utils;

/// Re-export of dependencies that are part of the public API
pub mod deps {
    pub use serde;
    pub use tracing;
}

/// Portlink core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization
pub fn init() -> Result<(), error::Error> {
    logging::init()?;
    tracing::info!("Portlink Core {} initialized", VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
