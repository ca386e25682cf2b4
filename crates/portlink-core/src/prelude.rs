/*!
 * Prelude module for Portlink Core.
 *
 * This module re-exports commonly used types and functions from the
 * Portlink Core crate to make them easier to import.
 */

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export codec primitives
pub use crate::codec::{join, parse_bounded_int, parse_properties, split, SEPARATOR};

// Re-export message types
pub use crate::message::{Message, CONTROL_CHANNEL};

// Re-export config types
pub use crate::config::{Config, ConfigBuilder, SharedConfig};

// Re-export utility helpers
pub use crate::utils::{duration_to_millis, millis_to_duration, Deadline};

// Re-export logging macros
pub use tracing::{debug, error, info, trace, warn};

// Re-export core initialization
pub use crate::init;
