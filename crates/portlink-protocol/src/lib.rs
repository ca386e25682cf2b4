/*!
 * Portlink Protocol
 *
 * This crate provides the protocol engines of the Portlink stack: the
 * channel-based request/response correlation primitive with timeout and
 * disconnect semantics, the Basic protocol, the Extended protocol
 * layered over it by composition, and the protocol registry.
 */

#![warn(missing_docs)]

pub mod basic;
pub mod channel;
pub mod engine;
pub mod extended;
pub mod factory;

#[cfg(test)]
pub(crate) mod testutil;

pub use basic::BasicProtocol;
pub use channel::ChannelAllocator;
pub use engine::{Abortable, ProtocolEngine};
pub use extended::ExtendedProtocol;
pub use factory::ProtocolRegistry;

/// Portlink protocol crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
