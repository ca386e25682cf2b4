/*!
 * Portlink Device
 *
 * This crate provides the device-facing half of the Portlink stack: the
 * transport boundary consumed by the protocol engines, the thread-safe
 * inbound message queue, the port object model with its wire forms and
 * cached state, device capabilities, and the streaming driver registry.
 */

#![warn(missing_docs)]

pub mod capabilities;
pub mod device;
pub mod drivers;
pub mod ports;
pub mod queue;
pub mod session;

pub use capabilities::DeviceCapabilities;
pub use device::{DeviceInfo, MessageDevice};
pub use drivers::{Driver, DriverInstance, DriverRegistry, StreamingListener};
pub use ports::{Port, PortDirCaps, PortKind, PortType, PORTFLAG_READONLY};
pub use queue::MessageQueue;
pub use session::SessionToken;

/// Portlink device crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
