/*!
 * The transport boundary consumed by the protocol engines.
 *
 * A device is, from the core's point of view, a connected channel that
 * can enqueue outbound messages and exposes a thread-safe inbound
 * message queue plus a connected flag. Connection lifecycle, byte-level
 * encoding and credentials live behind this trait, outside the core.
 */
use std::collections::HashMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use tracing::debug;

use portlink_core::codec;
use portlink_core::message::Message;

use crate::queue::MessageQueue;

/// The device abstraction the protocol engines run against.
///
/// Implementations wrap a concrete transport (serial, Bluetooth, TCP).
/// All methods must be callable from any thread.
pub trait MessageDevice: Send + Sync + Debug {
    /// Whether the transport currently reports a live connection
    fn is_connected(&self) -> bool;

    /// Enqueue a message for outbound delivery.
    ///
    /// Callers check [`is_connected`](Self::is_connected) first; this
    /// method does not report delivery failures.
    fn send_message(&self, message: Message);

    /// The shared inbound message queue filled by the receive thread
    fn input_messages(&self) -> &MessageQueue;

    /// Signal a device-level error. Terminates the active session from
    /// the device layer's point of view.
    fn set_error(&self, code: i32, message: Option<String>);

    /// The device requested a disconnect (`Dis` on the control channel)
    fn disconnect_device(&self);

    /// A debug message arrived on the control channel
    fn received_debug(&self, message: String) {
        debug!("device debug: {}", message);
    }

    /// The device asked for the named ports (all ports if empty) to be
    /// refreshed
    fn received_refresh(&self, port_ids: Vec<String>) {
        debug!("device refresh request: {:?}", port_ids);
    }

    /// The device reconfigured itself; cached capabilities are stale
    /// and must be replaced wholesale
    fn received_reconfigure(&self) {
        debug!("device reconfigure request");
    }

    /// Attach extended device information discovered by the protocol
    fn set_device_info(&self, info: DeviceInfo) {
        debug!("device info: {:?}", info);
    }
}

/// Extended device information, parsed from an `EDI` property block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    raw: String,
    properties: HashMap<String, String>,
}

impl DeviceInfo {
    /// Parse device information from its wire property block
    pub fn new<S: Into<String>>(info: S) -> Self {
        let raw = info.into();
        let properties = codec::parse_properties(&raw);
        Self { raw, properties }
    }

    /// The raw property block as received
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The group to present first, if the device specifies one
    pub fn start_group(&self) -> Option<&str> {
        self.properties.get("startGroup").map(String::as_str)
    }

    /// Look up a property, falling back to the given default
    pub fn property<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.properties.get(key).map(String::as_str).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_parses_properties() {
        let info = DeviceInfo::new("startGroup=main;vendor=acme");
        assert_eq!(info.start_group(), Some("main"));
        assert_eq!(info.property("vendor", "?"), "acme");
        assert_eq!(info.property("missing", "?"), "?");
    }

    #[test]
    fn test_device_info_empty() {
        let info = DeviceInfo::new("");
        assert_eq!(info.start_group(), None);
        assert_eq!(info.raw(), "");
    }

    #[test]
    fn test_device_info_json_round_trip() {
        let info = DeviceInfo::new("startGroup=main;vendor=acme");
        let json = serde_json::to_string(&info).unwrap();
        let back: DeviceInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
