/*!
 * Streaming ports.
 *
 * A streaming port relays arbitrary data over a dedicated channel once
 * bound. If a driver is registered for the port's driver id it is
 * attached as the data listener at construction time.
 */
use std::sync::Arc;

use tracing::debug;

use portlink_core::codec;
use portlink_core::error::Result;

use super::{check_serial_form, parse_flags, Port, PortDirCaps, PortHeader, PortKind, PortType};
use crate::drivers::{Driver, DriverRegistry, StreamingListener};
use crate::session::SessionToken;

/// The wire magic of streaming ports
pub const MAGIC: &str = "SP";

/// Flag bit: the port should be bound automatically after discovery
pub const FLAG_AUTOBIND: u32 = 1;

/// Variant payload of a streaming port
#[derive(Debug)]
pub struct StreamingPort {
    driver_id: String,
    channel: i32,
    driver: Option<Arc<dyn Driver>>,
    listener: Option<Arc<dyn StreamingListener>>,
}

/// Deserialize a streaming port from its wire form
/// (`SP:<id>:<name>:<driverId>:<flags>`), attaching a registered driver
/// as the listener if one resolves.
pub(crate) fn from_wire(
    owner: &SessionToken,
    parts: &[String],
    drivers: &DriverRegistry,
) -> Result<Port> {
    const ID_PART: usize = 1;
    const NAME_PART: usize = 2;
    const DRIVER_PART: usize = 3;
    const FLAGS_PART: usize = 4;
    const PART_COUNT: usize = 5;

    check_serial_form(parts, PART_COUNT, MAGIC)?;

    let driver_id = parts[DRIVER_PART].clone();
    let flags = parse_flags(&parts[FLAGS_PART])?;

    let (driver, listener) = match drivers.create(&driver_id) {
        Some(instance) => {
            debug!("attached driver '{}' to port '{}'", driver_id, parts[ID_PART]);
            (Some(instance.driver()), Some(instance.listener()))
        }
        None => (None, None),
    };

    Ok(Port {
        header: PortHeader::new(
            owner,
            parts[ID_PART].clone(),
            parts[NAME_PART].clone(),
            PortType::Streaming,
            PortDirCaps::Bidirectional,
            flags,
        ),
        kind: PortKind::Streaming(StreamingPort {
            driver_id,
            channel: 0,
            driver,
            listener,
        }),
    })
}

impl StreamingPort {
    /// The id of the driver responsible for this port's payloads
    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }

    /// The bound channel, 0 if unbound
    pub fn channel(&self) -> i32 {
        self.channel
    }

    /// A streaming port is bound if a channel is set
    pub fn is_bound(&self) -> bool {
        self.channel != 0
    }

    /// The driver attached at construction, if any
    pub fn driver(&self) -> Option<Arc<dyn Driver>> {
        self.driver.clone()
    }

    /// The current data listener, if any
    pub fn listener(&self) -> Option<Arc<dyn StreamingListener>> {
        self.listener.clone()
    }

    pub(crate) fn set_channel(&mut self, channel: i32) {
        self.channel = channel;
    }

    pub(crate) fn set_listener(&mut self, listener: Arc<dyn StreamingListener>) {
        self.listener = Some(listener);
    }

    pub(crate) fn refresh(&mut self) {
        // streaming ports have no queryable state
    }

    pub(crate) fn serialize(&self, header: &PortHeader) -> String {
        codec::join(
            codec::SEPARATOR,
            &[
                MAGIC.to_string(),
                header.id.clone(),
                header.name.clone(),
                self.driver_id.clone(),
                header.flags.to_string(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::testutil::port_from_payload;

    #[test]
    fn test_wire_round_trip() {
        let owner = SessionToken::new();
        let port = port_from_payload(&owner, "SP:gps:GPS Stream:NMEAGen:1").unwrap();
        assert_eq!(port.id(), "gps");
        assert_eq!(port.port_type(), PortType::Streaming);
        assert_eq!(port.dir_caps(), PortDirCaps::Bidirectional);
        assert_eq!(port.as_streaming().unwrap().driver_id(), "NMEAGen");
        assert_eq!(port.serialize(), "SP:gps:GPS Stream:NMEAGen:1");
    }

    #[test]
    fn test_autobind_flag() {
        let owner = SessionToken::new();
        let port = port_from_payload(&owner, "SP:gps:GPS:NMEAGen:1").unwrap();
        assert!(port.is_autobind());

        let port = port_from_payload(&owner, "SP:txt:Console:Text:0").unwrap();
        assert!(!port.is_autobind());
    }

    #[test]
    fn test_registered_driver_is_auto_attached() {
        let owner = SessionToken::new();
        let parts = codec::split("SP:txt:Console:Text:0", codec::SEPARATOR);
        let port = Port::from_wire(&owner, &parts, &DriverRegistry::with_builtins()).unwrap();
        let streaming = port.as_streaming().unwrap();
        assert!(streaming.driver().is_some());
        assert!(streaming.listener().is_some());
    }

    #[test]
    fn test_unknown_driver_leaves_port_unattached() {
        let owner = SessionToken::new();
        let port = port_from_payload(&owner, "SP:x:X:NoSuchDriver:0").unwrap();
        let streaming = port.as_streaming().unwrap();
        assert!(streaming.driver().is_none());
        assert!(streaming.listener().is_none());
    }

    #[test]
    fn test_bind_state() {
        let owner = SessionToken::new();
        let mut port = port_from_payload(&owner, "SP:txt:Console:Text:0").unwrap();
        assert!(!port.as_streaming().unwrap().is_bound());

        port.set_streaming_channel(&owner, 7).unwrap();
        assert!(port.as_streaming().unwrap().is_bound());
        assert_eq!(port.as_streaming().unwrap().channel(), 7);

        port.streaming_unbound(&owner).unwrap();
        assert!(!port.as_streaming().unwrap().is_bound());
    }
}
