/*!
 * The Extended protocol.
 *
 * Wraps a Basic protocol session and augments its exchanges: extended
 * port info and state property bags, group information with cache-first
 * resolution, extended device info, and batched capability discovery
 * and state refresh. Every Basic operation is delegated; the extra
 * round-trips are layered on top.
 */
use std::sync::Arc;

use tracing::{debug, warn};

use portlink_core::codec::{self, SEPARATOR};
use portlink_core::config::SharedConfig;
use portlink_core::error::{Error, Result};
use portlink_core::message::Message;

use portlink_device::capabilities::DeviceCapabilities;
use portlink_device::device::{DeviceInfo, MessageDevice};
use portlink_device::drivers::DriverRegistry;
use portlink_device::ports::{
    AnalogMode, AnalogReference, DigitalLine, DigitalMode, GroupCache, Port, PortGroup, PortKind,
};

use crate::basic::{self, BasicProtocol};
use crate::engine::ProtocolEngine;

/// The magic of the Extended protocol
pub const MAGIC: &str = "EP";

/// Request extended port info
pub const GET_EXTENDED_PORT_INFO: &str = "gEPI";
/// Extended port info reply
pub const EXTENDED_PORT_INFO: &str = "EPI";
/// Request extended port state
pub const GET_EXTENDED_PORT_STATE: &str = "gEPS";
/// Extended port state reply
pub const EXTENDED_PORT_STATE: &str = "EPS";

/// Request group info
pub const GET_GROUP_INFO: &str = "gGI";
/// Group info reply
pub const GROUP_INFO: &str = "GI";

/// Request extended device info
pub const GET_EXTENDED_DEVICE_INFO: &str = "gEDI";
/// Extended device info reply
pub const EXTENDED_DEVICE_INFO: &str = "EDI";

/// Request the states of all ports in one exchange
pub const GET_ALL_PORT_STATES: &str = "gAPS";

/// Separator between the state payloads in a bulk state reply
pub const MULTIMESSAGE_SEPARATOR: char = '\r';

/// The Extended protocol engine
#[derive(Debug)]
pub struct ExtendedProtocol {
    basic: BasicProtocol,
    groups: GroupCache,
}

impl ExtendedProtocol {
    /// Create an Extended protocol session for the given device
    pub fn new(
        device: Arc<dyn MessageDevice>,
        config: SharedConfig,
        drivers: Arc<DriverRegistry>,
    ) -> Self {
        Self {
            basic: BasicProtocol::new(device, config, drivers),
            groups: GroupCache::new(),
        }
    }

    /// The session group cache
    pub fn groups(&self) -> &GroupCache {
        &self.groups
    }

    /// Convert a port-scoped failure into the session-level error it
    /// is at call sites where the device must never signal one.
    fn reject_port_scoped(error: Error, operation: &str) -> Error {
        match error {
            Error::PortAccessDenied { .. } => Error::protocol(format!(
                "programming error on device: {} must never signal port access denied",
                operation
            )),
            Error::PortError { .. } => Error::protocol(format!(
                "programming error on device: {} must never signal a port error",
                operation
            )),
            other => other,
        }
    }

    fn expect_extended_port_info(&self, port: &mut Port, channel: i32) -> Result<()> {
        const PREFIX: usize = 0;
        const PORT_ID: usize = 1;
        const INFO: usize = 2;
        const PARTS_COUNT: usize = 3;

        let message = self
            .basic
            .expect_reply(channel)
            .map_err(|e| Self::reject_port_scoped(e, "extended port info"))?;

        let parts = codec::split(message.payload(), SEPARATOR);
        if parts.len() > PARTS_COUNT || parts.len() <= PORT_ID {
            return Err(Error::protocol("invalid number of message parts"));
        }
        if parts[PREFIX] != EXTENDED_PORT_INFO {
            return Err(Error::protocol(format!(
                "unexpected reply, expected: {}",
                EXTENDED_PORT_INFO
            )));
        }
        if parts[PORT_ID] != port.id() {
            return Err(Error::protocol("wrong port ID"));
        }
        // info is optional
        if parts.len() > INFO {
            port.set_extended_info(self.basic.token(), &parts[INFO]);
        }

        // check whether there's a group specified
        let group = port.extended_property("group", "").to_string();
        if !group.is_empty() {
            self.get_group_info(&group, channel)?;
            port.set_group_id(self.basic.token(), Some(group));
        }
        Ok(())
    }

    fn expect_extended_port_state(&self, port: &mut Port, channel: i32) -> Result<()> {
        const PREFIX: usize = 0;
        const PORT_ID: usize = 1;
        const INFO: usize = 2;
        const PARTS_COUNT: usize = 3;

        let message = match self.basic.expect_reply(channel) {
            Ok(message) => message,
            // extended state is best effort; a denial leaves the basic
            // state untouched
            Err(Error::PortAccessDenied { .. }) | Err(Error::PortError { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };

        let parts = codec::split(message.payload(), SEPARATOR);
        if parts.len() > PARTS_COUNT || parts.len() <= PORT_ID {
            return Err(Error::protocol("invalid number of message parts"));
        }
        if parts[PREFIX] != EXTENDED_PORT_STATE {
            return Err(Error::protocol(format!(
                "unexpected reply, expected: {}",
                EXTENDED_PORT_STATE
            )));
        }
        if parts[PORT_ID] != port.id() {
            return Err(Error::protocol("wrong port ID"));
        }
        // info is optional
        if parts.len() > INFO {
            port.set_extended_state(self.basic.token(), &parts[INFO]);
        }
        Ok(())
    }

    fn fetch_group_info(&self, group_id: &str, channel: i32) -> Result<PortGroup> {
        const PREFIX: usize = 0;
        const GROUP_ID: usize = 1;
        const LABEL: usize = 2;
        const PARENT: usize = 3;
        const FLAGS: usize = 4;
        const PARTS_COUNT: usize = 5;

        self.basic.send(Message::new(
            channel,
            codec::join(SEPARATOR, &[GET_GROUP_INFO, group_id]),
        ))?;
        let message = self
            .basic
            .expect_reply(channel)
            .map_err(|e| Self::reject_port_scoped(e, "group info"))?;

        let parts = codec::split(message.payload(), SEPARATOR);
        if parts.len() != PARTS_COUNT {
            return Err(Error::protocol("invalid number of message parts"));
        }
        if parts[PREFIX] != GROUP_INFO {
            return Err(Error::protocol(format!(
                "unexpected reply, expected: {}",
                GROUP_INFO
            )));
        }
        if parts[GROUP_ID] != group_id {
            return Err(Error::protocol("wrong group ID"));
        }
        let flags = codec::parse_bounded_int(&parts[FLAGS], "flags", 0, i64::from(u32::MAX))? as u32;
        Ok(PortGroup::new(
            group_id,
            parts[LABEL].clone(),
            parts[PARENT].clone(),
            flags,
        ))
    }

    /// Resolve a group and its parent chain, fetching each group over
    /// the wire at most once per session.
    pub fn get_group_info(&self, group_id: &str, channel: i32) -> Result<Arc<PortGroup>> {
        if let Some(cached) = self.groups.get(group_id) {
            return Ok(cached);
        }

        // walk up the parent chain, fetching uncached groups
        let mut chain: Vec<PortGroup> = Vec::new();
        let mut parent_arc: Option<Arc<PortGroup>> = None;
        let mut current = group_id.to_string();
        loop {
            if let Some(cached) = self.groups.get(&current) {
                parent_arc = Some(cached);
                break;
            }
            if chain.iter().any(|g| g.id() == current) {
                return Err(Error::invalid_argument(format!(
                    "invalid group hierarchy: cycle for {}",
                    current
                )));
            }
            let group = self.fetch_group_info(&current, channel)?;
            let parent_id = group.parent_id().map(str::to_string);
            chain.push(group);
            match parent_id {
                Some(parent_id) => current = parent_id,
                None => break,
            }
        }

        // link parents top-down and cache every resolved group
        let mut result = None;
        for mut group in chain.into_iter().rev() {
            if let Some(parent) = &parent_arc {
                group.set_parent_group(parent)?;
            }
            let group = Arc::new(group);
            self.groups.insert(Arc::clone(&group));
            parent_arc = Some(Arc::clone(&group));
            result = Some(group);
        }
        result.ok_or_else(|| Error::protocol("group resolution yielded no group"))
    }

    /// Query the extended device information
    pub fn get_extended_device_info(&self) -> Result<DeviceInfo> {
        const PREFIX: usize = 0;
        const INFO: usize = 1;
        const PARTS_COUNT: usize = 2;

        let channel = self.basic.channels().next_synchronous();
        self.basic
            .send(Message::new(channel, GET_EXTENDED_DEVICE_INFO))?;
        let message = self
            .basic
            .expect_reply(channel)
            .map_err(|e| Self::reject_port_scoped(e, "extended device info"))?;

        let parts = codec::split(message.payload(), SEPARATOR);
        if parts.len() != PARTS_COUNT {
            return Err(Error::protocol("invalid number of message parts"));
        }
        if parts[PREFIX] != EXTENDED_DEVICE_INFO {
            return Err(Error::protocol(format!(
                "unexpected reply, expected: {}",
                EXTENDED_DEVICE_INFO
            )));
        }
        Ok(DeviceInfo::new(parts[INFO].clone()))
    }

    /// Batched port discovery: all info requests are sent before any
    /// reply is awaited, so replies may arrive in any order and are
    /// correlated by channel and echoed port id.
    fn get_all_port_infos(&self, port_ids: &[String]) -> Result<Vec<Port>> {
        // send every port info request without waiting
        let mut pending = Vec::with_capacity(port_ids.len());
        for port_id in port_ids {
            let channel = self.basic.channels().next_synchronous();
            self.basic.send(Message::new(
                channel,
                codec::join(SEPARATOR, &[basic::GET_PORT_INFO, port_id.as_str()]),
            ))?;
            pending.push((port_id.clone(), channel));
        }

        // collect the info replies
        let mut ports = Vec::with_capacity(pending.len());
        for (port_id, channel) in &pending {
            let reply = self
                .basic
                .expect(*channel, self.basic.default_timeout(), None)?;
            let parts = codec::split(reply.payload(), SEPARATOR);
            let mut port = Port::from_wire(self.basic.token(), &parts, self.basic_drivers())?;
            if port.id() != port_id {
                return Err(Error::protocol("wrong port ID"));
            }
            self.basic.fetch_select_labels(&mut port)?;
            ports.push(port);
        }

        // send every extended info request, then collect the replies
        for (port, (_, channel)) in ports.iter().zip(&pending) {
            self.basic.send(Message::new(
                *channel,
                codec::join(SEPARATOR, &[GET_EXTENDED_PORT_INFO, port.id()]),
            ))?;
        }
        for (port, (_, channel)) in ports.iter_mut().zip(&pending) {
            self.expect_extended_port_info(port, *channel)?;
        }
        Ok(ports)
    }

    fn basic_drivers(&self) -> &DriverRegistry {
        self.basic.drivers()
    }
}

impl ProtocolEngine for ExtendedProtocol {
    fn magic(&self) -> &'static str {
        MAGIC
    }

    fn initiate(&self) -> Result<()> {
        self.groups.clear();
        self.basic.initiate()
    }

    fn disconnect(&self) {
        self.basic.disconnect()
    }

    fn dispatch(&self, message: &Message) -> bool {
        self.basic.dispatch(message)
    }

    fn get_device_capabilities(&self) -> Result<DeviceCapabilities> {
        let channel = self.basic.channels().next_synchronous();
        self.basic
            .send(Message::new(channel, basic::GET_DEVICE_CAPS))?;
        let reply = self
            .basic
            .expect(channel, self.basic.default_timeout(), None)?;
        let port_ids = DeviceCapabilities::parse_port_ids(reply.payload())?;

        let ports = self.get_all_port_infos(&port_ids)?;

        // additional query: extended device info, attached to the device
        let info = self.get_extended_device_info()?;
        self.basic.device().set_device_info(info);

        Ok(DeviceCapabilities::from_ports(ports))
    }

    fn get_port_info(&self, port_id: &str, channel: i32) -> Result<Port> {
        let mut port = self.basic.get_port_info(port_id, channel)?;

        // send the extended port info request on the same channel
        self.basic.send(Message::new(
            channel,
            codec::join(SEPARATOR, &[GET_EXTENDED_PORT_INFO, port_id]),
        ))?;
        self.expect_extended_port_info(&mut port, channel)?;
        Ok(port)
    }

    fn get_port_state(&self, port: &mut Port) -> Result<()> {
        self.basic.get_port_state(port)?;
        if matches!(port.kind(), PortKind::Streaming(_)) || port.has_error() {
            return Ok(());
        }

        let channel = self.basic.channels().next_synchronous();
        self.basic.send(Message::new(
            channel,
            codec::join(SEPARATOR, &[GET_EXTENDED_PORT_STATE, port.id()]),
        ))?;
        self.expect_extended_port_state(port, channel)
    }

    /// Bulk state refresh: one request, one reply carrying every port's
    /// state payload.
    fn refresh_port_states(&self, capabilities: &mut DeviceCapabilities) -> Result<()> {
        let channel = self.basic.channels().next_synchronous();
        self.basic.send(Message::new(channel, GET_ALL_PORT_STATES))?;
        let reply = self
            .basic
            .expect(channel, self.basic.default_timeout(), None)?;

        for state_payload in reply.payload().split(MULTIMESSAGE_SEPARATOR) {
            if state_payload.is_empty() {
                continue;
            }
            let parts = codec::split(state_payload, SEPARATOR);
            let port_id = parts.get(1).cloned().unwrap_or_default();
            let Some(port) = capabilities.find_port_by_id_mut(&port_id) else {
                warn!("bulk state report names unknown port '{}'", port_id);
                continue;
            };
            match parts[0].as_str() {
                basic::DIGITAL_STATE => self.basic.apply_digital_state(port, &parts)?,
                basic::ANALOG_STATE => self.basic.apply_analog_state(port, &parts)?,
                basic::SELECT_STATE => self.basic.apply_select_state(port, &parts)?,
                basic::DIAL_STATE => self.basic.apply_dial_state(port, &parts)?,
                other => {
                    return Err(Error::protocol(format!(
                        "unexpected state report: {}",
                        other
                    )))
                }
            }
        }
        debug!("bulk state refresh applied");
        Ok(())
    }

    fn set_digital_mode(&self, port: &mut Port, mode: DigitalMode) -> Result<()> {
        self.basic.set_digital_mode(port, mode)
    }

    fn set_digital_line(&self, port: &mut Port, line: DigitalLine) -> Result<()> {
        self.basic.set_digital_line(port, line)
    }

    fn set_analog_value(&self, port: &mut Port, value: i32) -> Result<()> {
        self.basic.set_analog_value(port, value)
    }

    fn set_analog_mode(&self, port: &mut Port, mode: AnalogMode) -> Result<()> {
        self.basic.set_analog_mode(port, mode)
    }

    fn set_analog_resolution(&self, port: &mut Port, resolution: u32) -> Result<()> {
        self.basic.set_analog_resolution(port, resolution)
    }

    fn set_analog_reference(&self, port: &mut Port, reference: AnalogReference) -> Result<()> {
        self.basic.set_analog_reference(port, reference)
    }

    fn get_select_label(&self, port: &Port, position: u16) -> Result<String> {
        self.basic.get_select_label(port, position)
    }

    fn set_select_position(&self, port: &mut Port, position: u16) -> Result<()> {
        self.basic.set_select_position(port, position)
    }

    fn set_dial_position(&self, port: &mut Port, position: i64) -> Result<()> {
        self.basic.set_dial_position(port, position)
    }

    fn bind_streaming_port(&self, port: &mut Port) -> Result<bool> {
        self.basic.bind_streaming_port(port)
    }

    fn unbind_streaming_port(&self, port: &mut Port) -> Result<()> {
        self.basic.unbind_streaming_port(port)
    }

    fn send_streaming_data(&self, port: &Port, data: &str) -> Result<()> {
        self.basic.send_streaming_data(port, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockDevice;
    use portlink_core::config::Config;

    fn protocol(device: Arc<MockDevice>) -> ExtendedProtocol {
        let mut config = Config::default();
        config.protocol.default_timeout_ms = 500;
        ExtendedProtocol::new(
            device,
            SharedConfig::new(config),
            Arc::new(DriverRegistry::with_builtins()),
        )
    }

    #[test]
    fn test_port_info_merges_extended_info_and_resolves_group() {
        let device = MockDevice::new();
        device.script("gPI:v1", "DL:v1:Volume:0:100:10:0");
        device.script("gEPI:v1", "EPI:v1:unit=dB;group=audio");
        device.script("gGI:audio", "GI:audio:Audio:root:0");
        device.script("gGI:root", "GI:root:Root::0");
        let engine = protocol(Arc::clone(&device));

        let port = engine.get_port_info("v1", 40).unwrap();
        assert_eq!(port.unit(), Some("dB"));
        assert_eq!(port.group_id(), Some("audio"));

        let audio = engine.groups().get("audio").unwrap();
        assert_eq!(audio.label(), "Audio");
        assert_eq!(audio.parent_group().unwrap().id(), "root");
        assert_eq!(engine.groups().len(), 2);
    }

    #[test]
    fn test_group_fetched_once_per_session() {
        let device = MockDevice::new();
        device.script("gPI:v1", "DL:v1:Volume:0:100:10:0");
        device.script("gPI:v2", "DL:v2:Balance:0:100:10:0");
        device.script("gEPI:v1", "EPI:v1:group=audio");
        device.script("gEPI:v2", "EPI:v2:group=audio");
        device.script("gGI:audio", "GI:audio:Audio::0");
        let engine = protocol(Arc::clone(&device));

        engine.get_port_info("v1", 40).unwrap();
        engine.get_port_info("v2", 41).unwrap();
        assert_eq!(device.sent_count_with_prefix("gGI:"), 1);
    }

    #[test]
    fn test_group_cycle_over_wire_is_rejected() {
        let device = MockDevice::new();
        device.script("gPI:v1", "DL:v1:Volume:0:100:10:0");
        device.script("gEPI:v1", "EPI:v1:group=a");
        device.script("gGI:a", "GI:a:A:b:0");
        device.script("gGI:b", "GI:b:B:a:0");
        let engine = protocol(device);

        let err = engine.get_port_info("v1", 40).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_denied_extended_info_is_a_device_programming_error() {
        let device = MockDevice::new();
        device.script("gPI:v1", "DL:v1:Volume:0:100:10:0");
        device.script("gEPI:v1", "Denied:v1:nope");
        let engine = protocol(device);

        let err = engine.get_port_info("v1", 40).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.to_string().contains("programming error on device"));
    }

    #[test]
    fn test_capability_discovery_batches_and_attaches_device_info() {
        let device = MockDevice::new();
        device.script("gDC", "BDC:d1,v1");
        device.script("gPI:d1", "DP:d1:LED:2:0");
        device.script("gPI:v1", "DL:v1:Volume:0:100:10:0");
        device.script("gEPI:d1", "EPI:d1");
        device.script("gEPI:v1", "EPI:v1:unit=dB");
        device.script("gEDI", "EDI:startGroup=main");
        let engine = protocol(Arc::clone(&device));

        let caps = engine.get_device_capabilities().unwrap();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps.find_port_by_id("v1").unwrap().unit(), Some("dB"));
        assert_eq!(
            device.stored_device_info().unwrap().start_group(),
            Some("main")
        );
        assert_eq!(device.sent_count_with_prefix("gPI:"), 2);
        assert_eq!(device.sent_count_with_prefix("gEPI:"), 2);
        assert_eq!(device.sent_count_with_prefix("gEDI"), 1);
    }

    #[test]
    fn test_capability_discovery_tolerates_out_of_order_replies() {
        let device = MockDevice::new();
        // pre-queue every reply, later channels first; correlation is
        // by channel, not arrival order (discovery uses 32, ports 33/34,
        // device info 35)
        device.input_messages().push(Message::new(35, "EDI:v=1"));
        device
            .input_messages()
            .push(Message::new(34, "DL:v1:Volume:0:100:10:0"));
        device.input_messages().push(Message::new(33, "DP:d1:LED:2:0"));
        device.input_messages().push(Message::new(32, "BDC:d1,v1"));
        device.input_messages().push(Message::new(34, "EPI:v1"));
        device.input_messages().push(Message::new(33, "EPI:d1"));
        let engine = protocol(device);

        let caps = engine.get_device_capabilities().unwrap();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps.ports()[0].id(), "d1");
        assert_eq!(caps.ports()[1].id(), "v1");
    }

    #[test]
    fn test_extended_state_merged_after_basic_state() {
        let device = MockDevice::new();
        device.script("gPI:d1", "DP:d1:LED:2:0");
        device.script("gEPI:d1", "EPI:d1");
        device.script("gDS:d1", "DS:d1:3:0");
        device.script("gEPS:d1", "EPS:d1:blink=1");
        let engine = protocol(device);

        let mut port = engine.get_port_info("d1", 40).unwrap();
        engine.get_port_state(&mut port).unwrap();
        assert_eq!(port.as_digital().unwrap().mode(), Some(DigitalMode::Output));
        assert_eq!(port.extended_state_property("blink", "0"), "1");
    }

    #[test]
    fn test_denied_extended_state_is_ignored() {
        let device = MockDevice::new();
        device.script("gPI:d1", "DP:d1:LED:2:0");
        device.script("gEPI:d1", "EPI:d1");
        device.script("gDS:d1", "DS:d1:3:0");
        device.script("gEPS:d1", "Denied:d1:no");
        let engine = protocol(device);

        let mut port = engine.get_port_info("d1", 40).unwrap();
        engine.get_port_state(&mut port).unwrap();
        assert_eq!(port.as_digital().unwrap().mode(), Some(DigitalMode::Output));
    }

    #[test]
    fn test_bulk_state_refresh() {
        let device = MockDevice::new();
        device.script("gPI:d1", "DP:d1:LED:2:0");
        device.script("gPI:v1", "DL:v1:Volume:0:100:10:0");
        device.script("gEPI:d1", "EPI:d1");
        device.script("gEPI:v1", "EPI:v1");
        device.script("gAPS", "DS:d1:3:1\rDLS:v1:40");
        let engine = protocol(Arc::clone(&device));

        let mut caps = DeviceCapabilities::from_ports(vec![
            engine.get_port_info("d1", 40).unwrap(),
            engine.get_port_info("v1", 41).unwrap(),
        ]);
        engine.refresh_port_states(&mut caps).unwrap();

        assert_eq!(
            caps.find_port_by_id("d1")
                .unwrap()
                .as_digital()
                .unwrap()
                .line(),
            Some(DigitalLine::High)
        );
        assert_eq!(
            caps.find_port_by_id("v1")
                .unwrap()
                .as_dial()
                .unwrap()
                .position(),
            Some(40)
        );
        // one request regardless of port count
        assert_eq!(device.sent_count_with_prefix("gAPS"), 1);
    }
}
