/*!
 * The Basic protocol.
 *
 * Implements the synchronous request/reply exchanges of the Portlink
 * wire protocol: capability discovery, port info and state queries,
 * typed mutations, streaming channel bindings and control-channel
 * dispatch. Capability discovery queries ports one by one; the
 * Extended protocol batches it.
 */
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use portlink_core::codec::{self, SEPARATOR};
use portlink_core::config::SharedConfig;
use portlink_core::error::{Error, Result};
use portlink_core::message::{Message, CONTROL_CHANNEL};
use portlink_core::utils::Deadline;

use portlink_device::capabilities::DeviceCapabilities;
use portlink_device::device::MessageDevice;
use portlink_device::drivers::{DriverRegistry, StreamingListener};
use portlink_device::ports::{
    AnalogMode, AnalogPort, AnalogReference, DigitalLine, DigitalMode, DigitalPort, Port,
};
use portlink_device::session::SessionToken;

use crate::channel::ChannelAllocator;
use crate::engine::{
    Abortable, ProtocolEngine, ACCESS_DENIED, AGREEMENT, DEBUG, DISAGREEMENT, DISCONNECT, ERROR,
    PING, PORT_ERROR, RECONFIGURE, REFRESH,
};

/// The magic of the Basic protocol
pub const MAGIC: &str = "BP";

/// Request the device capabilities
pub const GET_DEVICE_CAPS: &str = "gDC";
/// Request the info of one port
pub const GET_PORT_INFO: &str = "gPI";

/// Digital port state reply
pub const DIGITAL_STATE: &str = "DS";
/// Request the state of a digital port
pub const GET_DIGITAL_STATE: &str = "gDS";
/// Set the line of a digital port
pub const SET_DIGITAL_LINE: &str = "sDL";
/// Set the mode of a digital port
pub const SET_DIGITAL_MODE: &str = "sDM";

/// Analog port state reply
pub const ANALOG_STATE: &str = "AS";
/// Request the state of an analog port
pub const GET_ANALOG_STATE: &str = "gAS";
/// Set the value of an analog port
pub const SET_ANALOG_VALUE: &str = "sAV";
/// Set the mode of an analog port
pub const SET_ANALOG_MODE: &str = "sAM";
/// Set the resolution of an analog port
pub const SET_ANALOG_RESOLUTION: &str = "sAR";
/// Set the reference of an analog port
pub const SET_ANALOG_REFERENCE: &str = "sARF";

/// Request the label of a select port position
pub const GET_SELECT_LABEL: &str = "gSL";
/// Select port label reply
pub const SELECT_LABEL: &str = "SL";
/// Select port state reply
pub const SELECT_STATE: &str = "SS";
/// Request the state of a select port
pub const GET_SELECT_STATE: &str = "gSS";
/// Set the position of a select port
pub const SET_SELECT_POSITION: &str = "sSP";

/// Dial port state reply
pub const DIAL_STATE: &str = "DLS";
/// Request the state of a dial port
pub const GET_DIAL_STATE: &str = "gDLS";
/// Set the position of a dial port
pub const SET_DIAL_POSITION: &str = "sDLP";

/// Bind a streaming port to a channel
pub const BIND_STREAMING_PORT: &str = "bSP";
/// Unbind a streaming port
pub const UNBIND_STREAMING_PORT: &str = "uSP";

#[derive(Debug)]
struct BoundStreamingPort {
    port_id: String,
    listener: Option<Arc<dyn StreamingListener>>,
}

#[derive(Debug)]
struct PingHandle {
    stop: Arc<(Mutex<bool>, Condvar)>,
    thread: thread::JoinHandle<()>,
}

/// The Basic protocol engine
#[derive(Debug)]
pub struct BasicProtocol {
    device: Arc<dyn MessageDevice>,
    config: SharedConfig,
    token: SessionToken,
    channels: ChannelAllocator,
    drivers: Arc<DriverRegistry>,
    bound_ports: Mutex<HashMap<i32, BoundStreamingPort>>,
    ping: Mutex<Option<PingHandle>>,
}

impl BasicProtocol {
    /// Create a Basic protocol session for the given device
    pub fn new(
        device: Arc<dyn MessageDevice>,
        config: SharedConfig,
        drivers: Arc<DriverRegistry>,
    ) -> Self {
        Self {
            device,
            config,
            token: SessionToken::new(),
            channels: ChannelAllocator::new(),
            drivers,
            bound_ports: Mutex::new(HashMap::new()),
            ping: Mutex::new(None),
        }
    }

    pub(crate) fn device(&self) -> &Arc<dyn MessageDevice> {
        &self.device
    }

    pub(crate) fn token(&self) -> &SessionToken {
        &self.token
    }

    pub(crate) fn channels(&self) -> &ChannelAllocator {
        &self.channels
    }

    pub(crate) fn drivers(&self) -> &DriverRegistry {
        &self.drivers
    }

    pub(crate) fn default_timeout(&self) -> Duration {
        self.config.get().protocol.default_timeout()
    }

    /// Try to send a message to the device. Fails with `Disconnected`
    /// if the device is not connected, otherwise returns the channel of
    /// the message for correlation.
    pub(crate) fn send(&self, message: Message) -> Result<i32> {
        if !self.device.is_connected() {
            return Err(Error::Disconnected);
        }
        let channel = message.channel();
        self.device.send_message(message);
        Ok(channel)
    }

    /// Wait for an inbound message on the given channel.
    ///
    /// Blocks the calling thread for up to `timeout` (never less); it
    /// must not be called from a UI thread. The queue is rescanned on
    /// every wake; the cancellation token and the connected flag are
    /// checked after each unsuccessful scan. A reply that arrived right
    /// at disconnect time is still returned. On expiry the device error
    /// state is signalled and `Timeout` is raised.
    pub(crate) fn expect(
        &self,
        channel: i32,
        timeout: Duration,
        abortable: Option<&dyn Abortable>,
    ) -> Result<Message> {
        // a negative channel implies no session
        if channel < 0 {
            return Err(Error::Disconnected);
        }
        let queue = self.device.input_messages();
        let deadline = Deadline::after(timeout);
        let poll_interval = self.config.get().protocol.poll_interval();
        loop {
            if let Some(message) = queue.take_matching(channel) {
                return Ok(message);
            }
            if let Some(abortable) = abortable {
                if abortable.is_aborted() {
                    return Err(Error::Interrupted);
                }
            }
            // the device may have disconnected (due to an error or a
            // planned action)
            if !self.device.is_connected() {
                return Err(Error::Disconnected);
            }
            if deadline.expired() {
                self.device
                    .set_error(-1, Some("timeout waiting for message".to_string()));
                return Err(Error::Timeout);
            }
            queue.wait(poll_interval.min(deadline.remaining()));
        }
    }

    /// Wait for a reply on the given channel, converting port-scoped
    /// failure replies (`Denied`, `PErr`) into their errors.
    pub(crate) fn expect_reply(&self, channel: i32) -> Result<Message> {
        let message = self.expect(channel, self.default_timeout(), None)?;
        let parts = codec::split(message.payload(), SEPARATOR);
        match parts[0].as_str() {
            ACCESS_DENIED => Err(Error::port_access_denied(
                parts.get(1).cloned().unwrap_or_default(),
                join_remainder(&parts, 2),
            )),
            PORT_ERROR => Err(Error::port_error(
                parts.get(1).cloned().unwrap_or_default(),
                join_remainder(&parts, 2),
            )),
            _ => Ok(message),
        }
    }

    /// Run a port operation under the uniform port contract: clear the
    /// error flag first and absorb a device-reported port error into
    /// the port's error state.
    fn port_op<F>(&self, port: &mut Port, op: F) -> Result<()>
    where
        F: FnOnce(&Self, &mut Port) -> Result<()>,
    {
        port.clear_error(&self.token);
        match op(self, port) {
            Err(Error::PortError { message, .. }) => {
                port.set_error(&self.token, message);
                Ok(())
            }
            other => other,
        }
    }

    pub(crate) fn apply_digital_state(&self, port: &mut Port, parts: &[String]) -> Result<()> {
        const PREFIX: usize = 0;
        const ID: usize = 1;
        const MODE: usize = 2;
        const LINE: usize = 3;
        const PARTS_COUNT: usize = 4;

        if parts.len() != PARTS_COUNT {
            return Err(Error::protocol("invalid number of message parts"));
        }
        if parts[PREFIX] != DIGITAL_STATE {
            return Err(Error::protocol(format!(
                "unexpected reply, expected: {}",
                DIGITAL_STATE
            )));
        }
        if parts[ID] != port.id() {
            return Err(Error::protocol("wrong port ID"));
        }
        let mode = DigitalMode::from_wire(codec::parse_bounded_int(&parts[MODE], "mode", 0, 3)?)?;
        let line = DigitalLine::from_wire(codec::parse_bounded_int(&parts[LINE], "line", 0, 1)?)?;
        port.set_digital_state(&self.token, mode, line)
    }

    pub(crate) fn apply_analog_state(&self, port: &mut Port, parts: &[String]) -> Result<()> {
        const PREFIX: usize = 0;
        const ID: usize = 1;
        const MODE: usize = 2;
        const REFERENCE: usize = 3;
        const RESOLUTION: usize = 4;
        const VALUE: usize = 5;
        const PARTS_COUNT: usize = 6;

        if parts.len() != PARTS_COUNT {
            return Err(Error::protocol("invalid number of message parts"));
        }
        if parts[PREFIX] != ANALOG_STATE {
            return Err(Error::protocol(format!(
                "unexpected reply, expected: {}",
                ANALOG_STATE
            )));
        }
        if parts[ID] != port.id() {
            return Err(Error::protocol("wrong port ID"));
        }
        let mode = AnalogMode::from_wire(codec::parse_bounded_int(&parts[MODE], "mode", 0, 1)?)?;
        let reference = AnalogReference::from_wire(codec::parse_bounded_int(
            &parts[REFERENCE],
            "reference",
            0,
            1,
        )?)?;
        let resolution =
            codec::parse_bounded_int(&parts[RESOLUTION], "resolution", 1, 64)? as u32;
        let value = codec::parse_bounded_int(
            &parts[VALUE],
            "value",
            i64::from(i32::MIN),
            i64::from(i32::MAX),
        )? as i32;
        port.set_analog_state(&self.token, mode, reference, resolution, value)
    }

    pub(crate) fn apply_select_state(&self, port: &mut Port, parts: &[String]) -> Result<()> {
        const PREFIX: usize = 0;
        const ID: usize = 1;
        const POSITION: usize = 2;
        const PARTS_COUNT: usize = 3;

        if parts.len() != PARTS_COUNT {
            return Err(Error::protocol("invalid number of message parts"));
        }
        if parts[PREFIX] != SELECT_STATE {
            return Err(Error::protocol(format!(
                "unexpected reply, expected: {}",
                SELECT_STATE
            )));
        }
        if parts[ID] != port.id() {
            return Err(Error::protocol("wrong port ID"));
        }
        let position =
            codec::parse_bounded_int(&parts[POSITION], "position", 0, i64::from(u16::MAX))? as u16;
        port.set_select_position(&self.token, position)
    }

    pub(crate) fn apply_dial_state(&self, port: &mut Port, parts: &[String]) -> Result<()> {
        const PREFIX: usize = 0;
        const ID: usize = 1;
        const POSITION: usize = 2;
        const PARTS_COUNT: usize = 3;

        if parts.len() != PARTS_COUNT {
            return Err(Error::protocol("invalid number of message parts"));
        }
        if parts[PREFIX] != DIAL_STATE {
            return Err(Error::protocol(format!(
                "unexpected reply, expected: {}",
                DIAL_STATE
            )));
        }
        if parts[ID] != port.id() {
            return Err(Error::protocol("wrong port ID"));
        }
        let position = codec::parse_bounded_int(
            &parts[POSITION],
            "position",
            i64::from(i32::MIN),
            i64::from(i32::MAX),
        )?;
        port.set_dial_position(&self.token, position)
    }

    fn expect_digital_state(&self, port: &mut Port, channel: i32) -> Result<()> {
        let message = self.expect_reply(channel)?;
        self.apply_digital_state(port, &codec::split(message.payload(), SEPARATOR))
    }

    fn expect_analog_state(&self, port: &mut Port, channel: i32) -> Result<()> {
        let message = self.expect_reply(channel)?;
        self.apply_analog_state(port, &codec::split(message.payload(), SEPARATOR))
    }

    fn expect_select_state(&self, port: &mut Port, channel: i32) -> Result<()> {
        let message = self.expect_reply(channel)?;
        self.apply_select_state(port, &codec::split(message.payload(), SEPARATOR))
    }

    fn expect_dial_state(&self, port: &mut Port, channel: i32) -> Result<()> {
        let message = self.expect_reply(channel)?;
        self.apply_dial_state(port, &codec::split(message.payload(), SEPARATOR))
    }

    /// Fetch all position labels of a freshly deserialized select port.
    ///
    /// Access-denied and port-error replies make no sense during
    /// capability discovery and are logged and skipped; the port stays
    /// usable.
    pub(crate) fn fetch_select_labels(&self, port: &mut Port) -> Result<()> {
        let pos_count = match port.as_select() {
            Some(select) => select.pos_count(),
            None => return Ok(()),
        };
        for position in 0..pos_count {
            match self.get_select_label(port, position) {
                Ok(label) => port.push_select_label(&self.token, label)?,
                Err(Error::PortAccessDenied { .. }) | Err(Error::PortError { .. }) => {
                    warn!(
                        "label fetch for port '{}' position {} rejected by device; skipping",
                        port.id(),
                        position
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn start_ping(&self) -> Result<()> {
        let mut ping = self.ping.lock().unwrap_or_else(|e| e.into_inner());
        if ping.is_some() {
            return Ok(());
        }
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_stop = Arc::clone(&stop);
        let device = Arc::clone(&self.device);
        let interval = self.config.get().protocol.ping_interval();
        let thread = thread::Builder::new()
            .name("portlink-ping".to_string())
            .spawn(move || {
                let (lock, condvar) = &*thread_stop;
                let mut stopped = lock.lock().unwrap_or_else(|e| e.into_inner());
                loop {
                    let (guard, _) = condvar
                        .wait_timeout(stopped, interval)
                        .unwrap_or_else(|e| e.into_inner());
                    stopped = guard;
                    if *stopped || !device.is_connected() {
                        return;
                    }
                    device.send_message(Message::control(PING));
                }
            })
            .map_err(|e| Error::device(format!("failed to start keepalive: {}", e)))?;
        *ping = Some(PingHandle { stop, thread });
        Ok(())
    }

    fn stop_ping(&self) {
        let handle = self.ping.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(PingHandle { stop, thread }) = handle {
            let (lock, condvar) = &*stop;
            *lock.lock().unwrap_or_else(|e| e.into_inner()) = true;
            condvar.notify_all();
            let _ = thread.join();
        }
    }

    fn require_kind<'a>(
        &self,
        port: &'a Port,
        wanted: &str,
        matches: bool,
    ) -> Result<&'a Port> {
        if matches {
            Ok(port)
        } else {
            Err(Error::invalid_argument(format!(
                "port '{}' is not a {} port",
                port.id(),
                wanted
            )))
        }
    }
}

fn join_remainder(parts: &[String], from: usize) -> String {
    if parts.len() > from {
        codec::join(SEPARATOR, &parts[from..])
    } else {
        String::new()
    }
}

impl ProtocolEngine for BasicProtocol {
    fn magic(&self) -> &'static str {
        MAGIC
    }

    fn initiate(&self) -> Result<()> {
        // synchronous channel number reset; clear streaming bindings
        self.channels.reset();
        self.bound_ports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.start_ping()?;
        info!("{} protocol session initiated", MAGIC);
        Ok(())
    }

    fn disconnect(&self) {
        // send the disconnect message; do not expect an answer and
        // ignore an already-gone transport
        if let Err(Error::Disconnected) = self.send(Message::control(DISCONNECT)) {
            debug!("device already disconnected");
        }
        self.stop_ping();
    }

    fn dispatch(&self, message: &Message) -> bool {
        if message.channel() == CONTROL_CHANNEL {
            if message.payload() == DISCONNECT {
                self.device.disconnect_device();
                return true;
            }
            if message.payload() == RECONFIGURE {
                self.device.received_reconfigure();
                return true;
            }
            let parts = codec::split(message.payload(), SEPARATOR);
            return match parts[0].as_str() {
                DEBUG => {
                    self.device.received_debug(join_remainder(&parts, 1));
                    true
                }
                REFRESH => {
                    let port_ids = parts[1..]
                        .iter()
                        .filter(|id| !id.is_empty())
                        .cloned()
                        .collect();
                    self.device.received_refresh(port_ids);
                    true
                }
                ERROR => {
                    let code = parts
                        .get(1)
                        .and_then(|c| codec::parse_bounded_int(c, "errorNo", 0, 255).ok())
                        .unwrap_or(0) as i32;
                    let text = (parts.len() > 2).then(|| join_remainder(&parts, 2));
                    self.device.set_error(code, text);
                    true
                }
                _ => false,
            };
        }
        // check whether the channel is bound to a streaming port
        let bound = self.bound_ports.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(binding) = bound.get(&message.channel()) {
            if let Some(listener) = &binding.listener {
                listener.data_received(&binding.port_id, message.payload());
            }
            return true;
        }
        false
    }

    fn get_device_capabilities(&self) -> Result<DeviceCapabilities> {
        let channel = self.channels.next_synchronous();
        self.send(Message::new(channel, GET_DEVICE_CAPS))?;
        let reply = self.expect(channel, self.default_timeout(), None)?;
        let port_ids = DeviceCapabilities::parse_port_ids(reply.payload())?;

        // query each port sequentially on the discovery channel
        let mut ports = Vec::with_capacity(port_ids.len());
        for port_id in &port_ids {
            ports.push(self.get_port_info(port_id, channel)?);
        }
        Ok(DeviceCapabilities::from_ports(ports))
    }

    fn get_port_info(&self, port_id: &str, channel: i32) -> Result<Port> {
        self.send(Message::new(
            channel,
            codec::join(SEPARATOR, &[GET_PORT_INFO, port_id]),
        ))?;
        let reply = self.expect(channel, self.default_timeout(), None)?;
        let parts = codec::split(reply.payload(), SEPARATOR);
        let mut port = Port::from_wire(&self.token, &parts, &self.drivers)?;
        if port.id() != port_id {
            return Err(Error::protocol("wrong port ID"));
        }
        self.fetch_select_labels(&mut port)?;
        Ok(port)
    }

    fn get_port_state(&self, port: &mut Port) -> Result<()> {
        if port.as_digital().is_some() {
            return self.port_op(port, |s, p| {
                let channel = s.channels.next_synchronous();
                s.send(Message::new(
                    channel,
                    codec::join(SEPARATOR, &[GET_DIGITAL_STATE, p.id()]),
                ))?;
                s.expect_digital_state(p, channel)
            });
        }
        if port.as_analog().is_some() {
            return self.port_op(port, |s, p| {
                let channel = s.channels.next_synchronous();
                s.send(Message::new(
                    channel,
                    codec::join(SEPARATOR, &[GET_ANALOG_STATE, p.id()]),
                ))?;
                s.expect_analog_state(p, channel)
            });
        }
        if port.as_select().is_some() {
            return self.port_op(port, |s, p| {
                let channel = s.channels.next_synchronous();
                s.send(Message::new(
                    channel,
                    codec::join(SEPARATOR, &[GET_SELECT_STATE, p.id()]),
                ))?;
                s.expect_select_state(p, channel)
            });
        }
        if port.as_dial().is_some() {
            return self.port_op(port, |s, p| {
                let channel = s.channels.next_synchronous();
                s.send(Message::new(
                    channel,
                    codec::join(SEPARATOR, &[GET_DIAL_STATE, p.id()]),
                ))?;
                s.expect_dial_state(p, channel)
            });
        }
        // streaming ports have no queryable state
        Ok(())
    }

    fn refresh_port_states(&self, capabilities: &mut DeviceCapabilities) -> Result<()> {
        for port in capabilities.ports_mut() {
            self.get_port_state(port)?;
        }
        Ok(())
    }

    fn set_digital_mode(&self, port: &mut Port, mode: DigitalMode) -> Result<()> {
        self.require_kind(port, "digital", port.as_digital().is_some())?;
        DigitalPort::check_mode(port.dir_caps(), port.flags(), mode)?;
        self.port_op(port, |s, p| {
            let channel = s.channels.next_synchronous();
            let mode = mode.to_wire().to_string();
            s.send(Message::new(
                channel,
                codec::join(SEPARATOR, &[SET_DIGITAL_MODE, p.id(), mode.as_str()]),
            ))?;
            s.expect_digital_state(p, channel)
        })
    }

    fn set_digital_line(&self, port: &mut Port, line: DigitalLine) -> Result<()> {
        let digital = port
            .as_digital()
            .ok_or_else(|| Error::invalid_argument("not a digital port"))?;
        if digital.mode() != Some(DigitalMode::Output) {
            return Err(Error::invalid_argument(
                "can't set the line on a digital port not configured as output",
            ));
        }
        self.port_op(port, |s, p| {
            let channel = s.channels.next_synchronous();
            let line = line.to_wire().to_string();
            s.send(Message::new(
                channel,
                codec::join(SEPARATOR, &[SET_DIGITAL_LINE, p.id(), line.as_str()]),
            ))?;
            s.expect_digital_state(p, channel)
        })
    }

    fn set_analog_value(&self, port: &mut Port, value: i32) -> Result<()> {
        self.require_kind(port, "analog", port.as_analog().is_some())?;
        self.port_op(port, |s, p| {
            let channel = s.channels.next_synchronous();
            let value = value.to_string();
            s.send(Message::new(
                channel,
                codec::join(SEPARATOR, &[SET_ANALOG_VALUE, p.id(), value.as_str()]),
            ))?;
            s.expect_analog_state(p, channel)
        })
    }

    fn set_analog_mode(&self, port: &mut Port, mode: AnalogMode) -> Result<()> {
        self.require_kind(port, "analog", port.as_analog().is_some())?;
        self.port_op(port, |s, p| {
            let channel = s.channels.next_synchronous();
            let mode = mode.to_wire().to_string();
            s.send(Message::new(
                channel,
                codec::join(SEPARATOR, &[SET_ANALOG_MODE, p.id(), mode.as_str()]),
            ))?;
            s.expect_analog_state(p, channel)
        })
    }

    fn set_analog_resolution(&self, port: &mut Port, resolution: u32) -> Result<()> {
        self.require_kind(port, "analog", port.as_analog().is_some())?;
        AnalogPort::check_resolution(port.flags(), resolution)?;
        self.port_op(port, |s, p| {
            let channel = s.channels.next_synchronous();
            let resolution = resolution.to_string();
            s.send(Message::new(
                channel,
                codec::join(SEPARATOR, &[SET_ANALOG_RESOLUTION, p.id(), resolution.as_str()]),
            ))?;
            s.expect_analog_state(p, channel)
        })
    }

    fn set_analog_reference(&self, port: &mut Port, reference: AnalogReference) -> Result<()> {
        self.require_kind(port, "analog", port.as_analog().is_some())?;
        AnalogPort::check_reference(port.flags())?;
        self.port_op(port, |s, p| {
            let channel = s.channels.next_synchronous();
            let reference = reference.to_wire().to_string();
            s.send(Message::new(
                channel,
                codec::join(SEPARATOR, &[SET_ANALOG_REFERENCE, p.id(), reference.as_str()]),
            ))?;
            s.expect_analog_state(p, channel)
        })
    }

    fn get_select_label(&self, port: &Port, position: u16) -> Result<String> {
        const PREFIX: usize = 0;
        const ID: usize = 1;
        const POSITION: usize = 2;
        const LABEL: usize = 3;
        const PARTS_COUNT: usize = 4;

        self.require_kind(port, "select", port.as_select().is_some())?;
        let channel = self.channels.next_synchronous();
        let position_str = position.to_string();
        self.send(Message::new(
            channel,
            codec::join(SEPARATOR, &[GET_SELECT_LABEL, port.id(), position_str.as_str()]),
        ))?;
        let message = self.expect_reply(channel)?;
        let parts = codec::split(message.payload(), SEPARATOR);
        if parts.len() != PARTS_COUNT {
            return Err(Error::protocol("invalid number of message parts"));
        }
        if parts[PREFIX] != SELECT_LABEL {
            return Err(Error::protocol(format!(
                "unexpected reply, expected: {}",
                SELECT_LABEL
            )));
        }
        if parts[ID] != port.id() {
            return Err(Error::protocol("wrong port ID"));
        }
        if parts[POSITION] != position_str {
            return Err(Error::protocol("wrong position"));
        }
        Ok(parts[LABEL].clone())
    }

    fn set_select_position(&self, port: &mut Port, position: u16) -> Result<()> {
        let select = port
            .as_select()
            .ok_or_else(|| Error::invalid_argument("not a select port"))?;
        if position >= select.pos_count() {
            return Err(Error::invalid_argument(format!(
                "position {} is not valid for port '{}'",
                position,
                port.id()
            )));
        }
        self.port_op(port, |s, p| {
            let channel = s.channels.next_synchronous();
            let position = position.to_string();
            s.send(Message::new(
                channel,
                codec::join(SEPARATOR, &[SET_SELECT_POSITION, p.id(), position.as_str()]),
            ))?;
            s.expect_select_state(p, channel)
        })
    }

    fn set_dial_position(&self, port: &mut Port, position: i64) -> Result<()> {
        let dial = port
            .as_dial()
            .ok_or_else(|| Error::invalid_argument("not a dial port"))?;
        let adjusted = dial.adjust_position(position);
        self.port_op(port, |s, p| {
            let channel = s.channels.next_synchronous();
            let position = adjusted.to_string();
            s.send(Message::new(
                channel,
                codec::join(SEPARATOR, &[SET_DIAL_POSITION, p.id(), position.as_str()]),
            ))?;
            s.expect_dial_state(p, channel)
        })
    }

    fn bind_streaming_port(&self, port: &mut Port) -> Result<bool> {
        self.require_kind(port, "streaming", port.as_streaming().is_some())?;
        port.clear_error(&self.token);

        let stream_channel = self.channels.next_streaming()?;
        let channel = self.channels.next_synchronous();
        let stream_channel_str = stream_channel.to_string();
        self.send(Message::new(
            channel,
            codec::join(
                SEPARATOR,
                &[BIND_STREAMING_PORT, port.id(), stream_channel_str.as_str()],
            ),
        ))?;
        let reply = match self.expect_reply(channel) {
            Ok(reply) => reply,
            Err(Error::PortError { message, .. }) => {
                port.set_error(&self.token, message);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let parts = codec::split(reply.payload(), SEPARATOR);
        match parts[0].as_str() {
            AGREEMENT => {
                port.set_streaming_channel(&self.token, stream_channel)?;
                let listener = port.as_streaming().and_then(|p| p.listener());
                self.bound_ports
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(
                        stream_channel,
                        BoundStreamingPort {
                            port_id: port.id().to_string(),
                            listener,
                        },
                    );
                debug!("bound streaming port '{}' to channel {}", port.id(), stream_channel);
                Ok(true)
            }
            DISAGREEMENT => {
                debug!("device refused streaming binding for '{}'", port.id());
                Ok(false)
            }
            _ => Err(Error::protocol(format!(
                "unexpected reply, expected: {}",
                AGREEMENT
            ))),
        }
    }

    fn unbind_streaming_port(&self, port: &mut Port) -> Result<()> {
        let streaming = port
            .as_streaming()
            .ok_or_else(|| Error::invalid_argument("not a streaming port"))?;
        let stream_channel = streaming.channel();
        port.clear_error(&self.token);

        let channel = self.channels.next_synchronous();
        self.send(Message::new(
            channel,
            codec::join(SEPARATOR, &[UNBIND_STREAMING_PORT, port.id()]),
        ))?;
        match self.expect_reply(channel) {
            Ok(reply) => {
                let parts = codec::split(reply.payload(), SEPARATOR);
                if parts[0] != AGREEMENT {
                    return Err(Error::protocol(format!(
                        "unexpected reply, expected: {}",
                        AGREEMENT
                    )));
                }
            }
            Err(Error::PortError { message, .. }) => {
                port.set_error(&self.token, message);
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        self.bound_ports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&stream_channel);
        port.streaming_unbound(&self.token)
    }

    fn send_streaming_data(&self, port: &Port, data: &str) -> Result<()> {
        let streaming = port
            .as_streaming()
            .ok_or_else(|| Error::invalid_argument("not a streaming port"))?;
        if !streaming.is_bound() {
            return Err(Error::invalid_argument(format!(
                "streaming port '{}' is not bound",
                port.id()
            )));
        }
        if !self.device.is_connected() {
            return Err(Error::Disconnected);
        }
        self.device
            .send_message(Message::new(streaming.channel(), data));
        Ok(())
    }
}

impl Drop for BasicProtocol {
    fn drop(&mut self) {
        self.stop_ping();
    }
}
