/*!
 * The protocol engine interface.
 *
 * Both the Basic and the Extended protocol expose the same capability
 * set behind this trait, so callers stay agnostic of which one a device
 * negotiated.
 */
use std::fmt::Debug;

use portlink_core::error::{Error, Result};
use portlink_core::message::Message;

use portlink_device::capabilities::DeviceCapabilities;
use portlink_device::ports::{
    AnalogMode, AnalogReference, DigitalLine, DigitalMode, Port,
};

/// Control-channel message: the device disconnects
pub const DISCONNECT: &str = "Dis";
/// Control-channel message: fatal device error
pub const ERROR: &str = "Err";
/// Control-channel message: the device requests a port refresh
pub const REFRESH: &str = "Ref";
/// Control-channel message: cached capabilities are stale
pub const RECONFIGURE: &str = "Reconf";
/// Control-channel message: a device debug message
pub const DEBUG: &str = "Debug";
/// Control-channel message: keepalive, ignored by receivers
pub const PING: &str = "ping";

/// Agreement reply
pub const AGREEMENT: &str = "OK";
/// Disagreement reply
pub const DISAGREEMENT: &str = "NOK";
/// Reply magic: the device denied access to a port
pub const ACCESS_DENIED: &str = "Denied";
/// Reply magic: the device reports a port-scoped error
pub const PORT_ERROR: &str = "PErr";

/// A cancellation token checked once per wait iteration of the blocking
/// reply wait.
pub trait Abortable: Send + Sync {
    /// Whether the waiting operation should abort
    fn is_aborted(&self) -> bool;
}

/// The operations a protocol session offers on a connected device.
///
/// All port-state operations follow one contract: the port error flag
/// is cleared first; a device-reported port error is absorbed into the
/// port's [`has_error`](Port::has_error) state and the call returns
/// `Ok`; access-denied and protocol-fatal errors propagate.
pub trait ProtocolEngine: Send + Sync + Debug {
    /// The protocol identifier
    fn magic(&self) -> &'static str;

    /// Establish the session: reset channel counters, clear session
    /// caches and start the keepalive.
    fn initiate(&self) -> Result<()>;

    /// Disconnect the device in a regular way (best effort, does not
    /// wait for an acknowledgement) and stop the keepalive.
    fn disconnect(&self);

    /// Attempt to dispatch an asynchronous message: control-channel
    /// events and unsolicited streaming data. Returns whether the
    /// message was consumed.
    fn dispatch(&self, message: &Message) -> bool;

    /// Discover the device capabilities
    fn get_device_capabilities(&self) -> Result<DeviceCapabilities>;

    /// Query the information of a single port on the given channel
    fn get_port_info(&self, port_id: &str, channel: i32) -> Result<Port>;

    /// Fetch the state of a port from the device
    fn get_port_state(&self, port: &mut Port) -> Result<()>;

    /// Fetch the state of every port in the capability set
    fn refresh_port_states(&self, capabilities: &mut DeviceCapabilities) -> Result<()>;

    /// Set the mode of a digital port
    fn set_digital_mode(&self, port: &mut Port, mode: DigitalMode) -> Result<()>;

    /// Set the line state of a digital port
    fn set_digital_line(&self, port: &mut Port, line: DigitalLine) -> Result<()>;

    /// Set the value of an analog port
    fn set_analog_value(&self, port: &mut Port, value: i32) -> Result<()>;

    /// Set the mode of an analog port
    fn set_analog_mode(&self, port: &mut Port, mode: AnalogMode) -> Result<()>;

    /// Set the resolution of an analog port
    fn set_analog_resolution(&self, port: &mut Port, resolution: u32) -> Result<()>;

    /// Set the reference of an analog port
    fn set_analog_reference(&self, port: &mut Port, reference: AnalogReference) -> Result<()>;

    /// Retrieve the label of the given position from a select port
    fn get_select_label(&self, port: &Port, position: u16) -> Result<String>;

    /// Set the position of a select port
    fn set_select_position(&self, port: &mut Port, position: u16) -> Result<()>;

    /// Set the position of a dial port. The value is clamped to the
    /// port's range and rounded to its step before it is sent.
    fn set_dial_position(&self, port: &mut Port, position: i64) -> Result<()>;

    /// Bind a streaming port to a channel selected by the session.
    /// Returns whether the binding attempt was successful.
    fn bind_streaming_port(&self, port: &mut Port) -> Result<bool>;

    /// Unbind a streaming port
    fn unbind_streaming_port(&self, port: &mut Port) -> Result<()>;

    /// Send data to a bound streaming port. No checks are performed on
    /// the supplied data.
    fn send_streaming_data(&self, port: &Port, data: &str) -> Result<()>;

    /// The position of a select port, fetching it from the device if it
    /// is not cached. `None` if the fetch ended in an absorbed port
    /// error.
    fn select_position(&self, port: &mut Port) -> Result<Option<u16>> {
        let cached = port
            .as_select()
            .ok_or_else(|| Error::invalid_argument("not a select port"))?
            .position();
        if cached.is_none() {
            self.get_port_state(port)?;
        }
        Ok(port.as_select().and_then(|p| p.position()))
    }

    /// The position of a dial port, fetching it from the device if it
    /// is not cached. `None` if the fetch ended in an absorbed port
    /// error.
    fn dial_position(&self, port: &mut Port) -> Result<Option<i64>> {
        let cached = port
            .as_dial()
            .ok_or_else(|| Error::invalid_argument("not a dial port"))?
            .position();
        if cached.is_none() {
            self.get_port_state(port)?;
        }
        Ok(port.as_dial().and_then(|p| p.position()))
    }

    /// The line of a digital port, fetching it from the device if it is
    /// not cached
    fn digital_line(&self, port: &mut Port) -> Result<Option<DigitalLine>> {
        let cached = port
            .as_digital()
            .ok_or_else(|| Error::invalid_argument("not a digital port"))?
            .line();
        if cached.is_none() {
            self.get_port_state(port)?;
        }
        Ok(port.as_digital().and_then(|p| p.line()))
    }

    /// The value of an analog port, fetching it from the device if it
    /// is not cached
    fn analog_value(&self, port: &mut Port) -> Result<Option<i32>> {
        let cached = port
            .as_analog()
            .ok_or_else(|| Error::invalid_argument("not an analog port"))?
            .value();
        if cached.is_none() {
            self.get_port_state(port)?;
        }
        Ok(port.as_analog().and_then(|p| p.value()))
    }
}
