/*!
 * The port object model.
 *
 * A port is an addressable I/O point on a device: a digital line, an
 * analog value, a select enumeration, a dial range or a raw stream. A
 * [`Port`] holds a common header (identity, type, direction, flags,
 * error state, extended properties) plus a variant-specific payload.
 *
 * Ports are created only by deserializing a wire-form line; the magic
 * in the first field selects the variant. Cached state is `None` until
 * the first successful query and is reset to `None` by
 * [`refresh`](Port::refresh), forcing a device round-trip on the next
 * read. Cached-state mutators are gated by the owning session's
 * [`SessionToken`].
 */
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use portlink_core::codec;
use portlink_core::error::{Error, Result};

use crate::drivers::DriverRegistry;
use crate::session::SessionToken;

pub mod analog;
pub mod dial;
pub mod digital;
pub mod group;
pub mod select;
pub mod streaming;

pub use analog::{AnalogMode, AnalogPort, AnalogReference};
pub use dial::DialPort;
pub use digital::{DigitalLine, DigitalMode, DigitalPort};
pub use group::{GroupCache, PortGroup};
pub use select::SelectPort;
pub use streaming::StreamingPort;

/// Flag bit marking a port that cannot be written
pub const PORTFLAG_READONLY: u32 = 0x4000;

/// The different types of ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// A digital port with two states (low and high)
    Digital,
    /// An analog port
    Analog,
    /// A select port
    Select,
    /// A streaming port
    Streaming,
    /// Another port type
    Other,
}

/// The possible directions (capabilities) of ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirCaps {
    /// A port that can only be used for input
    Input,
    /// A port that can only be used for output
    Output,
    /// A port that can be configured for input or output
    Bidirectional,
}

impl PortDirCaps {
    /// Decode the wire representation (0, 1, 2)
    pub fn from_wire(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::Input),
            1 => Ok(Self::Output),
            2 => Ok(Self::Bidirectional),
            other => Err(Error::format(
                "PortDirCaps",
                format!("{} is not a direction", other),
            )),
        }
    }

    /// The wire representation
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Input => 0,
            Self::Output => 1,
            Self::Bidirectional => 2,
        }
    }
}

/// The common header shared by all port variants
#[derive(Debug)]
pub(crate) struct PortHeader {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) port_type: PortType,
    pub(crate) dir_caps: PortDirCaps,
    pub(crate) flags: u32,
    pub(crate) has_error: bool,
    pub(crate) error_message: Option<String>,
    pub(crate) group_id: Option<String>,
    pub(crate) extended_info: Option<String>,
    pub(crate) extended_properties: HashMap<String, String>,
    pub(crate) extended_state: HashMap<String, String>,
    pub(crate) unit: Option<String>,
    pub(crate) owner: SessionToken,
}

impl PortHeader {
    pub(crate) fn new(
        owner: &SessionToken,
        id: String,
        name: String,
        port_type: PortType,
        dir_caps: PortDirCaps,
        flags: u32,
    ) -> Self {
        Self {
            id,
            name,
            port_type,
            dir_caps,
            flags,
            has_error: false,
            error_message: None,
            group_id: None,
            extended_info: None,
            extended_properties: HashMap::new(),
            extended_state: HashMap::new(),
            unit: None,
            owner: owner.clone(),
        }
    }
}

/// The variant-specific payload of a port
#[derive(Debug)]
pub enum PortKind {
    /// A digital line port
    Digital(DigitalPort),
    /// An analog value port
    Analog(AnalogPort),
    /// A select (enumeration) port
    Select(SelectPort),
    /// A dial (ranged value) port
    Dial(DialPort),
    /// A streaming port
    Streaming(StreamingPort),
}

impl PortKind {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Digital(_) => "digital",
            Self::Analog(_) => "analog",
            Self::Select(_) => "select",
            Self::Dial(_) => "dial",
            Self::Streaming(_) => "streaming",
        }
    }
}

/// An addressable device I/O point
#[derive(Debug)]
pub struct Port {
    pub(crate) header: PortHeader,
    pub(crate) kind: PortKind,
}

/// Throws a `ProtocolError` equivalent if the part count doesn't match
/// or if the first part is not equal to the magic.
pub(crate) fn check_serial_form(parts: &[String], count: usize, magic: &str) -> Result<()> {
    if parts.len() != count {
        return Err(Error::protocol("serial form invalid"));
    }
    if parts[0] != magic {
        return Err(Error::protocol("serial form invalid: wrong magic"));
    }
    Ok(())
}

pub(crate) fn parse_flags(s: &str) -> Result<u32> {
    Ok(codec::parse_bounded_int(s, "flags", 0, i64::from(u32::MAX))? as u32)
}

impl Port {
    /// Create a port from its wire form.
    ///
    /// The magic in the first field decides the port variant. An
    /// unrecognized magic is a programming error: the capability
    /// negotiation must filter unsupported ports.
    pub fn from_wire(
        owner: &SessionToken,
        parts: &[String],
        drivers: &DriverRegistry,
    ) -> Result<Self> {
        let magic = parts
            .first()
            .ok_or_else(|| Error::protocol("empty port serial form"))?;
        match magic.as_str() {
            digital::MAGIC => digital::from_wire(owner, parts),
            analog::MAGIC => analog::from_wire(owner, parts),
            select::MAGIC => select::from_wire(owner, parts),
            dial::MAGIC => dial::from_wire(owner, parts),
            streaming::MAGIC => streaming::from_wire(owner, parts, drivers),
            other => Err(Error::invalid_argument(format!(
                "unknown port magic '{}': the capability negotiation must filter unsupported ports",
                other
            ))),
        }
    }

    /// The unique id of this port within its device
    pub fn id(&self) -> &str {
        &self.header.id
    }

    /// The display name of this port
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// The type of this port
    pub fn port_type(&self) -> PortType {
        self.header.port_type
    }

    /// The possible directions of this port
    pub fn dir_caps(&self) -> PortDirCaps {
        self.header.dir_caps
    }

    /// The raw flag bits of this port
    pub fn flags(&self) -> u32 {
        self.header.flags
    }

    /// Whether this port cannot be written
    pub fn is_readonly(&self) -> bool {
        self.header.flags & PORTFLAG_READONLY == PORTFLAG_READONLY
    }

    /// Whether the last operation on this port reported a port error
    pub fn has_error(&self) -> bool {
        self.header.has_error
    }

    /// The message of the last port error, empty if none
    pub fn error_message(&self) -> &str {
        self.header.error_message.as_deref().unwrap_or("")
    }

    /// The id of the group this port belongs to, if any
    pub fn group_id(&self) -> Option<&str> {
        self.header.group_id.as_deref()
    }

    /// The unit identifier from the extended port info, if any
    pub fn unit(&self) -> Option<&str> {
        self.header.unit.as_deref()
    }

    /// Look up an extended info property, falling back to the default
    pub fn extended_property<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.header
            .extended_properties
            .get(key)
            .map(String::as_str)
            .unwrap_or(default)
    }

    /// Look up an extended state property, falling back to the default
    pub fn extended_state_property<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.header
            .extended_state
            .get(key)
            .map(String::as_str)
            .unwrap_or(default)
    }

    /// The variant payload of this port
    pub fn kind(&self) -> &PortKind {
        &self.kind
    }

    /// View this port as a digital port
    pub fn as_digital(&self) -> Option<&DigitalPort> {
        match &self.kind {
            PortKind::Digital(p) => Some(p),
            _ => None,
        }
    }

    /// View this port as an analog port
    pub fn as_analog(&self) -> Option<&AnalogPort> {
        match &self.kind {
            PortKind::Analog(p) => Some(p),
            _ => None,
        }
    }

    /// View this port as a select port
    pub fn as_select(&self) -> Option<&SelectPort> {
        match &self.kind {
            PortKind::Select(p) => Some(p),
            _ => None,
        }
    }

    /// View this port as a dial port
    pub fn as_dial(&self) -> Option<&DialPort> {
        match &self.kind {
            PortKind::Dial(p) => Some(p),
            _ => None,
        }
    }

    /// View this port as a streaming port
    pub fn as_streaming(&self) -> Option<&StreamingPort> {
        match &self.kind {
            PortKind::Streaming(p) => Some(p),
            _ => None,
        }
    }

    /// Returns a serialized description of this port
    pub fn serialize(&self) -> String {
        match &self.kind {
            PortKind::Digital(p) => p.serialize(&self.header),
            PortKind::Analog(p) => p.serialize(&self.header),
            PortKind::Select(p) => p.serialize(&self.header),
            PortKind::Dial(p) => p.serialize(&self.header),
            PortKind::Streaming(p) => p.serialize(&self.header),
        }
    }

    /// Clear cached state values and the error flag.
    ///
    /// Performs no I/O; the next state read issues a device round-trip.
    pub fn refresh(&mut self) {
        self.header.has_error = false;
        self.header.error_message = None;
        match &mut self.kind {
            PortKind::Digital(p) => p.refresh(),
            PortKind::Analog(p) => p.refresh(),
            PortKind::Select(p) => p.refresh(),
            PortKind::Dial(p) => p.refresh(),
            PortKind::Streaming(p) => p.refresh(),
        }
    }

    fn assert_owner(&self, token: &SessionToken) {
        if *token != self.header.owner {
            panic!("port state mutation is only allowed from the owning protocol session");
        }
    }

    fn kind_mismatch(&self, wanted: &str) -> Error {
        Error::invalid_argument(format!(
            "port '{}' is a {} port, not a {} port",
            self.header.id,
            self.kind.type_name(),
            wanted
        ))
    }

    /// Clear the port error flag. Called at the start of every
    /// state-changing or state-querying operation.
    pub fn clear_error(&mut self, token: &SessionToken) {
        self.assert_owner(token);
        self.header.has_error = false;
        self.header.error_message = None;
    }

    /// Record a device-reported port error on this port
    pub fn set_error<S: Into<String>>(&mut self, token: &SessionToken, message: S) {
        self.assert_owner(token);
        self.header.has_error = true;
        self.header.error_message = Some(message.into());
    }

    /// Attach extended port info, extracting known properties
    pub fn set_extended_info(&mut self, token: &SessionToken, info: &str) {
        self.assert_owner(token);
        self.header.extended_info = Some(info.to_string());
        self.header.extended_properties = codec::parse_properties(info);
        if let Some(unit) = self.header.extended_properties.get("unit") {
            self.header.unit = Some(unit.clone());
        }
    }

    /// Merge extended port state properties
    pub fn set_extended_state(&mut self, token: &SessionToken, info: &str) {
        self.assert_owner(token);
        self.header
            .extended_state
            .extend(codec::parse_properties(info));
    }

    /// Assign the resolved group id for this port
    pub fn set_group_id(&mut self, token: &SessionToken, group_id: Option<String>) {
        self.assert_owner(token);
        self.header.group_id = group_id;
    }

    /// Update the cached digital state
    pub fn set_digital_state(
        &mut self,
        token: &SessionToken,
        mode: DigitalMode,
        line: DigitalLine,
    ) -> Result<()> {
        self.assert_owner(token);
        match &mut self.kind {
            PortKind::Digital(p) => {
                p.set_state(mode, line);
                Ok(())
            }
            _ => Err(self.kind_mismatch("digital")),
        }
    }

    /// Update the cached analog state
    pub fn set_analog_state(
        &mut self,
        token: &SessionToken,
        mode: AnalogMode,
        reference: AnalogReference,
        resolution: u32,
        value: i32,
    ) -> Result<()> {
        self.assert_owner(token);
        match &mut self.kind {
            PortKind::Analog(p) => {
                p.set_state(mode, reference, resolution, value);
                Ok(())
            }
            _ => Err(self.kind_mismatch("analog")),
        }
    }

    /// Update the cached select position
    pub fn set_select_position(&mut self, token: &SessionToken, position: u16) -> Result<()> {
        self.assert_owner(token);
        match &mut self.kind {
            PortKind::Select(p) => {
                p.set_position(position);
                Ok(())
            }
            _ => Err(self.kind_mismatch("select")),
        }
    }

    /// Append a position label fetched during capability discovery
    pub fn push_select_label(&mut self, token: &SessionToken, label: String) -> Result<()> {
        self.assert_owner(token);
        match &mut self.kind {
            PortKind::Select(p) => {
                p.push_label(label);
                Ok(())
            }
            _ => Err(self.kind_mismatch("select")),
        }
    }

    /// Update the cached dial position
    pub fn set_dial_position(&mut self, token: &SessionToken, position: i64) -> Result<()> {
        self.assert_owner(token);
        match &mut self.kind {
            PortKind::Dial(p) => {
                p.set_position(position);
                Ok(())
            }
            _ => Err(self.kind_mismatch("dial")),
        }
    }

    /// Bind or unbind the streaming channel (0 = unbound)
    pub fn set_streaming_channel(&mut self, token: &SessionToken, channel: i32) -> Result<()> {
        self.assert_owner(token);
        match &mut self.kind {
            PortKind::Streaming(p) => {
                p.set_channel(channel);
                Ok(())
            }
            _ => Err(self.kind_mismatch("streaming")),
        }
    }

    /// The device unbound this streaming port; reset the channel and
    /// notify the listener.
    pub fn streaming_unbound(&mut self, token: &SessionToken) -> Result<()> {
        self.assert_owner(token);
        let id = self.header.id.clone();
        match &mut self.kind {
            PortKind::Streaming(p) => {
                p.set_channel(0);
                if let Some(listener) = p.listener() {
                    listener.port_unbound(&id);
                }
                Ok(())
            }
            _ => Err(self.kind_mismatch("streaming")),
        }
    }

    /// Replace the streaming data listener
    pub fn set_streaming_listener(
        &mut self,
        listener: std::sync::Arc<dyn crate::drivers::StreamingListener>,
    ) -> Result<()> {
        match &mut self.kind {
            PortKind::Streaming(p) => {
                p.set_listener(listener);
                Ok(())
            }
            _ => Err(self.kind_mismatch("streaming")),
        }
    }

    /// Whether this streaming port requests automatic binding
    pub fn is_autobind(&self) -> bool {
        matches!(self.kind, PortKind::Streaming(_))
            && self.header.flags & streaming::FLAG_AUTOBIND == streaming::FLAG_AUTOBIND
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Port id={}; name='{}'; type={:?}; dir_caps={:?}",
            self.id(),
            self.name(),
            self.port_type(),
            self.dir_caps()
        )
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::port_from_payload;
    use super::*;

    #[test]
    fn test_unknown_magic_fails_loudly() {
        let owner = SessionToken::new();
        let err = port_from_payload(&owner, "XX:p1:Name:0:0").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("XX"));
    }

    #[test]
    fn test_readonly_flag() {
        let owner = SessionToken::new();
        let port = port_from_payload(&owner, "SLP:s1:Mode:3:16384").unwrap();
        assert!(port.is_readonly());

        let port = port_from_payload(&owner, "SLP:s1:Mode:3:0").unwrap();
        assert!(!port.is_readonly());
    }

    #[test]
    fn test_extended_info_extracts_unit_and_group() {
        let owner = SessionToken::new();
        let mut port = port_from_payload(&owner, "DL:d1:Volume:0:100:10:0").unwrap();
        port.set_extended_info(&owner, "unit=dB;group=audio;icon=speaker");
        assert_eq!(port.unit(), Some("dB"));
        assert_eq!(port.extended_property("group", ""), "audio");
        assert_eq!(port.extended_property("icon", ""), "speaker");
        assert_eq!(port.extended_property("missing", "?"), "?");
    }

    #[test]
    #[should_panic(expected = "owning protocol session")]
    fn test_foreign_token_panics() {
        let owner = SessionToken::new();
        let mut port = port_from_payload(&owner, "DL:d1:Volume:0:100:10:0").unwrap();
        let foreign = SessionToken::new();
        let _ = port.set_dial_position(&foreign, 50);
    }

    #[test]
    fn test_kind_mismatch_is_invalid_argument() {
        let owner = SessionToken::new();
        let mut port = port_from_payload(&owner, "SLP:s1:Mode:3:0").unwrap();
        let err = port.set_dial_position(&owner, 5).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_error_state_lifecycle() {
        let owner = SessionToken::new();
        let mut port = port_from_payload(&owner, "SLP:s1:Mode:3:0").unwrap();
        assert!(!port.has_error());
        port.set_error(&owner, "position invalid");
        assert!(port.has_error());
        assert_eq!(port.error_message(), "position invalid");
        port.clear_error(&owner);
        assert!(!port.has_error());
        assert_eq!(port.error_message(), "");
    }
}
