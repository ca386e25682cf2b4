/*!
 * Analog ports.
 *
 * An analog port carries a numeric value sampled or driven at a
 * configurable resolution (8 to 12 bits) against an internal or
 * external reference.
 */
use portlink_core::codec;
use portlink_core::error::{Error, Result};

use super::{check_serial_form, parse_flags, Port, PortDirCaps, PortHeader, PortKind, PortType};
use crate::session::SessionToken;

/// The wire magic of analog ports
pub const MAGIC: &str = "AP";

/// Flag bit: the resolution can be changed
pub const FLAG_CAN_CHANGE_RESOLUTION: u32 = 0x01;
/// Flag bit: the reference can be changed
pub const FLAG_CAN_CHANGE_REFERENCE: u32 = 0x200;

/// The lowest supported resolution in bits
pub const MIN_RESOLUTION: u32 = 8;
/// The highest supported resolution in bits
pub const MAX_RESOLUTION: u32 = 12;

/// The mode of an analog port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogMode {
    /// The port samples a value
    Input,
    /// The port drives a value
    Output,
}

impl AnalogMode {
    /// Decode the wire representation (0 or 1)
    pub fn from_wire(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::Input),
            1 => Ok(Self::Output),
            other => Err(Error::format("mode", format!("{} is not an analog mode", other))),
        }
    }

    /// The wire representation
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Input => 0,
            Self::Output => 1,
        }
    }
}

/// The voltage reference of an analog port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogReference {
    /// The internal reference
    Internal,
    /// An external reference
    External,
}

impl AnalogReference {
    /// Decode the wire representation (0 or 1)
    pub fn from_wire(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::Internal),
            1 => Ok(Self::External),
            other => Err(Error::format(
                "reference",
                format!("{} is not a reference", other),
            )),
        }
    }

    /// The wire representation
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Internal => 0,
            Self::External => 1,
        }
    }
}

/// Variant payload of an analog port
#[derive(Debug, Default)]
pub struct AnalogPort {
    mode: Option<AnalogMode>,
    reference: Option<AnalogReference>,
    resolution: Option<u32>,
    value: Option<i32>,
}

/// Deserialize an analog port from its wire form
/// (`AP:<id>:<name>:<dirCaps>:<flags>`).
pub(crate) fn from_wire(owner: &SessionToken, parts: &[String]) -> Result<Port> {
    const ID_PART: usize = 1;
    const NAME_PART: usize = 2;
    const DIR_PART: usize = 3;
    const FLAGS_PART: usize = 4;
    const PART_COUNT: usize = 5;

    check_serial_form(parts, PART_COUNT, MAGIC)?;

    let dir_caps =
        PortDirCaps::from_wire(codec::parse_bounded_int(&parts[DIR_PART], "PortDirCaps", 0, 2)?)?;
    let flags = parse_flags(&parts[FLAGS_PART])?;

    Ok(Port {
        header: PortHeader::new(
            owner,
            parts[ID_PART].clone(),
            parts[NAME_PART].clone(),
            PortType::Analog,
            dir_caps,
            flags,
        ),
        kind: PortKind::Analog(AnalogPort::default()),
    })
}

impl AnalogPort {
    /// The cached mode, `None` until fetched
    pub fn mode(&self) -> Option<AnalogMode> {
        self.mode
    }

    /// The cached reference, `None` until fetched
    pub fn reference(&self) -> Option<AnalogReference> {
        self.reference
    }

    /// The cached resolution in bits, `None` until fetched
    pub fn resolution(&self) -> Option<u32> {
        self.resolution
    }

    /// The cached value, `None` until fetched
    pub fn value(&self) -> Option<i32> {
        self.value
    }

    /// Check that a resolution can be applied to a port with the given
    /// flags.
    pub fn check_resolution(flags: u32, resolution: u32) -> Result<()> {
        if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&resolution) {
            return Err(Error::invalid_argument(format!(
                "resolution {} is outside [{}, {}] bits",
                resolution, MIN_RESOLUTION, MAX_RESOLUTION
            )));
        }
        if flags & FLAG_CAN_CHANGE_RESOLUTION == 0 {
            return Err(Error::invalid_argument(
                "analog port resolution cannot be changed",
            ));
        }
        Ok(())
    }

    /// Check that the reference can be changed on a port with the given
    /// flags.
    pub fn check_reference(flags: u32) -> Result<()> {
        if flags & FLAG_CAN_CHANGE_REFERENCE == 0 {
            return Err(Error::invalid_argument(
                "analog port reference cannot be changed",
            ));
        }
        Ok(())
    }

    pub(crate) fn set_state(
        &mut self,
        mode: AnalogMode,
        reference: AnalogReference,
        resolution: u32,
        value: i32,
    ) {
        self.mode = Some(mode);
        self.reference = Some(reference);
        self.resolution = Some(resolution);
        self.value = Some(value);
    }

    pub(crate) fn refresh(&mut self) {
        self.mode = None;
        self.reference = None;
        self.resolution = None;
        self.value = None;
    }

    pub(crate) fn serialize(&self, header: &PortHeader) -> String {
        codec::join(
            codec::SEPARATOR,
            &[
                MAGIC.to_string(),
                header.id.clone(),
                header.name.clone(),
                header.dir_caps.to_wire().to_string(),
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
        let port = port_from_payload(&owner, "AP:a0:Sensor:0:513").unwrap();
        assert_eq!(port.id(), "a0");
        assert_eq!(port.port_type(), PortType::Analog);
        assert_eq!(port.dir_caps(), PortDirCaps::Input);
        assert_eq!(port.flags(), 513);
        assert_eq!(port.serialize(), "AP:a0:Sensor:0:513");
    }

    #[test]
    fn test_state_sentinel_and_refresh() {
        let owner = SessionToken::new();
        let mut port = port_from_payload(&owner, "AP:a0:Sensor:0:0").unwrap();
        assert!(port.as_analog().unwrap().value().is_none());

        port.set_analog_state(&owner, AnalogMode::Input, AnalogReference::Internal, 10, 512)
            .unwrap();
        let analog = port.as_analog().unwrap();
        assert_eq!(analog.value(), Some(512));
        assert_eq!(analog.resolution(), Some(10));

        port.refresh();
        assert!(port.as_analog().unwrap().value().is_none());
        assert!(port.as_analog().unwrap().mode().is_none());
    }

    #[test]
    fn test_check_resolution() {
        assert!(AnalogPort::check_resolution(FLAG_CAN_CHANGE_RESOLUTION, 10).is_ok());
        assert!(AnalogPort::check_resolution(FLAG_CAN_CHANGE_RESOLUTION, 7).is_err());
        assert!(AnalogPort::check_resolution(FLAG_CAN_CHANGE_RESOLUTION, 13).is_err());
        assert!(AnalogPort::check_resolution(0, 10).is_err());
    }

    #[test]
    fn test_check_reference() {
        assert!(AnalogPort::check_reference(FLAG_CAN_CHANGE_REFERENCE).is_ok());
        assert!(AnalogPort::check_reference(0).is_err());
    }
}
