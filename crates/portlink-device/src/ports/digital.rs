/*!
 * Digital ports.
 *
 * A digital port is a single line that is either low or high, and can
 * be configured for input (floating, pullup or pulldown) or output
 * depending on its direction capabilities and flags.
 */
use portlink_core::codec;
use portlink_core::error::{Error, Result};

use super::{check_serial_form, parse_flags, Port, PortDirCaps, PortHeader, PortKind, PortType};
use crate::session::SessionToken;

/// The wire magic of digital ports
pub const MAGIC: &str = "DP";

/// Flag bit: the port has a pullup resistor
pub const FLAG_HAS_PULLUP: u32 = 0x01;
/// Flag bit: the port has a pulldown resistor
pub const FLAG_HAS_PULLDOWN: u32 = 0x02;

/// The mode of a digital port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalMode {
    /// Input with no resistor engaged
    InputFloating,
    /// Input with the pullup engaged
    InputPullup,
    /// Input with the pulldown engaged
    InputPulldown,
    /// Output
    Output,
}

impl DigitalMode {
    /// Decode the wire representation (0..=3)
    pub fn from_wire(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::InputFloating),
            1 => Ok(Self::InputPullup),
            2 => Ok(Self::InputPulldown),
            3 => Ok(Self::Output),
            other => Err(Error::format("mode", format!("{} is not a digital mode", other))),
        }
    }

    /// The wire representation
    pub fn to_wire(self) -> u8 {
        match self {
            Self::InputFloating => 0,
            Self::InputPullup => 1,
            Self::InputPulldown => 2,
            Self::Output => 3,
        }
    }

    /// Whether this is one of the input modes
    pub fn is_input(self) -> bool {
        !matches!(self, Self::Output)
    }
}

/// The line state of a digital port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalLine {
    /// The line is low
    Low,
    /// The line is high
    High,
}

impl DigitalLine {
    /// Decode the wire representation (0 or 1)
    pub fn from_wire(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::High),
            other => Err(Error::format("line", format!("{} is not a line state", other))),
        }
    }

    /// The wire representation
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }
}

/// Variant payload of a digital port
#[derive(Debug, Default)]
pub struct DigitalPort {
    mode: Option<DigitalMode>,
    line: Option<DigitalLine>,
}

/// Deserialize a digital port from its wire form
/// (`DP:<id>:<name>:<dirCaps>:<flags>`).
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
            PortType::Digital,
            dir_caps,
            flags,
        ),
        kind: PortKind::Digital(DigitalPort::default()),
    })
}

impl DigitalPort {
    /// The cached mode, `None` until fetched
    pub fn mode(&self) -> Option<DigitalMode> {
        self.mode
    }

    /// The cached line state, `None` until fetched
    pub fn line(&self) -> Option<DigitalLine> {
        self.line
    }

    /// Check that a mode is applicable to a port with the given
    /// direction capabilities and flags.
    pub fn check_mode(dir_caps: PortDirCaps, flags: u32, mode: DigitalMode) -> Result<()> {
        if mode == DigitalMode::Output && dir_caps == PortDirCaps::Input {
            return Err(Error::invalid_argument(
                "can't configure input only digital port for output",
            ));
        }
        if mode.is_input() && dir_caps == PortDirCaps::Output {
            return Err(Error::invalid_argument(
                "can't configure output only digital port for input",
            ));
        }
        if mode == DigitalMode::InputPullup && flags & FLAG_HAS_PULLUP == 0 {
            return Err(Error::invalid_argument("digital port has no pullup"));
        }
        if mode == DigitalMode::InputPulldown && flags & FLAG_HAS_PULLDOWN == 0 {
            return Err(Error::invalid_argument("digital port has no pulldown"));
        }
        Ok(())
    }

    pub(crate) fn set_state(&mut self, mode: DigitalMode, line: DigitalLine) {
        self.mode = Some(mode);
        self.line = Some(line);
    }

    pub(crate) fn refresh(&mut self) {
        self.mode = None;
        self.line = None;
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
        let port = port_from_payload(&owner, "DP:led1:Status LED:2:3").unwrap();
        assert_eq!(port.id(), "led1");
        assert_eq!(port.name(), "Status LED");
        assert_eq!(port.port_type(), PortType::Digital);
        assert_eq!(port.dir_caps(), PortDirCaps::Bidirectional);
        assert_eq!(port.serialize(), "DP:led1:Status LED:2:3");
    }

    #[test]
    fn test_wrong_part_count_rejected() {
        let owner = SessionToken::new();
        assert!(port_from_payload(&owner, "DP:led1:Status LED:2").is_err());
        assert!(port_from_payload(&owner, "DP:led1:Status LED:2:3:extra").is_err());
    }

    #[test]
    fn test_state_starts_unknown() {
        let owner = SessionToken::new();
        let port = port_from_payload(&owner, "DP:led1:LED:2:0").unwrap();
        let digital = port.as_digital().unwrap();
        assert!(digital.mode().is_none());
        assert!(digital.line().is_none());
    }

    #[test]
    fn test_refresh_resets_state() {
        let owner = SessionToken::new();
        let mut port = port_from_payload(&owner, "DP:led1:LED:2:0").unwrap();
        port.set_digital_state(&owner, DigitalMode::Output, DigitalLine::High)
            .unwrap();
        assert_eq!(port.as_digital().unwrap().line(), Some(DigitalLine::High));

        port.refresh();
        assert!(port.as_digital().unwrap().mode().is_none());
        assert!(port.as_digital().unwrap().line().is_none());
    }

    #[test]
    fn test_check_mode_respects_dir_caps() {
        assert!(
            DigitalPort::check_mode(PortDirCaps::Input, 0, DigitalMode::Output).is_err()
        );
        assert!(
            DigitalPort::check_mode(PortDirCaps::Output, 0, DigitalMode::InputFloating).is_err()
        );
        assert!(
            DigitalPort::check_mode(PortDirCaps::Bidirectional, 0, DigitalMode::Output).is_ok()
        );
    }

    #[test]
    fn test_check_mode_respects_resistor_flags() {
        assert!(DigitalPort::check_mode(
            PortDirCaps::Input,
            0,
            DigitalMode::InputPullup
        )
        .is_err());
        assert!(DigitalPort::check_mode(
            PortDirCaps::Input,
            FLAG_HAS_PULLUP,
            DigitalMode::InputPullup
        )
        .is_ok());
        assert!(DigitalPort::check_mode(
            PortDirCaps::Input,
            FLAG_HAS_PULLDOWN,
            DigitalMode::InputPulldown
        )
        .is_ok());
    }

    #[test]
    fn test_mode_wire_values() {
        for v in 0..=3 {
            assert_eq!(i64::from(DigitalMode::from_wire(v).unwrap().to_wire()), v);
        }
        assert!(DigitalMode::from_wire(4).is_err());
        assert!(DigitalLine::from_wire(2).is_err());
    }
}
