/*!
 * Dial ports.
 *
 * A dial represents a ranged value for things like volume controls,
 * with a minimum, a maximum and a step width. Requested positions are
 * clamped to the range and rounded to the nearest step before being
 * sent to the device.
 */
use portlink_core::codec;
use portlink_core::error::{Error, Result};

use super::{check_serial_form, parse_flags, Port, PortDirCaps, PortHeader, PortKind, PortType};
use crate::session::SessionToken;

/// The wire magic of dial ports
pub const MAGIC: &str = "DL";

/// Variant payload of a dial port
#[derive(Debug)]
pub struct DialPort {
    minimum: i64,
    maximum: i64,
    step: i64,
    position: Option<i64>,
}

/// Deserialize a dial port from its wire form
/// (`DL:<id>:<name>:<minimum>:<maximum>:<step>:<flags>`).
pub(crate) fn from_wire(owner: &SessionToken, parts: &[String]) -> Result<Port> {
    const ID_PART: usize = 1;
    const NAME_PART: usize = 2;
    const MIN_PART: usize = 3;
    const MAX_PART: usize = 4;
    const STEP_PART: usize = 5;
    const FLAGS_PART: usize = 6;
    const PART_COUNT: usize = 7;

    check_serial_form(parts, PART_COUNT, MAGIC)?;

    let minimum = codec::parse_bounded_int(
        &parts[MIN_PART],
        "Minimum",
        i64::from(i32::MIN),
        i64::from(i32::MAX),
    )?;
    let maximum = codec::parse_bounded_int(
        &parts[MAX_PART],
        "Maximum",
        i64::from(i32::MIN),
        i64::from(i32::MAX),
    )?;
    let step = codec::parse_bounded_int(&parts[STEP_PART], "Step", 1, i64::from(i32::MAX))?;
    let flags = parse_flags(&parts[FLAGS_PART])?;

    if maximum < minimum {
        return Err(Error::format("Maximum", "maximum is below minimum"));
    }

    Ok(Port {
        header: PortHeader::new(
            owner,
            parts[ID_PART].clone(),
            parts[NAME_PART].clone(),
            PortType::Other,
            PortDirCaps::Output,
            flags,
        ),
        kind: PortKind::Dial(DialPort {
            minimum,
            maximum,
            step,
            position: None,
        }),
    })
}

impl DialPort {
    /// The lowest position of this dial
    pub fn minimum(&self) -> i64 {
        self.minimum
    }

    /// The highest position of this dial
    pub fn maximum(&self) -> i64 {
        self.maximum
    }

    /// The step width of this dial
    pub fn step(&self) -> i64 {
        self.step
    }

    /// The cached position, `None` until fetched
    pub fn position(&self) -> Option<i64> {
        self.position
    }

    /// Clamp a requested position to the range and round it to the
    /// nearest multiple of the step from the minimum.
    ///
    /// A remainder exactly halfway between two steps rounds down.
    pub fn adjust_position(&self, value: i64) -> i64 {
        let mut value = value.max(self.minimum);
        let remainder = (value - self.minimum) % self.step;
        value = if remainder <= self.step / 2 {
            value - remainder
        } else {
            value + self.step - remainder
        };
        value.min(self.maximum)
    }

    pub(crate) fn set_position(&mut self, position: i64) {
        self.position = Some(position);
    }

    pub(crate) fn refresh(&mut self) {
        self.position = None;
    }

    pub(crate) fn serialize(&self, header: &PortHeader) -> String {
        codec::join(
            codec::SEPARATOR,
            &[
                MAGIC.to_string(),
                header.id.clone(),
                header.name.clone(),
                self.minimum.to_string(),
                self.maximum.to_string(),
                self.step.to_string(),
                header.flags.to_string(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::testutil::port_from_payload;

    fn dial_port() -> Port {
        let owner = SessionToken::new();
        port_from_payload(&owner, "DL:vol:Volume:0:100:10:0").unwrap()
    }

    #[test]
    fn test_wire_round_trip() {
        let port = dial_port();
        assert_eq!(port.id(), "vol");
        assert_eq!(port.port_type(), PortType::Other);
        assert_eq!(port.dir_caps(), PortDirCaps::Output);
        let dial = port.as_dial().unwrap();
        assert_eq!(dial.minimum(), 0);
        assert_eq!(dial.maximum(), 100);
        assert_eq!(dial.step(), 10);
        assert_eq!(port.serialize(), "DL:vol:Volume:0:100:10:0");
    }

    #[test]
    fn test_adjust_rounds_down_below_half_step() {
        let port = dial_port();
        assert_eq!(port.as_dial().unwrap().adjust_position(24), 20);
    }

    #[test]
    fn test_adjust_rounds_up_above_half_step() {
        let port = dial_port();
        assert_eq!(port.as_dial().unwrap().adjust_position(26), 30);
    }

    #[test]
    fn test_adjust_tie_rounds_down() {
        let port = dial_port();
        assert_eq!(port.as_dial().unwrap().adjust_position(25), 20);
    }

    #[test]
    fn test_adjust_clamps_to_minimum_before_rounding() {
        let port = dial_port();
        assert_eq!(port.as_dial().unwrap().adjust_position(-5), 0);
    }

    #[test]
    fn test_adjust_clamps_to_maximum() {
        let port = dial_port();
        assert_eq!(port.as_dial().unwrap().adjust_position(1000), 100);
    }

    #[test]
    fn test_adjust_with_offset_minimum() {
        let owner = SessionToken::new();
        let port = port_from_payload(&owner, "DL:t:Temp:5:65:15:0").unwrap();
        let dial = port.as_dial().unwrap();
        // steps from the minimum: 5, 20, 35, 50, 65
        assert_eq!(dial.adjust_position(26), 20);
        assert_eq!(dial.adjust_position(28), 35);
        assert_eq!(dial.adjust_position(64), 65);
    }

    #[test]
    fn test_position_sentinel_and_refresh() {
        let owner = SessionToken::new();
        let mut port = port_from_payload(&owner, "DL:vol:Volume:0:100:10:0").unwrap();
        assert!(port.as_dial().unwrap().position().is_none());
        port.set_dial_position(&owner, 40).unwrap();
        assert_eq!(port.as_dial().unwrap().position(), Some(40));
        port.refresh();
        assert!(port.as_dial().unwrap().position().is_none());
    }

    #[test]
    fn test_invalid_range_rejected() {
        let owner = SessionToken::new();
        assert!(port_from_payload(&owner, "DL:v:V:100:0:10:0").is_err());
        assert!(port_from_payload(&owner, "DL:v:V:0:100:0:0").is_err());
    }
}
