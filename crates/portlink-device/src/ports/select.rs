/*!
 * Select ports.
 *
 * A select port exposes a fixed set of labeled positions, like a rotary
 * switch. Position labels are fetched one by one during capability
 * discovery.
 */
use portlink_core::codec;
use portlink_core::error::{Error, Result};

use super::{check_serial_form, parse_flags, Port, PortDirCaps, PortHeader, PortKind, PortType};
use crate::session::SessionToken;

/// The wire magic of select ports
pub const MAGIC: &str = "SLP";

/// Variant payload of a select port
#[derive(Debug)]
pub struct SelectPort {
    pos_count: u16,
    position: Option<u16>,
    labels: Vec<String>,
}

/// Deserialize a select port from its wire form
/// (`SLP:<id>:<name>:<posCount>:<flags>`).
pub(crate) fn from_wire(owner: &SessionToken, parts: &[String]) -> Result<Port> {
    const ID_PART: usize = 1;
    const NAME_PART: usize = 2;
    const POS_PART: usize = 3;
    const FLAGS_PART: usize = 4;
    const PART_COUNT: usize = 5;

    check_serial_form(parts, PART_COUNT, MAGIC)?;

    let pos_count = codec::parse_bounded_int(
        &parts[POS_PART],
        "position count",
        0,
        i64::from(u16::MAX),
    )? as u16;
    let flags = parse_flags(&parts[FLAGS_PART])?;

    Ok(Port {
        header: PortHeader::new(
            owner,
            parts[ID_PART].clone(),
            parts[NAME_PART].clone(),
            PortType::Select,
            PortDirCaps::Output,
            flags,
        ),
        kind: PortKind::Select(SelectPort {
            pos_count,
            position: None,
            labels: Vec::new(),
        }),
    })
}

impl SelectPort {
    /// The number of positions this port supports
    pub fn pos_count(&self) -> u16 {
        self.pos_count
    }

    /// The cached position, `None` until fetched
    pub fn position(&self) -> Option<u16> {
        self.position
    }

    /// All position labels fetched so far
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The label of the given position
    pub fn label_at(&self, position: u16) -> Result<&str> {
        self.labels
            .get(usize::from(position))
            .map(String::as_str)
            .ok_or_else(|| {
                Error::invalid_argument(
                    "the given position is not valid or the label has not yet been added",
                )
            })
    }

    pub(crate) fn set_position(&mut self, position: u16) {
        self.position = Some(position);
    }

    pub(crate) fn push_label(&mut self, label: String) {
        self.labels.push(label);
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
                self.pos_count.to_string(),
                header.flags.to_string(),
            ],
        )
    }
}
