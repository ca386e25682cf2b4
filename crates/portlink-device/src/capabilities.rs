/*!
 * Device capabilities.
 *
 * The capabilities of a device are the ordered set of ports it exposes,
 * discovered once per session and replaced wholesale when the device
 * reconfigures itself.
 */
use std::sync::Arc;

use portlink_core::codec;
use portlink_core::error::{Error, Result};

use crate::ports::{GroupCache, Port, PortGroup};

/// The wire magic of the capabilities reply
pub const MAGIC: &str = "BDC";

/// The enumerated set of ports a device exposes
#[derive(Debug, Default)]
pub struct DeviceCapabilities {
    ports: Vec<Port>,
}

impl DeviceCapabilities {
    /// Build capabilities from already-deserialized ports
    pub fn from_ports(ports: Vec<Port>) -> Self {
        Self { ports }
    }

    /// Parse the port id list out of a capabilities reply
    /// (`BDC:<id1>,<id2>,...`). Empty ids are skipped.
    pub fn parse_port_ids(serial_form: &str) -> Result<Vec<String>> {
        const PORTS_PART: usize = 1;
        const PART_COUNT: usize = 2;

        let parts = codec::split(serial_form, codec::SEPARATOR);
        if parts.len() != PART_COUNT {
            return Err(Error::protocol("capabilities message invalid"));
        }
        if parts[0] != MAGIC {
            return Err(Error::protocol(format!(
                "capabilities message invalid: incorrect magic: {}",
                parts[0]
            )));
        }
        Ok(parts[PORTS_PART]
            .split(',')
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// All ports, in discovery order
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// All ports, mutably
    pub fn ports_mut(&mut self) -> &mut [Port] {
        &mut self.ports
    }

    /// The number of ports
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Whether the device exposes no ports
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Find a port by its unique id
    pub fn find_port_by_id(&self, port_id: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.id() == port_id)
    }

    /// Find a port by its unique id, mutably
    pub fn find_port_by_id_mut(&mut self, port_id: &str) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.id() == port_id)
    }

    /// All ports assigned to the given group
    pub fn ports_in_group(&self, group_id: &str) -> Vec<&Port> {
        self.ports
            .iter()
            .filter(|p| p.group_id() == Some(group_id))
            .collect()
    }

    /// All distinct groups referenced by these ports, including every
    /// ancestor up the hierarchy, resolved through the session cache.
    pub fn port_groups(&self, cache: &GroupCache) -> Vec<Arc<PortGroup>> {
        let mut seen: Vec<Arc<PortGroup>> = Vec::new();
        for port in &self.ports {
            let Some(group_id) = port.group_id() else {
                continue;
            };
            let mut current = cache.get(group_id);
            while let Some(group) = current {
                if seen.iter().any(|g| g.id() == group.id()) {
                    break;
                }
                current = group.parent_group().cloned();
                seen.push(group);
            }
        }
        seen
    }
}
