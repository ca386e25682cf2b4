/*!
 * The protocol registry.
 *
 * Maps a protocol magic to a constructor for the matching engine. The
 * registry is an explicit value built at startup — the built-in Basic
 * and Extended protocols are registered at construction time — and is
 * passed to whatever needs to resolve a magic. Third-party protocols
 * register alongside the built-ins; the constructor shape is enforced
 * by the closure type at compile time.
 */
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use portlink_core::config::SharedConfig;
use portlink_device::device::MessageDevice;
use portlink_device::drivers::DriverRegistry;

use crate::basic::{self, BasicProtocol};
use crate::engine::ProtocolEngine;
use crate::extended::{self, ExtendedProtocol};

/// Constructor closure producing a protocol engine for a device
pub type ProtocolConstructor =
    Box<dyn Fn(Arc<dyn MessageDevice>) -> Box<dyn ProtocolEngine> + Send + Sync>;

/// A registry that selects the proper protocol for a device
pub struct ProtocolRegistry {
    constructors: HashMap<String, ProtocolConstructor>,
}

impl ProtocolRegistry {
    /// Create a registry with the built-in protocols registered
    pub fn new(config: SharedConfig, drivers: Arc<DriverRegistry>) -> Self {
        let mut registry = Self {
            constructors: HashMap::new(),
        };

        let basic_config = config.clone();
        let basic_drivers = Arc::clone(&drivers);
        registry.register(basic::MAGIC, move |device| {
            Box::new(BasicProtocol::new(
                device,
                basic_config.clone(),
                Arc::clone(&basic_drivers),
            ))
        });

        registry.register(extended::MAGIC, move |device| {
            Box::new(ExtendedProtocol::new(
                device,
                config.clone(),
                Arc::clone(&drivers),
            ))
        });

        registry
    }

    /// Register a protocol constructor under the given magic.
    ///
    /// Registering an already-known magic replaces the previous
    /// constructor.
    pub fn register<F>(&mut self, magic: &str, constructor: F)
    where
        F: Fn(Arc<dyn MessageDevice>) -> Box<dyn ProtocolEngine> + Send + Sync + 'static,
    {
        debug!("registering protocol '{}'", magic);
        self.constructors
            .insert(magic.to_string(), Box::new(constructor));
    }

    /// Create the protocol engine registered for the given magic,
    /// `None` if the magic is unknown.
    pub fn create(
        &self,
        magic: &str,
        device: Arc<dyn MessageDevice>,
    ) -> Option<Box<dyn ProtocolEngine>> {
        self.constructors
            .get(magic)
            .map(|constructor| constructor(device))
    }

    /// Whether a protocol is registered under the given magic
    pub fn contains(&self, magic: &str) -> bool {
        self.constructors.contains_key(magic)
    }

    /// All registered magics
    pub fn magics(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.magics())
            .finish()
    }
}
