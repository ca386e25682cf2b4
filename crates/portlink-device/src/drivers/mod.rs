/*!
 * Streaming drivers.
 *
 * A driver attaches to a streaming port and decodes its payloads into a
 * structured value. Drivers are resolved through an explicit registry
 * constructed at startup; built-ins are registered at construction and
 * third-party drivers can be added alongside them.
 */
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

pub mod nmea;
pub mod pressure;
pub mod text;

pub use nmea::NmeaDriver;
pub use pressure::PressureDriver;
pub use text::TextDriver;

/// A listener notified of streaming port data events
pub trait StreamingListener: Send + Sync + Debug {
    /// Called when data has been received for a bound streaming port
    fn data_received(&self, port_id: &str, data: &str);

    /// Called when the port has been unbound by the device, e.g. by a
    /// reconfigure
    fn port_unbound(&self, port_id: &str);
}

/// A device driver decoding a streaming port's payloads
pub trait Driver: StreamingListener {
    /// The driver id this driver is registered under
    fn id(&self) -> &'static str;

    /// Whether the most recently received data was decodable
    fn has_valid_data(&self) -> bool;

    /// The age of the most recent data, `None` before the first receive
    fn data_age(&self) -> Option<Duration>;
}

/// Tracks receive time and validity of the last payload for a driver
#[derive(Debug, Default)]
pub struct ReceiveTracker {
    inner: Mutex<ReceiveState>,
}

#[derive(Debug, Default)]
struct ReceiveState {
    received_at: Option<DateTime<Utc>>,
    valid: bool,
}

impl ReceiveTracker {
    /// Create a new tracker with no data received yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that data has been received and whether it was valid
    pub fn mark(&self, valid: bool) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.received_at = Some(Utc::now());
        state.valid = valid;
    }

    /// Whether the last received data was valid
    pub fn has_valid_data(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).valid
    }

    /// The time elapsed since the last receive
    pub fn data_age(&self) -> Option<Duration> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .received_at
            .map(|at| Utc::now() - at)
    }
}

/// A driver instance exposed both through its driver interface and as
/// the streaming listener to attach to a port.
#[derive(Debug, Clone)]
pub struct DriverInstance {
    driver: Arc<dyn Driver>,
    listener: Arc<dyn StreamingListener>,
}

impl DriverInstance {
    /// Wrap a concrete driver
    pub fn new<D: Driver + 'static>(driver: Arc<D>) -> Self {
        Self {
            driver: Arc::clone(&driver) as Arc<dyn Driver>,
            listener: driver as Arc<dyn StreamingListener>,
        }
    }

    /// The driver interface
    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }

    /// The listener to attach to the streaming port
    pub fn listener(&self) -> Arc<dyn StreamingListener> {
        Arc::clone(&self.listener)
    }
}

/// Factory closure creating a fresh driver instance
pub type DriverFactory = Box<dyn Fn() -> DriverInstance + Send + Sync>;

/// A registry mapping driver ids to driver factories
#[derive(Default)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in drivers registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(text::MAGIC, || {
            DriverInstance::new(Arc::new(TextDriver::new()))
        });
        registry.register(nmea::MAGIC, || {
            DriverInstance::new(Arc::new(NmeaDriver::new()))
        });
        registry.register(pressure::MAGIC, || {
            DriverInstance::new(Arc::new(PressureDriver::new()))
        });
        registry
    }

    /// Register a driver factory under the given id
    pub fn register<F>(&mut self, driver_id: &str, factory: F)
    where
        F: Fn() -> DriverInstance + Send + Sync + 'static,
    {
        debug!("registering driver '{}'", driver_id);
        self.factories.insert(driver_id.to_string(), Box::new(factory));
    }

    /// Create a driver instance for the given id, `None` if unknown
    pub fn create(&self, driver_id: &str) -> Option<DriverInstance> {
        self.factories.get(driver_id).map(|factory| factory())
    }

    /// Whether a driver is registered under the given id
    pub fn contains(&self, driver_id: &str) -> bool {
        self.factories.contains_key(driver_id)
    }
}

impl Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_resolve() {
        let registry = DriverRegistry::with_builtins();
        assert!(registry.contains("Text"));
        assert!(registry.contains("NMEAGen"));
        assert!(registry.contains("BMP085"));
        assert!(registry.create("Text").is_some());
        assert!(registry.create("NoSuchDriver").is_none());
    }

    #[test]
    fn test_external_registration() {
        let mut registry = DriverRegistry::new();
        assert!(!registry.contains("Text"));
        registry.register("Custom", || {
            DriverInstance::new(Arc::new(TextDriver::new()))
        });
        assert!(registry.contains("Custom"));
        assert_eq!(registry.create("Custom").unwrap().driver().id(), "Text");
    }

    #[test]
    fn test_receive_tracker() {
        let tracker = ReceiveTracker::new();
        assert!(!tracker.has_valid_data());
        assert!(tracker.data_age().is_none());

        tracker.mark(true);
        assert!(tracker.has_valid_data());
        assert!(tracker.data_age().unwrap() >= Duration::zero());

        tracker.mark(false);
        assert!(!tracker.has_valid_data());
    }
}
