/*!
 * A driver for Bosch Sensortec BMP085 pressure sensor streams.
 *
 * The payload form is `BMP085:<temperature>:<pressure>`.
 */
use std::sync::Mutex;

use super::{Driver, ReceiveTracker, StreamingListener};
use chrono::Duration;
use portlink_core::codec;

/// The driver id of the pressure driver
pub const MAGIC: &str = "BMP085";

/// Retains the most recently received temperature/pressure pair
#[derive(Debug, Default)]
pub struct PressureDriver {
    reading: Mutex<Option<(f32, f32)>>,
    tracker: ReceiveTracker,
}

impl PressureDriver {
    /// Create a new pressure driver
    pub fn new() -> Self {
        Self::default()
    }

    /// The last temperature reading, `None` before the first valid
    /// receive
    pub fn temperature(&self) -> Option<f32> {
        self.reading
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map(|(t, _)| t)
    }

    /// The last pressure reading, `None` before the first valid receive
    pub fn pressure(&self) -> Option<f32> {
        self.reading
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map(|(_, p)| p)
    }

    fn parse(data: &str) -> Option<(f32, f32)> {
        const ID: usize = 0;
        const TEMP: usize = 1;
        const PRES: usize = 2;
        const PART_COUNT: usize = 3;

        let parts = codec::split(data, codec::SEPARATOR);
        if parts.len() != PART_COUNT || parts[ID] != MAGIC {
            return None;
        }
        let temperature: f32 = parts[TEMP].parse().ok()?;
        let pressure: f32 = parts[PRES].parse().ok()?;
        Some((temperature, pressure))
    }
}

impl StreamingListener for PressureDriver {
    fn data_received(&self, _port_id: &str, data: &str) {
        match Self::parse(data) {
            Some(reading) => {
                *self.reading.lock().unwrap_or_else(|e| e.into_inner()) = Some(reading);
                self.tracker.mark(true);
            }
            None => self.tracker.mark(false),
        }
    }

    fn port_unbound(&self, _port_id: &str) {}
}

impl Driver for PressureDriver {
    fn id(&self) -> &'static str {
        MAGIC
    }

    fn has_valid_data(&self) -> bool {
        self.tracker.has_valid_data()
    }

    fn data_age(&self) -> Option<Duration> {
        self.tracker.data_age()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_reading() {
        let driver = PressureDriver::new();
        driver.data_received("bmp", "BMP085:21.5:1013.25");
        assert!(driver.has_valid_data());
        assert_eq!(driver.temperature().unwrap(), 21.5);
        assert_eq!(driver.pressure().unwrap(), 1013.25);
    }

    #[test]
    fn test_wrong_magic_marks_invalid() {
        let driver = PressureDriver::new();
        driver.data_received("bmp", "OTHER:21.5:1013.25");
        assert!(!driver.has_valid_data());
        assert!(driver.temperature().is_none());
    }

    #[test]
    fn test_malformed_number_marks_invalid() {
        let driver = PressureDriver::new();
        driver.data_received("bmp", "BMP085:warm:high");
        assert!(!driver.has_valid_data());
    }
}
