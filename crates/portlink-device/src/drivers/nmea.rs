/*!
 * A driver for generic NMEA GPS streams.
 *
 * Decoding stops at sentence validation; position extraction is left to
 * the application, which can read the retained sentence.
 */
use std::sync::Mutex;

use super::{Driver, ReceiveTracker, StreamingListener};
use chrono::Duration;

/// The driver id of the NMEA driver
pub const MAGIC: &str = "NMEAGen";

/// Retains the most recently received valid NMEA sentence
#[derive(Debug, Default)]
pub struct NmeaDriver {
    sentence: Mutex<Option<String>>,
    tracker: ReceiveTracker,
}

impl NmeaDriver {
    /// Create a new NMEA driver
    pub fn new() -> Self {
        Self::default()
    }

    /// The last valid sentence, `None` before the first valid receive
    pub fn sentence(&self) -> Option<String> {
        self.sentence
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Validate an NMEA sentence: `$` start, `*` checksum separator and a
/// matching two-digit hex XOR checksum over the bytes between them.
fn sentence_valid(data: &str) -> bool {
    let Some(body) = data.strip_prefix('$') else {
        return false;
    };
    let Some((content, checksum)) = body.rsplit_once('*') else {
        return false;
    };
    let Ok(expected) = u8::from_str_radix(checksum.trim_end(), 16) else {
        return false;
    };
    let calculated = content.bytes().fold(0u8, |acc, b| acc ^ b);
    calculated == expected
}

impl StreamingListener for NmeaDriver {
    fn data_received(&self, _port_id: &str, data: &str) {
        if sentence_valid(data) {
            *self.sentence.lock().unwrap_or_else(|e| e.into_inner()) = Some(data.to_string());
            self.tracker.mark(true);
        } else {
            self.tracker.mark(false);
        }
    }

    fn port_unbound(&self, _port_id: &str) {}
}

impl Driver for NmeaDriver {
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
