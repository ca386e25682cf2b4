/*!
 * A driver that receives text messages from a device.
 */
use std::sync::Mutex;

use super::{Driver, ReceiveTracker, StreamingListener};
use chrono::Duration;

/// The driver id of the text driver
pub const MAGIC: &str = "Text";

/// Retains the most recently received text line verbatim
#[derive(Debug, Default)]
pub struct TextDriver {
    text: Mutex<Option<String>>,
    tracker: ReceiveTracker,
}

impl TextDriver {
    /// Create a new text driver
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently received text, `None` before the first receive
    pub fn text(&self) -> Option<String> {
        self.text.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl StreamingListener for TextDriver {
    fn data_received(&self, _port_id: &str, data: &str) {
        *self.text.lock().unwrap_or_else(|e| e.into_inner()) = Some(data.to_string());
        self.tracker.mark(true);
    }

    fn port_unbound(&self, _port_id: &str) {}
}

impl Driver for TextDriver {
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
    fn test_retains_last_line() {
        let driver = TextDriver::new();
        assert!(driver.text().is_none());
        assert!(!driver.has_valid_data());

        driver.data_received("console", "hello");
        driver.data_received("console", "world");
        assert_eq!(driver.text().unwrap(), "world");
        assert!(driver.has_valid_data());
        assert!(driver.data_age().is_some());
    }
}
