/*!
 * The Portlink message type.
 *
 * A message is a channel number plus a payload string, immutable once
 * constructed. Channel 0 is reserved for asynchronous control traffic
 * (disconnect, error, debug, reconfigure, refresh); synchronous
 * request/reply pairs and streaming bindings use positive channels.
 */
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{Error, Result};

/// The control channel for asynchronous device-level messages
pub const CONTROL_CHANNEL: i32 = 0;

/// The terminator byte ending a message serial form
pub const TERMINATOR: char = '\n';

/// A message sent to or received from a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    channel: i32,
    payload: String,
}

impl Message {
    /// Create a new message on the given channel
    pub fn new<S: Into<String>>(channel: i32, payload: S) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// Create a control-channel message
    pub fn control<S: Into<String>>(payload: S) -> Self {
        Self::new(CONTROL_CHANNEL, payload)
    }

    /// The channel this message belongs to
    pub fn channel(&self) -> i32 {
        self.channel
    }

    /// The message payload
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Encode the message into its serial form.
    ///
    /// The serial form is `<channel>:<payload>:<hex4 checksum>` where the
    /// checksum is the 16-bit truncated sum of the bytes of
    /// `<channel>:<payload>`. The terminator may not appear in the
    /// payload; the caller appends it when framing onto the transport.
    pub fn encode(&self) -> Result<String> {
        if self.payload.contains(TERMINATOR) {
            return Err(Error::message("terminator may not appear in payload"));
        }
        let content = format!("{}{}{}", self.channel, codec::SEPARATOR, self.payload);
        let checksum: u32 = content.bytes().map(u32::from).sum();
        Ok(format!(
            "{}{}{:04x}",
            content,
            codec::SEPARATOR,
            checksum & 0xffff
        ))
    }

    /// Decode a message from its serial form, verifying the checksum
    pub fn decode(serial_form: &str) -> Result<Self> {
        let parts = codec::split(serial_form, codec::SEPARATOR);
        if parts.len() < 3 {
            return Err(Error::message("message part number too low"));
        }
        let checksum = u32::from_str_radix(parts[parts.len() - 1].trim(), 16)
            .map_err(|_| Error::message("checksum is not a hex number"))?;
        // everything before the last separator contributes to the checksum
        let content_len = serial_form.len() - parts[parts.len() - 1].len() - 1;
        let content = &serial_form[..content_len];
        let calculated: u32 = content.bytes().map(u32::from).sum::<u32>() & 0xffff;
        if calculated != checksum {
            return Err(Error::message(format!(
                "checksum mismatch: {:04x}, expected: {:04x}",
                calculated, checksum
            )));
        }
        let channel: i32 = parts[0]
            .parse()
            .map_err(|_| Error::message("channel number invalid"))?;
        let payload = codec::join(codec::SEPARATOR, &parts[1..parts.len() - 1]);
        Ok(Self { channel, payload })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let message = Message::new(17, "gPI:port1");
        let serial = message.encode().unwrap();
        let decoded = Message::decode(&serial).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_round_trip_preserves_separators_in_payload() {
        let message = Message::new(3, "DS:d1:0:1");
        let decoded = Message::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded.payload(), "DS:d1:0:1");
        assert_eq!(decoded.channel(), 3);
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let serial = Message::new(1, "gDC").encode().unwrap();
        let tampered = serial.replace("gDC", "gDX");
        assert!(matches!(
            Message::decode(&tampered),
            Err(Error::Message(_))
        ));
    }

    #[test]
    fn test_decode_rejects_short_forms() {
        assert!(Message::decode("1:abcd").is_err());
        assert!(Message::decode("").is_err());
    }

    #[test]
    fn test_encode_rejects_terminator_in_payload() {
        let message = Message::new(1, "bad\npayload");
        assert!(matches!(message.encode(), Err(Error::Message(_))));
    }

    #[test]
    fn test_control_constructor() {
        let message = Message::control("Dis");
        assert_eq!(message.channel(), CONTROL_CHANNEL);
        assert_eq!(message.payload(), "Dis");
    }

    #[test]
    fn test_json_round_trip() {
        let message = Message::new(12, "gSS:s1");
        let json = serde_json::to_string(&message).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
    }
}
