/*!
 * Error types for Portlink.
 *
 * This module defines the error taxonomy shared by all Portlink crates.
 * Parsing and wire-protocol errors are never swallowed by the protocol
 * layer; port-scoped device failures are represented separately so that
 * the port model can absorb them into per-port error state.
 */
use thiserror::Error;

/// The error type used throughout the Portlink stack
#[derive(Error, Debug)]
pub enum Error {
    /// A field could not be parsed or was out of its permitted range
    #[error("invalid field '{field}': {reason}")]
    Format {
        /// The name of the offending field
        field: String,
        /// Why the field was rejected
        reason: String,
    },

    /// A message serial form was malformed (framing, checksum, channel)
    #[error("malformed message: {0}")]
    Message(String),

    /// A reply did not match the expected shape, magic or echoed id
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The transport reported not-connected
    #[error("device not connected")]
    Disconnected,

    /// No matching reply arrived within the deadline
    #[error("timeout waiting for message")]
    Timeout,

    /// The operation was interrupted by its cancellation token
    #[error("the operation was interrupted")]
    Interrupted,

    /// The device denied access to a port
    #[error("access to port '{port_id}' denied: {message}")]
    PortAccessDenied {
        /// The id of the port that denied access
        port_id: String,
        /// Device-supplied detail text
        message: String,
    },

    /// The device reported a port-scoped error
    #[error("port '{port_id}' error: {message}")]
    PortError {
        /// The id of the errored port
        port_id: String,
        /// Device-supplied detail text
        message: String,
    },

    /// A device-level failure not scoped to a single port
    #[error("device error: {0}")]
    Device(String),

    /// An argument violated a documented invariant (programming error)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a format error for the named field
    pub fn format<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::Format {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-message error
    pub fn message<S: Into<String>>(reason: S) -> Self {
        Self::Message(reason.into())
    }

    /// Create a protocol error
    pub fn protocol<S: Into<String>>(reason: S) -> Self {
        Self::Protocol(reason.into())
    }

    /// Create a port-access-denied error
    pub fn port_access_denied<I: Into<String>, M: Into<String>>(port_id: I, message: M) -> Self {
        Self::PortAccessDenied {
            port_id: port_id.into(),
            message: message.into(),
        }
    }

    /// Create a port error
    pub fn port_error<I: Into<String>, M: Into<String>>(port_id: I, message: M) -> Self {
        Self::PortError {
            port_id: port_id.into(),
            message: message.into(),
        }
    }

    /// Create a device error
    pub fn device<S: Into<String>>(reason: S) -> Self {
        Self::Device(reason.into())
    }

    /// Create an invalid-argument error
    pub fn invalid_argument<S: Into<String>>(reason: S) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(reason: S) -> Self {
        Self::Config(reason.into())
    }

    /// Whether this error terminates the device session when unhandled
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Timeout | Self::Protocol(_))
    }
}

/// Result type used throughout the Portlink stack
pub type Result<T> = std::result::Result<T, Error>;
