use thiserror::Error;

/// Why a device response was refused by the frame codec
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolFault {
    #[error("no response within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("incomplete response ({received}/{expected} bytes)")]
    ShortResponse { received: usize, expected: usize },

    #[error("invalid response header 0x{first:02X} 0x{second:02X}")]
    BadHeader { first: u8, second: u8 },

    #[error("checksum mismatch (expected 0x{expected:02X}, got 0x{actual:02X})")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

/// Errors raised by a sensor driver
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// The underlying channel could not be opened or written
    #[error("Transport error: {0}")]
    Transport(String),

    /// The device answered with something the codec rejects
    #[error("Protocol error: {reason}")]
    Protocol { reason: ProtocolFault },

    /// A frame capture produced no buffer
    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Driver not initialized")]
    NotInitialized,

    #[error("Setting not supported by this device: {0}")]
    Unsupported(String),
}

impl DriverError {
    pub fn protocol(reason: ProtocolFault) -> Self {
        Self::Protocol { reason }
    }
}

/// A configuration value that falls outside its documented range
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{field} = {value} is not one of the allowed values")]
    NotAllowed { field: &'static str, value: String },

    #[error("{field} does not apply to a {class} node")]
    Unsupported {
        field: &'static str,
        class: &'static str,
    },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::OutOfRange { field, .. }
            | Self::NotAllowed { field, .. }
            | Self::Unsupported { field, .. } => field,
        }
    }
}

/// Errors raised when pushing a message to the pub/sub channel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("Broker not connected")]
    NotConnected,

    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Publish failed: {0}")]
    Client(String),
}
