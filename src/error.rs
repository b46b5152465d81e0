//! # Teleinfo Error Handling
//!
//! This module defines the TeleinfoError enum, which represents the different error
//! types that can occur in the teleinfo-rs crate.

use thiserror::Error;

/// Represents the different error types that can occur in the Teleinfo crate.
#[derive(Debug, Error)]
pub enum TeleinfoError {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// Indicates the line source has no more data.
    #[error("End of stream")]
    EndOfStream,

    /// Indicates a line whose bytes are not valid text.
    #[error("Invalid UTF-8 in line")]
    InvalidUtf8,

    /// Indicates a line that cannot be split into label, value and checksum.
    #[error("Malformed line: {0}")]
    MalformedLine(String),

    /// Indicates a checksum mismatch.
    #[error("Invalid checksum: expected {expected:?}, received {received:?}")]
    InvalidChecksum { expected: char, received: char },

    /// Indicates a value that does not match the classification of its field.
    #[error("Cannot decode field {name} from {value:?}: {reason}")]
    FieldDecodeError {
        name: String,
        value: String,
        reason: String,
    },

    /// Indicates a completed frame without the meter address.
    #[error("Frame completed without the meter address field")]
    MissingAddress,

    /// Indicates the time-series store cannot be reached.
    #[error("Store unreachable: {0}")]
    StoreUnreachable(String),

    /// Indicates the time-series store answered but refused the request.
    #[error("Store rejected request: {0}")]
    StoreRejected(String),

    /// Indicates the auxiliary analog sampler failed.
    #[error("Sampler error: {0}")]
    SamplerError(String),

    /// Indicates an invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TeleinfoError {
    /// Returns true for errors that only affect one line or one frame.
    ///
    /// [`Pipeline::run`](crate::pipeline::Pipeline::run) logs these and keeps
    /// going; everything else ends it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TeleinfoError::InvalidUtf8
                | TeleinfoError::MalformedLine(_)
                | TeleinfoError::InvalidChecksum { .. }
                | TeleinfoError::FieldDecodeError { .. }
                | TeleinfoError::MissingAddress
                | TeleinfoError::StoreUnreachable(_)
                | TeleinfoError::StoreRejected(_)
                | TeleinfoError::SamplerError(_)
        )
    }
}

impl From<std::io::Error> for TeleinfoError {
    fn from(e: std::io::Error) -> Self {
        TeleinfoError::SerialPortError(e.to_string())
    }
}
