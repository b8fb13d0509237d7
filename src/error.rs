//! # Error Types
//!
//! This module defines error types used throughout the btprinter library.
//!
//! Only [`PrinterError::PermissionDenied`] and
//! [`PrinterError::InvalidArguments`] reach bridge callers as structured
//! errors. Everything transport related is reported to them as `"false"`;
//! library callers get the full variant.

use std::time::Duration;

use thiserror::Error;

/// Main error type for btprinter operations
#[derive(Debug, Error)]
pub enum PrinterError {
    /// Bluetooth permission is not granted to this process
    #[error("Bluetooth permissions not granted")]
    PermissionDenied,

    /// A platform resource (e.g. battery level) cannot be queried
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Malformed call payload
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Device address is not of the form XX:XX:XX:XX:XX:XX
    #[error("Invalid Bluetooth address: {0}")]
    InvalidAddress(String),

    /// The Bluetooth radio is powered off or missing
    #[error("Bluetooth adapter not enabled")]
    AdapterDisabled,

    /// Socket setup did not finish in time
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// Operation needs a live connection and there is none
    #[error("Not connected")]
    NotConnected,

    /// Transport-level errors (connection, I/O)
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrinterError {
    /// Error code used on the bridge wire, for the variants that surface there.
    pub fn code(&self) -> &'static str {
        match self {
            PrinterError::PermissionDenied => "PERMISSION_DENIED",
            PrinterError::Unavailable(_) => "UNAVAILABLE",
            PrinterError::InvalidArguments(_) => "INVALID_ARGUMENTS",
            PrinterError::InvalidAddress(_) => "INVALID_ADDRESS",
            PrinterError::AdapterDisabled => "ADAPTER_DISABLED",
            PrinterError::Timeout(_) => "TIMEOUT",
            PrinterError::NotConnected => "NOT_CONNECTED",
            PrinterError::Transport(_) | PrinterError::Io(_) => "TRANSPORT_FAILURE",
        }
    }

    /// Whether this error came from the byte stream itself.
    ///
    /// Such errors always leave the connection manager disconnected.
    pub fn is_transport(&self) -> bool {
        matches!(self, PrinterError::Transport(_) | PrinterError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        assert_eq!(PrinterError::PermissionDenied.code(), "PERMISSION_DENIED");
        assert_eq!(
            PrinterError::InvalidArguments("x".into()).code(),
            "INVALID_ARGUMENTS"
        );
        assert_eq!(PrinterError::Unavailable("battery".into()).code(), "UNAVAILABLE");
    }

    #[test]
    fn test_io_is_transport() {
        let err: PrinterError = std::io::Error::from(std::io::ErrorKind::BrokenPipe).into();
        assert!(err.is_transport());
        assert!(!PrinterError::NotConnected.is_transport());
    }
}
