//! Driver errors

use thiserror::Error;

/// Errors that can occur while driving the Open Interface link
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Handshake timed out: no validated packet from the robot (check that it is powered)")]
    HandshakeTimeout,

    #[error("Not connected to the robot")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("No sensor data holder supplied")]
    MissingDecoder,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DriverError::HandshakeTimeout;
        assert!(err.to_string().contains("Handshake"));

        let err = DriverError::NotConnected;
        assert!(!format!("{:?}", err).is_empty());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err: DriverError = io.into();
        assert!(matches!(err, DriverError::IoError(_)));
    }
}
