// src/error.rs
//! Error types for the GPS interpreter

use std::fmt;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, GpsError>;

#[derive(Debug)]
pub enum GpsError {
    /// The command lock could not be acquired within the command timeout.
    /// The interpreter's state is unchanged.
    Busy(Duration),
    /// The interpreter has been disposed; no further commands are accepted.
    Disposed,
    /// No device was available from the discovery collaborator.
    DeviceNotFound,
    /// The connection to the device was lost or could not be established.
    Connection(String),
    /// The worker did not stop within the command timeout.
    Timeout(String),
    Io(std::io::Error),
    Serial(tokio_serial::Error),
    /// A configuration value was out of range.
    InvalidConfig(String),
    Other(String),
}

impl GpsError {
    /// Whether this failure means the device stream is no longer usable and
    /// the worker should reset the device and consult the reconnection
    /// policy. Anything else is reported and the session continues.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            GpsError::Connection(_) => true,
            GpsError::Serial(_) => true,
            GpsError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

impl fmt::Display for GpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpsError::Busy(timeout) => {
                write!(f, "command lock not acquired within {:?}", timeout)
            }
            GpsError::Disposed => write!(f, "interpreter has been disposed"),
            GpsError::DeviceNotFound => write!(f, "no GPS device available"),
            GpsError::Connection(msg) => write!(f, "connection error: {}", msg),
            GpsError::Timeout(msg) => write!(f, "timed out: {}", msg),
            GpsError::Io(e) => write!(f, "IO error: {}", e),
            GpsError::Serial(e) => write!(f, "serial error: {}", e),
            GpsError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            GpsError::Other(msg) => write!(f, "error: {}", msg),
        }
    }
}

impl std::error::Error for GpsError {}

impl From<std::io::Error> for GpsError {
    fn from(error: std::io::Error) -> Self {
        GpsError::Io(error)
    }
}

impl From<tokio_serial::Error> for GpsError {
    fn from(error: tokio_serial::Error) -> Self {
        GpsError::Serial(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_loss_classification() {
        assert!(GpsError::Connection("cable pulled".to_string()).is_connection_loss());
        assert!(
            GpsError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"))
                .is_connection_loss()
        );
        assert!(GpsError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied"
        ))
        .is_connection_loss());
        assert!(!GpsError::Other("bad checksum".to_string()).is_connection_loss());
        assert!(
            !GpsError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, "garbage"))
                .is_connection_loss()
        );
    }
}
