//! Error types for the sensor and HID transport collaborators

use packed_struct::PackingError;
use thiserror::Error;

/// Errors reported by a gyroscope source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// Sensor has not completed power-up/configuration
    #[error("Sensor not ready")]
    NotReady,

    /// Every read of a calibration batch failed
    #[error("All {0} calibration reads failed")]
    AllReadsFailed(u32),

    /// Register bus transfer failed
    #[error("Sensor bus error: {0}")]
    Bus(String),

    /// Bus returned fewer bytes than requested
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
}

/// Errors reported by the wireless HID transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// No host is connected
    #[error("HID peer not connected")]
    NotConnected,

    /// The stack refused or dropped the notification
    #[error("Report send failed: {0}")]
    SendFailed(String),

    /// Report could not be packed into its wire layout
    #[error("Report encoding failed: {0}")]
    Encoding(#[from] PackingError),
}
