//! Error types for drift-netcode

use thiserror::Error;

/// Netcode error type
#[derive(Debug, Error)]
pub enum Error {
    /// The ping batch did not complete before the calibration deadline
    #[error("Clock calibration timed out after {waited_ms} ms: {received}/{expected} ping replies")]
    CalibrationTimeout {
        received: usize,
        expected: usize,
        waited_ms: f64,
    },

    /// Operation needs a calibrated clock
    #[error("Session is not synchronized yet")]
    NotSynchronized,

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Wire encoding or decoding failed
    #[error("Codec error: {0}")]
    Codec(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Drawing surface error
    #[error("Surface error: {0}")]
    Surface(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] drift_core::Error),
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

impl From<ron::error::SpannedError> for Error {
    fn from(err: ron::error::SpannedError) -> Self {
        Error::Config(err.to_string())
    }
}
