//! Error types for drift-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Unknown direction: {0}")]
    UnknownDirection(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
