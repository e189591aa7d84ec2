/// tabql Error Module
///
/// This module defines the error types for the tabql crate.
/// It provides structured error handling for the surfaces that do
/// propagate errors: connecting, configuration loading, and the
/// driver layer underneath the session facade.
///
/// Per-statement execution failures deliberately do not appear here.
/// After construction the session never raises; failed statements are
/// recorded in the audit log and the operation returns the `None`
/// failure sentinel instead.
use thiserror::Error;

/// Error type for the tabql crate.
///
/// Covers the fallible construction-time paths:
/// - Establishing the driver connection
/// - Loading and validating configuration
/// - File system access while reading config
#[derive(Error, Debug)]
pub enum TabqlError {
    /// Connection could not be established at session construction
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Driver-layer errors surfaced during construction
    #[error("Driver error: {0}")]
    Driver(#[from] crate::driver::DriverError),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result to use TabqlError as the error type.
pub type Result<T> = std::result::Result<T, TabqlError>;
