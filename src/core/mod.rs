/// Core Module for tabql
///
/// Shared infrastructure used by the rest of the crate: the crate-wide
/// error type and `Result` alias.
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Result, TabqlError};
