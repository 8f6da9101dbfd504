//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid chain timing: {0}")]
    InvalidChainTiming(String),

    #[error("invalid bucket layout: {0}")]
    InvalidLayout(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
