//! Host error types

use thiserror::Error;

/// Errors raised while interpreting host-side input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    /// A css length that is neither `auto`, a pixel value nor a percentage
    #[error("Invalid css length: {0}")]
    InvalidLength(String),

    /// A selector the headless document cannot evaluate
    #[error("Unsupported selector: {0}")]
    UnsupportedSelector(String),
}

/// Result type for host operations
pub type Result<T> = std::result::Result<T, HostError>;
