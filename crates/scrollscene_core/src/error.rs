//! Scene engine error types

use thiserror::Error;

/// Errors raised by the scene engine
///
/// Only [`StageError::ContainerNotFound`] ever crosses the public API (from
/// [`Controller::new`](crate::Controller::new)). Every other variant is
/// logged at the owning object's loglevel and the operation degrades to a
/// safe default.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    /// The configured scroll container does not resolve to an element
    #[error("No valid scroll container supplied: {0}")]
    ContainerNotFound(String),

    /// An option value failed validation
    #[error("Invalid value for option \"{option}\": {value}")]
    InvalidOption { option: String, value: String },

    /// A trigger element selector or handle did not resolve
    #[error("Element defined in option \"triggerElement\" was not found: {0}")]
    TriggerElementNotFound(String),

    /// An option key nobody registered
    #[error("Unknown option \"{0}\"")]
    UnknownOption(String),

    /// Malformed or disallowed event name
    #[error("Invalid event name: \"{0}\"")]
    InvalidEventName(String),

    /// Invalid argument to a public method
    #[error("Invalid argument for '{method}()': {reason}")]
    InvalidArgument { method: &'static str, reason: String },
}

impl StageError {
    pub(crate) fn invalid_option(option: impl Into<String>, value: impl ToString) -> Self {
        StageError::InvalidOption {
            option: option.into(),
            value: value.to_string(),
        }
    }

    pub(crate) fn invalid_argument(method: &'static str, reason: impl Into<String>) -> Self {
        StageError::InvalidArgument {
            method,
            reason: reason.into(),
        }
    }
}

/// Result type for scene engine operations
pub type Result<T> = std::result::Result<T, StageError>;
