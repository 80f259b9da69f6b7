//! Browser host errors

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Errors raised while attaching to the browser environment
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WebError {
    /// No global `window` (not running in a browser main thread)
    #[error("No global window")]
    NoWindow,

    /// The window has no document
    #[error("Window has no document")]
    NoDocument,
}

/// Best-effort text for a thrown JS value
pub(crate) fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

/// Result type for browser host operations
pub type Result<T> = std::result::Result<T, WebError>;
