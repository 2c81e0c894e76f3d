//! Application error types.

use camdeck_core::{CoreError, StoreError};
use thiserror::Error;
use wasm_bindgen::JsValue;

/// Errors raised while wiring the app to the page.
#[derive(Debug, Error)]
pub enum AppError {
    /// Not running in a browser window.
    #[error("No window object")]
    NoWindow,

    /// The window has no document.
    #[error("No document object")]
    NoDocument,

    /// No element with this id.
    #[error("Element '{0}' not found")]
    MissingElement(String),

    /// The element exists but is not a canvas.
    #[error("Element '{0}' is not a canvas")]
    NotACanvas(String),

    /// The element exists but is not a video.
    #[error("Element '{0}' is not a video")]
    NotAVideo(String),

    /// A 2D context could not be created.
    #[error("Canvas context error: {0}")]
    Context(String),

    /// The configuration was rejected.
    #[error("Invalid configuration: {0}")]
    Config(#[from] CoreError),

    /// The settings store failed.
    #[error("Settings error: {0}")]
    Store(#[from] StoreError),

    /// A settings payload was malformed.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A mode string did not name a known mode.
    #[error("Unknown {kind}: '{value}'")]
    UnknownMode {
        /// Which mode was being parsed.
        kind: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<AppError> for JsValue {
    fn from(e: AppError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
