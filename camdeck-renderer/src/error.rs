//! Renderer error types.

use thiserror::Error;

use crate::backend::Layer;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur during rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The backend failed to execute a draw call.
    #[error("Backend operation '{op}' failed: {message}")]
    Backend {
        /// Operation name.
        op: &'static str,
        /// Backend message.
        message: String,
    },

    /// A drawing surface is not available.
    #[error("Layer not available: {0}")]
    MissingLayer(Layer),

    /// Frame geometry could not be computed.
    #[error("Invalid frame geometry: {0}")]
    Geometry(#[from] camdeck_core::CoreError),
}

impl RenderError {
    /// Shorthand for a backend failure.
    pub fn backend(op: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            op,
            message: message.into(),
        }
    }
}
