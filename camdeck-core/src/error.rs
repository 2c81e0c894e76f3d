//! Error types for core operations.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Video or canvas dimensions cannot produce a finite layout.
    #[error("Invalid dimensions: video {video_width}x{video_height}, canvas {canvas_width}x{canvas_height}")]
    InvalidDimensions {
        /// Intrinsic video width.
        video_width: f64,
        /// Intrinsic video height.
        video_height: f64,
        /// Canvas width.
        canvas_width: f64,
        /// Canvas height.
        canvas_height: f64,
    },

    /// Settings or capability serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration value is out of its accepted range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration or settings file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a hardware camera track.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrackError {
    /// The device refused an advanced constraint.
    #[error("Constraint '{constraint}' rejected: {reason}")]
    ConstraintRejected {
        /// Hardware constraint name.
        constraint: String,
        /// Reason reported by the driver.
        reason: String,
    },

    /// The track has ended and accepts no further constraints.
    #[error("Track ended")]
    Ended,
}

/// Errors reported by an AI model service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The service has not finished loading.
    #[error("Service '{0}' is not ready")]
    NotReady(&'static str),

    /// The service was destroyed and can no longer be used.
    #[error("Service '{0}' has been destroyed")]
    Destroyed(&'static str),

    /// Inference failed for this frame.
    #[error("Inference failed: {0}")]
    Inference(String),
}
