//! # Camdeck Renderer
//!
//! Per-frame compositing for the Camdeck webcam surface, written against an
//! abstract 2D backend so the same pipeline drives a browser canvas and the
//! headless recorder.
//!
//! ## Layers
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Overlay     tracking box, untransformed      │
//! ├──────────────────────────────────────────────┤
//! │ Display     base + filters + effects,        │
//! │             then mirror/rotate/zoom          │
//! ├───────────────┬───────────────┬──────────────┤
//! │ Background    │ Foreground    │ Snapshot     │
//! │ (video size)  │ (video size)  │ (display)    │
//! └───────────────┴───────────────┴──────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod effects;
pub mod error;
pub mod overlay;
pub mod pipeline;

pub use backend::recording::{DrawOp, MaskId, RecordedSource, RecordingBackend};
pub use backend::{CompositeOp, CompositingBackend, Layer, LayerTransform, Source};
pub use error::{RenderError, RenderResult};
pub use pipeline::{
    needs_transform, BackgroundMode, BaseLayer, FrameInputs, FrameOutcome, FrameStats,
    RenderPipeline, SkipReason,
};

/// Camdeck renderer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
