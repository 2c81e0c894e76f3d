//! # Camdeck Core
//!
//! Camera settings model and control logic for the Camdeck webcam control
//! surface. Pure Rust, no rendering; compiles to WASM.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                     camdeck-core                      │
//! ├───────────────────────────────────────────────────────┤
//! │  Settings          │  Reconciliation                  │
//! │  - CameraSettings  │  - Control -> HardwareConstraint │
//! │  - SettingsStore   │  - clamp + batched corrections   │
//! │  - SettingsPatch   │  - reentrancy guard              │
//! ├───────────────────────────────────────────────────────┤
//! │  Geometry          │  Face tracking                   │
//! │  - letterbox fit   │  - widest-face selection         │
//! │  - transforms      │  - P controller + smoothing      │
//! ├───────────────────────────────────────────────────────┤
//! │  Filters           │  Loops                           │
//! │  - CSS chains      │  - LatestValue cells             │
//! │  - portrait light  │  - Cadence / LoopSet             │
//! └───────────────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capability;
pub mod config;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod landmarks;
pub mod latest;
pub mod loops;
pub mod reconcile;
pub mod services;
pub mod settings;
pub mod store;
pub mod track;
pub mod tracking;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use capability::{Capability, CapabilityRange, DeviceCapabilities, HardwareConstraint};
pub use config::{CadenceConfig, PipelineConfig, StudioConfig, TrackingConfig};
pub use error::{CoreError, CoreResult, ServiceError, TrackError};
pub use filter::{
    build_filter, build_filter_with_smoothing, calculate_portrait_lighting, filter_chain,
    BlurMode, FilterChain, FilterFn, PortraitLighting,
};
pub use geometry::{
    apply_transforms, draw_dimensions, video_rect_to_canvas, video_to_canvas, Affine,
    DrawDimensions, Point, Rect, TransformParams, TransformTarget,
};
pub use landmarks::{FaceLandmarks, FaceRegion};
pub use latest::LatestValue;
pub use loops::{Cadence, LoopHandle, LoopKind, LoopSet};
pub use reconcile::{
    plan_control, ControlPlan, ReconcileOutcome, ReconcileReport, Rejection, SettingsReconciler,
};
pub use services::{
    BoundingBox, Detection, FaceDetector, FaceMesh, Landmark, ModelService, Segmenter,
    ServiceSlot, ServiceStatus,
};
pub use settings::{
    snap_rotation, CameraSettings, Control, ControlValue, ExposureMode, FilterKind, FocusMode,
    SettingsPatch, WhiteBalanceMode,
};
pub use store::{SettingsStore, StoreError};
pub use track::{ConstraintValue, HardwareTrack, SimulatedTrack};
pub use tracking::{
    compute_adjustment, select_largest_face, smooth, target_adjustment, FaceTracker,
    FaceTrackingAdjustment, TrackingState, TrackingTick, VideoFrameInfo,
};

/// Camdeck core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
