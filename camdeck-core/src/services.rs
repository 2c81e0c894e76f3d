//! Contracts for the AI model services the pipeline consumes.
//!
//! Model loading lives outside this crate. A service is handed to the
//! pipeline as an owned handle; until it reports [`ServiceStatus::Ready`]
//! callers simply skip the dependent work for that tick.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::ServiceError;

/// Lifecycle of a model service handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Created, not yet loading.
    #[default]
    Uninitialized,
    /// Model is being fetched or compiled.
    Loading,
    /// Accepting frames.
    Ready,
    /// Loading failed; the feature stays unavailable.
    Failed,
    /// Closed; native resources released.
    Destroyed,
}

/// Behaviour shared by every model service handle.
pub trait ModelService {
    /// Short service name for logs.
    fn name(&self) -> &'static str;

    /// Current lifecycle state.
    fn status(&self) -> ServiceStatus;

    /// Whether frames can be submitted now.
    fn is_ready(&self) -> bool {
        self.status() == ServiceStatus::Ready
    }

    /// Release native resources. Further calls must return
    /// [`ServiceError::Destroyed`].
    fn destroy(&mut self);
}

/// Shared home for the one live handle of a service.
///
/// A producer loop and its teardown each hold a clone. Releasing the slot
/// destroys the handle and leaves the slot empty, so a stopped loop never
/// leaves a closed service behind for the next start to pick up.
pub struct ServiceSlot<S> {
    inner: Rc<RefCell<Option<S>>>,
}

impl<S> Clone for ServiceSlot<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S> Default for ServiceSlot<S> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(None)),
        }
    }
}

impl<S: ModelService> fmt::Debug for ServiceSlot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSlot")
            .field("status", &self.status())
            .finish()
    }
}

impl<S: ModelService> ServiceSlot<S> {
    /// An empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `service` in the slot, destroying any handle it replaces.
    pub fn install(&self, service: S) {
        let previous = self.inner.borrow_mut().replace(service);
        if let Some(mut previous) = previous {
            tracing::debug!("Replacing {} handle", previous.name());
            previous.destroy();
        }
    }

    /// Status of the held handle; `None` when empty or busy.
    #[must_use]
    pub fn status(&self) -> Option<ServiceStatus> {
        self.inner
            .try_borrow()
            .ok()
            .and_then(|guard| guard.as_ref().map(ModelService::status))
    }

    /// Whether a handle is present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.status().is_some()
    }

    /// Whether the held handle accepts frames.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status() == Some(ServiceStatus::Ready)
    }

    /// Run `f` on the held handle. Returns `None` when the slot is empty or
    /// already borrowed.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        let mut guard = self.inner.try_borrow_mut().ok()?;
        guard.as_mut().map(f)
    }

    /// Run `f` only if the held handle is ready.
    pub fn with_ready<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        let mut guard = self.inner.try_borrow_mut().ok()?;
        guard.as_mut().filter(|s| s.is_ready()).map(f)
    }

    /// Take the handle out and destroy it. Returns `false` if the slot was
    /// empty.
    pub fn release(&self) -> bool {
        let taken = match self.inner.try_borrow_mut() {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                tracing::warn!("Service busy during release; it stays in its slot");
                return false;
            }
        };
        match taken {
            Some(mut service) => {
                tracing::debug!("Releasing {} handle", service.name());
                service.destroy();
                true
            }
            None => false,
        }
    }
}

/// Face bounding box in video pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Left edge.
    pub origin_x: f64,
    /// Top edge.
    pub origin_y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl BoundingBox {
    /// Create a bounding box.
    #[must_use]
    pub const fn new(origin_x: f64, origin_y: f64, width: f64, height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            width,
            height,
        }
    }

    /// Horizontal center.
    #[must_use]
    pub fn center_x(&self) -> f64 {
        self.origin_x + self.width / 2.0
    }

    /// Vertical center.
    #[must_use]
    pub fn center_y(&self) -> f64 {
        self.origin_y + self.height / 2.0
    }

    /// As a geometry rectangle.
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.origin_x, self.origin_y, self.width, self.height)
    }
}

/// One detected face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Face bounds in video pixels.
    pub bounding_box: BoundingBox,
    /// Detector confidence, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Detection {
    /// A detection with no score.
    #[must_use]
    pub const fn new(bounding_box: BoundingBox) -> Self {
        Self {
            bounding_box,
            score: None,
        }
    }
}

/// A face-mesh point in normalized (0-1) frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    /// Normalized X.
    pub x: f64,
    /// Normalized Y.
    pub y: f64,
    /// Relative depth.
    #[serde(default)]
    pub z: f64,
}

/// Face detector service.
pub trait FaceDetector<F>: ModelService {
    /// Detect faces in a frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is not ready or inference fails.
    fn detect(&mut self, frame: &F, timestamp_ms: f64) -> Result<Vec<Detection>, ServiceError>;
}

/// Person segmentation service.
pub trait Segmenter<F>: ModelService {
    /// Opaque stencil image produced per frame.
    type Mask;

    /// Produce a foreground mask for a frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is not ready or inference fails.
    fn segment(&mut self, frame: &F, timestamp_ms: f64) -> Result<Self::Mask, ServiceError>;
}

/// Face-mesh landmark service.
pub trait FaceMesh<F>: ModelService {
    /// Landmarks for at most one face, `None` when no face is visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is not ready or inference fails.
    fn landmarks(
        &mut self,
        frame: &F,
        timestamp_ms: f64,
    ) -> Result<Option<crate::FaceLandmarks>, ServiceError>;
}
