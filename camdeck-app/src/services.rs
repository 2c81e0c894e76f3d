//! Adapters for the AI model objects the page loads.
//!
//! Each adapter wraps an already-loaded JS object and calls it synchronously
//! once per tick:
//!
//! | service   | method                          | result                              |
//! |-----------|---------------------------------|-------------------------------------|
//! | detector  | `detectForVideo(video, ms)`     | `{ detections: [{ boundingBox }] }` |
//! | segmenter | `segmentForVideo(video, ms)`    | `ImageBitmap` or `null`             |
//! | face mesh | `detectForVideo(video, ms)`     | `{ faceLandmarks: [[{x, y, z}]] }`  |
//!
//! `close()` is called on destroy when the object has one.

use camdeck_core::{
    Detection, FaceDetector, FaceLandmarks, FaceMesh, Landmark, ModelService, Segmenter,
    ServiceError, ServiceStatus,
};
use serde::Deserialize;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlVideoElement, ImageBitmap};

use crate::js::{call_method, error_message, from_js, has_method};

/// A JS model object and its lifecycle state.
struct JsHandle {
    name: &'static str,
    object: JsValue,
    status: ServiceStatus,
}

impl JsHandle {
    fn new(name: &'static str, object: JsValue, method: &str) -> Self {
        let status = if has_method(&object, method) {
            ServiceStatus::Ready
        } else {
            tracing::warn!("{name} object has no '{method}' method");
            ServiceStatus::Failed
        };
        Self {
            name,
            object,
            status,
        }
    }

    fn call(&self, method: &str, video: &HtmlVideoElement, ts: f64) -> Result<JsValue, ServiceError> {
        match self.status {
            ServiceStatus::Ready => {}
            ServiceStatus::Destroyed => return Err(ServiceError::Destroyed(self.name)),
            _ => return Err(ServiceError::NotReady(self.name)),
        }
        let video: &JsValue = video;
        let ts = JsValue::from_f64(ts);
        call_method(&self.object, method, &[video, &ts])
            .map_err(|e| ServiceError::Inference(error_message(&e)))
    }

    fn destroy(&mut self) {
        if self.status == ServiceStatus::Destroyed {
            return;
        }
        if has_method(&self.object, "close") {
            if let Err(e) = call_method(&self.object, "close", &[]) {
                tracing::warn!("Closing {} failed: {}", self.name, error_message(&e));
            }
        }
        self.status = ServiceStatus::Destroyed;
        tracing::info!("{} destroyed", self.name);
    }
}

macro_rules! model_service {
    ($ty:ty) => {
        impl ModelService for $ty {
            fn name(&self) -> &'static str {
                self.handle.name
            }

            fn status(&self) -> ServiceStatus {
                self.handle.status
            }

            fn destroy(&mut self) {
                self.handle.destroy();
            }
        }
    };
}

#[derive(Debug, Default, Deserialize)]
struct DetectorResult {
    #[serde(default)]
    detections: Vec<Detection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeshResult {
    #[serde(default)]
    face_landmarks: Vec<Vec<Landmark>>,
}

/// Face detector backed by a JS object.
pub struct JsFaceDetector {
    handle: JsHandle,
}

impl JsFaceDetector {
    /// Wrap a loaded detector.
    #[must_use]
    pub fn new(object: JsValue) -> Self {
        Self {
            handle: JsHandle::new("face-detector", object, "detectForVideo"),
        }
    }
}

model_service!(JsFaceDetector);

impl FaceDetector<HtmlVideoElement> for JsFaceDetector {
    fn detect(&mut self, frame: &HtmlVideoElement, timestamp_ms: f64) -> Result<Vec<Detection>, ServiceError> {
        let raw = self.handle.call("detectForVideo", frame, timestamp_ms)?;
        let result: DetectorResult = from_js(&raw).map_err(ServiceError::Inference)?;
        Ok(result.detections)
    }
}

/// Person segmenter backed by a JS object.
pub struct JsSegmenter {
    handle: JsHandle,
}

impl JsSegmenter {
    /// Wrap a loaded segmenter.
    #[must_use]
    pub fn new(object: JsValue) -> Self {
        Self {
            handle: JsHandle::new("segmenter", object, "segmentForVideo"),
        }
    }
}

model_service!(JsSegmenter);

impl Segmenter<HtmlVideoElement> for JsSegmenter {
    type Mask = Option<ImageBitmap>;

    fn segment(&mut self, frame: &HtmlVideoElement, timestamp_ms: f64) -> Result<Self::Mask, ServiceError> {
        let raw = self.handle.call("segmentForVideo", frame, timestamp_ms)?;
        if raw.is_null() || raw.is_undefined() {
            return Ok(None);
        }
        raw.dyn_into::<ImageBitmap>()
            .map(Some)
            .map_err(|_| ServiceError::Inference("segmentForVideo did not return an ImageBitmap".to_string()))
    }
}

/// Face-mesh landmarker backed by a JS object.
pub struct JsFaceMesh {
    handle: JsHandle,
}

impl JsFaceMesh {
    /// Wrap a loaded landmarker.
    #[must_use]
    pub fn new(object: JsValue) -> Self {
        Self {
            handle: JsHandle::new("face-mesh", object, "detectForVideo"),
        }
    }
}

model_service!(JsFaceMesh);

impl FaceMesh<HtmlVideoElement> for JsFaceMesh {
    fn landmarks(
        &mut self,
        frame: &HtmlVideoElement,
        timestamp_ms: f64,
    ) -> Result<Option<FaceLandmarks>, ServiceError> {
        let raw = self.handle.call("detectForVideo", frame, timestamp_ms)?;
        let result: MeshResult = from_js(&raw).map_err(ServiceError::Inference)?;
        Ok(result
            .face_landmarks
            .into_iter()
            .next()
            .filter(|points| !points.is_empty())
            .map(FaceLandmarks::new))
    }
}
