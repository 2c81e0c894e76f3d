//! # Camdeck WASM Application
//!
//! Browser host for Camdeck: owns the settings store, the render pipeline
//! and the four cooperative loops, and adapts the page's camera track,
//! canvases and AI model objects to the core contracts.
//!
//! ## Usage
//!
//! Build for WASM:
//! ```bash
//! wasm-pack build --target web camdeck-app
//! ```
//!
//! Then drive it from JavaScript. Each tick method returns `false` once its
//! loop has been stopped, so the scheduler can drop it:
//! ```javascript
//! import init, { StudioApp } from './pkg/camdeck_app.js';
//!
//! await init();
//! const app = new StudioApp('video', 'display', 'overlay', deviceId);
//! app.setTrack(stream.getVideoTracks()[0]);
//! app.setSegmenter(segmenter);
//! app.start();
//!
//! function frame() {
//!     if (app.renderFrame()) requestAnimationFrame(frame);
//! }
//! requestAnimationFrame(frame);
//! const seg = setInterval(() => {
//!     if (!app.segmentationTick(performance.now())) clearInterval(seg);
//! }, 66);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod dom;
pub mod error;
pub mod js;
pub mod services;
pub mod track;

use std::rc::Rc;

use camdeck_core::{
    BlurMode, BoundingBox, Cadence, DeviceCapabilities, FaceLandmarks, FaceMesh,
    FaceTracker, HardwareTrack, LatestValue, LoopKind, LoopSet, ReconcileOutcome,
    Segmenter, ServiceSlot, SettingsPatch, SettingsReconciler, SettingsStore, StudioConfig, TrackingTick,
    VideoFrameInfo,
};
use camdeck_renderer::{BackgroundMode, FrameInputs, FrameOutcome, RenderPipeline};
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;
use web_sys::{Document, HtmlCanvasElement, HtmlImageElement, HtmlVideoElement, ImageBitmap, MediaStreamTrack};

pub use dom::DomBackend;
pub use error::AppError;
pub use services::{JsFaceDetector, JsFaceMesh, JsSegmenter};
pub use track::DomTrack;

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init_wasm() {
    console_error_panic_hook::set_once();
    tracing::info!("Camdeck WASM initialized");
}

fn element<T: JsCast>(document: &Document, id: &str, wrong: fn(String) -> AppError) -> Result<T, AppError> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| AppError::MissingElement(id.to_string()))?
        .dyn_into::<T>()
        .map_err(|_| wrong(id.to_string()))
}

/// Parse a lowercase mode keyword through its serde representation.
fn parse_mode<T: DeserializeOwned>(kind: &'static str, value: &str) -> Result<T, AppError> {
    let value = if value.is_empty() { "none" } else { value };
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|_| {
        AppError::UnknownMode {
            kind,
            value: value.to_string(),
        }
    })
}

/// The webcam studio.
#[wasm_bindgen]
pub struct StudioApp {
    config: StudioConfig,
    device_id: String,
    store: SettingsStore,
    reconciler: SettingsReconciler,
    backend: DomBackend,
    pipeline: RenderPipeline,
    tracker: FaceTracker,
    overlay: LatestValue<BoundingBox>,
    mask: LatestValue<ImageBitmap>,
    landmarks: LatestValue<FaceLandmarks>,
    detector: ServiceSlot<JsFaceDetector>,
    segmenter: ServiceSlot<JsSegmenter>,
    face_mesh: ServiceSlot<JsFaceMesh>,
    track: Option<Rc<DomTrack>>,
    capabilities: DeviceCapabilities,
    background: BackgroundMode,
    blur_mode: BlurMode,
    segmentation_cadence: Cadence,
    face_mesh_cadence: Cadence,
    loops: LoopSet,
}

#[wasm_bindgen]
impl StudioApp {
    /// Attach to the page's video, display canvas and overlay canvas.
    ///
    /// `config_json` optionally overrides the runtime constants.
    ///
    /// # Errors
    ///
    /// Returns an error if an element is missing or the configuration is invalid.
    #[wasm_bindgen(constructor)]
    pub fn new(
        video_id: &str,
        display_id: &str,
        overlay_id: &str,
        device_id: &str,
        config_json: Option<String>,
    ) -> Result<StudioApp, JsValue> {
        let config = match config_json {
            Some(json) => StudioConfig::from_json_str(&json).map_err(AppError::from)?,
            None => StudioConfig::default(),
        };

        let window = web_sys::window().ok_or(AppError::NoWindow)?;
        let document = window.document().ok_or(AppError::NoDocument)?;
        let video: HtmlVideoElement = element(&document, video_id, AppError::NotAVideo)?;
        let display: HtmlCanvasElement = element(&document, display_id, AppError::NotACanvas)?;
        let overlay: HtmlCanvasElement = element(&document, overlay_id, AppError::NotACanvas)?;
        let backend = DomBackend::new(&document, video, display, overlay)?;

        let store = SettingsStore::new();
        store.get_or_create(device_id);
        let tracker = FaceTracker::new(config.tracking.clone());
        let overlay = tracker.overlay();

        tracing::info!("Studio attached to device {device_id}");
        Ok(Self {
            segmentation_cadence: Cadence::new(config.cadence.segmentation_interval_ms),
            face_mesh_cadence: Cadence::new(config.cadence.face_mesh_interval_ms),
            pipeline: RenderPipeline::new(config.pipeline.clone()),
            config,
            device_id: device_id.to_string(),
            store,
            reconciler: SettingsReconciler::new(),
            backend,
            tracker,
            overlay,
            mask: LatestValue::new(),
            landmarks: LatestValue::new(),
            detector: ServiceSlot::new(),
            segmenter: ServiceSlot::new(),
            face_mesh: ServiceSlot::new(),
            track: None,
            capabilities: DeviceCapabilities::new(),
            background: BackgroundMode::None,
            blur_mode: BlurMode::None,
            loops: LoopSet::new(),
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start the render loop and every loop whose service is present.
    ///
    /// Loops that are already running keep running with their service.
    pub fn start(&mut self) {
        if !self.loops.is_running(LoopKind::Render) {
            self.loops.start(LoopKind::Render);
        }
        self.start_segmentation_loop();
        self.start_face_mesh_loop();
        if self.tracker.is_tracking() {
            self.start_tracking_loop();
        }
    }

    /// Stop every loop and release the AI services.
    pub fn stop(&mut self) {
        self.loops.stop_all();
    }

    /// Names of the live loops, as a JSON array.
    #[wasm_bindgen(js_name = runningLoops)]
    #[must_use]
    pub fn running_loops(&self) -> String {
        let names: Vec<&str> = self.loops.running().into_iter().map(LoopKind::as_str).collect();
        serde_json::to_string(&names).unwrap_or_default()
    }

    /// Use a camera track for hardware controls and reconcile against it.
    #[wasm_bindgen(js_name = setTrack)]
    pub fn set_track(&mut self, track: MediaStreamTrack) {
        let track = Rc::new(DomTrack::new(track));
        self.capabilities = track.capabilities();
        tracing::info!(
            "Track reports {} capabilities (hardware zoom: {})",
            self.capabilities.len(),
            self.capabilities.is_hardware_zoom()
        );
        self.track = Some(track);
        self.spawn_reconcile();
    }

    /// Capabilities of the current track, as JSON.
    #[wasm_bindgen(js_name = getCapabilities)]
    #[must_use]
    pub fn get_capabilities(&self) -> String {
        serde_json::to_string(&self.capabilities).unwrap_or_default()
    }

    /// Whether zoom is realized by the device rather than in software.
    #[wasm_bindgen(js_name = isHardwareZoom)]
    #[must_use]
    pub fn is_hardware_zoom(&self) -> bool {
        self.capabilities.is_hardware_zoom()
    }

    // ------------------------------------------------------------------
    // Services
    // ------------------------------------------------------------------

    /// Install a loaded face detector.
    #[wasm_bindgen(js_name = setFaceDetector)]
    pub fn set_face_detector(&mut self, detector: JsValue) {
        self.loops.stop(LoopKind::FaceTracking);
        self.detector.install(JsFaceDetector::new(detector));
        if self.tracker.is_tracking() {
            self.start_tracking_loop();
        }
    }

    /// Install a loaded segmenter and start its loop.
    #[wasm_bindgen(js_name = setSegmenter)]
    pub fn set_segmenter(&mut self, segmenter: JsValue) {
        self.loops.stop(LoopKind::Segmentation);
        self.segmenter.install(JsSegmenter::new(segmenter));
        self.start_segmentation_loop();
    }

    /// Install a loaded face-mesh landmarker and start its loop.
    #[wasm_bindgen(js_name = setFaceMesh)]
    pub fn set_face_mesh(&mut self, face_mesh: JsValue) {
        self.loops.stop(LoopKind::FaceMesh);
        self.face_mesh.install(JsFaceMesh::new(face_mesh));
        self.start_face_mesh_loop();
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Current settings as flat JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    #[wasm_bindgen(js_name = exportSettings)]
    pub fn export_settings(&self) -> Result<String, JsValue> {
        Ok(self
            .store
            .export_json(&self.device_id)
            .map_err(AppError::from)?)
    }

    /// Merge a settings JSON object. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    #[wasm_bindgen(js_name = importSettings)]
    pub fn import_settings(&mut self, json: &str) -> Result<bool, JsValue> {
        let changed = self
            .store
            .import_json(&self.device_id, json)
            .map_err(AppError::from)?;
        if changed {
            self.spawn_reconcile();
        }
        Ok(changed)
    }

    /// Merge a partial settings object (any subset of keys).
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    #[wasm_bindgen(js_name = updateSettings)]
    pub fn update_settings(&mut self, patch_json: &str) -> Result<bool, JsValue> {
        let patch: SettingsPatch = serde_json::from_str(patch_json).map_err(AppError::from)?;
        let changed = self.store.update(&self.device_id, &patch);
        if changed {
            self.spawn_reconcile();
        }
        Ok(changed)
    }

    /// Restore default settings.
    #[wasm_bindgen(js_name = resetSettings)]
    pub fn reset_settings(&mut self) {
        self.store.reset(&self.device_id);
        self.spawn_reconcile();
    }

    /// Run one reconciliation pass against the track.
    ///
    /// Resolves to the report as JSON, or `"skipped"` when no track is set
    /// or a pass is already running.
    pub fn reconcile(&self) -> js_sys::Promise {
        let Some(track) = self.track.clone() else {
            return js_sys::Promise::resolve(&JsValue::from_str("skipped"));
        };
        let store = self.store.clone();
        let reconciler = self.reconciler.clone();
        let device_id = self.device_id.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            match reconciler.reconcile(&store, &device_id, &*track).await {
                ReconcileOutcome::Skipped => Ok(JsValue::from_str("skipped")),
                ReconcileOutcome::Completed(report) => serde_json::to_string(&report)
                    .map(|json| JsValue::from_str(&json))
                    .map_err(|e| JsValue::from(AppError::from(e))),
            }
        })
    }

    // ------------------------------------------------------------------
    // Effects and tracking
    // ------------------------------------------------------------------

    /// Select the background replacement: `none` or `image`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown mode.
    #[wasm_bindgen(js_name = setBackgroundMode)]
    pub fn set_background_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        self.background = parse_mode("background mode", mode)?;
        Ok(())
    }

    /// Select the blur mode: `none`, `portrait` or `full`.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown mode.
    #[wasm_bindgen(js_name = setBlurMode)]
    pub fn set_blur_mode(&mut self, mode: &str) -> Result<(), JsValue> {
        self.blur_mode = parse_mode("blur mode", mode)?;
        Ok(())
    }

    /// Set or remove the uploaded background image.
    #[wasm_bindgen(js_name = setBackgroundImage)]
    pub fn set_background_image(&mut self, image: Option<HtmlImageElement>) {
        self.backend.set_background_image(image);
    }

    /// Turn face tracking on or off.
    #[wasm_bindgen(js_name = setTracking)]
    pub fn set_tracking(&mut self, enabled: bool) {
        self.tracker.set_enabled(enabled);
        if enabled {
            self.start_tracking_loop();
        } else {
            self.loops.stop(LoopKind::FaceTracking);
        }
    }

    /// `idle` or `tracking`.
    #[wasm_bindgen(js_name = trackingState)]
    #[must_use]
    pub fn tracking_state(&self) -> String {
        if self.tracker.is_tracking() {
            "tracking".to_string()
        } else {
            "idle".to_string()
        }
    }

    // ------------------------------------------------------------------
    // Loop ticks
    // ------------------------------------------------------------------

    /// Render one frame. Returns `false` once the render loop is stopped.
    #[wasm_bindgen(js_name = renderFrame)]
    pub fn render_frame(&mut self) -> bool {
        if !self.loops.is_running(LoopKind::Render) {
            return false;
        }

        // One snapshot of every shared input for the whole frame.
        let settings = self.store.get_or_create(&self.device_id);
        let mask = self.mask.snapshot();
        let landmarks = self.landmarks.snapshot();
        let overlay = self.overlay.snapshot();
        let inputs = FrameInputs {
            settings: &settings,
            mask: mask.as_deref(),
            landmarks: landmarks.as_deref(),
            overlay_box: overlay.as_deref(),
            tracking_active: self.tracker.is_tracking(),
            is_hardware_zoom: self.capabilities.is_hardware_zoom(),
            background: self.background,
            blur_mode: self.blur_mode,
        };

        if let FrameOutcome::Skipped(reason) = self.pipeline.render(&mut self.backend, &inputs) {
            tracing::trace!(?reason, "Frame skipped");
        }
        true
    }

    /// Refresh the segmentation mask if due. Returns `false` once stopped.
    #[wasm_bindgen(js_name = segmentationTick)]
    pub fn segmentation_tick(&mut self, now_ms: f64) -> bool {
        if !self.loops.is_running(LoopKind::Segmentation) {
            return false;
        }
        let wanted = self.background == BackgroundMode::Image || self.blur_mode == BlurMode::Portrait;
        if !wanted || !self.video_ready() || !self.segmentation_cadence.ready(now_ms) {
            return true;
        }
        let video = self.backend.video();
        match self.segmenter.with_ready(|s| s.segment(video, now_ms)) {
            Some(Ok(Some(mask))) => {
                self.mask.publish(mask);
            }
            Some(Ok(None)) => tracing::trace!("Segmenter produced no mask"),
            Some(Err(e)) => tracing::warn!("Segmentation failed: {e}"),
            None => {}
        }
        true
    }

    /// Refresh face landmarks if due. Returns `false` once stopped.
    #[wasm_bindgen(js_name = faceMeshTick)]
    pub fn face_mesh_tick(&mut self, now_ms: f64) -> bool {
        if !self.loops.is_running(LoopKind::FaceMesh) {
            return false;
        }
        let settings = self.store.get_or_create(&self.device_id);
        let wanted = settings.face_smoothing > 0.0 || settings.portrait_lighting > 0.0;
        if !wanted || !self.video_ready() || !self.face_mesh_cadence.ready(now_ms) {
            return true;
        }
        let video = self.backend.video();
        match self.face_mesh.with_ready(|m| m.landmarks(video, now_ms)) {
            Some(Ok(Some(landmarks))) => {
                self.landmarks.publish(landmarks);
            }
            Some(Ok(None)) => self.landmarks.clear(),
            Some(Err(e)) => tracing::warn!("Face mesh failed: {e}"),
            None => {}
        }
        true
    }

    /// Run one face-tracking step on the current video time. Returns
    /// `false` once stopped.
    #[wasm_bindgen(js_name = trackingTick)]
    pub fn tracking_tick(&mut self) -> bool {
        if !self.loops.is_running(LoopKind::FaceTracking) {
            return false;
        }
        let video = self.backend.video();
        let info = VideoFrameInfo {
            width: f64::from(video.video_width()),
            height: f64::from(video.video_height()),
            timestamp_ms: video.current_time() * 1000.0,
        };
        let current = self.store.get_or_create(&self.device_id);

        let tracker = &mut self.tracker;
        let zoom_range = self.capabilities.zoom_range();
        let Some(tick) = self
            .detector
            .with(|detector| tracker.tick(detector, video, info, &current, zoom_range))
        else {
            return true;
        };

        // Pan and tilt reach the device even when zoom stays in software.
        if let TrackingTick::Adjusted { adjustment, .. } = tick {
            if self.store.update(&self.device_id, &adjustment.to_patch()) {
                self.spawn_reconcile();
            }
        }
        true
    }

    /// Frames rendered.
    #[wasm_bindgen(js_name = frameCount)]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.pipeline.frames()
    }

    /// Frames abandoned after a failure.
    #[wasm_bindgen(js_name = failedFrames)]
    #[must_use]
    pub fn failed_frames(&self) -> u64 {
        self.pipeline.failures()
    }
}

impl StudioApp {
    fn video_ready(&self) -> bool {
        let video = self.backend.video();
        video.video_width() > 0 && video.video_height() > 0
    }

    // A stopped loop releases its service, so restarting one needs a new
    // handle from the page.

    fn start_segmentation_loop(&mut self) {
        if self.loops.is_running(LoopKind::Segmentation) {
            return;
        }
        if !self.segmenter.is_present() {
            tracing::debug!("No segmenter; call setSegmenter to start segmentation");
            return;
        }
        let slot = self.segmenter.clone();
        let mask = self.mask.clone();
        self.segmentation_cadence.reset();
        self.loops.ensure_with_teardown(LoopKind::Segmentation, move || {
            slot.release();
            mask.clear();
        });
    }

    fn start_face_mesh_loop(&mut self) {
        if self.loops.is_running(LoopKind::FaceMesh) {
            return;
        }
        if !self.face_mesh.is_present() {
            tracing::debug!("No face mesh; call setFaceMesh to start landmarks");
            return;
        }
        let slot = self.face_mesh.clone();
        let landmarks = self.landmarks.clone();
        self.face_mesh_cadence.reset();
        self.loops.ensure_with_teardown(LoopKind::FaceMesh, move || {
            slot.release();
            landmarks.clear();
        });
    }

    fn start_tracking_loop(&mut self) {
        if self.loops.is_running(LoopKind::FaceTracking) {
            return;
        }
        if !self.detector.is_ready() {
            tracing::info!("Face tracking enabled; waiting for a face detector (setFaceDetector)");
        }
        let slot = self.detector.clone();
        let overlay = self.overlay.clone();
        self.loops.ensure_with_teardown(LoopKind::FaceTracking, move || {
            slot.release();
            overlay.clear();
        });
    }

    /// Fire-and-forget reconciliation; overlapping passes are skipped.
    fn spawn_reconcile(&self) {
        let Some(track) = self.track.clone() else {
            return;
        };
        let store = self.store.clone();
        let reconciler = self.reconciler.clone();
        let device_id = self.device_id.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let ReconcileOutcome::Completed(report) =
                reconciler.reconcile(&store, &device_id, &*track).await
            {
                tracing::debug!(
                    "Reconciled {device_id}: {} applied, {} rejected, {} unsupported",
                    report.applied.len(),
                    report.rejected.len(),
                    report.unsupported.len()
                );
            }
        });
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &StudioConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blur_modes() {
        assert_eq!(parse_mode::<BlurMode>("blur mode", "portrait").expect("mode"), BlurMode::Portrait);
        assert_eq!(parse_mode::<BlurMode>("blur mode", "full").expect("mode"), BlurMode::Full);
        assert_eq!(parse_mode::<BlurMode>("blur mode", "").expect("mode"), BlurMode::None);
    }

    #[test]
    fn test_parse_background_modes() {
        assert_eq!(
            parse_mode::<BackgroundMode>("background mode", "image").expect("mode"),
            BackgroundMode::Image
        );
        let err = parse_mode::<BackgroundMode>("background mode", "ai").expect_err("rejected");
        assert_eq!(err.to_string(), "Unknown background mode: 'ai'");
    }
}
