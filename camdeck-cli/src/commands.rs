//! Command implementations.
//!
//! Each command returns a JSON value; `main` prints it.

use std::path::Path;

use anyhow::{bail, Context};
use camdeck_core::{
    build_filter, build_filter_with_smoothing, draw_dimensions, landmarks, BlurMode, BoundingBox,
    CameraSettings, Detection, DeviceCapabilities, FaceDetector, FaceLandmarks, FaceRegion,
    FaceTracker, HardwareConstraint, Landmark, ModelService, ReconcileOutcome, ServiceError,
    ServiceStatus, SettingsReconciler, SettingsStore, SimulatedTrack, StoreError, StudioConfig,
    TrackingTick, TransformParams, VideoFrameInfo,
};
use camdeck_renderer::{
    needs_transform, BackgroundMode, FrameInputs, MaskId, RecordingBackend, RenderPipeline,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::FrameArgs;

/// Load the runtime configuration, falling back to defaults.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is invalid.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<StudioConfig> {
    match path {
        Some(path) => StudioConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(StudioConfig::default()),
    }
}

/// Open the settings store, file-backed when a data directory is given.
///
/// # Errors
///
/// Returns an error if the data directory cannot be used or the device's
/// saved settings are unreadable.
pub fn open_store(data_dir: Option<&Path>, device: &str) -> anyhow::Result<SettingsStore> {
    let Some(dir) = data_dir else {
        return Ok(SettingsStore::new());
    };
    let store = SettingsStore::with_data_dir(dir)
        .with_context(|| format!("Failed to open data dir {}", dir.display()))?;
    match store.load_device_from_disk(device) {
        Ok(_) => tracing::info!("Loaded saved settings for {device}"),
        Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No saved settings for {device}");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(store)
}

/// Merge a settings file into the device's settings and return the result.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a settings object.
pub fn merge_settings_file(
    store: &SettingsStore,
    device: &str,
    path: Option<&Path>,
) -> anyhow::Result<CameraSettings> {
    store.get_or_create(device);
    if let Some(path) = path {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        store.import_json(device, &json)?;
    }
    Ok(store.get_or_create(device))
}

fn read_capabilities(path: &Path) -> anyhow::Result<DeviceCapabilities> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read capabilities {}", path.display()))?;
    let value: Value = serde_json::from_str(&json)?;
    Ok(DeviceCapabilities::from_json_value(&value))
}

// ============================================================================
// layout
// ============================================================================

/// Draw dimensions, filter strings and whether the display needs a
/// transform pass.
///
/// # Errors
///
/// Returns an error if a dimension is not positive.
pub fn layout(settings: &CameraSettings, frame: FrameArgs, blur: BlurMode) -> anyhow::Result<Value> {
    let dims = draw_dimensions(
        frame.video_width,
        frame.video_height,
        frame.canvas_width,
        frame.canvas_height,
    )?;
    let params = TransformParams::from(settings);
    Ok(json!({
        "dims": dims,
        "filter": build_filter(settings, blur),
        "smoothingFilter": build_filter_with_smoothing(settings, blur),
        "transform": params,
        "transformed": needs_transform(&params, false),
    }))
}

// ============================================================================
// track
// ============================================================================

/// Detector that returns prerecorded detections, indexed by frame.
pub struct ReplayDetector {
    frames: Vec<Vec<Detection>>,
    status: ServiceStatus,
}

impl ReplayDetector {
    /// Wrap recorded frames.
    #[must_use]
    pub fn new(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames,
            status: ServiceStatus::Ready,
        }
    }
}

impl ModelService for ReplayDetector {
    fn name(&self) -> &'static str {
        "replay-detector"
    }

    fn status(&self) -> ServiceStatus {
        self.status
    }

    fn destroy(&mut self) {
        self.status = ServiceStatus::Destroyed;
    }
}

impl FaceDetector<usize> for ReplayDetector {
    fn detect(&mut self, frame: &usize, _timestamp_ms: f64) -> Result<Vec<Detection>, ServiceError> {
        if self.status == ServiceStatus::Destroyed {
            return Err(ServiceError::Destroyed(self.name()));
        }
        if self.frames.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.frames[frame % self.frames.len()].clone())
    }
}

/// Options for a tracking replay.
#[derive(Debug, Clone, Copy)]
pub struct TrackOptions {
    /// Ticks to run.
    pub ticks: usize,
    /// Media time between ticks.
    pub frame_interval_ms: f64,
    /// Video width in pixels.
    pub video_width: f64,
    /// Video height in pixels.
    pub video_height: f64,
}

/// Replay detections through the tracker, merging each adjustment into the
/// store the way the app does.
///
/// When the device reports capabilities, every adjustment that changes the
/// settings is reconciled against a simulated track, as the app does with
/// the real one.
///
/// # Errors
///
/// Returns an error if the runtime for reconciliation cannot start.
#[allow(clippy::cast_precision_loss)]
pub fn track(
    config: &StudioConfig,
    store: &SettingsStore,
    device: &str,
    detector: &mut ReplayDetector,
    capabilities: &DeviceCapabilities,
    options: TrackOptions,
) -> anyhow::Result<Value> {
    let mut tracker = FaceTracker::new(config.tracking.clone());
    tracker.set_enabled(true);

    let hardware = (!capabilities.is_empty()).then(|| SimulatedTrack::new(capabilities.clone()));
    let runtime = hardware.as_ref().map(|_| runtime()).transpose()?;
    let reconciler = SettingsReconciler::new();
    let mut reconciled = 0usize;

    let mut adjustments = Vec::new();
    let mut no_face = 0usize;
    let mut throttled = 0usize;
    let mut failed = 0usize;
    let mut last_face: Option<BoundingBox> = None;

    for tick in 0..options.ticks {
        let info = VideoFrameInfo {
            width: options.video_width,
            height: options.video_height,
            timestamp_ms: tick as f64 * options.frame_interval_ms,
        };
        let current = store.get_or_create(device);
        match tracker.tick(detector, &tick, info, &current, capabilities.zoom_range()) {
            TrackingTick::Adjusted { face, adjustment } => {
                let changed = store.update(device, &adjustment.to_patch());
                if let (true, Some(track), Some(runtime)) = (changed, &hardware, &runtime) {
                    if let ReconcileOutcome::Completed(_) =
                        runtime.block_on(reconciler.reconcile(store, device, track))
                    {
                        reconciled += 1;
                    }
                }
                last_face = Some(face);
                adjustments.push(json!({
                    "tick": tick,
                    "timestampMs": info.timestamp_ms,
                    "face": face,
                    "adjustment": adjustment,
                }));
            }
            TrackingTick::NoFace => no_face += 1,
            TrackingTick::Throttled => throttled += 1,
            TrackingTick::DetectorFailed | TrackingTick::DetectorUnavailable => failed += 1,
            TrackingTick::Idle | TrackingTick::NoVideo => {}
        }
    }

    let settings = store.get_or_create(device);
    tracing::info!(
        "Replayed {} ticks: {} adjustments, {no_face} without a face",
        options.ticks,
        adjustments.len()
    );
    Ok(json!({
        "ticks": options.ticks,
        "hardwareZoom": capabilities.is_hardware_zoom(),
        "throttled": throttled,
        "noFace": no_face,
        "failed": failed,
        "adjustments": adjustments,
        "reconciled": reconciled,
        "applied": hardware.as_ref().map(SimulatedTrack::applied).unwrap_or_default(),
        "overlay": tracker.overlay().snapshot().map(|b| *b),
        "lastFace": last_face,
        "final": { "pan": settings.pan, "tilt": settings.tilt, "zoom": settings.zoom },
    }))
}

/// Read a detections file: an array of frames, each an array of detections.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_detections(path: &Path) -> anyhow::Result<Vec<Vec<Detection>>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read detections {}", path.display()))?;
    serde_json::from_str(&json).context("Detections must be an array of detection arrays")
}

/// Run the `track` command from files.
///
/// # Errors
///
/// Returns an error if an input file is unreadable.
pub fn track_files(
    config: &StudioConfig,
    store: &SettingsStore,
    device: &str,
    detections: &Path,
    capabilities: Option<&Path>,
    ticks: Option<usize>,
    options: TrackOptions,
) -> anyhow::Result<Value> {
    let frames = read_detections(detections)?;
    let capabilities = match capabilities {
        Some(path) => read_capabilities(path)?,
        None => DeviceCapabilities::new(),
    };
    let options = TrackOptions {
        ticks: ticks.unwrap_or(frames.len()),
        ..options
    };
    let mut detector = ReplayDetector::new(frames);
    track(config, store, device, &mut detector, &capabilities, options)
}

// ============================================================================
// reconcile
// ============================================================================

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")
}

/// Reconcile the device's settings against a simulated track.
///
/// # Errors
///
/// Returns an error if a pass is already running or the runtime fails.
pub fn reconcile(
    store: &SettingsStore,
    device: &str,
    capabilities: DeviceCapabilities,
    reject: &[HardwareConstraint],
) -> anyhow::Result<Value> {
    let track = reject
        .iter()
        .fold(SimulatedTrack::new(capabilities), |t, c| t.rejecting(*c));
    let reconciler = SettingsReconciler::new();
    let outcome = runtime()?.block_on(reconciler.reconcile(store, device, &track));

    let ReconcileOutcome::Completed(report) = outcome else {
        bail!("Reconciliation already in flight");
    };
    Ok(json!({
        "report": report,
        "applied": track.applied(),
        "settings": store.get_or_create(device),
    }))
}

/// Run the `reconcile` command from files.
///
/// # Errors
///
/// Returns an error if an input file is unreadable.
pub fn reconcile_files(
    store: &SettingsStore,
    device: &str,
    settings: &Path,
    capabilities: &Path,
    reject: &[HardwareConstraint],
) -> anyhow::Result<Value> {
    merge_settings_file(store, device, Some(settings))?;
    let capabilities = read_capabilities(capabilities)?;
    reconcile(store, device, capabilities, reject)
}

// ============================================================================
// plan
// ============================================================================

/// Inputs for a planned frame beyond the settings.
#[derive(Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct PlanOptions {
    /// Blur mode.
    pub blur: BlurMode,
    /// Background mode.
    pub background: BackgroundMode,
    /// A background image has been uploaded.
    pub with_image: bool,
    /// A segmentation mask is available.
    pub mask: bool,
    /// Face tracking is on.
    pub tracking: bool,
    /// Tracked face.
    pub face: Option<BoundingBox>,
    /// Face-mesh landmarks for smoothing and portrait lighting.
    pub landmarks: Option<FaceLandmarks>,
    /// Zoom is realized by the device.
    pub hardware_zoom: bool,
}

/// A landmarks file: a bare point array or a face-mesh result.
#[derive(Deserialize)]
#[serde(untagged)]
enum LandmarksFile {
    Points(Vec<Landmark>),
    #[serde(rename_all = "camelCase")]
    Mesh { face_landmarks: Vec<Vec<Landmark>> },
}

/// Read face-mesh landmarks: either an array of `{x, y, z}` points or a
/// landmarker result `{ "faceLandmarks": [[...]] }`, of which the first
/// face is used.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or holds no points.
pub fn read_landmarks(path: &Path) -> anyhow::Result<FaceLandmarks> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read landmarks {}", path.display()))?;
    let file: LandmarksFile = serde_json::from_str(&json)
        .context("Landmarks must be a point array or a faceLandmarks result")?;
    let points = match file {
        LandmarksFile::Points(points) => points,
        LandmarksFile::Mesh { face_landmarks } => face_landmarks.into_iter().next().unwrap_or_default(),
    };
    if points.is_empty() {
        bail!("No landmarks in {}", path.display());
    }
    let mesh = FaceLandmarks::new(points);
    let needed = FaceRegion::ALL
        .iter()
        .flat_map(|r| r.indices().iter().copied())
        .chain([landmarks::NOSE_TIP, landmarks::FACE_EDGE_LEFT, landmarks::FACE_EDGE_RIGHT])
        .max()
        .map_or(0, |i| i + 1);
    if mesh.len() < needed {
        tracing::warn!(
            "{} holds {} points; face regions need {needed}, so face effects will be skipped",
            path.display(),
            mesh.len()
        );
    }
    Ok(mesh)
}

/// Render one frame into a recording backend and return its operations.
#[must_use]
pub fn plan(
    config: &StudioConfig,
    settings: &CameraSettings,
    frame: FrameArgs,
    options: &PlanOptions,
) -> Value {
    let mut backend = RecordingBackend::new(
        frame.video_width,
        frame.video_height,
        frame.canvas_width,
        frame.canvas_height,
    )
    .with_background_image(options.with_image);
    let mut pipeline = RenderPipeline::new(config.pipeline.clone());

    let mask = MaskId(1);
    let inputs = FrameInputs {
        mask: options.mask.then_some(&mask),
        landmarks: options.landmarks.as_ref(),
        overlay_box: options.face.as_ref(),
        tracking_active: options.tracking,
        is_hardware_zoom: options.hardware_zoom,
        background: options.background,
        blur_mode: options.blur,
        ..FrameInputs::new(settings)
    };
    let outcome = pipeline.render(&mut backend, &inputs);
    json!({
        "outcome": outcome,
        "ops": backend.ops(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camdeck_core::CapabilityRange;

    fn frame(vw: f64, vh: f64, cw: f64, ch: f64) -> FrameArgs {
        FrameArgs {
            video_width: vw,
            video_height: vh,
            canvas_width: cw,
            canvas_height: ch,
        }
    }

    #[test]
    fn test_layout_letterboxes() {
        let value = layout(&CameraSettings::default(), frame(1280.0, 720.0, 1920.0, 900.0), BlurMode::None)
            .expect("layout");
        assert_eq!(value["dims"]["offsetX"], json!(160.0));
        assert_eq!(value["filter"], json!("none"));
        assert_eq!(value["transformed"], json!(false));
    }

    #[test]
    fn test_layout_rejects_zero_canvas() {
        assert!(layout(&CameraSettings::default(), frame(1280.0, 720.0, 0.0, 720.0), BlurMode::None).is_err());
    }

    #[test]
    fn test_layout_full_blur_filter() {
        let value = layout(&CameraSettings::default(), frame(640.0, 480.0, 640.0, 480.0), BlurMode::Full)
            .expect("layout");
        assert_eq!(value["filter"], json!("blur(12px)"));
    }

    #[test]
    fn test_replay_detector_cycles_frames() {
        let face = Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        let mut detector = ReplayDetector::new(vec![vec![face], vec![]]);
        assert_eq!(detector.detect(&0, 0.0).expect("detect").len(), 1);
        assert!(detector.detect(&1, 0.0).expect("detect").is_empty());
        assert_eq!(detector.detect(&2, 0.0).expect("detect").len(), 1);
        detector.destroy();
        assert!(detector.detect(&0, 0.0).is_err());
    }

    #[test]
    fn test_track_moves_toward_offset_face() {
        let store = SettingsStore::new();
        let face = Detection::new(BoundingBox::new(900.0, 100.0, 200.0, 200.0));
        let mut detector = ReplayDetector::new(vec![vec![face]]);
        let options = TrackOptions {
            ticks: 60,
            frame_interval_ms: 100.0,
            video_width: 1280.0,
            video_height: 720.0,
        };
        let value = track(
            &StudioConfig::default(),
            &store,
            "cam",
            &mut detector,
            &DeviceCapabilities::new(),
            options,
        )
        .expect("track");
        assert!(!value["adjustments"].as_array().expect("array").is_empty());
        let settings = store.get_or_create("cam");
        assert!(settings.pan < 0.0, "pan follows a face right of center");
        assert!(settings.tilt < 0.0, "tilt follows a face above center");
        assert_eq!(value["hardwareZoom"], json!(false));
    }

    #[test]
    fn test_track_without_faces_keeps_framing() {
        let store = SettingsStore::new();
        let mut detector = ReplayDetector::new(vec![vec![]]);
        let options = TrackOptions {
            ticks: 10,
            frame_interval_ms: 100.0,
            video_width: 1280.0,
            video_height: 720.0,
        };
        let value = track(
            &StudioConfig::default(),
            &store,
            "cam",
            &mut detector,
            &DeviceCapabilities::new(),
            options,
        )
        .expect("track");
        assert_eq!(value["noFace"], json!(10));
        assert_eq!(store.get_or_create("cam"), CameraSettings::default());
    }

    #[test]
    fn test_track_reconciles_pan_tilt_without_hardware_zoom() {
        let store = SettingsStore::new();
        let face = Detection::new(BoundingBox::new(900.0, 100.0, 200.0, 200.0));
        let mut detector = ReplayDetector::new(vec![vec![face]]);
        let caps = DeviceCapabilities::new()
            .with_range(HardwareConstraint::Pan, CapabilityRange::new(-180.0, 180.0, None))
            .with_range(HardwareConstraint::Tilt, CapabilityRange::new(-90.0, 90.0, None));
        assert!(!caps.is_hardware_zoom());

        let value = track(
            &StudioConfig::default(),
            &store,
            "cam",
            &mut detector,
            &caps,
            TrackOptions {
                ticks: 30,
                frame_interval_ms: 100.0,
                video_width: 1280.0,
                video_height: 720.0,
            },
        )
        .expect("track");

        let adjustments = value["adjustments"].as_array().expect("array").len();
        let reconciled = value["reconciled"].as_u64().expect("count");
        assert!(reconciled > 0);
        assert!(reconciled <= u64::try_from(adjustments).expect("count"));
        let applied = value["applied"].as_array().expect("array");
        assert!(applied.iter().any(|a| a[0] == json!("pan")));
        assert!(applied.iter().any(|a| a[0] == json!("tilt")));
    }

    #[test]
    fn test_reconcile_clamps_zoom() {
        let store = SettingsStore::new();
        store.get_or_create("cam");
        store.import_json("cam", r#"{"zoom": 1000}"#).expect("import");
        let caps = DeviceCapabilities::new()
            .with_range(HardwareConstraint::Zoom, CapabilityRange::new(1.0, 4.0, Some(0.1)));
        let value = reconcile(&store, "cam", caps, &[]).expect("reconcile");
        assert!(!value["applied"].as_array().expect("array").is_empty());
        assert!(store.get_or_create("cam").zoom <= 400.0);
    }

    #[test]
    fn test_reconcile_reports_rejection() {
        let store = SettingsStore::new();
        store.get_or_create("cam");
        let caps = DeviceCapabilities::new()
            .with_range(HardwareConstraint::Brightness, CapabilityRange::new(0.0, 255.0, Some(1.0)));
        let value = reconcile(&store, "cam", caps, &[HardwareConstraint::Brightness]).expect("reconcile");
        let rejected = value["report"]["rejected"].as_array().expect("array");
        assert_eq!(rejected.len(), 1);
    }

    #[test]
    fn test_plan_records_ops() {
        let value = plan(
            &StudioConfig::default(),
            &CameraSettings::default(),
            frame(1280.0, 720.0, 1280.0, 720.0),
            &PlanOptions::default(),
        );
        assert_eq!(value["outcome"]["outcome"], json!("rendered"));
        assert!(!value["ops"].as_array().expect("array").is_empty());
    }

    #[test]
    fn test_plan_overlay_needs_tracking() {
        let options = PlanOptions {
            tracking: true,
            face: Some(BoundingBox::new(100.0, 100.0, 200.0, 200.0)),
            ..PlanOptions::default()
        };
        let value = plan(
            &StudioConfig::default(),
            &CameraSettings::default(),
            frame(1280.0, 720.0, 1280.0, 720.0),
            &options,
        );
        let ops = value["ops"].as_array().expect("array");
        assert!(ops.iter().any(|op| op["op"] == json!("strokeRect")));
    }

    fn mesh() -> FaceLandmarks {
        let points = (0..468)
            .map(|i| {
                let f = f64::from(i) / 467.0;
                Landmark {
                    x: 0.3 + f * 0.4,
                    y: 0.25 + f * 0.5,
                    z: 0.0,
                }
            })
            .collect();
        FaceLandmarks::new(points)
    }

    fn op_names(value: &Value) -> Vec<String> {
        value["ops"]
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|op| op["op"].as_str().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_plan_with_landmarks_smooths_and_lights() {
        let settings = CameraSettings {
            face_smoothing: 30.0,
            portrait_lighting: 50.0,
            ..CameraSettings::default()
        };
        let options = PlanOptions {
            landmarks: Some(mesh()),
            ..PlanOptions::default()
        };
        let value = plan(
            &StudioConfig::default(),
            &settings,
            frame(1280.0, 720.0, 1280.0, 720.0),
            &options,
        );
        let names = op_names(&value);
        assert_eq!(names.iter().filter(|n| *n == "clip").count(), 3);
        assert!(names.iter().any(|n| n == "gradient"));
    }

    #[test]
    fn test_plan_without_landmarks_skips_face_effects() {
        let settings = CameraSettings {
            face_smoothing: 30.0,
            portrait_lighting: 50.0,
            ..CameraSettings::default()
        };
        let value = plan(
            &StudioConfig::default(),
            &settings,
            frame(1280.0, 720.0, 1280.0, 720.0),
            &PlanOptions::default(),
        );
        let names = op_names(&value);
        assert!(!names.iter().any(|n| n == "clip" || n == "gradient"));
    }
}
