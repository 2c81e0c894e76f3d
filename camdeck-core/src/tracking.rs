//! Face-guided auto-framing.
//!
//! While tracking, detection runs at most once per
//! [`TrackingConfig::detection_interval_ms`] of *video* time. Each detection
//! tick picks the widest face, computes proportional pan/tilt/zoom targets
//! from its position and size, and moves a fraction
//! ([`TrackingConfig::smoothing_factor`]) of the way towards them.
//!
//! The result is merged into the settings store like any user change, so it
//! also flows through reconciliation on the next pass.

use serde::{Deserialize, Serialize};

use crate::{
    BoundingBox, CameraSettings, CapabilityRange, Cadence, Detection, FaceDetector,
    LatestValue, ServiceError, SettingsPatch, TrackingConfig,
};

/// Tracker state, toggled by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingState {
    /// Disabled; overlay cleared.
    #[default]
    Idle,
    /// Detecting and reframing.
    Tracking,
}

/// New framing values for one detection tick, in settings units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceTrackingAdjustment {
    /// Pan in degrees.
    pub pan: f64,
    /// Tilt in degrees.
    pub tilt: f64,
    /// Zoom in UI units.
    pub zoom: f64,
}

impl FaceTrackingAdjustment {
    /// As a settings merge.
    #[must_use]
    pub fn to_patch(&self) -> SettingsPatch {
        SettingsPatch {
            pan: Some(self.pan),
            tilt: Some(self.tilt),
            zoom: Some(self.zoom),
            ..SettingsPatch::default()
        }
    }
}

/// Intrinsic size and current media time of the video being tracked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFrameInfo {
    /// Intrinsic width in pixels.
    pub width: f64,
    /// Intrinsic height in pixels.
    pub height: f64,
    /// Media time in milliseconds.
    pub timestamp_ms: f64,
}

/// What a tracking tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackingTick {
    /// Tracking is off.
    Idle,
    /// Less than one detection interval of video time has passed.
    Throttled,
    /// Zero-sized video; nothing to detect on.
    NoVideo,
    /// The detector is loading, failed or destroyed.
    DetectorUnavailable,
    /// Inference failed this tick.
    DetectorFailed,
    /// No face in frame; overlay cleared.
    NoFace,
    /// A face was found and framing moved.
    Adjusted {
        /// Face that drove the adjustment (video pixels).
        face: BoundingBox,
        /// New framing values.
        adjustment: FaceTrackingAdjustment,
    },
}

/// The widest detection; the first one wins ties.
#[must_use]
pub fn select_largest_face(detections: &[Detection]) -> Option<&Detection> {
    detections.iter().fold(None, |best: Option<&Detection>, d| match best {
        Some(b) if b.bounding_box.width >= d.bounding_box.width => Some(b),
        _ => Some(d),
    })
}

/// One-pole exponential smoother.
#[must_use]
pub fn smooth(current: f64, target: f64, factor: f64) -> f64 {
    current + (target - current) * factor
}

/// Unsmoothed controller targets for a face.
///
/// `hardware_zoom` is the device zoom range when zoom is applied by the
/// camera; the zoom target is then computed in hardware-native units and
/// clamped to that range before converting back to UI units.
#[must_use]
pub fn target_adjustment(
    config: &TrackingConfig,
    face: &BoundingBox,
    video_width: f64,
    video_height: f64,
    current: &CameraSettings,
    hardware_zoom: Option<&CapabilityRange>,
) -> FaceTrackingAdjustment {
    let height_error = config.target_face_ratio * video_height - face.height;
    let zoom = match hardware_zoom {
        Some(range) => {
            let native = current.zoom / 100.0 + height_error * config.hardware_zoom_gain;
            range.clamp(native) * 100.0
        }
        None => (current.zoom + height_error * config.software_zoom_gain)
            .clamp(config.zoom_range.0, config.zoom_range.1),
    };

    let error_x = face.center_x() - video_width / 2.0;
    let pan = (current.pan - (error_x / video_width) * 180.0 * config.sensitivity)
        .clamp(config.pan_range.0, config.pan_range.1);

    let error_y = face.center_y() - video_height / 2.0;
    let tilt = (current.tilt + (error_y / video_height) * 90.0 * config.sensitivity)
        .clamp(config.tilt_range.0, config.tilt_range.1);

    FaceTrackingAdjustment { pan, tilt, zoom }
}

/// Smoothed framing values for a face: one controller step.
#[must_use]
pub fn compute_adjustment(
    config: &TrackingConfig,
    face: &BoundingBox,
    video_width: f64,
    video_height: f64,
    current: &CameraSettings,
    hardware_zoom: Option<&CapabilityRange>,
) -> FaceTrackingAdjustment {
    let target = target_adjustment(config, face, video_width, video_height, current, hardware_zoom);
    let k = config.smoothing_factor;
    FaceTrackingAdjustment {
        pan: smooth(current.pan, target.pan, k),
        tilt: smooth(current.tilt, target.tilt, k),
        zoom: smooth(current.zoom, target.zoom, k),
    }
}

/// The face-tracking control loop.
#[derive(Debug)]
pub struct FaceTracker {
    config: TrackingConfig,
    state: TrackingState,
    cadence: Cadence,
    overlay: LatestValue<BoundingBox>,
}

impl FaceTracker {
    /// Create an idle tracker.
    #[must_use]
    pub fn new(config: TrackingConfig) -> Self {
        let cadence = Cadence::new(config.detection_interval_ms);
        Self {
            config,
            state: TrackingState::Idle,
            cadence,
            overlay: LatestValue::new(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TrackingState {
        self.state
    }

    /// Whether tracking is enabled.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.state == TrackingState::Tracking
    }

    /// Controller constants.
    #[must_use]
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Cell holding the face box to outline (video pixels). Empty when no
    /// face is tracked.
    #[must_use]
    pub fn overlay(&self) -> LatestValue<BoundingBox> {
        self.overlay.clone()
    }

    /// Switch tracking on or off. Turning it off clears the overlay.
    pub fn set_enabled(&mut self, enabled: bool) {
        let next = if enabled {
            TrackingState::Tracking
        } else {
            TrackingState::Idle
        };
        if next == self.state {
            return;
        }
        tracing::info!("Face tracking {}", if enabled { "enabled" } else { "disabled" });
        self.state = next;
        self.cadence.reset();
        if !enabled {
            self.overlay.clear();
        }
    }

    /// Run one tracking tick on the current video frame.
    ///
    /// Returns the adjustment to merge into the settings store, if any. The
    /// caller owns the store write.
    pub fn tick<F, D>(
        &mut self,
        detector: &mut D,
        frame: &F,
        video: VideoFrameInfo,
        current: &CameraSettings,
        hardware_zoom: Option<&CapabilityRange>,
    ) -> TrackingTick
    where
        D: FaceDetector<F> + ?Sized,
    {
        if self.state == TrackingState::Idle {
            return TrackingTick::Idle;
        }
        if video.width <= 0.0 || video.height <= 0.0 {
            return TrackingTick::NoVideo;
        }
        if !detector.is_ready() {
            tracing::trace!("Face detector {} not ready", detector.name());
            return TrackingTick::DetectorUnavailable;
        }
        if !self.cadence.ready(video.timestamp_ms) {
            return TrackingTick::Throttled;
        }

        let detections = match detector.detect(frame, video.timestamp_ms) {
            Ok(d) => d,
            Err(ServiceError::NotReady(_) | ServiceError::Destroyed(_)) => {
                return TrackingTick::DetectorUnavailable;
            }
            Err(e) => {
                tracing::warn!("Face detection failed: {e}");
                return TrackingTick::DetectorFailed;
            }
        };

        let Some(face) = select_largest_face(&detections).map(|d| d.bounding_box) else {
            tracing::trace!("No face at {:.0}ms", video.timestamp_ms);
            self.overlay.clear();
            return TrackingTick::NoFace;
        };

        self.overlay.publish(face);
        let adjustment = compute_adjustment(
            &self.config,
            &face,
            video.width,
            video.height,
            current,
            hardware_zoom,
        );
        tracing::debug!(
            "Tracking face at ({:.0}, {:.0}) -> pan {:.2} tilt {:.2} zoom {:.1}",
            face.center_x(),
            face.center_y(),
            adjustment.pan,
            adjustment.tilt,
            adjustment.zoom
        );
        TrackingTick::Adjusted { face, adjustment }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ModelService, ServiceStatus};

    struct ScriptedDetector {
        status: ServiceStatus,
        faces: Vec<Detection>,
        calls: usize,
        fail: bool,
    }

    impl ScriptedDetector {
        fn ready(faces: Vec<Detection>) -> Self {
            Self {
                status: ServiceStatus::Ready,
                faces,
                calls: 0,
                fail: false,
            }
        }
    }

    impl ModelService for ScriptedDetector {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn status(&self) -> ServiceStatus {
            self.status
        }

        fn destroy(&mut self) {
            self.status = ServiceStatus::Destroyed;
        }
    }

    impl FaceDetector<()> for ScriptedDetector {
        fn detect(&mut self, _frame: &(), _ts: f64) -> Result<Vec<Detection>, ServiceError> {
            self.calls += 1;
            if self.fail {
                return Err(ServiceError::Inference("boom".into()));
            }
            Ok(self.faces.clone())
        }
    }

    fn face(x: f64, y: f64, w: f64, h: f64) -> Detection {
        Detection::new(BoundingBox::new(x, y, w, h))
    }

    fn video(ts: f64) -> VideoFrameInfo {
        VideoFrameInfo {
            width: 1280.0,
            height: 720.0,
            timestamp_ms: ts,
        }
    }

    #[test]
    fn test_largest_by_width_not_area() {
        let faces = [face(0.0, 0.0, 100.0, 400.0), face(0.0, 0.0, 150.0, 150.0)];
        let best = select_largest_face(&faces).expect("face");
        assert!((best.bounding_box.width - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_width_tie_keeps_first() {
        let faces = [face(10.0, 0.0, 100.0, 100.0), face(20.0, 0.0, 100.0, 100.0)];
        let best = select_largest_face(&faces).expect("face");
        assert!((best.bounding_box.origin_x - 10.0).abs() < f64::EPSILON);
        assert!(select_largest_face(&[]).is_none());
    }

    #[test]
    fn test_centered_face_at_target_size_holds_still() {
        let config = TrackingConfig::default();
        // 0.4 * 720 = 288 tall, centered.
        let b = BoundingBox::new(640.0 - 144.0, 360.0 - 144.0, 288.0, 288.0);
        let current = CameraSettings {
            zoom: 150.0,
            ..CameraSettings::default()
        };
        let adj = compute_adjustment(&config, &b, 1280.0, 720.0, &current, None);
        assert!((adj.pan).abs() < 1e-12);
        assert!((adj.tilt).abs() < 1e-12);
        assert!((adj.zoom - 150.0).abs() < 1e-12);
    }

    #[test]
    fn test_software_zoom_target() {
        let config = TrackingConfig::default();
        // Face 188 tall: error 100px -> +10 zoom units target.
        let b = BoundingBox::new(640.0 - 94.0, 360.0 - 94.0, 188.0, 188.0);
        let current = CameraSettings::default();
        let target = target_adjustment(&config, &b, 1280.0, 720.0, &current, None);
        assert!((target.zoom - 110.0).abs() < 1e-9);
        let adj = compute_adjustment(&config, &b, 1280.0, 720.0, &current, None);
        assert!((adj.zoom - 100.8).abs() < 1e-9);
    }

    #[test]
    fn test_software_zoom_clamped_low() {
        let config = TrackingConfig::default();
        let b = BoundingBox::new(0.0, 0.0, 700.0, 700.0);
        let target =
            target_adjustment(&config, &b, 1280.0, 720.0, &CameraSettings::default(), None);
        assert!((target.zoom - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hardware_zoom_target_uses_native_units() {
        let config = TrackingConfig::default();
        let range = CapabilityRange::new(1.0, 4.0, Some(0.1));
        // Error 100px * 0.005 = +0.5 native -> 2.0 + 0.5 = 2.5 -> 250 UI.
        let b = BoundingBox::new(640.0 - 94.0, 360.0 - 94.0, 188.0, 188.0);
        let current = CameraSettings {
            zoom: 200.0,
            ..CameraSettings::default()
        };
        let target = target_adjustment(&config, &b, 1280.0, 720.0, &current, Some(&range));
        assert!((target.zoom - 250.0).abs() < 1e-9);

        let narrow = CapabilityRange::new(1.0, 2.2, None);
        let target = target_adjustment(&config, &b, 1280.0, 720.0, &current, Some(&narrow));
        assert!((target.zoom - 220.0).abs() < 1e-9);
    }

    #[test]
    fn test_face_right_of_center_pans_negative() {
        let config = TrackingConfig::default();
        // Center at x=960: error 320 / 1280 = 0.25 -> 0.25 * 180 * 0.4 = 18.
        let b = BoundingBox::new(960.0 - 144.0, 360.0 - 144.0, 288.0, 288.0);
        let target =
            target_adjustment(&config, &b, 1280.0, 720.0, &CameraSettings::default(), None);
        assert!((target.pan + 18.0).abs() < 1e-9);
        assert!(target.tilt.abs() < 1e-12);
    }

    #[test]
    fn test_face_below_center_tilts_positive() {
        let config = TrackingConfig::default();
        // Center at y=540: error 180 / 720 = 0.25 -> 0.25 * 90 * 0.4 = 9.
        let b = BoundingBox::new(640.0 - 144.0, 540.0 - 144.0, 288.0, 288.0);
        let target =
            target_adjustment(&config, &b, 1280.0, 720.0, &CameraSettings::default(), None);
        assert!((target.tilt - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_idle_tracker_does_not_detect() {
        let mut tracker = FaceTracker::new(TrackingConfig::default());
        let mut det = ScriptedDetector::ready(vec![face(0.0, 0.0, 10.0, 10.0)]);
        let tick = tracker.tick(&mut det, &(), video(0.0), &CameraSettings::default(), None);
        assert_eq!(tick, TrackingTick::Idle);
        assert_eq!(det.calls, 0);
    }

    #[test]
    fn test_throttle_uses_video_time() {
        let mut tracker = FaceTracker::new(TrackingConfig::default());
        tracker.set_enabled(true);
        let mut det = ScriptedDetector::ready(vec![face(600.0, 300.0, 100.0, 100.0)]);
        let s = CameraSettings::default();

        assert!(matches!(
            tracker.tick(&mut det, &(), video(0.0), &s, None),
            TrackingTick::Adjusted { .. }
        ));
        assert_eq!(
            tracker.tick(&mut det, &(), video(50.0), &s, None),
            TrackingTick::Throttled
        );
        assert!(matches!(
            tracker.tick(&mut det, &(), video(100.0), &s, None),
            TrackingTick::Adjusted { .. }
        ));
        assert_eq!(det.calls, 2);
    }

    #[test]
    fn test_no_face_clears_overlay() {
        let mut tracker = FaceTracker::new(TrackingConfig::default());
        tracker.set_enabled(true);
        let overlay = tracker.overlay();
        let mut det = ScriptedDetector::ready(vec![face(600.0, 300.0, 100.0, 100.0)]);
        let s = CameraSettings::default();

        tracker.tick(&mut det, &(), video(0.0), &s, None);
        assert!(overlay.snapshot().is_some());

        det.faces.clear();
        assert_eq!(
            tracker.tick(&mut det, &(), video(100.0), &s, None),
            TrackingTick::NoFace
        );
        assert!(overlay.snapshot().is_none());
    }

    #[test]
    fn test_disable_clears_overlay() {
        let mut tracker = FaceTracker::new(TrackingConfig::default());
        tracker.set_enabled(true);
        let overlay = tracker.overlay();
        let mut det = ScriptedDetector::ready(vec![face(600.0, 300.0, 100.0, 100.0)]);
        tracker.tick(&mut det, &(), video(0.0), &CameraSettings::default(), None);
        tracker.set_enabled(false);
        assert!(overlay.is_empty());
        assert_eq!(tracker.state(), TrackingState::Idle);
    }

    #[test]
    fn test_not_ready_detector_is_skipped() {
        let mut tracker = FaceTracker::new(TrackingConfig::default());
        tracker.set_enabled(true);
        let mut det = ScriptedDetector::ready(vec![]);
        det.status = ServiceStatus::Loading;
        assert_eq!(
            tracker.tick(&mut det, &(), video(0.0), &CameraSettings::default(), None),
            TrackingTick::DetectorUnavailable
        );
        // The skipped tick did not consume the cadence slot.
        det.status = ServiceStatus::Ready;
        assert_eq!(
            tracker.tick(&mut det, &(), video(10.0), &CameraSettings::default(), None),
            TrackingTick::NoFace
        );
    }

    #[test]
    fn test_inference_failure_is_non_fatal() {
        let mut tracker = FaceTracker::new(TrackingConfig::default());
        tracker.set_enabled(true);
        let mut det = ScriptedDetector::ready(vec![]);
        det.fail = true;
        assert_eq!(
            tracker.tick(&mut det, &(), video(0.0), &CameraSettings::default(), None),
            TrackingTick::DetectorFailed
        );
    }

    #[test]
    fn test_adjustment_patch_fields() {
        let patch = FaceTrackingAdjustment {
            pan: 1.0,
            tilt: 2.0,
            zoom: 150.0,
        }
        .to_patch();
        assert_eq!(patch.len(), 3);
        assert_eq!(patch.zoom, Some(150.0));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn smoother_never_overshoots(
                start in -180.0f64..180.0,
                target in -180.0f64..180.0,
                ticks in 1usize..200,
            ) {
                let mut v = start;
                let mut prev_gap = (target - v).abs();
                for _ in 0..ticks {
                    v = smooth(v, target, 0.08);
                    let gap = (target - v).abs();
                    prop_assert!(gap <= prev_gap + 1e-12);
                    prop_assert!((v - start).abs() <= (target - start).abs() + 1e-9);
                    prev_gap = gap;
                }
            }

            #[test]
            fn smoother_converges_geometrically(
                start in -180.0f64..180.0,
                target in -180.0f64..180.0,
            ) {
                let mut v = start;
                for _ in 0..600 {
                    v = smooth(v, target, 0.08);
                }
                prop_assert!((v - target).abs() < 1e-9);
            }

            #[test]
            fn adjustments_stay_in_range(
                x in 0.0f64..1200.0,
                y in 0.0f64..650.0,
                w in 10.0f64..600.0,
                pan in -180.0f64..180.0,
                tilt in -90.0f64..90.0,
                zoom in 100.0f64..400.0,
            ) {
                let config = TrackingConfig::default();
                let current = CameraSettings { pan, tilt, zoom, ..CameraSettings::default() };
                let adj = compute_adjustment(
                    &config,
                    &BoundingBox::new(x, y, w, w),
                    1280.0,
                    720.0,
                    &current,
                    None,
                );
                prop_assert!((-180.0..=180.0).contains(&adj.pan));
                prop_assert!((-90.0..=90.0).contains(&adj.tilt));
                prop_assert!((100.0..=400.0).contains(&adj.zoom));
            }
        }
    }
}
