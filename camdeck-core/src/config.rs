//! Tunable constants for tracking, rendering and loop cadence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Face-tracking controller constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Minimum video-time gap between detections (ms).
    pub detection_interval_ms: f64,
    /// Desired face height as a fraction of video height.
    pub target_face_ratio: f64,
    /// Zoom gain per pixel of height error, UI units.
    pub software_zoom_gain: f64,
    /// Zoom gain per pixel of height error, hardware units.
    pub hardware_zoom_gain: f64,
    /// Pan/tilt proportional gain.
    pub sensitivity: f64,
    /// One-pole smoothing factor applied per detection tick.
    pub smoothing_factor: f64,
    /// Software zoom range in UI units.
    pub zoom_range: (f64, f64),
    /// Pan range in degrees.
    pub pan_range: (f64, f64),
    /// Tilt range in degrees.
    pub tilt_range: (f64, f64),
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            detection_interval_ms: 100.0,
            target_face_ratio: 0.4,
            software_zoom_gain: 0.1,
            hardware_zoom_gain: 0.005,
            sensitivity: 0.4,
            smoothing_factor: 0.08,
            zoom_range: (100.0, 400.0),
            pan_range: (-180.0, 180.0),
            tilt_range: (-90.0, 90.0),
        }
    }
}

/// Render pipeline constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Blur radius for the background in portrait mode (px).
    pub portrait_background_blur_px: f64,
    /// Face-tracking overlay stroke colour.
    pub overlay_color: String,
    /// Face-tracking overlay stroke width (px).
    pub overlay_line_width: f64,
    /// Redraw the smoothed frame over itself to deepen the blur.
    pub intensify_smoothing: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            portrait_background_blur_px: 10.0,
            overlay_color: "#00ff88".to_string(),
            overlay_line_width: 2.0,
            intensify_smoothing: true,
        }
    }
}

/// Timer intervals for the AI producer loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// Segmentation mask refresh interval (ms).
    pub segmentation_interval_ms: f64,
    /// Face-mesh landmark refresh interval (ms).
    pub face_mesh_interval_ms: f64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            segmentation_interval_ms: 66.0,
            face_mesh_interval_ms: 100.0,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Tracking controller.
    pub tracking: TrackingConfig,
    /// Render pipeline.
    pub pipeline: PipelineConfig,
    /// Producer loop cadence.
    pub cadence: CadenceConfig,
}

impl StudioConfig {
    /// Parse and validate a JSON configuration. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check every constant is usable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> CoreResult<()> {
        let t = &self.tracking;
        let positive = [
            ("tracking.detection_interval_ms", t.detection_interval_ms),
            ("tracking.target_face_ratio", t.target_face_ratio),
            ("tracking.software_zoom_gain", t.software_zoom_gain),
            ("tracking.hardware_zoom_gain", t.hardware_zoom_gain),
            ("tracking.sensitivity", t.sensitivity),
            (
                "cadence.segmentation_interval_ms",
                self.cadence.segmentation_interval_ms,
            ),
            ("cadence.face_mesh_interval_ms", self.cadence.face_mesh_interval_ms),
            ("pipeline.overlay_line_width", self.pipeline.overlay_line_width),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(CoreError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        if !(t.smoothing_factor > 0.0 && t.smoothing_factor <= 1.0) {
            return Err(CoreError::InvalidConfig(format!(
                "tracking.smoothing_factor must be in (0, 1], got {}",
                t.smoothing_factor
            )));
        }
        if t.target_face_ratio >= 1.0 {
            return Err(CoreError::InvalidConfig(format!(
                "tracking.target_face_ratio must be below 1, got {}",
                t.target_face_ratio
            )));
        }
        if !self.pipeline.portrait_background_blur_px.is_finite()
            || self.pipeline.portrait_background_blur_px < 0.0
        {
            return Err(CoreError::InvalidConfig(
                "pipeline.portrait_background_blur_px must be non-negative".to_string(),
            ));
        }

        for (name, (min, max)) in [
            ("tracking.zoom_range", t.zoom_range),
            ("tracking.pan_range", t.pan_range),
            ("tracking.tilt_range", t.tilt_range),
        ] {
            if !(min.is_finite() && max.is_finite() && min <= max) {
                return Err(CoreError::InvalidConfig(format!(
                    "{name} must be an ordered finite range, got ({min}, {max})"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(StudioConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = StudioConfig::from_json_str(r#"{"tracking":{"smoothing_factor":0.2}}"#)
            .expect("valid config");
        assert!((config.tracking.smoothing_factor - 0.2).abs() < f64::EPSILON);
        assert!((config.tracking.target_face_ratio - 0.4).abs() < f64::EPSILON);
        assert!((config.cadence.face_mesh_interval_ms - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_bad_smoothing() {
        let err = StudioConfig::from_json_str(r#"{"tracking":{"smoothing_factor":1.5}}"#)
            .expect_err("should reject");
        assert!(err.to_string().contains("smoothing_factor"));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let err = StudioConfig::from_json_str(r#"{"tracking":{"pan_range":[10.0,-10.0]}}"#)
            .expect_err("should reject");
        assert!(err.to_string().contains("pan_range"));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("camdeck.json");
        std::fs::write(&path, r#"{"cadence":{"segmentation_interval_ms":33.0}}"#)
            .expect("write");
        let config = StudioConfig::from_path(&path).expect("load");
        assert!((config.cadence.segmentation_interval_ms - 33.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = StudioConfig::from_json_str("{ nope").expect_err("should reject");
        assert!(matches!(err, CoreError::Serialization(_)));
    }
}
