//! Hardware capability ranges and the control-to-constraint mapping.
//!
//! Devices report what they can do as a map keyed by hardware constraint
//! name. Names differ from [`Control`] names in a few places
//! (`whiteBalanceTemperature` is `colorTemperature` on the track), so the
//! mapping is an exhaustive match rather than a string lookup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::settings::Control;

/// A hardware constraint understood by the camera track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HardwareConstraint {
    /// `brightness`
    Brightness,
    /// `contrast`
    Contrast,
    /// `saturation`
    Saturation,
    /// `sharpness`
    Sharpness,
    /// `exposureCompensation`
    ExposureCompensation,
    /// `colorTemperature`
    ColorTemperature,
    /// `iso`
    Iso,
    /// `zoom` (hardware-native units, e.g. 1.0-4.0)
    Zoom,
    /// `pan`
    Pan,
    /// `tilt`
    Tilt,
    /// `exposureMode`
    ExposureMode,
    /// `whiteBalanceMode`
    WhiteBalanceMode,
    /// `focusMode`
    FocusMode,
}

impl HardwareConstraint {
    /// Every constraint the engine knows about.
    pub const ALL: [HardwareConstraint; 13] = [
        HardwareConstraint::Brightness,
        HardwareConstraint::Contrast,
        HardwareConstraint::Saturation,
        HardwareConstraint::Sharpness,
        HardwareConstraint::ExposureCompensation,
        HardwareConstraint::ColorTemperature,
        HardwareConstraint::Iso,
        HardwareConstraint::Zoom,
        HardwareConstraint::Pan,
        HardwareConstraint::Tilt,
        HardwareConstraint::ExposureMode,
        HardwareConstraint::WhiteBalanceMode,
        HardwareConstraint::FocusMode,
    ];

    /// Constraint name as used by the track API.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            HardwareConstraint::Brightness => "brightness",
            HardwareConstraint::Contrast => "contrast",
            HardwareConstraint::Saturation => "saturation",
            HardwareConstraint::Sharpness => "sharpness",
            HardwareConstraint::ExposureCompensation => "exposureCompensation",
            HardwareConstraint::ColorTemperature => "colorTemperature",
            HardwareConstraint::Iso => "iso",
            HardwareConstraint::Zoom => "zoom",
            HardwareConstraint::Pan => "pan",
            HardwareConstraint::Tilt => "tilt",
            HardwareConstraint::ExposureMode => "exposureMode",
            HardwareConstraint::WhiteBalanceMode => "whiteBalanceMode",
            HardwareConstraint::FocusMode => "focusMode",
        }
    }

    /// Parse a track API constraint name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// The hardware constraint backing a settings control, if any.
    ///
    /// Rotation, mirroring, blur, face smoothing, portrait lighting, filter,
    /// hue and gamma are always rendered in software.
    #[must_use]
    pub fn for_control(control: Control) -> Option<Self> {
        match control {
            Control::Brightness => Some(HardwareConstraint::Brightness),
            Control::Contrast => Some(HardwareConstraint::Contrast),
            Control::Saturation => Some(HardwareConstraint::Saturation),
            Control::Sharpness => Some(HardwareConstraint::Sharpness),
            Control::ExposureCompensation => Some(HardwareConstraint::ExposureCompensation),
            Control::WhiteBalanceTemperature => Some(HardwareConstraint::ColorTemperature),
            Control::Iso => Some(HardwareConstraint::Iso),
            Control::Zoom => Some(HardwareConstraint::Zoom),
            Control::Pan => Some(HardwareConstraint::Pan),
            Control::Tilt => Some(HardwareConstraint::Tilt),
            Control::ExposureMode => Some(HardwareConstraint::ExposureMode),
            Control::WhiteBalanceMode => Some(HardwareConstraint::WhiteBalanceMode),
            Control::FocusMode => Some(HardwareConstraint::FocusMode),
            Control::Hue
            | Control::Gamma
            | Control::Rotation
            | Control::Blur
            | Control::FaceSmoothing
            | Control::PortraitLighting
            | Control::Filter
            | Control::MirrorH
            | Control::MirrorV => None,
        }
    }
}

impl std::fmt::Display for HardwareConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Numeric range reported for a hardware control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRange {
    /// Smallest accepted value.
    pub min: f64,
    /// Largest accepted value.
    pub max: f64,
    /// Increment between accepted values, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl CapabilityRange {
    /// Create a range.
    #[must_use]
    pub fn new(min: f64, max: f64, step: Option<f64>) -> Self {
        Self { min, max, step }
    }

    /// Clamp a value into the range.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Whether `min <= max` and both are finite.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// A single capability entry: a numeric range or a list of allowed strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Capability {
    /// Numeric control.
    Range(CapabilityRange),
    /// Enumerated control.
    Options(Vec<String>),
}

/// Capabilities of one camera track.
///
/// A control with no entry has no known hardware support.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    entries: HashMap<HardwareConstraint, Capability>,
}

impl DeviceCapabilities {
    /// Create an empty capability set (software-only device).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a numeric range.
    #[must_use]
    pub fn with_range(mut self, constraint: HardwareConstraint, range: CapabilityRange) -> Self {
        self.entries.insert(constraint, Capability::Range(range));
        self
    }

    /// Add or replace an allowed-value list.
    #[must_use]
    pub fn with_options<I, S>(mut self, constraint: HardwareConstraint, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(
            constraint,
            Capability::Options(options.into_iter().map(Into::into).collect()),
        );
        self
    }

    /// Parse a track capability object.
    ///
    /// Keys that are not known hardware constraints (`width`, `deviceId`, ...)
    /// and entries that are neither a `{min, max}` range nor a string list are
    /// skipped.
    #[must_use]
    pub fn from_json_value(value: &serde_json::Value) -> Self {
        let mut caps = Self::new();
        let Some(object) = value.as_object() else {
            tracing::warn!("Capability payload is not an object; treating device as software-only");
            return caps;
        };

        for (key, entry) in object {
            let Some(constraint) = HardwareConstraint::from_name(key) else {
                tracing::trace!("Ignoring capability '{key}'");
                continue;
            };
            match serde_json::from_value::<Capability>(entry.clone()) {
                Ok(Capability::Range(range)) if !range.is_valid() => {
                    tracing::warn!("Ignoring invalid range for {constraint}: {range:?}");
                }
                Ok(capability) => {
                    caps.entries.insert(constraint, capability);
                }
                Err(e) => {
                    tracing::debug!("Ignoring capability '{key}' with unexpected shape: {e}");
                }
            }
        }

        caps
    }

    /// Look up the entry for a constraint.
    #[must_use]
    pub fn get(&self, constraint: HardwareConstraint) -> Option<&Capability> {
        self.entries.get(&constraint)
    }

    /// Numeric range for a constraint, if it is a range.
    #[must_use]
    pub fn range(&self, constraint: HardwareConstraint) -> Option<&CapabilityRange> {
        match self.entries.get(&constraint) {
            Some(Capability::Range(range)) => Some(range),
            _ => None,
        }
    }

    /// The hardware zoom range, if the device zooms optically or digitally.
    #[must_use]
    pub fn zoom_range(&self) -> Option<&CapabilityRange> {
        self.range(HardwareConstraint::Zoom)
    }

    /// Whether zoom is applied by the device rather than in software.
    #[must_use]
    pub fn is_hardware_zoom(&self) -> bool {
        self.zoom_range().is_some()
    }

    /// Number of known capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the device reports no known capabilities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_balance_maps_to_color_temperature() {
        assert_eq!(
            HardwareConstraint::for_control(Control::WhiteBalanceTemperature),
            Some(HardwareConstraint::ColorTemperature)
        );
        assert_eq!(HardwareConstraint::for_control(Control::Rotation), None);
        assert_eq!(HardwareConstraint::for_control(Control::Hue), None);
    }

    #[test]
    fn test_every_constraint_is_reachable_from_a_control() {
        for constraint in HardwareConstraint::ALL {
            assert!(
                Control::ALL
                    .iter()
                    .any(|c| HardwareConstraint::for_control(*c) == Some(constraint)),
                "{constraint} has no control"
            );
        }
    }

    #[test]
    fn test_name_roundtrip() {
        for constraint in HardwareConstraint::ALL {
            assert_eq!(HardwareConstraint::from_name(constraint.name()), Some(constraint));
        }
        assert_eq!(HardwareConstraint::from_name("width"), None);
    }

    #[test]
    fn test_from_json_value_filters_unknown_and_malformed() {
        let json = serde_json::json!({
            "width": {"min": 1, "max": 1920},
            "deviceId": "abc",
            "zoom": {"min": 1.0, "max": 4.0, "step": 0.1},
            "focusMode": ["continuous", "manual"],
            "brightness": "bogus",
            "contrast": {"min": 10.0, "max": 0.0}
        });
        let caps = DeviceCapabilities::from_json_value(&json);

        assert_eq!(caps.len(), 2);
        assert!(caps.is_hardware_zoom());
        let zoom = caps.zoom_range().expect("zoom range");
        assert_eq!(zoom.step, Some(0.1));
        assert_eq!(
            caps.get(HardwareConstraint::FocusMode),
            Some(&Capability::Options(vec![
                "continuous".to_string(),
                "manual".to_string()
            ]))
        );
        assert!(caps.get(HardwareConstraint::Brightness).is_none());
        assert!(caps.get(HardwareConstraint::Contrast).is_none());
    }

    #[test]
    fn test_non_object_payload_is_software_only() {
        let caps = DeviceCapabilities::from_json_value(&serde_json::json!([1, 2]));
        assert!(caps.is_empty());
        assert!(!caps.is_hardware_zoom());
    }

    #[test]
    fn test_range_clamp() {
        let range = CapabilityRange::new(1.0, 4.0, Some(0.1));
        assert!((range.clamp(5.0) - 4.0).abs() < f64::EPSILON);
        assert!((range.clamp(0.5) - 1.0).abs() < f64::EPSILON);
        assert!((range.clamp(2.5) - 2.5).abs() < f64::EPSILON);
    }
}
