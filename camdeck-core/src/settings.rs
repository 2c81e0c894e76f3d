//! Per-camera settings model.
//!
//! [`CameraSettings`] is the flat, serializable record of every control a
//! camera exposes to the user. Zoom is always stored in UI units (100-400),
//! independent of whether the device zooms in hardware.

use serde::{Deserialize, Serialize};

/// Named colour filter preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// No preset.
    #[default]
    None,
    /// Full desaturation.
    Grayscale,
    /// Full sepia tone.
    Sepia,
    /// Full colour inversion.
    Invert,
    /// High contrast, high saturation.
    Posterize,
    /// Cyan tint.
    Aqua,
    /// Inverted high-contrast monochrome.
    Blackboard,
    /// Bright high-contrast monochrome.
    Whiteboard,
}

impl FilterKind {
    /// Every preset, in menu order.
    pub const ALL: [FilterKind; 8] = [
        FilterKind::None,
        FilterKind::Grayscale,
        FilterKind::Sepia,
        FilterKind::Invert,
        FilterKind::Posterize,
        FilterKind::Aqua,
        FilterKind::Blackboard,
        FilterKind::Whiteboard,
    ];

    /// Identifier used in settings files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::None => "none",
            FilterKind::Grayscale => "grayscale",
            FilterKind::Sepia => "sepia",
            FilterKind::Invert => "invert",
            FilterKind::Posterize => "posterize",
            FilterKind::Aqua => "aqua",
            FilterKind::Blackboard => "blackboard",
            FilterKind::Whiteboard => "whiteboard",
        }
    }
}

/// Exposure control mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExposureMode {
    /// Automatic, continuously adjusted.
    #[default]
    Continuous,
    /// Fixed by the user.
    Manual,
    /// Not controllable.
    None,
}

impl ExposureMode {
    /// Hardware constraint value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExposureMode::Continuous => "continuous",
            ExposureMode::Manual => "manual",
            ExposureMode::None => "none",
        }
    }
}

/// White balance control mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhiteBalanceMode {
    /// Automatic, continuously adjusted.
    #[default]
    Continuous,
    /// Fixed colour temperature.
    Manual,
    /// Not controllable.
    None,
}

impl WhiteBalanceMode {
    /// Hardware constraint value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WhiteBalanceMode::Continuous => "continuous",
            WhiteBalanceMode::Manual => "manual",
            WhiteBalanceMode::None => "none",
        }
    }
}

/// Focus control mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusMode {
    /// Continuous autofocus.
    #[default]
    Continuous,
    /// Manual focus distance.
    Manual,
    /// Focus once, then hold.
    SingleShot,
}

impl FocusMode {
    /// Hardware constraint value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FocusMode::Continuous => "continuous",
            FocusMode::Manual => "manual",
            FocusMode::SingleShot => "single-shot",
        }
    }
}

/// Every user-adjustable control in [`CameraSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Control {
    /// Image brightness.
    Brightness,
    /// Image contrast.
    Contrast,
    /// Colour saturation.
    Saturation,
    /// Edge sharpness.
    Sharpness,
    /// Hue rotation in degrees.
    Hue,
    /// Gamma correction.
    Gamma,
    /// Exposure compensation.
    ExposureCompensation,
    /// White balance colour temperature (Kelvin).
    WhiteBalanceTemperature,
    /// Sensor ISO.
    Iso,
    /// Zoom in UI units (100-400).
    Zoom,
    /// Horizontal framing offset in degrees.
    Pan,
    /// Vertical framing offset in degrees.
    Tilt,
    /// Quarter-turn rotation in degrees.
    Rotation,
    /// Whole-frame blur radius in pixels.
    Blur,
    /// Skin smoothing strength.
    FaceSmoothing,
    /// Portrait lighting strength.
    PortraitLighting,
    /// Exposure mode.
    ExposureMode,
    /// White balance mode.
    WhiteBalanceMode,
    /// Focus mode.
    FocusMode,
    /// Colour filter preset.
    Filter,
    /// Horizontal mirror.
    MirrorH,
    /// Vertical mirror.
    MirrorV,
}

impl Control {
    /// Every control, in settings-file order.
    pub const ALL: [Control; 22] = [
        Control::Brightness,
        Control::Contrast,
        Control::Saturation,
        Control::Sharpness,
        Control::Hue,
        Control::Gamma,
        Control::ExposureCompensation,
        Control::WhiteBalanceTemperature,
        Control::Iso,
        Control::Zoom,
        Control::Pan,
        Control::Tilt,
        Control::Rotation,
        Control::Blur,
        Control::FaceSmoothing,
        Control::PortraitLighting,
        Control::ExposureMode,
        Control::WhiteBalanceMode,
        Control::FocusMode,
        Control::Filter,
        Control::MirrorH,
        Control::MirrorV,
    ];

    /// Key used for this control in settings files.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Control::Brightness => "brightness",
            Control::Contrast => "contrast",
            Control::Saturation => "saturation",
            Control::Sharpness => "sharpness",
            Control::Hue => "hue",
            Control::Gamma => "gamma",
            Control::ExposureCompensation => "exposureCompensation",
            Control::WhiteBalanceTemperature => "whiteBalanceTemperature",
            Control::Iso => "iso",
            Control::Zoom => "zoom",
            Control::Pan => "pan",
            Control::Tilt => "tilt",
            Control::Rotation => "rotation",
            Control::Blur => "blur",
            Control::FaceSmoothing => "faceSmoothing",
            Control::PortraitLighting => "portraitLighting",
            Control::ExposureMode => "exposureMode",
            Control::WhiteBalanceMode => "whiteBalanceMode",
            Control::FocusMode => "focusMode",
            Control::Filter => "filter",
            Control::MirrorH => "mirrorH",
            Control::MirrorV => "mirrorV",
        }
    }

    /// Range enforced in software regardless of hardware support.
    ///
    /// Controls whose range is defined only by the device return `None`.
    #[must_use]
    pub fn software_range(self) -> Option<(f64, f64)> {
        match self {
            Control::Hue | Control::Pan => Some((-180.0, 180.0)),
            Control::Zoom => Some((100.0, 400.0)),
            Control::Tilt => Some((-90.0, 90.0)),
            Control::Blur => Some((0.0, 20.0)),
            Control::FaceSmoothing | Control::PortraitLighting => Some((0.0, 100.0)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The value of a single control, typed by kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    /// Numeric slider value.
    Number(f64),
    /// Enumerated mode, as its constraint string.
    Text(&'static str),
    /// On/off toggle.
    Flag(bool),
}

/// Settings for one camera device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraSettings {
    /// Image brightness.
    pub brightness: f64,
    /// Image contrast.
    pub contrast: f64,
    /// Colour saturation.
    pub saturation: f64,
    /// Edge sharpness.
    pub sharpness: f64,
    /// Hue rotation in degrees.
    pub hue: f64,
    /// Gamma correction.
    pub gamma: f64,
    /// Exposure compensation.
    pub exposure_compensation: f64,
    /// White balance colour temperature (Kelvin).
    pub white_balance_temperature: f64,
    /// Sensor ISO.
    pub iso: f64,
    /// Zoom in UI units (100-400).
    pub zoom: f64,
    /// Horizontal framing offset in degrees (-180..180).
    pub pan: f64,
    /// Vertical framing offset in degrees (-90..90).
    pub tilt: f64,
    /// Rotation in degrees (0, 90, 180 or 270).
    pub rotation: u16,
    /// Whole-frame blur radius in pixels (0-20).
    pub blur: f64,
    /// Skin smoothing strength (0-100).
    pub face_smoothing: f64,
    /// Portrait lighting strength (0-100).
    pub portrait_lighting: f64,
    /// Exposure mode.
    pub exposure_mode: ExposureMode,
    /// White balance mode.
    pub white_balance_mode: WhiteBalanceMode,
    /// Focus mode.
    pub focus_mode: FocusMode,
    /// Colour filter preset.
    pub filter: FilterKind,
    /// Horizontal mirror.
    pub mirror_h: bool,
    /// Vertical mirror.
    pub mirror_v: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            brightness: 128.0,
            contrast: 128.0,
            saturation: 128.0,
            sharpness: 128.0,
            hue: 0.0,
            gamma: 100.0,
            exposure_compensation: 0.0,
            white_balance_temperature: 4500.0,
            iso: 100.0,
            zoom: 100.0,
            pan: 0.0,
            tilt: 0.0,
            rotation: 0,
            blur: 0.0,
            face_smoothing: 0.0,
            portrait_lighting: 0.0,
            exposure_mode: ExposureMode::Continuous,
            white_balance_mode: WhiteBalanceMode::Continuous,
            focus_mode: FocusMode::Continuous,
            filter: FilterKind::None,
            mirror_h: false,
            mirror_v: false,
        }
    }
}

impl CameraSettings {
    /// Read a control's current value.
    #[must_use]
    pub fn value(&self, control: Control) -> ControlValue {
        match control {
            Control::Brightness => ControlValue::Number(self.brightness),
            Control::Contrast => ControlValue::Number(self.contrast),
            Control::Saturation => ControlValue::Number(self.saturation),
            Control::Sharpness => ControlValue::Number(self.sharpness),
            Control::Hue => ControlValue::Number(self.hue),
            Control::Gamma => ControlValue::Number(self.gamma),
            Control::ExposureCompensation => ControlValue::Number(self.exposure_compensation),
            Control::WhiteBalanceTemperature => {
                ControlValue::Number(self.white_balance_temperature)
            }
            Control::Iso => ControlValue::Number(self.iso),
            Control::Zoom => ControlValue::Number(self.zoom),
            Control::Pan => ControlValue::Number(self.pan),
            Control::Tilt => ControlValue::Number(self.tilt),
            Control::Rotation => ControlValue::Number(f64::from(self.rotation)),
            Control::Blur => ControlValue::Number(self.blur),
            Control::FaceSmoothing => ControlValue::Number(self.face_smoothing),
            Control::PortraitLighting => ControlValue::Number(self.portrait_lighting),
            Control::ExposureMode => ControlValue::Text(self.exposure_mode.as_str()),
            Control::WhiteBalanceMode => ControlValue::Text(self.white_balance_mode.as_str()),
            Control::FocusMode => ControlValue::Text(self.focus_mode.as_str()),
            Control::Filter => ControlValue::Text(self.filter.as_str()),
            Control::MirrorH => ControlValue::Flag(self.mirror_h),
            Control::MirrorV => ControlValue::Flag(self.mirror_v),
        }
    }

    /// Merge a partial update into these settings.
    ///
    /// Software ranges are enforced and rotation is snapped to the nearest
    /// quarter turn. Non-finite numbers are ignored. Returns `true` if any
    /// field changed.
    pub fn merge(&mut self, patch: &SettingsPatch) -> bool {
        let mut changed = false;

        for control in Control::ALL {
            let Some(incoming) = patch.get(control) else {
                continue;
            };
            changed |= self.set(control, incoming);
        }

        changed
    }

    fn set(&mut self, control: Control, value: PatchValue) -> bool {
        match value {
            PatchValue::Number(raw) => {
                if !raw.is_finite() {
                    tracing::warn!("Ignoring non-finite value for {control}");
                    return false;
                }
                let v = control
                    .software_range()
                    .map_or(raw, |(min, max)| raw.clamp(min, max));
                let slot = match control {
                    Control::Brightness => &mut self.brightness,
                    Control::Contrast => &mut self.contrast,
                    Control::Saturation => &mut self.saturation,
                    Control::Sharpness => &mut self.sharpness,
                    Control::Hue => &mut self.hue,
                    Control::Gamma => &mut self.gamma,
                    Control::ExposureCompensation => &mut self.exposure_compensation,
                    Control::WhiteBalanceTemperature => &mut self.white_balance_temperature,
                    Control::Iso => &mut self.iso,
                    Control::Zoom => &mut self.zoom,
                    Control::Pan => &mut self.pan,
                    Control::Tilt => &mut self.tilt,
                    Control::Blur => &mut self.blur,
                    Control::FaceSmoothing => &mut self.face_smoothing,
                    Control::PortraitLighting => &mut self.portrait_lighting,
                    Control::Rotation => {
                        let snapped = snap_rotation(v);
                        let changed = self.rotation != snapped;
                        self.rotation = snapped;
                        return changed;
                    }
                    _ => return false,
                };
                #[allow(clippy::float_cmp)]
                let changed = *slot != v;
                *slot = v;
                changed
            }
            PatchValue::ExposureMode(mode) => replace(&mut self.exposure_mode, mode),
            PatchValue::WhiteBalanceMode(mode) => replace(&mut self.white_balance_mode, mode),
            PatchValue::FocusMode(mode) => replace(&mut self.focus_mode, mode),
            PatchValue::Filter(filter) => replace(&mut self.filter, filter),
            PatchValue::Flag(flag) => match control {
                Control::MirrorH => replace(&mut self.mirror_h, flag),
                Control::MirrorV => replace(&mut self.mirror_v, flag),
                _ => false,
            },
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// Snap an angle in degrees to 0, 90, 180 or 270.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn snap_rotation(degrees: f64) -> u16 {
    let quarter_turns = (degrees / 90.0).round().rem_euclid(4.0);
    (quarter_turns as u16) * 90
}

/// A typed value carried by a [`SettingsPatch`] field.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PatchValue {
    Number(f64),
    ExposureMode(ExposureMode),
    WhiteBalanceMode(WhiteBalanceMode),
    FocusMode(FocusMode),
    Filter(FilterKind),
    Flag(bool),
}

/// A partial settings update. Absent fields are left untouched on merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_compensation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_balance_temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_smoothing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portrait_lighting: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_mode: Option<ExposureMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_balance_mode: Option<WhiteBalanceMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_mode: Option<FocusMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_h: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_v: Option<bool>,
}

impl SettingsPatch {
    /// Create an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A patch that replaces every field with the values in `settings`.
    #[must_use]
    pub fn from_settings(settings: &CameraSettings) -> Self {
        Self {
            brightness: Some(settings.brightness),
            contrast: Some(settings.contrast),
            saturation: Some(settings.saturation),
            sharpness: Some(settings.sharpness),
            hue: Some(settings.hue),
            gamma: Some(settings.gamma),
            exposure_compensation: Some(settings.exposure_compensation),
            white_balance_temperature: Some(settings.white_balance_temperature),
            iso: Some(settings.iso),
            zoom: Some(settings.zoom),
            pan: Some(settings.pan),
            tilt: Some(settings.tilt),
            rotation: Some(f64::from(settings.rotation)),
            blur: Some(settings.blur),
            face_smoothing: Some(settings.face_smoothing),
            portrait_lighting: Some(settings.portrait_lighting),
            exposure_mode: Some(settings.exposure_mode),
            white_balance_mode: Some(settings.white_balance_mode),
            focus_mode: Some(settings.focus_mode),
            filter: Some(settings.filter),
            mirror_h: Some(settings.mirror_h),
            mirror_v: Some(settings.mirror_v),
        }
    }

    /// Set a numeric control. Non-numeric controls are ignored.
    pub fn set_number(&mut self, control: Control, value: f64) {
        let slot = match control {
            Control::Brightness => &mut self.brightness,
            Control::Contrast => &mut self.contrast,
            Control::Saturation => &mut self.saturation,
            Control::Sharpness => &mut self.sharpness,
            Control::Hue => &mut self.hue,
            Control::Gamma => &mut self.gamma,
            Control::ExposureCompensation => &mut self.exposure_compensation,
            Control::WhiteBalanceTemperature => &mut self.white_balance_temperature,
            Control::Iso => &mut self.iso,
            Control::Zoom => &mut self.zoom,
            Control::Pan => &mut self.pan,
            Control::Tilt => &mut self.tilt,
            Control::Rotation => &mut self.rotation,
            Control::Blur => &mut self.blur,
            Control::FaceSmoothing => &mut self.face_smoothing,
            Control::PortraitLighting => &mut self.portrait_lighting,
            Control::ExposureMode
            | Control::WhiteBalanceMode
            | Control::FocusMode
            | Control::Filter
            | Control::MirrorH
            | Control::MirrorV => {
                tracing::debug!("set_number ignored for non-numeric control {control}");
                return;
            }
        };
        *slot = Some(value);
    }

    /// Whether the patch carries no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Control::ALL.iter().all(|c| self.get(*c).is_none())
    }

    /// Number of fields present in the patch.
    #[must_use]
    pub fn len(&self) -> usize {
        Control::ALL
            .iter()
            .filter(|c| self.get(**c).is_some())
            .count()
    }

    /// Controls present in the patch.
    pub fn controls(&self) -> impl Iterator<Item = Control> + '_ {
        Control::ALL
            .into_iter()
            .filter(move |c| self.get(*c).is_some())
    }

    fn get(&self, control: Control) -> Option<PatchValue> {
        match control {
            Control::Brightness => self.brightness.map(PatchValue::Number),
            Control::Contrast => self.contrast.map(PatchValue::Number),
            Control::Saturation => self.saturation.map(PatchValue::Number),
            Control::Sharpness => self.sharpness.map(PatchValue::Number),
            Control::Hue => self.hue.map(PatchValue::Number),
            Control::Gamma => self.gamma.map(PatchValue::Number),
            Control::ExposureCompensation => self.exposure_compensation.map(PatchValue::Number),
            Control::WhiteBalanceTemperature => {
                self.white_balance_temperature.map(PatchValue::Number)
            }
            Control::Iso => self.iso.map(PatchValue::Number),
            Control::Zoom => self.zoom.map(PatchValue::Number),
            Control::Pan => self.pan.map(PatchValue::Number),
            Control::Tilt => self.tilt.map(PatchValue::Number),
            Control::Rotation => self.rotation.map(PatchValue::Number),
            Control::Blur => self.blur.map(PatchValue::Number),
            Control::FaceSmoothing => self.face_smoothing.map(PatchValue::Number),
            Control::PortraitLighting => self.portrait_lighting.map(PatchValue::Number),
            Control::ExposureMode => self.exposure_mode.map(PatchValue::ExposureMode),
            Control::WhiteBalanceMode => self.white_balance_mode.map(PatchValue::WhiteBalanceMode),
            Control::FocusMode => self.focus_mode.map(PatchValue::FocusMode),
            Control::Filter => self.filter.map(PatchValue::Filter),
            Control::MirrorH => self.mirror_h.map(PatchValue::Flag),
            Control::MirrorV => self.mirror_v.map(PatchValue::Flag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_neutral() {
        let s = CameraSettings::default();
        assert!((s.zoom - 100.0).abs() < f64::EPSILON);
        assert_eq!(s.filter, FilterKind::None);
        assert_eq!(s.rotation, 0);
        assert!(!s.mirror_h && !s.mirror_v);
    }

    #[test]
    fn test_merge_reports_change() {
        let mut s = CameraSettings::default();
        let patch = SettingsPatch {
            brightness: Some(140.0),
            mirror_h: Some(true),
            ..SettingsPatch::default()
        };
        assert!(s.merge(&patch));
        assert!((s.brightness - 140.0).abs() < f64::EPSILON);
        assert!(s.mirror_h);

        // Same values again: no change
        assert!(!s.merge(&patch));
    }

    #[test]
    fn test_merge_clamps_software_ranges() {
        let mut s = CameraSettings::default();
        let patch = SettingsPatch {
            zoom: Some(900.0),
            pan: Some(-500.0),
            tilt: Some(120.0),
            blur: Some(-3.0),
            ..SettingsPatch::default()
        };
        s.merge(&patch);
        assert!((s.zoom - 400.0).abs() < f64::EPSILON);
        assert!((s.pan + 180.0).abs() < f64::EPSILON);
        assert!((s.tilt - 90.0).abs() < f64::EPSILON);
        assert!(s.blur.abs() < f64::EPSILON);
    }

    #[test]
    fn test_merge_ignores_non_finite() {
        let mut s = CameraSettings::default();
        let patch = SettingsPatch {
            contrast: Some(f64::NAN),
            ..SettingsPatch::default()
        };
        assert!(!s.merge(&patch));
        assert!((s.contrast - 128.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snap_rotation() {
        assert_eq!(snap_rotation(0.0), 0);
        assert_eq!(snap_rotation(85.0), 90);
        assert_eq!(snap_rotation(180.0), 180);
        assert_eq!(snap_rotation(270.0), 270);
        assert_eq!(snap_rotation(360.0), 0);
        assert_eq!(snap_rotation(-90.0), 270);
    }

    #[test]
    fn test_json_uses_camel_case_keys() {
        let json = serde_json::to_value(CameraSettings::default()).expect("serialize");
        assert!(json.get("whiteBalanceTemperature").is_some());
        assert!(json.get("mirrorH").is_some());
        assert_eq!(json["focusMode"], "continuous");
        assert_eq!(json["filter"], "none");
    }

    #[test]
    fn test_focus_mode_single_shot_name() {
        let mode: FocusMode = serde_json::from_str("\"single-shot\"").expect("parse");
        assert_eq!(mode, FocusMode::SingleShot);
        assert_eq!(mode.as_str(), "single-shot");
    }

    #[test]
    fn test_patch_set_number_and_len() {
        let mut patch = SettingsPatch::new();
        assert!(patch.is_empty());
        patch.set_number(Control::Zoom, 250.0);
        patch.set_number(Control::Filter, 1.0);
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.zoom, Some(250.0));
        assert_eq!(patch.controls().collect::<Vec<_>>(), vec![Control::Zoom]);
    }

    #[test]
    fn test_patch_from_settings_restores_everything() {
        let mut original = CameraSettings::default();
        original.filter = FilterKind::Aqua;
        original.rotation = 270;
        original.face_smoothing = 42.0;

        let mut target = CameraSettings::default();
        target.merge(&SettingsPatch::from_settings(&original));
        assert_eq!(target, original);
    }

    #[test]
    fn test_value_kinds() {
        let s = CameraSettings::default();
        assert_eq!(s.value(Control::Zoom), ControlValue::Number(100.0));
        assert_eq!(s.value(Control::FocusMode), ControlValue::Text("continuous"));
        assert_eq!(s.value(Control::MirrorV), ControlValue::Flag(false));
    }
}
