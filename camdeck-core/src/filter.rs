//! CSS filter chains and portrait lighting parameters.
//!
//! Chains are built in a fixed order: hue rotation, then the named preset,
//! then blur. An empty chain renders as the literal `none`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CameraSettings, FilterKind};

/// Blur applied to the frame as a whole or to its background.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlurMode {
    /// No mode-driven blur; the user blur slider still applies.
    #[default]
    None,
    /// Background blurred behind the segmented subject.
    Portrait,
    /// Entire frame blurred at a fixed radius.
    Full,
}

/// Fixed blur radius used by [`BlurMode::Full`].
pub const FULL_BLUR_PX: f64 = 12.0;

/// Face smoothing strength is divided by this to get a blur radius.
pub const FACE_SMOOTHING_DIVISOR: f64 = 15.0;

/// One function in a filter chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterFn {
    /// `hue-rotate(<deg>deg)`
    HueRotate(f64),
    /// `grayscale(<pct>%)`
    Grayscale(f64),
    /// `sepia(<pct>%)`
    Sepia(f64),
    /// `invert(<pct>%)`
    Invert(f64),
    /// `contrast(<pct>%)`
    Contrast(f64),
    /// `saturate(<pct>%)`
    Saturate(f64),
    /// `brightness(<pct>%)`
    Brightness(f64),
    /// `blur(<px>px)`
    Blur(f64),
}

impl fmt::Display for FilterFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterFn::HueRotate(deg) => write!(f, "hue-rotate({deg}deg)"),
            FilterFn::Grayscale(pct) => write!(f, "grayscale({pct}%)"),
            FilterFn::Sepia(pct) => write!(f, "sepia({pct}%)"),
            FilterFn::Invert(pct) => write!(f, "invert({pct}%)"),
            FilterFn::Contrast(pct) => write!(f, "contrast({pct}%)"),
            FilterFn::Saturate(pct) => write!(f, "saturate({pct}%)"),
            FilterFn::Brightness(pct) => write!(f, "brightness({pct}%)"),
            FilterFn::Blur(px) => write!(f, "blur({px}px)"),
        }
    }
}

impl FilterKind {
    /// Filter functions this preset expands to.
    #[must_use]
    pub fn functions(self) -> &'static [FilterFn] {
        match self {
            FilterKind::None => &[],
            FilterKind::Grayscale => &[FilterFn::Grayscale(100.0)],
            FilterKind::Sepia => &[FilterFn::Sepia(100.0)],
            FilterKind::Invert => &[FilterFn::Invert(100.0)],
            FilterKind::Posterize => &[FilterFn::Contrast(250.0), FilterFn::Saturate(200.0)],
            FilterKind::Aqua => &[
                FilterFn::Sepia(50.0),
                FilterFn::HueRotate(180.0),
                FilterFn::Saturate(200.0),
            ],
            FilterKind::Blackboard => &[
                FilterFn::Contrast(150.0),
                FilterFn::Brightness(120.0),
                FilterFn::Grayscale(100.0),
                FilterFn::Invert(100.0),
            ],
            FilterKind::Whiteboard => &[
                FilterFn::Contrast(200.0),
                FilterFn::Brightness(110.0),
                FilterFn::Grayscale(100.0),
            ],
        }
    }
}

/// An ordered filter chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain(Vec<FilterFn>);

impl FilterChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a function.
    pub fn push(&mut self, function: FilterFn) {
        self.0.push(function);
    }

    /// Whether no effect is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The functions in application order.
    #[must_use]
    pub fn functions(&self) -> &[FilterFn] {
        &self.0
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("none");
        }
        for (i, function) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

/// Build the base filter chain for a frame.
#[must_use]
pub fn filter_chain(settings: &CameraSettings, blur_mode: BlurMode) -> FilterChain {
    let mut chain = FilterChain::new();

    if settings.hue != 0.0 {
        chain.push(FilterFn::HueRotate(settings.hue));
    }
    for function in settings.filter.functions() {
        chain.push(*function);
    }
    if blur_mode == BlurMode::Full {
        chain.push(FilterFn::Blur(FULL_BLUR_PX));
    } else if settings.blur > 0.0 {
        chain.push(FilterFn::Blur(settings.blur));
    }

    chain
}

/// Build the base filter string, `none` when nothing is active.
#[must_use]
pub fn build_filter(settings: &CameraSettings, blur_mode: BlurMode) -> String {
    filter_chain(settings, blur_mode).to_string()
}

/// Build the filter string with the face-smoothing blur appended.
#[must_use]
pub fn build_filter_with_smoothing(settings: &CameraSettings, blur_mode: BlurMode) -> String {
    let mut chain = filter_chain(settings, blur_mode);
    if settings.face_smoothing > 0.0 {
        chain.push(FilterFn::Blur(settings.face_smoothing / FACE_SMOOTHING_DIVISOR));
    }
    chain.to_string()
}

/// Radial gradient describing the portrait lighting highlight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortraitLighting {
    /// Gradient center X (nose tip), canvas pixels.
    pub center_x: f64,
    /// Gradient center Y (nose tip), canvas pixels.
    pub center_y: f64,
    /// Radius of the fully lit core.
    pub inner_radius: f64,
    /// Radius where the highlight fades out.
    pub outer_radius: f64,
    /// Opacity of the white core.
    pub opacity: f64,
}

impl PortraitLighting {
    /// CSS colour of the gradient's inner stop.
    #[must_use]
    pub fn inner_color(&self) -> String {
        format!("rgba(255, 255, 255, {})", self.opacity)
    }

    /// CSS colour of the gradient's outer stop.
    #[must_use]
    pub fn outer_color(&self) -> &'static str {
        "rgba(255, 255, 255, 0)"
    }
}

/// Outer radius of the highlight relative to the face width.
pub const LIGHTING_RADIUS_FACTOR: f64 = 1.2;

/// Intensity (0-100) is divided by this to get the highlight opacity.
pub const LIGHTING_OPACITY_DIVISOR: f64 = 250.0;

/// Compute the portrait lighting gradient centered on the nose tip.
#[must_use]
pub fn calculate_portrait_lighting(
    intensity: f64,
    nose_x: f64,
    nose_y: f64,
    face_width: f64,
) -> PortraitLighting {
    PortraitLighting {
        center_x: nose_x,
        center_y: nose_y,
        inner_radius: 0.0,
        outer_radius: face_width * LIGHTING_RADIUS_FACTOR,
        opacity: intensity / LIGHTING_OPACITY_DIVISOR,
    }
}
