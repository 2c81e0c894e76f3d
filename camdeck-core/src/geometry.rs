//! Letterbox layout, coordinate mapping and frame transforms.
//!
//! ## Transform order
//!
//! ```text
//!   translate(center) ─► mirror ─► rotate ─► [zoom + pan/tilt] ─► translate(-center)
//! ```
//!
//! Mirroring comes first so it is always screen-relative. The zoom step only
//! runs when zoom is applied in software; a hardware-zoomed stream is already
//! reframed by the device.

use serde::{Deserialize, Serialize};

use crate::{CameraSettings, CoreError, CoreResult};

/// Where the video is drawn inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawDimensions {
    /// Drawn video width in canvas pixels.
    pub draw_width: f64,
    /// Drawn video height in canvas pixels.
    pub draw_height: f64,
    /// Left padding.
    pub offset_x: f64,
    /// Top padding.
    pub offset_y: f64,
}

impl DrawDimensions {
    /// The drawn area as a rectangle.
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.offset_x, self.offset_y, self.draw_width, self.draw_height)
    }
}

/// Compute the aspect-preserving fit of a video inside a canvas.
///
/// # Errors
///
/// Returns [`CoreError::InvalidDimensions`] if any dimension is zero,
/// negative or non-finite.
pub fn draw_dimensions(
    video_width: f64,
    video_height: f64,
    canvas_width: f64,
    canvas_height: f64,
) -> CoreResult<DrawDimensions> {
    let dims = [video_width, video_height, canvas_width, canvas_height];
    if dims.iter().any(|d| !d.is_finite() || *d <= 0.0) {
        return Err(CoreError::InvalidDimensions {
            video_width,
            video_height,
            canvas_width,
            canvas_height,
        });
    }

    let video_aspect = video_width / video_height;
    let canvas_aspect = canvas_width / canvas_height;

    if canvas_aspect > video_aspect {
        let draw_width = canvas_height * video_aspect;
        Ok(DrawDimensions {
            draw_width,
            draw_height: canvas_height,
            offset_x: (canvas_width - draw_width) / 2.0,
            offset_y: 0.0,
        })
    } else {
        let draw_height = canvas_width / video_aspect;
        Ok(DrawDimensions {
            draw_width: canvas_width,
            draw_height,
            offset_x: 0.0,
            offset_y: (canvas_height - draw_height) / 2.0,
        })
    }
}

/// A point in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Create a rectangle.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle at the origin with the given size.
    #[must_use]
    pub const fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }
}

/// Map a point in video pixel space into canvas pixel space.
#[must_use]
pub fn video_to_canvas(
    point: Point,
    video_width: f64,
    video_height: f64,
    dims: &DrawDimensions,
) -> Point {
    let scale_x = dims.draw_width / video_width;
    let scale_y = dims.draw_height / video_height;
    Point::new(
        dims.offset_x + point.x * scale_x,
        dims.offset_y + point.y * scale_y,
    )
}

/// Map a rectangle in video pixel space into canvas pixel space.
#[must_use]
pub fn video_rect_to_canvas(
    rect: Rect,
    video_width: f64,
    video_height: f64,
    dims: &DrawDimensions,
) -> Rect {
    let origin = video_to_canvas(Point::new(rect.x, rect.y), video_width, video_height, dims);
    Rect::new(
        origin.x,
        origin.y,
        rect.width * dims.draw_width / video_width,
        rect.height * dims.draw_height / video_height,
    )
}

/// Geometry-relevant projection of [`CameraSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformParams {
    /// Rotation in degrees.
    pub rotation: f64,
    /// Zoom in UI units (100-400).
    pub zoom: f64,
    /// Pan in degrees.
    pub pan: f64,
    /// Tilt in degrees.
    pub tilt: f64,
    /// Horizontal mirror.
    pub mirror_h: bool,
    /// Vertical mirror.
    pub mirror_v: bool,
}

impl From<&CameraSettings> for TransformParams {
    fn from(s: &CameraSettings) -> Self {
        Self {
            rotation: f64::from(s.rotation),
            zoom: s.zoom,
            pan: s.pan,
            tilt: s.tilt,
            mirror_h: s.mirror_h,
            mirror_v: s.mirror_v,
        }
    }
}

impl Default for TransformParams {
    fn default() -> Self {
        Self::from(&CameraSettings::default())
    }
}

/// Anything that accumulates 2D affine operations (a canvas context, a matrix).
pub trait TransformTarget {
    /// Translate the coordinate system.
    fn translate(&mut self, x: f64, y: f64);
    /// Scale the coordinate system.
    fn scale(&mut self, x: f64, y: f64);
    /// Rotate the coordinate system clockwise by `radians`.
    fn rotate(&mut self, radians: f64);
}

/// Apply mirror, rotation and software zoom/pan/tilt around the canvas center.
pub fn apply_transforms<T: TransformTarget + ?Sized>(
    target: &mut T,
    canvas_width: f64,
    canvas_height: f64,
    draw_width: f64,
    draw_height: f64,
    params: &TransformParams,
    is_hardware_zoom: bool,
) {
    let cx = canvas_width / 2.0;
    let cy = canvas_height / 2.0;

    target.translate(cx, cy);
    target.scale(
        if params.mirror_h { -1.0 } else { 1.0 },
        if params.mirror_v { -1.0 } else { 1.0 },
    );
    target.rotate(params.rotation.to_radians());

    if !is_hardware_zoom && params.zoom > 100.0 {
        let zoom_scale = params.zoom / 100.0;
        let (pan_x, pan_y) = pan_tilt_offset(params, draw_width, draw_height, zoom_scale);
        target.scale(zoom_scale, zoom_scale);
        target.translate(pan_x, pan_y);
    }

    target.translate(-cx, -cy);
}

/// Translation (in pre-zoom pixels) that realizes the current pan/tilt.
///
/// Full pan (±180°) shifts by half the drawn width, full tilt (±90°) by half
/// the drawn height, both divided by the zoom scale so the shift stays
/// proportional to what is visible.
#[must_use]
pub fn pan_tilt_offset(
    params: &TransformParams,
    draw_width: f64,
    draw_height: f64,
    zoom_scale: f64,
) -> (f64, f64) {
    let x = (params.pan / 180.0) * (draw_width / 2.0) / zoom_scale;
    let y = -(params.tilt / 90.0) * (draw_height / 2.0) / zoom_scale;
    (x, y)
}

/// A 2D affine matrix in canvas `[a b c d e f]` layout.
///
/// ```text
/// | a c e |
/// | b d f |
/// | 0 0 1 |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    /// Horizontal scaling.
    pub a: f64,
    /// Vertical skewing.
    pub b: f64,
    /// Horizontal skewing.
    pub c: f64,
    /// Vertical scaling.
    pub d: f64,
    /// Horizontal translation.
    pub e: f64,
    /// Vertical translation.
    pub f: f64,
}

impl Affine {
    /// The identity transform.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    /// Post-multiply by another matrix (`self * other`), as a canvas does.
    #[must_use]
    pub fn then(&self, o: &Affine) -> Affine {
        Affine {
            a: self.a * o.a + self.c * o.b,
            b: self.b * o.a + self.d * o.b,
            c: self.a * o.c + self.c * o.d,
            d: self.b * o.c + self.d * o.d,
            e: self.a * o.e + self.c * o.f + self.e,
            f: self.b * o.e + self.d * o.f + self.f,
        }
    }

    /// Map a point through the matrix.
    #[must_use]
    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl TransformTarget for Affine {
    fn translate(&mut self, x: f64, y: f64) {
        *self = self.then(&Affine {
            e: x,
            f: y,
            ..Affine::identity()
        });
    }

    fn scale(&mut self, x: f64, y: f64) {
        *self = self.then(&Affine {
            a: x,
            d: y,
            ..Affine::identity()
        });
    }

    fn rotate(&mut self, radians: f64) {
        let (sin, cos) = radians.sin_cos();
        *self = self.then(&Affine {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        });
    }
}
