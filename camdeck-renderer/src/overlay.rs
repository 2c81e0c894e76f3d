//! Face-tracking overlay.
//!
//! The overlay is its own transparent layer stacked over the display, so the
//! box is drawn in untransformed canvas space and never mirrored or zoomed.

use camdeck_core::{video_rect_to_canvas, BoundingBox, DrawDimensions, Rect};

use crate::backend::{CompositingBackend, Layer};
use crate::RenderResult;

/// Stroke style for the tracking box.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle<'a> {
    /// CSS colour.
    pub color: &'a str,
    /// Line width in canvas pixels.
    pub line_width: f64,
}

/// Clear the overlay and, when given a box, outline it.
///
/// Returns the canvas-space rectangle that was drawn.
///
/// # Errors
///
/// Returns the first backend error.
pub fn draw_overlay<B: CompositingBackend + ?Sized>(
    backend: &mut B,
    face: Option<&BoundingBox>,
    video_size: (f64, f64),
    dims: &DrawDimensions,
    style: &OverlayStyle<'_>,
) -> RenderResult<Option<Rect>> {
    backend.clear(Layer::Overlay)?;
    let Some(face) = face else {
        return Ok(None);
    };
    let rect = video_rect_to_canvas(face.rect(), video_size.0, video_size.1, dims);
    backend.stroke_rect(Layer::Overlay, rect, style.color, style.line_width)?;
    Ok(Some(rect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{DrawOp, RecordingBackend};
    use camdeck_core::draw_dimensions;

    const STYLE: OverlayStyle<'static> = OverlayStyle {
        color: "#00ff88",
        line_width: 2.0,
    };

    #[test]
    fn test_no_box_only_clears() {
        let mut backend = RecordingBackend::new(1280.0, 720.0, 1920.0, 900.0);
        let dims = draw_dimensions(1280.0, 720.0, 1920.0, 900.0).expect("dims");
        let drawn = draw_overlay(&mut backend, None, (1280.0, 720.0), &dims, &STYLE).expect("overlay");
        assert!(drawn.is_none());
        assert_eq!(backend.ops(), [DrawOp::Clear { layer: Layer::Overlay }]);
    }

    #[test]
    fn test_box_is_mapped_through_letterbox() {
        let mut backend = RecordingBackend::new(1280.0, 720.0, 1920.0, 900.0);
        let dims = draw_dimensions(1280.0, 720.0, 1920.0, 900.0).expect("dims");
        let face = BoundingBox::new(0.0, 0.0, 1280.0, 720.0);
        let rect = draw_overlay(&mut backend, Some(&face), (1280.0, 720.0), &dims, &STYLE)
            .expect("overlay")
            .expect("rect");
        assert!((rect.x - 160.0).abs() < 1e-9);
        assert!((rect.width - 1600.0).abs() < 1e-9);
        assert!((rect.height - 900.0).abs() < 1e-9);
        assert!(matches!(
            &backend.ops()[1],
            DrawOp::StrokeRect { color, line_width, .. } if color == "#00ff88" && (*line_width - 2.0).abs() < f64::EPSILON
        ));
    }
}
