//! Landmark-driven effects: face-smoothing un-blur and portrait lighting.
//!
//! Both effects run on the display layer after the base frame is drawn and
//! before the geometric transform, so they follow the frame when it is
//! mirrored, rotated or zoomed.

use camdeck_core::{
    calculate_portrait_lighting, DrawDimensions, FaceLandmarks, FaceRegion, PortraitLighting,
};

use crate::backend::{CompositeOp, CompositingBackend, Layer, Source};
use crate::RenderResult;

/// Redraw the sharp base frame inside the eye and mouth polygons.
///
/// `base_filter` is the chain without the smoothing blur, so colour effects
/// stay consistent inside the clipped regions. Returns how many regions were
/// redrawn; regions whose landmarks are missing are skipped.
///
/// # Errors
///
/// Returns the first backend error.
pub fn unblur_regions<B: CompositingBackend + ?Sized>(
    backend: &mut B,
    base: Source<'_, B::Mask>,
    base_filter: &str,
    landmarks: &FaceLandmarks,
    video_size: (f64, f64),
    dims: &DrawDimensions,
) -> RenderResult<usize> {
    let mut redrawn = 0;
    for region in FaceRegion::ALL {
        let Some(polygon) = landmarks.region_polygon(region, video_size.0, video_size.1, dims)
        else {
            tracing::debug!(?region, "landmarks incomplete, region left smoothed");
            continue;
        };
        backend.save(Layer::Display)?;
        backend.clip_polygon(Layer::Display, &polygon)?;
        backend.set_filter(Layer::Display, base_filter)?;
        backend.draw(Layer::Display, base, dims.rect())?;
        backend.restore(Layer::Display)?;
        redrawn += 1;
    }
    Ok(redrawn)
}

/// Gradient for the current landmarks, or `None` when lighting is off or
/// the nose tip and face edges are not available.
#[must_use]
pub fn lighting_for(
    intensity: f64,
    landmarks: &FaceLandmarks,
    video_size: (f64, f64),
    dims: &DrawDimensions,
) -> Option<PortraitLighting> {
    if intensity <= 0.0 {
        return None;
    }
    let nose = landmarks.nose_tip(video_size.0, video_size.1, dims)?;
    let width = landmarks.face_width(video_size.0, video_size.1, dims)?;
    Some(calculate_portrait_lighting(intensity, nose.x, nose.y, width))
}

/// Blend the lighting gradient over the display with soft-light.
///
/// # Errors
///
/// Returns the first backend error.
pub fn apply_portrait_lighting<B: CompositingBackend + ?Sized>(
    backend: &mut B,
    lighting: &PortraitLighting,
) -> RenderResult<()> {
    backend.save(Layer::Display)?;
    backend.set_filter(Layer::Display, "none")?;
    backend.set_composite(Layer::Display, CompositeOp::SoftLight)?;
    backend.fill_radial_gradient(Layer::Display, lighting)?;
    backend.restore(Layer::Display)
}
