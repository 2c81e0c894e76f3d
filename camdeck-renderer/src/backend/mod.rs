//! Compositing backend abstraction.
//!
//! A backend owns the live video element, an optional uploaded background
//! image and five drawing surfaces ([`Layer`]). Each surface keeps its own
//! transform, filter and composite state, like a 2D canvas context.

pub mod recording;

use std::fmt;

use camdeck_core::{PortraitLighting, Point, Rect, TransformTarget};
use serde::{Deserialize, Serialize};

use crate::{RenderError, RenderResult};

/// A drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Layer {
    /// The visible frame.
    Display,
    /// Transparent face-tracking overlay stacked above the display.
    Overlay,
    /// Offscreen background buffer, video-sized.
    Background,
    /// Offscreen masked-subject buffer, video-sized.
    Foreground,
    /// Offscreen copy of the display used for the geometric transform.
    Snapshot,
}

impl Layer {
    /// Short name for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Display => "display",
            Layer::Overlay => "overlay",
            Layer::Background => "background",
            Layer::Foreground => "foreground",
            Layer::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compositing operators used by the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeOp {
    /// Normal painting.
    #[default]
    SourceOver,
    /// Keep destination only where the source is opaque (mask stencil).
    DestinationIn,
    /// Soft-light blend used for portrait lighting.
    SoftLight,
}

impl CompositeOp {
    /// Canvas `globalCompositeOperation` keyword.
    #[must_use]
    pub fn as_css(self) -> &'static str {
        match self {
            CompositeOp::SourceOver => "source-over",
            CompositeOp::DestinationIn => "destination-in",
            CompositeOp::SoftLight => "soft-light",
        }
    }
}

/// Something that can be drawn onto a layer.
#[derive(Debug)]
pub enum Source<'a, M> {
    /// The live video frame.
    Video,
    /// The uploaded background image.
    BackgroundImage,
    /// Another layer's current contents.
    Layer(Layer),
    /// A segmentation mask.
    Mask(&'a M),
}

impl<M> Clone for Source<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Source<'_, M> {}

/// A 2D compositing surface set.
pub trait CompositingBackend {
    /// Segmentation mask image type.
    type Mask;

    /// Intrinsic video size; `(0, 0)` before metadata loads.
    fn video_size(&self) -> (f64, f64);

    /// Whether the video is playing (not paused or ended).
    fn video_playing(&self) -> bool;

    /// Size the display should have (its CSS box).
    fn display_size(&self) -> (f64, f64);

    /// Whether a background image has been uploaded.
    fn has_background_image(&self) -> bool;

    /// Current backing size of a layer.
    fn layer_size(&self, layer: Layer) -> (f64, f64);

    /// Reallocate a layer's backing store. Clears its contents and state.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer cannot be resized.
    fn resize_layer(&mut self, layer: Layer, width: f64, height: f64) -> RenderResult<()>;

    /// Clear a layer to transparent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn clear(&mut self, layer: Layer) -> RenderResult<()>;

    /// Push the layer's drawing state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn save(&mut self, layer: Layer) -> RenderResult<()>;

    /// Pop the layer's drawing state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn restore(&mut self, layer: Layer) -> RenderResult<()>;

    /// Drop all saved state and reset transform, filter and composite.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn reset_state(&mut self, layer: Layer) -> RenderResult<()>;

    /// Set the CSS filter applied to subsequent draws.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn set_filter(&mut self, layer: Layer, filter: &str) -> RenderResult<()>;

    /// Set the composite operator for subsequent draws.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn set_composite(&mut self, layer: Layer, op: CompositeOp) -> RenderResult<()>;

    /// Translate the layer's coordinate system.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn translate(&mut self, layer: Layer, x: f64, y: f64) -> RenderResult<()>;

    /// Scale the layer's coordinate system.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn scale(&mut self, layer: Layer, x: f64, y: f64) -> RenderResult<()>;

    /// Rotate the layer's coordinate system clockwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn rotate(&mut self, layer: Layer, radians: f64) -> RenderResult<()>;

    /// Draw a source scaled into `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is unavailable or the draw fails.
    fn draw(&mut self, layer: Layer, source: Source<'_, Self::Mask>, dest: Rect)
        -> RenderResult<()>;

    /// Intersect the clip region with a closed polygon.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn clip_polygon(&mut self, layer: Layer, points: &[Point]) -> RenderResult<()>;

    /// Fill the layer with a white radial gradient.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn fill_radial_gradient(&mut self, layer: Layer, lighting: &PortraitLighting)
        -> RenderResult<()>;

    /// Outline a rectangle.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    fn stroke_rect(&mut self, layer: Layer, rect: Rect, color: &str, line_width: f64)
        -> RenderResult<()>;
}

/// Adapts one backend layer to the geometry engine's [`TransformTarget`].
///
/// The first backend error is kept and reported by [`LayerTransform::finish`];
/// later operations are skipped.
pub struct LayerTransform<'a, B: CompositingBackend + ?Sized> {
    backend: &'a mut B,
    layer: Layer,
    error: Option<RenderError>,
}

impl<'a, B: CompositingBackend + ?Sized> LayerTransform<'a, B> {
    /// Wrap a layer.
    pub fn new(backend: &'a mut B, layer: Layer) -> Self {
        Self {
            backend,
            layer,
            error: None,
        }
    }

    /// Surface the first error, if any.
    ///
    /// # Errors
    ///
    /// Returns the first backend error raised while transforming.
    pub fn finish(self) -> RenderResult<()> {
        self.error.map_or(Ok(()), Err)
    }

    fn run(&mut self, op: impl FnOnce(&mut B, Layer) -> RenderResult<()>) {
        if self.error.is_none() {
            if let Err(e) = op(&mut *self.backend, self.layer) {
                self.error = Some(e);
            }
        }
    }
}

impl<B: CompositingBackend + ?Sized> TransformTarget for LayerTransform<'_, B> {
    fn translate(&mut self, x: f64, y: f64) {
        self.run(|b, l| b.translate(l, x, y));
    }

    fn scale(&mut self, x: f64, y: f64) {
        self.run(|b, l| b.scale(l, x, y));
    }

    fn rotate(&mut self, radians: f64) {
        self.run(|b, l| b.rotate(l, radians));
    }
}
