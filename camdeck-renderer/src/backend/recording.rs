//! Headless backend that records draw operations.
//!
//! Used by tests and by the CLI to inspect the draw plan of a frame without
//! a browser. Every call is appended to [`RecordingBackend::ops`]; a failure
//! can be injected on the first call of a given operation.

use std::collections::HashMap;

use camdeck_core::{PortraitLighting, Point, Rect};
use serde::Serialize;

use super::{CompositeOp, CompositingBackend, Layer, Source};
use crate::{RenderError, RenderResult};

/// Segmentation mask stand-in: identifies which mask was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaskId(pub u64);

/// Source of a recorded draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum RecordedSource {
    /// Live video.
    Video,
    /// Uploaded background image.
    BackgroundImage,
    /// Another layer.
    Layer(Layer),
    /// A segmentation mask.
    Mask(u64),
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
#[allow(missing_docs)]
pub enum DrawOp {
    Resize { layer: Layer, width: f64, height: f64 },
    Clear { layer: Layer },
    Save { layer: Layer },
    Restore { layer: Layer },
    Reset { layer: Layer },
    Filter { layer: Layer, filter: String },
    Composite { layer: Layer, composite: CompositeOp },
    Translate { layer: Layer, x: f64, y: f64 },
    Scale { layer: Layer, x: f64, y: f64 },
    Rotate { layer: Layer, radians: f64 },
    Draw { layer: Layer, source: RecordedSource, dest: Rect },
    Clip { layer: Layer, points: Vec<Point> },
    Gradient { layer: Layer, lighting: PortraitLighting },
    StrokeRect { layer: Layer, rect: Rect, color: String, line_width: f64 },
}

impl DrawOp {
    /// Operation name, as used for failure injection.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DrawOp::Resize { .. } => "resize",
            DrawOp::Clear { .. } => "clear",
            DrawOp::Save { .. } => "save",
            DrawOp::Restore { .. } => "restore",
            DrawOp::Reset { .. } => "reset",
            DrawOp::Filter { .. } => "filter",
            DrawOp::Composite { .. } => "composite",
            DrawOp::Translate { .. } => "translate",
            DrawOp::Scale { .. } => "scale",
            DrawOp::Rotate { .. } => "rotate",
            DrawOp::Draw { .. } => "draw",
            DrawOp::Clip { .. } => "clip",
            DrawOp::Gradient { .. } => "gradient",
            DrawOp::StrokeRect { .. } => "strokeRect",
        }
    }

    /// Layer the operation targeted.
    #[must_use]
    pub fn layer(&self) -> Layer {
        match self {
            DrawOp::Resize { layer, .. }
            | DrawOp::Clear { layer }
            | DrawOp::Save { layer }
            | DrawOp::Restore { layer }
            | DrawOp::Reset { layer }
            | DrawOp::Filter { layer, .. }
            | DrawOp::Composite { layer, .. }
            | DrawOp::Translate { layer, .. }
            | DrawOp::Scale { layer, .. }
            | DrawOp::Rotate { layer, .. }
            | DrawOp::Draw { layer, .. }
            | DrawOp::Clip { layer, .. }
            | DrawOp::Gradient { layer, .. }
            | DrawOp::StrokeRect { layer, .. } => *layer,
        }
    }
}

/// A backend that records every call.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    video: (f64, f64),
    playing: bool,
    display: (f64, f64),
    background_image: bool,
    sizes: HashMap<Layer, (f64, f64)>,
    ops: Vec<DrawOp>,
    fail_on: Option<&'static str>,
}

impl RecordingBackend {
    /// A playing video of the given size shown in a display of the given size.
    #[must_use]
    pub fn new(video_width: f64, video_height: f64, display_width: f64, display_height: f64) -> Self {
        Self {
            video: (video_width, video_height),
            playing: true,
            display: (display_width, display_height),
            background_image: false,
            sizes: HashMap::new(),
            ops: Vec::new(),
            fail_on: None,
        }
    }

    /// Mark whether a background image is uploaded.
    #[must_use]
    pub fn with_background_image(mut self, present: bool) -> Self {
        self.background_image = present;
        self
    }

    /// Fail the first call of the named operation (see [`DrawOp::name`]).
    #[must_use]
    pub fn failing_on(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    /// Pause or resume the video.
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Change the intrinsic video size.
    pub fn set_video_size(&mut self, width: f64, height: f64) {
        self.video = (width, height);
    }

    /// Change the display's CSS size.
    pub fn set_display_size(&mut self, width: f64, height: f64) {
        self.display = (width, height);
    }

    /// Recorded operations.
    #[must_use]
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Take and clear the recorded operations.
    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }

    /// Recorded operations on one layer.
    #[must_use]
    pub fn ops_on(&self, layer: Layer) -> Vec<&DrawOp> {
        self.ops.iter().filter(|op| op.layer() == layer).collect()
    }

    fn record(&mut self, op: DrawOp) -> RenderResult<()> {
        let name = op.name();
        if self.fail_on == Some(name) {
            self.fail_on = None;
            return Err(RenderError::backend(name, "injected failure"));
        }
        tracing::trace!("{op:?}");
        self.ops.push(op);
        Ok(())
    }
}

impl CompositingBackend for RecordingBackend {
    type Mask = MaskId;

    fn video_size(&self) -> (f64, f64) {
        self.video
    }

    fn video_playing(&self) -> bool {
        self.playing
    }

    fn display_size(&self) -> (f64, f64) {
        self.display
    }

    fn has_background_image(&self) -> bool {
        self.background_image
    }

    fn layer_size(&self, layer: Layer) -> (f64, f64) {
        self.sizes.get(&layer).copied().unwrap_or((0.0, 0.0))
    }

    fn resize_layer(&mut self, layer: Layer, width: f64, height: f64) -> RenderResult<()> {
        self.record(DrawOp::Resize {
            layer,
            width,
            height,
        })?;
        self.sizes.insert(layer, (width, height));
        Ok(())
    }

    fn clear(&mut self, layer: Layer) -> RenderResult<()> {
        self.record(DrawOp::Clear { layer })
    }

    fn save(&mut self, layer: Layer) -> RenderResult<()> {
        self.record(DrawOp::Save { layer })
    }

    fn restore(&mut self, layer: Layer) -> RenderResult<()> {
        self.record(DrawOp::Restore { layer })
    }

    fn reset_state(&mut self, layer: Layer) -> RenderResult<()> {
        self.record(DrawOp::Reset { layer })
    }

    fn set_filter(&mut self, layer: Layer, filter: &str) -> RenderResult<()> {
        self.record(DrawOp::Filter {
            layer,
            filter: filter.to_string(),
        })
    }

    fn set_composite(&mut self, layer: Layer, op: CompositeOp) -> RenderResult<()> {
        self.record(DrawOp::Composite {
            layer,
            composite: op,
        })
    }

    fn translate(&mut self, layer: Layer, x: f64, y: f64) -> RenderResult<()> {
        self.record(DrawOp::Translate { layer, x, y })
    }

    fn scale(&mut self, layer: Layer, x: f64, y: f64) -> RenderResult<()> {
        self.record(DrawOp::Scale { layer, x, y })
    }

    fn rotate(&mut self, layer: Layer, radians: f64) -> RenderResult<()> {
        self.record(DrawOp::Rotate { layer, radians })
    }

    fn draw(&mut self, layer: Layer, source: Source<'_, MaskId>, dest: Rect) -> RenderResult<()> {
        let source = match source {
            Source::Video => RecordedSource::Video,
            Source::BackgroundImage => {
                if !self.background_image {
                    return Err(RenderError::backend("draw", "no background image"));
                }
                RecordedSource::BackgroundImage
            }
            Source::Layer(from) => RecordedSource::Layer(from),
            Source::Mask(mask) => RecordedSource::Mask(mask.0),
        };
        self.record(DrawOp::Draw {
            layer,
            source,
            dest,
        })
    }

    fn clip_polygon(&mut self, layer: Layer, points: &[Point]) -> RenderResult<()> {
        self.record(DrawOp::Clip {
            layer,
            points: points.to_vec(),
        })
    }

    fn fill_radial_gradient(&mut self, layer: Layer, lighting: &PortraitLighting) -> RenderResult<()> {
        self.record(DrawOp::Gradient {
            layer,
            lighting: *lighting,
        })
    }

    fn stroke_rect(&mut self, layer: Layer, rect: Rect, color: &str, line_width: f64) -> RenderResult<()> {
        self.record(DrawOp::StrokeRect {
            layer,
            rect,
            color: color.to_string(),
            line_width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut b = RecordingBackend::new(640.0, 480.0, 640.0, 480.0);
        b.clear(Layer::Display).expect("clear");
        b.draw(Layer::Display, Source::Video, Rect::sized(640.0, 480.0))
            .expect("draw");
        let names: Vec<_> = b.ops().iter().map(DrawOp::name).collect();
        assert_eq!(names, ["clear", "draw"]);
    }

    #[test]
    fn test_failure_injected_once() {
        let mut b = RecordingBackend::new(640.0, 480.0, 640.0, 480.0).failing_on("clear");
        assert!(b.clear(Layer::Display).is_err());
        assert!(b.clear(Layer::Display).is_ok());
        assert_eq!(b.ops().len(), 1);
    }

    #[test]
    fn test_resize_updates_layer_size() {
        let mut b = RecordingBackend::new(640.0, 480.0, 800.0, 600.0);
        assert_eq!(b.layer_size(Layer::Overlay), (0.0, 0.0));
        b.resize_layer(Layer::Overlay, 800.0, 600.0).expect("resize");
        assert_eq!(b.layer_size(Layer::Overlay), (800.0, 600.0));
    }

    #[test]
    fn test_missing_background_image_fails_draw() {
        let mut b = RecordingBackend::new(640.0, 480.0, 640.0, 480.0);
        assert!(b
            .draw(Layer::Background, Source::BackgroundImage, Rect::sized(1.0, 1.0))
            .is_err());
    }

    #[test]
    fn test_ops_serialize_with_tags() {
        let op = DrawOp::Draw {
            layer: Layer::Foreground,
            source: RecordedSource::Mask(3),
            dest: Rect::sized(2.0, 2.0),
        };
        let json = serde_json::to_value(&op).expect("json");
        assert_eq!(json["op"], "draw");
        assert_eq!(json["layer"], "foreground");
        assert_eq!(json["source"]["kind"], "mask");
        assert_eq!(json["source"]["id"], 3);
    }
}
