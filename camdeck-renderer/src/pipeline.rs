//! Per-frame compositing pipeline.
//!
//! ```text
//!  resize ─► base layer ─► filters ─► un-blur ─► lighting ─► transform ─► overlay
//!            (segmented                (eyes,      (soft-     (mirror,
//!             or raw)                   mouth)      light)     rotate, zoom)
//! ```
//!
//! Every input is a snapshot taken by the caller before the frame starts;
//! the pipeline never waits on the AI producers. A failing frame is logged
//! and reported, and the next call starts from a clean state.

use camdeck_core::{
    apply_transforms, build_filter, build_filter_with_smoothing, draw_dimensions, BlurMode,
    BoundingBox, CameraSettings, DrawDimensions, FaceLandmarks, PipelineConfig, Rect,
    TransformParams,
};
use serde::{Deserialize, Serialize};

use crate::backend::{CompositeOp, CompositingBackend, Layer, LayerTransform, Source};
use crate::effects::{apply_portrait_lighting, lighting_for, unblur_regions};
use crate::overlay::{draw_overlay, OverlayStyle};
use crate::RenderResult;

/// Background replacement selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// Keep the real background.
    #[default]
    None,
    /// Replace it with the uploaded image.
    Image,
}

/// Everything one frame reads.
#[derive(Debug)]
pub struct FrameInputs<'a, M> {
    /// Settings snapshot.
    pub settings: &'a CameraSettings,
    /// Latest segmentation mask, possibly from an earlier frame.
    pub mask: Option<&'a M>,
    /// Latest face-mesh landmarks.
    pub landmarks: Option<&'a FaceLandmarks>,
    /// Latest tracked face, video pixels.
    pub overlay_box: Option<&'a BoundingBox>,
    /// Whether face tracking is on.
    pub tracking_active: bool,
    /// Whether zoom is realized by the device.
    pub is_hardware_zoom: bool,
    /// Background replacement selection.
    pub background: BackgroundMode,
    /// Blur mode.
    pub blur_mode: BlurMode,
}

impl<'a, M> FrameInputs<'a, M> {
    /// Inputs with no AI output, tracking off and no background effects.
    #[must_use]
    pub fn new(settings: &'a CameraSettings) -> Self {
        Self {
            settings,
            mask: None,
            landmarks: None,
            overlay_box: None,
            tracking_active: false,
            is_hardware_zoom: false,
            background: BackgroundMode::None,
            blur_mode: BlurMode::None,
        }
    }
}

/// What the base layer was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseLayer {
    /// Raw video.
    Video,
    /// Segmented subject over the uploaded image.
    ReplacedBackground,
    /// Segmented subject over the blurred video.
    PortraitBlur,
}

/// What a rendered frame did.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameStats {
    /// Base layer source.
    pub base: BaseLayer,
    /// Smoothing blur applied with eye/mouth regions restored.
    pub smoothing_applied: bool,
    /// Portrait lighting blended.
    pub lighting_applied: bool,
    /// Geometric transform applied.
    pub transformed: bool,
    /// Tracking box drawn.
    pub overlay_drawn: bool,
    /// Letterbox placement used for the frame.
    pub dims: DrawDimensions,
}

/// Why a frame was not drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// Video metadata not loaded yet.
    NoVideo,
    /// Video paused or ended.
    Paused,
    /// Display has no size (hidden or detached).
    NoCanvas,
}

/// Result of one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "camelCase")]
pub enum FrameOutcome {
    /// Frame drawn.
    Rendered(FrameStats),
    /// Nothing to draw this tick.
    Skipped(SkipReason),
    /// A backend call failed; the frame was abandoned.
    Failed(String),
}

/// The frame compositor.
#[derive(Debug, Clone, Default)]
pub struct RenderPipeline {
    config: PipelineConfig,
    frames: u64,
    failures: u64,
}

const LAYERS: [Layer; 5] = [
    Layer::Display,
    Layer::Overlay,
    Layer::Background,
    Layer::Foreground,
    Layer::Snapshot,
];

impl RenderPipeline {
    /// Create a pipeline.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            frames: 0,
            failures: 0,
        }
    }

    /// Pipeline constants.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Frames rendered successfully.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames abandoned after a backend failure.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Render one frame. Never panics and never propagates an error.
    pub fn render<B: CompositingBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        inputs: &FrameInputs<'_, B::Mask>,
    ) -> FrameOutcome {
        let (vw, vh) = backend.video_size();
        if vw <= 0.0 || vh <= 0.0 {
            return FrameOutcome::Skipped(SkipReason::NoVideo);
        }
        if !backend.video_playing() {
            return FrameOutcome::Skipped(SkipReason::Paused);
        }
        let (dw, dh) = backend.display_size();
        if dw <= 0.0 || dh <= 0.0 {
            return FrameOutcome::Skipped(SkipReason::NoCanvas);
        }

        match self.render_frame(backend, inputs, (vw, vh), (dw, dh)) {
            Ok(stats) => {
                self.frames += 1;
                FrameOutcome::Rendered(stats)
            }
            Err(e) => {
                self.failures += 1;
                tracing::error!(error = %e, failures = self.failures, "Frame failed");
                for layer in LAYERS {
                    if let Err(reset) = backend.reset_state(layer) {
                        tracing::warn!(%layer, error = %reset, "Layer reset failed");
                    }
                }
                FrameOutcome::Failed(e.to_string())
            }
        }
    }

    fn render_frame<B: CompositingBackend + ?Sized>(
        &self,
        backend: &mut B,
        inputs: &FrameInputs<'_, B::Mask>,
        video: (f64, f64),
        display: (f64, f64),
    ) -> RenderResult<FrameStats> {
        resize_layers(backend, video, display)?;
        let dims = draw_dimensions(video.0, video.1, display.0, display.1)?;
        let settings = inputs.settings;

        // Base layer, in video space when segmenting.
        let base = choose_base(backend, inputs);
        let source = match (base, inputs.mask) {
            (BaseLayer::Video, _) | (_, None) => Source::Video,
            (kind, Some(mask)) => {
                self.composite_segmented(backend, kind, mask, video)?;
                Source::Layer(Layer::Background)
            }
        };
        let base = if matches!(source, Source::Video) {
            BaseLayer::Video
        } else {
            base
        };

        // Filters. Smoothing only makes sense when the features can be restored.
        let base_filter = build_filter(settings, inputs.blur_mode);
        let landmarks = inputs.landmarks.filter(|l| !l.is_empty());
        let smoothing = settings.face_smoothing > 0.0 && landmarks.is_some();
        let display_filter = if smoothing {
            build_filter_with_smoothing(settings, inputs.blur_mode)
        } else {
            base_filter.clone()
        };

        backend.reset_state(Layer::Display)?;
        backend.clear(Layer::Display)?;
        backend.set_filter(Layer::Display, &display_filter)?;
        backend.draw(Layer::Display, source, dims.rect())?;

        let mut smoothing_applied = false;
        if let (true, Some(landmarks)) = (smoothing, landmarks) {
            if self.config.intensify_smoothing {
                backend.draw(
                    Layer::Display,
                    Source::Layer(Layer::Display),
                    Rect::sized(display.0, display.1),
                )?;
            }
            let regions = unblur_regions(backend, source, &base_filter, landmarks, video, &dims)?;
            smoothing_applied = regions > 0;
        }
        backend.set_filter(Layer::Display, "none")?;

        let lighting = landmarks.and_then(|l| lighting_for(settings.portrait_lighting, l, video, &dims));
        if let Some(lighting) = &lighting {
            apply_portrait_lighting(backend, lighting)?;
        }

        let params = TransformParams::from(settings);
        let transformed = needs_transform(&params, inputs.is_hardware_zoom);
        if transformed {
            transform_display(backend, display, &dims, &params, inputs.is_hardware_zoom)?;
        }

        let style = OverlayStyle {
            color: &self.config.overlay_color,
            line_width: self.config.overlay_line_width,
        };
        let face = inputs.overlay_box.filter(|_| inputs.tracking_active);
        let overlay = draw_overlay(backend, face, video, &dims, &style)?;

        let stats = FrameStats {
            base,
            smoothing_applied,
            lighting_applied: lighting.is_some(),
            transformed,
            overlay_drawn: overlay.is_some(),
            dims,
        };
        tracing::trace!(?stats, "Frame rendered");
        Ok(stats)
    }

    fn composite_segmented<B: CompositingBackend + ?Sized>(
        &self,
        backend: &mut B,
        kind: BaseLayer,
        mask: &B::Mask,
        video: (f64, f64),
    ) -> RenderResult<()> {
        let full = Rect::sized(video.0, video.1);

        backend.reset_state(Layer::Background)?;
        backend.clear(Layer::Background)?;
        if kind == BaseLayer::ReplacedBackground {
            backend.draw(Layer::Background, Source::BackgroundImage, full)?;
        } else {
            let blur = format!("blur({}px)", self.config.portrait_background_blur_px);
            backend.set_filter(Layer::Background, &blur)?;
            backend.draw(Layer::Background, Source::Video, full)?;
            backend.set_filter(Layer::Background, "none")?;
        }

        backend.reset_state(Layer::Foreground)?;
        backend.clear(Layer::Foreground)?;
        backend.draw(Layer::Foreground, Source::Video, full)?;
        backend.set_composite(Layer::Foreground, CompositeOp::DestinationIn)?;
        backend.draw(Layer::Foreground, Source::Mask(mask), full)?;
        backend.set_composite(Layer::Foreground, CompositeOp::SourceOver)?;

        backend.draw(Layer::Background, Source::Layer(Layer::Foreground), full)
    }
}

/// Background image wins over portrait blur; a missing image falls back.
fn choose_base<B: CompositingBackend + ?Sized>(
    backend: &B,
    inputs: &FrameInputs<'_, B::Mask>,
) -> BaseLayer {
    let portrait = inputs.blur_mode == BlurMode::Portrait;
    match inputs.background {
        BackgroundMode::Image if backend.has_background_image() => BaseLayer::ReplacedBackground,
        BackgroundMode::Image if !portrait => {
            tracing::debug!("Background image not uploaded, drawing raw video");
            BaseLayer::Video
        }
        _ if portrait => BaseLayer::PortraitBlur,
        _ => BaseLayer::Video,
    }
}

/// Display-sized layers follow the display; compositing buffers follow the video.
#[allow(clippy::float_cmp)]
fn resize_layers<B: CompositingBackend + ?Sized>(
    backend: &mut B,
    video: (f64, f64),
    display: (f64, f64),
) -> RenderResult<()> {
    for layer in LAYERS {
        let want = match layer {
            Layer::Display | Layer::Overlay | Layer::Snapshot => display,
            Layer::Background | Layer::Foreground => video,
        };
        if backend.layer_size(layer) != want {
            tracing::debug!(%layer, width = want.0, height = want.1, "Resizing layer");
            backend.resize_layer(layer, want.0, want.1)?;
        }
    }
    Ok(())
}

/// Whether the transform changes anything: no mirror, no rotation and no
/// software zoom is an identity.
#[must_use]
pub fn needs_transform(params: &TransformParams, is_hardware_zoom: bool) -> bool {
    params.mirror_h
        || params.mirror_v
        || params.rotation.rem_euclid(360.0).abs() > f64::EPSILON
        || (!is_hardware_zoom && params.zoom > 100.0)
}

fn transform_display<B: CompositingBackend + ?Sized>(
    backend: &mut B,
    display: (f64, f64),
    dims: &DrawDimensions,
    params: &TransformParams,
    is_hardware_zoom: bool,
) -> RenderResult<()> {
    let full = Rect::sized(display.0, display.1);

    backend.clear(Layer::Snapshot)?;
    backend.draw(Layer::Snapshot, Source::Layer(Layer::Display), full)?;
    backend.clear(Layer::Display)?;
    backend.save(Layer::Display)?;

    let mut target = LayerTransform::new(&mut *backend, Layer::Display);
    apply_transforms(
        &mut target,
        display.0,
        display.1,
        dims.draw_width,
        dims.draw_height,
        params,
        is_hardware_zoom,
    );
    target.finish()?;

    backend.draw(Layer::Display, Source::Layer(Layer::Snapshot), full)?;
    backend.restore(Layer::Display)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_params_skip_transform() {
        let params = TransformParams::default();
        assert!(!needs_transform(&params, false));
        assert!(!needs_transform(&params, true));
    }

    #[test]
    fn test_zoom_only_transforms_in_software() {
        let params = TransformParams {
            zoom: 200.0,
            ..TransformParams::default()
        };
        assert!(needs_transform(&params, false));
        assert!(!needs_transform(&params, true));
    }

    #[test]
    fn test_mirror_or_rotation_always_transforms() {
        let mirrored = TransformParams {
            mirror_h: true,
            ..TransformParams::default()
        };
        let rotated = TransformParams {
            rotation: 90.0,
            ..TransformParams::default()
        };
        assert!(needs_transform(&mirrored, true));
        assert!(needs_transform(&rotated, true));
    }

    #[test]
    fn test_pan_without_zoom_is_identity() {
        let params = TransformParams {
            pan: 90.0,
            tilt: -45.0,
            ..TransformParams::default()
        };
        assert!(!needs_transform(&params, false));
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(FrameOutcome::Skipped(SkipReason::NoVideo)).expect("json");
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["detail"], "noVideo");
    }
}
