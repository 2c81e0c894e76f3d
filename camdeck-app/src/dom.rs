//! Canvas 2D implementation of the compositing backend.
//!
//! The display and overlay canvases come from the page; the background,
//! foreground and snapshot buffers are detached canvases created here.

use camdeck_core::{PortraitLighting, Point, Rect};
use camdeck_renderer::{CompositeOp, CompositingBackend, Layer, RenderError, RenderResult, Source};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlImageElement, HtmlVideoElement,
    ImageBitmap,
};

use crate::js::error_message;
use crate::AppError;

/// One canvas and its context, with the save depth tracked so the state
/// stack can be unwound after a failed frame.
struct Surface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    depth: usize,
}

impl Surface {
    fn new(canvas: HtmlCanvasElement) -> Result<Self, AppError> {
        let ctx = canvas
            .get_context("2d")
            .map_err(|e| AppError::Context(error_message(&e)))?
            .ok_or_else(|| AppError::Context("2D context not available".to_string()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| AppError::Context("Failed to cast to 2D context".to_string()))?;
        Ok(Self {
            canvas,
            ctx,
            depth: 0,
        })
    }

    fn detached(document: &Document) -> Result<Self, AppError> {
        let canvas = document
            .create_element("canvas")
            .map_err(|e| AppError::Context(error_message(&e)))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| AppError::NotACanvas("offscreen".to_string()))?;
        Self::new(canvas)
    }

    fn size(&self) -> (f64, f64) {
        (f64::from(self.canvas.width()), f64::from(self.canvas.height()))
    }
}

fn js_err(op: &'static str) -> impl Fn(JsValue) -> RenderError {
    move |e| RenderError::backend(op, error_message(&e))
}

/// Browser canvases plus the camera video element.
pub struct DomBackend {
    video: HtmlVideoElement,
    display: Surface,
    overlay: Surface,
    background: Surface,
    foreground: Surface,
    snapshot: Surface,
    background_image: Option<HtmlImageElement>,
}

impl DomBackend {
    /// Wrap the page elements and allocate the offscreen buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if a 2D context cannot be created.
    pub fn new(
        document: &Document,
        video: HtmlVideoElement,
        display: HtmlCanvasElement,
        overlay: HtmlCanvasElement,
    ) -> Result<Self, AppError> {
        Ok(Self {
            video,
            display: Surface::new(display)?,
            overlay: Surface::new(overlay)?,
            background: Surface::detached(document)?,
            foreground: Surface::detached(document)?,
            snapshot: Surface::detached(document)?,
            background_image: None,
        })
    }

    /// The camera video element.
    #[must_use]
    pub fn video(&self) -> &HtmlVideoElement {
        &self.video
    }

    /// Replace or remove the uploaded background image.
    pub fn set_background_image(&mut self, image: Option<HtmlImageElement>) {
        self.background_image = image;
    }

    fn surface(&self, layer: Layer) -> &Surface {
        match layer {
            Layer::Display => &self.display,
            Layer::Overlay => &self.overlay,
            Layer::Background => &self.background,
            Layer::Foreground => &self.foreground,
            Layer::Snapshot => &self.snapshot,
        }
    }

    fn surface_mut(&mut self, layer: Layer) -> &mut Surface {
        match layer {
            Layer::Display => &mut self.display,
            Layer::Overlay => &mut self.overlay,
            Layer::Background => &mut self.background,
            Layer::Foreground => &mut self.foreground,
            Layer::Snapshot => &mut self.snapshot,
        }
    }

    fn ctx(&self, layer: Layer) -> &CanvasRenderingContext2d {
        &self.surface(layer).ctx
    }
}

impl CompositingBackend for DomBackend {
    type Mask = ImageBitmap;

    fn video_size(&self) -> (f64, f64) {
        (
            f64::from(self.video.video_width()),
            f64::from(self.video.video_height()),
        )
    }

    fn video_playing(&self) -> bool {
        !self.video.paused() && !self.video.ended()
    }

    fn display_size(&self) -> (f64, f64) {
        (
            f64::from(self.display.canvas.client_width()),
            f64::from(self.display.canvas.client_height()),
        )
    }

    fn has_background_image(&self) -> bool {
        self.background_image
            .as_ref()
            .is_some_and(|img| img.complete() && img.natural_width() > 0)
    }

    fn layer_size(&self, layer: Layer) -> (f64, f64) {
        self.surface(layer).size()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn resize_layer(&mut self, layer: Layer, width: f64, height: f64) -> RenderResult<()> {
        let surface = self.surface_mut(layer);
        surface.canvas.set_width(width.round() as u32);
        surface.canvas.set_height(height.round() as u32);
        // Resizing a canvas resets its context state.
        surface.depth = 0;
        Ok(())
    }

    fn clear(&mut self, layer: Layer) -> RenderResult<()> {
        let surface = self.surface(layer);
        let (w, h) = surface.size();
        surface.ctx.save();
        surface
            .ctx
            .set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
            .map_err(js_err("clear"))?;
        surface.ctx.clear_rect(0.0, 0.0, w, h);
        surface.ctx.restore();
        Ok(())
    }

    fn save(&mut self, layer: Layer) -> RenderResult<()> {
        let surface = self.surface_mut(layer);
        surface.ctx.save();
        surface.depth += 1;
        Ok(())
    }

    fn restore(&mut self, layer: Layer) -> RenderResult<()> {
        let surface = self.surface_mut(layer);
        if surface.depth == 0 {
            return Err(RenderError::backend("restore", format!("unbalanced restore on {layer}")));
        }
        surface.ctx.restore();
        surface.depth -= 1;
        Ok(())
    }

    fn reset_state(&mut self, layer: Layer) -> RenderResult<()> {
        let surface = self.surface_mut(layer);
        while surface.depth > 0 {
            surface.ctx.restore();
            surface.depth -= 1;
        }
        surface.ctx.reset_transform().map_err(js_err("reset"))?;
        surface.ctx.set_filter("none");
        surface
            .ctx
            .set_global_composite_operation(CompositeOp::SourceOver.as_css())
            .map_err(js_err("reset"))
    }

    fn set_filter(&mut self, layer: Layer, filter: &str) -> RenderResult<()> {
        self.ctx(layer).set_filter(filter);
        Ok(())
    }

    fn set_composite(&mut self, layer: Layer, op: CompositeOp) -> RenderResult<()> {
        self.ctx(layer)
            .set_global_composite_operation(op.as_css())
            .map_err(js_err("composite"))
    }

    fn translate(&mut self, layer: Layer, x: f64, y: f64) -> RenderResult<()> {
        self.ctx(layer).translate(x, y).map_err(js_err("translate"))
    }

    fn scale(&mut self, layer: Layer, x: f64, y: f64) -> RenderResult<()> {
        self.ctx(layer).scale(x, y).map_err(js_err("scale"))
    }

    fn rotate(&mut self, layer: Layer, radians: f64) -> RenderResult<()> {
        self.ctx(layer).rotate(radians).map_err(js_err("rotate"))
    }

    fn draw(&mut self, layer: Layer, source: Source<'_, ImageBitmap>, dest: Rect) -> RenderResult<()> {
        let ctx = self.ctx(layer);
        let Rect {
            x,
            y,
            width,
            height,
        } = dest;
        let result = match source {
            Source::Video => {
                ctx.draw_image_with_html_video_element_and_dw_and_dh(&self.video, x, y, width, height)
            }
            Source::BackgroundImage => {
                let image = self
                    .background_image
                    .as_ref()
                    .ok_or_else(|| RenderError::backend("draw", "no background image"))?;
                ctx.draw_image_with_html_image_element_and_dw_and_dh(image, x, y, width, height)
            }
            Source::Layer(from) => ctx.draw_image_with_html_canvas_element_and_dw_and_dh(
                &self.surface(from).canvas,
                x,
                y,
                width,
                height,
            ),
            Source::Mask(mask) => {
                ctx.draw_image_with_image_bitmap_and_dw_and_dh(mask, x, y, width, height)
            }
        };
        result.map_err(js_err("draw"))
    }

    fn clip_polygon(&mut self, layer: Layer, points: &[Point]) -> RenderResult<()> {
        let ctx = self.ctx(layer);
        let Some((first, rest)) = points.split_first() else {
            return Err(RenderError::backend("clip", "empty polygon"));
        };
        ctx.begin_path();
        ctx.move_to(first.x, first.y);
        for p in rest {
            ctx.line_to(p.x, p.y);
        }
        ctx.close_path();
        ctx.clip();
        Ok(())
    }

    fn fill_radial_gradient(&mut self, layer: Layer, lighting: &PortraitLighting) -> RenderResult<()> {
        let surface = self.surface(layer);
        let (w, h) = surface.size();
        let gradient = surface
            .ctx
            .create_radial_gradient(
                lighting.center_x,
                lighting.center_y,
                lighting.inner_radius,
                lighting.center_x,
                lighting.center_y,
                lighting.outer_radius,
            )
            .map_err(js_err("gradient"))?;
        gradient
            .add_color_stop(0.0, &lighting.inner_color())
            .map_err(js_err("gradient"))?;
        gradient
            .add_color_stop(1.0, lighting.outer_color())
            .map_err(js_err("gradient"))?;
        surface.ctx.set_fill_style_canvas_gradient(&gradient);
        surface.ctx.fill_rect(0.0, 0.0, w, h);
        Ok(())
    }

    fn stroke_rect(&mut self, layer: Layer, rect: Rect, color: &str, line_width: f64) -> RenderResult<()> {
        let ctx = self.ctx(layer);
        ctx.set_stroke_style_str(color);
        ctx.set_line_width(line_width);
        ctx.stroke_rect(rect.x, rect.y, rect.width, rect.height);
        Ok(())
    }
}
