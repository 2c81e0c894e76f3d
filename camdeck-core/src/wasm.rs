//! WebAssembly bindings for camdeck-core.
//!
//! Exposes the pure layout and filter functions to JavaScript. The full
//! application lives in `camdeck-app`.

use wasm_bindgen::prelude::*;

use crate::{BlurMode, CameraSettings};

/// Install the panic hook. Safe to call more than once.
#[wasm_bindgen(js_name = initCore)]
pub fn init_core() {
    console_error_panic_hook::set_once();
}

fn parse_blur_mode(mode: &str) -> Result<BlurMode, String> {
    match mode {
        "none" | "" => Ok(BlurMode::None),
        "portrait" => Ok(BlurMode::Portrait),
        "full" => Ok(BlurMode::Full),
        other => Err(format!("Unknown blur mode: {other}")),
    }
}

/// Build the CSS filter string for a settings JSON object.
///
/// # Errors
///
/// Returns an error string if the settings JSON or blur mode is invalid.
#[wasm_bindgen(js_name = buildFilter)]
pub fn build_filter(settings_json: &str, blur_mode: &str) -> Result<String, String> {
    let settings: CameraSettings = serde_json::from_str(settings_json).map_err(|e| e.to_string())?;
    Ok(crate::build_filter(&settings, parse_blur_mode(blur_mode)?))
}

/// Build the CSS filter string with the face-smoothing blur appended.
///
/// # Errors
///
/// Returns an error string if the settings JSON or blur mode is invalid.
#[wasm_bindgen(js_name = buildFilterWithSmoothing)]
pub fn build_filter_with_smoothing(settings_json: &str, blur_mode: &str) -> Result<String, String> {
    let settings: CameraSettings = serde_json::from_str(settings_json).map_err(|e| e.to_string())?;
    Ok(crate::build_filter_with_smoothing(
        &settings,
        parse_blur_mode(blur_mode)?,
    ))
}

/// Letterbox fit of a video inside a canvas, as a JSON
/// `{drawWidth, drawHeight, offsetX, offsetY}` object.
///
/// # Errors
///
/// Returns an error string for zero or non-finite dimensions.
#[wasm_bindgen(js_name = getDrawDimensions)]
pub fn get_draw_dimensions(
    video_width: f64,
    video_height: f64,
    canvas_width: f64,
    canvas_height: f64,
) -> Result<String, String> {
    let dims = crate::draw_dimensions(video_width, video_height, canvas_width, canvas_height)
        .map_err(|e| e.to_string())?;
    serde_json::to_string(&dims).map_err(|e| e.to_string())
}
