//! # Camdeck CLI
//!
//! Native host for the Camdeck core and renderer. Everything the browser
//! app does per frame or per tick can be driven from here against files,
//! which makes it the place to inspect behaviour without a camera.
//!
//! ## Usage
//!
//! ```bash
//! camdeck layout --settings settings.json --blur portrait
//! camdeck track detections.json --ticks 120
//! camdeck reconcile settings.json capabilities.json --reject iso
//! camdeck plan --settings settings.json --mask --tracking --face 400,200,240,240
//! camdeck plan --settings settings.json --landmarks mesh.json
//! ```
//!
//! Every command prints one JSON document to stdout; logs go to stderr.
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `Command` - One variant per subcommand
//! - [`commands`] - The command implementations, returning JSON values

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod commands;

use std::path::PathBuf;

use camdeck_core::{BlurMode, BoundingBox, HardwareConstraint};
use camdeck_renderer::BackgroundMode;
use clap::{Args, Parser, Subcommand};

/// Command-line arguments for camdeck.
#[derive(Debug, Clone, Parser)]
#[command(name = "camdeck")]
#[command(about = "Camdeck webcam studio tools")]
#[command(version)]
pub struct CliArgs {
    /// Runtime configuration JSON (defaults apply when omitted)
    #[arg(long, env = "CAMDECK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding per-device settings files
    #[arg(long, env = "CAMDECK_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Device id whose settings are used
    #[arg(long, default_value = "default", global = true)]
    pub device: String,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Camdeck subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the draw dimensions and filter strings for a settings file
    Layout {
        /// Settings JSON merged over the device's settings
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Frame sizes
        #[command(flatten)]
        frame: FrameArgs,

        /// Blur mode: none, portrait or full
        #[arg(long, default_value = "none", value_parser = parse_blur_mode)]
        blur: BlurMode,
    },

    /// Replay recorded detections through the face-tracking controller
    Track {
        /// JSON array of frames, each an array of detections
        detections: PathBuf,

        /// Ticks to run; frames repeat when there are fewer
        #[arg(long)]
        ticks: Option<usize>,

        /// Media time between ticks in milliseconds
        #[arg(long, default_value_t = 1000.0 / 30.0)]
        frame_interval_ms: f64,

        /// Capabilities JSON; a zoom range there switches to hardware zoom
        #[arg(long)]
        capabilities: Option<PathBuf>,

        /// Video width in pixels
        #[arg(long, default_value_t = 1280.0)]
        video_width: f64,

        /// Video height in pixels
        #[arg(long, default_value_t = 720.0)]
        video_height: f64,
    },

    /// Reconcile a settings file against a device capabilities file
    Reconcile {
        /// Settings JSON merged over the device's settings
        settings: PathBuf,

        /// Capabilities JSON as reported by the track
        capabilities: PathBuf,

        /// Constraints the simulated device refuses
        #[arg(long, value_parser = parse_constraint)]
        reject: Vec<HardwareConstraint>,
    },

    /// Print the recorded draw operations for one frame
    Plan {
        /// Settings JSON merged over the device's settings
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Frame sizes
        #[command(flatten)]
        frame: FrameArgs,

        /// Blur mode: none, portrait or full
        #[arg(long, default_value = "none", value_parser = parse_blur_mode)]
        blur: BlurMode,

        /// Background mode: none or image
        #[arg(long, default_value = "none", value_parser = parse_background_mode)]
        background: BackgroundMode,

        /// Pretend a background image has been uploaded
        #[arg(long)]
        with_image: bool,

        /// Pretend a segmentation mask is available
        #[arg(long)]
        mask: bool,

        /// Face tracking on
        #[arg(long)]
        tracking: bool,

        /// Tracked face as x,y,width,height in video pixels
        #[arg(long, value_parser = parse_face)]
        face: Option<BoundingBox>,

        /// Face-mesh landmarks JSON for smoothing and portrait lighting
        #[arg(long)]
        landmarks: Option<PathBuf>,

        /// Zoom is realized by the device
        #[arg(long)]
        hardware_zoom: bool,
    },
}

/// Video and display sizes.
#[derive(Debug, Clone, Copy, Args)]
pub struct FrameArgs {
    /// Video width in pixels
    #[arg(long, default_value_t = 1280.0)]
    pub video_width: f64,

    /// Video height in pixels
    #[arg(long, default_value_t = 720.0)]
    pub video_height: f64,

    /// Display canvas width in pixels
    #[arg(long, default_value_t = 1280.0)]
    pub canvas_width: f64,

    /// Display canvas height in pixels
    #[arg(long, default_value_t = 720.0)]
    pub canvas_height: f64,
}

fn parse_keyword<T: serde::de::DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase()))
        .map_err(|_| format!("unknown mode '{value}'"))
}

fn parse_blur_mode(value: &str) -> Result<BlurMode, String> {
    parse_keyword(value)
}

fn parse_background_mode(value: &str) -> Result<BackgroundMode, String> {
    parse_keyword(value)
}

fn parse_constraint(value: &str) -> Result<HardwareConstraint, String> {
    HardwareConstraint::from_name(value).ok_or_else(|| format!("unknown constraint '{value}'"))
}

fn parse_face(value: &str) -> Result<BoundingBox, String> {
    let parts = value
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{p}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Ok(BoundingBox::new(*x, *y, *w, *h)),
        [_, _, _, _] => Err("face width and height must be positive".to_string()),
        _ => Err("expected x,y,width,height".to_string()),
    }
}
