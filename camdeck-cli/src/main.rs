//! Camdeck command-line entry point.

use camdeck_cli::commands::{self, PlanOptions, TrackOptions};
use camdeck_cli::{CliArgs, Command};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured tracing on stderr with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: info,camdeck_core=debug,camdeck_renderer=debug).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,camdeck_core=debug,camdeck_renderer=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let config = commands::load_config(args.config.as_deref())?;
    let store = commands::open_store(args.data_dir.as_deref(), &args.device)?;
    let device = args.device.as_str();

    let output = match args.command {
        Command::Layout {
            settings,
            frame,
            blur,
        } => {
            let settings = commands::merge_settings_file(&store, device, settings.as_deref())?;
            commands::layout(&settings, frame, blur)?
        }
        Command::Track {
            detections,
            ticks,
            frame_interval_ms,
            capabilities,
            video_width,
            video_height,
        } => commands::track_files(
            &config,
            &store,
            device,
            &detections,
            capabilities.as_deref(),
            ticks,
            TrackOptions {
                ticks: 0,
                frame_interval_ms,
                video_width,
                video_height,
            },
        )?,
        Command::Reconcile {
            settings,
            capabilities,
            reject,
        } => commands::reconcile_files(&store, device, &settings, &capabilities, &reject)?,
        Command::Plan {
            settings,
            frame,
            blur,
            background,
            with_image,
            mask,
            tracking,
            face,
            landmarks,
            hardware_zoom,
        } => {
            let settings = commands::merge_settings_file(&store, device, settings.as_deref())?;
            let landmarks = landmarks
                .as_deref()
                .map(commands::read_landmarks)
                .transpose()?;
            let options = PlanOptions {
                blur,
                background,
                with_image,
                mask,
                tracking,
                face,
                landmarks,
                hardware_zoom,
            };
            commands::plan(&config, &settings, frame, &options)
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
