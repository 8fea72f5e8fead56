// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyreel command line.
//!
//! - `export` renders a manifest's timeline into a PNG sequence archive or GIF
//! - `preview` plays the timeline in real time, logging live transform values
//! - `still` scrubs to a time and renders one frame from live state

use clap::{Parser, Subcommand};
use keyreel_app::{
    AnimationExporter, AppConfig, ConfigError, ExportError, ExportFormat, ExportOptions, Manifest,
    PreviewDriver, ProgressReporter,
};
use keyreel_compositor::{resolve_render_target, Compositor, FsImageLoader, LiveTransforms, RenderError};
use keyreel_sequencer::{PlayDirection, TargetId};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "keyreel", version, about = "Keyframed layer motion: preview and export")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = keyreel_app::config::CONFIG_FILE_NAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Export a timeline to a frame archive or animated file
    Export {
        /// Scene manifest (RON)
        manifest: PathBuf,
        /// Target whose composite or page is exported
        #[arg(long)]
        target: String,
        /// Artifact format
        #[arg(long, value_enum, default_value_t = ExportFormat::Sequence)]
        format: ExportFormat,
        /// Output directory, overriding the configured one
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Play a timeline in real time and log live values
    Preview {
        /// Scene manifest (RON)
        manifest: PathBuf,
        /// Wall-clock seconds to play for
        #[arg(long, default_value_t = 3.0)]
        seconds: f32,
        /// Play backwards from the end
        #[arg(long)]
        reverse: bool,
    },
    /// Render a single frame at a time from live state
    Still {
        /// Scene manifest (RON)
        manifest: PathBuf,
        /// Target whose composite or page is rendered
        #[arg(long)]
        target: String,
        /// Playhead time in seconds
        #[arg(long, default_value_t = 0.0)]
        time: f32,
        /// Output PNG file
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Failed to write image: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No composite or page reachable from target: {0}")]
    TargetNotFound(String),
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("keyreel=debug,keyreel_app=debug,keyreel_sequencer=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    tracing::info!("Starting keyreel v{}", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Command::Export {
            manifest,
            target,
            format,
            out,
        } => {
            let scene = Manifest::load(&manifest)?;
            let loader = FsImageLoader::new(scene.asset_root(&manifest));
            let mut timeline = scene.timeline;

            let (progress, mut rx) = ProgressReporter::channel();
            let listener = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    tracing::debug!(
                        phase = %update.phase,
                        "{:>5.1}% {}",
                        update.fraction * 100.0,
                        update.message
                    );
                }
            });

            let exporter = AnimationExporter::new(loader)
                .with_options(ExportOptions::from(&config.export))
                .with_progress(progress);
            let result = exporter
                .export(
                    &mut timeline,
                    &scene.scene,
                    &scene.targets,
                    &TargetId::from(target),
                    format,
                )
                .await;
            drop(exporter);
            let _ = listener.await;

            let artifact = result?;
            let dir = out.unwrap_or(config.export.output_dir);
            let path = artifact.write_to(&dir).await?;
            tracing::info!(mime = artifact.mime, "Wrote {}", path.display());
        }
        Command::Preview {
            manifest,
            seconds,
            reverse,
        } => {
            let scene = Manifest::load(&manifest)?;
            let mut timeline = scene.timeline;
            let mut targets = scene.targets;
            let mut driver = PreviewDriver::new(&config.playback);

            let direction = if reverse {
                PlayDirection::Reverse
            } else {
                PlayDirection::Forward
            };
            driver.scheduler().play(&mut timeline, direction);

            let limit = Duration::from_secs_f32(seconds.max(0.0).min(3600.0));
            let stats = driver
                .run(&mut timeline, &mut targets, limit, |timeline, targets| {
                    for (id, state) in targets.iter() {
                        tracing::info!(
                            time = timeline.current_time(),
                            layer = %id,
                            scale = state.scale,
                            x = state.offset_x,
                            y = state.offset_y,
                            rotation = state.rotation,
                            opacity = state.opacity,
                            "Live values"
                        );
                    }
                })
                .await;
            tracing::info!(
                ticks = stats.ticks,
                writes = stats.writes,
                stopped = stats.stopped,
                "Preview finished"
            );
        }
        Command::Still {
            manifest,
            target,
            time,
            out,
        } => {
            let scene = Manifest::load(&manifest)?;
            let loader = FsImageLoader::new(scene.asset_root(&manifest));
            let mut timeline = scene.timeline;
            let mut targets = scene.targets;

            let target = TargetId::from(target);
            let render_target = resolve_render_target(&scene.scene, &target)
                .ok_or_else(|| CliError::TargetNotFound(target.to_string()))?;

            let mut driver = PreviewDriver::new(&config.playback);
            driver.scheduler().seek(&mut timeline, time, &mut targets);

            let mut compositor = Compositor::new(loader).with_supersample(config.export.supersample);
            let image = compositor
                .render(&render_target, &LiveTransforms(&targets))
                .await?;
            image.save(&out)?;
            tracing::info!(time = timeline.current_time(), "Wrote {}", out.display());
        }
    }

    Ok(())
}
