// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frame-accurate animation export.
//!
//! Export never goes through the scheduler or live targets. Each output frame
//! evaluates every track at its exact frame time and hands the result to the
//! compositor as explicit overrides, so the artifact is independent of
//! refresh timing and live state is left untouched.

use crate::config::ExportSettings;
use crate::encode::{self, GifSettings};
use crate::progress::{ExportPhase, ProgressReporter};
use chrono::{DateTime, Local, TimeZone};
use image::RgbaImage;
use indexmap::IndexMap;
use keyreel_compositor::{
    resolve_render_target, Compositor, ImageLoader, LayerGraph, RenderError, TransformOverrides,
};
use keyreel_sequencer::{LayerTransform, TargetId, Timeline, TransformTargets};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Fraction of progress allotted to rendering; the rest covers encoding
const RENDER_SHARE: f32 = 0.9;

/// Errors that can occur during export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// No composite or page is reachable from the target
    #[error("No composite or page reachable from target: {0}")]
    TargetNotFound(TargetId),
    /// A frame could not be rendered
    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
    /// Frame or animation encoding failed
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    /// Animated file encoding exceeded its time limit
    #[error("Encoding timed out after {0:?}")]
    EncodeTimeout(Duration),
    /// The blocking encoder worker panicked or was cancelled
    #[error("Encoding worker failed: {0}")]
    Worker(String),
    /// Archive packaging failed
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// Writing the artifact failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// ZIP archive of numbered PNG frames
    Sequence,
    /// Animated GIF
    Animation,
}

impl ExportFormat {
    /// File extension of the artifact
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Sequence => "zip",
            ExportFormat::Animation => "gif",
        }
    }

    /// MIME type of the artifact
    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Sequence => "application/zip",
            ExportFormat::Animation => "image/gif",
        }
    }
}

/// A finished export
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    /// Suggested download file name
    pub file_name: String,
    /// MIME type
    pub mime: &'static str,
    /// Encoded artifact
    pub bytes: Vec<u8>,
    /// Number of frames rendered
    pub frame_count: u32,
}

impl ExportArtifact {
    /// Write the artifact into `dir` under its file name
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

/// Download file name `<prefix>_<YYYYMMDD-HHMMSS>.<ext>`
pub fn artifact_file_name<Tz: TimeZone>(
    prefix: &str,
    stamp: &DateTime<Tz>,
    format: ExportFormat,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{prefix}_{}.{}",
        stamp.format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

/// Export tuning
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Internal rendering resolution multiplier
    pub supersample: u32,
    /// Wall-clock limit for animated file encoding
    pub encode_timeout: Duration,
    /// GIF quantizer speed
    pub gif_speed: i32,
    /// Prefix of artifact file names
    pub file_prefix: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&ExportSettings::default())
    }
}

impl From<&ExportSettings> for ExportOptions {
    fn from(settings: &ExportSettings) -> Self {
        Self {
            supersample: settings.supersample,
            encode_timeout: settings.encode_timeout(),
            gif_speed: settings.gif_speed,
            file_prefix: settings.file_prefix.clone(),
        }
    }
}

/// Renders timelines into sequence archives or animated files
pub struct AnimationExporter<L> {
    loader: L,
    options: ExportOptions,
    progress: ProgressReporter,
}

impl<L: ImageLoader> AnimationExporter<L> {
    /// Create an exporter with default options and no progress listener
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            options: ExportOptions::default(),
            progress: ProgressReporter::silent(),
        }
    }

    /// Set export options
    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    /// Send progress updates to `progress`
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Export options
    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export the render target reachable from `target`.
    ///
    /// Playback is paused in place first. Live targets are only read, to
    /// snapshot the flips and alignment of every involved layer.
    pub async fn export(
        &self,
        timeline: &mut Timeline,
        graph: &impl LayerGraph,
        targets: &impl TransformTargets,
        target: &TargetId,
        format: ExportFormat,
    ) -> Result<ExportArtifact, ExportError> {
        timeline.halt();

        let render_target = resolve_render_target(graph, target)
            .ok_or_else(|| ExportError::TargetNotFound(target.clone()))?;

        let snapshot: IndexMap<TargetId, LayerTransform> = render_target
            .transform_ids()
            .map(|id| (id.clone(), targets.get_state(id).unwrap_or_default()))
            .collect();

        let total = timeline.frame_count();
        let started = Instant::now();
        tracing::info!(
            timeline = %timeline.name,
            render_target = %render_target.id,
            frames = total,
            fps = timeline.fps.per_second(),
            "Starting {format:?} export"
        );

        // A fresh compositor per export starts with empty caches
        let mut compositor = Compositor::new(&self.loader).with_supersample(self.options.supersample);
        let mut pngs = Vec::new();
        let mut images = Vec::new();

        for frame in 0..total {
            let time = timeline.frame_to_time(frame);
            let overrides = frame_overrides(timeline, &snapshot, time);
            let image = compositor.render(&render_target, &overrides).await?;
            match format {
                ExportFormat::Sequence => pngs.push(encode::encode_png(&image)?),
                ExportFormat::Animation => images.push(image),
            }

            let done = frame + 1;
            self.progress.report(
                RENDER_SHARE * done as f32 / total as f32,
                ExportPhase::Rendering,
                format!("Rendered frame {done}/{total}"),
            );
        }

        self.progress.report(
            RENDER_SHARE,
            ExportPhase::Encoding,
            format!("Encoding {}", format.extension()),
        );
        let bytes = match format {
            ExportFormat::Sequence => encode::write_sequence_zip(&pngs)?,
            ExportFormat::Animation => self.encode_animation(images, timeline).await?,
        };
        self.progress.report(
            1.0,
            ExportPhase::Encoding,
            format!("Encoded {} ({} bytes)", format.extension(), bytes.len()),
        );

        let artifact = ExportArtifact {
            file_name: artifact_file_name(&self.options.file_prefix, &Local::now(), format),
            mime: format.mime(),
            bytes,
            frame_count: total,
        };
        self.progress.report(1.0, ExportPhase::Done, format!("Exported {}", artifact.file_name));
        tracing::info!(
            file = %artifact.file_name,
            bytes = artifact.bytes.len(),
            "Export finished in {:.2?}",
            started.elapsed()
        );
        Ok(artifact)
    }

    async fn encode_animation(
        &self,
        images: Vec<RgbaImage>,
        timeline: &Timeline,
    ) -> Result<Vec<u8>, ExportError> {
        let settings = GifSettings {
            fps: timeline.fps.per_second(),
            looping: timeline.looping,
            speed: self.options.gif_speed,
        };
        let progress = self.progress.clone();
        encode::encode_gif(images, settings, self.options.encode_timeout, move |done, total| {
            progress.report(
                RENDER_SHARE + (1.0 - RENDER_SHARE) * done as f32 / total as f32,
                ExportPhase::Encoding,
                format!("Encoded frame {done}/{total}"),
            );
        })
        .await
    }
}

/// Transforms of every involved layer at `time`.
///
/// Animated channels come from the tracks; flips and alignment, and every
/// channel of an unanimated layer, come from the snapshot.
pub fn frame_overrides(
    timeline: &Timeline,
    snapshot: &IndexMap<TargetId, LayerTransform>,
    time: f32,
) -> TransformOverrides {
    let mut overrides = TransformOverrides::new();
    for (id, base) in snapshot {
        let state = match timeline.track(id) {
            Some(track) if !track.muted && !track.is_empty() => {
                base.with_animated(&track.evaluate(time, timeline.default_easing))
            }
            _ => *base,
        };
        overrides.insert(id.clone(), state);
    }
    overrides
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba};
    use keyreel_compositor::{LayerSlot, LayerSource, MemoryImageLoader, RenderTarget, SceneGraph};
    use keyreel_sequencer::{FrameRate, PlayDirection, Scheduler, TargetStore, Transform};
    use std::io::Cursor;

    fn loader() -> MemoryImageLoader {
        let mut loader = MemoryImageLoader::new();
        loader.insert(
            "bg",
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([20, 20, 60, 255]))),
        );
        loader.insert(
            "logo",
            DynamicImage::ImageRgba8(RgbaImage::from_fn(6, 4, |x, _| {
                Rgba([x as u8 * 40, 200, 0, 255])
            })),
        );
        loader.insert_broken("broken");
        loader
    }

    fn scene() -> SceneGraph {
        let mut scene = SceneGraph::new();
        scene.add(
            RenderTarget::composite("stack", 24, 16)
                .with_slot(LayerSlot::bound("bg", LayerSource::fill("bg")))
                .with_slot(LayerSlot::bound("logo", LayerSource::transformed("logo", "logo")))
                .with_slot(LayerSlot::bound("broken", LayerSource::transformed("broken", "x"))),
        );
        scene
    }

    fn timeline() -> Timeline {
        let mut timeline = Timeline::new("intro", 2.0).with_fps(FrameRate::Fps24);
        let track = timeline.track_for("logo");
        track.set_keyframe_at(0.0, Transform::IDENTITY, None);
        track.set_keyframe_at(
            1.0,
            Transform {
                scale: 2.0,
                rotation: 90.0,
                ..Transform::IDENTITY
            },
            None,
        );
        timeline
    }

    fn targets() -> TargetStore {
        let mut targets = TargetStore::new();
        targets.insert(
            "logo",
            LayerTransform {
                flip_h: true,
                ..LayerTransform::default()
            },
        );
        targets.insert("x", LayerTransform::default());
        targets
    }

    fn options() -> ExportOptions {
        ExportOptions {
            supersample: 2,
            encode_timeout: Duration::from_secs(60),
            gif_speed: 30,
            file_prefix: "clip".to_string(),
        }
    }

    #[test]
    fn test_artifact_file_name() {
        let stamp = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 30).unwrap();
        assert_eq!(
            artifact_file_name("clip", &stamp, ExportFormat::Sequence),
            "clip_20240309-070530.zip"
        );
        assert_eq!(
            artifact_file_name("clip", &stamp, ExportFormat::Animation),
            "clip_20240309-070530.gif"
        );
    }

    #[test]
    fn test_overrides_keep_snapshot_flips() {
        let timeline = timeline();
        let mut snapshot = IndexMap::new();
        snapshot.insert(
            TargetId::from("logo"),
            LayerTransform {
                flip_v: true,
                ..LayerTransform::default()
            },
        );
        snapshot.insert(TargetId::from("still"), LayerTransform::default());

        let overrides = frame_overrides(&timeline, &snapshot, 0.5);
        let logo = overrides.get(&TargetId::from("logo")).unwrap();
        assert!((logo.scale - 1.5).abs() < 1e-5);
        assert!((logo.rotation - 45.0).abs() < 1e-4);
        assert!(logo.flip_v);
        assert_eq!(overrides.get(&TargetId::from("still")), Some(&LayerTransform::default()));
    }

    #[tokio::test]
    async fn test_sequence_export() {
        let mut timeline = timeline();
        let targets = targets();
        let (progress, mut rx) = ProgressReporter::channel();
        let exporter = AnimationExporter::new(loader())
            .with_options(options())
            .with_progress(progress);

        let artifact = exporter
            .export(&mut timeline, &scene(), &targets, &TargetId::from("logo"), ExportFormat::Sequence)
            .await
            .unwrap();

        assert_eq!(artifact.frame_count, 49);
        assert_eq!(artifact.mime, "application/zip");
        assert!(artifact.file_name.starts_with("clip_"));
        assert!(artifact.file_name.ends_with(".zip"));

        let mut archive = zip::ZipArchive::new(Cursor::new(artifact.bytes)).unwrap();
        assert_eq!(archive.len(), 49);
        assert_eq!(archive.by_index(0).unwrap().name(), "frame_00000.png");
        assert_eq!(archive.by_index(48).unwrap().name(), "frame_00048.png");

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        assert!(updates.windows(2).all(|w| w[0].fraction <= w[1].fraction));
        let last = updates.last().unwrap();
        assert_eq!(last.phase, ExportPhase::Done);
        assert_eq!(last.fraction, 1.0);
    }

    #[tokio::test]
    async fn test_export_is_deterministic() {
        let targets = targets();
        let exporter = AnimationExporter::new(loader()).with_options(options());

        let mut first_timeline = timeline();
        let first = exporter
            .export(&mut first_timeline, &scene(), &targets, &TargetId::from("stack"), ExportFormat::Sequence)
            .await
            .unwrap();

        // Live playback state must not leak into the export
        let mut second_timeline = timeline();
        let mut live = targets.clone();
        let mut scheduler = Scheduler::default();
        scheduler.play(&mut second_timeline, PlayDirection::Forward);
        scheduler.tick(&mut second_timeline, Duration::from_millis(730), &mut live);

        let second = exporter
            .export(&mut second_timeline, &scene(), &targets, &TargetId::from("stack"), ExportFormat::Sequence)
            .await
            .unwrap();

        assert!(!second_timeline.is_playing());
        assert_eq!(first.bytes, second.bytes);
    }

    #[tokio::test]
    async fn test_gif_export() {
        let mut timeline = Timeline::new("short", 0.5)
            .with_fps(FrameRate::Fps12)
            .with_looping(true);
        timeline.track_for("logo").set_keyframe_at(
            0.5,
            Transform {
                offset_x: 20.0,
                ..Transform::IDENTITY
            },
            None,
        );
        let (progress, mut rx) = ProgressReporter::channel();
        let exporter = AnimationExporter::new(loader())
            .with_options(options())
            .with_progress(progress);
        let artifact = exporter
            .export(&mut timeline, &scene(), &targets(), &TargetId::from("logo"), ExportFormat::Animation)
            .await
            .unwrap();

        assert_eq!(artifact.frame_count, 7);
        assert_eq!(artifact.mime, "image/gif");
        assert!(artifact.bytes.starts_with(b"GIF89a"));

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        assert!(updates.windows(2).all(|w| w[0].fraction <= w[1].fraction));
        let encoding: Vec<_> = updates
            .iter()
            .filter(|u| u.phase == ExportPhase::Encoding)
            .collect();
        // One before the worker starts, one per frame, one after it joins
        assert_eq!(encoding.len(), 9);
        assert_eq!(encoding[1].message, "Encoded frame 1/7");
        assert!(encoding[1].fraction > RENDER_SHARE);
        assert_eq!(updates.last().unwrap().phase, ExportPhase::Done);
    }

    #[tokio::test]
    async fn test_live_state_unchanged() {
        let mut timeline = timeline();
        let targets = targets();
        let before = targets.clone();
        let exporter = AnimationExporter::new(loader()).with_options(options());

        exporter
            .export(&mut timeline, &scene(), &targets, &TargetId::from("logo"), ExportFormat::Sequence)
            .await
            .unwrap();
        let failed = exporter
            .export(&mut timeline, &scene(), &targets, &TargetId::from("nowhere"), ExportFormat::Sequence)
            .await;

        assert!(failed.is_err());
        assert_eq!(
            targets.iter().collect::<Vec<_>>(),
            before.iter().collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_unreachable_target() {
        let mut timeline = timeline();
        let (progress, mut rx) = ProgressReporter::channel();
        let exporter = AnimationExporter::new(loader()).with_progress(progress);

        let result = exporter
            .export(&mut timeline, &scene(), &targets(), &TargetId::from("nowhere"), ExportFormat::Animation)
            .await;

        assert!(matches!(result, Err(ExportError::TargetNotFound(id)) if id.as_str() == "nowhere"));
        // No frame work happened
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broken_layer_skipped() {
        let mut timeline = Timeline::new("still", 0.1).with_fps(FrameRate::Fps12);
        let exporter = AnimationExporter::new(loader()).with_options(options());

        let with_broken = exporter
            .export(&mut timeline, &scene(), &targets(), &TargetId::from("stack"), ExportFormat::Sequence)
            .await
            .unwrap();

        let mut clean = SceneGraph::new();
        clean.add(
            RenderTarget::composite("stack", 24, 16)
                .with_slot(LayerSlot::bound("bg", LayerSource::fill("bg")))
                .with_slot(LayerSlot::bound("logo", LayerSource::transformed("logo", "logo"))),
        );
        let without = exporter
            .export(&mut timeline, &clean, &targets(), &TargetId::from("stack"), ExportFormat::Sequence)
            .await
            .unwrap();

        assert_eq!(with_broken.frame_count, 3);
        let frames = |bytes: Vec<u8>| {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
            (0..archive.len())
                .map(|i| {
                    let mut content = Vec::new();
                    std::io::Read::read_to_end(&mut archive.by_index(i).unwrap(), &mut content).unwrap();
                    content
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(frames(with_broken.bytes), frames(without.bytes));
    }
}
