// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyreel application layer.
//!
//! Wires the sequencer and compositor together:
//! - Frame-accurate export to PNG sequence archives and animated GIFs
//! - A real-time preview driver for the playback scheduler
//! - RON configuration and scene manifests

pub mod config;
pub mod encode;
pub mod export;
pub mod manifest;
pub mod preview;
pub mod progress;

pub use config::{AppConfig, ConfigError, ExportSettings, PlaybackSettings};
pub use export::{
    artifact_file_name, frame_overrides, AnimationExporter, ExportArtifact, ExportError,
    ExportFormat, ExportOptions,
};
pub use manifest::Manifest;
pub use preview::{PreviewDriver, PreviewStats};
pub use progress::{ExportPhase, ExportProgress, ProgressReceiver, ProgressReporter};
