// SPDX-License-Identifier: MIT OR Apache-2.0
//! Export progress reporting.

use std::fmt;
use tokio::sync::mpsc;

/// Stage of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    /// Rendering frames
    Rendering,
    /// Packaging frames into the artifact
    Encoding,
    /// Artifact ready
    Done,
}

impl fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportPhase::Rendering => "rendering",
            ExportPhase::Encoding => "encoding",
            ExportPhase::Done => "done",
        })
    }
}

/// One progress update
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// Completed fraction in `[0, 1]`
    pub fraction: f32,
    /// Current stage
    pub phase: ExportPhase,
    /// Human-readable status line
    pub message: String,
}

/// Receiver side of a progress channel
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExportProgress>;

/// Sends progress updates to an optional listener
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<ExportProgress>>,
}

impl ProgressReporter {
    /// Reporter that drops every update
    pub fn silent() -> Self {
        Self::default()
    }

    /// Reporter paired with a fresh receiver
    pub fn channel() -> (Self, ProgressReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Send an update; a closed listener is not an error
    pub fn report(&self, fraction: f32, phase: ExportPhase, message: impl Into<String>) {
        let Some(tx) = &self.tx else {
            return;
        };
        let _ = tx.send(ExportProgress {
            fraction: fraction.clamp(0.0, 1.0),
            phase,
            message: message.into(),
        });
    }
}
