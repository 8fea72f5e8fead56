// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene manifests: a timeline, its layer graph and initial target states.

use crate::config::ConfigError;
use keyreel_compositor::SceneGraph;
use keyreel_sequencer::{TargetStore, Timeline};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything a command needs to preview or export one timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Directory image references resolve against, relative to the manifest
    #[serde(default)]
    pub assets: Option<PathBuf>,
    /// Animated timeline
    pub timeline: Timeline,
    /// Composites and pages
    #[serde(default)]
    pub scene: SceneGraph,
    /// Initial state of every transform target
    #[serde(default)]
    pub targets: TargetStore,
}

impl Manifest {
    /// Load a manifest from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let manifest: Manifest = ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            timeline = %manifest.timeline.name,
            tracks = manifest.timeline.track_count(),
            targets = manifest.targets.len(),
            "Loaded manifest {}",
            path.display()
        );
        Ok(manifest)
    }

    /// Root directory for image references of a manifest loaded from `path`
    pub fn asset_root(&self, path: &Path) -> PathBuf {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        match &self.assets {
            Some(assets) => base.join(assets),
            None => base.to_path_buf(),
        }
    }
}
