// SPDX-License-Identifier: MIT OR Apache-2.0
//! Binding of tracks to live transform targets.
//!
//! A track drives exactly one target, identified by a [`TargetId`]. The
//! target itself lives outside the sequencer; it is reached through the
//! [`TransformTargets`] read/write interface so the scheduler can write
//! interpolated values and the renderer can read them back.

use crate::keyframe::Transform;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a transformable layer target
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub String);

impl TargetId {
    /// Create a target ID from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TargetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Anchor a layer is aligned to inside its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Top-left corner
    TopLeft,
    /// Middle of the top edge
    Top,
    /// Top-right corner
    TopRight,
    /// Middle of the left edge
    Left,
    /// Center
    #[default]
    Center,
    /// Middle of the right edge
    Right,
    /// Bottom-left corner
    BottomLeft,
    /// Middle of the bottom edge
    Bottom,
    /// Bottom-right corner
    BottomRight,
}

impl Alignment {
    /// Normalized anchor factors in `[0, 1]` along x and y
    pub fn factors(&self) -> (f32, f32) {
        match self {
            Self::TopLeft => (0.0, 0.0),
            Self::Top => (0.5, 0.0),
            Self::TopRight => (1.0, 0.0),
            Self::Left => (0.0, 0.5),
            Self::Center => (0.5, 0.5),
            Self::Right => (1.0, 0.5),
            Self::BottomLeft => (0.0, 1.0),
            Self::Bottom => (0.5, 1.0),
            Self::BottomRight => (1.0, 1.0),
        }
    }

    /// All nine anchors in reading order
    pub fn all() -> &'static [Alignment] {
        &[
            Self::TopLeft,
            Self::Top,
            Self::TopRight,
            Self::Left,
            Self::Center,
            Self::Right,
            Self::BottomLeft,
            Self::Bottom,
            Self::BottomRight,
        ]
    }
}

/// Full mutable state of a layer target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerTransform {
    /// Uniform scale factor
    pub scale: f32,
    /// Horizontal offset, percent of the slot width
    pub offset_x: f32,
    /// Vertical offset, percent of the slot height
    pub offset_y: f32,
    /// Rotation in degrees
    pub rotation: f32,
    /// Mirror horizontally
    pub flip_h: bool,
    /// Mirror vertically
    pub flip_v: bool,
    /// Anchor inside the slot
    pub alignment: Alignment,
    /// Opacity in percent
    pub opacity: f32,
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self::from_animated(&Transform::IDENTITY)
    }
}

impl LayerTransform {
    /// Build a layer state from animated channels with default flips and alignment
    pub fn from_animated(transform: &Transform) -> Self {
        Self {
            scale: transform.scale,
            offset_x: transform.offset_x,
            offset_y: transform.offset_y,
            rotation: transform.rotation,
            flip_h: false,
            flip_v: false,
            alignment: Alignment::Center,
            opacity: transform.opacity,
        }
    }

    /// The animatable channels of this state
    pub fn animated(&self) -> Transform {
        Transform {
            scale: self.scale,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            rotation: self.rotation,
            opacity: self.opacity,
        }
    }

    /// Overwrite the animatable channels, keeping flips and alignment
    pub fn apply(&mut self, transform: &Transform) {
        self.scale = transform.scale;
        self.offset_x = transform.offset_x;
        self.offset_y = transform.offset_y;
        self.rotation = transform.rotation;
        self.opacity = transform.opacity;
    }

    /// Copy of this state with the given animated channels
    pub fn with_animated(mut self, transform: &Transform) -> Self {
        self.apply(transform);
        self
    }
}

/// Read/write access to live transform targets.
///
/// Writes are partial: only the animatable channels are replaced, flips and
/// alignment stay as the user set them.
pub trait TransformTargets {
    /// Current state of a target, if it exists
    fn get_state(&self, id: &TargetId) -> Option<LayerTransform>;

    /// Write animated channels into a target. Unknown targets are ignored.
    fn set_state(&mut self, id: &TargetId, transform: &Transform);
}

/// In-memory target store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetStore {
    targets: IndexMap<TargetId, LayerTransform>,
}

impl TargetStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a target
    pub fn insert(&mut self, id: impl Into<TargetId>, state: LayerTransform) {
        self.targets.insert(id.into(), state);
    }

    /// Remove a target
    pub fn remove(&mut self, id: &TargetId) -> Option<LayerTransform> {
        self.targets.shift_remove(id)
    }

    /// Iterate over all targets
    pub fn iter(&self) -> impl Iterator<Item = (&TargetId, &LayerTransform)> {
        self.targets.iter()
    }

    /// Number of targets
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl TransformTargets for TargetStore {
    fn get_state(&self, id: &TargetId) -> Option<LayerTransform> {
        self.targets.get(id).copied()
    }

    fn set_state(&mut self, id: &TargetId, transform: &Transform) {
        if let Some(state) = self.targets.get_mut(id) {
            state.apply(transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_write_keeps_flips() {
        let mut store = TargetStore::new();
        store.insert(
            "logo",
            LayerTransform {
                flip_h: true,
                alignment: Alignment::BottomRight,
                ..LayerTransform::default()
            },
        );

        let id = TargetId::from("logo");
        store.set_state(&id, &Transform { scale: 2.0, rotation: 30.0, ..Transform::IDENTITY });

        let state = store.get_state(&id).unwrap();
        assert_eq!(state.scale, 2.0);
        assert_eq!(state.rotation, 30.0);
        assert!(state.flip_h);
        assert_eq!(state.alignment, Alignment::BottomRight);
    }

    #[test]
    fn test_unknown_target_ignored() {
        let mut store = TargetStore::new();
        store.set_state(&TargetId::from("missing"), &Transform::IDENTITY);
        assert!(store.is_empty());
    }

    #[test]
    fn test_alignment_factors() {
        assert_eq!(Alignment::TopLeft.factors(), (0.0, 0.0));
        assert_eq!(Alignment::Center.factors(), (0.5, 0.5));
        assert_eq!(Alignment::BottomRight.factors(), (1.0, 1.0));
        assert_eq!(Alignment::all().len(), 9);
    }
}
