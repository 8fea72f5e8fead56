// SPDX-License-Identifier: MIT OR Apache-2.0
//! Render targets and the layer graph query.
//!
//! The layer graph itself belongs to the host editor. The compositor only
//! needs to ask it which composite or page a target reaches and which layer
//! slots that render target stacks.

use indexmap::IndexMap;
use keyreel_sequencer::TargetId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a source image, resolved by an [`ImageLoader`](crate::ImageLoader)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl ImageRef {
    /// Create an image reference
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Borrow the raw reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ImageRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Image bound to a layer slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSource {
    /// Image to draw
    pub image: ImageRef,
    /// Transform target controlling this layer; `None` for a static fill
    #[serde(default)]
    pub transform: Option<TargetId>,
}

impl LayerSource {
    /// A static image that covers its slot
    pub fn fill(image: impl Into<ImageRef>) -> Self {
        Self {
            image: image.into(),
            transform: None,
        }
    }

    /// An image driven by a transform target
    pub fn transformed(image: impl Into<ImageRef>, transform: impl Into<TargetId>) -> Self {
        Self {
            image: image.into(),
            transform: Some(transform.into()),
        }
    }
}

/// One slot of a render target; unbound slots render as placeholders
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerSlot {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Bound source
    #[serde(default)]
    pub source: Option<LayerSource>,
}

impl LayerSlot {
    /// Create a bound slot
    pub fn bound(name: impl Into<String>, source: LayerSource) -> Self {
        Self {
            name: name.into(),
            source: Some(source),
        }
    }

    /// Create an empty slot
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
        }
    }
}

/// Grid of a page target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageGrid {
    /// Number of columns
    pub columns: u32,
    /// Number of rows
    pub rows: u32,
    /// Gap between cells in pixels
    pub gap: f32,
    /// Margin around the grid in pixels
    pub margin: f32,
}

impl Default for PageGrid {
    fn default() -> Self {
        Self {
            columns: 2,
            rows: 2,
            gap: 8.0,
            margin: 16.0,
        }
    }
}

/// How a render target arranges its slots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TargetKind {
    /// Slots stacked back-to-front over the full canvas
    Composite,
    /// Slots laid out in a grid in reading order
    Page(PageGrid),
}

/// A composite or page aggregating layer slots into one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderTarget {
    /// Target ID
    pub id: TargetId,
    /// Arrangement of the slots
    pub kind: TargetKind,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Background fill (RGBA)
    #[serde(default = "default_background")]
    pub background: [u8; 4],
    /// Slots in stacking (composite) or reading (page) order
    #[serde(default)]
    pub slots: Vec<LayerSlot>,
}

fn default_background() -> [u8; 4] {
    [255, 255, 255, 255]
}

impl RenderTarget {
    /// Create an empty composite
    pub fn composite(id: impl Into<TargetId>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            kind: TargetKind::Composite,
            width,
            height,
            background: default_background(),
            slots: Vec::new(),
        }
    }

    /// Create an empty page
    pub fn page(id: impl Into<TargetId>, width: u32, height: u32, grid: PageGrid) -> Self {
        Self {
            kind: TargetKind::Page(grid),
            ..Self::composite(id, width, height)
        }
    }

    /// Set the background fill
    pub fn with_background(mut self, background: [u8; 4]) -> Self {
        self.background = background;
        self
    }

    /// Append a slot
    pub fn with_slot(mut self, slot: LayerSlot) -> Self {
        self.slots.push(slot);
        self
    }

    /// Whether any slot is driven by `target` or the target is this one
    pub fn reaches(&self, target: &TargetId) -> bool {
        &self.id == target || self.transform_ids().any(|id| id == target)
    }

    /// Transform targets that drive this render target's layers, in slot order
    pub fn transform_ids(&self) -> impl Iterator<Item = &TargetId> {
        self.slots
            .iter()
            .filter_map(|slot| slot.source.as_ref()?.transform.as_ref())
    }
}

/// Query over the host's layer graph
pub trait LayerGraph {
    /// Composite reachable from `target`, if any
    fn composite_for(&self, target: &TargetId) -> Option<RenderTarget>;

    /// Page reachable from `target`, if any
    fn page_for(&self, target: &TargetId) -> Option<RenderTarget>;
}

/// Resolve the render target for `target`, preferring a composite over a page
pub fn resolve_render_target(graph: &impl LayerGraph, target: &TargetId) -> Option<RenderTarget> {
    graph
        .composite_for(target)
        .or_else(|| graph.page_for(target))
}

/// In-memory layer graph holding render targets by ID
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneGraph {
    #[serde(default)]
    composites: IndexMap<TargetId, RenderTarget>,
    #[serde(default)]
    pages: IndexMap<TargetId, RenderTarget>,
}

impl SceneGraph {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a render target, filed by its kind
    pub fn add(&mut self, target: RenderTarget) {
        let map = match target.kind {
            TargetKind::Composite => &mut self.composites,
            TargetKind::Page(_) => &mut self.pages,
        };
        map.insert(target.id.clone(), target);
    }

    /// Remove a render target
    pub fn remove(&mut self, id: &TargetId) -> Option<RenderTarget> {
        self.composites
            .shift_remove(id)
            .or_else(|| self.pages.shift_remove(id))
    }

    /// All render targets, composites first
    pub fn targets(&self) -> impl Iterator<Item = &RenderTarget> {
        self.composites.values().chain(self.pages.values())
    }
}

impl LayerGraph for SceneGraph {
    fn composite_for(&self, target: &TargetId) -> Option<RenderTarget> {
        self.composites.values().find(|c| c.reaches(target)).cloned()
    }

    fn page_for(&self, target: &TargetId) -> Option<RenderTarget> {
        self.pages.values().find(|p| p.reaches(target)).cloned()
    }
}
