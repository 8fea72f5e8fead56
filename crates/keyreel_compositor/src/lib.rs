// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compositing renderer for keyreel.
//!
//! Turns a render target (a composite stack or a page grid) plus a set of
//! layer transforms into an RGBA image:
//! - Render targets and the layer graph query
//! - Asynchronous image loading with per-layer failure isolation
//! - Decode and pre-render caches
//! - Supersampled rasterization via `tiny-skia`

pub mod cache;
pub mod layout;
pub mod loader;
pub mod render;
pub mod scene;

pub use cache::{FitMode, ImageCache, PrerenderCache, PrerenderKey};
pub use layout::{fit_contain, fit_cover, layer_center, slot_rect, SlotRect};
pub use loader::{FsImageLoader, ImageLoader, LoadError, LoadResult, MemoryImageLoader};
pub use render::{
    pixmap_to_rgba, rgba_to_pixmap, Compositor, LiveTransforms, RenderError, TransformLookup,
    TransformOverrides, DEFAULT_PLACEHOLDER, MAX_SUPERSAMPLE,
};
pub use scene::{
    resolve_render_target, ImageRef, LayerGraph, LayerSlot, LayerSource, PageGrid, RenderTarget,
    SceneGraph, TargetKind,
};
