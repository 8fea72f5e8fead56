// SPDX-License-Identifier: MIT OR Apache-2.0
//! Raster compositing of render targets.
//!
//! Slots are painted in order onto a (possibly supersampled) surface, each
//! layer going through anchor placement, scale, rotation and flip before being
//! blended at its opacity. The finished surface is downsampled once to the
//! output size.

use crate::cache::{FitMode, ImageCache, PrerenderCache, PrerenderKey};
use crate::layout::{self, SlotRect};
use crate::loader::{ImageLoader, LoadError};
use crate::scene::{LayerSource, RenderTarget, TargetKind};
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use indexmap::IndexMap;
use keyreel_sequencer::{LayerTransform, TargetId, TransformTargets};
use std::sync::Arc;
use tiny_skia::{
    BlendMode, Color, ColorU8, FillRule, FilterQuality, Mask, Paint, PathBuilder, Pixmap,
    PixmapPaint, Rect, Transform as SkTransform,
};

/// Fill used for unbound page cells
pub const DEFAULT_PLACEHOLDER: [u8; 4] = [228, 228, 231, 255];

/// Largest supported supersampling factor
pub const MAX_SUPERSAMPLE: u32 = 8;

/// Errors that abort a whole render
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    /// The output surface could not be allocated
    #[error("Invalid surface size: {width}x{height}")]
    InvalidSize {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },
}

/// Source of per-layer transforms for one render
pub trait TransformLookup {
    /// Transform for a layer's controlling target
    fn transform(&self, id: &TargetId) -> Option<LayerTransform>;
}

/// Reads transforms from live targets, for interactive preview
#[derive(Debug, Clone, Copy)]
pub struct LiveTransforms<'a, T>(pub &'a T);

impl<T: TransformTargets> TransformLookup for LiveTransforms<'_, T> {
    fn transform(&self, id: &TargetId) -> Option<LayerTransform> {
        self.0.get_state(id)
    }
}

/// Explicit transforms supplied by the caller, for export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOverrides {
    transforms: IndexMap<TargetId, LayerTransform>,
}

impl TransformOverrides {
    /// Create an empty override map
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transform for a target
    pub fn insert(&mut self, id: TargetId, transform: LayerTransform) {
        self.transforms.insert(id, transform);
    }

    /// Get the transform for a target
    pub fn get(&self, id: &TargetId) -> Option<&LayerTransform> {
        self.transforms.get(id)
    }

    /// Number of overridden targets
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Whether no target is overridden
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl TransformLookup for TransformOverrides {
    fn transform(&self, id: &TargetId) -> Option<LayerTransform> {
        self.transforms.get(id).copied()
    }
}

/// Paints render targets into raster images.
///
/// A compositor owns its decode and pre-render caches. Export creates one per
/// invocation; preview may keep one alive across frames.
pub struct Compositor<L> {
    loader: L,
    supersample: u32,
    placeholder: [u8; 4],
    decoded: ImageCache,
    prerendered: PrerenderCache,
}

impl<L: ImageLoader> Compositor<L> {
    /// Create a compositor rendering at output resolution
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            supersample: 1,
            placeholder: DEFAULT_PLACEHOLDER,
            decoded: ImageCache::new(),
            prerendered: PrerenderCache::new(),
        }
    }

    /// Render internally at `factor` times the output resolution
    pub fn with_supersample(mut self, factor: u32) -> Self {
        self.supersample = factor.clamp(1, MAX_SUPERSAMPLE);
        self
    }

    /// Set the fill used for unbound page cells
    pub fn with_placeholder(mut self, placeholder: [u8; 4]) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Supersampling factor
    pub fn supersample(&self) -> u32 {
        self.supersample
    }

    /// Drop all decoded and pre-rendered images
    pub fn clear_caches(&mut self) {
        self.decoded.clear();
        self.prerendered.clear();
    }

    /// Number of decoded images and pre-rendered bitmaps held
    pub fn cache_stats(&self) -> (usize, usize) {
        (self.decoded.len(), self.prerendered.len())
    }

    /// Render a target into an image of its output size.
    ///
    /// Layers that fail to load are logged and skipped; only an unusable
    /// output size fails the render.
    pub async fn render(
        &mut self,
        target: &RenderTarget,
        transforms: &impl TransformLookup,
    ) -> Result<RgbaImage, RenderError> {
        let factor = self.supersample;
        let invalid = RenderError::InvalidSize {
            width: target.width,
            height: target.height,
        };
        let width = target.width.checked_mul(factor).ok_or(invalid.clone())?;
        let height = target.height.checked_mul(factor).ok_or(invalid.clone())?;
        let mut canvas = Pixmap::new(width, height).ok_or(invalid)?;

        let [r, g, b, a] = target.background;
        canvas.fill(Color::from_rgba8(r, g, b, a));

        let is_page = matches!(target.kind, TargetKind::Page(_));
        for (index, slot) in target.slots.iter().enumerate() {
            let Some(rect) = layout::slot_rect(target, index) else {
                tracing::warn!(render_target = %target.id, slot = %slot.name, "No room for slot, skipped");
                continue;
            };
            let rect = rect.scaled(factor as f32);
            if rect.is_empty() {
                continue;
            }
            let clip = if is_page {
                clip_mask(width, height, &rect)
            } else {
                None
            };

            match &slot.source {
                Some(source) => {
                    let painted = self
                        .paint_source(&mut canvas, source, &rect, clip.as_ref(), transforms)
                        .await;
                    if let Err(e) = painted {
                        tracing::warn!(
                            render_target = %target.id,
                            slot = %slot.name,
                            image = %source.image,
                            "Layer skipped: {e}"
                        );
                    }
                }
                None if is_page => self.paint_placeholder(&mut canvas, &rect),
                None => {}
            }
        }

        let surface = pixmap_to_rgba(&canvas);
        if factor == 1 {
            return Ok(surface);
        }
        Ok(image::imageops::resize(
            &surface,
            target.width,
            target.height,
            FilterType::Triangle,
        ))
    }

    async fn paint_source(
        &mut self,
        canvas: &mut Pixmap,
        source: &LayerSource,
        rect: &SlotRect,
        clip: Option<&Mask>,
        transforms: &impl TransformLookup,
    ) -> Result<(), LoadError> {
        let image = self.source_image(source).await?;

        let Some(id) = &source.transform else {
            let (w, h) = layout::fit_cover((rect.width, rect.height));
            let key = PrerenderKey {
                reference: source.image.clone(),
                width: w,
                height: h,
                fit: FitMode::Cover,
            };
            let bitmap = self.prerendered.get_or_insert_with(key, || {
                rgba_to_pixmap(&image.resize_to_fill(w, h, FilterType::Lanczos3).to_rgba8())
            });
            if let Some(bitmap) = bitmap {
                canvas.draw_pixmap(
                    0,
                    0,
                    (*bitmap).as_ref(),
                    &PixmapPaint::default(),
                    SkTransform::from_translate(rect.x, rect.y),
                    clip,
                );
            }
            return Ok(());
        };

        let state = transforms.transform(id).unwrap_or_default();
        let (w, h) = layout::fit_contain((image.width(), image.height()), (rect.width, rect.height));
        let key = PrerenderKey {
            reference: source.image.clone(),
            width: w,
            height: h,
            fit: FitMode::Contain,
        };
        let bitmap = self.prerendered.get_or_insert_with(key, || {
            rgba_to_pixmap(&image.resize_exact(w, h, FilterType::Lanczos3).to_rgba8())
        });
        if let Some(bitmap) = bitmap {
            let paint = PixmapPaint {
                opacity: (state.opacity / 100.0).clamp(0.0, 1.0),
                blend_mode: BlendMode::SourceOver,
                quality: FilterQuality::Bicubic,
            };
            let matrix = layer_matrix(rect, (w as f32, h as f32), &state);
            canvas.draw_pixmap(0, 0, (*bitmap).as_ref(), &paint, matrix, clip);
        }
        Ok(())
    }

    async fn source_image(&mut self, source: &LayerSource) -> Result<Arc<DynamicImage>, LoadError> {
        if let Some(image) = self.decoded.get(&source.image) {
            return Ok(image);
        }
        let image = self.loader.load(&source.image).await?;
        Ok(self.decoded.insert(source.image.clone(), image))
    }

    fn paint_placeholder(&self, canvas: &mut Pixmap, rect: &SlotRect) {
        let Some(bounds) = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) else {
            return;
        };
        let [r, g, b, a] = self.placeholder;
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, a);
        canvas.fill_rect(bounds, &paint, SkTransform::identity(), None);
    }
}

/// Placement matrix: anchor and offset, then scale, rotate and flip about the layer center
fn layer_matrix(rect: &SlotRect, base: (f32, f32), state: &LayerTransform) -> SkTransform {
    let (cx, cy) = layout::layer_center(rect, base, state);
    let flip_x = if state.flip_h { -1.0 } else { 1.0 };
    let flip_y = if state.flip_v { -1.0 } else { 1.0 };
    SkTransform::from_translate(cx, cy)
        .pre_scale(state.scale, state.scale)
        .pre_concat(SkTransform::from_rotate(state.rotation))
        .pre_scale(flip_x, flip_y)
        .pre_translate(-base.0 / 2.0, -base.1 / 2.0)
}

fn clip_mask(width: u32, height: u32, rect: &SlotRect) -> Option<Mask> {
    let bounds = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)?;
    let mut mask = Mask::new(width, height)?;
    mask.fill_path(
        &PathBuilder::from_rect(bounds),
        FillRule::Winding,
        false,
        SkTransform::identity(),
    );
    Some(mask)
}

/// Convert straight-alpha RGBA into a premultiplied pixmap
pub fn rgba_to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

/// Convert a premultiplied pixmap back to straight-alpha RGBA
pub fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    image
}
