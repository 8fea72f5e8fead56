// SPDX-License-Identifier: MIT OR Apache-2.0
//! Decode and pre-render caches.
//!
//! Both caches are append-only and owned by a single [`Compositor`](crate::Compositor).
//! They are cleared explicitly when a new export starts: an entry left over
//! from an earlier export may describe different pixels under the same
//! reference.

use crate::scene::ImageRef;
use image::DynamicImage;
use std::collections::HashMap;
use std::sync::Arc;
use tiny_skia::Pixmap;

/// Decoded source images by reference
#[derive(Debug, Default)]
pub struct ImageCache {
    images: HashMap<ImageRef, Arc<DynamicImage>>,
}

impl ImageCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached image for a reference
    pub fn get(&self, reference: &ImageRef) -> Option<Arc<DynamicImage>> {
        self.images.get(reference).cloned()
    }

    /// Store a decoded image
    pub fn insert(&mut self, reference: ImageRef, image: DynamicImage) -> Arc<DynamicImage> {
        let image = Arc::new(image);
        self.images.insert(reference, Arc::clone(&image));
        image
    }

    /// Number of cached images
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.images.clear();
    }
}

/// How a source image was fitted before caching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitMode {
    /// Whole image visible, aspect preserved
    Contain,
    /// Slot filled, overflow cropped
    Cover,
}

/// Key of a pre-rendered bitmap
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrerenderKey {
    /// Source image
    pub reference: ImageRef,
    /// Bitmap width in pixels
    pub width: u32,
    /// Bitmap height in pixels
    pub height: u32,
    /// Fit used to produce the bitmap
    pub fit: FitMode,
}

/// Source images resampled once to their fitted base size
#[derive(Debug, Default)]
pub struct PrerenderCache {
    bitmaps: HashMap<PrerenderKey, Arc<Pixmap>>,
}

impl PrerenderCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached bitmap or build and store it
    pub fn get_or_insert_with(
        &mut self,
        key: PrerenderKey,
        build: impl FnOnce() -> Option<Pixmap>,
    ) -> Option<Arc<Pixmap>> {
        if let Some(bitmap) = self.bitmaps.get(&key) {
            return Some(Arc::clone(bitmap));
        }
        let bitmap = Arc::new(build()?);
        self.bitmaps.insert(key, Arc::clone(&bitmap));
        Some(bitmap)
    }

    /// Number of cached bitmaps
    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.bitmaps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prerender_built_once() {
        let mut cache = PrerenderCache::new();
        let key = PrerenderKey {
            reference: ImageRef::from("a.png"),
            width: 4,
            height: 4,
            fit: FitMode::Contain,
        };

        let mut builds = 0;
        for _ in 0..3 {
            let bitmap = cache.get_or_insert_with(key.clone(), || {
                builds += 1;
                Pixmap::new(4, 4)
            });
            assert!(bitmap.is_some());
        }
        assert_eq!(builds, 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_build_not_cached() {
        let mut cache = PrerenderCache::new();
        let key = PrerenderKey {
            reference: ImageRef::from("a.png"),
            width: 0,
            height: 0,
            fit: FitMode::Cover,
        };
        assert!(cache.get_or_insert_with(key, || Pixmap::new(0, 0)).is_none());
        assert!(cache.is_empty());
    }
}
