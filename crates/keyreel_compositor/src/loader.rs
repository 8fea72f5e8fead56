// SPDX-License-Identifier: MIT OR Apache-2.0
//! Asynchronous, fallible image loading.

use crate::scene::ImageRef;
use futures::future::BoxFuture;
use futures::FutureExt;
use image::DynamicImage;
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};

/// Errors that can occur while loading a layer image
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// Reference does not resolve to an image
    #[error("Image not found: {0}")]
    NotFound(String),
    /// Reading the image failed
    #[error("IO error: {0}")]
    Io(String),
    /// Image decoding error
    #[error("Failed to decode image: {0}")]
    Decode(String),
}

/// Result of an image load
pub type LoadResult = Result<DynamicImage, LoadError>;

/// Resolves image references to decoded pixels
pub trait ImageLoader: Send + Sync {
    /// Load and decode the image behind `reference`
    fn load<'a>(&'a self, reference: &'a ImageRef) -> BoxFuture<'a, LoadResult>;
}

impl<T: ImageLoader + ?Sized> ImageLoader for &T {
    fn load<'a>(&'a self, reference: &'a ImageRef) -> BoxFuture<'a, LoadResult> {
        (**self).load(reference)
    }
}

/// Loads images from files relative to a root directory
#[derive(Debug, Clone)]
pub struct FsImageLoader {
    root: PathBuf,
}

impl FsImageLoader {
    /// Create a loader resolving references against `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, reference: &ImageRef) -> PathBuf {
        let path = Path::new(reference.as_str());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl ImageLoader for FsImageLoader {
    fn load<'a>(&'a self, reference: &'a ImageRef) -> BoxFuture<'a, LoadResult> {
        async move {
            let path = self.resolve(reference);
            let data = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => LoadError::NotFound(path.display().to_string()),
                _ => LoadError::Io(e.to_string()),
            })?;

            image::load_from_memory(&data).map_err(|e| LoadError::Decode(e.to_string()))
        }
        .boxed()
    }
}

/// Serves images held in memory; useful for previews and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryImageLoader {
    images: IndexMap<ImageRef, DynamicImage>,
    broken: IndexSet<ImageRef>,
}

impl MemoryImageLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image under a reference
    pub fn insert(&mut self, reference: impl Into<ImageRef>, image: DynamicImage) {
        let reference = reference.into();
        self.broken.shift_remove(&reference);
        self.images.insert(reference, image);
    }

    /// Register a reference that always fails to decode
    pub fn insert_broken(&mut self, reference: impl Into<ImageRef>) {
        let reference = reference.into();
        self.images.shift_remove(&reference);
        self.broken.insert(reference);
    }
}

impl ImageLoader for MemoryImageLoader {
    fn load<'a>(&'a self, reference: &'a ImageRef) -> BoxFuture<'a, LoadResult> {
        let result = if self.broken.contains(reference) {
            Err(LoadError::Decode(format!("corrupt image data: {reference}")))
        } else {
            self.images
                .get(reference)
                .cloned()
                .ok_or_else(|| LoadError::NotFound(reference.to_string()))
        };
        futures::future::ready(result).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[tokio::test]
    async fn test_memory_loader() {
        let mut loader = MemoryImageLoader::new();
        loader.insert("red", DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]))));
        loader.insert_broken("bad");

        let red = loader.load(&ImageRef::from("red")).await.unwrap();
        assert_eq!(red.width(), 2);
        assert!(matches!(loader.load(&ImageRef::from("bad")).await, Err(LoadError::Decode(_))));
        assert!(matches!(loader.load(&ImageRef::from("none")).await, Err(LoadError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fs_loader_missing_file() {
        let loader = FsImageLoader::new(std::env::temp_dir());
        let result = loader.load(&ImageRef::from("keyreel-definitely-missing.png")).await;
        assert!(matches!(result, Err(LoadError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fs_loader_round_trip() {
        let dir = std::env::temp_dir().join(format!("keyreel-loader-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let image = RgbaImage::from_pixel(3, 1, Rgba([0, 0, 255, 255]));
        image.save(dir.join("blue.png")).unwrap();

        let loader = FsImageLoader::new(&dir);
        let loaded = loader.load(&ImageRef::from("blue.png")).await.unwrap();
        assert_eq!(loaded.to_rgba8(), image);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
