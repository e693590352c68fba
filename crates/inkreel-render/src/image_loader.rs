//! Image loading module.
//! Decodes PNG, JPEG, WebP, and other formats into FrameBuffers, resizes
//! them, and resolves asset sources to shared rasters.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use inkreel_core::{FrameBuffer, InkreelError, InkreelResult};
use inkreel_ir::AssetSource;
use tracing::{debug, warn};

/// Load an image file and convert it to a FrameBuffer.
pub fn load_image(path: &Path) -> InkreelResult<FrameBuffer> {
    let img = image::open(path).map_err(|e| {
        InkreelError::asset(
            format!("failed to load image '{}': {}", path.display(), e),
            path,
        )
    })?;
    into_frame_buffer(img.to_rgba8(), path)
}

fn into_frame_buffer(rgba: RgbaImage, origin: &Path) -> InkreelResult<FrameBuffer> {
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(InkreelError::asset("image has no pixels", origin));
    }
    FrameBuffer::from_rgba(width, height, rgba.into_raw())
        .ok_or_else(|| InkreelError::asset("decoded buffer has the wrong length", origin))
}

/// Resample `fb` to exactly `width × height` with a triangle filter.
/// Returns `None` when either target side is zero.
pub fn resize_exact(fb: &FrameBuffer, width: u32, height: u32) -> Option<FrameBuffer> {
    if width == 0 || height == 0 {
        return None;
    }
    if width == fb.width && height == fb.height {
        return Some(fb.clone());
    }
    let src = RgbaImage::from_raw(fb.width, fb.height, fb.data.clone())?;
    let resized = imageops::resize(&src, width, height, FilterType::Triangle);
    FrameBuffer::from_rgba(width, height, resized.into_raw())
}

/// Turns an asset source into a decoded raster.
///
/// With a target size the raster is stretched to exactly that size.
/// Implementations return `None` for anything they cannot resolve; the
/// caller decides whether that is fatal.
pub trait ResourceResolver: Send + Sync {
    fn resolve(&self, source: &AssetSource, target: Option<(u32, u32)>) -> Option<Arc<FrameBuffer>>;
}

type CacheKey = (AssetSource, Option<(u32, u32)>);

/// Resolves sources from disk. Built-in art lives in `builtin_dir` as
/// `<id>.png`. Decoded rasters are cached per source and target size.
#[derive(Debug, Default)]
pub struct FileResolver {
    builtin_dir: Option<PathBuf>,
    cache: DashMap<CacheKey, Arc<FrameBuffer>>,
}

impl FileResolver {
    pub fn new(builtin_dir: Option<PathBuf>) -> Self {
        Self {
            builtin_dir,
            cache: DashMap::new(),
        }
    }

    /// Path a source maps to, if any.
    pub fn path_for(&self, source: &AssetSource) -> Option<PathBuf> {
        match source {
            AssetSource::Builtin(id) => self
                .builtin_dir
                .as_ref()
                .map(|dir| dir.join(format!("{}.png", id))),
            AssetSource::File(path) => Some(path.clone()),
        }
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

impl ResourceResolver for FileResolver {
    fn resolve(&self, source: &AssetSource, target: Option<(u32, u32)>) -> Option<Arc<FrameBuffer>> {
        let key = (source.clone(), target);
        if let Some(hit) = self.cache.get(&key) {
            return Some(Arc::clone(hit.value()));
        }

        let Some(path) = self.path_for(source) else {
            warn!("no built-in asset directory configured for {}", source);
            return None;
        };
        let decoded = match load_image(&path) {
            Ok(fb) => fb,
            Err(e) => {
                warn!("{}", e);
                return None;
            }
        };
        let raster = match target {
            Some((w, h)) => resize_exact(&decoded, w, h)?,
            None => decoded,
        };
        debug!("decoded {} ({}x{})", source, raster.width, raster.height);

        let raster = Arc::new(raster);
        self.cache.insert(key, Arc::clone(&raster));
        Some(raster)
    }
}

/// Serves rasters registered up front. Useful for embedding callers that
/// decode on their own, and for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryResolver {
    rasters: HashMap<AssetSource, Arc<FrameBuffer>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: AssetSource, raster: FrameBuffer) {
        self.rasters.insert(source, Arc::new(raster));
    }

    pub fn with(mut self, source: AssetSource, raster: FrameBuffer) -> Self {
        self.insert(source, raster);
        self
    }
}

impl ResourceResolver for MemoryResolver {
    fn resolve(&self, source: &AssetSource, target: Option<(u32, u32)>) -> Option<Arc<FrameBuffer>> {
        let raster = self.rasters.get(source)?;
        match target {
            Some((w, h)) if (w, h) != (raster.width, raster.height) => {
                resize_exact(raster, w, h).map(Arc::new)
            }
            _ => Some(Arc::clone(raster)),
        }
    }
}
