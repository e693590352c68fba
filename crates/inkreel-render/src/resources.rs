//! Rasters decoded once per export and shared by every frame.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use inkreel_core::{CanvasSize, FrameBuffer};
use inkreel_ir::{AssetSource, Storyboard};
use tracing::{debug, warn};

use crate::image_loader::{resize_exact, ResourceResolver};

/// Which raster a scaled copy was made from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum RasterKey {
    Hand,
    Background,
    Asset(AssetSource),
}

/// Decoded rasters for one render: hand cursor, background, and one raster
/// per distinct asset source.
#[derive(Debug, Clone, Default)]
pub struct RenderResources {
    pub hand: Option<Arc<FrameBuffer>>,
    /// Background, already stretched to the canvas.
    pub background: Option<Arc<FrameBuffer>>,
    pub assets: HashMap<AssetSource, Arc<FrameBuffer>>,
    /// Resampled copies at sizes that stay fixed across frames.
    scaled: Arc<DashMap<(RasterKey, u32, u32), Arc<FrameBuffer>>>,
}

/// Result of resolving everything a storyboard references.
#[derive(Debug, Clone)]
pub struct LoadedResources {
    pub resources: RenderResources,
    /// Asset sources that could not be resolved, in first-use order.
    pub missing: Vec<AssetSource>,
}

impl RenderResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hand(mut self, hand: FrameBuffer) -> Self {
        self.hand = Some(Arc::new(hand));
        self
    }

    pub fn with_background(mut self, background: FrameBuffer) -> Self {
        self.background = Some(Arc::new(background));
        self
    }

    pub fn with_asset(mut self, source: AssetSource, raster: FrameBuffer) -> Self {
        self.assets.insert(source, Arc::new(raster));
        self
    }

    pub fn asset(&self, source: &AssetSource) -> Option<&FrameBuffer> {
        self.assets.get(source).map(Arc::as_ref)
    }

    /// `raster` resampled to `width × height`. Results are memoized when
    /// `cacheable`; sizes that change every frame should pass `false`.
    pub(crate) fn scaled(
        &self,
        key: RasterKey,
        raster: &FrameBuffer,
        width: u32,
        height: u32,
        cacheable: bool,
    ) -> Option<Arc<FrameBuffer>> {
        if !cacheable {
            return resize_exact(raster, width, height).map(Arc::new);
        }
        let key = (key, width, height);
        if let Some(hit) = self.scaled.get(&key) {
            return Some(Arc::clone(hit.value()));
        }
        let resized = Arc::new(resize_exact(raster, width, height)?);
        self.scaled.insert(key, Arc::clone(&resized));
        Some(resized)
    }

    /// Resolve the hand cursor, the background (at canvas size), and every
    /// asset source used by `board`. Unresolved optional rasters are logged
    /// and left out; unresolved assets are also reported in `missing`.
    pub fn load(
        resolver: &dyn ResourceResolver,
        board: &Storyboard,
        hand: Option<&AssetSource>,
        background: Option<&AssetSource>,
        canvas: CanvasSize,
    ) -> LoadedResources {
        let mut resources = RenderResources::new();

        resources.hand = hand.and_then(|source| {
            let raster = resolver.resolve(source, None);
            if raster.is_none() {
                warn!("hand cursor {} not found; writing without a hand", source);
            }
            raster
        });
        resources.background = background.and_then(|source| {
            let raster = resolver.resolve(source, Some((canvas.width(), canvas.height())));
            if raster.is_none() {
                warn!("background {} not found; using white", source);
            }
            raster
        });

        let mut missing = Vec::new();
        for scene in &board.scenes {
            for asset in board.assets_for(&scene.id) {
                if resources.assets.contains_key(&asset.source) || missing.contains(&asset.source) {
                    continue;
                }
                match resolver.resolve(&asset.source, None) {
                    Some(raster) => {
                        resources.assets.insert(asset.source.clone(), raster);
                    }
                    None => missing.push(asset.source.clone()),
                }
            }
        }
        debug!(
            "resolved {} asset rasters, {} missing",
            resources.assets.len(),
            missing.len()
        );

        LoadedResources { resources, missing }
    }
}
