//! Scene compositor: draws one frame of one scene.
//!
//! Layers, bottom to top: background (or white), the scene's assets in their
//! stored order, the scene text with its progressive reveal and optional
//! hand cursor, and the subtitle bar.

use inkreel_core::{CanvasSize, Color, FontConfig, FrameBuffer, InkreelError, InkreelResult, Point2D, Size2D};
use inkreel_ir::{AnimationStyle, PositionedAsset, Scene};

use crate::animation::{evaluate, AssetPose, StaggerWindow};
use crate::placement::place;
use crate::resources::{RasterKey, RenderResources};
use crate::text::{FontWeight, TextRenderer};

/// Scene text height relative to the canvas height.
pub const TEXT_SIZE_FRACTION: f32 = 0.07;
/// Widest a text line may get, relative to the canvas width.
pub const TEXT_MAX_WIDTH_FRACTION: f32 = 0.9;
/// Hand cursor height relative to the canvas height.
pub const HAND_HEIGHT_FRACTION: f64 = 0.15;
/// Subtitle bar height relative to the canvas height.
pub const SUBTITLE_BAR_FRACTION: f64 = 0.12;
/// Subtitle text height relative to the bar height.
pub const SUBTITLE_TEXT_FRACTION: f32 = 0.4;
/// Bar opacity once fully faded in.
pub const SUBTITLE_BAR_ALPHA: f32 = 0.7;

/// Stateless per-frame renderer. Reusable across frames, scenes and exports.
#[derive(Debug, Clone)]
pub struct SceneCompositor {
    text: TextRenderer,
    ink: Color,
}

impl SceneCompositor {
    pub fn new(text: TextRenderer) -> Self {
        Self {
            text,
            ink: Color::INK,
        }
    }

    /// Fonts and ink color from configuration.
    pub fn from_config(config: &FontConfig) -> InkreelResult<Self> {
        let mut compositor = Self::new(TextRenderer::from_config(config));
        if let Some(hex) = &config.ink_color {
            let ink = Color::from_hex(hex)
                .map_err(|e| InkreelError::Config(format!("fonts.ink_color: {}", e)))?;
            compositor = compositor.with_ink(ink);
        }
        Ok(compositor)
    }

    pub fn with_ink(mut self, ink: Color) -> Self {
        self.ink = ink;
        self
    }

    pub fn text_renderer(&self) -> &TextRenderer {
        &self.text
    }

    /// Render `scene` at `progress` into a new canvas-sized frame.
    pub fn render_frame(
        &self,
        scene: &Scene,
        assets: &[PositionedAsset],
        resources: &RenderResources,
        progress: f64,
        canvas: CanvasSize,
    ) -> FrameBuffer {
        let mut frame = FrameBuffer::new(canvas.width(), canvas.height());
        self.render_frame_into(&mut frame, scene, assets, resources, progress);
        frame
    }

    /// Render into an existing frame, overwriting every pixel. The frame's
    /// own dimensions are the canvas.
    pub fn render_frame_into(
        &self,
        frame: &mut FrameBuffer,
        scene: &Scene,
        assets: &[PositionedAsset],
        resources: &RenderResources,
        progress: f64,
    ) {
        let progress = progress.clamp(0.0, 1.0);
        self.draw_background(frame, resources);
        self.draw_assets(frame, assets, resources, progress);
        self.draw_text(frame, scene, resources, progress);
        self.draw_subtitle(frame, &scene.subtitle_text, progress);
    }

    fn draw_background(&self, frame: &mut FrameBuffer, resources: &RenderResources) {
        let Some(bg) = resources.background.as_deref() else {
            frame.fill(&Color::WHITE);
            return;
        };
        if (bg.width, bg.height) == (frame.width, frame.height) {
            frame.data.copy_from_slice(&bg.data);
            return;
        }
        match resources.scaled(RasterKey::Background, bg, frame.width, frame.height, true) {
            Some(stretched) => frame.data.copy_from_slice(&stretched.data),
            None => frame.fill(&Color::WHITE),
        }
    }

    fn draw_assets(
        &self,
        frame: &mut FrameBuffer,
        assets: &[PositionedAsset],
        resources: &RenderResources,
        progress: f64,
    ) {
        let canvas = Size2D::new(frame.width as f64, frame.height as f64);
        for (index, asset) in assets.iter().enumerate() {
            let Some(window) = StaggerWindow::for_asset(index, assets.len()) else {
                continue;
            };
            let Some(raster) = resources.asset(&asset.source) else {
                continue;
            };

            let size = Size2D::new(raster.width as f64, raster.height as f64);
            let placed = size.scaled(asset.scale);
            let anchor = place(asset.placement, placed.width, placed.height, canvas.width, canvas.height);
            let pose = AssetPose {
                size,
                origin: Point2D::new(anchor.x + asset.offset_x, anchor.y + asset.offset_y),
                scale: asset.scale,
                canvas,
            };
            let Some(transform) = evaluate(asset.animation, window.local_progress(progress), &pose) else {
                continue;
            };

            let (w, h) = transform.scaled_size(size);
            if w > frame.width || h > frame.height {
                // Larger than the canvas: sample straight into the visible
                // part instead of resampling the whole raster.
                let drawn = size.scaled(transform.scale);
                frame.composite_scaled(
                    raster,
                    transform.position.x,
                    transform.position.y,
                    drawn.width,
                    drawn.height,
                    transform.opacity,
                );
                continue;
            }
            let zooming = matches!(asset.animation, AnimationStyle::ZoomIn | AnimationStyle::ZoomOut);
            let key = RasterKey::Asset(asset.source.clone());
            let Some(scaled) = resources.scaled(key, raster, w, h, !zooming) else {
                continue;
            };
            frame.composite_over_with_opacity(
                &scaled,
                clamp_to_i32(transform.position.x),
                clamp_to_i32(transform.position.y),
                transform.opacity,
            );
        }
    }

    fn draw_text(
        &self,
        frame: &mut FrameBuffer,
        scene: &Scene,
        resources: &RenderResources,
        progress: f64,
    ) {
        let total_chars = scene.text.chars().count();
        let visible = (total_chars as f64 * progress).floor() as usize;
        if visible == 0 || !self.text.has_font() {
            return;
        }

        // Size is fitted to the full text so it stays fixed during the reveal.
        let size = self.text.fit_size(
            &scene.text,
            FontWeight::Regular,
            frame.height as f32 * TEXT_SIZE_FRACTION,
            frame.width as f32 * TEXT_MAX_WIDTH_FRACTION,
        );
        let prefix: String = scene.text.chars().take(visible).collect();
        let Some(rendered) = self.text.render_text(&prefix, FontWeight::Regular, size, &self.ink) else {
            return;
        };

        let center_x = frame.width as i64 / 2;
        let center_y = frame.height as i64 / 2;
        let x = center_x - rendered.width as i64 / 2;
        let y = center_y - rendered.height as i64 / 2;
        frame.composite_over(&rendered, x as i32, y as i32);

        if scene.animation == AnimationStyle::HandDraw && progress < 1.0 {
            if let (Some(hand), Some((edge_x, edge_y))) = (
                resources.hand.as_deref(),
                self.text.trailing_edge(&prefix, FontWeight::Regular, size),
            ) {
                let tip_x = x + edge_x as i64;
                let tip_y = y + edge_y as i64;
                self.draw_hand(frame, hand, resources, tip_x as i32, tip_y as i32);
            }
        }
    }

    /// Draw the hand with its pen tip (the raster's top-left corner) at `(x, y)`.
    fn draw_hand(&self, frame: &mut FrameBuffer, hand: &FrameBuffer, resources: &RenderResources, x: i32, y: i32) {
        let height = (frame.height as f64 * HAND_HEIGHT_FRACTION).round().max(1.0);
        let width = (hand.width as f64 * height / hand.height.max(1) as f64).round().max(1.0);
        if let Some(scaled) = resources.scaled(RasterKey::Hand, hand, width as u32, height as u32, true) {
            frame.composite_over(&scaled, x, y);
        }
    }

    fn draw_subtitle(&self, frame: &mut FrameBuffer, subtitle: &str, progress: f64) {
        if subtitle.is_empty() || progress <= 0.0 {
            return;
        }
        let fade = progress as f32;
        let bar_height = (frame.height as f64 * SUBTITLE_BAR_FRACTION).round().max(1.0) as u32;
        let bar_top = frame.height.saturating_sub(bar_height) as i32;
        frame.fill_rect_blend(
            0,
            bar_top,
            frame.width,
            bar_height,
            &Color::BLACK.faded(SUBTITLE_BAR_ALPHA * fade),
        );

        let size = self.text.fit_size(
            subtitle,
            FontWeight::Bold,
            bar_height as f32 * SUBTITLE_TEXT_FRACTION,
            frame.width as f32 * TEXT_MAX_WIDTH_FRACTION,
        );
        if let Some(rendered) = self.text.render_text(subtitle, FontWeight::Bold, size, &Color::WHITE) {
            let x = (frame.width as i64 - rendered.width as i64) / 2;
            let y = bar_top as i64 + (bar_height as i64 - rendered.height as i64) / 2;
            frame.composite_over_with_opacity(&rendered, x as i32, y as i32, fade);
        }
    }
}

fn clamp_to_i32(v: f64) -> i32 {
    v.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}
