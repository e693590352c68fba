//! Text rendering module.
//! Uses fontdue for CPU-based font rasterization. Fonts come from the
//! configuration or from well-known system locations; there is no embedded
//! fallback, so callers must cope with a renderer that has no font.

use std::path::Path;

use fontdue::{Font, FontSettings};
use inkreel_core::{Color, FontConfig, FrameBuffer, InkreelError, InkreelResult};
use tracing::{debug, warn};

/// Regular-weight fonts probed when none is configured.
pub const SYSTEM_REGULAR_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Bold fonts probed when none is configured.
pub const SYSTEM_BOLD_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontWeight {
    #[default]
    Regular,
    Bold,
}

/// Rasterizes text to a FrameBuffer.
#[derive(Clone, Default)]
pub struct TextRenderer {
    regular: Option<Font>,
    bold: Option<Font>,
}

impl TextRenderer {
    /// A renderer with no fonts loaded. Every render call returns `None`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the configured fonts, falling back to system fonts for any weight
    /// that is not configured or fails to load.
    pub fn from_config(config: &FontConfig) -> Self {
        let mut renderer = Self::new();
        for (weight, configured, candidates) in [
            (FontWeight::Regular, &config.regular, SYSTEM_REGULAR_FONTS),
            (FontWeight::Bold, &config.bold, SYSTEM_BOLD_FONTS),
        ] {
            if let Some(path) = configured {
                match renderer.load_font(weight, path) {
                    Ok(()) => continue,
                    Err(e) => warn!("{}; trying system fonts", e),
                }
            }
            let found = candidates
                .iter()
                .map(Path::new)
                .filter(|p| p.is_file())
                .any(|p| renderer.load_font(weight, p).is_ok());
            if !found {
                debug!("no system font found for {:?} text", weight);
            }
        }
        if !renderer.has_font() {
            warn!("no usable font found; scene text and subtitles will not be drawn");
        }
        renderer
    }

    /// Load a font from a file path.
    pub fn load_font(&mut self, weight: FontWeight, path: &Path) -> InkreelResult<()> {
        let data = std::fs::read(path).map_err(|e| {
            InkreelError::asset(format!("failed to read font file: {}", e), path)
        })?;
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| InkreelError::asset(format!("failed to parse font: {}", e), path))?;
        debug!("loaded {:?} font from {}", weight, path.display());
        match weight {
            FontWeight::Regular => self.regular = Some(font),
            FontWeight::Bold => self.bold = Some(font),
        }
        Ok(())
    }

    pub fn has_font(&self) -> bool {
        self.regular.is_some() || self.bold.is_some()
    }

    /// The font for `weight`, substituting the other weight when missing.
    fn font(&self, weight: FontWeight) -> Option<&Font> {
        match weight {
            FontWeight::Regular => self.regular.as_ref().or(self.bold.as_ref()),
            FontWeight::Bold => self.bold.as_ref().or(self.regular.as_ref()),
        }
    }

    /// Size of the block `text` occupies, or `None` without a font.
    pub fn measure(&self, text: &str, weight: FontWeight, font_size: f32) -> Option<(u32, u32)> {
        let font = self.font(weight)?;
        let block = measure_block(font, text, font_size);
        Some((block.width.max(0) as u32, block.height.max(0) as u32))
    }

    /// Largest size not above `font_size` at which `text` fits in `max_width`.
    pub fn fit_size(&self, text: &str, weight: FontWeight, font_size: f32, max_width: f32) -> f32 {
        match self.measure(text, weight, font_size) {
            Some((width, _)) if width as f32 > max_width && width > 0 => {
                font_size * max_width / width as f32
            }
            _ => font_size,
        }
    }

    /// Where the last line of `text` ends inside the block `render_text`
    /// produces: its right edge, and its vertical middle.
    pub fn trailing_edge(&self, text: &str, weight: FontWeight, font_size: f32) -> Option<(i32, i32)> {
        let font = self.font(weight)?;
        let block = measure_block(font, text, font_size);
        let last = block.line_widths.last().copied().unwrap_or(0);
        let lines = block.line_widths.len().max(1) as i32;
        let line_height = block.height - block.line_spacing * (lines - 1);
        Some((
            (block.width - last) / 2 + last,
            block.line_spacing * (lines - 1) + line_height / 2,
        ))
    }

    /// Render center-aligned text into a buffer sized to fit it.
    ///
    /// Supports multi-line text (splits on `\n`). Returns `None` for empty
    /// text or when no font is loaded.
    pub fn render_text(
        &self,
        text: &str,
        weight: FontWeight,
        font_size: f32,
        color: &Color,
    ) -> Option<FrameBuffer> {
        if text.is_empty() || font_size <= 0.0 {
            return None;
        }
        let font = self.font(weight)?;
        let block = measure_block(font, text, font_size);

        let mut fb = FrameBuffer::new(block.width.max(1) as u32, block.height.max(1) as u32);
        let rgba = color.to_rgba8();

        let mut y_offset = 0;
        for (line, width) in text.split('\n').zip(&block.line_widths) {
            let x_offset = (block.width - width) / 2;
            render_line_into(&mut fb, font, line, font_size, rgba, x_offset, y_offset + block.ascent);
            y_offset += block.line_spacing;
        }

        Some(fb)
    }
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer")
            .field("regular", &self.regular.is_some())
            .field("bold", &self.bold.is_some())
            .finish()
    }
}

/// Measurements for a block of lines.
#[derive(Debug, Clone)]
struct BlockMeasure {
    width: i32,
    height: i32,
    /// Line ascent (above baseline).
    ascent: i32,
    line_spacing: i32,
    line_widths: Vec<i32>,
}

/// Measure every line of `text`. Line height comes from the font's
/// horizontal metrics so it does not depend on which glyphs are present.
fn measure_block(font: &Font, text: &str, font_size: f32) -> BlockMeasure {
    let (ascent, descent) = match font.horizontal_line_metrics(font_size) {
        Some(lm) => (lm.ascent.ceil() as i32, (-lm.descent).ceil() as i32),
        None => (font_size.ceil() as i32, (font_size * 0.25).ceil() as i32),
    };
    let line_spacing = (font_size * 1.3) as i32; // ~130% line height

    let line_widths: Vec<i32> = text
        .split('\n')
        .map(|line| {
            line.chars()
                .map(|ch| font.metrics(ch, font_size).advance_width)
                .sum::<f32>()
                .ceil() as i32
        })
        .collect();
    let lines = line_widths.len().max(1) as i32;

    BlockMeasure {
        width: line_widths.iter().copied().max().unwrap_or(0),
        height: line_spacing * (lines - 1) + ascent + descent,
        ascent,
        line_spacing,
        line_widths,
    }
}

/// Render a single line with its baseline at `baseline_y`.
fn render_line_into(
    fb: &mut FrameBuffer,
    font: &Font,
    text: &str,
    font_size: f32,
    [r, g, b, a]: [u8; 4],
    x_offset: i32,
    baseline_y: i32,
) {
    let mut cursor_x = x_offset as f32;

    for ch in text.chars() {
        let (metrics, bitmap) = font.rasterize(ch, font_size);
        let glyph_x = cursor_x.round() as i32 + metrics.xmin;
        let glyph_y = baseline_y - (metrics.height as i32 + metrics.ymin);

        for gy in 0..metrics.height {
            for gx in 0..metrics.width {
                let coverage = bitmap[gy * metrics.width + gx];
                if coverage == 0 {
                    continue;
                }
                let (px, py) = (glyph_x + gx as i32, glyph_y + gy as i32);
                if px < 0 || py < 0 {
                    continue;
                }
                let alpha = (coverage as u32 * a as u32 / 255) as u8;
                // Overlapping glyph edges keep the stronger coverage.
                let existing = fb.get_pixel(px as u32, py as u32).map_or(0, |p| p[3]);
                if alpha > existing {
                    fb.set_pixel(px as u32, py as u32, [r, g, b, alpha]);
                }
            }
        }

        cursor_x += metrics.advance_width;
    }
}
