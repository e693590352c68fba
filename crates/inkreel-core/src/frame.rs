use serde::{Deserialize, Serialize};

use crate::Color;

/// Bytes per pixel of every frame buffer (8-bit straight-alpha RGBA).
pub const BYTES_PER_PIXEL: usize = 4;

/// A raster frame as a raw RGBA8 pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Row-major RGBA pixel data.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl FrameBuffer {
    /// Create a frame buffer filled with transparent black.
    pub fn new(width: u32, height: u32) -> Self {
        let size = (width as usize) * (height as usize) * BYTES_PER_PIXEL;
        Self {
            data: vec![0u8; size],
            width,
            height,
        }
    }

    /// Create a frame buffer filled with a solid color.
    pub fn solid(width: u32, height: u32, color: &Color) -> Self {
        let mut fb = Self::new(width, height);
        fb.fill(color);
        fb
    }

    /// Wrap existing RGBA data. Returns None when the length does not match.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * BYTES_PER_PIXEL {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }

    /// Overwrite every pixel with `color`.
    pub fn fill(&mut self, color: &Color) {
        let pixel = color.to_rgba8();
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&pixel);
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// Get the RGBA value at a pixel coordinate. Returns None if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize) * (self.width as usize) + (x as usize)) * BYTES_PER_PIXEL;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    /// Set the RGBA value at a pixel coordinate. No-op if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = ((y as usize) * (self.width as usize) + (x as usize)) * BYTES_PER_PIXEL;
        self.data[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&rgba);
    }

    /// Alpha-composite `src` on top of `self` at position (dx, dy).
    pub fn composite_over(&mut self, src: &FrameBuffer, dx: i32, dy: i32) {
        self.composite_over_with_opacity(src, dx, dy, 1.0);
    }

    /// Alpha-composite `src` at (dx, dy), scaling the source alpha by `opacity`.
    ///
    /// Pixels falling outside `self` are clipped. An opacity of zero or below
    /// leaves the destination untouched.
    pub fn composite_over_with_opacity(
        &mut self,
        src: &FrameBuffer,
        dx: i32,
        dy: i32,
        opacity: f32,
    ) {
        let op = (opacity.clamp(0.0, 1.0) * 255.0).round() as u32;
        if op == 0 {
            return;
        }

        let dst_width = self.width as i64;
        let dst_height = self.height as i64;
        let (dx, dy) = (dx as i64, dy as i64);

        let start_y = (-dy).max(0);
        let end_y = (src.height as i64).min(dst_height - dy);
        let start_x = (-dx).max(0);
        let end_x = (src.width as i64).min(dst_width - dx);

        if start_x >= end_x || start_y >= end_y {
            return;
        }

        let src_stride = src.width as usize * BYTES_PER_PIXEL;
        let dst_stride = self.width as usize * BYTES_PER_PIXEL;
        let len = (end_x - start_x) as usize * BYTES_PER_PIXEL;

        for sy in start_y..end_y {
            let dst_y = (dy + sy) as usize;
            let src_row_start = sy as usize * src_stride + start_x as usize * BYTES_PER_PIXEL;
            let dst_row_start =
                dst_y * dst_stride + (dx + start_x) as usize * BYTES_PER_PIXEL;

            let src_slice = &src.data[src_row_start..src_row_start + len];
            let dst_slice = &mut self.data[dst_row_start..dst_row_start + len];

            for (s, d) in src_slice.chunks_exact(4).zip(dst_slice.chunks_exact_mut(4)) {
                blend_pixel(d, [s[0], s[1], s[2]], s[3] as u32 * op / 255);
            }
        }
    }

    /// Alpha-composite `src` stretched to `dst_width × dst_height` with its
    /// top-left corner at `(x, y)`, sampling bilinearly per destination pixel.
    ///
    /// Only destination pixels inside `self` are visited and nothing is
    /// allocated, so the cost is bounded by `self` whatever the stretch.
    pub fn composite_scaled(
        &mut self,
        src: &FrameBuffer,
        x: f64,
        y: f64,
        dst_width: f64,
        dst_height: f64,
        opacity: f32,
    ) {
        let op = (opacity.clamp(0.0, 1.0) * 255.0).round() as u32;
        if op == 0 || src.width == 0 || src.height == 0 {
            return;
        }
        if !(x.is_finite() && y.is_finite() && dst_width > 0.0 && dst_height > 0.0) {
            return;
        }
        if !(dst_width.is_finite() && dst_height.is_finite()) {
            return;
        }

        // A destination pixel is covered when its center falls inside the rect.
        let span = |origin: f64, extent: f64, limit: u32| {
            let start = (origin - 0.5).ceil().max(0.0);
            let end = (origin + extent - 0.5).ceil().min(limit as f64);
            (start < end).then(|| (start as u32, end as u32))
        };
        let (Some((x0, x1)), Some((y0, y1))) = (
            span(x, dst_width, self.width),
            span(y, dst_height, self.height),
        ) else {
            return;
        };

        let step_x = src.width as f64 / dst_width;
        let step_y = src.height as f64 / dst_height;
        for py in y0..y1 {
            let v = (py as f64 + 0.5 - y) * step_y - 0.5;
            for px in x0..x1 {
                let u = (px as f64 + 0.5 - x) * step_x - 0.5;
                let [r, g, b, a] = src.sample_bilinear(u, v);
                let offset = ((py as usize) * (self.width as usize) + px as usize) * BYTES_PER_PIXEL;
                blend_pixel(
                    &mut self.data[offset..offset + BYTES_PER_PIXEL],
                    [r, g, b],
                    a as u32 * op / 255,
                );
            }
        }
    }

    /// Straight-alpha bilinear sample at source coordinates `(u, v)`, where
    /// pixel centers sit on integers. Edges are clamped.
    fn sample_bilinear(&self, u: f64, v: f64) -> [u8; 4] {
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        let u = u.clamp(0.0, max_x);
        let v = v.clamp(0.0, max_y);
        let (ux, vy) = (u.floor(), v.floor());
        let (fx, fy) = (u - ux, v - vy);
        let (x0, y0) = (ux as u32, vy as u32);
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        // Interpolate premultiplied so transparent neighbours don't bleed color.
        let mut acc = [0.0f64; 4];
        for (sx, sy, w) in [
            (x0, y0, (1.0 - fx) * (1.0 - fy)),
            (x1, y0, fx * (1.0 - fy)),
            (x0, y1, (1.0 - fx) * fy),
            (x1, y1, fx * fy),
        ] {
            let offset = ((sy as usize) * (self.width as usize) + sx as usize) * BYTES_PER_PIXEL;
            let px = &self.data[offset..offset + BYTES_PER_PIXEL];
            let a = px[3] as f64 * w;
            acc[0] += px[0] as f64 * a;
            acc[1] += px[1] as f64 * a;
            acc[2] += px[2] as f64 * a;
            acc[3] += a;
        }
        if acc[3] <= 0.0 {
            return [0, 0, 0, 0];
        }
        let channel = |c: f64| (c / acc[3]).round().clamp(0.0, 255.0) as u8;
        [
            channel(acc[0]),
            channel(acc[1]),
            channel(acc[2]),
            acc[3].round().clamp(0.0, 255.0) as u8,
        ]
    }

    /// Blend a solid rectangle over the buffer. The rectangle is clipped to bounds.
    pub fn fill_rect_blend(&mut self, x: i32, y: i32, width: u32, height: u32, color: &Color) {
        let [r, g, b, a] = color.to_rgba8();
        if a == 0 {
            return;
        }
        let x0 = x.max(0) as i64;
        let y0 = y.max(0) as i64;
        let x1 = (x as i64 + width as i64).min(self.width as i64);
        let y1 = (y as i64 + height as i64).min(self.height as i64);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let stride = self.width as usize * BYTES_PER_PIXEL;
        for row in y0..y1 {
            let start = row as usize * stride + x0 as usize * BYTES_PER_PIXEL;
            let end = row as usize * stride + x1 as usize * BYTES_PER_PIXEL;
            for d in self.data[start..end].chunks_exact_mut(4) {
                blend_pixel(d, [r, g, b], a as u32);
            }
        }
    }
}

/// Porter-Duff "over" of one straight-alpha source pixel onto `d`.
#[inline]
fn blend_pixel(d: &mut [u8], rgb: [u8; 3], sa: u32) {
    if sa == 0 {
        return;
    }
    if sa == 255 {
        d[0] = rgb[0];
        d[1] = rgb[1];
        d[2] = rgb[2];
        d[3] = 255;
        return;
    }

    let da = d[3] as u32;
    let inv_sa = 255 - sa;
    let out_a = sa + (da * inv_sa) / 255;
    if out_a == 0 {
        return;
    }

    for c in 0..3 {
        let s = rgb[c] as u32;
        let dc = d[c] as u32;
        d[c] = ((s * sa * 255 + dc * da * inv_sa) / (out_a * 255)) as u8;
    }
    d[3] = out_a as u8;
}

/// A frame position in the output video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Zero-based frame index.
    pub index: u64,
}

impl Frame {
    pub fn new(index: u64) -> Self {
        Self { index }
    }

    /// Presentation timestamp in microseconds: `index × 1_000_000 / fps`.
    pub fn pts_micros(&self, fps: u32) -> i64 {
        if fps == 0 {
            return 0;
        }
        (self.index as i64 * 1_000_000) / fps as i64
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame({})", self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buffer_new() {
        let fb = FrameBuffer::new(1280, 720);
        assert_eq!(fb.byte_size(), 1280 * 720 * 4);
        assert_eq!(fb.pixel_count(), 1280 * 720);
        assert_eq!(fb.get_pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_frame_buffer_solid_and_fill() {
        let mut fb = FrameBuffer::solid(2, 2, &Color::RED);
        assert_eq!(fb.get_pixel(1, 1), Some([255, 0, 0, 255]));
        fb.fill(&Color::WHITE);
        assert_eq!(fb.get_pixel(0, 1), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_from_rgba_length_mismatch() {
        assert!(FrameBuffer::from_rgba(2, 2, vec![0; 15]).is_none());
        assert!(FrameBuffer::from_rgba(2, 2, vec![0; 16]).is_some());
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut fb = FrameBuffer::new(10, 10);
        assert_eq!(fb.get_pixel(10, 0), None);
        fb.set_pixel(0, 10, [1, 2, 3, 4]);
        assert!(fb.data.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_composite_over_opaque_clips_negative_offset() {
        let mut dst = FrameBuffer::solid(4, 4, &Color::BLUE);
        let src = FrameBuffer::solid(2, 2, &Color::RED);
        dst.composite_over(&src, -1, -1);
        assert_eq!(dst.get_pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(1, 1), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_composite_entirely_outside_is_noop() {
        let mut dst = FrameBuffer::solid(4, 4, &Color::BLUE);
        let src = FrameBuffer::solid(2, 2, &Color::RED);
        dst.composite_over(&src, 10, 0);
        dst.composite_over(&src, 0, -5);
        assert!(dst.data.chunks(4).all(|p| p == [0, 0, 255, 255]));
    }

    #[test]
    fn test_composite_with_half_opacity() {
        let mut dst = FrameBuffer::solid(1, 1, &Color::WHITE);
        let src = FrameBuffer::solid(1, 1, &Color::BLACK);
        dst.composite_over_with_opacity(&src, 0, 0, 0.5);
        let [r, g, b, a] = dst.get_pixel(0, 0).unwrap();
        assert!(r > 100 && r < 160, "r = {}", r);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(a, 255);
    }

    #[test]
    fn test_composite_zero_opacity_is_noop() {
        let mut dst = FrameBuffer::solid(2, 2, &Color::WHITE);
        let src = FrameBuffer::solid(2, 2, &Color::BLACK);
        dst.composite_over_with_opacity(&src, 0, 0, 0.0);
        assert_eq!(dst.get_pixel(0, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_fill_rect_blend_clips() {
        let mut fb = FrameBuffer::solid(4, 4, &Color::WHITE);
        fb.fill_rect_blend(2, 2, 10, 10, &Color::BLACK);
        assert_eq!(fb.get_pixel(3, 3), Some([0, 0, 0, 255]));
        assert_eq!(fb.get_pixel(1, 1), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_composite_scaled_stretches_and_clips() {
        let mut dst = FrameBuffer::solid(8, 8, &Color::WHITE);
        let src = FrameBuffer::solid(2, 2, &Color::RED);
        dst.composite_scaled(&src, 2.0, 2.0, 4.0, 4.0, 1.0);
        assert_eq!(dst.get_pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(5, 5), Some([255, 0, 0, 255]));
        assert_eq!(dst.get_pixel(1, 2), Some([255, 255, 255, 255]));
        assert_eq!(dst.get_pixel(6, 5), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_composite_scaled_huge_stretch_covers_destination() {
        let mut dst = FrameBuffer::solid(16, 16, &Color::WHITE);
        let src = FrameBuffer::solid(2, 2, &Color::BLUE);
        dst.composite_scaled(&src, -1e10, -1e10, 2e10 + 16.0, 2e10 + 16.0, 1.0);
        assert!(dst.data.chunks_exact(4).all(|p| p == [0, 0, 255, 255]));

        let mut untouched = FrameBuffer::solid(4, 4, &Color::WHITE);
        untouched.composite_scaled(&src, 10.0, 0.0, 1e12, 4.0, 1.0);
        untouched.composite_scaled(&src, 0.0, 0.0, f64::INFINITY, 4.0, 1.0);
        assert!(untouched.data.chunks_exact(4).all(|p| p == [255, 255, 255, 255]));
    }

    #[test]
    fn test_frame_pts_micros() {
        assert_eq!(Frame::new(0).pts_micros(30), 0);
        assert_eq!(Frame::new(30).pts_micros(30), 1_000_000);
        assert_eq!(Frame::new(1).pts_micros(30), 33_333);
        assert_eq!(Frame::new(5).pts_micros(0), 0);
    }
}
