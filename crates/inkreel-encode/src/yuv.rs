//! RGBA → I420 (planar YUV 4:2:0) conversion, BT.601 limited range.
//!
//! Rows of one frame are converted in parallel; frames themselves are
//! always converted one at a time.

use inkreel_core::{FrameBuffer, InkreelError, InkreelResult};
use rayon::prelude::*;

/// A planar 4:2:0 frame: full-size Y followed by quarter-size U and V.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I420Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl I420Frame {
    /// A black frame. Both dimensions must be even.
    pub fn new(width: u32, height: u32) -> Self {
        let luma = width as usize * height as usize;
        let mut data = vec![16u8; luma + luma / 2];
        data[luma..].fill(128);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn luma_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn y_plane(&self) -> &[u8] {
        &self.data[..self.luma_len()]
    }

    pub fn u_plane(&self) -> &[u8] {
        let luma = self.luma_len();
        &self.data[luma..luma + luma / 4]
    }

    pub fn v_plane(&self) -> &[u8] {
        let luma = self.luma_len();
        &self.data[luma + luma / 4..]
    }
}

#[inline]
fn luma(r: i32, g: i32, b: i32) -> u8 {
    (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16) as u8
}

#[inline]
fn chroma(r: i32, g: i32, b: i32) -> (u8, u8) {
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (u as u8, v as u8)
}

/// Convert an RGBA frame. Alpha is ignored; frames are expected to be opaque.
pub fn rgba_to_i420(frame: &FrameBuffer) -> InkreelResult<I420Frame> {
    let mut out = I420Frame::new(frame.width, frame.height);
    rgba_to_i420_into(frame, &mut out)?;
    Ok(out)
}

/// Convert into an existing I420 buffer of the same dimensions.
pub fn rgba_to_i420_into(frame: &FrameBuffer, out: &mut I420Frame) -> InkreelResult<()> {
    let (w, h) = (frame.width as usize, frame.height as usize);
    if w % 2 != 0 || h % 2 != 0 || w == 0 || h == 0 {
        return Err(InkreelError::Encode(format!(
            "I420 needs even, non-zero dimensions; got {}x{}",
            w, h
        )));
    }
    if (out.width, out.height) != (frame.width, frame.height) {
        return Err(InkreelError::Encode(format!(
            "I420 buffer is {}x{}, frame is {}x{}",
            out.width, out.height, w, h
        )));
    }

    let rgba = &frame.data;
    let stride = w * 4;
    let (y_plane, chroma_planes) = out.data.split_at_mut(w * h);
    let (u_plane, v_plane) = chroma_planes.split_at_mut(w * h / 4);

    y_plane
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(row, y_row)| {
            let src = &rgba[row * stride..(row + 1) * stride];
            for (y, px) in y_row.iter_mut().zip(src.chunks_exact(4)) {
                *y = luma(px[0] as i32, px[1] as i32, px[2] as i32);
            }
        });

    let cw = w / 2;
    u_plane
        .par_chunks_mut(cw)
        .zip(v_plane.par_chunks_mut(cw))
        .enumerate()
        .for_each(|(crow, (u_row, v_row))| {
            let top = &rgba[2 * crow * stride..(2 * crow + 1) * stride];
            let bottom = &rgba[(2 * crow + 1) * stride..(2 * crow + 2) * stride];
            for cx in 0..cw {
                let i = cx * 8;
                let sum = |c: usize| {
                    top[i + c] as i32 + top[i + 4 + c] as i32 + bottom[i + c] as i32 + bottom[i + 4 + c] as i32
                };
                let (u, v) = chroma((sum(0) + 2) / 4, (sum(1) + 2) / 4, (sum(2) + 2) / 4);
                u_row[cx] = u;
                v_row[cx] = v;
            }
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkreel_core::Color;

    #[test]
    fn test_plane_sizes() {
        let f = I420Frame::new(4, 2);
        assert_eq!(f.data.len(), 12);
        assert_eq!(f.y_plane().len(), 8);
        assert_eq!(f.u_plane().len(), 2);
        assert_eq!(f.v_plane().len(), 2);
    }

    #[test]
    fn test_reference_colors() {
        let white = rgba_to_i420(&FrameBuffer::solid(2, 2, &Color::WHITE)).unwrap();
        assert!(white.y_plane().iter().all(|&y| y == 235));
        assert_eq!(white.u_plane(), &[128]);
        assert_eq!(white.v_plane(), &[128]);

        let black = rgba_to_i420(&FrameBuffer::solid(2, 2, &Color::BLACK)).unwrap();
        assert!(black.y_plane().iter().all(|&y| y == 16));
        assert_eq!(black.u_plane(), &[128]);

        let red = rgba_to_i420(&FrameBuffer::solid(2, 2, &Color::RED)).unwrap();
        assert_eq!(red.y_plane()[0], 82);
        assert_eq!(red.u_plane(), &[90]);
        assert_eq!(red.v_plane(), &[240]);
    }

    #[test]
    fn test_chroma_averages_block() {
        let mut fb = FrameBuffer::solid(2, 2, &Color::WHITE);
        fb.set_pixel(0, 0, [0, 0, 0, 255]);
        fb.set_pixel(1, 1, [0, 0, 0, 255]);
        let out = rgba_to_i420(&fb).unwrap();
        assert_eq!(out.y_plane(), &[16, 235, 235, 16]);
        assert_eq!(out.u_plane(), &[128]);
    }

    #[test]
    fn test_odd_dimensions_rejected() {
        assert!(rgba_to_i420(&FrameBuffer::new(3, 2)).is_err());
        let mut out = I420Frame::new(4, 4);
        assert!(rgba_to_i420_into(&FrameBuffer::new(2, 2), &mut out).is_err());
    }
}
