//! Blending two scene frames across a scene boundary.

use inkreel_core::{CanvasSize, Color, FrameBuffer};
use inkreel_ir::TransitionStyle;

use crate::image_loader::resize_exact;

/// Scale of the smaller frame in a zoom transition.
pub const ZOOM_TRANSITION_MIN_SCALE: f64 = 0.7;

/// Blend `outgoing` into `incoming` at `progress` on a fresh white canvas.
/// A missing frame contributes nothing.
pub fn render_transition(
    style: TransitionStyle,
    progress: f64,
    outgoing: Option<&FrameBuffer>,
    incoming: Option<&FrameBuffer>,
    canvas: CanvasSize,
) -> FrameBuffer {
    let mut frame = FrameBuffer::new(canvas.width(), canvas.height());
    render_transition_into(&mut frame, style, progress, outgoing, incoming);
    frame
}

/// Same as [`render_transition`], drawing into an existing canvas.
pub fn render_transition_into(
    frame: &mut FrameBuffer,
    style: TransitionStyle,
    progress: f64,
    outgoing: Option<&FrameBuffer>,
    incoming: Option<&FrameBuffer>,
) {
    let p = progress.clamp(0.0, 1.0);
    frame.fill(&Color::WHITE);

    match style {
        TransitionStyle::None => {
            let shown = if p < 0.5 { outgoing } else { incoming };
            if let Some(src) = shown {
                frame.composite_over(src, 0, 0);
            }
        }
        TransitionStyle::Fade => {
            if let Some(src) = outgoing {
                frame.composite_over_with_opacity(src, 0, 0, (1.0 - p) as f32);
            }
            if let Some(src) = incoming {
                frame.composite_over_with_opacity(src, 0, 0, p as f32);
            }
        }
        TransitionStyle::Slide => {
            let width = frame.width as f64;
            if let Some(src) = outgoing {
                frame.composite_over(src, (-p * width).round() as i32, 0);
            }
            if let Some(src) = incoming {
                frame.composite_over(src, ((1.0 - p) * width).round() as i32, 0);
            }
        }
        TransitionStyle::Zoom => {
            let shrink = 1.0 - (1.0 - ZOOM_TRANSITION_MIN_SCALE) * p;
            let grow = ZOOM_TRANSITION_MIN_SCALE + (1.0 - ZOOM_TRANSITION_MIN_SCALE) * p;
            if let Some(src) = outgoing {
                draw_centered_scaled(frame, src, shrink, (1.0 - p) as f32);
            }
            if let Some(src) = incoming {
                draw_centered_scaled(frame, src, grow, p as f32);
            }
        }
    }
}

fn draw_centered_scaled(frame: &mut FrameBuffer, src: &FrameBuffer, scale: f64, opacity: f32) {
    let w = (src.width as f64 * scale).round() as u32;
    let h = (src.height as f64 * scale).round() as u32;
    let Some(scaled) = resize_exact(src, w, h) else {
        return;
    };
    let x = (frame.width as i64 - w as i64) / 2;
    let y = (frame.height as i64 - h as i64) / 2;
    frame.composite_over_with_opacity(&scaled, x as i32, y as i32, opacity);
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn canvas() -> CanvasSize {
        CanvasSize::even_floor(100, 50)
    }

    fn frames() -> (FrameBuffer, FrameBuffer) {
        (
            FrameBuffer::solid(100, 50, &Color::RED),
            FrameBuffer::solid(100, 50, &Color::BLUE),
        )
    }

    #[test]
    fn test_hard_cut_at_half() {
        let (out, inc) = frames();
        let a = render_transition(TransitionStyle::None, 0.49, Some(&out), Some(&inc), canvas());
        assert_eq!(a.get_pixel(50, 25), Some(RED));
        let b = render_transition(TransitionStyle::None, 0.5, Some(&out), Some(&inc), canvas());
        assert_eq!(b.get_pixel(50, 25), Some(BLUE));
    }

    #[test]
    fn test_fade_endpoints() {
        let (out, inc) = frames();
        let start = render_transition(TransitionStyle::Fade, 0.0, Some(&out), Some(&inc), canvas());
        assert_eq!(start.get_pixel(10, 10), Some(RED));
        let end = render_transition(TransitionStyle::Fade, 1.0, Some(&out), Some(&inc), canvas());
        assert_eq!(end.get_pixel(10, 10), Some(BLUE));
        let mid = render_transition(TransitionStyle::Fade, 0.5, Some(&out), Some(&inc), canvas());
        let [r, _, b, _] = mid.get_pixel(10, 10).unwrap();
        assert!(r > 0 && b > 0);
    }

    #[test]
    fn test_slide_splits_canvas() {
        let (out, inc) = frames();
        let f = render_transition(TransitionStyle::Slide, 0.25, Some(&out), Some(&inc), canvas());
        assert_eq!(f.get_pixel(74, 25), Some(RED));
        assert_eq!(f.get_pixel(75, 25), Some(BLUE));
    }

    #[test]
    fn test_zoom_leaves_white_margin() {
        let (out, _) = frames();
        let f = render_transition(TransitionStyle::Zoom, 0.0, None, Some(&out), canvas());
        // Nothing incoming is visible at p = 0; outgoing is absent.
        assert_eq!(f.get_pixel(50, 25), Some(WHITE));
        let f = render_transition(TransitionStyle::Zoom, 1.0, None, Some(&out), canvas());
        assert_eq!(f.get_pixel(50, 25), Some(RED));
        let f = render_transition(TransitionStyle::Zoom, 0.0, Some(&out), None, canvas());
        assert_eq!(f.get_pixel(0, 0), Some(RED));
    }

    #[test]
    fn test_absent_frames_leave_white() {
        for style in [
            TransitionStyle::None,
            TransitionStyle::Fade,
            TransitionStyle::Slide,
            TransitionStyle::Zoom,
        ] {
            let f = render_transition(style, 0.3, None, None, canvas());
            assert!(f.data.chunks_exact(4).all(|p| p == WHITE), "{style}");
        }
    }
}
