//! Staggered asset reveal and per-style transforms.
//!
//! Every asset of a scene gets a window of the scene's progress in which it
//! animates. Windows are `0.8 / N` wide and start `0.7` window-widths apart
//! from `0.1`, so consecutive assets overlap slightly and the last one
//! finishes before the scene ends.

use inkreel_core::{Point2D, Size2D};
use inkreel_ir::AnimationStyle;

/// Scene progress at which the first asset starts animating.
pub const STAGGER_LEAD_IN: f64 = 0.1;
/// Share of the scene's progress divided among all assets.
pub const STAGGER_SPAN: f64 = 0.8;
/// Distance between consecutive window starts, in window widths.
pub const STAGGER_STEP: f64 = 0.7;
/// Final scale of `ZoomOut`, relative to the asset's own scale.
pub const ZOOM_OUT_FLOOR: f64 = 0.5;

/// The slice of scene progress in which one asset animates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaggerWindow {
    pub start: f64,
    pub width: f64,
}

impl StaggerWindow {
    /// Window of the asset at `index` among `count` assets. `None` when the
    /// scene has no assets or the index is out of range.
    pub fn for_asset(index: usize, count: usize) -> Option<Self> {
        if count == 0 || index >= count {
            return None;
        }
        let width = STAGGER_SPAN / count as f64;
        Some(Self {
            start: STAGGER_LEAD_IN + index as f64 * width * STAGGER_STEP,
            width,
        })
    }

    pub fn end(&self) -> f64 {
        self.start + self.width
    }

    /// Map scene progress onto this window, clamped to `[0, 1]`.
    pub fn local_progress(&self, scene_progress: f64) -> f64 {
        ((scene_progress - self.start) / self.width).clamp(0.0, 1.0)
    }
}

/// Where an asset would sit with no animation applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetPose {
    /// Decoded raster size before scaling.
    pub size: Size2D,
    /// Top-left corner after placement and offset, at full scale.
    pub origin: Point2D,
    /// The asset's own uniform scale.
    pub scale: f64,
    /// Canvas size, used as the slide distance.
    pub canvas: Size2D,
}

/// Normalized drawing instructions for one asset on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetTransform {
    pub opacity: f32,
    /// Final scale applied to the decoded raster.
    pub scale: f64,
    /// Top-left corner of the scaled raster.
    pub position: Point2D,
}

impl AssetTransform {
    /// Pixel size of the scaled raster, rounded and saturated to `u32`.
    /// Either side may be zero.
    pub fn scaled_size(&self, size: Size2D) -> (u32, u32) {
        let side = |v: f64| {
            let v = (v * self.scale).round();
            if v.is_nan() {
                0
            } else {
                v.clamp(0.0, u32::MAX as f64) as u32
            }
        };
        (side(size.width), side(size.height))
    }
}

/// Evaluate `style` at local progress `p`. Returns `None` while the asset is
/// not yet visible (`p <= 0`).
pub fn evaluate(style: AnimationStyle, p: f64, pose: &AssetPose) -> Option<AssetTransform> {
    if p <= 0.0 {
        return None;
    }
    let p = p.min(1.0);
    let s = pose.scale;
    let at_rest = AssetTransform {
        opacity: 1.0,
        scale: s,
        position: pose.origin,
    };

    let transform = match style {
        AnimationStyle::None | AnimationStyle::HandDraw => at_rest,
        AnimationStyle::FadeIn => AssetTransform {
            opacity: p as f32,
            ..at_rest
        },
        AnimationStyle::FadeOut => AssetTransform {
            opacity: (1.0 - p) as f32,
            ..at_rest
        },
        AnimationStyle::ZoomIn => scaled_about_center(pose, s * p),
        AnimationStyle::ZoomOut => scaled_about_center(pose, s * (1.0 - (1.0 - ZOOM_OUT_FLOOR) * p)),
        AnimationStyle::SlideLeft => shifted(at_rest, (1.0 - p) * pose.canvas.width, 0.0),
        AnimationStyle::SlideRight => shifted(at_rest, (1.0 - p) * -pose.canvas.width, 0.0),
        AnimationStyle::SlideUp => shifted(at_rest, 0.0, (1.0 - p) * pose.canvas.height),
        AnimationStyle::SlideDown => shifted(at_rest, 0.0, (1.0 - p) * -pose.canvas.height),
    };
    Some(transform)
}

fn scaled_about_center(pose: &AssetPose, scale: f64) -> AssetTransform {
    let cx = pose.origin.x + pose.size.width * pose.scale / 2.0;
    let cy = pose.origin.y + pose.size.height * pose.scale / 2.0;
    AssetTransform {
        opacity: 1.0,
        scale,
        position: Point2D::new(
            cx - pose.size.width * scale / 2.0,
            cy - pose.size.height * scale / 2.0,
        ),
    }
}

fn shifted(t: AssetTransform, dx: f64, dy: f64) -> AssetTransform {
    AssetTransform {
        position: Point2D::new(t.position.x + dx, t.position.y + dy),
        ..t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pose() -> AssetPose {
        AssetPose {
            size: Size2D::new(100.0, 50.0),
            origin: Point2D::new(200.0, 100.0),
            scale: 2.0,
            canvas: Size2D::new(1280.0, 720.0),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_three_asset_windows() {
        let w: Vec<_> = (0..3)
            .map(|i| StaggerWindow::for_asset(i, 3).unwrap())
            .collect();
        assert!(close(w[0].start, 0.1));
        assert!(close(w[1].start, 0.2867));
        assert!(close(w[2].start, 0.4733));
        for window in &w {
            assert!(close(window.width, 0.2667));
        }
        assert!(close(w[2].end(), 0.74));
    }

    #[test]
    fn test_no_assets_no_window() {
        assert!(StaggerWindow::for_asset(0, 0).is_none());
        assert!(StaggerWindow::for_asset(3, 3).is_none());
    }

    #[test]
    fn test_local_progress_clamps() {
        let w = StaggerWindow::for_asset(0, 1).unwrap();
        assert_eq!(w.local_progress(0.0), 0.0);
        assert_eq!(w.local_progress(1.0), 1.0);
        assert!(close(w.local_progress(0.5), 0.5));
    }

    #[test]
    fn test_absent_before_window() {
        for style in AnimationStyle::ALL {
            assert!(evaluate(style, 0.0, &pose()).is_none(), "{style}");
        }
    }

    #[test]
    fn test_static_styles_rest_at_origin() {
        for style in [AnimationStyle::None, AnimationStyle::HandDraw] {
            let t = evaluate(style, 0.3, &pose()).unwrap();
            assert_eq!(t.opacity, 1.0);
            assert_eq!(t.scale, 2.0);
            assert_eq!(t.position, Point2D::new(200.0, 100.0));
        }
    }

    #[test]
    fn test_fades() {
        let t = evaluate(AnimationStyle::FadeIn, 0.25, &pose()).unwrap();
        assert!((t.opacity - 0.25).abs() < 1e-6);
        let t = evaluate(AnimationStyle::FadeOut, 0.25, &pose()).unwrap();
        assert!((t.opacity - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_keeps_center() {
        // At rest the object covers 200..400 × 100..200, centered on (300, 150).
        let t = evaluate(AnimationStyle::ZoomIn, 0.5, &pose()).unwrap();
        assert!(close(t.scale, 1.0));
        assert_eq!(t.position, Point2D::new(250.0, 125.0));

        let t = evaluate(AnimationStyle::ZoomOut, 1.0, &pose()).unwrap();
        assert!(close(t.scale, 1.0));
        assert_eq!(t.position, Point2D::new(250.0, 125.0));

        let t = evaluate(AnimationStyle::ZoomIn, 1.0, &pose()).unwrap();
        assert_eq!(t.position, Point2D::new(200.0, 100.0));
    }

    #[test]
    fn test_slides_travel_one_canvas() {
        let t = evaluate(AnimationStyle::SlideLeft, 0.5, &pose()).unwrap();
        assert_eq!(t.position, Point2D::new(840.0, 100.0));
        let t = evaluate(AnimationStyle::SlideRight, 0.5, &pose()).unwrap();
        assert_eq!(t.position, Point2D::new(-440.0, 100.0));
        let t = evaluate(AnimationStyle::SlideUp, 0.5, &pose()).unwrap();
        assert_eq!(t.position, Point2D::new(200.0, 460.0));
        let t = evaluate(AnimationStyle::SlideDown, 0.5, &pose()).unwrap();
        assert_eq!(t.position, Point2D::new(200.0, -260.0));
        let t = evaluate(AnimationStyle::SlideDown, 1.0, &pose()).unwrap();
        assert_eq!(t.position, Point2D::new(200.0, 100.0));
    }

    #[test]
    fn test_scaled_size_rounds() {
        let t = evaluate(AnimationStyle::ZoomIn, 0.001, &pose()).unwrap();
        assert_eq!(t.scaled_size(Size2D::new(100.0, 50.0)), (0, 0));
        let t = evaluate(AnimationStyle::None, 1.0, &pose()).unwrap();
        assert_eq!(t.scaled_size(Size2D::new(100.0, 50.0)), (200, 100));
        let huge = AssetTransform { scale: 1e12, ..t };
        assert_eq!(huge.scaled_size(Size2D::new(100.0, 50.0)), (u32::MAX, u32::MAX));
    }

    proptest! {
        #[test]
        fn prop_fade_in_is_monotonic(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let opacity = |p: f64| evaluate(AnimationStyle::FadeIn, p, &pose()).map_or(0.0, |t| t.opacity);
            prop_assert!(opacity(lo) <= opacity(hi));
        }

        #[test]
        fn prop_windows_stay_inside_scene(count in 1usize..64, sp in 0.0f64..=1.0) {
            for i in 0..count {
                let w = StaggerWindow::for_asset(i, count).unwrap();
                prop_assert!(w.start >= STAGGER_LEAD_IN - 1e-12);
                prop_assert!(w.end() <= 1.0);
                let p = w.local_progress(sp);
                prop_assert!((0.0..=1.0).contains(&p));
            }
        }
    }
}
