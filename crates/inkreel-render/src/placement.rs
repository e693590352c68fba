//! Anchoring objects on the canvas.

use inkreel_core::Point2D;
use inkreel_ir::Placement;

/// Fraction of the canvas' short side kept clear along non-centered edges.
pub const EDGE_PADDING_FRACTION: f64 = 0.05;

/// Edge padding for a canvas.
pub fn edge_padding(canvas_width: f64, canvas_height: f64) -> f64 {
    canvas_width.min(canvas_height) * EDGE_PADDING_FRACTION
}

/// Top-left offset of an `object_width × object_height` object anchored by
/// `placement`. Never fails; the result is negative when the object is larger
/// than the canvas, and clipping is left to the caller.
pub fn place(
    placement: Placement,
    object_width: f64,
    object_height: f64,
    canvas_width: f64,
    canvas_height: f64,
) -> Point2D {
    let pad = edge_padding(canvas_width, canvas_height);
    let center_x = (canvas_width - object_width) / 2.0;
    let center_y = (canvas_height - object_height) / 2.0;
    let left = pad;
    let right = canvas_width - object_width - pad;
    let top = pad;
    let bottom = canvas_height - object_height - pad;

    let (x, y) = match placement {
        Placement::Center => (center_x, center_y),
        Placement::TopLeft => (left, top),
        Placement::TopRight => (right, top),
        Placement::BottomLeft => (left, bottom),
        Placement::BottomRight => (right, bottom),
        Placement::TopCenter => (center_x, top),
        Placement::BottomCenter => (center_x, bottom),
        Placement::LeftCenter => (left, center_y),
        Placement::RightCenter => (right, center_y),
    };
    Point2D::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_center_is_exact() {
        let p = place(Placement::Center, 200.0, 100.0, 1280.0, 720.0);
        assert_eq!(p, Point2D::new(540.0, 310.0));
    }

    #[test]
    fn test_corners_use_short_side_padding() {
        // 5% of 720 = 36
        assert_eq!(
            place(Placement::TopLeft, 100.0, 100.0, 1280.0, 720.0),
            Point2D::new(36.0, 36.0)
        );
        assert_eq!(
            place(Placement::BottomRight, 100.0, 100.0, 1280.0, 720.0),
            Point2D::new(1144.0, 584.0)
        );
    }

    #[test]
    fn test_edge_centers() {
        let top = place(Placement::TopCenter, 100.0, 50.0, 1000.0, 1000.0);
        assert_eq!(top, Point2D::new(450.0, 50.0));
        let right = place(Placement::RightCenter, 100.0, 50.0, 1000.0, 1000.0);
        assert_eq!(right, Point2D::new(850.0, 475.0));
    }

    #[test]
    fn test_oversized_object_goes_negative() {
        let p = place(Placement::Center, 2000.0, 100.0, 1000.0, 500.0);
        assert!(p.x < 0.0);
        assert!(p.x.is_finite() && p.y.is_finite());
    }

    proptest! {
        #[test]
        fn prop_placed_box_stays_inside_padding(
            cw in 2u32..4000,
            ch in 2u32..4000,
            wf in 0.0f64..0.9,
            hf in 0.0f64..0.9,
            idx in 0usize..9,
        ) {
            let (cw, ch) = (cw as f64, ch as f64);
            let pad = edge_padding(cw, ch);
            let (ow, oh) = ((cw - 2.0 * pad) * wf, (ch - 2.0 * pad) * hf);
            let placement = Placement::ALL[idx];
            let p = place(placement, ow, oh, cw, ch);
            let eps = 1e-6;
            if placement == Placement::Center {
                prop_assert!((p.x + ow / 2.0 - cw / 2.0).abs() < eps);
                prop_assert!((p.y + oh / 2.0 - ch / 2.0).abs() < eps);
            } else {
                prop_assert!(p.x >= pad - eps && p.x <= cw - pad - ow + eps);
                prop_assert!(p.y >= pad - eps && p.y <= ch - pad - oh + eps);
            }
        }
    }
}
