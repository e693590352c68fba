use serde::{Deserialize, Serialize};

/// A 2D point in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl Default for Point2D {
    fn default() -> Self {
        Self::zero()
    }
}

/// A 2D size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size2D {
    pub width: f64,
    pub height: f64,
}

impl Size2D {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Uniformly scaled copy.
    pub fn scaled(&self, factor: f64) -> Size2D {
        Size2D::new(self.width * factor, self.height * factor)
    }
}

/// Output canvas dimensions. Always even and at least 2×2, as H.264 4:2:0
/// encoders require. Deserializing rejects dimensions that break the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CanvasDims")]
pub struct CanvasSize {
    width: u32,
    height: u32,
}

impl CanvasSize {
    /// Floor both dimensions to the nearest even integer (minimum 2).
    pub fn even_floor(width: u32, height: u32) -> Self {
        Self {
            width: floor_even(width),
            height: floor_even(height),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Length of the shorter side.
    pub fn min_side(&self) -> u32 {
        self.width.min(self.height)
    }

    pub fn as_size(&self) -> Size2D {
        Size2D::new(self.width as f64, self.height as f64)
    }
}

#[derive(Deserialize)]
struct CanvasDims {
    width: u32,
    height: u32,
}

impl TryFrom<CanvasDims> for CanvasSize {
    type Error = String;

    fn try_from(dims: CanvasDims) -> Result<Self, Self::Error> {
        let canvas = CanvasSize::even_floor(dims.width, dims.height);
        if (canvas.width, canvas.height) != (dims.width, dims.height) {
            return Err(format!(
                "canvas {}x{} must be even and at least 2x2",
                dims.width, dims.height
            ));
        }
        Ok(canvas)
    }
}

impl std::fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn floor_even(v: u32) -> u32 {
    (v & !1).max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_scaled() {
        let s = Size2D::new(1920.0, 1080.0);
        assert_eq!(s.scaled(0.5), Size2D::new(960.0, 540.0));
    }

    #[test]
    fn test_canvas_even_floor() {
        let c = CanvasSize::even_floor(1281, 721);
        assert_eq!((c.width(), c.height()), (1280, 720));
        let c = CanvasSize::even_floor(1280, 720);
        assert_eq!((c.width(), c.height()), (1280, 720));
    }

    #[test]
    fn test_canvas_minimum_two() {
        let c = CanvasSize::even_floor(1, 0);
        assert_eq!((c.width(), c.height()), (2, 2));
        assert_eq!(c.to_string(), "2x2");
    }

    #[test]
    fn test_canvas_deserialize_keeps_even_rule() {
        let ok: CanvasSize = serde_json::from_str(r#"{"width":1280,"height":720}"#).unwrap();
        assert_eq!((ok.width(), ok.height()), (1280, 720));

        let odd = serde_json::from_str::<CanvasSize>(r#"{"width":1281,"height":720}"#);
        assert!(odd.unwrap_err().to_string().contains("must be even"));
        assert!(serde_json::from_str::<CanvasSize>(r#"{"width":0,"height":0}"#).is_err());

        let round_trip: CanvasSize = serde_json::from_str(&serde_json::to_string(&ok).unwrap()).unwrap();
        assert_eq!(round_trip, ok);
    }
}
