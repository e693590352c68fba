use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::InkreelError;
use crate::math::CanvasSize;

/// Output resolution class, named by the length of the short side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Sd480,
    Hd720,
    FullHd1080,
}

impl Resolution {
    pub fn short_side(&self) -> u32 {
        match self {
            Resolution::Sd480 => 480,
            Resolution::Hd720 => 720,
            Resolution::FullHd1080 => 1080,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Hd720
    }
}

impl FromStr for Resolution {
    type Err = InkreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "480" | "480p" | "sd480" => Ok(Resolution::Sd480),
            "720" | "720p" | "hd720" => Ok(Resolution::Hd720),
            "1080" | "1080p" | "full_hd1080" => Ok(Resolution::FullHd1080),
            other => Err(InkreelError::InvalidArgument(format!(
                "unknown resolution '{}' (expected 480p, 720p or 1080p)",
                other
            ))),
        }
    }
}

/// Frame aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 16:9
    Landscape,
    /// 9:16
    Portrait,
    /// 1:1
    Square,
}

impl AspectRatio {
    /// Nominal (width, height) for a resolution class before even-flooring.
    pub fn nominal_dimensions(&self, resolution: Resolution) -> (u32, u32) {
        let short = resolution.short_side();
        let long = (short as f64 * 16.0 / 9.0).round() as u32;
        match self {
            AspectRatio::Landscape => (long, short),
            AspectRatio::Portrait => (short, long),
            AspectRatio::Square => (short, short),
        }
    }

    /// Encoder-ready canvas for a resolution class.
    pub fn canvas(&self, resolution: Resolution) -> CanvasSize {
        let (w, h) = self.nominal_dimensions(resolution);
        CanvasSize::even_floor(w, h)
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        AspectRatio::Landscape
    }
}

impl FromStr for AspectRatio {
    type Err = InkreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "16:9" | "landscape" => Ok(AspectRatio::Landscape),
            "9:16" | "portrait" => Ok(AspectRatio::Portrait),
            "1:1" | "square" => Ok(AspectRatio::Square),
            other => Err(InkreelError::InvalidArgument(format!(
                "unknown aspect ratio '{}' (expected 16:9, 9:16 or 1:1)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_720() {
        let c = AspectRatio::Landscape.canvas(Resolution::Hd720);
        assert_eq!((c.width(), c.height()), (1280, 720));
    }

    #[test]
    fn test_480_long_side_is_floored_to_even() {
        assert_eq!(
            AspectRatio::Landscape.nominal_dimensions(Resolution::Sd480),
            (853, 480)
        );
        let c = AspectRatio::Portrait.canvas(Resolution::Sd480);
        assert_eq!((c.width(), c.height()), (480, 852));
    }

    #[test]
    fn test_square() {
        let c = AspectRatio::Square.canvas(Resolution::FullHd1080);
        assert_eq!((c.width(), c.height()), (1080, 1080));
    }

    #[test]
    fn test_parse() {
        assert_eq!("720p".parse::<Resolution>().unwrap(), Resolution::Hd720);
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert!("4k".parse::<Resolution>().is_err());
        assert!("4:3".parse::<AspectRatio>().is_err());
    }
}
