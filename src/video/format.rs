//! Pixel format definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel formats handled by the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PixelFormat {
    /// JPEG compressed format
    Jpeg,
    /// NV12 semi-planar format (Y plane + interleaved UV)
    Nv12,
    /// RGB24 format (3 bytes per pixel)
    Rgb24,
    /// BGR24 format (3 bytes per pixel)
    Bgr24,
}

impl PixelFormat {
    /// Calculate expected frame size for a given resolution
    /// Returns None for compressed formats (variable size)
    pub fn frame_size(&self, resolution: Resolution) -> Option<usize> {
        let pixels = resolution.pixels() as usize;
        match self {
            PixelFormat::Jpeg => None,
            PixelFormat::Nv12 => Some(pixels * 3 / 2),
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => Some(pixels * 3),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Jpeg => "JPEG",
            PixelFormat::Nv12 => "NV12",
            PixelFormat::Rgb24 => "RGB24",
            PixelFormat::Bgr24 => "BGR24",
        };
        write!(f, "{}", name)
    }
}

/// Output file format written by the sink
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JPEG image
    #[default]
    Jpeg,
    /// Raw NV12 (YUV 4:2:0 semi-planar)
    Yuv,
    /// Raw RGB24
    Rgb,
}

impl OutputFormat {
    /// File extension used for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Yuv => "yuv",
            OutputFormat::Rgb => "rgb",
        }
    }

    /// Pixel format of the written bytes
    pub fn pixel_format(&self) -> PixelFormat {
        match self {
            OutputFormat::Jpeg => PixelFormat::Jpeg,
            OutputFormat::Yuv => PixelFormat::Nv12,
            OutputFormat::Rgb => PixelFormat::Rgb24,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Yuv => "yuv",
            OutputFormat::Rgb => "rgb",
        };
        write!(f, "{}", name)
    }
}

/// Resolution (width x height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check that both dimensions are positive and even (required for 4:2:0)
    pub fn is_even(&self) -> bool {
        self.width > 0 && self.height > 0 && self.width % 2 == 0 && self.height % 2 == 0
    }

    /// Get total pixels
    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Default output resolution for extracted frames
    pub const NHD: Resolution = Resolution {
        width: 640,
        height: 360,
    };
    pub const HD720: Resolution = Resolution {
        width: 1280,
        height: 720,
    };
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(|c: char| c == 'x' || c == 'X')
            .ok_or_else(|| format!("Invalid resolution '{}', expected WIDTHxHEIGHT", s))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| format!("Invalid width in resolution '{}'", s))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| format!("Invalid height in resolution '{}'", s))?;
        Ok(Self { width, height })
    }
}
