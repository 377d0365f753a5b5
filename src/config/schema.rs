use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::video::format::{OutputFormat, Resolution};
use crate::video::sink::DEFAULT_JPEG_QUALITY;

/// Frame extraction settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractConfig {
    /// Output directory
    pub output_dir: String,
    /// Save every Nth decoded frame (1 = every frame)
    pub frame_interval: u32,
    /// Output width
    pub width: u32,
    /// Output height
    pub height: u32,
    /// Output format for video frames
    pub format: OutputFormat,
    /// Output format for the image directory batch
    pub batch_format: OutputFormat,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Worker threads for the image batch (0 = one per CPU)
    pub jobs: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            output_dir: "output_images".to_string(),
            frame_interval: 1,
            width: Resolution::NHD.width,
            height: Resolution::NHD.height,
            format: OutputFormat::Jpeg,
            batch_format: OutputFormat::Yuv,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            jobs: 0,
        }
    }
}

impl ExtractConfig {
    /// Target output resolution
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Check settings before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.frame_interval == 0 {
            return Err(AppError::Config("frame_interval must be at least 1".to_string()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(AppError::Config(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(AppError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.output_dir.trim().is_empty() {
            return Err(AppError::Config("output_dir must not be empty".to_string()));
        }
        Ok(())
    }
}
