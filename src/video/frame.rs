//! Video frame data structures

use bytes::Bytes;

use super::format::{PixelFormat, Resolution};
use crate::error::{AppError, Result};

/// A packed BGR24 raster (3 bytes per pixel, blue-green-red, no row padding)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrFrame {
    /// Raw frame data
    data: Bytes,
    /// Frame resolution
    pub resolution: Resolution,
    /// Frame sequence number (decode order)
    pub sequence: u64,
}

impl BgrFrame {
    /// Create a new frame, checking that the buffer matches the resolution
    pub fn new(data: Bytes, resolution: Resolution, sequence: u64) -> Result<Self> {
        let expected = PixelFormat::Bgr24
            .frame_size(resolution)
            .unwrap_or_default();
        if data.len() != expected {
            return Err(AppError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            resolution,
            sequence,
        })
    }

    /// Create a frame from a Vec<u8>
    pub fn from_vec(data: Vec<u8>, resolution: Resolution, sequence: u64) -> Result<Self> {
        Self::new(Bytes::from(data), resolution, sequence)
    }

    /// Create a frame filled with a single BGR color
    pub fn filled(resolution: Resolution, bgr: [u8; 3]) -> Self {
        let data: Vec<u8> = bgr
            .iter()
            .copied()
            .cycle()
            .take(resolution.pixels() as usize * 3)
            .collect();
        Self {
            data: Bytes::from(data),
            resolution,
            sequence: 0,
        }
    }

    /// Get frame data as bytes slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get data length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if frame is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get width
    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    /// Get height
    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    /// BGR triple at (row, col)
    pub fn pixel(&self, row: u32, col: u32) -> [u8; 3] {
        let i = (row as usize * self.resolution.width as usize + col as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}
