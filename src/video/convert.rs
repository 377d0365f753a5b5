//! Pixel format conversion utilities
//!
//! Software BGR24 → NV12 conversion with the OpenCV `COLOR_BGR2YUV` fixed-point
//! coefficients. Chroma is point-sampled from the top-left pixel of every 2x2
//! block, which libyuv-style converters (box filter) do not reproduce.

use crate::error::{AppError, Result};
use crate::video::format::Resolution;
use crate::video::frame::BgrFrame;

/// Fixed-point precision of the color transform coefficients
const YUV_SHIFT: i32 = 14;
const ROUND: i32 = 1 << (YUV_SHIFT - 1);
const CHROMA_DELTA: i32 = 128 << YUV_SHIFT;

const R2Y: i32 = 4899;
const G2Y: i32 = 9617;
const B2Y: i32 = 1868;
const B2U: i32 = 8061;
const R2V: i32 = 14369;

/// Convert one BGR pixel to (Y, U, V)
#[inline]
pub fn bgr_to_yuv(b: u8, g: u8, r: u8) -> (u8, u8, u8) {
    let (b, g, r) = (b as i32, g as i32, r as i32);

    let y = (R2Y * r + G2Y * g + B2Y * b + ROUND) >> YUV_SHIFT;
    let u = ((b - y) * B2U + CHROMA_DELTA + ROUND) >> YUV_SHIFT;
    let v = ((r - y) * R2V + CHROMA_DELTA + ROUND) >> YUV_SHIFT;

    (
        y.clamp(0, 255) as u8,
        u.clamp(0, 255) as u8,
        v.clamp(0, 255) as u8,
    )
}

/// NV12 buffer with Y plane and interleaved UV plane
pub struct Nv12Buffer {
    /// Raw buffer containing Y plane followed by interleaved UV plane
    data: Vec<u8>,
    /// Width of the frame
    width: u32,
    /// Height of the frame
    height: u32,
}

impl Nv12Buffer {
    /// Create a new NV12 buffer for the given resolution
    pub fn new(resolution: Resolution) -> Self {
        let width = resolution.width;
        let height = resolution.height;
        // NV12: Y = width*height, UV = width*height/2 (interleaved)
        let y_size = resolution.pixels() as usize;
        let uv_size = y_size / 2;

        Self {
            data: vec![0u8; y_size + uv_size],
            width,
            height,
        }
    }

    /// Get the raw buffer as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get the raw buffer as mutable bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the buffer, returning the raw bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Get Y plane
    pub fn y_plane(&self) -> &[u8] {
        &self.data[..self.y_size()]
    }

    /// Get UV plane (interleaved)
    pub fn uv_plane(&self) -> &[u8] {
        &self.data[self.y_size()..]
    }

    /// Get buffer length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn y_size(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Reject resolutions that cannot be 4:2:0 subsampled
pub fn check_dimensions(resolution: Resolution) -> Result<()> {
    if !resolution.is_even() {
        return Err(AppError::InvalidDimensions {
            width: resolution.width,
            height: resolution.height,
        });
    }
    Ok(())
}

/// Convert BGR24 to NV12 into a caller-provided buffer
///
/// `nv12` must be exactly `width * height * 3 / 2` bytes.
pub fn bgr_to_nv12_into(bgr: &[u8], nv12: &mut [u8], resolution: Resolution) -> Result<()> {
    check_dimensions(resolution)?;

    let width = resolution.width as usize;
    let height = resolution.height as usize;
    let y_size = width * height;

    let expected_in = y_size * 3;
    if bgr.len() != expected_in {
        return Err(AppError::BufferSize {
            expected: expected_in,
            actual: bgr.len(),
        });
    }
    let expected_out = y_size + y_size / 2;
    if nv12.len() != expected_out {
        return Err(AppError::BufferSize {
            expected: expected_out,
            actual: nv12.len(),
        });
    }

    let (y_plane, uv_plane) = nv12.split_at_mut(y_size);

    for row in 0..height {
        let src_row = &bgr[row * width * 3..(row + 1) * width * 3];
        let y_row = &mut y_plane[row * width..(row + 1) * width];
        let chroma_row = row % 2 == 0;
        let uv_row_offset = (row / 2) * width;

        for (col, px) in src_row.chunks_exact(3).enumerate() {
            let (y, u, v) = bgr_to_yuv(px[0], px[1], px[2]);
            y_row[col] = y;

            // Point sample: top-left pixel of each 2x2 block
            if chroma_row && col % 2 == 0 {
                let uv_idx = uv_row_offset + col;
                uv_plane[uv_idx] = u;
                uv_plane[uv_idx + 1] = v;
            }
        }
    }

    Ok(())
}

/// Convert a BGR frame to a freshly allocated NV12 buffer
pub fn bgr_to_nv12(frame: &BgrFrame) -> Result<Nv12Buffer> {
    check_dimensions(frame.resolution)?;
    let mut buffer = Nv12Buffer::new(frame.resolution);
    bgr_to_nv12_into(frame.data(), buffer.as_bytes_mut(), frame.resolution)?;
    Ok(buffer)
}

/// Reorder BGR24 to RGB24 (no subsampling)
pub fn bgr_to_rgb(bgr: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(bgr.len());
    for px in bgr.chunks_exact(3) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    rgb
}

/// Pixel format converter that outputs NV12
///
/// The output buffer is allocated once and reused for every frame of the
/// same resolution.
pub struct Nv12Converter {
    /// Frame resolution
    resolution: Resolution,
    /// Output buffer (reused across conversions)
    output_buffer: Nv12Buffer,
}

impl Nv12Converter {
    /// Create a new converter for BGR24 → NV12
    pub fn bgr24_to_nv12(resolution: Resolution) -> Result<Self> {
        check_dimensions(resolution)?;
        Ok(Self {
            resolution,
            output_buffer: Nv12Buffer::new(resolution),
        })
    }

    /// Convert a frame and return reference to the output buffer
    pub fn convert(&mut self, input: &[u8]) -> Result<&[u8]> {
        bgr_to_nv12_into(input, self.output_buffer.as_bytes_mut(), self.resolution)?;
        Ok(self.output_buffer.as_bytes())
    }

    /// Get output buffer length
    pub fn output_len(&self) -> usize {
        self.output_buffer.len()
    }
}
