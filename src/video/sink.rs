//! Byte sinks and output encoding

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use tracing::trace;

use crate::error::{AppError, Result};
use crate::video::convert::{bgr_to_nv12, bgr_to_rgb};
use crate::video::format::OutputFormat;
use crate::video::frame::BgrFrame;

/// Default JPEG quality for extracted frames
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Destination for encoded frames
pub trait FrameSink: Sync {
    /// Persist `bytes` under `name`, returning where it was written
    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Writes every output to its own file inside a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create the sink, creating the directory if needed
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| AppError::SinkWriteFailure {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FrameSink for DirectorySink {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(name);
        fs::write(&path, bytes).map_err(|source| AppError::SinkWriteFailure {
            path: path.clone(),
            source,
        })?;
        trace!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

/// Encode a BGR frame into the bytes of an output file
pub fn encode_frame(frame: &BgrFrame, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Yuv => Ok(bgr_to_nv12(frame)?.into_vec()),
        OutputFormat::Rgb => Ok(bgr_to_rgb(frame.data())),
        OutputFormat::Jpeg => {
            let rgb = bgr_to_rgb(frame.data());
            let mut out = Cursor::new(Vec::new());
            JpegEncoder::new_with_quality(&mut out, jpeg_quality).encode(
                &rgb,
                frame.width(),
                frame.height(),
                ColorType::Rgb8,
            )?;
            Ok(out.into_inner())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::format::Resolution;
    use tempfile::TempDir;

    #[test]
    fn test_directory_sink_creates_dir_and_writes() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DirectorySink::create(temp_dir.path().join("nested/out")).unwrap();

        let path = sink.write("frame_000000.yuv", &[1, 2, 3]).unwrap();
        assert_eq!(path, temp_dir.path().join("nested/out/frame_000000.yuv"));
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_sink_failure_keeps_previous_outputs() {
        let temp_dir = TempDir::new().unwrap();
        let sink = DirectorySink::create(temp_dir.path()).unwrap();
        let first = sink.write("a.yuv", &[9; 6]).unwrap();

        let err = sink.write("missing/b.yuv", &[0; 6]).unwrap_err();
        assert!(matches!(err, AppError::SinkWriteFailure { .. }));
        assert_eq!(fs::read(first).unwrap(), vec![9; 6]);
    }

    #[test]
    fn test_encode_yuv_and_rgb() {
        let frame = BgrFrame::filled(Resolution::new(2, 2), [0, 0, 0]);
        assert_eq!(
            encode_frame(&frame, OutputFormat::Yuv, DEFAULT_JPEG_QUALITY).unwrap(),
            vec![0, 0, 0, 0, 128, 128]
        );

        let frame = BgrFrame::filled(Resolution::new(1, 1), [1, 2, 3]);
        assert_eq!(
            encode_frame(&frame, OutputFormat::Rgb, DEFAULT_JPEG_QUALITY).unwrap(),
            vec![3, 2, 1]
        );
    }

    #[test]
    fn test_encode_jpeg() {
        let frame = BgrFrame::filled(Resolution::new(16, 8), [20, 120, 220]);
        let jpeg = encode_frame(&frame, OutputFormat::Jpeg, DEFAULT_JPEG_QUALITY).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_encode_yuv_rejects_odd() {
        let frame = BgrFrame::filled(Resolution::new(3, 2), [0, 0, 0]);
        assert!(matches!(
            encode_frame(&frame, OutputFormat::Yuv, DEFAULT_JPEG_QUALITY),
            Err(AppError::InvalidDimensions { .. })
        ));
        // JPEG and RGB have no subsampling constraint
        assert!(encode_frame(&frame, OutputFormat::Rgb, DEFAULT_JPEG_QUALITY).is_ok());
    }
}
