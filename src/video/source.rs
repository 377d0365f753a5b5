//! Frame sources
//!
//! Everything that produces BGR rasters for the converter: raw BGR24 streams,
//! an ffmpeg decoder subprocess, and still images decoded with `image`.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::video::format::{PixelFormat, Resolution};
use crate::video::frame::BgrFrame;

/// Still-image extensions accepted by the batch converter (lowercase)
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff"];

/// A source of BGR frames
pub trait FrameSource {
    /// Next frame in decode order, `None` at end of stream
    fn next_frame(&mut self) -> Result<Option<BgrFrame>>;
}

/// Reads consecutive packed BGR24 frames of a fixed resolution
pub struct RawBgrSource<R> {
    reader: R,
    resolution: Resolution,
    frame_size: usize,
    sequence: u64,
}

impl<R: Read> RawBgrSource<R> {
    pub fn new(reader: R, resolution: Resolution) -> Self {
        let frame_size = PixelFormat::Bgr24
            .frame_size(resolution)
            .unwrap_or_default();
        Self {
            reader,
            resolution,
            frame_size,
            sequence: 0,
        }
    }

    /// Fill `buf` completely; returns the number of bytes read before EOF
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(AppError::SourceUnavailable(format!(
                        "Failed to read frame {}: {}",
                        self.sequence, e
                    )))
                }
            }
        }
        Ok(filled)
    }
}

impl<R: Read> FrameSource for RawBgrSource<R> {
    fn next_frame(&mut self) -> Result<Option<BgrFrame>> {
        if self.frame_size == 0 {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_size];
        let filled = self.fill(&mut buf)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < self.frame_size {
            return Err(AppError::SourceUnavailable(format!(
                "Truncated frame {}: got {} of {} bytes",
                self.sequence, filled, self.frame_size
            )));
        }

        let frame = BgrFrame::from_vec(buf, self.resolution, self.sequence)?;
        self.sequence += 1;
        Ok(Some(frame))
    }
}

/// Video stream metadata reported by ffprobe
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub resolution: Option<Resolution>,
    pub fps: Option<f64>,
    pub total_frames: Option<u64>,
}

#[derive(Deserialize)]
struct StreamList {
    #[serde(default)]
    streams: Vec<StreamEntry>,
}

#[derive(Deserialize)]
struct StreamEntry {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Parse ffprobe's `-of json` output for the first video stream
pub fn parse_stream_info(json: &str) -> Result<StreamInfo> {
    let output: StreamList = serde_json::from_str(json)?;
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| AppError::SourceUnavailable("No video stream found".to_string()))?;

    let resolution = match (stream.width, stream.height) {
        (Some(w), Some(h)) => Some(Resolution::new(w, h)),
        _ => None,
    };

    Ok(StreamInfo {
        resolution,
        fps: stream.avg_frame_rate.as_deref().and_then(parse_frame_rate),
        total_frames: stream.nb_frames.as_deref().and_then(|n| n.parse().ok()),
    })
}

/// Parse a rational frame rate such as "30000/1001"
fn parse_frame_rate(s: &str) -> Option<f64> {
    let (num, den) = match s.split_once('/') {
        Some((n, d)) => (n.parse::<f64>().ok()?, d.parse::<f64>().ok()?),
        None => (s.parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 || num == 0.0 {
        return None;
    }
    Some(num / den)
}

/// Query stream metadata with ffprobe
pub fn stream_info(path: &Path) -> Result<StreamInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,nb_frames",
            "-of",
            "json",
        ])
        .arg(path)
        .stderr(Stdio::null())
        .output()
        .map_err(|e| AppError::SourceUnavailable(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(AppError::SourceUnavailable(format!(
            "ffprobe failed for {} ({})",
            path.display(),
            output.status
        )));
    }

    parse_stream_info(&String::from_utf8_lossy(&output.stdout))
}

/// Decodes a video file through an ffmpeg subprocess
///
/// ffmpeg scales every frame to the target resolution and writes packed
/// BGR24 to its stdout.
pub struct FfmpegSource {
    path: PathBuf,
    child: Child,
    inner: RawBgrSource<ChildStdout>,
    finished: bool,
}

impl FfmpegSource {
    /// Spawn ffmpeg for `path`, scaling to `resolution`
    pub fn spawn(path: &Path, resolution: Resolution) -> Result<Self> {
        let scale = format!(
            "scale={}:{}:flags=bilinear",
            resolution.width, resolution.height
        );
        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
            .arg(path)
            .args([
                "-vf",
                scale.as_str(),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "bgr24",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                AppError::SourceUnavailable(format!(
                    "Failed to start ffmpeg for {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::SourceUnavailable("Failed to open ffmpeg stdout".into()))?;

        debug!("ffmpeg started for {} (pid {})", path.display(), child.id());

        Ok(Self {
            path: path.to_path_buf(),
            child,
            inner: RawBgrSource::new(stdout, resolution),
            finished: false,
        })
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let status = self.child.wait()?;
        if status.success() {
            return Ok(());
        }
        if self.inner.sequence == 0 {
            return Err(AppError::SourceUnavailable(format!(
                "Cannot decode video {} (ffmpeg {})",
                self.path.display(),
                status
            )));
        }
        warn!(
            "ffmpeg exited with {} after {} frames of {}",
            status,
            self.inner.sequence,
            self.path.display()
        );
        Ok(())
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<Option<BgrFrame>> {
        if self.finished {
            return Ok(None);
        }
        match self.inner.next_frame() {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => {
                self.finish()?;
                Ok(None)
            }
            Err(e) => {
                let _ = self.child.kill();
                self.finished = true;
                let _ = self.child.wait();
                Err(e)
            }
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Check whether a path has one of the supported still-image extensions
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// List supported images directly inside `dir`, sorted by file name
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        // is_file follows symlinks, so linked images are included
        if path.is_file() && is_supported_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Decode a still image into a BGR raster
pub fn load_image(path: &Path) -> Result<BgrFrame> {
    let img = image::open(path)
        .map_err(|e| {
            AppError::SourceUnavailable(format!("Cannot read image {}: {}", path.display(), e))
        })?
        .to_rgb8();

    let resolution = Resolution::new(img.width(), img.height());
    let mut data = img.into_raw();
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    BgrFrame::from_vec(data, resolution, 0)
}

/// Bilinear resize to `resolution`; returns the frame unchanged if it already matches
pub fn resize(frame: BgrFrame, resolution: Resolution) -> Result<BgrFrame> {
    if frame.resolution == resolution {
        return Ok(frame);
    }
    if resolution.width == 0 || resolution.height == 0 {
        return Err(AppError::InvalidDimensions {
            width: resolution.width,
            height: resolution.height,
        });
    }

    let expected = frame.len();
    // Channel order does not matter for interpolation, so BGR can ride in an Rgb buffer
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_raw(frame.width(), frame.height(), frame.data().to_vec()).ok_or(
            AppError::BufferSize {
                expected,
                actual: frame.len(),
            },
        )?;

    let resized = imageops::resize(&img, resolution.width, resolution.height, FilterType::Triangle);
    BgrFrame::from_vec(resized.into_raw(), resolution, frame.sequence)
}
