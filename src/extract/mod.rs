//! Frame extraction pipelines
//!
//! `video_to_images` walks a decoded frame stream, `images_to_nv12` converts
//! a directory of still images. Both resize to the configured resolution,
//! encode, and hand the bytes to a [`FrameSink`]. A failure on one frame or
//! image is logged and counted; the rest of the run continues.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::ExtractConfig;
use crate::error::{AppError, Result};
use crate::video::convert::{check_dimensions, Nv12Converter};
use crate::video::format::{OutputFormat, Resolution};
use crate::video::frame::BgrFrame;
use crate::video::sink::{encode_frame, DirectorySink, FrameSink};
use crate::video::source::{
    list_images, load_image, resize, stream_info, FfmpegSource, FrameSource, RawBgrSource,
};

/// Outcome of one extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractSummary {
    /// Frames decoded, or images found
    pub frames_read: u64,
    /// Outputs written
    pub saved: u64,
    /// Frames or images that failed to convert or write
    pub failed: u64,
    /// Written files, in output order
    pub outputs: Vec<PathBuf>,
}

/// How the input path should be interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// Encoded video file decoded through ffmpeg
    Video(PathBuf),
    /// Raw packed BGR24 frames of a known resolution ("-" for stdin)
    RawBgr(PathBuf, Resolution),
    /// Directory of still images
    ImageDir(PathBuf),
}

impl InputKind {
    /// Classify an input path: files are videos, directories are image batches
    pub fn detect(path: &Path, raw_size: Option<Resolution>) -> Result<Self> {
        if let Some(size) = raw_size {
            if path == Path::new("-") || path.is_file() {
                return Ok(InputKind::RawBgr(path.to_path_buf(), size));
            }
            if path.is_dir() {
                return Err(AppError::Config(format!(
                    "--raw-size needs a file or \"-\", but {} is a directory",
                    path.display()
                )));
            }
        }
        if !path.exists() {
            return Err(AppError::SourceUnavailable(format!(
                "Input path does not exist: {}",
                path.display()
            )));
        }
        if path.is_file() {
            Ok(InputKind::Video(path.to_path_buf()))
        } else if path.is_dir() {
            Ok(InputKind::ImageDir(path.to_path_buf()))
        } else {
            Err(AppError::SourceUnavailable(format!(
                "Input path is neither a file nor a directory: {}",
                path.display()
            )))
        }
    }

    /// Output format the pipeline for this input will write
    pub fn output_format(&self, config: &ExtractConfig) -> OutputFormat {
        match self {
            InputKind::ImageDir(_) => config.batch_format,
            InputKind::Video(_) | InputKind::RawBgr(..) => config.format,
        }
    }
}

/// Run the pipeline matching `input`, writing into `config.output_dir`
pub fn run(input: &InputKind, config: &ExtractConfig) -> Result<ExtractSummary> {
    config.validate()?;
    check_output(input.output_format(config), config.resolution())?;

    let sink = DirectorySink::create(&config.output_dir)?;
    info!("Writing outputs to {}", sink.dir().display());

    match input {
        InputKind::Video(path) => {
            match stream_info(path) {
                Ok(stream) => {
                    info!(
                        "Source resolution: {}",
                        stream
                            .resolution
                            .map(|r| r.to_string())
                            .unwrap_or_else(|| "unknown".into())
                    );
                    info!(
                        "Video FPS: {}",
                        stream
                            .fps
                            .map(|fps| format!("{:.2}", fps))
                            .unwrap_or_else(|| "unknown".into())
                    );
                    info!(
                        "Total frames: {}",
                        stream
                            .total_frames
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "unknown".into())
                    );
                }
                Err(e) => warn!("Could not read stream info for {}: {}", path.display(), e),
            }
            let source = FfmpegSource::spawn(path, config.resolution())?;
            video_to_images(source, &sink, config)
        }
        InputKind::RawBgr(path, size) => {
            if path == Path::new("-") {
                let source = RawBgrSource::new(io::stdin().lock(), *size);
                video_to_images(source, &sink, config)
            } else {
                let file = File::open(path).map_err(|e| {
                    AppError::SourceUnavailable(format!("Cannot open {}: {}", path.display(), e))
                })?;
                let source = RawBgrSource::new(BufReader::new(file), *size);
                video_to_images(source, &sink, config)
            }
        }
        InputKind::ImageDir(dir) => images_to_nv12(dir, &sink, config),
    }
}

/// Fail fast when the target resolution cannot be written as NV12
fn check_output(format: OutputFormat, resolution: Resolution) -> Result<()> {
    if format == OutputFormat::Yuv {
        check_dimensions(resolution)?;
    }
    Ok(())
}

/// Resizes and encodes frames of the sequential video pipeline
///
/// NV12 output goes through one [`Nv12Converter`] whose buffer is reused
/// for every frame.
struct FrameEncoder {
    format: OutputFormat,
    resolution: Resolution,
    jpeg_quality: u8,
    nv12: Option<Nv12Converter>,
}

impl FrameEncoder {
    fn new(config: &ExtractConfig) -> Result<Self> {
        let resolution = config.resolution();
        let nv12 = match config.format {
            OutputFormat::Yuv => {
                let converter = Nv12Converter::bgr24_to_nv12(resolution)?;
                debug!("NV12 output: {} bytes per frame", converter.output_len());
                Some(converter)
            }
            _ => None,
        };
        Ok(Self {
            format: config.format,
            resolution,
            jpeg_quality: config.jpeg_quality,
            nv12,
        })
    }

    fn write(&mut self, frame: BgrFrame, sink: &dyn FrameSink, name: &str) -> Result<PathBuf> {
        let frame = resize(frame, self.resolution)?;
        match self.nv12.as_mut() {
            Some(converter) => sink.write(name, converter.convert(frame.data())?),
            None => sink.write(name, &encode_frame(&frame, self.format, self.jpeg_quality)?),
        }
    }
}

/// Save every `frame_interval`-th frame of `source` as `frame_NNNNNN.<ext>`
///
/// Output names follow the selected-frame ordinal, so a failed frame leaves
/// a gap in the numbering instead of blocking the names after it.
pub fn video_to_images<S: FrameSource>(
    mut source: S,
    sink: &dyn FrameSink,
    config: &ExtractConfig,
) -> Result<ExtractSummary> {
    config.validate()?;
    let mut encoder = FrameEncoder::new(config)?;

    info!("Output resolution: {}", config.resolution());
    info!("Output format: {} ({})", config.format, config.format.pixel_format());

    let interval = config.frame_interval as u64;
    let mut summary = ExtractSummary::default();
    let mut selected = 0u64;

    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) if summary.frames_read == 0 => return Err(e),
            Err(e) => {
                error!("Frame source failed after {} frames: {}", summary.frames_read, e);
                summary.failed += 1;
                break;
            }
        };
        let index = summary.frames_read;
        summary.frames_read += 1;

        if index % interval != 0 {
            continue;
        }

        let name = format!("frame_{:06}.{}", selected, config.format.extension());
        selected += 1;

        match encoder.write(frame, sink, &name) {
            Ok(path) => {
                info!("Saved: {}", path.display());
                summary.saved += 1;
                summary.outputs.push(path);
            }
            Err(e) if !e.is_per_item() => return Err(e),
            Err(e) => {
                warn!("Skipping frame {}: {}", index, e);
                summary.failed += 1;
            }
        }
    }

    info!("Done: saved {} frames", summary.saved);
    Ok(summary)
}

fn convert_image(path: &Path, sink: &dyn FrameSink, config: &ExtractConfig) -> Result<PathBuf> {
    let frame = resize(load_image(path)?, config.resolution())?;
    let bytes = encode_frame(&frame, config.batch_format, config.jpeg_quality)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    sink.write(&format!("{}.{}", stem, config.batch_format.extension()), &bytes)
}

/// Convert every supported image in `input_dir` (NV12 unless `batch_format` says otherwise)
pub fn images_to_nv12(
    input_dir: &Path,
    sink: &dyn FrameSink,
    config: &ExtractConfig,
) -> Result<ExtractSummary> {
    config.validate()?;
    check_output(config.batch_format, config.resolution())?;

    let images = list_images(input_dir)?;
    if images.is_empty() {
        warn!("No supported images found in {}", input_dir.display());
        return Ok(ExtractSummary::default());
    }

    info!("Found {} images", images.len());
    info!("Output resolution: {}", config.resolution());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()
        .map_err(|e| AppError::Config(format!("Cannot start worker pool: {}", e)))?;
    debug!("Converting with {} workers", pool.current_num_threads());

    let results: Vec<Result<PathBuf>> = pool.install(|| {
        images
            .par_iter()
            .map(|path| convert_image(path, sink, config))
            .collect()
    });

    let mut summary = ExtractSummary {
        frames_read: images.len() as u64,
        ..Default::default()
    };
    for (path, result) in images.iter().zip(results) {
        match result {
            Ok(out) => {
                info!("Converted: {} -> {}", path.display(), out.display());
                summary.saved += 1;
                summary.outputs.push(out);
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                summary.failed += 1;
            }
        }
    }

    info!("Done: converted {} images", summary.saved);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    /// Collects outputs in memory; names listed in `reject` fail to write
    #[derive(Default)]
    struct MemorySink {
        written: Mutex<Vec<(String, Vec<u8>)>>,
        reject: Vec<String>,
    }

    impl FrameSink for MemorySink {
        fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
            if self.reject.iter().any(|r| r == name) {
                return Err(AppError::SinkWriteFailure {
                    path: PathBuf::from(name),
                    source: io::Error::new(io::ErrorKind::Other, "disk full"),
                });
            }
            self.written
                .lock()
                .unwrap()
                .push((name.to_string(), bytes.to_vec()));
            Ok(PathBuf::from(name))
        }
    }

    impl MemorySink {
        fn names(&self) -> Vec<String> {
            self.written
                .lock()
                .unwrap()
                .iter()
                .map(|(n, _)| n.clone())
                .collect()
        }
    }

    fn raw_stream(resolution: Resolution, frames: u8) -> Cursor<Vec<u8>> {
        let mut data = Vec::new();
        for i in 0..frames {
            data.extend(BgrFrame::filled(resolution, [i, i, i]).data());
        }
        Cursor::new(data)
    }

    fn small_config(format: OutputFormat) -> ExtractConfig {
        ExtractConfig {
            width: 4,
            height: 2,
            format,
            ..Default::default()
        }
    }

    #[test]
    fn test_interval_selects_frames() {
        let res = Resolution::new(4, 2);
        let sink = MemorySink::default();
        let config = ExtractConfig {
            frame_interval: 3,
            ..small_config(OutputFormat::Yuv)
        };

        let summary =
            video_to_images(RawBgrSource::new(raw_stream(res, 7), res), &sink, &config).unwrap();
        assert_eq!(summary.frames_read, 7);
        assert_eq!(summary.saved, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(
            sink.names(),
            vec!["frame_000000.yuv", "frame_000001.yuv", "frame_000002.yuv"]
        );

        // Frames 0, 3, 6 were kept: gray level i gives luma i
        let written = sink.written.lock().unwrap();
        assert_eq!(written[1].1[0], 3);
        assert_eq!(written[2].1[0], 6);
        assert_eq!(written[2].1.len(), 12);
    }

    #[test]
    fn test_frames_resized_before_encoding() {
        let src_res = Resolution::new(8, 4);
        let sink = MemorySink::default();
        let config = small_config(OutputFormat::Rgb);

        video_to_images(
            RawBgrSource::new(raw_stream(src_res, 1), src_res),
            &sink,
            &config,
        )
        .unwrap();
        let written = sink.written.lock().unwrap();
        assert_eq!(written[0].0, "frame_000000.rgb");
        assert_eq!(written[0].1.len(), 4 * 2 * 3);
    }

    #[test]
    fn test_odd_target_rejected_for_yuv() {
        let res = Resolution::new(4, 2);
        let sink = MemorySink::default();
        let config = ExtractConfig {
            width: 5,
            ..small_config(OutputFormat::Yuv)
        };

        let err = video_to_images(RawBgrSource::new(raw_stream(res, 2), res), &sink, &config)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidDimensions { width: 5, height: 2 }));
        assert!(sink.names().is_empty());
    }

    #[test]
    fn test_sink_failure_does_not_abort() {
        let res = Resolution::new(4, 2);
        let sink = MemorySink {
            reject: vec!["frame_000001.yuv".to_string()],
            ..Default::default()
        };
        let config = small_config(OutputFormat::Yuv);

        let summary =
            video_to_images(RawBgrSource::new(raw_stream(res, 3), res), &sink, &config).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.saved, 2);
        assert_eq!(sink.names(), vec!["frame_000000.yuv", "frame_000002.yuv"]);
    }

    #[test]
    fn test_unwritable_name_leaves_gap_on_disk() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        // A directory squatting on the second name makes that write fail
        std::fs::create_dir_all(out.join("frame_000001.yuv")).unwrap();
        let sink = DirectorySink::create(&out).unwrap();
        let res = Resolution::new(4, 2);

        let summary = video_to_images(
            RawBgrSource::new(raw_stream(res, 5), res),
            &sink,
            &small_config(OutputFormat::Yuv),
        )
        .unwrap();
        assert_eq!(summary.saved, 4);
        assert_eq!(summary.failed, 1);
        for n in [0, 2, 3, 4] {
            let path = out.join(format!("frame_{:06}.yuv", n));
            assert_eq!(std::fs::read(&path).unwrap().len(), 12);
        }
        // Frame 4 keeps its own ordinal, so its luma is 4
        assert_eq!(std::fs::read(out.join("frame_000004.yuv")).unwrap()[0], 4);
    }

    #[test]
    fn test_truncated_stream_keeps_earlier_frames() {
        let res = Resolution::new(4, 2);
        let mut data = raw_stream(res, 2).into_inner();
        data.extend([0u8; 5]);
        let sink = MemorySink::default();

        let summary = video_to_images(
            RawBgrSource::new(Cursor::new(data), res),
            &sink,
            &small_config(OutputFormat::Yuv),
        )
        .unwrap();
        assert_eq!(summary.saved, 2);
        assert_eq!(summary.failed, 1);

        let err = video_to_images(
            RawBgrSource::new(Cursor::new(vec![0u8; 5]), res),
            &sink,
            &small_config(OutputFormat::Yuv),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::SourceUnavailable(_)));
    }

    #[test]
    fn test_image_batch_skips_unreadable() {
        let input = TempDir::new().unwrap();
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(8, 4, Rgb([0, 0, 0]));
        img.save(input.path().join("b.png")).unwrap();
        img.save(input.path().join("a.bmp")).unwrap();
        std::fs::write(input.path().join("c.jpg"), b"garbage").unwrap();
        std::fs::write(input.path().join("readme.txt"), b"ignored").unwrap();

        let sink = MemorySink::default();
        let config = ExtractConfig {
            jobs: 2,
            ..small_config(OutputFormat::Jpeg)
        };
        let summary = images_to_nv12(input.path(), &sink, &config).unwrap();

        assert_eq!(summary.frames_read, 3);
        assert_eq!(summary.saved, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.outputs, vec![PathBuf::from("a.yuv"), PathBuf::from("b.yuv")]);

        let written = sink.written.lock().unwrap();
        for (_, bytes) in written.iter() {
            assert_eq!(bytes, &vec![0, 0, 0, 0, 0, 0, 0, 0, 128, 128, 128, 128]);
        }
    }

    #[test]
    fn test_image_batch_empty_dir() {
        let input = TempDir::new().unwrap();
        let sink = MemorySink::default();
        let summary =
            images_to_nv12(input.path(), &sink, &small_config(OutputFormat::Yuv)).unwrap();
        assert_eq!(summary, ExtractSummary::default());
    }

    #[test]
    fn test_run_image_dir_writes_files() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(4, 2, Rgb([255, 255, 255]));
        img.save(input.path().join("white.png")).unwrap();

        let config = ExtractConfig {
            output_dir: output.path().join("yuv").to_string_lossy().into_owned(),
            ..small_config(OutputFormat::Jpeg)
        };
        let kind = InputKind::detect(input.path(), None).unwrap();
        assert_eq!(kind, InputKind::ImageDir(input.path().to_path_buf()));

        let summary = run(&kind, &config).unwrap();
        assert_eq!(summary.saved, 1);

        let bytes = std::fs::read(output.path().join("yuv/white.yuv")).unwrap();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..8], &[255u8; 8]);
        assert_eq!(&bytes[8..], &[128u8; 4]);
    }

    #[test]
    fn test_run_raw_file() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("frames.bgr");
        let res = Resolution::new(4, 2);
        std::fs::write(&raw, raw_stream(res, 2).into_inner()).unwrap();

        let config = ExtractConfig {
            output_dir: dir.path().join("out").to_string_lossy().into_owned(),
            ..small_config(OutputFormat::Yuv)
        };
        let kind = InputKind::detect(&raw, Some(res)).unwrap();
        let summary = run(&kind, &config).unwrap();

        assert_eq!(summary.saved, 2);
        assert!(dir.path().join("out/frame_000001.yuv").is_file());
    }

    #[test]
    fn test_run_odd_yuv_target_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("frames.bgr");
        let res = Resolution::new(4, 2);
        std::fs::write(&raw, raw_stream(res, 1).into_inner()).unwrap();

        let out = dir.path().join("out");
        let config = ExtractConfig {
            output_dir: out.to_string_lossy().into_owned(),
            width: 5,
            ..small_config(OutputFormat::Yuv)
        };
        let kind = InputKind::detect(&raw, Some(res)).unwrap();
        let err = run(&kind, &config).unwrap_err();

        assert!(matches!(err, AppError::InvalidDimensions { width: 5, height: 2 }));
        assert!(!out.exists());
    }

    #[test]
    fn test_run_image_dir_checks_batch_format() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let config = ExtractConfig {
            output_dir: out.to_string_lossy().into_owned(),
            height: 3,
            batch_format: OutputFormat::Yuv,
            ..small_config(OutputFormat::Jpeg)
        };
        let kind = InputKind::ImageDir(dir.path().to_path_buf());
        assert_eq!(kind.output_format(&config), OutputFormat::Yuv);

        assert!(matches!(
            run(&kind, &config),
            Err(AppError::InvalidDimensions { .. })
        ));
        assert!(!out.exists());
    }

    #[test]
    fn test_detect_input_kind() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"x").unwrap();

        assert_eq!(
            InputKind::detect(&video, None).unwrap(),
            InputKind::Video(video.clone())
        );
        assert_eq!(
            InputKind::detect(Path::new("-"), Some(Resolution::new(2, 2))).unwrap(),
            InputKind::RawBgr(PathBuf::from("-"), Resolution::new(2, 2))
        );
        assert!(matches!(
            InputKind::detect(&dir.path().join("missing.mp4"), None),
            Err(AppError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn test_detect_raw_size_with_directory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            InputKind::detect(dir.path(), Some(Resolution::new(4, 2))),
            Err(AppError::Config(_))
        ));
        assert_eq!(
            InputKind::detect(dir.path(), None).unwrap(),
            InputKind::ImageDir(dir.path().to_path_buf())
        );
    }
}
