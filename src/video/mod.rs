//! Video frame handling
//!
//! Frame sources, BGR → NV12/RGB conversion, and output sinks.

pub mod convert;
pub mod format;
pub mod frame;
pub mod sink;
pub mod source;

pub use convert::{bgr_to_nv12, bgr_to_rgb, Nv12Buffer, Nv12Converter};
pub use format::{OutputFormat, PixelFormat, Resolution};
pub use frame::BgrFrame;
pub use sink::{DirectorySink, FrameSink};
pub use source::{FfmpegSource, FrameSource, RawBgrSource};
