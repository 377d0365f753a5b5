//! yuvframe - video frame extraction and NV12 conversion
//!
//! Decodes video frames or batch-converts still images into raw NV12,
//! raw RGB24 or JPEG files.

pub mod config;
pub mod error;
pub mod extract;
pub mod video;

pub use error::{AppError, Result};
