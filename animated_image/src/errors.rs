//! Error types for the animated image container

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Image data is empty")]
    EmptyData,

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Frame index {index} out of range (frame count {frame_count})")]
    IndexOutOfRange { index: usize, frame_count: usize },

    #[error("Failed to decode frame {index}: {reason}")]
    FrameDecode { index: usize, reason: String },

    #[error("Downsample failed: {0}")]
    Downsample(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
