//! Animated Image - decode-and-cache layer for multi-frame images
//!
//! Wraps compressed GIF, APNG and WebP data (plus still rasters) with:
//! - Magic-byte format detection and header probing without pixel decode
//! - A frame cache with a bounded lazy window or full preload
//! - Best-effort downsampling of still JPEG/PNG posters
//! - Parallel batch downsampling
//!
//! ```no_run
//! use animated_image::{AnimatedImage, AnimatedSequence};
//!
//! let data = std::fs::read("loading.gif")?;
//! let image = AnimatedImage::from_bytes(data)?;
//!
//! // Trade memory for decode latency
//! image.set_preload_all_frames(true);
//! let frame = image.frame(0)?;
//! println!("{}x{}, resident {} bytes", frame.width(), frame.height(), image.animated_image_memory_size());
//! # Ok::<(), animated_image::MediaError>(())
//! ```

mod apng;
mod config;
mod container;
mod decoder;
mod downsample;
mod errors;
mod format;
mod frame_store;
mod gif;
mod probe;
mod webp;

#[cfg(feature = "python")]
mod python;

#[cfg(test)]
mod test_util;

pub use config::ContainerOptions;
pub use container::{AnimatedImage, AnimatedSequence, StillImage};
pub use decoder::{Frame, FrameDecoder, FrameSink, ImageFrameDecoder};
pub use downsample::{
    batch_downsample, downsample, downsample_factor, downsample_with, set_downsample_factor,
    DownsampleConfig, DEFAULT_DOWNSAMPLE_FACTOR, DEFAULT_JPEG_QUALITY,
};
pub use errors::MediaError;
pub use format::{classify, detect, Detection, ImageKind, RasterFormat};
pub use frame_store::{CacheMode, FrameStore, BYTES_PER_PIXEL, DEFAULT_LAZY_WINDOW};
pub use probe::{pixel_size_from_bytes, AnimationInfo, Blend, Disposal, FrameInfo};
