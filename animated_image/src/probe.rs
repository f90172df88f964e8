//! Header probing: canvas size, loop count and per-frame metadata
//!
//! Everything here works on the compressed bytes only. No pixel data is
//! decoded, so probing a large animation costs a single pass over its
//! container structure.

use std::io::Cursor;
use std::time::Duration;

use crate::errors::MediaError;
use crate::format::{self, ImageKind};
use crate::{apng, gif, webp};

/// Delays at or below this are treated as "unspecified" by most players.
const MIN_FRAME_DELAY_MS: u32 = 10;
const FALLBACK_FRAME_DELAY_MS: u64 = 100;

/// How the canvas region of a frame is treated before the next frame is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposal {
    /// Leave the frame on the canvas.
    #[default]
    None,
    /// Clear the frame rectangle to transparent.
    Background,
    /// Restore the frame rectangle to what it was before this frame.
    Previous,
}

/// How a frame's pixels are combined with the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blend {
    /// Overwrite the frame rectangle.
    Source,
    /// Alpha-composite over the existing canvas.
    #[default]
    Over,
}

/// Metadata for one frame, read from the container headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub index: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub duration: Duration,
    pub disposal: Disposal,
    pub blend: Blend,
}

/// Canvas-level description of an image and its frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationInfo {
    pub width: u32,
    pub height: u32,
    /// Number of plays, 0 means repeat forever
    pub loop_count: u32,
    pub frames: Vec<FrameInfo>,
}

impl AnimationInfo {
    /// Info for a still image: one full-canvas frame with no duration.
    pub fn still(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            loop_count: 0,
            frames: vec![FrameInfo {
                index: 0,
                x: 0,
                y: 0,
                width,
                height,
                duration: Duration::ZERO,
                disposal: Disposal::None,
                blend: Blend::Source,
            }],
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_multi_frame(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(|f| f.duration).sum()
    }
}

/// Normalize a frame delay in milliseconds.
///
/// Zero and near-zero delays are played at 100ms.
pub(crate) fn frame_delay(ms: u32) -> Duration {
    if ms <= MIN_FRAME_DELAY_MS {
        Duration::from_millis(FALLBACK_FRAME_DELAY_MS)
    } else {
        Duration::from_millis(ms as u64)
    }
}

/// Read the canvas and frame table for already-classified data.
pub fn scan(data: &[u8], kind: ImageKind) -> Result<AnimationInfo, MediaError> {
    match kind {
        ImageKind::Gif => gif::scan(data),
        ImageKind::Apng => apng::scan(data)?.ok_or_else(|| {
            MediaError::UnsupportedFormat("PNG has no animation control chunk".to_string())
        }),
        ImageKind::WebP => webp::scan(data),
        ImageKind::Raster(_) => {
            let (width, height) = raster_dimensions(data)?;
            Ok(AnimationInfo::still(width, height))
        }
    }
}

/// Get image dimensions without fully decoding
pub fn pixel_size_from_bytes(data: &[u8]) -> Option<(u32, u32)> {
    let kind = format::classify(data).ok()?;
    scan(data, kind).ok().map(|info| (info.width, info.height))
}

fn raster_dimensions(data: &[u8]) -> Result<(u32, u32), MediaError> {
    let reader = image::ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}
