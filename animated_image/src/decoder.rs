//! Decoded frames and the per-format decoder seam

use std::io::Cursor;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, Frames, RgbaImage};

use crate::errors::MediaError;
use crate::format::ImageKind;
use crate::probe::{Disposal, FrameInfo};

/// One decoded frame. Never mutated after creation.
#[derive(Clone)]
pub struct Frame {
    image: RgbaImage,
    info: FrameInfo,
}

impl Frame {
    pub fn new(image: RgbaImage, info: FrameInfo) -> Self {
        Self { image, info }
    }

    #[inline]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    #[inline]
    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.info.index
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        self.info.duration
    }

    #[inline]
    pub fn disposal(&self) -> Disposal {
        self.info.disposal
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Resident size of the pixel buffer
    pub fn byte_size(&self) -> usize {
        self.image.as_raw().len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.info.index)
            .field("dimensions", &format!("{}x{}", self.width(), self.height()))
            .field("duration", &self.info.duration)
            .field("disposal", &self.info.disposal)
            .finish()
    }
}

/// Produces a decoded frame from compressed bytes.
///
/// Implementations are called from whichever thread requests the frame and
/// may be called concurrently for different indices.
pub trait FrameDecoder: Send + Sync {
    fn decode_frame(&self, data: &[u8], index: usize) -> Result<Frame, MediaError>;

    /// Decode several frames in one go, handing each result to `sink` in
    /// the order of `indices` (ascending). Stops as soon as `sink` breaks.
    ///
    /// The default decodes each index on its own. Streaming decoders
    /// should override it with a single forward pass.
    fn decode_frames(&self, data: &[u8], indices: &[usize], sink: &mut FrameSink<'_>) {
        for &index in indices {
            if sink(index, self.decode_frame(data, index)).is_break() {
                return;
            }
        }
    }
}

/// Receives `(index, result)` pairs from [`FrameDecoder::decode_frames`]
pub type FrameSink<'a> = dyn FnMut(usize, Result<Frame, MediaError>) -> ControlFlow<()> + 'a;

/// Frame decoder backed by the `image` crate's animation decoders.
///
/// Returns the fully composited canvas for each index. The `image`
/// decoders only stream forward, so a single `decode_frame(n)` costs
/// decoding frames `0..=n`; `decode_frames` walks the stream once.
pub struct ImageFrameDecoder {
    kind: ImageKind,
    frames: Arc<[FrameInfo]>,
}

impl ImageFrameDecoder {
    pub fn new(kind: ImageKind, frames: impl Into<Arc<[FrameInfo]>>) -> Self {
        Self {
            kind,
            frames: frames.into(),
        }
    }

    fn frames<'a>(&self, data: &'a [u8]) -> Result<Frames<'a>, MediaError> {
        let cursor = Cursor::new(data);
        match self.kind {
            ImageKind::Gif => Ok(GifDecoder::new(cursor)?.into_frames()),
            ImageKind::Apng => Ok(PngDecoder::new(cursor)?.apng()?.into_frames()),
            ImageKind::WebP => Ok(WebPDecoder::new(cursor)?.into_frames()),
            ImageKind::Raster(_) => Err(MediaError::UnsupportedFormat(format!(
                "{} has no animation frames",
                self.kind
            ))),
        }
    }

    fn info(&self, index: usize) -> Result<FrameInfo, MediaError> {
        self.frames.get(index).cloned().ok_or(MediaError::IndexOutOfRange {
            index,
            frame_count: self.frames.len(),
        })
    }
}

fn decode_error(index: usize, reason: impl ToString) -> MediaError {
    MediaError::FrameDecode {
        index,
        reason: reason.to_string(),
    }
}

impl FrameDecoder for ImageFrameDecoder {
    fn decode_frame(&self, data: &[u8], index: usize) -> Result<Frame, MediaError> {
        let info = self.info(index)?;

        let frame = self
            .frames(data)
            .map_err(|e| decode_error(index, e))?
            .nth(index)
            .ok_or_else(|| decode_error(index, "stream ended before this frame"))?
            .map_err(|e| decode_error(index, e))?;

        Ok(Frame::new(frame.into_buffer(), info))
    }

    fn decode_frames(&self, data: &[u8], indices: &[usize], sink: &mut FrameSink<'_>) {
        let mut pending = indices.iter().copied().peekable();

        if let Ok(stream) = self.frames(data) {
            for (position, result) in stream.enumerate() {
                let Some(&index) = pending.peek() else { return };
                if position < index {
                    // Earlier frames still have to be composited
                    if result.is_err() {
                        break;
                    }
                    continue;
                }
                if position > index {
                    break;
                }

                pending.next();
                let failed = result.is_err();
                let frame = result
                    .map_err(|e| decode_error(index, e))
                    .and_then(|frame| {
                        self.info(index)
                            .map(|info| Frame::new(frame.into_buffer(), info))
                    });
                if sink(index, frame).is_break() {
                    return;
                }
                if failed {
                    break;
                }
            }
        }

        // Whatever the single pass could not produce is retried one by one
        for index in pending {
            if sink(index, self.decode_frame(data, index)).is_break() {
                return;
            }
        }
    }
}
