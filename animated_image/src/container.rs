//! The animated image container
//!
//! Owns the compressed bytes, the probed frame table and, for multi-frame
//! data, a [`FrameStore`]. Still data never touches the store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use parking_lot::Mutex;

use crate::config::ContainerOptions;
use crate::decoder::{Frame, FrameDecoder, ImageFrameDecoder};
use crate::downsample;
use crate::errors::MediaError;
use crate::format::{self, ImageKind};
use crate::frame_store::{CacheMode, FrameStore, BYTES_PER_PIXEL};
use crate::probe::{self, AnimationInfo, FrameInfo};

/// Plain-image capability: what a consumer needs to show a still picture.
pub trait StillImage {
    /// Size in pixels of the display representation
    fn pixel_size(&self) -> (u32, u32);

    fn scale(&self) -> f64;

    /// Size in points, i.e. pixels divided by scale
    fn size(&self) -> (f64, f64) {
        let (width, height) = self.pixel_size();
        let scale = self.scale();
        (width as f64 / scale, height as f64 / scale)
    }

    /// First/display bitmap. Premultiplied when the image was built with
    /// `decode_for_display`.
    fn poster(&self) -> Result<Arc<RgbaImage>, MediaError>;
}

/// Frame-pull capability for an animation player.
pub trait AnimatedSequence {
    fn frame_count(&self) -> usize;

    /// Number of plays, 0 means repeat forever
    fn loop_count(&self) -> u32;

    fn frame_duration(&self, index: usize) -> Option<Duration>;

    /// Decoded canvas for `index`, always straight alpha for the player
    /// to composite.
    fn frame(&self, index: usize) -> Result<Arc<Frame>, MediaError>;
}

/// Compressed image data plus a decode-and-cache policy for its frames.
///
/// ```no_run
/// use animated_image::{AnimatedImage, AnimatedSequence};
///
/// let image = AnimatedImage::from_file("spinner@2x.gif")?;
/// if let Some(animation) = image.animation() {
///     for index in 0..animation.frame_count() {
///         let frame = animation.frame(index)?;
///         println!("frame {} shows for {:?}", index, frame.duration());
///     }
/// }
/// # Ok::<(), animated_image::MediaError>(())
/// ```
pub struct AnimatedImage {
    data: Vec<u8>,
    kind: ImageKind,
    scale: f64,
    info: AnimationInfo,
    /// Downsampled bytes the poster is decoded from, if downsampling applied
    poster_source: Option<Vec<u8>>,
    poster_size: (u32, u32),
    premultiply: bool,
    poster: Mutex<Option<Arc<RgbaImage>>>,
    frames: Option<FrameStore>,
    decoder: Arc<dyn FrameDecoder>,
}

impl AnimatedImage {
    /// Canonical constructor.
    ///
    /// `decode_for_display = false` defers all decoding to first access.
    /// `max_pixel_size > 0` downsamples the still poster of JPEG/PNG data;
    /// animation frames are never downsampled.
    pub fn new(
        data: impl Into<Vec<u8>>,
        scale: f64,
        decode_for_display: bool,
        max_pixel_size: u32,
    ) -> Result<Self, MediaError> {
        Self::with_options(
            data,
            ContainerOptions {
                scale,
                decode_for_display,
                max_pixel_size,
                ..ContainerOptions::default()
            },
        )
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self, MediaError> {
        Self::with_options(data, ContainerOptions::default())
    }

    pub fn from_bytes_with_scale(data: impl Into<Vec<u8>>, scale: f64) -> Result<Self, MediaError> {
        Self::with_options(data, ContainerOptions::with_scale(scale))
    }

    /// Load a file. A `@2x` / `@3x` suffix on the file stem sets the scale.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MediaError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let scale = scale_from_path(path).unwrap_or(1.0);
        Self::with_options(data, ContainerOptions::with_scale(scale))
    }

    pub fn with_options(
        data: impl Into<Vec<u8>>,
        options: ContainerOptions,
    ) -> Result<Self, MediaError> {
        Self::build(data.into(), options, None)
    }

    /// Use a custom decoder for animation frames instead of the built-in one.
    pub fn with_decoder(
        data: impl Into<Vec<u8>>,
        options: ContainerOptions,
        decoder: Arc<dyn FrameDecoder>,
    ) -> Result<Self, MediaError> {
        Self::build(data.into(), options, Some(decoder))
    }

    fn build(
        data: Vec<u8>,
        options: ContainerOptions,
        decoder: Option<Arc<dyn FrameDecoder>>,
    ) -> Result<Self, MediaError> {
        if data.is_empty() {
            return Err(MediaError::EmptyData);
        }

        let format::Detection {
            kind,
            animated,
            info,
        } = format::detect(&data)?;

        let frames = animated.then(|| {
            let frame_bytes = info.width as usize * info.height as usize * BYTES_PER_PIXEL;
            FrameStore::new(info.frame_count(), frame_bytes, options.effective_window())
        });

        let poster_source = if frames.is_none() && options.max_pixel_size > 0 {
            match downsample::downsample(&data, options.max_pixel_size) {
                std::borrow::Cow::Owned(smaller) => Some(smaller),
                std::borrow::Cow::Borrowed(_) => None,
            }
        } else {
            None
        };
        let poster_size = poster_source
            .as_deref()
            .and_then(probe::pixel_size_from_bytes)
            .unwrap_or((info.width, info.height));

        let decoder = decoder
            .unwrap_or_else(|| Arc::new(ImageFrameDecoder::new(kind, info.frames.clone())));

        log::debug!(
            "created {} container: {}x{}, {} frame(s), loop count {}",
            kind,
            info.width,
            info.height,
            info.frame_count(),
            info.loop_count
        );

        let image = Self {
            data,
            kind,
            scale: options.effective_scale(),
            info,
            poster_source,
            poster_size,
            premultiply: options.decode_for_display,
            poster: Mutex::new(None),
            frames,
            decoder,
        };

        if options.decode_for_display {
            // A bad poster is retried on first access rather than failing construction
            if let Err(err) = image.poster() {
                log::warn!("eager poster decode failed: {}", err);
            }
        }

        Ok(image)
    }

    /// Kind detected from the data
    pub fn animated_image_type(&self) -> ImageKind {
        self.kind
    }

    /// The original bytes, only for multi-frame data
    pub fn animated_image_data(&self) -> Option<&[u8]> {
        self.frames.as_ref().map(|_| self.data.as_slice())
    }

    /// Estimated bytes held by decoded frames, 0 for still data
    pub fn animated_image_memory_size(&self) -> usize {
        self.frames.as_ref().map_or(0, FrameStore::memory_size)
    }

    /// Estimated bytes to hold every frame at once, 0 for still data
    pub fn full_memory_size(&self) -> usize {
        self.frames
            .as_ref()
            .map_or(0, |store| store.estimated_frame_bytes() * store.frame_count())
    }

    pub fn preload_all_frames(&self) -> bool {
        self.frames
            .as_ref()
            .is_some_and(|store| store.requested_mode() == CacheMode::FullPreload)
    }

    /// Preload or release decoded frames.
    ///
    /// Setting `true` blocks the calling thread until every frame is decoded
    /// and resident. Setting `false` releases all frames outside the lazy
    /// window before returning. No-op for still data.
    pub fn set_preload_all_frames(&self, preload: bool) {
        let Some(store) = &self.frames else {
            log::trace!("ignoring preload toggle on still {} image", self.kind);
            return;
        };
        let mode = if preload {
            CacheMode::FullPreload
        } else {
            CacheMode::Lazy
        };
        store.set_mode(mode, &self.data, self.decoder.as_ref());
    }

    pub fn is_animated(&self) -> bool {
        self.frames.is_some()
    }

    /// Animation capability, present only for multi-frame data
    pub fn animation(&self) -> Option<&dyn AnimatedSequence> {
        self.frames.as_ref().map(|_| self as &dyn AnimatedSequence)
    }

    /// Canvas size of the source data
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    pub fn frame_info(&self, index: usize) -> Option<&FrameInfo> {
        self.info.frames.get(index)
    }

    /// Sum of all frame durations
    pub fn total_duration(&self) -> Duration {
        self.info.total_duration()
    }

    pub fn frame_store(&self) -> Option<&FrameStore> {
        self.frames.as_ref()
    }

    fn decode_poster(&self) -> Result<RgbaImage, MediaError> {
        if self.frames.is_some() {
            return Ok(self.decoder.decode_frame(&self.data, 0)?.image().clone());
        }
        let source = self.poster_source.as_deref().unwrap_or(&self.data);
        let format = self.kind.image_format();
        Ok(image::load_from_memory_with_format(source, format)?.to_rgba8())
    }
}

impl StillImage for AnimatedImage {
    fn pixel_size(&self) -> (u32, u32) {
        self.poster_size
    }

    fn scale(&self) -> f64 {
        self.scale
    }

    fn poster(&self) -> Result<Arc<RgbaImage>, MediaError> {
        let mut poster = self.poster.lock();
        if let Some(image) = poster.as_ref() {
            return Ok(Arc::clone(image));
        }

        let mut image = self.decode_poster()?;
        if self.premultiply {
            premultiply_alpha(&mut image);
        }
        let image = Arc::new(image);
        *poster = Some(Arc::clone(&image));
        Ok(image)
    }
}

impl AnimatedSequence for AnimatedImage {
    fn frame_count(&self) -> usize {
        self.frames
            .as_ref()
            .map_or(1, FrameStore::frame_count)
    }

    fn loop_count(&self) -> u32 {
        if self.frames.is_some() {
            self.info.loop_count
        } else {
            0
        }
    }

    fn frame_duration(&self, index: usize) -> Option<Duration> {
        match &self.frames {
            Some(_) => self.info.frames.get(index).map(|f| f.duration),
            None => (index == 0).then_some(Duration::ZERO),
        }
    }

    /// For still data, index 0 is the poster bitmap and the store is not used.
    fn frame(&self, index: usize) -> Result<Arc<Frame>, MediaError> {
        match &self.frames {
            Some(store) => store.get(index, &self.data, self.decoder.as_ref()),
            None if index == 0 => {
                let (width, height) = self.poster_size;
                let image = if self.premultiply {
                    self.decode_poster()?
                } else {
                    (*self.poster()?).clone()
                };
                Ok(Arc::new(Frame::new(
                    image,
                    AnimationInfo::still(width, height).frames.remove(0),
                )))
            }
            None => Err(MediaError::IndexOutOfRange {
                index,
                frame_count: 1,
            }),
        }
    }
}

impl std::fmt::Debug for AnimatedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimatedImage")
            .field("kind", &self.kind)
            .field("dimensions", &format!("{}x{}", self.info.width, self.info.height))
            .field("scale", &self.scale)
            .field("frames", &self.frame_count())
            .field("loop_count", &self.info.loop_count)
            .field("memory_size", &self.animated_image_memory_size())
            .finish()
    }
}

/// Read `@Nx` from a file stem such as `icon@2x.png`
fn scale_from_path(path: &Path) -> Option<f64> {
    let stem = path.file_stem()?.to_str()?;
    let (_, suffix) = stem.rsplit_once('@')?;
    let scale: f64 = suffix.strip_suffix('x')?.parse().ok()?;
    (scale.is_finite() && scale > 0.0).then_some(scale)
}

fn premultiply_alpha(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let alpha = pixel[3] as u32;
        if alpha == 255 {
            continue;
        }
        for channel in &mut pixel.0[..3] {
            *channel = ((*channel as u32 * alpha + 127) / 255) as u8;
        }
    }
}
