//! Best-effort downsampling of still JPEG/PNG data

use std::borrow::Cow;
use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat};
use parking_lot::RwLock;
use rayon::prelude::*;

use crate::errors::MediaError;
use crate::format::{self, ImageKind, RasterFormat};

pub const DEFAULT_DOWNSAMPLE_FACTOR: f64 = 1.2;
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

static DOWNSAMPLE_FACTOR: RwLock<f64> = parking_lot::const_rwlock(DEFAULT_DOWNSAMPLE_FACTOR);

/// Process-wide default factor, used by [`DownsampleConfig::default`]
pub fn downsample_factor() -> f64 {
    *DOWNSAMPLE_FACTOR.read()
}

/// Set the process-wide default factor. `0` disables downsampling for
/// configs created afterwards.
pub fn set_downsample_factor(factor: f64) {
    *DOWNSAMPLE_FACTOR.write() = factor;
}

/// Per-call downsampling settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownsampleConfig {
    /// Target size is `max_pixel_size * factor`. `<= 0` disables.
    pub factor: f64,
    pub jpeg_quality: u8,
}

impl Default for DownsampleConfig {
    /// Snapshot of the current process-wide factor
    fn default() -> Self {
        Self {
            factor: downsample_factor(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl DownsampleConfig {
    pub fn with_factor(factor: f64) -> Self {
        Self {
            factor,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.factor.is_finite() && self.factor > 0.0
    }

    /// Longest side to aim for, or `None` if nothing should happen
    pub fn target_pixel_size(&self, max_pixel_size: u32) -> Option<u32> {
        if !self.is_enabled() || max_pixel_size == 0 {
            return None;
        }
        let target = (max_pixel_size as f64 * self.factor).round();
        (target >= 1.0).then(|| target.min(u32::MAX as f64) as u32)
    }
}

/// Downsample with the process-wide factor.
///
/// Only still JPEG and PNG data is touched. Any failure returns `data`
/// unchanged.
pub fn downsample(data: &[u8], max_pixel_size: u32) -> Cow<'_, [u8]> {
    downsample_with(data, max_pixel_size, &DownsampleConfig::default())
}

pub fn downsample_with<'a>(
    data: &'a [u8],
    max_pixel_size: u32,
    config: &DownsampleConfig,
) -> Cow<'a, [u8]> {
    match try_downsample(data, max_pixel_size, config) {
        Ok(output) => Cow::Owned(output),
        Err(err) => {
            log::debug!("downsample skipped, keeping original: {}", err);
            Cow::Borrowed(data)
        }
    }
}

/// Downsample many images in parallel, each with the same fallback.
pub fn batch_downsample(
    images: &[Vec<u8>],
    max_pixel_size: u32,
    config: &DownsampleConfig,
) -> Vec<Vec<u8>> {
    images
        .par_iter()
        .map(|data| downsample_with(data, max_pixel_size, config).into_owned())
        .collect()
}

fn try_downsample(
    data: &[u8],
    max_pixel_size: u32,
    config: &DownsampleConfig,
) -> Result<Vec<u8>, MediaError> {
    let target = config
        .target_pixel_size(max_pixel_size)
        .ok_or_else(|| MediaError::Downsample("downsampling disabled".to_string()))?;

    let format = match format::classify(data)? {
        ImageKind::Raster(RasterFormat::Jpeg) => ImageFormat::Jpeg,
        ImageKind::Raster(RasterFormat::Png) => ImageFormat::Png,
        other => {
            return Err(MediaError::Downsample(format!("{} is not downsampled", other)));
        }
    };

    let img = image::load_from_memory_with_format(data, format)?;
    let (orig_w, orig_h) = img.dimensions();
    let (new_w, new_h) = calculate_fit_dimensions(orig_w, orig_h, target, target);

    // Skip if already smaller
    if new_w >= orig_w && new_h >= orig_h {
        return Err(MediaError::Downsample(format!(
            "{}x{} already fits within {}",
            orig_w, orig_h, target
        )));
    }

    let resized = img.resize_exact(new_w, new_h, image::imageops::FilterType::Lanczos3);
    let mut output = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            let resized = if resized.color().has_alpha() {
                DynamicImage::ImageRgb8(resized.to_rgb8())
            } else {
                resized
            };
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, config.jpeg_quality);
            resized.write_with_encoder(encoder)?;
        }
        _ => {
            resized.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
        }
    }

    log::debug!(
        "downsampled {:?} from {}x{} to {}x{}",
        format,
        orig_w,
        orig_h,
        new_w,
        new_h
    );
    Ok(output)
}

/// Calculate dimensions to fit within bounds while maintaining aspect ratio
fn calculate_fit_dimensions(orig_w: u32, orig_h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let ratio_w = max_w as f64 / orig_w as f64;
    let ratio_h = max_h as f64 / orig_h as f64;
    let ratio = f64::min(ratio_w, ratio_h);

    if ratio >= 1.0 {
        (orig_w, orig_h)
    } else {
        (
            ((orig_w as f64 * ratio).round() as u32).max(1),
            ((orig_h as f64 * ratio).round() as u32).max(1),
        )
    }
}
