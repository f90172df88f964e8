//! Format detection from magic bytes

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::MediaError;
use crate::probe::AnimationInfo;
use crate::{apng, gif, probe, webp};

/// Still-only raster formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RasterFormat {
    Jpeg,
    Png,
    Bmp,
    Tiff,
    Ico,
}

/// Image kind as reported by the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageKind {
    Raster(RasterFormat),
    Gif,
    Apng,
    WebP,
}

impl ImageKind {
    pub fn name(&self) -> &'static str {
        match self {
            ImageKind::Raster(RasterFormat::Jpeg) => "jpeg",
            ImageKind::Raster(RasterFormat::Png) => "png",
            ImageKind::Raster(RasterFormat::Bmp) => "bmp",
            ImageKind::Raster(RasterFormat::Tiff) => "tiff",
            ImageKind::Raster(RasterFormat::Ico) => "ico",
            ImageKind::Gif => "gif",
            ImageKind::Apng => "apng",
            ImageKind::WebP => "webp",
        }
    }

    /// Whether this kind can carry more than one frame
    pub fn supports_animation(&self) -> bool {
        !matches!(self, ImageKind::Raster(_))
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            ImageKind::Raster(RasterFormat::Jpeg) => image::ImageFormat::Jpeg,
            ImageKind::Raster(RasterFormat::Png) | ImageKind::Apng => image::ImageFormat::Png,
            ImageKind::Raster(RasterFormat::Bmp) => image::ImageFormat::Bmp,
            ImageKind::Raster(RasterFormat::Tiff) => image::ImageFormat::Tiff,
            ImageKind::Raster(RasterFormat::Ico) => image::ImageFormat::Ico,
            ImageKind::Gif => image::ImageFormat::Gif,
            ImageKind::WebP => image::ImageFormat::WebP,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of inspecting a byte buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub kind: ImageKind,
    /// True when the data holds at least two frames
    pub animated: bool,
    /// Header-level layout, read without decoding pixels
    pub info: AnimationInfo,
}

/// Classify `data` and read its frame table in a single header walk.
pub fn detect(data: &[u8]) -> Result<Detection, MediaError> {
    let (kind, info) = match apng::is_png(data).then(|| apng::scan(data)) {
        Some(Ok(Some(info))) => (ImageKind::Apng, info),
        Some(_) => {
            let kind = ImageKind::Raster(RasterFormat::Png);
            (kind, probe::scan(data, kind)?)
        }
        None => {
            let kind = classify(data)?;
            (kind, probe::scan(data, kind)?)
        }
    };
    let animated = kind.supports_animation() && info.is_multi_frame();
    Ok(Detection {
        kind,
        animated,
        info,
    })
}

/// Detect image kind from magic bytes.
///
/// PNG data is reported as `Apng` only when it carries animation control.
pub fn classify(data: &[u8]) -> Result<ImageKind, MediaError> {
    if data.is_empty() {
        return Err(MediaError::EmptyData);
    }

    if apng::is_png(data) {
        return match apng::scan(data) {
            Ok(Some(_)) => Ok(ImageKind::Apng),
            _ => Ok(ImageKind::Raster(RasterFormat::Png)),
        };
    }
    if gif::is_gif(data) {
        return Ok(ImageKind::Gif);
    }
    if webp::is_webp(data) {
        return Ok(ImageKind::WebP);
    }

    match data {
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageKind::Raster(RasterFormat::Jpeg)),
        [b'B', b'M', ..] if data.len() >= 14 => Ok(ImageKind::Raster(RasterFormat::Bmp)),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => {
            Ok(ImageKind::Raster(RasterFormat::Tiff))
        }
        [0x00, 0x00, 0x01, 0x00, ..] => Ok(ImageKind::Raster(RasterFormat::Ico)),
        _ => Err(MediaError::UnsupportedFormat(
            "unrecognized image header".to_string(),
        )),
    }
}
