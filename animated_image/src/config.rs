//! Container construction options

use serde::{Deserialize, Serialize};

use crate::errors::MediaError;
use crate::frame_store::DEFAULT_LAZY_WINDOW;

/// Options for building an [`AnimatedImage`](crate::AnimatedImage).
///
/// Deserializes from JSON with every field optional:
///
/// ```
/// use animated_image::ContainerOptions;
///
/// let options = ContainerOptions::from_json(r#"{ "scale": 2.0, "lazy_window": 5 }"#).unwrap();
/// assert_eq!(options.scale, 2.0);
/// assert!(options.decode_for_display);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    /// Display scale factor. Non-positive values fall back to 1.0.
    pub scale: f64,
    /// Decode and premultiply the poster image during construction.
    pub decode_for_display: bool,
    /// Downsample still posters to this size. 0 disables.
    pub max_pixel_size: u32,
    /// Frames kept resident in lazy mode.
    pub lazy_window: usize,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            decode_for_display: true,
            max_pixel_size: 0,
            lazy_window: DEFAULT_LAZY_WINDOW,
        }
    }
}

impl ContainerOptions {
    pub fn with_scale(scale: f64) -> Self {
        Self {
            scale,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, MediaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub(crate) fn effective_scale(&self) -> f64 {
        if self.scale.is_finite() && self.scale > 0.0 {
            self.scale
        } else {
            1.0
        }
    }

    pub(crate) fn effective_window(&self) -> usize {
        self.lazy_window.max(1)
    }
}
