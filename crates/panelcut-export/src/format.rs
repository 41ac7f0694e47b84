//! Output image formats and their channel-layout constraints.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ExportError;

/// Encoded image format of an output chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless PNG; keeps every channel layout as is.
    #[default]
    Png,
    /// Baseline JPEG at [`OutputFormat::JPEG_QUALITY`]. Alpha is dropped.
    Jpeg,
    /// Lossless WebP. Gray chunks are expanded to RGB.
    WebP,
    /// Uncompressed BMP.
    Bmp,
}

impl OutputFormat {
    /// JPEG quality used for [`OutputFormat::Jpeg`].
    pub const JPEG_QUALITY: u8 = 90;

    /// Look up a format by file extension (case-insensitive, no dot).
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Infer the format from a path's extension.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::UnknownFormat`] if the path has no
    /// extension or the extension is not a supported format.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(extension).ok_or_else(|| ExportError::UnknownFormat {
            extension: extension.to_string(),
        })
    }

    /// Canonical file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Bmp => "bmp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::WebP => "WebP",
            Self::Bmp => "BMP",
        })
    }
}
