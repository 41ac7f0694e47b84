//! Shared types for the panelcut pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Channel layout of an 8-bit-per-channel pixel buffer.
///
/// Every strip is normalized to 8 bits per channel on load, so the
/// layout alone determines the number of bytes per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelLayout {
    /// Single gray channel.
    Luma,
    /// Gray plus alpha.
    LumaAlpha,
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
}

impl ChannelLayout {
    /// Number of interleaved channels (bytes) per pixel.
    #[must_use]
    pub const fn channels(self) -> usize {
        match self {
            Self::Luma => 1,
            Self::LumaAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    /// Number of leading channels that carry color or brightness.
    ///
    /// The alpha channel, when present, is always the last one and is
    /// excluded from row profiling.
    #[must_use]
    pub const fn color_channels(self) -> usize {
        match self {
            Self::Luma | Self::LumaAlpha => 1,
            Self::Rgb | Self::Rgba => 3,
        }
    }

    /// Whether the layout carries an alpha channel.
    #[must_use]
    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::LumaAlpha | Self::Rgba)
    }

    /// The layout an image of the given decoded color type maps to
    /// once reduced to 8 bits per channel.
    #[must_use]
    pub fn from_color_type(color: image::ColorType) -> Self {
        match (color.has_color(), color.has_alpha()) {
            (false, false) => Self::Luma,
            (false, true) => Self::LumaAlpha,
            (true, false) => Self::Rgb,
            (true, true) => Self::Rgba,
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Luma => "luma",
            Self::LumaAlpha => "luma+alpha",
            Self::Rgb => "rgb",
            Self::Rgba => "rgba",
        })
    }
}

/// The part of a strip's shape that must agree across a chapter.
///
/// Heights may differ freely; width and channel layout may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripGeometry {
    /// Width in pixels.
    pub width: u32,
    /// Channel layout.
    pub layout: ChannelLayout,
}

impl fmt::Display for StripGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px wide {}", self.width, self.layout)
    }
}

/// Errors that abort processing of a chapter.
///
/// Each variant that originates from a specific strip carries that
/// strip's index so the offending input can be found.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A strip could not be decoded, or its raw buffer does not match
    /// its declared shape.
    #[error("failed to decode strip {index}: {source}")]
    Format {
        /// Index of the strip in the chapter order.
        index: usize,
        /// Underlying decoder or buffer error.
        #[source]
        source: image::ImageError,
    },

    /// A strip's width or channel layout differs from the chapter's.
    #[error("strip {index} is {found}, but the chapter is {expected}")]
    DimensionMismatch {
        /// Index of the offending strip.
        index: usize,
        /// Geometry established by the first strip.
        expected: StripGeometry,
        /// Geometry of the offending strip.
        found: StripGeometry,
    },

    /// No strips were supplied.
    #[error("no strips to stitch")]
    EmptyInput,

    /// The stitched canvas would exceed the addressable row range.
    #[error("stitched canvas height {height} exceeds {max} rows", max = u32::MAX)]
    CanvasTooLarge {
        /// Total requested height.
        height: u64,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Build a [`PipelineError::Format`] for a raw buffer whose length
    /// disagrees with its declared width, height, and layout.
    pub(crate) fn buffer_mismatch(index: usize) -> Self {
        Self::Format {
            index,
            source: image::ImageError::Parameter(image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_channel_counts() {
        assert_eq!(ChannelLayout::Luma.channels(), 1);
        assert_eq!(ChannelLayout::LumaAlpha.channels(), 2);
        assert_eq!(ChannelLayout::Rgb.channels(), 3);
        assert_eq!(ChannelLayout::Rgba.channels(), 4);
        assert_eq!(ChannelLayout::LumaAlpha.color_channels(), 1);
        assert_eq!(ChannelLayout::Rgba.color_channels(), 3);
    }

    #[test]
    fn layout_from_color_type_ignores_bit_depth() {
        assert_eq!(
            ChannelLayout::from_color_type(image::ColorType::L16),
            ChannelLayout::Luma
        );
        assert_eq!(
            ChannelLayout::from_color_type(image::ColorType::La8),
            ChannelLayout::LumaAlpha
        );
        assert_eq!(
            ChannelLayout::from_color_type(image::ColorType::Rgb16),
            ChannelLayout::Rgb
        );
        assert_eq!(
            ChannelLayout::from_color_type(image::ColorType::Rgba32F),
            ChannelLayout::Rgba
        );
    }

    #[test]
    fn dimension_mismatch_display_names_strip() {
        let err = PipelineError::DimensionMismatch {
            index: 2,
            expected: StripGeometry {
                width: 800,
                layout: ChannelLayout::Rgb,
            },
            found: StripGeometry {
                width: 690,
                layout: ChannelLayout::Rgb,
            },
        };
        assert_eq!(
            err.to_string(),
            "strip 2 is 690px wide rgb, but the chapter is 800px wide rgb",
        );
    }

    #[test]
    fn error_empty_input_display() {
        assert_eq!(PipelineError::EmptyInput.to_string(), "no strips to stitch");
    }

    #[test]
    fn error_invalid_config_display() {
        let err = PipelineError::InvalidConfig("min_height > max_height".to_string());
        assert_eq!(
            err.to_string(),
            "invalid pipeline configuration: min_height > max_height",
        );
    }

    #[test]
    fn buffer_mismatch_is_format_error() {
        let err = PipelineError::buffer_mismatch(4);
        assert!(matches!(err, PipelineError::Format { index: 4, .. }));
        assert!(err.to_string().starts_with("failed to decode strip 4:"));
    }

    #[test]
    fn layout_serde_uses_kebab_case() {
        let json = serde_json::to_string(&ChannelLayout::LumaAlpha).unwrap_or_default();
        assert_eq!(json, "\"luma-alpha\"");
    }
}
