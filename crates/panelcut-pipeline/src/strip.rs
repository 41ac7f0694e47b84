//! Strip loading: decode the ordered chapter strips into 8-bit buffers.
//!
//! This is the first stage of the pipeline: encoded bytes in, a list of
//! [`Strip`]s sharing one width and channel layout out. Ordering is the
//! caller's responsibility; strips are kept in the order given.

use image::DynamicImage;
use tracing::debug;

use crate::config::{ColorMode, LoadConfig};
use crate::types::{ChannelLayout, PipelineError, StripGeometry};

/// One decoded strip of a chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strip {
    index: usize,
    width: u32,
    height: u32,
    layout: ChannelLayout,
    data: Vec<u8>,
}

impl Strip {
    /// Wrap an already decoded, row-major, 8-bit-per-channel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Format`] if either dimension is zero or
    /// `data.len()` is not `width * height * layout.channels()`.
    pub fn new(
        index: usize,
        width: u32,
        height: u32,
        layout: ChannelLayout,
        data: Vec<u8>,
    ) -> Result<Self, PipelineError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(layout.channels()));
        if width == 0 || height == 0 || expected != Some(data.len()) {
            return Err(PipelineError::buffer_mismatch(index));
        }
        Ok(Self {
            index,
            width,
            height,
            layout,
            data,
        })
    }

    /// Decode an encoded image (PNG, JPEG, BMP, WebP) into a strip.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Format`] if the bytes are empty, the
    /// format is unrecognized, the data is corrupt, or the image has no
    /// pixels.
    pub fn decode(index: usize, bytes: &[u8], color: ColorMode) -> Result<Self, PipelineError> {
        let image =
            image::load_from_memory(bytes).map_err(|source| PipelineError::Format { index, source })?;
        Self::from_image(index, image, color)
    }

    /// Build a strip from an image decoded elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Format`] if the image has no pixels.
    pub fn from_image(
        index: usize,
        image: DynamicImage,
        color: ColorMode,
    ) -> Result<Self, PipelineError> {
        let layout = match color {
            ColorMode::Preserve => ChannelLayout::from_color_type(image.color()),
            ColorMode::Rgb => ChannelLayout::Rgb,
            ColorMode::Rgba => ChannelLayout::Rgba,
        };
        let (width, height) = (image.width(), image.height());
        let data = match layout {
            ChannelLayout::Luma => image.into_luma8().into_raw(),
            ChannelLayout::LumaAlpha => image.into_luma_alpha8().into_raw(),
            ChannelLayout::Rgb => image.into_rgb8().into_raw(),
            ChannelLayout::Rgba => image.into_rgba8().into_raw(),
        };
        Self::new(index, width, height, layout, data)
    }

    /// Position of this strip in the chapter order.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Channel layout of the pixel buffer.
    #[must_use]
    pub const fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Width and layout, the part that must match across strips.
    #[must_use]
    pub const fn geometry(&self) -> StripGeometry {
        StripGeometry {
            width: self.width,
            layout: self.layout,
        }
    }

    /// The raw row-major pixel bytes.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }
}

/// Check that every strip shares the first strip's geometry.
///
/// Returns the shared geometry.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `strips` is empty and
/// [`PipelineError::DimensionMismatch`] naming the first strip whose
/// width or layout differs.
pub fn check_geometry(strips: &[Strip]) -> Result<StripGeometry, PipelineError> {
    let first = strips.first().ok_or(PipelineError::EmptyInput)?;
    let expected = first.geometry();
    for strip in &strips[1..] {
        let found = strip.geometry();
        if found != expected {
            return Err(PipelineError::DimensionMismatch {
                index: strip.index,
                expected,
                found,
            });
        }
    }
    Ok(expected)
}

/// Decode every source in order into a validated list of strips.
///
/// Decoding stops at the first failure, so a mismatched strip is
/// reported before later strips are decoded.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `sources` is empty,
/// [`PipelineError::Format`] for an undecodable strip, and
/// [`PipelineError::DimensionMismatch`] for a strip whose width or
/// layout differs from the first.
pub fn load_strips<S: AsRef<[u8]>>(
    sources: &[S],
    config: &LoadConfig,
) -> Result<Vec<Strip>, PipelineError> {
    if sources.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let mut strips: Vec<Strip> = Vec::with_capacity(sources.len());
    for (index, source) in sources.iter().enumerate() {
        let strip = Strip::decode(index, source.as_ref(), config.color)?;
        debug!(
            index,
            width = strip.width,
            height = strip.height,
            layout = %strip.layout,
            "decoded strip"
        );
        if let Some(first) = strips.first()
            && first.geometry() != strip.geometry()
        {
            return Err(PipelineError::DimensionMismatch {
                index,
                expected: first.geometry(),
                found: strip.geometry(),
            });
        }
        strips.push(strip);
    }
    Ok(strips)
}
