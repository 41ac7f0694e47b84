//! Canvas stitching: stack the chapter strips into one tall buffer.

use std::ops::Range;

use tracing::{debug, info};

use crate::strip::{Strip, check_geometry};
use crate::types::{ChannelLayout, Dimensions, PipelineError};

/// The whole chapter as one row-major, 8-bit-per-channel buffer.
///
/// Produced by [`stitch`] and never modified afterwards; later stages
/// only read rows from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    layout: ChannelLayout,
    data: Vec<u8>,
    strip_rows: Vec<Range<u32>>,
}

impl Canvas {
    /// Wrap a raw buffer as a single-strip canvas.
    ///
    /// Returns `None` if either dimension is zero or the buffer length
    /// does not match `width * height * layout.channels()`.
    #[must_use]
    pub fn from_raw(width: u32, height: u32, layout: ChannelLayout, data: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(layout.channels())?;
        (width > 0 && height > 0 && data.len() == expected).then(|| Self {
            width,
            height,
            layout,
            data,
            strip_rows: vec![0..height],
        })
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Width and height.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Channel layout shared by every strip.
    #[must_use]
    pub const fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Bytes per row.
    #[must_use]
    pub const fn row_bytes(&self) -> usize {
        self.width as usize * self.layout.channels()
    }

    /// The whole pixel buffer.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Consume the canvas and return its pixel buffer.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// The pixel bytes of rows `rows.start..rows.end`.
    ///
    /// Returns `None` if the range is reversed or extends past the
    /// bottom of the canvas.
    #[must_use]
    pub fn rows(&self, rows: Range<u32>) -> Option<&[u8]> {
        if rows.start > rows.end || rows.end > self.height {
            return None;
        }
        let row_bytes = self.row_bytes();
        self.data
            .get(rows.start as usize * row_bytes..rows.end as usize * row_bytes)
    }

    /// The canvas row range each source strip occupies, in strip order.
    #[must_use]
    pub fn strip_rows(&self) -> &[Range<u32>] {
        &self.strip_rows
    }

    /// Position (in chapter order) of the strip that contributed `row`.
    #[must_use]
    pub fn strip_at(&self, row: u32) -> Option<usize> {
        if row >= self.height {
            return None;
        }
        // Ranges are sorted and contiguous, so the first range ending
        // after `row` is the one containing it.
        Some(self.strip_rows.partition_point(|range| range.end <= row))
    }
}

/// Stack `strips` top to bottom into one canvas.
///
/// Geometry is checked before the canvas buffer is allocated. The
/// result is a pure function of the strip pixels and order.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] for an empty slice,
/// [`PipelineError::DimensionMismatch`] if the strips disagree on
/// width or layout, and [`PipelineError::CanvasTooLarge`] if the total
/// height does not fit in a `u32`.
pub fn stitch(strips: &[Strip]) -> Result<Canvas, PipelineError> {
    let geometry = check_geometry(strips)?;

    let total: u64 = strips.iter().map(|s| u64::from(s.height())).sum();
    let height = u32::try_from(total).map_err(|_| PipelineError::CanvasTooLarge { height: total })?;

    let byte_len: usize = strips.iter().map(|s| s.as_raw().len()).sum();
    let mut data = Vec::with_capacity(byte_len);
    let mut strip_rows = Vec::with_capacity(strips.len());
    let mut y = 0;

    for strip in strips {
        debug!(
            index = strip.index(),
            offset = y,
            height = strip.height(),
            "stitching strip"
        );
        data.extend_from_slice(strip.as_raw());
        strip_rows.push(y..y + strip.height());
        y += strip.height();
    }

    info!(
        width = geometry.width,
        height,
        strips = strips.len(),
        "stitched canvas"
    );

    Ok(Canvas {
        width: geometry.width,
        height,
        layout: geometry.layout,
        data,
        strip_rows,
    })
}
