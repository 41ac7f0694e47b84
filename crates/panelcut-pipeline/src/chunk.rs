//! Chunk extraction: borrow the canvas rows between consecutive cuts.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::split::{CutKind, CutPlan};
use crate::stitch::Canvas;
use crate::types::{ChannelLayout, Dimensions, PipelineError};

/// What bounds a chunk at its top or bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Boundary {
    /// The top or bottom of the canvas.
    Edge,
    /// A cut of the given kind.
    Cut(CutKind),
}

impl Boundary {
    const fn is_forced(self) -> bool {
        matches!(self, Self::Cut(CutKind::Forced))
    }
}

/// A horizontal band of the canvas, borrowed without copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    index: usize,
    start: u32,
    end: u32,
    width: u32,
    layout: ChannelLayout,
    pixels: &'a [u8],
    top: Boundary,
    bottom: Boundary,
}

impl<'a> Chunk<'a> {
    /// Zero-based position of the chunk, top to bottom.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Canvas rows covered by the chunk.
    #[must_use]
    pub const fn rows(&self) -> Range<u32> {
        self.start..self.end
    }

    /// First canvas row of the chunk.
    #[must_use]
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// One past the last canvas row of the chunk.
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Height in rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.end - self.start
    }

    /// Width in pixels (the canvas width).
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Width and height.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height(),
        }
    }

    /// Channel layout of [`pixels`](Self::pixels).
    #[must_use]
    pub const fn layout(&self) -> ChannelLayout {
        self.layout
    }

    /// Row-major pixel bytes, borrowed from the canvas.
    #[must_use]
    pub const fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    /// What bounds the chunk at the top.
    #[must_use]
    pub const fn top(&self) -> Boundary {
        self.top
    }

    /// What bounds the chunk at the bottom.
    #[must_use]
    pub const fn bottom(&self) -> Boundary {
        self.bottom
    }

    /// Whether either edge of the chunk is a forced cut, meaning the
    /// chunk may begin or end in the middle of content.
    #[must_use]
    pub const fn forced_unsafe_cut(&self) -> bool {
        self.top.is_forced() || self.bottom.is_forced()
    }

    /// Serializable summary of the chunk.
    #[must_use]
    pub const fn info(&self) -> ChunkInfo {
        ChunkInfo {
            index: self.index,
            start: self.start,
            end: self.end,
            height: self.height(),
            top: self.top,
            bottom: self.bottom,
            forced_unsafe_cut: self.forced_unsafe_cut(),
        }
    }
}

/// Position and boundary kinds of a chunk, without its pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    /// Zero-based position of the chunk.
    pub index: usize,
    /// First canvas row.
    pub start: u32,
    /// One past the last canvas row.
    pub end: u32,
    /// Height in rows.
    pub height: u32,
    /// Top boundary.
    pub top: Boundary,
    /// Bottom boundary.
    pub bottom: Boundary,
    /// Whether either boundary is a forced cut.
    pub forced_unsafe_cut: bool,
}

/// Iterator over the chunks of a canvas in top-to-bottom order.
///
/// Created by [`chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    canvas: &'a Canvas,
    bounds: Vec<(u32, Boundary)>,
    next: usize,
}

impl<'a> Chunks<'a> {
    /// Build the iterator without checking that `plan` fits `canvas`.
    pub(crate) fn new_unchecked(canvas: &'a Canvas, plan: &CutPlan) -> Self {
        let bounds = std::iter::once((0, Boundary::Edge))
            .chain(plan.cuts().iter().map(|c| (c.row, Boundary::Cut(c.kind))))
            .chain(std::iter::once((canvas.height(), Boundary::Edge)))
            .collect();
        Self {
            canvas,
            bounds,
            next: 0,
        }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (start, top) = *self.bounds.get(self.next)?;
        let (end, bottom) = *self.bounds.get(self.next + 1)?;
        let pixels = self.canvas.rows(start..end)?;
        let index = self.next;
        self.next += 1;
        Some(Chunk {
            index,
            start,
            end,
            width: self.canvas.width(),
            layout: self.canvas.layout(),
            pixels,
            top,
            bottom,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bounds.len().saturating_sub(self.next + 1);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

/// Split `canvas` into chunks along the cuts of `plan`.
///
/// The chunks tile the canvas: they are contiguous, non-overlapping,
/// and their pixel bytes concatenate to exactly the canvas buffer.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if a cut does not lie
/// strictly inside the canvas or the cuts are not strictly increasing.
pub fn chunks<'a>(canvas: &'a Canvas, plan: &CutPlan) -> Result<Chunks<'a>, PipelineError> {
    plan.check_fits(canvas.height())?;
    Ok(Chunks::new_unchecked(canvas, plan))
}

/// Destination for extracted chunks, such as an encoder writing files.
pub trait ChunkSink {
    /// Error produced when a chunk cannot be accepted.
    type Error;

    /// Accept the next chunk. Chunks arrive in top-to-bottom order.
    ///
    /// # Errors
    ///
    /// Implementation-defined. The first error stops [`write_chunks`].
    fn accept(&mut self, chunk: Chunk<'_>) -> Result<(), Self::Error>;
}

/// Feed every chunk to `sink` in order and return how many were
/// accepted.
///
/// # Errors
///
/// Returns the first error reported by `sink`; later chunks are not
/// offered.
pub fn write_chunks<S: ChunkSink + ?Sized>(
    chunks: Chunks<'_>,
    sink: &mut S,
) -> Result<usize, S::Error> {
    let mut written = 0;
    for chunk in chunks {
        sink.accept(chunk)?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::split::Cut;

    /// A 3-pixel-wide RGB canvas whose row `y` is filled with `y % 256`.
    fn ramp_canvas(height: u32) -> Canvas {
        let data = (0..height)
            .flat_map(|y| std::iter::repeat_n(u8::try_from(y % 256).unwrap(), 9))
            .collect();
        Canvas::from_raw(3, height, ChannelLayout::Rgb, data).unwrap()
    }

    fn cut(row: u32, kind: CutKind) -> Cut {
        Cut {
            row,
            kind,
            score: 0.0,
        }
    }

    #[test]
    fn empty_plan_yields_whole_canvas() {
        let canvas = ramp_canvas(10);
        let all: Vec<Chunk<'_>> = chunks(&canvas, &CutPlan::default()).unwrap().collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].rows(), 0..10);
        assert_eq!(all[0].top(), Boundary::Edge);
        assert_eq!(all[0].bottom(), Boundary::Edge);
        assert!(!all[0].forced_unsafe_cut());
        assert_eq!(all[0].pixels(), canvas.as_raw());
    }

    #[test]
    fn chunks_tile_the_canvas() {
        let canvas = ramp_canvas(300);
        let plan = CutPlan::new(
            vec![
                cut(40, CutKind::Cover),
                cut(130, CutKind::Safe),
                cut(222, CutKind::Forced),
            ],
            300,
        )
        .unwrap();
        let all: Vec<Chunk<'_>> = chunks(&canvas, &plan).unwrap().collect();

        let ranges: Vec<Range<u32>> = all.iter().map(Chunk::rows).collect();
        assert_eq!(ranges, vec![0..40, 40..130, 130..222, 222..300]);
        let heights: u32 = all.iter().map(Chunk::height).sum();
        assert_eq!(heights, canvas.height());

        let joined: Vec<u8> = all.iter().flat_map(|c| c.pixels().iter().copied()).collect();
        assert_eq!(joined, canvas.as_raw());
    }

    #[test]
    fn forced_cut_flags_both_neighbours() {
        let canvas = ramp_canvas(30);
        let plan = CutPlan::new(vec![cut(10, CutKind::Safe), cut(20, CutKind::Forced)], 30).unwrap();
        let flags: Vec<bool> = chunks(&canvas, &plan)
            .unwrap()
            .map(|c| c.forced_unsafe_cut())
            .collect();
        assert_eq!(flags, vec![false, true, true]);
    }

    #[test]
    fn chunk_pixels_match_canvas_rows() {
        let canvas = ramp_canvas(20);
        let plan = CutPlan::new(vec![cut(7, CutKind::Safe)], 20).unwrap();
        let second = chunks(&canvas, &plan).unwrap().nth(1).unwrap();
        assert_eq!(second.index(), 1);
        assert_eq!(second.dimensions(), Dimensions { width: 3, height: 13 });
        assert_eq!(second.layout(), ChannelLayout::Rgb);
        assert_eq!(second.pixels().len(), 13 * 9);
        assert_eq!(second.pixels()[0], 7);
        assert_eq!(second.pixels()[second.pixels().len() - 1], 19);
    }

    #[test]
    fn plan_past_bottom_is_rejected() {
        let canvas = ramp_canvas(10);
        let plan = CutPlan::new(vec![cut(12, CutKind::Safe)], 20).unwrap();
        assert!(matches!(
            chunks(&canvas, &plan),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn iterator_reports_exact_length() {
        let canvas = ramp_canvas(30);
        let plan = CutPlan::new(vec![cut(10, CutKind::Safe), cut(20, CutKind::Safe)], 30).unwrap();
        let mut iter = chunks(&canvas, &plan).unwrap();
        assert_eq!(iter.len(), 3);
        iter.next();
        assert_eq!(iter.len(), 2);
    }

    #[test]
    fn info_serializes_boundaries() {
        let canvas = ramp_canvas(30);
        let plan = CutPlan::new(vec![cut(10, CutKind::Forced)], 30).unwrap();
        let info = chunks(&canvas, &plan).unwrap().next().unwrap().info();
        let json = serde_json::to_value(info).unwrap();
        assert_eq!(json["end"], 10);
        assert_eq!(json["bottom"]["cut"], "forced");
        assert_eq!(json["forced_unsafe_cut"], true);
    }

    struct Collect {
        heights: Vec<u32>,
        fail_at: Option<usize>,
    }

    impl ChunkSink for Collect {
        type Error = String;

        fn accept(&mut self, chunk: Chunk<'_>) -> Result<(), String> {
            if self.fail_at == Some(chunk.index()) {
                return Err(format!("rejected chunk {}", chunk.index()));
            }
            self.heights.push(chunk.height());
            Ok(())
        }
    }

    #[test]
    fn write_chunks_feeds_sink_in_order() {
        let canvas = ramp_canvas(30);
        let plan = CutPlan::new(vec![cut(5, CutKind::Safe), cut(18, CutKind::Safe)], 30).unwrap();
        let mut sink = Collect {
            heights: Vec::new(),
            fail_at: None,
        };
        let written = write_chunks(chunks(&canvas, &plan).unwrap(), &mut sink).unwrap();
        assert_eq!(written, 3);
        assert_eq!(sink.heights, vec![5, 13, 12]);
    }

    #[test]
    fn write_chunks_stops_at_first_error() {
        let canvas = ramp_canvas(30);
        let plan = CutPlan::new(vec![cut(5, CutKind::Safe), cut(18, CutKind::Safe)], 30).unwrap();
        let mut sink = Collect {
            heights: Vec::new(),
            fail_at: Some(1),
        };
        let result = write_chunks(chunks(&canvas, &plan).unwrap(), &mut sink);
        assert_eq!(result, Err("rejected chunk 1".to_string()));
        assert_eq!(sink.heights, vec![5]);
    }
}
