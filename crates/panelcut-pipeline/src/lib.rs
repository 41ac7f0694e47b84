//! panelcut-pipeline: Pure strip re-chunking pipeline (sans-IO).
//!
//! Turns the ordered strips of a webcomic chapter into a new sequence of
//! reading-sized chunks:
//! load -> stitch -> profile rows -> select cuts -> extract chunks.
//!
//! Cuts prefer rows that are flat and close to the background (blank
//! gutters between panels). When no such row lies within the size
//! bounds the selector cuts at the maximum height and flags the cut as
//! forced, so chunk sizes stay bounded.
//!
//! This crate has **no I/O dependencies**. It decodes in-memory byte
//! slices and hands out chunks as borrowed pixel rows. Encoding and
//! file naming live in `panelcut-export`.

pub mod chunk;
pub mod config;
pub mod diagnostics;
pub mod pipeline;
pub mod profile;
pub mod split;
pub mod stitch;
pub mod strip;
pub mod types;

pub use chunk::{Boundary, Chunk, ChunkInfo, ChunkSink, Chunks, chunks, write_chunks};
pub use config::{Background, ChapterConfig, ColorMode, LoadConfig, ProfileConfig, SplitConfig};
pub use pipeline::{ChapterResult, Pipeline};
pub use profile::{RowProfile, RowScore, profile_rows};
pub use split::{Cut, CutKind, CutPlan, select_cuts};
pub use stitch::{Canvas, stitch};
pub use strip::{Strip, load_strips};
pub use types::{ChannelLayout, Dimensions, PipelineError, StripGeometry};

/// Run the whole pipeline on encoded strips.
///
/// `sources` are encoded images (PNG, JPEG, BMP, WebP) in chapter
/// order. The result owns the stitched canvas and the cut plan; iterate
/// [`ChapterResult::chunks`] to get the output chunks.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] before decoding anything if
/// `config` is invalid, [`PipelineError::EmptyInput`] for no sources,
/// [`PipelineError::Format`] for an undecodable strip,
/// [`PipelineError::DimensionMismatch`] for a strip whose width or
/// layout differs from the first, and
/// [`PipelineError::CanvasTooLarge`] if the chapter is taller than
/// `u32::MAX` rows.
pub fn process(sources: Vec<Vec<u8>>, config: &ChapterConfig) -> Result<ChapterResult, PipelineError> {
    Pipeline::new(sources, *config)
        .load()?
        .stitch()?
        .profile()
        .split()
        .map(pipeline::Planned::into_result)
}
