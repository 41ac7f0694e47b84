//! Incremental pipeline: advance stage by stage, inspecting each
//! intermediate result before continuing.
//!
//! ```rust
//! # use panelcut_pipeline::{ChapterConfig, Pipeline, PipelineError};
//! # fn run(strips: Vec<Vec<u8>>) -> Result<(), PipelineError> {
//! let planned = Pipeline::new(strips, ChapterConfig::default())
//!     .load()?
//!     .stitch()?
//!     .profile()
//!     .split()?;
//!
//! for chunk in planned.chunks() {
//!     println!("chunk {} covers rows {:?}", chunk.index(), chunk.rows());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, so
//! stages cannot be skipped or run out of order. The decoded strips are
//! dropped once stitched; from then on every stage holds the canvas.

use crate::chunk::{ChunkSink, Chunks, write_chunks};
use crate::config::ChapterConfig;
use crate::diagnostics::StageMetrics;
use crate::profile::{RowProfile, profile_rows};
use crate::split::{CutKind, CutPlan, select_cuts};
use crate::stitch::{Canvas, stitch};
use crate::strip::{Strip, check_geometry, load_strips};
use crate::types::PipelineError;

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any strip has been decoded.
///
/// Call [`load`](Self::load) to advance.
#[must_use = "pipeline stages are consumed by advancing, call .load() to continue"]
pub struct Pending {
    config: ChapterConfig,
    sources: Vec<Vec<u8>>,
}

impl Pending {
    /// The encoded strip sources in chapter order.
    #[must_use]
    pub fn sources(&self) -> &[Vec<u8>] {
        &self.sources
    }

    /// Validate the configuration, then decode every strip.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] before decoding anything
    /// if the configuration is invalid, and otherwise any error of
    /// [`load_strips`].
    pub fn load(self) -> Result<Loaded, PipelineError> {
        self.config.validate()?;
        let input_bytes = self.sources.iter().map(Vec::len).sum();
        let strips = load_strips(&self.sources, &self.config.load)?;
        Ok(Loaded {
            config: self.config,
            strips,
            input_bytes,
        })
    }
}

// ───────────────────────── Stage 1: Loaded ───────────────────────────

/// Pipeline state after decoding. Every strip shares one geometry.
#[must_use = "pipeline stages are consumed by advancing, call .stitch() to continue"]
pub struct Loaded {
    config: ChapterConfig,
    strips: Vec<Strip>,
    input_bytes: usize,
}

impl Loaded {
    /// The decoded strips in chapter order.
    #[must_use]
    pub fn strips(&self) -> &[Strip] {
        &self.strips
    }

    /// Stack the strips into one canvas and drop them.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CanvasTooLarge`] if the total height
    /// does not fit in a `u32`.
    pub fn stitch(self) -> Result<Stitched, PipelineError> {
        let canvas = stitch(&self.strips)?;
        Ok(Stitched {
            config: self.config,
            canvas,
        })
    }
}

// ───────────────────────── Stage 2: Stitched ─────────────────────────

/// Pipeline state after stitching.
#[must_use = "pipeline stages are consumed by advancing, call .profile() to continue"]
pub struct Stitched {
    config: ChapterConfig,
    canvas: Canvas,
}

impl Stitched {
    /// The stitched canvas.
    #[must_use]
    pub const fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Score every canvas row.
    pub fn profile(self) -> Profiled {
        let profile = profile_rows(&self.canvas, &self.config.profile);
        Profiled {
            config: self.config,
            canvas: self.canvas,
            profile,
        }
    }
}

// ───────────────────────── Stage 3: Profiled ─────────────────────────

/// Pipeline state after row profiling.
#[must_use = "pipeline stages are consumed by advancing, call .split() to continue"]
pub struct Profiled {
    config: ChapterConfig,
    canvas: Canvas,
    profile: RowProfile,
}

impl Profiled {
    /// The stitched canvas.
    #[must_use]
    pub const fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// One score per canvas row.
    #[must_use]
    pub const fn row_profile(&self) -> &RowProfile {
        &self.profile
    }

    /// Choose the cut rows.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the split settings
    /// are invalid. [`Pending::load`] and [`Pipeline::from_strips`]
    /// already reject those.
    pub fn split(self) -> Result<Planned, PipelineError> {
        let plan = select_cuts(&self.profile, &self.config.split)?;
        Ok(Planned {
            canvas: self.canvas,
            profile: self.profile,
            plan,
        })
    }
}

// ───────────────────────── Stage 4: Planned ──────────────────────────

/// Final pipeline state: the canvas and a plan that fits it.
#[must_use = "call .chunks(), .write() or .into_result() to use the plan"]
pub struct Planned {
    canvas: Canvas,
    profile: RowProfile,
    plan: CutPlan,
}

impl Planned {
    /// The stitched canvas.
    #[must_use]
    pub const fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// One score per canvas row.
    #[must_use]
    pub const fn row_profile(&self) -> &RowProfile {
        &self.profile
    }

    /// The selected cuts.
    #[must_use]
    pub const fn plan(&self) -> &CutPlan {
        &self.plan
    }

    /// Iterate over the chunks, top to bottom.
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks::new_unchecked(&self.canvas, &self.plan)
    }

    /// Hand every chunk to `sink` in order.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by `sink`.
    pub fn write<S: ChunkSink + ?Sized>(&self, sink: &mut S) -> Result<usize, S::Error> {
        write_chunks(self.chunks(), sink)
    }

    /// Consume the pipeline and return its outputs.
    #[must_use]
    pub fn into_result(self) -> ChapterResult {
        ChapterResult {
            canvas: self.canvas,
            profile: self.profile,
            plan: self.plan,
        }
    }
}

/// Outputs of a completed pipeline run.
///
/// The plan always fits the canvas, so [`chunks`](Self::chunks) needs
/// no validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterResult {
    canvas: Canvas,
    profile: RowProfile,
    plan: CutPlan,
}

impl ChapterResult {
    /// The stitched canvas.
    #[must_use]
    pub const fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// One score per canvas row.
    #[must_use]
    pub const fn row_profile(&self) -> &RowProfile {
        &self.profile
    }

    /// The selected cuts.
    #[must_use]
    pub const fn plan(&self) -> &CutPlan {
        &self.plan
    }

    /// Iterate over the chunks, top to bottom.
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks::new_unchecked(&self.canvas, &self.plan)
    }

    /// Split into canvas, profile and plan.
    #[must_use]
    pub fn into_parts(self) -> (Canvas, RowProfile, CutPlan) {
        (self.canvas, self.profile, self.plan)
    }
}

// ──────────────────────── PipelineStage trait ────────────────────────

/// Total number of pipeline states, `Pending` through `Planned`.
pub const STAGE_COUNT: usize = 5;

/// Implemented by every pipeline state so callers can report on a
/// stage uniformly.
pub trait PipelineStage: Sized {
    /// Human-readable name of the stage (e.g. `"load"`, `"split"`).
    const NAME: &str;

    /// Zero-based position of the stage (`0` for [`Pending`] through
    /// `4` for [`Planned`]).
    const INDEX: usize;

    /// Metrics describing the state reached.
    fn metrics(&self) -> StageMetrics;

    /// Run all remaining stages and return the final result.
    ///
    /// # Errors
    ///
    /// Returns the first error of any remaining stage.
    fn complete(self) -> Result<ChapterResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Source {
            strip_count: self.sources.len(),
            input_bytes: self.sources.iter().map(Vec::len).sum(),
        }
    }

    fn complete(self) -> Result<ChapterResult, PipelineError> {
        self.load()?.complete()
    }
}

impl PipelineStage for Loaded {
    const NAME: &str = "load";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        let (width, layout) = self
            .strips
            .first()
            .map_or((0, None), |s| (s.width(), Some(s.layout())));
        StageMetrics::Load {
            strip_count: self.strips.len(),
            input_bytes: self.input_bytes,
            width,
            layout,
            min_strip_height: self.strips.iter().map(Strip::height).min().unwrap_or(0),
            max_strip_height: self.strips.iter().map(Strip::height).max().unwrap_or(0),
        }
    }

    fn complete(self) -> Result<ChapterResult, PipelineError> {
        self.stitch()?.complete()
    }
}

impl PipelineStage for Stitched {
    const NAME: &str = "stitch";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Stitch {
            width: self.canvas.width(),
            height: self.canvas.height(),
            strip_count: self.canvas.strip_rows().len(),
            canvas_bytes: self.canvas.as_raw().len(),
        }
    }

    fn complete(self) -> Result<ChapterResult, PipelineError> {
        self.profile().complete()
    }
}

impl PipelineStage for Profiled {
    const NAME: &str = "profile";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Profile {
            background: self.config.profile.background,
            rows: self.profile.len(),
            safe_rows: self.profile.safe_count(),
            safe_bands: self.profile.safe_bands().len(),
        }
    }

    fn complete(self) -> Result<ChapterResult, PipelineError> {
        Ok(self.split()?.into_result())
    }
}

impl PipelineStage for Planned {
    const NAME: &str = "split";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        let heights = self.chunks().map(|c| c.height());
        StageMetrics::Split {
            cut_count: self.plan.len(),
            forced_cuts: self.plan.forced_count(),
            cover_cut: self.plan.cuts().iter().any(|c| c.kind == CutKind::Cover),
            chunk_count: self.plan.chunk_count(),
            min_chunk_height: heights.clone().min().unwrap_or(0),
            max_chunk_height: heights.max().unwrap_or(0),
        }
    }

    fn complete(self) -> Result<ChapterResult, PipelineError> {
        Ok(self.into_result())
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Chapter re-chunking pipeline.
///
/// Created via [`Pipeline::new`] from encoded strips, or via
/// [`Pipeline::from_strips`] from strips decoded elsewhere.
pub struct Pipeline;

impl Pipeline {
    /// Store the encoded strips and config without doing any work.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(sources: Vec<Vec<u8>>, config: ChapterConfig) -> Pending {
        Pending { config, sources }
    }

    /// Start from already decoded strips, skipping the load stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an invalid config,
    /// [`PipelineError::EmptyInput`] for no strips and
    /// [`PipelineError::DimensionMismatch`] if the strips disagree on
    /// geometry.
    pub fn from_strips(strips: Vec<Strip>, config: ChapterConfig) -> Result<Loaded, PipelineError> {
        config.validate()?;
        check_geometry(&strips)?;
        let input_bytes = strips.iter().map(|s| s.as_raw().len()).sum();
        Ok(Loaded {
            config,
            strips,
            input_bytes,
        })
    }
}
