//! Split selection: choose the rows where the canvas is cut.
//!
//! [`select_cuts`] walks the [`RowProfile`] top to bottom. From each
//! cut it looks for the safe row nearest to `cursor + target_height`
//! inside `[cursor + min_height, cursor + max_height]`. When that
//! window holds no safe row it cuts at the upper bound and records the
//! cut as [`CutKind::Forced`], so no chunk ever exceeds `max_height`.
//! `min_tail_height` narrows the first search but never turns a safe
//! cut into a forced one.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SplitConfig;
use crate::profile::RowProfile;
use crate::types::PipelineError;

/// How a cut row was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CutKind {
    /// Cut through a row classified as safe.
    Safe,
    /// No safe row was in reach; cut at the hard size bound.
    Forced,
    /// Cut at the configured cover height.
    Cover,
}

impl fmt::Display for CutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Safe => "safe",
            Self::Forced => "forced",
            Self::Cover => "cover",
        })
    }
}

/// A single cut: the chunk below it starts at `row`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    /// First row of the chunk below the cut.
    pub row: u32,
    /// How the row was chosen.
    pub kind: CutKind,
    /// Profile score of `row`.
    pub score: f32,
}

/// Strictly increasing cut rows, all inside `(0, height)`.
///
/// The canvas top and bottom are implicit boundaries and never appear
/// as cuts, so a plan with `k` cuts yields `k + 1` chunks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CutPlan {
    cuts: Vec<Cut>,
}

impl CutPlan {
    /// Build a plan from explicit cuts for a canvas of `height` rows.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the rows are not
    /// strictly increasing or fall outside `(0, height)`.
    pub fn new(cuts: Vec<Cut>, height: u32) -> Result<Self, PipelineError> {
        let plan = Self { cuts };
        plan.check_fits(height)?;
        Ok(plan)
    }

    /// Check that every cut lies strictly inside a canvas of `height`
    /// rows and that cuts strictly increase.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending cut.
    pub fn check_fits(&self, height: u32) -> Result<(), PipelineError> {
        let mut previous = 0;
        for cut in &self.cuts {
            if cut.row <= previous || cut.row >= height {
                return Err(PipelineError::InvalidConfig(format!(
                    "cut at row {} does not fit after row {previous} in a canvas of height {height}",
                    cut.row,
                )));
            }
            previous = cut.row;
        }
        Ok(())
    }

    /// The cuts in top-to-bottom order.
    #[must_use]
    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    /// The cut rows in top-to-bottom order.
    pub fn rows(&self) -> impl Iterator<Item = u32> + '_ {
        self.cuts.iter().map(|c| c.row)
    }

    /// Number of cuts.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.cuts.len()
    }

    /// Returns `true` if the canvas stays in one piece.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Number of chunks the plan produces.
    #[must_use]
    pub const fn chunk_count(&self) -> usize {
        self.cuts.len() + 1
    }

    /// Number of cuts made by the forced fallback.
    #[must_use]
    pub fn forced_count(&self) -> usize {
        self.cuts
            .iter()
            .filter(|c| c.kind == CutKind::Forced)
            .count()
    }

    /// All chunk boundaries including the implicit `0` and `height`.
    #[must_use]
    pub fn boundaries(&self, height: u32) -> Vec<u32> {
        std::iter::once(0)
            .chain(self.rows())
            .chain(std::iter::once(height))
            .collect()
    }
}

/// Choose cut rows for a canvas described by `profile`.
///
/// A canvas no taller than `max_height` (in particular one shorter than
/// `min_height`) yields an empty plan.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`SplitConfig::validate`], and [`PipelineError::CanvasTooLarge`] if
/// the profile has more than `u32::MAX` rows.
pub fn select_cuts(profile: &RowProfile, config: &SplitConfig) -> Result<CutPlan, PipelineError> {
    config.validate()?;
    let height = u32::try_from(profile.len()).map_err(|_| PipelineError::CanvasTooLarge {
        height: profile.len() as u64,
    })?;

    let mut cuts = Vec::new();
    let mut cursor = 0;

    if let Some(cover) = config.cover_height {
        if cover < height {
            cuts.push(Cut {
                row: cover,
                kind: CutKind::Cover,
                score: score_at(profile, cover),
            });
            cursor = cover;
        } else {
            debug!(cover, height, "cover height reaches the bottom, ignoring");
        }
    }

    // Invariant: height - cursor > max_height inside the loop, so
    // cursor + max_height < height and none of the sums below overflow.
    while height - cursor > config.max_height {
        let lower = cursor + config.min_height;
        let full_upper = cursor + config.max_height;
        let upper = if config.min_tail_height > 0
            && let Some(limit) = height.checked_sub(config.min_tail_height)
            && limit >= lower
        {
            full_upper.min(limit)
        } else {
            full_upper
        };
        let ideal = (cursor + config.target_height).clamp(lower, upper);

        // Rows past the tail limit are still tried before forcing a cut,
        // nearest to the limit first.
        let found = nearest_safe_row(profile, ideal, lower, upper, config.search_radius)
            .or_else(|| {
                if upper < full_upper {
                    let start = upper + 1;
                    nearest_safe_row(profile, start, start, full_upper, config.search_radius)
                } else {
                    None
                }
            });

        let cut = if let Some(row) = found {
            debug!(row, ideal, distance = row.abs_diff(ideal), "safe cut");
            Cut {
                row,
                kind: CutKind::Safe,
                score: score_at(profile, row),
            }
        } else {
            warn!(
                row = upper,
                from = cursor,
                "no safe row in [{lower}, {full_upper}], forcing a cut"
            );
            Cut {
                row: upper,
                kind: CutKind::Forced,
                score: score_at(profile, upper),
            }
        };
        cursor = cut.row;
        cuts.push(cut);
    }

    let plan = CutPlan { cuts };
    info!(
        height,
        cuts = plan.len(),
        forced = plan.forced_count(),
        "selected cuts"
    );
    Ok(plan)
}

/// Find the safe row in `[lower, upper]` nearest to `ideal`.
///
/// The search widens `radius` rows at a time around `ideal` until it
/// covers the whole window. Rows are visited nearest first; of two safe
/// rows at the same distance the lower score wins, then the earlier row.
fn nearest_safe_row(
    profile: &RowProfile,
    ideal: u32,
    lower: u32,
    upper: u32,
    radius: u32,
) -> Option<u32> {
    let reach = (ideal - lower).max(upper - ideal);
    let mut near: u32 = 0;
    loop {
        let far = near.saturating_add(radius - 1).min(reach);
        for distance in near..=far {
            let earlier = ideal.checked_sub(distance).filter(|&row| row >= lower);
            let later = ideal
                .checked_add(distance)
                .filter(|&row| distance > 0 && row <= upper);
            let best = [earlier, later]
                .into_iter()
                .flatten()
                .filter(|&row| profile.is_safe(row))
                .min_by(|&a, &b| {
                    score_at(profile, a)
                        .total_cmp(&score_at(profile, b))
                        .then(a.cmp(&b))
                });
            if best.is_some() {
                return best;
            }
        }
        if far == reach {
            return None;
        }
        near = far + 1;
    }
}

fn score_at(profile: &RowProfile, row: u32) -> f32 {
    profile.get(row).map_or(f32::INFINITY, |r| r.score)
}
