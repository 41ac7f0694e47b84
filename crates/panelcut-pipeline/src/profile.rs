//! Row profiling: score every canvas row by how safe it is to cut.
//!
//! A row's score depends only on that row's pixels, so rows are scored
//! in parallel with rayon. Collection preserves row order and every row
//! is computed from exact integer sums, so the profile is identical to
//! a sequential pass.

use std::ops::Range;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Background, ProfileConfig};
use crate::stitch::Canvas;
use crate::types::ChannelLayout;

/// Statistics and classification of one canvas row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowScore {
    /// Cut-safety score. Lower means flatter and closer to the
    /// background extreme.
    pub score: f32,
    /// Mean of the row's color samples (0-255).
    pub mean: f32,
    /// Standard deviation of the row's color samples.
    pub std_dev: f32,
    /// Whether the row is blank enough to cut through.
    pub safe: bool,
}

/// One [`RowScore`] per canvas row, index-aligned with the canvas.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowProfile {
    rows: Vec<RowScore>,
}

impl RowProfile {
    /// Build a profile from precomputed row scores.
    #[must_use]
    pub const fn new(rows: Vec<RowScore>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the profile has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The score of `row`, if it exists.
    #[must_use]
    pub fn get(&self, row: u32) -> Option<&RowScore> {
        self.rows.get(row as usize)
    }

    /// Whether `row` exists and is safe to cut through.
    #[must_use]
    pub fn is_safe(&self, row: u32) -> bool {
        self.get(row).is_some_and(|r| r.safe)
    }

    /// All row scores in canvas order.
    #[must_use]
    pub fn scores(&self) -> &[RowScore] {
        &self.rows
    }

    /// Number of safe rows.
    #[must_use]
    pub fn safe_count(&self) -> usize {
        self.rows.iter().filter(|r| r.safe).count()
    }

    /// Maximal runs of consecutive safe rows, top to bottom.
    #[must_use]
    pub fn safe_bands(&self) -> Vec<Range<u32>> {
        let mut bands = Vec::new();
        let mut start = None;
        let mut end = 0;
        for (row, score) in (0u32..).zip(&self.rows) {
            end = row + 1;
            match (score.safe, start) {
                (true, None) => start = Some(row),
                (false, Some(s)) => {
                    bands.push(s..row);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            bands.push(s..end);
        }
        bands
    }
}

/// Score every row of `canvas`.
#[must_use]
pub fn profile_rows(canvas: &Canvas, config: &ProfileConfig) -> RowProfile {
    let row_bytes = canvas.row_bytes();
    if row_bytes == 0 {
        return RowProfile::default();
    }

    let layout = canvas.layout();
    let rows: Vec<RowScore> = canvas
        .as_raw()
        .par_chunks_exact(row_bytes)
        .map(|row| score_row(row, layout, config))
        .collect();

    let profile = RowProfile::new(rows);
    info!(
        rows = profile.len(),
        safe_rows = profile.safe_count(),
        background = %config.background,
        "profiled canvas rows"
    );
    profile
}

/// Score a single row of interleaved pixels.
///
/// Alpha samples are ignored. The mean and standard deviation are taken
/// over every color sample of the row, so an RGB row of width `w`
/// contributes `3 * w` samples.
///
/// The extreme distance is measured against the fixed ends of the
/// 8-bit range (255 for light, 0 for dark), not against the darkest and
/// brightest values seen on the canvas. A row's score therefore depends
/// on that row alone and is the same whichever chapter it appears in.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn score_row(row: &[u8], layout: ChannelLayout, config: &ProfileConfig) -> RowScore {
    let color = layout.color_channels();
    let mut sum: u64 = 0;
    let mut sum_sq: u64 = 0;
    let mut count: u64 = 0;
    for pixel in row.chunks_exact(layout.channels()) {
        for &sample in &pixel[..color] {
            let v = u64::from(sample);
            sum += v;
            sum_sq += v * v;
        }
        count += color as u64;
    }

    if count == 0 {
        return RowScore {
            score: 0.0,
            mean: 0.0,
            std_dev: 0.0,
            safe: false,
        };
    }

    // n * sum(x^2) - sum(x)^2 is exact in integers and never negative,
    // so a uniform row has a standard deviation of exactly zero.
    let spread = u128::from(count) * u128::from(sum_sq) - u128::from(sum) * u128::from(sum);
    let n = count as f64;
    let mean = sum as f64 / n;
    let std_dev = (spread as f64 / (n * n)).sqrt();

    let light = mean >= f64::from(config.light_threshold);
    let dark = mean <= f64::from(config.dark_threshold);
    let (extreme_distance, on_background) = match config.background {
        Background::Light => (255.0 - mean, light),
        Background::Dark => (mean, dark),
        Background::Either => ((255.0 - mean).min(mean), light || dark),
        Background::Any => (0.0, true),
    };

    let score = extreme_distance.mul_add(f64::from(config.extremity_weight), std_dev);
    RowScore {
        score: score as f32,
        mean: mean as f32,
        std_dev: std_dev as f32,
        safe: on_background && std_dev <= f64::from(config.flatness_tolerance),
    }
}
