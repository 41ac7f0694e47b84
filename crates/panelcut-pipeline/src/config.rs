//! Pipeline configuration.
//!
//! [`ChapterConfig`] groups the settings of the three configurable
//! stages. Every struct has a [`Default`] and exposes its defaults as
//! `DEFAULT_*` associated constants so CLI front ends can reuse them.
//!
//! Nothing is checked at construction time. [`ChapterConfig::validate`]
//! runs before any strip is decoded, and the individual stage entry
//! points validate the part they consume.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// How decoded strips are normalized before stitching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    /// Keep each strip's native channel layout (reduced to 8 bits).
    /// Strips whose layouts differ are rejected.
    #[default]
    Preserve,
    /// Convert every strip to 8-bit RGB.
    Rgb,
    /// Convert every strip to 8-bit RGBA.
    Rgba,
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Preserve => "preserve",
            Self::Rgb => "rgb",
            Self::Rgba => "rgba",
        })
    }
}

/// Which kind of uniform band counts as blank space between panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Background {
    /// Near-white gutters only.
    Light,
    /// Near-black gutters only.
    Dark,
    /// Either near-white or near-black gutters.
    #[default]
    Either,
    /// Any flat row, whatever its brightness.
    Any,
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::Either => "either",
            Self::Any => "any",
        })
    }
}

/// Strip loader settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Channel normalization applied to every decoded strip.
    pub color: ColorMode,
}

impl LoadConfig {
    /// Default [`color`](Self::color).
    pub const DEFAULT_COLOR: ColorMode = ColorMode::Preserve;
}

/// Row profiler settings.
///
/// A row is safe to cut through when the standard deviation of its
/// color samples is at most `flatness_tolerance` and its mean
/// brightness satisfies the [`Background`] rule. Its score is
///
/// ```text
/// score = std_dev + extremity_weight * distance_from_background_extreme
/// ```
///
/// so lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Which gutters count as blank.
    pub background: Background,
    /// Minimum mean brightness (0-255) of a light gutter row.
    pub light_threshold: u8,
    /// Maximum mean brightness (0-255) of a dark gutter row.
    pub dark_threshold: u8,
    /// Maximum standard deviation of a flat row, in 8-bit levels.
    pub flatness_tolerance: f32,
    /// Weight of the brightness term in the row score.
    pub extremity_weight: f32,
}

impl ProfileConfig {
    /// Default [`background`](Self::background).
    pub const DEFAULT_BACKGROUND: Background = Background::Either;
    /// Default [`light_threshold`](Self::light_threshold).
    pub const DEFAULT_LIGHT_THRESHOLD: u8 = 245;
    /// Default [`dark_threshold`](Self::dark_threshold).
    pub const DEFAULT_DARK_THRESHOLD: u8 = 10;
    /// Default [`flatness_tolerance`](Self::flatness_tolerance).
    pub const DEFAULT_FLATNESS_TOLERANCE: f32 = 4.0;
    /// Default [`extremity_weight`](Self::extremity_weight).
    pub const DEFAULT_EXTREMITY_WEIGHT: f32 = 0.25;

    /// Check the profiler settings.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if a float setting is
    /// negative or not finite, or if `background` is
    /// [`Background::Either`] and the dark threshold is not below the
    /// light one.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.flatness_tolerance.is_finite() || self.flatness_tolerance < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "flatness_tolerance must be finite and non-negative, got {}",
                self.flatness_tolerance,
            )));
        }
        if !self.extremity_weight.is_finite() || self.extremity_weight < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "extremity_weight must be finite and non-negative, got {}",
                self.extremity_weight,
            )));
        }
        if self.background == Background::Either && self.dark_threshold >= self.light_threshold {
            return Err(PipelineError::InvalidConfig(format!(
                "dark_threshold ({}) must be below light_threshold ({})",
                self.dark_threshold, self.light_threshold,
            )));
        }
        Ok(())
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            background: Self::DEFAULT_BACKGROUND,
            light_threshold: Self::DEFAULT_LIGHT_THRESHOLD,
            dark_threshold: Self::DEFAULT_DARK_THRESHOLD,
            flatness_tolerance: Self::DEFAULT_FLATNESS_TOLERANCE,
            extremity_weight: Self::DEFAULT_EXTREMITY_WEIGHT,
        }
    }
}

/// Split selector settings. All heights are in canvas rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Preferred chunk height.
    pub target_height: u32,
    /// Smallest chunk a safe cut may produce.
    pub min_height: u32,
    /// Largest chunk any cut may produce. Forced cuts land here.
    pub max_height: u32,
    /// Width of each step of the outward search from the ideal row.
    pub search_radius: u32,
    /// Exact height of the first chunk, used for cover pages. At most
    /// `max_height`.
    pub cover_height: Option<u32>,
    /// Keep at least this many rows after the last cut when the
    /// window allows it. `0` disables the constraint.
    pub min_tail_height: u32,
}

impl SplitConfig {
    /// Default [`target_height`](Self::target_height).
    pub const DEFAULT_TARGET_HEIGHT: u32 = 1000;
    /// Default [`min_height`](Self::min_height).
    pub const DEFAULT_MIN_HEIGHT: u32 = 800;
    /// Default [`max_height`](Self::max_height).
    pub const DEFAULT_MAX_HEIGHT: u32 = 1400;
    /// Default [`search_radius`](Self::search_radius).
    pub const DEFAULT_SEARCH_RADIUS: u32 = 50;
    /// Default [`min_tail_height`](Self::min_tail_height).
    pub const DEFAULT_MIN_TAIL_HEIGHT: u32 = 0;

    /// Check the height constraints.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `min_height` is zero
    /// or exceeds `max_height`, if `target_height` lies outside
    /// `[min_height, max_height]`, if `search_radius` is zero, or if
    /// `cover_height` is set to zero or above `max_height`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.min_height == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_height must be at least 1".to_string(),
            ));
        }
        if self.min_height > self.max_height {
            return Err(PipelineError::InvalidConfig(format!(
                "min_height ({}) exceeds max_height ({})",
                self.min_height, self.max_height,
            )));
        }
        if !(self.min_height..=self.max_height).contains(&self.target_height) {
            return Err(PipelineError::InvalidConfig(format!(
                "target_height ({}) must lie within [{}, {}]",
                self.target_height, self.min_height, self.max_height,
            )));
        }
        if self.search_radius == 0 {
            return Err(PipelineError::InvalidConfig(
                "search_radius must be at least 1".to_string(),
            ));
        }
        if self.cover_height == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "cover_height must be at least 1 when set".to_string(),
            ));
        }
        if let Some(cover) = self.cover_height
            && cover > self.max_height
        {
            return Err(PipelineError::InvalidConfig(format!(
                "cover_height ({cover}) exceeds max_height ({})",
                self.max_height,
            )));
        }
        Ok(())
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            target_height: Self::DEFAULT_TARGET_HEIGHT,
            min_height: Self::DEFAULT_MIN_HEIGHT,
            max_height: Self::DEFAULT_MAX_HEIGHT,
            search_radius: Self::DEFAULT_SEARCH_RADIUS,
            cover_height: None,
            min_tail_height: Self::DEFAULT_MIN_TAIL_HEIGHT,
        }
    }
}

/// Complete configuration for processing one chapter.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterConfig {
    /// Strip loader settings.
    pub load: LoadConfig,
    /// Row profiler settings.
    pub profile: ProfileConfig,
    /// Split selector settings.
    pub split: SplitConfig,
}

impl ChapterConfig {
    /// Check every stage's settings.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// invalid setting found.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.profile.validate()?;
        self.split.validate()
    }
}
