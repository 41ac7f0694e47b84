//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! [`process_with_diagnostics`] runs the typed pipeline and records how
//! long each stage took and what it produced. Timestamps come from a
//! caller-supplied [`Clock`], so the crate itself never reads the
//! system time.
//!
//! Durations are serialized as fractional seconds (`f64`) since
//! `std::time::Duration` does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkInfo;
use crate::config::{Background, ChapterConfig};
use crate::pipeline::{ChapterResult, Pipeline, PipelineStage};
use crate::types::{ChannelLayout, PipelineError};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: strip decoding.
    pub load: StageDiagnostics,
    /// Stage 2: canvas stitching.
    pub stitch: StageDiagnostics,
    /// Stage 3: row profiling.
    pub profile: StageDiagnostics,
    /// Stage 4: cut selection.
    pub split: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the result.
    pub summary: ChapterSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Encoded input, before decoding.
    Source {
        /// Number of strip sources.
        strip_count: usize,
        /// Total size of the encoded sources.
        input_bytes: usize,
    },
    /// Strip decoding metrics.
    Load {
        /// Number of decoded strips.
        strip_count: usize,
        /// Total size of the encoded sources.
        input_bytes: usize,
        /// Shared strip width in pixels.
        width: u32,
        /// Shared channel layout, `None` when there are no strips.
        layout: Option<ChannelLayout>,
        /// Shortest strip height.
        min_strip_height: u32,
        /// Tallest strip height.
        max_strip_height: u32,
    },
    /// Canvas stitching metrics.
    Stitch {
        /// Canvas width in pixels.
        width: u32,
        /// Canvas height in rows.
        height: u32,
        /// Number of stitched strips.
        strip_count: usize,
        /// Size of the canvas buffer.
        canvas_bytes: usize,
    },
    /// Row profiling metrics.
    Profile {
        /// Background rule used for classification.
        background: Background,
        /// Number of profiled rows.
        rows: usize,
        /// Number of rows classified as safe.
        safe_rows: usize,
        /// Number of runs of consecutive safe rows.
        safe_bands: usize,
    },
    /// Cut selection metrics.
    Split {
        /// Number of cuts.
        cut_count: usize,
        /// Number of cuts made by the forced fallback.
        forced_cuts: usize,
        /// Whether the first cut is a cover cut.
        cover_cut: bool,
        /// Number of chunks.
        chunk_count: usize,
        /// Shortest chunk height.
        min_chunk_height: u32,
        /// Tallest chunk height.
        max_chunk_height: u32,
    },
}

/// High-level summary of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterSummary {
    /// Number of input strips.
    pub strip_count: usize,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in rows.
    pub height: u32,
    /// Number of rows classified as safe.
    pub safe_rows: usize,
    /// Number of forced cuts.
    pub forced_cuts: usize,
    /// Every chunk, top to bottom.
    pub chunks: Vec<ChunkInfo>,
}

impl ChapterSummary {
    /// Summarize a finished pipeline run.
    #[must_use]
    pub fn of(result: &ChapterResult) -> Self {
        let canvas = result.canvas();
        Self {
            strip_count: canvas.strip_rows().len(),
            width: canvas.width(),
            height: canvas.height(),
            safe_rows: result.row_profile().safe_count(),
            forced_cuts: result.plan().forced_count(),
            chunks: result.chunks().map(|c| c.info()).collect(),
        }
    }
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Canvas: {}x{} from {} strips",
            self.summary.width, self.summary.height, self.summary.strip_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<12} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Load", &self.load),
            ("Stitch", &self.stitch),
            ("Profile", &self.profile),
            ("Split", &self.split),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<12} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!("{:<8} {:>8} {:>8} {:>8}  {}", "Chunk", "Start", "End", "Height", "Cuts"));
        for chunk in &self.summary.chunks {
            let flag = if chunk.forced_unsafe_cut { "forced" } else { "" };
            lines.push(format!(
                "{:<8} {:>8} {:>8} {:>8}  {flag}",
                chunk.index, chunk.start, chunk.end, chunk.height,
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Safe rows: {}  |  Chunks: {}  |  Forced cuts: {}",
            self.summary.safe_rows,
            self.summary.chunks.len(),
            self.summary.forced_cuts,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Source {
            strip_count,
            input_bytes,
        } => format!("{strip_count} sources, {input_bytes} bytes"),
        StageMetrics::Load {
            strip_count,
            input_bytes,
            width,
            layout,
            min_strip_height,
            max_strip_height,
        } => {
            let layout = layout.map_or_else(|| "-".to_string(), |l| l.to_string());
            format!(
                "{input_bytes} bytes -> {strip_count} strips {width}px {layout} (h {min_strip_height}..={max_strip_height})",
            )
        }
        StageMetrics::Stitch {
            width,
            height,
            strip_count,
            canvas_bytes,
        } => format!("{strip_count} strips -> {width}x{height} ({canvas_bytes} bytes)"),
        StageMetrics::Profile {
            background,
            rows,
            safe_rows,
            safe_bands,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let pct = if *rows > 0 {
                *safe_rows as f64 / *rows as f64 * 100.0
            } else {
                0.0
            };
            format!("{background}: {safe_rows}/{rows} safe ({pct:.1}%) in {safe_bands} bands")
        }
        StageMetrics::Split {
            cut_count,
            forced_cuts,
            cover_cut,
            chunk_count,
            min_chunk_height,
            max_chunk_height,
        } => {
            let cover = if *cover_cut { " +cover" } else { "" };
            format!(
                "{cut_count} cuts ({forced_cuts} forced){cover} -> {chunk_count} chunks (h {min_chunk_height}..={max_chunk_height})",
            )
        }
    }
}

/// Run the full pipeline, timing each stage with `clock`.
///
/// # Errors
///
/// Returns the first [`PipelineError`] of any stage.
pub fn process_with_diagnostics<C: Clock>(
    sources: Vec<Vec<u8>>,
    config: &ChapterConfig,
    clock: &C,
) -> Result<(ChapterResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();

    let t = clock.now();
    let loaded = Pipeline::new(sources, *config).load()?;
    let load = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: loaded.metrics(),
    };

    let t = clock.now();
    let stitched = loaded.stitch()?;
    let stitch = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: stitched.metrics(),
    };

    let t = clock.now();
    let profiled = stitched.profile();
    let profile = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: profiled.metrics(),
    };

    let t = clock.now();
    let planned = profiled.split()?;
    let split = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: planned.metrics(),
    };

    let result = planned.into_result();
    let total_duration = clock.elapsed(&start);
    let summary = ChapterSummary::of(&result);

    Ok((
        result,
        PipelineDiagnostics {
            load,
            stitch,
            profile,
            split,
            total_duration,
            summary,
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::config::SplitConfig;

    /// Clock that advances one millisecond every time it is read.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn white_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::GrayImage::from_pixel(width, height, image::Luma([255]));
        let mut buf = Vec::new();
        img.write_with_encoder(image::codecs::png::PngEncoder::new(&mut buf))
            .unwrap();
        buf
    }

    fn config() -> ChapterConfig {
        ChapterConfig {
            split: SplitConfig {
                target_height: 50,
                min_height: 30,
                max_height: 70,
                ..SplitConfig::default()
            },
            ..ChapterConfig::default()
        }
    }

    #[test]
    fn collects_every_stage() {
        let clock = TickClock(Cell::new(0));
        let sources = vec![white_png(4, 60), white_png(4, 60)];
        let (result, diagnostics) = process_with_diagnostics(sources, &config(), &clock).unwrap();

        assert!(matches!(
            diagnostics.load.metrics,
            StageMetrics::Load { strip_count: 2, .. }
        ));
        assert!(matches!(
            diagnostics.stitch.metrics,
            StageMetrics::Stitch { height: 120, .. }
        ));
        assert!(matches!(
            diagnostics.profile.metrics,
            StageMetrics::Profile { safe_rows: 120, .. }
        ));
        assert!(matches!(
            diagnostics.split.metrics,
            StageMetrics::Split { cut_count: 1, forced_cuts: 0, .. }
        ));
        assert_eq!(diagnostics.summary.chunks.len(), result.plan().chunk_count());
        assert!(diagnostics.total_duration >= diagnostics.load.duration);
        assert!(diagnostics.load.duration > Duration::ZERO);
    }

    #[test]
    fn errors_propagate() {
        let clock = TickClock(Cell::new(0));
        let result = process_with_diagnostics(Vec::new(), &config(), &clock);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn report_lists_stages_and_chunks() {
        let clock = TickClock(Cell::new(0));
        let (_, diagnostics) =
            process_with_diagnostics(vec![white_png(4, 150)], &config(), &clock).unwrap();
        let report = diagnostics.report();
        for needle in ["Load", "Stitch", "Profile", "Split", "Chunks: 3", "Canvas: 4x150"] {
            assert!(report.contains(needle), "missing {needle:?} in\n{report}");
        }
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let clock = TickClock(Cell::new(0));
        let (_, diagnostics) =
            process_with_diagnostics(vec![white_png(2, 10)], &config(), &clock).unwrap();
        let json = serde_json::to_value(&diagnostics).unwrap();
        assert!(json["total_duration"].is_f64());
        assert!(json["split"]["metrics"]["Split"]["chunk_count"].is_u64());

        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        let drift = back.total_duration.as_secs_f64() - diagnostics.total_duration.as_secs_f64();
        assert!(drift.abs() < 1e-9);
    }
}
