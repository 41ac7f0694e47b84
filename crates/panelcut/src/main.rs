//! panelcut: re-chunk a webcomic chapter along its blank gutters.
//!
//! Stitches the given strips in order into one tall canvas, profiles
//! every row, and writes the canvas back out as chunks cut through
//! blank space between panels.
//!
//! # Usage
//!
//! ```text
//! panelcut [OPTIONS] <STRIPS>...
//! panelcut --out 'out/ch12_%03i.png' --max-height 1600 ch12/*.jpg
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser, ValueEnum};
use panelcut_export::OutputPattern;
use panelcut_pipeline::diagnostics::{Clock, process_with_diagnostics};
use panelcut_pipeline::{ChapterConfig, LoadConfig, PipelineError, ProfileConfig, SplitConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stitch webcomic strips and re-split them in the blank space between
/// panels.
///
/// Strips are stacked in the order given. Cuts land on the flat,
/// near-white or near-black row closest to the target height within
/// [min-height, max-height]. When no such row exists the chunk is cut
/// at max-height and a warning is logged.
#[derive(Parser)]
#[command(name = "panelcut", version)]
struct Cli {
    /// Strip images in reading order (PNG, JPEG, BMP, WebP).
    #[arg(required = true)]
    strips: Vec<PathBuf>,

    /// Brightness threshold shortcut: above 127 cuts on light rows at
    /// least this bright, 127 or below cuts on dark rows at most this
    /// bright.
    #[arg(long, conflicts_with_all = ["background", "light_threshold", "dark_threshold"])]
    threshold: Option<u8>,

    /// Which gutters count as blank [default: either].
    #[arg(long, value_enum)]
    background: Option<BackgroundArg>,

    /// Minimum mean brightness of a light gutter row.
    #[arg(long, default_value_t = ProfileConfig::DEFAULT_LIGHT_THRESHOLD)]
    light_threshold: u8,

    /// Maximum mean brightness of a dark gutter row.
    #[arg(long, default_value_t = ProfileConfig::DEFAULT_DARK_THRESHOLD)]
    dark_threshold: u8,

    /// Maximum standard deviation of a blank row.
    #[arg(long, default_value_t = ProfileConfig::DEFAULT_FLATNESS_TOLERANCE)]
    flatness_tolerance: f32,

    /// Weight of the distance from pure white/black in the row score.
    #[arg(long, default_value_t = ProfileConfig::DEFAULT_EXTREMITY_WEIGHT)]
    extremity_weight: f32,

    /// Preferred chunk height in pixels.
    #[arg(long, default_value_t = SplitConfig::DEFAULT_TARGET_HEIGHT)]
    target_height: u32,

    /// Minimum height of a chunk ending on a blank row.
    #[arg(long, default_value_t = SplitConfig::DEFAULT_MIN_HEIGHT)]
    min_height: u32,

    /// Hard maximum chunk height.
    #[arg(long, default_value_t = SplitConfig::DEFAULT_MAX_HEIGHT)]
    max_height: u32,

    /// Rows examined per step of the search around the target.
    #[arg(long, default_value_t = SplitConfig::DEFAULT_SEARCH_RADIUS)]
    search_radius: u32,

    /// Exact height of the first chunk (e.g. a cover page).
    #[arg(long)]
    cover_height: Option<u32>,

    /// Avoid leaving a last chunk shorter than this when possible.
    #[arg(long, default_value_t = SplitConfig::DEFAULT_MIN_TAIL_HEIGHT)]
    min_tail_height: u32,

    /// Channel normalization of decoded strips.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_COLOR)]
    color: ColorArg,

    /// Output file pattern; %i or %d is replaced by the chunk number,
    /// optionally zero-padded as in %03i. The extension picks the format.
    #[arg(long, default_value = OutputPattern::DEFAULT)]
    out: OutputPattern,

    /// Also write the stitched canvas, with the number replaced by "all".
    #[arg(long)]
    save_merged: bool,

    /// Compute the cuts without writing any file.
    #[arg(long)]
    dry_run: bool,

    /// Print diagnostics as JSON on stdout.
    #[arg(long, conflicts_with = "report")]
    json: bool,

    /// Print a human-readable diagnostics report on stdout.
    #[arg(long)]
    report: bool,

    /// Full chapter config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `ChapterConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// More log output (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Less log output (-q warnings, -qq errors only).
    #[arg(short, long, action = ArgAction::Count)]
    quiet: u8,
}

/// Gutter background selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackgroundArg {
    /// Near-white gutters.
    Light,
    /// Near-black gutters.
    Dark,
    /// Near-white or near-black gutters.
    Either,
    /// Any flat row.
    Any,
}

impl From<BackgroundArg> for panelcut_pipeline::Background {
    fn from(arg: BackgroundArg) -> Self {
        match arg {
            BackgroundArg::Light => Self::Light,
            BackgroundArg::Dark => Self::Dark,
            BackgroundArg::Either => Self::Either,
            BackgroundArg::Any => Self::Any,
        }
    }
}

/// Channel normalization selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ColorArg {
    /// Keep each strip's own layout; all strips must match.
    Preserve,
    /// Convert every strip to RGB.
    Rgb,
    /// Convert every strip to RGBA.
    Rgba,
}

/// Maps a [`panelcut_pipeline::ColorMode`] to the local CLI [`ColorArg`] enum.
const fn color_from_pipeline(mode: panelcut_pipeline::ColorMode) -> ColorArg {
    match mode {
        panelcut_pipeline::ColorMode::Preserve => ColorArg::Preserve,
        panelcut_pipeline::ColorMode::Rgb => ColorArg::Rgb,
        panelcut_pipeline::ColorMode::Rgba => ColorArg::Rgba,
    }
}

/// The CLI default color mode, derived from the pipeline default.
const CLI_DEFAULT_COLOR: ColorArg = color_from_pipeline(LoadConfig::DEFAULT_COLOR);

/// Build a [`ChapterConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<ChapterConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let mut profile = ProfileConfig {
        background: cli
            .background
            .map_or(ProfileConfig::DEFAULT_BACKGROUND, Into::into),
        light_threshold: cli.light_threshold,
        dark_threshold: cli.dark_threshold,
        flatness_tolerance: cli.flatness_tolerance,
        extremity_weight: cli.extremity_weight,
    };
    if let Some(threshold) = cli.threshold {
        if threshold > 127 {
            profile.background = panelcut_pipeline::Background::Light;
            profile.light_threshold = threshold;
        } else {
            profile.background = panelcut_pipeline::Background::Dark;
            profile.dark_threshold = threshold;
        }
    }

    Ok(ChapterConfig {
        load: LoadConfig {
            color: match cli.color {
                ColorArg::Preserve => panelcut_pipeline::ColorMode::Preserve,
                ColorArg::Rgb => panelcut_pipeline::ColorMode::Rgb,
                ColorArg::Rgba => panelcut_pipeline::ColorMode::Rgba,
            },
        },
        profile,
        split: SplitConfig {
            target_height: cli.target_height,
            min_height: cli.min_height,
            max_height: cli.max_height,
            search_radius: cli.search_radius,
            cover_height: cli.cover_height,
            min_tail_height: cli.min_tail_height,
        },
    })
}

/// Default log filter for the given `-v`/`-q` counts.
const fn log_level(verbose: u8, quiet: u8) -> &'static str {
    match (verbose, quiet) {
        (0, 0) => "info",
        (1, _) => "debug",
        (2.., _) => "trace",
        (_, 1) => "warn",
        (_, _) => "error",
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(verbose, quiet)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Render a pipeline error, naming the input file for per-strip errors.
fn describe_error(err: &PipelineError, strips: &[PathBuf]) -> String {
    let index = match err {
        PipelineError::Format { index, .. } | PipelineError::DimensionMismatch { index, .. } => {
            Some(*index)
        }
        _ => None,
    };
    match index.and_then(|i| strips.get(i)) {
        Some(path) => format!("Error: {err} ({})", path.display()),
        None => format!("Error: {err}"),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let format = match cli.out.format() {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut sources = Vec::with_capacity(cli.strips.len());
    for path in &cli.strips {
        match std::fs::read(path) {
            Ok(bytes) => sources.push(bytes),
            Err(e) => {
                eprintln!("Error reading {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }
    info!(strips = sources.len(), "read strip files");

    let (result, diagnostics) = match process_with_diagnostics(sources, &config, &StdClock) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", describe_error(&e, &cli.strips));
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing diagnostics: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else if cli.report {
        println!("{}", diagnostics.report());
    }

    if cli.dry_run {
        info!(
            chunks = result.plan().chunk_count(),
            "dry run, no files written"
        );
        return ExitCode::SUCCESS;
    }

    let files = match output::encode_chapter(&result, &cli.out, format, cli.save_merged) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = output::write_all(&files) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
