//! Invariants that must hold for any chapter: tiling, determinism,
//! bounds and monotonic cuts, with and without the cover and tail
//! options.

#![allow(clippy::unwrap_used)]

use panelcut_pipeline::{
    Background, ChannelLayout, ChapterConfig, ChapterResult, CutKind, Pipeline, ProfileConfig,
    SplitConfig, Strip,
};

/// Deterministic xorshift generator.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, bound: u32) -> u32 {
        u32::try_from(self.next() % u64::from(bound)).unwrap()
    }
}

/// A luma strip mixing noisy rows with white and black gutters.
fn random_strip(rng: &mut Rng, index: usize, width: u32) -> Strip {
    let height = 50 + rng.below(400);
    let mut data = Vec::with_capacity((width * height) as usize);
    let mut y = 0;
    while y < height {
        let run = (1 + rng.below(60)).min(height - y);
        let kind = rng.below(4);
        for _ in 0..run {
            for _ in 0..width {
                let value = match kind {
                    0 => 255,
                    1 => 0,
                    _ => u8::try_from(rng.below(256)).unwrap(),
                };
                data.push(value);
            }
        }
        y += run;
    }
    Strip::new(index, width, height, ChannelLayout::Luma, data).unwrap()
}

fn random_chapter(seed: u64) -> Vec<Strip> {
    let mut rng = Rng(seed);
    let width = 8 + rng.below(24);
    let count = 1 + rng.below(8) as usize;
    (0..count).map(|i| random_strip(&mut rng, i, width)).collect()
}

fn run(strips: Vec<Strip>, config: ChapterConfig) -> ChapterResult {
    Pipeline::from_strips(strips, config)
        .unwrap()
        .stitch()
        .unwrap()
        .profile()
        .split()
        .unwrap()
        .into_result()
}

fn configs() -> Vec<ChapterConfig> {
    let split = |target, min, max| SplitConfig {
        target_height: target,
        min_height: min,
        max_height: max,
        search_radius: 16,
        ..SplitConfig::default()
    };
    vec![
        ChapterConfig {
            split: split(300, 200, 400),
            ..ChapterConfig::default()
        },
        ChapterConfig {
            profile: ProfileConfig {
                background: Background::Light,
                ..ProfileConfig::default()
            },
            split: split(150, 100, 250),
            ..ChapterConfig::default()
        },
        ChapterConfig {
            profile: ProfileConfig {
                background: Background::Dark,
                ..ProfileConfig::default()
            },
            split: SplitConfig {
                min_tail_height: 120,
                ..split(500, 250, 600)
            },
            ..ChapterConfig::default()
        },
    ]
}

/// Split settings drawn at random, with the tail and cover options
/// switched on about half the time.
fn random_config(seed: u64) -> ChapterConfig {
    let mut rng = Rng(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1);
    let min = 20 + rng.below(300);
    let max = min + rng.below(400);
    let target = min + rng.below(max - min + 1);
    ChapterConfig {
        split: SplitConfig {
            target_height: target,
            min_height: min,
            max_height: max,
            search_radius: 1 + rng.below(40),
            min_tail_height: if rng.below(2) == 0 { 0 } else { rng.below(max + 1) },
            cover_height: (rng.below(2) == 0).then(|| 1 + rng.below(max)),
        },
        ..ChapterConfig::default()
    }
}

#[test]
fn chunks_tile_the_canvas() {
    for seed in 1..=25 {
        for config in configs() {
            let result = run(random_chapter(seed), config);
            let canvas = result.canvas();

            let mut next_row = 0;
            let mut joined = Vec::with_capacity(canvas.as_raw().len());
            for chunk in result.chunks() {
                assert_eq!(chunk.start(), next_row, "gap or overlap (seed {seed})");
                assert!(chunk.height() >= 1);
                next_row = chunk.end();
                joined.extend_from_slice(chunk.pixels());
            }
            assert_eq!(next_row, canvas.height());
            assert_eq!(joined, canvas.as_raw());
        }
    }
}

#[test]
fn chunk_heights_respect_bounds() {
    for seed in 100..=130 {
        for config in configs().into_iter().chain([random_config(seed)]) {
            let result = run(random_chapter(seed), config);
            let cuts = result.plan().cuts();
            let chunks: Vec<_> = result.chunks().collect();
            for (i, chunk) in chunks.iter().enumerate() {
                assert!(
                    chunk.height() <= config.split.max_height,
                    "chunk {i} of seed {seed} is {} rows",
                    chunk.height(),
                );
                let ends_on_safe_cut = cuts.get(i).is_some_and(|c| c.kind == CutKind::Safe);
                if ends_on_safe_cut {
                    assert!(chunk.height() >= config.split.min_height);
                }
            }
        }
    }
}

#[test]
fn cut_rows_strictly_increase() {
    for seed in 200..=230 {
        for config in configs() {
            let result = run(random_chapter(seed), config);
            let rows: Vec<u32> = result.plan().rows().collect();
            assert!(rows.windows(2).all(|w| w[0] < w[1]));
            assert!(rows.iter().all(|&r| r > 0 && r < result.canvas().height()));
        }
    }
}

#[test]
fn repeated_runs_are_identical() {
    for seed in [7, 8, 9] {
        for config in configs() {
            let first = run(random_chapter(seed), config);
            let second = run(random_chapter(seed), config);
            assert_eq!(first.canvas().as_raw(), second.canvas().as_raw());
            assert_eq!(first.plan(), second.plan());
            assert_eq!(first, second);
        }
    }
}

#[test]
fn forced_cuts_only_without_safe_rows_in_window() {
    for seed in 300..=330 {
        for config in configs().into_iter().chain([random_config(seed)]) {
            let result = run(random_chapter(seed), config);
            let profile = result.row_profile();
            let mut cursor = 0;
            for cut in result.plan().cuts() {
                if cut.kind == CutKind::Forced {
                    let window =
                        cursor + config.split.min_height..=cursor + config.split.max_height;
                    assert!(
                        !window.clone().any(|row| profile.is_safe(row)),
                        "seed {seed}: forced cut at {} with a safe row in {window:?} ({:?})",
                        cut.row,
                        config.split,
                    );
                }
                cursor = cut.row;
            }
        }
    }
}

#[test]
fn cover_chunk_has_the_configured_height() {
    for seed in 400..=430 {
        let config = random_config(seed);
        let result = run(random_chapter(seed), config);
        let Some(cover) = config.split.cover_height else {
            continue;
        };
        let first = result.chunks().next().unwrap();
        if cover < result.canvas().height() {
            assert_eq!(first.height(), cover, "seed {seed}");
            assert_eq!(result.plan().cuts()[0].kind, CutKind::Cover);
        } else {
            assert_eq!(first.height(), result.canvas().height());
        }
    }
}
