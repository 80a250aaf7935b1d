//! Heading candidate ranking.
//!
//! Takes the frequency table, treats its first row as the body ("main")
//! style and sorts every strictly larger style into importance levels.
//!
//! ```text
//! StyleCount[]  ->  candidates  ->  score  ->  bucket  ->  monotonic fix  ->  LevelSet
//!                   size > main      size+freq  quantile    larger font
//!                   + min diff       weighted   or equal    never lower
//! ```
//!
//! Scoring blends normalized size with normalized frequency so that both a
//! one-off title in a huge font and a recurring, moderately larger section
//! style can reach the top levels.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::RankingOptions;
use crate::error::AnalysisError;
use crate::types::{PartialStyle, StyleCount};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// How scored candidates are split into levels before the monotonic pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucketing {
    /// Equal number of candidates per level, in score order.
    #[default]
    Quantile,
    /// Equal-width score intervals, highest scores in level 1.
    Equal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub size: f32,
    pub frequency: f32,
}

/// Parameters the ranking was produced with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingMeta {
    pub levels_count: usize,
    pub bucketing: Bucketing,
    pub min_size_diff: f32,
    pub weights: Weights,
    pub per_level_limit: Option<usize>,
    pub monotonic_by_size: bool,
}

impl RankingMeta {
    fn from_options(options: &RankingOptions) -> Self {
        RankingMeta {
            levels_count: options.levels,
            bucketing: options.bucketing,
            min_size_diff: options.min_size_diff,
            weights: Weights {
                size: options.size_weight,
                frequency: options.freq_weight,
            },
            per_level_limit: options.per_level_limit,
            monotonic_by_size: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelItem {
    pub style: PartialStyle,
    pub count: usize,
    pub size: Option<f32>,
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// One importance bucket. `level` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub level: usize,
    pub items: Vec<LevelItem>,
    pub total: usize,
}

/// Ranked heading styles, serializable as `{meta, levels}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSet {
    pub meta: RankingMeta,
    pub levels: Vec<Level>,
}

impl LevelSet {
    fn empty(options: &RankingOptions) -> Self {
        LevelSet {
            meta: RankingMeta::from_options(options),
            levels: (1..=options.levels)
                .map(|level| Level {
                    level,
                    items: Vec::new(),
                    total: 0,
                })
                .collect(),
        }
    }

    /// `true` when no level holds a style.
    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(|l| l.items.is_empty())
    }

    /// `(level, item)` pairs in level order, then item order.
    pub fn items(&self) -> impl Iterator<Item = (usize, &LevelItem)> {
        let mut levels: Vec<&Level> = self.levels.iter().collect();
        levels.sort_by_key(|l| l.level);
        levels
            .into_iter()
            .flat_map(|l| l.items.iter().map(move |item| (l.level, item)))
    }

    /// The first level whose style pattern `style` satisfies, scanning levels
    /// in ascending order. Levels above `upto` are ignored.
    pub fn resolve_level(
        &self,
        style: &PartialStyle,
        size_tolerance: f32,
        upto: Option<usize>,
    ) -> Option<usize> {
        self.items()
            .filter(|(level, _)| upto.map_or(true, |max| *level <= max))
            .find(|(_, item)| style.matches(&item.style, size_tolerance))
            .map(|(level, _)| level)
    }
}

/// Result of [`rank_heading_candidates`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    /// The most frequent style, `None` only for an empty frequency table.
    pub main_style: Option<PartialStyle>,
    pub level_set: LevelSet,
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

struct Candidate {
    style: PartialStyle,
    count: usize,
    size: f32,
    score: f64,
    level: usize,
}

/// Score order: score desc, size desc, font asc, color asc.
fn by_score(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(b.size.total_cmp(&a.size))
        .then_with(|| a.style.font.cmp(&b.style.font))
        .then_with(|| a.style.color.cmp(&b.style.color))
}

/// Rank the styles of `style_counts` into heading levels.
///
/// `style_counts` must be sorted by descending count, as produced by
/// [`count_styles`](crate::frequency::count_styles). Degenerate inputs (no
/// styles, a main style without a size, no candidate larger than the main
/// style) yield empty levels, never an error. Invalid options are rejected.
pub fn rank_heading_candidates(
    style_counts: &[StyleCount],
    options: &RankingOptions,
) -> Result<Ranking, AnalysisError> {
    options.validate()?;

    let Some(main) = style_counts.first() else {
        return Ok(Ranking {
            main_style: None,
            level_set: LevelSet::empty(options),
        });
    };
    let main_style = Some(main.style.clone());

    let Some(main_size) = main.style.size else {
        log::debug!("main style has no size; no heading levels");
        return Ok(Ranking {
            main_style,
            level_set: LevelSet::empty(options),
        });
    };

    let threshold = main_size + options.min_size_diff;
    let mut candidates: Vec<Candidate> = style_counts[1..]
        .iter()
        .filter_map(|sc| {
            let size = sc.style.size?;
            (size > threshold).then(|| Candidate {
                style: sc.style.clone(),
                count: sc.count,
                size,
                score: 0.0,
                level: 0,
            })
        })
        .collect();

    log::debug!(
        "main size {} -> {} heading candidates above {}",
        main_size,
        candidates.len(),
        threshold
    );

    if candidates.is_empty() {
        return Ok(Ranking {
            main_style,
            level_set: LevelSet::empty(options),
        });
    }

    score_candidates(&mut candidates, options);
    candidates.sort_by(by_score);
    assign_provisional_levels(&mut candidates, options);
    enforce_size_monotonicity(&mut candidates);

    Ok(Ranking {
        main_style,
        level_set: build_level_set(candidates, options),
    })
}

fn score_candidates(candidates: &mut [Candidate], options: &RankingOptions) {
    let weight_sum = f64::from(options.size_weight) + f64::from(options.freq_weight);
    let size_w = f64::from(options.size_weight) / weight_sum;
    let freq_w = f64::from(options.freq_weight) / weight_sum;

    let size_min = candidates.iter().map(|c| c.size).fold(f32::INFINITY, f32::min);
    let size_max = candidates.iter().map(|c| c.size).fold(f32::NEG_INFINITY, f32::max);
    let size_range = f64::from(size_max - size_min);
    let freq_max = candidates.iter().map(|c| c.count).max().unwrap_or(0) as f64;

    for c in candidates.iter_mut() {
        let size_norm = if size_range > 0.0 {
            f64::from(c.size - size_min) / size_range
        } else {
            0.0
        };
        let freq_norm = if freq_max > 0.0 {
            c.count as f64 / freq_max
        } else {
            0.0
        };
        c.score = size_w * size_norm + freq_w * freq_norm;
    }
}

/// 0-based provisional levels. `candidates` must be in score order.
fn assign_provisional_levels(candidates: &mut [Candidate], options: &RankingOptions) {
    let levels = options.levels;
    let n = candidates.len();

    match options.bucketing {
        Bucketing::Quantile => {
            for (i, c) in candidates.iter_mut().enumerate() {
                c.level = i * levels / n;
            }
        }
        Bucketing::Equal => {
            let s_max = candidates.first().map(|c| c.score).unwrap_or(0.0);
            let s_min = candidates.last().map(|c| c.score).unwrap_or(0.0);
            let range = s_max - s_min;
            for c in candidates.iter_mut() {
                c.level = if range > 0.0 {
                    let rel = (c.score - s_min) / range;
                    (((1.0 - rel) * levels as f64).floor() as usize).min(levels - 1)
                } else {
                    // Every score ties: nothing separates the candidates.
                    0
                };
            }
        }
    }
}

/// Walk candidates from the largest size down and push any candidate whose
/// level is more prominent than that of a strictly larger style down to that
/// level. Styles of equal size do not constrain each other.
fn enforce_size_monotonicity(candidates: &mut [Candidate]) {
    // Stable: equal sizes stay in score order.
    candidates.sort_by(|a, b| b.size.total_cmp(&a.size));

    let mut max_level_so_far = 0usize;
    let mut start = 0;
    while start < candidates.len() {
        let size = candidates[start].size;
        let end = candidates[start..]
            .iter()
            .position(|c| c.size != size)
            .map_or(candidates.len(), |off| start + off);

        let group = &mut candidates[start..end];
        for c in group.iter_mut() {
            c.level = c.level.max(max_level_so_far);
        }
        if let Some(top) = group.iter().map(|c| c.level).max() {
            max_level_so_far = max_level_so_far.max(top);
        }
        start = end;
    }
}

fn build_level_set(candidates: Vec<Candidate>, options: &RankingOptions) -> LevelSet {
    let mut buckets: Vec<Vec<Candidate>> = (0..options.levels).map(|_| Vec::new()).collect();
    for c in candidates {
        let idx = c.level.min(options.levels - 1);
        buckets[idx].push(c);
    }

    let levels = buckets
        .into_iter()
        .enumerate()
        .map(|(i, mut bucket)| {
            bucket.sort_by(by_score);
            if let Some(limit) = options.per_level_limit {
                bucket.truncate(limit);
            }
            let items: Vec<LevelItem> = bucket
                .into_iter()
                .map(|c| LevelItem {
                    font: c.style.font.clone(),
                    size: Some(c.size),
                    count: c.count,
                    score: options.include_scores.then_some(c.score),
                    style: c.style,
                })
                .collect();
            Level {
                level: i + 1,
                total: items.len(),
                items,
            }
        })
        .collect();

    LevelSet {
        meta: RankingMeta::from_options(options),
        levels,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
