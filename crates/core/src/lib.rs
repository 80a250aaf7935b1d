//! Core library for docstyle
//!
//! This crate is the **Functional Core** of the structural analysis pipeline:
//! it turns the positioned text spans of a PDF extractor into a style
//! frequency table, ranked heading levels and a header detector. Text
//! similarity lives in `docstyle_matching`; nothing here depends on it.
//!
//! # Pipeline
//!
//! ```text
//! JSON ─▶ parse_spans ─▶ Span[] ─┬─▶ count_styles ─▶ StyleCount[]
//!                                │        │
//!                                │        ▼
//!                                │   rank_heading_candidates ─▶ LevelSet ─▶ HeaderDetector
//!                                │
//!                                └─▶ merge_adjacent ─▶ Segment[]
//! ```
//!
//! All functions are pure and deterministic: the same spans and the same
//! [`AnalysisConfig`] always produce the same output, in the same order.
//!
//! # Module Organization
//!
//! - [`types`]: spans, styles, segments and the frequency row
//! - [`spans`]: lenient span parsing and page/block helpers
//! - [`merge`]: span-to-line merging
//! - [`frequency`]: style frequency counting
//! - [`ranking`]: heading level ranking
//! - [`detector`]: header lookup for individual spans
//! - [`config`]: tunables for every stage
//! - [`error`]: error types
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use docstyle_core::{analyze_spans, parse_spans, AnalysisConfig, HeaderDetector};
//!
//! let report = parse_spans(&json)?;
//! let config = AnalysisConfig::default();
//! let analysis = analyze_spans(&report.spans, &config)?;
//!
//! let detector = HeaderDetector::from_level_set(&analysis.level_set, None, &config.detector)?;
//! for span in &report.spans {
//!     println!("{} {}", detector.header_id(span), span.text);
//! }
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod frequency;
pub mod merge;
pub mod ranking;
pub mod spans;
pub mod types;

use serde::{Deserialize, Serialize};

pub use config::{
    AnalysisConfig, DetectorOptions, FrequencyOptions, MatchOptions, MergeOptions, RankingOptions,
};
pub use detector::{header_for_level, HeaderDetector, HeaderRule, DEFAULT_LEVEL_HEADERS};
pub use error::{AnalysisError, MalformedSpan};
pub use frequency::{count_styles, main_text_properties};
pub use merge::{merge_adjacent, single_span_segments, sorted_text_spans};
pub use ranking::{
    rank_heading_candidates, Bucketing, Level, LevelItem, LevelSet, Ranking, RankingMeta, Weights,
};
pub use spans::{
    join_block_spans, normalize_spaces, parse_spans, sort_spans_by_page, split_spans_at_page,
    spans_from_values,
};
pub use types::{
    BBox, Color, PartialStyle, Segment, Span, SpanParseReport, Style, StyleCount, StyleKey,
    StyleSignature, DEFAULT_STYLE_KEYS,
};

/// Output of [`analyze_spans`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub style_counts: Vec<StyleCount>,
    pub main_style: Option<PartialStyle>,
    pub level_set: LevelSet,
}

/// Count styles and rank heading candidates in one call.
pub fn analyze_spans(
    spans: &[Span],
    config: &AnalysisConfig,
) -> Result<DocumentAnalysis, AnalysisError> {
    config.validate()?;

    let style_counts = count_styles(spans, &config.frequency)?;
    let ranking = rank_heading_candidates(&style_counts, &config.ranking)?;

    if let Some(main) = &ranking.main_style {
        log::debug!(
            "main style: font={:?} size={:?} color={:?}",
            main.font,
            main.size,
            main.color.map(|c| c.to_hex())
        );
    }

    Ok(DocumentAnalysis {
        style_counts,
        main_style: ranking.main_style,
        level_set: ranking.level_set,
    })
}
