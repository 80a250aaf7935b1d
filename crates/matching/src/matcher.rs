//! Heading-text matcher.
//!
//! Resolves proposed heading strings (from an upstream proposer, no position
//! attached) to concrete segments whose style belongs to a ranked level.
//!
//! ```text
//! Span[] ─▶ segments ─▶ segments with a ranked style ─┐
//!                                                      ├─▶ encode ─▶ cosine ─▶ select
//! headings ────────────────────────────────────────────┘
//! ```
//!
//! Selection has two modes. With `deduplicate_segments` each heading takes
//! its single best segment and that segment is consumed. Without it each
//! heading keeps its best segment per distinct style signature, and
//! segments can be shared between headings.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use docstyle_core::{
    merge_adjacent, single_span_segments, LevelSet, MatchOptions, PartialStyle, Segment, Span,
};
use serde::{Deserialize, Serialize};

use crate::encoder::{cosine, TextEncoder};
use crate::error::MatchError;
use crate::normalize::normalize_heading_text;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchLocation {
    pub level: usize,
    pub page_number: u32,
    pub block_index: u32,
}

/// A proposed heading resolved to a styled position in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingMatch {
    pub heading: String,
    pub style: PartialStyle,
    pub location: MatchLocation,
    /// Text of the matched segment.
    pub text: String,
    pub score: f32,
}

struct Eligible {
    segment: Segment,
    level: usize,
    normalized: String,
}

struct Scored {
    index: usize,
    score: f32,
    level: usize,
    size: f32,
}

/// Score desc, level asc, size desc, then segment order.
fn by_preference(a: &Scored, b: &Scored) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.level.cmp(&b.level))
        .then(b.size.total_cmp(&a.size))
        .then(a.index.cmp(&b.index))
}

/// Match each heading in `headings` against styled segments of `spans`.
///
/// Results follow heading order. A heading without any segment scoring at
/// least `min_similarity` produces no rows. Empty headings and empty segment
/// texts never match. Fails on invalid options, on an encoder error, or when
/// the encoder returns malformed vectors.
pub fn match_headings_to_styles<H: AsRef<str>>(
    spans: &[Span],
    level_set: &LevelSet,
    headings: &[H],
    options: &MatchOptions,
    encoder: &dyn TextEncoder,
) -> Result<Vec<HeadingMatch>, MatchError> {
    options.validate()?;

    let segments = if options.merge_before {
        merge_adjacent(spans, &options.style_keys, &options.merge_options())?
    } else {
        single_span_segments(spans, &options.style_keys)
    };
    let total_segments = segments.len();

    let eligible: Vec<Eligible> = segments
        .into_iter()
        .filter_map(|segment| {
            let level = level_set.resolve_level(
                &segment.style,
                options.size_tolerance,
                options.use_levels_upto,
            )?;
            let normalized = normalize_heading_text(&segment.text);
            Some(Eligible {
                segment,
                level,
                normalized,
            })
        })
        .collect();

    log::debug!(
        "{} of {} segments carry a ranked heading style",
        eligible.len(),
        total_segments
    );

    if eligible.is_empty() || headings.is_empty() {
        return Ok(Vec::new());
    }

    let normalized_headings: Vec<String> = headings
        .iter()
        .map(|h| normalize_heading_text(h.as_ref()))
        .collect();

    let mut texts: Vec<&str> = normalized_headings.iter().map(String::as_str).collect();
    texts.extend(eligible.iter().map(|e| e.normalized.as_str()));

    let vectors = encoder.encode(&texts)?;
    check_vectors(&vectors, texts.len())?;
    let (heading_vectors, segment_vectors) = vectors.split_at(headings.len());

    let mut consumed = vec![false; eligible.len()];
    let mut matches = Vec::new();

    for (h, heading) in headings.iter().enumerate() {
        if normalized_headings[h].is_empty() {
            continue;
        }

        let mut scored: Vec<Scored> = eligible
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.normalized.is_empty())
            .filter(|(i, _)| !(options.deduplicate_segments && consumed[*i]))
            .filter_map(|(i, e)| {
                let score = cosine(&heading_vectors[h], &segment_vectors[i]);
                (score >= options.min_similarity && score > 0.0).then(|| Scored {
                    index: i,
                    score,
                    level: e.level,
                    size: e.segment.style.size.unwrap_or(0.0),
                })
            })
            .collect();
        scored.sort_by(by_preference);

        let before = matches.len();
        if options.deduplicate_segments {
            if let Some(best) = scored.first() {
                consumed[best.index] = true;
                matches.push(make_match(heading.as_ref(), &eligible[best.index], best.score));
            }
        } else {
            let mut seen = BTreeSet::new();
            for s in &scored {
                let e = &eligible[s.index];
                if seen.insert(e.segment.style.signature(&options.style_keys)) {
                    matches.push(make_match(heading.as_ref(), e, s.score));
                }
            }
        }

        log::debug!(
            "heading {:?}: {} candidates, {} matches",
            heading.as_ref(),
            scored.len(),
            matches.len() - before
        );
    }

    Ok(matches)
}

fn check_vectors(vectors: &[Vec<f32>], expected: usize) -> Result<(), MatchError> {
    if vectors.len() != expected {
        return Err(MatchError::DimensionMismatch {
            expected,
            found: vectors.len(),
        });
    }
    if let Some(first) = vectors.first() {
        let dims = first.len();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(MatchError::DimensionMismatch {
                expected: dims,
                found: bad.len(),
            });
        }
    }
    Ok(())
}

fn make_match(heading: &str, eligible: &Eligible, score: f32) -> HeadingMatch {
    HeadingMatch {
        heading: heading.to_string(),
        style: eligible.segment.style.clone(),
        location: MatchLocation {
            level: eligible.level,
            page_number: eligible.segment.page_number,
            block_index: eligible.segment.block_index,
        },
        text: eligible.segment.text.clone(),
        score,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use docstyle_core::{analyze_spans, AnalysisConfig, BBox, Color};
    use serde_json::json;

    use super::*;
    use crate::encoder::{EncoderCell, NgramEncoder};
    use crate::error::EncoderError;

    /// Returns fixed vectors per normalized text, zero for unknown texts.
    struct StubEncoder {
        table: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl StubEncoder {
        fn new(entries: &[(&str, [f32; 2])]) -> Self {
            StubEncoder {
                table: entries
                    .iter()
                    .map(|(text, v)| (text.to_string(), v.to_vec()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextEncoder for StubEncoder {
        fn name(&self) -> &str {
            "stub"
        }

        fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| self.table.get(*t).cloned().unwrap_or_else(|| vec![0.0, 0.0]))
                .collect())
        }
    }

    /// Returns one vector too few.
    struct ShortEncoder;

    impl TextEncoder for ShortEncoder {
        fn name(&self) -> &str {
            "short"
        }

        fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0]).collect())
        }
    }

    fn make_span(text: &str, size: f32, y: f32, page: u32, block: u32) -> Span {
        Span {
            text: text.to_string(),
            font: "Arial".to_string(),
            size,
            color: Color::BLACK,
            bbox: BBox::new(0.0, y, 200.0, y + size),
            page_number: page,
            block_index: block,
        }
    }

    /// Body text at 10pt plus the given heading spans.
    fn make_document(headings: &[Span]) -> (Vec<Span>, LevelSet) {
        let mut spans = headings.to_vec();
        for i in 0..20 {
            spans.push(make_span("Body text here.", 10.0, 300.0 + i as f32 * 15.0, 1, 50 + i));
        }
        let analysis = analyze_spans(&spans, &AnalysisConfig::default()).unwrap();
        (spans, analysis.level_set)
    }

    fn ngram() -> NgramEncoder {
        NgramEncoder::default()
    }

    #[test]
    fn test_exact_heading_matches_once() {
        let (spans, levels) = make_document(&[make_span("Myocarditis", 18.0, 50.0, 1, 0)]);
        let matches = match_headings_to_styles(
            &spans,
            &levels,
            &["MYOCARDITIS"],
            &MatchOptions::default(),
            &ngram(),
        )
        .unwrap();

        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.heading, "MYOCARDITIS");
        assert_eq!(m.text, "Myocarditis");
        assert_eq!(
            m.location,
            MatchLocation {
                level: 1,
                page_number: 1,
                block_index: 0
            }
        );
        assert_eq!(m.style.size, Some(18.0));
        assert!(m.score > 0.99);
    }

    #[test]
    fn test_non_latin_heading_matches_across_case() {
        let (spans, levels) = make_document(&[make_span("Миокардит", 18.0, 50.0, 1, 0)]);
        let options = MatchOptions::default();
        let matches =
            match_headings_to_styles(&spans, &levels, &["МИОКАРДИТ"], &options, &ngram())
                .unwrap();

        assert_eq!(matches.len(), 1, "Cyrillic text must not encode to a zero vector");
        assert_eq!(matches[0].text, "Миокардит");
        assert!(matches[0].score > 0.99, "score {}", matches[0].score);
    }

    #[test]
    fn test_min_similarity_threshold() {
        let (spans, levels) = make_document(&[make_span("Myocarditis.", 18.0, 50.0, 1, 0)]);
        let encoder = StubEncoder::new(&[
            ("myocarditis", [1.0, 0.0]),
            ("myocarditis.", [0.92, 0.391_918_4]),
        ]);

        let lenient = MatchOptions::default();
        let hits = match_headings_to_styles(&spans, &levels, &["Myocarditis"], &lenient, &encoder)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 0.92).abs() < 1e-3, "score {}", hits[0].score);

        let strict = MatchOptions {
            min_similarity: 0.99,
            ..Default::default()
        };
        let hits = match_headings_to_styles(&spans, &levels, &["Myocarditis"], &strict, &encoder)
            .unwrap();
        assert!(hits.is_empty(), "0.92 is below 0.99");
    }

    #[test]
    fn test_encodes_in_one_batch() {
        let (spans, levels) = make_document(&[
            make_span("Fever", 18.0, 50.0, 1, 0),
            make_span("Rash", 18.0, 100.0, 1, 1),
        ]);
        let encoder = StubEncoder::new(&[("fever", [1.0, 0.0]), ("rash", [0.0, 1.0])]);
        let matches = match_headings_to_styles(
            &spans,
            &levels,
            &["Fever", "Rash", "Cough"],
            &MatchOptions::default(),
            &encoder,
        )
        .unwrap();

        assert_eq!(encoder.calls.load(AtomicOrdering::SeqCst), 1);
        let texts: Vec<&str> = matches.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["Fever", "Rash"], "no row for an unmatched heading");
    }

    #[test]
    fn test_deduplicate_consumes_segment() {
        let (spans, levels) = make_document(&[make_span("Fever", 18.0, 50.0, 1, 0)]);
        let dedup = MatchOptions {
            deduplicate_segments: true,
            ..Default::default()
        };
        let matches =
            match_headings_to_styles(&spans, &levels, &["Fever", "fever"], &dedup, &ngram())
                .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].heading, "Fever");

        let shared = match_headings_to_styles(
            &spans,
            &levels,
            &["Fever", "fever"],
            &MatchOptions::default(),
            &ngram(),
        )
        .unwrap();
        assert_eq!(shared.len(), 2, "segments are reusable without dedup");
    }

    #[test]
    fn test_deduplicate_prefers_lower_level() {
        let (spans, levels) = make_document(&[
            make_span("Myocarditis", 14.0, 50.0, 1, 0),
            make_span("Myocarditis", 18.0, 100.0, 1, 1),
        ]);
        let dedup = MatchOptions {
            deduplicate_segments: true,
            ..Default::default()
        };
        let matches =
            match_headings_to_styles(&spans, &levels, &["Myocarditis"], &dedup, &ngram()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].location.level, 1);
        assert_eq!(matches[0].style.size, Some(18.0));
    }

    #[test]
    fn test_one_match_per_style_signature() {
        let (spans, levels) = make_document(&[
            make_span("Myocarditis", 18.0, 50.0, 1, 0),
            make_span("Myocarditis", 14.0, 100.0, 1, 1),
            make_span("Myocarditis", 18.0, 50.0, 2, 0),
        ]);
        let matches = match_headings_to_styles(
            &spans,
            &levels,
            &["Myocarditis"],
            &MatchOptions::default(),
            &ngram(),
        )
        .unwrap();

        assert_eq!(matches.len(), 2, "one row per distinct style");
        assert_eq!(matches[0].style.size, Some(18.0));
        assert_eq!(matches[0].location.page_number, 1, "earliest segment wins ties");
        assert_eq!(matches[1].style.size, Some(14.0));
        assert!(matches[0].location.level < matches[1].location.level);
    }

    #[test]
    fn test_use_levels_upto_filters_segments() {
        let (spans, levels) = make_document(&[
            make_span("Intro", 18.0, 50.0, 1, 0),
            make_span("Myocarditis", 14.0, 100.0, 1, 1),
        ]);
        let options = MatchOptions {
            use_levels_upto: Some(1),
            ..Default::default()
        };
        let matches =
            match_headings_to_styles(&spans, &levels, &["Myocarditis"], &options, &ngram())
                .unwrap();
        assert!(matches.is_empty(), "14pt sits in level 2");
    }

    #[test]
    fn test_body_text_never_matches() {
        let (spans, levels) = make_document(&[make_span("Intro", 18.0, 50.0, 1, 0)]);
        let matches = match_headings_to_styles(
            &spans,
            &levels,
            &["Body text here."],
            &MatchOptions::default(),
            &ngram(),
        )
        .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_empty_heading_produces_no_rows() {
        let (spans, levels) = make_document(&[make_span("Intro", 18.0, 50.0, 1, 0)]);
        let options = MatchOptions {
            min_similarity: 0.0,
            ..Default::default()
        };
        let matches =
            match_headings_to_styles(&spans, &levels, &["", "   "], &options, &ngram()).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_without_merge_uses_single_spans() {
        let (spans, levels) = make_document(&[
            make_span("Acute", 18.0, 50.0, 1, 0),
            make_span("otitis", 18.0, 50.0, 1, 0),
        ]);
        let merged = match_headings_to_styles(
            &spans,
            &levels,
            &["Acute otitis"],
            &MatchOptions::default(),
            &ngram(),
        )
        .unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "Acute otitis");

        let unmerged = MatchOptions {
            merge_before: false,
            ..Default::default()
        };
        let split =
            match_headings_to_styles(&spans, &levels, &["Acute otitis"], &unmerged, &ngram())
                .unwrap();
        assert!(split.is_empty(), "neither half reaches 0.9 alone");
    }

    #[test]
    fn test_encoder_init_failure_is_reported() {
        let (spans, levels) = make_document(&[make_span("Intro", 18.0, 50.0, 1, 0)]);
        let cell: EncoderCell<NgramEncoder> =
            EncoderCell::new(|| Err(EncoderError::Init("no model".to_string())));
        let err =
            match_headings_to_styles(&spans, &levels, &["Intro"], &MatchOptions::default(), &cell)
                .unwrap_err();
        assert!(matches!(err, MatchError::Encoder(EncoderError::Init(_))));
    }

    #[test]
    fn test_matcher_through_lazy_cell() {
        let (spans, levels) = make_document(&[make_span("Intro", 18.0, 50.0, 1, 0)]);
        let cell = EncoderCell::new(|| Ok(NgramEncoder::default()));
        let matches =
            match_headings_to_styles(&spans, &levels, &["intro"], &MatchOptions::default(), &cell)
                .unwrap();
        assert_eq!(matches.len(), 1);
        assert!(cell.is_initialized());
    }

    #[test]
    fn test_vector_count_mismatch_is_an_error() {
        let (spans, levels) = make_document(&[make_span("Intro", 18.0, 50.0, 1, 0)]);
        let err = match_headings_to_styles(
            &spans,
            &levels,
            &["Intro"],
            &MatchOptions::default(),
            &ShortEncoder,
        )
        .unwrap_err();
        assert!(matches!(err, MatchError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let (spans, levels) = make_document(&[]);
        let options = MatchOptions {
            size_tolerance: -1.0,
            ..Default::default()
        };
        let err =
            match_headings_to_styles(&spans, &levels, &["x"], &options, &ngram()).unwrap_err();
        assert!(matches!(err, MatchError::Analysis(_)));
    }

    #[test]
    fn test_matching_is_deterministic() {
        let (spans, levels) = make_document(&[
            make_span("Clinical features", 18.0, 50.0, 1, 0),
            make_span("Clinical features", 14.0, 100.0, 1, 1),
            make_span("Treatment", 14.0, 150.0, 1, 2),
        ]);
        let headings = ["Clinical Features", "Treatment"];
        let options = MatchOptions::default();
        let a = match_headings_to_styles(&spans, &levels, &headings, &options, &ngram()).unwrap();
        let b = match_headings_to_styles(&spans, &levels, &headings, &options, &ngram()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_match_json_shape() {
        let (spans, levels) = make_document(&[make_span("Intro", 18.0, 50.0, 1, 3)]);
        let options = MatchOptions::default();
        let matches =
            match_headings_to_styles(&spans, &levels, &["Intro"], &options, &ngram()).unwrap();
        let value = serde_json::to_value(&matches[0]).unwrap();
        assert_eq!(value["heading"], json!("Intro"));
        assert_eq!(value["style"], json!({"font": "Arial", "size": 18.0, "color": 0}));
        assert_eq!(
            value["location"],
            json!({"level": 1, "page_number": 1, "block_index": 3})
        );
    }
}
