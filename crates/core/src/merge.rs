//! Span normalizer: merges adjacent same-style spans into line segments.
//!
//! ```text
//! Span[]  ->  drop empty  ->  sort (page, y0, x0, block)  ->  Segment[]
//! ```
//!
//! A span joins the open segment only when it is on the same page, its style
//! matches the segment's style under the size tolerance, and its `y0` lies
//! within the line tolerance of the segment's *first* span. Anchoring on the
//! first span keeps long runs from drifting down the page.

use std::cmp::Ordering;

use crate::config::MergeOptions;
use crate::error::AnalysisError;
use crate::types::{BBox, PartialStyle, Segment, Span, StyleKey};

/// Reading-order key: page, then top edge, then left edge, then block.
fn reading_order(
    (page_a, box_a, block_a): (u32, &BBox, u32),
    (page_b, box_b, block_b): (u32, &BBox, u32),
) -> Ordering {
    page_a
        .cmp(&page_b)
        .then(box_a.y0.total_cmp(&box_b.y0))
        .then(box_a.x0.total_cmp(&box_b.x0))
        .then(block_a.cmp(&block_b))
}

fn span_key(span: &Span) -> (u32, &BBox, u32) {
    (span.page_number, &span.bbox, span.block_index)
}

fn segment_key(segment: &Segment) -> (u32, &BBox, u32) {
    (segment.page_number, &segment.bbox, segment.block_index)
}

/// Spans with visible text, in reading order. The sort is stable, so spans
/// with identical keys keep their input order.
pub fn sorted_text_spans(spans: &[Span]) -> Vec<&Span> {
    let mut prepared: Vec<&Span> = spans.iter().filter(|s| s.has_text()).collect();
    prepared.sort_by(|a, b| reading_order(span_key(a), span_key(b)));
    prepared
}

/// Accumulates spans belonging to one line.
struct OpenSegment {
    parts: Vec<String>,
    style: PartialStyle,
    page_number: u32,
    block_index: u32,
    bbox: BBox,
    line_y: f32,
}

impl OpenSegment {
    fn start(span: &Span, style: PartialStyle) -> Self {
        OpenSegment {
            parts: vec![span.text.trim().to_string()],
            style,
            page_number: span.page_number,
            block_index: span.block_index,
            bbox: span.bbox,
            line_y: span.bbox.y0,
        }
    }

    fn accepts(&self, span: &Span, style: &PartialStyle, options: &MergeOptions) -> bool {
        span.page_number == self.page_number
            && style.matches(&self.style, options.size_tolerance)
            && (span.bbox.y0 - self.line_y).abs() <= options.line_tolerance
    }

    fn push(&mut self, span: &Span) {
        self.parts.push(span.text.trim().to_string());
        self.bbox = self.bbox.union(&span.bbox);
        self.block_index = self.block_index.min(span.block_index);
    }

    fn finish(self, joiner: &str) -> Segment {
        Segment {
            text: self.parts.join(joiner).trim().to_string(),
            style: self.style,
            page_number: self.page_number,
            block_index: self.block_index,
            bbox: self.bbox,
        }
    }
}

/// Merge spans into line-level [`Segment`]s.
///
/// Empty spans are dropped first. A segment keeps the style of its first
/// span, the union of all boxes and the smallest block index. Segments are
/// returned in reading order of their union boxes, the same order a re-run
/// would sort them in.
pub fn merge_adjacent(
    spans: &[Span],
    keys: &[StyleKey],
    options: &MergeOptions,
) -> Result<Vec<Segment>, AnalysisError> {
    options.validate()?;

    let mut segments: Vec<Segment> = Vec::new();
    let mut current: Option<OpenSegment> = None;

    for span in sorted_text_spans(spans) {
        let style = span.canonical_style(keys, None);

        if let Some(open) = current.as_mut() {
            if open.accepts(span, &style, options) {
                open.push(span);
                continue;
            }
        }

        if let Some(done) = current.take() {
            segments.push(done.finish(&options.joiner));
        }
        current = Some(OpenSegment::start(span, style));
    }

    if let Some(done) = current {
        segments.push(done.finish(&options.joiner));
    }
    // A union box can start left of a span that sorted before the run.
    segments.sort_by(|a, b| reading_order(segment_key(a), segment_key(b)));

    log::debug!(
        "merged {} spans into {} segments",
        spans.len(),
        segments.len()
    );
    Ok(segments)
}

/// One segment per non-empty span, in input order, without merging.
pub fn single_span_segments(spans: &[Span], keys: &[StyleKey]) -> Vec<Segment> {
    spans
        .iter()
        .filter(|s| s.has_text())
        .map(|s| Segment {
            text: s.text.trim().to_string(),
            style: s.canonical_style(keys, None),
            page_number: s.page_number,
            block_index: s.block_index,
            bbox: s.bbox,
        })
        .collect()
}

impl Segment {
    /// A synthetic span standing for this segment. `None` when the segment's
    /// style lacks one of font, size or color.
    pub fn to_span(&self) -> Option<Span> {
        let style = self.style.to_full()?;
        Some(Span {
            text: self.text.clone(),
            font: style.font,
            size: style.size,
            color: style.color,
            bbox: self.bbox,
            page_number: self.page_number,
            block_index: self.block_index,
        })
    }
}
