//! Span intake: lenient JSON parsing and page/block helpers that run before
//! the statistical stages.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::AnalysisError;
use crate::types::{Span, SpanParseReport};

/// Parse the extractor's JSON array of span records.
///
/// Only a top-level document that is not an array is an error. Individual
/// records that are missing required fields are skipped and listed in the
/// report so one degenerate span never aborts a document.
pub fn parse_spans(json: &str) -> Result<SpanParseReport, AnalysisError> {
    let records: Vec<Value> = serde_json::from_str(json)?;
    Ok(spans_from_values(&records))
}

/// Same as [`parse_spans`] for already-decoded records.
pub fn spans_from_values(records: &[Value]) -> SpanParseReport {
    let mut report = SpanParseReport::default();
    for (index, record) in records.iter().enumerate() {
        match Span::from_value(record) {
            Ok(span) => report.spans.push(span),
            Err(reason) => {
                log::warn!("skipping span #{}: {}", index, reason);
                report.skipped.push((index, reason));
            }
        }
    }
    log::debug!(
        "parsed {} spans ({} skipped)",
        report.spans.len(),
        report.skipped.len()
    );
    report
}

/// Stable sort by page number.
pub fn sort_spans_by_page(spans: &[Span]) -> Vec<Span> {
    let mut sorted = spans.to_vec();
    sorted.sort_by_key(|s| s.page_number);
    sorted
}

/// Split before the first span on `page_number`.
///
/// Returns `(before, from)`. When no span is on that page the whole input is
/// returned as the second half.
pub fn split_spans_at_page(spans: &[Span], page_number: u32) -> (&[Span], &[Span]) {
    match spans.iter().position(|s| s.page_number == page_number) {
        Some(i) => spans.split_at(i),
        None => (&spans[..0], spans),
    }
}

/// Join consecutive spans of the same block.
///
/// Two neighbours are joined when they share page and block and either have
/// identical styles, or the earlier span starts with a non-letter (bullets,
/// list numbers, stray punctuation). The joined span keeps the first span's
/// style and the union of both boxes.
pub fn join_block_spans(spans: &[Span]) -> Vec<Span> {
    let mut joined: Vec<Span> = Vec::with_capacity(spans.len());

    for span in spans {
        if let Some(last) = joined.last_mut() {
            let same_block =
                last.page_number == span.page_number && last.block_index == span.block_index;
            let starts_with_non_letter = last
                .text
                .chars()
                .next()
                .is_some_and(|c| !c.is_ascii_alphabetic());

            if same_block && (last.style() == span.style() || starts_with_non_letter) {
                let combined = format!("{} {}", last.text, span.text);
                last.text = normalize_spaces(&combined);
                last.bbox = last.bbox.union(&span.bbox);
                continue;
            }
        }
        joined.push(span.clone());
    }

    joined
}

/// Collapse whitespace runs to one space, trim, and drop the space before a
/// trailing period.
pub fn normalize_spaces(text: &str) -> String {
    static RE_WS: OnceLock<Regex> = OnceLock::new();
    static RE_TRAILING_DOT: OnceLock<Regex> = OnceLock::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    let re_dot = RE_TRAILING_DOT.get_or_init(|| Regex::new(r"\s+\.$").unwrap());

    let collapsed = re_ws.replace_all(text.trim(), " ");
    re_dot.replace(&collapsed, ".").to_string()
}
