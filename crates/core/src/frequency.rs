//! Style frequency analysis.

use std::collections::BTreeMap;

use crate::config::FrequencyOptions;
use crate::error::AnalysisError;
use crate::types::{Color, PartialStyle, Span, StyleCount};

/// Count how often each distinct style occurs.
///
/// The result is sorted by count descending, ties broken by font, then size,
/// then color (all ascending), so equal inputs always produce equal tables.
/// Counts add up to the number of spans that pass the empty-text filter.
pub fn count_styles(
    spans: &[Span],
    options: &FrequencyOptions,
) -> Result<Vec<StyleCount>, AnalysisError> {
    options.validate()?;

    let mut counter: BTreeMap<PartialStyle, usize> = BTreeMap::new();
    for span in spans {
        if options.skip_empty && !span.has_text() {
            continue;
        }
        let style = span.canonical_style(&options.keys, options.size_rounding);
        *counter.entry(style).or_insert(0) += 1;
    }

    // BTreeMap iteration is already in style order; a stable sort on count
    // keeps it as the tie-break.
    let mut items: Vec<StyleCount> = counter
        .into_iter()
        .map(|(style, count)| StyleCount { style, count })
        .collect();
    items.sort_by(|a, b| b.count.cmp(&a.count));

    Ok(items)
}

/// The most common size, font and color, each counted on its own.
///
/// Unlike the first row of [`count_styles`] the three attributes may come
/// from different spans. Ties go to the value seen first. Returns `None`
/// when there are no spans.
pub fn main_text_properties(spans: &[Span]) -> Option<PartialStyle> {
    if spans.is_empty() {
        return None;
    }

    let size = most_common(spans.iter().map(|s| s.size.to_bits())).map(f32::from_bits);
    let font = most_common(spans.iter().map(|s| s.font.clone()));
    let color = most_common(spans.iter().map(|s| s.color.packed())).map(Color::from_packed);

    Some(PartialStyle { font, size, color })
}

fn most_common<T: PartialEq>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut tally: Vec<(T, usize)> = Vec::new();
    for value in values {
        match tally.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => tally.push((value, 1)),
        }
    }
    // max_by_key returns the last maximum; walk in reverse to keep the first.
    tally
        .into_iter()
        .rev()
        .max_by_key(|(_, n)| *n)
        .map(|(v, _)| v)
}
