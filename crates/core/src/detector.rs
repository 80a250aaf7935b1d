//! Header detection for spans seen after ranking.
//!
//! Lookup is two-phase: an exact `(font, size, color)` map first, then a
//! linear scan over the ranked styles with the size compared under a
//! tolerance. The scan runs in ranking order (level, then item), so the
//! first rule that fits always wins.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::DetectorOptions;
use crate::error::{check_tolerance, AnalysisError};
use crate::ranking::LevelSet;
use crate::types::{PartialStyle, Span, Style};

/// Markdown prefixes for levels 1 through 6.
pub const DEFAULT_LEVEL_HEADERS: [&str; 6] = ["#", "##", "###", "####", "#####", "######"];

/// The markdown prefix for `level`. Levels below 1 have none; levels past 6
/// share the deepest prefix.
pub fn header_for_level(level: usize) -> Option<&'static str> {
    match level {
        0 => None,
        l => Some(DEFAULT_LEVEL_HEADERS[l.min(DEFAULT_LEVEL_HEADERS.len()) - 1]),
    }
}

/// One fallback rule. Keys absent from `style` are unconstrained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderRule {
    #[serde(flatten)]
    pub style: PartialStyle,
    pub level: usize,
}

#[derive(Debug, Clone)]
pub struct HeaderDetector {
    style_to_level: HashMap<Style, usize>,
    rules: Vec<HeaderRule>,
    size_tolerance: f32,
}

impl HeaderDetector {
    /// Build a detector from a ranking.
    ///
    /// `per_level_limit` caps how many styles of each level are used; `None`
    /// falls back to the limit recorded in the ranking's meta. A style listed
    /// twice keeps its first (most prominent) level.
    pub fn from_level_set(
        level_set: &LevelSet,
        per_level_limit: Option<usize>,
        options: &DetectorOptions,
    ) -> Result<Self, AnalysisError> {
        check_tolerance("detector.size_tolerance", options.size_tolerance)?;
        let limit = per_level_limit.or(level_set.meta.per_level_limit);

        let mut levels: Vec<_> = level_set.levels.iter().collect();
        levels.sort_by_key(|l| l.level);

        let mut style_to_level = HashMap::new();
        let mut rules = Vec::new();
        for level in levels {
            let take = limit.unwrap_or(level.items.len());
            for item in level.items.iter().take(take) {
                if let Some(full) = item.style.to_full() {
                    style_to_level.entry(full).or_insert(level.level);
                }
                rules.push(HeaderRule {
                    style: item.style.clone(),
                    level: level.level,
                });
            }
        }

        log::debug!(
            "header detector: {} exact styles, {} rules",
            style_to_level.len(),
            rules.len()
        );

        Ok(HeaderDetector {
            style_to_level,
            rules,
            size_tolerance: options.size_tolerance,
        })
    }

    /// The heading level of `span`, or `None` for body text.
    pub fn get_header_level(&self, span: &Span) -> Option<usize> {
        let style = span.style();
        if let Some(level) = self.style_to_level.get(&style) {
            return Some(*level);
        }

        let style = PartialStyle::from(style);
        self.rules
            .iter()
            .find(|rule| style.matches(&rule.style, self.size_tolerance))
            .map(|rule| rule.level)
    }

    /// Markdown prefix for `span`, empty when it is not a heading.
    pub fn header_id(&self, span: &Span) -> &'static str {
        self.get_header_level(span)
            .and_then(header_for_level)
            .unwrap_or("")
    }

    /// Fallback rules in scan order.
    pub fn rules(&self) -> &[HeaderRule] {
        &self.rules
    }

    pub fn size_tolerance(&self) -> f32 {
        self.size_tolerance
    }
}
