//! Tunables for every pipeline stage.
//!
//! All fields have defaults, so an empty TOML document is a valid
//! configuration. Validation happens at call time through
//! [`AnalysisConfig::validate`] or inside each stage.

use serde::{Deserialize, Serialize};

use crate::error::{check_tolerance, AnalysisError};
use crate::ranking::Bucketing;
use crate::types::{StyleKey, DEFAULT_STYLE_KEYS};

/// Largest accepted `size_rounding`.
pub const MAX_SIZE_ROUNDING: u32 = 6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub frequency: FrequencyOptions,
    pub merge: MergeOptions,
    pub ranking: RankingOptions,
    pub detector: DetectorOptions,
    pub matching: MatchOptions,
}

impl AnalysisConfig {
    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(input: &str) -> Result<Self, AnalysisError> {
        let config: AnalysisConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.frequency.validate()?;
        self.merge.validate()?;
        self.ranking.validate()?;
        check_tolerance("detector.size_tolerance", self.detector.size_tolerance)?;
        self.matching.validate()
    }
}

/// Style frequency counting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyOptions {
    /// Attributes that make up a style.
    pub keys: Vec<StyleKey>,
    /// Round sizes to this many decimals before grouping.
    pub size_rounding: Option<u32>,
    /// Ignore spans whose text is empty after trimming.
    pub skip_empty: bool,
}

impl Default for FrequencyOptions {
    fn default() -> Self {
        Self {
            keys: DEFAULT_STYLE_KEYS.to_vec(),
            size_rounding: None,
            skip_empty: true,
        }
    }
}

impl FrequencyOptions {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        match self.size_rounding {
            Some(d) if d > MAX_SIZE_ROUNDING => Err(AnalysisError::InvalidRounding(d)),
            _ => Ok(()),
        }
    }
}

/// Span-to-segment merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Allowed size difference (pt) between spans of one segment.
    pub size_tolerance: f32,
    /// Allowed vertical offset (pt) from the segment's first span.
    pub line_tolerance: f32,
    pub joiner: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            size_tolerance: 0.25,
            line_tolerance: 2.0,
            joiner: " ".to_string(),
        }
    }
}

impl MergeOptions {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        check_tolerance("merge.size_tolerance", self.size_tolerance)?;
        check_tolerance("merge.line_tolerance", self.line_tolerance)
    }
}

/// Heading candidate ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingOptions {
    /// Number of importance levels.
    pub levels: usize,
    /// Candidates must exceed the main size by more than this (pt).
    pub min_size_diff: f32,
    pub size_weight: f32,
    pub freq_weight: f32,
    pub bucketing: Bucketing,
    /// Keep at most this many styles per level.
    pub per_level_limit: Option<usize>,
    /// Serialize each item's score.
    pub include_scores: bool,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            levels: 3,
            min_size_diff: 0.5,
            size_weight: 0.6,
            freq_weight: 0.4,
            bucketing: Bucketing::Quantile,
            per_level_limit: None,
            include_scores: false,
        }
    }
}

impl RankingOptions {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.levels < 1 {
            return Err(AnalysisError::InvalidLevels(self.levels));
        }
        let weights_ok = [self.size_weight, self.freq_weight]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0);
        if !weights_ok || self.size_weight + self.freq_weight <= 0.0 {
            return Err(AnalysisError::InvalidWeights {
                size: self.size_weight,
                frequency: self.freq_weight,
            });
        }
        if !self.min_size_diff.is_finite() {
            return Err(AnalysisError::InvalidTolerance {
                name: "ranking.min_size_diff",
                value: self.min_size_diff,
            });
        }
        Ok(())
    }
}

/// Header detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    /// Size window (pt) for the fallback rule scan.
    pub size_tolerance: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            size_tolerance: 0.15,
        }
    }
}

/// Heading-text matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    pub style_keys: Vec<StyleKey>,
    /// Only consider levels up to this number (inclusive).
    pub use_levels_upto: Option<usize>,
    /// Minimum similarity in `0..=1` to accept a match.
    pub min_similarity: f32,
    pub size_tolerance: f32,
    /// One segment may satisfy at most one heading.
    pub deduplicate_segments: bool,
    /// Merge spans into line segments before matching.
    pub merge_before: bool,
    pub line_tolerance: f32,
    pub joiner: String,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            style_keys: DEFAULT_STYLE_KEYS.to_vec(),
            use_levels_upto: None,
            min_similarity: 0.9,
            size_tolerance: 0.25,
            deduplicate_segments: false,
            merge_before: true,
            line_tolerance: 2.0,
            joiner: " ".to_string(),
        }
    }
}

impl MatchOptions {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        check_tolerance("matching.size_tolerance", self.size_tolerance)?;
        check_tolerance("matching.line_tolerance", self.line_tolerance)?;
        if !self.min_similarity.is_finite() {
            return Err(AnalysisError::InvalidTolerance {
                name: "matching.min_similarity",
                value: self.min_similarity,
            });
        }
        Ok(())
    }

    /// The merge settings this matcher run uses.
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            size_tolerance: self.size_tolerance,
            line_tolerance: self.line_tolerance,
            joiner: self.joiner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.ranking.levels, 3);
        assert_eq!(config.frequency.keys, DEFAULT_STYLE_KEYS.to_vec());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            [frequency]
            keys = ["font", "size"]
            size_rounding = 1

            [ranking]
            levels = 5
            bucketing = "equal"
            per_level_limit = 5

            [matching]
            deduplicate_segments = true
            "#,
        )
        .unwrap();

        assert_eq!(config.frequency.keys, vec![StyleKey::Font, StyleKey::Size]);
        assert_eq!(config.frequency.size_rounding, Some(1));
        assert_eq!(config.ranking.levels, 5);
        assert_eq!(config.ranking.bucketing, Bucketing::Equal);
        assert_eq!(config.ranking.per_level_limit, Some(5));
        assert!((config.ranking.size_weight - 0.6).abs() < f32::EPSILON);
        assert!(config.matching.deduplicate_segments);
    }

    #[test]
    fn test_validate_rejects_zero_levels() {
        let err = AnalysisConfig::from_toml_str("[ranking]\nlevels = 0").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidLevels(0)));
    }

    #[test]
    fn test_validate_rejects_zero_weights() {
        let options = RankingOptions {
            size_weight: 0.0,
            freq_weight: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(AnalysisError::InvalidWeights { .. })
        ));

        let negative = RankingOptions {
            size_weight: -1.0,
            freq_weight: 2.0,
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_tolerance() {
        let options = MergeOptions {
            line_tolerance: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(AnalysisError::InvalidTolerance { name: "merge.line_tolerance", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_large_rounding() {
        let err = AnalysisConfig::from_toml_str("[frequency]\nsize_rounding = 9").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidRounding(9)));
    }

    #[test]
    fn test_unknown_bucketing_is_a_config_error() {
        let err = AnalysisConfig::from_toml_str("[ranking]\nbucketing = \"cubic\"").unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }
}
