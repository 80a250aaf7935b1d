use thiserror::Error;

/// Configuration and input errors raised synchronously by the pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("levels must be >= 1 (got {0})")]
    InvalidLevels(usize),

    #[error("weights must be non-negative and not both zero (size={size}, frequency={frequency})")]
    InvalidWeights { size: f32, frequency: f32 },

    #[error("{name} must be a finite, non-negative number (got {value})")]
    InvalidTolerance { name: &'static str, value: f32 },

    #[error("size rounding of {0} decimals is out of range (max 6)")]
    InvalidRounding(u32),

    #[error("invalid span JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Why a single extractor record was skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedSpan {
    #[error("span is not a JSON object")]
    NotAnObject,

    #[error("missing or mistyped field `{0}`")]
    MissingField(&'static str),

    #[error("font size must be positive and finite (got {0})")]
    InvalidSize(f64),

    #[error("color must be a packed integer, [r, g, b] or CMYK in 0..1")]
    InvalidColor,

    #[error("bbox must be four finite numbers")]
    InvalidBBox,

    #[error("page_number must be >= 1")]
    InvalidPage,
}

pub(crate) fn check_tolerance(name: &'static str, value: f32) -> Result<(), AnalysisError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(AnalysisError::InvalidTolerance { name, value })
    }
}
