//! Heading-text matching for docstyle
//!
//! Given the ranked heading levels produced by `docstyle_core` and a flat list
//! of heading strings proposed upstream, find where each heading actually
//! sits in the document and which style it carries.
//!
//! The similarity backend is injected: pass any [`TextEncoder`] by reference,
//! usually through an [`EncoderCell`] so that an expensive model is loaded
//! once and shared by every document processed in the process.
//!
//! ```rust,ignore
//! use docstyle_core::{analyze_spans, AnalysisConfig};
//! use docstyle_matching::{match_headings_to_styles, EncoderCell, NgramEncoder};
//!
//! let encoder = EncoderCell::new(|| Ok(NgramEncoder::default()));
//! let analysis = analyze_spans(&spans, &config)?;
//! let matches = match_headings_to_styles(
//!     &spans,
//!     &analysis.level_set,
//!     &headings,
//!     &config.matching,
//!     &encoder,
//! )?;
//! ```

pub mod encoder;
pub mod error;
pub mod matcher;
pub mod normalize;

pub use encoder::{cosine, EncoderCell, NgramEncoder, TextEncoder, DEFAULT_NGRAM_DIMS};
pub use error::{EncoderError, MatchError};
pub use matcher::{match_headings_to_styles, HeadingMatch, MatchLocation};
pub use normalize::{fold_tokens, normalize_heading_text};
