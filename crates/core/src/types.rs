//! Data model shared by every stage of the heading-inference pipeline.
//!
//! Spans arrive from the PDF extractor and are never mutated. Every other
//! type in this module ([`Segment`], [`StyleCount`], [`PartialStyle`]) is a
//! derived, per-run artifact.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MalformedSpan;

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// A text color packed as `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr", into = "u32")]
pub struct Color(u32);

impl Color {
    pub const BLACK: Self = Color(0);

    pub fn from_packed(value: u32) -> Self {
        Color(value & 0x00FF_FFFF)
    }

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Color((u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b))
    }

    /// Build a color from extractor components.
    ///
    /// Three components are read as 0-255 RGB. Four components in `0..=1` are
    /// read as CMYK and converted. Anything else is rejected.
    pub fn from_components(components: &[f64]) -> Option<Self> {
        if components.iter().any(|c| !c.is_finite()) {
            return None;
        }
        match components {
            [r, g, b] => Some(Color::from_rgb(channel(*r), channel(*g), channel(*b))),
            [c, m, y, k] if components.iter().all(|v| (0.0..=1.0).contains(v)) => {
                let r = 255.0 * (1.0 - c) * (1.0 - k);
                let g = 255.0 * (1.0 - m) * (1.0 - k);
                let b = 255.0 * (1.0 - y) * (1.0 - k);
                Some(Color::from_rgb(r as u8, g as u8, b as u8))
            }
            _ => None,
        }
    }

    pub fn packed(&self) -> u32 {
        self.0
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }

    /// `#rrggbb` form.
    pub fn to_hex(&self) -> String {
        let (r, g, b) = self.rgb();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

fn channel(value: f64) -> u8 {
    value.clamp(0.0, 255.0) as u8
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<Color> for u32 {
    fn from(color: Color) -> Self {
        color.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Packed(u32),
    Components(Vec<f64>),
}

impl TryFrom<ColorRepr> for Color {
    type Error = String;

    fn try_from(repr: ColorRepr) -> Result<Self, Self::Error> {
        match repr {
            ColorRepr::Packed(v) => Ok(Color::from_packed(v)),
            ColorRepr::Components(c) => Color::from_components(&c)
                .ok_or_else(|| format!("unsupported color components: {:?}", c)),
        }
    }
}

// ---------------------------------------------------------------------------
// Bounding box
// ---------------------------------------------------------------------------

/// Axis-aligned box in page coordinates, `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        BBox { x0, y0, x1, y1 }
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        BBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

// ---------------------------------------------------------------------------
// Span
// ---------------------------------------------------------------------------

/// An atomic positioned text fragment produced by the PDF extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub font: String,
    pub size: f32,
    pub color: Color,
    pub bbox: BBox,
    pub page_number: u32,
    pub block_index: u32,
}

impl Span {
    /// Parse one extractor record, rejecting it when a required style or
    /// geometry field is missing or unusable.
    pub fn from_value(value: &Value) -> Result<Self, MalformedSpan> {
        let obj = value.as_object().ok_or(MalformedSpan::NotAnObject)?;

        let text = obj
            .get("text")
            .and_then(Value::as_str)
            .ok_or(MalformedSpan::MissingField("text"))?
            .to_string();

        let size = obj
            .get("size")
            .and_then(Value::as_f64)
            .ok_or(MalformedSpan::MissingField("size"))?;
        if !size.is_finite() || size <= 0.0 {
            return Err(MalformedSpan::InvalidSize(size));
        }

        let font = obj
            .get("font")
            .and_then(Value::as_str)
            .ok_or(MalformedSpan::MissingField("font"))?
            .to_string();

        let color = match obj.get("color") {
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(Color::from_packed)
                .ok_or(MalformedSpan::InvalidColor)?,
            Some(Value::Array(parts)) => {
                let components: Option<Vec<f64>> = parts.iter().map(Value::as_f64).collect();
                components
                    .as_deref()
                    .and_then(Color::from_components)
                    .ok_or(MalformedSpan::InvalidColor)?
            }
            Some(_) => return Err(MalformedSpan::InvalidColor),
            None => return Err(MalformedSpan::MissingField("color")),
        };

        let bbox = match obj.get("bbox") {
            Some(Value::Array(parts)) if parts.len() == 4 => {
                let mut coords = [0.0f32; 4];
                for (slot, part) in coords.iter_mut().zip(parts) {
                    let v = part.as_f64().ok_or(MalformedSpan::InvalidBBox)?;
                    if !v.is_finite() {
                        return Err(MalformedSpan::InvalidBBox);
                    }
                    *slot = v as f32;
                }
                BBox::from(coords)
            }
            Some(_) => return Err(MalformedSpan::InvalidBBox),
            None => return Err(MalformedSpan::MissingField("bbox")),
        };

        let page_number = obj
            .get("page_number")
            .and_then(Value::as_u64)
            .ok_or(MalformedSpan::MissingField("page_number"))?;
        if page_number == 0 {
            return Err(MalformedSpan::InvalidPage);
        }
        let page_number = u32::try_from(page_number).map_err(|_| MalformedSpan::InvalidPage)?;

        let block_index = obj
            .get("block_index")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or(MalformedSpan::MissingField("block_index"))?;

        Ok(Span {
            text,
            font,
            size: size as f32,
            color,
            bbox,
            page_number,
            block_index,
        })
    }

    /// Whether the span carries any visible text.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// The full `(font, size, color)` projection.
    pub fn style(&self) -> Style {
        Style {
            font: self.font.clone(),
            size: self.size,
            color: self.color,
        }
    }

    /// Project the span onto `keys`, optionally rounding the size to
    /// `size_rounding` decimals.
    pub fn canonical_style(&self, keys: &[StyleKey], size_rounding: Option<u32>) -> PartialStyle {
        let mut style = PartialStyle::default();
        for key in keys {
            match key {
                StyleKey::Font => style.font = Some(self.font.clone()),
                StyleKey::Size => {
                    style.size = Some(match size_rounding {
                        Some(decimals) => round_to(self.size, decimals),
                        None => self.size,
                    })
                }
                StyleKey::Color => style.color = Some(self.color),
            }
        }
        style
    }
}

/// Round `value` to `decimals` places.
pub fn round_to(value: f32, decimals: u32) -> f32 {
    let factor = 10f64.powi(decimals as i32);
    ((f64::from(value) * factor).round() / factor) as f32
}

/// Accepted spans plus the records that were skipped and why.
#[derive(Debug, Default)]
pub struct SpanParseReport {
    pub spans: Vec<Span>,
    pub skipped: Vec<(usize, MalformedSpan)>,
}

// ---------------------------------------------------------------------------
// Style
// ---------------------------------------------------------------------------

/// One attribute a [`PartialStyle`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleKey {
    Color,
    Font,
    Size,
}

pub const DEFAULT_STYLE_KEYS: [StyleKey; 3] = [StyleKey::Color, StyleKey::Font, StyleKey::Size];

/// The fixed `(font, size, color)` style used by the header detector and in
/// match output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub font: String,
    pub size: f32,
    pub color: Color,
}

impl Style {
    /// Font and color exact, size within `size_tolerance` points.
    pub fn matches_within(&self, other: &Style, size_tolerance: f32) -> bool {
        self.font == other.font
            && self.color == other.color
            && (self.size - other.size).abs() <= size_tolerance
    }
}

impl PartialEq for Style {
    fn eq(&self, other: &Self) -> bool {
        self.font == other.font
            && self.size.to_bits() == other.size.to_bits()
            && self.color == other.color
    }
}

impl Eq for Style {}

impl Hash for Style {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.font.hash(state);
        self.size.to_bits().hash(state);
        self.color.hash(state);
    }
}

/// A style projected onto a subset of keys. Absent keys are unconstrained
/// when this style is used as a matching pattern.
///
/// Ordering is `(font, size, color)` ascending with `None` first, which is
/// also the frequency table's tie-break order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl PartialStyle {
    /// Whether `self` satisfies `pattern`: every key present in `pattern`
    /// must be present here, non-size keys equal, size within
    /// `size_tolerance`.
    pub fn matches(&self, pattern: &PartialStyle, size_tolerance: f32) -> bool {
        if let Some(font) = &pattern.font {
            if self.font.as_ref() != Some(font) {
                return false;
            }
        }
        if let Some(color) = pattern.color {
            if self.color != Some(color) {
                return false;
            }
        }
        if let Some(size) = pattern.size {
            match self.size {
                Some(own) if (own - size).abs() <= size_tolerance => {}
                _ => return false,
            }
        }
        true
    }

    /// The full style, if every key is present.
    pub fn to_full(&self) -> Option<Style> {
        Some(Style {
            font: self.font.clone()?,
            size: self.size?,
            color: self.color?,
        })
    }

    /// Hashable fingerprint on `keys` with the size rounded to two decimals.
    pub fn signature(&self, keys: &[StyleKey]) -> StyleSignature {
        let mut sig = StyleSignature::default();
        for key in keys {
            match key {
                StyleKey::Font => sig.font = self.font.clone(),
                StyleKey::Size => {
                    sig.size_centi = self.size.map(|s| (f64::from(s) * 100.0).round() as i64)
                }
                StyleKey::Color => sig.color = self.color,
            }
        }
        sig
    }
}

impl From<Style> for PartialStyle {
    fn from(style: Style) -> Self {
        PartialStyle {
            font: Some(style.font),
            size: Some(style.size),
            color: Some(style.color),
        }
    }
}

impl Ord for PartialStyle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.font
            .cmp(&other.font)
            .then_with(|| match (self.size, other.size) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                (a, b) => a.is_some().cmp(&b.is_some()),
            })
            .then_with(|| self.color.cmp(&other.color))
    }
}

impl PartialOrd for PartialStyle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PartialStyle {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PartialStyle {}

impl Hash for PartialStyle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.font.hash(state);
        self.size.map(f32::to_bits).hash(state);
        self.color.hash(state);
    }
}

/// See [`PartialStyle::signature`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleSignature {
    pub font: Option<String>,
    pub size_centi: Option<i64>,
    pub color: Option<Color>,
}

// ---------------------------------------------------------------------------
// Derived artifacts
// ---------------------------------------------------------------------------

/// A line-level run of same-style spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub style: PartialStyle,
    pub page_number: u32,
    /// Smallest block index among the merged spans.
    pub block_index: u32,
    pub bbox: BBox,
}

/// One row of the style frequency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleCount {
    pub style: PartialStyle,
    pub count: usize,
}
