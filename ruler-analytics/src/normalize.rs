//! Value normalization: sentinel detection, numeric detection, ordering and
//! number formatting.
//!
//! Every raw cell goes through [`Normalizer::normalize`] exactly once. Missing
//! and placeholder tokens collapse to two sentinels, [`NormalizedValue::Null`]
//! (`<NULL>`) and [`NormalizedValue::Empty`] (`<EMPTY>`); everything else is
//! kept as its trimmed text.
//!
//! # Example
//!
//! ```rust
//! use ruler_analytics::normalize::{IntervalType, NormalizedValue, Normalizer};
//!
//! let normalizer = Normalizer::new();
//! assert_eq!(normalizer.normalize(Some(" N/A ")), NormalizedValue::Null);
//! assert_eq!(normalizer.normalize(Some("  ")), NormalizedValue::Empty);
//! assert_eq!(normalizer.normalize(Some(" 42 ")).as_str(), "42");
//!
//! assert_eq!(normalizer.format_number(3.14159265), "3.141593");
//! assert_eq!(normalizer.format_interval(1.0, 2.5, Some(IntervalType::RightOpen)), "[1, 2.5)");
//! assert_eq!(normalizer.format_interval(1.0, 2.5, None), "1-2.5");
//! ```

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Label of the null sentinel.
pub const NULL_VALUE: &str = "<NULL>";

/// Label of the empty sentinel.
pub const EMPTY_VALUE: &str = "<EMPTY>";

/// Raw tokens (compared case-insensitively after trimming) treated as missing.
pub const NULL_TOKENS: [&str; 9] = [
    "null",
    "n/a",
    "na",
    "none",
    "undefined",
    "-",
    "nan",
    "inf",
    "infinity",
];

/// Fraction of numeric non-sentinel values above which a column is numeric.
pub const DEFAULT_NUMERIC_THRESHOLD: f64 = 0.8;

/// Maximum fractional digits rendered by [`Normalizer::format_number`].
pub const MAX_FRACTION_DIGITS: usize = 6;

static NUMERIC_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("numeric pattern is valid")
});

/// A raw value after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum NormalizedValue {
    /// Missing value or one of the [`NULL_TOKENS`].
    Null,
    /// Blank value (empty after trimming).
    Empty,
    /// Trimmed content.
    Value(String),
}

impl NormalizedValue {
    /// Returns the string form used as a binning key.
    pub fn as_str(&self) -> &str {
        match self {
            NormalizedValue::Null => NULL_VALUE,
            NormalizedValue::Empty => EMPTY_VALUE,
            NormalizedValue::Value(value) => value,
        }
    }

    /// Whether this is one of the two sentinels.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, NormalizedValue::Value(_))
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for NormalizedValue {
    /// Interprets an already-normalized key, mapping the sentinel labels back.
    fn from(value: &str) -> Self {
        match value {
            NULL_VALUE => NormalizedValue::Null,
            EMPTY_VALUE => NormalizedValue::Empty,
            other => NormalizedValue::Value(other.to_string()),
        }
    }
}

/// Bracket style for interval labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntervalType {
    /// `[a, b]`
    Closed,
    /// `(a, b)`
    Open,
    /// `(a, b]`
    LeftOpen,
    /// `[a, b)`
    RightOpen,
}

/// Coarse classification of a single raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Null,
    Empty,
    Numeric,
    Text,
}

/// Configuration for the [`Normalizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizerConfig {
    /// Minimum numeric fraction of non-sentinel values for a numeric column (default: 0.8)
    pub numeric_threshold: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            numeric_threshold: DEFAULT_NUMERIC_THRESHOLD,
        }
    }
}

/// Classifies and cleans raw scalar values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    /// Creates a normalizer with the default 80% numeric threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a normalizer with a custom configuration.
    pub fn with_config(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalizes a single raw value.
    pub fn normalize(&self, raw: Option<&str>) -> NormalizedValue {
        let Some(raw) = raw else {
            return NormalizedValue::Null;
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return NormalizedValue::Empty;
        }

        if NULL_TOKENS
            .iter()
            .any(|token| trimmed.eq_ignore_ascii_case(token))
        {
            return NormalizedValue::Null;
        }

        NormalizedValue::Value(trimmed.to_string())
    }

    /// Whether a single value is a number that fits a finite `f64`.
    ///
    /// Spellings such as `1e999` match the numeric pattern but overflow, so
    /// they count as text.
    pub fn is_numeric_value(&self, value: &str) -> bool {
        self.parse_numeric(value).is_some()
    }

    /// Parses a numeric value, `None` for text, sentinels and overflow.
    pub fn parse_numeric(&self, value: &str) -> Option<f64> {
        if value == NULL_VALUE || value == EMPTY_VALUE || !NUMERIC_PATTERN.is_match(value) {
            return None;
        }
        value.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Whether enough of the non-sentinel values are numeric.
    pub fn is_numeric_column<'a, I>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = &'a NormalizedValue>,
    {
        let mut valid = 0usize;
        let mut numeric = 0usize;

        for value in values {
            if let NormalizedValue::Value(text) = value {
                valid += 1;
                if self.is_numeric_value(text) {
                    numeric += 1;
                }
            }
        }

        valid > 0 && numeric as f64 / valid as f64 >= self.config.numeric_threshold
    }

    /// Orders two normalized keys.
    ///
    /// Sentinels sort first, numbers compare numerically, everything else
    /// lexicographically.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        let a_sentinel = a == NULL_VALUE || a == EMPTY_VALUE;
        let b_sentinel = b == NULL_VALUE || b == EMPTY_VALUE;
        match (a_sentinel, b_sentinel) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        match (self.parse_numeric(a), self.parse_numeric(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.cmp(b),
        }
    }

    /// Renders a number for labels.
    pub fn format_number(&self, number: f64) -> String {
        if number.is_nan() {
            return "NaN".to_string();
        }
        if number.is_infinite() {
            return if number > 0.0 { "∞" } else { "-∞" }.to_string();
        }

        let magnitude = number.abs();
        if magnitude > 1e10 || (magnitude > 0.0 && magnitude < 0.01) {
            return format!("{number:.2e}");
        }

        if number.fract() == 0.0 {
            // Covers -0.0 as well.
            return format!("{}", number as i64);
        }

        let fixed = format!("{number:.prec$}", prec = MAX_FRACTION_DIGITS);
        let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
        if trimmed == "-0" {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Formats an interval between two numbers.
    ///
    /// `None` selects the plain `a-b` style used for bin labels.
    pub fn format_interval(&self, min: f64, max: f64, interval: Option<IntervalType>) -> String {
        let min_str = self.format_number(min);
        let max_str = self.format_number(max);

        if min == max {
            return min_str;
        }

        match interval {
            Some(IntervalType::Closed) => format!("[{min_str}, {max_str}]"),
            Some(IntervalType::Open) => format!("({min_str}, {max_str})"),
            Some(IntervalType::LeftOpen) => format!("({min_str}, {max_str}]"),
            Some(IntervalType::RightOpen) => format!("[{min_str}, {max_str})"),
            None => format!("{min_str}-{max_str}"),
        }
    }

    /// Builds a label spanning a group of values.
    ///
    /// A single value labels itself; otherwise the numeric members define the
    /// range. Groups without numeric members fall back to their first value.
    pub fn range_label<S: AsRef<str>>(&self, values: &[S], interval: Option<IntervalType>) -> String {
        match values {
            [] => "Empty".to_string(),
            [single] => single.as_ref().to_string(),
            [first, ..] => {
                let mut bounds: Option<(f64, f64)> = None;
                for value in values {
                    if let Some(number) = self.parse_numeric(value.as_ref()) {
                        bounds = Some(match bounds {
                            None => (number, number),
                            Some((lo, hi)) => (lo.min(number), hi.max(number)),
                        });
                    }
                }

                match bounds {
                    None => first.as_ref().to_string(),
                    Some((min, max)) => self.format_interval(min, max, interval),
                }
            }
        }
    }

    /// Classifies a raw value.
    pub fn detect_value_type(&self, raw: Option<&str>) -> ValueType {
        match self.normalize(raw) {
            NormalizedValue::Null => ValueType::Null,
            NormalizedValue::Empty => ValueType::Empty,
            NormalizedValue::Value(text) if self.is_numeric_value(&text) => ValueType::Numeric,
            NormalizedValue::Value(_) => ValueType::Text,
        }
    }

    /// Whether a numeric value falls inside an interval.
    ///
    /// `None` is treated as a closed interval. Non-numeric values never match.
    pub fn is_value_in_range(
        &self,
        value: &str,
        min: f64,
        max: f64,
        interval: Option<IntervalType>,
    ) -> bool {
        let Some(number) = self.parse_numeric(value) else {
            return false;
        };

        match interval {
            Some(IntervalType::Open) => number > min && number < max,
            Some(IntervalType::LeftOpen) => number > min && number <= max,
            Some(IntervalType::RightOpen) => number >= min && number < max,
            Some(IntervalType::Closed) | None => number >= min && number <= max,
        }
    }

    /// Number of digits after the decimal point of a numeric value.
    pub fn decimal_precision(&self, value: &str) -> usize {
        if !self.is_numeric_value(value) {
            return 0;
        }
        let mantissa = value.split(['e', 'E']).next().unwrap_or(value);
        mantissa
            .split_once('.')
            .map(|(_, fraction)| fraction.len())
            .unwrap_or(0)
    }

    /// Largest precision across values, capped at [`MAX_FRACTION_DIGITS`].
    pub fn recommended_precision<S: AsRef<str>>(&self, values: &[S]) -> usize {
        values
            .iter()
            .map(|v| self.decimal_precision(v.as_ref()))
            .max()
            .unwrap_or(0)
            .min(MAX_FRACTION_DIGITS)
    }
}
