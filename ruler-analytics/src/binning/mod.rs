//! Binning engine: turns a column of normalized values into at most `k`
//! labeled bins.
//!
//! The engine never returns more bins than requested. All sentinel values
//! (`<NULL>` and `<EMPTY>`) share one trailing `<NULL>` bin, and the rest of
//! the budget goes to either a numeric rule ([`numeric`]) or a categorical
//! one ([`categorical`]) depending on the column's content.
//!
//! # Example
//!
//! ```rust
//! use ruler_analytics::binning::{BinningEngine, BinningStrategy};
//! use ruler_analytics::dataset::DataPoint;
//! use ruler_analytics::normalize::Normalizer;
//!
//! let normalizer = Normalizer::new();
//! let raw: Vec<String> = (1..=10).map(|v| v.to_string()).collect();
//! let values: Vec<_> = raw.iter().map(|v| normalizer.normalize(Some(v))).collect();
//! let rows: Vec<_> = raw.iter().enumerate().map(|(i, v)| DataPoint::new(v.clone(), i, 0)).collect();
//!
//! let engine = BinningEngine::new();
//! let result = engine.bin(&values, &rows, 5, BinningStrategy::EqualFrequency)?;
//! assert_eq!(result.ordered_labels, vec!["1-2", "3-4", "5-6", "7-8", "9-10"]);
//! # Ok::<(), ruler_analytics::RulerError>(())
//! ```

pub mod categorical;
pub mod numeric;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::dataset::DataPoint;
use crate::error::{Result, RulerError};
use crate::normalize::{NormalizedValue, Normalizer, NormalizerConfig, DEFAULT_NUMERIC_THRESHOLD};

use self::categorical::Frequencies;
use self::numeric::DistributionShape;

/// Smallest bin count a caller may request.
pub const MIN_BIN_COUNT: usize = 1;
/// Largest bin count a caller may request.
pub const MAX_BIN_COUNT: usize = 50;
/// Bin count used when the caller has no preference.
pub const DEFAULT_BIN_COUNT: usize = 10;
/// Label of the bin collecting every sentinel value.
pub const NULL_BIN_LABEL: &str = "<NULL>";
/// Label of the bin collecting values that were not kept.
pub const OTHER_BIN_LABEL: &str = "Other";

/// How a column is split into bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BinningStrategy {
    EqualFrequency,
    EqualWidth,
    NaturalBreaks,
    Sturges,
    TopK,
    FrequencyThreshold,
    Alphabetical,
    Auto,
}

impl BinningStrategy {
    pub const ALL: [BinningStrategy; 8] = [
        BinningStrategy::EqualFrequency,
        BinningStrategy::EqualWidth,
        BinningStrategy::NaturalBreaks,
        BinningStrategy::Sturges,
        BinningStrategy::TopK,
        BinningStrategy::FrequencyThreshold,
        BinningStrategy::Alphabetical,
        BinningStrategy::Auto,
    ];

    /// Whether the strategy only applies to categorical columns.
    pub fn is_categorical(&self) -> bool {
        matches!(
            self,
            BinningStrategy::TopK | BinningStrategy::FrequencyThreshold | BinningStrategy::Alphabetical
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            BinningStrategy::EqualFrequency => "EQUAL_FREQUENCY",
            BinningStrategy::EqualWidth => "EQUAL_WIDTH",
            BinningStrategy::NaturalBreaks => "NATURAL_BREAKS",
            BinningStrategy::Sturges => "STURGES",
            BinningStrategy::TopK => "TOP_K",
            BinningStrategy::FrequencyThreshold => "FREQUENCY_THRESHOLD",
            BinningStrategy::Alphabetical => "ALPHABETICAL",
            BinningStrategy::Auto => "AUTO",
        }
    }
}

impl fmt::Display for BinningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tunable thresholds of the [`BinningEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct BinningConfig {
    /// Minimum share of records a value needs under FREQUENCY_THRESHOLD (default: 0.01)
    pub frequency_threshold: f64,
    /// AUTO picks natural breaks above this absolute skewness (default: 1.0)
    pub skewness_threshold: f64,
    /// AUTO picks natural breaks above this coefficient of variation (default: 1.0)
    pub cv_threshold: f64,
    /// AUTO picks Sturges below this many numeric records (default: 30)
    pub small_sample_size: usize,
    /// Numeric share of non-sentinel values that makes a column numeric (default: 0.8)
    pub numeric_threshold: f64,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            frequency_threshold: 0.01,
            skewness_threshold: 1.0,
            cv_threshold: 1.0,
            small_sample_size: 30,
            numeric_threshold: DEFAULT_NUMERIC_THRESHOLD,
        }
    }
}

/// Builder for [`BinningEngine`].
#[derive(Debug, Default)]
pub struct BinningEngineBuilder {
    config: BinningConfig,
}

impl BinningEngineBuilder {
    /// Set the FREQUENCY_THRESHOLD ratio
    pub fn frequency_threshold(mut self, ratio: f64) -> Self {
        self.config.frequency_threshold = ratio;
        self
    }

    /// Set the AUTO skewness threshold
    pub fn skewness_threshold(mut self, threshold: f64) -> Self {
        self.config.skewness_threshold = threshold;
        self
    }

    /// Set the AUTO coefficient of variation threshold
    pub fn cv_threshold(mut self, threshold: f64) -> Self {
        self.config.cv_threshold = threshold;
        self
    }

    /// Set the sample size below which AUTO uses Sturges
    pub fn small_sample_size(mut self, size: usize) -> Self {
        self.config.small_sample_size = size;
        self
    }

    /// Set the numeric column threshold
    pub fn numeric_threshold(mut self, threshold: f64) -> Self {
        self.config.numeric_threshold = threshold;
        self
    }

    pub fn build(self) -> BinningEngine {
        let normalizer = Normalizer::with_config(NormalizerConfig {
            numeric_threshold: self.config.numeric_threshold,
        });
        BinningEngine {
            config: self.config,
            normalizer,
        }
    }
}

/// A group of normalized keys sharing a label, produced by a strategy rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub label: String,
    pub keys: Vec<String>,
}

/// One labeled bin and the rows that fell into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub label: String,
    /// Position in display order.
    pub position: usize,
    pub members: Vec<DataPoint>,
}

impl Bin {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Summary of one bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinStatistics {
    pub label: String,
    pub count: usize,
    /// Share of all binned values, in percent.
    pub percentage: f64,
    /// Numeric summaries over members that parse as numbers.
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

/// Output of [`BinningEngine::bin`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningResult {
    /// Normalized value to bin label, for every value seen.
    pub value_to_bin: BTreeMap<String, String>,
    /// Distinct labels in display order.
    pub ordered_labels: Vec<String>,
    /// Bins parallel to `ordered_labels`.
    pub bins: Vec<Bin>,
    /// One label per input position.
    pub binned_values: Vec<String>,
    pub actual_bin_count: usize,
    /// The strategy that actually produced the bins.
    pub strategy: BinningStrategy,
    pub is_numeric: bool,
    pub bin_statistics: Vec<BinStatistics>,
}

impl BinningResult {
    pub fn bin(&self, label: &str) -> Option<&Bin> {
        self.bins.iter().find(|b| b.label == label)
    }

    pub fn label_for(&self, value: &str) -> Option<&str> {
        self.value_to_bin.get(value).map(String::as_str)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.ordered_labels.iter().position(|l| l == label)
    }
}

/// Stateless binning engine.
#[derive(Debug, Clone)]
pub struct BinningEngine {
    config: BinningConfig,
    normalizer: Normalizer,
}

impl Default for BinningEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BinningEngine {
    /// Creates a new builder for configuring the engine
    pub fn builder() -> BinningEngineBuilder {
        BinningEngineBuilder::default()
    }

    /// Creates an engine with default thresholds
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn config(&self) -> &BinningConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Checks that a requested bin count lies in `[MIN_BIN_COUNT, MAX_BIN_COUNT]`.
    pub fn validate_bin_count(requested: usize) -> Result<()> {
        if !(MIN_BIN_COUNT..=MAX_BIN_COUNT).contains(&requested) {
            return Err(RulerError::invalid_argument(format!(
                "bin count must be between {MIN_BIN_COUNT} and {MAX_BIN_COUNT}, got {requested}"
            )));
        }
        Ok(())
    }

    /// Bins `values`, with `row_refs` giving each value's source cell.
    #[instrument(skip(self, values, row_refs), fields(values = values.len()))]
    pub fn bin(
        &self,
        values: &[NormalizedValue],
        row_refs: &[DataPoint],
        requested: usize,
        strategy: BinningStrategy,
    ) -> Result<BinningResult> {
        if values.is_empty() {
            return Err(RulerError::invalid_argument("values must not be empty"));
        }
        if values.len() != row_refs.len() {
            return Err(RulerError::invalid_argument(format!(
                "got {} values but {} row references",
                values.len(),
                row_refs.len()
            )));
        }
        Self::validate_bin_count(requested)?;

        let has_sentinels = values.iter().any(NormalizedValue::is_sentinel);
        let valid: Vec<&str> = values
            .iter()
            .filter(|v| !v.is_sentinel())
            .map(NormalizedValue::as_str)
            .collect();

        if valid.is_empty() {
            debug!("All values are sentinels, using a single bin");
            let partitions = vec![Partition {
                label: NULL_BIN_LABEL.to_string(),
                keys: sentinel_keys(values),
            }];
            return Ok(self.assemble(values, row_refs, partitions, BinningStrategy::EqualFrequency, false));
        }

        let budget = if has_sentinels {
            requested.saturating_sub(1).max(1)
        } else {
            requested
        };

        let is_numeric = self.normalizer.is_numeric_column(values);
        let (mut partitions, used) = if is_numeric {
            self.numeric_partitions(&valid, budget, strategy)
        } else {
            self.categorical_partitions(&valid, budget, strategy)
        };

        if has_sentinels {
            let keys = sentinel_keys(values);
            if requested == 1 {
                // No room for a separate bin.
                if let Some(only) = partitions.first_mut() {
                    only.keys.extend(keys);
                }
            } else {
                partitions.push(Partition {
                    label: NULL_BIN_LABEL.to_string(),
                    keys,
                });
            }
        }

        Ok(self.assemble(values, row_refs, partitions, used, is_numeric))
    }

    fn numeric_partitions(
        &self,
        valid: &[&str],
        budget: usize,
        strategy: BinningStrategy,
    ) -> (Vec<Partition>, BinningStrategy) {
        let mut records = Vec::with_capacity(valid.len());
        let mut others: Vec<String> = Vec::new();
        for key in valid {
            match self.normalizer.parse_numeric(key) {
                Some(number) => records.push((key.to_string(), number)),
                None if !others.iter().any(|o| o == key) => others.push(key.to_string()),
                None => {}
            }
        }

        let numeric_budget = if !others.is_empty() && budget >= 2 {
            budget - 1
        } else {
            budget
        };

        let uniques = numeric::unique_sorted(&records);
        let target = numeric_budget.min(uniques.len()).max(1);

        let resolved = match strategy {
            BinningStrategy::Auto => {
                let parsed: Vec<f64> = records.iter().map(|(_, v)| *v).collect();
                DistributionShape::from_values(&parsed).resolve_auto(&self.config)
            }
            s if s.is_categorical() => {
                debug!(requested = %s, "Categorical strategy on numeric column, using EQUAL_FREQUENCY");
                BinningStrategy::EqualFrequency
            }
            s => s,
        };

        let mut partitions = match resolved {
            BinningStrategy::EqualWidth => numeric::equal_width(&uniques, target, &self.normalizer),
            BinningStrategy::NaturalBreaks => numeric::natural_breaks(&uniques, target, &self.normalizer),
            BinningStrategy::Sturges => {
                let k = numeric::sturges_bin_count(records.len()).min(target);
                numeric::equal_width(&uniques, k, &self.normalizer)
            }
            _ => numeric::equal_frequency(&uniques, target, &self.normalizer),
        };

        if !others.is_empty() {
            if numeric_budget < budget || partitions.is_empty() {
                partitions.push(Partition {
                    label: OTHER_BIN_LABEL.to_string(),
                    keys: others,
                });
            } else if let Some(only) = partitions.first_mut() {
                only.keys.extend(others);
            }
        }

        (partitions, resolved)
    }

    fn categorical_partitions(
        &self,
        valid: &[&str],
        budget: usize,
        strategy: BinningStrategy,
    ) -> (Vec<Partition>, BinningStrategy) {
        let used = if strategy.is_categorical() {
            strategy
        } else {
            BinningStrategy::TopK
        };
        let frequencies = Frequencies::from_keys(valid.iter().copied());
        let partitions = categorical::partition(&frequencies, budget, used, self.config.frequency_threshold);
        (partitions, used)
    }

    fn assemble(
        &self,
        values: &[NormalizedValue],
        row_refs: &[DataPoint],
        partitions: Vec<Partition>,
        strategy: BinningStrategy,
        is_numeric: bool,
    ) -> BinningResult {
        let mut value_to_bin = BTreeMap::new();
        let mut ordered_labels: Vec<String> = Vec::new();
        for partition in partitions {
            if !ordered_labels.contains(&partition.label) {
                ordered_labels.push(partition.label.clone());
            }
            for key in partition.keys {
                value_to_bin.insert(key, partition.label.clone());
            }
        }

        let mut bins: Vec<Bin> = ordered_labels
            .iter()
            .enumerate()
            .map(|(position, label)| Bin {
                label: label.clone(),
                position,
                members: Vec::new(),
            })
            .collect();
        let mut numbers: Vec<Vec<f64>> = vec![Vec::new(); bins.len()];

        let mut binned_values = Vec::with_capacity(values.len());
        for (value, row) in values.iter().zip(row_refs) {
            let label = match value_to_bin.get(value.as_str()) {
                Some(label) => label.clone(),
                None => {
                    // Every strategy covers every key it was given.
                    debug!(value = %value, "Value missing from partition, using last bin");
                    if ordered_labels.is_empty() {
                        ordered_labels.push(OTHER_BIN_LABEL.to_string());
                        bins.push(Bin {
                            label: OTHER_BIN_LABEL.to_string(),
                            position: 0,
                            members: Vec::new(),
                        });
                        numbers.push(Vec::new());
                    }
                    ordered_labels[ordered_labels.len() - 1].clone()
                }
            };
            if let Some(position) = ordered_labels.iter().position(|l| *l == label) {
                bins[position].members.push(row.clone());
                if let Some(number) = self.normalizer.parse_numeric(value.as_str()) {
                    numbers[position].push(number);
                }
            }
            binned_values.push(label);
        }

        let total = values.len();
        let bin_statistics = bins
            .iter()
            .zip(&numbers)
            .map(|(bin, numbers)| bin_statistics(bin, numbers, total))
            .collect();

        debug!(
            bins = ordered_labels.len(),
            strategy = %strategy,
            numeric = is_numeric,
            "Assembled binning result"
        );

        BinningResult {
            value_to_bin,
            actual_bin_count: ordered_labels.len(),
            ordered_labels,
            bins,
            binned_values,
            strategy,
            is_numeric,
            bin_statistics,
        }
    }
}

fn sentinel_keys(values: &[NormalizedValue]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for value in values.iter().filter(|v| v.is_sentinel()) {
        if !keys.iter().any(|k| k == value.as_str()) {
            keys.push(value.as_str().to_string());
        }
    }
    keys
}

fn bin_statistics(bin: &Bin, numbers: &[f64], total: usize) -> BinStatistics {
    let count = bin.members.len();
    let percentage = if total > 0 {
        count as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    let (min, max, mean) = if numbers.is_empty() {
        (None, None, None)
    } else {
        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        (Some(min), Some(max), Some(mean))
    };

    BinStatistics {
        label: bin.label.clone(),
        count,
        percentage,
        min,
        max,
        mean,
    }
}
