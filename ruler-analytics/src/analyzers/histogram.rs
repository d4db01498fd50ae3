//! Histogram generation over a single column.
//!
//! # Example
//!
//! ```rust
//! use ruler_analytics::analyzers::histogram::HistogramBuilder;
//! use ruler_analytics::dataset::Dataset;
//!
//! let dataset = Dataset::new(
//!     vec!["grade".to_string()],
//!     ["A", "A", "B", "C", "D", "E"].iter().map(|v| vec![v.to_string()]).collect(),
//! )?;
//!
//! let builder = HistogramBuilder::new();
//! let histogram = builder.build_column(&dataset.column("grade")?, 3)?;
//! assert_eq!(histogram.ordered_labels, vec!["A", "B", "Other"]);
//! assert_eq!(histogram.frequency("Other"), Some(3));
//!
//! let finer = builder.rebin(&histogram, 10)?;
//! assert_eq!(finer.actual_bin_count, 5);
//! # Ok::<(), ruler_analytics::RulerError>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::binning::{Bin, BinningEngine, BinningStrategy};
use crate::dataset::{Column, DataPoint};
use crate::error::{Result, RulerError};
use crate::normalize::NormalizedValue;

/// Frequency distribution of one column over its bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub column_name: String,
    pub requested_bin_count: usize,
    pub actual_bin_count: usize,
    pub total_records: usize,
    pub ordered_labels: Vec<String>,
    /// Record count per label, parallel to `ordered_labels`.
    pub frequencies: Vec<usize>,
    pub bins: Vec<Bin>,
    pub value_to_bin: BTreeMap<String, String>,
    pub strategy: BinningStrategy,
    /// Source data kept for re-binning.
    #[serde(default)]
    pub original_values: Vec<NormalizedValue>,
    #[serde(default)]
    pub original_points: Vec<DataPoint>,
}

impl Histogram {
    /// Record count of a bin.
    pub fn frequency(&self, label: &str) -> Option<usize> {
        self.ordered_labels
            .iter()
            .position(|l| l == label)
            .and_then(|i| self.frequencies.get(i).copied())
    }

    pub fn bin(&self, label: &str) -> Option<&Bin> {
        self.bins.iter().find(|b| b.label == label)
    }

    /// Label assigned to a normalized value.
    pub fn label_for(&self, value: &str) -> Option<&str> {
        self.value_to_bin.get(value).map(String::as_str)
    }
}

/// Frequency statistics of a histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramStatistics {
    pub column_name: String,
    pub requested_bin_count: usize,
    pub actual_bin_count: usize,
    pub total_records: usize,
    pub max_frequency: usize,
    pub min_frequency: usize,
    pub mean_frequency: f64,
    pub non_empty_bins: usize,
    pub empty_bins: usize,
}

/// Detail view of a single bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSummary {
    pub label: String,
    pub frequency: usize,
    pub percentage: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub members: Vec<DataPoint>,
}

/// Distribution distance between two histograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramComparison {
    pub left_column: String,
    pub right_column: String,
    pub same_actual_bin_count: bool,
    pub same_total_records: bool,
    /// Symmetric chi-square over the union of labels.
    pub chi_square: f64,
    /// `exp(-chi_square / labels)`, 1.0 for identical distributions.
    pub similarity: f64,
}

/// Builds and re-bins histograms.
#[derive(Debug, Clone, Default)]
pub struct HistogramBuilder {
    engine: BinningEngine,
}

impl HistogramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a custom binning engine.
    pub fn with_engine(engine: BinningEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &BinningEngine {
        &self.engine
    }

    /// Builds a histogram with AUTO binning.
    #[instrument(skip(self, values, row_refs), fields(values = values.len()))]
    pub fn build(
        &self,
        column: &str,
        values: &[NormalizedValue],
        row_refs: &[DataPoint],
        requested: usize,
    ) -> Result<Histogram> {
        let result = self.engine.bin(values, row_refs, requested, BinningStrategy::Auto)?;

        let frequencies: Vec<usize> = result.bins.iter().map(Bin::len).collect();
        debug!(
            column,
            bins = result.actual_bin_count,
            strategy = %result.strategy,
            "Built histogram"
        );

        Ok(Histogram {
            column_name: column.to_string(),
            requested_bin_count: requested,
            actual_bin_count: result.actual_bin_count,
            total_records: values.len(),
            ordered_labels: result.ordered_labels,
            frequencies,
            bins: result.bins,
            value_to_bin: result.value_to_bin,
            strategy: result.strategy,
            original_values: values.to_vec(),
            original_points: row_refs.to_vec(),
        })
    }

    /// Builds a histogram for an extracted dataset column.
    pub fn build_column(&self, column: &Column, requested: usize) -> Result<Histogram> {
        self.build(&column.name, &column.values, &column.data_points, requested)
    }

    /// Rebuilds a histogram with a new bin count from its retained source data.
    pub fn rebin(&self, histogram: &Histogram, new_count: usize) -> Result<Histogram> {
        if histogram.original_values.is_empty() {
            return Err(RulerError::illegal_state(format!(
                "histogram for column '{}' has no original values to re-bin",
                histogram.column_name
            )));
        }
        self.build(
            &histogram.column_name,
            &histogram.original_values,
            &histogram.original_points,
            new_count,
        )
    }

    pub fn statistics(&self, histogram: &Histogram) -> HistogramStatistics {
        let frequencies = &histogram.frequencies;
        let non_empty_bins = frequencies.iter().filter(|f| **f > 0).count();
        let mean_frequency = if frequencies.is_empty() {
            0.0
        } else {
            frequencies.iter().sum::<usize>() as f64 / frequencies.len() as f64
        };

        HistogramStatistics {
            column_name: histogram.column_name.clone(),
            requested_bin_count: histogram.requested_bin_count,
            actual_bin_count: histogram.actual_bin_count,
            total_records: histogram.total_records,
            max_frequency: frequencies.iter().copied().max().unwrap_or(0),
            min_frequency: frequencies.iter().copied().min().unwrap_or(0),
            mean_frequency,
            non_empty_bins,
            empty_bins: frequencies.len() - non_empty_bins,
        }
    }

    /// Checks that labels, frequencies and bin members agree.
    pub fn validate(&self, histogram: &Histogram) -> bool {
        if histogram.column_name.is_empty()
            || histogram.frequencies.len() != histogram.ordered_labels.len()
            || histogram.bins.len() != histogram.ordered_labels.len()
            || histogram.actual_bin_count != histogram.ordered_labels.len()
        {
            return false;
        }

        let consistent = histogram
            .ordered_labels
            .iter()
            .zip(&histogram.frequencies)
            .zip(&histogram.bins)
            .all(|((label, frequency), bin)| bin.label == *label && bin.len() == *frequency);

        consistent && histogram.frequencies.iter().sum::<usize>() == histogram.total_records
    }

    /// Frequency, share and numeric summary of one bin.
    pub fn bin_summary(&self, histogram: &Histogram, label: &str) -> Option<BinSummary> {
        let bin = histogram.bin(label)?;
        let normalizer = self.engine.normalizer();

        let mut numbers: Vec<f64> = bin
            .members
            .iter()
            .filter_map(|p| {
                let normalized = normalizer.normalize(Some(&p.value));
                normalizer.parse_numeric(normalized.as_str())
            })
            .collect();
        numbers.sort_by(|a, b| a.total_cmp(b));

        let percentage = if histogram.total_records > 0 {
            bin.len() as f64 / histogram.total_records as f64 * 100.0
        } else {
            0.0
        };

        let (min, max, mean, median) = match (numbers.first(), numbers.last()) {
            (Some(min), Some(max)) => {
                let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
                let mid = numbers.len() / 2;
                let median = if numbers.len() % 2 == 0 {
                    (numbers[mid - 1] + numbers[mid]) / 2.0
                } else {
                    numbers[mid]
                };
                (Some(*min), Some(*max), Some(mean), Some(median))
            }
            _ => (None, None, None, None),
        };

        Some(BinSummary {
            label: bin.label.clone(),
            frequency: bin.len(),
            percentage,
            min,
            max,
            mean,
            median,
            members: bin.members.clone(),
        })
    }

    /// Compares the label distributions of two histograms.
    pub fn compare(&self, left: &Histogram, right: &Histogram) -> Result<HistogramComparison> {
        for histogram in [left, right] {
            if !self.validate(histogram) {
                return Err(RulerError::invalid_argument(format!(
                    "histogram for column '{}' is not well-formed",
                    histogram.column_name
                )));
            }
        }

        let labels: BTreeSet<&str> = left
            .ordered_labels
            .iter()
            .chain(&right.ordered_labels)
            .map(String::as_str)
            .collect();

        let mut chi_square = 0.0;
        for label in &labels {
            let f1 = left.frequency(label).unwrap_or(0) as f64;
            let f2 = right.frequency(label).unwrap_or(0) as f64;
            let expected = (f1 + f2) / 2.0;
            if expected > 0.0 {
                chi_square += (f1 - expected).powi(2) / expected;
                chi_square += (f2 - expected).powi(2) / expected;
            }
        }

        let similarity = if labels.is_empty() {
            1.0
        } else {
            (-chi_square / labels.len() as f64).exp()
        };

        Ok(HistogramComparison {
            left_column: left.column_name.clone(),
            right_column: right.column_name.clone(),
            same_actual_bin_count: left.actual_bin_count == right.actual_bin_count,
            same_total_records: left.total_records == right.total_records,
            chi_square,
            similarity,
        })
    }
}
