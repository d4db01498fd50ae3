//! Partition rules for numeric columns.
//!
//! Every rule takes the column's distinct numbers in ascending order and a
//! target bin count, and returns the partition in display order. The caller
//! guarantees `1 <= k <= values.len()`.

use std::cmp::Ordering;

use tracing::debug;

use super::{BinningConfig, BinningStrategy, Partition, MAX_BIN_COUNT, MIN_BIN_COUNT};
use crate::normalize::Normalizer;

/// A distinct number together with every key spelling it and its record count.
///
/// `"2"` and `"2.0"` are the same number and always land in the same bin.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueNumber {
    pub value: f64,
    pub keys: Vec<String>,
    pub count: usize,
}

/// Groups parsed `(key, value)` records into distinct numbers, ascending.
pub fn unique_sorted(records: &[(String, f64)]) -> Vec<UniqueNumber> {
    let mut sorted: Vec<&(String, f64)> = records.iter().collect();
    sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let mut uniques: Vec<UniqueNumber> = Vec::new();
    for (key, value) in sorted {
        match uniques.last_mut() {
            Some(last) if last.value == *value => {
                last.count += 1;
                if !last.keys.contains(key) {
                    last.keys.push(key.clone());
                }
            }
            _ => uniques.push(UniqueNumber {
                value: *value,
                keys: vec![key.clone()],
                count: 1,
            }),
        }
    }
    uniques
}

/// Shape statistics driving AUTO strategy selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributionShape {
    pub count: usize,
    pub mean: f64,
    /// Population-moment skewness `m3 / m2^1.5`, 0 for constant data.
    pub skewness: f64,
    /// Sample standard deviation over `|mean|`, 0 when the mean is 0.
    pub coefficient_of_variation: f64,
}

impl DistributionShape {
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                count,
                mean: 0.0,
                skewness: 0.0,
                coefficient_of_variation: 0.0,
            };
        }

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;

        let skewness = if m2 > 0.0 { m3 / m2.powf(1.5) } else { 0.0 };

        let coefficient_of_variation = if count > 1 && mean != 0.0 {
            let sample_variance = m2 * n / (n - 1.0);
            sample_variance.sqrt() / mean.abs()
        } else {
            0.0
        };

        Self {
            count,
            mean,
            skewness,
            coefficient_of_variation,
        }
    }

    /// Picks the numeric strategy AUTO stands for.
    pub fn resolve_auto(&self, config: &BinningConfig) -> BinningStrategy {
        let strategy = if self.skewness.abs() > config.skewness_threshold
            || self.coefficient_of_variation > config.cv_threshold
        {
            BinningStrategy::NaturalBreaks
        } else if self.count < config.small_sample_size {
            BinningStrategy::Sturges
        } else {
            BinningStrategy::EqualFrequency
        };

        debug!(
            skewness = self.skewness,
            cv = self.coefficient_of_variation,
            count = self.count,
            strategy = %strategy,
            "Resolved AUTO binning strategy"
        );
        strategy
    }
}

/// Sturges' rule: `ceil(1 + log2 n)`, clamped to the supported bin range.
pub fn sturges_bin_count(n: usize) -> usize {
    if n == 0 {
        return MIN_BIN_COUNT;
    }
    let k = (1.0 + (n as f64).log2()).ceil() as usize;
    k.clamp(MIN_BIN_COUNT, MAX_BIN_COUNT)
}

/// Splits distinct values into exactly `k` contiguous groups balanced by
/// record count.
///
/// Group `g` aims for `floor(total / k)` records, plus one for the first
/// `total % k` groups. A group closes once the running total reaches its
/// cumulative target, or when the values left are just enough to give every
/// remaining group one.
pub fn equal_frequency(values: &[UniqueNumber], k: usize, normalizer: &Normalizer) -> Vec<Partition> {
    let k = k.clamp(1, values.len().max(1));
    let total: usize = values.iter().map(|u| u.count).sum();
    let base = total / k;
    let extra = total % k;

    let mut partitions = Vec::with_capacity(k);
    let mut group: Vec<&UniqueNumber> = Vec::new();
    let mut cumulative = 0usize;
    let mut boundary = 0usize;

    for (i, unique) in values.iter().enumerate() {
        let g = partitions.len();
        if group.is_empty() {
            boundary += base + usize::from(g < extra);
        }
        group.push(unique);
        cumulative += unique.count;

        let remaining_values = values.len() - i - 1;
        let remaining_groups = k - g - 1;
        let must_close = remaining_values <= remaining_groups;
        if remaining_groups > 0 && (cumulative >= boundary || must_close) {
            partitions.push(group_partition(&group, normalizer));
            group.clear();
        }
    }

    if !group.is_empty() {
        partitions.push(group_partition(&group, normalizer));
    }
    partitions
}

/// Splits `[min, max]` into `k` equal-width intervals. Empty intervals are kept.
pub fn equal_width(values: &[UniqueNumber], k: usize, normalizer: &Normalizer) -> Vec<Partition> {
    let (Some(first), Some(last)) = (values.first(), values.last()) else {
        return Vec::new();
    };
    let (min, max) = (first.value, last.value);

    if min == max || k <= 1 {
        let keys = values.iter().flat_map(|u| u.keys.iter().cloned()).collect();
        let label = if min == max {
            normalizer.format_number(min)
        } else {
            normalizer.format_interval(min, max, None)
        };
        return vec![Partition { label, keys }];
    }

    let width = (max - min) / k as f64;
    let mut partitions: Vec<Partition> = (0..k)
        .map(|i| {
            let lower = min + width * i as f64;
            let upper = if i + 1 == k {
                max
            } else {
                min + width * (i + 1) as f64
            };
            Partition {
                label: normalizer.format_interval(lower, upper, None),
                keys: Vec::new(),
            }
        })
        .collect();

    for unique in values {
        let index = ((unique.value - min) / width).floor();
        let index = if index.is_finite() && index > 0.0 {
            (index as usize).min(k - 1)
        } else {
            0
        };
        partitions[index].keys.extend(unique.keys.iter().cloned());
    }

    partitions
}

/// Natural breaks over the full record sequence.
///
/// `k - 1` breakpoints are placed at evenly spaced record positions, each
/// moved to the widest gap between neighbouring records within half a step.
/// Breakpoints at or below the minimum, and repeated breakpoints, are
/// dropped, so fewer than `k` bins may come back.
pub fn natural_breaks(values: &[UniqueNumber], k: usize, normalizer: &Normalizer) -> Vec<Partition> {
    if values.is_empty() {
        return Vec::new();
    }

    let records: Vec<f64> = values
        .iter()
        .flat_map(|u| std::iter::repeat(u.value).take(u.count))
        .collect();
    let min = values[0].value;

    let mut breakpoints: Vec<f64> = find_breakpoints(&records, k)
        .into_iter()
        .filter(|b| *b > min)
        .collect();
    breakpoints.dedup();

    let mut groups: Vec<Vec<&UniqueNumber>> = vec![Vec::new(); breakpoints.len() + 1];
    for unique in values {
        let index = breakpoints
            .iter()
            .position(|b| unique.value < *b)
            .unwrap_or(breakpoints.len());
        groups[index].push(unique);
    }

    groups
        .iter()
        .filter(|group| !group.is_empty())
        .map(|group| group_partition(group, normalizer))
        .collect()
}

fn find_breakpoints(sorted: &[f64], k: usize) -> Vec<f64> {
    let n = sorted.len();
    if k <= 1 || n < 2 {
        return Vec::new();
    }

    let step = (n / k).max(1);
    let half = step / 2;
    let mut breakpoints = Vec::with_capacity(k - 1);

    for i in 1..k {
        let index = i * step;
        if index >= n {
            break;
        }

        let mut max_gap = 0.0;
        let mut max_gap_index = index;
        let start = index.saturating_sub(half).max(1);
        let end = (index + half).min(n - 1);
        for j in start..end {
            let gap = sorted[j] - sorted[j - 1];
            if gap > max_gap {
                max_gap = gap;
                max_gap_index = j;
            }
        }

        breakpoints.push(sorted[max_gap_index]);
    }

    breakpoints
}

fn group_partition(group: &[&UniqueNumber], normalizer: &Normalizer) -> Partition {
    let keys: Vec<String> = group.iter().flat_map(|u| u.keys.iter().cloned()).collect();
    let label = normalizer.range_label(&keys, None);
    Partition { label, keys }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniques(values: &[f64]) -> Vec<UniqueNumber> {
        let records: Vec<(String, f64)> = values.iter().map(|v| (v.to_string(), *v)).collect();
        unique_sorted(&records)
    }

    fn labels(partitions: &[Partition]) -> Vec<&str> {
        partitions.iter().map(|p| p.label.as_str()).collect()
    }

    #[test]
    fn test_unique_sorted_merges_spellings() {
        let records = vec![
            ("2".to_string(), 2.0),
            ("10".to_string(), 10.0),
            ("2.0".to_string(), 2.0),
            ("2".to_string(), 2.0),
        ];
        let result = unique_sorted(&records);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].keys, vec!["2".to_string(), "2.0".to_string()]);
        assert_eq!(result[0].count, 3);
        assert_eq!(result[1].value, 10.0);
    }

    #[test]
    fn test_equal_frequency_even_split() {
        let normalizer = Normalizer::new();
        let values = uniques(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let partitions = equal_frequency(&values, 5, &normalizer);
        assert_eq!(labels(&partitions), vec!["1-2", "3-4", "5-6", "7-8", "9-10"]);
    }

    #[test]
    fn test_equal_frequency_balances_records() {
        let normalizer = Normalizer::new();
        // 1 appears 6 times, so it fills the first group on its own.
        let values = uniques(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let partitions = equal_frequency(&values, 2, &normalizer);
        assert_eq!(labels(&partitions), vec!["1", "2-5"]);
    }

    #[test]
    fn test_equal_frequency_always_k_groups() {
        let normalizer = Normalizer::new();
        // Heavy tail value would swallow everything without the forced close.
        let values = uniques(&[1.0, 2.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0]);
        let partitions = equal_frequency(&values, 3, &normalizer);
        assert_eq!(partitions.len(), 3);
        assert_eq!(labels(&partitions), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_equal_width_keeps_empty_intervals() {
        let normalizer = Normalizer::new();
        let values = uniques(&[0.0, 1.0, 10.0]);
        let partitions = equal_width(&values, 5, &normalizer);
        assert_eq!(labels(&partitions), vec!["0-2", "2-4", "4-6", "6-8", "8-10"]);
        assert_eq!(partitions[0].keys, vec!["0".to_string(), "1".to_string()]);
        assert!(partitions[1].keys.is_empty());
        assert_eq!(partitions[4].keys, vec!["10".to_string()]);
    }

    #[test]
    fn test_equal_width_constant_column() {
        let normalizer = Normalizer::new();
        let values = uniques(&[4.0, 4.0]);
        let partitions = equal_width(&values, 1, &normalizer);
        assert_eq!(labels(&partitions), vec!["4"]);
    }

    #[test]
    fn test_natural_breaks_splits_on_gap() {
        let normalizer = Normalizer::new();
        let values = uniques(&[1.0, 2.0, 3.0, 4.0, 100.0, 101.0, 102.0, 103.0]);
        let partitions = natural_breaks(&values, 2, &normalizer);
        assert_eq!(labels(&partitions), vec!["1-4", "100-103"]);
    }

    #[test]
    fn test_natural_breaks_never_exceeds_k() {
        let normalizer = Normalizer::new();
        let values = uniques(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0]);
        let partitions = natural_breaks(&values, 4, &normalizer);
        assert!(partitions.len() <= 4);
        assert!(partitions.iter().all(|p| !p.keys.is_empty()));
        let covered: usize = partitions.iter().map(|p| p.keys.len()).sum();
        assert_eq!(covered, 2);
    }

    #[test]
    fn test_sturges() {
        assert_eq!(sturges_bin_count(0), 1);
        assert_eq!(sturges_bin_count(1), 1);
        assert_eq!(sturges_bin_count(8), 4);
        assert_eq!(sturges_bin_count(10), 5);
        assert_eq!(sturges_bin_count(1_000_000), 21);
    }

    #[test]
    fn test_distribution_shape() {
        let shape = DistributionShape::from_values(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(shape.count, 5);
        assert!((shape.mean - 3.0).abs() < 1e-12);
        assert!(shape.skewness.abs() < 1e-12);
        assert!(shape.coefficient_of_variation < 1.0);

        let constant = DistributionShape::from_values(&[0.0, 0.0]);
        assert_eq!(constant.skewness, 0.0);
        assert_eq!(constant.coefficient_of_variation, 0.0);
    }

    #[test]
    fn test_resolve_auto() {
        let config = BinningConfig::default();

        let small = DistributionShape::from_values(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(small.resolve_auto(&config), BinningStrategy::Sturges);

        let uniform: Vec<f64> = (1..=40).map(|v| v as f64).collect();
        let large = DistributionShape::from_values(&uniform);
        assert_eq!(large.resolve_auto(&config), BinningStrategy::EqualFrequency);

        let mut skewed = vec![1.0; 20];
        skewed.push(1000.0);
        let skewed = DistributionShape::from_values(&skewed);
        assert_eq!(skewed.resolve_auto(&config), BinningStrategy::NaturalBreaks);
    }
}
