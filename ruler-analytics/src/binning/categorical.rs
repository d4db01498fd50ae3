//! Partition rules for categorical columns.

use std::collections::HashMap;

use super::{BinningStrategy, Partition, OTHER_BIN_LABEL};

/// Distinct values with their record counts, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frequencies {
    entries: Vec<(String, usize)>,
    total: usize,
}

impl Frequencies {
    pub fn from_keys<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut entries: Vec<(String, usize)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut total = 0;

        for key in keys {
            total += 1;
            match positions.get(key) {
                Some(&i) => entries[i].1 += 1,
                None => {
                    positions.insert(key.to_string(), entries.len());
                    entries.push((key.to_string(), 1));
                }
            }
        }

        Self { entries, total }
    }

    pub fn unique_count(&self) -> usize {
        self.entries.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }

    /// Entries by descending count. The sort is stable, so ties keep their
    /// first-appearance order.
    fn by_frequency(&self) -> Vec<&(String, usize)> {
        let mut ranked: Vec<&(String, usize)> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

/// The `k` most frequent values.
pub fn top_k(frequencies: &Frequencies, k: usize) -> Vec<String> {
    frequencies
        .by_frequency()
        .into_iter()
        .take(k)
        .map(|(key, _)| key.clone())
        .collect()
}

/// Values covering at least `ratio` of all records, most frequent first, at
/// most `k` of them.
pub fn frequency_threshold(frequencies: &Frequencies, ratio: f64, k: usize) -> Vec<String> {
    let threshold = frequencies.total() as f64 * ratio;
    frequencies
        .by_frequency()
        .into_iter()
        .filter(|(_, count)| *count as f64 >= threshold)
        .take(k)
        .map(|(key, _)| key.clone())
        .collect()
}

/// The first `k` values in lexicographic order.
pub fn alphabetical(frequencies: &Frequencies, k: usize) -> Vec<String> {
    let mut keys: Vec<String> = frequencies.entries.iter().map(|(key, _)| key.clone()).collect();
    keys.sort();
    keys.truncate(k);
    keys
}

/// Partitions a categorical column into at most `budget` bins.
///
/// When every distinct value fits, each gets its own bin. Otherwise
/// `budget - 1` values are kept by the chosen rule and the rest collapse
/// into a trailing `Other` bin. Kept labels are sorted lexicographically.
pub fn partition(
    frequencies: &Frequencies,
    budget: usize,
    strategy: BinningStrategy,
    threshold_ratio: f64,
) -> Vec<Partition> {
    if frequencies.unique_count() <= budget {
        let mut keys: Vec<&String> = frequencies.entries.iter().map(|(key, _)| key).collect();
        keys.sort();
        return keys
            .into_iter()
            .map(|key| Partition {
                label: key.clone(),
                keys: vec![key.clone()],
            })
            .collect();
    }

    let keep = budget.saturating_sub(1);
    let mut kept = match strategy {
        BinningStrategy::FrequencyThreshold => frequency_threshold(frequencies, threshold_ratio, keep),
        BinningStrategy::Alphabetical => alphabetical(frequencies, keep),
        _ => top_k(frequencies, keep),
    };
    kept.sort();

    let mut other = Partition {
        label: OTHER_BIN_LABEL.to_string(),
        keys: Vec::new(),
    };
    for (key, _) in &frequencies.entries {
        if kept.binary_search(key).is_err() {
            other.keys.push(key.clone());
        }
    }

    let mut partitions: Vec<Partition> = kept
        .into_iter()
        .map(|key| Partition {
            label: key.clone(),
            keys: vec![key],
        })
        .collect();
    partitions.push(other);
    partitions
}
