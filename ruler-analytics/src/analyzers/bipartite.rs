//! Bin-to-bin connection graphs between two adjacent columns.
//!
//! The graph reuses the bins of two finished histograms and counts, row by
//! row, which left bin co-occurs with which right bin. Rows whose values
//! cannot be placed in a bin are skipped and counted, never treated as an
//! error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::histogram::Histogram;
use crate::dataset::Dataset;
use crate::error::{Result, RulerError};
use crate::logging::LogConfig;
use crate::normalize::Normalizer;

/// Normalized weight above which a link counts as strong.
pub const STRONG_CONNECTION_THRESHOLD: f64 = 0.7;
/// Normalized weight at or below which a link counts as weak.
pub const WEAK_CONNECTION_THRESHOLD: f64 = 0.3;

/// Key of the link between two bins.
pub fn connection_key(left_bin: &str, right_bin: &str) -> String {
    format!("{left_bin}->{right_bin}")
}

/// An aggregated edge between a left bin and a right bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub left_bin: String,
    pub right_bin: String,
    pub weight: usize,
    /// `weight / total_connections * 100`.
    pub percentage: f64,
    /// `weight / max_weight`.
    pub normalized_weight: f64,
    /// `max(1, ceil(normalized_weight * 10))`.
    pub visual_weight: u32,
}

impl Link {
    pub fn key(&self) -> String {
        connection_key(&self.left_bin, &self.right_bin)
    }
}

/// The row behind one unit of link weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDetail {
    pub row_index: usize,
    pub left_value: String,
    pub right_value: String,
    pub left_bin: String,
    pub right_bin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiPartiteGraph {
    pub left_column: String,
    pub right_column: String,
    /// Rows considered, resolved or not.
    pub total_connections: usize,
    /// Sorted by descending weight, then by key.
    pub links: Vec<Link>,
    /// Connection key to the rows aggregated into that link.
    pub connection_details: BTreeMap<String, Vec<ConnectionDetail>>,
    pub skipped_rows: usize,
}

impl BiPartiteGraph {
    /// The link between two bins and its rows.
    pub fn connection(&self, left_bin: &str, right_bin: &str) -> Option<(&Link, &[ConnectionDetail])> {
        let link = self
            .links
            .iter()
            .find(|l| l.left_bin == left_bin && l.right_bin == right_bin)?;
        let details = self
            .connection_details
            .get(&link.key())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Some((link, details))
    }

    pub fn total_weight(&self) -> usize {
        self.links.iter().map(|l| l.weight).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub total_connections: usize,
    pub unique_connections: usize,
    pub skipped_rows: usize,
    pub max_weight: usize,
    pub min_weight: usize,
    pub avg_weight: f64,
    pub strong_connections: usize,
    pub medium_connections: usize,
    pub weak_connections: usize,
    /// Distinct left bins taking part in a link.
    pub left_bin_count: usize,
    pub right_bin_count: usize,
    /// `unique_connections / (left_bin_count * right_bin_count)`.
    pub density: f64,
}

/// Builds connection graphs from pairs of histograms.
#[derive(Debug, Clone, Default)]
pub struct BipartiteConnectionBuilder {
    normalizer: Normalizer,
    log_config: LogConfig,
}

impl BipartiteConnectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn log_config(&self) -> &LogConfig {
        &self.log_config
    }

    /// Connects the bins of two adjacent columns, row by row.
    #[instrument(skip(self, dataset, left, right), fields(left = %left.column_name, right = %right.column_name))]
    pub fn build(&self, dataset: &Dataset, left: &Histogram, right: &Histogram) -> Result<BiPartiteGraph> {
        let left_index = self.column_index(dataset, &left.column_name)?;
        let right_index = self.column_index(dataset, &right.column_name)?;
        if left_index.abs_diff(right_index) != 1 {
            return Err(RulerError::invalid_argument(format!(
                "columns '{}' (position {left_index}) and '{}' (position {right_index}) are not adjacent",
                left.column_name, right.column_name
            )));
        }

        let mut weights: BTreeMap<String, (String, String, usize)> = BTreeMap::new();
        let mut connection_details: BTreeMap<String, Vec<ConnectionDetail>> = BTreeMap::new();
        let mut skipped_rows = 0usize;

        for (row_index, row) in dataset.rows().iter().enumerate() {
            let left_value = &row[left_index];
            let right_value = &row[right_index];

            let (Some(left_bin), Some(right_bin)) = (
                self.resolve_bin(left, left_value),
                self.resolve_bin(right, right_value),
            ) else {
                skipped_rows += 1;
                debug!(
                    row = row_index,
                    left_value = %self.log_config.truncate(left_value),
                    right_value = %self.log_config.truncate(right_value),
                    "Skipping row with unresolved bin"
                );
                continue;
            };

            let key = connection_key(&left_bin, &right_bin);
            weights
                .entry(key.clone())
                .or_insert_with(|| (left_bin.clone(), right_bin.clone(), 0))
                .2 += 1;
            connection_details.entry(key).or_default().push(ConnectionDetail {
                row_index,
                left_value: left_value.clone(),
                right_value: right_value.clone(),
                left_bin,
                right_bin,
            });
        }

        let total_connections = dataset.row_count();
        let max_weight = weights.values().map(|(_, _, w)| *w).max().unwrap_or(0);

        let mut links: Vec<Link> = weights
            .into_values()
            .map(|(left_bin, right_bin, weight)| {
                let normalized_weight = if max_weight > 0 {
                    weight as f64 / max_weight as f64
                } else {
                    0.0
                };
                let percentage = if total_connections > 0 {
                    weight as f64 / total_connections as f64 * 100.0
                } else {
                    0.0
                };
                Link {
                    left_bin,
                    right_bin,
                    weight,
                    percentage,
                    normalized_weight,
                    visual_weight: ((normalized_weight * 10.0).ceil() as u32).max(1),
                }
            })
            .collect();
        // Stable over the key order of the map.
        links.sort_by(|a, b| b.weight.cmp(&a.weight));

        debug!(
            links = links.len(),
            skipped_rows,
            total_connections,
            "Built bipartite graph"
        );

        Ok(BiPartiteGraph {
            left_column: left.column_name.clone(),
            right_column: right.column_name.clone(),
            total_connections,
            links,
            connection_details,
            skipped_rows,
        })
    }

    /// Rebuilds a graph after its histograms were re-binned.
    pub fn rebuild(
        &self,
        graph: &BiPartiteGraph,
        dataset: &Dataset,
        left: &Histogram,
        right: &Histogram,
    ) -> Result<BiPartiteGraph> {
        if graph.left_column != left.column_name || graph.right_column != right.column_name {
            return Err(RulerError::invalid_argument(format!(
                "graph connects '{}' and '{}' but histograms are for '{}' and '{}'",
                graph.left_column, graph.right_column, left.column_name, right.column_name
            )));
        }
        self.build(dataset, left, right)
    }

    /// Checks that every link is backed by exactly `weight` rows.
    pub fn validate(&self, graph: &BiPartiteGraph) -> bool {
        if graph.left_column.is_empty() || graph.right_column.is_empty() {
            return false;
        }

        let details_match = graph.links.iter().all(|link| {
            graph
                .connection_details
                .get(&link.key())
                .is_some_and(|details| details.len() == link.weight)
        });

        details_match && graph.total_weight() <= graph.total_connections
    }

    pub fn statistics(&self, graph: &BiPartiteGraph) -> GraphStatistics {
        let weights: Vec<usize> = graph.links.iter().map(|l| l.weight).collect();
        let strong = graph
            .links
            .iter()
            .filter(|l| l.normalized_weight > STRONG_CONNECTION_THRESHOLD)
            .count();
        let weak = graph
            .links
            .iter()
            .filter(|l| l.normalized_weight <= WEAK_CONNECTION_THRESHOLD)
            .count();

        let mut left_bins: Vec<&str> = graph.links.iter().map(|l| l.left_bin.as_str()).collect();
        left_bins.sort_unstable();
        left_bins.dedup();
        let mut right_bins: Vec<&str> = graph.links.iter().map(|l| l.right_bin.as_str()).collect();
        right_bins.sort_unstable();
        right_bins.dedup();

        let possible = left_bins.len() * right_bins.len();

        GraphStatistics {
            total_connections: graph.total_connections,
            unique_connections: graph.links.len(),
            skipped_rows: graph.skipped_rows,
            max_weight: weights.iter().copied().max().unwrap_or(0),
            min_weight: weights.iter().copied().min().unwrap_or(0),
            avg_weight: if weights.is_empty() {
                0.0
            } else {
                weights.iter().sum::<usize>() as f64 / weights.len() as f64
            },
            strong_connections: strong,
            medium_connections: graph.links.len() - strong - weak,
            weak_connections: weak,
            left_bin_count: left_bins.len(),
            right_bin_count: right_bins.len(),
            density: if possible > 0 {
                graph.links.len() as f64 / possible as f64
            } else {
                0.0
            },
        }
    }

    fn column_index(&self, dataset: &Dataset, column: &str) -> Result<usize> {
        dataset.column_index(column).ok_or_else(|| {
            RulerError::invalid_argument(format!("column '{column}' is not in the dataset headers"))
        })
    }

    /// Raw value, then its normalized form, then the value as a label itself.
    fn resolve_bin(&self, histogram: &Histogram, raw: &str) -> Option<String> {
        if let Some(label) = histogram.label_for(raw) {
            return Some(label.to_string());
        }

        let normalized = self.normalizer.normalize(Some(raw));
        if let Some(label) = histogram.label_for(normalized.as_str()) {
            return Some(label.to_string());
        }

        histogram
            .ordered_labels
            .iter()
            .find(|label| label.as_str() == raw)
            .cloned()
    }
}
