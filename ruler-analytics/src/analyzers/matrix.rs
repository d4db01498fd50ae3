//! Row-order transition matrices.
//!
//! A column is binned, then walked in row order; every consecutive pair of
//! rows adds one to `cells[from][to]`. For `N` rows the cells always sum to
//! `max(N - 1, 0)`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::binning::{Bin, BinningEngine, BinningStrategy};
use crate::dataset::{Column, DataPoint};
use crate::error::{Result, RulerError};
use crate::normalize::NormalizedValue;

/// Transition counts between the bins of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub column_name: String,
    pub requested_bin_count: usize,
    pub actual_bin_count: usize,
    pub ordered_labels: Vec<String>,
    /// `cells[from][to]`, indexed like `ordered_labels`.
    pub cells: Vec<Vec<usize>>,
    pub total_sequences: usize,
    pub bins: Vec<Bin>,
    pub value_to_bin: BTreeMap<String, String>,
    /// `None` when too few rows were available to bin.
    pub strategy: Option<BinningStrategy>,
    #[serde(default)]
    pub original_values: Vec<NormalizedValue>,
    #[serde(default)]
    pub original_points: Vec<DataPoint>,
}

impl Matrix {
    /// Count of transitions from one bin to another.
    pub fn transition(&self, from: &str, to: &str) -> Option<usize> {
        let from = self.ordered_labels.iter().position(|l| l == from)?;
        let to = self.ordered_labels.iter().position(|l| l == to)?;
        Some(self.cells[from][to])
    }

    pub fn size(&self) -> usize {
        self.ordered_labels.len()
    }

    pub fn total_transitions(&self) -> usize {
        self.cells.iter().flatten().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixStatistics {
    pub column_name: String,
    pub size: usize,
    pub total_sequences: usize,
    pub total_transitions: usize,
    pub max_transition: usize,
    pub non_zero_cells: usize,
    /// Share of non-zero cells, `non_zero / size²`.
    pub sparsity: f64,
    pub self_transitions: usize,
    pub self_transition_rate: f64,
}

/// Builds and re-bins transition matrices.
#[derive(Debug, Clone, Default)]
pub struct SequenceMatrixBuilder {
    engine: BinningEngine,
}

impl SequenceMatrixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: BinningEngine) -> Self {
        Self { engine }
    }

    /// Bins the column with AUTO and counts row-to-row transitions.
    ///
    /// Fewer than two rows give an empty matrix.
    #[instrument(skip(self, values, row_refs), fields(values = values.len()))]
    pub fn build(
        &self,
        column: &str,
        values: &[NormalizedValue],
        row_refs: &[DataPoint],
        requested: usize,
    ) -> Result<Matrix> {
        BinningEngine::validate_bin_count(requested)?;
        if values.len() != row_refs.len() {
            return Err(RulerError::invalid_argument(format!(
                "got {} values but {} row references",
                values.len(),
                row_refs.len()
            )));
        }

        if values.len() < 2 {
            debug!(column, "Fewer than two rows, returning empty matrix");
            return Ok(Matrix {
                column_name: column.to_string(),
                requested_bin_count: requested,
                actual_bin_count: 0,
                ordered_labels: Vec::new(),
                cells: Vec::new(),
                total_sequences: 0,
                bins: Vec::new(),
                value_to_bin: BTreeMap::new(),
                strategy: None,
                original_values: values.to_vec(),
                original_points: row_refs.to_vec(),
            });
        }

        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by_key(|&i| row_refs[i].row_index);
        let sorted_values: Vec<NormalizedValue> = order.iter().map(|&i| values[i].clone()).collect();
        let sorted_points: Vec<DataPoint> = order.iter().map(|&i| row_refs[i].clone()).collect();

        let result = self
            .engine
            .bin(&sorted_values, &sorted_points, requested, BinningStrategy::Auto)?;

        let positions: HashMap<&str, usize> = result
            .ordered_labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.as_str(), i))
            .collect();

        let size = result.ordered_labels.len();
        let mut cells = vec![vec![0usize; size]; size];
        for pair in result.binned_values.windows(2) {
            if let (Some(&from), Some(&to)) = (positions.get(pair[0].as_str()), positions.get(pair[1].as_str())) {
                cells[from][to] += 1;
            }
        }

        debug!(column, size, strategy = %result.strategy, "Built transition matrix");

        Ok(Matrix {
            column_name: column.to_string(),
            requested_bin_count: requested,
            actual_bin_count: result.actual_bin_count,
            ordered_labels: result.ordered_labels,
            cells,
            total_sequences: values.len() - 1,
            bins: result.bins,
            value_to_bin: result.value_to_bin,
            strategy: Some(result.strategy),
            original_values: values.to_vec(),
            original_points: row_refs.to_vec(),
        })
    }

    pub fn build_column(&self, column: &Column, requested: usize) -> Result<Matrix> {
        self.build(&column.name, &column.values, &column.data_points, requested)
    }

    /// Rebuilds a matrix with a new bin count from its retained source data.
    pub fn rebin(&self, matrix: &Matrix, new_count: usize) -> Result<Matrix> {
        if matrix.original_values.is_empty() {
            return Err(RulerError::illegal_state(format!(
                "matrix for column '{}' has no original values to re-bin",
                matrix.column_name
            )));
        }
        self.build(
            &matrix.column_name,
            &matrix.original_values,
            &matrix.original_points,
            new_count,
        )
    }

    pub fn statistics(&self, matrix: &Matrix) -> MatrixStatistics {
        let size = matrix.size();
        let total_transitions = matrix.total_transitions();
        let non_zero_cells = matrix.cells.iter().flatten().filter(|c| **c > 0).count();
        let self_transitions: usize = (0..size).map(|i| matrix.cells[i][i]).sum();

        MatrixStatistics {
            column_name: matrix.column_name.clone(),
            size,
            total_sequences: matrix.total_sequences,
            total_transitions,
            max_transition: matrix.cells.iter().flatten().copied().max().unwrap_or(0),
            non_zero_cells,
            sparsity: if size > 0 {
                non_zero_cells as f64 / (size * size) as f64
            } else {
                0.0
            },
            self_transitions,
            self_transition_rate: if total_transitions > 0 {
                self_transitions as f64 / total_transitions as f64
            } else {
                0.0
            },
        }
    }

    /// Checks shape and transition conservation.
    pub fn validate(&self, matrix: &Matrix) -> bool {
        let size = matrix.ordered_labels.len();
        !matrix.column_name.is_empty()
            && matrix.actual_bin_count == size
            && matrix.bins.len() == size
            && matrix.cells.len() == size
            && matrix.cells.iter().all(|row| row.len() == size)
            && matrix.total_transitions() == matrix.total_sequences
    }
}
