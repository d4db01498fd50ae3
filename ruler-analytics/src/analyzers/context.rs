//! Container for the results of a batch run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::bipartite::BiPartiteGraph;
use super::histogram::Histogram;
use super::matrix::Matrix;
use crate::error::RulerError;

/// Everything a [`BatchRunner`](super::runner::BatchRunner) produced.
///
/// Outputs keep the dataset's header order, so downstream consumers see
/// columns left to right regardless of which worker finished first. Items
/// that failed are listed in [`errors`](Self::errors) instead.
///
/// # Example
///
/// ```rust,ignore
/// use ruler_analytics::analyzers::BatchRunner;
///
/// let context = BatchRunner::new().bin_count(8).run(dataset).await?;
///
/// for histogram in context.histograms() {
///     println!("{}: {} bins", histogram.column_name, histogram.actual_bin_count);
/// }
/// if let Some(graph) = context.graph("age", "income") {
///     println!("{} links", graph.links.len());
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchContext {
    histograms: Vec<Histogram>,
    matrices: Vec<Matrix>,
    graphs: Vec<BiPartiteGraph>,
    metadata: BatchMetadata,
    errors: Vec<BatchError>,
}

impl BatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(dataset_name: impl Into<String>) -> Self {
        Self {
            metadata: BatchMetadata::with_dataset(dataset_name),
            ..Self::default()
        }
    }

    pub fn store_histogram(&mut self, histogram: Histogram) {
        self.histograms.push(histogram);
    }

    pub fn store_matrix(&mut self, matrix: Matrix) {
        self.matrices.push(matrix);
    }

    pub fn store_graph(&mut self, graph: BiPartiteGraph) {
        self.graphs.push(graph);
    }

    /// Histograms in header order.
    pub fn histograms(&self) -> &[Histogram] {
        &self.histograms
    }

    pub fn matrices(&self) -> &[Matrix] {
        &self.matrices
    }

    /// Graphs in the order of their left column.
    pub fn graphs(&self) -> &[BiPartiteGraph] {
        &self.graphs
    }

    pub fn histogram(&self, column: &str) -> Option<&Histogram> {
        self.histograms.iter().find(|h| h.column_name == column)
    }

    pub fn matrix(&self, column: &str) -> Option<&Matrix> {
        self.matrices.iter().find(|m| m.column_name == column)
    }

    pub fn graph(&self, left: &str, right: &str) -> Option<&BiPartiteGraph> {
        self.graphs
            .iter()
            .find(|g| g.left_column == left && g.right_column == right)
    }

    /// Records a failed item.
    pub fn record_error(&mut self, item: impl Into<String>, error: &RulerError) {
        self.errors.push(BatchError {
            item: item.into(),
            error: error.to_string(),
        });
    }

    pub fn errors(&self) -> &[BatchError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn metadata(&self) -> &BatchMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut BatchMetadata {
        &mut self.metadata
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            histograms: self.histograms.len(),
            matrices: self.matrices.len(),
            graphs: self.graphs.len(),
            errors: self.errors.len(),
            dataset_name: self.metadata.dataset_name.clone(),
            duration_ms: self.metadata.duration().map(|d| d.num_milliseconds()),
        }
    }
}

/// Metadata about a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub dataset_name: Option<String>,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub column_count: usize,
    pub row_count: usize,
    /// Additional custom metadata.
    pub custom: HashMap<String, String>,
}

impl BatchMetadata {
    pub fn with_dataset(name: impl Into<String>) -> Self {
        Self {
            dataset_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn record_start(&mut self) {
        self.start_time = Some(chrono::Utc::now());
    }

    pub fn record_end(&mut self) {
        self.end_time = Some(chrono::Utc::now());
    }

    /// Elapsed time, once both ends are recorded.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn add_custom(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom.insert(key.into(), value.into());
    }
}

/// A batch item that failed, e.g. `histogram.age` or `bipartite.age->income`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    pub item: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub histograms: usize,
    pub matrices: usize,
    pub graphs: usize,
    pub errors: usize,
    pub dataset_name: Option<String>,
    pub duration_ms: Option<i64>,
}
