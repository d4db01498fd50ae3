//! In-memory tabular snapshot.
//!
//! A [`Dataset`] holds headers and rows of raw strings exactly as the CSV
//! collaborator hands them over. Row order is significant: transition
//! matrices follow it. Columns are extracted into parallel vectors of
//! [`NormalizedValue`]s and [`DataPoint`]s, which is the input shape every
//! generator takes.
//!
//! # Example
//!
//! ```rust
//! use ruler_analytics::dataset::Dataset;
//!
//! let dataset = Dataset::new(
//!     vec!["color".to_string(), "size".to_string()],
//!     vec![
//!         vec!["red".to_string(), "10".to_string()],
//!         vec!["n/a".to_string(), "12".to_string()],
//!     ],
//! )?;
//!
//! let color = dataset.column("color")?;
//! assert_eq!(color.values[1].as_str(), "<NULL>");
//! assert_eq!(color.data_points[1].value, "n/a");
//! # Ok::<(), ruler_analytics::RulerError>(())
//! ```

use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Result, RulerError};
use crate::normalize::{NormalizedValue, Normalizer};

/// A raw cell value together with its position in the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataPoint {
    /// The raw, un-normalized cell text.
    pub value: String,
    /// Zero-based row index.
    pub row_index: usize,
    /// Zero-based column index.
    pub column_index: usize,
}

impl DataPoint {
    pub fn new(value: impl Into<String>, row_index: usize, column_index: usize) -> Self {
        Self {
            value: value.into(),
            row_index,
            column_index,
        }
    }
}

/// A single column extracted from a [`Dataset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub index: usize,
    /// Normalized values, one per row.
    pub values: Vec<NormalizedValue>,
    /// Raw cell references, parallel to `values`.
    pub data_points: Vec<DataPoint>,
}

impl Column {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Headers plus rows of raw string cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    #[serde(skip)]
    normalizer: Normalizer,
}

impl Dataset {
    /// Creates a dataset, rejecting rows wider or narrower than the headers.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if headers.is_empty() {
            return Err(RulerError::invalid_argument(
                "dataset must have at least one column",
            ));
        }

        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != headers.len())
        {
            return Err(RulerError::invalid_argument(format!(
                "row {row} has {} cells but the dataset has {} columns",
                cells.len(),
                headers.len()
            )));
        }

        Ok(Self {
            headers,
            rows,
            normalizer: Normalizer::new(),
        })
    }

    /// Uses a custom normalizer for column extraction.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Builds a dataset from an Arrow record batch.
    ///
    /// Every column is cast to Utf8. Arrow nulls become empty cells, which
    /// normalize to `<EMPTY>`.
    #[instrument(skip(batch), fields(rows = batch.num_rows(), columns = batch.num_columns()))]
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let schema = batch.schema();
        let headers: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

        let mut rows = vec![Vec::with_capacity(headers.len()); batch.num_rows()];
        for column in batch.columns() {
            let utf8 = cast(column, &DataType::Utf8)?;
            let strings = utf8.as_string::<i32>();
            for (row, cells) in rows.iter_mut().enumerate() {
                let cell = if strings.is_null(row) {
                    String::new()
                } else {
                    strings.value(row).to_string()
                };
                cells.push(cell);
            }
        }

        debug!(rows = rows.len(), "Ingested record batch");
        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Position of a column in the headers.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Raw cell text, if the position exists.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// Extracts a column as normalized values and data points.
    pub fn column(&self, name: &str) -> Result<Column> {
        let index = self
            .column_index(name)
            .ok_or_else(|| RulerError::column_not_found(name))?;
        Ok(self.column_at(index))
    }

    /// Extracts every column in header order.
    pub fn columns(&self) -> Vec<Column> {
        (0..self.headers.len()).map(|i| self.column_at(i)).collect()
    }

    /// Header names of all adjacent column pairs, left to right.
    pub fn adjacent_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .windows(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect()
    }

    fn column_at(&self, index: usize) -> Column {
        let mut values = Vec::with_capacity(self.rows.len());
        let mut data_points = Vec::with_capacity(self.rows.len());

        for (row_index, row) in self.rows.iter().enumerate() {
            let raw = &row[index];
            values.push(self.normalizer.normalize(Some(raw)));
            data_points.push(DataPoint::new(raw.clone(), row_index, index));
        }

        Column {
            name: self.headers[index].clone(),
            index,
            values,
            data_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sample() -> Dataset {
        Dataset::new(
            strings(&["a", "b", "c"]),
            vec![
                strings(&["1", "x", " null "]),
                strings(&["2", "y", ""]),
                strings(&["3", "x", "z"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Dataset::new(strings(&["a", "b"]), vec![strings(&["1"])]).unwrap_err();
        assert!(matches!(err, RulerError::InvalidArgument(_)));
    }

    #[test]
    fn test_no_headers_rejected() {
        assert!(Dataset::new(vec![], vec![]).is_err());
    }

    #[test]
    fn test_column_extraction() {
        let dataset = sample();
        let column = dataset.column("c").unwrap();
        assert_eq!(column.index, 2);
        assert_eq!(column.len(), 3);
        assert_eq!(column.values[0], NormalizedValue::Null);
        assert_eq!(column.values[1], NormalizedValue::Empty);
        assert_eq!(column.values[2].as_str(), "z");
        assert_eq!(column.data_points[0].value, " null ");
        assert_eq!(column.data_points[2].row_index, 2);
        assert_eq!(column.data_points[2].column_index, 2);
    }

    #[test]
    fn test_missing_column() {
        let err = sample().column("missing").unwrap_err();
        assert!(matches!(err, RulerError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_adjacent_pairs_and_cells() {
        let dataset = sample();
        assert_eq!(
            dataset.adjacent_pairs(),
            vec![
                ("a".to_string(), "b".to_string()),
                ("b".to_string(), "c".to_string())
            ]
        );
        assert_eq!(dataset.cell(1, 1), Some("y"));
        assert_eq!(dataset.cell(5, 0), None);
        assert_eq!(dataset.row_count(), 3);
        assert_eq!(dataset.columns().len(), 3);
    }

    #[test]
    fn test_from_record_batch() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", arrow::datatypes::DataType::Int64, false),
            Field::new("score", arrow::datatypes::DataType::Float64, true),
            Field::new("name", arrow::datatypes::DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(Float64Array::from(vec![Some(1.5), None, Some(3.0)])),
                Arc::new(StringArray::from(vec![Some("ann"), Some("bob"), None])),
            ],
        )
        .unwrap();

        let dataset = Dataset::from_record_batch(&batch).unwrap();
        assert_eq!(dataset.headers(), &strings(&["id", "score", "name"])[..]);
        assert_eq!(dataset.cell(0, 0), Some("1"));
        assert_eq!(dataset.cell(0, 1), Some("1.5"));
        assert_eq!(dataset.cell(1, 1), Some(""));
        assert_eq!(dataset.cell(2, 2), Some(""));

        let score = dataset.column("score").unwrap();
        assert_eq!(score.values[1], NormalizedValue::Empty);
    }
}
