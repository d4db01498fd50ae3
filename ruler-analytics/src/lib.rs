//! # Ruler Analytics - Column Distribution Analysis for Rust
//!
//! Ruler turns a tabular dataset of raw string cells into three kinds of
//! column-level views:
//!
//! - a **histogram** per column: how many rows fall into each bin,
//! - a **transition matrix** per column: how often a row in one bin is
//!   followed by a row in another, in row order,
//! - a **bipartite graph** per adjacent column pair: which bins of the left
//!   column co-occur with which bins of the right column.
//!
//! All three sit on one binning engine that never produces more bins than
//! requested, unifies missing-value tokens into a single `<NULL>` bin, and
//! picks numeric or categorical strategies from the data.
//!
//! ## Quick Start
//!
//! ```rust
//! use ruler_analytics::prelude::*;
//!
//! # fn example() -> Result<()> {
//! let dataset = Dataset::new(
//!     vec!["age".to_string(), "city".to_string()],
//!     vec![
//!         vec!["23".to_string(), "Oslo".to_string()],
//!         vec!["41".to_string(), "Lima".to_string()],
//!         vec!["n/a".to_string(), "Oslo".to_string()],
//!         vec!["35".to_string(), "Pune".to_string()],
//!     ],
//! )?;
//!
//! let histograms = HistogramBuilder::new();
//! let age = histograms.build_column(&dataset.column("age")?, 4)?;
//! let city = histograms.build_column(&dataset.column("city")?, 4)?;
//! assert!(age.actual_bin_count <= 4);
//!
//! let matrix = SequenceMatrixBuilder::new().build_column(&dataset.column("city")?, 4)?;
//! assert_eq!(matrix.total_sequences, 3);
//!
//! let graph = BipartiteConnectionBuilder::new().build(&dataset, &age, &city)?;
//! assert_eq!(graph.total_connections, 4);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Architecture
//!
//! - **`normalize`**: sentinel detection, numeric detection, ordering, number
//!   and interval formatting
//! - **`dataset`**: in-memory snapshot of headers and rows, Arrow ingestion
//! - **`binning`**: the binning engine and its numeric and categorical rules
//! - **`analyzers`**: histogram, matrix and bipartite graph builders, plus an
//!   async batch runner over a whole dataset
//! - **`logging`**: log configuration and subscriber setup
//! - **`error`**: error types

pub mod analyzers;
pub mod binning;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod prelude;

pub use error::{Result, RulerError};
