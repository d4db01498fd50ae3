//! Generators built on the binning engine.
//!
//! - **Histogram** (`histogram`): frequency per bin of one column
//! - **Transition matrix** (`matrix`): bin-to-bin transitions in row order
//! - **Bipartite graph** (`bipartite`): bin co-occurrence between adjacent
//!   columns
//! - **Batch runner** (`runner`): all of the above for a whole dataset, on
//!   tokio, with per-item failure isolation
//!
//! Every generator is a pure, synchronous function of its input. Re-binning
//! rebuilds from the source data a histogram or matrix retains, so it can be
//! repeated with any bin count.

pub mod bipartite;
pub mod context;
pub mod histogram;
pub mod matrix;
pub mod runner;

pub use bipartite::{
    connection_key, BiPartiteGraph, BipartiteConnectionBuilder, ConnectionDetail, GraphStatistics,
    Link,
};
pub use context::{BatchContext, BatchError, BatchMetadata, BatchSummary};
pub use histogram::{BinSummary, Histogram, HistogramBuilder, HistogramComparison, HistogramStatistics};
pub use matrix::{Matrix, MatrixStatistics, SequenceMatrixBuilder};
pub use runner::{BatchConfig, BatchRunner, ProgressCallback};
