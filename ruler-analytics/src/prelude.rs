//! Prelude for commonly used types and traits in ruler-analytics.

pub use crate::analyzers::{
    BatchConfig, BatchContext, BatchRunner, BiPartiteGraph, BipartiteConnectionBuilder, Histogram,
    HistogramBuilder, Matrix, SequenceMatrixBuilder,
};
pub use crate::binning::{BinningEngine, BinningResult, BinningStrategy, DEFAULT_BIN_COUNT};
pub use crate::dataset::{Column, DataPoint, Dataset};
pub use crate::error::{ErrorContext, Result, RulerError};
pub use crate::logging::LogConfig;
pub use crate::normalize::{IntervalType, NormalizedValue, Normalizer};
