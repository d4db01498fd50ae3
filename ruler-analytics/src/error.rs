//! Error types for the Ruler analytics library.
//!
//! All fallible operations return [`Result`], whose error side is
//! [`RulerError`]. Contract violations (bad arguments, re-binning an entity
//! that kept no source data) are reported here. Anomalous data, such as a row
//! whose value cannot be resolved to any bin, is never an error: generators
//! skip it and keep going.

use thiserror::Error;

/// The main error type for the Ruler library.
#[derive(Error, Debug)]
pub enum RulerError {
    /// An argument violated the operation's contract.
    ///
    /// Raised for empty or mismatched inputs, bin counts outside the
    /// supported range, and bipartite graphs requested for columns that are
    /// not adjacent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The entity is not in a state that allows the operation.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A column name is not part of the dataset headers.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// Error from Arrow operations while ingesting a record batch.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A batch worker task panicked or was cancelled.
    #[error("Task join error: {0}")]
    TaskJoin(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, RulerError>`.
pub type Result<T> = std::result::Result<T, RulerError>;

impl RulerError {
    /// Creates an invalid argument error with the given message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates an illegal state error with the given message.
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalState(msg.into())
    }

    /// Creates a column-not-found error.
    pub fn column_not_found(column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
        }
    }

    /// Returns true for contract violations the caller could have avoided.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::ColumnNotFound { .. })
    }
}

impl From<tokio::task::JoinError> for RulerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<RulerError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| prefix(e.into(), msg))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| prefix(e.into(), &f()))
    }
}

/// Prefixes message-carrying variants. Every variant keeps its kind;
/// `ColumnNotFound` and `Arrow` carry structured data and pass through as is.
fn prefix(err: RulerError, msg: &str) -> RulerError {
    match err {
        RulerError::InvalidArgument(inner) => {
            RulerError::InvalidArgument(format!("{msg}: {inner}"))
        }
        RulerError::IllegalState(inner) => RulerError::IllegalState(format!("{msg}: {inner}")),
        RulerError::TaskJoin(inner) => RulerError::TaskJoin(format!("{msg}: {inner}")),
        RulerError::Internal(inner) => RulerError::Internal(format!("{msg}: {inner}")),
        structured @ (RulerError::ColumnNotFound { .. } | RulerError::Arrow(_)) => structured,
    }
}
