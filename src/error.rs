//! Error types for the floor-plan solver.
//!
//! Every fallible operation in the crate returns `JacobiResult<T>`.

use thiserror::Error;

/// Unified error type for loading, solving and reporting.
#[derive(Debug, Error)]
pub enum JacobiError {
    /// The mask is not exactly two cells smaller than the field in each axis.
    #[error("Shape mismatch: field is {field:?}, mask is {mask:?} (expected mask of field - 2)")]
    ShapeMismatch {
        field: (usize, usize),
        mask: (usize, usize),
    },

    /// A stored array does not have the expected grid shape.
    #[error("Unexpected shape in {path}: expected {expected:?}, found {found:?}")]
    UnexpectedShape {
        path: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Negative iteration budget.
    #[error("Invalid iteration count: {0} (must be >= 0)")]
    InvalidIterationCount(i64),

    /// Negative or NaN convergence tolerance.
    #[error("Invalid tolerance: {0} (must be a non-negative number)")]
    InvalidTolerance(f64),

    /// A relaxed cell became NaN or infinite.
    #[error("Non-finite value {value} at cell ({row}, {col}) after {sweeps} sweeps")]
    NonFiniteResult {
        row: usize,
        col: usize,
        value: f64,
        sweeps: usize,
    },

    /// The mask selects no cell, so statistics are undefined.
    #[error("Interior mask selects no cells")]
    EmptyInterior,

    /// GPU backend error.
    #[error("GPU error: {0}")]
    Gpu(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A `.npy` array could not be read.
    #[error("Failed to read {path}: {source}")]
    Npy {
        path: String,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    /// Configuration value is invalid or the config file does not parse.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, JacobiError>`.
pub type JacobiResult<T> = Result<T, JacobiError>;

#[cfg(feature = "python")]
impl From<JacobiError> for pyo3::PyErr {
    fn from(err: JacobiError) -> Self {
        use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
        match err {
            JacobiError::ShapeMismatch { .. }
            | JacobiError::UnexpectedShape { .. }
            | JacobiError::InvalidIterationCount(_)
            | JacobiError::InvalidTolerance(_)
            | JacobiError::EmptyInterior
            | JacobiError::Config(_) => PyValueError::new_err(err.to_string()),
            JacobiError::Io(_) | JacobiError::Npy { .. } => PyIOError::new_err(err.to_string()),
            JacobiError::NonFiniteResult { .. } | JacobiError::Gpu(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
        }
    }
}
