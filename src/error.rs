//! Error types for matbench operations.
//!
//! Every fallible operation in the crate (matrix construction, multiplication,
//! benchmark configuration) reports failures through [`MatbenchError`] instead
//! of panicking, so the benchmark binary can print a diagnostic and exit with a
//! non-zero status.

use thiserror::Error;

/// Errors that can occur during matbench operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatbenchError {
    /// Memory allocation failed.
    #[error("Memory allocation failed: {message} (requested {requested_size} bytes)")]
    AllocationError {
        /// The size in bytes that was requested.
        requested_size: usize,
        /// Human-readable error message.
        message: String,
    },
    /// The inner dimensions of a product do not agree (`A.cols != B.rows`).
    #[error(
        "Dimension mismatch: cannot multiply {a_rows}x{a_cols} by {b_rows}x{b_cols} \
         (A.cols must equal B.rows)"
    )]
    DimensionMismatch {
        a_rows: usize,
        a_cols: usize,
        b_rows: usize,
        b_cols: usize,
    },
    /// A matrix with a zero extent was requested.
    #[error("Invalid dimensions: {rows}x{cols} (rows and cols must be positive)")]
    InvalidDimensions { rows: usize, cols: usize },
    /// An unknown multiplier name was supplied.
    #[error("function \"{name}\" not in: {allowed}")]
    ConfigurationError {
        /// The name that failed to resolve.
        name: String,
        /// The accepted names, formatted as `<a/b/c>`.
        allowed: String,
    },
    /// Input validation error.
    #[error("Validation error: {message}")]
    ValidationError {
        /// Human-readable error message.
        message: String,
    },
}

/// Result type alias for matbench operations.
pub type Result<T> = std::result::Result<T, MatbenchError>;

/// Creates an allocation error.
pub fn allocation_error(requested_size: usize, message: impl Into<String>) -> MatbenchError {
    MatbenchError::AllocationError {
        requested_size,
        message: message.into(),
    }
}

/// Creates a dimension mismatch error from the shapes of both operands.
pub fn dimension_mismatch(a: (usize, usize), b: (usize, usize)) -> MatbenchError {
    MatbenchError::DimensionMismatch {
        a_rows: a.0,
        a_cols: a.1,
        b_rows: b.0,
        b_cols: b.1,
    }
}

/// Creates an invalid dimensions error.
pub fn invalid_dimensions(rows: usize, cols: usize) -> MatbenchError {
    MatbenchError::InvalidDimensions { rows, cols }
}

/// Creates a configuration error for an unknown multiplier name.
pub fn configuration_error(name: impl Into<String>, allowed: impl Into<String>) -> MatbenchError {
    MatbenchError::ConfigurationError {
        name: name.into(),
        allowed: allowed.into(),
    }
}

/// Creates a validation error.
pub fn validation_error(message: impl Into<String>) -> MatbenchError {
    MatbenchError::ValidationError {
        message: message.into(),
    }
}
