//! Correctness checks between two multiplication results.
//!
//! All reductions accumulate in `f64` so that comparing two 2048×2048 results
//! does not lose the small differences being measured.

use crate::error::{validation_error, Result};
use crate::matrix::Matrix;

fn check_same_shape(x: &Matrix, y: &Matrix) -> Result<()> {
    if x.shape() != y.shape() {
        return Err(validation_error(format!(
            "cannot compare a {}x{} matrix with a {}x{} matrix",
            x.rows(),
            x.cols(),
            y.rows(),
            y.cols()
        )));
    }
    Ok(())
}

/// Mean of the squared pointwise differences, `sum((x - y)^2) / len`.
///
/// # Errors
///
/// Returns [`ValidationError`](crate::MatbenchError::ValidationError) if the
/// shapes differ.
pub fn mean_squared_error(x: &Matrix, y: &Matrix) -> Result<f64> {
    check_same_shape(x, y)?;
    let sum: f64 = x
        .as_slice()
        .iter()
        .zip(y.as_slice())
        .map(|(&a, &b)| {
            let d = f64::from(a) - f64::from(b);
            d * d
        })
        .sum();
    Ok(sum / x.len() as f64)
}

/// Largest absolute pointwise difference.
pub fn max_abs_error(x: &Matrix, y: &Matrix) -> Result<f32> {
    check_same_shape(x, y)?;
    Ok(x.as_slice()
        .iter()
        .zip(y.as_slice())
        .map(|(&a, &b)| (a - b).abs())
        .fold(0.0, f32::max))
}

/// Largest relative pointwise difference.
///
/// The difference is divided by the larger magnitude of the two elements;
/// when both are below `1e-6` the absolute difference is used instead.
pub fn max_relative_error(x: &Matrix, y: &Matrix) -> Result<f32> {
    check_same_shape(x, y)?;
    Ok(x.as_slice()
        .iter()
        .zip(y.as_slice())
        .map(|(&a, &b)| {
            let diff = (a - b).abs();
            let max_val = a.abs().max(b.abs());
            if max_val > 1e-6 {
                diff / max_val
            } else {
                diff
            }
        })
        .fold(0.0, f32::max))
}
