//! Dense row-major `f32` matrix container.
//!
//! A [`Matrix`] owns a single contiguous buffer of exactly `rows * cols`
//! elements. Element `(i, j)` lives at offset `i * cols + j`. All multipliers
//! read their operands and write their results through this type.
//!
//! # Example
//!
//! ```
//! use matbench::Matrix;
//!
//! let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
//! assert_eq!(m.get(1, 0), Some(4.0));
//! assert_eq!(m.row(0), &[1.0, 2.0, 3.0]);
//! ```

use std::cmp::min;

use rand::Rng;

use crate::error::{allocation_error, invalid_dimensions, validation_error, Result};
use crate::utils::try_alloc_zeroed_f32_vec;

/// Upper bound (exclusive) of the integer values used by [`Matrix::random`].
pub const FILL_RANGE: i32 = 10;

/// Block edge used by [`Matrix::transpose`] so that both the source rows and the
/// destination rows of one block stay cache resident.
const TRANSPOSE_BLOCK: usize = 32;

/// A 2-D array of `f32` stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Creates a zero-initialized `rows x cols` matrix.
    ///
    /// # Errors
    ///
    /// * [`InvalidDimensions`](crate::MatbenchError::InvalidDimensions) if either
    ///   extent is zero.
    /// * [`AllocationError`](crate::MatbenchError::AllocationError) if the buffer
    ///   cannot be obtained.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(invalid_dimensions(rows, cols));
        }
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| allocation_error(usize::MAX, "rows * cols overflows"))?;
        let data = try_alloc_zeroed_f32_vec(len)?;
        Ok(Matrix { rows, cols, data })
    }

    /// Wraps an existing row-major buffer.
    ///
    /// # Errors
    ///
    /// Fails if either extent is zero or `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(invalid_dimensions(rows, cols));
        }
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(validation_error(format!(
                "buffer length {} does not match {}x{}",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Creates a `rows x cols` matrix filled with integer values drawn
    /// uniformly from `[0, FILL_RANGE)`.
    ///
    /// Integer-valued inputs keep every partial sum exactly representable for
    /// the benchmark's sizes, so the correctness check compares exact products.
    pub fn random<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Result<Self> {
        Ok(Self::new(rows, cols)?.fill(|| rng.random_range(0..FILL_RANGE) as f32))
    }

    /// Overwrites every element, in row-major order, with the value produced by
    /// `generator` and returns the matrix for chaining.
    pub fn fill<F: FnMut() -> f32>(mut self, mut generator: F) -> Self {
        self.data.iter_mut().for_each(|x| *x = generator());
        self
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of elements, always `rows * cols`.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false`: zero-sized matrices cannot be constructed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Releases the row-major buffer.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Returns element `(i, j)`, or `None` when out of bounds.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if i < self.rows && j < self.cols {
            Some(self.data[i * self.cols + j])
        } else {
            None
        }
    }

    /// Returns row `i` as a contiguous slice.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Returns a new `cols x rows` matrix holding the transpose.
    ///
    /// The copy walks `TRANSPOSE_BLOCK`-sized squares so that the strided side
    /// of the copy touches a bounded set of cache lines.
    pub fn transpose(&self) -> Result<Matrix> {
        let mut out = Matrix::new(self.cols, self.rows)?;
        let (rows, cols) = (self.rows, self.cols);

        for ib in (0..rows).step_by(TRANSPOSE_BLOCK) {
            let i_end = min(ib + TRANSPOSE_BLOCK, rows);
            for jb in (0..cols).step_by(TRANSPOSE_BLOCK) {
                let j_end = min(jb + TRANSPOSE_BLOCK, cols);
                for i in ib..i_end {
                    for j in jb..j_end {
                        out.data[j * rows + i] = self.data[i * cols + j];
                    }
                }
            }
        }

        Ok(out)
    }
}
