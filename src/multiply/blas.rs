//! Tuned reference implementation backed by `matrixmultiply::sgemm`.
//!
//! Only compiled with the `blas` feature. It is the baseline the hand-written
//! strategies are measured against.

use tracing::instrument;

use super::{check_operands, Method, Multiplier};
use crate::error::Result;
use crate::matrix::Matrix;

#[derive(Debug, Clone, Copy, Default)]
pub struct BlasMultiplier;

impl Multiplier for BlasMultiplier {
    fn name(&self) -> &'static str {
        Method::Blas.display_name()
    }

    #[instrument(
        level = "debug",
        name = "blas",
        skip_all,
        fields(m = a.rows(), n = a.cols(), p = b.cols())
    )]
    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        check_operands(a, b)?;
        let mut c = Matrix::new(a.rows(), b.cols())?;
        matmul_blas(
            a.as_slice(),
            b.as_slice(),
            c.as_mut_slice(),
            a.rows(),
            a.cols(),
            b.cols(),
        );
        Ok(c)
    }
}

/// Computes `C = A * B` (C is overwritten, `beta = 0`).
///
/// All three operands are row-major: row stride is the column count and column
/// stride is 1.
pub fn matmul_blas(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, p: usize) {
    assert_eq!(a.len(), m * n, "A: expected {}x{}={} elements", m, n, m * n);
    assert_eq!(b.len(), n * p, "B: expected {}x{}={} elements", n, p, n * p);
    assert_eq!(c.len(), m * p, "C: expected {}x{}={} elements", m, p, m * p);
    if m == 0 || p == 0 {
        return;
    }

    // SAFETY: the assertions above guarantee every strided access stays inside
    // the three slices, and `c` is exclusively borrowed.
    unsafe {
        matrixmultiply::sgemm(
            m,
            n,
            p,
            1.0,
            a.as_ptr(),
            n as isize,
            1,
            b.as_ptr(),
            p as isize,
            1,
            0.0,
            c.as_mut_ptr(),
            p as isize,
            1,
        );
    }
}
