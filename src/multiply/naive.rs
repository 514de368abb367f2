use tracing::instrument;

use super::{check_operands, Method, Multiplier};
use crate::error::Result;
use crate::matrix::Matrix;

/// Textbook triple loop. This is the correctness oracle for every other
/// strategy and is deliberately left unoptimized and single-threaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveMultiplier;

impl Multiplier for NaiveMultiplier {
    fn name(&self) -> &'static str {
        Method::Naive.display_name()
    }

    #[instrument(
        level = "debug",
        name = "naive",
        skip_all,
        fields(m = a.rows(), n = a.cols(), p = b.cols())
    )]
    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        check_operands(a, b)?;
        let mut c = Matrix::new(a.rows(), b.cols())?;
        matmul_naive(
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

/// Naive matrix multiplication using i-j-k loop order.
///
/// The innermost loop walks `k`, so `B` is read with stride `p` and every
/// iteration touches a new cache line. Products are accumulated into `C` in
/// ascending `k` order.
///
/// # Arguments
///
/// * `a` - Matrix A (m × n), row-major
/// * `b` - Matrix B (n × p), row-major
/// * `c` - Matrix C (m × p), row-major, accumulated into (C += A * B)
/// * `m` - Rows of A and C
/// * `n` - Columns of A, rows of B
/// * `p` - Columns of B and C
pub fn matmul_naive(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, p: usize) {
    assert_eq!(a.len(), m * n, "A: expected {}x{}={} elements", m, n, m * n);
    assert_eq!(b.len(), n * p, "B: expected {}x{}={} elements", n, p, n * p);
    assert_eq!(c.len(), m * p, "C: expected {}x{}={} elements", m, p, m * p);

    for i in 0..m {
        for j in 0..p {
            for k in 0..n {
                c[i * p + j] += a[i * n + k] * b[k * p + j];
            }
        }
    }
}
