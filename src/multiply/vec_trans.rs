//! Vector-transposed multiplication.
//!
//! B is transposed once into Bᵀ (`p x n`, row-major). Every element of C then
//! becomes the dot product of a row of A and a row of Bᵀ, and both operands
//! are read with unit stride, which is what SIMD loads want.
//!
//! The transpose costs O(n·p) extra memory traffic against the O(m·n·p)
//! multiply. It changes the memory layout, not the algorithmic complexity.

use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::ParallelSliceMut,
};
use tracing::{debug, instrument};

use super::{check_operands, Method, Multiplier};
use crate::error::Result;
use crate::matrix::Matrix;

/// Number of independent partial sums in the portable dot product (one AVX
/// register of `f32`).
pub const LANES: usize = 8;

/// Signature shared by the dot product implementations.
type DotFn = fn(&[f32], &[f32]) -> f32;

#[derive(Debug, Clone, Copy, Default)]
pub struct VecTransMultiplier;

impl Multiplier for VecTransMultiplier {
    fn name(&self) -> &'static str {
        Method::VecTrans.display_name()
    }

    #[instrument(
        level = "debug",
        name = "vec_trans",
        skip_all,
        fields(m = a.rows(), n = a.cols(), p = b.cols())
    )]
    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        check_operands(a, b)?;
        let mut c = Matrix::new(a.rows(), b.cols())?;
        let bt = b.transpose()?;
        matmul_transposed(
            a.as_slice(),
            bt.as_slice(),
            c.as_mut_slice(),
            a.rows(),
            a.cols(),
            b.cols(),
        );
        Ok(c)
    }
}

/// Computes `C = A * B` given `bt = Bᵀ`, one row of C per rayon task.
///
/// # Arguments
///
/// * `a` - Matrix A (m × n), row-major
/// * `bt` - Transposed matrix Bᵀ (p × n), row-major
/// * `c` - Matrix C (m × p), row-major, overwritten
/// * `m` - Rows of A and C
/// * `n` - Columns of A, columns of Bᵀ
/// * `p` - Rows of Bᵀ, columns of C
pub fn matmul_transposed(a: &[f32], bt: &[f32], c: &mut [f32], m: usize, n: usize, p: usize) {
    assert_eq!(a.len(), m * n, "A: expected {}x{}={} elements", m, n, m * n);
    assert_eq!(bt.len(), p * n, "Bt: expected {}x{}={} elements", p, n, p * n);
    assert_eq!(c.len(), m * p, "C: expected {}x{}={} elements", m, p, m * p);
    if m == 0 || p == 0 {
        return;
    }

    let (dot, dot_name) = select_dot();
    debug!(kernel = dot_name, "vector-transposed dot product");

    c.par_chunks_mut(p).enumerate().for_each(|(i, c_row)| {
        let a_row = &a[i * n..(i + 1) * n];
        for (j, c_ij) in c_row.iter_mut().enumerate() {
            *c_ij = dot(a_row, &bt[j * n..(j + 1) * n]);
        }
    });
}

/// Picks the fastest dot product the running CPU supports.
fn select_dot() -> (DotFn, &'static str) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return (dot_avx2, "avx2+fma");
        }
    }
    (dot, "portable")
}

/// Dot product over `LANES` independent accumulators.
///
/// The fixed-width inner loop over `chunks_exact(LANES)` has no cross-lane
/// dependency, so the compiler keeps the accumulators in one vector register.
/// The lanes are summed at the end and the scalar tail is added last.
///
/// # Panics
///
/// Panics if `x` and `y` differ in length.
pub fn dot(x: &[f32], y: &[f32]) -> f32 {
    assert_eq!(x.len(), y.len(), "dot: operand lengths differ");

    let mut acc = [0.0f32; LANES];
    let x_chunks = x.chunks_exact(LANES);
    let y_chunks = y.chunks_exact(LANES);
    let (x_tail, y_tail) = (x_chunks.remainder(), y_chunks.remainder());

    for (xs, ys) in x_chunks.zip(y_chunks) {
        for ((acc_l, &x_l), &y_l) in acc.iter_mut().zip(xs).zip(ys) {
            *acc_l += x_l * y_l;
        }
    }

    let mut sum: f32 = acc.iter().sum();
    for (&x_l, &y_l) in x_tail.iter().zip(y_tail) {
        sum += x_l * y_l;
    }
    sum
}

#[cfg(target_arch = "x86_64")]
fn dot_avx2(x: &[f32], y: &[f32]) -> f32 {
    assert_eq!(x.len(), y.len(), "dot: operand lengths differ");
    // SAFETY: only returned by `select_dot` after AVX2 and FMA were detected.
    unsafe { dot_avx2_fma(x, y) }
}

/// Two 8-wide FMA accumulators, then one 8-wide step, then a scalar tail.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn dot_avx2_fma(x: &[f32], y: &[f32]) -> f32 {
    use std::arch::x86_64::*;

    let len = x.len();
    let (xp, yp) = (x.as_ptr(), y.as_ptr());
    let mut acc0 = _mm256_setzero_ps();
    let mut acc1 = _mm256_setzero_ps();

    let mut i = 0;
    while i + 2 * LANES <= len {
        acc0 = _mm256_fmadd_ps(_mm256_loadu_ps(xp.add(i)), _mm256_loadu_ps(yp.add(i)), acc0);
        acc1 = _mm256_fmadd_ps(
            _mm256_loadu_ps(xp.add(i + LANES)),
            _mm256_loadu_ps(yp.add(i + LANES)),
            acc1,
        );
        i += 2 * LANES;
    }
    if i + LANES <= len {
        acc0 = _mm256_fmadd_ps(_mm256_loadu_ps(xp.add(i)), _mm256_loadu_ps(yp.add(i)), acc0);
        i += LANES;
    }

    let mut lanes = [0.0f32; LANES];
    _mm256_storeu_ps(lanes.as_mut_ptr(), _mm256_add_ps(acc0, acc1));
    let mut sum: f32 = lanes.iter().sum();

    for (&x_l, &y_l) in x[i..].iter().zip(&y[i..]) {
        sum += x_l * y_l;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiply::naive::matmul_naive;

    fn scalar_dot(x: &[f32], y: &[f32]) -> f32 {
        x.iter().zip(y).map(|(a, b)| a * b).sum()
    }

    #[test]
    fn test_dot_all_tail_lengths() {
        for len in 0..(4 * LANES + 3) {
            let x: Vec<f32> = (0..len).map(|i| i as f32).collect();
            let y: Vec<f32> = (0..len).map(|i| (len - i) as f32).collect();
            let expected = scalar_dot(&x, &y);
            assert_eq!(dot(&x, &y), expected, "portable dot, len={}", len);
            let (selected, name) = select_dot();
            assert_eq!(selected(&x, &y), expected, "{} dot, len={}", name, len);
        }
    }

    #[test]
    #[should_panic(expected = "dot: operand lengths differ")]
    fn test_dot_length_mismatch() {
        dot(&[1.0, 2.0], &[1.0]);
    }

    #[test]
    fn test_matches_naive_with_tolerance() {
        for (m, n, p) in [(1, 1, 1), (5, 9, 3), (17, 33, 12), (40, 70, 31)] {
            let a: Vec<f32> = (0..m * n).map(|x| (x % 13) as f32 * 0.37 - 2.0).collect();
            let b: Vec<f32> = (0..n * p).map(|x| (x % 11) as f32 * 0.21 - 1.0).collect();
            let bt = Matrix::from_vec(n, p, b.clone()).unwrap().transpose().unwrap();

            let mut c_vec = vec![0.0; m * p];
            let mut c_naive = vec![0.0; m * p];
            matmul_transposed(&a, bt.as_slice(), &mut c_vec, m, n, p);
            matmul_naive(&a, &b, &mut c_naive, m, n, p);

            for i in 0..m * p {
                let diff = (c_vec[i] - c_naive[i]).abs();
                let max_val = c_vec[i].abs().max(c_naive[i].abs());
                let rel_err = if max_val > 1e-6 { diff / max_val } else { diff };
                assert!(
                    rel_err < 1e-4,
                    "{}x{}x{} mismatch at {}: vec_trans={}, naive={}",
                    m,
                    n,
                    p,
                    i,
                    c_vec[i],
                    c_naive[i]
                );
            }
        }
    }

    #[test]
    fn test_vec_trans_multiplier() {
        let a = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Matrix::from_vec(3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
        let c = VecTransMultiplier.multiply(&a, &b).unwrap();
        assert_eq!(c.as_slice(), &[58.0, 64.0, 139.0, 154.0]);
    }
}
