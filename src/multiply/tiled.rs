//! Cache-tiled multiplication.
//!
//! The i/j/k index space is cut into `TILE x TILE` blocks so that the three
//! blocks touched by one step (a tile of A, a tile of B and the tile of C they
//! update) stay resident in L1/L2 while they are reused.
//!
//! Row bands of `TILE` rows of C are independent and are distributed over the
//! rayon pool; each worker owns its band exclusively.

use std::cmp::min;

use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::ParallelSliceMut,
};
use tracing::{debug, instrument};

use super::{check_operands, Method, Multiplier};
use crate::error::Result;
use crate::matrix::Matrix;

/// Tile edge. Three `64 x 64` `f32` tiles take 48 KiB.
pub const TILE: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
pub struct TiledMultiplier;

impl Multiplier for TiledMultiplier {
    fn name(&self) -> &'static str {
        Method::Tiled.display_name()
    }

    #[instrument(
        level = "debug",
        name = "tiled",
        skip_all,
        fields(m = a.rows(), n = a.cols(), p = b.cols())
    )]
    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        check_operands(a, b)?;
        let mut c = Matrix::new(a.rows(), b.cols())?;
        debug!(tile = TILE, "cache-tiled sweep");
        matmul_tiled(
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

/// Performs `C += A * B` one `TILE`-row band of C at a time, in parallel.
///
/// Within a band the loops run over (j-tile, k-tile) and then i, k, j inside
/// the clipped tile bounds. k-tiles are swept in ascending order, so every
/// element of C receives its products in the same order as
/// [`matmul_naive`](super::naive::matmul_naive) and the two results are
/// bit-identical.
///
/// # Arguments
///
/// * `a` - Matrix A (m × n), row-major
/// * `b` - Matrix B (n × p), row-major
/// * `c` - Matrix C (m × p), row-major, accumulated into
/// * `m` - Rows of A and C
/// * `n` - Columns of A, rows of B
/// * `p` - Columns of B and C
pub fn matmul_tiled(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, p: usize) {
    assert_eq!(a.len(), m * n, "A: expected {}x{}={} elements", m, n, m * n);
    assert_eq!(b.len(), n * p, "B: expected {}x{}={} elements", n, p, n * p);
    assert_eq!(c.len(), m * p, "C: expected {}x{}={} elements", m, p, m * p);
    if m == 0 || p == 0 {
        return;
    }

    c.par_chunks_mut(TILE * p)
        .enumerate()
        .for_each(|(band_idx, c_band)| {
            let i0 = band_idx * TILE;
            let rows = c_band.len() / p;
            let a_band = &a[i0 * n..(i0 + rows) * n];
            tile_band(a_band, b, c_band, rows, n, p);
        });
}

/// Multiplies one band of `rows` rows of A into the matching band of C.
fn tile_band(a_band: &[f32], b: &[f32], c_band: &mut [f32], rows: usize, n: usize, p: usize) {
    for jj in (0..p).step_by(TILE) {
        let j_end = min(jj + TILE, p);

        for kk in (0..n).step_by(TILE) {
            let k_end = min(kk + TILE, n);

            for i in 0..rows {
                let c_row = &mut c_band[i * p + jj..i * p + j_end];
                let a_row = &a_band[i * n..(i + 1) * n];

                for k in kk..k_end {
                    let a_ik = a_row[k];
                    let b_row = &b[k * p + jj..k * p + j_end];
                    for (c_ij, &b_kj) in c_row.iter_mut().zip(b_row) {
                        *c_ij += a_ik * b_kj;
                    }
                }
            }
        }
    }
}
