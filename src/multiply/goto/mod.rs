//! GotoBLAS-style blocked multiplication.
//!
//! Classic five-loop Goto/Van de Geijn structure:
//!
//! ```text
//! for jc in 0..P step NC          // L3: column block of B and C
//!   for pc in 0..N step KC        // L1/L2: depth block, pack B (kc x nc)
//!     for ic in 0..M step MC      // parallel: row band of C, pack A (mc x kc)
//!       for jr in 0..nc step NR   // macro-kernel
//!         for ir in 0..mc step MR
//!           microkernel           // MR x NR tile in registers
//! ```
//!
//! The packed B block is shared read-only by every worker. Each `MC`-row band
//! of C is paired with its own packed A slot (`MC x KC` floats) and writes only
//! its own rows, so no two workers ever touch the same output element.
//!
//! # Performance Characteristics
//!
//! - **Microkernel**: 6×16 (MR×NR), 12 accumulator registers on AVX2
//! - **Packing**: contiguous, zero-padded panels; the kernel has no edge code
//! - **Allocation**: one packed B block and one packed A slot per band, all
//!   allocated once per call before the loops; the (jc, pc) steps reuse them

use std::cmp::min;

use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::ParallelSliceMut,
};
use tracing::{debug, instrument};

use super::{check_operands, Method, Multiplier};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::utils::try_alloc_zeroed_f32_vec;

pub mod kernel;
pub mod packing;

use kernel::{MicroKernel, Tile};
use packing::{pack_a, pack_b, packed_a_len, packed_b_len};

/// Microkernel row dimension: rows of C produced per kernel call.
/// Six rows × two vectors fill 12 of the 16 YMM registers.
pub const MR: usize = 6;

/// Microkernel column dimension: two 8-wide `f32` vectors.
pub const NR: usize = 16;

/// Depth of a packed block. One A micro-panel plus one B panel
/// (`KC * (MR + NR) * 4` bytes, about 17 KB) stay in L1.
pub const KC: usize = 192;

/// Rows of a packed A block, a multiple of `MR`. An `MC x KC` block is 144 KB
/// and targets L2. Also the height of one parallel band of C.
pub const MC: usize = 192;

/// Columns of a packed B block, a multiple of `NR`. A `KC x NC` block is 3 MB
/// and targets L3.
pub const NC: usize = 4096;

#[derive(Debug, Clone, Copy, Default)]
pub struct GotoMultiplier;

impl Multiplier for GotoMultiplier {
    fn name(&self) -> &'static str {
        Method::Goto.display_name()
    }

    #[instrument(
        level = "debug",
        name = "goto",
        skip_all,
        fields(m = a.rows(), n = a.cols(), p = b.cols())
    )]
    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        check_operands(a, b)?;
        let mut c = Matrix::new(a.rows(), b.cols())?;
        matmul_goto(
            a.as_slice(),
            b.as_slice(),
            c.as_mut_slice(),
            a.rows(),
            a.cols(),
            b.cols(),
        )?;
        Ok(c)
    }
}

/// Performs `C += A * B` with packed panels and a register microkernel.
///
/// # Arguments
///
/// * `a` - Matrix A (m × n), row-major
/// * `b` - Matrix B (n × p), row-major
/// * `c` - Matrix C (m × p), row-major, accumulated into
/// * `m` - Rows of A and C
/// * `n` - Columns of A, rows of B
/// * `p` - Columns of B and C
///
/// # Errors
///
/// Returns [`AllocationError`](crate::MatbenchError::AllocationError) if a
/// packing buffer cannot be allocated. Both buffers are obtained before C is
/// touched, so C is unchanged in that case.
pub fn matmul_goto(
    a: &[f32],
    b: &[f32],
    c: &mut [f32],
    m: usize,
    n: usize,
    p: usize,
) -> Result<()> {
    assert_eq!(a.len(), m * n, "A: expected {}x{}={} elements", m, n, m * n);
    assert_eq!(b.len(), n * p, "B: expected {}x{}={} elements", n, p, n * p);
    assert_eq!(c.len(), m * p, "C: expected {}x{}={} elements", m, p, m * p);
    if m == 0 || n == 0 || p == 0 {
        return Ok(());
    }

    let (kernel, kernel_name) = kernel::select_kernel();
    debug!(kernel = kernel_name, mc = MC, kc = KC, nc = NC, "goto blocking");

    let mut b_packed = try_alloc_zeroed_f32_vec(packed_b_len(min(NC, p), min(KC, n)))?;
    let a_slot_len = packed_a_len(min(MC, m), min(KC, n));
    let mut a_packed = try_alloc_zeroed_f32_vec(m.div_ceil(MC) * a_slot_len)?;

    for jc in (0..p).step_by(NC) {
        let nc = min(NC, p - jc);

        for pc in (0..n).step_by(KC) {
            let kc = min(KC, n - pc);
            let b_block = &mut b_packed[..packed_b_len(nc, kc)];
            pack_b(b, p, pc, kc, jc, nc, b_block);
            let b_block = &*b_block;

            c.par_chunks_mut(MC * p)
                .zip(a_packed.par_chunks_mut(a_slot_len))
                .enumerate()
                .for_each(|(band_idx, (c_band, a_slot))| {
                    let ic = band_idx * MC;
                    let mc = c_band.len() / p;

                    let a_block = &mut a_slot[..packed_a_len(mc, kc)];
                    pack_a(a, n, ic, mc, pc, kc, a_block);

                    macro_kernel(kernel, a_block, b_block, kc, mc, nc, c_band, p, jc);
                });
        }
    }

    Ok(())
}

/// Runs the microkernel over every (ir, jr) tile of one packed block pair and
/// adds the valid `mr x nr` part of each tile into the C band.
#[allow(clippy::too_many_arguments)]
fn macro_kernel(
    kernel: MicroKernel,
    a_block: &[f32],
    b_block: &[f32],
    kc: usize,
    mc: usize,
    nc: usize,
    c_band: &mut [f32],
    ldc: usize,
    jc: usize,
) {
    let mut tile: Tile = [[0.0; NR]; MR];

    for (jr_idx, b_panel) in b_block.chunks_exact(NR * kc).enumerate() {
        let jr = jr_idx * NR;
        let nr = min(NR, nc - jr);

        for (ir_idx, a_panel) in a_block.chunks_exact(MR * kc).enumerate() {
            let ir = ir_idx * MR;
            let mr = min(MR, mc - ir);

            kernel(kc, a_panel, b_panel, &mut tile);

            for (i, tile_row) in tile.iter().take(mr).enumerate() {
                let start = (ir + i) * ldc + jc + jr;
                for (c_ij, &t) in c_band[start..start + nr].iter_mut().zip(&tile_row[..nr]) {
                    *c_ij += t;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multiply::naive::matmul_naive;

    /// Creates a test matrix with values (row+1) + (col+1)*0.1.
    fn create_test_matrix(rows: usize, cols: usize) -> Vec<f32> {
        (0..rows)
            .flat_map(|i| (0..cols).map(move |j| (i + 1) as f32 + (j + 1) as f32 * 0.1))
            .collect()
    }

    fn assert_close(actual: &[f32], expected: &[f32], what: &str) {
        assert_eq!(actual.len(), expected.len());
        for (i, (&x, &y)) in actual.iter().zip(expected).enumerate() {
            let diff = (x - y).abs();
            let max_val = x.abs().max(y.abs());
            let rel_err = if max_val > 1e-6 { diff / max_val } else { diff };
            assert!(
                rel_err < 1e-4,
                "{}: mismatch at {}: goto={}, naive={}, rel_err={}",
                what,
                i,
                x,
                y,
                rel_err
            );
        }
    }

    fn run_goto_test(m: usize, n: usize, p: usize) {
        let a = create_test_matrix(m, n);
        let b = create_test_matrix(n, p);
        let mut c_goto = vec![0.0; m * p];
        let mut c_naive = vec![0.0; m * p];

        matmul_goto(&a, &b, &mut c_goto, m, n, p).unwrap();
        matmul_naive(&a, &b, &mut c_naive, m, n, p);

        assert_close(&c_goto, &c_naive, &format!("{}x{}x{}", m, n, p));
    }

    #[test]
    fn test_goto_small_exact() {
        run_goto_test(MR, 4, NR);
    }

    #[test]
    fn test_goto_tiny() {
        run_goto_test(1, 1, 1);
        run_goto_test(2, 3, 2);
    }

    #[test]
    fn test_goto_padding() {
        run_goto_test(MR + 1, 5, NR + 1);
        run_goto_test(MR - 1, KC + 1, NR - 1);
    }

    #[test]
    fn test_goto_large() {
        run_goto_test(MC + 7, KC + 13, 2 * NR + 5);
    }

    #[test]
    fn test_goto_multiple_column_blocks() {
        // p > NC: the second jc block re-slices the packed B buffer and offsets
        // every tile by jc.
        run_goto_test(MR + 1, 5, NC + NR + 3);
        run_goto_test(2, KC + 1, 2 * NC + 1);
    }

    #[test]
    fn test_goto_band_slots_reused_across_depth_blocks() {
        // Several bands, each packing into its own slot once per pc step.
        run_goto_test(2 * MC + 5, 2 * KC + 3, NR + 1);
    }

    #[test]
    fn test_goto_nonsquare() {
        run_goto_test(3, 200, 70);
        run_goto_test(250, 2, 9);
    }

    #[test]
    fn test_goto_identity() {
        let size = 20;
        let a = create_test_matrix(size, size);
        let mut identity = vec![0.0; size * size];
        for i in 0..size {
            identity[i * size + i] = 1.0;
        }
        let mut c = vec![0.0; size * size];

        matmul_goto(&a, &identity, &mut c, size, size, size).unwrap();

        assert_eq!(c, a);
    }

    #[test]
    fn test_goto_accumulation() {
        let (m, n, p) = (8, 8, 20);
        let a = create_test_matrix(m, n);
        let b = create_test_matrix(n, p);
        let mut c = vec![1.0; m * p];
        let mut expected = vec![1.0; m * p];

        matmul_goto(&a, &b, &mut c, m, n, p).unwrap();
        matmul_naive(&a, &b, &mut expected, m, n, p);

        assert_close(&c, &expected, "accumulation");
    }

    #[test]
    fn test_goto_multiplier() {
        let a = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Matrix::from_vec(3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
        let c = GotoMultiplier.multiply(&a, &b).unwrap();
        assert_eq!(c.as_slice(), &[58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_goto_empty_is_noop() {
        let mut c: Vec<f32> = Vec::new();
        matmul_goto(&[], &[], &mut c, 0, 0, 0).unwrap();
        assert!(c.is_empty());
    }
}
