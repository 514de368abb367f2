//! Panel packing for the blocked multiplier.
//!
//! Both packers copy a cache block of a row-major operand into a contiguous
//! scratch buffer laid out in exactly the order the microkernel consumes it,
//! padding partial panels with zeros so the kernel never needs edge logic.
//!
//! ## Packed A (`mc x kc` block)
//!
//! `ceil(mc / MR)` micro-panels, each `kc * MR` floats, stored column by
//! column:
//!
//! ```text
//! // p = 0:    [ A(ic+ir+0, pc+0), A(ic+ir+1, pc+0), ..., A(ic+ir+MR-1, pc+0) ]
//! // p = 1:    [ A(ic+ir+0, pc+1), A(ic+ir+1, pc+1), ..., A(ic+ir+MR-1, pc+1) ]
//! // ...
//! // p = kc-1: [ A(ic+ir+0, pc+kc-1), ...                                     ]
//! ```
//!
//! ## Packed B (`kc x nc` block)
//!
//! `ceil(nc / NR)` panels, each `kc * NR` floats, stored row by row:
//!
//! ```text
//! // p = 0:    [ B(pc+0, jc+jr+0), B(pc+0, jc+jr+1), ..., B(pc+0, jc+jr+NR-1) ]
//! // ...
//! // p = kc-1: [ B(pc+kc-1, jc+jr+0), ...                                     ]
//! ```

use std::cmp::min;

use super::{MR, NR};

/// Number of floats needed to pack an `mc x kc` block of A.
#[inline]
pub fn packed_a_len(mc: usize, kc: usize) -> usize {
    mc.div_ceil(MR) * MR * kc
}

/// Number of floats needed to pack a `kc x nc` block of B.
#[inline]
pub fn packed_b_len(nc: usize, kc: usize) -> usize {
    nc.div_ceil(NR) * NR * kc
}

/// Packs rows `ic..ic+mc` and columns `pc..pc+kc` of A into MR-tall
/// micro-panels.
///
/// # Arguments
///
/// * `a` - Matrix A, row-major
/// * `lda` - Row stride of A (its number of columns)
/// * `ic`, `mc` - First row and height of the block
/// * `pc`, `kc` - First column and depth of the block
/// * `packed` - Destination, at least `packed_a_len(mc, kc)` floats
#[allow(clippy::too_many_arguments)]
pub fn pack_a(
    a: &[f32],
    lda: usize,
    ic: usize,
    mc: usize,
    pc: usize,
    kc: usize,
    packed: &mut [f32],
) {
    let panel_len = MR * kc;
    debug_assert!(packed.len() >= packed_a_len(mc, kc));

    for (panel, ir) in packed
        .chunks_exact_mut(panel_len)
        .zip((0..mc).step_by(MR))
    {
        let mr = min(MR, mc - ir);

        // Each source row is contiguous in A; scatter it down one lane of the panel.
        for i in 0..mr {
            let src_start = (ic + ir + i) * lda + pc;
            let src = &a[src_start..src_start + kc];
            for (p, &value) in src.iter().enumerate() {
                panel[p * MR + i] = value;
            }
        }

        if mr < MR {
            for column in panel.chunks_exact_mut(MR) {
                column[mr..].fill(0.0);
            }
        }
    }
}

/// Packs rows `pc..pc+kc` and columns `jc..jc+nc` of B into NR-wide panels.
///
/// # Arguments
///
/// * `b` - Matrix B, row-major
/// * `ldb` - Row stride of B (its number of columns)
/// * `pc`, `kc` - First row and depth of the block
/// * `jc`, `nc` - First column and width of the block
/// * `packed` - Destination, at least `packed_b_len(nc, kc)` floats
#[allow(clippy::too_many_arguments)]
pub fn pack_b(
    b: &[f32],
    ldb: usize,
    pc: usize,
    kc: usize,
    jc: usize,
    nc: usize,
    packed: &mut [f32],
) {
    let panel_len = NR * kc;
    debug_assert!(packed.len() >= packed_b_len(nc, kc));

    for (panel, jr) in packed
        .chunks_exact_mut(panel_len)
        .zip((0..nc).step_by(NR))
    {
        let nr = min(NR, nc - jr);

        for (p, dst) in panel.chunks_exact_mut(NR).enumerate() {
            let src_start = (pc + p) * ldb + jc + jr;
            dst[..nr].copy_from_slice(&b[src_start..src_start + nr]);
            dst[nr..].fill(0.0);
        }
    }
}
