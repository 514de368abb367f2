//! MR×NR microkernels.
//!
//! A microkernel multiplies one packed A micro-panel (`kc x MR`, column by
//! column) by one packed B panel (`kc x NR`, row by row) and leaves the full
//! `MR x NR` product in a stack [`Tile`]. It never allocates and never looks at
//! matrix extents: edge handling is done by zero padding in the packers and by
//! the caller, which only adds the valid part of the tile into C.

use super::{MR, NR};

/// Register-resident output tile of one microkernel call.
pub type Tile = [[f32; NR]; MR];

/// Signature shared by the microkernel implementations.
///
/// Arguments are `(kc, a_panel, b_panel, tile)`; the tile is overwritten.
pub type MicroKernel = fn(usize, &[f32], &[f32], &mut Tile);

/// Picks the fastest microkernel the running CPU supports.
///
/// Called once per multiplication, outside the blocking loops.
pub fn select_kernel() -> (MicroKernel, &'static str) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return (kernel_avx2, "avx2+fma 6x16");
        }
    }
    (kernel_portable, "portable 6x16")
}

/// Portable microkernel: a rank-1 update of the accumulator array per `k`.
///
/// With `MR` and `NR` known at compile time the `j` loop is a fixed-width
/// vector operation, so the compiler keeps `acc` in vector registers.
#[allow(clippy::needless_range_loop)]
pub fn kernel_portable(kc: usize, a_panel: &[f32], b_panel: &[f32], tile: &mut Tile) {
    let mut acc: Tile = [[0.0; NR]; MR];

    for (a_col, b_row) in a_panel
        .chunks_exact(MR)
        .zip(b_panel.chunks_exact(NR))
        .take(kc)
    {
        for i in 0..MR {
            let a_i = a_col[i];
            for j in 0..NR {
                acc[i][j] += a_i * b_row[j];
            }
        }
    }

    *tile = acc;
}

#[cfg(target_arch = "x86_64")]
fn kernel_avx2(kc: usize, a_panel: &[f32], b_panel: &[f32], tile: &mut Tile) {
    assert!(a_panel.len() >= kc * MR && b_panel.len() >= kc * NR);
    // SAFETY: only returned by `select_kernel` after AVX2 and FMA were
    // detected; the assertion above keeps every load inside the panels.
    unsafe { kernel_6x16_avx2_fma(kc, a_panel.as_ptr(), b_panel.as_ptr(), tile) }
}

/// BLIS-style 6×16 kernel: 12 YMM accumulators (6 rows × 2 vectors of 8).
///
/// Per `k` it loads one 16-wide row of the B panel as two vectors, broadcasts
/// each of the 6 A values and issues 12 FMAs.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn kernel_6x16_avx2_fma(kc: usize, a: *const f32, b: *const f32, tile: &mut Tile) {
    use std::arch::x86_64::*;

    debug_assert_eq!(MR, 6);
    debug_assert_eq!(NR, 16);

    let mut c00 = _mm256_setzero_ps();
    let mut c01 = _mm256_setzero_ps();
    let mut c10 = _mm256_setzero_ps();
    let mut c11 = _mm256_setzero_ps();
    let mut c20 = _mm256_setzero_ps();
    let mut c21 = _mm256_setzero_ps();
    let mut c30 = _mm256_setzero_ps();
    let mut c31 = _mm256_setzero_ps();
    let mut c40 = _mm256_setzero_ps();
    let mut c41 = _mm256_setzero_ps();
    let mut c50 = _mm256_setzero_ps();
    let mut c51 = _mm256_setzero_ps();

    for k in 0..kc {
        let b_row = b.add(k * NR);
        let b0 = _mm256_loadu_ps(b_row); // B[k][0:7]
        let b1 = _mm256_loadu_ps(b_row.add(8)); // B[k][8:15]
        let a_col = a.add(k * MR);

        let a0 = _mm256_broadcast_ss(&*a_col);
        c00 = _mm256_fmadd_ps(a0, b0, c00);
        c01 = _mm256_fmadd_ps(a0, b1, c01);

        let a1 = _mm256_broadcast_ss(&*a_col.add(1));
        c10 = _mm256_fmadd_ps(a1, b0, c10);
        c11 = _mm256_fmadd_ps(a1, b1, c11);

        let a2 = _mm256_broadcast_ss(&*a_col.add(2));
        c20 = _mm256_fmadd_ps(a2, b0, c20);
        c21 = _mm256_fmadd_ps(a2, b1, c21);

        let a3 = _mm256_broadcast_ss(&*a_col.add(3));
        c30 = _mm256_fmadd_ps(a3, b0, c30);
        c31 = _mm256_fmadd_ps(a3, b1, c31);

        let a4 = _mm256_broadcast_ss(&*a_col.add(4));
        c40 = _mm256_fmadd_ps(a4, b0, c40);
        c41 = _mm256_fmadd_ps(a4, b1, c41);

        let a5 = _mm256_broadcast_ss(&*a_col.add(5));
        c50 = _mm256_fmadd_ps(a5, b0, c50);
        c51 = _mm256_fmadd_ps(a5, b1, c51);
    }

    _mm256_storeu_ps(tile[0].as_mut_ptr(), c00);
    _mm256_storeu_ps(tile[0].as_mut_ptr().add(8), c01);
    _mm256_storeu_ps(tile[1].as_mut_ptr(), c10);
    _mm256_storeu_ps(tile[1].as_mut_ptr().add(8), c11);
    _mm256_storeu_ps(tile[2].as_mut_ptr(), c20);
    _mm256_storeu_ps(tile[2].as_mut_ptr().add(8), c21);
    _mm256_storeu_ps(tile[3].as_mut_ptr(), c30);
    _mm256_storeu_ps(tile[3].as_mut_ptr().add(8), c31);
    _mm256_storeu_ps(tile[4].as_mut_ptr(), c40);
    _mm256_storeu_ps(tile[4].as_mut_ptr().add(8), c41);
    _mm256_storeu_ps(tile[5].as_mut_ptr(), c50);
    _mm256_storeu_ps(tile[5].as_mut_ptr().add(8), c51);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panels(kc: usize) -> (Vec<f32>, Vec<f32>) {
        let a = (0..kc * MR).map(|x| (x % 7) as f32 - 3.0).collect();
        let b = (0..kc * NR).map(|x| (x % 5) as f32 + 1.0).collect();
        (a, b)
    }

    fn reference_tile(kc: usize, a: &[f32], b: &[f32]) -> Tile {
        let mut t = [[0.0; NR]; MR];
        for i in 0..MR {
            for j in 0..NR {
                for k in 0..kc {
                    t[i][j] += a[k * MR + i] * b[k * NR + j];
                }
            }
        }
        t
    }

    #[test]
    fn test_kernel_constant_panels() {
        // A = 1, B = 2 over kc = 4 gives 8 everywhere.
        let kc = 4;
        let a = vec![1.0; kc * MR];
        let b = vec![2.0; kc * NR];
        let (kernel, name) = select_kernel();
        let mut tile = [[f32::NAN; NR]; MR];
        kernel(kc, &a, &b, &mut tile);
        for row in &tile {
            for &x in row {
                assert_eq!(x, 8.0, "{} kernel", name);
            }
        }
    }

    #[test]
    fn test_kernels_match_reference() {
        for kc in [1, 2, 7, 64, 192] {
            let (a, b) = panels(kc);
            let expected = reference_tile(kc, &a, &b);

            let mut portable = [[0.0; NR]; MR];
            kernel_portable(kc, &a, &b, &mut portable);
            assert_eq!(portable, expected, "portable kernel, kc={}", kc);

            let (kernel, name) = select_kernel();
            let mut selected = [[0.0; NR]; MR];
            kernel(kc, &a, &b, &mut selected);
            // Small integers: every partial sum is exact under FMA as well.
            assert_eq!(selected, expected, "{} kernel, kc={}", name, kc);
        }
    }

    #[test]
    fn test_kernel_overwrites_tile() {
        let (a, b) = panels(3);
        let (kernel, _) = select_kernel();
        let mut tile = [[1.0e9; NR]; MR];
        kernel(3, &a, &b, &mut tile);
        assert_eq!(tile, reference_tile(3, &a, &b));
    }

    #[test]
    fn test_zero_depth_gives_zero_tile() {
        let (kernel, _) = select_kernel();
        let mut tile = [[5.0; NR]; MR];
        kernel(0, &[], &[], &mut tile);
        assert_eq!(tile, [[0.0; NR]; MR]);
    }
}
