//! Matrix multiplication strategies.
//!
//! Every strategy implements [`Multiplier`], a single capability
//! `multiply(A, B) -> C` over [`Matrix`] values. The active strategies of a
//! benchmark run are resolved once, by name, through [`Method`].
//!
//! | CLI name    | Strategy                                  | Module          |
//! |-------------|-------------------------------------------|-----------------|
//! | `naive`     | i-j-k triple loop, correctness oracle     | [`naive`]       |
//! | `tiled`     | cache-blocked loop nest                   | [`tiled`]       |
//! | `vec_trans` | transpose B, unit-stride dot products     | [`vec_trans`]   |
//! | `goto`      | packed panels + register microkernel      | [`goto`]        |
//! | `blas`      | `matrixmultiply::sgemm` (feature `blas`)  | `blas`          |
//!
//! All strategies take `A` as `M x N` and `B` as `N x P` and return a fresh
//! `M x P` matrix. The inner dimensions are checked before anything is
//! allocated.

use std::fmt;
use std::str::FromStr;

use crate::error::{configuration_error, dimension_mismatch, MatbenchError, Result};
use crate::matrix::Matrix;

#[cfg(feature = "blas")]
pub mod blas;
pub mod goto;
pub mod naive;
pub mod tiled;
pub mod vec_trans;

#[cfg(feature = "blas")]
pub use blas::BlasMultiplier;
pub use goto::GotoMultiplier;
pub use naive::NaiveMultiplier;
pub use tiled::TiledMultiplier;
pub use vec_trans::VecTransMultiplier;

/// The `multiply(A, B) -> C` capability shared by every strategy.
///
/// Implementors hold no state between calls: repeated invocations on the same
/// inputs produce bit-identical results.
pub trait Multiplier: Send + Sync {
    /// Human-readable name used in reports.
    fn name(&self) -> &'static str;

    /// Computes `C = A * B`.
    ///
    /// # Errors
    ///
    /// * [`DimensionMismatch`](MatbenchError::DimensionMismatch) if `a.cols() != b.rows()`.
    /// * [`AllocationError`](MatbenchError::AllocationError) if the result or a
    ///   scratch buffer cannot be allocated.
    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix>;
}

/// Checks the `A.cols == B.rows` precondition shared by every strategy.
pub fn check_operands(a: &Matrix, b: &Matrix) -> Result<()> {
    if a.cols() != b.rows() {
        return Err(dimension_mismatch(a.shape(), b.shape()));
    }
    Ok(())
}

/// Selects a multiplication strategy by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Naive,
    Tiled,
    VecTrans,
    Goto,
    #[cfg(feature = "blas")]
    Blas,
}

impl Method {
    /// Every strategy compiled into this build, in CLI listing order.
    #[cfg(not(feature = "blas"))]
    pub const ALL: &'static [Method] = &[
        Method::Naive,
        Method::Tiled,
        Method::Goto,
        Method::VecTrans,
    ];

    /// Every strategy compiled into this build, in CLI listing order.
    #[cfg(feature = "blas")]
    pub const ALL: &'static [Method] = &[
        Method::Naive,
        Method::Tiled,
        Method::Blas,
        Method::Goto,
        Method::VecTrans,
    ];

    /// Name accepted on the command line.
    pub fn cli_name(self) -> &'static str {
        match self {
            Method::Naive => "naive",
            Method::Tiled => "tiled",
            Method::VecTrans => "vec_trans",
            Method::Goto => "goto",
            #[cfg(feature = "blas")]
            Method::Blas => "blas",
        }
    }

    /// Name printed in benchmark reports.
    pub fn display_name(self) -> &'static str {
        match self {
            Method::Naive => "Naive",
            Method::Tiled => "Cache tiled",
            Method::VecTrans => "Vector-transposed",
            Method::Goto => "Custom GotoBLAS",
            #[cfg(feature = "blas")]
            Method::Blas => "Tuned BLAS",
        }
    }

    /// One-line description for the usage text.
    pub fn description(self) -> &'static str {
        match self {
            Method::Naive => "Standard (naive) i-j-k matmul",
            Method::Tiled => "Cache-tiled matmul",
            Method::VecTrans => "Transpose B, then unit-stride SIMD dot products",
            Method::Goto => "GotoBLAS-style packed panels with a register microkernel",
            #[cfg(feature = "blas")]
            Method::Blas => "Tuned reference implementation (matrixmultiply sgemm)",
        }
    }

    /// The strategy implementing this method.
    pub fn multiplier(self) -> &'static dyn Multiplier {
        match self {
            Method::Naive => &NaiveMultiplier,
            Method::Tiled => &TiledMultiplier,
            Method::VecTrans => &VecTransMultiplier,
            Method::Goto => &GotoMultiplier,
            #[cfg(feature = "blas")]
            Method::Blas => &BlasMultiplier,
        }
    }

    /// Accepted names formatted as `<naive/tiled/goto/vec_trans>`.
    pub fn allowed_names() -> String {
        let names: Vec<&str> = Method::ALL.iter().map(|m| m.cli_name()).collect();
        format!("<{}>", names.join("/"))
    }
}

impl FromStr for Method {
    type Err = MatbenchError;

    fn from_str(s: &str) -> Result<Self> {
        Method::ALL
            .iter()
            .copied()
            .find(|m| m.cli_name() == s)
            .ok_or_else(|| configuration_error(s, Method::allowed_names()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Describes the vector instruction set the runtime-dispatched kernels use on
/// this machine.
#[cfg(target_arch = "x86_64")]
pub fn instruction_set() -> &'static str {
    if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
        "AVX2+FMA"
    } else if is_x86_feature_detected!("sse2") {
        "SSE"
    } else {
        "portable"
    }
}

#[cfg(target_arch = "aarch64")]
pub fn instruction_set() -> &'static str {
    "NEON"
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub fn instruction_set() -> &'static str {
    "portable"
}
