//! Dense `f32` matrix multiplication strategies and a harness that times them.
//!
//! ```
//! use matbench::{Matrix, Method};
//!
//! let a = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;
//! let b = Matrix::from_vec(3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0])?;
//!
//! let method: Method = "goto".parse()?;
//! let c = method.multiplier().multiply(&a, &b)?;
//! assert_eq!(c.as_slice(), &[58.0, 64.0, 139.0, 154.0]);
//! # Ok::<(), matbench::MatbenchError>(())
//! ```

pub mod bench;
pub mod error;
pub mod matrix;
pub mod multiply;
pub mod utils;
pub mod verify;

pub use error::{MatbenchError, Result};
pub use matrix::Matrix;
pub use multiply::{Method, Multiplier};
