//! # eigensvd
//!
//! Dense real singular value and eigenvalue decompositions built on one
//! implicit-shift QR engine family, no-std compatible (with `alloc`).
//!
//! ## Quick start
//!
//! ```
//! use eigensvd::Matrix;
//!
//! let a = Matrix::from_rows(3, 2, &[
//!     3.0_f64, 0.0,
//!     0.0, -2.0,
//!     0.0, 0.0,
//! ]);
//! let svd = a.svd().unwrap();
//! let (sorted, _) = svd.singular_values_sorted();
//! assert!((sorted[0] - 3.0).abs() < 1e-12);
//! assert!((sorted[1] - 2.0).abs() < 1e-12);
//!
//! // Symmetric input is routed to the tridiagonal engine.
//! let s = Matrix::from_rows(2, 2, &[2.0_f64, 1.0, 1.0, 2.0]);
//! let eig = s.eig().unwrap();
//! assert!(eig.eigenvalues().iter().all(|c| c.im == 0.0));
//! ```
//!
//! ## Modules
//!
//! - [`matrix`]: Heap-allocated row-major `Matrix<T>` with runtime
//!   dimensions: construction, indexing, products, transposes and norms.
//!
//! - [`linalg`]: The decompositions and their building blocks:
//!   - [`SvdDecomposition`](linalg::SvdDecomposition): bidiagonalization
//!     (direct, or QR-first for tall inputs) followed by [`SvdQr`](linalg::SvdQr).
//!   - [`SymmetricEigen`](linalg::SymmetricEigen): tridiagonalization (row or
//!     blocked) followed by [`SymmetricQr`](linalg::SymmetricQr).
//!   - [`GeneralEigen`](linalg::GeneralEigen): Hessenberg reduction followed
//!     by the Francis double-shift [`DoubleStepQr`](linalg::DoubleStepQr).
//!   - [`EigenDecomposition`](linalg::EigenDecomposition): symmetry check and
//!     dispatch between the two eigen paths.
//!
//! - [`traits`]: Element and access traits:
//!   - [`Scalar`]: all matrix elements
//!   - [`FloatScalar`]: `f32` / `f64`, used by every algorithm
//!   - [`MatrixRef`] / [`MatrixMut`]: row-slice access for the in-place kernels
//!
//! Every decomposition is a reusable session: construct it once with its
//! settings and call `decompose` repeatedly. Work buffers grow to the largest
//! input seen and are reused afterwards.
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`] facade. Convergence failures emit
//! `warn!`, per-call summaries (strategy chosen, steps taken) emit `debug!`.
//! Nothing is printed unless the application installs a logger.
//!
//! ## Cargo features
//!
//! | Feature | Default  | Description |
//! |---------|----------|-------------|
//! | `std`   | yes      | Hardware FPU via system libm, `std::error::Error` for [`LinalgError`](linalg::LinalgError) |
//! | `libm`  | no       | Pure-Rust software float fallback for `no_std` targets |

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod linalg;
pub mod matrix;
pub mod traits;

pub use linalg::{
    EigenDecomposition, EigenSettings, GeneralEigen, LinalgError, SvdDecomposition, SvdSettings,
    SymmetricEigen,
};
pub use matrix::Matrix;
pub use num_complex::Complex;
pub use traits::{FloatScalar, MatrixMut, MatrixRef, Scalar};
