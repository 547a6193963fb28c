pub(crate) mod bidiagonal;
pub(crate) mod double_step_qr;
pub(crate) mod eigen;
pub(crate) mod eigen_small;
pub(crate) mod general_eigen;
pub(crate) mod givens;
pub(crate) mod hessenberg;
pub(crate) mod householder;
pub(crate) mod qr;
mod settings;
pub(crate) mod svd;
pub(crate) mod svd_qr;
pub(crate) mod symmetric_eigen;
pub(crate) mod symmetric_qr;
pub(crate) mod tridiagonal;

pub use bidiagonal::{Bidiagonal, TallBidiagonal};
pub use double_step_qr::DoubleStepQr;
pub use eigen::{EigenDecomposition, EigenStrategy};
pub use eigen_small::{symmetric_2x2_fast, value_2x2};
pub use general_eigen::GeneralEigen;
pub use hessenberg::Hessenberg;
pub use qr::PivotedQr;
pub use settings::{EigenSettings, Extraction, QrSettings, SvdSettings};
pub use svd::SvdDecomposition;
pub use svd_qr::SvdQr;
pub use symmetric_eigen::SymmetricEigen;
pub use symmetric_qr::{SymmetricQr, SymmetricQrHelper};
pub use tridiagonal::{BlockTridiagonal, Tridiagonal};

/// Errors from the decompositions.
///
/// Returned by every `decompose` call and by the factor accessors.
///
/// ```
/// use eigensvd::Matrix;
/// use eigensvd::linalg::{LinalgError, SvdDecomposition, SvdSettings};
///
/// let mut svd = SvdDecomposition::new(SvdSettings::<f64>::default());
/// let empty = Matrix::<f64>::zeros(0, 3);
/// assert_eq!(svd.decompose(&empty).unwrap_err(), LinalgError::EmptyMatrix);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinalgError {
    /// Iterative algorithm did not converge within the iteration budget.
    ConvergenceFailure,
    /// Matrix has zero rows or zero columns.
    EmptyMatrix,
    /// Input contains NaN or infinite values (only checked when requested).
    NonFinite,
    /// A factor was requested that the decomposition was configured not to track.
    NotComputed,
}

impl core::fmt::Display for LinalgError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LinalgError::ConvergenceFailure => write!(f, "iterative algorithm did not converge"),
            LinalgError::EmptyMatrix => write!(f, "matrix has no elements"),
            LinalgError::NonFinite => write!(f, "matrix contains non-finite values"),
            LinalgError::NotComputed => write!(f, "requested factor was not computed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LinalgError {}
