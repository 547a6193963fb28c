use crate::traits::FloatScalar;

/// Tuning knobs shared by the implicit-shift QR engines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QrSettings<T> {
    /// Steps allowed on one active window before giving up.
    pub max_iterations: usize,
    /// Steps without a split before an exceptional (random) shift.
    pub exceptional_threshold: usize,
    /// Relative tolerance for negligible elements. An off-diagonal element is
    /// treated as zero when `|off[i]| <= zero_tol * (|diag[i]| + |diag[i+1]|)`.
    pub zero_tol: T,
    /// Seed of the random source used by exceptional shifts.
    pub seed: u64,
    /// Solve 2×2 windows in closed form. Only honored when no vectors are tracked.
    pub fast_values: bool,
}

impl<T: FloatScalar> QrSettings<T> {
    /// Defaults of the bidiagonal and symmetric tridiagonal engines.
    pub fn tridiagonal() -> Self {
        Self {
            max_iterations: 15 * 100,
            exceptional_threshold: 15,
            zero_tol: T::epsilon(),
            seed: 0x34671e,
            fast_values: false,
        }
    }

    /// Defaults of the Hessenberg double-shift engine, where the budget is
    /// counted per eigenvalue.
    pub fn hessenberg() -> Self {
        Self {
            max_iterations: 20 * 20,
            exceptional_threshold: 20,
            zero_tol: T::epsilon(),
            seed: 0x2342,
            fast_values: false,
        }
    }
}

impl Default for QrSettings<f64> {
    fn default() -> Self {
        Self::tridiagonal()
    }
}

impl Default for QrSettings<f32> {
    fn default() -> Self {
        Self::tridiagonal()
    }
}

/// Configuration of [`SvdDecomposition`](super::SvdDecomposition).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvdSettings<T> {
    /// Track the left singular vectors.
    pub compute_u: bool,
    /// Track the right singular vectors.
    pub compute_v: bool,
    /// Return `U` as `m×k` and `V` as `n×k` (`k = min(m, n)`) instead of square.
    pub compact: bool,
    /// Allow the QR-first bidiagonalization for very tall inputs.
    pub allow_tall: bool,
    /// Reject NaN/Inf input before doing any work.
    pub check_finite: bool,
    /// Engine settings.
    pub qr: QrSettings<T>,
}

impl<T: FloatScalar> SvdSettings<T> {
    pub(crate) fn with_defaults() -> Self {
        Self {
            compute_u: true,
            compute_v: true,
            compact: true,
            allow_tall: true,
            check_finite: false,
            qr: QrSettings::tridiagonal(),
        }
    }

    /// Singular values only.
    pub fn values_only() -> Self {
        Self {
            compute_u: false,
            compute_v: false,
            ..Self::with_defaults()
        }
    }
}

impl Default for SvdSettings<f64> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Default for SvdSettings<f32> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// How the symmetric eigen decomposition extracts vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// Values first, then a second pass that tracks vectors and follows the
    /// known values as shifts.
    Separate,
    /// Values and vectors in a single pass.
    Together,
}

/// Configuration of the eigen decompositions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EigenSettings<T> {
    /// Compute eigenvectors as well as eigenvalues.
    pub compute_vectors: bool,
    /// Vector extraction strategy for the symmetric path.
    pub extraction: Extraction,
    /// Relative tolerance used by the dispatcher to classify a matrix as symmetric.
    pub symmetry_tol: T,
    /// Panel width of the blocked tridiagonal reduction; `0` selects the
    /// unblocked reduction.
    pub block_size: usize,
    /// Reject NaN/Inf input before doing any work.
    pub check_finite: bool,
    /// Settings of the symmetric tridiagonal engine.
    pub symmetric_qr: QrSettings<T>,
    /// Settings of the Hessenberg double-shift engine.
    pub general_qr: QrSettings<T>,
}

impl<T: FloatScalar> EigenSettings<T> {
    pub(crate) fn with_defaults() -> Self {
        Self {
            compute_vectors: true,
            extraction: Extraction::Separate,
            symmetry_tol: T::epsilon() * T::lit(100.0),
            block_size: 0,
            check_finite: false,
            symmetric_qr: QrSettings::tridiagonal(),
            general_qr: QrSettings::hessenberg(),
        }
    }

    /// Eigenvalues only.
    pub fn values_only() -> Self {
        Self {
            compute_vectors: false,
            ..Self::with_defaults()
        }
    }
}

impl Default for EigenSettings<f64> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Default for EigenSettings<f32> {
    fn default() -> Self {
        Self::with_defaults()
    }
}
