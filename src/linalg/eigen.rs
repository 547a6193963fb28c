use alloc::vec::Vec;

use num_complex::Complex;

use crate::linalg::general_eigen::GeneralEigen;
use crate::linalg::settings::EigenSettings;
use crate::linalg::symmetric_eigen::SymmetricEigen;
use crate::linalg::LinalgError;
use crate::matrix::Matrix;
use crate::traits::FloatScalar;

/// Which algorithm [`EigenDecomposition`] routed a matrix to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EigenStrategy {
    /// Symmetric input with vectors: tridiagonal QR with rotation tracking.
    Symmetric,
    /// Non-symmetric input: Hessenberg reduction and double-shift QR.
    General,
    /// Symmetric input, values only: tridiagonal QR that solves 2×2
    /// windows in closed form.
    Fast2x2,
}

impl EigenStrategy {
    /// Pick the strategy for `a` under `settings`.
    pub fn choose<T: FloatScalar>(a: &Matrix<T>, settings: &EigenSettings<T>) -> Self {
        if !a.is_symmetric(settings.symmetry_tol) {
            EigenStrategy::General
        } else if settings.compute_vectors {
            EigenStrategy::Symmetric
        } else {
            EigenStrategy::Fast2x2
        }
    }
}

/// Eigen decomposition of any real square matrix.
///
/// Checks the input for symmetry (relative to `symmetry_tol`) once per call
/// and dispatches to [`SymmetricEigen`] or [`GeneralEigen`]. Results are
/// reported uniformly as complex eigenvalues; symmetric inputs always give
/// real values.
///
/// # Example
///
/// ```
/// use eigensvd::Matrix;
/// use eigensvd::linalg::{EigenDecomposition, EigenSettings, EigenStrategy};
///
/// let mut eig = EigenDecomposition::new(EigenSettings::default());
///
/// let sym = Matrix::from_rows(2, 2, &[2.0_f64, 1.0, 1.0, 2.0]);
/// eig.decompose(&sym).unwrap();
/// assert_eq!(eig.strategy(), Some(EigenStrategy::Symmetric));
///
/// let rot = Matrix::from_rows(2, 2, &[0.0_f64, -1.0, 1.0, 0.0]);
/// eig.decompose(&rot).unwrap();
/// assert_eq!(eig.strategy(), Some(EigenStrategy::General));
/// assert!((eig.eigenvalue(0).im.abs() - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct EigenDecomposition<T> {
    settings: EigenSettings<T>,
    symmetric: SymmetricEigen<T>,
    general: GeneralEigen<T>,
    strategy: Option<EigenStrategy>,
    values: Vec<Complex<T>>,
}

impl<T: FloatScalar> EigenDecomposition<T> {
    pub fn new(settings: EigenSettings<T>) -> Self {
        Self {
            symmetric: SymmetricEigen::new(settings),
            general: GeneralEigen::new(settings),
            settings,
            strategy: None,
            values: Vec::new(),
        }
    }

    pub fn settings(&self) -> &EigenSettings<T> {
        &self.settings
    }

    /// Decompose `a`. Panics if `a` is not square.
    pub fn decompose(&mut self, a: &Matrix<T>) -> Result<(), LinalgError> {
        self.strategy = None;
        self.values.clear();
        if a.is_empty() {
            return Err(LinalgError::EmptyMatrix);
        }
        assert!(a.is_square(), "eigen decomposition requires a square matrix");

        let strategy = EigenStrategy::choose(a, &self.settings);
        log::debug!("eigen: {}x{} routed to {:?}", a.nrows(), a.ncols(), strategy);
        match strategy {
            EigenStrategy::Symmetric | EigenStrategy::Fast2x2 => {
                self.symmetric.decompose(a)?;
                self.values.extend(
                    self.symmetric
                        .eigenvalues()
                        .iter()
                        .map(|&v| Complex::new(v, T::zero())),
                );
            }
            EigenStrategy::General => {
                self.general.decompose(a)?;
                self.values.extend_from_slice(self.general.eigenvalues());
            }
        }
        self.strategy = Some(strategy);
        Ok(())
    }

    /// Strategy used by the last successful call.
    pub fn strategy(&self) -> Option<EigenStrategy> {
        self.strategy
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn eigenvalue(&self, i: usize) -> Complex<T> {
        assert!(i < self.values.len(), "eigenvalue index out of range");
        self.values[i]
    }

    pub fn eigenvalues(&self) -> &[Complex<T>] {
        &self.values
    }

    /// Unit eigenvector of eigenvalue `i`; `None` for complex eigenvalues or
    /// when vectors were not requested.
    pub fn eigenvector(&self, i: usize) -> Option<&[T]> {
        match self.strategy? {
            EigenStrategy::Symmetric | EigenStrategy::Fast2x2 => self.symmetric.eigenvector(i),
            EigenStrategy::General => self.general.eigenvector(i),
        }
    }
}

/// Convenience method for general eigen decomposition.
impl<T: FloatScalar> Matrix<T> {
    /// Eigen decomposition with default settings, dispatched on symmetry.
    ///
    /// ```
    /// use eigensvd::Matrix;
    ///
    /// let a = Matrix::from_rows(2, 2, &[4.0_f64, 1.0, 2.0, 3.0]);
    /// let eig = a.eig().unwrap();
    /// let mut re: Vec<f64> = eig.eigenvalues().iter().map(|c| c.re).collect();
    /// re.sort_by(|a, b| a.partial_cmp(b).unwrap());
    /// assert!((re[0] - 2.0).abs() < 1e-12);
    /// assert!((re[1] - 5.0).abs() < 1e-12);
    /// ```
    pub fn eig(&self) -> Result<EigenDecomposition<T>, LinalgError> {
        let mut eig = EigenDecomposition::new(EigenSettings::with_defaults());
        eig.decompose(self)?;
        Ok(eig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: f64, b: f64, tol: f64, msg: &str) {
        assert!((a - b).abs() < tol, "{}: {} vs {} (diff {})", msg, a, b, (a - b).abs());
    }

    #[test]
    fn strategy_selection() {
        let sym = Matrix::from_rows(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let general = Matrix::from_rows(2, 2, &[1.0, 2.0, 0.0, 1.0]);
        let full = EigenSettings::<f64>::default();
        let values = EigenSettings::<f64>::values_only();
        assert_eq!(EigenStrategy::choose(&sym, &full), EigenStrategy::Symmetric);
        assert_eq!(EigenStrategy::choose(&sym, &values), EigenStrategy::Fast2x2);
        assert_eq!(EigenStrategy::choose(&general, &full), EigenStrategy::General);
        assert_eq!(EigenStrategy::choose(&general, &values), EigenStrategy::General);
    }

    #[test]
    fn near_symmetric_within_tolerance() {
        let a = Matrix::from_rows(2, 2, &[2.0, 1.0, 1.0 + 1e-15, 2.0]);
        let eig = a.eig().unwrap();
        assert_eq!(eig.strategy(), Some(EigenStrategy::Symmetric));
        let mut re: Vec<f64> = eig.eigenvalues().iter().map(|c| c.re).collect();
        re.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_near(re[0], 1.0, 1e-12, "λ₀");
        assert_near(re[1], 3.0, 1e-12, "λ₁");
        assert!(eig.eigenvalues().iter().all(|c| c.im == 0.0));
    }

    #[test]
    fn vectors_follow_strategy() {
        let sym = Matrix::from_rows(3, 3, &[2.0, 1.0, 0.0, 1.0, 2.0, 1.0, 0.0, 1.0, 2.0]);
        let general = Matrix::from_rows(3, 3, &[2.0, 1.0, 0.0, 0.0, 3.0, 1.0, 0.0, 0.0, 4.0]);
        let mut eig = EigenDecomposition::new(EigenSettings::default());
        for a in [&sym, &general] {
            eig.decompose(a).unwrap();
            for i in 0..3 {
                let lambda = eig.eigenvalue(i).re;
                let v = eig.eigenvector(i).unwrap();
                let av = a.mul_vec(v);
                for k in 0..3 {
                    assert_near(av[k], lambda * v[k], 1e-10, "A·v = λ·v");
                }
            }
        }
    }

    #[test]
    fn values_only_symmetric() {
        let a = Matrix::from_rows(2, 2, &[3.0, 1.0, 1.0, 3.0]);
        let mut eig = EigenDecomposition::new(EigenSettings::values_only());
        eig.decompose(&a).unwrap();
        assert_eq!(eig.strategy(), Some(EigenStrategy::Fast2x2));
        assert!(eig.eigenvector(0).is_none());
    }

    #[test]
    fn failure_clears_strategy() {
        let mut settings = EigenSettings::default();
        settings.general_qr.max_iterations = 0;
        let mut eig = EigenDecomposition::new(settings);
        let a = Matrix::from_rows(3, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 10.0]);
        assert_eq!(eig.decompose(&a), Err(LinalgError::ConvergenceFailure));
        assert_eq!(eig.strategy(), None);
        assert_eq!(eig.decompose(&Matrix::zeros(0, 0)), Err(LinalgError::EmptyMatrix));
    }
}
