use num_complex::Complex;

use crate::linalg::double_step_qr::DoubleStepQr;
use crate::linalg::hessenberg::Hessenberg;
use crate::linalg::settings::EigenSettings;
use crate::linalg::LinalgError;
use crate::matrix::Matrix;
use crate::traits::FloatScalar;

/// Eigen decomposition of a general real square matrix.
///
/// Householder reduction to upper Hessenberg form followed by the Francis
/// double-shift QR iteration. Eigenvalues come out as complex numbers,
/// complex ones in conjugate pairs. With `compute_vectors`, every real
/// eigenvalue also gets a unit eigenvector; complex eigenvalues have none.
///
/// # Example
///
/// ```
/// use eigensvd::Matrix;
/// use eigensvd::linalg::{EigenSettings, GeneralEigen};
///
/// // Upper triangular: the eigenvalues are the diagonal.
/// let a = Matrix::from_rows(3, 3, &[2.0_f64, 1.0, 4.0, 0.0, -1.0, 3.0, 0.0, 0.0, 5.0]);
/// let mut eig = GeneralEigen::new(EigenSettings::default());
/// eig.decompose(&a).unwrap();
///
/// for i in 0..3 {
///     let lambda = eig.eigenvalue(i);
///     assert_eq!(lambda.im, 0.0);
///     let v = eig.eigenvector(i).unwrap();
///     let av = a.mul_vec(v);
///     for k in 0..3 {
///         assert!((av[k] - lambda.re * v[k]).abs() < 1e-12);
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct GeneralEigen<T> {
    settings: EigenSettings<T>,
    hessenberg: Hessenberg<T>,
    engine: DoubleStepQr<T>,
    h: Matrix<T>,
    q_h: Matrix<T>,
    has_vectors: bool,
}

impl<T: FloatScalar> GeneralEigen<T> {
    pub fn new(settings: EigenSettings<T>) -> Self {
        Self {
            engine: DoubleStepQr::new(settings.general_qr),
            settings,
            hessenberg: Hessenberg::new(),
            h: Matrix::zeros(0, 0),
            q_h: Matrix::zeros(0, 0),
            has_vectors: false,
        }
    }

    pub fn settings(&self) -> &EigenSettings<T> {
        &self.settings
    }

    /// Decompose `a`. Panics if `a` is not square.
    pub fn decompose(&mut self, a: &Matrix<T>) -> Result<(), LinalgError> {
        self.has_vectors = false;
        if a.is_empty() {
            return Err(LinalgError::EmptyMatrix);
        }
        assert!(a.is_square(), "eigen decomposition requires a square matrix");
        if self.settings.check_finite && !a.is_finite() {
            return Err(LinalgError::NonFinite);
        }

        self.hessenberg.decompose(a);
        self.hessenberg.h_into(&mut self.h);
        self.engine.process(&self.h)?;

        if self.settings.compute_vectors {
            self.hessenberg.q_into(&mut self.q_h);
            self.engine.process_vectors(&self.h, Some(&self.q_h))?;
            self.has_vectors = true;
        }
        Ok(())
    }

    pub fn num_values(&self) -> usize {
        self.engine.num_eigenvalues()
    }

    pub fn eigenvalue(&self, i: usize) -> Complex<T> {
        assert!(i < self.num_values(), "eigenvalue index out of range");
        self.engine.eigenvalues()[i]
    }

    /// Eigenvalues in the order they converged.
    pub fn eigenvalues(&self) -> &[Complex<T>] {
        self.engine.eigenvalues()
    }

    /// Unit eigenvector of a real eigenvalue; `None` for complex values or
    /// when vectors were not requested.
    pub fn eigenvector(&self, i: usize) -> Option<&[T]> {
        if !self.has_vectors {
            return None;
        }
        self.engine.eigenvector(i)
    }

    /// Steps each eigenvalue took to converge.
    pub fn steps_per_value(&self) -> &[usize] {
        self.engine.steps_per_value()
    }
}
