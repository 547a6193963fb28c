use alloc::vec::Vec;
use core::mem;

use crate::linalg::settings::{EigenSettings, Extraction};
use crate::linalg::symmetric_qr::SymmetricQr;
use crate::linalg::tridiagonal::{BlockTridiagonal, Tridiagonal};
use crate::linalg::LinalgError;
use crate::matrix::Matrix;
use crate::traits::FloatScalar;

/// Row or panel tridiagonalization, picked from `block_size`.
#[derive(Debug, Clone)]
enum Reduction<T> {
    Row(Tridiagonal<T>),
    Block(BlockTridiagonal<T>),
}

impl<T: FloatScalar> Reduction<T> {
    fn new(block_size: usize) -> Self {
        if block_size == 0 {
            Reduction::Row(Tridiagonal::new())
        } else {
            Reduction::Block(BlockTridiagonal::new(block_size))
        }
    }

    fn decompose(&mut self, a: &Matrix<T>) {
        match self {
            Reduction::Row(t) => t.decompose(a),
            Reduction::Block(t) => t.decompose(a),
        }
    }

    fn condensed(&self, diag: &mut Vec<T>, off: &mut Vec<T>) {
        match self {
            Reduction::Row(t) => t.condensed(diag, off),
            Reduction::Block(t) => t.condensed(diag, off),
        }
    }

    fn q_transposed(&mut self) -> Matrix<T> {
        match self {
            Reduction::Row(t) => t.q(true),
            Reduction::Block(t) => t.q(true),
        }
    }
}

/// Eigen decomposition of a real symmetric matrix: `A = V·D·Vᵀ`.
///
/// Householder tridiagonalization followed by the symmetric tridiagonal QR
/// iteration. Only the upper triangle of the input is read.
///
/// Vectors are extracted according to [`Extraction`]: `Separate` finds the
/// values first with the closed-form 2×2 solver, then reruns the iteration
/// on the saved tridiagonal with the rotations tracked and the known values
/// as shifts; `Together` tracks the rotations from the start.
///
/// Eigenvalues are in engine order (not sorted).
///
/// # Example
///
/// ```
/// use eigensvd::Matrix;
/// use eigensvd::linalg::{EigenSettings, SymmetricEigen};
///
/// let a = Matrix::from_rows(2, 2, &[2.0_f64, -1.0, -1.0, 2.0]);
/// let mut eig = SymmetricEigen::new(EigenSettings::default());
/// eig.decompose(&a).unwrap();
///
/// for i in 0..2 {
///     let v = eig.eigenvector(i).unwrap();
///     let av = a.mul_vec(v);
///     for k in 0..2 {
///         assert!((av[k] - eig.eigenvalue(i) * v[k]).abs() < 1e-12);
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SymmetricEigen<T> {
    settings: EigenSettings<T>,
    reduction: Reduction<T>,
    engine: SymmetricQr<T>,

    diag: Vec<T>,
    off: Vec<T>,

    values: Vec<T>,
    vectors: Option<Matrix<T>>,
}

impl<T: FloatScalar> SymmetricEigen<T> {
    pub fn new(settings: EigenSettings<T>) -> Self {
        Self {
            reduction: Reduction::new(settings.block_size),
            engine: SymmetricQr::new(settings.symmetric_qr),
            settings,
            diag: Vec::new(),
            off: Vec::new(),
            values: Vec::new(),
            vectors: None,
        }
    }

    pub fn settings(&self) -> &EigenSettings<T> {
        &self.settings
    }

    /// Decompose the symmetric matrix `a`. Panics if `a` is not square.
    pub fn decompose(&mut self, a: &Matrix<T>) -> Result<(), LinalgError> {
        self.values.clear();
        self.vectors = None;
        if a.is_empty() {
            return Err(LinalgError::EmptyMatrix);
        }
        assert!(a.is_square(), "symmetric eigen decomposition requires a square matrix");
        if self.settings.check_finite && !a.is_finite() {
            return Err(LinalgError::NonFinite);
        }

        let n = a.nrows();
        self.reduction.decompose(a);
        self.reduction.condensed(&mut self.diag, &mut self.off);

        if !self.settings.compute_vectors {
            self.compute_values()?;
        } else {
            match self.settings.extraction {
                Extraction::Together => self.compute_together()?,
                Extraction::Separate => self.compute_separate(n)?,
            }
        }

        self.values.extend_from_slice(self.engine.helper().eigenvalues());
        log::debug!(
            "symmetric eigen: n = {}, {} exceptional shifts",
            n,
            self.engine.helper().exceptional_shifts()
        );
        Ok(())
    }

    fn compute_values(&mut self) -> Result<(), LinalgError> {
        self.engine.helper_mut().init(&self.diag, &self.off);
        self.engine.set_fast_values(true);
        self.engine.process()
    }

    fn compute_together(&mut self) -> Result<(), LinalgError> {
        let qt = self.reduction.q_transposed();
        self.engine.helper_mut().init(&self.diag, &self.off);
        self.engine.helper_mut().set_q(Some(qt));
        self.engine.set_fast_values(false);
        self.engine.process()?;
        self.vectors = self.engine.helper_mut().take_q();
        Ok(())
    }

    fn compute_separate(&mut self, n: usize) -> Result<(), LinalgError> {
        self.compute_values()?;

        // Hand the untouched tridiagonal back to the engine and keep the
        // converged diagonal as the script.
        let helper = self.engine.helper_mut();
        let script = helper.swap_diag(mem::take(&mut self.diag));
        self.off = helper.swap_off(mem::take(&mut self.off));
        helper.reset(n);

        let qt = self.reduction.q_transposed();
        self.engine.helper_mut().set_q(Some(qt));
        self.engine.set_fast_values(false);
        let result = self.engine.process_scripted(&script);
        self.diag = script;
        result?;

        self.vectors = self.engine.helper_mut().take_q();
        Ok(())
    }

    /// `n`.
    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn eigenvalue(&self, i: usize) -> T {
        assert!(i < self.values.len(), "eigenvalue index out of range");
        self.values[i]
    }

    /// Eigenvalues in engine order.
    pub fn eigenvalues(&self) -> &[T] {
        &self.values
    }

    /// Unit eigenvector of eigenvalue `i`, if vectors were computed.
    pub fn eigenvector(&self, i: usize) -> Option<&[T]> {
        self.vectors.as_ref().map(|v| v.row(i))
    }

    /// `Vᵀ`: eigenvector `i` is row `i`.
    pub fn vectors_transposed(&self) -> Result<&Matrix<T>, LinalgError> {
        self.vectors.as_ref().ok_or(LinalgError::NotComputed)
    }

    /// `V`: eigenvector `i` is column `i`.
    pub fn vectors(&self) -> Result<Matrix<T>, LinalgError> {
        self.vectors_transposed().map(Matrix::transpose)
    }

    /// Exceptional shifts taken by the last run of the QR iteration.
    pub fn exceptional_shifts(&self) -> usize {
        self.engine.helper().exceptional_shifts()
    }
}

/// Convenience methods for symmetric eigen decomposition.
impl<T: FloatScalar> Matrix<T> {
    /// Symmetric eigen decomposition with default settings. The caller is
    /// responsible for `self` being symmetric; the lower triangle is ignored.
    ///
    /// ```
    /// use eigensvd::Matrix;
    ///
    /// let a = Matrix::from_rows(2, 2, &[5.0_f64, 2.0, 2.0, 2.0]);
    /// let eig = a.eig_symmetric().unwrap();
    /// let mut vals = eig.eigenvalues().to_vec();
    /// vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
    /// assert!((vals[0] - 1.0).abs() < 1e-12);
    /// assert!((vals[1] - 6.0).abs() < 1e-12);
    /// ```
    pub fn eig_symmetric(&self) -> Result<SymmetricEigen<T>, LinalgError> {
        let mut eig = SymmetricEigen::new(EigenSettings::with_defaults());
        eig.decompose(self)?;
        Ok(eig)
    }

    /// Eigenvalues of a symmetric matrix, in engine order.
    pub fn eigenvalues_symmetric(&self) -> Result<Vec<T>, LinalgError> {
        let mut eig = SymmetricEigen::new(EigenSettings::values_only());
        eig.decompose(self)?;
        Ok(eig.values)
    }
}
