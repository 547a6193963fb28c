use alloc::vec::Vec;

use crate::linalg::bidiagonal::{Bidiagonal, TallBidiagonal};
use crate::linalg::settings::SvdSettings;
use crate::linalg::svd_qr::SvdQr;
use crate::linalg::LinalgError;
use crate::matrix::Matrix;
use crate::traits::FloatScalar;

// ── SvdDecomposition session ────────────────────────────────────────

/// Singular value decomposition `A = U·Σ·Vᵀ` of an `m×n` matrix.
///
/// The input is reduced to upper bidiagonal form and the bidiagonal QR
/// engine drives it to diagonal. Wide inputs are transposed first and the
/// factors swapped back afterwards, so either shape works. Singular values
/// are non-negative but unsorted (engine order); use
/// [`singular_values_sorted`](Self::singular_values_sorted) for a descending
/// copy.
///
/// The session keeps its buffers, so calling
/// [`decompose`](Self::decompose) repeatedly on same-shaped inputs does not
/// reallocate the work matrices.
///
/// # Example
///
/// ```
/// use eigensvd::Matrix;
/// use eigensvd::linalg::{SvdDecomposition, SvdSettings};
///
/// let a = Matrix::from_rows(2, 3, &[3.0_f64, 2.0, 2.0, 2.0, 3.0, -2.0]);
/// let mut svd = SvdDecomposition::new(SvdSettings::default());
/// svd.decompose(&a).unwrap();
///
/// let (sigma, _) = svd.singular_values_sorted();
/// assert!((sigma[0] - 5.0).abs() < 1e-12);
/// assert!((sigma[1] - 3.0).abs() < 1e-12);
///
/// let usv = &(&svd.u().unwrap() * &svd.w()) * &svd.v().unwrap().transpose();
/// assert!((&usv - &a).frobenius_norm() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct SvdDecomposition<T> {
    settings: SvdSettings<T>,

    bidiag: Bidiagonal<T>,
    tall: TallBidiagonal<T>,
    engine: SvdQr<T>,

    work: Matrix<T>,
    diag: Vec<T>,
    off: Vec<T>,

    ut: Option<Matrix<T>>,
    vt: Option<Matrix<T>>,
    values: Vec<T>,

    rows: usize,
    cols: usize,
    transposed: bool,
}

impl<T: FloatScalar> SvdDecomposition<T> {
    pub fn new(settings: SvdSettings<T>) -> Self {
        Self {
            engine: SvdQr::new(settings.qr),
            settings,
            bidiag: Bidiagonal::new(),
            tall: TallBidiagonal::new(),
            work: Matrix::zeros(0, 0),
            diag: Vec::new(),
            off: Vec::new(),
            ut: None,
            vt: None,
            values: Vec::new(),
            rows: 0,
            cols: 0,
            transposed: false,
        }
    }

    pub fn settings(&self) -> &SvdSettings<T> {
        &self.settings
    }

    /// Decompose `a`. The input is not modified.
    ///
    /// Returns `Err(EmptyMatrix)` for a matrix with no elements,
    /// `Err(NonFinite)` when `check_finite` is set and `a` holds NaN/Inf,
    /// and `Err(ConvergenceFailure)` when the QR iteration runs out of steps.
    pub fn decompose(&mut self, a: &Matrix<T>) -> Result<(), LinalgError> {
        self.ut = None;
        self.vt = None;
        self.values.clear();
        self.rows = a.nrows();
        self.cols = a.ncols();

        if a.is_empty() {
            return Err(LinalgError::EmptyMatrix);
        }
        if self.settings.check_finite && !a.is_finite() {
            return Err(LinalgError::NonFinite);
        }

        // Work on the tall orientation; the factors swap roles when transposed.
        self.transposed = a.ncols() > a.nrows();
        let (compute_u, compute_v) = if self.transposed {
            (self.settings.compute_v, self.settings.compute_u)
        } else {
            (self.settings.compute_u, self.settings.compute_v)
        };
        if self.transposed {
            a.transpose_into(&mut self.work);
        }
        let input = if self.transposed { &self.work } else { a };
        let (m, n) = (input.nrows(), input.ncols());
        let compact = self.settings.compact;

        let use_tall = self.settings.allow_tall && m > 2 * n && !compute_u;
        let (ut, vt) = if use_tall {
            log::debug!("svd: {}x{} input reduced through a pivoted QR", m, n);
            self.tall.decompose(input);
            self.tall.condensed(&mut self.diag, &mut self.off);
            let vt = compute_v.then(|| self.tall.v(true, compact));
            (None, vt)
        } else {
            self.bidiag.decompose(input);
            self.bidiag.condensed(&mut self.diag, &mut self.off);
            let ut = compute_u.then(|| self.bidiag.u(true, compact));
            let vt = compute_v.then(|| self.bidiag.v(true, compact));
            (ut, vt)
        };

        self.engine
            .set_fast_values(self.settings.qr.fast_values || (!compute_u && !compute_v));
        self.engine.set_matrix(&self.diag, &self.off);
        self.engine.set_ut(ut);
        self.engine.set_vt(vt);
        self.engine.process()?;

        self.make_values_positive();

        let ut = self.engine.take_ut();
        let vt = self.engine.take_vt();
        if self.transposed {
            self.ut = vt;
            self.vt = ut;
        } else {
            self.ut = ut;
            self.vt = vt;
        }

        log::debug!(
            "svd: {}x{} done in {} steps",
            self.rows,
            self.cols,
            self.engine.total_steps()
        );
        Ok(())
    }

    /// Flip negative values and the matching row of `Uᵀ`.
    fn make_values_positive(&mut self) {
        self.values.clear();
        let n = self.engine.num_values();
        for i in 0..n {
            let value = self.engine.singular_value(i);
            if value < T::zero() {
                self.engine.singular_values_mut()[i] = -value;
                if let Some(ut) = self.engine.ut_mut() {
                    ut.negate_row(i);
                }
                self.values.push(-value);
            } else {
                self.values.push(value);
            }
        }
    }

    // ── Values ──────────────────────────────────────────────────────

    /// `min(m, n)`.
    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn singular_value(&self, i: usize) -> T {
        assert!(i < self.values.len(), "singular value index out of range");
        self.values[i]
    }

    /// Singular values in engine order.
    pub fn singular_values(&self) -> &[T] {
        &self.values
    }

    /// Singular values sorted descending, with `perm[k]` the engine index of
    /// the `k`-th largest value.
    pub fn singular_values_sorted(&self) -> (Vec<T>, Vec<usize>) {
        let mut perm: Vec<usize> = (0..self.values.len()).collect();
        perm.sort_by(|&a, &b| {
            self.values[b]
                .partial_cmp(&self.values[a])
                .unwrap_or(core::cmp::Ordering::Equal)
        });
        let sorted = perm.iter().map(|&k| self.values[k]).collect();
        (sorted, perm)
    }

    /// Number of singular values above `tol`.
    pub fn rank(&self, tol: T) -> usize {
        self.values.iter().filter(|&&s| s > tol).count()
    }

    /// Dimension of the null space: `n - rank(tol)`.
    pub fn nullity(&self, tol: T) -> usize {
        self.cols - self.rank(tol)
    }

    /// σ_max / σ_min; infinite when the smallest singular value is zero.
    pub fn condition_number(&self) -> T {
        if self.values.is_empty() {
            return T::one();
        }
        let (max, min) = self
            .values
            .iter()
            .fold((T::zero(), T::infinity()), |(hi, lo), &s| (hi.max(s), lo.min(s)));
        if min == T::zero() {
            T::infinity()
        } else {
            max / min
        }
    }

    /// QR steps of the last decomposition.
    pub fn steps(&self) -> usize {
        self.engine.total_steps()
    }

    // ── Factors ─────────────────────────────────────────────────────

    /// `Σ`: `k×k` when compact (`k = min(m, n)`), otherwise `m×n`.
    pub fn w(&self) -> Matrix<T> {
        let mut w = if self.settings.compact {
            let k = self.values.len();
            Matrix::zeros(k, k)
        } else {
            Matrix::zeros(self.rows, self.cols)
        };
        for (i, &s) in self.values.iter().enumerate() {
            w[(i, i)] = s;
        }
        w
    }

    /// `Uᵀ`, one left singular vector per row.
    pub fn u_transposed(&self) -> Result<&Matrix<T>, LinalgError> {
        self.ut.as_ref().ok_or(LinalgError::NotComputed)
    }

    /// `Vᵀ`, one right singular vector per row.
    pub fn v_transposed(&self) -> Result<&Matrix<T>, LinalgError> {
        self.vt.as_ref().ok_or(LinalgError::NotComputed)
    }

    /// `U`: `m×k` when compact, otherwise `m×m`.
    pub fn u(&self) -> Result<Matrix<T>, LinalgError> {
        self.u_transposed().map(Matrix::transpose)
    }

    /// `V`: `n×k` when compact, otherwise `n×n`.
    pub fn v(&self) -> Result<Matrix<T>, LinalgError> {
        self.v_transposed().map(Matrix::transpose)
    }
}

/// One-shot convenience wrappers with default settings.
impl<T: FloatScalar> Matrix<T> {
    /// Compact singular value decomposition.
    ///
    /// ```
    /// use eigensvd::Matrix;
    ///
    /// let a = Matrix::from_rows(3, 2, &[1.0_f64, 0.0, 0.0, 2.0, 0.0, 0.0]);
    /// let svd = a.svd().unwrap();
    /// let (sigma, _) = svd.singular_values_sorted();
    /// assert!((sigma[0] - 2.0).abs() < 1e-12);
    /// assert!((sigma[1] - 1.0).abs() < 1e-12);
    /// ```
    pub fn svd(&self) -> Result<SvdDecomposition<T>, LinalgError> {
        let mut svd = SvdDecomposition::new(SvdSettings::with_defaults());
        svd.decompose(self)?;
        Ok(svd)
    }

    /// Singular values only, in engine order.
    ///
    /// ```
    /// use eigensvd::Matrix;
    ///
    /// let a = Matrix::from_rows(2, 2, &[3.0_f64, 0.0, 0.0, -4.0]);
    /// let mut sv = a.singular_values_only().unwrap();
    /// sv.sort_by(|a, b| a.partial_cmp(b).unwrap());
    /// assert_eq!(sv, vec![3.0, 4.0]);
    /// ```
    pub fn singular_values_only(&self) -> Result<Vec<T>, LinalgError> {
        let mut svd = SvdDecomposition::new(SvdSettings::values_only());
        svd.decompose(self)?;
        Ok(svd.values)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    fn assert_near(a: f64, b: f64, tol: f64, msg: &str) {
        assert!(
            (a - b).abs() < tol,
            "{}: {} vs {} (diff {})",
            msg,
            a,
            b,
            (a - b).abs()
        );
    }

    fn test_matrix(m: usize, n: usize) -> Matrix<f64> {
        Matrix::from_fn(m, n, |i, j| {
            let x = (i * 5 + j * 11 + 3) as f64;
            (x * 0.29).sin() + 0.5 * (x * 0.13).cos()
        })
    }

    fn check_reconstruction(a: &Matrix<f64>, compact: bool) -> SvdDecomposition<f64> {
        let mut settings = SvdSettings::default();
        settings.compact = compact;
        let mut svd = SvdDecomposition::new(settings);
        svd.decompose(a).unwrap();

        let u = svd.u().unwrap();
        let v = svd.v().unwrap();
        let w = svd.w();
        let k = a.nrows().min(a.ncols());
        if compact {
            assert_eq!((u.nrows(), u.ncols()), (a.nrows(), k));
            assert_eq!((v.nrows(), v.ncols()), (a.ncols(), k));
        } else {
            assert_eq!((u.nrows(), u.ncols()), (a.nrows(), a.nrows()));
            assert_eq!((v.nrows(), v.ncols()), (a.ncols(), a.ncols()));
        }

        let usv = &(&u * &w) * &v.transpose();
        let err = (&usv - a).frobenius_norm() / a.frobenius_norm();
        assert!(err < 1e-12, "reconstruction error {}", err);
        assert!(u.orthogonality_error() < TOL, "U orthogonality");
        assert!(v.orthogonality_error() < TOL, "V orthogonality");
        assert!(svd.singular_values().iter().all(|&s| s >= 0.0));
        svd
    }

    // ── Shapes ──────────────────────────────────────────────────────

    #[test]
    fn square_reconstruction() {
        check_reconstruction(&test_matrix(5, 5), true);
        check_reconstruction(&test_matrix(5, 5), false);
    }

    #[test]
    fn tall_reconstruction() {
        check_reconstruction(&test_matrix(7, 3), true);
        check_reconstruction(&test_matrix(7, 3), false);
    }

    #[test]
    fn wide_reconstruction() {
        check_reconstruction(&test_matrix(3, 7), true);
        check_reconstruction(&test_matrix(3, 7), false);
    }

    #[test]
    fn single_row_and_column() {
        let row = Matrix::from_rows(1, 3, &[3.0, 0.0, 4.0]);
        let svd = check_reconstruction(&row, true);
        assert_near(svd.singular_value(0), 5.0, TOL, "row norm");

        let col = Matrix::from_rows(3, 1, &[1.0, 2.0, 2.0]);
        let svd = check_reconstruction(&col, false);
        assert_near(svd.singular_value(0), 3.0, TOL, "column norm");
    }

    #[test]
    fn identity_factors_are_identity() {
        let a = Matrix::<f64>::identity(5);
        let svd = check_reconstruction(&a, true);
        let u = svd.u().unwrap();
        let v = svd.v().unwrap();
        for i in 0..5 {
            assert_near(svd.singular_value(i), 1.0, TOL, "σ");
            for j in 0..5 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_near(u[(i, j)], expected, TOL, "U");
                assert_near(v[(i, j)], expected, TOL, "V");
            }
        }
    }

    // ── Values ──────────────────────────────────────────────────────

    #[test]
    fn negative_diagonal_made_positive() {
        let a = Matrix::from_rows(2, 2, &[-3.0, 0.0, 0.0, 2.0]);
        let svd = check_reconstruction(&a, true);
        let (sorted, _) = svd.singular_values_sorted();
        assert_near(sorted[0], 3.0, TOL, "σ[0]");
        assert_near(sorted[1], 2.0, TOL, "σ[1]");
    }

    #[test]
    fn sorted_values_and_permutation() {
        let a = Matrix::from_rows(3, 3, &[1.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 3.0]);
        let svd = check_reconstruction(&a, true);
        let (sorted, perm) = svd.singular_values_sorted();
        assert_near(sorted[0], 5.0, TOL, "largest");
        assert_near(sorted[2], 1.0, TOL, "smallest");
        for (k, &p) in perm.iter().enumerate() {
            assert_eq!(svd.singular_value(p), sorted[k]);
        }
    }

    #[test]
    fn rank_deficient() {
        // Rank 2: third row is the sum of the first two.
        let a = Matrix::from_rows(
            4,
            3,
            &[
                1.0, 2.0, 3.0, //
                4.0, 5.0, 6.0, //
                5.0, 7.0, 9.0, //
                2.0, 4.0, 6.0,
            ],
        );
        let svd = check_reconstruction(&a, true);
        assert_eq!(svd.rank(1e-10), 2);
        assert_eq!(svd.nullity(1e-10), 1);
        assert!(svd.condition_number() > 1e10);
    }

    #[test]
    fn condition_number_of_diagonal() {
        let a = Matrix::from_rows(2, 2, &[4.0, 0.0, 0.0, 0.5]);
        let svd = a.svd().unwrap();
        assert_near(svd.condition_number(), 8.0, TOL, "cond");
    }

    #[test]
    fn zero_matrix_takes_no_steps() {
        let a = Matrix::<f64>::zeros(4, 3);
        let mut svd = SvdDecomposition::new(SvdSettings::default());
        svd.decompose(&a).unwrap();
        assert!(svd.singular_values().iter().all(|&s| s == 0.0));
        assert_eq!(svd.steps(), 0);
        assert_eq!(svd.rank(0.0), 0);
    }

    #[test]
    fn values_only_matches_full() {
        let a = test_matrix(6, 4);
        let mut full = SvdDecomposition::new(SvdSettings::default());
        full.decompose(&a).unwrap();
        let mut fast = SvdDecomposition::new(SvdSettings::values_only());
        fast.decompose(&a).unwrap();

        let (s_full, _) = full.singular_values_sorted();
        let (s_fast, _) = fast.singular_values_sorted();
        for (x, y) in s_full.iter().zip(&s_fast) {
            assert_near(*x, *y, 1e-12, "σ");
        }
        assert_eq!(fast.u_transposed().unwrap_err(), LinalgError::NotComputed);
        assert_eq!(fast.v().unwrap_err(), LinalgError::NotComputed);
    }

    #[test]
    fn tall_path_matches_direct_path() {
        let a = test_matrix(12, 3);
        let mut tall = SvdDecomposition::new(SvdSettings {
            compute_u: false,
            ..SvdSettings::default()
        });
        tall.decompose(&a).unwrap();
        let mut direct = SvdDecomposition::new(SvdSettings {
            compute_u: false,
            allow_tall: false,
            ..SvdSettings::default()
        });
        direct.decompose(&a).unwrap();

        let (s_tall, _) = tall.singular_values_sorted();
        let (s_direct, _) = direct.singular_values_sorted();
        for (x, y) in s_tall.iter().zip(&s_direct) {
            assert_near(*x, *y, 1e-12, "σ");
        }

        // AᵀA·v = σ²·v for every right vector.
        let ata = a.transpose_mul(&a);
        let vt = tall.v_transposed().unwrap();
        for i in 0..3 {
            let v = vt.row(i);
            let s2 = tall.singular_value(i) * tall.singular_value(i);
            let av = ata.mul_vec(v);
            for k in 0..3 {
                assert_near(av[k], s2 * v[k], 1e-10, "AᵀA·v");
            }
        }
    }

    #[test]
    fn only_v_on_wide_input() {
        let a = test_matrix(2, 5);
        let mut svd = SvdDecomposition::new(SvdSettings {
            compute_u: false,
            ..SvdSettings::default()
        });
        svd.decompose(&a).unwrap();
        assert!(svd.u().is_err());
        let v = svd.v().unwrap();
        assert_eq!((v.nrows(), v.ncols()), (5, 2));
        assert!(v.orthogonality_error() < TOL);
    }

    // ── Errors and reuse ────────────────────────────────────────────

    #[test]
    fn empty_and_non_finite_rejected() {
        let mut svd = SvdDecomposition::new(SvdSettings {
            check_finite: true,
            ..SvdSettings::default()
        });
        assert_eq!(svd.decompose(&Matrix::<f64>::zeros(0, 3)), Err(LinalgError::EmptyMatrix));
        let bad = Matrix::from_rows(2, 2, &[1.0, f64::NAN, 0.0, 1.0]);
        assert_eq!(svd.decompose(&bad), Err(LinalgError::NonFinite));
    }

    #[test]
    fn session_reuse_across_shapes() {
        let mut svd = SvdDecomposition::new(SvdSettings::default());
        for &(m, n) in &[(4, 4), (6, 2), (2, 6), (4, 4)] {
            let a = test_matrix(m, n);
            svd.decompose(&a).unwrap();
            assert_eq!(svd.num_values(), m.min(n));
            let usv = &(&svd.u().unwrap() * &svd.w()) * &svd.v().unwrap().transpose();
            assert!((&usv - &a).frobenius_norm() < 1e-10);
        }
    }

    #[test]
    fn single_precision() {
        let a = Matrix::from_rows(3, 2, &[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let svd = a.svd().unwrap();
        let usv = &(&svd.u().unwrap() * &svd.w()) * &svd.v().unwrap().transpose();
        assert!((&usv - &a).frobenius_norm() < 1e-4);
        let sv = a.singular_values_only().unwrap();
        assert_eq!(sv.len(), 2);
    }
}
