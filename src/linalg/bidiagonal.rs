use alloc::vec::Vec;

use crate::linalg::householder::{householder_vector, rank1_update_mult_l, rank1_update_mult_r};
use crate::linalg::qr::PivotedQr;
use crate::matrix::Matrix;
use crate::traits::FloatScalar;

/// Householder bidiagonalization: `A = U·B·Vᵀ` with `B` upper bidiagonal.
///
/// Works on a row-major copy of the input. For each `k < min(m, n)` a
/// column reflector zeroes `A[k+1.., k]` and a row reflector zeroes
/// `A[k, k+2..]`. The reflector vectors are kept in the triangles they
/// zero, so `U` and `V` are only formed when requested.
///
/// # Example
///
/// ```
/// use eigensvd::Matrix;
/// use eigensvd::linalg::Bidiagonal;
///
/// let a = Matrix::from_rows(3, 2, &[1.0_f64, 2.0, 3.0, 4.0, 5.0, 6.0]);
/// let mut bd = Bidiagonal::new();
/// bd.decompose(&a);
///
/// let u = bd.u(false, true);
/// let b = bd.b(true);
/// let v = bd.v(false, true);
/// let back = &(&u * &b) * &v.transpose();
/// assert!((&back - &a).frobenius_norm() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct Bidiagonal<T> {
    ubv: Matrix<T>,
    gammas_u: Vec<T>,
    gammas_v: Vec<T>,
    u: Vec<T>,
    temp: Vec<T>,
}

impl<T: FloatScalar> Default for Bidiagonal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatScalar> Bidiagonal<T> {
    pub fn new() -> Self {
        Self {
            ubv: Matrix::zeros(0, 0),
            gammas_u: Vec::new(),
            gammas_v: Vec::new(),
            u: Vec::new(),
            temp: Vec::new(),
        }
    }

    /// Reduce a copy of `a`.
    pub fn decompose(&mut self, a: &Matrix<T>) {
        self.ubv.copy_from(a);
        self.reduce();
    }

    /// Reduce `a` without copying it. The matrix is kept as work storage and
    /// holds the packed factorization afterwards.
    pub fn decompose_in_place(&mut self, a: Matrix<T>) {
        self.ubv = a;
        self.reduce();
    }

    fn reduce(&mut self) {
        let m = self.ubv.nrows();
        let n = self.ubv.ncols();
        let min = m.min(n);
        let len = m.max(n);

        self.gammas_u.clear();
        self.gammas_u.resize(min, T::zero());
        self.gammas_v.clear();
        self.gammas_v.resize(min, T::zero());
        self.u.clear();
        self.u.resize(len + 1, T::zero());
        self.temp.clear();
        self.temp.resize(len, T::zero());

        for k in 0..min {
            self.compute_u(k);
            self.compute_v(k);
        }
    }

    fn compute_u(&mut self, k: usize) {
        let m = self.ubv.nrows();
        for i in k..m {
            self.u[i] = self.ubv[(i, k)];
        }
        match householder_vector(&mut self.u[k..m]) {
            Some(r) => {
                for i in (k + 1)..m {
                    self.ubv[(i, k)] = self.u[i];
                }
                self.gammas_u[k] = r.gamma;
                rank1_update_mult_r(&mut self.ubv, &self.u, r.gamma, k + 1, k, m, &mut self.temp);
                self.ubv[(k, k)] = r.beta();
            }
            None => self.gammas_u[k] = T::zero(),
        }
    }

    fn compute_v(&mut self, k: usize) {
        let n = self.ubv.ncols();
        if k + 1 >= n {
            self.gammas_v[k] = T::zero();
            return;
        }
        let row = self.ubv.row(k);
        self.u[(k + 1)..n].copy_from_slice(&row[(k + 1)..n]);
        match householder_vector(&mut self.u[(k + 1)..n]) {
            Some(r) => {
                let (u, ubv) = (&self.u, &mut self.ubv);
                ubv.row_mut(k)[(k + 2)..n].copy_from_slice(&u[(k + 2)..n]);
                self.gammas_v[k] = r.gamma;
                rank1_update_mult_l(&mut self.ubv, &self.u, r.gamma, k + 1, k + 1, n);
                self.ubv[(k, k + 1)] = r.beta();
            }
            None => self.gammas_v[k] = T::zero(),
        }
    }

    /// Rows of the input matrix.
    pub fn nrows(&self) -> usize {
        self.ubv.nrows()
    }

    /// Columns of the input matrix.
    pub fn ncols(&self) -> usize {
        self.ubv.ncols()
    }

    /// Copy the diagonal (`min(m,n)` values) and superdiagonal
    /// (`min(m,n) - 1` values) of `B` into the given buffers.
    pub fn condensed(&self, diag: &mut Vec<T>, off: &mut Vec<T>) {
        let min = self.ubv.nrows().min(self.ubv.ncols());
        diag.clear();
        off.clear();
        for i in 0..min {
            diag.push(self.ubv[(i, i)]);
            if i + 1 < min {
                off.push(self.ubv[(i, i + 1)]);
            }
        }
    }

    /// The bidiagonal matrix `B`.
    ///
    /// Compact: `min × w` with `w = min + 1` when `n > m`, otherwise `min`.
    /// Full: `m × n`.
    pub fn b(&self, compact: bool) -> Matrix<T> {
        let m = self.ubv.nrows();
        let n = self.ubv.ncols();
        let min = m.min(n);
        let mut b = if compact {
            Matrix::zeros(min, v_width(m, n))
        } else {
            Matrix::zeros(m, n)
        };
        for i in 0..min {
            b[(i, i)] = self.ubv[(i, i)];
            if i + 1 < b.ncols() {
                b[(i, i + 1)] = self.ubv[(i, i + 1)];
            }
        }
        b
    }

    /// Left factor `U`: `m × min` (compact) or `m × m`; transposed on request.
    pub fn u(&mut self, transpose: bool, compact: bool) -> Matrix<T> {
        let m = self.ubv.nrows();
        let cols = if compact { m.min(self.ubv.ncols()) } else { m };
        let mut out = if transpose {
            Matrix::zeros(cols, m)
        } else {
            Matrix::zeros(m, cols)
        };
        self.u_into(transpose, &mut out);
        out
    }

    /// Write `U` (or `Uᵀ`) into `out`, whose shape selects compact or full.
    pub fn u_into(&mut self, transpose: bool, out: &mut Matrix<T>) {
        let m = self.ubv.nrows();
        let min = m.min(self.ubv.ncols());
        out.set_identity();
        self.temp.resize(m.max(out.ncols()), T::zero());
        for j in (0..min).rev() {
            self.u[j] = T::one();
            for i in (j + 1)..m {
                self.u[i] = self.ubv[(i, j)];
            }
            let gamma = self.gammas_u[j];
            if transpose {
                rank1_update_mult_l(out, &self.u, gamma, j, j, m);
            } else {
                rank1_update_mult_r(out, &self.u, gamma, j, j, m, &mut self.temp);
            }
        }
    }

    /// Right factor `V`: `n × w` (compact) or `n × n`; transposed on request.
    pub fn v(&mut self, transpose: bool, compact: bool) -> Matrix<T> {
        let m = self.ubv.nrows();
        let n = self.ubv.ncols();
        let cols = if compact { v_width(m, n) } else { n };
        let mut out = if transpose {
            Matrix::zeros(cols, n)
        } else {
            Matrix::zeros(n, cols)
        };
        self.v_into(transpose, &mut out);
        out
    }

    /// Write `V` (or `Vᵀ`) into `out`, whose shape selects compact or full.
    pub fn v_into(&mut self, transpose: bool, out: &mut Matrix<T>) {
        let n = self.ubv.ncols();
        let min = self.ubv.nrows().min(n);
        out.set_identity();
        self.temp.resize(n.max(out.ncols()), T::zero());
        for j in (0..min).rev() {
            if j + 1 >= n {
                continue;
            }
            self.u[j + 1] = T::one();
            let row = self.ubv.row(j);
            self.u[(j + 2)..n].copy_from_slice(&row[(j + 2)..n]);
            let gamma = self.gammas_v[j];
            if transpose {
                rank1_update_mult_l(out, &self.u, gamma, j + 1, j + 1, n);
            } else {
                rank1_update_mult_r(out, &self.u, gamma, j + 1, j + 1, n, &mut self.temp);
            }
        }
    }
}

/// Width of the compact `V` and `B`.
fn v_width(m: usize, n: usize) -> usize {
    let min = m.min(n);
    if n > m {
        min + 1
    } else {
        min
    }
}

/// Bidiagonalization of a tall matrix through a pivoted QR.
///
/// `A·P = Q·R`, then `R·Pᵀ` (square, `n × n`) is bidiagonalized as
/// `U₁·B·V₁ᵀ`. Since `A = Q·R·Pᵀ`, the factors of `A` are `U = Q₁·U₁`
/// (with `Q₁` the leading `n` columns of `Q`), `B`, and `V = V₁`.
/// Most of the work lands on the cheap QR when `m ≫ n`.
#[derive(Debug, Clone)]
pub struct TallBidiagonal<T> {
    qr: PivotedQr<T>,
    inner: Bidiagonal<T>,
    rows: usize,
}

impl<T: FloatScalar> Default for TallBidiagonal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatScalar> TallBidiagonal<T> {
    pub fn new() -> Self {
        Self {
            qr: PivotedQr::new(),
            inner: Bidiagonal::new(),
            rows: 0,
        }
    }

    /// Reduce `a`. Panics when `a` has fewer rows than columns.
    pub fn decompose(&mut self, a: &Matrix<T>) {
        assert!(a.nrows() >= a.ncols(), "tall bidiagonalization requires rows >= cols");
        self.rows = a.nrows();
        self.qr.decompose(a);
        self.inner.decompose_in_place(self.qr.r_unpivoted(true));
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    pub fn condensed(&self, diag: &mut Vec<T>, off: &mut Vec<T>) {
        self.inner.condensed(diag, off);
    }

    /// `B`: `n × n` (compact) or `m × n` with zero trailing rows.
    pub fn b(&self, compact: bool) -> Matrix<T> {
        let inner = self.inner.b(true);
        if compact {
            return inner;
        }
        let n = inner.ncols();
        let mut b = Matrix::zeros(self.rows, n);
        for i in 0..n {
            b.row_mut(i).copy_from_slice(inner.row(i));
        }
        b
    }

    /// `U = [Q₁·U₁, Q₂]`: `m × n` (compact) or `m × m`.
    pub fn u(&mut self, transpose: bool, compact: bool) -> Matrix<T> {
        let n = self.inner.ncols();
        let q = self.qr.q(compact);
        let u1 = self.inner.u(false, true);

        let mut out = Matrix::zeros(q.nrows(), q.ncols());
        for i in 0..q.nrows() {
            let qrow = q.row(i);
            let orow = out.row_mut(i);
            for (k, &qik) in qrow[..n].iter().enumerate() {
                if qik == T::zero() {
                    continue;
                }
                for (o, &x) in orow[..n].iter_mut().zip(u1.row(k)) {
                    *o = *o + qik * x;
                }
            }
            orow[n..].copy_from_slice(&qrow[n..]);
        }
        if transpose {
            out.transpose()
        } else {
            out
        }
    }

    /// `V = V₁`, always `n × n`.
    pub fn v(&mut self, transpose: bool, compact: bool) -> Matrix<T> {
        self.inner.v(transpose, compact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    fn assert_near(a: f64, b: f64, tol: f64, msg: &str) {
        assert!((a - b).abs() < tol, "{}: {} vs {} (diff {})", msg, a, b, (a - b).abs());
    }

    fn assert_mat_near(a: &Matrix<f64>, b: &Matrix<f64>, tol: f64, msg: &str) {
        assert_eq!((a.nrows(), a.ncols()), (b.nrows(), b.ncols()), "{}: shape", msg);
        for i in 0..a.nrows() {
            for j in 0..a.ncols() {
                assert_near(a[(i, j)], b[(i, j)], tol, msg);
            }
        }
    }

    fn test_matrix(m: usize, n: usize) -> Matrix<f64> {
        Matrix::from_fn(m, n, |i, j| {
            let x = (i * 7 + j * 3 + 1) as f64;
            (x * 0.37).sin() + if i == j { 2.0 } else { 0.0 }
        })
    }

    fn check_reconstruction(m: usize, n: usize) {
        let a = test_matrix(m, n);
        let mut bd = Bidiagonal::new();
        bd.decompose(&a);

        for &compact in &[true, false] {
            let u = bd.u(false, compact);
            let b = bd.b(compact);
            let v = bd.v(false, compact);
            let back = &(&u * &b) * &v.transpose();
            assert_mat_near(&back, &a, TOL, "A = U B Vᵀ");
            assert!(u.orthogonality_error() < TOL);
            assert!(v.orthogonality_error() < TOL);

            let ut = bd.u(true, compact);
            let vt = bd.v(true, compact);
            assert_mat_near(&ut, &u.transpose(), TOL, "Uᵀ");
            assert_mat_near(&vt, &v.transpose(), TOL, "Vᵀ");
        }
    }

    // ── Row bidiagonalization ───────────────────────────────────────

    #[test]
    fn square_reconstruction() {
        check_reconstruction(4, 4);
    }

    #[test]
    fn tall_reconstruction() {
        check_reconstruction(6, 3);
    }

    #[test]
    fn wide_reconstruction() {
        check_reconstruction(3, 5);
    }

    #[test]
    fn b_is_bidiagonal() {
        let mut bd = Bidiagonal::new();
        bd.decompose(&test_matrix(5, 4));
        let b = bd.b(false);
        for i in 0..5 {
            for j in 0..4 {
                if j != i && j != i + 1 {
                    assert_eq!(b[(i, j)], 0.0, "B[{},{}]", i, j);
                }
            }
        }
        let mut diag = Vec::new();
        let mut off = Vec::new();
        bd.condensed(&mut diag, &mut off);
        assert_eq!(diag.len(), 4);
        assert_eq!(off.len(), 3);
        for i in 0..4 {
            assert_eq!(diag[i], b[(i, i)]);
        }
        for i in 0..3 {
            assert_eq!(off[i], b[(i, i + 1)]);
        }
    }

    #[test]
    fn compact_shapes() {
        let mut bd = Bidiagonal::new();
        bd.decompose(&test_matrix(3, 5));
        let b = bd.b(true);
        assert_eq!((b.nrows(), b.ncols()), (3, 4));
        let v = bd.v(false, true);
        assert_eq!((v.nrows(), v.ncols()), (5, 4));
        let u = bd.u(false, true);
        assert_eq!((u.nrows(), u.ncols()), (3, 3));
    }

    #[test]
    fn zero_column_skips_reflector() {
        let a = Matrix::from_rows(3, 3, &[0.0, 1.0, 2.0, 0.0, 3.0, 4.0, 0.0, 5.0, 6.0]);
        let mut bd = Bidiagonal::new();
        bd.decompose(&a);
        let back = &(&bd.u(false, true) * &bd.b(true)) * &bd.v(false, true).transpose();
        assert_mat_near(&back, &a, TOL, "zero column");
    }

    #[test]
    fn in_place_matches_copy() {
        let a = test_matrix(4, 3);
        let mut x = Bidiagonal::new();
        x.decompose(&a);
        let mut y = Bidiagonal::new();
        y.decompose_in_place(a.clone());
        assert_eq!(x.b(true), y.b(true));
    }

    // ── Tall variant ────────────────────────────────────────────────

    #[test]
    fn tall_variant_reconstruction() {
        let a = test_matrix(9, 3);
        let mut bd = TallBidiagonal::new();
        bd.decompose(&a);

        for &compact in &[true, false] {
            let u = bd.u(false, compact);
            let b = bd.b(compact);
            let v = bd.v(false, compact);
            assert_eq!(u.nrows(), 9);
            let back = &(&u * &b) * &v.transpose();
            assert_mat_near(&back, &a, TOL, "tall A = U B Vᵀ");
            assert!(u.orthogonality_error() < TOL);
        }
        let ut = bd.u(true, true);
        assert_eq!((ut.nrows(), ut.ncols()), (3, 9));
    }

    #[test]
    fn tall_variant_same_singular_structure() {
        // Both reductions must give bidiagonals with identical BᵀB spectra;
        // compare the Frobenius norms as a cheap invariant.
        let a = test_matrix(10, 4);
        let mut row = Bidiagonal::new();
        row.decompose(&a);
        let mut tall = TallBidiagonal::new();
        tall.decompose(&a);
        assert_near(
            row.b(true).frobenius_norm(),
            tall.b(true).frobenius_norm(),
            TOL,
            "‖B‖",
        );
    }
}
