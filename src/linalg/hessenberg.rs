use alloc::vec::Vec;

use crate::linalg::householder::{householder_vector, rank1_update_mult_l, rank1_update_mult_r};
use crate::matrix::Matrix;
use crate::traits::FloatScalar;

/// Reduce a square matrix to upper Hessenberg form via Householder similarity
/// transforms: `Qᵀ·A·Q = H`.
///
/// Reflector `k` zeroes `A[k+2.., k]` and its vector is kept in that part of
/// column `k`. The result satisfies `A = Q·H·Qᵀ`.
///
/// # Example
///
/// ```
/// use eigensvd::Matrix;
/// use eigensvd::linalg::Hessenberg;
///
/// let a = Matrix::from_rows(3, 3, &[4.0_f64, 1.0, -2.0, 1.0, 2.0, 0.0, -2.0, 0.0, 3.0]);
/// let mut hs = Hessenberg::new();
/// hs.decompose(&a);
/// let h = hs.h();
/// assert_eq!(h[(2, 0)], 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct Hessenberg<T> {
    qh: Matrix<T>,
    gammas: Vec<T>,
    u: Vec<T>,
    temp: Vec<T>,
}

impl<T: FloatScalar> Default for Hessenberg<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatScalar> Hessenberg<T> {
    pub fn new() -> Self {
        Self {
            qh: Matrix::zeros(0, 0),
            gammas: Vec::new(),
            u: Vec::new(),
            temp: Vec::new(),
        }
    }

    /// Reduce a copy of `a`. Panics if `a` is not square.
    pub fn decompose(&mut self, a: &Matrix<T>) {
        assert!(a.is_square(), "hessenberg requires a square matrix");
        self.qh.copy_from(a);
        self.reduce();
    }

    /// Reduce `a` in place, keeping it as work storage.
    pub fn decompose_in_place(&mut self, a: Matrix<T>) {
        assert!(a.is_square(), "hessenberg requires a square matrix");
        self.qh = a;
        self.reduce();
    }

    fn reduce(&mut self) {
        let n = self.qh.nrows();
        self.gammas.clear();
        self.gammas.resize(n, T::zero());
        self.u.clear();
        self.u.resize(n, T::zero());
        self.temp.clear();
        self.temp.resize(n, T::zero());

        for k in 0..n.saturating_sub(2) {
            for i in (k + 1)..n {
                self.u[i] = self.qh[(i, k)];
            }
            let Some(r) = householder_vector(&mut self.u[(k + 1)..n]) else {
                self.gammas[k] = T::zero();
                continue;
            };
            for i in (k + 2)..n {
                self.qh[(i, k)] = self.u[i];
            }
            self.gammas[k] = r.gamma;

            // H·A on the trailing rows, then A·H on every row.
            rank1_update_mult_r(&mut self.qh, &self.u, r.gamma, k + 1, k + 1, n, &mut self.temp);
            rank1_update_mult_l(&mut self.qh, &self.u, r.gamma, 0, k + 1, n);

            self.qh[(k + 1, k)] = r.beta();
        }
    }

    pub fn size(&self) -> usize {
        self.qh.nrows()
    }

    /// The upper Hessenberg matrix `H`.
    pub fn h(&self) -> Matrix<T> {
        let n = self.qh.nrows();
        let mut h = Matrix::zeros(n, n);
        self.h_into(&mut h);
        h
    }

    /// Write `H` into `out`, reshaping it.
    pub fn h_into(&self, out: &mut Matrix<T>) {
        let n = self.qh.nrows();
        out.reshape(n, n);
        for i in 0..n {
            let start = i.saturating_sub(1);
            out.row_mut(i)[start..].copy_from_slice(&self.qh.row(i)[start..]);
        }
    }

    /// The orthogonal factor `Q`.
    pub fn q(&mut self) -> Matrix<T> {
        let n = self.qh.nrows();
        let mut q = Matrix::zeros(n, n);
        self.q_into(&mut q);
        q
    }

    /// Write `Q` into `out`, reshaping it.
    pub fn q_into(&mut self, out: &mut Matrix<T>) {
        let n = self.qh.nrows();
        out.reshape(n, n);
        out.set_identity();
        for j in (0..n.saturating_sub(2)).rev() {
            self.u[j + 1] = T::one();
            for i in (j + 2)..n {
                self.u[i] = self.qh[(i, j)];
            }
            rank1_update_mult_r(out, &self.u, self.gammas[j], j + 1, j + 1, n, &mut self.temp);
        }
    }
}
