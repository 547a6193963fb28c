use alloc::vec::Vec;

use crate::linalg::householder::{householder_vector, rank1_update_mult_r};
use crate::matrix::Matrix;
use crate::traits::FloatScalar;

/// Householder QR with column pivoting: `A·P = Q·R`.
///
/// At every step the remaining column with the largest norm is moved to the
/// front, so `|R[0,0]| >= |R[1,1]| >= ...`. The column norms are downdated
/// after each reflector and recomputed once cancellation makes the running
/// value unreliable.
///
/// The packed factorization keeps `R` in the upper triangle and the
/// Householder vectors (implicit leading one) below the diagonal.
///
/// # Example
///
/// ```
/// use eigensvd::Matrix;
/// use eigensvd::linalg::PivotedQr;
///
/// let a = Matrix::from_rows(3, 2, &[1.0_f64, 10.0, 2.0, 20.0, 3.0, 31.0]);
/// let mut qr = PivotedQr::new();
/// qr.decompose(&a);
/// // The heavier second column is pivoted to the front.
/// assert_eq!(qr.pivots(), &[1, 0]);
/// ```
#[derive(Debug, Clone)]
pub struct PivotedQr<T> {
    qr: Matrix<T>,
    gammas: Vec<T>,
    pivots: Vec<usize>,
    norms: Vec<T>,
    norms_ref: Vec<T>,
    u: Vec<T>,
    temp: Vec<T>,
}

impl<T: FloatScalar> Default for PivotedQr<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatScalar> PivotedQr<T> {
    pub fn new() -> Self {
        Self {
            qr: Matrix::zeros(0, 0),
            gammas: Vec::new(),
            pivots: Vec::new(),
            norms: Vec::new(),
            norms_ref: Vec::new(),
            u: Vec::new(),
            temp: Vec::new(),
        }
    }

    /// Factor a copy of `a`.
    pub fn decompose(&mut self, a: &Matrix<T>) {
        self.qr.copy_from(a);
        self.factor();
    }

    fn factor(&mut self) {
        let m = self.qr.nrows();
        let n = self.qr.ncols();
        let min = m.min(n);

        self.gammas.clear();
        self.gammas.resize(min, T::zero());
        self.pivots.clear();
        self.pivots.extend(0..n);
        self.u.clear();
        self.u.resize(m, T::zero());
        self.temp.clear();
        self.temp.resize(n, T::zero());

        self.norms.clear();
        for j in 0..n {
            self.norms.push(self.column_norm(j, 0));
        }
        self.norms_ref.clear();
        self.norms_ref.extend_from_slice(&self.norms);

        let downdate_tol = T::epsilon().sqrt();

        for k in 0..min {
            let pivot = (k..n).fold(k, |best, j| {
                if self.norms[j] > self.norms[best] {
                    j
                } else {
                    best
                }
            });
            if pivot != k {
                self.swap_columns(k, pivot);
            }

            for i in k..m {
                self.u[i] = self.qr[(i, k)];
            }
            match householder_vector(&mut self.u[k..m]) {
                Some(r) => {
                    for i in (k + 1)..m {
                        self.qr[(i, k)] = self.u[i];
                    }
                    self.gammas[k] = r.gamma;
                    rank1_update_mult_r(&mut self.qr, &self.u, r.gamma, k + 1, k, m, &mut self.temp);
                    self.qr[(k, k)] = r.beta();
                }
                None => self.gammas[k] = T::zero(),
            }

            for j in (k + 1)..n {
                if self.norms[j] == T::zero() {
                    continue;
                }
                let ratio = self.qr[(k, j)].abs() / self.norms[j];
                let mut factor = (T::one() + ratio) * (T::one() - ratio);
                if factor < T::zero() {
                    factor = T::zero();
                }
                let scaled = self.norms[j] / self.norms_ref[j];
                if factor * scaled * scaled <= downdate_tol {
                    let fresh = self.column_norm(j, k + 1);
                    self.norms[j] = fresh;
                    self.norms_ref[j] = fresh;
                } else {
                    self.norms[j] = self.norms[j] * factor.sqrt();
                }
            }
        }
    }

    fn column_norm(&self, j: usize, row0: usize) -> T {
        let m = self.qr.nrows();
        let scale = (row0..m).fold(T::zero(), |acc, i| acc.max(self.qr[(i, j)].abs()));
        if scale == T::zero() {
            return T::zero();
        }
        let sum = (row0..m).fold(T::zero(), |acc, i| {
            let v = self.qr[(i, j)] / scale;
            acc + v * v
        });
        scale * sum.sqrt()
    }

    fn swap_columns(&mut self, a: usize, b: usize) {
        for i in 0..self.qr.nrows() {
            self.qr.row_mut(i).swap(a, b);
        }
        self.pivots.swap(a, b);
        self.norms.swap(a, b);
        self.norms_ref.swap(a, b);
    }

    /// Column permutation: column `j` of `A·P` is column `pivots()[j]` of `A`.
    pub fn pivots(&self) -> &[usize] {
        &self.pivots
    }

    /// Upper-triangular factor, `min(m,n) × n` when `compact`, else `m × n`.
    pub fn r(&self, compact: bool) -> Matrix<T> {
        let m = self.qr.nrows();
        let n = self.qr.ncols();
        let rows = if compact { m.min(n) } else { m };
        let mut r = Matrix::zeros(rows, n);
        for i in 0..rows.min(n) {
            for j in i..n {
                r[(i, j)] = self.qr[(i, j)];
            }
        }
        r
    }

    /// Orthogonal factor, `m × min(m,n)` when `compact`, else `m × m`.
    ///
    /// Built by applying the stored reflectors in reverse to an identity.
    pub fn q(&mut self, compact: bool) -> Matrix<T> {
        let m = self.qr.nrows();
        let n = self.qr.ncols();
        let min = m.min(n);
        let mut q = Matrix::zeros(m, if compact { min } else { m });
        q.set_identity();

        self.temp.clear();
        self.temp.resize(m, T::zero());
        for j in (0..min).rev() {
            self.u[j] = T::one();
            for i in (j + 1)..m {
                self.u[i] = self.qr[(i, j)];
            }
            rank1_update_mult_r(&mut q, &self.u, self.gammas[j], j, j, m, &mut self.temp);
        }
        q
    }

    /// `R·Pᵀ`: the triangular factor with its columns returned to their
    /// original order, so that `A = Q·(R·Pᵀ)`.
    pub fn r_unpivoted(&self, compact: bool) -> Matrix<T> {
        let r = self.r(compact);
        let mut out = Matrix::zeros(r.nrows(), r.ncols());
        for i in 0..r.nrows() {
            for (j, &p) in self.pivots.iter().enumerate() {
                out[(i, p)] = r[(i, j)];
            }
        }
        out
    }
}
