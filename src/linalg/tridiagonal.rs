use alloc::vec::Vec;

use crate::linalg::householder::{householder_vector, rank1_update_mult_l, rank1_update_mult_r};
use crate::matrix::Matrix;
use crate::traits::FloatScalar;

/// Householder tridiagonalization of a symmetric matrix: `A = Q·T·Qᵀ`.
///
/// Only the upper triangle of the input is read. Reflector `k` zeroes
/// `A[k-1, k+1..]` and is stored in that same row, so `Q` is formed only
/// on request. Each congruence is a symmetric rank-2 update
/// `A ← A + u·wᵀ + w·uᵀ` restricted to the upper triangle.
///
/// # Example
///
/// ```
/// use eigensvd::Matrix;
/// use eigensvd::linalg::Tridiagonal;
///
/// let a = Matrix::from_rows(3, 3, &[4.0_f64, 1.0, 2.0, 1.0, 3.0, 0.5, 2.0, 0.5, 1.0]);
/// let mut td = Tridiagonal::new();
/// td.decompose(&a);
/// let q = td.q(false);
/// let back = &(&q * &td.t()) * &q.transpose();
/// assert!((&back - &a).frobenius_norm() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct Tridiagonal<T> {
    qt: Matrix<T>,
    gammas: Vec<T>,
    u: Vec<T>,
    w: Vec<T>,
}

impl<T: FloatScalar> Default for Tridiagonal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FloatScalar> Tridiagonal<T> {
    pub fn new() -> Self {
        Self {
            qt: Matrix::zeros(0, 0),
            gammas: Vec::new(),
            u: Vec::new(),
            w: Vec::new(),
        }
    }

    /// Reduce a copy of `a`. Panics if `a` is not square.
    pub fn decompose(&mut self, a: &Matrix<T>) {
        assert!(a.is_square(), "tridiagonalization requires a square matrix");
        self.qt.copy_from(a);
        self.reduce();
    }

    /// Reduce `a` in place, keeping it as work storage.
    pub fn decompose_in_place(&mut self, a: Matrix<T>) {
        assert!(a.is_square(), "tridiagonalization requires a square matrix");
        self.qt = a;
        self.reduce();
    }

    fn prepare(&mut self) {
        let n = self.qt.nrows();
        self.gammas.clear();
        self.gammas.resize(n, T::zero());
        self.u.clear();
        self.u.resize(n, T::zero());
        self.w.clear();
        self.w.resize(n, T::zero());
    }

    fn reduce(&mut self) {
        self.prepare();
        let n = self.qt.nrows();
        for k in 1..n {
            self.similar_transform(k);
        }
    }

    /// Build reflector `k` from row `k-1` and apply the congruence to the
    /// trailing block.
    fn similar_transform(&mut self, k: usize) {
        let n = self.qt.nrows();
        self.u[(k - 1)..].iter_mut().for_each(|x| *x = T::zero());
        self.u[k..n].copy_from_slice(&self.qt.row(k - 1)[k..n]);

        let Some(r) = householder_vector(&mut self.u[k..n]) else {
            self.gammas[k] = T::zero();
            return;
        };
        self.gammas[k] = r.gamma;
        self.householder_symmetric(k, r.gamma);

        let row = self.qt.row_mut(k - 1);
        row[(k + 1)..n].copy_from_slice(&self.u[(k + 1)..n]);
        row[k] = r.beta();
    }

    /// `A[row.., row..] ← (I − γuuᵀ)·A·(I − γuuᵀ)` on the upper triangle.
    fn householder_symmetric(&mut self, row: usize, gamma: T) {
        let n = self.qt.nrows();

        // w = -γ·A·u, reading the lower half through symmetry.
        for i in row..n {
            let mut total = T::zero();
            for j in row..i {
                total = total + self.qt[(j, i)] * self.u[j];
            }
            let arow = self.qt.row(i);
            for j in i..n {
                total = total + arow[j] * self.u[j];
            }
            self.w[i] = -gamma * total;
        }

        let mut total = T::zero();
        for i in row..n {
            total = total + self.u[i] * self.w[i];
        }
        let alpha = T::lit(-0.5) * gamma * total;
        for i in row..n {
            self.w[i] = self.w[i] + alpha * self.u[i];
        }

        for i in row..n {
            let (ui, wi) = (self.u[i], self.w[i]);
            let arow = self.qt.row_mut(i);
            for j in i..n {
                arow[j] = arow[j] + ui * self.w[j] + wi * self.u[j];
            }
        }
    }

    /// Size of the reduced matrix.
    pub fn size(&self) -> usize {
        self.qt.nrows()
    }

    /// Copy the diagonal (`n` values) and off-diagonal (`n - 1` values) of `T`.
    pub fn condensed(&self, diag: &mut Vec<T>, off: &mut Vec<T>) {
        let n = self.qt.nrows();
        diag.clear();
        off.clear();
        for i in 0..n {
            diag.push(self.qt[(i, i)]);
            if i + 1 < n {
                off.push(self.qt[(i, i + 1)]);
            }
        }
    }

    /// The symmetric tridiagonal matrix `T`.
    pub fn t(&self) -> Matrix<T> {
        let n = self.qt.nrows();
        let mut t = Matrix::zeros(n, n);
        for i in 0..n {
            t[(i, i)] = self.qt[(i, i)];
            if i + 1 < n {
                let off = self.qt[(i, i + 1)];
                t[(i, i + 1)] = off;
                t[(i + 1, i)] = off;
            }
        }
        t
    }

    /// The orthogonal factor `Q` (or `Qᵀ`).
    pub fn q(&mut self, transposed: bool) -> Matrix<T> {
        let n = self.qt.nrows();
        let mut q = Matrix::zeros(n, n);
        self.q_into(transposed, &mut q);
        q
    }

    /// Write `Q` (or `Qᵀ`) into `out`, which must be `n × n`.
    pub fn q_into(&mut self, transposed: bool, out: &mut Matrix<T>) {
        let n = self.qt.nrows();
        assert!(out.nrows() == n && out.ncols() == n, "Q must be {}x{}", n, n);
        out.set_identity();
        for j in (0..n.saturating_sub(1)).rev() {
            self.w[j + 1] = T::one();
            let row = self.qt.row(j);
            self.w[(j + 2)..n].copy_from_slice(&row[(j + 2)..n]);
            let gamma = self.gammas[j + 1];
            if transposed {
                rank1_update_mult_l(out, &self.w, gamma, j + 1, j + 1, n);
            } else {
                rank1_update_mult_r(out, &self.w, gamma, j + 1, j + 1, n, &mut self.u);
            }
        }
    }
}

/// Panel (blocked) tridiagonalization.
///
/// Reflectors are generated `block_size` at a time. Inside a panel the
/// pending rank-2 updates are kept as pairs `(uᵢ, wᵢ)` and folded in on the
/// fly where a row or a product is needed; the trailing upper triangle is
/// updated once per panel. The packed output has the same layout as
/// [`Tridiagonal`], and the same `diag`/`off` up to rounding order.
#[derive(Debug, Clone)]
pub struct BlockTridiagonal<T> {
    inner: Tridiagonal<T>,
    block_size: usize,
    panel_u: Matrix<T>,
    panel_w: Matrix<T>,
}

impl<T: FloatScalar> BlockTridiagonal<T> {
    /// Panics if `block_size` is zero.
    pub fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be positive");
        Self {
            inner: Tridiagonal::new(),
            block_size,
            panel_u: Matrix::zeros(0, 0),
            panel_w: Matrix::zeros(0, 0),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn decompose(&mut self, a: &Matrix<T>) {
        assert!(a.is_square(), "tridiagonalization requires a square matrix");
        self.inner.qt.copy_from(a);
        self.reduce();
    }

    pub fn decompose_in_place(&mut self, a: Matrix<T>) {
        assert!(a.is_square(), "tridiagonalization requires a square matrix");
        self.inner.qt = a;
        self.reduce();
    }

    fn reduce(&mut self) {
        self.inner.prepare();
        let n = self.inner.qt.nrows();
        self.panel_u.reshape(self.block_size, n);
        self.panel_w.reshape(self.block_size, n);

        let mut k0 = 1;
        while k0 < n {
            let k1 = (k0 + self.block_size).min(n);
            self.panel_u.fill_zero();
            self.panel_w.fill_zero();
            for k in k0..k1 {
                self.panel_reflector(k0, k);
            }
            self.trailing_update(k1 - k0, k1 - 1);
            k0 = k1;
        }
    }

    /// Reflector `k` of the panel starting at `k0`.
    fn panel_reflector(&mut self, k0: usize, k: usize) {
        let n = self.inner.qt.nrows();
        let done = k - k0;
        let td = &mut self.inner;

        // Bring row k-1 up to date with the pending pairs of this panel.
        {
            let row = td.qt.row_mut(k - 1);
            for p in 0..done {
                let up = self.panel_u.row(p);
                let wp = self.panel_w.row(p);
                let (u_r, w_r) = (up[k - 1], wp[k - 1]);
                for j in (k - 1)..n {
                    row[j] = row[j] + u_r * wp[j] + w_r * up[j];
                }
            }
        }

        td.u.iter_mut().for_each(|x| *x = T::zero());
        td.u[k..n].copy_from_slice(&td.qt.row(k - 1)[k..n]);
        let Some(r) = householder_vector(&mut td.u[k..n]) else {
            td.gammas[k] = T::zero();
            return;
        };
        let gamma = r.gamma;
        td.gammas[k] = gamma;

        // w = -γ·(A₀ + Σ uₚwₚᵀ + wₚuₚᵀ)·u over rows k..n.
        for i in k..n {
            let mut total = T::zero();
            for j in k..i {
                total = total + td.qt[(j, i)] * td.u[j];
            }
            let arow = td.qt.row(i);
            for j in i..n {
                total = total + arow[j] * td.u[j];
            }
            td.w[i] = total;
        }
        for p in 0..done {
            let up = self.panel_u.row(p);
            let wp = self.panel_w.row(p);
            let mut wu = T::zero();
            let mut uu = T::zero();
            for j in k..n {
                wu = wu + wp[j] * td.u[j];
                uu = uu + up[j] * td.u[j];
            }
            for i in k..n {
                td.w[i] = td.w[i] + up[i] * wu + wp[i] * uu;
            }
        }
        for i in k..n {
            td.w[i] = -gamma * td.w[i];
        }

        let mut total = T::zero();
        for i in k..n {
            total = total + td.u[i] * td.w[i];
        }
        let alpha = T::lit(-0.5) * gamma * total;
        for i in k..n {
            td.w[i] = td.w[i] + alpha * td.u[i];
        }

        let pu = self.panel_u.row_mut(done);
        pu[k..n].copy_from_slice(&td.u[k..n]);
        let pw = self.panel_w.row_mut(done);
        pw[k..n].copy_from_slice(&td.w[k..n]);

        let row = td.qt.row_mut(k - 1);
        row[(k + 1)..n].copy_from_slice(&td.u[(k + 1)..n]);
        row[k] = r.beta();
    }

    /// Fold `count` pending pairs into the upper triangle from row `row0` on.
    fn trailing_update(&mut self, count: usize, row0: usize) {
        let n = self.inner.qt.nrows();
        for i in row0..n {
            let arow = self.inner.qt.row_mut(i);
            for p in 0..count {
                let up = self.panel_u.row(p);
                let wp = self.panel_w.row(p);
                let (ui, wi) = (up[i], wp[i]);
                if ui == T::zero() && wi == T::zero() {
                    continue;
                }
                for j in i..n {
                    arow[j] = arow[j] + ui * wp[j] + wi * up[j];
                }
            }
        }
    }

    pub fn size(&self) -> usize {
        self.inner.size()
    }

    pub fn condensed(&self, diag: &mut Vec<T>, off: &mut Vec<T>) {
        self.inner.condensed(diag, off);
    }

    pub fn t(&self) -> Matrix<T> {
        self.inner.t()
    }

    pub fn q(&mut self, transposed: bool) -> Matrix<T> {
        self.inner.q(transposed)
    }

    pub fn q_into(&mut self, transposed: bool, out: &mut Matrix<T>) {
        self.inner.q_into(transposed, out);
    }
}
