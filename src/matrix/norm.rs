use crate::traits::FloatScalar;

use super::Matrix;

impl<T: FloatScalar> Matrix<T> {
    /// Frobenius norm: `sqrt(sum |a_ij|^2)`.
    ///
    /// Scaled by the largest magnitude first so that very large or very
    /// small entries do not overflow or underflow the sum of squares.
    ///
    /// ```
    /// use eigensvd::Matrix;
    /// let m = Matrix::from_rows(2, 2, &[1.0_f64, 2.0, 3.0, 4.0]);
    /// assert!((m.frobenius_norm() - 30.0_f64.sqrt()).abs() < 1e-12);
    /// ```
    pub fn frobenius_norm(&self) -> T {
        let scale = self.max_abs();
        if scale == T::zero() {
            return T::zero();
        }
        let sum = self
            .data
            .iter()
            .fold(T::zero(), |acc, &x| {
                let y = x / scale;
                acc + y * y
            });
        scale * sum.sqrt()
    }

    /// Largest absolute element value (0 for an empty matrix).
    pub fn max_abs(&self) -> T {
        self.data
            .iter()
            .fold(T::zero(), |acc, &x| if x.abs() > acc { x.abs() } else { acc })
    }

    /// Whether every element is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    /// Whether `|a_ij - a_ji| <= tol * max|a|` for every pair.
    ///
    /// The tolerance is relative to the largest element so that the check is
    /// scale invariant. Non-square matrices are never symmetric.
    ///
    /// ```
    /// use eigensvd::Matrix;
    /// let s = Matrix::from_rows(2, 2, &[2.0_f64, 1.0, 1.0, 2.0]);
    /// assert!(s.is_symmetric(1e-12));
    /// let g = Matrix::from_rows(2, 2, &[2.0_f64, 1.0, 0.0, 2.0]);
    /// assert!(!g.is_symmetric(1e-12));
    /// ```
    pub fn is_symmetric(&self, tol: T) -> bool {
        if !self.is_square() {
            return false;
        }
        let bound = tol * self.max_abs();
        let n = self.nrows;
        for i in 0..n {
            for j in (i + 1)..n {
                if (self[(i, j)] - self[(j, i)]).abs() > bound {
                    return false;
                }
            }
        }
        true
    }

    /// `‖selfᵀ·self − I‖_F`, zero for a matrix with orthonormal columns.
    pub fn orthogonality_error(&self) -> T {
        let gram = self.transpose_mul(self);
        let id = Matrix::identity(self.ncols);
        (&gram - &id).frobenius_norm()
    }
}
