use crate::traits::{FloatScalar, MatrixMut};

/// A Householder reflector `I - γ·u·uᵀ` built in place over a vector.
///
/// The vector itself lives wherever the caller built it (a work buffer or an
/// unused triangle of the matrix being reduced); this only keeps the scalars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Reflector<T> {
    /// `γ = (u₀ + τ) / τ` of the normalized vector.
    pub gamma: T,
    /// Signed norm of the normalized vector.
    pub tau: T,
    /// Magnitude used to normalize the vector.
    pub max: T,
}

impl<T: FloatScalar> Reflector<T> {
    /// Value left in the leading position once the reflector is applied.
    #[inline]
    pub fn beta(&self) -> T {
        -self.tau * self.max
    }
}

/// Largest absolute value in `u`.
#[inline]
pub(crate) fn find_max<T: FloatScalar>(u: &[T]) -> T {
    u.iter()
        .fold(T::zero(), |acc, &x| if x.abs() > acc { x.abs() } else { acc })
}

/// Divide `u` by `max` and return its Euclidean norm with the sign of `u[0]`.
pub(crate) fn compute_tau_and_divide<T: FloatScalar>(u: &mut [T], max: T) -> T {
    let mut tau = T::zero();
    for x in u.iter_mut() {
        *x = *x / max;
        tau = tau + *x * *x;
    }
    tau = tau.sqrt();
    if u[0] < T::zero() {
        -tau
    } else {
        tau
    }
}

#[inline]
pub(crate) fn divide_elements<T: FloatScalar>(u: &mut [T], div: T) {
    for x in u.iter_mut() {
        *x = *x / div;
    }
}

/// Turn `u` into a Householder vector with an implicit leading one.
///
/// On return `u[0] == 1` and `u[1..]` holds the scaled tail. Returns `None`
/// when `u` is entirely zero, in which case the reflector is the identity and
/// the caller skips the step (`γ = 0`).
pub(crate) fn householder_vector<T: FloatScalar>(u: &mut [T]) -> Option<Reflector<T>> {
    let max = find_max(u);
    if max == T::zero() {
        return None;
    }
    let tau = compute_tau_and_divide(u, max);
    let nu = u[0] + tau;
    divide_elements(&mut u[1..], nu);
    u[0] = T::one();
    Some(Reflector {
        gamma: nu / tau,
        tau,
        max,
    })
}

/// `A[w0..w1, col0..] ← (I − γ·u·uᵀ)·A[w0..w1, col0..]`.
///
/// `u` is indexed by absolute row, and `u[w0]` is taken to be one.
/// `temp` must hold at least `ncols - col0` elements.
pub(crate) fn rank1_update_mult_r<T: FloatScalar>(
    a: &mut impl MatrixMut<T>,
    u: &[T],
    gamma: T,
    col0: usize,
    w0: usize,
    w1: usize,
    temp: &mut [T],
) {
    if w0 >= w1 || col0 >= a.ncols() {
        return;
    }
    let width = a.ncols() - col0;
    let temp = &mut temp[..width];

    temp.copy_from_slice(a.row_as_slice(w0, col0));
    for k in (w0 + 1)..w1 {
        let uk = u[k];
        for (t, &x) in temp.iter_mut().zip(a.row_as_slice(k, col0)) {
            *t = *t + uk * x;
        }
    }
    for t in temp.iter_mut() {
        *t = *t * gamma;
    }

    for (x, &t) in a.row_as_mut_slice(w0, col0).iter_mut().zip(temp.iter()) {
        *x = *x - t;
    }
    for i in (w0 + 1)..w1 {
        let ui = u[i];
        for (x, &t) in a.row_as_mut_slice(i, col0).iter_mut().zip(temp.iter()) {
            *x = *x - ui * t;
        }
    }
}

/// `A[row0.., w0..w1] ← A[row0.., w0..w1]·(I − γ·u·uᵀ)`.
///
/// `u` is indexed by absolute column, and `u[w0]` is taken to be one.
pub(crate) fn rank1_update_mult_l<T: FloatScalar>(
    a: &mut impl MatrixMut<T>,
    u: &[T],
    gamma: T,
    row0: usize,
    w0: usize,
    w1: usize,
) {
    if w0 >= w1 {
        return;
    }
    let tail = &u[(w0 + 1)..w1];
    for i in row0..a.nrows() {
        let row = &mut a.row_as_mut_slice(i, w0)[..(w1 - w0)];
        let mut sum = row[0];
        for (&x, &uj) in row[1..].iter().zip(tail) {
            sum = sum + x * uj;
        }
        let sum = -gamma * sum;
        row[0] = row[0] + sum;
        for (x, &uj) in row[1..].iter_mut().zip(tail) {
            *x = *x + sum * uj;
        }
    }
}
