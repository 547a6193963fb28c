use crate::matrix::Matrix;
use crate::traits::FloatScalar;

/// Cosine/sine of the rotation that maps `(rise, run)` onto the first axis.
///
/// Divides by the larger of the two magnitudes so the intermediate square
/// never overflows. `rise == run == 0` yields NaN; callers only rotate when
/// the bulge is nonzero.
#[inline]
pub(crate) fn rotator<T: FloatScalar>(rise: T, run: T) -> (T, T) {
    if rise.abs() < run.abs() {
        let k = rise / run;
        let bottom = (T::one() + k * k).sqrt();
        (k / bottom, T::one() / bottom)
    } else {
        let t = run / rise;
        let bottom = (T::one() + t * t).sqrt();
        (T::one() / bottom, t / bottom)
    }
}

/// Rotation plus the squared terms the symmetric similarity update needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SymmetricRotation<T> {
    pub c: T,
    pub s: T,
    pub c2: T,
    pub s2: T,
    pub cs: T,
}

impl<T: FloatScalar> SymmetricRotation<T> {
    /// Rotation that annihilates `rise` against `run`.
    pub fn annihilating(run: T, rise: T) -> Self {
        if rise.abs() > run.abs() {
            let k = run / rise;
            let bottom = T::one() + k * k;
            let bottom_sq = bottom.sqrt();
            Self {
                c: k / bottom_sq,
                s: T::one() / bottom_sq,
                c2: k * k / bottom,
                s2: T::one() / bottom,
                cs: k / bottom,
            }
        } else {
            let t = rise / run;
            let bottom = T::one() + t * t;
            let bottom_sq = bottom.sqrt();
            Self {
                c: T::one() / bottom_sq,
                s: t / bottom_sq,
                c2: T::one() / bottom,
                s2: t * t / bottom,
                cs: t / bottom,
            }
        }
    }

    /// Rotation by an explicit angle.
    pub fn by_angle(theta: T) -> Self {
        let (s, c) = theta.sin_cos();
        Self {
            c,
            s,
            c2: c * c,
            s2: s * s,
            cs: c * s,
        }
    }
}

/// Apply the rotation `(c, s)` to rows `m` and `n` of a transposed factor:
/// `row_m ← c·row_m + s·row_n`, `row_n ← −s·row_m + c·row_n`.
///
/// The orthogonal factors are accumulated transposed so that each rotation
/// touches two contiguous rows instead of two strided columns.
#[inline]
pub(crate) fn update_rotator<T: FloatScalar>(qt: &mut Matrix<T>, m: usize, n: usize, c: T, s: T) {
    let (row_a, row_b) = qt.two_rows_mut(m, n);
    for (a, b) in row_a.iter_mut().zip(row_b.iter_mut()) {
        let x = *a;
        let y = *b;
        *a = c * x + s * y;
        *b = -s * x + c * y;
    }
}
