//! Closed-form eigenvalues of 2×2 blocks.

use num_complex::Complex;

use crate::traits::FloatScalar;

/// Eigenvalues of the symmetric 2×2 matrix `[[a11, a12], [a12, a22]]`,
/// larger first. No scaling: the caller normalizes.
#[inline]
pub fn symmetric_2x2_fast<T: FloatScalar>(a11: T, a12: T, a22: T) -> (T, T) {
    let half = T::lit(0.5);
    let left = (a11 + a22) * half;
    let b = (a11 - a22) * half;
    let right = (b * b + a12 * a12).sqrt();
    (left + right, left - right)
}

/// Eigenvalues of a general 2×2 block, computed carefully.
///
/// The block is scaled by its largest magnitude, rotated so both diagonal
/// entries are equal, and then either rotated to upper triangular (real
/// pair) or read off as `b11 ± i·sqrt(−b12·b21)` (complex pair). This avoids
/// the cancellation the characteristic polynomial suffers when the
/// eigenvalues are close.
///
/// ```
/// use eigensvd::linalg::value_2x2;
/// // Rotation by 90 degrees: eigenvalues ±i.
/// let (v0, v1) = value_2x2(0.0_f64, -1.0, 1.0, 0.0);
/// assert!(v0.re.abs() < 1e-15 && (v0.im.abs() - 1.0).abs() < 1e-15);
/// assert_eq!(v0.im, -v1.im);
/// ```
pub fn value_2x2<T: FloatScalar>(a11: T, a12: T, a21: T, a22: T) -> (Complex<T>, Complex<T>) {
    let max = a11.abs().max(a22.abs()).max(a12.abs()).max(a21.abs());
    if max == T::zero() {
        return (Complex::new(T::zero(), T::zero()), Complex::new(T::zero(), T::zero()));
    }
    let (a11, a12, a21, a22) = (a11 / max, a12 / max, a21 / max, a22 / max);

    // Rotate so that the two diagonal entries match.
    let (c, s) = if a12 + a21 == T::zero() {
        let r = T::one() / T::lit(2.0).sqrt();
        (r, r)
    } else {
        let aa = a11 - a22;
        let bb = a12 + a21;
        let t_hat = aa / bb;
        let t = t_hat / (T::one() + (T::one() + t_hat * t_hat).sqrt());
        let c = T::one() / (T::one() + t * t).sqrt();
        (c, c * t)
    };

    let c2 = c * c;
    let s2 = s * s;
    let cs = c * s;

    let b11 = c2 * a11 + s2 * a22 - cs * (a12 + a21);
    let b12 = c2 * a12 - s2 * a21 + cs * (a11 - a22);
    let b21 = c2 * a21 - s2 * a12 + cs * (a11 - a22);

    if b21 * b12 >= T::zero() {
        let (c, s) = if b12 == T::zero() {
            (T::zero(), T::one())
        } else {
            ((b12 / (b12 + b21)).sqrt(), (b21 / (b12 + b21)).sqrt())
        };
        let cs = c * s;
        let v0 = b11 - cs * (b12 + b21);
        let v1 = b11 + cs * (b12 + b21);
        (
            Complex::new(v0 * max, T::zero()),
            Complex::new(v1 * max, T::zero()),
        )
    } else {
        let im = (-b21 * b12).sqrt();
        (Complex::new(b11 * max, im * max), Complex::new(b11 * max, -im * max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    fn assert_near(a: f64, b: f64, tol: f64, msg: &str) {
        assert!((a - b).abs() < tol, "{}: {} vs {} (diff {})", msg, a, b, (a - b).abs());
    }

    /// Scaled symmetric solver, kept as a reference for the unscaled one.
    fn symmetric_2x2(a11: f64, a12: f64, a22: f64) -> (f64, f64) {
        let scale = a11.abs().max(a12.abs()).max(a22.abs());
        if scale == 0.0 {
            return (0.0, 0.0);
        }
        let (v0, v1) = symmetric_2x2_fast(a11 / scale, a12 / scale, a22 / scale);
        (v0 * scale, v1 * scale)
    }

    /// Characteristic-polynomial solver to check the careful one against.
    fn value_2x2_fast(a11: f64, a12: f64, a21: f64, a22: f64) -> (Complex<f64>, Complex<f64>) {
        let left = (a11 + a22) * 0.5;
        let inside = 4.0 * a12 * a21 + (a11 - a22) * (a11 - a22);
        if inside < 0.0 {
            let im = (-inside).sqrt() * 0.5;
            (Complex::new(left, im), Complex::new(left, -im))
        } else {
            let right = inside.sqrt() * 0.5;
            (Complex::new(left + right, 0.0), Complex::new(left - right, 0.0))
        }
    }

    fn sorted(a: f64, b: f64) -> (f64, f64) {
        if a >= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    #[test]
    fn symmetric_fast_known_values() {
        let (l0, l1) = symmetric_2x2_fast(2.0, 1.0, 2.0);
        assert_eq!((l0, l1), (3.0, 1.0));
        let (l0, l1) = symmetric_2x2_fast(1.0, 0.0, 5.0);
        assert_eq!((l0, l1), (5.0, 1.0));
    }

    #[test]
    fn symmetric_scaled_avoids_overflow() {
        // The unscaled form overflows squaring these.
        assert!(!symmetric_2x2_fast(2e300_f64, 1e300, 2e300).1.is_finite());
        let (l0, l1) = symmetric_2x2(2e300, 1e300, 2e300);
        assert_near(l0 / 3e300, 1.0, TOL, "l0");
        assert_near(l1 / 1e300, 1.0, TOL, "l1");
        assert_eq!(symmetric_2x2(0.0, 0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn general_real_pair() {
        // Upper triangular: eigenvalues on the diagonal.
        let (v0, v1) = value_2x2(4.0_f64, 3.0, 0.0, -2.0);
        assert_eq!(v0.im, 0.0);
        assert_eq!(v1.im, 0.0);
        let (hi, lo) = sorted(v0.re, v1.re);
        assert_near(hi, 4.0, TOL, "hi");
        assert_near(lo, -2.0, TOL, "lo");
    }

    #[test]
    fn general_complex_pair() {
        // [[1, -2], [1, 1]]: eigenvalues 1 ± i·sqrt(2).
        let (v0, v1) = value_2x2(1.0_f64, -2.0, 1.0, 1.0);
        assert_near(v0.re, 1.0, TOL, "re0");
        assert_near(v1.re, 1.0, TOL, "re1");
        assert_near(v0.im.abs(), 2.0_f64.sqrt(), TOL, "im");
        assert_eq!(v0.im, -v1.im);
    }

    #[test]
    fn careful_and_fast_agree() {
        let cases = [
            (1.0, 2.0, 3.0, 4.0),
            (0.5, -0.25, 0.75, 2.0),
            (1.0, -2.0, 1.0, 1.0),
            (-3.0, 1e-3, 1e3, -3.0),
        ];
        for &(a, b, c, d) in &cases {
            let (f0, f1) = value_2x2_fast(a, b, c, d);
            let (s0, s1) = value_2x2(a, b, c, d);
            let sum_f = f0 + f1;
            let sum_s = s0 + s1;
            let prod_f = f0 * f1;
            let prod_s = s0 * s1;
            assert_near(sum_f.re, sum_s.re, 1e-10, "trace");
            assert_near(prod_f.re, prod_s.re, 1e-9, "det");
        }
    }
}
