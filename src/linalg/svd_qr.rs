use alloc::vec::Vec;
use core::mem;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::linalg::eigen_small::symmetric_2x2_fast;
use crate::linalg::givens::{rotator, update_rotator};
use crate::linalg::settings::QrSettings;
use crate::linalg::LinalgError;
use crate::matrix::Matrix;
use crate::traits::FloatScalar;

/// Steps a scripted shift gets before the engine falls back to Wilkinson.
const GIVE_UP_ON_SCRIPT: usize = 10;
/// Zero-shift steps taken while hunting for zero singular values.
const ZERO_HUNT_STEPS: usize = 6;

/// How the next shift is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShiftMode {
    /// Zero shift, which converges quickly onto singular values of zero.
    FindingZeros,
    /// Wilkinson shift of the trailing 2×2 of `BᵀB`.
    Wilkinson,
    /// Squares of previously computed singular values.
    Scripted,
}

/// Implicit-shift QR iteration on an upper bidiagonal matrix.
///
/// Drives the superdiagonal to zero with Golub–Kahan bulge chasing; the
/// diagonal then holds the singular values, in engine order and possibly
/// negative. Rotations are accumulated into the optional transposed factors
/// `Uᵀ` (left) and `Vᵀ` (right), so that with both starting as identities
/// `B = Uᵀᵀ·Σ·Vᵀ` on completion.
///
/// The engine is a session: buffers persist between calls and
/// [`set_matrix`](Self::set_matrix) starts a new problem.
///
/// # Example
///
/// ```
/// use eigensvd::linalg::{QrSettings, SvdQr};
///
/// let mut qr = SvdQr::new(QrSettings::<f64>::default());
/// qr.set_matrix(&[1.0, 3.0], &[2.0]);
/// qr.process().unwrap();
/// let s = qr.singular_values();
/// // σ₁·σ₂ = |det B| and σ₁² + σ₂² = ‖B‖²
/// assert!(((s[0] * s[1]).abs() - 3.0).abs() < 1e-12);
/// assert!((s[0] * s[0] + s[1] * s[1] - 14.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct SvdQr<T> {
    settings: QrSettings<T>,
    rng: StdRng,

    ut: Option<Matrix<T>>,
    vt: Option<Matrix<T>>,

    diag: Vec<T>,
    off: Vec<T>,
    n: usize,
    max_value: T,
    bulge: T,

    x1: usize,
    x2: isize,
    splits: Vec<usize>,

    steps: usize,
    total_steps: usize,
    num_exceptional: usize,
    next_exceptional: usize,

    mode: ShiftMode,
    script: Vec<T>,
}

impl<T: FloatScalar> SvdQr<T> {
    pub fn new(settings: QrSettings<T>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(settings.seed),
            settings,
            ut: None,
            vt: None,
            diag: Vec::new(),
            off: Vec::new(),
            n: 0,
            max_value: T::zero(),
            bulge: T::zero(),
            x1: 0,
            x2: -1,
            splits: Vec::new(),
            steps: 0,
            total_steps: 0,
            num_exceptional: 0,
            next_exceptional: settings.exceptional_threshold,
            mode: ShiftMode::FindingZeros,
            script: Vec::new(),
        }
    }

    pub fn settings(&self) -> &QrSettings<T> {
        &self.settings
    }

    /// Solve 2×2 windows in closed form (values only).
    pub fn set_fast_values(&mut self, fast: bool) {
        self.settings.fast_values = fast;
    }

    /// Load the bidiagonal `diag` (`n` values) / `off` (`n - 1` values) and
    /// reset the iteration state.
    pub fn set_matrix(&mut self, diag: &[T], off: &[T]) {
        assert!(
            off.len() + 1 == diag.len() || (diag.is_empty() && off.is_empty()),
            "off-diagonal must have one element less than the diagonal"
        );
        self.diag.clear();
        self.diag.extend_from_slice(diag);
        self.off.clear();
        self.off.extend_from_slice(off);
        self.reset(diag.len());
    }

    /// Reset the iteration state for an `n`-value problem whose arrays are
    /// already in place (for example after [`swap_diag`](Self::swap_diag)).
    pub fn reset(&mut self, n: usize) {
        assert!(self.diag.len() >= n, "diagonal buffer too small");
        assert!(self.off.len() + 1 >= n, "off-diagonal buffer too small");
        self.n = n;
        self.x1 = 0;
        self.x2 = n as isize - 1;
        self.splits.clear();
        self.steps = 0;
        self.total_steps = 0;
        self.num_exceptional = 0;
        self.next_exceptional = self.settings.exceptional_threshold;
        self.rng = StdRng::seed_from_u64(self.settings.seed);

        self.max_value = T::zero();
        for i in 0..n {
            self.max_value = self.max_value.max(self.diag[i].abs());
            if i + 1 < n {
                self.max_value = self.max_value.max(self.off[i].abs());
            }
        }
    }

    /// Exchange the diagonal buffer, returning the previous one.
    pub fn swap_diag(&mut self, diag: Vec<T>) -> Vec<T> {
        mem::replace(&mut self.diag, diag)
    }

    /// Exchange the off-diagonal buffer, returning the previous one.
    pub fn swap_off(&mut self, off: Vec<T>) -> Vec<T> {
        mem::replace(&mut self.off, off)
    }

    /// Largest magnitude in the loaded bidiagonal; zero means nothing to do.
    pub fn max_value(&self) -> T {
        self.max_value
    }

    /// Install (or clear) the left accumulator `Uᵀ`; it needs at least `n` rows.
    pub fn set_ut(&mut self, ut: Option<Matrix<T>>) {
        self.ut = ut;
    }

    /// Install (or clear) the right accumulator `Vᵀ`; it needs at least `n` rows.
    pub fn set_vt(&mut self, vt: Option<Matrix<T>>) {
        self.vt = vt;
    }

    pub fn ut(&self) -> Option<&Matrix<T>> {
        self.ut.as_ref()
    }

    pub fn vt(&self) -> Option<&Matrix<T>> {
        self.vt.as_ref()
    }

    pub(crate) fn ut_mut(&mut self) -> Option<&mut Matrix<T>> {
        self.ut.as_mut()
    }

    pub fn take_ut(&mut self) -> Option<Matrix<T>> {
        self.ut.take()
    }

    pub fn take_vt(&mut self) -> Option<Matrix<T>> {
        self.vt.take()
    }

    /// Iterate until every superdiagonal element is negligible.
    pub fn process(&mut self) -> Result<(), LinalgError> {
        self.mode = ShiftMode::FindingZeros;
        self.run()
    }

    /// Iterate using the squares of `values` (indexed like the diagonal) as
    /// shifts. A window that makes no progress after a few steps switches
    /// back to Wilkinson shifts.
    pub fn process_scripted(&mut self, values: &[T]) -> Result<(), LinalgError> {
        assert!(values.len() >= self.n, "script needs one value per singular value");
        self.script.clear();
        self.script.extend_from_slice(values);
        self.mode = ShiftMode::Scripted;
        self.run()
    }

    fn run(&mut self) -> Result<(), LinalgError> {
        for s in [&self.ut, &self.vt].into_iter().flatten() {
            assert!(s.nrows() >= self.n, "accumulator must have at least {} rows", self.n);
        }
        if self.max_value == T::zero() {
            return Ok(());
        }
        let fast = self.settings.fast_values && self.ut.is_none() && self.vt.is_none();

        while self.x2 >= 0 {
            if self.steps > self.settings.max_iterations {
                log::warn!(
                    "bidiagonal QR did not converge: window [{}, {}] after {} steps",
                    self.x1,
                    self.x2,
                    self.steps
                );
                return Err(LinalgError::ConvergenceFailure);
            }
            let x2 = self.x2 as usize;

            if self.x1 == x2 {
                self.reset_steps();
                if !self.next_split() {
                    break;
                }
            } else if fast && x2 - self.x1 == 1 {
                self.reset_steps();
                self.eigen_bb_2x2(self.x1);
                self.set_submatrix(x2, x2);
            } else if self.steps >= self.next_exceptional {
                self.exceptional_shift();
            } else if !self.check_for_and_handle_zeros() {
                match self.mode {
                    ShiftMode::Scripted => self.scripted_step(),
                    _ => self.dynamic_step(),
                }
            }
        }

        log::debug!("bidiagonal QR converged: n = {}, {} steps", self.n, self.total_steps);
        Ok(())
    }

    fn dynamic_step(&mut self) {
        if self.mode == ShiftMode::FindingZeros {
            if self.steps > ZERO_HUNT_STEPS {
                self.mode = ShiftMode::Wilkinson;
            } else {
                let scale = self.bulge_scale();
                self.implicit_step(scale, T::zero(), false);
            }
        } else {
            // The shift and the bulge share one scale so neither overflows.
            let scale = self.bulge_scale();
            let lambda = self.wilkinson_shift(scale);
            log::trace!("wilkinson shift {:?} on [{}, {}]", lambda, self.x1, self.x2);
            self.implicit_step(scale, lambda, false);
        }
    }

    fn scripted_step(&mut self) {
        let scale = self.bulge_scale();
        if self.steps > GIVE_UP_ON_SCRIPT {
            log::debug!("giving up on scripted shift at [{}, {}]", self.x1, self.x2);
            self.mode = ShiftMode::Wilkinson;
        } else {
            let s = self.script[self.x2 as usize] / scale;
            self.implicit_step(scale, s * s, false);
        }
    }

    fn increment_steps(&mut self) {
        self.steps += 1;
        self.total_steps += 1;
    }

    fn is_off_zero(&self, i: usize) -> bool {
        let bottom = self.diag[i].abs() + self.diag[i + 1].abs();
        self.off[i].abs() <= bottom * self.settings.zero_tol
    }

    fn is_diagonal_zero(&self, i: usize) -> bool {
        let bottom = self.diag[i + 1].abs() + self.off[i].abs();
        self.diag[i].abs() <= bottom * self.settings.zero_tol
    }

    fn reset_steps(&mut self) {
        self.steps = 0;
        self.next_exceptional = self.settings.exceptional_threshold;
        self.num_exceptional = 0;
    }

    fn next_split(&mut self) -> bool {
        let Some(x2) = self.splits.pop() else {
            return false;
        };
        self.x2 = x2 as isize;
        self.x1 = self.splits.last().map_or(0, |&s| s + 1);
        true
    }

    fn set_submatrix(&mut self, x1: usize, x2: usize) {
        self.x1 = x1;
        self.x2 = x2 as isize;
    }

    fn bulge_scale(&self) -> T {
        self.diag[self.x1].abs().max(self.off[self.x1].abs())
    }

    /// One Golub–Kahan step on the window with shift `lambda`, or a rotation
    /// by the angle `lambda` when `by_angle` is set.
    fn implicit_step(&mut self, scale: T, lambda: T, by_angle: bool) {
        let x1 = self.x1;
        let x2 = self.x2 as usize;
        self.create_bulge(x1, lambda, scale, by_angle);

        let mut i = x1;
        while i + 1 < x2 && self.bulge != T::zero() {
            self.remove_bulge_left(i, true);
            if self.bulge == T::zero() {
                break;
            }
            self.remove_bulge_right(i);
            i += 1;
        }

        if self.bulge != T::zero() {
            self.remove_bulge_left(x2 - 1, false);
        }

        self.increment_steps();
    }

    fn create_bulge(&mut self, x1: usize, p: T, scale: T, by_angle: bool) {
        let b11 = self.diag[x1];
        let b12 = self.off[x1];
        let b22 = self.diag[x1 + 1];

        let (c, s) = if by_angle {
            let (s, c) = p.sin_cos();
            (c, s)
        } else {
            let u1 = (b11 / scale) * (b11 / scale) - p;
            let u2 = (b12 / scale) * (b11 / scale);
            let gamma = u1.hypot(u2);
            (u1 / gamma, u2 / gamma)
        };

        self.diag[x1] = b11 * c + b12 * s;
        self.off[x1] = b12 * c - b11 * s;
        self.diag[x1 + 1] = b22 * c;
        self.bulge = b22 * s;

        if let Some(vt) = self.vt.as_mut() {
            update_rotator(vt, x1, x1 + 1, c, s);
        }
    }

    fn remove_bulge_left(&mut self, x1: usize, not_last: bool) {
        let b11 = self.diag[x1];
        let b12 = self.off[x1];
        let b22 = self.diag[x1 + 1];

        let (c, s) = rotator(b11, self.bulge);

        self.diag[x1] = c * b11 + s * self.bulge;
        self.off[x1] = c * b12 + s * b22;
        self.diag[x1 + 1] = c * b22 - s * b12;

        if not_last {
            let b23 = self.off[x1 + 1];
            self.bulge = s * b23;
            self.off[x1 + 1] = c * b23;
        }

        if let Some(ut) = self.ut.as_mut() {
            update_rotator(ut, x1, x1 + 1, c, s);
        }
    }

    fn remove_bulge_right(&mut self, x1: usize) {
        let b12 = self.off[x1];
        let b22 = self.diag[x1 + 1];
        let b23 = self.off[x1 + 1];

        let (c, s) = rotator(b12, self.bulge);

        self.off[x1] = b12 * c + self.bulge * s;
        self.diag[x1 + 1] = b22 * c + b23 * s;
        self.off[x1 + 1] = -b22 * s + b23 * c;

        let b33 = self.diag[x1 + 2];
        self.diag[x1 + 2] = b33 * c;
        self.bulge = b33 * s;

        if let Some(vt) = self.vt.as_mut() {
            update_rotator(vt, x1 + 1, x1 + 2, c, s);
        }
    }

    /// Eigenvalue of the trailing 2×2 of `BᵀB` (in units of `scale²`)
    /// closest to its last diagonal entry.
    fn wilkinson_shift(&self, scale: T) -> T {
        let x1 = self.x1;
        let x2 = self.x2 as usize;

        let (a22, (v0, v1)) = if x2 - x1 > 1 {
            let d1 = self.diag[x2 - 1] / scale;
            let o1 = self.off[x2 - 2] / scale;
            let d2 = self.diag[x2] / scale;
            let o2 = self.off[x2 - 1] / scale;

            let a11 = o1 * o1 + d1 * d1;
            let a22 = o2 * o2 + d2 * d2;
            (a22, symmetric_2x2_fast(a11, o2 * d1, a22))
        } else {
            let a = self.diag[x2 - 1] / scale;
            let b = self.off[x2 - 1] / scale;
            let c = self.diag[x2] / scale;

            let a11 = a * a;
            let a22 = b * b + c * c;
            (a22, symmetric_2x2_fast(a11, a * b, a22))
        };

        if (v0 - a22).abs() < (v1 - a22).abs() {
            v0
        } else {
            v1
        }
    }

    /// Closed-form singular values of the 2×2 window starting at `x1`.
    fn eigen_bb_2x2(&mut self, x1: usize) {
        let b11 = self.diag[x1];
        let b12 = self.off[x1];
        let b22 = self.diag[x1 + 1];

        let scale = b11.abs().max(b12.abs()).max(b22.abs());
        if scale == T::zero() {
            return;
        }
        let (b11, b12, b22) = (b11 / scale, b12 / scale, b22 / scale);

        let (v0, v1) = symmetric_2x2_fast(b11 * b11, b11 * b12, b12 * b12 + b22 * b22);

        self.off[x1] = T::zero();
        self.diag[x1] = scale * v0.sqrt();
        self.diag[x1 + 1] = v1.signum() * scale * v1.abs().sqrt();
    }

    /// Look for a negligible off-diagonal, then a negligible diagonal, from
    /// the bottom of the window up. On a hit the window is split above it.
    fn check_for_and_handle_zeros(&mut self) -> bool {
        let x2 = self.x2 as usize;
        for i in (self.x1..x2).rev() {
            if self.is_off_zero(i) {
                self.split_at(i);
                return true;
            }
        }
        for i in (self.x1..x2).rev() {
            if self.is_diagonal_zero(i) {
                self.push_right(i);
                self.split_at(i);
                return true;
            }
        }
        false
    }

    fn split_at(&mut self, i: usize) {
        log::debug!("split at {} (window [{}, {}], {} steps)", i, self.x1, self.x2, self.steps);
        self.reset_steps();
        self.splits.push(i);
        self.x1 = i + 1;
    }

    /// Chase `off[row]` out to the right with left rotations once `diag[row]`
    /// is negligible.
    fn push_right(&mut self, row: usize) {
        if self.is_off_zero(row) {
            return;
        }
        self.rotator_push_right(row);
        let end = self.n - 2 - row;
        let mut i = 0;
        while i < end && self.bulge != T::zero() {
            self.rotator_push_right2(row, i + 2);
            i += 1;
        }
    }

    fn rotator_push_right(&mut self, m: usize) {
        let b11 = self.off[m];
        let b21 = self.diag[m + 1];

        let (c, s) = rotator(b21, -b11);

        self.off[m] = T::zero();
        self.diag[m + 1] = b21 * c - b11 * s;

        if m + 2 < self.n {
            let b22 = self.off[m + 1];
            self.off[m + 1] = b22 * c;
            self.bulge = b22 * s;
        } else {
            self.bulge = T::zero();
        }

        if let Some(ut) = self.ut.as_mut() {
            update_rotator(ut, m, m + 1, c, s);
        }
    }

    fn rotator_push_right2(&mut self, m: usize, offset: usize) {
        let b11 = self.bulge;
        let b12 = self.diag[m + offset];

        let (c, s) = rotator(b12, -b11);

        self.diag[m + offset] = b12 * c - b11 * s;

        if m + offset < self.n - 1 {
            let b22 = self.off[m + offset];
            self.off[m + offset] = b22 * c;
            self.bulge = b22 * s;
        }

        if let Some(ut) = self.ut.as_mut() {
            update_rotator(ut, m, m + offset, c, s);
        }
    }

    /// Step by a random angle whose spread grows with every exceptional
    /// shift taken on this window.
    fn exceptional_shift(&mut self) {
        self.num_exceptional += 1;
        let mag = (T::lit(0.05) * T::lit(self.num_exceptional as f64)).min(T::one());
        let r = T::lit(self.rng.gen::<f64>());
        let angle = T::lit(2.0 * core::f64::consts::PI) * (r - T::lit(0.5)) * mag;
        log::debug!(
            "exceptional shift #{} on [{}, {}], angle {:?}",
            self.num_exceptional,
            self.x1,
            self.x2,
            angle
        );
        self.implicit_step(T::zero(), angle, true);
        self.next_exceptional = self.steps + self.settings.exceptional_threshold;
    }

    /// Number of singular values (`n`).
    pub fn num_values(&self) -> usize {
        self.n
    }

    /// Singular value `i`; may be negative until the caller fixes signs.
    pub fn singular_value(&self, i: usize) -> T {
        assert!(i < self.n, "singular value index {} out of range", i);
        self.diag[i]
    }

    pub fn singular_values(&self) -> &[T] {
        &self.diag[..self.n]
    }

    pub(crate) fn singular_values_mut(&mut self) -> &mut [T] {
        &mut self.diag[..self.n]
    }

    pub fn diag(&self) -> &[T] {
        &self.diag
    }

    pub fn off(&self) -> &[T] {
        &self.off
    }

    /// Steps on the current window.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Steps over the whole problem.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    const TOL: f64 = 1e-12;

    fn assert_near(a: f64, b: f64, tol: f64, msg: &str) {
        assert!((a - b).abs() < tol, "{}: {} vs {} (diff {})", msg, a, b, (a - b).abs());
    }

    fn bidiag(diag: &[f64], off: &[f64]) -> Matrix<f64> {
        let n = diag.len();
        Matrix::from_fn(n, n, |i, j| {
            if i == j {
                diag[i]
            } else if j == i + 1 {
                off[i]
            } else {
                0.0
            }
        })
    }

    fn sorted_abs(v: &[f64]) -> Vec<f64> {
        let mut s: Vec<f64> = v.iter().map(|x| x.abs()).collect();
        s.sort_by(|a, b| b.partial_cmp(a).unwrap());
        s
    }

    fn run_tracked(diag: &[f64], off: &[f64], settings: QrSettings<f64>) -> SvdQr<f64> {
        let n = diag.len();
        let mut qr = SvdQr::new(settings);
        qr.set_matrix(diag, off);
        qr.set_ut(Some(Matrix::identity(n)));
        qr.set_vt(Some(Matrix::identity(n)));
        qr.process().unwrap();
        qr
    }

    fn check_factorization(qr: &SvdQr<f64>, b: &Matrix<f64>) {
        let ut = qr.ut().unwrap();
        let vt = qr.vt().unwrap();
        let sigma = Matrix::from_diagonal(qr.singular_values());
        let back = &ut.transpose_mul(&sigma) * vt;
        for i in 0..b.nrows() {
            for j in 0..b.ncols() {
                assert_near(back[(i, j)], b[(i, j)], 1e-10, "B = U Σ Vᵀ");
            }
        }
        assert!(ut.orthogonality_error() < 1e-10);
        assert!(vt.orthogonality_error() < 1e-10);
    }

    // ── Convergence ─────────────────────────────────────────────────

    #[test]
    fn two_by_two_invariants() {
        let mut qr = SvdQr::new(QrSettings::<f64>::default());
        qr.set_matrix(&[1.0, 3.0], &[2.0]);
        qr.process().unwrap();
        let s = qr.singular_values();
        assert_near((s[0] * s[1]).abs(), 3.0, TOL, "det");
        assert_near(s[0] * s[0] + s[1] * s[1], 14.0, TOL, "frobenius");
        assert!(qr.off()[0].abs() < 1e-14);
    }

    #[test]
    fn tracked_rotations_reconstruct_b() {
        let diag = [4.0, -1.5, 2.0, 0.5, 3.0];
        let off = [1.0, 2.0, -0.7, 1.2];
        let qr = run_tracked(&diag, &off, QrSettings::default());
        check_factorization(&qr, &bidiag(&diag, &off));
    }

    #[test]
    fn already_diagonal_takes_no_steps() {
        let mut qr = SvdQr::new(QrSettings::<f64>::default());
        qr.set_matrix(&[3.0, -2.0, 1.0], &[0.0, 0.0]);
        qr.process().unwrap();
        assert_eq!(qr.total_steps(), 0);
        assert_eq!(qr.singular_values(), &[3.0, -2.0, 1.0]);
    }

    #[test]
    fn zero_matrix_short_circuits() {
        let mut qr = SvdQr::new(QrSettings::<f64>::default());
        qr.set_matrix(&[0.0; 4], &[0.0; 3]);
        assert_eq!(qr.max_value(), 0.0);
        qr.process().unwrap();
        assert_eq!(qr.total_steps(), 0);
        assert!(qr.singular_values().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn max_value_covers_both_diagonals() {
        let mut qr = SvdQr::new(QrSettings::<f64>::default());
        qr.set_matrix(&[3.0, -2.0, 1.0], &[0.5, -5.0]);
        assert_eq!(qr.max_value(), 5.0);
        qr.set_matrix(&[-4.0], &[]);
        assert_eq!(qr.max_value(), 4.0);
    }

    #[test]
    fn single_value() {
        let mut qr = SvdQr::new(QrSettings::<f64>::default());
        qr.set_matrix(&[-7.0], &[]);
        qr.process().unwrap();
        assert_eq!(qr.singular_values(), &[-7.0]);
    }

    #[test]
    fn zero_on_diagonal_is_pushed_out() {
        // An exact zero on the diagonal makes B singular.
        let diag = [2.0, 0.0, 3.0, 1.0];
        let off = [1.0, 1.0, 0.5];
        let qr = run_tracked(&diag, &off, QrSettings::default());
        let s = sorted_abs(qr.singular_values());
        assert!(s[3] < 1e-14, "smallest = {}", s[3]);
        check_factorization(&qr, &bidiag(&diag, &off));
        assert!(qr.total_steps() < 30);
    }

    #[test]
    fn fast_values_match_iterative() {
        let diag = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let off = [0.5, -0.5, 0.25, 1.0, 2.0];

        let mut slow = SvdQr::new(QrSettings::<f64>::default());
        slow.set_matrix(&diag, &off);
        slow.process().unwrap();

        let mut fast = SvdQr::new(QrSettings {
            fast_values: true,
            ..QrSettings::default()
        });
        fast.set_matrix(&diag, &off);
        fast.process().unwrap();

        let a = sorted_abs(slow.singular_values());
        let b = sorted_abs(fast.singular_values());
        for i in 0..6 {
            assert_near(a[i], b[i], 1e-10, "fast vs slow");
        }
    }

    // ── Zero hunting ────────────────────────────────────────────────

    #[test]
    fn zero_hunt_isolates_tiny_value() {
        let diag = [2.0, 1.5, 1e-10];
        let off = [1.0, 0.8];
        let mut qr = SvdQr::new(QrSettings::<f64>::default());
        qr.set_matrix(&diag, &off);
        qr.mode = ShiftMode::FindingZeros;

        // Drive the loop by hand so the split is observed as it happens.
        let mut steps_at_split = None;
        while qr.total_steps() <= ZERO_HUNT_STEPS {
            let steps = qr.steps();
            if qr.check_for_and_handle_zeros() {
                steps_at_split = Some(steps);
                break;
            }
            qr.dynamic_step();
        }

        let steps = steps_at_split.expect("no split while hunting for zeros");
        assert!((1..=ZERO_HUNT_STEPS).contains(&steps), "split after {} steps", steps);
        assert_eq!(qr.mode, ShiftMode::FindingZeros);
        assert_eq!(qr.splits, vec![1]);
        assert_eq!(qr.x1, 2);
        assert_eq!(qr.steps(), 0);
        assert!(qr.diag()[2].abs() < 1e-9, "bottom = {}", qr.diag()[2]);

        // The rest of the problem finishes from the split state.
        qr.process().unwrap();
        let mut reference = SvdQr::new(QrSettings::<f64>::default());
        reference.set_matrix(&diag, &off);
        reference.process().unwrap();
        let a = sorted_abs(reference.singular_values());
        let b = sorted_abs(qr.singular_values());
        for i in 0..2 {
            assert_near(a[i], b[i], 1e-12, "large values");
        }
        assert_near(b[2] / a[2], 1.0, 1e-8, "tiny value");
        let det: f64 = b.iter().product();
        assert_near(det / 3e-10, 1.0, 1e-8, "|det B|");
    }

    #[test]
    fn zero_hunt_with_tracked_factors() {
        let diag = [2.0, 1.5, 1e-10];
        let off = [1.0, 0.8];
        let qr = run_tracked(&diag, &off, QrSettings::default());
        check_factorization(&qr, &bidiag(&diag, &off));
        let s = sorted_abs(qr.singular_values());
        assert!(s[2] < 1e-9, "smallest = {}", s[2]);
    }

    // ── Scripted shifts ─────────────────────────────────────────────

    #[test]
    fn scripted_run_reproduces_values() {
        let diag = [3.0, 1.0, 4.0, 1.0, 5.0];
        let off = [9.0, 2.0, 6.0, 5.0];

        let mut first = SvdQr::new(QrSettings::<f64>::default());
        first.set_matrix(&diag, &off);
        first.process().unwrap();
        let values = first.singular_values().to_vec();

        let second = {
            let mut qr = SvdQr::new(QrSettings::<f64>::default());
            qr.set_matrix(&diag, &off);
            qr.set_ut(Some(Matrix::identity(5)));
            qr.set_vt(Some(Matrix::identity(5)));
            qr.process_scripted(&values).unwrap();
            qr
        };
        let a = sorted_abs(&values);
        let b = sorted_abs(second.singular_values());
        for i in 0..5 {
            assert_near(a[i], b[i], 1e-10, "scripted");
        }
        check_factorization(&second, &bidiag(&diag, &off));
    }

    #[test]
    fn swap_buffers_round_trip() {
        let mut qr = SvdQr::new(QrSettings::<f64>::default());
        qr.set_matrix(&[1.0, 2.0], &[3.0]);
        let old = qr.swap_diag(vec![5.0, 6.0]);
        assert_eq!(old, vec![1.0, 2.0]);
        let old_off = qr.swap_off(vec![0.0]);
        assert_eq!(old_off, vec![3.0]);
        qr.reset(2);
        qr.process().unwrap();
        assert_eq!(qr.singular_values(), &[5.0, 6.0]);
    }

    // ── Failure and exceptional shifts ──────────────────────────────

    #[test]
    fn iteration_budget_exhausted() {
        let settings = QrSettings {
            max_iterations: 0,
            ..QrSettings::<f64>::default()
        };
        let mut qr = SvdQr::new(settings);
        qr.set_matrix(&[1.0, 1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]);
        assert_eq!(qr.process(), Err(LinalgError::ConvergenceFailure));
    }

    #[test]
    fn frequent_exceptional_shifts_still_converge() {
        let diag = [2.0, 1.0, 2.0, 1.0, 2.0];
        let off = [1.0, 1.0, 1.0, 1.0];
        let reference = run_tracked(&diag, &off, QrSettings::default());
        let settings = QrSettings {
            exceptional_threshold: 1,
            ..QrSettings::default()
        };
        let qr = run_tracked(&diag, &off, settings);
        let a = sorted_abs(reference.singular_values());
        let b = sorted_abs(qr.singular_values());
        for i in 0..5 {
            assert_near(a[i], b[i], 1e-10, "exceptional");
        }
        check_factorization(&qr, &bidiag(&diag, &off));
    }

    #[test]
    fn single_precision() {
        let mut qr = SvdQr::new(QrSettings::<f32>::default());
        qr.set_matrix(&[1.0_f32, 3.0], &[2.0]);
        qr.process().unwrap();
        let s = qr.singular_values();
        assert!(((s[0] * s[1]).abs() - 3.0).abs() < 1e-5);
    }
}
