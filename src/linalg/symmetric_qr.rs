use alloc::vec::Vec;
use core::mem;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::linalg::eigen_small::symmetric_2x2_fast;
use crate::linalg::givens::{update_rotator, SymmetricRotation};
use crate::linalg::settings::QrSettings;
use crate::linalg::LinalgError;
use crate::matrix::Matrix;
use crate::traits::FloatScalar;

/// Steps a scripted shift gets before the driver falls back to Wilkinson.
const GIVE_UP_ON_SCRIPT: usize = 10;

/// State and single-step primitives of the symmetric tridiagonal QR
/// iteration.
///
/// Holds the tridiagonal `diag`/`off` arrays, the active window, the split
/// stack and the optional accumulator `Q` (stored so that its rows end up
/// being the eigenvectors). [`SymmetricQr`] decides which step to take; this
/// type knows how to take it.
#[derive(Debug, Clone)]
pub struct SymmetricQrHelper<T> {
    rng: StdRng,
    seed: u64,
    zero_tol: T,

    q: Option<Matrix<T>>,

    n: usize,
    diag: Vec<T>,
    off: Vec<T>,
    bulge: T,

    x1: usize,
    x2: isize,
    splits: Vec<usize>,

    steps: usize,
    num_exceptional: usize,
    last_exceptional: usize,
    total_exceptional: usize,
}

impl<T: FloatScalar> SymmetricQrHelper<T> {
    pub fn new(settings: &QrSettings<T>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(settings.seed),
            seed: settings.seed,
            zero_tol: settings.zero_tol,
            q: None,
            n: 0,
            diag: Vec::new(),
            off: Vec::new(),
            bulge: T::zero(),
            x1: 0,
            x2: -1,
            splits: Vec::new(),
            steps: 0,
            num_exceptional: 0,
            last_exceptional: 0,
            total_exceptional: 0,
        }
    }

    /// Load a tridiagonal matrix and reset the state.
    pub fn init(&mut self, diag: &[T], off: &[T]) {
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

    /// Reset the state for an `n × n` problem. Drops the accumulator; the
    /// arrays are kept and can be exchanged with [`swap_diag`](Self::swap_diag).
    pub fn reset(&mut self, n: usize) {
        self.n = n;
        self.splits.clear();
        self.x1 = 0;
        self.x2 = n as isize - 1;
        self.steps = 0;
        self.num_exceptional = 0;
        self.last_exceptional = 0;
        self.total_exceptional = 0;
        self.q = None;
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    pub fn swap_diag(&mut self, diag: Vec<T>) -> Vec<T> {
        mem::replace(&mut self.diag, diag)
    }

    pub fn swap_off(&mut self, off: Vec<T>) -> Vec<T> {
        mem::replace(&mut self.off, off)
    }

    /// Install (or clear) the accumulator; it must be `n × n`.
    pub fn set_q(&mut self, q: Option<Matrix<T>>) {
        if let Some(q) = &q {
            assert!(
                q.nrows() == self.n && q.ncols() == self.n,
                "accumulator must be {}x{}",
                self.n,
                self.n
            );
        }
        self.q = q;
    }

    pub fn q(&self) -> Option<&Matrix<T>> {
        self.q.as_ref()
    }

    pub fn take_q(&mut self) -> Option<Matrix<T>> {
        self.q.take()
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn diag(&self) -> &[T] {
        &self.diag[..self.n]
    }

    pub fn off(&self) -> &[T] {
        &self.off[..self.n.saturating_sub(1)]
    }

    /// The diagonal, which holds the eigenvalues once converged.
    pub fn eigenvalues(&self) -> &[T] {
        self.diag()
    }

    pub fn window(&self) -> (usize, isize) {
        (self.x1, self.x2)
    }

    pub fn set_submatrix(&mut self, x1: usize, x2: isize) {
        self.x1 = x1;
        self.x2 = x2;
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn increment_steps(&mut self) {
        self.steps += 1;
    }

    pub fn reset_steps(&mut self) {
        self.steps = 0;
        self.last_exceptional = 0;
    }

    /// Exceptional shifts taken since the last [`reset`](Self::reset).
    pub fn exceptional_shifts(&self) -> usize {
        self.total_exceptional
    }

    pub fn push_split(&mut self, i: usize) {
        self.splits.push(i);
        self.x1 = i + 1;
    }

    /// Whether `off[i]` is negligible next to its two diagonal neighbors.
    pub fn is_zero(&self, i: usize) -> bool {
        let bottom = self.diag[i].abs() + self.diag[i + 1].abs();
        self.off[i].abs() <= bottom * self.zero_tol
    }

    /// Pop the split stack into the window. Returns `false` when empty.
    pub fn next_split(&mut self) -> bool {
        let Some(x2) = self.splits.pop() else {
            return false;
        };
        self.x2 = x2 as isize;
        self.x1 = self.splits.last().map_or(0, |&s| s + 1);
        true
    }

    /// One implicit QR step with shift `lambda`, or a rotation by the
    /// angle `lambda` when `by_angle` is set.
    pub fn implicit_step(&mut self, lambda: T, by_angle: bool) {
        let x1 = self.x1;
        let x2 = self.x2 as usize;
        if x2 - x1 == 1 {
            self.create_bulge_2x2(x1, lambda, by_angle);
        } else {
            self.create_bulge(x1, lambda, by_angle);
            let mut i = x1;
            while i + 2 < x2 && self.bulge != T::zero() {
                self.remove_bulge(i);
                i += 1;
            }
            if self.bulge != T::zero() {
                self.remove_bulge_end(x2 - 2);
            }
        }
    }

    fn rotation(a11: T, a12: T, p: T, by_angle: bool) -> SymmetricRotation<T> {
        if by_angle {
            SymmetricRotation::by_angle(p)
        } else {
            SymmetricRotation::annihilating(a11 - p, a12)
        }
    }

    fn create_bulge(&mut self, x1: usize, p: T, by_angle: bool) {
        let a11 = self.diag[x1];
        let a22 = self.diag[x1 + 1];
        let a12 = self.off[x1];
        let a23 = self.off[x1 + 1];

        let r = Self::rotation(a11, a12, p, by_angle);
        let two = T::lit(2.0);

        self.diag[x1] = r.c2 * a11 + two * r.cs * a12 + r.s2 * a22;
        self.diag[x1 + 1] = r.c2 * a22 - two * r.cs * a12 + r.s2 * a11;
        self.off[x1] = a12 * (r.c2 - r.s2) + r.cs * (a22 - a11);
        self.off[x1 + 1] = r.c * a23;
        self.bulge = r.s * a23;

        if let Some(q) = self.q.as_mut() {
            update_rotator(q, x1, x1 + 1, r.c, r.s);
        }
    }

    fn create_bulge_2x2(&mut self, x1: usize, p: T, by_angle: bool) {
        let a11 = self.diag[x1];
        let a22 = self.diag[x1 + 1];
        let a12 = self.off[x1];

        let r = Self::rotation(a11, a12, p, by_angle);
        let two = T::lit(2.0);

        self.diag[x1] = r.c2 * a11 + two * r.cs * a12 + r.s2 * a22;
        self.diag[x1 + 1] = r.c2 * a22 - two * r.cs * a12 + r.s2 * a11;
        self.off[x1] = a12 * (r.c2 - r.s2) + r.cs * (a22 - a11);

        if let Some(q) = self.q.as_mut() {
            update_rotator(q, x1, x1 + 1, r.c, r.s);
        }
    }

    fn remove_bulge(&mut self, x1: usize) {
        let a22 = self.diag[x1 + 1];
        let a33 = self.diag[x1 + 2];
        let a12 = self.off[x1];
        let a23 = self.off[x1 + 1];
        let a34 = self.off[x1 + 2];

        let r = SymmetricRotation::annihilating(a12, self.bulge);
        let two = T::lit(2.0);

        self.diag[x1 + 1] = r.c2 * a22 + two * r.cs * a23 + r.s2 * a33;
        self.diag[x1 + 2] = r.c2 * a33 - two * r.cs * a23 + r.s2 * a22;
        self.off[x1] = r.c * a12 + r.s * self.bulge;
        self.off[x1 + 1] = a23 * (r.c2 - r.s2) + r.cs * (a33 - a22);
        self.off[x1 + 2] = r.c * a34;
        self.bulge = r.s * a34;

        if let Some(q) = self.q.as_mut() {
            update_rotator(q, x1 + 1, x1 + 2, r.c, r.s);
        }
    }

    fn remove_bulge_end(&mut self, x1: usize) {
        let a22 = self.diag[x1 + 1];
        let a12 = self.off[x1];
        let a23 = self.off[x1 + 1];
        let a33 = self.diag[x1 + 2];

        let r = SymmetricRotation::annihilating(a12, self.bulge);
        let two = T::lit(2.0);

        self.diag[x1 + 1] = r.c2 * a22 + two * r.cs * a23 + r.s2 * a33;
        self.diag[x1 + 2] = r.c2 * a33 - two * r.cs * a23 + r.s2 * a22;
        self.off[x1] = r.c * a12 + r.s * self.bulge;
        self.off[x1 + 1] = a23 * (r.c2 - r.s2) + r.cs * (a33 - a22);

        if let Some(q) = self.q.as_mut() {
            update_rotator(q, x1 + 1, x1 + 2, r.c, r.s);
        }
    }

    /// Closed-form eigenvalues of the 2×2 window at `x1`, written back in
    /// place (no accumulator update).
    pub fn eigenvalue_2x2(&mut self, x1: usize) {
        let a = self.diag[x1];
        let b = self.off[x1];
        let c = self.diag[x1 + 1];

        let scale = a.abs().max(b.abs()).max(c.abs());
        self.off[x1] = T::zero();
        if scale == T::zero() {
            self.diag[x1] = T::zero();
            self.diag[x1 + 1] = T::zero();
            return;
        }
        let (v0, v1) = symmetric_2x2_fast(a / scale, b / scale, c / scale);
        self.diag[x1] = scale * v0;
        self.diag[x1 + 1] = scale * v1;
    }

    /// Step by a random angle to break a cycle.
    pub fn exceptional_shift(&mut self) {
        self.num_exceptional += 1;
        self.total_exceptional += 1;
        let mag = (T::lit(0.05) * T::lit(self.num_exceptional as f64)).min(T::one());
        let r = T::lit(self.rng.gen::<f64>());
        let theta = T::lit(2.0) * (r - T::lit(0.5)) * mag;
        log::debug!(
            "exceptional shift #{} on [{}, {}], angle {:?}",
            self.num_exceptional,
            self.x1,
            self.x2,
            theta
        );
        self.implicit_step(theta, true);
        self.last_exceptional = self.steps;
    }

    /// Wilkinson shift for a window of two or more, the last diagonal
    /// entry otherwise.
    pub fn compute_shift(&self) -> T {
        let x2 = self.x2 as usize;
        if x2 > self.x1 {
            self.wilkinson_shift()
        } else {
            self.diag[x2]
        }
    }

    /// Eigenvalue of the trailing 2×2 closest to its last diagonal entry.
    pub fn wilkinson_shift(&self) -> T {
        let x2 = self.x2 as usize;
        let a = self.diag[x2 - 1];
        let b = self.off[x2 - 1];
        let c = self.diag[x2];

        let scale = a.abs().max(b.abs()).max(c.abs());
        if scale == T::zero() {
            return T::zero();
        }
        let (a, b, c) = (a / scale, b / scale, c / scale);
        let (v0, v1) = symmetric_2x2_fast(a, b, c);
        if (v0 - c).abs() < (v1 - c).abs() {
            scale * v0
        } else {
            scale * v1
        }
    }
}

/// Driver of the symmetric tridiagonal QR iteration.
///
/// Chooses between splitting, the closed-form 2×2 solution, exceptional
/// shifts and Wilkinson (or scripted) steps, and enforces the iteration
/// budget.
///
/// # Example
///
/// ```
/// use eigensvd::linalg::{QrSettings, SymmetricQr};
///
/// let mut qr = SymmetricQr::new(QrSettings::<f64>::default());
/// qr.helper_mut().init(&[2.0, 2.0], &[1.0]);
/// qr.process().unwrap();
/// let mut ev = qr.helper().eigenvalues().to_vec();
/// ev.sort_by(|a, b| a.partial_cmp(b).unwrap());
/// assert!((ev[0] - 1.0).abs() < 1e-12 && (ev[1] - 3.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct SymmetricQr<T> {
    helper: SymmetricQrHelper<T>,
    settings: QrSettings<T>,
    following_script: bool,
    script: Vec<T>,
}

impl<T: FloatScalar> SymmetricQr<T> {
    pub fn new(settings: QrSettings<T>) -> Self {
        Self {
            helper: SymmetricQrHelper::new(&settings),
            settings,
            following_script: false,
            script: Vec::new(),
        }
    }

    pub fn helper(&self) -> &SymmetricQrHelper<T> {
        &self.helper
    }

    pub fn helper_mut(&mut self) -> &mut SymmetricQrHelper<T> {
        &mut self.helper
    }

    pub fn set_fast_values(&mut self, fast: bool) {
        self.settings.fast_values = fast;
    }

    pub fn set_max_iterations(&mut self, max: usize) {
        self.settings.max_iterations = max;
    }

    /// Iterate with Wilkinson shifts until the matrix is diagonal.
    pub fn process(&mut self) -> Result<(), LinalgError> {
        self.following_script = false;
        self.run()
    }

    /// Iterate using `values` (indexed like the diagonal) as shifts,
    /// falling back to Wilkinson shifts on windows that stall.
    pub fn process_scripted(&mut self, values: &[T]) -> Result<(), LinalgError> {
        assert!(values.len() >= self.helper.n, "script needs one value per eigenvalue");
        self.script.clear();
        self.script.extend_from_slice(values);
        self.following_script = true;
        self.run()
    }

    fn run(&mut self) -> Result<(), LinalgError> {
        let fast = self.settings.fast_values && self.helper.q.is_none();
        let mut total = 0usize;

        while self.helper.x2 >= 0 {
            if self.helper.steps > self.settings.max_iterations {
                log::warn!(
                    "symmetric QR did not converge: window [{}, {}] after {} steps",
                    self.helper.x1,
                    self.helper.x2,
                    self.helper.steps
                );
                return Err(LinalgError::ConvergenceFailure);
            }
            let x2 = self.helper.x2 as usize;

            if self.helper.x1 == x2 {
                self.helper.reset_steps();
                if !self.helper.next_split() {
                    break;
                }
            } else if fast && x2 - self.helper.x1 == 1 {
                self.helper.reset_steps();
                self.helper.eigenvalue_2x2(self.helper.x1);
                self.helper.set_submatrix(x2, x2 as isize);
            } else if self.helper.steps - self.helper.last_exceptional
                > self.settings.exceptional_threshold
            {
                self.helper.exceptional_shift();
            } else {
                self.perform_step();
            }
            self.helper.increment_steps();
            total += 1;
        }

        log::debug!("symmetric QR converged: n = {}, {} iterations", self.helper.n, total);
        Ok(())
    }

    fn perform_step(&mut self) {
        let h = &mut self.helper;
        let x2 = h.x2 as usize;
        for i in (h.x1..x2).rev() {
            if h.is_zero(i) {
                log::debug!("split at {} (window [{}, {}], {} steps)", i, h.x1, h.x2, h.steps);
                h.push_split(i);
                return;
            }
        }

        let lambda = if self.following_script {
            if h.steps > GIVE_UP_ON_SCRIPT {
                log::debug!("giving up on scripted shift at [{}, {}]", h.x1, h.x2);
                self.following_script = false;
                return;
            }
            self.script[x2]
        } else {
            h.compute_shift()
        };
        log::trace!("shift {:?} on [{}, {}]", lambda, h.x1, h.x2);
        h.implicit_step(lambda, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    fn assert_near(a: f64, b: f64, tol: f64, msg: &str) {
        assert!((a - b).abs() < tol, "{}: {} vs {} (diff {})", msg, a, b, (a - b).abs());
    }

    fn tridiag(diag: &[f64], off: &[f64]) -> Matrix<f64> {
        let n = diag.len();
        Matrix::from_fn(n, n, |i, j| {
            if i == j {
                diag[i]
            } else if j == i + 1 {
                off[i]
            } else if i == j + 1 {
                off[j]
            } else {
                0.0
            }
        })
    }

    fn sorted(v: &[f64]) -> Vec<f64> {
        let mut s = v.to_vec();
        s.sort_by(|a, b| a.partial_cmp(b).unwrap());
        s
    }

    fn solve(diag: &[f64], off: &[f64], settings: QrSettings<f64>, track: bool) -> SymmetricQr<f64> {
        let n = diag.len();
        let mut qr = SymmetricQr::new(settings);
        qr.helper_mut().init(diag, off);
        if track {
            qr.helper_mut().set_q(Some(Matrix::identity(n)));
        }
        qr.process().unwrap();
        qr
    }

    /// `T = Qᵀ·D·Q` for the accumulated `Q`.
    fn check_vectors(qr: &SymmetricQr<f64>, t: &Matrix<f64>) {
        let q = qr.helper().q().unwrap();
        let d = Matrix::from_diagonal(qr.helper().eigenvalues());
        let back = &q.transpose_mul(&d) * q;
        for i in 0..t.nrows() {
            for j in 0..t.ncols() {
                assert_near(back[(i, j)], t[(i, j)], 1e-10, "T = Qᵀ D Q");
            }
        }
        assert!(q.orthogonality_error() < 1e-10);
    }

    // ── Helper primitives ───────────────────────────────────────────

    #[test]
    fn wilkinson_picks_closest_root() {
        let mut h = SymmetricQrHelper::new(&QrSettings::<f64>::default());
        h.init(&[1.0, 2.0, 2.0], &[0.5, 1.0]);
        // Trailing block [[2,1],[1,2]] has eigenvalues 3 and 1, both 1 away
        // from the corner; ties go to the second root.
        assert_near(h.wilkinson_shift(), 1.0, TOL, "tie");

        h.init(&[1.0, 0.0, 5.0], &[0.5, 1.0]);
        let mu = h.wilkinson_shift();
        assert_near(mu, 2.5 + (2.5f64 * 2.5 + 1.0).sqrt(), TOL, "closest to 5");
    }

    #[test]
    fn eigenvalue_2x2_in_place() {
        let mut h = SymmetricQrHelper::new(&QrSettings::<f64>::default());
        h.init(&[2.0, 2.0], &[1.0]);
        h.eigenvalue_2x2(0);
        assert_eq!(h.off()[0], 0.0);
        assert_near(h.diag()[0], 3.0, TOL, "v0");
        assert_near(h.diag()[1], 1.0, TOL, "v1");

        h.init(&[0.0, 0.0], &[0.0]);
        h.eigenvalue_2x2(0);
        assert_eq!(h.diag(), &[0.0, 0.0]);
    }

    #[test]
    fn split_stack_order() {
        let mut h = SymmetricQrHelper::new(&QrSettings::<f64>::default());
        h.init(&[1.0; 5], &[1.0; 4]);
        h.push_split(1);
        h.push_split(3);
        assert_eq!(h.window(), (4, 4));
        assert!(h.next_split());
        assert_eq!(h.window(), (2, 3));
        assert!(h.next_split());
        assert_eq!(h.window(), (0, 1));
        assert!(!h.next_split());
    }

    // ── Driver ──────────────────────────────────────────────────────

    #[test]
    fn two_by_two_known_values() {
        let qr = solve(&[2.0, 2.0], &[1.0], QrSettings::default(), true);
        let ev = sorted(qr.helper().eigenvalues());
        assert_near(ev[0], 1.0, TOL, "λ0");
        assert_near(ev[1], 3.0, TOL, "λ1");
        check_vectors(&qr, &tridiag(&[2.0, 2.0], &[1.0]));
    }

    #[test]
    fn tracked_vectors_diagonalize() {
        let diag = [4.0, 1.0, -2.0, 3.0, 0.5, 1.5];
        let off = [1.0, 2.0, 0.3, -1.0, 0.7];
        let qr = solve(&diag, &off, QrSettings::default(), true);
        check_vectors(&qr, &tridiag(&diag, &off));

        let trace: f64 = diag.iter().sum();
        let sum: f64 = qr.helper().eigenvalues().iter().sum();
        assert_near(sum, trace, 1e-10, "trace");
    }

    #[test]
    fn fast_values_agree_with_tracked() {
        let diag = [1.0, 2.0, 3.0, 4.0, 5.0];
        let off = [1.0, 1.0, 1.0, 1.0];
        let slow = solve(&diag, &off, QrSettings::default(), true);
        let fast = solve(
            &diag,
            &off,
            QrSettings {
                fast_values: true,
                ..QrSettings::default()
            },
            false,
        );
        let a = sorted(slow.helper().eigenvalues());
        let b = sorted(fast.helper().eigenvalues());
        for i in 0..5 {
            assert_near(a[i], b[i], 1e-10, "fast vs tracked");
        }
    }

    #[test]
    fn scripted_second_pass() {
        let diag = [3.0, -1.0, 4.0, 1.0, -5.0, 9.0];
        let off = [2.0, 6.0, 5.0, 3.0, 5.0];

        let mut first = SymmetricQr::new(QrSettings {
            fast_values: true,
            ..QrSettings::<f64>::default()
        });
        first.helper_mut().init(&diag, &off);
        first.process().unwrap();
        let values = first.helper().eigenvalues().to_vec();

        let mut second = SymmetricQr::new(QrSettings::<f64>::default());
        second.helper_mut().init(&diag, &off);
        second.helper_mut().set_q(Some(Matrix::identity(6)));
        second.process_scripted(&values).unwrap();
        check_vectors(&second, &tridiag(&diag, &off));

        let a = sorted(&values);
        let b = sorted(second.helper().eigenvalues());
        for i in 0..6 {
            assert_near(a[i], b[i], 1e-10, "scripted");
        }
    }

    #[test]
    fn exceptional_path_converges() {
        let diag = [0.0; 6];
        let off = [1.0; 5];
        let settings = QrSettings {
            exceptional_threshold: 1,
            ..QrSettings::default()
        };
        let qr = solve(&diag, &off, settings, true);
        assert!(qr.helper().exceptional_shifts() > 0);
        check_vectors(&qr, &tridiag(&diag, &off));
    }

    #[test]
    fn budget_exhausted() {
        let mut qr = SymmetricQr::new(QrSettings::<f64>::default());
        qr.set_max_iterations(0);
        qr.helper_mut().init(&[1.0, 2.0, 3.0], &[1.0, 1.0]);
        assert_eq!(qr.process(), Err(LinalgError::ConvergenceFailure));
    }
}
