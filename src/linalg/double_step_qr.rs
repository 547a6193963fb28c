use alloc::vec;
use alloc::vec::Vec;

use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::linalg::eigen_small::value_2x2;
use crate::linalg::householder::{rank1_update_mult_l, rank1_update_mult_r};
use crate::linalg::settings::QrSettings;
use crate::linalg::LinalgError;
use crate::matrix::Matrix;
use crate::traits::FloatScalar;

/// Relative distance, in units of epsilon, below which two real eigenvalues
/// are treated as the same when assigning eigenvectors.
const DUPLICATE_TOL: f64 = 100.0;

/// Francis double-shift QR iteration on an upper Hessenberg matrix.
///
/// Eigenvalues are found from the bottom of the matrix up: a window `[x1, x2]`
/// is shrunk whenever a subdiagonal element becomes negligible, a converged
/// 1×1 block gives a real value and a converged 2×2 block gives either a
/// complex-conjugate pair or is iterated further. The step budget is counted
/// per eigenvalue and resets each time one is found.
///
/// [`process`](Self::process) computes values only.
/// [`process_vectors`](Self::process_vectors) reruns the iteration from the
/// same Hessenberg matrix while accumulating `Q`, using the values from the
/// first pass as shifts, then extracts a vector for every real eigenvalue.
///
/// # Example
///
/// ```
/// use eigensvd::Matrix;
/// use eigensvd::linalg::{DoubleStepQr, QrSettings};
///
/// // Hessenberg form of a rotation-plus-scaling block and a real value.
/// let h = Matrix::from_rows(3, 3, &[
///     0.0_f64, -2.0, 1.0,
///     2.0, 0.0, 1.0,
///     0.0, 0.0, 5.0,
/// ]);
/// let mut qr = DoubleStepQr::new(QrSettings::hessenberg());
/// qr.process(&h).unwrap();
/// let mut ims: Vec<f64> = qr.eigenvalues().iter().map(|c| c.im.abs()).collect();
/// ims.sort_by(|a, b| a.partial_cmp(b).unwrap());
/// assert!(ims[0] < 1e-12);
/// assert!((ims[2] - 2.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct DoubleStepQr<T> {
    settings: QrSettings<T>,
    rng: StdRng,

    a: Matrix<T>,
    q: Option<Matrix<T>>,
    n: usize,

    u: Vec<T>,
    gamma: T,
    temp: Vec<T>,

    eigenvalues: Vec<Complex<T>>,
    steps_per_value: Vec<usize>,
    steps: usize,
    last_exceptional: usize,
    num_exceptional: usize,

    x1: usize,
    x2: isize,
    splits: Vec<usize>,

    script: Vec<Complex<T>>,
    on_script: bool,
    vectors: Vec<Option<Vec<T>>>,
}

impl<T: FloatScalar> DoubleStepQr<T> {
    pub fn new(settings: QrSettings<T>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(settings.seed),
            settings,
            a: Matrix::zeros(0, 0),
            q: None,
            n: 0,
            u: Vec::new(),
            gamma: T::zero(),
            temp: Vec::new(),
            eigenvalues: Vec::new(),
            steps_per_value: Vec::new(),
            steps: 0,
            last_exceptional: 0,
            num_exceptional: 0,
            x1: 0,
            x2: -1,
            splits: Vec::new(),
            script: Vec::new(),
            on_script: false,
            vectors: Vec::new(),
        }
    }

    pub fn settings(&self) -> &QrSettings<T> {
        &self.settings
    }

    /// Copy `h` into the work matrix and reset the iteration state. Anything
    /// below the first subdiagonal is treated as zero.
    fn setup(&mut self, h: &Matrix<T>) {
        assert!(h.is_square(), "double-step QR requires a square matrix");
        let n = h.nrows();
        self.n = n;
        self.a.copy_from(h);
        for i in 2..n {
            for j in 0..(i - 1) {
                self.a[(i, j)] = T::zero();
            }
        }

        self.u.clear();
        self.u.resize(n, T::zero());
        self.temp.clear();
        self.temp.resize(n, T::zero());
        self.eigenvalues.clear();
        self.steps_per_value.clear();
        self.splits.clear();
        self.vectors.clear();
        self.q = None;

        self.x1 = 0;
        self.x2 = n as isize - 1;
        self.steps = 0;
        self.last_exceptional = 0;
        self.num_exceptional = 0;
        self.rng = StdRng::seed_from_u64(self.settings.seed);
    }

    /// Find the eigenvalues of the upper Hessenberg matrix `h`.
    pub fn process(&mut self, h: &Matrix<T>) -> Result<(), LinalgError> {
        self.setup(h);

        while self.eigenvalues.len() < self.n {
            if self.steps > self.settings.max_iterations {
                log::warn!(
                    "double-step QR failed to converge on window [{}, {}] after {} steps",
                    self.x1,
                    self.x2,
                    self.steps
                );
                return Err(LinalgError::ConvergenceFailure);
            }
            self.steps += 1;

            let (x1, x2) = (self.x1, self.x2);
            if x2 < x1 as isize {
                if !self.move_to_next_split() {
                    return Err(LinalgError::ConvergenceFailure);
                }
                continue;
            }
            let x2 = x2 as usize;

            if x2 == x1 {
                self.add_eigen_at(x1);
                self.x2 -= 1;
            } else if x2 - x1 == 1 {
                self.add_computed_2x2(x1, x2);
                self.x2 -= 2;
            } else if self.steps - self.last_exceptional > self.settings.exceptional_threshold {
                if !self.a.is_finite() {
                    log::warn!("double-step QR produced non-finite values");
                    return Err(LinalgError::ConvergenceFailure);
                }
                self.exceptional_shift(x1, x2);
            } else if self.is_zero(x2, x2 - 1) {
                self.add_eigen_at(x2);
                self.x2 -= 1;
            } else if !self.check_for_split(x1, x2) {
                self.implicit_double_step(x1, x2);
            }
        }

        log::debug!(
            "double-step QR found {} eigenvalues ({} exceptional shifts)",
            self.eigenvalues.len(),
            self.num_exceptional
        );
        Ok(())
    }

    /// Recompute the Schur form of `h` with `Q` tracking and extract a unit
    /// eigenvector for every real eigenvalue.
    ///
    /// Must follow a successful [`process`](Self::process) on the same
    /// matrix: the values found there are followed as shifts. `q_h` maps
    /// the vectors back to the frame of the matrix `h` was reduced from.
    pub fn process_vectors(
        &mut self,
        h: &Matrix<T>,
        q_h: Option<&Matrix<T>>,
    ) -> Result<(), LinalgError> {
        assert_eq!(
            self.eigenvalues.len(),
            h.nrows(),
            "eigenvalues must be computed before the vectors"
        );
        self.script.clear();
        self.script.extend_from_slice(&self.eigenvalues);

        self.setup(h);
        self.q = Some(Matrix::identity(self.n));
        self.on_script = true;

        while self.eigenvalues.len() < self.n {
            self.find_next_eigenvalue()?;
        }

        self.extract_vectors(q_h);
        Ok(())
    }

    /// Iterate until one more eigenvalue (or a complex pair) converges.
    fn find_next_eigenvalue(&mut self) -> Result<(), LinalgError> {
        while self.steps < self.settings.max_iterations {
            self.steps += 1;

            let (x1, x2) = (self.x1, self.x2);
            if x2 < x1 as isize {
                if !self.move_to_next_split() {
                    return Err(LinalgError::ConvergenceFailure);
                }
                continue;
            }
            let x2 = x2 as usize;

            if x2 == x1 {
                self.add_eigen_at(x1);
                self.x2 -= 1;
                return Ok(());
            } else if x2 - x1 == 1 && !self.is_real_2x2(x1, x2) {
                self.add_computed_2x2(x1, x2);
                self.x2 -= 2;
                return Ok(());
            } else if self.steps - self.last_exceptional > self.settings.exceptional_threshold {
                self.exceptional_shift(x1, x2);
            } else if self.is_zero(x2, x2 - 1) {
                self.add_eigen_at(x2);
                self.x2 -= 1;
                return Ok(());
            } else if !self.check_for_split(x1, x2) {
                self.scripted_step(x1, x2);
            }
        }

        log::warn!(
            "double-step QR vector pass failed on window [{}, {}] after {} steps",
            self.x1,
            self.x2,
            self.steps
        );
        Err(LinalgError::ConvergenceFailure)
    }

    /// Shift with the next value of the first pass, falling back to
    /// self-chosen shifts once the script stops helping.
    fn scripted_step(&mut self, x1: usize, x2: usize) {
        if self.on_script {
            if self.steps > self.settings.exceptional_threshold / 2 {
                self.on_script = false;
            } else {
                let index = self.eigenvalues.len();
                let target = self.script[index];
                if target.im == T::zero() {
                    self.single_step(x1, x2, target.re);
                    return;
                } else if x2 - x1 >= 2 {
                    self.double_step_with(x1, x2, target.re, target.im);
                    return;
                }
                self.on_script = false;
            }
        }

        if x2 - x1 >= 2 {
            self.implicit_double_step(x1, x2);
        } else {
            let shift = self.a[(x2, x2)];
            self.single_step(x1, x2, shift);
        }
    }

    /// Scan the window bottom-up for a negligible subdiagonal element and
    /// split there. Returns `true` when a split was made.
    fn check_for_split(&mut self, x1: usize, x2: usize) -> bool {
        for i in ((x1 + 1)..=x2).rev() {
            if self.is_zero(i, i - 1) {
                log::debug!("double-step QR split at {}", i);
                self.x1 = i;
                self.splits.push(i - 1);
                return true;
            }
        }
        false
    }

    fn move_to_next_split(&mut self) -> bool {
        let Some(x2) = self.splits.pop() else {
            return false;
        };
        self.x2 = x2 as isize;
        self.x1 = self.splits.last().map_or(0, |&s| s + 1);
        true
    }

    /// `A[i, j]` is negligible next to the diagonal entries beside it.
    fn is_zero(&self, i: usize, j: usize) -> bool {
        let target = self.a[(i, j)].abs();
        let above = self.a[(i - 1, j)].abs();
        let right = self.a[(i, j + 1)].abs();
        target <= T::lit(0.5) * self.settings.zero_tol * (above + right)
    }

    /// Single step with a random shift of the same magnitude as `A[x2, x2]`.
    fn exceptional_shift(&mut self, x1: usize, x2: usize) {
        let mut val = self.a[(x2, x2)].abs();
        if val == T::zero() {
            val = T::one();
        }
        self.num_exceptional += 1;
        let p = T::one() - T::lit(0.1).powi(self.num_exceptional as i32);
        let r = T::lit(self.rng.gen::<f64>());
        val = val * (p + T::lit(2.0) * (T::one() - p) * (r - T::lit(0.5)));
        if self.rng.gen::<bool>() {
            val = -val;
        }
        log::debug!("double-step QR exceptional shift {} on [{}, {}]", self.num_exceptional, x1, x2);

        self.single_step(x1, x2, val);
        self.last_exceptional = self.steps;
    }

    /// Double step shifted by the eigenvalues of the trailing 2×2 block.
    fn implicit_double_step(&mut self, x1: usize, x2: usize) {
        let mut z11 = self.a[(x2 - 1, x2 - 1)];
        let mut z12 = self.a[(x2 - 1, x2)];
        let mut z21 = self.a[(x2, x2 - 1)];
        let mut z22 = self.a[(x2, x2)];

        let mut a11 = self.a[(x1, x1)];
        let mut a21 = self.a[(x1 + 1, x1)];
        let mut a12 = self.a[(x1, x1 + 1)];
        let mut a22 = self.a[(x1 + 1, x1 + 1)];
        let mut a32 = self.a[(x1 + 2, x1 + 1)];

        let max = [a11, a21, a12, a22, a32, z11, z22, z12, z21]
            .iter()
            .fold(T::zero(), |acc, x| acc.max(x.abs()));
        if max > T::zero() {
            for x in [
                &mut a11, &mut a21, &mut a12, &mut a22, &mut a32, &mut z11, &mut z22, &mut z12,
                &mut z21,
            ] {
                *x = *x / max;
            }
        }

        let b11 = (a11 - z11) * (a11 - z22) - z21 * z12 + a12 * a21;
        let b21 = (a11 + a22 - z11 - z22) * a21;
        let b31 = a32 * a21;
        log::trace!("double-step QR Francis step on [{}, {}]", x1, x2);
        self.double_step(x1, x2, b11, b21, b31);
    }

    /// Double step shifted by the conjugate pair `re ± i·im`.
    fn double_step_with(&mut self, x1: usize, x2: usize, re: T, im: T) {
        let a11 = self.a[(x1, x1)];
        let a21 = self.a[(x1 + 1, x1)];
        let a12 = self.a[(x1, x1 + 1)];
        let a22 = self.a[(x1 + 1, x1 + 1)];
        let a32 = self.a[(x1 + 2, x1 + 1)];

        let p_plus_t = T::lit(2.0) * re;
        let p_times_t = re * re + im * im;

        let b11 = (a11 * a11 - p_plus_t * a11 + p_times_t) + a12 * a21;
        let b21 = (a11 + a22 - p_plus_t) * a21;
        let b31 = a32 * a21;
        self.double_step(x1, x2, b11, b21, b31);
    }

    fn double_step(&mut self, x1: usize, x2: usize, b11: T, b21: T, b31: T) {
        if !self.bulge_double_core(x1, b11, b21, b31, T::zero(), false) {
            return;
        }
        self.accumulate(x1, x1 + 3);

        for i in x1..(x2 - 2) {
            if self.bulge_double(i) {
                self.accumulate(i + 1, i + 4);
            }
        }
        if self.bulge_single(x2 - 2) {
            self.accumulate(x2 - 1, x2 + 1);
        }
    }

    /// Single step with the real shift `lambda`.
    fn single_step(&mut self, x1: usize, x2: usize, lambda: T) {
        log::trace!("double-step QR single shift {:?} on [{}, {}]", lambda, x1, x2);
        let b11 = self.a[(x1, x1)] - lambda;
        let b21 = self.a[(x1 + 1, x1)];
        let threshold = self.a[(x1, x1)].abs() * T::epsilon();
        if !self.bulge_single_core(x1, b11, b21, threshold, false) {
            return;
        }
        self.accumulate(x1, x1 + 2);

        for i in x1..(x2 - 1) {
            if self.bulge_single(i) {
                self.accumulate(i + 1, i + 3);
            }
        }
    }

    /// Apply the reflector in `u` to rows `w0..w1` of `Q`, if tracked.
    fn accumulate(&mut self, w0: usize, w1: usize) {
        if let Some(q) = self.q.as_mut() {
            rank1_update_mult_r(q, &self.u, self.gamma, 0, w0, w1, &mut self.temp);
        }
    }

    fn bulge_double(&mut self, i: usize) -> bool {
        let a11 = self.a[(i + 1, i)];
        let a21 = self.a[(i + 2, i)];
        let a31 = self.a[(i + 3, i)];
        let threshold = self.a[(i, i)].abs() * T::epsilon();
        self.bulge_double_core(i + 1, a11, a21, a31, threshold, true)
    }

    /// Reflect rows and columns `i..i+3` so that `(a11, a21, a31)` collapses
    /// onto its first entry. With `set`, those values are column `i - 1` and
    /// are overwritten with their exact result.
    fn bulge_double_core(&mut self, i: usize, a11: T, a21: T, a31: T, threshold: T, set: bool) -> bool {
        let max = a11.abs().max(a21.abs()).max(a31.abs());
        if max <= threshold {
            if set {
                self.a[(i, i - 1)] = T::zero();
                self.a[(i + 1, i - 1)] = T::zero();
                self.a[(i + 2, i - 1)] = T::zero();
            }
            return false;
        }
        let (a11, a21, a31) = (a11 / max, a21 / max, a31 / max);

        let mut tau = (a11 * a11 + a21 * a21 + a31 * a31).sqrt();
        if a11 < T::zero() {
            tau = -tau;
        }
        let div = a11 + tau;
        self.u[i] = T::one();
        self.u[i + 1] = a21 / div;
        self.u[i + 2] = a31 / div;
        self.gamma = div / tau;

        rank1_update_mult_r(&mut self.a, &self.u, self.gamma, 0, i, i + 3, &mut self.temp);
        if set {
            self.a[(i, i - 1)] = -max * tau;
            self.a[(i + 1, i - 1)] = T::zero();
            self.a[(i + 2, i - 1)] = T::zero();
        }
        rank1_update_mult_l(&mut self.a, &self.u, self.gamma, 0, i, i + 3);
        true
    }

    fn bulge_single(&mut self, i: usize) -> bool {
        let a11 = self.a[(i + 1, i)];
        let a21 = self.a[(i + 2, i)];
        let threshold = self.a[(i, i)].abs() * T::epsilon();
        self.bulge_single_core(i + 1, a11, a21, threshold, true)
    }

    fn bulge_single_core(&mut self, i: usize, a11: T, a21: T, threshold: T, set: bool) -> bool {
        let max = a11.abs().max(a21.abs());
        if max <= threshold {
            if set {
                self.a[(i, i - 1)] = T::zero();
                self.a[(i + 1, i - 1)] = T::zero();
            }
            return false;
        }
        let (a11, a21) = (a11 / max, a21 / max);

        let mut tau = (a11 * a11 + a21 * a21).sqrt();
        if a11 < T::zero() {
            tau = -tau;
        }
        let div = a11 + tau;
        self.u[i] = T::one();
        self.u[i + 1] = a21 / div;
        self.gamma = div / tau;

        rank1_update_mult_r(&mut self.a, &self.u, self.gamma, 0, i, i + 2, &mut self.temp);
        if set {
            self.a[(i, i - 1)] = -max * tau;
            self.a[(i + 1, i - 1)] = T::zero();
        }
        rank1_update_mult_l(&mut self.a, &self.u, self.gamma, 0, i, i + 2);
        true
    }

    fn eigen_2x2(&self, x1: usize, x2: usize) -> (Complex<T>, Complex<T>) {
        value_2x2(
            self.a[(x1, x1)],
            self.a[(x1, x2)],
            self.a[(x2, x1)],
            self.a[(x2, x2)],
        )
    }

    fn is_real_2x2(&self, x1: usize, x2: usize) -> bool {
        self.eigen_2x2(x1, x2).0.im == T::zero()
    }

    fn add_computed_2x2(&mut self, x1: usize, x2: usize) {
        let (v0, v1) = self.eigen_2x2(x1, x2);
        self.add_eigenvalue(v0);
        self.add_eigenvalue(v1);
    }

    fn add_eigen_at(&mut self, i: usize) {
        let value = self.a[(i, i)];
        self.add_eigenvalue(Complex::new(value, T::zero()));
    }

    fn add_eigenvalue(&mut self, value: Complex<T>) {
        self.steps_per_value.push(self.steps);
        self.eigenvalues.push(value);
        self.steps = 0;
        self.last_exceptional = 0;
    }

    // ── Eigenvector extraction ──────────────────────────────────────

    /// Back out one vector per real eigenvalue from the quasi-triangular
    /// Schur form `R = Q·H·Qᵀ`, in eigenvalue order.
    fn extract_vectors(&mut self, q_h: Option<&Matrix<T>>) {
        let n = self.n;
        self.vectors.clear();
        self.vectors.resize(n, None);

        // Values are found bottom-up, so value `n - 1 - i` sits at diagonal
        // position `i`. A complex block above position `i` means the leading
        // system is no longer triangular.
        let mut triangular = true;
        for i in 0..n {
            let c = self.eigenvalues[n - 1 - i];
            if c.im != T::zero() {
                triangular = false;
                continue;
            }
            let x = self.solve_vector(c.re, i, triangular);
            let mut v = match self.q.as_ref() {
                Some(q) => q.transpose_mul_vec(&x),
                None => x,
            };
            if let Some(q_h) = q_h {
                v = q_h.mul_vec(&v);
            }
            normalize(&mut v);
            self.vectors[n - 1 - i] = Some(v);
        }
    }

    /// Solve `(R - λI)·x = 0` with `x[index] = 1` and `x[index+1..] = 0`.
    fn solve_vector(&self, lambda: T, index: usize, triangular: bool) -> Vec<T> {
        let n = self.n;
        let mut x = vec![T::zero(); n];
        x[index] = T::one();
        if index == 0 {
            return x;
        }

        // Tiny pivots are replaced so repeated eigenvalues still give a vector.
        let scale = if lambda == T::zero() { T::one() } else { lambda.abs() };
        let smin = scale * T::epsilon() * T::lit(DUPLICATE_TOL);

        for (k, xk) in x.iter_mut().enumerate().take(index) {
            *xk = -self.a[(k, index)];
        }

        if triangular {
            for k in (0..index).rev() {
                let mut sum = x[k];
                for j in (k + 1)..index {
                    sum = sum - self.a[(k, j)] * x[j];
                }
                x[k] = sum / guard_pivot(self.a[(k, k)] - lambda, smin);
            }
        } else {
            let mut m = Matrix::from_fn(index, index, |i, j| {
                if i == j {
                    self.a[(i, j)] - lambda
                } else {
                    self.a[(i, j)]
                }
            });
            solve_gaussian(&mut m, &mut x[..index], smin);
        }
        x
    }

    // ── Results ─────────────────────────────────────────────────────

    pub fn num_eigenvalues(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Eigenvalues in the order they converged.
    pub fn eigenvalues(&self) -> &[Complex<T>] {
        &self.eigenvalues
    }

    /// Unit eigenvector of eigenvalue `i`, or `None` when the value is
    /// complex or vectors were not extracted.
    pub fn eigenvector(&self, i: usize) -> Option<&[T]> {
        self.vectors.get(i).and_then(|v| v.as_deref())
    }

    /// Steps it took for each eigenvalue to converge.
    pub fn steps_per_value(&self) -> &[usize] {
        &self.steps_per_value
    }

    pub fn exceptional_shifts(&self) -> usize {
        self.num_exceptional
    }

    /// Work matrix: quasi upper triangular once processing has finished.
    pub fn schur(&self) -> &Matrix<T> {
        &self.a
    }

    /// Accumulated `Q` with `R = Q·H·Qᵀ` (vector pass only).
    pub fn q(&self) -> Option<&Matrix<T>> {
        self.q.as_ref()
    }
}

fn guard_pivot<T: FloatScalar>(p: T, smin: T) -> T {
    if p.abs() >= smin {
        p
    } else if p < T::zero() {
        -smin
    } else {
        smin
    }
}

/// Solve `m·x = b` in place with Gaussian elimination and partial pivoting.
fn solve_gaussian<T: FloatScalar>(m: &mut Matrix<T>, b: &mut [T], smin: T) {
    let n = m.nrows();
    for k in 0..n {
        let mut p = k;
        for i in (k + 1)..n {
            if m[(i, k)].abs() > m[(p, k)].abs() {
                p = i;
            }
        }
        if p != k {
            let (rk, rp) = m.two_rows_mut(k, p);
            rk.swap_with_slice(rp);
            b.swap(k, p);
        }
        let pivot = guard_pivot(m[(k, k)], smin);
        m[(k, k)] = pivot;
        for i in (k + 1)..n {
            let f = m[(i, k)] / pivot;
            if f == T::zero() {
                continue;
            }
            for j in k..n {
                let v = m[(k, j)];
                m[(i, j)] = m[(i, j)] - f * v;
            }
            b[i] = b[i] - f * b[k];
        }
    }
    for k in (0..n).rev() {
        let mut sum = b[k];
        for j in (k + 1)..n {
            sum = sum - m[(k, j)] * b[j];
        }
        b[k] = sum / m[(k, k)];
    }
}

fn normalize<T: FloatScalar>(v: &mut [T]) {
    let norm = v.iter().fold(T::zero(), |acc, &x| acc + x * x).sqrt();
    if norm > T::zero() {
        for x in v.iter_mut() {
            *x = *x / norm;
        }
    }
}
