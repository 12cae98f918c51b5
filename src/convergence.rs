//! Shared convergence monitoring (spec §4.8): every estimator feeds the
//! monitor the same sequence of residual norms; it reports convergence,
//! rate, and trend, and offers a cheap stochastic a-posteriori check.

use crate::matrix::SparseMatrix;
use crate::numeric::rng::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Stagnant,
    Diverging,
}

/// Consecutive residual deltas below `epsilon * STAGNATION_EPS_FACTOR` for
/// this many iterations trip stagnation (spec §4.4 rule 3).
const STAGNATION_WINDOW: usize = 10;
const STAGNATION_EPS_FACTOR: f64 = 1e-6;
/// Residual values at or above this magnitude are treated as a blown-up
/// iteration (spec §4.4 rule 4, "overflow guard").
const OVERFLOW_THRESHOLD: f64 = 1e15;

#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    epsilon: f64,
    residuals: Vec<f64>,
}

impl ConvergenceMonitor {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            residuals: Vec::new(),
        }
    }

    pub fn push(&mut self, residual: f64) {
        self.residuals.push(residual);
    }

    pub fn latest(&self) -> Option<f64> {
        self.residuals.last().copied()
    }

    pub fn converged(&self) -> bool {
        self.latest().is_some_and(|r| r < self.epsilon)
    }

    pub fn is_overflowing(&self) -> bool {
        self.latest().is_some_and(|r| !r.is_finite() || r >= OVERFLOW_THRESHOLD)
    }

    /// Geometric mean of `r_k / r_{k-1}` over the last ten iterations
    /// (spec §4.4 "convergence rate estimate").
    pub fn rate(&self) -> f64 {
        let n = self.residuals.len();
        if n < 2 {
            return 1.0;
        }
        let window = STAGNATION_WINDOW.min(n - 1);
        let start = n - window;
        let mut log_sum = 0.0;
        let mut count = 0usize;
        for k in start..n {
            let prev = self.residuals[k - 1];
            let cur = self.residuals[k];
            if prev > 0.0 && cur > 0.0 {
                log_sum += (cur / prev).ln();
                count += 1;
            }
        }
        if count == 0 {
            1.0
        } else {
            (log_sum / count as f64).exp()
        }
    }

    pub fn trend(&self) -> Trend {
        if self.is_stagnant() {
            Trend::Stagnant
        } else if self.rate() < 1.0 {
            Trend::Improving
        } else {
            Trend::Diverging
        }
    }

    /// True once `STAGNATION_WINDOW` consecutive residual deltas have all
    /// been smaller than `epsilon * STAGNATION_EPS_FACTOR`.
    pub fn is_stagnant(&self) -> bool {
        let n = self.residuals.len();
        if n <= STAGNATION_WINDOW {
            return false;
        }
        let threshold = self.epsilon * STAGNATION_EPS_FACTOR;
        (n - STAGNATION_WINDOW..n).all(|k| (self.residuals[k] - self.residuals[k - 1]).abs() < threshold)
    }
}

/// Result of a stochastic residual probe (spec §4.8): certifies
/// `‖r‖_inf <= epsilon` with probability `>= 1 - delta` without computing
/// the full residual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReport {
    pub rows_sampled: usize,
    pub max_abs_residual: f64,
    pub certified: bool,
}

/// Sample `k = ceil(log(1/delta) / epsilon^2)` random rows and compute the
/// corresponding entries of `M x - b`, used when the true residual is too
/// expensive to compute every iteration.
pub fn stochastic_residual_probe(
    matrix: &SparseMatrix,
    x: &[f64],
    b: &[f64],
    epsilon: f64,
    delta: f64,
    rng: &mut Rng,
) -> ProbeReport {
    let n = matrix.dim().nrows;
    let k = ((1.0 / delta).ln() / (epsilon * epsilon)).ceil().max(1.0) as usize;
    let rows_sampled = k.min(n.max(1));
    let mut max_abs = 0.0_f64;
    for _ in 0..rows_sampled {
        let i = (rng.next_u64() as usize) % n.max(1);
        let (cols, vals) = matrix.csr().row(i);
        let mut mx_i = 0.0;
        for (&c, &v) in cols.iter().zip(vals) {
            mx_i += v * x[c];
        }
        max_abs = max_abs.max((mx_i - b[i]).abs());
    }
    ProbeReport {
        rows_sampled,
        max_abs_residual: max_abs,
        certified: max_abs <= epsilon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_when_latest_residual_below_epsilon() {
        let mut m = ConvergenceMonitor::new(1e-6);
        m.push(1.0);
        m.push(1e-8);
        assert!(m.converged());
    }

    #[test]
    fn rate_below_one_for_improving_sequence() {
        let mut m = ConvergenceMonitor::new(1e-10);
        for k in 0..5 {
            m.push(1.0 / 2f64.powi(k));
        }
        assert!(m.rate() < 1.0);
        assert_eq!(m.trend(), Trend::Improving);
    }

    #[test]
    fn stagnation_detected_after_flat_window() {
        let mut m = ConvergenceMonitor::new(1.0);
        for _ in 0..11 {
            m.push(0.5);
        }
        assert!(m.is_stagnant());
        assert_eq!(m.trend(), Trend::Stagnant);
    }

    #[test]
    fn overflow_guard_flags_non_finite_residual() {
        let mut m = ConvergenceMonitor::new(1e-6);
        m.push(f64::NAN);
        assert!(m.is_overflowing());
    }

    #[test]
    fn stochastic_probe_certifies_exact_solution() {
        let m = crate::matrix::SparseMatrix::from_coo(
            2,
            2,
            &[0, 0, 1, 1],
            &[0, 1, 0, 1],
            &[4.0, -1.0, -1.0, 4.0],
        )
        .unwrap();
        let x = [0.4, 0.6];
        let b = [1.0, 2.0];
        let mut rng = Rng::new(1);
        let report = stochastic_residual_probe(&m, &x, &b, 1e-6, 0.05, &mut rng);
        assert!(report.certified);
    }
}
