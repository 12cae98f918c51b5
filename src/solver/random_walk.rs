//! Random-walk estimator (spec §4.6): Monte-Carlo estimation of a single
//! coordinate via absorbing walks on a row-stochastic reduction of `M`.

use crate::context::Context;
use crate::error::{KernelError, KernelResult};
use crate::matrix::SparseMatrix;
use crate::numeric::rng::Rng;
use crate::solver::{EntryOutcome, Options};

fn absorption_probability(matrix: &SparseMatrix, i: usize) -> f64 {
    (1.0 / matrix.diagonal(i).abs()).min(1.0)
}

/// One absorbing walk starting at `s`, returning its (signed) contribution
/// to the estimate of `x_s`.
fn single_walk(matrix: &SparseMatrix, b: &[f64], start: usize, rng: &mut Rng, max_walk_len: usize) -> f64 {
    let mut i = start;
    let mut sign_accum = 1.0_f64;

    for _ in 0..max_walk_len {
        let p_abs = absorption_probability(matrix, i);
        if rng.next_f64() < p_abs {
            return sign_accum * b[i] * p_abs;
        }

        let (cols, vals) = matrix.csr().row(i);
        let d = matrix.diagonal(i);
        let mut neighbors = Vec::with_capacity(cols.len());
        let mut abs_weights = Vec::with_capacity(cols.len());
        for (&j, &v) in cols.iter().zip(vals) {
            if j != i {
                let w = -v / d;
                if w != 0.0 {
                    neighbors.push((j, w));
                    abs_weights.push(w.abs());
                }
            }
        }

        if neighbors.is_empty() {
            // DegenerateRow (spec §4.6): no outgoing weight and no
            // absorption this step — force-absorb here instead.
            return sign_accum * b[i] * p_abs;
        }

        let pick = rng.weighted_index(&abs_weights);
        let (j, w_ij) = neighbors[pick];
        sign_accum *= w_ij.signum();
        i = j;
    }

    // max_walk_len reached without absorption: force-absorb (spec §4.6 step 3).
    let p_abs = absorption_probability(matrix, i);
    sign_accum * b[i] * p_abs
}

/// `N_walks = max(100, ceil(1/epsilon^2))` (spec §4.6).
pub fn walk_budget(epsilon: f64) -> usize {
    (100usize).max((1.0 / (epsilon * epsilon)).ceil() as usize)
}

pub fn estimate_entry(
    matrix: &SparseMatrix,
    b: &[f64],
    s: usize,
    options: &Options,
    ctx: &Context,
    rng_seed: u64,
) -> KernelResult<EntryOutcome> {
    matrix.validate_for_solve(options.tau_div)?;
    if s >= matrix.dim().nrows {
        return Err(KernelError::InvalidIndex {
            index: s,
            max: matrix.dim().nrows,
            context: "estimate_entry target row",
        });
    }

    let parent = Rng::new(rng_seed);
    let walks_requested = walk_budget(options.epsilon);

    let mut mean = 0.0_f64;
    let mut m2 = 0.0_f64; // Welford's running sum of squared deviations
    let mut completed = 0usize;

    for k in 0..walks_requested {
        if ctx.check().is_some() {
            break;
        }
        let mut walk_rng = parent.substream(k as u64);
        let contribution = single_walk(matrix, b, s, &mut walk_rng, options.max_walk_len);

        completed += 1;
        let delta = contribution - mean;
        mean += delta / completed as f64;
        let delta2 = contribution - mean;
        m2 += delta * delta2;
    }

    if completed == 0 {
        return Err(KernelError::BudgetExhausted {
            walks_completed: 0,
            walks_requested,
        });
    }

    let variance = if completed > 1 { m2 / (completed - 1) as f64 } else { 0.0 };
    let half_width = 1.96 * (variance / completed as f64).sqrt();

    Ok(EntryOutcome {
        estimate: mean,
        variance,
        ci_lower: mean - half_width,
        ci_upper: mean + half_width,
        walks_completed: completed,
    })
}

/// Same estimator as [`estimate_entry`], walks distributed across worker
/// threads (spec §5: "random-walk sampling parallelizes by walks"). Each
/// walk only touches the substream `parent.substream(k)` derives for its
/// own index, so walks never share RNG state. Welford's running update
/// doesn't parallelize, so contributions are collected first and reduced
/// to mean/variance afterward; results are numerically equivalent to the
/// sequential path, just computed in a different order.
#[cfg(feature = "parallel")]
pub fn estimate_entry_parallel(
    matrix: &SparseMatrix,
    b: &[f64],
    s: usize,
    options: &Options,
    ctx: &Context,
    rng_seed: u64,
) -> KernelResult<EntryOutcome> {
    use rayon::prelude::*;

    matrix.validate_for_solve(options.tau_div)?;
    if s >= matrix.dim().nrows {
        return Err(KernelError::InvalidIndex {
            index: s,
            max: matrix.dim().nrows,
            context: "estimate_entry target row",
        });
    }

    let parent = Rng::new(rng_seed);
    let walks_requested = walk_budget(options.epsilon);

    if ctx.check().is_some() {
        return Err(KernelError::BudgetExhausted {
            walks_completed: 0,
            walks_requested,
        });
    }

    let contributions: Vec<f64> = (0..walks_requested)
        .into_par_iter()
        .map(|k| {
            let mut walk_rng = parent.substream(k as u64);
            single_walk(matrix, b, s, &mut walk_rng, options.max_walk_len)
        })
        .collect();

    let completed = contributions.len();
    if completed == 0 {
        return Err(KernelError::BudgetExhausted {
            walks_completed: 0,
            walks_requested,
        });
    }

    let mean = contributions.iter().sum::<f64>() / completed as f64;
    let variance = if completed > 1 {
        contributions.iter().map(|&c| (c - mean).powi(2)).sum::<f64>() / (completed - 1) as f64
    } else {
        0.0
    };
    let half_width = 1.96 * (variance / completed as f64).sqrt();

    Ok(EntryOutcome {
        estimate: mean,
        variance,
        ci_lower: mean - half_width,
        ci_upper: mean + half_width,
        walks_completed: completed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SparseMatrix;

    #[test]
    fn walk_budget_matches_formula() {
        assert_eq!(walk_budget(1e-1), 100);
        assert_eq!(walk_budget(1e-2), 10_000);
    }

    #[test]
    fn estimate_matches_exact_solution_within_tolerance() {
        let m = SparseMatrix::from_coo(2, 2, &[0, 0, 1, 1], &[0, 1, 0, 1], &[4.0, -1.0, -1.0, 4.0])
            .unwrap();
        let b = vec![1.0, 2.0];
        let options = Options {
            epsilon: 1e-2,
            ..Options::default()
        };
        let ctx = Context::new();
        let outcome = estimate_entry(&m, &b, 1, &options, &ctx, 7).unwrap();
        assert!((outcome.estimate - 0.6).abs() < 0.1);
        assert!(outcome.ci_lower <= outcome.ci_upper);
    }

    #[test]
    fn tridiagonal_entry_estimate_matches_full_solve() {
        let n = 100;
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        for i in 0..n {
            rows.push(i);
            cols.push(i);
            vals.push(2.0);
            if i + 1 < n {
                rows.push(i);
                cols.push(i + 1);
                vals.push(-0.5);
                rows.push(i + 1);
                cols.push(i);
                vals.push(-0.5);
            }
        }
        let m = SparseMatrix::from_coo(n, n, &rows, &cols, &vals).unwrap();
        let b = vec![1.0; n];

        let full = crate::context::Context::new();
        let full_solution = crate::solver::neumann::solve(
            &m,
            &b,
            &crate::solver::Options {
                epsilon: 1e-10,
                max_iterations: 200,
                ..Options::default()
            },
            &full,
            None,
            std::time::Instant::now(),
        )
        .unwrap();

        let options = Options {
            epsilon: 1e-3,
            ..Options::default()
        };
        let ctx = Context::new();
        let outcome = estimate_entry(&m, &b, 50, &options, &ctx, 11).unwrap();
        assert!((outcome.estimate - full_solution.solution[50]).abs() < 1e-1);
    }

    #[test]
    fn rejects_out_of_range_target() {
        let m = SparseMatrix::from_coo(2, 2, &[0, 1], &[0, 1], &[4.0, 4.0]).unwrap();
        let b = vec![1.0, 2.0];
        let options = Options::default();
        let ctx = Context::new();
        let err = estimate_entry(&m, &b, 5, &options, &ctx, 1).unwrap_err();
        assert!(matches!(err, KernelError::InvalidIndex { .. }));
    }
}
