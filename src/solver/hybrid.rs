//! Hybrid estimator (spec §4.7): a push prefix followed by a random-walk
//! tail for coordinate queries; a Neumann/forward-push dispatcher for
//! full-vector queries, with one recoverable-failure method switch.

use crate::analyzer::MatrixAnalyzer;
use crate::context::Context;
use crate::error::KernelError;
use crate::matrix::SparseMatrix;
use crate::solver::{neumann, push, random_walk};
use crate::solver::{EntryOutcome, Method, Options, SolveOutcome};

/// `theta = 0.1 * epsilon` (spec §4.7): the push prefix runs until the
/// target's residual drops below this before handing off to the walk tail.
fn push_threshold(epsilon: f64) -> f64 {
    0.1 * epsilon
}

pub fn hybrid_entry(
    matrix: &SparseMatrix,
    b: &[f64],
    target: usize,
    options: &Options,
    ctx: &Context,
    rng_seed: u64,
) -> Result<EntryOutcome, KernelError> {
    let theta = push_threshold(options.epsilon);
    let push_state = push::forward_push_partial(matrix, b, target, theta, options, ctx)?;

    let walk_options = Options {
        epsilon: theta.max(options.epsilon),
        ..options.clone()
    };
    let walk = random_walk::estimate_entry(matrix, &push_state.r, target, &walk_options, ctx, rng_seed)?;

    Ok(EntryOutcome {
        estimate: push_state.x[target] + walk.estimate,
        variance: walk.variance,
        ci_lower: push_state.x[target] + walk.ci_lower,
        ci_upper: push_state.x[target] + walk.ci_upper,
        walks_completed: walk.walks_completed,
    })
}

pub fn hybrid_solve(
    matrix: &SparseMatrix,
    b: &[f64],
    options: &Options,
    ctx: &Context,
) -> Result<SolveOutcome, KernelError> {
    let report = MatrixAnalyzer::analyze(matrix);

    let use_neumann = report.dominance_gap >= 0.3;
    if use_neumann {
        match neumann::solve(matrix, b, options, ctx, None, std::time::Instant::now()) {
            Ok(mut outcome) => {
                outcome.method = Method::Hybrid;
                return Ok(outcome);
            }
            // Recoverable failure: switch once to forward push (spec §4.7,
            // §9 open question resolution).
            Err(KernelError::Stagnated { .. }) => {}
            Err(other) => return Err(other),
        }
    }

    let mut outcome = push::forward_push(matrix, b, options, ctx)?;
    outcome.method = Method::Hybrid;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SparseMatrix;

    #[test]
    fn hybrid_solve_uses_neumann_for_strongly_dominant_system() {
        let m = SparseMatrix::from_coo(2, 2, &[0, 0, 1, 1], &[0, 1, 0, 1], &[4.0, -1.0, -1.0, 4.0])
            .unwrap();
        let b = vec![1.0, 2.0];
        let options = Options {
            epsilon: 1e-10,
            ..Options::default()
        };
        let ctx = Context::new();
        let outcome = hybrid_solve(&m, &b, &options, &ctx).unwrap();
        assert!((outcome.solution[0] - 0.4).abs() < 1e-6);
        assert_eq!(outcome.method, Method::Hybrid);
    }

    #[test]
    fn hybrid_entry_matches_full_solve_coordinate() {
        let m = SparseMatrix::from_coo(2, 2, &[0, 0, 1, 1], &[0, 1, 0, 1], &[4.0, -1.0, -1.0, 4.0])
            .unwrap();
        let b = vec![1.0, 2.0];
        let options = Options {
            epsilon: 1e-3,
            ..Options::default()
        };
        let ctx = Context::new();
        let outcome = hybrid_entry(&m, &b, 1, &options, &ctx, 3).unwrap();
        assert!((outcome.estimate - 0.6).abs() < 0.1);
    }
}
