//! Push solvers (spec §4.5): residual-driven local propagation. Forward
//! push solves `M x = b` by redistributing residual mass along columns of
//! `M` (the "who reads coordinate i" direction); backward push solves the
//! adjoint system `Mᵀ y = c` by the same mechanism along rows of `M`,
//! which is exactly the column structure of `Mᵀ`. `estimate_entry`'s
//! functional read (spec §4.5, "used to express the linear functional
//! `e_tᵀ M⁻¹ b`") is the special case `c = e_t`.

use crate::context::Context;
use crate::error::{KernelError, KernelResult};
use crate::matrix::SparseMatrix;
use crate::numeric::vector::{checked_div, norm_inf};
use crate::solver::{Method, Options, SolveOutcome, SolverStats};

#[derive(Debug, Clone)]
pub struct PushState {
    pub x: Vec<f64>,
    pub r: Vec<f64>,
    pub pushes: u64,
}

#[derive(Debug, Clone)]
pub struct BidirectionalState {
    pub forward: PushState,
    pub backward: PushState,
}

/// Column access is the propagation direction for forward push: an update
/// to `x_i` changes `r_j` for every row `j` with `M_ji != 0`, i.e. every
/// entry in column `i`.
fn forward_neighbors(matrix: &SparseMatrix, i: usize) -> (&[usize], &[f64]) {
    matrix.csc().col(i)
}

/// Row access is the propagation direction for backward push: solving the
/// adjoint system means column `i` of `Mᵀ` is row `i` of `M`.
fn backward_neighbors(matrix: &SparseMatrix, i: usize) -> (&[usize], &[f64]) {
    matrix.csr().row(i)
}

/// Select the index of largest `|r_i|`; ties broken by smallest index
/// (spec §4.5 "Selection tie-break").
fn select_active(r: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in r.iter().enumerate() {
        let av = v.abs();
        if best.is_none_or(|(_, bv)| av > bv) {
            best = Some((i, av));
        }
    }
    best.map(|(i, _)| i)
}

fn run(
    matrix: &SparseMatrix,
    mut r: Vec<f64>,
    neighbors: fn(&SparseMatrix, usize) -> (&[usize], &[f64]),
    options: &Options,
    ctx: &Context,
) -> KernelResult<(Vec<f64>, u64, f64)> {
    let n = r.len();
    let mut x = vec![0.0; n];
    let mut pushes: u64 = 0;

    loop {
        let Some(i) = select_active(&r) else {
            return Ok((x, pushes, 0.0));
        };
        let active_residual = r[i].abs();
        if active_residual < options.epsilon {
            return Ok((x, pushes, active_residual));
        }
        if pushes >= options.max_iterations {
            return Err(KernelError::DidNotConverge {
                max_iterations: options.max_iterations,
                residual: active_residual,
                last_solution: x,
            });
        }
        if ctx.check().is_some() {
            return Err(KernelError::Cancelled {
                iteration: pushes,
                residual: active_residual,
                last_solution: x,
            });
        }

        let delta = checked_div(r[i], matrix.diagonal(i), i, options.tau_div)?;
        x[i] += delta;
        r[i] = 0.0;

        let (idx, vals) = neighbors(matrix, i);
        for (&j, &m_ji) in idx.iter().zip(vals) {
            if j != i {
                r[j] -= m_ji * delta;
            }
        }
        pushes += 1;
    }
}

/// Runs forward push only until the residual at `target` drops below
/// `theta`, leaving the rest of the residual mass unresolved — the push
/// prefix the hybrid estimator builds on (spec §4.7).
pub fn forward_push_partial(
    matrix: &SparseMatrix,
    b: &[f64],
    target: usize,
    theta: f64,
    options: &Options,
    ctx: &Context,
) -> KernelResult<PushState> {
    matrix.validate_for_solve(options.tau_div)?;
    let mut state = PushState {
        x: vec![0.0; b.len()],
        r: b.to_vec(),
        pushes: 0,
    };

    while state.r[target].abs() >= theta {
        if state.pushes >= options.max_iterations {
            break;
        }
        if ctx.check().is_some() {
            break;
        }
        let Some(i) = select_active(&state.r) else {
            break;
        };
        if state.r[i].abs() < options.tau_div {
            break;
        }
        let delta = checked_div(state.r[i], matrix.diagonal(i), i, options.tau_div)?;
        state.x[i] += delta;
        state.r[i] = 0.0;
        let (idx, vals) = forward_neighbors(matrix, i);
        for (&j, &m_ji) in idx.iter().zip(vals) {
            if j != i {
                state.r[j] -= m_ji * delta;
            }
        }
        state.pushes += 1;
    }
    Ok(state)
}

pub fn forward_push(
    matrix: &SparseMatrix,
    b: &[f64],
    options: &Options,
    ctx: &Context,
) -> KernelResult<SolveOutcome> {
    matrix.validate_for_solve(options.tau_div)?;
    let (x, pushes, residual) = run(matrix, b.to_vec(), forward_neighbors, options, ctx)?;
    Ok(SolveOutcome {
        solution: x,
        iterations: pushes,
        residual,
        converged: true,
        method: Method::ForwardPush,
        stats: SolverStats::default(),
        error_bound: None,
    })
}

/// Solves `Mᵀ y = rhs`; `rhs = e_t` (the standard basis vector) is the
/// single-coordinate functional case used by `estimate_entry`.
pub fn backward_push(
    matrix: &SparseMatrix,
    rhs: &[f64],
    options: &Options,
    ctx: &Context,
) -> KernelResult<SolveOutcome> {
    matrix.validate_for_solve(options.tau_div)?;
    let (y, pushes, residual) = run(matrix, rhs.to_vec(), backward_neighbors, options, ctx)?;
    Ok(SolveOutcome {
        solution: y,
        iterations: pushes,
        residual,
        converged: true,
        method: Method::BackwardPush,
        stats: SolverStats::default(),
        error_bound: None,
    })
}

/// A unit vector `e_t`: the rhs for the backward-push functional read.
pub fn unit_vector(n: usize, t: usize) -> Vec<f64> {
    let mut e = vec![0.0; n];
    if t < n {
        e[t] = 1.0;
    }
    e
}

/// Alternates one forward sweep with one backward sweep targeting
/// coordinate `target`, terminating when the combined residual norm drops
/// below `epsilon` or either side's push cap is reached (spec §4.5). The
/// estimate combines the forward partial solution with the standard
/// push correction `x_t = x_fwd[t] + <y_bwd, r_fwd>` (the backward
/// approximation applied to the forward solver's remaining residual mass).
pub fn bidirectional_entry(
    matrix: &SparseMatrix,
    b: &[f64],
    target: usize,
    options: &Options,
    ctx: &Context,
) -> KernelResult<(f64, BidirectionalState)> {
    matrix.validate_for_solve(options.tau_div)?;
    let n = matrix.dim().nrows;

    let mut forward = PushState {
        x: vec![0.0; n],
        r: b.to_vec(),
        pushes: 0,
    };
    let mut backward = PushState {
        x: vec![0.0; n],
        r: unit_vector(n, target),
        pushes: 0,
    };

    loop {
        let combined = norm_inf(&forward.r) + norm_inf(&backward.r);
        if combined < options.epsilon {
            break;
        }
        if ctx.check().is_some() {
            break;
        }

        if forward.pushes < options.max_iterations {
            step_one(matrix, &mut forward, forward_neighbors, options)?;
        }
        if backward.pushes < options.max_iterations {
            step_one(matrix, &mut backward, backward_neighbors, options)?;
        }
        if forward.pushes >= options.max_iterations && backward.pushes >= options.max_iterations {
            break;
        }
    }

    let correction: f64 = backward
        .x
        .iter()
        .zip(&forward.r)
        .map(|(&y, &r)| y * r)
        .sum();
    let estimate = forward.x[target] + correction;

    Ok((estimate, BidirectionalState { forward, backward }))
}

fn step_one(
    matrix: &SparseMatrix,
    state: &mut PushState,
    neighbors: fn(&SparseMatrix, usize) -> (&[usize], &[f64]),
    options: &Options,
) -> KernelResult<()> {
    let Some(i) = select_active(&state.r) else {
        return Ok(());
    };
    if state.r[i].abs() < options.epsilon {
        return Ok(());
    }
    let delta = checked_div(state.r[i], matrix.diagonal(i), i, options.tau_div)?;
    state.x[i] += delta;
    state.r[i] = 0.0;
    let (idx, vals) = neighbors(matrix, i);
    for (&j, &m_ji) in idx.iter().zip(vals) {
        if j != i {
            state.r[j] -= m_ji * delta;
        }
    }
    state.pushes += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SparseMatrix;

    fn scenario_1() -> (SparseMatrix, Vec<f64>) {
        let m = SparseMatrix::from_coo(2, 2, &[0, 0, 1, 1], &[0, 1, 0, 1], &[4.0, -1.0, -1.0, 4.0])
            .unwrap();
        (m, vec![1.0, 2.0])
    }

    #[test]
    fn forward_push_matches_exact_solution() {
        let (m, b) = scenario_1();
        let options = Options {
            epsilon: 1e-10,
            max_iterations: 10_000,
            ..Options::default()
        };
        let ctx = Context::new();
        let outcome = forward_push(&m, &b, &options, &ctx).unwrap();
        assert!((outcome.solution[0] - 0.4).abs() < 1e-6);
        assert!((outcome.solution[1] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn backward_push_on_symmetric_matrix_matches_forward() {
        // M is symmetric here, so Mx=b and M^T y=b have the same solution.
        let (m, b) = scenario_1();
        let options = Options {
            epsilon: 1e-10,
            max_iterations: 10_000,
            ..Options::default()
        };
        let ctx = Context::new();
        let outcome = backward_push(&m, &b, &options, &ctx).unwrap();
        assert!((outcome.solution[0] - 0.4).abs() < 1e-6);
        assert!((outcome.solution[1] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn bidirectional_entry_matches_forward_push_coordinate() {
        let (m, b) = scenario_1();
        let options = Options {
            epsilon: 1e-10,
            max_iterations: 10_000,
            ..Options::default()
        };
        let ctx = Context::new();
        let (estimate, _) = bidirectional_entry(&m, &b, 1, &options, &ctx).unwrap();
        assert!((estimate - 0.6).abs() < 1e-4);
    }

    #[test]
    fn forward_push_fails_without_convergence_under_tiny_cap() {
        let (m, b) = scenario_1();
        let options = Options {
            epsilon: 1e-12,
            max_iterations: 1,
            ..Options::default()
        };
        let ctx = Context::new();
        let err = forward_push(&m, &b, &options, &ctx).unwrap_err();
        assert!(matches!(err, KernelError::DidNotConverge { .. }));
    }
}
