//! Dual active-set quadratic-programming solver.
//!
//! Solves `min ½xᵀQx + cᵀx` subject to componentwise bounds `lb ≤ x ≤ ub`
//! and row bounds `alb ≤ Ax ≤ aub` (rows with `alb == aub` are equalities),
//! using the Goldfarb-Idnani dual method: start at the unconstrained
//! minimiser, repeatedly add the most violated constraint to an active set,
//! taking primal/dual steps that keep the dual feasible and dropping
//! blocking constraints along the way. `Q` must be symmetric positive
//! definite; the deconvolution engine guarantees that by regularising its
//! Gram matrices.
//!
//! The method suits this problem shape: with a handful of cell types and a
//! single equality row, every step is a small dense solve against the fixed
//! Cholesky factor of `Q`.

use anyhow::{
    bail,
    Result,
};
use ndarray::Array2;

use crate::data_structs::typedef::{
    Matrix,
    Vector,
};

/// Constraint slack below this counts as violated.
const SLACK_TOLERANCE: f64 = 1e-9;

/// Outcome reported to the caller; anything but `Optimal` means the
/// returned point must not be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpStatus {
    Optimal,
    /// The constraints admit no feasible point.
    Infeasible,
    /// The Hessian (or an active-set system) lost positive definiteness.
    Degenerate,
    /// The active-set iteration budget ran out before convergence.
    IterationLimit,
}

#[derive(Debug, Clone)]
pub struct QpSolution {
    pub x: Vector,
    pub status: QpStatus,
    pub iterations: usize,
}

/// One linearised constraint in `normal·x ≥ rhs` form (equalities keep a
/// flag and are never dropped from the active set).
struct Constraint {
    normal: Vector,
    rhs: f64,
    equality: bool,
}

/// A constraint currently in the active set, with its working normal (sign
/// flipped for equalities approached from above) and Lagrange multiplier.
struct ActiveConstraint {
    index: usize,
    normal: Vector,
    equality: bool,
    multiplier: f64,
}

#[derive(Debug, Clone)]
pub struct QpSolver {
    /// Cap on add/drop steps; 0 picks a bound scaled to the problem size.
    pub max_iterations: usize,
}

impl Default for QpSolver {
    fn default() -> Self {
        Self { max_iterations: 0 }
    }
}

impl QpSolver {
    /// Solves the bounded QP. Dimension mismatches are hard errors; solver
    /// outcomes (infeasibility, degeneracy) are reported via
    /// [`QpStatus`].
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &self,
        hessian: &Matrix,
        linear: &Vector,
        lower: &Vector,
        upper: &Vector,
        constraint_matrix: &Matrix,
        constraint_lower: &Vector,
        constraint_upper: &Vector,
    ) -> Result<QpSolution> {
        let n = hessian.nrows();
        if hessian.ncols() != n
            || linear.len() != n
            || lower.len() != n
            || upper.len() != n
        {
            bail!("QP objective dimensions do not agree");
        }
        if constraint_matrix.nrows() != constraint_lower.len()
            || constraint_matrix.nrows() != constraint_upper.len()
            || (constraint_matrix.nrows() > 0 && constraint_matrix.ncols() != n)
        {
            bail!("QP constraint dimensions do not agree");
        }

        let constraints =
            build_constraints(lower, upper, constraint_matrix, constraint_lower, constraint_upper);

        let Some(factor) = cholesky(hessian) else {
            return Ok(QpSolution {
                x: Vector::zeros(n),
                status: QpStatus::Degenerate,
                iterations: 0,
            });
        };

        // Unconstrained minimiser: Qx = -c.
        let mut x = cholesky_solve(&factor, &(-linear));
        let mut active: Vec<ActiveConstraint> = Vec::new();

        let max_iterations = if self.max_iterations > 0 {
            self.max_iterations
        }
        else {
            100 * (n + constraints.len())
        };

        let mut iterations = 0;
        'outer: loop {
            let Some((index, sign)) = select_violated(&constraints, &active, &x)
            else {
                return Ok(QpSolution {
                    x,
                    status: QpStatus::Optimal,
                    iterations,
                });
            };
            let chosen = &constraints[index];
            let normal = chosen.normal.mapv(|v| v * sign);
            let rhs = chosen.rhs * sign;
            let mut multiplier = 0.0;

            loop {
                iterations += 1;
                if iterations > max_iterations {
                    return Ok(QpSolution {
                        x,
                        status: QpStatus::IterationLimit,
                        iterations,
                    });
                }

                let slack = normal.dot(&x) - rhs;
                let (step, dual_step) =
                    match step_directions(&factor, &active, &normal) {
                        Some(directions) => directions,
                        None => {
                            return Ok(QpSolution {
                                x,
                                status: QpStatus::Degenerate,
                                iterations,
                            });
                        },
                    };

                // Longest dual step before an active inequality's
                // multiplier would turn negative.
                let mut t_dual = f64::INFINITY;
                let mut blocking = None;
                for (k, entry) in active.iter().enumerate() {
                    if entry.equality || dual_step[k] <= 0.0 {
                        continue;
                    }
                    let candidate = entry.multiplier / dual_step[k];
                    if candidate < t_dual {
                        t_dual = candidate;
                        blocking = Some(k);
                    }
                }

                // Full primal step restoring the chosen constraint, if the
                // step direction is not degenerate.
                let directional = step.dot(&normal);
                let t_primal = if directional <= SLACK_TOLERANCE {
                    f64::INFINITY
                }
                else {
                    -slack / directional
                };

                let t = t_dual.min(t_primal);
                if t.is_infinite() {
                    return Ok(QpSolution {
                        x,
                        status: QpStatus::Infeasible,
                        iterations,
                    });
                }

                if t_primal.is_finite() {
                    x = &x + &step.mapv(|v| v * t);
                }
                for (k, entry) in active.iter_mut().enumerate() {
                    entry.multiplier -= t * dual_step[k];
                }
                multiplier += t;

                if t_primal <= t_dual {
                    // Full step: the chosen constraint becomes active.
                    active.push(ActiveConstraint {
                        index,
                        normal: normal.clone(),
                        equality: chosen.equality,
                        multiplier,
                    });
                    continue 'outer;
                }
                // Partial (or dual-only) step: drop the blocking
                // constraint and retry against the same chosen one.
                active.remove(blocking.expect("finite dual step has a blocker"));
            }
        }
    }
}

/// Expands bounds and row constraints into `normal·x ≥ rhs` form,
/// equalities first so they enter the active set before any inequality.
fn build_constraints(
    lower: &Vector,
    upper: &Vector,
    constraint_matrix: &Matrix,
    constraint_lower: &Vector,
    constraint_upper: &Vector,
) -> Vec<Constraint> {
    let n = lower.len();
    let mut constraints = Vec::new();

    for (row, (&lo, &hi)) in constraint_lower
        .iter()
        .zip(constraint_upper.iter())
        .enumerate()
    {
        let normal = constraint_matrix.row(row).to_owned();
        if lo == hi {
            constraints.push(Constraint {
                normal,
                rhs: lo,
                equality: true,
            });
        }
        else {
            constraints.push(Constraint {
                normal: normal.clone(),
                rhs: lo,
                equality: false,
            });
            constraints.push(Constraint {
                normal: normal.mapv(|v| -v),
                rhs: -hi,
                equality: false,
            });
        }
    }

    for i in 0..n {
        let mut normal = Vector::zeros(n);
        normal[i] = 1.0;
        constraints.push(Constraint {
            normal,
            rhs: lower[i],
            equality: false,
        });
        let mut normal = Vector::zeros(n);
        normal[i] = -1.0;
        constraints.push(Constraint {
            normal,
            rhs: -upper[i],
            equality: false,
        });
    }
    constraints
}

/// Picks the next constraint to activate: pending equalities in order
/// (sign-adjusted so their working slack is non-positive), then the most
/// violated inequality. `None` means the current point is optimal.
fn select_violated(
    constraints: &[Constraint],
    active: &[ActiveConstraint],
    x: &Vector,
) -> Option<(usize, f64)> {
    let is_active = |i: usize| active.iter().any(|entry| entry.index == i);

    for (i, constraint) in constraints.iter().enumerate() {
        if !constraint.equality || is_active(i) {
            continue;
        }
        let slack = constraint.normal.dot(x) - constraint.rhs;
        let sign = if slack > 0.0 { -1.0 } else { 1.0 };
        return Some((i, sign));
    }

    let mut worst: Option<(usize, f64)> = None;
    for (i, constraint) in constraints.iter().enumerate() {
        if constraint.equality || is_active(i) {
            continue;
        }
        let slack = constraint.normal.dot(x) - constraint.rhs;
        if slack < -SLACK_TOLERANCE
            && worst.map(|(_, s)| slack < s).unwrap_or(true)
        {
            worst = Some((i, slack));
        }
    }
    worst.map(|(i, _)| (i, 1.0))
}

/// Computes the primal step `z` and dual step `r` for activating `normal`
/// against the current active set:
/// `z = Q⁻¹normal − Q⁻¹N (NᵀQ⁻¹N)⁻¹ NᵀQ⁻¹normal`, `r = (NᵀQ⁻¹N)⁻¹NᵀQ⁻¹normal`.
/// Returns `None` when the active-set system loses positive definiteness.
fn step_directions(
    factor: &Matrix,
    active: &[ActiveConstraint],
    normal: &Vector,
) -> Option<(Vector, Vec<f64>)> {
    let whitened = cholesky_solve(factor, normal);
    if active.is_empty() {
        return Some((whitened, Vec::new()));
    }

    let q = active.len();
    let inverse_normals: Vec<Vector> = active
        .iter()
        .map(|entry| cholesky_solve(factor, &entry.normal))
        .collect();

    let mut gram = Array2::<f64>::zeros((q, q));
    for (i, entry) in active.iter().enumerate() {
        for (j, inverse) in inverse_normals.iter().enumerate() {
            gram[(i, j)] = entry.normal.dot(inverse);
        }
    }
    let mut projected = Vector::zeros(q);
    for (i, entry) in active.iter().enumerate() {
        projected[i] = entry.normal.dot(&whitened);
    }

    let gram_factor = cholesky(&gram)?;
    let dual = cholesky_solve(&gram_factor, &projected);

    let mut step = whitened;
    for (k, inverse) in inverse_normals.iter().enumerate() {
        step = &step - &inverse.mapv(|v| v * dual[k]);
    }
    Some((step, dual.to_vec()))
}

/// Lower-triangular Cholesky factor, or `None` when the matrix is not
/// positive definite.
fn cholesky(matrix: &Matrix) -> Option<Matrix> {
    let n = matrix.nrows();
    let mut factor = Matrix::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = matrix[(i, j)];
            for k in 0..j {
                sum -= factor[(i, k)] * factor[(j, k)];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                factor[(i, i)] = sum.sqrt();
            }
            else {
                factor[(i, j)] = sum / factor[(j, j)];
            }
        }
    }
    Some(factor)
}

/// Solves `LLᵀx = b` by forward then backward substitution.
fn cholesky_solve(
    factor: &Matrix,
    b: &Vector,
) -> Vector {
    let n = factor.nrows();
    let mut y = Vector::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= factor[(i, k)] * y[k];
        }
        y[i] = sum / factor[(i, i)];
    }
    let mut x = Vector::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in i + 1..n {
            sum -= factor[(k, i)] * x[k];
        }
        x[i] = sum / factor[(i, i)];
    }
    x
}
