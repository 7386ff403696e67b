//! Formulates and solves the per-iteration quadratic program for cell-type
//! proportions.

use std::error::Error;
use std::fmt::{
    Display,
    Formatter,
};

use anyhow::Result;

use crate::data_structs::typedef::{
    Matrix,
    Vector,
};
use crate::tools::deconv::linalg::{
    coefficient_vector,
    gram_matrix,
    squared_distance,
};
use crate::tools::deconv::qp::{
    QpSolver,
    QpStatus,
};

/// Fatal outcomes of the deconvolution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeconvolutionError {
    SolverFailure(QpStatus),
}

impl Display for DeconvolutionError {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            DeconvolutionError::SolverFailure(status) => {
                write!(f, "QP solver did not reach an optimum: {status:?}")
            },
        }
    }
}

impl Error for DeconvolutionError {}

/// Estimates cell-type proportions from a bulk profile and a reference
/// matrix.
///
/// Holds the fixed pieces of the quadratic program (simplex bounds, the
/// all-ones sum row, the bulk vector) plus the proportions of the current
/// and previous solve, so the caller can drive an iterative refinement loop
/// and watch [`change_in_proportions`](Self::change_in_proportions) for
/// convergence.
pub struct Deconvolver {
    cell_proportions: Vector,
    prev_cell_proportions: Vector,
    proportions_lower_bound: Vector,
    proportions_upper_bound: Vector,
    sum_constraint: Matrix,
    sum_lower_bound: Vector,
    sum_upper_bound: Vector,
    bulk_profile: Vector,
    solver: QpSolver,
}

impl Deconvolver {
    pub fn new(
        num_cell_types: usize,
        bulk_profile: Vector,
    ) -> Self {
        Self {
            cell_proportions: Vector::zeros(num_cell_types),
            prev_cell_proportions: Vector::zeros(num_cell_types),
            proportions_lower_bound: Vector::zeros(num_cell_types),
            proportions_upper_bound: Vector::from_elem(num_cell_types, 1.0),
            sum_constraint: Matrix::from_elem((1, num_cell_types), 1.0),
            sum_lower_bound: Vector::from_elem(1, 1.0),
            sum_upper_bound: Vector::from_elem(1, 1.0),
            bulk_profile,
            solver: QpSolver::default(),
        }
    }

    /// Builds the QP from `reference` (Gram matrix Hessian, negative
    /// correlation linear term) and solves it.
    ///
    /// The previous proportions are retained for
    /// [`change_in_proportions`](Self::change_in_proportions); the solver
    /// status is returned for the caller to act on, a non-`Optimal` status
    /// must not be ignored.
    pub fn solve(
        &mut self,
        reference: &Matrix,
    ) -> Result<QpStatus> {
        let hessian = gram_matrix(reference);
        let linear = coefficient_vector(reference, &self.bulk_profile)?;

        self.prev_cell_proportions = self.cell_proportions.clone();
        let solution = self.solver.solve(
            &hessian,
            &linear,
            &self.proportions_lower_bound,
            &self.proportions_upper_bound,
            &self.sum_constraint,
            &self.sum_lower_bound,
            &self.sum_upper_bound,
        )?;
        self.cell_proportions = solution.x;
        Ok(solution.status)
    }

    /// Squared distance between the last two solves' proportions.
    ///
    /// Only meaningful from the second solve onwards; callers skip the
    /// convergence check on iteration one.
    pub fn change_in_proportions(&self) -> f64 {
        squared_distance(&self.cell_proportions, &self.prev_cell_proportions)
    }

    pub fn cell_proportions(&self) -> &Vector {
        &self.cell_proportions
    }

    pub fn bulk_profile(&self) -> &Vector {
        &self.bulk_profile
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn recovers_an_exact_two_type_mixture() {
        let reference = array![
            [1.0, 0.0],
            [0.0, 1.0],
            [0.8, 0.2],
            [0.3, 0.7]
        ];
        let weights = array![0.25, 0.75];
        let bulk = reference.dot(&weights);

        let mut deconvolver = Deconvolver::new(2, bulk);
        let status = deconvolver.solve(&reference).unwrap();
        assert_eq!(status, QpStatus::Optimal);
        assert_approx_eq!(deconvolver.cell_proportions()[0], 0.25, 1e-6);
        assert_approx_eq!(deconvolver.cell_proportions()[1], 0.75, 1e-6);
    }

    #[test]
    fn repeated_identical_solves_do_not_move() {
        let reference = array![[0.9, 0.1], [0.2, 0.8], [0.5, 0.5]];
        let bulk = array![0.5, 0.5, 0.5];
        let mut deconvolver = Deconvolver::new(2, bulk);
        deconvolver.solve(&reference).unwrap();
        deconvolver.solve(&reference).unwrap();
        assert_approx_eq!(deconvolver.change_in_proportions(), 0.0, 1e-12);
    }

    #[test]
    fn proportions_stay_on_the_simplex() {
        // A bulk profile no convex mixture reproduces exactly.
        let reference = array![[0.0, 0.1], [0.1, 0.0], [0.05, 0.05]];
        let bulk = array![0.9, 0.9, 0.9];
        let mut deconvolver = Deconvolver::new(2, bulk);
        let status = deconvolver.solve(&reference).unwrap();
        assert_eq!(status, QpStatus::Optimal);
        let proportions = deconvolver.cell_proportions();
        let sum: f64 = proportions.iter().sum();
        assert_approx_eq!(sum, 1.0, 1e-6);
        assert!(proportions.iter().all(|&p| p >= -1e-9));
    }

    #[test]
    fn mismatched_reference_is_rejected() {
        let reference = array![[1.0, 0.0], [0.0, 1.0]];
        let mut deconvolver = Deconvolver::new(2, array![0.5]);
        assert!(deconvolver.solve(&reference).is_err());
    }
}
