//! Dense linear-algebra helpers feeding the QP solver and the reference
//! refinement step.

use std::error::Error;
use std::fmt::{
    Display,
    Formatter,
};

use anyhow::{
    bail,
    Result,
};
use ndarray::{
    s,
    Axis,
};

use crate::data_structs::typedef::{
    Matrix,
    Vector,
};

/// Ridge added to the Gram matrix diagonal to keep it positive definite
/// when reference columns are (nearly) linearly dependent.
const GRAM_REGULARISATION: f64 = 1e-8;

/// Below this squared norm the single-vector pseudo-inverse amplifies noise
/// instead of solving anything.
const MIN_STABLE_SQUARED_NORM: f64 = 1e-10;

/// Numerical failure modes of the refinement step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericalError {
    /// The unknown-proportions sub-vector collapsed towards zero.
    UnstablePseudoInverse { squared_norm: f64 },
}

impl Display for NumericalError {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            NumericalError::UnstablePseudoInverse { squared_norm } => {
                write!(
                    f,
                    "vector norm too small for a stable pseudo-inverse \
                     (squared norm {squared_norm:.3e})"
                )
            },
        }
    }
}

impl Error for NumericalError {}

/// Computes `m`ᵀ·`m` plus a small diagonal regularisation term.
///
/// A Gram matrix is positive semi-definite by construction; the ridge makes
/// it positive definite even under rank deficiency, which the QP solver's
/// Cholesky factorisation requires.
pub fn gram_matrix(m: &Matrix) -> Matrix {
    let mut gram = m.t().dot(m);
    for diagonal in gram.diag_mut() {
        *diagonal += GRAM_REGULARISATION;
    }
    gram
}

/// Computes the QP linear term −(`bulk`ᵀ·`reference`): the negative
/// correlation of the bulk signal with each reference column.
pub fn coefficient_vector(
    reference: &Matrix,
    bulk: &Vector,
) -> Result<Vector> {
    if reference.nrows() != bulk.len() {
        bail!(
            "bulk profile has {} sites but the reference matrix has {} rows",
            bulk.len(),
            reference.nrows()
        );
    }
    Ok(-bulk.dot(reference))
}

/// Moore-Penrose pseudo-inverse of a single column vector: vᵀ/‖v‖².
pub fn pseudo_inverse(v: &Vector) -> Result<Vector> {
    let squared_norm = v.dot(v);
    if squared_norm < MIN_STABLE_SQUARED_NORM {
        return Err(NumericalError::UnstablePseudoInverse { squared_norm }.into());
    }
    Ok(v / squared_norm)
}

/// Squared Euclidean distance between two equally-sized vectors.
pub fn squared_distance(
    a: &Vector,
    b: &Vector,
) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Back-solves the profiles of the novel cell types from the bulk signal
/// left unexplained by the known ones, overwriting the trailing
/// `additional_cell_types` columns of `reference` in place.
///
/// The caller owns `reference` exclusively for the duration of the
/// iteration loop; nothing else aliases it while refinement runs.
///
/// Fails (recoverably, see the pipeline loop) when the novel proportions
/// have collapsed towards zero and the pseudo-inverse would be unstable.
pub fn update_reference_matrix(
    reference: &mut Matrix,
    cell_proportions: &Vector,
    bulk_profile: &Vector,
    additional_cell_types: usize,
) -> Result<()> {
    let total_cell_types = reference.ncols();
    if additional_cell_types == 0 || additional_cell_types > total_cell_types {
        bail!(
            "cannot update {} of {} reference columns",
            additional_cell_types,
            total_cell_types
        );
    }
    if cell_proportions.len() != total_cell_types
        || bulk_profile.len() != reference.nrows()
    {
        bail!("proportions/bulk dimensions do not match the reference matrix");
    }
    let known_cell_types = total_cell_types - additional_cell_types;

    let known_reference = reference.slice(s![.., ..known_cell_types]);
    let known_proportions = cell_proportions.slice(s![..known_cell_types]);
    let unknown_proportions =
        cell_proportions.slice(s![known_cell_types..]).to_owned();

    let residual = bulk_profile - &known_reference.dot(&known_proportions);
    let inverse = pseudo_inverse(&unknown_proportions)?;

    let update = residual
        .insert_axis(Axis(1))
        .dot(&inverse.insert_axis(Axis(0)));
    reference
        .slice_mut(s![.., known_cell_types..])
        .assign(&update);
    Ok(())
}
