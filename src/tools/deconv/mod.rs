//! The deconvolution engine.
//!
//! [`run`] drives the whole pipeline: load the three inputs through the
//! parallel reader, align them to a common site set, extend the reference
//! matrix with sampled novel profiles, then alternate constrained QP solves
//! with in-place refinement of the unknown columns until the proportions
//! converge.

pub mod config;
pub mod deconvolver;
pub mod linalg;
pub mod pipeline;
pub mod qp;

pub use config::DeconvConfig;
pub use deconvolver::{
    DeconvolutionError,
    Deconvolver,
};
pub use pipeline::{
    preprocess_input_data,
    run,
    ConfigError,
};
pub use qp::{
    QpSolution,
    QpSolver,
    QpStatus,
};
