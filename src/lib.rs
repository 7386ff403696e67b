//! # demix
//!
//! `demix` is a Rust library and command-line tool for cell-type
//! deconvolution of bulk DNA methylation data obtained from long-read (ONT)
//! sequencing. Given a bulk methylation/hydroxymethylation profile measured
//! at genomic CpG sites, and an optional reference matrix of known cell-type
//! methylation profiles, it estimates the proportional mixture of cell types
//! (including unknown, novel types) that best explains the observed bulk
//! signal.
//!
//! ## Key Features
//!
//! * **Fast tabular ingestion**: whitespace-delimited genomic interval files
//!   (bedMethyl and BED-like formats) are memory-mapped and parsed in
//!   parallel chunks ([`TsvReader`](io::tsv::TsvReader)), with column
//!   projection, row filtering
//!   and bounded per-line diagnostics. Record order always matches file
//!   order.
//! * **Site alignment**: two-pointer overlap merging and binary-search
//!   membership lookup restrict all inputs to a common, ordered set of
//!   genomic sites before any numeric work happens.
//! * **Constrained deconvolution**: cell-type proportions are estimated by
//!   solving a quadratic program (Goldfarb-Idnani dual active-set method)
//!   under simplex constraints, with an iterative refinement loop that
//!   re-estimates the profiles of novel cell types from the residual bulk
//!   signal.
//! * **Reproducible sampling**: profiles for novel cell types are seeded
//!   from empirical methylation/hydroxymethylation distributions via an
//!   injectable, seedable generator.
//!
//! ## Structure
//!
//! * [`data_structs`]: record and container types for the three input
//!   schemas, the genomic site key, and the site-alignment algorithms.
//! * [`io`]: the parallel memory-mapped TSV reader, composable row filters,
//!   and the proportions writer.
//! * [`tools`]: the deconvolution engine (QP solver, linear-algebra helpers,
//!   iteration loop) and the run orchestration consumed by the CLI.
//! * [`utils`]: percentage/proportion conversions and the novel-profile
//!   sampler.
//!
//! ## Usage
//!
//! ```no_run
//! use demix::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = DeconvConfig {
//!         bedmethyl_file: "sample.bedmethyl".into(),
//!         reference_matrix_file: Some("reference.bed".into()),
//!         ..Default::default()
//!     };
//!     let proportions = demix::tools::deconv::run(&config)?;
//!     println!("{proportions}");
//!     Ok(())
//! }
//! ```

pub mod data_structs;
pub mod io;
pub mod prelude;
pub mod tools;
pub mod utils;

#[allow(unused_imports)]
use prelude::*;
