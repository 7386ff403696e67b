//! The configuration value bag the CLI hands to the run orchestration.

use std::path::PathBuf;

pub const DEFAULT_MAX_ITERATIONS: usize = 5;
pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 1e-8;

/// Everything a deconvolution run needs to know.
///
/// The library never parses command-line arguments; the console binary (or
/// a test) fills this struct and passes it by reference into
/// [`run`](crate::tools::deconv::run).
#[derive(Debug, Clone)]
pub struct DeconvConfig {
    /// The bulk bedMethyl file (modkit output, BED9+9).
    pub bedmethyl_file: PathBuf,
    /// Optional allow-list of CpG sites (BED4) to restrict the analysis to.
    pub cpg_list_file: Option<PathBuf>,
    /// Optional reference matrix (BED4+x, one column per cell type, values
    /// as percentages).
    pub reference_matrix_file: Option<PathBuf>,
    /// Optional newline-separated cell-type names matching the reference
    /// columns.
    pub cell_type_list_file: Option<PathBuf>,
    /// Number of cell types expected beyond the reference columns.
    pub additional_cell_types: usize,
    /// Worker threads for file parsing; 0 uses every available core.
    pub num_threads: usize,
    /// Keep only bedMethyl rows with read depth strictly above this.
    pub min_read_depth: u32,
    /// Keep only bedMethyl rows with read depth strictly below this.
    pub max_read_depth: u32,
    /// Restrict every input to 5mC rows.
    pub use_only_methylation_signal: bool,
    /// Restrict every input to 5hmC rows.
    pub use_only_hydroxy_signal: bool,
    /// Iteration budget for the refinement loop (ignored without
    /// additional cell types).
    pub max_iterations: usize,
    /// Stop iterating once the squared change in proportions drops below
    /// this.
    pub convergence_threshold: f64,
    /// Where to write the proportions; stdout when unset.
    pub out_file_path: Option<PathBuf>,
    /// Seed for the novel-profile sampler; unset draws from OS entropy.
    pub sampler_seed: Option<u64>,
}

impl Default for DeconvConfig {
    fn default() -> Self {
        Self {
            bedmethyl_file: PathBuf::new(),
            cpg_list_file: None,
            reference_matrix_file: None,
            cell_type_list_file: None,
            additional_cell_types: 0,
            num_threads: 0,
            min_read_depth: 0,
            max_read_depth: u32::MAX,
            use_only_methylation_signal: false,
            use_only_hydroxy_signal: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
            out_file_path: None,
            sampler_seed: None,
        }
    }
}
