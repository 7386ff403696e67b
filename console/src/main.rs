use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use console::style;
use demix::tools::deconv::{
    config::{
        DEFAULT_CONVERGENCE_THRESHOLD,
        DEFAULT_MAX_ITERATIONS,
    },
    DeconvConfig,
};
use wild::ArgsOs;

#[derive(Parser, Debug)]
#[command(
    name = "demix",
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = "A hybrid cell-type deconvolution algorithm for long-read (ONT) \
             methylation data.",
    long_about = None,)]
struct Cli {
    #[arg(
        help = "The bedMethyl file of the long-read dataset, as produced by \
                modkit (BED9+9)."
    )]
    bedmethyl: PathBuf,

    #[arg(
        short = 't',
        long,
        default_value_t = 0,
        help = "Number of worker threads for file parsing; 0 uses every \
                available core."
    )]
    threads: usize,

    #[arg(
        short = 'c',
        long,
        help = "List of CpG sites (BED4) to restrict the deconvolution to. \
                Defaults to every site in the bedMethyl file."
    )]
    cpg_list: Option<PathBuf>,

    #[arg(
        short = 'r',
        long,
        help = "Matrix of reference methylation signals (BED4+x, one column \
                per cell type, values as percentages)."
    )]
    reference_matrix: Option<PathBuf>,

    #[arg(
        short = 'l',
        long,
        help = "Newline-separated cell type names matching the reference \
                matrix columns. Missing names become unknown_cell_type_N."
    )]
    cell_type_list: Option<PathBuf>,

    #[arg(
        long,
        default_value_t = 0,
        value_parser = clap::value_parser!(u16).range(0..=100),
        help = "Number of expected cell types beyond the reference matrix \
                columns."
    )]
    additional_cell_types: u16,

    #[arg(
        short = 'o',
        long,
        help = "File to write the determined cell proportions to; written \
                to stdout when omitted. Existing files are never \
                overwritten."
    )]
    out_file: Option<PathBuf>,

    #[arg(
        long,
        default_value_t = DEFAULT_MAX_ITERATIONS,
        help_heading = "REFINEMENT",
        help = "Maximum iterations of the deconvolution loop. Has no \
                effect unless additional cell types are requested."
    )]
    max_iterations: usize,

    #[arg(
        long,
        default_value_t = DEFAULT_CONVERGENCE_THRESHOLD,
        help_heading = "REFINEMENT",
        help = "Stop iterating once the squared change in proportions \
                drops below this."
    )]
    convergence_threshold: f64,

    #[arg(
        long,
        help_heading = "REFINEMENT",
        help = "Seed for the novel-profile sampler, for reproducible runs."
    )]
    seed: Option<u64>,

    #[arg(
        long,
        default_value_t = 0,
        help_heading = "FILTER ARGS",
        help = "Keep only bedMethyl rows with read depth strictly above \
                this."
    )]
    min_read_depth: u32,

    #[arg(
        long,
        default_value_t = u32::MAX,
        help_heading = "FILTER ARGS",
        help = "Keep only bedMethyl rows with read depth strictly below \
                this."
    )]
    max_read_depth: u32,

    #[arg(
        long,
        conflicts_with = "only_hydroxymethylation",
        help_heading = "FILTER ARGS",
        help = "Use only the 5mC signal from every input."
    )]
    only_methylation: bool,

    #[arg(
        long,
        help_heading = "FILTER ARGS",
        help = "Use only the 5hmC signal from every input."
    )]
    only_hydroxymethylation: bool,
}

impl From<Cli> for DeconvConfig {
    fn from(cli: Cli) -> Self {
        DeconvConfig {
            bedmethyl_file: cli.bedmethyl,
            cpg_list_file: cli.cpg_list,
            reference_matrix_file: cli.reference_matrix,
            cell_type_list_file: cli.cell_type_list,
            additional_cell_types: cli.additional_cell_types as usize,
            num_threads: cli.threads,
            min_read_depth: cli.min_read_depth,
            max_read_depth: cli.max_read_depth,
            use_only_methylation_signal: cli.only_methylation,
            use_only_hydroxy_signal: cli.only_hydroxymethylation,
            max_iterations: cli.max_iterations,
            convergence_threshold: cli.convergence_threshold,
            out_file_path: cli.out_file,
            sampler_seed: cli.seed,
        }
    }
}

fn main() -> ExitCode {
    let args: ArgsOs = wild::args_os();
    let cli = Cli::parse_from(args);

    pretty_env_logger::formatted_builder()
        .parse_filters(
            &std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        )
        .init();

    let config = DeconvConfig::from(cli);
    match demix::tools::deconv::run(&config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {error:#}", style("error:").red().bold());
            ExitCode::FAILURE
        },
    }
}
