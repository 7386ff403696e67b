//! The run orchestration: load, align, iterate, write.
//!
//! Everything fatal propagates out of [`run`] as an error; the console
//! binary prints it once and exits non-zero. Output is written only after
//! the whole pipeline has succeeded.

use std::error::Error;
use std::fmt::{
    Display,
    Formatter,
};
use std::path::Path;

use anyhow::{
    Context,
    Result,
};
use log::{
    info,
    warn,
};

use crate::data_structs::align::{
    find_indexes_in_site_list,
    find_overlapping_indexes,
    NoOverlap,
};
use crate::data_structs::batch::{
    BulkProfile,
    CpgList,
    ReferenceMatrix,
};
use crate::data_structs::records::TsvRecord;
use crate::data_structs::typedef::{
    Matrix,
    Vector,
};
use crate::io::filters::{
    bulk_filter_from_config,
    signal_filter_from_config,
    RowFilter,
};
use crate::io::metrics::write_proportions;
use crate::io::tsv::TsvReader;
use crate::tools::deconv::config::DeconvConfig;
use crate::tools::deconv::deconvolver::{
    Deconvolver,
    DeconvolutionError,
};
use crate::tools::deconv::linalg::update_reference_matrix;
use crate::tools::deconv::qp::QpStatus;
use crate::utils::rng::ProfileSampler;

/// The bedMethyl columns mapped onto the projected bulk schema
/// [chrom, start, end, signal, read depth, fraction modified]; see the
/// modkit column layout.
const BEDMETHYL_COLUMNS: [usize; 6] = [0, 1, 2, 3, 4, 10];

/// Configuration mistakes caught before any file is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither a reference matrix nor additional cell types: there is
    /// nothing to solve for.
    NothingToDeconvolve,
}

impl Display for ConfigError {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ConfigError::NothingToDeconvolve => {
                write!(
                    f,
                    "no reference matrix was supplied and no additional \
                     cell types were requested; nothing to deconvolve"
                )
            },
        }
    }
}

impl Error for ConfigError {}

/// Runs the whole deconvolution pipeline and returns the estimated
/// proportions (also handed to the output writer).
pub fn run(config: &DeconvConfig) -> Result<Vector> {
    if config.reference_matrix_file.is_none()
        && config.additional_cell_types == 0
    {
        return Err(ConfigError::NothingToDeconvolve.into());
    }

    let signal_filter = signal_filter_from_config(config).into_filter();
    let bulk_filter = bulk_filter_from_config(config).into_filter();

    let cpg_list: CpgList = read_file(
        config.cpg_list_file.as_deref(),
        config.num_threads,
        Vec::new(),
        signal_filter.clone(),
    )?;
    let mut reference: ReferenceMatrix = read_file(
        config.reference_matrix_file.as_deref(),
        config.num_threads,
        Vec::new(),
        signal_filter,
    )?;
    let mut bulk: BulkProfile = read_file(
        Some(&config.bedmethyl_file),
        config.num_threads,
        BEDMETHYL_COLUMNS.to_vec(),
        bulk_filter,
    )?;

    let mut sampler = match config.sampler_seed {
        Some(seed) => ProfileSampler::from_seed(seed),
        None => ProfileSampler::from_entropy(),
    };
    preprocess_input_data(
        &mut bulk,
        &mut reference,
        &cpg_list,
        config.additional_cell_types,
        &mut sampler,
    )?;
    info!(
        "deconvolving {} sites across {} cell types",
        bulk.len(),
        reference.num_cell_types()
    );

    let mut reference_matrix = reference.to_matrix()?;
    let proportions = deconvolve(&mut reference_matrix, bulk.to_vector(), config)?;

    write_proportions(config, &proportions)?;
    Ok(proportions)
}

/// Loads one input file into its container; a missing optional path yields
/// an empty container.
fn read_file<C, R>(
    path: Option<&Path>,
    threads: usize,
    columns: Vec<usize>,
    filter: Option<RowFilter>,
) -> Result<C>
where
    C: Default + From<Vec<R>>,
    R: TsvRecord, {
    let Some(path) = path else {
        return Ok(C::default());
    };
    let mut reader = TsvReader::<R>::new(path)
        .with_columns(columns)
        .with_row_filter(filter)
        .with_threads(threads);
    reader
        .load()
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    Ok(C::from(reader.extract_records()?))
}

/// Restricts all datasets to a common, ordered set of sites and extends
/// the reference matrix with sampled columns for the requested novel cell
/// types.
///
/// After this returns, `reference` and `bulk` are row-aligned 1:1 by site
/// key; every downstream numeric step assumes exactly that.
pub fn preprocess_input_data(
    bulk: &mut BulkProfile,
    reference: &mut ReferenceMatrix,
    cpg_list: &CpgList,
    additional_cell_types: usize,
    sampler: &mut ProfileSampler,
) -> Result<()> {
    if reference.is_empty() {
        if additional_cell_types == 0 {
            return Err(ConfigError::NothingToDeconvolve.into());
        }
        *reference = ReferenceMatrix::from_bulk(bulk);
    }

    if !cpg_list.is_empty() {
        let reference_rows =
            find_indexes_in_site_list(cpg_list.records(), reference.records())
                .context(
                    "CpG list and reference matrix share no genomic sites",
                )?;
        reference.subset_rows(&reference_rows)?;
        let bulk_rows =
            find_indexes_in_site_list(cpg_list.records(), bulk.records())
                .context(
                    "CpG list and bedMethyl input share no genomic sites",
                )?;
        bulk.subset_rows(&bulk_rows)?;
    }

    let (reference_rows, bulk_rows) =
        find_overlapping_indexes(reference.records(), bulk.records());
    if reference_rows.is_empty() {
        return Err(anyhow::Error::new(NoOverlap).context(
            "reference matrix and bedMethyl input share no genomic sites",
        ));
    }
    reference.subset_rows(&reference_rows)?;
    bulk.subset_rows(&bulk_rows)?;

    if additional_cell_types > 0 {
        reference.append_sampled_cell_types(additional_cell_types, sampler);
    }
    Ok(())
}

/// Runs the solve/refine loop against a row-aligned reference matrix and
/// bulk vector.
///
/// Without additional cell types this is a single solve. With them, the
/// loop alternates QP solves with in-place refinement of the unknown
/// reference columns until the proportions stop moving, the iteration
/// budget runs out, or the refinement step turns numerically unstable
/// (which keeps the last successful proportions).
fn deconvolve(
    reference: &mut Matrix,
    bulk: Vector,
    config: &DeconvConfig,
) -> Result<Vector> {
    let num_cell_types = reference.ncols();
    let mut deconvolver = Deconvolver::new(num_cell_types, bulk);

    if config.additional_cell_types == 0 {
        let status = deconvolver.solve(reference)?;
        ensure_optimal(status)?;
        return Ok(deconvolver.cell_proportions().clone());
    }

    for iteration in 1..=config.max_iterations {
        let status = deconvolver.solve(reference)?;
        ensure_optimal(status)?;

        if iteration > 1 {
            let change = deconvolver.change_in_proportions();
            if change < config.convergence_threshold {
                info!(
                    "converged after {iteration} iterations \
                     (squared change {change:.3e})"
                );
                break;
            }
        }
        if iteration == config.max_iterations {
            info!(
                "iteration budget of {} reached without convergence",
                config.max_iterations
            );
            break;
        }

        if let Err(error) = update_reference_matrix(
            reference,
            deconvolver.cell_proportions(),
            deconvolver.bulk_profile(),
            config.additional_cell_types,
        ) {
            warn!(
                "stopping refinement after iteration {iteration}: {error:#}; \
                 keeping the proportions solved so far"
            );
            break;
        }
    }
    Ok(deconvolver.cell_proportions().clone())
}

fn ensure_optimal(status: QpStatus) -> Result<()> {
    if status != QpStatus::Optimal {
        return Err(DeconvolutionError::SolverFailure(status).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structs::records::{
        BulkRecord,
        CpgRecord,
        ReferenceRecord,
        SiteKey,
    };
    use crate::data_structs::SignalType;

    fn site(start: u64) -> SiteKey {
        SiteKey::new(1, start, SignalType::Methylation)
    }

    fn bulk_profile(entries: &[(u64, f64)]) -> BulkProfile {
        BulkProfile::from(
            entries
                .iter()
                .map(|&(start, proportion)| BulkRecord {
                    site: site(start),
                    proportion,
                })
                .collect::<Vec<_>>(),
        )
    }

    fn reference_matrix(entries: &[(u64, &[f64])]) -> ReferenceMatrix {
        ReferenceMatrix::from(
            entries
                .iter()
                .map(|&(start, proportions)| ReferenceRecord {
                    site: site(start),
                    proportions: proportions.to_vec(),
                })
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn missing_reference_without_additional_types_is_a_config_error() {
        let config = DeconvConfig {
            bedmethyl_file: "does-not-matter.bed".into(),
            ..Default::default()
        };
        let err = run(&config).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn preprocessing_aligns_reference_and_bulk() {
        let mut bulk =
            bulk_profile(&[(100, 0.1), (150, 0.2), (200, 0.3), (300, 0.4)]);
        let mut reference = reference_matrix(&[
            (100, &[0.5]),
            (200, &[0.6]),
            (250, &[0.7]),
            (300, &[0.8]),
        ]);
        let cpg_list = CpgList::default();
        let mut sampler = ProfileSampler::from_seed(1);
        preprocess_input_data(
            &mut bulk,
            &mut reference,
            &cpg_list,
            0,
            &mut sampler,
        )
        .unwrap();

        assert_eq!(bulk.len(), 3);
        assert_eq!(reference.len(), 3);
        let bulk_sites: Vec<u64> =
            bulk.records().iter().map(|r| r.site.start).collect();
        let reference_sites: Vec<u64> =
            reference.records().iter().map(|r| r.site.start).collect();
        assert_eq!(bulk_sites, vec![100, 200, 300]);
        assert_eq!(reference_sites, bulk_sites);
    }

    #[test]
    fn cpg_list_restricts_both_datasets() {
        let mut bulk = bulk_profile(&[(100, 0.1), (200, 0.2), (300, 0.3)]);
        let mut reference =
            reference_matrix(&[(100, &[0.5]), (200, &[0.6]), (300, &[0.7])]);
        let cpg_list = CpgList::from(vec![
            CpgRecord { site: site(100) },
            CpgRecord { site: site(300) },
        ]);
        let mut sampler = ProfileSampler::from_seed(1);
        preprocess_input_data(
            &mut bulk,
            &mut reference,
            &cpg_list,
            0,
            &mut sampler,
        )
        .unwrap();
        assert_eq!(bulk.len(), 2);
        assert_eq!(reference.len(), 2);
    }

    #[test]
    fn disjoint_reference_and_bulk_is_fatal() {
        let mut bulk = bulk_profile(&[(100, 0.1)]);
        let mut reference = reference_matrix(&[(999, &[0.5])]);
        let cpg_list = CpgList::default();
        let mut sampler = ProfileSampler::from_seed(1);
        let err = preprocess_input_data(
            &mut bulk,
            &mut reference,
            &cpg_list,
            0,
            &mut sampler,
        )
        .unwrap_err();
        assert!(err.downcast_ref::<NoOverlap>().is_some());
    }

    #[test]
    fn derived_reference_gains_sampled_columns() {
        let mut bulk = bulk_profile(&[(100, 0.1), (200, 0.2)]);
        let mut reference = ReferenceMatrix::default();
        let cpg_list = CpgList::default();
        let mut sampler = ProfileSampler::from_seed(1);
        preprocess_input_data(
            &mut bulk,
            &mut reference,
            &cpg_list,
            2,
            &mut sampler,
        )
        .unwrap();
        assert_eq!(reference.len(), 2);
        assert_eq!(reference.num_cell_types(), 2);
    }

    #[test]
    fn single_pass_deconvolution_recovers_known_weights() {
        let reference = reference_matrix(&[
            (100, &[1.0, 0.0]),
            (200, &[0.0, 1.0]),
            (300, &[0.5, 0.5]),
            (400, &[0.9, 0.1]),
        ]);
        let weights = ndarray::array![0.3, 0.7];
        let matrix = reference.to_matrix().unwrap();
        let bulk = matrix.dot(&weights);

        let config = DeconvConfig::default();
        let mut matrix = matrix;
        let proportions = deconvolve(&mut matrix, bulk, &config).unwrap();
        assert!((proportions[0] - 0.3).abs() < 1e-4);
        assert!((proportions[1] - 0.7).abs() < 1e-4);
    }
}
