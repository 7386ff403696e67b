//! Writes the estimated cell-type proportions to stdout or a file.
//!
//! Output is produced only after the whole pipeline has succeeded, so a
//! failed run never leaves a partial result file behind. Existing files are
//! never overwritten; a numbered sibling path is chosen instead.

use std::error::Error;
use std::fmt::{
    Display,
    Formatter,
};
use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    Context,
    Result,
};
use itertools::Itertools;
use log::warn;

use crate::data_structs::records::CellTypeRecord;
use crate::data_structs::typedef::Vector;
use crate::io::tsv::TsvReader;
use crate::tools::deconv::DeconvConfig;
use crate::utils::convert_to_percent;

const PERCENT_PRECISION: i32 = 2;

/// Raised when the configured output path cannot be written as a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileWriteError {
    IsExistingDirectory(PathBuf),
}

impl Display for FileWriteError {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            FileWriteError::IsExistingDirectory(path) => {
                write!(
                    f,
                    "output path '{}' is an existing directory",
                    path.display()
                )
            },
        }
    }
}

impl Error for FileWriteError {}

/// Writes one `name<TAB>percent` line per cell type.
///
/// Names come from the optional cell-type list file; columns beyond the
/// supplied names get generated `unknown_cell_type_N` labels. The
/// destination is stdout unless the configuration names an output file.
pub fn write_proportions(
    config: &DeconvConfig,
    proportions: &Vector,
) -> Result<()> {
    let names = cell_type_names(
        config.cell_type_list_file.as_deref(),
        proportions.len(),
        config.num_threads,
    )?;
    let buffer = names
        .iter()
        .zip(proportions.iter())
        .map(|(name, proportion)| {
            format!(
                "{}\t{}",
                name,
                convert_to_percent(*proportion, PERCENT_PRECISION)
            )
        })
        .join("\n")
        + "\n";

    match &config.out_file_path {
        None => print!("{buffer}"),
        Some(path) => {
            let final_path = resolve_output_path(path)?;
            fs::write(&final_path, buffer).with_context(|| {
                format!("failed to write '{}'", final_path.display())
            })?;
        },
    }
    Ok(())
}

/// Loads the configured cell-type names and pads them with generated
/// labels until every proportion has one.
fn cell_type_names(
    cell_type_list_file: Option<&Path>,
    total: usize,
    threads: usize,
) -> Result<Vec<String>> {
    let mut names: Vec<String> = match cell_type_list_file {
        Some(path) => {
            let mut reader =
                TsvReader::<CellTypeRecord>::new(path).with_threads(threads);
            reader.load()?;
            reader
                .extract_records()?
                .into_iter()
                .map(|record| record.name)
                .collect()
        },
        None => Vec::new(),
    };

    if names.len() > total {
        warn!(
            "cell type list has {} names but only {} cell types were \
             deconvolved; ignoring the surplus",
            names.len(),
            total
        );
        names.truncate(total);
    }
    let known = names.len();
    names.extend(
        (1..=total - known).map(|n| format!("unknown_cell_type_{n}")),
    );
    Ok(names)
}

/// Picks the path to actually write: creates missing parent directories and
/// steps around existing files by suffixing `_1`, `_2`, ...
fn resolve_output_path(out_path: &Path) -> Result<PathBuf> {
    if out_path.is_dir() {
        return Err(
            FileWriteError::IsExistingDirectory(out_path.to_path_buf()).into()
        );
    }
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory '{}'", parent.display())
            })?;
        }
    }
    if !out_path.exists() {
        return Ok(out_path.to_path_buf());
    }

    let stem = out_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = out_path.extension().map(|e| e.to_string_lossy());
    let parent = out_path.parent().unwrap_or_else(|| Path::new(""));

    let mut counter = 1;
    loop {
        let candidate_name = match &extension {
            Some(ext) => format!("{stem}_{counter}.{ext}"),
            None => format!("{stem}_{counter}"),
        };
        let candidate = parent.join(candidate_name);
        if !candidate.exists() {
            warn!(
                "output file '{}' already exists; writing to '{}' instead",
                out_path.display(),
                candidate.display()
            );
            return Ok(candidate);
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_fill_the_tail() {
        let names = cell_type_names(None, 3, 1).unwrap();
        assert_eq!(
            names,
            vec![
                "unknown_cell_type_1",
                "unknown_cell_type_2",
                "unknown_cell_type_3"
            ]
        );
    }

    #[test]
    fn collision_resolution_numbers_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proportions.txt");
        fs::write(&path, "taken").unwrap();
        let resolved = resolve_output_path(&path).unwrap();
        assert_eq!(resolved, dir.path().join("proportions_1.txt"));
        fs::write(&resolved, "also taken").unwrap();
        let resolved = resolve_output_path(&path).unwrap();
        assert_eq!(resolved, dir.path().join("proportions_2.txt"));
    }

    #[test]
    fn directory_output_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_output_path(dir.path()).unwrap_err();
        assert!(err.downcast_ref::<FileWriteError>().is_some());
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/proportions.txt");
        let resolved = resolve_output_path(&nested).unwrap();
        assert_eq!(resolved, nested);
        assert!(nested.parent().unwrap().is_dir());
    }
}
