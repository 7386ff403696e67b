//! Owning, ordered collections of parsed records.
//!
//! Each container wraps the records of one input schema in file order.
//! Mutation happens only through whole-container operations: subsetting to
//! an explicit index list, or (for the reference matrix) appending sampled
//! cell-type columns. The numeric pipeline consumes containers through
//! their dense [`Vector`]/[`Matrix`] materialisations.

use std::error::Error;
use std::fmt::{
    Display,
    Formatter,
};

use anyhow::{
    bail,
    Result,
};

use crate::data_structs::records::{
    BulkRecord,
    CpgRecord,
    ReferenceRecord,
};
use crate::data_structs::typedef::{
    Matrix,
    RowIndex,
    Vector,
};
use crate::utils::rng::ProfileSampler;

/// Raised by [`subset_rows`] when an index does not address a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOutOfRange {
    pub index: RowIndex,
    pub len: usize,
}

impl Display for IndexOutOfRange {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "row index {} out of range for {} records",
            self.index, self.len
        )
    }
}

impl Error for IndexOutOfRange {}

/// Replaces `records` with exactly the rows at `rows`, in the given order.
///
/// The index list is allowed to repeat and reorder rows; callers control
/// the final order. Any out-of-range index aborts the whole operation.
fn subset_rows<R: Clone>(
    records: &mut Vec<R>,
    rows: &[RowIndex],
) -> Result<()> {
    let mut subset = Vec::with_capacity(rows.len());
    for &index in rows {
        let record = records.get(index).ok_or(IndexOutOfRange {
            index,
            len: records.len(),
        })?;
        subset.push(record.clone());
    }
    *records = subset;
    Ok(())
}

/// The CpG allow-list: sites eligible for deconvolution.
#[derive(Debug, Clone, Default)]
pub struct CpgList {
    records: Vec<CpgRecord>,
}

impl CpgList {
    pub fn records(&self) -> &[CpgRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn subset_rows(
        &mut self,
        rows: &[RowIndex],
    ) -> Result<()> {
        subset_rows(&mut self.records, rows)
    }
}

impl From<Vec<CpgRecord>> for CpgList {
    fn from(records: Vec<CpgRecord>) -> Self {
        Self { records }
    }
}

/// The observed bulk methylation profile.
#[derive(Debug, Clone, Default)]
pub struct BulkProfile {
    records: Vec<BulkRecord>,
}

impl BulkProfile {
    pub fn records(&self) -> &[BulkRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn subset_rows(
        &mut self,
        rows: &[RowIndex],
    ) -> Result<()> {
        subset_rows(&mut self.records, rows)
    }

    /// The modified fractions as a dense vector, in row order.
    pub fn to_vector(&self) -> Vector {
        Vector::from_iter(self.records.iter().map(|r| r.proportion))
    }
}

impl From<Vec<BulkRecord>> for BulkProfile {
    fn from(records: Vec<BulkRecord>) -> Self {
        Self { records }
    }
}

/// The reference matrix: per-site expected modified fractions, one column
/// per cell type.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMatrix {
    records: Vec<ReferenceRecord>,
}

impl ReferenceMatrix {
    /// Builds a column-less matrix with one row per bulk record.
    ///
    /// Used when no reference file is supplied; every column is then
    /// appended by [`append_sampled_cell_types`] and refined iteratively.
    pub fn from_bulk(bulk: &BulkProfile) -> Self {
        Self {
            records: bulk
                .records()
                .iter()
                .map(|r| ReferenceRecord::from_site(r.site))
                .collect(),
        }
    }

    pub fn records(&self) -> &[ReferenceRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn subset_rows(
        &mut self,
        rows: &[RowIndex],
    ) -> Result<()> {
        subset_rows(&mut self.records, rows)
    }

    /// Number of cell-type columns, judged from the first row.
    ///
    /// Rows are only guaranteed consistent once [`to_matrix`] has
    /// succeeded.
    pub fn num_cell_types(&self) -> usize {
        self.records
            .first()
            .map(|r| r.proportions.len())
            .unwrap_or(0)
    }

    /// Appends `additional` columns of sampled values to every row, keyed
    /// off each row's signal type.
    pub fn append_sampled_cell_types(
        &mut self,
        additional: usize,
        sampler: &mut ProfileSampler,
    ) {
        for record in &mut self.records {
            let signal = record.site.signal;
            record
                .proportions
                .extend((0..additional).map(|_| sampler.sample(signal)));
        }
    }

    /// Materialises the records as a dense rows x cell-types matrix.
    ///
    /// Fails when rows disagree on their column count or when there is
    /// nothing to materialise.
    pub fn to_matrix(&self) -> Result<Matrix> {
        let Some(first) = self.records.first() else {
            bail!("reference matrix has no rows");
        };
        let cols = first.proportions.len();
        if cols == 0 {
            bail!("reference matrix has no cell type columns");
        }
        let mut matrix = Matrix::zeros((self.records.len(), cols));
        for (row, record) in self.records.iter().enumerate() {
            if record.proportions.len() != cols {
                bail!(
                    "inconsistent number of entries in reference matrix \
                     (row {} has {}, expected {})",
                    row,
                    record.proportions.len(),
                    cols
                );
            }
            for (col, value) in record.proportions.iter().enumerate() {
                matrix[(row, col)] = *value;
            }
        }
        Ok(matrix)
    }
}

impl From<Vec<ReferenceRecord>> for ReferenceMatrix {
    fn from(records: Vec<ReferenceRecord>) -> Self {
        Self { records }
    }
}
