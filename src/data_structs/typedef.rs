use ndarray::{
    Array1,
    Array2,
};

/// Methylated fraction of reads at a site, in `[0, 1]`.
pub type Proportion = f64;
/// Row position within a record collection.
pub type RowIndex = usize;
pub type RowIndexes = Vec<RowIndex>;

pub type Vector = Array1<f64>;
pub type Matrix = Array2<f64>;
