//! File input and output: the parallel TSV reader, its row filters, and
//! the proportions writer.

pub mod filters;
pub mod metrics;
pub mod tsv;

pub use filters::{
    FilterSet,
    RowFilter,
};
pub use tsv::{
    FileReadError,
    TsvReader,
};
