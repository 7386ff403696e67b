//! Composable row predicates applied by the reader before record parsing.
//!
//! A filter sees the (possibly column-projected) raw fields of one line and
//! decides whether the line becomes a record. Filters are pure; a filter
//! that needs a field the row does not have fails, and the reader treats
//! that failure like any other per-line problem (warn and skip).

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{
    bail,
    Result,
};

use crate::data_structs::SignalType;
use crate::tools::deconv::DeconvConfig;

/// A shareable predicate over the raw fields of one row.
pub type RowFilter = Arc<dyn Fn(&[&str]) -> Result<bool> + Send + Sync>;

/// Field holding the signal-type marker in every supported schema.
const SIGNAL_FIELD: usize = 3;
/// Field holding the valid-read count in the projected bedMethyl schema.
const READ_DEPTH_FIELD: usize = 4;

fn field<'a>(
    fields: &[&'a str],
    index: usize,
) -> Result<&'a str> {
    match fields.get(index) {
        Some(value) => Ok(value),
        None => bail!(
            "cannot apply row filter: field {} missing (row has {})",
            index,
            fields.len()
        ),
    }
}

/// Keeps only rows whose signal marker parses to `signal`.
pub fn signal_type_filter(signal: SignalType) -> RowFilter {
    Arc::new(move |fields| {
        let marker = SignalType::from_str(field(fields, SIGNAL_FIELD)?)?;
        Ok(marker == signal)
    })
}

/// Keeps only rows whose read depth is strictly greater than `min_depth`.
pub fn min_read_depth_filter(min_depth: u32) -> RowFilter {
    Arc::new(move |fields| {
        let depth: u32 = field(fields, READ_DEPTH_FIELD)?.parse()?;
        Ok(depth > min_depth)
    })
}

/// Keeps only rows whose read depth is strictly less than `max_depth`.
pub fn max_read_depth_filter(max_depth: u32) -> RowFilter {
    Arc::new(move |fields| {
        let depth: u32 = field(fields, READ_DEPTH_FIELD)?.parse()?;
        Ok(depth < max_depth)
    })
}

/// Combines any number of filters with short-circuiting logical AND.
///
/// An empty set converts to `None` ("no filtering at all"), which is
/// distinct from a filter that happens to accept every row.
#[derive(Default)]
pub struct FilterSet {
    filters: Vec<RowFilter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        filter: RowFilter,
    ) {
        self.filters.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Collapses the set into a single predicate, or `None` when empty.
    pub fn into_filter(self) -> Option<RowFilter> {
        if self.filters.is_empty() {
            return None;
        }
        let filters = self.filters;
        Some(Arc::new(move |fields: &[&str]| {
            for filter in &filters {
                if !filter(fields)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }))
    }
}

/// The signal-selection filter implied by the run configuration, shared by
/// every genomic input schema.
pub fn signal_filter_from_config(config: &DeconvConfig) -> FilterSet {
    let mut set = FilterSet::new();
    if config.use_only_methylation_signal {
        set.add(signal_type_filter(SignalType::Methylation));
    }
    if config.use_only_hydroxy_signal {
        set.add(signal_type_filter(SignalType::Hydroxymethylation));
    }
    set
}

/// The full bedMethyl row filter: signal selection plus read-depth bounds.
pub fn bulk_filter_from_config(config: &DeconvConfig) -> FilterSet {
    let mut set = signal_filter_from_config(config);
    if config.min_read_depth > 0 {
        set.add(min_read_depth_filter(config.min_read_depth));
    }
    if config.max_read_depth < u32::MAX {
        set.add(max_read_depth_filter(config.max_read_depth));
    }
    set
}
