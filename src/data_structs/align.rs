//! Positional alignment of sorted record collections.
//!
//! Both algorithms require their inputs sorted ascending by
//! [`SiteKey`](crate::data_structs::records::SiteKey). That precondition is
//! the caller's responsibility: bedMethyl-producing tools emit sorted rows
//! and the reader preserves file order, so no sorting happens here. Feeding
//! unsorted collections silently produces wrong correspondences.

use std::error::Error;
use std::fmt::{
    Display,
    Formatter,
};

use anyhow::Result;

use crate::data_structs::records::SiteKeyed;
use crate::data_structs::typedef::RowIndexes;

/// Raised when a membership search finds no common sites at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoOverlap;

impl Display for NoOverlap {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "no overlapping genomic sites found")
    }
}

impl Error for NoOverlap {}

/// Finds the row correspondences between two sorted collections.
///
/// Classic two-pointer merge: the pointer at the smaller key advances; on
/// equal keys both indices are recorded and both pointers advance. The two
/// returned lists have equal length and line up pairwise, so each side can
/// be subset to the common subsequence in matched order.
///
/// Chosen because the inputs are expected to be mostly coincident already,
/// making this O(n + m) with no allocations beyond the output.
pub fn find_overlapping_indexes<A, B>(
    left: &[A],
    right: &[B],
) -> (RowIndexes, RowIndexes)
where
    A: SiteKeyed,
    B: SiteKeyed, {
    let reserve = left.len().min(right.len());
    let mut left_indexes = RowIndexes::with_capacity(reserve);
    let mut right_indexes = RowIndexes::with_capacity(reserve);

    let mut l = 0;
    let mut r = 0;
    while l < left.len() && r < right.len() {
        let left_key = left[l].site_key();
        let right_key = right[r].site_key();
        match left_key.cmp(&right_key) {
            std::cmp::Ordering::Equal => {
                left_indexes.push(l);
                right_indexes.push(r);
                l += 1;
                r += 1;
            },
            std::cmp::Ordering::Less => l += 1,
            std::cmp::Ordering::Greater => r += 1,
        }
    }
    (left_indexes, right_indexes)
}

/// Finds which rows of `entries` are members of the (much smaller) site
/// list, by binary-searching each list entry in `entries`.
///
/// Returns indices into `entries`, in list order. An empty result means the
/// two inputs are totally disjoint, which is an error: downstream
/// deconvolution would have nothing to work with.
pub fn find_indexes_in_site_list<S, E>(
    site_list: &[S],
    entries: &[E],
) -> Result<RowIndexes>
where
    S: SiteKeyed,
    E: SiteKeyed, {
    let mut indexes = RowIndexes::with_capacity(site_list.len());
    for site in site_list {
        let key = site.site_key();
        if let Ok(found) =
            entries.binary_search_by(|entry| entry.site_key().cmp(&key))
        {
            indexes.push(found);
        }
    }
    if indexes.is_empty() {
        return Err(NoOverlap.into());
    }
    Ok(indexes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structs::records::{
        BulkRecord,
        CpgRecord,
        SiteKey,
    };
    use crate::data_structs::SignalType;

    fn cpg(
        chrom: u8,
        start: u64,
        signal: SignalType,
    ) -> CpgRecord {
        CpgRecord {
            site: SiteKey::new(chrom, start, signal),
        }
    }

    fn bulk(
        chrom: u8,
        start: u64,
        signal: SignalType,
    ) -> BulkRecord {
        BulkRecord {
            site: SiteKey::new(chrom, start, signal),
            proportion: 0.5,
        }
    }

    fn cpg_fixture() -> Vec<CpgRecord> {
        use SignalType::{
            Hydroxymethylation as H,
            Methylation as M,
        };
        vec![
            cpg(1, 100, M),
            cpg(1, 200, H),
            cpg(1, 200, M),
            cpg(2, 150, H),
            cpg(2, 150, M),
            cpg(3, 300, H),
            cpg(3, 400, M),
        ]
    }

    fn bulk_fixture() -> Vec<BulkRecord> {
        use SignalType::{
            Hydroxymethylation as H,
            Methylation as M,
        };
        vec![
            bulk(1, 100, M),
            bulk(1, 200, H),
            bulk(1, 201, H),
            bulk(1, 201, M),
            bulk(2, 150, H),
            bulk(2, 150, M),
            bulk(3, 300, H),
            bulk(3, 400, M),
        ]
    }

    #[test]
    fn two_pointer_merge_matches_expected_pairs() {
        let (first, second) =
            find_overlapping_indexes(&cpg_fixture(), &bulk_fixture());
        assert_eq!(first, vec![0, 1, 3, 4, 5, 6]);
        assert_eq!(second, vec![0, 1, 4, 5, 6, 7]);
    }

    #[test]
    fn membership_search_collects_entry_indexes() {
        let indexes =
            find_indexes_in_site_list(&cpg_fixture(), &bulk_fixture())
                .unwrap();
        assert_eq!(indexes, vec![0, 1, 4, 5, 6, 7]);
    }

    #[test]
    fn membership_search_errors_on_disjoint_inputs() {
        let list = vec![cpg(5, 1, SignalType::Methylation)];
        let entries = vec![bulk(9, 9, SignalType::Methylation)];
        let err = find_indexes_in_site_list(&list, &entries).unwrap_err();
        assert!(err.downcast_ref::<NoOverlap>().is_some());
    }

    #[test]
    fn membership_search_errors_on_empty_inputs() {
        let list: Vec<CpgRecord> = Vec::new();
        let entries: Vec<BulkRecord> = Vec::new();
        assert!(find_indexes_in_site_list(&list, &entries).is_err());
    }

    #[test]
    fn merge_of_disjoint_inputs_is_empty() {
        let left = vec![cpg(1, 1, SignalType::Methylation)];
        let right = vec![bulk(2, 2, SignalType::Methylation)];
        let (l, r) = find_overlapping_indexes(&left, &right);
        assert!(l.is_empty());
        assert!(r.is_empty());
    }
}
