//! Typed parse targets for the supported genomic interval schemas.
//!
//! Every record type implements [`TsvRecord`] so the
//! [`TsvReader`](crate::io::tsv::TsvReader) can convert a projected field
//! slice into it. Parsing is fallible per record; the reader turns failures
//! into bounded warnings rather than aborting the load.

use anyhow::{
    bail,
    Context,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::data_structs::typedef::Proportion;
use crate::data_structs::SignalType;
use crate::utils::convert_to_proportion;

/// A parse target of the [`TsvReader`](crate::io::tsv::TsvReader).
///
/// `from_fields` receives the already-projected fields of one line, split on
/// whitespace runs, and either produces a record or a per-line error.
pub trait TsvRecord: Sized + Send {
    fn from_fields(fields: &[&str]) -> Result<Self>;
}

/// Converts a chromosome column token to its numeric encoding.
///
/// Handles plain numeric names ("1", "22") and "chr"-prefixed names
/// ("chr1", "CHRX") case-insensitively. The sex and mitochondrial
/// chromosomes map to 23 ('X'), 24 ('Y') and 25 ('M').
pub fn parse_chromosome(chr: &str) -> Result<u8> {
    // Byte-level prefix test: an ASCII "chr" match guarantees index 3 is a
    // character boundary.
    let bytes = chr.as_bytes();
    let number_part = if bytes.len() >= 3 && bytes[..3].eq_ignore_ascii_case(b"chr")
    {
        &chr[3..]
    }
    else {
        chr
    };

    if !number_part.is_empty()
        && number_part.bytes().all(|b| b.is_ascii_digit())
    {
        return number_part
            .parse::<u8>()
            .with_context(|| format!("chromosome number out of range: '{}'", chr));
    }
    if number_part.len() == 1 {
        match number_part.chars().next().unwrap().to_ascii_lowercase() {
            'x' => return Ok(23),
            'y' => return Ok(24),
            'm' => return Ok(25),
            _ => {},
        }
    }
    bail!("failed to glean chromosome number from '{}'", chr)
}

/// The (chromosome, start, signal) triple identifying one measured site.
///
/// Derived ordering is lexicographic over the triple; it is the total order
/// every matching and merging algorithm in this crate relies on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SiteKey {
    pub chrom: u8,
    pub start: u64,
    pub signal: SignalType,
}

impl SiteKey {
    pub fn new(
        chrom: u8,
        start: u64,
        signal: SignalType,
    ) -> Self {
        Self {
            chrom,
            start,
            signal,
        }
    }

    /// Parses the key from the leading BED columns
    /// [chromosome, start, end, signal]. The end column is never used.
    fn from_bed_fields(fields: &[&str]) -> Result<Self> {
        validate_fields(fields, 4)?;
        Ok(Self {
            chrom: parse_chromosome(fields[0])?,
            start: fields[1]
                .parse::<u64>()
                .with_context(|| format!("invalid start position '{}'", fields[1]))?,
            signal: fields[3].parse()?,
        })
    }
}

/// Anything carrying a [`SiteKey`]; the seam the alignment algorithms are
/// generic over.
pub trait SiteKeyed {
    fn site_key(&self) -> SiteKey;
}

fn validate_fields(
    fields: &[&str],
    min_expected: usize,
) -> Result<()> {
    if fields.len() < min_expected {
        bail!(
            "too few fields (expected >={}, found {})",
            min_expected,
            fields.len()
        );
    }
    Ok(())
}

fn parse_percentage(field: &str) -> Result<Proportion> {
    let percent = field
        .parse::<f64>()
        .with_context(|| format!("invalid percentage '{}'", field))?;
    Ok(convert_to_proportion(percent))
}

/// One row of the CpG allow-list (BED4: chrom, start, end, signal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpgRecord {
    pub site: SiteKey,
}

impl TsvRecord for CpgRecord {
    fn from_fields(fields: &[&str]) -> Result<Self> {
        Ok(Self {
            site: SiteKey::from_bed_fields(fields)?,
        })
    }
}

impl SiteKeyed for CpgRecord {
    fn site_key(&self) -> SiteKey {
        self.site
    }
}

/// One row of the reference matrix (BED4+x): a site plus one methylation
/// proportion per known cell type. Percentages in the file become
/// proportions here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub site: SiteKey,
    pub proportions: Vec<Proportion>,
}

impl ReferenceRecord {
    pub fn from_site(site: SiteKey) -> Self {
        Self {
            site,
            proportions: Vec::new(),
        }
    }
}

impl TsvRecord for ReferenceRecord {
    fn from_fields(fields: &[&str]) -> Result<Self> {
        validate_fields(fields, 5)?;
        let site = SiteKey::from_bed_fields(fields)?;
        let proportions = fields[4..]
            .iter()
            .map(|field| parse_percentage(field))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { site, proportions })
    }
}

impl SiteKeyed for ReferenceRecord {
    fn site_key(&self) -> SiteKey {
        self.site
    }
}

/// One row of the observed bulk profile.
///
/// Expects the projected bedMethyl columns
/// [chrom, start, end, signal, read depth, fraction modified]; only the
/// site key and the fraction survive parsing, the read depth exists for
/// row filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRecord {
    pub site: SiteKey,
    pub proportion: Proportion,
}

impl TsvRecord for BulkRecord {
    fn from_fields(fields: &[&str]) -> Result<Self> {
        validate_fields(fields, 6)?;
        Ok(Self {
            site: SiteKey::from_bed_fields(fields)?,
            proportion: parse_percentage(fields[5])?,
        })
    }
}

impl SiteKeyed for BulkRecord {
    fn site_key(&self) -> SiteKey {
        self.site
    }
}

/// One line of the optional cell-type name file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellTypeRecord {
    pub name: String,
}

impl TsvRecord for CellTypeRecord {
    fn from_fields(fields: &[&str]) -> Result<Self> {
        validate_fields(fields, 1)?;
        if fields[0].is_empty() {
            bail!("empty cell type name");
        }
        Ok(Self {
            name: fields[0].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::plain_autosome("1", 1)]
    #[case::plain_autosome_max("22", 22)]
    #[case::prefixed("chr2", 2)]
    #[case::prefixed_upper("CHR10", 10)]
    #[case::x_lower("x", 23)]
    #[case::x_prefixed("chrx", 23)]
    #[case::y_prefixed("chrY", 24)]
    #[case::mito("M", 25)]
    fn chromosome_parsing(
        #[case] token: &str,
        #[case] expected: u8,
    ) {
        assert_eq!(parse_chromosome(token).unwrap(), expected);
    }

    #[rstest]
    #[case::refseq_accession("NC100012.2")]
    #[case::prefixed_letter("chrt")]
    #[case::empty("")]
    #[case::bare_prefix("chr")]
    fn chromosome_parsing_rejects(#[case] token: &str) {
        assert!(parse_chromosome(token).is_err());
    }

    #[test]
    fn cpg_record_from_fields() {
        let record =
            CpgRecord::from_fields(&["chr1", "100", "101", "m"]).unwrap();
        assert_eq!(
            record.site,
            SiteKey::new(1, 100, SignalType::Methylation)
        );
    }

    #[test]
    fn cpg_record_rejects_short_rows() {
        assert!(CpgRecord::from_fields(&["chr1", "100", "101"]).is_err());
    }

    #[test]
    fn reference_record_converts_percentages() {
        let record = ReferenceRecord::from_fields(&[
            "chr3", "42", "43", "h", "100", "25", "0",
        ])
        .unwrap();
        assert_eq!(
            record.site,
            SiteKey::new(3, 42, SignalType::Hydroxymethylation)
        );
        assert_eq!(record.proportions, vec![1.0, 0.25, 0.0]);
    }

    #[test]
    fn reference_record_requires_one_cell_type() {
        assert!(
            ReferenceRecord::from_fields(&["chr3", "42", "43", "h"]).is_err()
        );
    }

    #[test]
    fn bulk_record_reads_projected_columns() {
        let record = BulkRecord::from_fields(&[
            "chrX", "9000", "9001", "m", "31", "87.5",
        ])
        .unwrap();
        assert_eq!(
            record.site,
            SiteKey::new(23, 9000, SignalType::Methylation)
        );
        assert_eq!(record.proportion, 0.875);
    }

    #[test]
    fn bulk_record_rejects_non_numeric_fraction() {
        assert!(BulkRecord::from_fields(&[
            "chr1", "100", "101", "m", "31", "many"
        ])
        .is_err());
    }

    #[test]
    fn site_key_ordering_is_lexicographic() {
        let a = SiteKey::new(1, 200, SignalType::Hydroxymethylation);
        let b = SiteKey::new(1, 200, SignalType::Methylation);
        let c = SiteKey::new(2, 150, SignalType::Hydroxymethylation);
        assert!(a < b);
        assert!(b < c);
    }
}
