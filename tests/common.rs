//! Shared fixtures: synthetic bedMethyl and reference files.
#![allow(dead_code)]

use std::fmt::Write as _;
use std::io::Write as _;

use tempfile::NamedTempFile;

/// One synthetic genomic site.
#[derive(Debug, Clone, Copy)]
pub struct DemoSite {
    pub chrom: u8,
    pub start: u64,
    pub signal: char,
}

/// An ascending run of 'm' sites across two chromosomes.
pub fn demo_sites(count: usize) -> Vec<DemoSite> {
    let half = count.div_ceil(2);
    (0..count)
        .map(|i| {
            let (chrom, offset) = if i < half { (1, i) } else { (2, i - half) };
            DemoSite {
                chrom,
                start: 1000 + offset as u64 * 50,
                signal: 'm',
            }
        })
        .collect()
}

/// Writes a modkit-style bedMethyl file (18 columns) with the given
/// per-site modified fractions (as proportions) and read depth.
pub fn write_bedmethyl(
    sites: &[DemoSite],
    fractions: &[f64],
    depth: u32,
) -> NamedTempFile {
    let mut buffer = String::new();
    for (site, fraction) in sites.iter().zip(fractions) {
        let percent = fraction * 100.0;
        writeln!(
            buffer,
            "chr{chrom}\t{start}\t{end}\t{signal}\t{depth}\t+\t{start}\t{end}\t255,0,0\t{depth}\t{percent:.4}\t{m}\t{u}\t0\t0\t0\t0\t0",
            chrom = site.chrom,
            start = site.start,
            end = site.start + 1,
            signal = site.signal,
            depth = depth,
            percent = percent,
            m = (depth as f64 * fraction).round() as u32,
            u = depth - (depth as f64 * fraction).round() as u32,
        )
        .unwrap();
    }
    write_temp_file(&buffer)
}

/// Writes a BED4+x reference matrix with percentage-valued columns.
pub fn write_reference(
    sites: &[DemoSite],
    columns: &[Vec<f64>],
) -> NamedTempFile {
    let mut buffer = String::new();
    for (row, site) in sites.iter().enumerate() {
        write!(
            buffer,
            "chr{}\t{}\t{}\t{}",
            site.chrom,
            site.start,
            site.start + 1,
            site.signal
        )
        .unwrap();
        for column in columns {
            write!(buffer, "\t{:.4}", column[row] * 100.0).unwrap();
        }
        buffer.push('\n');
    }
    write_temp_file(&buffer)
}

/// Writes a BED4 CpG allow-list.
pub fn write_cpg_list(sites: &[DemoSite]) -> NamedTempFile {
    let mut buffer = String::new();
    for site in sites {
        writeln!(
            buffer,
            "chr{}\t{}\t{}\t{}",
            site.chrom,
            site.start,
            site.start + 1,
            site.signal
        )
        .unwrap();
    }
    write_temp_file(&buffer)
}

pub fn write_temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
