//! Parallel, memory-mapped reader for whitespace-delimited genomic files.
//!
//! The file is mapped read-only and logically divided into one byte range
//! per worker thread, each boundary advanced to the next newline so no line
//! straddles a chunk. Chunks parse independently on a one-shot rayon pool
//! and reassemble in chunk order, so the produced records exactly follow
//! file order (minus skipped lines). That ordering is load-bearing: the
//! alignment algorithms assume both inputs preserve their original relative
//! order.
//!
//! A malformed line never aborts a load. Each per-line failure (bad UTF-8,
//! unparseable field, row-filter error) is recorded into a bounded warning
//! log and the line is skipped; the summary is emitted through `log::warn!`
//! once loading finishes.

use std::error::Error;
use std::fmt::{
    Display,
    Formatter,
};
use std::fs::File;
use std::io::ErrorKind;
use std::path::{
    Path,
    PathBuf,
};
use std::sync::atomic::{
    AtomicUsize,
    Ordering,
};
use std::sync::Mutex;

use anyhow::{
    Context,
    Result,
};
use log::warn;
use memchr::memchr;
use memmap2::{
    Advice,
    Mmap,
};
use rayon::prelude::*;

use crate::data_structs::records::TsvRecord;
use crate::io::filters::RowFilter;

/// Stored warning cap; further warnings are only counted.
const MAX_WARNING_MESSAGES: usize = 5;

/// Conservative bedMethyl line width, used only to presize the record
/// vector.
const APPROXIMATE_LINE_LENGTH: usize = 50;

/// Why a file could not be read, or why the reader was used out of order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileReadError {
    NotFound(PathBuf),
    PermissionDenied(PathBuf),
    NotRegularFile(PathBuf),
    EmptyFile(PathBuf),
    AlreadyLoaded(PathBuf),
    NotLoaded(PathBuf),
}

impl Display for FileReadError {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            FileReadError::NotFound(path) => {
                write!(f, "file '{}' does not exist", path.display())
            },
            FileReadError::PermissionDenied(path) => {
                write!(f, "no permission to read '{}'", path.display())
            },
            FileReadError::NotRegularFile(path) => {
                write!(f, "'{}' is not a regular file", path.display())
            },
            FileReadError::EmptyFile(path) => {
                write!(f, "file '{}' is empty", path.display())
            },
            FileReadError::AlreadyLoaded(path) => {
                write!(f, "'{}' is already loaded", path.display())
            },
            FileReadError::NotLoaded(path) => {
                write!(f, "no records loaded from '{}'", path.display())
            },
        }
    }
}

impl Error for FileReadError {}

/// Thread-safe bounded collector for per-line diagnostics.
#[derive(Default)]
struct WarningLog {
    messages: Mutex<Vec<String>>,
    total: AtomicUsize,
}

impl WarningLog {
    fn record(
        &self,
        message: String,
    ) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let mut messages = self.messages.lock().unwrap();
        if messages.len() < MAX_WARNING_MESSAGES {
            messages.push(message);
        }
    }

    fn summarise(
        &self,
        path: &Path,
    ) {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return;
        }
        let messages = self.messages.lock().unwrap();
        warn!(
            "{} line(s) skipped while reading '{}':",
            total,
            path.display()
        );
        for message in messages.iter() {
            warn!("  {message}");
        }
        let suppressed = total.saturating_sub(messages.len());
        if suppressed > 0 {
            warn!("  ... {suppressed} further warning(s) suppressed");
        }
    }
}

/// Memory-mapped, multi-threaded reader producing typed records.
///
/// The lifecycle is strict: [`load`](Self::load) may run once per instance,
/// and [`extract_records`](Self::extract_records) moves the records out
/// exactly once after a successful load. File validation (existence,
/// regular file, non-empty, readable) happens at load time.
pub struct TsvReader<R: TsvRecord> {
    file_path: PathBuf,
    columns_to_include: Vec<usize>,
    row_filter: Option<RowFilter>,
    threads: usize,
    records: Option<Vec<R>>,
    loaded: bool,
}

impl<R: TsvRecord> TsvReader<R> {
    /// Creates a reader with no column projection, no row filter, and an
    /// automatic thread count.
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            columns_to_include: Vec::new(),
            row_filter: None,
            threads: 0,
            records: None,
            loaded: false,
        }
    }

    /// Keeps only the fields at `columns`, in their original order.
    /// Indices beyond a row's field count are skipped for that row.
    pub fn with_columns(
        mut self,
        columns: Vec<usize>,
    ) -> Self {
        self.columns_to_include = columns;
        self
    }

    pub fn with_row_filter(
        mut self,
        filter: Option<RowFilter>,
    ) -> Self {
        self.row_filter = filter;
        self
    }

    /// `0` lets the pool decide (one worker per available core).
    pub fn with_threads(
        mut self,
        threads: usize,
    ) -> Self {
        self.threads = threads;
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Maps the file, parses it in parallel and stores the records.
    ///
    /// Fails fast with a [`FileReadError`] when the file is missing, not a
    /// regular file, empty or unreadable, and when this reader has already
    /// loaded. Malformed lines are skipped with a bounded warning summary.
    pub fn load(&mut self) -> Result<()> {
        if self.loaded {
            return Err(
                FileReadError::AlreadyLoaded(self.file_path.clone()).into()
            );
        }
        let mmap = map_file(&self.file_path)?;
        let data: &[u8] = &mmap;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .context("failed to build the parse thread pool")?;
        let ranges = chunk_ranges(data, pool.current_num_threads());

        let warnings = WarningLog::default();
        let columns = self.columns_to_include.as_slice();
        let filter = self.row_filter.as_ref();
        let chunks: Vec<Vec<R>> = pool.install(|| {
            ranges
                .par_iter()
                .map(|&(start, end)| {
                    parse_chunk(&data[start..end], columns, filter, &warnings)
                })
                .collect()
        });

        let mut records =
            Vec::with_capacity(data.len() / APPROXIMATE_LINE_LENGTH);
        for chunk in chunks {
            records.extend(chunk);
        }
        self.records = Some(records);
        self.loaded = true;

        warnings.summarise(&self.file_path);
        Ok(())
    }

    /// Moves the parsed records out of the reader.
    ///
    /// Errors when nothing is loaded, including after a previous
    /// extraction.
    pub fn extract_records(&mut self) -> Result<Vec<R>> {
        match self.records.take() {
            Some(records) => Ok(records),
            None => {
                Err(FileReadError::NotLoaded(self.file_path.clone()).into())
            },
        }
    }
}

/// Opens and maps the file read-only, translating the failure modes the
/// pipeline needs to distinguish.
fn map_file(path: &Path) -> Result<Mmap> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Err(FileReadError::NotFound(path.to_path_buf()).into());
        },
        Err(error) if error.kind() == ErrorKind::PermissionDenied => {
            return Err(
                FileReadError::PermissionDenied(path.to_path_buf()).into()
            );
        },
        Err(error) => {
            return Err(anyhow::Error::new(error)
                .context(format!("failed to open '{}'", path.display())));
        },
    };
    let metadata = file
        .metadata()
        .with_context(|| format!("failed to stat '{}'", path.display()))?;
    if !metadata.is_file() {
        return Err(FileReadError::NotRegularFile(path.to_path_buf()).into());
    }
    if metadata.len() == 0 {
        return Err(FileReadError::EmptyFile(path.to_path_buf()).into());
    }
    // Safety: the map is read-only; concurrent truncation of the input file
    // is outside this process's control, as with any mmap-based reader.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("failed to map '{}'", path.display()))?;
    let _ = mmap.advise(Advice::Sequential);
    Ok(mmap)
}

/// Splits `data` into at most `threads` byte ranges, each ending on a line
/// boundary. The final range always ends at end-of-file.
fn chunk_ranges(
    data: &[u8],
    threads: usize,
) -> Vec<(usize, usize)> {
    let threads = threads.max(1);
    let chunk_size = (data.len() / threads).max(1);

    let mut ranges = Vec::with_capacity(threads);
    let mut start = 0;
    for chunk in 0..threads {
        if start >= data.len() {
            break;
        }
        let end = if chunk == threads - 1 {
            data.len()
        }
        else {
            let approximate = (start + chunk_size).min(data.len());
            match memchr(b'\n', &data[approximate..]) {
                Some(offset) => approximate + offset,
                None => data.len(),
            }
        };
        ranges.push((start, end));
        start = end + 1;
    }
    ranges
}

fn parse_chunk<R: TsvRecord>(
    chunk: &[u8],
    columns: &[usize],
    filter: Option<&RowFilter>,
    warnings: &WarningLog,
) -> Vec<R> {
    let mut records = Vec::new();
    let mut position = 0;
    while position < chunk.len() {
        let line_end = memchr(b'\n', &chunk[position..])
            .map(|offset| position + offset)
            .unwrap_or(chunk.len());
        let line = &chunk[position..line_end];
        position = line_end + 1;

        if let Err(error) = parse_line(line, columns, filter, &mut records) {
            warnings.record(describe_skipped_line(line, &error));
        }
    }
    records
}

fn parse_line<R: TsvRecord>(
    line: &[u8],
    columns: &[usize],
    filter: Option<&RowFilter>,
    records: &mut Vec<R>,
) -> Result<()> {
    let line = std::str::from_utf8(line).context("line is not valid UTF-8")?;
    let fields: Vec<&str> = line.split_ascii_whitespace().collect();
    let projected: Vec<&str> = if columns.is_empty() {
        fields
    }
    else {
        columns
            .iter()
            .filter_map(|&index| fields.get(index).copied())
            .collect()
    };

    if let Some(filter) = filter {
        if !filter(&projected)? {
            return Ok(());
        }
    }
    records.push(R::from_fields(&projected)?);
    Ok(())
}

fn describe_skipped_line(
    line: &[u8],
    error: &anyhow::Error,
) -> String {
    if line.is_empty() {
        format!("{error:#} (line was empty)")
    }
    else {
        format!("{error:#} [{}]", String::from_utf8_lossy(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_end_on_newlines_and_cover_the_file() {
        let data = b"aa\nbbbb\ncc\ndddd\nee\n";
        let ranges = chunk_ranges(data, 3);
        for &(start, end) in &ranges[..ranges.len() - 1] {
            assert_eq!(data[end], b'\n', "chunk [{start}, {end}) must end at a newline");
        }
        assert_eq!(ranges.last().unwrap().1, data.len());
        // Ranges tile the file with single-byte gaps at the newlines.
        for window in ranges.windows(2) {
            assert_eq!(window[0].1 + 1, window[1].0);
        }
        assert_eq!(ranges[0].0, 0);
    }

    #[test]
    fn more_threads_than_bytes_is_fine() {
        // The single line fits in the first one-byte chunk; the trailing
        // newline is the separator and belongs to no chunk.
        assert_eq!(chunk_ranges(b"a\n", 16), vec![(0, 1)]);
        assert_eq!(chunk_ranges(b"a\nb", 16), vec![(0, 1), (2, 3)]);
    }

    #[test]
    fn single_chunk_spans_everything() {
        let data = b"aa\nbb";
        assert_eq!(chunk_ranges(data, 1), vec![(0, data.len())]);
    }
}
