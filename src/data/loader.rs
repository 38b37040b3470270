use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::{DataError, Result, UnavailableReason};
use super::family::FamilyRules;
use super::model::NormalizedDataset;
use super::normalize::normalize_rows;

// ---------------------------------------------------------------------------
// Table sources
// ---------------------------------------------------------------------------

/// Where raw table bytes come from. The registry calls this once per source
/// file on a family's first load, possibly from a loader thread.
pub trait TableSource: Send + Sync {
    fn fetch(&self, location: &Path) -> io::Result<Vec<u8>>;
}

/// Reads source files below a root directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileSource { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TableSource for FileSource {
    fn fetch(&self, location: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(self.root.join(location))
    }
}

// ---------------------------------------------------------------------------
// Raw CSV table
// ---------------------------------------------------------------------------

/// One data record together with its 1-based physical line in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub line: u64,
    pub fields: Vec<String>,
}

/// A CSV file read as text: header row plus data records, nothing typed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Header cells as written in the file (trimmed).
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    /// Parse CSV bytes whose header row sits after `header_offset` preamble lines.
    ///
    /// A leading UTF-8 BOM is dropped, cells are trimmed, and records may be
    /// shorter or longer than the header (missing cells read as empty).
    pub fn from_csv(bytes: &[u8], header_offset: usize) -> std::result::Result<Self, csv::Error> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let body = skip_lines(bytes, header_offset);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(body);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let line = record
                .position()
                .map_or(0, |pos| pos.line() + header_offset as u64);
            records.push(RawRecord {
                line,
                fields: record.iter().map(str::to_string).collect(),
            });
        }

        Ok(RawTable { headers, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RawRecord {
    /// Cell at `col`, or `""` for a short record.
    pub fn cell(&self, col: usize) -> &str {
        self.fields.get(col).map_or("", String::as_str)
    }
}

fn skip_lines(bytes: &[u8], n: usize) -> &[u8] {
    let mut rest = bytes;
    for _ in 0..n {
        match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return &[],
        }
    }
    rest
}

// ---------------------------------------------------------------------------
// Family load: retrieve every source, normalize, merge
// ---------------------------------------------------------------------------

/// Fetch and normalize all sources of a family.
///
/// Each file is normalized on its own (headers may differ between releases);
/// the rows are then merged and stably sorted by date.
pub fn load_family(source: &dyn TableSource, rules: &FamilyRules) -> Result<NormalizedDataset> {
    let mut rows = Vec::new();

    for location in &rules.sources {
        let bytes = source.fetch(location).map_err(|e| {
            DataError::unavailable(
                rules.id,
                UnavailableReason::Io {
                    path: location.clone(),
                    source: Arc::new(e),
                },
            )
        })?;

        let raw = RawTable::from_csv(&bytes, rules.header_offset).map_err(|e| {
            DataError::unavailable(
                rules.id,
                UnavailableReason::Format {
                    path: location.clone(),
                    source: Arc::new(e),
                },
            )
        })?;

        log::debug!(
            "{}: read {} records from {}",
            rules.id,
            raw.len(),
            location.display()
        );
        rows.extend(normalize_rows(&raw, rules)?);
    }

    Ok(NormalizedDataset::from_rows(rules, rows))
}
