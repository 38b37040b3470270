//! Error types for loading and querying dataset families.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::model::FamilyId;

/// Why a family's source could not be turned into raw rows.
///
/// Sources sit behind `Arc` so one failed load can be reported to every
/// caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum UnavailableReason {
    /// The source file could not be read.
    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// The source bytes are not valid CSV.
    #[error("cannot parse {path:?} as CSV: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: Arc<csv::Error>,
    },

    /// The load did not finish within the caller's limit.
    #[error("load did not finish within {0:?}")]
    TimedOut(Duration),

    /// The loader thread could not be started.
    #[error("cannot start loader thread: {0}")]
    Spawn(#[source] Arc<io::Error>),

    /// The loader thread went away without reporting a result.
    #[error("loader thread exited without a result")]
    LoaderLost,
}

/// Errors surfaced by the normalizer, the query engine and the registry.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    /// A canonical column is absent after the rename map was applied.
    #[error("{family}: required column '{column}' is missing after renaming")]
    MissingColumn { family: FamilyId, column: String },

    /// A date cell could not be parsed with any of the family's formats.
    #[error("{family}: cannot parse date '{value}' in column '{column}' on line {line}")]
    MalformedDate {
        family: FamilyId,
        column: String,
        line: u64,
        value: String,
    },

    /// Source retrieval failed. The registry keeps no negative cache, so a
    /// later call retries.
    #[error("{family}: dataset unavailable: {reason}")]
    DatasetUnavailable {
        family: FamilyId,
        #[source]
        reason: UnavailableReason,
    },

    /// The filter names a dimension the family does not carry, or its date
    /// range is reversed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The family id is not part of the catalog.
    #[error("unknown dataset family '{0}'")]
    UnknownFamily(String),
}

impl DataError {
    /// Whether calling again may succeed without any change on the caller's side.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DataError::DatasetUnavailable { .. })
    }

    pub(crate) fn unavailable(family: FamilyId, reason: UnavailableReason) -> Self {
        DataError::DatasetUnavailable { family, reason }
    }
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DataError>;
