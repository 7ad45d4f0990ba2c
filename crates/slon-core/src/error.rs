//! Error types for SLON
//!
//! Every failure the core can report surfaces here. Nothing is repaired or
//! retried internally; callers decide what to do at their transaction boundary.

use crate::network::EntryId;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type alias for SLON operations
pub type Result<T> = std::result::Result<T, SlonError>;

/// Main error type for SLON operations
#[derive(Error, Debug)]
pub enum SlonError {
    /// Interning raced with another writer and the row could not be read back
    #[error("Transient duplicate while interning into {table}: {key}")]
    TransientDuplicate {
        /// Table being written
        table: &'static str,
        /// Value that could not be read back
        key: String,
    },

    /// A pair or node is missing a required part
    #[error("Malformed pattern: {0}")]
    MalformedPattern(String),

    /// A context reference does not resolve to a live entry
    #[error("Dangling context reference: entry {0} does not exist")]
    DanglingContextReference(EntryId),

    /// Removal targets an entry still used as context by live entries
    #[error("Entry {entry} is still referenced as context by {dependents:?}")]
    CascadeConflict {
        /// The entry asked to be removed
        entry: EntryId,
        /// Live entries linked to it
        dependents: Vec<EntryId>,
    },

    /// Tree topology allows at most one context reference per entry
    #[error("Tree topology allows one context reference per entry, got {count}")]
    MultipleContexts {
        /// References given
        count: usize,
    },

    /// A sub-query used as an operand must yield exactly one entry
    #[error("Query operand must match exactly one entry, matched {found}")]
    AmbiguousOperand {
        /// Entries the operand matched
        found: usize,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage errors from the host database
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        /// What was being done
        context: String,
        /// Underlying error
        source: Box<SlonError>,
    },
}

impl SlonError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether retrying the surrounding transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransientDuplicate { .. } => true,
            Self::Storage(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            Self::WithContext { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for SlonError {
    fn from(e: toml::de::Error) -> Self {
        SlonError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for SlonError {
    fn from(e: toml::ser::Error) -> Self {
        SlonError::Config(e.to_string())
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<SlonError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().context(f()))
    }
}
