//! Store configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// In-memory database path understood by SQLite
pub const IN_MEMORY: &str = ":memory:";

/// Shape of the context relation between entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Any number of context references per entry
    #[default]
    Graph,
    /// At most one context reference per entry; inserting under several
    /// parents creates one entry per parent
    Tree,
}

/// What happens when removed entries are still used as context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadePolicy {
    /// Remove dependents too, transitively.
    ///
    /// An entry goes with any one of its context entries, even when it is
    /// also linked under others that stay: under the graph topology,
    /// deleting one parent of a shared child deletes the child.
    #[default]
    Cascade,
    /// Refuse the removal with `CascadeConflict`
    Reject,
}

/// Main store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlonConfig {
    /// SQLite database path (`:memory:` for a private in-memory store)
    pub database: PathBuf,

    /// Context relation shape
    pub topology: Topology,

    /// Removal policy for referenced entries
    pub cascade: CascadePolicy,

    /// Rows fetched per page while enumerating query results
    pub page_size: usize,

    /// How long a writer waits on a locked database
    pub busy_timeout_ms: u64,

    /// Use the write-ahead log for file-backed databases
    pub wal: bool,
}

impl Default for SlonConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(IN_MEMORY),
            topology: Topology::default(),
            cascade: CascadePolicy::default(),
            page_size: 256,
            busy_timeout_ms: 5000,
            wal: true,
        }
    }
}

impl SlonConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database path
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = path.into();
        self
    }

    /// Set the context topology
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Set the cascade policy
    pub fn with_cascade(mut self, cascade: CascadePolicy) -> Self {
        self.cascade = cascade;
        self
    }

    /// Set the page size, clamped to at least one row
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the busy timeout
    pub fn with_busy_timeout_ms(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Enable or disable WAL mode
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    /// Whether the database lives only in memory
    pub fn is_in_memory(&self) -> bool {
        self.database.as_os_str() == IN_MEMORY
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.page_size = config.page_size.max(1);
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
