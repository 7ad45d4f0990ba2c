//! Slon: the network store on top of SQLite
//!
//! One [`Slon`] owns one SQLite connection holding the four collections:
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌───────────┐
//! │ symbols  │ ← │ objects  │ ← │  nodes   │ ← │  network  │ ⟲ network_context
//! │ (text)   │   │ (l, r)   │   │ (e, p?)  │   │ (id, node)│
//! └──────────┘   └──────────┘   └──────────┘   └───────────┘
//! ```
//!
//! Symbols, objects and nodes are interned and never deleted. Network entries
//! are inserted and removed explicitly. Every index and id comes from an
//! `AUTOINCREMENT` key, so none is ever handed out twice.

use crate::config::SlonConfig;
use crate::error::{Result, ResultExt};
use rusqlite::Connection;
use std::time::Duration;

/// Semantic network store
#[derive(Debug)]
pub struct Slon {
    pub(crate) conn: Connection,
    config: SlonConfig,
}

impl Slon {
    /// Open (or create) the store described by `config`.
    pub fn open(config: SlonConfig) -> Result<Self> {
        let conn = if config.is_in_memory() {
            Connection::open_in_memory().context("Opening in-memory SQLite")?
        } else {
            let path = config.database.as_path();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Creating database directory '{}'", parent.display()))?;
            }
            Connection::open(path).with_context(|| format!("Opening SQLite '{}'", path.display()))?
        };

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .context("Configuring SQLite PRAGMAs")?;

        if config.wal && !config.is_in_memory() {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            tracing::debug!(%mode, "journal mode");
        }

        let store = Self { conn, config };
        store.migrate()?;
        tracing::info!(
            database = %store.config.database.display(),
            topology = ?store.config.topology,
            cascade = ?store.config.cascade,
            "opened SLON store"
        );
        Ok(store)
    }

    /// Open a file-backed store with default settings
    pub fn open_path(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::open(SlonConfig::new().with_database(path))
    }

    /// Open a private in-memory store with default settings
    pub fn open_in_memory() -> Result<Self> {
        Self::open(SlonConfig::new())
    }

    /// Idempotent schema installation
    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS symbols (
                idx   INTEGER PRIMARY KEY AUTOINCREMENT,
                text  TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS objects (
                idx        INTEGER PRIMARY KEY AUTOINCREMENT,
                left_idx   INTEGER NOT NULL REFERENCES symbols(idx),
                right_idx  INTEGER NOT NULL REFERENCES symbols(idx),
                UNIQUE (left_idx, right_idx)
            );

            -- payload_idx NULL means the payload is absent; 0 is never a valid idx
            CREATE TABLE IF NOT EXISTS nodes (
                idx          INTEGER PRIMARY KEY AUTOINCREMENT,
                effect_idx   INTEGER NOT NULL REFERENCES objects(idx),
                payload_idx  INTEGER REFERENCES objects(idx)
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_key
                ON nodes(effect_idx, ifnull(payload_idx, 0));

            CREATE TABLE IF NOT EXISTS network (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                node_idx  INTEGER NOT NULL REFERENCES nodes(idx)
            );

            CREATE TABLE IF NOT EXISTS network_context (
                entry_id    INTEGER NOT NULL REFERENCES network(id) ON DELETE CASCADE,
                context_id  INTEGER NOT NULL REFERENCES network(id) ON DELETE CASCADE,
                PRIMARY KEY (entry_id, context_id)
            ) WITHOUT ROWID;

            CREATE INDEX IF NOT EXISTS idx_network_context_by_context
                ON network_context(context_id, entry_id);
            ",
            )
            .context("Migrating SLON schema")?;
        Ok(())
    }

    /// Active configuration
    pub fn config(&self) -> &SlonConfig {
        &self.config
    }

    /// The underlying connection, for callers that join SLON tables with their own
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a savepoint. Nests inside any open transaction.
    pub(crate) fn atomically<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("SAVEPOINT slon_op")?;
        match f(&self.conn) {
            Ok(value) => {
                self.conn.execute_batch("RELEASE slon_op")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK TO slon_op; RELEASE slon_op") {
                    tracing::warn!(error = %rollback, "savepoint rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Run `f` in an immediate transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// Retryable failures (see [`crate::SlonError::is_retryable`]) are returned
    /// as-is; retrying is up to the caller.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %rollback, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Row counts of every collection
    pub fn stats(&self) -> Result<serde_json::Value> {
        let count = |table: &str| -> Result<i64> {
            let n = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n)
        };

        Ok(serde_json::json!({
            "symbols": count("symbols")?,
            "objects": count("objects")?,
            "nodes": count("nodes")?,
            "entries": count("network")?,
            "context_links": count("network_context")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SlonError;

    #[test]
    fn test_open_in_memory_is_empty() {
        let slon = Slon::open_in_memory().expect("in-memory SQLite should open");
        let stats = slon.stats().unwrap();

        assert_eq!(stats["symbols"], 0);
        assert_eq!(stats["entries"], 0);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let slon = Slon::open_in_memory().unwrap();
        slon.intern("A").unwrap();

        slon.migrate().expect("second migration should be a no-op");
        assert_eq!(slon.stats().unwrap()["symbols"], 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let slon = Slon::open_in_memory().unwrap();

        let result: Result<()> = slon.transaction(|s| {
            s.intern("kept?")?;
            Err(SlonError::MalformedPattern("abort".into()))
        });

        assert!(result.is_err());
        assert_eq!(slon.stats().unwrap()["symbols"], 0);
    }

    #[test]
    fn test_transaction_commits() {
        let slon = Slon::open_in_memory().unwrap();

        let symbol = slon.transaction(|s| s.intern("A")).unwrap();
        assert_eq!(symbol.index(), 1);
        assert_eq!(slon.stats().unwrap()["symbols"], 1);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("net.db");

        let slon = Slon::open_path(&path).unwrap();
        slon.intern("A").unwrap();
        assert!(path.exists());
    }
}
