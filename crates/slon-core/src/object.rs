//! Object table: interned ordered pairs of symbols

use crate::error::{Result, SlonError};
use crate::symbol::{symbols_match, Symbol};
use rusqlite::{params, Connection, OptionalExtension};

/// Wildcard-aware pair equality, slot by slot. Order matters.
pub fn pairs_match(a: (&str, &str), b: (&str, &str)) -> bool {
    symbols_match(a.0, b.0) && symbols_match(a.1, b.1)
}

/// Interned object handle: an ordered `(left, right)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Object {
    index: i64,
    left: Symbol,
    right: Symbol,
}

impl Object {
    pub(crate) fn new(index: i64, left: Symbol, right: Symbol) -> Self {
        Self { index, left, right }
    }

    /// Insertion index
    pub fn index(&self) -> i64 {
        self.index
    }

    /// Left-hand symbol
    pub fn left(&self) -> &Symbol {
        &self.left
    }

    /// Right-hand symbol
    pub fn right(&self) -> &Symbol {
        &self.right
    }

    /// Both texts, left first
    pub fn texts(&self) -> (&str, &str) {
        (self.left.text(), self.right.text())
    }

    /// Wildcard-aware equality
    pub fn matches(&self, other: &Object) -> bool {
        pairs_match(self.texts(), other.texts())
    }
}

pub(crate) fn lookup(conn: &Connection, left: &Symbol, right: &Symbol) -> Result<Option<Object>> {
    let mut stmt =
        conn.prepare_cached("SELECT idx FROM objects WHERE left_idx = ?1 AND right_idx = ?2")?;
    let index: Option<i64> = stmt
        .query_row(params![left.index(), right.index()], |row| row.get(0))
        .optional()?;
    Ok(index.map(|index| Object::new(index, left.clone(), right.clone())))
}

/// Intern the exact `(left, right)` pair. Both symbols must already be interned.
pub(crate) fn intern(conn: &Connection, left: Symbol, right: Symbol) -> Result<Object> {
    conn.prepare_cached("INSERT OR IGNORE INTO objects (left_idx, right_idx) VALUES (?1, ?2)")?
        .execute(params![left.index(), right.index()])?;

    lookup(conn, &left, &right)?.ok_or_else(|| SlonError::TransientDuplicate {
        table: "objects",
        key: format!("{} | {}", left.text(), right.text()),
    })
}
