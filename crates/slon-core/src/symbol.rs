//! Symbol table: interned atomic text values
//!
//! A symbol is stored once per exact text. The wildcard `*` is interned like
//! any other text; it only gains meaning in [`symbols_match`].

use crate::error::{Result, SlonError};
use rusqlite::{params, Connection, OptionalExtension};

/// The symbol that matches every symbol, itself included
pub const WILDCARD: &str = "*";

/// Wildcard-aware symbol equality.
///
/// Reflexive and symmetric, not transitive: `*` matches both `A` and `B`
/// while `A` does not match `B`.
pub fn symbols_match(a: &str, b: &str) -> bool {
    a == b || a == WILDCARD || b == WILDCARD
}

/// Interned symbol handle
///
/// `==` compares the exact stored identity. Use [`Symbol::matches`] for
/// wildcard equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    index: i64,
    text: String,
}

impl Symbol {
    pub(crate) fn new(index: i64, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Insertion index, assigned once when the text was first interned
    pub fn index(&self) -> i64 {
        self.index
    }

    /// The interned text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether this is the wildcard symbol
    pub fn is_wildcard(&self) -> bool {
        self.text == WILDCARD
    }

    /// Wildcard-aware equality
    pub fn matches(&self, other: &Symbol) -> bool {
        symbols_match(&self.text, &other.text)
    }
}

/// Look up a symbol without creating it
pub(crate) fn lookup(conn: &Connection, text: &str) -> Result<Option<Symbol>> {
    let mut stmt = conn.prepare_cached("SELECT idx, text FROM symbols WHERE text = ?1")?;
    let symbol = stmt
        .query_row(params![text], |row| Ok(Symbol::new(row.get(0)?, row.get::<_, String>(1)?)))
        .optional()?;
    Ok(symbol)
}

/// Return the symbol for `text`, creating it on first occurrence.
///
/// Blank text is rejected: the textual form has no way to address it.
/// Must run inside a savepoint: the insert and the read-back form one unit.
pub(crate) fn intern(conn: &Connection, text: &str) -> Result<Symbol> {
    if text.trim().is_empty() {
        return Err(SlonError::MalformedPattern(format!(
            "symbol text must not be blank, got {text:?}"
        )));
    }

    let inserted = conn
        .prepare_cached("INSERT OR IGNORE INTO symbols (text) VALUES (?1)")?
        .execute(params![text])?;

    let symbol = lookup(conn, text)?.ok_or_else(|| SlonError::TransientDuplicate {
        table: "symbols",
        key: text.to_string(),
    })?;

    if inserted > 0 {
        tracing::debug!(index = symbol.index, text, "interned symbol");
    }
    Ok(symbol)
}
