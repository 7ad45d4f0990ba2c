//! Node composer: interned effect/payload composites
//!
//! A node always has an effect object. The payload is optional, and an absent
//! payload is its own state: it is neither an empty object nor a wildcard.

use crate::error::{Result, SlonError};
use crate::object::{pairs_match, Object};
use rusqlite::{params, Connection, OptionalExtension};

/// Borrowed text view of a node, used by every node-level match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeShape<'a> {
    /// Effect texts, left first
    pub effect: (&'a str, &'a str),
    /// Payload texts; `None` when absent
    pub payload: Option<(&'a str, &'a str)>,
}

impl NodeShape<'_> {
    /// Effects must match; payloads match when both are absent or both
    /// present and matching.
    pub fn matches(&self, other: &NodeShape<'_>) -> bool {
        pairs_match(self.effect, other.effect)
            && match (self.payload, other.payload) {
                (None, None) => true,
                (Some(a), Some(b)) => pairs_match(a, b),
                _ => false,
            }
    }
}

/// Interned node handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    index: i64,
    effect: Object,
    payload: Option<Object>,
}

impl Node {
    pub(crate) fn new(index: i64, effect: Object, payload: Option<Object>) -> Self {
        Self {
            index,
            effect,
            payload,
        }
    }

    /// Insertion index
    pub fn index(&self) -> i64 {
        self.index
    }

    /// The effect object
    pub fn effect(&self) -> &Object {
        &self.effect
    }

    /// The payload object, if any
    pub fn payload(&self) -> Option<&Object> {
        self.payload.as_ref()
    }

    /// Whether this node was composed from a single object
    pub fn is_unary(&self) -> bool {
        self.payload.is_none()
    }

    /// Borrowed text view, for matching
    pub fn shape(&self) -> NodeShape<'_> {
        NodeShape {
            effect: self.effect.texts(),
            payload: self.payload.as_ref().map(Object::texts),
        }
    }

    /// Wildcard-aware equality
    pub fn matches(&self, other: &Node) -> bool {
        self.shape().matches(&other.shape())
    }
}

pub(crate) fn lookup(
    conn: &Connection,
    effect: &Object,
    payload: Option<&Object>,
) -> Result<Option<Node>> {
    let mut stmt = conn
        .prepare_cached("SELECT idx FROM nodes WHERE effect_idx = ?1 AND payload_idx IS ?2")?;
    let index: Option<i64> = stmt
        .query_row(params![effect.index(), payload.map(Object::index)], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(index.map(|index| Node::new(index, effect.clone(), payload.cloned())))
}

/// Intern `(effect, payload-or-none)`. Both objects must already be interned.
pub(crate) fn intern(conn: &Connection, effect: Object, payload: Option<Object>) -> Result<Node> {
    conn.prepare_cached("INSERT OR IGNORE INTO nodes (effect_idx, payload_idx) VALUES (?1, ?2)")?
        .execute(params![effect.index(), payload.as_ref().map(Object::index)])?;

    lookup(conn, &effect, payload.as_ref())?.ok_or_else(|| SlonError::TransientDuplicate {
        table: "nodes",
        key: format!(
            "{} & {}",
            effect.index(),
            payload
                .as_ref()
                .map_or_else(|| "none".to_string(), |p| p.index().to_string())
        ),
    })
}
