//! Network store: entries and their context links
//!
//! Entries are never deduplicated. Each gets the next global id at insert
//! time, and holds a node plus the set of entries it lives in (its context).
//! An entry with no context is top level.

use crate::config::{CascadePolicy, Topology};
use crate::error::{Result, SlonError};
use crate::node::Node;
use crate::object::Object;
use crate::store::Slon;
use crate::symbol::Symbol;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Network entry id: strictly increasing, never reused
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    /// Wrap a raw id
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw id
    pub fn get(self) -> i64 {
        self.0
    }
}

/// A stored network entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    id: EntryId,
    node: Node,
    context: BTreeSet<EntryId>,
}

impl Entry {
    /// Global id, assigned at insert
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// The stored node
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Entries this one is linked to
    pub fn context(&self) -> &BTreeSet<EntryId> {
        &self.context
    }

    /// No context: a top-level entry
    pub fn is_top_level(&self) -> bool {
        self.context.is_empty()
    }

    /// Right-hand symbol of the effect: `A` for `program | A`
    pub fn name(&self) -> &str {
        self.node.effect().right().text()
    }
}

/// Scope of a query or insert
///
/// `Top` addresses entries without context. `Within` addresses entries linked
/// to at least one of the given ids; an empty `Within` addresses nothing,
/// so an empty result chained into another query stays empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Context {
    /// Entries without context
    #[default]
    Top,
    /// Entries linked to any of these ids
    Within(BTreeSet<EntryId>),
}

impl Context {
    /// Top level
    pub fn top() -> Self {
        Context::Top
    }

    /// Entries linked to any of `ids`
    pub fn within(ids: impl IntoIterator<Item = EntryId>) -> Self {
        Context::Within(ids.into_iter().collect())
    }

    /// Whether this is [`Context::Top`]
    pub fn is_top(&self) -> bool {
        matches!(self, Context::Top)
    }

    /// The referenced ids; empty for `Top`
    pub fn ids(&self) -> BTreeSet<EntryId> {
        match self {
            Context::Top => BTreeSet::new(),
            Context::Within(ids) => ids.clone(),
        }
    }
}

/// `()` is top level: `slon.insert(("program", "A"), ())`
impl From<()> for Context {
    fn from(_: ()) -> Self {
        Context::Top
    }
}

impl From<EntryId> for Context {
    fn from(id: EntryId) -> Self {
        Context::within([id])
    }
}

impl From<&Entry> for Context {
    fn from(entry: &Entry) -> Self {
        Context::within([entry.id])
    }
}

impl From<&[Entry]> for Context {
    fn from(entries: &[Entry]) -> Self {
        entries.iter().collect()
    }
}

impl From<&Vec<Entry>> for Context {
    fn from(entries: &Vec<Entry>) -> Self {
        entries.iter().collect()
    }
}

impl From<Vec<Entry>> for Context {
    fn from(entries: Vec<Entry>) -> Self {
        entries.iter().collect()
    }
}

impl FromIterator<EntryId> for Context {
    fn from_iter<I: IntoIterator<Item = EntryId>>(iter: I) -> Self {
        Context::Within(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a Entry> for Context {
    fn from_iter<I: IntoIterator<Item = &'a Entry>>(iter: I) -> Self {
        Context::Within(iter.into_iter().map(Entry::id).collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row loading
// ─────────────────────────────────────────────────────────────────────────────

const ENTRY_SELECT: &str = "
    SELECT n.id, nd.idx,
           eo.idx, el.idx, el.text, er.idx, er.text,
           po.idx, pl.idx, pl.text, pr.idx, pr.text
    FROM network n
    JOIN nodes nd ON nd.idx = n.node_idx
    JOIN objects eo ON eo.idx = nd.effect_idx
    JOIN symbols el ON el.idx = eo.left_idx
    JOIN symbols er ON er.idx = eo.right_idx
    LEFT JOIN objects po ON po.idx = nd.payload_idx
    LEFT JOIN symbols pl ON pl.idx = po.left_idx
    LEFT JOIN symbols pr ON pr.idx = po.right_idx";

fn object_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Object> {
    Ok(Object::new(
        row.get(at)?,
        Symbol::new(row.get(at + 1)?, row.get::<_, String>(at + 2)?),
        Symbol::new(row.get(at + 3)?, row.get::<_, String>(at + 4)?),
    ))
}

fn entry_row(row: &Row<'_>) -> rusqlite::Result<(EntryId, Node)> {
    let effect = object_at(row, 2)?;
    let payload = match row.get::<_, Option<i64>>(7)? {
        Some(_) => Some(object_at(row, 7)?),
        None => None,
    };
    Ok((EntryId(row.get(0)?), Node::new(row.get(1)?, effect, payload)))
}

fn context_of(conn: &Connection, id: EntryId) -> Result<BTreeSet<EntryId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT context_id FROM network_context WHERE entry_id = ?1 ORDER BY context_id",
    )?;
    let ids = stmt
        .query_map(params![id.0], |row| row.get(0).map(EntryId))?
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;
    Ok(ids)
}

fn with_context(conn: &Connection, rows: Vec<(EntryId, Node)>) -> Result<Vec<Entry>> {
    rows.into_iter()
        .map(|(id, node)| {
            Ok(Entry {
                id,
                node,
                context: context_of(conn, id)?,
            })
        })
        .collect()
}

/// JSON array parameter for `json_each`
fn id_list<'a>(ids: impl IntoIterator<Item = &'a EntryId>) -> Result<String> {
    let raw: Vec<i64> = ids.into_iter().map(|id| id.0).collect();
    Ok(serde_json::to_string(&raw)?)
}

/// Entries with id greater than `after`, ascending, at most `limit` rows.
///
/// `scope: None` pages over the whole network.
pub(crate) fn load_page(
    conn: &Connection,
    after: EntryId,
    limit: usize,
    scope: Option<&Context>,
) -> Result<Vec<Entry>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = match scope {
        None => {
            let mut stmt = conn.prepare_cached(&format!(
                "{ENTRY_SELECT} WHERE n.id > ?1 ORDER BY n.id LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![after.0, limit], entry_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
        Some(Context::Top) => {
            let mut stmt = conn.prepare_cached(&format!(
                "{ENTRY_SELECT}
                 WHERE n.id > ?1
                   AND NOT EXISTS (SELECT 1 FROM network_context c WHERE c.entry_id = n.id)
                 ORDER BY n.id LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![after.0, limit], entry_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
        Some(Context::Within(ids)) if ids.is_empty() => Vec::new(),
        Some(Context::Within(ids)) => {
            let mut stmt = conn.prepare_cached(&format!(
                "{ENTRY_SELECT}
                 WHERE n.id > ?1
                   AND EXISTS (
                       SELECT 1 FROM network_context c
                       WHERE c.entry_id = n.id
                         AND c.context_id IN (SELECT value FROM json_each(?3))
                   )
                 ORDER BY n.id LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![after.0, limit, id_list(ids)?], entry_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
    };
    with_context(conn, rows)
}

fn load_many(conn: &Connection, ids: &BTreeSet<EntryId>) -> Result<Vec<Entry>> {
    let mut stmt = conn.prepare_cached(&format!(
        "{ENTRY_SELECT} WHERE n.id IN (SELECT value FROM json_each(?1)) ORDER BY n.id"
    ))?;
    let rows = stmt
        .query_map(params![id_list(ids)?], entry_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    with_context(conn, rows)
}

/// `(context_id, entry_id)` links pointing into `ids` from entries outside it
fn dependents_of(conn: &Connection, ids: &BTreeSet<EntryId>) -> Result<Vec<(EntryId, EntryId)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT context_id, entry_id FROM network_context
         WHERE context_id IN (SELECT value FROM json_each(?1))
         ORDER BY context_id, entry_id",
    )?;
    let links = stmt
        .query_map(params![id_list(ids)?], |row| {
            Ok((EntryId(row.get(0)?), EntryId(row.get(1)?)))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(links
        .into_iter()
        .filter(|(_, dependent)| !ids.contains(dependent))
        .collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Store operations
// ─────────────────────────────────────────────────────────────────────────────

impl Slon {
    /// Fetch one entry
    pub fn get(&self, id: EntryId) -> Result<Option<Entry>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{ENTRY_SELECT} WHERE n.id = ?1"))?;
        let row = stmt.query_row(params![id.0], entry_row).optional()?;
        match row {
            Some((id, node)) => Ok(Some(Entry {
                id,
                node,
                context: context_of(&self.conn, id)?,
            })),
            None => Ok(None),
        }
    }

    /// Store a new entry for `node` linked to `context`.
    ///
    /// Every reference must resolve to a live entry; otherwise nothing is
    /// written. Under [`Topology::Tree`] at most one reference is allowed.
    pub fn insert_entry(&self, node: &Node, context: &BTreeSet<EntryId>) -> Result<Entry> {
        if self.config().topology == Topology::Tree && context.len() > 1 {
            return Err(SlonError::MultipleContexts {
                count: context.len(),
            });
        }

        self.atomically(|conn| {
            let mut exists = conn.prepare_cached("SELECT 1 FROM network WHERE id = ?1")?;
            for id in context {
                if !exists.exists(params![id.0])? {
                    return Err(SlonError::DanglingContextReference(*id));
                }
            }

            conn.prepare_cached("INSERT INTO network (node_idx) VALUES (?1)")?
                .execute(params![node.index()])?;
            let id = EntryId(conn.last_insert_rowid());

            let mut link = conn.prepare_cached(
                "INSERT INTO network_context (entry_id, context_id) VALUES (?1, ?2)",
            )?;
            for context_id in context {
                link.execute(params![id.0, context_id.0])?;
            }

            tracing::debug!(id = id.0, node = %node, context = context.len(), "inserted entry");
            Ok(Entry {
                id,
                node: node.clone(),
                context: context.clone(),
            })
        })
    }

    /// Delete the given entries and return what was removed, ascending by id.
    ///
    /// Ids that no longer exist are skipped. Entries that still use a removed
    /// entry as context are handled by the configured [`CascadePolicy`].
    pub fn remove_entries(&self, ids: &BTreeSet<EntryId>) -> Result<Vec<Entry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.atomically(|conn| {
            let mut doomed = ids.clone();
            let mut frontier = ids.clone();

            loop {
                let links = dependents_of(conn, &frontier)?;
                if links.is_empty() {
                    break;
                }
                if self.config().cascade == CascadePolicy::Reject {
                    let entry = links[0].0;
                    let dependents = links
                        .iter()
                        .filter(|(context, _)| *context == entry)
                        .map(|(_, dependent)| *dependent)
                        .collect::<Vec<_>>();
                    tracing::warn!(entry = entry.0, ?dependents, "removal rejected");
                    return Err(SlonError::CascadeConflict { entry, dependents });
                }
                frontier = links
                    .into_iter()
                    .map(|(_, dependent)| dependent)
                    .filter(|dependent| !doomed.contains(dependent))
                    .collect();
                if frontier.is_empty() {
                    break;
                }
                doomed.extend(frontier.iter().copied());
            }

            let removed = load_many(conn, &doomed)?;
            conn.prepare_cached("DELETE FROM network WHERE id IN (SELECT value FROM json_each(?1))")?
                .execute(params![id_list(&doomed)?])?;

            tracing::info!(
                requested = ids.len(),
                removed = removed.len(),
                "removed entries"
            );
            Ok(removed)
        })
    }
}
