//! Query engine: find, insert and delete over the network
//!
//! A query pairs a pattern with a scope. The scope is either a [`Context`]
//! or another query, whose results become the context of this one. Chains
//! can be arbitrarily deep:
//!
//! ```
//! use slon_core::{Query, Slon};
//!
//! let slon = Slon::open_in_memory()?;
//! let program = slon.insert(("program", "A"), ())?;
//! slon.insert(("step", "1"), &program)?;
//!
//! let steps = slon.run(&Query::new(("program", "*")).then(("*", "*")))?;
//! assert_eq!(steps[0].to_string(), "2. step | 1 & null");
//! # Ok::<(), slon_core::SlonError>(())
//! ```
//!
//! Results always come back in ascending entry id order.

use crate::config::Topology;
use crate::error::Result;
use crate::network::{self, Context, Entry, EntryId};
use crate::store::Slon;
use crate::term::{NodeTerm, Pattern};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

/// Where a query looks for entries
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// A fixed context
    Context(Context),
    /// The results of another query
    Query(Box<Query>),
}

/// A pattern and the scope it is matched in
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pattern: NodeTerm,
    scope: Scope,
}

impl Query {
    /// Match at top level
    pub fn new(pattern: impl Into<NodeTerm>) -> Self {
        Self::within(pattern, Context::Top)
    }

    /// Match among entries linked to `context`
    pub fn within(pattern: impl Into<NodeTerm>, context: impl Into<Context>) -> Self {
        Self {
            pattern: pattern.into(),
            scope: Scope::Context(context.into()),
        }
    }

    /// Match among entries linked to the results of `parent`
    pub fn under(pattern: impl Into<NodeTerm>, parent: Query) -> Self {
        Self {
            pattern: pattern.into(),
            scope: Scope::Query(Box::new(parent)),
        }
    }

    /// One hop down: match `pattern` among the children of this query's results
    pub fn then(self, pattern: impl Into<NodeTerm>) -> Self {
        Self::under(pattern, self)
    }

    /// The operand matched at this level
    pub fn pattern(&self) -> &NodeTerm {
        &self.pattern
    }

    /// Where this level looks
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Start a lazy enumeration of the results. Call again to restart.
    pub fn iter<'s>(&self, slon: &'s Slon) -> Result<Matches<'s>> {
        let pattern = slon.pattern(&self.pattern)?;
        let context = match &self.scope {
            Scope::Context(context) => context.clone(),
            Scope::Query(parent) => Context::from(slon.run(parent)?),
        };
        Ok(Matches::new(slon, pattern, Some(context)))
    }
}

/// Lazy, ordered query results
///
/// Candidates are read from the store one page at a time in ascending id
/// order and filtered with the pattern. Reading never writes.
pub struct Matches<'s> {
    slon: &'s Slon,
    pattern: Pattern,
    scope: Option<Context>,
    cursor: EntryId,
    page: VecDeque<Entry>,
    exhausted: bool,
}

impl<'s> Matches<'s> {
    fn new(slon: &'s Slon, pattern: Pattern, scope: Option<Context>) -> Self {
        Self {
            slon,
            pattern,
            scope,
            cursor: EntryId::new(0),
            page: VecDeque::new(),
            exhausted: false,
        }
    }

    /// The resolved pattern being matched
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn fill(&mut self) -> Result<()> {
        let limit = self.slon.config().page_size.max(1);
        let batch = network::load_page(&self.slon.conn, self.cursor, limit, self.scope.as_ref())?;

        if batch.len() < limit {
            self.exhausted = true;
        }
        if let Some(last) = batch.last() {
            self.cursor = last.id();
        }

        let fetched = batch.len();
        let pattern = &self.pattern;
        self.page
            .extend(batch.into_iter().filter(|entry| pattern.matches(entry.node())));
        tracing::debug!(
            pattern = %self.pattern,
            fetched,
            matched = self.page.len(),
            "query page"
        );
        Ok(())
    }
}

impl Iterator for Matches<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.page.pop_front() {
                return Some(Ok(entry));
            }
            if self.exhausted {
                return None;
            }
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
    }
}

impl fmt::Debug for Matches<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matches")
            .field("pattern", &self.pattern.to_string())
            .field("scope", &self.scope)
            .field("cursor", &self.cursor)
            .field("buffered", &self.page.len())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl Slon {
    /// Every entry matching `query`
    pub fn run(&self, query: &Query) -> Result<Vec<Entry>> {
        query.iter(self)?.collect()
    }

    /// Every entry matching `pattern` within `context`, ascending by id
    pub fn find(
        &self,
        pattern: impl Into<NodeTerm>,
        context: impl Into<Context>,
    ) -> Result<Vec<Entry>> {
        self.run(&Query::within(pattern, context))
    }

    /// Follow a chain of patterns from top level; returns the last hop's matches
    pub fn path<I, T>(&self, patterns: I) -> Result<Vec<Entry>>
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeTerm>,
    {
        let mut query: Option<Query> = None;
        for pattern in patterns {
            query = Some(match query {
                None => Query::new(pattern),
                Some(parent) => parent.then(pattern),
            });
        }
        match query {
            Some(query) => self.run(&query),
            None => Ok(Vec::new()),
        }
    }

    /// Every entry in the network, ascending by id
    pub fn entries(&self) -> Matches<'_> {
        Matches::new(self, Pattern::any(), None)
    }

    /// Insert `node` within `context`
    pub fn insert(
        &self,
        node: impl Into<NodeTerm>,
        context: impl Into<Context>,
    ) -> Result<Vec<Entry>> {
        self.insert_all([node.into()], context)
    }

    /// Insert several nodes within `context`, in order.
    ///
    /// Under [`Topology::Graph`] each node becomes one entry linked to the whole
    /// context. Under [`Topology::Tree`] each node is inserted once per context
    /// entry. An empty `Context::Within` inserts nothing.
    pub fn insert_all<I, T>(&self, nodes: I, context: impl Into<Context>) -> Result<Vec<Entry>>
    where
        I: IntoIterator<Item = T>,
        T: Into<NodeTerm>,
    {
        let context = context.into();
        let nodes = nodes
            .into_iter()
            .map(|term| self.node(term))
            .collect::<Result<Vec<_>>>()?;

        let parents: Vec<BTreeSet<EntryId>> = match (&context, self.config().topology) {
            (Context::Top, _) => vec![BTreeSet::new()],
            (Context::Within(ids), Topology::Graph) if ids.is_empty() => Vec::new(),
            (Context::Within(ids), Topology::Graph) => vec![ids.clone()],
            (Context::Within(ids), Topology::Tree) => {
                ids.iter().map(|id| BTreeSet::from([*id])).collect()
            }
        };

        let inserted = self.atomically(|_| {
            let mut inserted = Vec::with_capacity(parents.len() * nodes.len());
            for parent in &parents {
                for node in &nodes {
                    inserted.push(self.insert_entry(node, parent)?);
                }
            }
            Ok(inserted)
        })?;

        tracing::info!(inserted = inserted.len(), "inserted into network");
        Ok(inserted)
    }

    /// Remove exactly what `find(pattern, context)` returns right now
    /// (plus dependents, under the cascade policy)
    pub fn delete(
        &self,
        pattern: impl Into<NodeTerm>,
        context: impl Into<Context>,
    ) -> Result<Vec<Entry>> {
        let query = Query::within(pattern, context);
        self.remove_matches(&query)
    }

    /// Remove everything `query` matches
    pub fn remove_matches(&self, query: &Query) -> Result<Vec<Entry>> {
        self.atomically(|_| {
            let ids = query
                .iter(self)?
                .map(|entry| entry.map(|e| e.id()))
                .collect::<Result<BTreeSet<_>>>()?;
            self.remove_entries(&ids)
        })
    }

    /// Start a multi-level join
    pub fn join(&self) -> Join<'_> {
        Join {
            slon: self,
            levels: Vec::new(),
        }
    }
}

type Level<'s> = Box<dyn Fn(&[Entry]) -> Query + 's>;

/// Lateral join across nested query levels
///
/// Each level receives the entries already bound on the current row and
/// returns the query for the next column, e.g. program → trace → step.
pub struct Join<'s> {
    slon: &'s Slon,
    levels: Vec<Level<'s>>,
}

impl<'s> Join<'s> {
    /// Add a level
    pub fn level<F>(mut self, level: F) -> Self
    where
        F: Fn(&[Entry]) -> Query + 's,
    {
        self.levels.push(Box::new(level));
        self
    }

    /// Evaluate the join. Rows are ordered by the id of the last column,
    /// then by the earlier columns from right to left.
    pub fn rows(&self) -> Result<Vec<Vec<Entry>>> {
        if self.levels.is_empty() {
            return Ok(Vec::new());
        }

        let mut rows: Vec<Vec<Entry>> = vec![Vec::new()];
        for level in &self.levels {
            let mut next = Vec::new();
            for row in &rows {
                for entry in level(row).iter(self.slon)? {
                    let mut extended = row.clone();
                    extended.push(entry?);
                    next.push(extended);
                }
            }
            rows = next;
        }

        rows.sort_by(|a, b| {
            a.iter()
                .rev()
                .map(Entry::id)
                .cmp(b.iter().rev().map(Entry::id))
        });
        Ok(rows)
    }
}

impl fmt::Debug for Join<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Join")
            .field("levels", &self.levels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SlonConfig;

    fn ids(entries: &[Entry]) -> Vec<i64> {
        entries.iter().map(|e| e.id().get()).collect()
    }

    #[test]
    fn test_small_pages_still_see_everything() {
        let slon = Slon::open(SlonConfig::new().with_page_size(1)).unwrap();
        for n in 0..5 {
            slon.insert(("n", n.to_string()), ()).unwrap();
        }

        let found = slon.find(("n", "*"), ()).unwrap();
        assert_eq!(ids(&found), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_matches_is_restartable() {
        let slon = Slon::open_in_memory().unwrap();
        slon.insert(("a", "1"), ()).unwrap();
        slon.insert(("a", "2"), ()).unwrap();

        let query = Query::new(("a", "*"));
        let first: Vec<_> = query.iter(&slon).unwrap().collect::<Result<_>>().unwrap();
        let second: Vec<_> = query.iter(&slon).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_chain_does_not_fall_back_to_top_level() {
        let slon = Slon::open_in_memory().unwrap();
        slon.insert(("program", "A"), ()).unwrap();

        let found = slon.path([("missing", "*"), ("*", "*")]).unwrap();
        assert!(found.is_empty());
        assert!(slon.insert(("x", "y"), Vec::<Entry>::new()).unwrap().is_empty());
    }

    #[test]
    fn test_graph_insert_links_whole_context() {
        let slon = Slon::open_in_memory().unwrap();
        let a = slon.insert(("p", "a"), ()).unwrap();
        let b = slon.insert(("p", "b"), ()).unwrap();
        let parents: Vec<Entry> = a.into_iter().chain(b).collect();

        let child = slon.insert(("c", "x"), &parents).unwrap();
        assert_eq!(child.len(), 1);
        assert_eq!(child[0].context().len(), 2);
    }

    #[test]
    fn test_find_under_any_one_of_several_contexts() {
        let slon = Slon::open_in_memory().unwrap();
        let a = slon.insert(("p", "a"), ()).unwrap().remove(0);
        let b = slon.insert(("p", "b"), ()).unwrap().remove(0);
        let both = [a.clone(), b.clone()];
        slon.insert_all([("c", "x"), ("c", "y")], &both[..]).unwrap();
        slon.insert(("c", "z"), &a).unwrap();

        let under_b = slon.find(("c", "*"), &b).unwrap();
        let shown: Vec<_> = under_b.iter().map(ToString::to_string).collect();
        assert_eq!(shown, vec!["3. c | x & null", "4. c | y & null"]);
        assert!(under_b.iter().all(|e| e.context().len() == 2));

        let ab = slon.find(("c", "*"), Context::within([a.id(), b.id()])).unwrap();
        let ba = slon.find(("c", "*"), Context::within([b.id(), a.id()])).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ids(&ab), vec![3, 4, 5]);
    }

    #[test]
    fn test_tree_insert_fans_out_per_parent() {
        let slon = Slon::open(SlonConfig::new().with_topology(Topology::Tree)).unwrap();
        slon.insert(("p", "a"), ()).unwrap();
        slon.insert(("p", "b"), ()).unwrap();
        let parents = slon.find(("p", "*"), ()).unwrap();

        let children = slon
            .insert_all([("c", "1"), ("c", "2")], &parents)
            .unwrap();
        let shown: Vec<_> = children.iter().map(ToString::to_string).collect();
        assert_eq!(
            shown,
            vec!["3. c | 1 & null", "4. c | 2 & null", "5. c | 1 & null", "6. c | 2 & null"]
        );
        assert!(children.iter().all(|c| c.context().len() == 1));
    }

    #[test]
    fn test_query_operand_requires_one_row() {
        let slon = Slon::open_in_memory().unwrap();
        slon.insert(("program", "A"), ()).unwrap();
        slon.insert(("program", "B"), ()).unwrap();
        slon.insert(("trace", "A"), ()).unwrap();

        let one = Query::new(("trace", Query::new(("program", "A"))));
        assert_eq!(ids(&slon.run(&one).unwrap()), vec![3]);

        let many = Query::new(("trace", Query::new(("program", "*"))));
        let err = slon.run(&many).unwrap_err();
        assert!(matches!(err, crate::SlonError::AmbiguousOperand { found: 2 }));

        let none = Query::new(("trace", Query::new(("program", "Z"))));
        let err = slon.run(&none).unwrap_err();
        assert!(matches!(err, crate::SlonError::AmbiguousOperand { found: 0 }));
    }

    #[test]
    fn test_entries_lists_everything() {
        let slon = Slon::open_in_memory().unwrap();
        let top = slon.insert(("a", "1"), ()).unwrap();
        slon.insert(("b", "2"), &top).unwrap();

        let all: Vec<_> = slon.entries().collect::<Result<_>>().unwrap();
        assert_eq!(ids(&all), vec![1, 2]);
    }
}
