//! Terms: caller-facing operands for symbols, objects and nodes
//!
//! Every API that takes a value also takes the raw text it would be built
//! from. Terms are normalized to interned handles when a value is stored,
//! and to a text-only [`Pattern`] when a value is only matched against.
//!
//! # Textual form
//!
//! ```text
//! left | right                     bare pair
//! left | right & null              node without payload
//! left | right & left | right      node with payload
//! ```
//!
//! A bare pair inserts as a node without payload. As a pattern it matches on
//! the effect alone, so `* | *` finds `handle | init` and
//! `bypass | next & json | {}` alike, while `* | * & null` only finds the
//! former.
//!
//! The textual form is a convenience, not a full encoding. Each symbol is
//! trimmed, the first `&` splits effect from payload and the first `|` splits
//! left from right. A symbol with surrounding whitespace, or one containing
//! `&` or `|`, can be stored through the typed API but does not survive a
//! display and parse round trip; use [`SymbolTerm::Text`] or a handle for it.

use crate::error::{Result, SlonError};
use crate::network::Entry;
use crate::node::Node;
use crate::object::{pairs_match, Object};
use crate::query::Query;
use crate::store::Slon;
use crate::symbol::{self, Symbol, WILDCARD};
use crate::{node, object};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Text that stands for an absent payload
pub const NULL_PAYLOAD: &str = "null";

/// A symbol operand
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolTerm {
    /// An already interned symbol
    Handle(Symbol),
    /// Raw text, interned on use
    Text(String),
    /// The name of an entry: the right-hand symbol of its effect
    Name(Box<Entry>),
    /// A sub-query that must match exactly one entry, used as a `Name`
    Query(Box<Query>),
}

impl From<&str> for SymbolTerm {
    fn from(text: &str) -> Self {
        SymbolTerm::Text(text.to_string())
    }
}

impl From<String> for SymbolTerm {
    fn from(text: String) -> Self {
        SymbolTerm::Text(text)
    }
}

impl From<&String> for SymbolTerm {
    fn from(text: &String) -> Self {
        SymbolTerm::Text(text.clone())
    }
}

impl From<Symbol> for SymbolTerm {
    fn from(symbol: Symbol) -> Self {
        SymbolTerm::Handle(symbol)
    }
}

impl From<&Symbol> for SymbolTerm {
    fn from(symbol: &Symbol) -> Self {
        SymbolTerm::Handle(symbol.clone())
    }
}

impl From<Entry> for SymbolTerm {
    fn from(entry: Entry) -> Self {
        SymbolTerm::Name(Box::new(entry))
    }
}

impl From<&Entry> for SymbolTerm {
    fn from(entry: &Entry) -> Self {
        SymbolTerm::Name(Box::new(entry.clone()))
    }
}

impl From<Query> for SymbolTerm {
    fn from(query: Query) -> Self {
        SymbolTerm::Query(Box::new(query))
    }
}

/// An object operand
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectTerm {
    /// An already interned object
    Handle(Object),
    /// An ordered pair of symbol operands
    Pair(SymbolTerm, SymbolTerm),
}

impl ObjectTerm {
    /// Build a pair from two symbol operands
    pub fn pair(left: impl Into<SymbolTerm>, right: impl Into<SymbolTerm>) -> Self {
        ObjectTerm::Pair(left.into(), right.into())
    }
}

impl<L, R> From<(L, R)> for ObjectTerm
where
    L: Into<SymbolTerm>,
    R: Into<SymbolTerm>,
{
    fn from((left, right): (L, R)) -> Self {
        ObjectTerm::pair(left, right)
    }
}

impl From<Object> for ObjectTerm {
    fn from(object: Object) -> Self {
        ObjectTerm::Handle(object)
    }
}

impl From<&Object> for ObjectTerm {
    fn from(object: &Object) -> Self {
        ObjectTerm::Handle(object.clone())
    }
}

/// A node operand
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTerm {
    /// An already interned node
    Handle(Node),
    /// A bare pair: stored as a node without payload, matched on effect only
    Object(ObjectTerm),
    /// An explicit node; `payload: None` means the payload is absent
    Compose {
        /// Effect object
        effect: ObjectTerm,
        /// Payload object, `None` for absent
        payload: Option<ObjectTerm>,
    },
}

impl NodeTerm {
    /// A node with no payload
    pub fn unary(effect: impl Into<ObjectTerm>) -> Self {
        NodeTerm::Compose {
            effect: effect.into(),
            payload: None,
        }
    }

    /// A node with a payload
    pub fn binary(effect: impl Into<ObjectTerm>, payload: impl Into<ObjectTerm>) -> Self {
        NodeTerm::Compose {
            effect: effect.into(),
            payload: Some(payload.into()),
        }
    }

    /// Parse the textual form, see the module docs
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once('&') {
            None => Ok(NodeTerm::Object(parse_pair(s)?)),
            Some((effect, payload)) => {
                let effect = parse_pair(effect)?;
                let payload = payload.trim();
                if payload.is_empty() {
                    return Err(SlonError::MalformedPattern(format!(
                        "missing payload after `&` in {s:?}"
                    )));
                }
                if payload.contains('&') {
                    return Err(SlonError::MalformedPattern(format!(
                        "more than one `&` in {s:?}"
                    )));
                }
                let payload = if payload == NULL_PAYLOAD {
                    None
                } else {
                    Some(parse_pair(payload)?)
                };
                Ok(NodeTerm::Compose { effect, payload })
            }
        }
    }
}

fn parse_pair(s: &str) -> Result<ObjectTerm> {
    let (left, right) = s.split_once('|').ok_or_else(|| {
        SlonError::MalformedPattern(format!("expected `left | right`, got {:?}", s.trim()))
    })?;
    let (left, right) = (left.trim(), right.trim());

    if left.is_empty() {
        return Err(SlonError::MalformedPattern(format!(
            "missing left-hand symbol in {:?}",
            s.trim()
        )));
    }
    if right.is_empty() {
        return Err(SlonError::MalformedPattern(format!(
            "missing right-hand symbol in {:?}",
            s.trim()
        )));
    }
    if right.contains('|') {
        return Err(SlonError::MalformedPattern(format!(
            "more than one `|` in {:?}",
            s.trim()
        )));
    }
    Ok(ObjectTerm::pair(left, right))
}

impl FromStr for NodeTerm {
    type Err = SlonError;

    fn from_str(s: &str) -> Result<Self> {
        NodeTerm::parse(s)
    }
}

impl<L, R> From<(L, R)> for NodeTerm
where
    L: Into<SymbolTerm>,
    R: Into<SymbolTerm>,
{
    fn from(pair: (L, R)) -> Self {
        NodeTerm::Object(pair.into())
    }
}

impl From<ObjectTerm> for NodeTerm {
    fn from(object: ObjectTerm) -> Self {
        NodeTerm::Object(object)
    }
}

impl From<Object> for NodeTerm {
    fn from(object: Object) -> Self {
        NodeTerm::Object(ObjectTerm::Handle(object))
    }
}

impl From<Node> for NodeTerm {
    fn from(node: Node) -> Self {
        NodeTerm::Handle(node)
    }
}

impl From<&Node> for NodeTerm {
    fn from(node: &Node) -> Self {
        NodeTerm::Handle(node.clone())
    }
}

impl From<&NodeTerm> for NodeTerm {
    fn from(term: &NodeTerm) -> Self {
        term.clone()
    }
}

/// How a pattern constrains the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadPattern {
    /// Any payload, or none
    Any,
    /// The payload must be absent
    Absent,
    /// The payload must be present and match
    Present(String, String),
}

/// A resolved, text-only node pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    effect: (String, String),
    payload: PayloadPattern,
}

impl Pattern {
    /// Match on the effect only
    pub fn effect(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            effect: (left.into(), right.into()),
            payload: PayloadPattern::Any,
        }
    }

    /// Match every node
    pub fn any() -> Self {
        Self::effect(WILDCARD, WILDCARD)
    }

    /// Require an absent payload
    pub fn without_payload(mut self) -> Self {
        self.payload = PayloadPattern::Absent;
        self
    }

    /// Require a matching payload
    pub fn with_payload(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.payload = PayloadPattern::Present(left.into(), right.into());
        self
    }

    /// Pattern for exactly the shape of `node`
    pub fn of(node: &Node) -> Self {
        let (left, right) = node.effect().texts();
        let pattern = Self::effect(left, right);
        match node.payload() {
            Some(payload) => pattern.with_payload(payload.left().text(), payload.right().text()),
            None => pattern.without_payload(),
        }
    }

    /// Payload constraint
    pub fn payload(&self) -> &PayloadPattern {
        &self.payload
    }

    /// Whether `node` fits this pattern
    pub fn matches(&self, node: &Node) -> bool {
        let effect = (self.effect.0.as_str(), self.effect.1.as_str());
        if !pairs_match(effect, node.effect().texts()) {
            return false;
        }
        match (&self.payload, node.payload()) {
            (PayloadPattern::Any, _) => true,
            (PayloadPattern::Absent, None) => true,
            (PayloadPattern::Present(left, right), Some(payload)) => {
                pairs_match((left.as_str(), right.as_str()), payload.texts())
            }
            _ => false,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.effect.0, self.effect.1)?;
        match &self.payload {
            PayloadPattern::Any => Ok(()),
            PayloadPattern::Absent => write!(f, " & {NULL_PAYLOAD}"),
            PayloadPattern::Present(left, right) => write!(f, " & {left} | {right}"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolution against a store
// ─────────────────────────────────────────────────────────────────────────────

impl Slon {
    fn symbol_text<'t>(&self, term: &'t SymbolTerm) -> Result<Cow<'t, str>> {
        match term {
            SymbolTerm::Handle(symbol) => Ok(Cow::Borrowed(symbol.text())),
            SymbolTerm::Text(text) => Ok(Cow::Borrowed(text)),
            SymbolTerm::Name(entry) => Ok(Cow::Borrowed(entry.name())),
            SymbolTerm::Query(query) => {
                let mut found = self.run(query)?;
                if found.len() != 1 {
                    return Err(SlonError::AmbiguousOperand { found: found.len() });
                }
                let entry = found.remove(0);
                Ok(Cow::Owned(entry.name().to_string()))
            }
        }
    }

    fn object_texts<'t>(&self, term: &'t ObjectTerm) -> Result<(Cow<'t, str>, Cow<'t, str>)> {
        match term {
            ObjectTerm::Handle(object) => Ok((
                Cow::Borrowed(object.left().text()),
                Cow::Borrowed(object.right().text()),
            )),
            ObjectTerm::Pair(left, right) => Ok((self.symbol_text(left)?, self.symbol_text(right)?)),
        }
    }

    /// Intern a symbol
    pub fn intern(&self, term: impl Into<SymbolTerm>) -> Result<Symbol> {
        let term = term.into();
        if let SymbolTerm::Handle(symbol) = term {
            return Ok(symbol);
        }
        let text = self.symbol_text(&term)?;
        self.atomically(|conn| symbol::intern(conn, &text))
    }

    /// Intern an ordered pair of symbols
    pub fn pair(&self, left: impl Into<SymbolTerm>, right: impl Into<SymbolTerm>) -> Result<Object> {
        self.object(&ObjectTerm::pair(left, right))
    }

    /// Intern an object operand
    pub fn object(&self, term: &ObjectTerm) -> Result<Object> {
        if let ObjectTerm::Handle(object) = term {
            return Ok(object.clone());
        }
        let (left, right) = self.object_texts(term)?;
        self.atomically(|conn| {
            let left = symbol::intern(conn, &left)?;
            let right = symbol::intern(conn, &right)?;
            object::intern(conn, left, right)
        })
    }

    /// Compose a node without payload
    pub fn compose(&self, effect: impl Into<ObjectTerm>) -> Result<Node> {
        self.node(NodeTerm::unary(effect))
    }

    /// Compose a node with a payload
    pub fn compose_with(
        &self,
        effect: impl Into<ObjectTerm>,
        payload: impl Into<ObjectTerm>,
    ) -> Result<Node> {
        self.node(NodeTerm::binary(effect, payload))
    }

    /// Intern a node operand
    pub fn node(&self, term: impl Into<NodeTerm>) -> Result<Node> {
        let (effect, payload) = match term.into() {
            NodeTerm::Handle(node) => return Ok(node),
            NodeTerm::Object(effect) => (effect, None),
            NodeTerm::Compose { effect, payload } => (effect, payload),
        };
        let effect = self.object(&effect)?;
        let payload = payload.map(|p| self.object(&p)).transpose()?;
        self.atomically(|conn| node::intern(conn, effect, payload))
    }

    /// Resolve a node operand to a pattern. Nothing is written to the store.
    pub fn pattern(&self, term: &NodeTerm) -> Result<Pattern> {
        match term {
            NodeTerm::Handle(node) => Ok(Pattern::of(node)),
            NodeTerm::Object(effect) => {
                let (left, right) = self.object_texts(effect)?;
                Ok(Pattern::effect(left, right))
            }
            NodeTerm::Compose { effect, payload } => {
                let (left, right) = self.object_texts(effect)?;
                let pattern = Pattern::effect(left, right);
                match payload {
                    Some(payload) => {
                        let (left, right) = self.object_texts(payload)?;
                        Ok(pattern.with_payload(left, right))
                    }
                    None => Ok(pattern.without_payload()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_pair() {
        let term = NodeTerm::parse("program | *").unwrap();
        assert_eq!(term, NodeTerm::from(("program", "*")));
    }

    #[test]
    fn test_parse_nodes() {
        assert_eq!(
            NodeTerm::parse("A | a & B | b").unwrap(),
            NodeTerm::binary(("A", "a"), ("B", "b"))
        );
        assert_eq!(
            NodeTerm::parse("A | a & null").unwrap(),
            NodeTerm::unary(("A", "a"))
        );
        assert_eq!(
            "js | () => {}".parse::<NodeTerm>().unwrap(),
            NodeTerm::from(("js", "() => {}"))
        );
    }

    #[test]
    fn test_parse_rejects_missing_parts() {
        for input in ["A |", "| a", "A", "A | a &", "A | a & B", "A | a | b", "A | a & B | b & C | c"] {
            let err = NodeTerm::parse(input).unwrap_err();
            assert!(
                matches!(err, SlonError::MalformedPattern(_)),
                "{input:?} should be malformed, got {err}"
            );
        }
    }

    #[test]
    fn test_text_form_trims_and_splits_on_separators() {
        let slon = Slon::open_in_memory().unwrap();

        let padded = slon.compose((" padded", "x")).unwrap();
        let reparsed = slon.node(NodeTerm::parse(&padded.to_string()).unwrap()).unwrap();
        assert_eq!(reparsed.effect().left().text(), "padded");
        assert_ne!(reparsed, padded);

        let amp = slon.compose(("a & b", "x")).unwrap();
        assert!(NodeTerm::parse(&amp.to_string()).is_err());
        assert_eq!(amp.effect().left().text(), "a & b");
    }

    #[test]
    fn test_pattern_payload_modes() {
        let slon = Slon::open_in_memory().unwrap();
        let unary = slon.compose(("handle", "init")).unwrap();
        let binary = slon.compose_with(("bypass", "next"), ("json", "{}")).unwrap();

        let bare = slon.pattern(&NodeTerm::from(("*", "*"))).unwrap();
        assert!(bare.matches(&unary));
        assert!(bare.matches(&binary));

        let strict = slon.pattern(&NodeTerm::unary(("*", "*"))).unwrap();
        assert!(strict.matches(&unary));
        assert!(!strict.matches(&binary));

        let payload = slon.pattern(&NodeTerm::binary(("*", "*"), ("json", "*"))).unwrap();
        assert!(!payload.matches(&unary));
        assert!(payload.matches(&binary));
    }

    #[test]
    fn test_pattern_resolution_writes_nothing() {
        let slon = Slon::open_in_memory().unwrap();
        slon.pattern(&NodeTerm::binary(("x", "y"), ("z", "*"))).unwrap();

        assert_eq!(slon.stats().unwrap()["symbols"], 0);
    }

    #[test]
    fn test_pattern_display() {
        assert_eq!(Pattern::any().to_string(), "* | *");
        assert_eq!(Pattern::effect("A", "a").without_payload().to_string(), "A | a & null");
        assert_eq!(
            Pattern::effect("A", "a").with_payload("B", "*").to_string(),
            "A | a & B | *"
        );
    }

    #[test]
    fn test_blank_symbols_are_rejected() {
        let slon = Slon::open_in_memory().unwrap();

        let err = slon.pair("A", "").unwrap_err();
        assert!(matches!(err, SlonError::MalformedPattern(_)), "got {err}");
        assert!(matches!(slon.intern("  "), Err(SlonError::MalformedPattern(_))));

        // the left symbol of the failed pair is rolled back with it
        assert_eq!(slon.stats().unwrap()["symbols"], 0);
        assert_eq!(slon.stats().unwrap()["objects"], 0);

        assert!(matches!(
            slon.compose_with(("A", "a"), ("", "b")),
            Err(SlonError::MalformedPattern(_))
        ));
        assert_eq!(slon.stats().unwrap()["nodes"], 0);
    }

    #[test]
    fn test_handles_resolve_without_interning() {
        let slon = Slon::open_in_memory().unwrap();
        let symbol = slon.intern("A").unwrap();

        assert_eq!(slon.intern(&symbol).unwrap(), symbol);
        assert_eq!(slon.stats().unwrap()["symbols"], 1);
    }
}
